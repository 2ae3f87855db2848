//! Landing decision: where a freshly opened (or just logged-out) client goes.

use crate::model::Role;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Login,
    StudentHome,
    TeacherHome,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Login => "login",
            Destination::StudentHome => "student-home",
            Destination::TeacherHome => "teacher-home",
        }
    }
}

/// Compute the landing destination from the current session. Pure; callers
/// re-evaluate it at every entry point instead of caching the answer, so a
/// teardown elsewhere is reflected on the next decision.
pub fn landing(session: Option<&Session>) -> Destination {
    match session {
        None => Destination::Login,
        Some(session) => match session.user.role {
            Role::Student => Destination::StudentHome,
            Role::Teacher => Destination::TeacherHome,
        },
    }
}
