//! Pure reconciliation of a task's roster with its submission records.
//!
//! The two inputs arrive from independently timed fetches; nothing here does
//! I/O or touches the clock, so the same inputs always produce the same view.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{Submission, UserProfile};

/// One roster member joined with their submission, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub student: UserProfile,
    pub has_submitted: bool,
    pub submission: Option<Submission>,
}

/// Aggregate numbers for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassStats {
    /// Percentage with one decimal, e.g. "33.3".
    pub submit_rate: String,
    /// Whole-number percentage for progress rendering.
    pub progress: u32,
    pub unsubmitted_count: u32,
}

/// Output of [`reconcile`]: the ordered entries, their partition, and stats.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterView {
    pub entries: Vec<RosterEntry>,
    pub submitted: Vec<RosterEntry>,
    pub unsubmitted: Vec<RosterEntry>,
    pub stats: ClassStats,
}

/// Join roster and submissions into the per-student view.
///
/// Every roster member yields exactly one entry; submissions from students
/// not on the roster are ignored. When the input carries more than one
/// submission for a student the first one is kept. Entry order is fully
/// determined by the students themselves (student number, then login name),
/// never by the order the server returned either list in.
pub fn reconcile(roster: &[UserProfile], submissions: &[Submission]) -> RosterView {
    let mut by_student: HashMap<u64, &Submission> = HashMap::new();
    for submission in submissions {
        by_student.entry(submission.student_id).or_insert(submission);
    }

    let mut entries: Vec<RosterEntry> = roster
        .iter()
        .map(|student| {
            let submission = by_student.get(&student.id).map(|s| (*s).clone());
            RosterEntry {
                has_submitted: submission.is_some(),
                submission,
                student: student.clone(),
            }
        })
        .collect();
    entries.sort_by(|a, b| compare_students(&a.student, &b.student));

    let submitted: Vec<RosterEntry> = entries
        .iter()
        .filter(|e| e.has_submitted)
        .cloned()
        .collect();
    let unsubmitted: Vec<RosterEntry> = entries
        .iter()
        .filter(|e| !e.has_submitted)
        .cloned()
        .collect();
    let stats = class_stats(entries.len(), submitted.len());

    RosterView {
        entries,
        submitted,
        unsubmitted,
        stats,
    }
}

fn sort_key(student: &UserProfile) -> &str {
    if student.student_id.is_empty() {
        &student.username
    } else {
        &student.student_id
    }
}

fn compare_students(a: &UserProfile, b: &UserProfile) -> Ordering {
    let ka = sort_key(a);
    let kb = sort_key(b);
    ka.to_lowercase()
        .cmp(&kb.to_lowercase())
        .then_with(|| ka.cmp(kb))
        .then_with(|| a.id.cmp(&b.id))
}

fn class_stats(roster_size: usize, submitted_count: usize) -> ClassStats {
    if roster_size == 0 {
        return ClassStats {
            submit_rate: "0.0".into(),
            progress: 0,
            unsubmitted_count: 0,
        };
    }
    let ratio = submitted_count as f64 / roster_size as f64 * 100.0;
    ClassStats {
        submit_rate: format!("{:.1}", ratio),
        progress: ratio.round() as u32,
        unsubmitted_count: (roster_size - submitted_count) as u32,
    }
}
