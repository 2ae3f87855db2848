use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Draft,
    Active,
    Expired,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Draft => "draft",
            TaskStatus::Active => "active",
            TaskStatus::Expired => "expired",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Submitted,
    Late,
    Reviewed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Late => "late",
            SubmissionStatus::Reviewed => "reviewed",
        }
    }
}

/// Account record as the service serializes it. The same shape carries the
/// logged-in identity and roster members; role-specific fields are empty
/// strings for the other role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub teacher_id: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_active: bool,
}

impl UserProfile {
    /// Label used when printing a person: real name, falling back to the
    /// login name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub allowed_formats: Vec<String>,
    #[serde(default)]
    pub filename_template: String,
    #[serde(default)]
    pub max_file_size: i64,
    #[serde(default)]
    pub teacher_id: u64,
    #[serde(default)]
    pub teacher: Option<UserProfile>,
    #[serde(default)]
    pub total_students: i64,
    #[serde(default)]
    pub submitted_count: i64,
    #[serde(default)]
    pub on_time_count: i64,
    /// Decoration on student task lists; absent elsewhere.
    #[serde(default)]
    pub submitted: bool,
}

/// A stored file as the upload endpoint returns it and as the submission
/// registration request references it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRef {
    pub original_name: String,
    pub stored_name: String,
    pub file_path: String,
    pub file_size: i64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub file_hash: String,
}

/// Submission record. Read-only on this side; the server owns every field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: u64,
    pub task_id: u64,
    pub student_id: u64,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_on_time: bool,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginData {
    pub token: String,
    pub user: UserProfile,
}

/// Page of tasks as the list endpoints wrap it.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPage {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionPage {
    #[serde(default)]
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterData {
    #[serde(default)]
    pub students: Vec<UserProfile>,
}
