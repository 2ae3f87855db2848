use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use tasksync::api::{ApiError, ApiResult, TaskService};
use tasksync::model::{
    FileRef, LoginData, Role, Submission, SubmissionStatus, Task, TaskStatus, UserProfile,
};
use tasksync::pager::Pager;
use tasksync::reconcile::reconcile;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PageCall {
    page: u32,
    size: u32,
}

#[derive(Clone, Default)]
struct RecordingApi {
    task_pages: Arc<Mutex<VecDeque<ApiResult<Vec<Task>>>>>,
    roster: Arc<Mutex<VecDeque<ApiResult<Vec<UserProfile>>>>>,
    submissions: Arc<Mutex<VecDeque<ApiResult<Vec<Submission>>>>>,
    page_calls: Arc<Mutex<Vec<PageCall>>>,
}

impl RecordingApi {
    async fn pop<T>(queue: &Mutex<VecDeque<ApiResult<T>>>) -> ApiResult<T> {
        queue
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::App("no canned response".into())))
    }
}

#[async_trait]
impl TaskService for RecordingApi {
    async fn login(&self, _username: &str, _password: &str) -> ApiResult<LoginData> {
        Err(ApiError::App("unexpected call: login".into()))
    }

    async fn user_info(&self) -> ApiResult<UserProfile> {
        Err(ApiError::App("unexpected call: user_info".into()))
    }

    async fn student_tasks(
        &self,
        page: u32,
        size: u32,
        _status: Option<&str>,
    ) -> ApiResult<Vec<Task>> {
        self.page_calls.lock().await.push(PageCall { page, size });
        Self::pop(&self.task_pages).await
    }

    async fn teacher_tasks(
        &self,
        page: u32,
        size: u32,
        _status: Option<&str>,
    ) -> ApiResult<Vec<Task>> {
        self.page_calls.lock().await.push(PageCall { page, size });
        Self::pop(&self.task_pages).await
    }

    async fn task_detail(&self, _task_id: u64) -> ApiResult<Task> {
        Err(ApiError::App("unexpected call: task_detail".into()))
    }

    async fn task_roster(&self, _task_id: u64) -> ApiResult<Vec<UserProfile>> {
        Self::pop(&self.roster).await
    }

    async fn task_submissions(&self, _task_id: u64) -> ApiResult<Vec<Submission>> {
        Self::pop(&self.submissions).await
    }

    async fn my_submission(&self, _task_id: u64) -> ApiResult<Submission> {
        Err(ApiError::App("unexpected call: my_submission".into()))
    }

    async fn my_submissions(&self, _page: u32, _size: u32) -> ApiResult<Vec<Submission>> {
        Err(ApiError::App("unexpected call: my_submissions".into()))
    }

    async fn upload_file(
        &self,
        _file_name: &str,
        _content_type: &str,
        _content: Vec<u8>,
    ) -> ApiResult<FileRef> {
        Err(ApiError::App("unexpected call: upload_file".into()))
    }

    async fn register_submission(
        &self,
        _task_id: u64,
        _files: &[FileRef],
    ) -> ApiResult<Submission> {
        Err(ApiError::App("unexpected call: register_submission".into()))
    }
}

fn make_tasks(start: u64, n: u64) -> Vec<Task> {
    (start..start + n)
        .map(|id| Task {
            id,
            title: format!("Task {}", id),
            description: String::new(),
            status: TaskStatus::Active,
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap(),
            allowed_formats: vec!["pdf".into()],
            filename_template: String::new(),
            max_file_size: 10 << 20,
            teacher_id: 1,
            teacher: None,
            total_students: 0,
            submitted_count: 0,
            on_time_count: 0,
            submitted: false,
        })
        .collect()
}

fn student(id: u64, student_id: &str, username: &str) -> UserProfile {
    UserProfile {
        id,
        username: username.into(),
        name: format!("Student {}", id),
        role: Role::Student,
        student_id: student_id.into(),
        major: String::new(),
        grade: String::new(),
        class: String::new(),
        teacher_id: String::new(),
        department: String::new(),
        phone: String::new(),
        is_active: true,
    }
}

fn submission(id: u64, student_id: u64) -> Submission {
    Submission {
        id,
        task_id: 5,
        student_id,
        status: SubmissionStatus::Submitted,
        submitted_at: Some(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()),
        is_on_time: true,
        files: Vec::new(),
        score: None,
        comment: String::new(),
        reviewed_at: None,
        task: None,
    }
}

#[tokio::test]
async fn pager_accumulates_service_pages() {
    let api = RecordingApi::default();
    api.task_pages
        .lock()
        .await
        .extend([Ok(make_tasks(1, 10)), Ok(make_tasks(11, 4))]);

    let pager: Pager<Task> = Pager::new(10);
    let api_ref = &api;

    let snap = pager
        .load_next(|page, size| async move {
            api_ref.student_tasks(page, size, Some("active")).await
        })
        .await
        .unwrap();
    assert_eq!(snap.items.len(), 10);
    assert!(snap.cursor.has_more);

    let snap = pager
        .load_next(|page, size| async move {
            api_ref.student_tasks(page, size, Some("active")).await
        })
        .await
        .unwrap();
    assert_eq!(snap.items.len(), 14);
    assert!(!snap.cursor.has_more);
    assert_eq!(snap.items[0].id, 1);
    assert_eq!(snap.items[13].id, 14);

    // Exhausted: no further fetch reaches the service.
    let snap = pager
        .load_next(|page, size| async move {
            api_ref.student_tasks(page, size, Some("active")).await
        })
        .await
        .unwrap();
    assert_eq!(snap.items.len(), 14);

    let calls = api.page_calls.lock().await.clone();
    assert_eq!(
        calls,
        vec![
            PageCall { page: 1, size: 10 },
            PageCall { page: 2, size: 10 }
        ]
    );
}

#[tokio::test]
async fn auth_expiry_stops_pagination_and_keeps_state() {
    let api = RecordingApi::default();
    api.task_pages.lock().await.extend([
        Ok(make_tasks(1, 10)),
        Err(ApiError::AuthExpired),
        Ok(make_tasks(11, 4)),
    ]);

    let pager: Pager<Task> = Pager::new(10);
    let api_ref = &api;

    pager
        .load_next(|p, s| async move { api_ref.teacher_tasks(p, s, None).await })
        .await
        .unwrap();

    let err = pager
        .load_next(|p, s| async move { api_ref.teacher_tasks(p, s, None).await })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AuthExpired));

    let snap = pager.snapshot();
    assert_eq!(snap.items.len(), 10);
    assert_eq!(snap.cursor.page, 2);
    assert!(snap.cursor.has_more);

    // After signing in again the same page is refetched.
    let snap = pager
        .load_next(|p, s| async move { api_ref.teacher_tasks(p, s, None).await })
        .await
        .unwrap();
    assert_eq!(snap.items.len(), 14);

    let pages: Vec<u32> = api.page_calls.lock().await.iter().map(|c| c.page).collect();
    assert_eq!(pages, vec![1, 2, 2]);
}

#[tokio::test]
async fn reconciles_roster_with_submissions() {
    let api = RecordingApi::default();
    api.roster.lock().await.push_back(Ok(vec![
        student(1, "2021003", "carol"),
        student(2, "", "btan"),
        student(3, "2021001", "amy"),
    ]));
    api.submissions.lock().await.push_back(Ok(vec![
        submission(10, 3),
        // Second record for the same student; the first one wins.
        submission(11, 3),
        // From a student who is not on this task's roster.
        submission(12, 99),
    ]));

    let (roster, submissions) =
        futures::try_join!(api.task_roster(5), api.task_submissions(5)).unwrap();
    let view = reconcile(&roster, &submissions);

    assert_eq!(view.entries.len(), 3);
    let order: Vec<u64> = view.entries.iter().map(|e| e.student.id).collect();
    assert_eq!(order, vec![3, 1, 2]);

    assert_eq!(view.submitted.len(), 1);
    assert_eq!(view.submitted[0].student.id, 3);
    assert_eq!(view.submitted[0].submission.as_ref().unwrap().id, 10);
    assert_eq!(view.unsubmitted.len(), 2);

    assert_eq!(view.stats.submit_rate, "33.3");
    assert_eq!(view.stats.progress, 33);
    assert_eq!(view.stats.unsubmitted_count, 2);
}

#[tokio::test]
async fn failed_roster_fetch_never_reaches_reconciliation() {
    let api = RecordingApi::default();
    api.roster
        .lock()
        .await
        .push_back(Err(ApiError::Transport("connection refused".into())));
    api.submissions
        .lock()
        .await
        .push_back(Ok(vec![submission(10, 1)]));

    let joined = futures::try_join!(api.task_roster(5), api.task_submissions(5));
    assert!(matches!(joined, Err(ApiError::Transport(_))));
}
