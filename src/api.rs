//! HTTP gateway to the task-submission service.
//!
//! Every remote call funnels through one dispatch path that attaches the
//! bearer credential, unwraps the `{code, data, msg}` envelope, and maps the
//! outcome onto [`ApiError`]. Callers never see raw transport details.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{
    FileRef, LoginData, RosterData, Submission, SubmissionPage, Task, TaskPage, UserProfile,
};
use crate::session::SessionStore;

/// Envelope code for a successful call.
const CODE_OK: i64 = 200;
/// Envelope code for a rejected or expired credential.
const CODE_AUTH_EXPIRED: i64 = 401;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a usable envelope (connectivity, HTTP
    /// failure, malformed body). No structured message is available.
    #[error("network request failed: {0}")]
    Transport(String),
    /// The service answered with a business refusal; carries its `msg`.
    #[error("{0}")]
    App(String),
    /// The credential is no longer valid. The in-memory session has already
    /// been torn down; callers must not retry.
    #[error("session expired, please log in again")]
    AuthExpired,
    /// Rejected locally before any network traffic.
    #[error("invalid input: {0}")]
    Validation(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    msg: String,
}

/// Remote operations of the service. The seam lets tests substitute a
/// recording fake for the real client.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> ApiResult<LoginData>;

    async fn user_info(&self) -> ApiResult<UserProfile>;

    async fn student_tasks(
        &self,
        page: u32,
        size: u32,
        status: Option<&str>,
    ) -> ApiResult<Vec<Task>>;

    async fn teacher_tasks(
        &self,
        page: u32,
        size: u32,
        status: Option<&str>,
    ) -> ApiResult<Vec<Task>>;

    async fn task_detail(&self, task_id: u64) -> ApiResult<Task>;

    async fn task_roster(&self, task_id: u64) -> ApiResult<Vec<UserProfile>>;

    async fn task_submissions(&self, task_id: u64) -> ApiResult<Vec<Submission>>;

    async fn my_submission(&self, task_id: u64) -> ApiResult<Submission>;

    async fn my_submissions(&self, page: u32, size: u32) -> ApiResult<Vec<Submission>>;

    async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> ApiResult<FileRef>;

    async fn register_submission(&self, task_id: u64, files: &[FileRef]) -> ApiResult<Submission>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(mut base_url: Url, session: Arc<SessionStore>) -> Self {
        // Joining relative endpoint paths requires the base to end in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent("tasksync/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            session,
        }
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Transport(format!("invalid endpoint {}: {}", path, err)))
    }

    /// Assemble a request, attaching the bearer credential iff a session is
    /// present. Kept separate from dispatch so tests can inspect it.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ApiResult<reqwest::Request> {
        let url = self.endpoint(path)?;
        let mut builder = self.http.request(method, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = self.session.token() {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
            .build()
            .map_err(|err| ApiError::Transport(format!("failed to build request: {}", err)))
    }

    /// Classify a response body into exactly one outcome. A credential
    /// rejection tears down the session before the error is returned, so
    /// every caller observes the logged-out state immediately.
    fn accept(&self, body: &str) -> ApiResult<Value> {
        let envelope: Envelope = serde_json::from_str(body)
            .map_err(|err| ApiError::Transport(format!("malformed response: {}", err)))?;
        match envelope.code {
            CODE_OK => Ok(envelope.data),
            CODE_AUTH_EXPIRED => {
                warn!("credential rejected by server; clearing session");
                self.session.clear();
                Err(ApiError::AuthExpired)
            }
            code => {
                let msg = if envelope.msg.is_empty() {
                    "request failed".to_string()
                } else {
                    envelope.msg
                };
                debug!(code, %msg, "service refused request");
                Err(ApiError::App(msg))
            }
        }
    }

    async fn read_envelope(&self, response: reqwest::Response) -> ApiResult<Value> {
        let status = response.status();
        let url = response.url().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %url, body, "http failure");
            return Err(ApiError::Transport(format!("server returned {}", status)));
        }
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        self.accept(&body)
    }

    async fn dispatch(&self, request: reqwest::Request) -> ApiResult<Value> {
        debug!(method = %request.method(), url = %request.url(), "dispatching request");
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        self.read_envelope(response).await
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Value> {
        let request = self.build_request(Method::GET, path, query, None)?;
        self.dispatch(request).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> ApiResult<Value> {
        let request = self.build_request(Method::POST, path, &[], Some(body))?;
        self.dispatch(request).await
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> ApiResult<T> {
    serde_json::from_value(data)
        .map_err(|err| ApiError::Transport(format!("unexpected response shape: {}", err)))
}

fn page_query(page: u32, size: u32, status: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("page", page.to_string()), ("size", size.to_string())];
    if let Some(status) = status {
        query.push(("status", status.to_string()));
    }
    query
}

#[async_trait]
impl TaskService for ApiClient {
    async fn login(&self, username: &str, password: &str) -> ApiResult<LoginData> {
        let body = json!({ "username": username, "password": password });
        let data = self.post_json("auth/login", &body).await?;
        let login: LoginData = decode(data)?;
        if login.token.is_empty() {
            return Err(ApiError::Transport("login response missing token".into()));
        }
        Ok(login)
    }

    async fn user_info(&self) -> ApiResult<UserProfile> {
        let data = self.get_json("user/info", &[]).await?;
        decode(data)
    }

    async fn student_tasks(
        &self,
        page: u32,
        size: u32,
        status: Option<&str>,
    ) -> ApiResult<Vec<Task>> {
        let data = self
            .get_json("tasks/student", &page_query(page, size, status))
            .await?;
        let page: TaskPage = decode(data)?;
        Ok(page.tasks)
    }

    async fn teacher_tasks(
        &self,
        page: u32,
        size: u32,
        status: Option<&str>,
    ) -> ApiResult<Vec<Task>> {
        let data = self.get_json("tasks", &page_query(page, size, status)).await?;
        let page: TaskPage = decode(data)?;
        Ok(page.tasks)
    }

    async fn task_detail(&self, task_id: u64) -> ApiResult<Task> {
        let data = self.get_json(&format!("tasks/{}", task_id), &[]).await?;
        decode(data)
    }

    async fn task_roster(&self, task_id: u64) -> ApiResult<Vec<UserProfile>> {
        let data = self
            .get_json(&format!("tasks/{}/students", task_id), &[])
            .await?;
        let roster: RosterData = decode(data)?;
        Ok(roster.students)
    }

    async fn task_submissions(&self, task_id: u64) -> ApiResult<Vec<Submission>> {
        let data = self
            .get_json(&format!("tasks/{}/submissions", task_id), &[])
            .await?;
        let page: SubmissionPage = decode(data)?;
        Ok(page.submissions)
    }

    async fn my_submission(&self, task_id: u64) -> ApiResult<Submission> {
        let data = self
            .get_json(&format!("tasks/{}/submission", task_id), &[])
            .await?;
        decode(data)
    }

    async fn my_submissions(&self, page: u32, size: u32) -> ApiResult<Vec<Submission>> {
        let data = self
            .get_json("submissions", &page_query(page, size, None))
            .await?;
        let page: SubmissionPage = decode(data)?;
        Ok(page.submissions)
    }

    async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> ApiResult<FileRef> {
        let url = self.endpoint("files/upload")?;
        let part = reqwest::multipart::Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|err| {
                ApiError::Validation(format!("invalid content type {}: {}", content_type, err))
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut builder = self.http.post(url).multipart(form);
        if let Some(token) = self.session.token() {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        debug!(file_name, content_type, "uploading file");
        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let data = self.read_envelope(response).await?;
        decode(data)
    }

    async fn register_submission(&self, task_id: u64, files: &[FileRef]) -> ApiResult<Submission> {
        let body = json!({ "files": files });
        let data = self
            .post_json(&format!("tasks/{}/submit", task_id), &body)
            .await?;
        decode(data)
    }
}
