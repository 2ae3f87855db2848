use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use tasksync::api::{ApiClient, ApiError, TaskService};
use tasksync::config;
use tasksync::model::{Role, Submission, Task};
use tasksync::pager::Pager;
use tasksync::reconcile;
use tasksync::router;
use tasksync::session::{Session, SessionFile, SessionStore};
use tasksync::submit::{self, SubmitError};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Command-line client for the task-submission service"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and persist the session
    Login {
        #[arg(long)]
        username: String,
        /// Falls back to $TASKSYNC_PASSWORD when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the restored identity without calling the service
    Whoami,
    /// List tasks for the signed-in role
    Tasks {
        /// Filter by task status (draft|active|expired|completed)
        #[arg(long)]
        status: Option<String>,
        /// Walk every page instead of only the first
        #[arg(long)]
        all: bool,
    },
    /// Show one task, plus the own submission when signed in as a student
    Task {
        #[arg(long)]
        id: u64,
    },
    /// List the signed-in student's submission history
    Submissions {
        /// Walk every page instead of only the first
        #[arg(long)]
        all: bool,
    },
    /// Reconcile a task's roster with its submissions
    Status {
        #[arg(long)]
        id: u64,
    },
    /// Upload files and register them as the submission for a task
    Submit {
        #[arg(long)]
        task: u64,
        /// Files in submission order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let session = Arc::new(SessionStore::new());
    let session_file = SessionFile::new(cfg.app.resolved_session_file());
    if let Some(stored) = session_file.load().await {
        session.set(stored.token, stored.user);
    }

    let base_url = Url::parse(&cfg.server.base_url).context("server.base_url")?;
    let api = ApiClient::new(base_url, session.clone());

    let outcome = run(&args.command, &cfg, &api, session.as_ref(), &session_file).await;
    if let Err(err) = &outcome {
        if is_auth_expired(err) {
            // The gateway already dropped the in-memory half; drop the file too.
            if let Err(remove_err) = session_file.remove().await {
                warn!(
                    path = %session_file.path().display(),
                    ?remove_err,
                    "failed to remove session file"
                );
            }
        }
    }
    outcome
}

async fn run(
    command: &Command,
    cfg: &config::Config,
    api: &ApiClient,
    session: &SessionStore,
    session_file: &SessionFile,
) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            login(api, session, session_file, username, password.as_deref()).await
        }
        Command::Logout => logout(session, session_file).await,
        Command::Whoami => whoami(session),
        Command::Tasks { status, all } => {
            list_tasks(api, session, cfg.app.page_size, status.as_deref(), *all).await
        }
        Command::Task { id } => show_task(api, session, *id).await,
        Command::Submissions { all } => {
            list_submissions(api, session, cfg.app.page_size, *all).await
        }
        Command::Status { id } => show_status(api, *id).await,
        Command::Submit { task, files } => do_submit(api, *task, files).await,
    }
}

fn is_auth_expired(err: &anyhow::Error) -> bool {
    if let Some(api_err) = err.downcast_ref::<ApiError>() {
        return matches!(api_err, ApiError::AuthExpired);
    }
    if let Some(submit_err) = err.downcast_ref::<SubmitError>() {
        return submit_err.is_auth_expired();
    }
    false
}

fn current_role(session: &SessionStore) -> Result<Role> {
    session
        .current()
        .map(|s| s.user.role)
        .ok_or_else(|| anyhow!("not signed in; run `tasksync login` first"))
}

async fn login(
    api: &ApiClient,
    session: &SessionStore,
    session_file: &SessionFile,
    username: &str,
    password: Option<&str>,
) -> Result<()> {
    let username = username.trim();
    if username.is_empty() {
        return Err(anyhow!("username must not be empty"));
    }
    let password = match password {
        Some(p) => p.to_string(),
        None => std::env::var("TASKSYNC_PASSWORD")
            .map_err(|_| anyhow!("provide --password or set TASKSYNC_PASSWORD"))?,
    };
    if password.is_empty() {
        return Err(anyhow!("password must not be empty"));
    }

    let data = api.login(username, &password).await?;
    let new_session = Session {
        token: data.token,
        user: data.user,
    };
    session.set(new_session.token.clone(), new_session.user.clone());
    session_file
        .save(&new_session)
        .await
        .context("failed to persist session")?;

    info!(
        user = %new_session.user.username,
        role = new_session.user.role.as_str(),
        "signed in"
    );
    println!(
        "signed in as {} ({})",
        new_session.user.display_name(),
        new_session.user.role.as_str()
    );
    println!(
        "next: {}",
        router::landing(session.current().as_ref()).as_str()
    );
    Ok(())
}

async fn logout(session: &SessionStore, session_file: &SessionFile) -> Result<()> {
    session.clear();
    session_file
        .remove()
        .await
        .context("failed to remove session file")?;
    println!("signed out");
    println!(
        "next: {}",
        router::landing(session.current().as_ref()).as_str()
    );
    Ok(())
}

fn whoami(session: &SessionStore) -> Result<()> {
    match session.current() {
        Some(s) => {
            println!("{} ({})", s.user.display_name(), s.user.role.as_str());
            if !s.user.student_id.is_empty() {
                println!("student number: {}", s.user.student_id);
            }
            println!("next: {}", router::landing(Some(&s)).as_str());
        }
        None => {
            println!("not signed in");
            println!("next: {}", router::landing(None).as_str());
        }
    }
    Ok(())
}

async fn list_tasks(
    api: &ApiClient,
    session: &SessionStore,
    page_size: u32,
    status: Option<&str>,
    all: bool,
) -> Result<()> {
    let role = current_role(session)?;
    let pager: Pager<Task> = Pager::new(page_size);
    loop {
        let snapshot = pager
            .load_next(|page, size| async move {
                match role {
                    Role::Student => api.student_tasks(page, size, status).await,
                    Role::Teacher => api.teacher_tasks(page, size, status).await,
                }
            })
            .await?;
        if !all || !snapshot.cursor.has_more {
            print_tasks(&snapshot.items, role);
            return Ok(());
        }
    }
}

fn print_tasks(tasks: &[Task], role: Role) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for task in tasks {
        match role {
            Role::Student => println!(
                "#{:<4} {:<9} {} (due {}){}",
                task.id,
                task.status.as_str(),
                task.title,
                task.end_time.format("%Y-%m-%d %H:%M"),
                if task.submitted { "  [submitted]" } else { "" },
            ),
            Role::Teacher => println!(
                "#{:<4} {:<9} {} ({}/{} submitted, due {})",
                task.id,
                task.status.as_str(),
                task.title,
                task.submitted_count,
                task.total_students,
                task.end_time.format("%Y-%m-%d %H:%M"),
            ),
        }
    }
    match role {
        Role::Student => {
            let pending = tasks.iter().filter(|t| !t.submitted).count();
            println!("{} task(s), {} pending", tasks.len(), pending);
        }
        Role::Teacher => println!("{} task(s)", tasks.len()),
    }
}

async fn show_task(api: &ApiClient, session: &SessionStore, id: u64) -> Result<()> {
    let role = current_role(session)?;
    let task = api.task_detail(id).await?;

    println!("#{} {}", task.id, task.title);
    println!("status: {}", task.status.as_str());
    println!(
        "window: {} .. {}",
        task.start_time.format("%Y-%m-%d %H:%M"),
        task.end_time.format("%Y-%m-%d %H:%M")
    );
    if !task.description.is_empty() {
        println!("{}", task.description);
    }
    if !task.allowed_formats.is_empty() {
        println!("formats: {}", task.allowed_formats.join(", "));
    }
    if let Some(teacher) = &task.teacher {
        println!("teacher: {}", teacher.display_name());
    }

    if role == Role::Student {
        match api.my_submission(id).await {
            Ok(sub) => {
                println!("your submission: {}", submission_line(&sub));
            }
            Err(ApiError::App(msg)) => println!("no submission yet ({})", msg),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

async fn list_submissions(
    api: &ApiClient,
    session: &SessionStore,
    page_size: u32,
    all: bool,
) -> Result<()> {
    current_role(session)?;
    let pager: Pager<Submission> = Pager::new(page_size);
    loop {
        let snapshot = pager
            .load_next(|page, size| async move { api.my_submissions(page, size).await })
            .await?;
        if !all || !snapshot.cursor.has_more {
            if snapshot.items.is_empty() {
                println!("no submissions");
            } else {
                for sub in &snapshot.items {
                    println!("{}", submission_line(sub));
                }
                println!("{} submission(s)", snapshot.items.len());
            }
            return Ok(());
        }
    }
}

fn submission_line(sub: &Submission) -> String {
    let title = sub.task.as_ref().map(|t| t.title.as_str()).unwrap_or("-");
    let when = sub
        .submitted_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into());
    let score = sub
        .score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "#{:<4} {:<9} {} at {} score {}",
        sub.id,
        sub.status.as_str(),
        title,
        when,
        score
    )
}

async fn show_status(api: &ApiClient, id: u64) -> Result<()> {
    let (roster, submissions) = futures::try_join!(api.task_roster(id), api.task_submissions(id))?;
    let view = reconcile::reconcile(&roster, &submissions);

    for entry in &view.entries {
        let mark = if entry.has_submitted { "x" } else { " " };
        let number = if entry.student.student_id.is_empty() {
            entry.student.username.as_str()
        } else {
            entry.student.student_id.as_str()
        };
        let when = entry
            .submission
            .as_ref()
            .and_then(|s| s.submitted_at)
            .map(|t| t.format("%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "[{}] {:<12} {:<12} {}",
            mark,
            number,
            entry.student.display_name(),
            when
        );
    }
    println!(
        "{} submitted / {} missing of {}; rate {}% (progress {}%)",
        view.submitted.len(),
        view.unsubmitted.len(),
        view.entries.len(),
        view.stats.submit_rate,
        view.stats.progress
    );
    Ok(())
}

async fn do_submit(api: &ApiClient, task_id: u64, files: &[PathBuf]) -> Result<()> {
    let submission = submit::submit_files(api, task_id, files).await?;
    println!(
        "submitted task #{} with {} file(s): status {}",
        task_id,
        submission.files.len(),
        submission.status.as_str()
    );
    Ok(())
}
