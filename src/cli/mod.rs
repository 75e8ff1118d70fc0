use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use clap::{Args, Subcommand};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::error;

use crate::board::{
    Board, Confirmation, DragGesture, DropOutcome, IntentRejection, PolicyAction, StatusForm,
};
use crate::lanes::Lanes;
use crate::notification::{BufferedNotifier, Notification};
use crate::types::{Priority, Task, TaskDraft, TaskId, TaskStatus, User};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// Show the three lanes.
    Board,
    /// Move a task the way a drag-and-drop does: local first, then the server.
    Drop(DropArgs),
    /// Change a task's status on the server, then locally.
    Status(StatusArgs),
    /// Edit priority and status together.
    Edit(EditArgs),
    Create(CreateArgs),
    Delete(DeleteArgs),
    Users,
}

#[derive(Debug, Clone, Args)]
pub struct DropArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: i64,

    /// Lane id (A, F or P). Omit to simulate a drop outside every lane.
    #[arg(long, value_name = "LANE")]
    pub lane: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: i64,

    #[arg(long, value_name = "STATUS")]
    pub status: String,
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: i64,

    #[arg(long, value_name = "PRIORITY")]
    pub priority: Option<String>,

    #[arg(long, value_name = "STATUS")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    #[arg(long, value_name = "TEXT")]
    pub name: String,

    #[arg(long, value_name = "TEXT", default_value = "")]
    pub description: String,

    #[arg(long, value_name = "SECTOR")]
    pub sector: String,

    #[arg(long, value_name = "PRIORITY", default_value = "B")]
    pub priority: String,

    #[arg(long, value_name = "USER_ID")]
    pub assignee: i64,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: i64,
}

/// Runs one command and prints its result. Returns the process exit code.
/// Runs one command and prints its result. `log_file` is where this run's
/// trace goes; failures point at it so the full error chain can be found.
pub async fn run(
    board: &Board,
    console: &BufferedNotifier,
    command: RootCommand,
    json_output: bool,
    quiet: bool,
    log_file: Option<&Path>,
) -> i32 {
    let result = execute(board, command).await;
    let notifications = console.drain();
    match result {
        Ok(output) => {
            print_success(output, &notifications, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, &notifications, json_output, log_file);
            err.exit_code
        }
    }
}

struct CommandOutput {
    command: &'static str,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

async fn execute(board: &Board, command: RootCommand) -> CliResult<CommandOutput> {
    match command {
        RootCommand::Board => show_board(board).await,
        RootCommand::Drop(args) => drop_task(board, args).await,
        RootCommand::Status(args) => change_status(board, args).await,
        RootCommand::Edit(args) => edit_task(board, args).await,
        RootCommand::Create(args) => create_task(board, args).await,
        RootCommand::Delete(args) => delete_task(board, args).await,
        RootCommand::Users => list_users(board).await,
    }
}

async fn show_board(board: &Board) -> CliResult<CommandOutput> {
    board.load().await.map_err(classify_remote_error)?;
    let lanes = board.lanes();

    Ok(CommandOutput {
        command: "board",
        data: lanes_json(&lanes),
        text: render_board_text(&lanes),
    })
}

async fn drop_task(board: &Board, args: DropArgs) -> CliResult<CommandOutput> {
    board.load().await.map_err(classify_remote_error)?;
    let task_id = TaskId(args.id);
    let outcome = board
        .gesture_mapper()
        .on_drag_end(DragGesture::new(task_id, args.lane));

    let (data, text) = match outcome {
        DropOutcome::NoDropTarget => (
            json!({ "task_id": task_id, "outcome": "no_drop_target" }),
            "Dropped outside every lane; nothing changed.".to_string(),
        ),
        DropOutcome::SameLane(status) => (
            json!({ "task_id": task_id, "outcome": "same_lane", "status": status.code() }),
            format!("Task {task_id} is already in {status}."),
        ),
        DropOutcome::Rejected(rejection) => return Err(rejection_error(rejection)),
        DropOutcome::Applied {
            intent,
            confirmation,
        } => {
            let confirmation = confirmation.await.map_err(runtime_error)?;
            match confirmation {
                Confirmation::Confirmed => (
                    json!({
                        "task_id": task_id,
                        "outcome": "confirmed",
                        "from": intent.from.map(TaskStatus::code),
                        "status": intent.to.code()
                    }),
                    format!("Moved task {task_id} to {}.", intent.to),
                ),
                Confirmation::Failed(action) => {
                    let local = board.store().get(task_id).map(|task| task.status);
                    return Err(remote_error(
                        format!("server did not accept moving task {task_id} to {}", intent.to),
                        Some(json!({
                            "policy": board.policy().as_str(),
                            "policy_action": policy_action_str(action),
                            "local_status": local
                        })),
                    ));
                }
            }
        }
    };

    Ok(CommandOutput {
        command: "drop",
        data,
        text,
    })
}

async fn change_status(board: &Board, args: StatusArgs) -> CliResult<CommandOutput> {
    let status = parse_status(&args.status)?;
    board.load().await.map_err(classify_remote_error)?;

    let form = StatusForm::new(TaskId(args.id), Some(status));
    let intent = board
        .status_editor()
        .submit(&form)
        .await
        .map_err(classify_remote_error)?;

    Ok(CommandOutput {
        command: "status",
        data: json!({
            "task_id": intent.task_id,
            "from": intent.from.map(TaskStatus::code),
            "status": intent.to.code()
        }),
        text: format!("Task {} is now {}.", intent.task_id, intent.to),
    })
}

async fn edit_task(board: &Board, args: EditArgs) -> CliResult<CommandOutput> {
    let priority = args.priority.as_deref().map(parse_priority).transpose()?;
    let status = args.status.as_deref().map(parse_status).transpose()?;
    if priority.is_none() && status.is_none() {
        return Err(usage_error(
            "NOTHING_TO_EDIT",
            "pass --priority and/or --status",
        ));
    }

    board.load().await.map_err(classify_remote_error)?;
    let editor = board.task_editor();
    let mut form = editor
        .open(TaskId(args.id))
        .await
        .map_err(classify_remote_error)?;
    if let Some(priority) = priority {
        form.priority = priority;
    }
    if let Some(status) = status {
        form.status = status;
    }
    editor.save(&form).await.map_err(classify_remote_error)?;

    Ok(CommandOutput {
        command: "edit",
        data: json!({
            "task_id": form.task_id,
            "priority": form.priority.code(),
            "status": form.status.code()
        }),
        text: format!(
            "Task {} saved: {} priority, {}.",
            form.task_id,
            form.priority.label(),
            form.status
        ),
    })
}

async fn create_task(board: &Board, args: CreateArgs) -> CliResult<CommandOutput> {
    let priority = parse_priority(&args.priority)?;
    if args.name.trim().is_empty() {
        return Err(usage_error("INVALID_NAME", "task name cannot be empty"));
    }

    let draft = TaskDraft::new(
        args.name.trim(),
        args.description,
        args.sector,
        priority,
        args.assignee,
    );
    let task = board
        .create_task(&draft)
        .await
        .map_err(classify_remote_error)?;

    Ok(CommandOutput {
        command: "create",
        data: json!({ "task": task_json(&task) }),
        text: format!("Created task {}.", task.id),
    })
}

async fn delete_task(board: &Board, args: DeleteArgs) -> CliResult<CommandOutput> {
    let task_id = TaskId(args.id);
    board
        .delete_task(task_id)
        .await
        .map_err(classify_remote_error)?;

    Ok(CommandOutput {
        command: "delete",
        data: json!({ "task_id": task_id, "remaining": board.store().snapshot().len() }),
        text: format!("Deleted task {task_id}."),
    })
}

async fn list_users(board: &Board) -> CliResult<CommandOutput> {
    let users = board.users().await.map_err(classify_remote_error)?;

    Ok(CommandOutput {
        command: "users",
        data: json!({
            "users": users
                .iter()
                .map(|user| json!({ "id": user.id, "name": user.name }))
                .collect::<Vec<_>>()
        }),
        text: render_users_text(&users),
    })
}

fn parse_status(raw: &str) -> CliResult<TaskStatus> {
    TaskStatus::from_str(raw).map_err(|()| {
        usage_error(
            "INVALID_STATUS",
            format!("'{raw}' is not a status; use A, F or P"),
        )
    })
}

fn parse_priority(raw: &str) -> CliResult<Priority> {
    Priority::from_str(raw).map_err(|()| {
        usage_error(
            "INVALID_PRIORITY",
            format!("'{raw}' is not a priority; use B, M or A"),
        )
    })
}

fn policy_action_str(action: PolicyAction) -> &'static str {
    match action {
        PolicyAction::Kept => "kept",
        PolicyAction::Reverted => "reverted",
        PolicyAction::Superseded => "superseded",
    }
}

fn task_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "name": task.name,
        "description": task.description,
        "sector": task.sector,
        "priority": task.priority.code(),
        "status": task.status,
        "assignee": task.assignee,
        "assignee_name": task.assignee_name
    })
}

fn lanes_json(lanes: &Lanes) -> Value {
    let lanes = lanes
        .iter()
        .map(|(status, tasks)| {
            json!({
                "id": status.code(),
                "label": status.label(),
                "tasks": tasks.iter().map(task_json).collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();
    json!({ "lanes": lanes })
}

fn render_board_text(lanes: &Lanes) -> String {
    if lanes.visible_count() == 0 {
        return "No tasks found.".to_string();
    }

    let headers = ["Lane", "ID", "Priority", "Sector", "Assignee", "Description"];
    let rows = lanes
        .iter()
        .flat_map(|(status, tasks)| {
            tasks.iter().map(move |task| {
                vec![
                    status.label().to_string(),
                    task.id.to_string(),
                    task.priority.label().to_string(),
                    task.sector.clone(),
                    task.assignee_name.clone().unwrap_or_default(),
                    task.description.replace('\n', " "),
                ]
            })
        })
        .collect::<Vec<_>>();

    render_text_table(&headers, &rows)
}

fn render_users_text(users: &[User]) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }
    let rows = users
        .iter()
        .map(|user| vec![user.id.to_string(), user.name.clone()])
        .collect::<Vec<_>>();
    render_text_table(&["ID", "Name"], &rows)
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(*width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let render_row = |cells: Vec<&str>| {
        format!(
            "| {} |",
            cells
                .iter()
                .enumerate()
                .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
                .collect::<Vec<_>>()
                .join(" | ")
        )
    };

    let mut lines = vec![border.clone(), render_row(headers.to_vec()), border.clone()];
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str).collect()));
    }
    lines.push(border);
    lines.join("\n")
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 3,
        code,
        message: message.into(),
        details: None,
    }
}

fn conflict_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 4,
        code,
        message: message.into(),
        details: None,
    }
}

fn remote_error(message: impl Into<String>, details: Option<Value>) -> CliError {
    CliError {
        exit_code: 5,
        code: "REMOTE_ERROR",
        message: message.into(),
        details,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 6,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn rejection_error(rejection: IntentRejection) -> CliError {
    match rejection {
        IntentRejection::UnknownLane(_) => usage_error("INVALID_LANE", rejection.to_string()),
        IntentRejection::UnknownTask(_) => not_found_error("TASK_NOT_FOUND", rejection.to_string()),
        IntentRejection::NotOnBoard(_) => conflict_error("TASK_NOT_ON_BOARD", rejection.to_string()),
    }
}

/// Maps a gateway failure onto a CLI error; a 404 anywhere in the chain means the task is gone.
fn classify_remote_error(err: anyhow::Error) -> CliError {
    let status = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .and_then(reqwest::Error::status);
    let message = format_anyhow_error_chain(&err);

    match status {
        Some(StatusCode::NOT_FOUND) => not_found_error("TASK_NOT_FOUND", message),
        Some(status) => remote_error(message, Some(json!({ "http_status": status.as_u16() }))),
        None => remote_error(message, None),
    }
}

fn notifications_json(notifications: &[Notification]) -> Value {
    serde_json::to_value(notifications).unwrap_or_else(|_| Value::Array(Vec::new()))
}

fn print_success(
    output: CommandOutput,
    notifications: &[Notification],
    json_output: bool,
    quiet: bool,
) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "data": output.data,
            "notifications": notifications_json(notifications)
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", payload),
        }
        return;
    }

    if quiet {
        return;
    }

    for notification in notifications.iter().filter(|n| n.is_error()) {
        eprintln!("warning: {}", notification.message);
    }
    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn error_payload(err: &CliError, notifications: &[Notification], log_file: Option<&Path>) -> Value {
    json!({
        "schema_version": SCHEMA_VERSION,
        "error": {
            "code": err.code,
            "message": err.message,
            "details": err.details
        },
        "notifications": notifications_json(notifications),
        "log_file": log_file.map(|path| path.display().to_string())
    })
}

fn print_error(
    err: &CliError,
    notifications: &[Notification],
    json_output: bool,
    log_file: Option<&Path>,
) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = error_payload(err, notifications, log_file);
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{}", payload),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
    if let Some(path) = log_file {
        eprintln!("log: {}", path.display());
    }
}

fn format_anyhow_error_chain(err: &anyhow::Error) -> String {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if seen.insert(text.clone()) {
            parts.push(text);
        }
    }

    parts.join(": ")
}
