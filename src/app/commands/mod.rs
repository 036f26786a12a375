//! Subcommand handlers.

mod account;
mod tasks;

use std::fmt;
use std::io::{self, BufRead, Write};

use todo_client::api::TodoClient;
use todo_client::error::ApiError;
use todo_client::render::Renderer;

use crate::cli::Command;

/// Failure of a single command invocation.
#[derive(Debug)]
pub(crate) enum CommandError {
    Api(ApiError),
    /// Terminal input could not be read, or the user's answers disagreed.
    Input(String),
}

impl From<ApiError> for CommandError {
    fn from(value: ApiError) -> Self {
        Self::Api(value)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(err) => write!(f, "{err}"),
            Self::Input(msg) => f.write_str(msg),
        }
    }
}

pub(crate) type CommandResult = Result<(), CommandError>;

pub(crate) async fn dispatch(
    renderer: &Renderer,
    client: &TodoClient,
    command: Command,
) -> CommandResult {
    match command {
        // Handled before config is loaded.
        Command::Init { .. } => Ok(()),
        Command::Login { email } => account::login(renderer, client, email).await,
        Command::Register { name, email } => account::register(renderer, client, name, email).await,
        Command::Logout => account::logout(renderer, client).await,
        Command::Whoami => account::whoami(renderer, client).await,
        Command::ForgotPassword { email } => {
            account::forgot_password(renderer, client, &email).await
        }
        Command::ResetPassword { token } => account::reset_password(renderer, client, &token).await,
        Command::Profile {
            name,
            email,
            change_password,
        } => account::profile(renderer, client, name, email, change_password).await,
        Command::List {
            status,
            priority,
            search,
            sort,
            order,
            page,
            limit,
        } => {
            let filter = todo_client::api::TaskFilter {
                status: status.map(Into::into),
                priority: priority.map(Into::into),
                search: None,
                sort_by: sort,
                order: order.map(Into::into),
                page,
                limit,
            };
            tasks::list(renderer, client, filter, search).await
        }
        Command::Show { id } => tasks::show(renderer, client, &id).await,
        Command::Add {
            title,
            description,
            priority,
            due,
        } => {
            let task = todo_client::api::NewTask {
                title,
                description,
                priority: priority.map(Into::into),
                due_date: due,
            };
            tasks::add(renderer, client, &task).await
        }
        Command::Edit {
            id,
            title,
            description,
            priority,
        } => {
            let update = todo_client::api::TaskUpdate {
                title,
                description,
                priority: priority.map(Into::into),
                ..Default::default()
            };
            tasks::edit(renderer, client, &id, &update).await
        }
        Command::Toggle { id } => tasks::toggle(renderer, client, &id).await,
        Command::Rm { id } => tasks::remove(renderer, client, &id).await,
        Command::BulkDone { ids } => tasks::bulk_done(renderer, client, &ids).await,
        Command::BulkRm { ids } => tasks::bulk_remove(renderer, client, &ids).await,
        Command::Stats => tasks::stats(renderer, client).await,
    }
}

/// Read one line from stdin after printing `label` to stderr.
pub(crate) fn prompt_line(label: &str) -> Result<String, CommandError> {
    let mut stderr = io::stderr();
    write!(stderr, "{label}")
        .and_then(|_| stderr.flush())
        .map_err(|e| CommandError::Input(format!("failed to write prompt: {e}")))?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CommandError::Input(format!("failed to read input: {e}")))?;
    Ok(line.trim().to_string())
}

/// Read a password without echo.
pub(crate) fn prompt_secret(label: &str) -> Result<String, CommandError> {
    rpassword::prompt_password(label)
        .map_err(|e| CommandError::Input(format!("failed to read password: {e}")))
}

/// Read a new password twice and require both entries to match.
pub(crate) fn prompt_new_secret(label: &str) -> Result<String, CommandError> {
    let first = prompt_secret(label)?;
    let second = prompt_secret("Confirm password: ")?;
    if first != second {
        return Err(CommandError::Input("passwords do not match".to_string()));
    }
    Ok(first)
}
