//! CLI argument parsing via clap.

use clap::{Parser, Subcommand, ValueEnum};

use todo_client::api::{SortOrder, TaskPriority, TaskStatus};

/// Manage your tasks from the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "todo",
    version,
    long_version = todo_client::build_info::LONG_VERSION,
    after_help = todo_client::build_info::HELP_BUILD_METADATA
)]
pub struct Args {
    /// Path to config file (default: ./todo.toml or ~/.config/todo/todo.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Override API base URL.
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Disable color output.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the default config to ~/.config/todo/todo.toml.
    Init {
        /// Overwrite an existing config after backing it up.
        #[arg(long)]
        force: bool,
    },
    /// Log in; the password is prompted without echo.
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// End the session and clear stored tokens.
    Logout,
    /// Show the logged-in account.
    Whoami,
    /// Request a password-reset email.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Set a new password using a reset token.
    ResetPassword {
        #[arg(long)]
        token: String,
    },
    /// List tasks.
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        /// Full-text search.
        #[arg(long)]
        search: Option<String>,
        /// Field to sort by (e.g. createdAt, dueDate, priority).
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, value_enum)]
        order: Option<OrderArg>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one task.
    Show { id: String },
    /// Create a task.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        /// Due date (ISO 8601).
        #[arg(long)]
        due: Option<String>,
    },
    /// Change fields of a task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
    },
    /// Flip a task between active and completed.
    Toggle { id: String },
    /// Delete a task.
    Rm { id: String },
    /// Mark several tasks completed.
    BulkDone {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete several tasks.
    BulkRm {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show task counts.
    Stats,
    /// Show the logged-in account's profile, or update it when flags are given.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Prompt for the current and a new password.
        #[arg(long)]
        change_password: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Active,
    Completed,
}

impl From<StatusArg> for TaskStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Active => Self::Active,
            StatusArg::Completed => Self::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for TaskPriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Asc => Self::Asc,
            OrderArg::Desc => Self::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, Command, StatusArg};
    use clap::Parser;

    #[test]
    fn list_parses_filters() {
        let args = Args::parse_from(["todo", "list", "--status", "active", "--page", "2"]);
        match args.command {
            Command::List { status, page, .. } => {
                assert!(matches!(status, Some(StatusArg::Active)));
                assert_eq!(page, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = Args::parse_from(["todo", "stats", "--no-color", "--base-url", "http://x"]);
        assert!(args.no_color);
        assert_eq!(args.base_url.as_deref(), Some("http://x"));
    }

    #[test]
    fn bulk_commands_require_ids() {
        assert!(Args::try_parse_from(["todo", "bulk-rm"]).is_err());
        let args = Args::parse_from(["todo", "bulk-done", "a", "b"]);
        assert!(matches!(args.command, Command::BulkDone { ids } if ids.len() == 2));
    }
}
