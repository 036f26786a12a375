//! Terminal output renderer for command results and status messages.
//!
//! Data goes to stdout; status, warnings and errors go to stderr so output
//! stays pipeable.

use crossterm::style::{Color, Stylize};

use crate::api::{Task, TaskPage, TaskPriority, TaskStats, TaskStatus, UserProfile};

const INDENT: &str = "  ";
const LABEL_WARNING: &str = "warning:";
const LABEL_ERROR: &str = "error:";
const GLYPH_SECTION: &str = "•";

/// Stateless renderer; `color` toggles ANSI styling.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Print a small section header in status-style output.
    pub fn section(&self, title: &str) {
        if self.color {
            eprintln!(
                "{} {}",
                GLYPH_SECTION.with(Color::DarkGrey),
                title.with(Color::Cyan).bold()
            );
        } else {
            eprintln!("{title}:");
        }
    }

    /// Print a key/value line under a status section.
    pub fn field(&self, key: &str, value: &str) {
        if self.color {
            eprintln!(
                "{INDENT}{} {}",
                format!("{key}:").with(Color::DarkGrey),
                value.with(Color::White)
            );
        } else {
            eprintln!("{INDENT}{key}: {value}");
        }
    }

    pub fn detail(&self, text: &str) {
        eprintln!("{INDENT}{text}");
    }

    /// Print a success/lifecycle line.
    pub fn activity(&self, text: &str) {
        if self.color {
            eprintln!("{} {}", GLYPH_SECTION.with(Color::Green), text.bold());
        } else {
            eprintln!("{text}");
        }
    }

    pub fn warn(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", LABEL_WARNING.with(Color::Yellow).bold());
        } else {
            eprintln!("{LABEL_WARNING} {msg}");
        }
    }

    pub fn error(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", LABEL_ERROR.with(Color::Red).bold());
        } else {
            eprintln!("{LABEL_ERROR} {msg}");
        }
    }

    /// One task per line on stdout.
    pub fn task_line(&self, task: &Task) {
        println!("{}", self.format_task_line(task));
    }

    pub fn task_page(&self, page: &TaskPage) {
        if page.tasks.is_empty() {
            self.detail("no tasks");
            return;
        }
        for task in &page.tasks {
            self.task_line(task);
        }
        if page.pages > 1 || page.total > page.tasks.len() {
            self.detail(&format!(
                "page {}/{} ({} tasks total)",
                page.page, page.pages, page.total
            ));
        }
    }

    pub fn task_detail(&self, task: &Task) {
        self.task_line(task);
        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            println!("{INDENT}{description}");
        }
        if let Some(due) = &task.due_date {
            println!("{INDENT}due: {due}");
        }
        if let Some(created) = &task.created_at {
            println!("{INDENT}created: {created}");
        }
    }

    pub fn stats(&self, stats: &TaskStats) {
        println!("total: {}", stats.total);
        println!("active: {}", stats.active);
        println!("completed: {}", stats.completed);
        if stats.overdue > 0 {
            println!("overdue: {}", stats.overdue);
        }
        for (priority, count) in &stats.by_priority {
            println!("{priority}: {count}");
        }
    }

    pub fn profile(&self, profile: &UserProfile) {
        println!("id: {}", profile.id);
        println!("name: {}", profile.name);
        println!("email: {}", profile.email);
        if let Some(created) = &profile.created_at {
            println!("member since: {created}");
        }
    }

    fn format_task_line(&self, task: &Task) -> String {
        let mark = match task.status {
            TaskStatus::Completed => "[x]",
            TaskStatus::Active => "[ ]",
        };
        let priority = task.priority.map(|p| format!(" ({p})")).unwrap_or_default();
        if !self.color {
            return format!("{mark} {} {}{priority}", task.id, task.title);
        }
        let title = match task.status {
            TaskStatus::Completed => task.title.clone().with(Color::DarkGrey).crossed_out(),
            TaskStatus::Active => task.title.clone().with(Color::White),
        };
        let priority_color = match task.priority {
            Some(TaskPriority::High) => Color::Red,
            Some(TaskPriority::Medium) => Color::Yellow,
            _ => Color::DarkGrey,
        };
        format!(
            "{mark} {} {title}{}",
            task.id.as_str().with(Color::DarkGrey),
            priority.with(priority_color)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus) -> Task {
        Task {
            id: "t1".into(),
            title: "buy milk".into(),
            description: None,
            status,
            priority: Some(TaskPriority::High),
            due_date: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn plain_task_line_shows_status_and_priority() {
        let renderer = Renderer::new(false);
        assert_eq!(
            renderer.format_task_line(&task(TaskStatus::Active)),
            "[ ] t1 buy milk (high)"
        );
        assert_eq!(
            renderer.format_task_line(&task(TaskStatus::Completed)),
            "[x] t1 buy milk (high)"
        );
    }

    #[test]
    fn colored_task_line_keeps_text() {
        let line = Renderer::new(true).format_task_line(&task(TaskStatus::Active));
        assert!(line.contains("buy milk"));
        assert!(line.contains("\u{1b}["));
    }
}
