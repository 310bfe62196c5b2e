use std::error::Error;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use taskdeck::{Dashboard, NewTodo, NoticeLevel, Priority, Registration};

#[derive(Parser, Debug)]
#[command(name = "taskdeck")]
#[command(about = "Register an account and manage its personal todos")]
struct Cli {
    /// Document database (e.g. sqlite:./taskdeck.db?mode=rwc)
    #[arg(long, env = "TASKDECK_DATABASE", default_value = "sqlite::memory:")]
    database: String,

    #[arg(long, default_value = "demo@example.com")]
    email: String,

    #[arg(long, default_value = "Demo User")]
    name: String,

    #[arg(long, env = "TASKDECK_PASSWORD", default_value = "secret1")]
    password: String,

    /// Todo to add; may be repeated
    #[arg(long = "todo")]
    todos: Vec<String>,

    /// Priority for the added todos
    #[arg(long, default_value = "medium", value_parser = parse_priority)]
    priority: Priority,

    /// Mark the first added todo as done
    #[arg(long)]
    complete_first: bool,
}

/// Accepts the same spellings `Priority` is stored with.
fn parse_priority(value: &str) -> Result<Priority, String> {
    serde_json::from_value(Value::String(value.to_string()))
        .map_err(|_| format!("unknown priority {value}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let dashboard = Dashboard::builder()
        .with_database_url(&cli.database)
        .build()
        .await?;

    let mut notices = dashboard.notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            let tag = match notice.level {
                NoticeLevel::Success => "ok",
                NoticeLevel::Error => "error",
            };
            println!("[{tag}] {}", notice.message);
        }
    });

    let session = dashboard.session();
    dashboard
        .register(Registration::new(&cli.name, &cli.email, &cli.password))
        .await?;
    let signed_in = session
        .wait_until(|s| s.profile.is_some() || s.error.is_some())
        .await
        .ok_or("session stopped")?;
    if let Some(error) = signed_in.error {
        return Err(error.into());
    }

    let todos = dashboard.todos(&signed_in)?;
    let mut first = None;
    for title in &cli.todos {
        let id = todos
            .create(NewTodo::titled(title.as_str()).with_priority(cli.priority))
            .await?;
        first.get_or_insert(id);
    }
    if let Some(id) = first.filter(|_| cli.complete_first) {
        todos.toggle(&id).await?;
    }

    let expected = cli.todos.len();
    let want_done = cli.complete_first && expected > 0;
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        todos.wait_until(|s| {
            !s.loading
                && s.items.len() == expected
                && (!want_done || s.items.iter().any(|t| t.completed))
        }),
    )
    .await?
    .ok_or("todo list stopped")?;

    for todo in &state.items {
        let mark = if todo.completed { "x" } else { " " };
        println!("[{mark}] {} ({:?})", todo.title, todo.priority);
    }

    dashboard.sign_out().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_parse_with_their_stored_spelling() {
        assert_eq!(parse_priority("high"), Ok(Priority::High));
        assert_eq!(parse_priority("urgent"), Ok(Priority::Urgent));
        assert!(parse_priority("High").is_err());
        assert!(parse_priority("asap").is_err());
    }

    #[test]
    fn cli_accepts_repeated_todos() {
        let cli = Cli::try_parse_from([
            "taskdeck",
            "--todo",
            "Buy milk",
            "--todo",
            "Walk dog",
            "--priority",
            "low",
        ])
        .unwrap();
        assert_eq!(cli.todos, ["Buy milk", "Walk dog"]);
        assert_eq!(cli.priority, Priority::Low);
        assert!(!cli.complete_first);
    }
}
