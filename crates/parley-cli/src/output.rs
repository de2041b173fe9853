use anyhow::Result;
use chrono::Local;
use colored::{ColoredString, Colorize};
use comfy_table::{Cell, Table};
use parley_client::{Message, Role};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value)?;
    println!("{output}");
    Ok(())
}

/// Speaker label: `you` for the user, the agent name for replies.
pub fn speaker(message: &Message) -> ColoredString {
    match message.role {
        Role::User => "you:".green().bold(),
        Role::Assistant => agent_label(message.agent_used.as_deref()),
    }
}

pub fn agent_label(agent: Option<&str>) -> ColoredString {
    format!("{}:", agent.unwrap_or("Assistant")).cyan().bold()
}

pub fn print_transcript(messages: &[Message]) {
    for message in messages {
        println!("{} {}", speaker(message), message.content);
    }
}

pub fn history_table(messages: &[Message]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Time", "Role", "Agent", "Message"]);

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        table.add_row(vec![
            Cell::new(
                message
                    .created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S"),
            ),
            Cell::new(role),
            Cell::new(message.agent_used.as_deref().unwrap_or("-")),
            Cell::new(preview_text(&message.content, 80)),
        ]);
    }

    table
}

/// First line of `text`, cut to `max_chars` characters.
pub fn preview_text(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars && line.len() == text.trim_end().len() {
        return line.to_string();
    }
    let cut: String = line.chars().take(max_chars).collect();
    format!("{cut}...")
}
