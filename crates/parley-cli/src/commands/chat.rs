use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use parley_client::{ChatClient, ClientError, TurnOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::stream_turn;
use crate::output::print_transcript;

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Reset,
    New,
    History,
    Health,
    Help,
    Exit,
    Unknown(String),
}

impl ReplCommand {
    /// `None` when the input is a chat message rather than a command.
    fn parse(input: &str) -> Option<Self> {
        let name = input.strip_prefix('/')?.split_whitespace().next()?;
        Some(match name.to_ascii_lowercase().as_str() {
            "reset" => ReplCommand::Reset,
            "new" => ReplCommand::New,
            "history" => ReplCommand::History,
            "health" => ReplCommand::Health,
            "help" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            other => ReplCommand::Unknown(other.to_string()),
        })
    }
}

pub async fn run(client: &ChatClient) -> Result<ExitCode> {
    print_banner(client);
    restore_history(client).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", "you>".green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        // EOF
        let Some(line) = line else {
            println!();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match ReplCommand::parse(input) {
            Some(ReplCommand::Exit) => break,
            Some(command) => handle_command(client, command).await,
            None => {
                if stream_turn(client, input, true).await == TurnOutcome::Cancelled {
                    println!("{}", "(cancelled)".dimmed());
                }
            }
        }
    }

    client.cancel();
    Ok(ExitCode::SUCCESS)
}

fn print_banner(client: &ChatClient) {
    println!("{} {}", "Parley".bold(), env!("CARGO_PKG_VERSION").dimmed());
    println!("Connected to {}", client.base_url().as_str().cyan());
    println!(
        "{}",
        "Type a message, /help for commands. Ctrl-C stops a reply.".dimmed()
    );
    println!();
}

async fn restore_history(client: &ChatClient) {
    let Some(session_id) = client.session_id() else {
        return;
    };

    match client.load_history().await {
        Ok(0) => {}
        Ok(count) => {
            println!(
                "{}",
                format!("Resumed session {session_id} ({count} messages)").dimmed()
            );
            print_transcript(&client.ledger().snapshot());
            println!();
        }
        Err(ClientError::SessionNotFound(_)) => {
            println!(
                "{}",
                "Previous session has expired; starting a new conversation.".dimmed()
            );
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to restore history");
            println!(
                "{}",
                format!("Could not load previous messages: {err}").dimmed()
            );
        }
    }
}

async fn handle_command(client: &ChatClient, command: ReplCommand) {
    match command {
        ReplCommand::Reset => match client.reset_conversation().await {
            Ok(response) => println!("{}", response.message.dimmed()),
            Err(err) => println!(
                "{} server reset failed ({err}); local conversation cleared",
                "Warning:".yellow().bold()
            ),
        },
        ReplCommand::New => match client.new_session().await {
            Ok(session_id) => println!("Started session {}", session_id.bold()),
            Err(err) => print_error(&err),
        },
        ReplCommand::History => match client.load_history().await {
            Ok(0) if client.session_id().is_none() => println!("No active session."),
            Ok(0) => println!("No messages yet."),
            Ok(_) => print_transcript(&client.ledger().snapshot()),
            Err(ClientError::SessionNotFound(id)) => {
                println!("Session {id} no longer exists on the server; it has been forgotten.")
            }
            Err(err) => print_error(&err),
        },
        ReplCommand::Health => match client.health_check().await {
            Ok(health) => println!("{} {} is {}", "✓".green(), health.service, health.status),
            Err(err) => print_error(&err),
        },
        ReplCommand::Help => print_help(),
        ReplCommand::Unknown(name) => {
            println!("Unknown command /{name}. Type /help for the list.")
        }
        ReplCommand::Exit => {}
    }
}

fn print_help() {
    println!("  /reset    forget this conversation");
    println!("  /new      start a new server session");
    println!("  /history  reload the transcript from the server");
    println!("  /health   check the server");
    println!("  /exit     quit");
}

fn print_error(err: &ClientError) {
    println!("{} {err}", "Error:".red().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ReplCommand::parse("/reset"), Some(ReplCommand::Reset));
        assert_eq!(ReplCommand::parse("/NEW"), Some(ReplCommand::New));
        assert_eq!(ReplCommand::parse("/history now"), Some(ReplCommand::History));
        assert_eq!(ReplCommand::parse("/quit"), Some(ReplCommand::Exit));
        assert_eq!(
            ReplCommand::parse("/frobnicate"),
            Some(ReplCommand::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(ReplCommand::parse("hello /reset"), None);
        assert_eq!(ReplCommand::parse("/"), None);
    }
}
