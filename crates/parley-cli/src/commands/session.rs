use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use parley_client::{ChatClient, ClientError};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::output::{history_table, print_json};

pub async fn health(client: &ChatClient, format: OutputFormat) -> Result<ExitCode> {
    let health = client.health_check().await?;

    if format.is_json() {
        print_json(&health)?;
    } else {
        let sessions = health
            .active_sessions
            .map(|count| format!(", {count} active sessions"))
            .unwrap_or_default();
        println!(
            "{} {} is {}{sessions}",
            "✓".green(),
            health.service,
            health.status
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn reset(client: &ChatClient, format: OutputFormat) -> Result<ExitCode> {
    let result = client.reset_conversation().await;

    if format.is_json() {
        let value = match &result {
            Ok(response) => json!({ "cleared": true, "server": response }),
            Err(err) => json!({ "cleared": true, "server_error": err.to_string() }),
        };
        print_json(&value)?;
        return Ok(ExitCode::SUCCESS);
    }

    match result {
        Ok(response) => println!("{}", response.message),
        Err(err) => println!(
            "{} server reset failed ({err}); local conversation cleared",
            "Warning:".yellow().bold()
        ),
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn new_session(client: &ChatClient, format: OutputFormat) -> Result<ExitCode> {
    let session_id = client.new_session().await?;

    if format.is_json() {
        print_json(&json!({ "session_id": session_id }))?;
    } else {
        println!("Started session {}", session_id.bold());
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn history(client: &ChatClient, format: OutputFormat) -> Result<ExitCode> {
    let Some(session_id) = client.session_id() else {
        if format.is_json() {
            print_json(&json!({ "session_id": null, "messages": [] }))?;
        } else {
            println!("No active session.");
        }
        return Ok(ExitCode::SUCCESS);
    };

    match client.load_history().await {
        Ok(_) => {}
        Err(ClientError::SessionNotFound(id)) => {
            println!("Session {id} no longer exists on the server; it has been forgotten.");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    }

    let messages = client.ledger().snapshot();
    if format.is_json() {
        print_json(&json!({ "session_id": session_id, "messages": messages.as_slice() }))?;
    } else if messages.is_empty() {
        println!("Session {session_id} has no messages yet.");
    } else {
        println!("Session {}", session_id.bold());
        println!("{}", history_table(&messages));
    }
    Ok(ExitCode::SUCCESS)
}
