use std::process::ExitCode;

use anyhow::Result;
use parley_client::{ChatClient, TurnOutcome};
use serde_json::json;

use crate::cli::{OutputFormat, SendArgs};
use crate::commands::{outcome_name, stream_turn};
use crate::output::{agent_label, print_json};

/// Conventional exit status after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

pub async fn run(client: &ChatClient, args: &SendArgs, format: OutputFormat) -> Result<ExitCode> {
    let text = args.text();

    if args.no_stream {
        let response = client.send_once(&text).await?;
        if format.is_json() {
            print_json(&response)?;
        } else {
            println!(
                "{} {}",
                agent_label(Some(response.agent_used.as_str())),
                response.response
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = stream_turn(client, &text, !format.is_json()).await;

    if format.is_json() {
        let error = match &outcome {
            TurnOutcome::Failed(reason) => Some(reason.as_str()),
            _ => None,
        };
        print_json(&json!({
            "outcome": outcome_name(&outcome),
            "error": error,
            "session_id": client.session_id(),
            "reply": client.ledger().last(),
        }))?;
    }

    Ok(match outcome {
        TurnOutcome::Completed => ExitCode::SUCCESS,
        TurnOutcome::Cancelled => ExitCode::from(EXIT_INTERRUPTED),
        TurnOutcome::Failed(_) => ExitCode::FAILURE,
    })
}
