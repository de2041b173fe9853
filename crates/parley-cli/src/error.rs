use std::process::ExitCode;

use colored::Colorize;
use parley_client::ClientError;

pub fn handle_error(err: anyhow::Error) -> ExitCode {
    eprintln!("{} {}", "Error:".red().bold(), err);

    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Connectivity(_)) => suggest_server(),
        Some(ClientError::Http(http)) if http.is_connect() || http.is_timeout() => suggest_server(),
        Some(ClientError::SessionNotFound(_)) => {
            eprintln!("\n{}", "Suggestion:".yellow().bold());
            eprintln!("  Start a new session with:");
            eprintln!("  {} parley new-session", "$".dimmed());
        }
        Some(ClientError::InvalidUrl(_)) => {
            eprintln!("\n{}", "Suggestion:".yellow().bold());
            eprintln!("  Pass a full URL such as http://localhost:8000/api/chat to --base-url.");
        }
        _ => {}
    }

    ExitCode::FAILURE
}

fn suggest_server() {
    eprintln!("\n{}", "Suggestion:".yellow().bold());
    eprintln!("  Check that the chat server is running and that --base-url");
    eprintln!("  (or PARLEY_BASE_URL) points at it.");
}
