pub mod chat;
pub mod send;
pub mod session;

use std::future::Future;
use std::io;

use parley_client::{ChatClient, TurnOutcome};

use crate::render::ReplyRenderer;

/// Run one streamed turn, optionally printing the reply as it arrives.
/// Ctrl-C cancels the turn instead of exiting.
pub async fn stream_turn(client: &ChatClient, text: &str, print: bool) -> TurnOutcome {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    drive_turn(client, text, print, ctrl_c).await
}

/// Cancel the turn when `interrupt` resolves.
async fn drive_turn<F>(client: &ChatClient, text: &str, print: bool, interrupt: F) -> TurnOutcome
where
    F: Future<Output = ()>,
{
    let mut ledger = client.ledger().subscribe();
    let mut renderer = ReplyRenderer::new(ledger.borrow_and_update().last());
    let mut stdout = io::stdout();

    let turn = client.send_streaming(text);
    tokio::pin!(turn);
    tokio::pin!(interrupt);
    let mut interrupted = false;

    loop {
        tokio::select! {
            biased;
            outcome = &mut turn => {
                if print {
                    let snapshot = ledger.borrow_and_update().clone();
                    if let Err(err) = renderer.render(&snapshot, &mut stdout) {
                        tracing::debug!(error = %err, "Failed to write reply");
                    }
                }
                return outcome;
            }
            () = &mut interrupt, if !interrupted => {
                tracing::debug!("Turn interrupted");
                interrupted = true;
                client.cancel();
            }
            Ok(()) = ledger.changed() => {
                if print {
                    let snapshot = ledger.borrow_and_update().clone();
                    if let Err(err) = renderer.render(&snapshot, &mut stdout) {
                        tracing::debug!(error = %err, "Failed to write reply");
                    }
                }
            }
        }
    }
}

pub fn outcome_name(outcome: &TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::Completed => "completed",
        TurnOutcome::Cancelled => "cancelled",
        TurnOutcome::Failed(_) => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_client::{ClientConfig, SessionStore, TurnState};
    use std::time::Duration;

    #[tokio::test]
    async fn test_interrupt_cancels_pending_turn() {
        // SAFETY: no other test in this binary reads this variable.
        unsafe { std::env::set_var("PARLEY_DISABLE_SYSTEM_PROXY", "1") };

        // Accepts connections but never answers, so the request hangs.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/chat", listener.local_addr().unwrap());
        let client = ChatClient::new(ClientConfig::new(url), SessionStore::in_memory()).unwrap();

        let mut state = client.turn_state();
        let interrupt = async move {
            let _ = state.wait_for(|s| *s == TurnState::Requesting).await;
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            drive_turn(&client, "Hello", false, interrupt),
        )
        .await
        .expect("interrupt did not cancel the turn");

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(!client.ledger().last().unwrap().is_pending);
        assert!(!client.is_streaming());
    }
}
