use anyhow::Result;
use colored::Colorize;
use parley_client::{ChatClient, SessionStore};

use crate::config::CliConfig;

/// Open the session store and build the client.
///
/// An unusable store (for example, another `parley` holding the database)
/// downgrades to an in-memory one: the session then lasts for this run only.
pub fn prepare_client(config: &CliConfig, base_url: Option<&str>) -> Result<ChatClient> {
    let store = match SessionStore::open_default() {
        Ok(store) => store,
        Err(err) => {
            tracing::warn!(error = %err, "Session store unavailable; using in-memory store");
            eprintln!(
                "{} {err}; the session will not be remembered",
                "Warning:".yellow().bold()
            );
            SessionStore::in_memory()
        }
    };

    let client_config = config.client_config(base_url);
    tracing::debug!(base_url = %client_config.base_url, "Building chat client");
    Ok(ChatClient::new(client_config, store)?)
}
