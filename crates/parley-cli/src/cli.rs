use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for CLI commands
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Parser)]
#[command(name = "parley")]
#[command(version, about = "Parley - terminal client for a multi-agent chat server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Chat API base URL (defaults to http://localhost:8000/api/chat)
    #[arg(long, global = true, env = "PARLEY_BASE_URL")]
    pub base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Send one message and print the reply
    Send(SendArgs),

    /// Check that the chat server is reachable
    Health,

    /// Forget the current conversation, locally and on the server
    Reset,

    /// Start a new server session
    NewSession,

    /// Show the current session's transcript
    History,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct SendArgs {
    /// Message text
    #[arg(required = true, num_args = 1..)]
    pub message: Vec<String>,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,
}

impl SendArgs {
    pub fn text(&self) -> String {
        self.message.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_joins_words() {
        let cli = Cli::try_parse_from(["parley", "send", "hello", "there", "--no-stream"]).unwrap();
        let Some(Commands::Send(args)) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.text(), "hello there");
        assert!(args.no_stream);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "parley",
            "health",
            "--format",
            "json",
            "--base-url",
            "http://chat.internal/api/chat",
        ])
        .unwrap();
        assert!(cli.format.is_json());
        assert_eq!(cli.base_url.as_deref(), Some("http://chat.internal/api/chat"));
    }
}
