//! Incremental printing of a streamed reply.
//!
//! The ledger publishes whole snapshots; the renderer remembers what it has
//! already written for the reply in progress and prints only the difference.

use std::io::{self, Write};

use colored::Colorize;
use parley_client::{Message, Role};

use crate::output::agent_label;

pub struct ReplyRenderer {
    /// Last message before the turn began; never printed.
    baseline: Option<String>,
    current: Option<String>,
    printed: String,
    labelled: bool,
    finished: bool,
}

impl ReplyRenderer {
    pub fn new(baseline: Option<&Message>) -> Self {
        Self {
            baseline: baseline.map(|message| message.id.clone()),
            current: None,
            printed: String::new(),
            labelled: false,
            finished: false,
        }
    }

    pub fn render(&mut self, snapshot: &[Message], out: &mut impl Write) -> io::Result<()> {
        let Some(last) = snapshot.last() else {
            return Ok(());
        };
        if last.role != Role::Assistant || self.baseline.as_deref() == Some(last.id.as_str()) {
            return Ok(());
        }

        if self.current.as_deref() != Some(last.id.as_str()) {
            self.current = Some(last.id.clone());
            self.printed.clear();
            self.labelled = false;
            self.finished = false;
        }
        if self.finished {
            return Ok(());
        }

        if !self.labelled && (!last.content.is_empty() || !last.is_pending) {
            write!(out, "{} ", agent_label(last.agent_used.as_deref()))?;
            self.labelled = true;
        }

        match last.content.strip_prefix(self.printed.as_str()) {
            Some(rest) if is_error(last) && self.printed.is_empty() => {
                write!(out, "{}", rest.red())?;
            }
            Some(rest) => write!(out, "{rest}")?,
            None => {
                // Replaced rather than extended: the turn failed mid-reply.
                writeln!(out)?;
                write!(out, "{}", last.content.red())?;
            }
        }
        self.printed.clone_from(&last.content);

        if !last.is_pending {
            writeln!(out)?;
            self.finished = true;
        }
        out.flush()
    }
}

fn is_error(message: &Message) -> bool {
    !message.is_pending && message.content.starts_with("Error: ")
}
