//! Observable message list rendered by the front end.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_used: Option<String>,
    /// True only while an assistant reply is being produced.
    pub is_pending: bool,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            role,
            created_at: Utc::now(),
            agent_used: None,
            is_pending: false,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a finished assistant message
    pub fn assistant(content: impl Into<String>, agent_used: Option<String>) -> Self {
        Self {
            agent_used,
            ..Self::new(Role::Assistant, content.into())
        }
    }

    /// Create an empty assistant message awaiting its reply
    pub fn pending_assistant() -> Self {
        Self {
            is_pending: true,
            ..Self::new(Role::Assistant, String::new())
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ContentPatch {
    Replace(String),
    Append(String),
}

/// Partial update merged into the last ledger entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    content: Option<ContentPatch>,
    agent_used: Option<String>,
    is_pending: Option<bool>,
}

impl MessagePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(ContentPatch::Replace(content.into()));
        self
    }

    pub fn append_content(mut self, fragment: impl Into<String>) -> Self {
        self.content = Some(ContentPatch::Append(fragment.into()));
        self
    }

    pub fn agent_used(mut self, agent: impl Into<String>) -> Self {
        self.agent_used = Some(agent.into());
        self
    }

    pub fn pending(mut self, is_pending: bool) -> Self {
        self.is_pending = Some(is_pending);
        self
    }

    fn apply(self, message: &mut Message) {
        match self.content {
            Some(ContentPatch::Replace(content)) => message.content = content,
            Some(ContentPatch::Append(fragment)) => message.content.push_str(&fragment),
            None => {}
        }
        if let Some(agent) = self.agent_used {
            message.agent_used = Some(agent);
        }
        if let Some(is_pending) = self.is_pending {
            message.is_pending = is_pending;
        }
    }
}

/// Immutable view of the ledger at one point in time.
pub type LedgerSnapshot = Arc<Vec<Message>>;

/// Ordered, observable list of messages.
///
/// Cloning is cheap and every clone shares the same list. Each mutation
/// publishes a new [`LedgerSnapshot`]; a snapshot handed out earlier is never
/// changed afterwards.
#[derive(Debug, Clone)]
pub struct Ledger {
    tx: Arc<watch::Sender<LedgerSnapshot>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self { tx: Arc::new(tx) }
    }

    pub fn append(&self, message: Message) {
        self.tx.send_modify(|snapshot| {
            // Copies only when an observer still holds the previous snapshot.
            Arc::make_mut(snapshot).push(message);
        });
    }

    /// Merge `patch` into the last message. Returns false (and publishes
    /// nothing) when the ledger is empty.
    pub fn update_last(&self, patch: MessagePatch) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.is_empty() {
                return false;
            }
            if let Some(last) = Arc::make_mut(snapshot).last_mut() {
                patch.apply(last);
            }
            true
        })
    }

    pub fn replace_all(&self, messages: Vec<Message>) {
        self.tx.send_replace(Arc::new(messages));
    }

    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.tx.borrow().clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.tx.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Change feed; the receiver always sees the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_last_on_empty_ledger_is_noop() {
        let ledger = Ledger::new();
        let rx = ledger.subscribe();

        assert!(!ledger.update_last(MessagePatch::new().content("ignored")));
        assert!(ledger.is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_update_last_touches_only_final_entry() {
        let ledger = Ledger::new();
        ledger.append(Message::user("Hello"));
        ledger.append(Message::assistant("Hi", Some("General".into())));
        ledger.append(Message::pending_assistant());
        let before = ledger.snapshot();

        assert!(ledger.update_last(
            MessagePatch::new()
                .append_content("partial")
                .agent_used("Technical Expert")
                .pending(false)
        ));

        let after = ledger.snapshot();
        assert_eq!(after[..2], before[..2]);
        assert_eq!(after[2].id, before[2].id);
        assert_eq!(after[2].content, "partial");
        assert_eq!(after[2].agent_used.as_deref(), Some("Technical Expert"));
        assert!(!after[2].is_pending);
    }

    #[test]
    fn test_held_snapshots_are_never_mutated() {
        let ledger = Ledger::new();
        ledger.append(Message::pending_assistant());
        let held = ledger.snapshot();

        ledger.update_last(MessagePatch::new().append_content("abc"));
        ledger.append(Message::user("next"));

        assert_eq!(held.len(), 1);
        assert_eq!(held[0].content, "");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_content_patch_replaces_or_appends() {
        let ledger = Ledger::new();
        ledger.append(Message::pending_assistant());
        ledger.update_last(MessagePatch::new().append_content("Hi "));
        ledger.update_last(MessagePatch::new().append_content("there"));
        assert_eq!(ledger.last().unwrap().content, "Hi there");

        ledger.update_last(MessagePatch::new().content("Error: boom"));
        assert_eq!(ledger.last().unwrap().content, "Error: boom");
    }

    #[tokio::test]
    async fn test_every_mutation_is_published() {
        let ledger = Ledger::new();
        let mut rx = ledger.subscribe();

        ledger.append(Message::user("Hello"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        ledger.replace_all(vec![Message::user("a"), Message::user("b")]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 2);

        ledger.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("x");
        let b = Message::user("x");
        assert_ne!(a.id, b.id);
    }
}
