//! Paced delivery of reply fragments into the ledger.
//!
//! Fragments go through one FIFO channel drained by a single consumer task,
//! so there is exactly one delivery loop per [`Typewriter`] and fragments can
//! never overtake each other. The task is parked on the channel while the
//! queue is empty.
//!
//! [`Typewriter::reset`] bumps a generation counter. Fragments tagged with an
//! older generation are discarded, and a fragment that is mid-delivery stops
//! at the next sub-chunk. Ledger writes happen under the generation lock, so
//! once `reset` returns nothing stale can reach the ledger.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::ledger::{Ledger, MessagePatch};

const DEFAULT_MIN_CHUNK_CHARS: usize = 12;
const DEFAULT_CHUNK_CHARS: usize = 3;
const DEFAULT_CHUNK_DELAY_MS: u64 = 12;

/// Pacing policy, measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TypewriterConfig {
    /// Fragments shorter than this are written in one update.
    pub min_chunk_chars: usize,
    /// Sub-chunk size for longer fragments.
    pub chunk_chars: usize,
    /// Pause between consecutive sub-chunks.
    pub chunk_delay_ms: u64,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: DEFAULT_MIN_CHUNK_CHARS,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            chunk_delay_ms: DEFAULT_CHUNK_DELAY_MS,
        }
    }
}

impl TypewriterConfig {
    /// No pacing: every fragment is written as soon as it is dequeued.
    pub fn instant() -> Self {
        Self {
            min_chunk_chars: usize::MAX,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            chunk_delay_ms: 0,
        }
    }

    fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

#[derive(Debug)]
struct Fragment {
    generation: u64,
    text: String,
}

#[derive(Debug)]
struct Shared {
    generation: Mutex<u64>,
    /// Fragments of the current generation not yet fully delivered.
    pending: watch::Sender<usize>,
    ledger: Ledger,
}

/// Handle to the delivery task. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct Typewriter {
    tx: mpsc::UnboundedSender<Fragment>,
    shared: Arc<Shared>,
}

impl Typewriter {
    /// Spawn the delivery task. Must be called within a Tokio runtime.
    pub fn new(ledger: Ledger, config: TypewriterConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            generation: Mutex::new(0),
            pending,
            ledger,
        });

        tokio::spawn(delivery_loop(rx, shared.clone(), config));

        Self { tx, shared }
    }

    /// Queue a fragment behind everything already queued.
    pub fn push(&self, fragment: impl Into<String>) {
        let text = fragment.into();
        if text.is_empty() {
            return;
        }

        let generation = self.shared.generation.lock();
        self.shared.pending.send_modify(|n| *n += 1);
        let fragment = Fragment {
            generation: *generation,
            text,
        };
        if self.tx.send(fragment).is_err() {
            self.shared.pending.send_modify(|n| *n = n.saturating_sub(1));
            tracing::warn!("Typewriter delivery task is gone; fragment dropped");
        }
    }

    /// True while anything is queued or being delivered.
    pub fn is_active(&self) -> bool {
        *self.shared.pending.borrow() > 0
    }

    /// Resolve once the queue is empty and no delivery is in progress.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.pending.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot fail.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Drop everything queued and stop the current delivery. Text already
    /// written to the ledger stays.
    pub fn reset(&self) {
        let mut generation = self.shared.generation.lock();
        *generation += 1;
        self.shared.pending.send_replace(0);
    }
}

async fn delivery_loop(
    mut rx: mpsc::UnboundedReceiver<Fragment>,
    shared: Arc<Shared>,
    config: TypewriterConfig,
) {
    while let Some(fragment) = rx.recv().await {
        shared.deliver(fragment, &config).await;
    }
    tracing::debug!("Typewriter delivery loop stopped");
}

impl Shared {
    async fn deliver(&self, fragment: Fragment, config: &TypewriterConfig) {
        let Fragment { generation, text } = fragment;

        if text.chars().count() < config.min_chunk_chars {
            self.write(generation, &text);
        } else {
            let delay = config.chunk_delay();
            for (index, piece) in split_chars(&text, config.chunk_chars).enumerate() {
                if index > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if !self.write(generation, piece) {
                    return;
                }
            }
        }

        self.finish(generation);
    }

    /// Returns false when the fragment was discarded by a reset.
    fn write(&self, generation: u64, piece: &str) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            return false;
        }
        self.ledger
            .update_last(MessagePatch::new().append_content(piece));
        true
    }

    fn finish(&self, generation: u64) {
        let current = self.generation.lock();
        if *current == generation {
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }
    }
}

/// Split on character boundaries into pieces of at most `size` characters.
fn split_chars(text: &str, size: usize) -> impl Iterator<Item = &str> {
    let size = size.max(1);
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(size)
            .map_or(rest.len(), |(index, _)| index);
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}
