//! # Dispatch queue between the router and the worker pool.
//!
//! [`DispatchQueue`] is the only state shared across execution units. It is a thin
//! wrapper over an unbounded [`tokio::sync::mpsc`] channel whose receiver is shared by
//! every worker, which turns the single-consumer channel into a many-consumer queue.
//!
//! ## Architecture
//! ```text
//! Router (consumer unit)                 Worker units
//!   route() ── push(WorkItem) ──► [ unbounded mpsc ] ──► pop(timeout) ── worker 1
//!                                        │              └► pop(timeout) ── worker 2
//!                                        │              └► pop(timeout) ── worker N
//!                                 Mutex<Receiver> (one waiter at a time)
//! ```
//!
//! ## Rules
//! - **Non-blocking push**: `push()` never waits.
//! - **Bounded-wait pop**: `pop(timeout)` returns `None` when nothing arrived in time;
//!   that is a normal loop-continuation signal, not an error.
//! - **Destructive pop**: an item handed to a worker is gone from the queue; if the worker
//!   dies before finishing it, it is lost (at-most-once).
//! - **No durability**: items live in memory only.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

use crate::marshal::Payload;

/// One queued responder invocation.
///
/// `responder_index` is a position in the registry's list for `pattern`; it is resolved
/// against the registry every unit received at spawn time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Registry pattern that matched the event.
    pub pattern: String,
    /// Index of the responder under `pattern`.
    pub responder_index: usize,
    /// Literal event name.
    pub event_name: String,
    /// Event payload.
    pub payload: Payload,
}

/// Multi-producer, multi-consumer queue of [`WorkItem`]s.
///
/// Cheap to clone; clones share the same underlying channel.
#[derive(Clone, Debug)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<WorkItem>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    depth: Arc<AtomicUsize>,
}

impl DispatchQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueues an item without waiting.
    pub fn push(&self, item: WorkItem) {
        // Count first so a concurrent pop never observes the item before its increment.
        self.depth.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(item).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Pops one item, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout. Cancel-safe: dropping the future never loses an item.
    pub async fn pop(&self, timeout: Duration) -> Option<WorkItem> {
        let recv = async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        match tokio::time::timeout(timeout, recv).await {
            Ok(Some(item)) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                Some(item)
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Number of items currently queued (approximate under concurrency).
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// True if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn item(n: usize) -> WorkItem {
        WorkItem {
            pattern: "user.*".into(),
            responder_index: n,
            event_name: "user.created".into(),
            payload: json!({"n": n}),
        }
    }

    #[tokio::test]
    async fn test_pop_on_empty_queue_times_out() {
        let q = DispatchQueue::new();
        assert!(q.pop(Duration::from_millis(20)).await.is_none());
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_single_producer_order_is_preserved() {
        let q = DispatchQueue::new();
        for n in 0..3 {
            q.push(item(n));
        }
        assert_eq!(q.len(), 3);

        for n in 0..3 {
            let got = q.pop(Duration::from_millis(50)).await.unwrap();
            assert_eq!(got.responder_index, n);
        }
        assert!(q.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_consumers_share_items_without_duplicates() {
        let q = DispatchQueue::new();
        for n in 0..100 {
            q.push(item(n));
        }

        let mut joins = Vec::new();
        for _ in 0..4 {
            let q = q.clone();
            joins.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(it) = q.pop(Duration::from_millis(50)).await {
                    seen.push(it.responder_index);
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for j in joins {
            all.extend(j.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_waiting_pop_wakes_on_push() {
        let q = DispatchQueue::new();
        let q2 = q.clone();
        let waiter = tokio::spawn(async move { q2.pop(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        q.push(item(9));

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.responder_index, 9);
    }
}
