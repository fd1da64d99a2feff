//! # In-process event stream.
//!
//! [`MemoryStream`] is an append-only log with one shared checkpoint cursor. Readers
//! opened with [`EventStream::records`] hand out records from the cursor and advance it,
//! so a consumer unit that dies and is respawned resumes after the last record it took.
//!
//! ```text
//! put() ──► [ r0 | r1 | r2 | r3 | ... ]
//!                        ▲
//!                     cursor ──► records() ──► next: r2, r3, ... (pending when caught up)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::StreamError;
use crate::stream::{EventStream, Record, RecordStream};

#[derive(Default)]
struct State {
    log: Vec<Vec<u8>>,
    cursor: usize,
    closed: bool,
}

enum Next {
    Record(Record),
    Empty,
    Closed,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

impl Inner {
    fn next(&self) -> Next {
        let mut st = self.state.lock();
        if let Some(data) = st.log.get(st.cursor).cloned() {
            let sequence = st.cursor as u64;
            st.cursor += 1;
            Next::Record(Record { sequence, data })
        } else if st.closed {
            Next::Closed
        } else {
            Next::Empty
        }
    }
}

/// In-memory [`EventStream`] with a shared checkpoint.
///
/// Cheap to clone; clones share the same log.
#[derive(Clone)]
pub struct MemoryStream {
    name: Arc<str>,
    inner: Arc<Inner>,
}

impl MemoryStream {
    /// Creates an empty, open stream.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Inner::default()),
        }
    }

    /// Appends a raw record, bypassing any marshal.
    pub fn append(&self, data: impl Into<Vec<u8>>) -> Result<u64, StreamError> {
        let sequence = {
            let mut st = self.inner.state.lock();
            if st.closed {
                return Err(StreamError::Closed);
            }
            st.log.push(data.into());
            st.log.len() as u64 - 1
        };
        self.inner.notify.notify_waiters();
        Ok(sequence)
    }

    /// Closes the stream: open readers end once they drain the log, writes fail.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
        self.inner.notify.notify_waiters();
    }

    /// Number of records ever published.
    pub fn len(&self) -> usize {
        self.inner.state.lock().log.len()
    }

    /// True if nothing was published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the next record a reader will receive.
    pub fn checkpoint(&self) -> u64 {
        self.inner.state.lock().cursor as u64
    }

    /// Copy of every published record, in order.
    pub fn published(&self) -> Vec<Vec<u8>> {
        self.inner.state.lock().log.clone()
    }
}

#[async_trait]
impl EventStream for MemoryStream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn records(&self) -> Result<RecordStream, StreamError> {
        let inner = Arc::clone(&self.inner);
        let records = futures::stream::unfold(inner, |inner| async move {
            loop {
                // Registered before the check so a concurrent `append` cannot be missed.
                let notified = inner.notify.notified();
                match inner.next() {
                    Next::Record(record) => {
                        drop(notified);
                        return Some((Ok(record), inner));
                    }
                    Next::Closed => return None,
                    Next::Empty => notified.await,
                }
            }
        });
        Ok(records.boxed())
    }

    async fn put(&self, data: Vec<u8>) -> Result<(), StreamError> {
        self.append(data).map(|_| ())
    }
}
