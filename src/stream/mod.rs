//! # Event stream boundary.
//!
//! The durable, ordered transport is an external collaborator. The runtime only needs
//! two things from it, captured by [`EventStream`]:
//! - a **source** of sequential raw records, opened by the consumer unit each time it starts;
//! - a **sink** accepting encoded bytes for publishing.
//!
//! Checkpointing, batching and retries against the backend belong to the implementation.
//! [`MemoryStream`] is an in-process implementation for tests and demos.

mod memory;

pub use memory::MemoryStream;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StreamError;

/// Sequence of records read from a stream.
pub type RecordStream = BoxStream<'static, Result<Record, StreamError>>;

/// One raw record read from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Transport position of the record.
    pub sequence: u64,
    /// Opaque encoded envelope.
    pub data: Vec<u8>,
}

/// Contract of the external event stream.
#[async_trait]
pub trait EventStream: Send + Sync + 'static {
    /// Stream name (for logs).
    fn name(&self) -> &str;

    /// Opens a reader positioned at the transport's checkpoint.
    ///
    /// The returned stream ends when the transport has nothing more to deliver, ever;
    /// an idle transport keeps it pending instead.
    async fn records(&self) -> Result<RecordStream, StreamError>;

    /// Publishes one encoded record.
    async fn put(&self, data: Vec<u8>) -> Result<(), StreamError>;
}
