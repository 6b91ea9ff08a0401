use arrow::array::RecordBatch;
use futures::stream::BoxStream;

use crate::error::Result;

pub mod csv;
pub mod filesystem;
pub mod format;
pub mod ipc;
pub mod parquet;
pub mod source;

use source::FileSource;

/// A type alias for a pin-boxed, thread-safe stream of `RecordBatch`'es.
pub type RecordBatchStream = BoxStream<'static, Result<RecordBatch>>;

/// A trait for opening and initializing readers.
///
/// Implementations open a [`FileSource`] and return a stream of `RecordBatch`'es.
/// Every call opens the source anew, so a stream can be re-created at will.
pub trait FileOpener: std::fmt::Debug + Send + Sync {
    /// Opens `source` and returns a data stream returning `RecordBatch`es.
    fn open(&self, source: &FileSource) -> Result<RecordBatchStream>;
}
