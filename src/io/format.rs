use std::{fmt::Debug, sync::Arc};

use arrow::{array::RecordBatch, datatypes::Schema, datatypes::SchemaRef};
use futures::TryStreamExt;

use crate::{
    dataset::fragment::Fragment,
    error::Result,
    expression::expr::Expression,
    scan::{
        options::{ScanContext, ScanOptions},
        task::{ScanTask, ScanTaskIterator},
    },
};

use super::{source::FileSource, FileOpener, RecordBatchStream};

/// A pluggable file format able to sniff, inspect, and read a [`FileSource`].
pub trait FileFormat: Debug + Send + Sync {
    /// A short name identifying the format.
    fn type_name(&self) -> &'static str;

    /// Whether `source` looks like a file of this format, without parsing it.
    fn is_supported(&self, source: &FileSource) -> Result<bool>;

    /// Reads the schema of `source`.
    fn inspect(&self, source: &FileSource) -> Result<SchemaRef>;

    /// Lazily enumerates the tasks reading `source`.
    fn scan_tasks(
        &self,
        source: &FileSource,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Result<ScanTaskIterator>;

    /// Whether a source is read by more than one task.
    fn splittable(&self) -> bool {
        false
    }
}

impl dyn FileFormat {
    /// Binds `source` and `options` to this format without reading any data.
    pub fn make_fragment(
        self: Arc<Self>,
        source: FileSource,
        options: Arc<ScanOptions>,
        partition: Expression,
    ) -> Arc<FileFragment> {
        Arc::new(FileFragment {
            source,
            format: self,
            options,
            partition,
        })
    }
}

/// Reads every batch of `source` right away.
pub async fn scan_file(
    format: &dyn FileFormat,
    source: &FileSource,
    options: Arc<ScanOptions>,
    context: Arc<ScanContext>,
) -> Result<Vec<RecordBatch>> {
    let mut batches = vec![];
    for task in format.scan_tasks(source, options, context)? {
        let task_batches: Vec<RecordBatch> = task?.execute()?.try_collect().await?;
        batches.extend(task_batches);
    }
    Ok(batches)
}

/// The indices of the materialized columns present in `file_schema`, in file order.
///
/// Returns `None` when no column needs reading, in which case readers decode every column.
pub(crate) fn projection_indices(file_schema: &Schema, options: &ScanOptions) -> Option<Vec<usize>> {
    let materialized = options.materialized_schema();
    let indices = file_schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| materialized.column_with_name(field.name()).is_some())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    (!indices.is_empty()).then_some(indices)
}

/// A [`Fragment`] reading one [`FileSource`] with a [`FileFormat`].
#[derive(Debug, Clone)]
pub struct FileFragment {
    source: FileSource,
    format: Arc<dyn FileFormat>,
    options: Arc<ScanOptions>,
    partition: Expression,
}

impl FileFragment {
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn format(&self) -> &Arc<dyn FileFormat> {
        &self.format
    }
}

impl Fragment for FileFragment {
    fn type_name(&self) -> &'static str {
        "file"
    }

    fn scan(&self, context: Arc<ScanContext>) -> Result<ScanTaskIterator> {
        self.format
            .scan_tasks(&self.source, self.options.clone(), context)
    }

    fn splittable(&self) -> bool {
        self.format.splittable()
    }

    fn scan_options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    fn partition_expression(&self) -> &Expression {
        &self.partition
    }

    fn read_physical_schema(&self) -> Result<SchemaRef> {
        self.format.inspect(&self.source)
    }
}

/// A [`ScanTask`] opening a [`FileSource`] with a [`FileOpener`] on every execution.
#[derive(Debug, Clone)]
pub struct FileScanTask {
    source: FileSource,
    opener: Arc<dyn FileOpener>,
    options: Arc<ScanOptions>,
    context: Arc<ScanContext>,
}

impl FileScanTask {
    /// Creates a new [`FileScanTask`] instance.
    pub fn new(
        source: FileSource,
        opener: Arc<dyn FileOpener>,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Self {
        Self {
            source,
            opener,
            options,
            context,
        }
    }
}

impl ScanTask for FileScanTask {
    fn execute(&self) -> Result<RecordBatchStream> {
        self.opener.open(&self.source)
    }

    fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    fn context(&self) -> &Arc<ScanContext> {
        &self.context
    }
}
