use std::sync::Arc;

use arrow::datatypes::SchemaRef;

use super::{opener::CsvFileOpener, options::CsvReadOptions, MAX_INFER_RECORDS, SNIFF_BYTES};
use crate::{
    error::Result,
    io::{
        format::{projection_indices, FileFormat, FileScanTask},
        source::FileSource,
    },
    scan::{
        options::{ScanContext, ScanOptions},
        task::{ScanTask, ScanTaskIterator},
    },
};

/// The row-oriented CSV [`FileFormat`].
#[derive(Debug, Clone, Default)]
pub struct CsvFileFormat {
    options: CsvReadOptions,
}

impl CsvFileFormat {
    /// Creates a new [`CsvFileFormat`] instance.
    pub fn new(options: CsvReadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CsvReadOptions {
        &self.options
    }
}

impl FileFormat for CsvFileFormat {
    fn type_name(&self) -> &'static str {
        "csv"
    }

    /// Accepts sources whose leading bytes are text without NUL bytes.
    fn is_supported(&self, source: &FileSource) -> Result<bool> {
        let prefix = source.read_prefix(SNIFF_BYTES)?;
        if prefix.contains(&0) {
            return Ok(false);
        }
        let text = match std::str::from_utf8(&prefix) {
            Ok(text) => text,
            // the sniffed window may end inside a multi-byte character
            Err(e) if e.error_len().is_none() => {
                std::str::from_utf8(&prefix[..e.valid_up_to()]).unwrap_or_default()
            }
            Err(_) => return Ok(false),
        };
        Ok(!text.trim().is_empty())
    }

    fn inspect(&self, source: &FileSource) -> Result<SchemaRef> {
        if let Some(schema) = self.options.schema() {
            return Ok(schema);
        }

        let (schema, _) = self
            .options
            .format()
            .infer_schema(source.open()?, Some(MAX_INFER_RECORDS))?;
        Ok(Arc::new(schema))
    }

    fn scan_tasks(
        &self,
        source: &FileSource,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Result<ScanTaskIterator> {
        let schema = self.inspect(source)?;
        let opener = CsvFileOpener::new(schema.clone(), self.options.clone())
            .with_batch_size(options.batch_size())
            .with_projection(projection_indices(&schema, &options));

        let task: Arc<dyn ScanTask> = Arc::new(FileScanTask::new(
            source.clone(),
            Arc::new(opener),
            options,
            context,
        ));
        Ok(Box::new(std::iter::once(Ok(task))))
    }
}
