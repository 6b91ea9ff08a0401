use std::sync::Arc;

use arrow::{datatypes::SchemaRef, ipc::reader::FileReader};
use async_stream::try_stream;
use futures::StreamExt;

use crate::{
    error::Result,
    scan::{
        options::{ScanContext, ScanOptions, DEFAULT_BATCH_SIZE},
        task::{chunk_batch, ScanTask, ScanTaskIterator},
    },
};

use super::{
    format::{projection_indices, FileFormat, FileScanTask},
    source::FileSource,
    FileOpener, RecordBatchStream,
};

/// The leading bytes of an Arrow IPC file.
const IPC_MAGIC: &[u8] = b"ARROW1";

/// Opens Arrow IPC files, re-slicing their batches to the configured batch size.
#[derive(Debug, Clone)]
pub struct IpcFileOpener {
    batch_size: usize,
    projection: Option<Vec<usize>>,
}

impl IpcFileOpener {
    /// Creates a new [`IpcFileOpener`] instance.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            projection: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_projection(mut self, projection: Option<Vec<usize>>) -> Self {
        self.projection = projection;
        self
    }
}

impl Default for IpcFileOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl FileOpener for IpcFileOpener {
    fn open(&self, source: &FileSource) -> Result<RecordBatchStream> {
        let reader = FileReader::try_new(source.open()?, self.projection.clone())?;
        let batch_size = self.batch_size;

        let stream = try_stream! {
            for batch in reader {
                for chunk in chunk_batch(&batch?, batch_size) {
                    yield chunk;
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// The Arrow IPC file [`FileFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IpcFileFormat;

impl FileFormat for IpcFileFormat {
    fn type_name(&self) -> &'static str {
        "ipc"
    }

    fn is_supported(&self, source: &FileSource) -> Result<bool> {
        Ok(source.read_prefix(IPC_MAGIC.len())? == IPC_MAGIC)
    }

    fn inspect(&self, source: &FileSource) -> Result<SchemaRef> {
        let reader = FileReader::try_new(source.open()?, None)?;
        Ok(reader.schema())
    }

    fn scan_tasks(
        &self,
        source: &FileSource,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Result<ScanTaskIterator> {
        let schema = self.inspect(source)?;
        let opener = IpcFileOpener::new()
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::ipc::writer::FileWriter;
    use bytes::Bytes;

    use crate::{
        io::{format::scan_file, format::FileFormat, source::FileSource},
        scan::options::{ScanContext, ScanOptions},
        tests::{create_record_batch, create_schema},
    };

    use super::IpcFileFormat;

    fn create_ipc_buffer() -> Bytes {
        let batch = create_record_batch();
        let mut writer = FileWriter::try_new(vec![], &batch.schema()).unwrap();
        writer.write(&batch).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
        Bytes::from(writer.into_inner().unwrap())
    }

    #[test]
    fn test_ipc_file_format_inspect() {
        let format = IpcFileFormat;
        let source = FileSource::from_buffer(create_ipc_buffer());
        assert!(format.is_supported(&source).unwrap());
        assert_eq!(format.inspect(&source).unwrap().as_ref(), &create_schema());

        let source = FileSource::from_buffer(&b"c1,c2\n1,2\n"[..]);
        assert!(!format.is_supported(&source).unwrap());
        assert!(format.inspect(&source).is_err());
    }

    #[tokio::test]
    async fn test_ipc_file_format_scan() {
        let source = FileSource::from_buffer(create_ipc_buffer());
        let options = ScanOptions::builder(Arc::new(create_schema()))
            .with_projection(Some(vec!["c2".to_string()]))
            .with_batch_size(1)
            .build()
            .unwrap();

        let batches = scan_file(
            &IpcFileFormat,
            &source,
            Arc::new(options),
            Arc::new(ScanContext::default()),
        )
        .await
        .unwrap();
        assert_eq!(batches.len(), 4);
        assert!(batches.iter().all(|b| b.num_rows() == 1 && b.num_columns() == 1));
    }
}
