use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use async_stream::try_stream;
use futures::StreamExt;
use parquet::{
    arrow::{
        arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder},
        ProjectionMask,
    },
    file::reader::ChunkReader,
};

use crate::{
    error::Result,
    scan::{
        options::{ScanContext, ScanOptions, DEFAULT_BATCH_SIZE},
        task::{ScanTask, ScanTaskIterator},
    },
};

use super::{
    format::{projection_indices, FileFormat, FileScanTask},
    source::{FileSource, RandomAccessSource},
    FileOpener, RecordBatchStream,
};

/// The leading bytes of a Parquet file.
const PARQUET_MAGIC: &[u8] = b"PAR1";

/// Reads the arrow schema and row group count from the footer of `input`.
fn read_metadata<T: ChunkReader + 'static>(input: T) -> Result<(SchemaRef, usize)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(input)?;
    Ok((builder.schema().clone(), builder.metadata().num_row_groups()))
}

/// Opens Parquet files, optionally restricted to a single row group.
#[derive(Debug, Clone)]
pub struct ParquetFileOpener {
    batch_size: usize,
    row_group: Option<usize>,
    projection: Option<Vec<usize>>,
}

impl ParquetFileOpener {
    /// Creates a [`ParquetFileOpener`] reading every row group.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            row_group: None,
            projection: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Restricts reading to the row group at `row_group`.
    pub fn with_row_group(mut self, row_group: Option<usize>) -> Self {
        self.row_group = row_group;
        self
    }

    /// Adds a projection of root column indices.
    pub fn with_projection(mut self, projection: Option<Vec<usize>>) -> Self {
        self.projection = projection;
        self
    }

    fn reader<T: ChunkReader + 'static>(&self, input: T) -> Result<ParquetRecordBatchReader> {
        let mut builder =
            ParquetRecordBatchReaderBuilder::try_new(input)?.with_batch_size(self.batch_size);
        if let Some(row_group) = self.row_group {
            builder = builder.with_row_groups(vec![row_group]);
        }
        if let Some(projection) = &self.projection {
            let mask = ProjectionMask::roots(builder.parquet_schema(), projection.clone());
            builder = builder.with_projection(mask);
        }

        Ok(builder.build()?)
    }
}

impl Default for ParquetFileOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl FileOpener for ParquetFileOpener {
    fn open(&self, source: &FileSource) -> Result<RecordBatchStream> {
        let reader = match source.open()? {
            RandomAccessSource::File(file) => self.reader(file)?,
            RandomAccessSource::Memory(cursor) => self.reader(cursor.into_inner())?,
        };

        let stream = try_stream! {
            for batch in reader {
                yield batch?
            }
        };

        Ok(stream.boxed())
    }
}

/// The columnar Parquet [`FileFormat`], read with one task per row group.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetFileFormat;

impl ParquetFileFormat {
    fn metadata(&self, source: &FileSource) -> Result<(SchemaRef, usize)> {
        match source.open()? {
            RandomAccessSource::File(file) => read_metadata(file),
            RandomAccessSource::Memory(cursor) => read_metadata(cursor.into_inner()),
        }
    }
}

impl FileFormat for ParquetFileFormat {
    fn type_name(&self) -> &'static str {
        "parquet"
    }

    fn is_supported(&self, source: &FileSource) -> Result<bool> {
        Ok(source.read_prefix(PARQUET_MAGIC.len())? == PARQUET_MAGIC)
    }

    fn inspect(&self, source: &FileSource) -> Result<SchemaRef> {
        Ok(self.metadata(source)?.0)
    }

    fn scan_tasks(
        &self,
        source: &FileSource,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Result<ScanTaskIterator> {
        let (schema, num_row_groups) = self.metadata(source)?;
        let opener = ParquetFileOpener::new()
            .with_batch_size(options.batch_size())
            .with_projection(projection_indices(&schema, &options));

        let source = source.clone();
        let tasks = (0..num_row_groups).map(move |row_group| {
            let opener = opener.clone().with_row_group(Some(row_group));
            Ok(Arc::new(FileScanTask::new(
                source.clone(),
                Arc::new(opener),
                options.clone(),
                context.clone(),
            )) as Arc<dyn ScanTask>)
        });
        Ok(Box::new(tasks))
    }

    fn splittable(&self) -> bool {
        true
    }
}
