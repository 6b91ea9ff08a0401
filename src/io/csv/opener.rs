use std::io::Read;

use arrow::datatypes::SchemaRef;
use async_stream::try_stream;
use futures::StreamExt;

use super::options::CsvReadOptions;
use crate::{
    error::Result,
    io::{source::FileSource, FileOpener, RecordBatchStream},
    scan::options::DEFAULT_BATCH_SIZE,
};

/// Responsible for opening CSV sources with a fixed file schema.
///
/// Implements the [`FileOpener`] trait by wrapping the [`arrow::csv::Reader`]
/// with a boxed stream, yielding instances of [`arrow::array::RecordBatch`].
#[derive(Debug, Clone)]
pub struct CsvFileOpener {
    /// The schema of the file as a whole.
    schema: SchemaRef,
    options: CsvReadOptions,
    /// The number of records to read per batch.
    batch_size: usize,
    /// An optional list of column indices to decode.
    projection: Option<Vec<usize>>,
}

impl CsvFileOpener {
    /// Creates a [`CsvFileOpener`] for files with `schema`.
    pub fn new(schema: SchemaRef, options: CsvReadOptions) -> Self {
        Self {
            schema,
            options,
            batch_size: DEFAULT_BATCH_SIZE,
            projection: None,
        }
    }

    /// Adds a batch size, defining the number of records to read per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Adds a projection of column indices.
    pub fn with_projection(mut self, projection: Option<Vec<usize>>) -> Self {
        self.projection = projection;
        self
    }

    /// Creates a CSV reader from the given input source.
    fn reader<R: Read>(&self, reader: R) -> Result<arrow::csv::Reader<R>> {
        let mut builder = arrow::csv::ReaderBuilder::new(self.schema.clone())
            .with_batch_size(self.batch_size)
            .with_header(self.options.has_header())
            .with_delimiter(self.options.delimiter())
            .with_quote(self.options.quote());
        if let Some(projection) = &self.projection {
            builder = builder.with_projection(projection.clone());
        }

        Ok(builder.build(reader)?)
    }
}

impl FileOpener for CsvFileOpener {
    fn open(&self, source: &FileSource) -> Result<RecordBatchStream> {
        let reader = self.reader(source.open()?)?;

        let stream = try_stream! {
            for batch in reader {
                yield batch?
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::{StreamExt, TryStreamExt};

    use crate::{
        io::{
            csv::{opener::CsvFileOpener, options::CsvReadOptions},
            filesystem::LocalFileSystem,
            source::FileSource,
            FileOpener,
        },
        tests::create_schema,
    };

    fn simple_source() -> FileSource {
        FileSource::from_path("testdata/csv/simple.csv", Arc::new(LocalFileSystem))
    }

    #[tokio::test]
    async fn test_csv_file_opener() {
        let schema = Arc::new(create_schema());
        let opener = CsvFileOpener::new(schema, CsvReadOptions::default());

        let mut stream = opener.open(&simple_source()).unwrap();
        while let Some(Ok(batch)) = stream.next().await {
            assert_eq!(batch.num_rows(), 6);
            assert_eq!(batch.num_columns(), 3);
        }
    }

    #[tokio::test]
    async fn test_csv_file_opener_batch_size_and_projection() {
        let schema = Arc::new(create_schema());
        let opener = CsvFileOpener::new(schema, CsvReadOptions::default())
            .with_batch_size(1)
            .with_projection(Some(vec![0, 2]));

        // every open starts over
        for _ in 0..2 {
            let batches: Vec<_> = opener.open(&simple_source()).unwrap().try_collect().await.unwrap();
            assert_eq!(batches.len(), 6);
            assert!(batches.iter().all(|b| b.num_rows() == 1 && b.num_columns() == 2));
        }
    }

    #[tokio::test]
    async fn test_csv_file_opener_buffer() {
        let schema = Arc::new(create_schema());
        let opener = CsvFileOpener::new(schema, CsvReadOptions::default());
        let source = FileSource::from_buffer(&b"c1,c2,c3\nx,1,2\n"[..]);

        let batches: Vec<_> = opener.open(&source).unwrap().try_collect().await.unwrap();
        assert_eq!(batches[0].num_rows(), 1);
    }
}
