use std::{fmt::Display, sync::Arc};

use arrow::datatypes::SchemaRef;
use snafu::location;

use crate::{
    error::{Error, Result},
    expression::expr::Expression,
    io::{
        filesystem::{FileInfo, FileSystem},
        format::FileFormat,
        source::FileSource,
    },
    scan::options::ScanOptions,
};

use super::{
    fragment::{Fragment, FragmentIterator},
    source::DataSource,
    Dataset,
};

/// Conjoins the root partition with a file's partition, dropping trivial sides.
fn combine_partitions(root: &Expression, partition: &Expression) -> Expression {
    Expression::and_all(
        [root, partition]
            .into_iter()
            .filter(|expr| !expr.is_true())
            .cloned(),
    )
}

/// A [`DataSource`] of files read with one [`FileFormat`], each with its own partition.
#[derive(Debug, Clone)]
pub struct FileSystemDataSource {
    format: Arc<dyn FileFormat>,
    sources: Vec<FileSource>,
    partitions: Vec<Expression>,
    root_partition: Expression,
}

impl DataSource for FileSystemDataSource {
    fn type_name(&self) -> &'static str {
        "filesystem"
    }

    fn partition_expression(&self) -> &Expression {
        &self.root_partition
    }

    /// Skips every file whose partition contradicts the filter before creating fragments.
    fn get_fragments_impl(&self, options: Arc<ScanOptions>) -> Result<FragmentIterator> {
        let mut fragments = vec![];
        for (source, partition) in self.sources.iter().zip(self.partitions.iter()) {
            let partition = combine_partitions(&self.root_partition, partition);
            if options.filter().assume(&partition).is_satisfiable() {
                let fragment = self.format.clone().make_fragment(
                    source.clone(),
                    options.clone(),
                    partition,
                );
                fragments.push(Ok(fragment as Arc<dyn Fragment>));
            } else {
                tracing::trace!(file = %source, partition = %partition, "Pruned file");
            }
        }

        tracing::debug!(
            format = self.format.type_name(),
            filter = %options.filter(),
            selected = fragments.len(),
            pruned = self.sources.len() - fragments.len(),
            "Selected files for scan"
        );
        Ok(Box::new(fragments.into_iter()))
    }
}

/// A [`Dataset`] of files discovered on a [`FileSystem`].
///
/// Every file carries a partition expression derived from its path; the root
/// partition expression holds for the dataset as a whole.
#[derive(Debug, Clone)]
pub struct FileSystemDataset {
    schema: SchemaRef,
    filesystem: Arc<dyn FileSystem>,
    files: Vec<FileInfo>,
    source: Arc<FileSystemDataSource>,
    sources: Vec<Arc<dyn DataSource>>,
}

impl FileSystemDataset {
    /// Creates a [`FileSystemDataset`]; `partitions` holds one expression per file.
    pub fn try_new(
        schema: SchemaRef,
        root_partition: Expression,
        format: Arc<dyn FileFormat>,
        filesystem: Arc<dyn FileSystem>,
        files: Vec<FileInfo>,
        partitions: Vec<Expression>,
    ) -> Result<Self> {
        if files.len() != partitions.len() {
            return Err(Error::InvalidData {
                message: format!(
                    "Expected one partition expression per file, found {} files and {} expressions",
                    files.len(),
                    partitions.len()
                ),
                location: location!(),
            });
        }

        let sources = files
            .iter()
            .map(|info| FileSource::from_path(info.path(), filesystem.clone()))
            .collect();
        let source = Arc::new(FileSystemDataSource {
            format,
            sources,
            partitions,
            root_partition,
        });

        Ok(Self {
            schema,
            filesystem,
            files,
            sources: vec![source.clone()],
            source,
        })
    }

    pub fn format(&self) -> &Arc<dyn FileFormat> {
        &self.source.format
    }

    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.filesystem
    }

    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    /// The partition expression of each file, in file order.
    pub fn partitions(&self) -> &[Expression] {
        &self.source.partitions
    }

    pub fn root_partition(&self) -> &Expression {
        &self.source.root_partition
    }
}

impl Dataset for FileSystemDataset {
    fn type_name(&self) -> &'static str {
        "filesystem"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn sources(&self) -> &[Arc<dyn DataSource>] {
        &self.sources
    }

    fn partition_expression(&self) -> &Expression {
        self.root_partition()
    }
}

impl Display for FileSystemDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "FileSystemDataset:")?;
        for (file, partition) in self.files.iter().zip(self.partitions()) {
            if partition.is_true() {
                writeln!(f, "{}", file.path())?;
            } else {
                writeln!(f, "{}: {}", file.path(), partition)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    use crate::{
        dataset::Dataset,
        expression::expr_fn::{field, lit},
        io::{
            csv::format::CsvFileFormat,
            filesystem::{FileInfo, FileType, LocalFileSystem},
        },
        partition::{key_value::DirectoryPartitioning, Partitioning},
        scan::options::ScanOptions,
    };

    use super::FileSystemDataset;

    fn create_dataset() -> FileSystemDataset {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Int64, true),
            Field::new("p", DataType::Int32, true),
        ]));
        let partitioning =
            DirectoryPartitioning::new(Arc::new(Schema::new(vec![schema.field(1).clone()])));

        let files = vec![
            FileInfo::new("a/1/x.csv", FileType::File, Some(4)),
            FileInfo::new("a/2/x.csv", FileType::File, Some(4)),
        ];
        let partitions = ["1/x.csv", "2/x.csv"]
            .iter()
            .map(|path| partitioning.parse_path(path).unwrap())
            .collect();

        FileSystemDataset::try_new(
            schema,
            lit(true),
            Arc::new(CsvFileFormat::default()),
            Arc::new(LocalFileSystem),
            files,
            partitions,
        )
        .unwrap()
    }

    #[test]
    fn test_file_system_dataset_prunes_partitions() {
        let dataset = create_dataset();
        assert_eq!(dataset.type_name(), "filesystem");
        assert_eq!(dataset.partitions()[0], field("p").eq(lit(1)));

        let options = Arc::new(
            ScanOptions::builder(dataset.schema())
                .with_filter(field("p").eq(lit(1)))
                .build()
                .unwrap(),
        );
        let fragments = dataset
            .get_fragments(options)
            .unwrap()
            .collect::<crate::error::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].type_name(), "file");
        assert_eq!(fragments[0].partition_expression(), &field("p").eq(lit(1)));

        let options = Arc::new(
            ScanOptions::builder(dataset.schema())
                .with_filter(field("p").gt(lit(5)))
                .build()
                .unwrap(),
        );
        assert_eq!(dataset.get_fragments(options).unwrap().count(), 0);
    }

    #[test]
    fn test_file_system_dataset_display() {
        let dataset = create_dataset();
        assert_eq!(
            dataset.to_string(),
            "FileSystemDataset:\na/1/x.csv: (p == 1)\na/2/x.csv: (p == 2)\n"
        );
        assert_eq!(dataset.files().len(), 2);
        assert_eq!(dataset.format().type_name(), "csv");
        assert_eq!(dataset.filesystem().type_name(), "local");
        assert!(dataset.root_partition().is_true());
    }

    #[test]
    fn test_file_system_dataset_length_mismatch() {
        let result = FileSystemDataset::try_new(
            Arc::new(Schema::empty()),
            lit(true),
            Arc::new(CsvFileFormat::default()),
            Arc::new(LocalFileSystem),
            vec![FileInfo::new("a.csv", FileType::File, None)],
            vec![],
        );
        assert!(result.is_err());
    }
}
