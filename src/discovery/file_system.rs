use std::sync::Arc;

use arrow_schema::SchemaRef;
use snafu::location;

use crate::{
    dataset::{file_system::FileSystemDataset, Dataset},
    error::{Error, Result},
    expression::expr::Expression,
    io::{
        filesystem::{FileInfo, FileSelector, FileSystem, FileType},
        format::FileFormat,
        source::FileSource,
    },
    partition::{default::DefaultPartitioning, factory::PartitioningFactory, Partitioning},
    utils::{has_ignored_segment, parent_dir, strip_base_dir},
};

use super::{DatasetFactory, FactoryState, SchemaUnifier};

/// Either a fixed [`Partitioning`] or a factory that infers one from the discovered paths.
#[derive(Debug)]
pub enum PartitioningOrFactory {
    Partitioning(Arc<dyn Partitioning>),
    Factory(Box<dyn PartitioningFactory>),
}

impl Default for PartitioningOrFactory {
    fn default() -> Self {
        Self::Partitioning(Arc::new(DefaultPartitioning::new()))
    }
}

/// Options steering [`FileSystemDatasetFactory`].
#[derive(Debug)]
pub struct FileSystemFactoryOptions {
    partition_base_dir: String,
    exclude_invalid_files: bool,
    ignore_prefixes: Vec<String>,
    partitioning: PartitioningOrFactory,
}

impl Default for FileSystemFactoryOptions {
    fn default() -> Self {
        Self {
            partition_base_dir: String::new(),
            exclude_invalid_files: false,
            ignore_prefixes: vec![".".to_string(), "_".to_string()],
            partitioning: PartitioningOrFactory::default(),
        }
    }
}

impl FileSystemFactoryOptions {
    /// The directory stripped from file paths before they are parsed as partition paths.
    pub fn with_partition_base_dir(mut self, partition_base_dir: impl Into<String>) -> Self {
        self.partition_base_dir = partition_base_dir.into();
        self
    }

    /// Drops unreadable, unsupported or conflicting files instead of failing.
    pub fn with_exclude_invalid_files(mut self, exclude_invalid_files: bool) -> Self {
        self.exclude_invalid_files = exclude_invalid_files;
        self
    }

    pub fn with_ignore_prefixes(mut self, ignore_prefixes: Vec<String>) -> Self {
        self.ignore_prefixes = ignore_prefixes;
        self
    }

    pub fn with_partitioning(mut self, partitioning: PartitioningOrFactory) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn partition_base_dir(&self) -> &str {
        &self.partition_base_dir
    }

    pub fn exclude_invalid_files(&self) -> bool {
        self.exclude_invalid_files
    }

    pub fn ignore_prefixes(&self) -> &[String] {
        &self.ignore_prefixes
    }

    pub fn partitioning(&self) -> &PartitioningOrFactory {
        &self.partitioning
    }
}

/// Discovers a [`FileSystemDataset`] from files read with one [`FileFormat`].
#[derive(Debug)]
pub struct FileSystemDatasetFactory {
    filesystem: Arc<dyn FileSystem>,
    format: Arc<dyn FileFormat>,
    files: Vec<FileInfo>,
    options: FileSystemFactoryOptions,
    state: FactoryState,
}

impl FileSystemDatasetFactory {
    fn new(
        filesystem: Arc<dyn FileSystem>,
        format: Arc<dyn FileFormat>,
        files: Vec<FileInfo>,
        options: FileSystemFactoryOptions,
    ) -> Self {
        tracing::debug!(
            filesystem = filesystem.type_name(),
            format = format.type_name(),
            files = files.len(),
            "Created dataset factory"
        );
        Self {
            filesystem,
            format,
            files,
            options,
            state: FactoryState::new("filesystem"),
        }
    }

    /// Creates a factory over explicit `paths`.
    ///
    /// A missing path is an error; directories are skipped, as are files with a segment
    /// below the partition base dir (or a file name, without one) starting with an
    /// ignore prefix.
    pub fn try_new_from_paths(
        filesystem: Arc<dyn FileSystem>,
        paths: &[String],
        format: Arc<dyn FileFormat>,
        options: FileSystemFactoryOptions,
    ) -> Result<Self> {
        let mut files = vec![];
        for info in filesystem.get_file_info(paths)? {
            match info.file_type() {
                FileType::NotFound => {
                    return Err(Error::Io {
                        message: format!("Path '{}' does not exist", info.path()),
                        location: location!(),
                    })
                }
                FileType::Directory => continue,
                FileType::File => {}
            }

            let relative = match options.partition_base_dir.as_str() {
                "" => info.path().rsplit('/').next().unwrap_or_default(),
                base => strip_base_dir(info.path(), base),
            };
            if !has_ignored_segment(relative, &options.ignore_prefixes) {
                files.push(info);
            }
        }

        Ok(Self::new(filesystem, format, files, options))
    }

    /// Creates a factory over every file matched by `selector`.
    ///
    /// Without an explicit partition base dir, the selector's base dir is used.
    pub fn try_new_from_selector(
        filesystem: Arc<dyn FileSystem>,
        selector: &FileSelector,
        format: Arc<dyn FileFormat>,
        mut options: FileSystemFactoryOptions,
    ) -> Result<Self> {
        if options.partition_base_dir.is_empty() {
            options.partition_base_dir = selector.base_dir().to_string();
        }

        let files = filesystem
            .get_file_info_selector(selector)?
            .into_iter()
            .filter(|info| info.is_file())
            .filter(|info| {
                let relative = strip_base_dir(info.path(), selector.base_dir());
                !has_ignored_segment(relative, &options.ignore_prefixes)
            })
            .collect();

        Ok(Self::new(filesystem, format, files, options))
    }

    /// The files the dataset will be built from.
    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    pub fn options(&self) -> &FileSystemFactoryOptions {
        &self.options
    }

    /// Replaces the partitioning.
    ///
    /// A fixed partitioning must only name fields of the inspected schema; a factory
    /// discards the inspected schema, which must then be inspected again.
    pub fn set_partitioning(&mut self, partitioning: PartitioningOrFactory) -> Result<()> {
        self.state.ensure_inspecting()?;
        match &partitioning {
            PartitioningOrFactory::Partitioning(partitioning) => {
                if let Some(schema) = self.state.inspected() {
                    if let Some(missing) = partitioning
                        .schema()
                        .fields()
                        .iter()
                        .find(|field| schema.column_with_name(field.name()).is_none())
                    {
                        return Err(Error::Discovery {
                            message: format!(
                                "Partition field '{}' is not part of the inspected schema",
                                missing.name()
                            ),
                            location: location!(),
                        });
                    }
                }
            }
            PartitioningOrFactory::Factory(_) => self.state.set_inspected(None),
        }

        self.options.partitioning = partitioning;
        Ok(())
    }

    /// The path of each file relative to the partition base dir, without the file name.
    fn partition_paths(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|info| {
                parent_dir(strip_base_dir(info.path(), &self.options.partition_base_dir))
                    .to_string()
            })
            .collect()
    }

    fn inspect_file(&self, info: &FileInfo) -> Result<SchemaRef> {
        let source = FileSource::from_path(info.path(), self.filesystem.clone());
        if !self.format.is_supported(&source)? {
            return Err(Error::NotSupported {
                message: format!(
                    "File '{}' is not a valid {} file",
                    info.path(),
                    self.format.type_name()
                ),
                location: location!(),
            });
        }

        let schema = self.format.inspect(&source)?;
        tracing::debug!(file = info.path(), schema = %schema, "Inspected file");
        Ok(schema)
    }

    /// Drops the files whose entry in `keep` is false.
    fn retain_files(&mut self, keep: Vec<bool>) {
        let mut keep = keep.into_iter();
        self.files.retain(|_| keep.next().unwrap_or(true));
    }

    /// Inspects every file, dropping the invalid ones if allowed.
    fn inspect_files(&mut self) -> Result<Vec<SchemaRef>> {
        let mut schemas = Vec::with_capacity(self.files.len());
        let mut keep = Vec::with_capacity(self.files.len());
        for info in &self.files {
            match self.inspect_file(info) {
                Ok(schema) => {
                    schemas.push(schema);
                    keep.push(true);
                }
                Err(e) if self.options.exclude_invalid_files => {
                    tracing::warn!(file = info.path(), error = %e, "Excluding invalid file");
                    keep.push(false);
                }
                Err(e) => return Err(e),
            }
        }

        self.retain_files(keep);
        Ok(schemas)
    }

    fn inspect_partition_schema(&mut self) -> Result<SchemaRef> {
        let paths = self.partition_paths();
        match &mut self.options.partitioning {
            PartitioningOrFactory::Partitioning(partitioning) => Ok(partitioning.schema()),
            PartitioningOrFactory::Factory(factory) => factory.inspect(&paths),
        }
    }

    fn resolve_partitioning(&mut self, schema: &SchemaRef) -> Result<Arc<dyn Partitioning>> {
        let inspected = self.state.inspected().is_some();
        let paths = self.partition_paths();
        match &mut self.options.partitioning {
            PartitioningOrFactory::Partitioning(partitioning) => Ok(partitioning.clone()),
            PartitioningOrFactory::Factory(factory) => {
                if !inspected {
                    factory.inspect(&paths)?;
                }
                factory.finish(schema)
            }
        }
    }
}

impl DatasetFactory for FileSystemDatasetFactory {
    fn type_name(&self) -> &'static str {
        "filesystem"
    }

    /// The schema of every valid file followed by the partition schema.
    fn inspect_schemas(&mut self) -> Result<Vec<SchemaRef>> {
        self.state.ensure_inspecting()?;
        let mut schemas = self.inspect_files()?;
        schemas.push(self.inspect_partition_schema()?);
        Ok(schemas)
    }

    fn inspect_schema(&mut self) -> Result<SchemaRef> {
        self.state.ensure_inspecting()?;
        let schemas = self.inspect_files()?;

        let mut unifier = SchemaUnifier::default();
        let mut keep = Vec::with_capacity(schemas.len());
        for (info, schema) in self.files.iter().zip(&schemas) {
            match unifier.try_merge(schema) {
                Ok(()) => keep.push(true),
                Err(e) if self.options.exclude_invalid_files => {
                    tracing::warn!(file = info.path(), error = %e, "Excluding conflicting file");
                    keep.push(false);
                }
                Err(e) => return Err(e),
            }
        }
        self.retain_files(keep);

        let partition_schema = self.inspect_partition_schema()?;
        unifier.try_merge(&partition_schema)?;
        let schema = unifier.finish();
        tracing::debug!(
            factory = "filesystem",
            files = self.files.len(),
            schema = %schema,
            "Inspected dataset schema"
        );

        self.state.set_inspected(Some(schema.clone()));
        Ok(schema)
    }

    fn finish(&mut self, schema: Option<SchemaRef>) -> Result<Arc<dyn Dataset>> {
        let schema = self.state.resolve_schema(schema)?;
        let partitioning = self.resolve_partitioning(&schema)?;
        let partitions = self
            .partition_paths()
            .iter()
            .map(|path| partitioning.parse_path(path))
            .collect::<Result<Vec<_>>>()?;

        let dataset = FileSystemDataset::try_new(
            schema,
            self.state.root_partition().clone(),
            self.format.clone(),
            self.filesystem.clone(),
            self.files.clone(),
            partitions,
        )?;
        tracing::debug!(
            partitioning = partitioning.type_name(),
            files = self.files.len(),
            "Finished dataset factory"
        );

        self.state.finish();
        Ok(Arc::new(dataset))
    }

    fn root_partition(&self) -> &Expression {
        self.state.root_partition()
    }

    fn set_root_partition(&mut self, partition: Expression) -> Result<()> {
        self.state.set_root_partition(partition)
    }
}
