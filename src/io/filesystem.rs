use std::{fmt::Debug, fs, path::Path};

use snafu::location;

use crate::error::{Error, Result};

use super::source::RandomAccessSource;

/// The kind of entry a [`FileInfo`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    NotFound,
    File,
    Directory,
}

/// Metadata of a single filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    path: String,
    file_type: FileType,
    size: Option<u64>,
}

impl FileInfo {
    /// Creates a new [`FileInfo`] instance.
    pub fn new(path: impl Into<String>, file_type: FileType, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            file_type,
            size,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// The size in bytes, known for files only.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }
}

/// Selects the entries below a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelector {
    /// The directory to list.
    base_dir: String,
    /// Whether to descend into sub-directories.
    recursive: bool,
    /// Whether a missing `base_dir` yields no entries instead of an error.
    allow_not_found: bool,
}

impl FileSelector {
    /// Creates a new, non-recursive [`FileSelector`] for `base_dir`.
    pub fn new(base_dir: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            recursive: false,
            allow_not_found: false,
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_allow_not_found(mut self, allow_not_found: bool) -> Self {
        self.allow_not_found = allow_not_found;
        self
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn allow_not_found(&self) -> bool {
        self.allow_not_found
    }
}

/// Lists and opens files.
pub trait FileSystem: Debug + Send + Sync {
    /// A short name identifying the implementation.
    fn type_name(&self) -> &'static str;

    /// Describes each of `paths`, in the given order; missing paths are `NotFound`.
    fn get_file_info(&self, paths: &[String]) -> Result<Vec<FileInfo>>;

    /// Lists the entries selected by `selector`, sorted by path.
    fn get_file_info_selector(&self, selector: &FileSelector) -> Result<Vec<FileInfo>>;

    /// Opens the file at `path` for random access.
    fn open_input_file(&self, path: &str) -> Result<RandomAccessSource>;
}

/// A [`FileSystem`] over the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    fn file_info(path: &Path) -> Result<FileInfo> {
        let display = path.to_string_lossy().into_owned();
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => Ok(FileInfo::new(display, FileType::Directory, None)),
            Ok(metadata) => Ok(FileInfo::new(display, FileType::File, Some(metadata.len()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(FileInfo::new(display, FileType::NotFound, None))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn walk(dir: &Path, recursive: bool, infos: &mut Vec<FileInfo>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let info = Self::file_info(&path)?;
            let is_dir = info.file_type() == FileType::Directory;
            infos.push(info);
            if recursive && is_dir {
                Self::walk(&path, recursive, infos)?;
            }
        }
        Ok(())
    }
}

impl FileSystem for LocalFileSystem {
    fn type_name(&self) -> &'static str {
        "local"
    }

    fn get_file_info(&self, paths: &[String]) -> Result<Vec<FileInfo>> {
        paths
            .iter()
            .map(|path| Self::file_info(Path::new(path)))
            .collect()
    }

    fn get_file_info_selector(&self, selector: &FileSelector) -> Result<Vec<FileInfo>> {
        let base = Path::new(selector.base_dir());
        match Self::file_info(base)?.file_type() {
            FileType::Directory => {}
            FileType::NotFound if selector.allow_not_found() => return Ok(vec![]),
            FileType::NotFound => {
                return Err(Error::Io {
                    message: format!("Directory '{}' does not exist", selector.base_dir()),
                    location: location!(),
                })
            }
            FileType::File => {
                return Err(Error::Io {
                    message: format!("Path '{}' is not a directory", selector.base_dir()),
                    location: location!(),
                })
            }
        }

        let mut infos = vec![];
        Self::walk(base, selector.recursive(), &mut infos)?;
        infos.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(infos)
    }

    fn open_input_file(&self, path: &str) -> Result<RandomAccessSource> {
        Ok(RandomAccessSource::File(fs::File::open(path)?))
    }
}
