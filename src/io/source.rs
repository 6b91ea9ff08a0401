use std::{
    fmt::Display,
    fs::File,
    io::{Cursor, Read, Seek, SeekFrom},
    sync::Arc,
};

use bytes::Bytes;
use flate2::read::MultiGzDecoder;

use crate::error::Result;

use super::filesystem::FileSystem;

/// The compression applied to the bytes of a [`FileSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    Uncompressed,
    Gzip,
    Zstd,
}

impl Compression {
    /// Detects the compression from the extension of `path`.
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".gz") || path.ends_with(".gzip") {
            Compression::Gzip
        } else if path.ends_with(".zst") || path.ends_with(".zstd") {
            Compression::Zstd
        } else {
            Compression::Uncompressed
        }
    }

    /// Decompresses everything `reader` yields into memory.
    fn decompress<R: Read>(&self, reader: R) -> Result<Bytes> {
        let mut buffer = vec![];
        match self {
            Compression::Uncompressed => {
                let mut reader = reader;
                reader.read_to_end(&mut buffer)?;
            }
            Compression::Gzip => {
                MultiGzDecoder::new(reader).read_to_end(&mut buffer)?;
            }
            Compression::Zstd => {
                buffer = zstd::stream::decode_all(reader)?;
            }
        }
        Ok(Bytes::from(buffer))
    }

    /// Decodes at most `n` leading bytes of `reader`.
    fn read_prefix<R: Read>(&self, reader: R, n: usize) -> Result<Vec<u8>> {
        let mut prefix = Vec::with_capacity(n);
        let limit = n as u64;
        match self {
            Compression::Uncompressed => {
                reader.take(limit).read_to_end(&mut prefix)?;
            }
            Compression::Gzip => {
                MultiGzDecoder::new(reader)
                    .take(limit)
                    .read_to_end(&mut prefix)?;
            }
            Compression::Zstd => {
                zstd::stream::read::Decoder::new(reader)?
                    .take(limit)
                    .read_to_end(&mut prefix)?;
            }
        }
        Ok(prefix)
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Uncompressed => write!(f, "uncompressed"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// An opened, seekable byte stream.
#[derive(Debug)]
pub enum RandomAccessSource {
    File(File),
    Memory(Cursor<Bytes>),
}

impl Read for RandomAccessSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            RandomAccessSource::File(file) => file.read(buf),
            RandomAccessSource::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for RandomAccessSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            RandomAccessSource::File(file) => file.seek(pos),
            RandomAccessSource::Memory(cursor) => cursor.seek(pos),
        }
    }
}

/// The physical location of a file's bytes.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on a [`FileSystem`].
    Path {
        path: String,
        filesystem: Arc<dyn FileSystem>,
        compression: Compression,
    },
    /// A buffer held in memory.
    Buffer {
        buffer: Bytes,
        compression: Compression,
    },
}

impl FileSource {
    /// Creates a path-backed source, detecting the compression from the extension.
    pub fn from_path(path: impl Into<String>, filesystem: Arc<dyn FileSystem>) -> Self {
        let path = path.into();
        let compression = Compression::from_path(&path);
        FileSource::Path {
            path,
            filesystem,
            compression,
        }
    }

    /// Creates an uncompressed, buffer-backed source.
    pub fn from_buffer(buffer: impl Into<Bytes>) -> Self {
        FileSource::Buffer {
            buffer: buffer.into(),
            compression: Compression::Uncompressed,
        }
    }

    /// Replaces the compression of this source.
    pub fn with_compression(self, compression: Compression) -> Self {
        match self {
            FileSource::Path {
                path, filesystem, ..
            } => FileSource::Path {
                path,
                filesystem,
                compression,
            },
            FileSource::Buffer { buffer, .. } => FileSource::Buffer {
                buffer,
                compression,
            },
        }
    }

    /// "path" or "buffer".
    pub fn type_name(&self) -> &'static str {
        match self {
            FileSource::Path { .. } => "path",
            FileSource::Buffer { .. } => "buffer",
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            FileSource::Path { path, .. } => Some(path),
            FileSource::Buffer { .. } => None,
        }
    }

    pub fn filesystem(&self) -> Option<&Arc<dyn FileSystem>> {
        match self {
            FileSource::Path { filesystem, .. } => Some(filesystem),
            FileSource::Buffer { .. } => None,
        }
    }

    pub fn buffer(&self) -> Option<&Bytes> {
        match self {
            FileSource::Buffer { buffer, .. } => Some(buffer),
            FileSource::Path { .. } => None,
        }
    }

    pub fn compression(&self) -> Compression {
        match self {
            FileSource::Path { compression, .. } | FileSource::Buffer { compression, .. } => {
                *compression
            }
        }
    }

    /// Opens the underlying bytes. Compressed sources are decompressed into memory.
    pub fn open(&self) -> Result<RandomAccessSource> {
        match self {
            FileSource::Path {
                path,
                filesystem,
                compression,
            } => {
                let file = filesystem.open_input_file(path)?;
                match compression {
                    Compression::Uncompressed => Ok(file),
                    compression => Ok(RandomAccessSource::Memory(Cursor::new(
                        compression.decompress(file)?,
                    ))),
                }
            }
            FileSource::Buffer {
                buffer,
                compression,
            } => match compression {
                Compression::Uncompressed => Ok(RandomAccessSource::Memory(Cursor::new(
                    buffer.clone(),
                ))),
                compression => Ok(RandomAccessSource::Memory(Cursor::new(
                    compression.decompress(buffer.as_ref())?,
                ))),
            },
        }
    }

    /// Reads up to `n` leading bytes of the (decompressed) source.
    pub fn read_prefix(&self, n: usize) -> Result<Vec<u8>> {
        match self {
            FileSource::Path {
                path,
                filesystem,
                compression,
            } => compression.read_prefix(filesystem.open_input_file(path)?, n),
            FileSource::Buffer {
                buffer,
                compression,
            } => compression.read_prefix(buffer.as_ref(), n),
        }
    }
}

impl PartialEq for FileSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FileSource::Path {
                    path: lhs_path,
                    filesystem: lhs_fs,
                    compression: lhs_compression,
                },
                FileSource::Path {
                    path: rhs_path,
                    filesystem: rhs_fs,
                    compression: rhs_compression,
                },
            ) => {
                lhs_path == rhs_path
                    && lhs_fs.type_name() == rhs_fs.type_name()
                    && lhs_compression == rhs_compression
            }
            (
                FileSource::Buffer {
                    buffer: lhs_buffer,
                    compression: lhs_compression,
                },
                FileSource::Buffer {
                    buffer: rhs_buffer,
                    compression: rhs_compression,
                },
            ) => {
                lhs_buffer.as_ptr() == rhs_buffer.as_ptr()
                    && lhs_buffer.len() == rhs_buffer.len()
                    && lhs_compression == rhs_compression
            }
            _ => false,
        }
    }
}

impl Display for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSource::Path { path, .. } => write!(f, "{}", path),
            FileSource::Buffer { buffer, .. } => write!(f, "<buffer of {} bytes>", buffer.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        sync::Arc,
    };

    use bytes::Bytes;
    use flate2::write::GzEncoder;

    use crate::io::filesystem::LocalFileSystem;

    use super::{Compression, FileSource};

    #[test]
    fn test_compression_from_path() {
        assert_eq!(Compression::from_path("a/b.csv.gz"), Compression::Gzip);
        assert_eq!(Compression::from_path("a/b.parquet.zst"), Compression::Zstd);
        assert_eq!(Compression::from_path("a/b.csv"), Compression::Uncompressed);
    }

    #[test]
    fn test_file_source_equality() {
        let fs = Arc::new(LocalFileSystem);
        let lhs = FileSource::from_path("a.csv", fs.clone());
        let rhs = FileSource::from_path("a.csv", fs.clone());
        assert_eq!(lhs, rhs);
        assert_ne!(lhs, rhs.clone().with_compression(Compression::Gzip));
        assert_ne!(lhs, FileSource::from_path("b.csv", fs));

        let buffer = Bytes::from_static(b"c1\n1\n");
        let lhs = FileSource::from_buffer(buffer.clone());
        assert_eq!(lhs, FileSource::from_buffer(buffer));
        assert_ne!(lhs, FileSource::from_buffer(Bytes::from(b"c1\n1\n".to_vec())));
        assert_eq!(lhs.type_name(), "buffer");
    }

    #[test]
    fn test_file_source_open() {
        let mut encoder = GzEncoder::new(vec![], flate2::Compression::default());
        encoder.write_all(b"c1\nhello\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let source = FileSource::from_buffer(compressed).with_compression(Compression::Gzip);
        let mut content = String::new();
        source.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "c1\nhello\n");

        let compressed = zstd::stream::encode_all(&b"c1\nzstd\n"[..], 3).unwrap();
        let source = FileSource::from_buffer(compressed).with_compression(Compression::Zstd);
        assert_eq!(source.read_prefix(4).unwrap(), b"c1\nz".to_vec());

        let source = FileSource::from_path("testdata/csv/simple.csv", Arc::new(LocalFileSystem));
        assert_eq!(source.read_prefix(2).unwrap(), b"c1".to_vec());
        assert_eq!(source.path(), Some("testdata/csv/simple.csv"));
    }

    #[test]
    fn test_read_prefix_of_truncated_gzip() {
        let mut encoder = GzEncoder::new(vec![], flate2::Compression::default());
        encoder.write_all(&b"c1\n".repeat(4096)).unwrap();
        let mut compressed = encoder.finish().unwrap();
        // A corrupt trailer only fails a full decode.
        let len = compressed.len();
        compressed[len - 4..].copy_from_slice(&[0xff; 4]);

        let source = FileSource::from_buffer(compressed).with_compression(Compression::Gzip);
        assert_eq!(source.read_prefix(6).unwrap(), b"c1\nc1\n".to_vec());
        assert!(source.open().is_err());
    }
}
