use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

/// Opens a fresh byte stream for an image source
///
/// Every call must return an independent stream positioned at offset 0.
/// Callers never rewind or seek; they reopen instead. A stream is released
/// when the returned value is dropped.
pub trait StreamOpener {
    type Key: ?Sized;
    type Stream: Read;

    fn open(&self, key: &Self::Key) -> io::Result<Self::Stream>;
}

/// Opens images from the filesystem, optionally relative to a root directory
#[derive(Debug, Clone, Default)]
pub struct FileStreamOpener {
    root: Option<PathBuf>,
}

impl FileStreamOpener {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl StreamOpener for FileStreamOpener {
    type Key = Path;
    type Stream = BufReader<File>;

    fn open(&self, key: &Path) -> io::Result<Self::Stream> {
        let path = self.resolve(key);
        let file = File::open(&path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to open image {}: {}", path.display(), e),
            )
        })?;
        Ok(BufReader::new(file))
    }
}

/// Serves named in-memory blobs, e.g. images received over the network
#[derive(Debug, Clone, Default)]
pub struct MemoryStreamOpener {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStreamOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.insert(name.into(), bytes);
    }

    pub fn with_blob(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl StreamOpener for MemoryStreamOpener {
    type Key = str;
    type Stream = Cursor<Vec<u8>>;

    fn open(&self, key: &str) -> io::Result<Self::Stream> {
        self.blobs
            .get(key)
            .map(|bytes| Cursor::new(bytes.clone()))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("No image named '{}'", key))
            })
    }
}
