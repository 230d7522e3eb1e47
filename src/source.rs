//! Reading whitespace sources from disk.

use memmap::Mmap;
use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to memory map {}: {source}", .path.display())]
    Map { path: PathBuf, source: io::Error },
}

/// The bytes of a source file, memory mapped unless the file is empty
#[derive(Debug)]
pub enum Source {
    Mapped(Mmap),
    Empty,
}

impl Deref for Source {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Source::Mapped(map) => map,
            Source::Empty => &[],
        }
    }
}

/// Opens and memory maps the source file at `path`
pub fn load<P: AsRef<Path>>(path: P) -> Result<Source, SourceError> {
    let path = path.as_ref();
    let open_error = |source: io::Error| SourceError::Open {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(open_error)?;
    if file.metadata().map_err(open_error)?.len() == 0 {
        return Ok(Source::Empty);
    }

    // the mapping is read only and dropped before the interpreter exits
    let map = unsafe { Mmap::map(&file) }.map_err(|source| SourceError::Map {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Source::Mapped(map))
}
