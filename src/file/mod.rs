//! Byte level access to module images.
//!
//! A module image is either mapped from disk ([`physical::Physical`]) or held in memory
//! ([`memory::Memory`]). Both sit behind the [`Backend`] trait, and [`File`] hides which one
//! is in use. Decoding happens through [`parser::Parser`], encoding through
//! [`writer::Writer`], both built on the little-endian primitives of [`io`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilsplice::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("Terraria.cmod"))?;
//! let magic = file.data_slice(0, 4)?;
//! assert_eq!(magic, b"CSPL");
//! # Ok::<(), cilsplice::Error>(())
//! ```

pub mod io;
pub mod memory;
pub mod parser;
pub mod physical;
pub mod writer;

use std::path::{Path, PathBuf};

use memory::Memory;
use physical::Physical;

use crate::{Error::Empty, Result};

/// Source of raw image bytes.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// A loaded module image and, if it came from disk, its path.
pub struct File {
    data: Box<dyn Backend>,
    path: Option<PathBuf>,
}

impl File {
    /// Map an image from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Empty`] if it has no content.
    pub fn from_file(path: &Path) -> Result<File> {
        let input = Physical::new(path)?;

        Ok(File {
            data: Box::new(input),
            path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        if data.is_empty() {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(Memory::new(data)),
            path: None,
        })
    }

    /// Total image size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for an empty image. Never true for a successfully constructed `File`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// The whole image
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Bounds-checked slice of the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Path the image was mapped from
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
