//! Descriptor loader: enumerates the files of a descriptor folder.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::{DescriptorError, GitOpsError, Result};

/// Default cap on the size of a single descriptor file.
pub const DEFAULT_MAX_DESCRIPTOR_BYTES: u64 = 1024 * 1024;

/// A raw descriptor read from the working copy.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// File name inside the descriptor folder.
    pub file_name: String,
    /// Full path of the file.
    pub path: PathBuf,
    /// Raw file content.
    pub payload: Vec<u8>,
}

/// Loads descriptor files from a folder.
#[derive(Debug, Clone)]
pub struct DescriptorLoader {
    max_bytes: u64,
}

impl Default for DescriptorLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DESCRIPTOR_BYTES)
    }
}

impl DescriptorLoader {
    /// Creates a loader rejecting files larger than `max_bytes`.
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Starts enumerating `folder`.
    ///
    /// Fails only if the folder itself cannot be listed. Files are yielded in
    /// file-name order; subdirectories, symlinks and hidden files are skipped.
    pub fn load(&self, folder: &Path) -> Result<Descriptors> {
        let list_error = |source| GitOpsError::ListDirectory {
            path: folder.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(folder).map_err(list_error)?;
        if !metadata.is_dir() {
            return Err(list_error(std::io::Error::other("not a directory")));
        }
        // Surface permission errors now rather than on the first entry.
        fs::read_dir(folder).map_err(list_error)?;

        let walker = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(Descriptors {
            walker,
            max_bytes: self.max_bytes,
        })
    }
}

/// Lazy, finite iterator over the descriptors of one folder.
///
/// A read failure on one file is yielded as an error and iteration continues.
pub struct Descriptors {
    walker: walkdir::IntoIter,
    max_bytes: u64,
}

impl Descriptors {
    fn read(&self, entry: &walkdir::DirEntry) -> std::result::Result<Descriptor, DescriptorError> {
        let path = entry.path();
        let size = entry
            .metadata()
            .map_err(|e| DescriptorError::Read {
                path: path.to_path_buf(),
                source: walk_error_into_io(e),
            })?
            .len();
        if size > self.max_bytes {
            return Err(DescriptorError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.max_bytes,
            });
        }

        let payload = fs::read(path).map_err(|e| DescriptorError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Descriptor {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            payload,
        })
    }
}

impl Iterator for Descriptors {
    type Item = std::result::Result<Descriptor, DescriptorError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    return Some(Err(DescriptorError::Read {
                        path,
                        source: walk_error_into_io(e),
                    }));
                }
            };

            if !entry.file_type().is_file() {
                log::debug!("Skipping non-regular entry {}", entry.path().display());
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            return Some(self.read(&entry));
        }
    }
}

fn walk_error_into_io(e: walkdir::Error) -> std::io::Error {
    let message = e.to_string();
    e.into_io_error()
        .unwrap_or_else(|| std::io::Error::other(message))
}
