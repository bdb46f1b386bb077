//! File attribute lookup.
//!
//! The sync engine never calls `fs::metadata` directly for its decisions; it
//! asks a `FileAttributeSource`. `OsAttributes` reads the real filesystem,
//! tests substitute their own source to flag files or inject failures.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::model::Exclusion;

/// The attributes the sync decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    /// Last modification time
    pub modified: SystemTime,
    /// True for directories
    pub is_dir: bool,
    /// Carries the hidden attribute (or is a dot-file)
    pub hidden: bool,
    /// Carries the temporary attribute (or has a temporary-file name)
    pub temporary: bool,
}

impl FileAttributes {
    /// The exclusion that applies to a source file with these attributes.
    pub fn exclusion(&self) -> Option<Exclusion> {
        if self.temporary {
            Some(Exclusion::Temporary)
        } else if self.hidden {
            Some(Exclusion::Hidden)
        } else {
            None
        }
    }
}

/// Source of file attributes.
pub trait FileAttributeSource: Send + Sync {
    /// Attributes of `path`, following symlinks.
    ///
    /// A missing file must be reported as `io::ErrorKind::NotFound`.
    fn attributes(&self, path: &Path) -> io::Result<FileAttributes>;
}

/// Attributes read from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsAttributes;

impl FileAttributeSource for OsAttributes {
    fn attributes(&self, path: &Path) -> io::Result<FileAttributes> {
        let metadata = fs::metadata(path)?;
        let (hidden, temporary) = platform_flags(path, &metadata);
        Ok(FileAttributes {
            modified: metadata.modified()?,
            is_dir: metadata.is_dir(),
            hidden,
            temporary,
        })
    }
}

#[cfg(windows)]
fn platform_flags(_path: &Path, metadata: &fs::Metadata) -> (bool, bool) {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x100;

    let attrs = metadata.file_attributes();
    (
        attrs & FILE_ATTRIBUTE_HIDDEN != 0,
        attrs & FILE_ATTRIBUTE_TEMPORARY != 0,
    )
}

#[cfg(not(windows))]
fn platform_flags(path: &Path, _metadata: &fs::Metadata) -> (bool, bool) {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return (false, false),
    };
    (name.starts_with('.'), is_temporary_name(name))
}

/// Editor backups (`name~`) and `.tmp` files.
#[cfg(not(windows))]
fn is_temporary_name(name: &str) -> bool {
    name.ends_with('~')
        || Path::new(name)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("tmp"))
            .unwrap_or(false)
}
