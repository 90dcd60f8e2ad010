use std::time::{Duration, SystemTime};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;

/// Backend construction options.
///
/// The factory hands a copy to whichever backend it builds; the local backend
/// keeps it purely for inspection, the remote backend uses it to shape its
/// HTTP client.
#[serde_inline_default]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VfsOptions {
    #[serde_inline_default(Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    /// How long the remote backend waits for a TCP connection before giving
    /// up on a request.
    pub connect_timeout: Duration,
}

impl Default for VfsOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// The subset of file metadata every backend can report uniformly.
#[derive(Debug, Default, Copy, Clone)]
pub struct Metadata {
    pub size: Option<u64>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl From<std::fs::Metadata> for Metadata {
    fn from(value: std::fs::Metadata) -> Self {
        Metadata {
            size: Some(value.len()),
            atime: value.accessed().ok(),
            mtime: value.modified().ok(),
            is_dir: value.is_dir(),
            is_symlink: value.file_type().is_symlink(),
        }
    }
}

/// The simplified lowest-common-denominator of file-opening modes that the
/// VFS needs to support.
#[repr(transparent)]
#[derive(Default, Copy, Clone, Eq, PartialEq)]
pub struct OpenFlags(u32);

bitflags! {
    impl OpenFlags: u32 {
        const READ = 0x00000001;
        const WRITE = 0x00000002;
        const APPEND = 0x00000004;
        const CREATE = 0x00000008;
        const TRUNCATE = 0x00000010;
        const EXCLUDE = 0x00000020;
    }
}

impl OpenFlags {
    pub fn new() -> Self {
        Self(0)
    }

    /// Reports whether an `open` with these flags can only observe the file.
    /// This drives the derived `open_read` / `open_write` operation name.
    pub fn is_read_only(self) -> bool {
        !self.intersects(
            Self::WRITE | Self::APPEND | Self::CREATE | Self::TRUNCATE | Self::EXCLUDE,
        )
    }
}

impl From<OpenFlags> for tokio::fs::OpenOptions {
    fn from(flags: OpenFlags) -> Self {
        let mut opts = tokio::fs::OpenOptions::new();

        // Empty flags read, matching the default mode of the underlying
        // primitive.
        opts.read(flags.contains(OpenFlags::READ) || flags.is_empty());
        opts.write(flags.contains(OpenFlags::WRITE));
        opts.append(flags.contains(OpenFlags::APPEND));
        opts.create(flags.contains(OpenFlags::CREATE));
        opts.truncate(flags.contains(OpenFlags::TRUNCATE));
        opts.create_new(flags.contains(OpenFlags::EXCLUDE));

        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_flags_classify_as_reads() {
        assert!(OpenFlags::READ.is_read_only());
        assert!(OpenFlags::new().is_read_only());
        assert!(!(OpenFlags::READ | OpenFlags::WRITE).is_read_only());
        assert!(!(OpenFlags::WRITE | OpenFlags::CREATE).is_read_only());
        assert!(!OpenFlags::APPEND.is_read_only());
    }
}
