use std::{
    io::SeekFrom,
    ops::Deref,
    time::SystemTime,
};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use trait_enum::trait_enum;
use url::Url;

use super::{
    Error, Metadata, OpenFlags, VfsOptions, local::LocalFs, observer::UsedPathObserver, ops::Op,
    remote::RemoteFs,
};
use crate::config::VfsConfig;

/// The uniform filesystem surface shared by every backend.
///
/// Path-bearing methods notify every registered used-path observer before
/// delegating to the underlying primitive; results and errors come back
/// through unchanged. The wrapper adds no locking, no retries, and no
/// suspension points of its own.
#[async_trait]
pub trait Vfs: Send + Sync {
    /// Registers an observer that receives every intercepted `(path,
    /// operation)` pair, in call order, exactly once per call.
    fn subscribe_used_paths(&self, observer: UsedPathObserver);

    /// Emits a used-path notification. Never fails and never touches the
    /// path; the backends call this themselves before each path-bearing
    /// primitive.
    fn notify_used_path(&self, path: &Utf8Path, op: Op);

    /// Opens the file at `path` using the `flags` provided. The call is
    /// reported as `open_read` when the flags can only observe the file and
    /// as `open_write` otherwise.
    async fn open(&self, path: &Utf8Path, flags: OpenFlags) -> Result<FileHandle, Error>;

    async fn exists(&self, path: &Utf8Path) -> Result<bool, Error>;
    async fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>, Error>;
    async fn read_to_string(&self, path: &Utf8Path) -> Result<String, Error>;
    async fn read_dir(&self, path: &Utf8Path) -> Result<Vec<(Utf8PathBuf, Metadata)>, Error>;
    async fn stat(&self, path: &Utf8Path) -> Result<Metadata, Error>;
    async fn lstat(&self, path: &Utf8Path) -> Result<Metadata, Error>;
    async fn read_link(&self, path: &Utf8Path) -> Result<Utf8PathBuf, Error>;
    async fn read_json(&self, path: &Utf8Path) -> Result<serde_json::Value, Error>;

    async fn write_file(&self, path: &Utf8Path, data: &[u8]) -> Result<(), Error>;
    async fn append_file(&self, path: &Utf8Path, data: &[u8]) -> Result<(), Error>;
    async fn write_json(&self, path: &Utf8Path, value: &serde_json::Value) -> Result<(), Error>;

    /// Writes `data` to a temporary sibling of `path`, then renames it into
    /// place, so a crash mid-write never leaves a half-written `path`. A
    /// failed rename surfaces as an error and leaves the temporary sibling
    /// behind.
    async fn write_file_atomic(&self, path: &Utf8Path, data: &[u8]) -> Result<(), Error>;

    async fn truncate(&self, path: &Utf8Path, len: u64) -> Result<(), Error>;
    async fn create_file(&self, path: &Utf8Path) -> Result<(), Error>;
    async fn mkdir(&self, path: &Utf8Path) -> Result<(), Error>;
    async fn rmdir(&self, path: &Utf8Path) -> Result<(), Error>;
    async fn remove_file(&self, path: &Utf8Path) -> Result<(), Error>;

    /// Creates a symlink at `path` pointing at `target`.
    async fn symlink(&self, path: &Utf8Path, target: &Utf8Path) -> Result<(), Error>;

    async fn set_times(
        &self,
        path: &Utf8Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> Result<(), Error>;
    async fn set_permissions(&self, path: &Utf8Path, mode: u32) -> Result<(), Error>;

    async fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> Result<(), Error>;
    async fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> Result<u64, Error>;
}

/// An open file produced by [`Vfs::open`].
///
/// Handle-level operations carry no path, so they are never intercepted;
/// the `open` that produced the handle already reported the path.
#[derive(Debug)]
pub struct FileHandle {
    file: tokio::fs::File,
}

impl FileHandle {
    pub(super) fn new(file: tokio::fs::File) -> Self {
        Self { file }
    }

    /// Reads up to `len` bytes starting at `offset`. Returns [`None`] when
    /// reading at or past the end of the file.
    pub async fn read_at(&mut self, offset: u64, len: usize) -> Result<Option<Vec<u8>>, Error> {
        let mut buf: Vec<u8> = Vec::with_capacity(len);

        self.file.seek(SeekFrom::Start(offset)).await?;

        let bytes_read = (&mut self.file).take(len as u64).read_to_end(&mut buf).await?;

        if bytes_read == 0 && len != 0 {
            Ok(None)
        } else {
            Ok(Some(buf))
        }
    }

    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;

        Ok(())
    }

    pub async fn stat(&self) -> Result<Metadata, Error> {
        let metadata = self.file.metadata().await?;

        Ok(Metadata::from(metadata))
    }

    pub async fn sync(&self) -> Result<(), Error> {
        self.file.sync_all().await?;

        Ok(())
    }
}

/// An opaque wrapper for an implementor of [`Vfs`], selected by the factory
/// from the root URI's scheme.
#[repr(transparent)]
pub struct Backend {
    inner: BackendInner,
}

impl Backend {
    #[allow(non_snake_case)]
    pub(super) fn LocalFs(local: LocalFs) -> Self {
        Self {
            inner: BackendInner::LocalFs(local),
        }
    }

    #[allow(non_snake_case)]
    pub(super) fn RemoteFs(remote: RemoteFs) -> Self {
        Self {
            inner: BackendInner::RemoteFs(remote),
        }
    }

    /// Builds a backend straight from a loaded [`VfsConfig`] section.
    pub fn from_config(config: &VfsConfig) -> Result<Self, Error> {
        open(&config.uri, config.options.clone())
    }

    pub fn is_local(&self) -> bool {
        matches!(self.inner, BackendInner::LocalFs(_))
    }

    /// Establishes the remote session. Local backends are usable as soon as
    /// the factory constructs them, so this is a no-op for them.
    pub async fn connect(&self) -> Result<(), Error> {
        match &self.inner {
            BackendInner::LocalFs(_) => Ok(()),
            BackendInner::RemoteFs(remote) => remote.connect().await,
        }
    }

    /// Tears the remote session down. Calling this on a remote backend that
    /// never connected is an error, not a silent success.
    pub fn disconnect(&self) -> Result<(), Error> {
        match &self.inner {
            BackendInner::LocalFs(_) => Ok(()),
            BackendInner::RemoteFs(remote) => remote.disconnect(),
        }
    }
}

impl Deref for Backend {
    type Target = dyn Vfs;

    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

trait_enum! {
    enum BackendInner: Vfs {
        LocalFs,
        RemoteFs
    }
}

/// Opens a backend for `uri`.
///
/// A `file:` scheme yields a [`LocalFs`] that is immediately usable; any
/// other scheme yields a [`RemoteFs`] that still needs
/// [`Backend::connect`] before its read path works. Malformed URIs are
/// surfaced as [`Error::InvalidUri`], never a panic.
pub fn open(uri: &str, options: VfsOptions) -> Result<Backend, Error> {
    let parsed = Url::parse(uri).map_err(|source| Error::InvalidUri {
        uri: uri.to_string(),
        source,
    })?;

    if parsed.scheme() == "file" {
        Ok(Backend::LocalFs(LocalFs::new(options)))
    } else {
        Ok(Backend::RemoteFs(RemoteFs::new(parsed, options)?))
    }
}
