use std::{
    os::unix::fs::PermissionsExt,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::AsyncWriteExt;

use super::{
    Error, Metadata, OpenFlags, VfsOptions,
    observer::{UsedPathObserver, UsedPathObservers},
    ops::Op,
    vfs_trait::{FileHandle, Vfs},
};

/// The local-disk backend.
///
/// Paths are handed to the underlying primitives untouched; the root URI's
/// path component is advisory and callers resolve against it themselves.
/// Every path-bearing call consults [`Op::path_arg`] and reports the path to
/// the registered observers before the primitive runs.
pub struct LocalFs {
    options: VfsOptions,
    observers: UsedPathObservers,
}

impl LocalFs {
    pub fn new(options: VfsOptions) -> Self {
        Self {
            options,
            observers: UsedPathObservers::default(),
        }
    }

    pub fn options(&self) -> &VfsOptions {
        &self.options
    }

    fn observe(&self, op: Op, path: &Utf8Path) {
        if op.path_arg().is_some() {
            self.notify_used_path(path, op);
        }
    }

    fn temp_sibling(path: &Utf8Path) -> Utf8PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        Utf8PathBuf::from(format!(
            "{path}~{millis}.{token:08x}",
            token = rand::random::<u32>()
        ))
    }
}

#[async_trait]
impl Vfs for LocalFs {
    fn subscribe_used_paths(&self, observer: UsedPathObserver) {
        self.observers.subscribe(observer);
    }

    fn notify_used_path(&self, path: &Utf8Path, op: Op) {
        self.observers.notify(path, op);
    }

    async fn open(&self, path: &Utf8Path, flags: OpenFlags) -> Result<FileHandle, Error> {
        let op = if flags.is_read_only() {
            Op::OpenRead
        } else {
            Op::OpenWrite
        };
        self.observe(op, path);

        let file = tokio::fs::OpenOptions::from(flags).open(path).await?;

        Ok(FileHandle::new(file))
    }

    async fn exists(&self, path: &Utf8Path) -> Result<bool, Error> {
        self.observe(Op::Exists, path);

        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>, Error> {
        self.observe(Op::ReadFile, path);

        Ok(tokio::fs::read(path).await?)
    }

    async fn read_to_string(&self, path: &Utf8Path) -> Result<String, Error> {
        self.observe(Op::ReadToString, path);

        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn read_dir(&self, path: &Utf8Path) -> Result<Vec<(Utf8PathBuf, Metadata)>, Error> {
        self.observe(Op::ReadDir, path);

        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let name = Utf8PathBuf::from_path_buf(PathBuf::from(entry.file_name()))
                .map_err(Error::InvalidPath)?;
            let metadata = entry.metadata().await?;

            entries.push((name, Metadata::from(metadata)));
        }

        Ok(entries)
    }

    async fn stat(&self, path: &Utf8Path) -> Result<Metadata, Error> {
        self.observe(Op::Stat, path);

        let metadata = tokio::fs::metadata(path).await?;

        Ok(Metadata::from(metadata))
    }

    async fn lstat(&self, path: &Utf8Path) -> Result<Metadata, Error> {
        self.observe(Op::Lstat, path);

        let metadata = tokio::fs::symlink_metadata(path).await?;

        Ok(Metadata::from(metadata))
    }

    async fn read_link(&self, path: &Utf8Path) -> Result<Utf8PathBuf, Error> {
        self.observe(Op::ReadLink, path);

        let target = tokio::fs::read_link(path).await?;

        Utf8PathBuf::from_path_buf(target).map_err(Error::InvalidPath)
    }

    async fn read_json(&self, path: &Utf8Path) -> Result<serde_json::Value, Error> {
        self.observe(Op::ReadJson, path);

        let raw = tokio::fs::read(path).await?;

        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write_file(&self, path: &Utf8Path, data: &[u8]) -> Result<(), Error> {
        self.observe(Op::WriteFile, path);

        Ok(tokio::fs::write(path, data).await?)
    }

    async fn append_file(&self, path: &Utf8Path, data: &[u8]) -> Result<(), Error> {
        self.observe(Op::AppendFile, path);

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        file.write_all(data).await?;

        Ok(())
    }

    async fn write_json(&self, path: &Utf8Path, value: &serde_json::Value) -> Result<(), Error> {
        self.observe(Op::WriteJson, path);

        let raw = serde_json::to_vec(value)?;

        Ok(tokio::fs::write(path, raw).await?)
    }

    async fn write_file_atomic(&self, path: &Utf8Path, data: &[u8]) -> Result<(), Error> {
        self.observe(Op::WriteFileAtomic, path);

        let temp = Self::temp_sibling(path);

        tokio::fs::write(&temp, data).await?;

        // The target usually doesn't exist yet, so the outcome of the
        // removal is ignored either way.
        let _ = tokio::fs::remove_file(path).await;

        // A failed rename leaves the temp sibling behind.
        tokio::fs::rename(&temp, path).await?;

        Ok(())
    }

    async fn truncate(&self, path: &Utf8Path, len: u64) -> Result<(), Error> {
        self.observe(Op::Truncate, path);

        let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
        file.set_len(len).await?;

        Ok(())
    }

    async fn create_file(&self, path: &Utf8Path) -> Result<(), Error> {
        self.observe(Op::CreateFile, path);

        tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)
            .await?;

        Ok(())
    }

    async fn mkdir(&self, path: &Utf8Path) -> Result<(), Error> {
        self.observe(Op::Mkdir, path);

        Ok(tokio::fs::create_dir(path).await?)
    }

    async fn rmdir(&self, path: &Utf8Path) -> Result<(), Error> {
        self.observe(Op::Rmdir, path);

        Ok(tokio::fs::remove_dir(path).await?)
    }

    async fn remove_file(&self, path: &Utf8Path) -> Result<(), Error> {
        self.observe(Op::RemoveFile, path);

        Ok(tokio::fs::remove_file(path).await?)
    }

    async fn symlink(&self, path: &Utf8Path, target: &Utf8Path) -> Result<(), Error> {
        self.observe(Op::Symlink, path);

        Ok(tokio::fs::symlink(target, path).await?)
    }

    async fn set_times(
        &self,
        path: &Utf8Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> Result<(), Error> {
        use fs_set_times::SystemTimeSpec;

        self.observe(Op::SetTimes, path);

        let path = path.to_owned();
        let atime = atime.map(SystemTimeSpec::Absolute);
        let mtime = mtime.map(SystemTimeSpec::Absolute);

        tokio::task::spawn_blocking(move || {
            fs_set_times::set_times(path.as_std_path(), atime, mtime).map_err(Error::from)
        })
        .await
        .unwrap_or_else(|e| {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }

            panic!("task failed: {e}");
        })?;

        Ok(())
    }

    async fn set_permissions(&self, path: &Utf8Path, mode: u32) -> Result<(), Error> {
        self.observe(Op::SetPermissions, path);

        Ok(tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?)
    }

    async fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> Result<(), Error> {
        self.observe(Op::Rename, from);

        Ok(tokio::fs::rename(from, to).await?)
    }

    async fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> Result<u64, Error> {
        self.observe(Op::Copy, from);

        Ok(tokio::fs::copy(from, to).await?)
    }
}
