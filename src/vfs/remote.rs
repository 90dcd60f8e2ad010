use std::{net::SocketAddr, time::SystemTime};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use reqwest::header::HOST;
use url::Url;

use super::{
    Error, Metadata, OpenFlags, VfsOptions,
    observer::{UsedPathObserver, UsedPathObservers},
    ops::Op,
    tunnel::Tunnel,
    vfs_trait::{FileHandle, Vfs},
};

enum Session {
    Unopened,
    Open(Tunnel),
    Closed,
}

/// The remote backend: the same logical read path as [`LocalFs`], carried
/// over a forwarded connection to the root URI's host and port.
///
/// The session moves Unopened → Open → Closed. Construction does no network
/// work; [`RemoteFs::connect`] opens the tunnel, and only then does
/// [`Vfs::read_file`] work. Using the backend outside the Open state is a
/// caller bug and fails with a clear error instead of misbehaving quietly.
/// Only the read path is supported; every other operation reports
/// [`Error::Unsupported`].
///
/// [`LocalFs`]: super::LocalFs
pub struct RemoteFs {
    root: Url,
    client: reqwest::Client,
    session: Mutex<Session>,
    observers: UsedPathObservers,
}

impl RemoteFs {
    pub(super) fn new(root: Url, options: VfsOptions) -> Result<Self, Error> {
        if root.host_str().is_none() {
            return Err(Error::MissingHost {
                uri: root.to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            root,
            client,
            session: Mutex::new(Session::Unopened),
            observers: UsedPathObservers::default(),
        })
    }

    /// Opens the forward tunnel and moves the session to Open. A tunnel
    /// failure leaves the session Unopened, so the call can be retried.
    pub async fn connect(&self) -> Result<(), Error> {
        {
            match &*self.session.lock() {
                Session::Unopened => {}
                Session::Open(_) => return Err(Error::AlreadyConnected),
                Session::Closed => return Err(Error::SessionClosed),
            }
        }

        let host = self
            .root
            .host_str()
            .ok_or_else(|| Error::MissingHost {
                uri: self.root.to_string(),
            })?
            .to_string();
        let port = self.root.port_or_known_default().unwrap_or(80);

        let tunnel = Tunnel::open(&host, port)
            .await
            .map_err(|source| Error::Connect {
                host: host.clone(),
                port,
                source,
            })?;

        let mut session = self.session.lock();
        match &*session {
            Session::Unopened => {
                *session = Session::Open(tunnel);
                Ok(())
            }
            Session::Open(_) => {
                tunnel.close();
                Err(Error::AlreadyConnected)
            }
            Session::Closed => {
                tunnel.close();
                Err(Error::SessionClosed)
            }
        }
    }

    /// Closes the tunnel and moves the session to Closed. Valid once per
    /// successful [`RemoteFs::connect`].
    pub fn disconnect(&self) -> Result<(), Error> {
        let mut session = self.session.lock();

        match std::mem::replace(&mut *session, Session::Closed) {
            Session::Open(tunnel) => {
                tunnel.close();
                Ok(())
            }
            Session::Unopened => {
                *session = Session::Unopened;
                Err(Error::NotConnected)
            }
            Session::Closed => Err(Error::SessionClosed),
        }
    }

    fn tunnel_addr(&self) -> Result<SocketAddr, Error> {
        match &*self.session.lock() {
            Session::Open(tunnel) => Ok(tunnel.local_addr()),
            Session::Unopened => Err(Error::NotConnected),
            Session::Closed => Err(Error::SessionClosed),
        }
    }

    /// Joins the root URI and a logical path with exactly one separating
    /// slash.
    fn url_for_path(&self, path: &Utf8Path) -> String {
        format!(
            "{}/{}",
            self.root.as_str().trim_end_matches('/'),
            path.as_str().trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Vfs for RemoteFs {
    fn subscribe_used_paths(&self, observer: UsedPathObserver) {
        self.observers.subscribe(observer);
    }

    fn notify_used_path(&self, path: &Utf8Path, op: Op) {
        self.observers.notify(path, op);
    }

    async fn open(&self, _path: &Utf8Path, flags: OpenFlags) -> Result<FileHandle, Error> {
        let op = if flags.is_read_only() {
            Op::OpenRead
        } else {
            Op::OpenWrite
        };

        Err(Error::Unsupported(op))
    }

    async fn exists(&self, _path: &Utf8Path) -> Result<bool, Error> {
        Err(Error::Unsupported(Op::Exists))
    }

    async fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>, Error> {
        let local_addr = self.tunnel_addr()?;

        self.notify_used_path(path, Op::ReadFile);

        let logical = self.url_for_path(path);
        let parsed = Url::parse(&logical).map_err(|source| Error::InvalidUri {
            uri: logical.clone(),
            source,
        })?;

        let host = parsed
            .host_str()
            .ok_or_else(|| Error::MissingHost {
                uri: logical.clone(),
            })?
            .to_string();
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };

        // The request goes to the tunnel's local end, built from scratch so
        // the root URI's scheme never leaks into it; the Host header keeps
        // the logical authority the origin expects.
        let mut proxied = Url::parse(&format!("http://127.0.0.1:{}/", local_addr.port()))
            .map_err(|source| Error::InvalidUri {
                uri: logical.clone(),
                source,
            })?;
        proxied.set_path(parsed.path());
        proxied.set_query(parsed.query());

        let response = self
            .client
            .get(proxied)
            .header(HOST, authority)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteStatus {
                url: logical,
                status,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn read_to_string(&self, _path: &Utf8Path) -> Result<String, Error> {
        Err(Error::Unsupported(Op::ReadToString))
    }

    async fn read_dir(&self, _path: &Utf8Path) -> Result<Vec<(Utf8PathBuf, Metadata)>, Error> {
        Err(Error::Unsupported(Op::ReadDir))
    }

    async fn stat(&self, _path: &Utf8Path) -> Result<Metadata, Error> {
        Err(Error::Unsupported(Op::Stat))
    }

    async fn lstat(&self, _path: &Utf8Path) -> Result<Metadata, Error> {
        Err(Error::Unsupported(Op::Lstat))
    }

    async fn read_link(&self, _path: &Utf8Path) -> Result<Utf8PathBuf, Error> {
        Err(Error::Unsupported(Op::ReadLink))
    }

    async fn read_json(&self, _path: &Utf8Path) -> Result<serde_json::Value, Error> {
        Err(Error::Unsupported(Op::ReadJson))
    }

    async fn write_file(&self, _path: &Utf8Path, _data: &[u8]) -> Result<(), Error> {
        Err(Error::Unsupported(Op::WriteFile))
    }

    async fn append_file(&self, _path: &Utf8Path, _data: &[u8]) -> Result<(), Error> {
        Err(Error::Unsupported(Op::AppendFile))
    }

    async fn write_json(&self, _path: &Utf8Path, _value: &serde_json::Value) -> Result<(), Error> {
        Err(Error::Unsupported(Op::WriteJson))
    }

    async fn write_file_atomic(&self, _path: &Utf8Path, _data: &[u8]) -> Result<(), Error> {
        Err(Error::Unsupported(Op::WriteFileAtomic))
    }

    async fn truncate(&self, _path: &Utf8Path, _len: u64) -> Result<(), Error> {
        Err(Error::Unsupported(Op::Truncate))
    }

    async fn create_file(&self, _path: &Utf8Path) -> Result<(), Error> {
        Err(Error::Unsupported(Op::CreateFile))
    }

    async fn mkdir(&self, _path: &Utf8Path) -> Result<(), Error> {
        Err(Error::Unsupported(Op::Mkdir))
    }

    async fn rmdir(&self, _path: &Utf8Path) -> Result<(), Error> {
        Err(Error::Unsupported(Op::Rmdir))
    }

    async fn remove_file(&self, _path: &Utf8Path) -> Result<(), Error> {
        Err(Error::Unsupported(Op::RemoveFile))
    }

    async fn symlink(&self, _path: &Utf8Path, _target: &Utf8Path) -> Result<(), Error> {
        Err(Error::Unsupported(Op::Symlink))
    }

    async fn set_times(
        &self,
        _path: &Utf8Path,
        _atime: Option<SystemTime>,
        _mtime: Option<SystemTime>,
    ) -> Result<(), Error> {
        Err(Error::Unsupported(Op::SetTimes))
    }

    async fn set_permissions(&self, _path: &Utf8Path, _mode: u32) -> Result<(), Error> {
        Err(Error::Unsupported(Op::SetPermissions))
    }

    async fn rename(&self, _from: &Utf8Path, _to: &Utf8Path) -> Result<(), Error> {
        Err(Error::Unsupported(Op::Rename))
    }

    async fn copy(&self, _from: &Utf8Path, _to: &Utf8Path) -> Result<u64, Error> {
        Err(Error::Unsupported(Op::Copy))
    }
}
