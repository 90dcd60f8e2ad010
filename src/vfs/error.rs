use std::{io, path::PathBuf};

use thiserror::Error;

use super::ops::Op;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid URI {uri:?}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
    #[error("URI {uri:?} has no host to tunnel to")]
    MissingHost { uri: String },
    #[error("couldn't reach {host}:{port}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("transport error")]
    Transport(#[from] reqwest::Error),
    #[error("remote returned {status} for {url}")]
    RemoteStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("backend is not connected")]
    NotConnected,
    #[error("backend is already connected")]
    AlreadyConnected,
    #[error("backend session is closed")]
    SessionClosed,
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
    #[error("non-UTF-8 path")]
    InvalidPath(PathBuf),
    #[error("operation {0} is not supported by this backend")]
    Unsupported(Op),
}
