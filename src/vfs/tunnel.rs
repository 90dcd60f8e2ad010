use std::{io, net::SocketAddr};

use tokio::{
    io::copy_bidirectional,
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tracing::{Level, event};

/// A forward tunnel from an ephemeral local port to a fixed remote peer.
///
/// Every connection accepted on the local port is piped byte-for-byte to
/// `host:port`. The target must be reachable at open time; an unreachable
/// peer fails the open rather than the first request issued through it.
pub(super) struct Tunnel {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl Tunnel {
    pub(super) async fn open(host: &str, port: u16) -> io::Result<Self> {
        // Probe the target before exposing a local port that forwards into
        // nothing.
        TcpStream::connect((host, port)).await?;

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_addr = listener.local_addr()?;
        let target = (host.to_string(), port);

        let accept_task = tokio::spawn(async move {
            loop {
                let (mut inbound, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        event!(Level::DEBUG, ?err, "tunnel accept failed");
                        break;
                    }
                };
                let (host, port) = target.clone();

                tokio::spawn(async move {
                    let mut outbound = match TcpStream::connect((host.as_str(), port)).await {
                        Ok(stream) => stream,
                        Err(err) => {
                            event!(Level::DEBUG, ?err, "tunnel target refused connection");
                            return;
                        }
                    };

                    if let Err(err) = copy_bidirectional(&mut inbound, &mut outbound).await {
                        event!(Level::TRACE, ?err, "tunnel stream closed");
                    }
                });
            }
        });

        Ok(Self {
            local_addr,
            accept_task,
        })
    }

    pub(super) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections. Streams already being forwarded run
    /// until either side closes.
    pub(super) fn close(&self) {
        self.accept_task.abort();
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn forwards_bytes_to_the_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut sock, _) = listener.accept().await.unwrap();

                tokio::spawn(async move {
                    let (mut reader, mut writer) = sock.split();
                    let _ = tokio::io::copy(&mut reader, &mut writer).await;
                });
            }
        });

        let tunnel = Tunnel::open("127.0.0.1", target.port()).await.unwrap();

        let mut stream = TcpStream::connect(tunnel.local_addr()).await.unwrap();
        stream.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();

        assert_eq!(&buf, b"ping");

        tunnel.close();
    }

    #[tokio::test]
    async fn unreachable_target_fails_the_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let vacated = listener.local_addr().unwrap();
        drop(listener);

        assert!(Tunnel::open("127.0.0.1", vacated.port()).await.is_err());
    }
}
