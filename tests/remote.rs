use std::net::SocketAddr;

use axum::{Router, routing::get};
use camino::Utf8Path;
use portage::vfs::{self, Error, Op, VfsOptions};

const FIXTURE: &[u8] = b"portage remote fixture\n";

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn spawn_fixture_server() -> SocketAddr {
    async fn host_header(headers: axum::http::HeaderMap) -> String {
        headers
            .get(axum::http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    let app = Router::new()
        .route("/", get(|| async { FIXTURE.to_vec() }))
        .route("/host", get(host_header));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

#[tokio::test]
async fn remote_backend_reads_through_the_tunnel() {
    init_logging();
    let addr = spawn_fixture_server().await;
    let backend = vfs::open(
        &format!("http://127.0.0.1:{}", addr.port()),
        VfsOptions::default(),
    )
    .unwrap();
    assert!(!backend.is_local());

    // The factory hands the remote form back unconnected.
    assert!(matches!(
        backend.read_file(Utf8Path::new("/")).await,
        Err(Error::NotConnected)
    ));

    backend.connect().await.unwrap();
    assert_eq!(backend.read_file(Utf8Path::new("/")).await.unwrap(), FIXTURE);

    backend.disconnect().unwrap();
    assert!(matches!(
        backend.read_file(Utf8Path::new("/")).await,
        Err(Error::SessionClosed)
    ));
    assert!(matches!(backend.disconnect(), Err(Error::SessionClosed)));
}

#[tokio::test]
async fn requests_carry_the_logical_authority() {
    init_logging();
    let addr = spawn_fixture_server().await;
    let backend = vfs::open(
        &format!("http://127.0.0.1:{}", addr.port()),
        VfsOptions::default(),
    )
    .unwrap();

    backend.connect().await.unwrap();

    let host = backend.read_file(Utf8Path::new("/host")).await.unwrap();
    assert_eq!(
        String::from_utf8(host).unwrap(),
        format!("127.0.0.1:{}", addr.port())
    );

    backend.disconnect().unwrap();
}

#[tokio::test]
async fn nonstandard_schemes_read_through_the_tunnel() {
    init_logging();
    let addr = spawn_fixture_server().await;
    let backend = vfs::open(
        &format!("shelf://127.0.0.1:{}", addr.port()),
        VfsOptions::default(),
    )
    .unwrap();
    assert!(!backend.is_local());

    backend.connect().await.unwrap();

    assert_eq!(backend.read_file(Utf8Path::new("/")).await.unwrap(), FIXTURE);

    let host = backend.read_file(Utf8Path::new("/host")).await.unwrap();
    assert_eq!(
        String::from_utf8(host).unwrap(),
        format!("127.0.0.1:{}", addr.port())
    );

    backend.disconnect().unwrap();
}

#[tokio::test]
async fn non_success_statuses_are_reported_explicitly() {
    init_logging();
    let addr = spawn_fixture_server().await;
    let backend = vfs::open(
        &format!("http://127.0.0.1:{}", addr.port()),
        VfsOptions::default(),
    )
    .unwrap();

    backend.connect().await.unwrap();

    match backend.read_file(Utf8Path::new("/no/such/file")).await {
        Err(Error::RemoteStatus { status, url }) => {
            assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
            assert_eq!(url, format!("http://127.0.0.1:{}/no/such/file", addr.port()));
        }
        Err(other) => panic!("expected RemoteStatus, got {other:?}"),
        Ok(_) => panic!("expected RemoteStatus, got a body"),
    }

    backend.disconnect().unwrap();
}

#[tokio::test]
async fn disconnect_before_connect_is_rejected() {
    init_logging();
    let backend = vfs::open("http://127.0.0.1:65535", VfsOptions::default()).unwrap();

    assert!(matches!(backend.disconnect(), Err(Error::NotConnected)));
}

#[tokio::test]
async fn connecting_twice_is_rejected() {
    init_logging();
    let addr = spawn_fixture_server().await;
    let backend = vfs::open(
        &format!("http://127.0.0.1:{}", addr.port()),
        VfsOptions::default(),
    )
    .unwrap();

    backend.connect().await.unwrap();
    assert!(matches!(
        backend.connect().await,
        Err(Error::AlreadyConnected)
    ));

    backend.disconnect().unwrap();
}

#[tokio::test]
async fn unreachable_hosts_fail_the_connect_and_stay_retryable() {
    init_logging();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let vacated = listener.local_addr().unwrap();
    drop(listener);

    let backend = vfs::open(
        &format!("http://127.0.0.1:{}", vacated.port()),
        VfsOptions::default(),
    )
    .unwrap();

    assert!(matches!(
        backend.connect().await,
        Err(Error::Connect { .. })
    ));

    // A failed connect leaves the session unopened, not closed.
    assert!(matches!(
        backend.read_file(Utf8Path::new("/")).await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn writes_are_unsupported_on_the_remote_backend() {
    init_logging();
    let addr = spawn_fixture_server().await;
    let backend = vfs::open(
        &format!("http://127.0.0.1:{}", addr.port()),
        VfsOptions::default(),
    )
    .unwrap();

    backend.connect().await.unwrap();

    assert!(matches!(
        backend.write_file(Utf8Path::new("/out"), b"data").await,
        Err(Error::Unsupported(Op::WriteFile))
    ));
    assert!(matches!(
        backend.mkdir(Utf8Path::new("/dir")).await,
        Err(Error::Unsupported(Op::Mkdir))
    ));

    backend.disconnect().unwrap();
}

#[test]
fn hostless_remote_uris_are_a_construction_error() {
    let err = vfs::open("mailto:user@example.com", VfsOptions::default())
        .err()
        .expect("a hostless remote URI must not construct a backend");

    assert!(matches!(err, Error::MissingHost { .. }));
}
