//! End-to-end archive streaming over a real listener.

use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use archivist_api::ApiServer;
use archivist_archive::{ActiveStreams, ShutdownController};
use archivist_config::{ArchiverLine, ServiceConfig};
use archivist_telemetry::Metrics;
use archivist_test_support::archivers::{self, CommandLine};
use archivist_test_support::fixtures::{PhotoTree, zip_available};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownController,
    streams: ActiveStreams,
    telemetry: Metrics,
    server: JoinHandle<archivist_api::ApiServerResult<()>>,
}

impl Running {
    fn url(&self, identifier: &str) -> String {
        format!("http://{}/archive/{identifier}/", self.addr)
    }
}

fn config(root: &Path, archiver: CommandLine, chunk_size: usize) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::from_lookup(|_| None)?;
    config.photos_dir = root.to_path_buf();
    config.bind_addr = [127, 0, 0, 1].into();
    config.http_port = 1;
    config.chunk_size = chunk_size;
    config.archiver = ArchiverLine {
        program: archiver.0,
        args: archiver.1,
    };
    config.terminate_grace = Duration::from_millis(500);
    Ok(config)
}

async fn start(config: &ServiceConfig) -> Result<Running> {
    let listener = ApiServer::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    let shutdown = ShutdownController::new();
    let streams = ActiveStreams::new();
    let telemetry = Metrics::new()?;
    let server = ApiServer::new(config, telemetry.clone(), shutdown.clone(), streams.clone());
    let server = tokio::spawn(server.serve(listener));
    Ok(Running {
        addr,
        shutdown,
        streams,
        telemetry,
        server,
    })
}

#[tokio::test]
async fn concurrent_requests_receive_their_own_archives() -> Result<()> {
    let tree = PhotoTree::new()?;
    let second = tree.root().join("second");
    std::fs::create_dir_all(&second)?;
    let second_payload: Vec<u8> = (0..48_000_u32).map(|i| (i % 13) as u8 + b'a').collect();
    std::fs::write(second.join(PhotoTree::PAYLOAD), &second_payload)?;

    let running = start(&config(
        tree.root(),
        archivers::cat_file(PhotoTree::PAYLOAD),
        1024,
    )?)
    .await?;
    let client = reqwest::Client::new();

    let (first, other) = tokio::join!(
        client.get(running.url(PhotoTree::ALBUM)).send(),
        client.get(running.url("second")).send(),
    );
    let (first, other) = tokio::join!(first?.bytes(), other?.bytes());

    assert_eq!(first?.to_vec(), tree.payload_bytes()?);
    assert_eq!(other?.to_vec(), second_payload);
    Ok(())
}

#[tokio::test]
async fn zip_output_matches_standalone_run() -> Result<()> {
    if !zip_available() {
        eprintln!("skipping: zip binary not available");
        return Ok(());
    }
    let tree = PhotoTree::new()?;
    let standalone = std::process::Command::new("zip")
        .args(["-r", "-", "."])
        .current_dir(tree.album())
        .output()?;
    assert!(standalone.status.success());

    let running = start(&config(
        tree.root(),
        ("zip".to_string(), vec!["-r".into(), "-".into(), ".".into()]),
        4096,
    )?)
    .await?;
    let response = reqwest::get(running.url(PhotoTree::ALBUM)).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok()),
        Some("attachment;filename=archive.zip")
    );

    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        assert!(chunk.len() <= 4096, "chunk of {} bytes", chunk.len());
        body.extend_from_slice(&chunk);
    }
    assert_eq!(body, standalone.stdout);
    Ok(())
}

#[tokio::test]
async fn empty_directory_ends_the_body_cleanly() -> Result<()> {
    if !zip_available() {
        eprintln!("skipping: zip binary not available");
        return Ok(());
    }
    let tree = PhotoTree::new()?;
    let standalone = std::process::Command::new("zip")
        .args(["-r", "-", "."])
        .current_dir(tree.root().join(PhotoTree::EMPTY_ALBUM))
        .output()?;

    let running = start(&config(
        tree.root(),
        ("zip".to_string(), vec!["-r".into(), "-".into(), ".".into()]),
        4096,
    )?)
    .await?;
    let response = reqwest::get(running.url(PhotoTree::EMPTY_ALBUM)).await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.bytes().await?;
    assert_eq!(body.as_ref(), standalone.stdout.as_slice());

    timeout(Duration::from_secs(5), running.streams.wait_idle()).await?;
    let outcome = if standalone.status.success() {
        "completed"
    } else {
        "exited_nonzero"
    };
    assert!(
        running
            .telemetry
            .render()?
            .contains(&format!("archive_streams_total{{outcome=\"{outcome}\"}} 1"))
    );
    Ok(())
}

#[tokio::test]
async fn client_disconnect_terminates_archiver() -> Result<()> {
    let tree = PhotoTree::new()?;
    let pid_file = tree.root().join("archiver.pid");
    let running = start(&config(
        tree.root(),
        archivers::endless_recording_pid(&pid_file),
        8192,
    )?)
    .await?;

    let response = reqwest::get(running.url(PhotoTree::ALBUM)).await?;
    let mut stream = response.bytes_stream();
    let first = stream
        .next()
        .await
        .ok_or_else(|| anyhow!("no first chunk"))??;
    assert!(!first.is_empty());
    let pid = archivers::read_pid(&pid_file, Duration::from_secs(2))
        .await
        .ok_or_else(|| anyhow!("archiver never recorded its pid"))?;
    assert!(archivers::process_alive(pid));

    drop(stream);

    assert!(
        archivers::wait_until_gone(pid, Duration::from_secs(5)).await,
        "archiver {pid} survived the disconnect"
    );
    timeout(Duration::from_secs(5), running.streams.wait_idle()).await?;
    assert!(
        running
            .telemetry
            .render()?
            .contains("archive_streams_total{outcome=\"cancelled\"} 1")
    );
    Ok(())
}

#[tokio::test]
async fn delay_mode_paces_chunks_without_changing_content() -> Result<()> {
    let tree = PhotoTree::new()?;
    let archiver = archivers::cat_file("2.jpg");
    let delay = Duration::from_millis(100);

    let fast = start(&config(tree.root(), archiver.clone(), 1024)?).await?;
    let fast_body = reqwest::get(fast.url(PhotoTree::ALBUM)).await?.bytes().await?;

    let mut delayed_config = config(tree.root(), archiver, 1024)?.with_delay(true);
    delayed_config.delay_interval = delay;
    let slow = start(&delayed_config).await?;

    let started = Instant::now();
    let response = reqwest::get(slow.url(PhotoTree::ALBUM)).await?;
    let mut stream = response.bytes_stream();
    let mut chunks = 0_u32;
    let mut slow_body = Vec::new();
    while let Some(chunk) = stream.next().await {
        slow_body.extend_from_slice(&chunk?);
        chunks += 1;
    }
    let elapsed = started.elapsed();

    assert_eq!(slow_body, fast_body.to_vec());
    assert!(chunks >= 1);
    assert!(
        elapsed >= delay * chunks.saturating_sub(1),
        "{chunks} chunks arrived in {elapsed:?}"
    );
    assert!(elapsed >= delay * 2, "3 KiB at 1 KiB per chunk should pause at least twice");
    Ok(())
}

#[tokio::test]
async fn shutdown_drains_then_aborts_streams() -> Result<()> {
    let tree = PhotoTree::new()?;
    let pid_file = tree.root().join("archiver.pid");
    let running = start(&config(
        tree.root(),
        archivers::endless_recording_pid(&pid_file),
        8192,
    )?)
    .await?;

    let response = reqwest::get(running.url(PhotoTree::ALBUM)).await?;
    let mut stream = response.bytes_stream();
    stream
        .next()
        .await
        .ok_or_else(|| anyhow!("no first chunk"))??;
    let pid = archivers::read_pid(&pid_file, Duration::from_secs(2))
        .await
        .ok_or_else(|| anyhow!("archiver never recorded its pid"))?;

    let reader = tokio::spawn(async move {
        let mut failed = false;
        while let Some(chunk) = stream.next().await {
            if chunk.is_err() {
                failed = true;
                break;
            }
        }
        failed
    });

    running.shutdown.begin_drain();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!running.server.is_finished(), "draining must wait for streams");
    assert!(archivers::process_alive(pid));

    running.shutdown.abort_streams();
    assert!(archivers::wait_until_gone(pid, Duration::from_secs(5)).await);
    assert!(timeout(Duration::from_secs(5), reader).await??, "client saw a clean end");
    timeout(Duration::from_secs(5), running.server).await???;
    assert_eq!(running.streams.count(), 0);
    Ok(())
}
