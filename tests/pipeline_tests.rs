//! End-to-end runs against a local check endpoint.

use proxyprobe::{CheckSettings, Error, HttpTransport, IptestRunner, OutputPaths, Pipeline};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the stub answers for one `proxyip` value.
#[derive(Clone)]
enum Reply {
    Json(&'static str),
    Status(u16, &'static str),
    Hang,
}

/// Minimal HTTP/1.1 server standing in for the check service.
async fn spawn_check_service(replies: &[(&'static str, Reply)]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let replies: Arc<HashMap<&'static str, Reply>> = Arc::new(replies.iter().cloned().collect());

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let replies = Arc::clone(&replies);
            tokio::spawn(serve(stream, replies));
        }
    });

    format!("http://{addr}/check")
}

async fn serve(mut stream: TcpStream, replies: Arc<HashMap<&'static str, Reply>>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let request = String::from_utf8_lossy(&request);
    let target = request.split_whitespace().nth(1).unwrap_or_default();
    let proxyip = target.split("proxyip=").nth(1).unwrap_or_default();

    let (status, body) = match replies.get(proxyip) {
        Some(Reply::Json(body)) => (200, *body),
        Some(Reply::Status(status, body)) => (*status, *body),
        Some(Reply::Hang) => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return;
        }
        None => (404, "not found"),
    };

    let response = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn write_input(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

async fn run(input: &PathBuf, settings: CheckSettings) -> proxyprobe::Result<proxyprobe::RunSummary> {
    let paths = OutputPaths::for_input(input, None)?;
    let transport = HttpTransport::new(settings.timeout())?;
    Pipeline::new(paths, settings, transport)?
        .run(input, None::<&IptestRunner>, |_, _| {})
        .await
}

#[tokio::test]
async fn test_two_candidates_ranked_and_partitioned() {
    let url = spawn_check_service(&[
        ("1.1.1.1:443", Reply::Json(r#"{"success":true,"responseTime":120}"#)),
        ("2.2.2.2:8443", Reply::Json(r#"{"success":true,"responseTime":500}"#)),
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "pool.txt", "2.2.2.2 8443\n1.1.1.1 443\n");
    let settings = CheckSettings {
        check_url: url,
        ..CheckSettings::default()
    };

    let summary = run(&input, settings).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.preferred, 1);

    assert_eq!(
        std::fs::read_to_string(&summary.success_path).unwrap(),
        "1.1.1.1:443#120ms\n2.2.2.2:8443#500ms\n"
    );
    assert_eq!(
        std::fs::read_to_string(&summary.preferred_path).unwrap(),
        "1.1.1.1:443#120ms\n"
    );
    assert_eq!(summary.success_path, dir.path().join("pool").join("pool_success.txt"));
}

#[tokio::test]
async fn test_failures_stay_isolated() {
    let url = spawn_check_service(&[
        ("10.0.0.1:443", Reply::Json(r#"{"success":true,"responseTime":80.6}"#)),
        ("10.0.0.2:443", Reply::Hang),
        ("10.0.0.3:443", Reply::Status(502, "<html>bad gateway</html>")),
        ("10.0.0.4:443", Reply::Json(r#"{"success":false,"responseTime":40}"#)),
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        &dir,
        "mixed.txt",
        "10.0.0.1 443\n10.0.0.2 443\n10.0.0.3 443\n10.0.0.4 443\n",
    );
    let settings = CheckSettings {
        check_url: url,
        timeout_secs: 1,
        ..CheckSettings::default()
    };

    let summary = run(&input, settings).await.unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(
        std::fs::read_to_string(&summary.success_path).unwrap(),
        "10.0.0.1:443#81ms\n"
    );

    let log = std::fs::read_to_string(&summary.log_path).unwrap();
    assert_eq!(log.matches("--- proxy: ").count(), 4);
    assert!(log.contains("--- proxy: 10.0.0.2:443 ---\nSTDOUT: \nSTDERR: request timed out\nStatus: -1\n"));
    assert!(log.contains("STDOUT: <html>bad gateway</html>\nSTDERR: response parse failure"));
}

#[tokio::test]
async fn test_csv_input_with_datacenter_filter() {
    let url = spawn_check_service(&[
        ("1.1.1.1:443", Reply::Json(r#"{"success":true,"responseTime":100}"#)),
        ("2.2.2.2:443", Reply::Json(r#"{"success":true,"responseTime":90}"#)),
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        &dir,
        "export.csv",
        "IP Address,Port,Datacenter\n1.1.1.1,443,HKG\n2.2.2.2,443,SJC\n",
    );
    let settings = CheckSettings {
        check_url: url,
        preferred_datacenter: "HKG".into(),
        ..CheckSettings::default()
    };

    let summary = run(&input, settings).await.unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("export").join("export.txt")).unwrap(),
        "1.1.1.1 443\n"
    );
}

#[tokio::test]
async fn test_empty_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "empty.txt", "");

    let err = run(&input, CheckSettings::default()).await.unwrap_err();
    assert!(matches!(err, Error::NoCandidates(_)));
    assert!(err.to_string().contains("no valid candidates"));
}
