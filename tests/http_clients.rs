// HTTP client tests against a one-shot loopback server.
//
// Each test binds 127.0.0.1:0, answers exactly one request with a canned
// response and hands the raw request text back for inspection.

use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use keystone::scoring::metrics::DomainMetricsProvider;
use keystone::scoring::rdap::RdapClient;
use keystone::topics::download::download_to;

async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
        String::from_utf8_lossy(&request).to_string()
    });

    (format!("http://{addr}"), handle)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("keystone-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================
// RDAP
// ============================================================

#[tokio::test]
async fn rdap_registration_event_becomes_domain_age() {
    let (base, request) = serve_once(
        "200 OK",
        r#"{"objectClassName":"domain","ldhName":"EXAMPLE.COM","events":[
            {"eventAction":"registration","eventDate":"2000-01-01T00:00:00Z"},
            {"eventAction":"expiration","eventDate":"2031-01-01T00:00:00Z"}]}"#,
    )
    .await;

    let rdap = RdapClient::with_client(client(), &base);
    let metrics = rdap.get_domain_metrics("blog.example.com").await.unwrap().unwrap();

    let age = metrics.domain_age_years.unwrap();
    assert!(age > 20.0 && age < 200.0, "got {age}");
    assert_eq!(metrics.domain_authority, None);

    let request = request.await.unwrap().to_lowercase();
    assert!(request.starts_with("get /domain/example.com "), "{request}");
    assert!(request.contains("accept: application/rdap+json"));
}

#[tokio::test]
async fn rdap_unknown_domain_is_no_data() {
    let (base, _request) = serve_once("404 Not Found", r#"{"errorCode":404}"#).await;
    let rdap = RdapClient::with_client(client(), &base);
    assert_eq!(rdap.get_domain_metrics("unregistered.example").await.unwrap(), None);
}

#[tokio::test]
async fn rdap_server_error_is_an_error() {
    let (base, _request) = serve_once("503 Service Unavailable", "{}").await;
    let rdap = RdapClient::with_client(client(), &base);
    let err = rdap.get_domain_metrics("example.com").await.unwrap_err();
    assert!(err.to_string().contains("503"), "{err}");
}

#[tokio::test]
async fn rdap_without_registration_event_is_no_data() {
    let (base, _request) = serve_once("200 OK", r#"{"events":[]}"#).await;
    let rdap = RdapClient::with_client(client(), &base);
    assert_eq!(rdap.get_domain_metrics("example.com").await.unwrap(), None);
}

// ============================================================
// Model download
// ============================================================

#[tokio::test]
async fn download_streams_body_into_place() {
    let (base, _request) = serve_once("200 OK", "not really an onnx model").await;
    let dir = scratch_dir("download-ok");
    let dest = dir.join("model.onnx");

    let written = download_to(&client(), &format!("{base}/onnx/model.onnx"), &dest, true)
        .await
        .unwrap();

    assert_eq!(written, 24);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "not really an onnx model");
    assert!(!dest.with_extension("part").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn failed_download_leaves_nothing_behind() {
    let (base, _request) = serve_once("404 Not Found", "missing").await;
    let dir = scratch_dir("download-missing");
    let dest = dir.join("tokenizer.json");

    let err = download_to(&client(), &format!("{base}/tokenizer.json"), &dest, false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("404"), "{err}");
    assert!(!dest.exists());
    assert!(!dest.with_extension("part").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}
