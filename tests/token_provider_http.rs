use fabric_deploy::auth::{AuthError, TokenProvider};
use fabric_deploy::config::Credentials;
use fabric_deploy::shared::DeployLog;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

type Seen = Arc<Mutex<Vec<(String, String)>>>;

fn spawn_token_server(replies: Vec<(&'static str, String)>) -> (String, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);

    thread::spawn(move || {
        for (status_line, body) in replies {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            reader
                .read_line(&mut request_line)
                .expect("read request line");
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read header line");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("content length");
                    }
                }
            }
            let mut form = vec![0u8; content_length];
            reader.read_exact(&mut form).expect("read form");
            recorded.lock().expect("lock").push((
                request_line.trim().to_string(),
                String::from_utf8_lossy(&form).to_string(),
            ));

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream
                .write_all(response.as_bytes())
                .expect("write response");
        }
    });

    (base, seen)
}

fn credentials() -> Credentials {
    Credentials {
        tenant_id: "tenant-1".to_string(),
        client_id: "client-1".to_string(),
        client_secret: "s3cret".to_string(),
    }
}

#[test]
fn falls_back_to_next_scope_when_first_exchange_fails() {
    let (base, seen) = spawn_token_server(vec![
        (
            "400 Bad Request",
            r#"{"error":"invalid_scope"}"#.to_string(),
        ),
        ("200 OK", r#"{"access_token":"tok-2","expires_in":3599}"#.to_string()),
    ]);
    let state = tempdir().expect("tempdir");
    let log = DeployLog::new(state.path()).with_echo(false);

    let token = TokenProvider::new(&base, Duration::from_secs(5))
        .acquire_token(&credentials(), &log)
        .expect("token");

    assert_eq!(token.secret(), "tok-2");
    let seen = seen.lock().expect("lock");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, "POST /tenant-1/oauth2/v2.0/token HTTP/1.1");
    assert!(seen[0].1.contains("grant_type=client_credentials"));
    assert!(seen[0].1.contains("api.fabric.microsoft.com"));
    assert!(seen[1].1.contains("analysis.windows.net"));

    let log_text = std::fs::read_to_string(log.path().expect("log path")).expect("read log");
    assert!(log_text.contains("auth.strategy_failed"));
    assert!(log_text.contains("auth.token_acquired"));
    assert!(!log_text.contains("s3cret"));
}

#[test]
fn every_strategy_failing_reports_each_attempt() {
    let (base, seen) = spawn_token_server(vec![
        ("401 Unauthorized", r#"{"error":"invalid_client"}"#.to_string()),
        ("401 Unauthorized", r#"{"error":"invalid_client"}"#.to_string()),
        ("200 OK", r#"{"token_type":"Bearer"}"#.to_string()),
    ]);

    let err = TokenProvider::new(&base, Duration::from_secs(5))
        .acquire_token(&credentials(), &DeployLog::silent())
        .expect_err("exhausted");

    match err {
        AuthError::Exhausted { attempts } => {
            assert_eq!(attempts.len(), 3);
            assert!(attempts[0].starts_with("fabric-scope-v2: status 401"));
            assert!(attempts[2].contains("did not contain an access_token"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let seen = seen.lock().expect("lock");
    assert_eq!(seen[2].0, "POST /tenant-1/oauth2/token HTTP/1.1");
    assert!(seen[2].1.contains("resource="));
}
