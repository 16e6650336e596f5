use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::tempdir;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fabric-deploy"))
        .args(args)
        .env_remove("FABRIC_TENANT_ID")
        .env_remove("FABRIC_CLIENT_ID")
        .env_remove("FABRIC_CLIENT_SECRET")
        .output()
        .expect("run fabric-deploy")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_ok(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
}

fn assert_err_contains(output: &Output, needle: &str) {
    assert!(
        !output.status.success(),
        "expected failure, stdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
    let text = format!("{}{}", stdout(output), stderr(output));
    assert!(
        text.contains(needle),
        "expected error to contain `{needle}`, got:\n{text}"
    );
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, content).expect("write file");
}

const MODEL_BIM: &str = r#"{
  "model": {
    "tables": [
      {
        "name": "Orders",
        "partitions": [
          {
            "source": {
              "type": "m",
              "expression": "let Source = Sql.Database(\"oldsrv\", \"olddb\") in Source"
            }
          }
        ]
      }
    ]
  }
}"#;

fn write_artifacts(root: &Path) {
    write(&root.join("PowerBI/Sales.SemanticModel/model.bim"), MODEL_BIM);
    write(
        &root.join("PowerBI/Sales.SemanticModel/definition.pbism"),
        "{\"version\":\"4.0\"}",
    );
    write(&root.join("PowerBI/Sales.Report/report.json"), "{}");
    write(
        &root.join("PowerBI/Sales.Report/definition.pbir"),
        r#"{"version":"4.0","datasetReference":{"byPath":{"path":"../Sales.SemanticModel"}}}"#,
    );
    write(&root.join("PowerBI/Marketing.SemanticModel/model.bim"), MODEL_BIM);
}

fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

fn write_config(dir: &Path, authority: &str) -> PathBuf {
    write_config_with_api(dir, &format!("  authority: {authority}\n"))
}

fn write_config_with_api(dir: &Path, api: &str) -> PathBuf {
    let path = dir.join("deploy.yaml");
    write(
        &path,
        &format!(
            r#"
tenant_id: tenant-1
client_id: client-1
client_secret: s3cret
artifact_roots: [artifacts]
environments:
  Test:
    workspace_name: Sales Test
    warehouse:
      server: test.datawarehouse.fabric.microsoft.com
      database: SalesDW
deployment:
  poll_max_wait_seconds: 1
  poll_interval_seconds: 1
api:
{api}  request_timeout_seconds: 2
"#
        ),
    );
    path
}

// Answers token, workspace and item requests by path; every other POST succeeds
// with an empty object. Items named `Sales` already exist in workspace `ws-1`.
fn route(method: &str, path: &str) -> (&'static str, String) {
    let ok = "200 OK";
    match (method, path) {
        ("POST", p) if p.ends_with("/oauth2/v2.0/token") => {
            (ok, r#"{"access_token":"tok-1"}"#.to_string())
        }
        ("GET", "/fabric/v1/workspaces") => (
            ok,
            r#"{"value":[{"id":"ws-1","displayName":"Sales Test"}]}"#.to_string(),
        ),
        ("GET", "/fabric/v1/workspaces/ws-1") => {
            (ok, r#"{"id":"ws-1","displayName":"Sales Test"}"#.to_string())
        }
        ("GET", "/fabric/v1/workspaces/ws-1/semanticModels") => (
            ok,
            r#"{"value":[{"id":"model-1","displayName":"Sales"}]}"#.to_string(),
        ),
        ("GET", "/fabric/v1/workspaces/ws-1/reports") => (
            ok,
            r#"{"value":[{"id":"report-1","displayName":"Sales"}]}"#.to_string(),
        ),
        ("POST", _) => (ok, "{}".to_string()),
        _ => ("404 Not Found", r#"{"errorCode":"NotFound"}"#.to_string()),
    }
}

fn answer(stream: TcpStream, seen: &Mutex<Vec<String>>) {
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
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("read body");

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    seen.lock().expect("lock").push(format!("{method} {path}"));

    let (status, reply) = route(&method, &path);
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
        reply.len()
    )
    .expect("write reply");
}

fn spawn_fabric_mock() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            answer(stream, &recorded);
        }
    });
    (base, seen)
}

#[test]
fn help_and_no_args_print_usage() {
    for args in [&[][..], &["help"][..], &["--help"][..]] {
        let output = run(args);
        assert_ok(&output);
        let text = stdout(&output);
        assert!(text.contains("Usage: fabric-deploy <command>"));
        assert!(text.contains("deploy <env> <config.yaml>"));
    }
}

#[test]
fn unknown_command_fails_with_help() {
    let output = run(&["publish"]);
    assert_err_contains(&output, "unknown command `publish`");
    assert_err_contains(&output, "Usage: fabric-deploy");
}

#[test]
fn discover_lists_valid_and_invalid_bundles() {
    let temp = tempdir().expect("tempdir");
    write_artifacts(&temp.path().join("artifacts"));
    let config = write_config(temp.path(), "https://login.example.invalid");

    let output = run(&["discover", config.to_str().expect("utf8 path")]);
    assert_ok(&output);
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("Marketing  invalid"), "{text}");
    assert!(lines[1].starts_with("Sales  valid"), "{text}");
    assert!(text.contains("1/2 bundle(s) valid"));
}

#[test]
fn deploy_with_missing_config_fails_preflight() {
    let temp = tempdir().expect("tempdir");
    let missing = temp.path().join("absent.yaml");
    let output = run(&["deploy", "Test", missing.to_str().expect("utf8 path")]);
    assert_err_contains(&output, "pre-flight failed");
}

#[test]
fn deploy_to_unknown_environment_fails_preflight() {
    let temp = tempdir().expect("tempdir");
    write_artifacts(&temp.path().join("artifacts"));
    let config = write_config(temp.path(), &unused_local_url());

    let output = run(&["deploy", "Prod", config.to_str().expect("utf8 path")]);
    assert_err_contains(&output, "pre-flight failed: environment `Prod` is not configured");
}

#[test]
fn deploy_stops_when_no_token_can_be_acquired() {
    let temp = tempdir().expect("tempdir");
    write_artifacts(&temp.path().join("artifacts"));
    let config = write_config(temp.path(), &unused_local_url());

    let output = run(&["deploy", "test", config.to_str().expect("utf8 path")]);
    assert_err_contains(&output, "pre-flight failed: authentication failed");
    assert!(!format!("{}{}", stdout(&output), stderr(&output)).contains("s3cret"));

    let log = fs::read_to_string(temp.path().join(".fabric-deploy/logs/deploy.log"))
        .expect("read deploy log");
    assert!(log.contains("preflight.failed"));
}

#[test]
fn deploy_exits_non_zero_when_one_bundle_fails() {
    let temp = tempdir().expect("tempdir");
    write_artifacts(&temp.path().join("artifacts"));
    let (base, seen) = spawn_fabric_mock();
    let config = write_config_with_api(
        temp.path(),
        &format!(
            "  authority: {base}\n  fabric_base: {base}/fabric/v1\n  powerbi_base: {base}/powerbi\n"
        ),
    );

    let output = run(&["deploy", "Test", config.to_str().expect("utf8 path")]);
    assert_err_contains(&output, "[SUCCESS] Sales");
    assert_err_contains(&output, "[FAILED] Marketing at validate_bundle");
    assert_err_contains(&output, "1/2 bundle(s) deployed; failed: Marketing");

    let seen = seen.lock().expect("lock").clone();
    let update = "POST /fabric/v1/workspaces/ws-1/semanticModels/model-1/updateDefinition";
    assert!(seen.iter().any(|line| line == update), "{seen:?}");
    assert!(
        !seen.iter().any(|line| line.contains("Marketing")),
        "{seen:?}"
    );
}

#[test]
fn rewrite_prints_retargeted_definition() {
    let temp = tempdir().expect("tempdir");
    write_artifacts(&temp.path().join("artifacts"));
    let config = write_config(temp.path(), "https://login.example.invalid");
    let model = temp
        .path()
        .join("artifacts/PowerBI/Sales.SemanticModel/model.bim");

    let output = run(&[
        "rewrite",
        "Test",
        config.to_str().expect("utf8 path"),
        model.to_str().expect("utf8 path"),
    ]);
    assert_ok(&output);
    let text = stdout(&output);
    assert!(text.contains(
        r#"Sql.Database(\"test.datawarehouse.fabric.microsoft.com\", \"SalesDW\")"#
    ));
    assert!(stderr(&output).contains("1 connection(s) retargeted"));
    assert_eq!(
        fs::read_to_string(&model).expect("read model"),
        MODEL_BIM,
        "rewrite preview leaves the file untouched"
    );
}

#[test]
fn rewrite_requires_all_arguments() {
    let output = run(&["rewrite", "Test"]);
    assert_err_contains(&output, "usage: fabric-deploy rewrite");
}
