use predicates::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use tempfile::tempdir;

fn serve_one_completion(reply: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("read line");
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().expect("length");
            }
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).expect("read body");

        let envelope = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })
        .to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{envelope}",
            envelope.len()
        );
        let mut stream = stream;
        stream.write_all(response.as_bytes()).expect("write");
        String::from_utf8_lossy(&body).to_string()
    });
    (format!("http://{addr}/v1"), handle)
}

fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}/v1")
}

fn write_snapshot(path: &Path) {
    let snapshot = serde_json::json!([
        {"id": 1, "title": "Long", "content": format!("<p>{}</p>", "a".repeat(220)), "feed_id": 3, "owner_uid": 7},
        {"id": 2, "title": "Short", "content": "<p>only a few words</p>", "feed_id": 3, "owner_uid": 7}
    ]);
    fs::write(path, snapshot.to_string()).expect("write snapshot");
}

fn base_cmd(home: &Path, base_url: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tldr-autotag");
    cmd.env_clear()
        .current_dir(home)
        .env("TLDR_HOME", home)
        .env("TLDR_OPENAI_API_KEY", "sk-test")
        .env("TLDR_OPENAI_BASE_URL", base_url);
    cmd
}

#[test]
fn summarize_returns_tldr_html() {
    let tmp = tempdir().expect("tempdir");
    let snapshot = tmp.path().join("articles.json");
    write_snapshot(&snapshot);
    let (base_url, server) = serve_one_completion("A crisp summary.");

    let output = base_cmd(tmp.path(), &base_url)
        .args(["summarize", "--id", "1", "--owner", "7", "--articles"])
        .arg(&snapshot)
        .assert()
        .success()
        .get_output()
        .clone();

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let html = payload["tldr_html"].as_str().expect("tldr_html");
    assert!(html.contains("<p>A crisp summary.</p>"));

    let request: serde_json::Value =
        serde_json::from_str(&server.join().expect("server")).expect("request");
    let prompt = request["messages"][1]["content"].as_str().expect("prompt");
    assert!(prompt.contains("The title of the article is \"Long\"."));
}

#[test]
fn summarize_reports_too_short_article() {
    let tmp = tempdir().expect("tempdir");
    let snapshot = tmp.path().join("articles.json");
    write_snapshot(&snapshot);

    base_cmd(tmp.path(), &closed_endpoint())
        .args(["summarize", "--id", "2", "--owner", "7", "--articles"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error\": \"article_too_short\""))
        .stdout(predicate::str::contains("min: 200 chars, found: 16 chars"));
}

#[test]
fn summarize_hides_other_owners_articles() {
    let tmp = tempdir().expect("tempdir");
    let snapshot = tmp.path().join("articles.json");
    write_snapshot(&snapshot);

    base_cmd(tmp.path(), &closed_endpoint())
        .args(["summarize", "--id", "1", "--owner", "8", "--articles"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stdout(predicate::str::contains("article_not_found"));
}

#[test]
fn summarize_without_id_reports_missing_id() {
    let tmp = tempdir().expect("tempdir");
    let snapshot = tmp.path().join("articles.json");
    write_snapshot(&snapshot);

    base_cmd(tmp.path(), &closed_endpoint())
        .args(["summarize", "--owner", "7", "--articles"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing_id"));
}

#[test]
fn test_api_reports_success_payload() {
    let tmp = tempdir().expect("tempdir");
    let (base_url, server) = serve_one_completion("API connection successful");

    base_cmd(tmp.path(), &base_url)
        .arg("test-api")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "\"success\": \"API connection successful\"",
        ));

    let request: serde_json::Value =
        serde_json::from_str(&server.join().expect("server")).expect("request");
    assert_eq!(request["max_tokens"], 20);
    assert_eq!(
        request["messages"][0]["content"],
        "Hello, this is a test. Please respond with 'API connection successful'."
    );
}

#[test]
fn test_api_reports_unreachable_endpoint() {
    let tmp = tempdir().expect("tempdir");

    base_cmd(tmp.path(), &closed_endpoint())
        .args(["--json", "test-api"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"ok\": false"))
        .stdout(predicate::str::contains("transport failure"));
}
