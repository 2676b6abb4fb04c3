use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use tempfile::tempdir;

/// Answer one chat completion per entry in `replies`, returning the base URL
/// and a handle that yields the raw request bodies.
fn serve_completions(replies: Vec<&'static str>) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = thread::spawn(move || {
        let mut bodies = Vec::new();
        for reply in replies {
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
            bodies.push(String::from_utf8_lossy(&body).to_string());

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
        }
        bodies
    });
    (format!("http://{addr}/v1"), handle)
}

fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}/v1")
}

fn write_article(path: &Path, content: &str, labels: serde_json::Value) {
    let article = serde_json::json!({
        "id": 42,
        "title": "Ferris learns to fly",
        "content": content,
        "feed_id": 10,
        "owner_uid": 1,
        "labels": labels,
    });
    fs::write(path, article.to_string()).expect("write article");
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

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

#[test]
fn filter_prepends_summary_for_enabled_feed() {
    let tmp = tempdir().expect("tempdir");
    let article_path = tmp.path().join("article.json");
    let body = format!("<p>{}</p>", "x".repeat(250));
    write_article(&article_path, &body, serde_json::json!([]));
    let (base_url, server) = serve_completions(vec!["Short summary."]);

    let output = base_cmd(tmp.path(), &base_url)
        .env("TLDR_TLDR_ENABLED_FEEDS", "10,11")
        .args(["filter", "--article"])
        .arg(&article_path)
        .assert()
        .success()
        .get_output()
        .clone();

    let article = stdout_json(&output);
    let content = article["content"].as_str().expect("content");
    assert!(content.starts_with("<div class='tldr-summary'"));
    assert!(content.contains("<p>Short summary.</p>"));
    assert!(content.ends_with(&body));

    let requests = server.join().expect("server");
    assert_eq!(requests.len(), 1);
    let sent: serde_json::Value = serde_json::from_str(&requests[0]).expect("request json");
    assert_eq!(sent["max_tokens"], 150);
    assert_eq!(sent["model"], "gpt-3.5-turbo");

    let audit = fs::read_to_string(tmp.path().join("logs/audit.log")).expect("audit log");
    assert!(audit.contains("\"phase\":\"filter\""));
    assert!(audit.contains("tldr=applied"));
}

#[test]
fn filter_leaves_short_article_untouched() {
    let tmp = tempdir().expect("tempdir");
    let article_path = tmp.path().join("article.json");
    let out_path = tmp.path().join("filtered.json");
    write_article(&article_path, "tiny body", serde_json::json!([]));

    base_cmd(tmp.path(), &closed_endpoint())
        .env("TLDR_TLDR_ENABLED_FEEDS", "10")
        .args(["filter", "--article"])
        .arg(&article_path)
        .arg("--out")
        .arg(&out_path)
        .assert()
        .success();

    let filtered: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out_path).expect("read out")).expect("json");
    assert_eq!(filtered["content"], "tiny body");
    assert_eq!(filtered["labels"], serde_json::json!([]));
}

#[test]
fn filter_survives_unreachable_endpoint() {
    let tmp = tempdir().expect("tempdir");
    let article_path = tmp.path().join("article.json");
    let body = "y".repeat(300);
    write_article(&article_path, &body, serde_json::json!([]));

    let output = base_cmd(tmp.path(), &closed_endpoint())
        .env("TLDR_TLDR_ENABLED_FEEDS", "10")
        .env("TLDR_CURL_CONNECT_TIMEOUT", "2")
        .args(["filter", "--article"])
        .arg(&article_path)
        .assert()
        .success()
        .stderr(predicates::str::contains("TLDR_WARN code=transport"))
        .get_output()
        .clone();

    assert_eq!(stdout_json(&output)["content"], body);
}

#[test]
fn filter_autotags_and_reuses_labels_across_runs() {
    let tmp = tempdir().expect("tempdir");
    let article_path = tmp.path().join("article.json");
    let labels = serde_json::json!([
        {"feed_encoded_id": -2000, "caption": "News", "fg_color": "000000", "bg_color": "CCCC33"}
    ]);
    write_article(&article_path, &"z".repeat(120), labels);
    let (base_url, server) = serve_completions(vec![
        r#"{"tags": ["news", "Rust", "Aviation"]}"#,
        r#"{"tags": ["rust"]}"#,
    ]);

    let first = base_cmd(tmp.path(), &base_url)
        .env("TLDR_AUTOTAG_ENABLED", "true")
        .env("TLDR_AUTOTAG_ENABLED_FEEDS", "10")
        .args(["filter", "--article"])
        .arg(&article_path)
        .assert()
        .success()
        .get_output()
        .clone();
    let tagged = stdout_json(&first);
    let captions: Vec<&str> = tagged["labels"]
        .as_array()
        .expect("labels")
        .iter()
        .map(|label| label["caption"].as_str().expect("caption"))
        .collect();
    assert_eq!(captions, vec!["News", "Rust", "Aviation"]);
    assert_eq!(tagged["labels"][1]["feed_encoded_id"], -1026);

    let second = base_cmd(tmp.path(), &base_url)
        .env("TLDR_AUTOTAG_ENABLED", "true")
        .env("TLDR_AUTOTAG_ENABLED_FEEDS", "10")
        .args(["filter", "--article"])
        .arg(&article_path)
        .assert()
        .success()
        .get_output()
        .clone();
    let retagged = stdout_json(&second);
    assert_eq!(retagged["labels"][1]["caption"], "Rust");
    assert_eq!(
        retagged["labels"][1]["bg_color"],
        tagged["labels"][1]["bg_color"]
    );

    let requests = server.join().expect("server");
    let second_request: serde_json::Value =
        serde_json::from_str(&requests[1]).expect("request json");
    assert_eq!(second_request["response_format"]["type"], "json_object");
    let prompt = second_request["messages"][1]["content"]
        .as_str()
        .expect("prompt");
    assert!(prompt.contains(r#"["Aviation","Rust"]"#));

    let store: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("labels.json")).expect("label store"),
    )
    .expect("store json");
    assert_eq!(store["labels"].as_array().expect("rows").len(), 2);
}

#[test]
fn filter_rejects_invalid_configuration() {
    let tmp = tempdir().expect("tempdir");
    let article_path = tmp.path().join("article.json");
    write_article(&article_path, "body", serde_json::json!([]));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tldr-autotag");
    cmd.env_clear()
        .current_dir(tmp.path())
        .env("TLDR_HOME", tmp.path())
        .env("TLDR_OPENAI_API_KEY", "not-a-key")
        .args(["filter", "--article"])
        .arg(&article_path)
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid OpenAI API key format"));
}
