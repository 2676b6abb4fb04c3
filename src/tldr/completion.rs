use crate::error::TldrError;
use crate::tldr::config::{HttpSettings, OpenAiSettings};
use crate::tldr::util::truncate_with_ellipsis;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{Value, json};

const LOG_BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Ask the endpoint for `response_format: {"type": "json_object"}`.
    pub json_object: bool,
}

pub trait CompletionClient {
    /// One request/response cycle; returns the assistant message text.
    fn complete(&self, request: &CompletionRequest) -> Result<String, TldrError>;
}

pub fn build_payload(request: &CompletionRequest) -> Value {
    let mut payload = json!({
        "model": request.model,
        "messages": request.messages,
        "max_tokens": request.max_tokens,
    });
    if let Some(temperature) = request.temperature {
        payload["temperature"] = json!(temperature);
    }
    if request.json_object {
        payload["response_format"] = json!({"type": "json_object"});
    }
    payload
}

pub fn extract_chat_content(json: &Value) -> Option<String> {
    let choices = json.get("choices").and_then(Value::as_array)?;
    let first = choices.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => {
            let mut chunks = Vec::new();
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    chunks.push(text.to_string());
                }
            }
            if chunks.is_empty() {
                None
            } else {
                Some(chunks.join("\n"))
            }
        }
        _ => None,
    }
}

pub fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    url: String,
    api_key: String,
    client: Client,
}

impl HttpCompletionClient {
    pub fn new(openai: &OpenAiSettings, http: &HttpSettings) -> Result<Self, TldrError> {
        let client = Client::builder()
            .timeout(http.timeout())
            .connect_timeout(http.connect_timeout())
            .build()
            .map_err(|err| TldrError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            url: completions_url(&openai.base_url),
            api_key: openai.api_key.clone(),
            client,
        })
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, TldrError> {
        let payload = build_payload(request);
        tracing::debug!(
            url = %self.url,
            model = %request.model,
            max_tokens = request.max_tokens,
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| TldrError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| TldrError::Transport(err.to_string()))?;
        tracing::debug!(
            status = status.as_u16(),
            body = %truncate_with_ellipsis(&body, LOG_BODY_PREVIEW_CHARS),
            "chat completion response"
        );

        if !status.is_success() {
            return Err(TldrError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|err| TldrError::MalformedResponse(format!("invalid json envelope: {err}")))?;
        extract_chat_content(&json).ok_or_else(|| {
            TldrError::MalformedResponse("choices[0].message.content missing".to_string())
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            max_tokens: 20,
            temperature: None,
            json_object: false,
        }
    }

    /// Serve exactly one HTTP response, returning the base URL and a handle
    /// yielding the raw request that was received.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read line");
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().expect("length");
                }
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut body_buf = vec![0u8; content_length];
            reader.read_exact(&mut body_buf).expect("read body");
            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            head.push_str(&String::from_utf8_lossy(&body_buf));
            head
        });
        (format!("http://{addr}/v1/"), handle)
    }

    fn client_for(base_url: &str) -> HttpCompletionClient {
        let openai = OpenAiSettings {
            api_key: "sk-test".to_string(),
            base_url: base_url.to_string(),
            model: "gpt-3.5-turbo".to_string(),
        };
        HttpCompletionClient::new(&openai, &HttpSettings::default()).expect("client")
    }

    #[test]
    fn payload_omits_optional_fields_by_default() {
        let payload = build_payload(&request());
        assert_eq!(payload["model"], "gpt-3.5-turbo");
        assert_eq!(payload["max_tokens"], 20);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "hi");
        assert!(payload.get("temperature").is_none());
        assert!(payload.get("response_format").is_none());
    }

    #[test]
    fn payload_includes_json_mode_and_temperature() {
        let mut req = request();
        req.temperature = Some(0.3);
        req.json_object = true;
        let payload = build_payload(&req);
        assert_eq!(payload["response_format"]["type"], "json_object");
        let temperature = payload["temperature"].as_f64().expect("temperature");
        assert!((temperature - 0.3).abs() < 1e-6);
    }

    #[test]
    fn completions_url_trims_trailing_slash() {
        assert_eq!(
            completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn extract_chat_content_reads_string_and_parts() {
        let plain = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(extract_chat_content(&plain).as_deref(), Some("hello"));

        let parts = json!({"choices": [{"message": {"content": [{"text": "a"}, {"text": "b"}]}}]});
        assert_eq!(extract_chat_content(&parts).as_deref(), Some("a\nb"));

        assert_eq!(extract_chat_content(&json!({"choices": []})), None);
        assert_eq!(extract_chat_content(&json!({"error": "x"})), None);
    }

    #[test]
    fn successful_call_sends_bearer_and_returns_content() {
        let (base, handle) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"Short summary."}}]}"#,
        );
        let got = client_for(&base).complete(&request()).expect("complete");
        assert_eq!(got, "Short summary.");

        let raw = handle.join().expect("server");
        assert!(raw.starts_with("POST /v1/chat/completions "));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(raw.contains("\"max_tokens\":20"));
    }

    #[test]
    fn non_success_status_maps_to_api_error() {
        let (base, handle) = serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#);
        let err = client_for(&base).complete(&request()).expect_err("should fail");
        handle.join().expect("server");
        match err {
            TldrError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("slow down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_envelope_maps_to_malformed_response() {
        let (base, handle) = serve_once("200 OK", "not json");
        let err = client_for(&base).complete(&request()).expect_err("should fail");
        handle.join().expect("server");
        assert!(matches!(err, TldrError::MalformedResponse(_)));
    }

    #[test]
    fn missing_content_maps_to_malformed_response() {
        let (base, handle) = serve_once("200 OK", r#"{"choices":[{"message":{}}]}"#);
        let err = client_for(&base).complete(&request()).expect_err("should fail");
        handle.join().expect("server");
        assert!(matches!(err, TldrError::MalformedResponse(_)));
    }

    #[test]
    fn refused_connection_maps_to_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let err = client_for(&format!("http://{addr}/v1"))
            .complete(&request())
            .expect_err("should fail");
        assert!(matches!(err, TldrError::Transport(_)));
    }
}
