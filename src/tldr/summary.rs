use crate::error::TldrError;
use crate::tldr::completion::{ChatMessage, CompletionClient, CompletionRequest};
use crate::tldr::config::Settings;
use crate::tldr::markup::{char_len, escape_html, strip_markup};
use crate::tldr::warn;

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that provides concise summaries.";

pub fn build_summary_prompt(instruction: &str, title: &str, text: &str) -> String {
    let mut prompt = instruction.to_string();
    if !title.is_empty() {
        prompt.push_str(&format!(
            " The title of the article is \"{}\".",
            escape_html(title)
        ));
    }
    prompt.push_str("\n\nArticle content:\n\n");
    prompt.push_str(text);
    prompt
}

pub fn render_tldr_html(summary: &str) -> String {
    format!(
        "<div class='tldr-summary' style='border: 1px solid #ddd; padding: 10px; margin-bottom: 15px; background-color: #f9f9f9;'><p><strong>TL;DR</strong></p><p>{}</p></div>",
        escape_html(summary)
    )
}

/// Minimum-length gate shared by the filter flow and manual summarization.
/// A minimum of `0` always passes.
pub fn meets_min_length(stripped_len: usize, min_length: usize) -> bool {
    min_length == 0 || stripped_len >= min_length
}

pub fn summary_request(content: &str, title: &str, settings: &Settings) -> CompletionRequest {
    let text = settings.tldr.window().apply(&strip_markup(content));
    tracing::debug!(chars = char_len(&text), "tldr content after truncation");
    CompletionRequest {
        model: settings.openai.model.clone(),
        messages: vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(build_summary_prompt(&settings.tldr.prompt, title, &text)),
        ],
        max_tokens: settings.tldr.max_tokens,
        temperature: None,
        json_object: false,
    }
}

/// Trimmed summary text, or the reason none could be produced.
pub fn generate_summary(
    client: &dyn CompletionClient,
    content: &str,
    title: &str,
    settings: &Settings,
) -> Result<String, TldrError> {
    let request = summary_request(content, title, settings);
    let reply = client.complete(&request)?;
    let summary = reply.trim();
    if summary.is_empty() {
        return Err(TldrError::MalformedResponse("empty summary".to_string()));
    }
    Ok(summary.to_string())
}

/// Rendered TL;DR block, or `None` on any failure (logged, never raised).
pub fn summarize(
    client: &dyn CompletionClient,
    article_ref: &str,
    content: &str,
    title: &str,
    settings: &Settings,
) -> Option<String> {
    match generate_summary(client, content, title, settings) {
        Ok(summary) => {
            tracing::debug!(article = article_ref, "generated tldr summary");
            Some(render_tldr_html(&summary))
        }
        Err(err) => {
            warn::emit(
                err.kind(),
                "summary",
                article_ref,
                "summary generation failed",
                &err.to_string(),
            );
            None
        }
    }
}
