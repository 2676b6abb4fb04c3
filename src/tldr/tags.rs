use crate::tldr::completion::{ChatMessage, CompletionClient, CompletionRequest};
use crate::tldr::config::Settings;
use crate::tldr::markup::{char_len, escape_html, strip_markup};
use crate::tldr::warn;
use serde_json::Value;

pub const TAG_SYSTEM_PROMPT: &str = "You are an expert at analyzing text and suggesting relevant tags for articles in a news aggregator. Your goal is to provide concise and accurate tags.";
const TAG_TEMPERATURE: f32 = 0.3;
const TOKENS_PER_TAG: u32 = 10;
const TAG_TOKEN_OVERHEAD: u32 = 50;

pub fn tag_token_budget(max_tags: usize) -> u32 {
    let per_tag = u32::try_from(max_tags).unwrap_or(u32::MAX / TOKENS_PER_TAG);
    per_tag
        .saturating_mul(TOKENS_PER_TAG)
        .saturating_add(TAG_TOKEN_OVERHEAD)
}

pub fn build_tag_prompt(
    title: &str,
    text: &str,
    existing_captions: &[String],
    max_tags: usize,
    language: &str,
) -> String {
    let existing = serde_json::to_string(existing_captions).unwrap_or_else(|_| "[]".to_string());
    let mut prompt = format!(
        "Analyze the following article content (and title, if provided) and suggest up to {max_tags} relevant tags. The tags should be in {language}.\n"
    );
    prompt.push_str(&format!(
        "Here is a list of existing tags in the system. Prioritize using these if they are highly relevant, but also suggest new tags if appropriate: {existing}\n"
    ));
    if !title.is_empty() {
        prompt.push_str(&format!("Article Title: \"{}\"\n", escape_html(title)));
    }
    prompt.push_str(&format!("Article Content:\n\"{text}\"\n\n"));
    prompt.push_str("Respond with a JSON object containing a single key \"tags\", which is an array of strings. Each string is a suggested tag. If no suitable tags are found, return an empty array. Do not include explanations or apologies in your response, only the JSON object.");
    prompt
}

pub fn tag_request(
    content: &str,
    title: &str,
    existing_captions: &[String],
    settings: &Settings,
) -> CompletionRequest {
    let autotag = &settings.autotag;
    let text = autotag.window().apply(&strip_markup(content));
    tracing::debug!(chars = char_len(&text), "autotag content after truncation");
    CompletionRequest {
        model: autotag.model.clone(),
        messages: vec![
            ChatMessage::system(TAG_SYSTEM_PROMPT),
            ChatMessage::user(build_tag_prompt(
                title,
                &text,
                existing_captions,
                autotag.max_tags,
                &autotag.label_language,
            )),
        ],
        max_tokens: tag_token_budget(autotag.max_tags),
        temperature: Some(TAG_TEMPERATURE),
        json_object: true,
    }
}

/// `{"tags": [...]}`; non-string entries are ignored.
fn parse_strict(message: &str) -> Option<Vec<String>> {
    let json: Value = serde_json::from_str(message).ok()?;
    let tags = json.get("tags")?.as_array()?;
    Some(
        tags.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

/// Comma-split recovery for replies that ignored JSON mode. Best effort: a
/// tag that itself contains a comma is split in two.
fn parse_fallback(message: &str, max_tags: usize) -> Option<Vec<String>> {
    let pieces: Vec<String> = message
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect();
    if pieces.is_empty() || pieces.len() > max_tags.saturating_mul(2) {
        return None;
    }
    Some(pieces)
}

fn finalize(tags: Vec<String>, max_tags: usize) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .take(max_tags)
        .collect()
}

pub fn parse_tags(message: &str, max_tags: usize) -> Vec<String> {
    if let Some(tags) = parse_strict(message) {
        return finalize(tags, max_tags);
    }
    tracing::debug!("tag reply is not a tags object; trying comma fallback");
    match parse_fallback(message, max_tags) {
        Some(tags) => finalize(tags, max_tags),
        None => Vec::new(),
    }
}

/// Suggested tag captions for an article; every failure degrades to an empty list.
pub fn suggest_tags(
    client: &dyn CompletionClient,
    article_ref: &str,
    content: &str,
    title: &str,
    existing_captions: &[String],
    settings: &Settings,
) -> Vec<String> {
    let request = tag_request(content, title, existing_captions, settings);
    let reply = match client.complete(&request) {
        Ok(reply) => reply,
        Err(err) => {
            warn::emit(
                err.kind(),
                "autotag",
                article_ref,
                "tag generation failed",
                &err.to_string(),
            );
            return Vec::new();
        }
    };

    let tags = parse_tags(&reply, settings.autotag.max_tags);
    if tags.is_empty() {
        warn::emit(
            "unparsed_tags",
            "autotag",
            article_ref,
            "no usable tags in reply",
            "",
        );
    } else {
        tracing::debug!(article = article_ref, tags = ?tags, "extracted tags");
    }
    tags
}
