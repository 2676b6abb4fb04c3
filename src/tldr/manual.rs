use crate::error::SummaryErrorCode;
use crate::tldr::article::ArticleSource;
use crate::tldr::completion::{ChatMessage, CompletionClient, CompletionRequest};
use crate::tldr::config::Settings;
use crate::tldr::markup::{char_len, strip_markup};
use crate::tldr::summary::{generate_summary, meets_min_length, render_tldr_html};
use crate::tldr::warn;
use serde::Serialize;

pub const API_TEST_PROMPT: &str =
    "Hello, this is a test. Please respond with 'API connection successful'.";
const API_TEST_MAX_TOKENS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManualSummaryResponse {
    Summary { tldr_html: String },
    Error { error: String, message: String },
}

impl ManualSummaryResponse {
    fn error(code: SummaryErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: code.as_str().to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// On-demand TL;DR for one article owned by `owner_uid`. Ignores per-feed
/// enablement; only the minimum-length gate applies.
pub fn summarize_article<S: ArticleSource + ?Sized>(
    client: &dyn CompletionClient,
    source: &S,
    article_id: Option<i64>,
    owner_uid: i64,
    settings: &Settings,
) -> ManualSummaryResponse {
    let Some(article_id) = article_id.filter(|id| *id != 0) else {
        return ManualSummaryResponse::error(SummaryErrorCode::MissingId, "Article ID is missing.");
    };

    let Some(article) = source.find_article(article_id, owner_uid) else {
        tracing::debug!(article_id, owner_uid, "article not found for owner");
        return ManualSummaryResponse::error(
            SummaryErrorCode::ArticleNotFound,
            "Article not found or access denied.",
        );
    };

    let length = char_len(&strip_markup(&article.content));
    let min = settings.tldr.min_article_length;
    if !meets_min_length(length, min) {
        return ManualSummaryResponse::error(
            SummaryErrorCode::ArticleTooShort,
            format!(
                "Article content is too short for a summary (min: {min} chars, found: {length} chars)."
            ),
        );
    }

    match generate_summary(client, &article.content, &article.title, settings) {
        Ok(summary) => ManualSummaryResponse::Summary {
            tldr_html: render_tldr_html(&summary),
        },
        Err(err) => {
            warn::emit(
                err.kind(),
                "manual_summary",
                &article_id.to_string(),
                "summary generation failed",
                &err.to_string(),
            );
            ManualSummaryResponse::error(
                SummaryErrorCode::SummaryGenerationFailed,
                "Failed to generate summary. Check logs for details.",
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ApiTestResponse {
    Success { success: String, response: String },
    Error { error: String },
}

pub fn api_test_request(settings: &Settings) -> CompletionRequest {
    CompletionRequest {
        model: settings.openai.model.clone(),
        messages: vec![ChatMessage::user(API_TEST_PROMPT)],
        max_tokens: API_TEST_MAX_TOKENS,
        temperature: None,
        json_object: false,
    }
}

pub fn test_api_connection(client: &dyn CompletionClient, settings: &Settings) -> ApiTestResponse {
    match client.complete(&api_test_request(settings)) {
        Ok(reply) => ApiTestResponse::Success {
            success: "API connection successful".to_string(),
            response: reply,
        },
        Err(err) => ApiTestResponse::Error {
            error: err.to_string(),
        },
    }
}
