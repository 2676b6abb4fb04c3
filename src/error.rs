use thiserror::Error;

#[derive(Debug, Error)]
pub enum TldrError {
    #[error("configuration invalid: {0}")]
    Config(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("api call failed with status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
    #[error("label `{caption}` already exists for owner {owner_uid}")]
    StoreConflict { owner_uid: i64, caption: String },
    #[error("label store failure: {0}")]
    Store(String),
}

impl TldrError {
    /// Short, stable identifier used in `TLDR_WARN` lines and audit events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::Api { .. } => "api",
            Self::MalformedResponse(_) => "malformed_response",
            Self::StoreConflict { .. } => "store_conflict",
            Self::Store(_) => "store",
        }
    }
}

/// Failure kinds surfaced to the user by manual on-demand summarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryErrorCode {
    MissingId,
    ArticleNotFound,
    ArticleTooShort,
    SummaryGenerationFailed,
}

impl SummaryErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingId => "missing_id",
            Self::ArticleNotFound => "article_not_found",
            Self::ArticleTooShort => "article_too_short",
            Self::SummaryGenerationFailed => "summary_generation_failed",
        }
    }
}
