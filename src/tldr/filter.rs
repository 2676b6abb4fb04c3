use crate::tldr::article::Article;
use crate::tldr::colors::LabelColorAllocator;
use crate::tldr::completion::CompletionClient;
use crate::tldr::config::Settings;
use crate::tldr::labels::{LabelReconciler, LabelStore, SkipReason};
use crate::tldr::markup::{char_len, strip_markup};
use crate::tldr::summary::{meets_min_length, summarize};
use crate::tldr::tags::suggest_tags;
use crate::tldr::warn;
use serde::Serialize;

/// Collaborators for one article-filter pass.
pub struct FilterContext<'a> {
    pub settings: &'a Settings,
    pub client: &'a dyn CompletionClient,
    pub store: &'a dyn LabelStore,
    pub colors: &'a LabelColorAllocator,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Disabled,
    TooShort,
    Failed,
    NoTags,
    Applied,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::TooShort => "too_short",
            Self::Failed => "failed",
            Self::NoTags => "no_tags",
            Self::Applied => "applied",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub tldr: StageStatus,
    pub autotag: StageStatus,
    pub suggested_tags: Vec<String>,
    pub labels_added: usize,
    pub labels_created: usize,
    pub skipped_tags: Vec<String>,
}

impl FilterOutcome {
    pub fn summary_line(&self) -> String {
        format!(
            "tldr={} autotag={} labels_added={} labels_created={} skipped={}",
            self.tldr.as_str(),
            self.autotag.as_str(),
            self.labels_added,
            self.labels_created,
            self.skipped_tags.len()
        )
    }
}

fn stripped_len(content: &str) -> usize {
    char_len(&strip_markup(content))
}

fn apply_tldr(ctx: &FilterContext<'_>, article: &mut Article, article_ref: &str) -> StageStatus {
    let settings = ctx.settings;
    if !settings.tldr_enabled_for(article.feed_id) {
        return StageStatus::Disabled;
    }

    let length = stripped_len(&article.content);
    if !meets_min_length(length, settings.tldr.min_article_length) {
        tracing::debug!(
            article = article_ref,
            length,
            min = settings.tldr.min_article_length,
            "content shorter than tldr minimum; skipping"
        );
        return StageStatus::TooShort;
    }

    match summarize(
        ctx.client,
        article_ref,
        &article.content,
        &article.title,
        settings,
    ) {
        Some(html) => {
            article.content = format!("{html}{}", article.content);
            StageStatus::Applied
        }
        None => StageStatus::Failed,
    }
}

fn apply_autotag(
    ctx: &FilterContext<'_>,
    article: &mut Article,
    article_ref: &str,
    outcome: &mut FilterOutcome,
) -> StageStatus {
    let settings = ctx.settings;
    if !settings.autotag_enabled_for(article.feed_id) {
        return StageStatus::Disabled;
    }

    // Measured on the content as it stands now, TL;DR block included.
    let length = stripped_len(&article.content);
    if !meets_min_length(length, settings.autotag.min_article_length) {
        tracing::debug!(
            article = article_ref,
            length,
            min = settings.autotag.min_article_length,
            "content shorter than autotag minimum; skipping"
        );
        return StageStatus::TooShort;
    }

    let existing = match ctx.store.captions_for_owner(article.owner_uid) {
        Ok(captions) => captions,
        Err(err) => {
            warn::emit(
                err.kind(),
                "autotag",
                article_ref,
                "existing captions unavailable",
                &err.to_string(),
            );
            Vec::new()
        }
    };

    let tags = suggest_tags(
        ctx.client,
        article_ref,
        &article.content,
        &article.title,
        &existing,
        settings,
    );
    if tags.is_empty() {
        return StageStatus::NoTags;
    }

    let reconciled = LabelReconciler::new(ctx.store, ctx.colors).reconcile(
        &tags,
        article,
        article.owner_uid,
    );
    for skipped in &reconciled.skipped {
        match &skipped.reason {
            SkipReason::AlreadyAttached => tracing::debug!(
                article = article_ref,
                caption = %skipped.caption,
                "tag already attached"
            ),
            SkipReason::ConflictUnresolved => warn::emit(
                "store_conflict",
                "labels",
                article_ref,
                &format!("label {} vanished after conflict", skipped.caption),
                "",
            ),
            SkipReason::StoreFailure(err) => warn::emit(
                "store",
                "labels",
                article_ref,
                &format!("label {} not stored", skipped.caption),
                err,
            ),
        }
        outcome.skipped_tags.push(skipped.caption.clone());
    }

    outcome.suggested_tags = tags;
    outcome.labels_added = reconciled.labels.len();
    outcome.labels_created = reconciled.created;
    article.labels.extend(reconciled.labels);
    StageStatus::Applied
}

/// Run the article-filter flow: TL;DR first, then auto-tagging. Failures in
/// either stage leave that part of the article untouched.
pub fn filter_article(ctx: &FilterContext<'_>, mut article: Article) -> (Article, FilterOutcome) {
    let article_ref = article.id.to_string();
    let mut outcome = FilterOutcome {
        tldr: apply_tldr(ctx, &mut article, &article_ref),
        ..FilterOutcome::default()
    };
    let autotag = apply_autotag(ctx, &mut article, &article_ref, &mut outcome);
    outcome.autotag = autotag;
    tracing::info!(article = %article_ref, "{}", outcome.summary_line());
    (article, outcome)
}
