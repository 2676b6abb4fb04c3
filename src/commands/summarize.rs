use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::{CommandReport, load_runtime};
use crate::tldr::article::Article;
use crate::tldr::audit;
use crate::tldr::manual::{ManualSummaryResponse, summarize_article};

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub articles: PathBuf,
    pub id: Option<i64>,
    pub owner: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Many(Vec<Article>),
    One(Box<Article>),
}

fn load_snapshot(path: &Path) -> Result<Vec<Article>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: Snapshot =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(match parsed {
        Snapshot::Many(articles) => articles,
        Snapshot::One(article) => vec![*article],
    })
}

pub fn run(opts: &SummarizeOptions) -> Result<CommandReport> {
    let runtime = load_runtime()?;
    let mut report = CommandReport::new("summarize");

    let snapshot = load_snapshot(&opts.articles)?;
    report.detail(format!("snapshot.articles={}", snapshot.len()));

    let response = summarize_article(
        &runtime.client,
        snapshot.as_slice(),
        opts.id,
        opts.owner,
        &runtime.settings,
    );
    report.set_payload(&response)?;

    let status = if response.is_error() { "failed" } else { "ok" };
    let mut message = "tldr generated".to_string();
    if let ManualSummaryResponse::Error {
        error,
        message: detail,
    } = &response
    {
        report.issue(format!("{error}: {detail}"));
        message = error.clone();
    }
    let article = opts.id.map_or_else(|| "na".to_string(), |id| id.to_string());
    if let Err(err) = audit::append_event(
        &runtime.paths,
        "manual_summary",
        status,
        &format!("article={article} owner={} {message}", opts.owner),
    ) {
        tracing::warn!(error = %format!("{err:#}"), "failed to append audit event");
    }

    Ok(report)
}
