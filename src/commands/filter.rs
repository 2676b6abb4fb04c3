use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::{CommandReport, load_runtime};
use crate::tldr::article::Article;
use crate::tldr::audit;
use crate::tldr::colors::LabelColorAllocator;
use crate::tldr::filter::{FilterContext, StageStatus, filter_article};
use crate::tldr::label_store::JsonLabelStore;

#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub article: PathBuf,
    pub out: Option<PathBuf>,
}

fn read_article(path: &Path) -> Result<Article> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn run(opts: &FilterOptions) -> Result<CommandReport> {
    let runtime = load_runtime()?;
    let mut report = CommandReport::new("filter");

    let article = read_article(&opts.article)?;
    let store = JsonLabelStore::new(&runtime.paths.label_store);
    let colors = LabelColorAllocator::new();
    let ctx = FilterContext {
        settings: &runtime.settings,
        client: &runtime.client,
        store: &store,
        colors: &colors,
    };

    let article_id = article.id;
    let (filtered, outcome) = filter_article(&ctx, article);
    report.detail(format!("article={article_id}"));
    report.detail(outcome.summary_line());
    if !outcome.suggested_tags.is_empty() {
        report.detail(format!("suggested_tags={}", outcome.suggested_tags.join(",")));
    }

    let degraded = outcome.tldr == StageStatus::Failed;
    let status = if degraded { "degraded" } else { "ok" };
    if let Err(err) = audit::append_event(
        &runtime.paths,
        "filter",
        status,
        &format!("article={article_id} {}", outcome.summary_line()),
    ) {
        tracing::warn!(error = %format!("{err:#}"), "failed to append audit event");
    }

    match &opts.out {
        Some(path) => {
            let data = serde_json::to_string_pretty(&filtered)?;
            fs::write(path, format!("{data}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            report.detail(format!("out={}", path.display()));
        }
        None => report.set_payload(&filtered)?,
    }

    Ok(report)
}
