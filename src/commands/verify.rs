use anyhow::Result;
use std::collections::BTreeSet;
use std::env;

use crate::commands::CommandReport;
use crate::tldr::colors::LabelColorAllocator;
use crate::tldr::config::load_config;
use crate::tldr::label_store::JsonLabelStore;
use crate::tldr::paths::resolve_paths;

include!(concat!(env!("OUT_DIR"), "/tldr_env_allowlist.rs"));

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub strict: bool,
}

/// `TLDR_*` names in `present` that the binary never reads.
pub fn unknown_tldr_vars<'a>(present: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let known: BTreeSet<&str> = GENERATED_TLDR_ENV_ALLOWLIST.iter().copied().collect();
    let mut unknown: Vec<String> = present
        .into_iter()
        .filter(|name| name.starts_with("TLDR_") && !known.contains(name))
        .map(str::to_string)
        .collect();
    unknown.sort();
    unknown.dedup();
    unknown
}

pub fn run(opts: &VerifyOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("verify");
    report.detail(format!("tldr_home={}", paths.tldr_home.display()));
    report.detail(format!(
        "config_file={} exists={}",
        paths.config_file.display(),
        paths.config_file.exists()
    ));
    report.detail(format!("label_store={}", paths.label_store.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    match load_config(&paths.config_file) {
        Ok(settings) => {
            report.detail("config=ok");
            report.detail(format!("openai.base_url={}", settings.openai.base_url));
            report.detail(format!("openai.model={}", settings.openai.model));
            report.detail(format!(
                "tldr.enabled_feeds={}",
                settings.tldr.enabled_feeds.len()
            ));
            report.detail(format!(
                "autotag.enabled={} autotag.enabled_feeds={}",
                settings.autotag.enabled,
                settings.autotag.enabled_feeds.len()
            ));
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    report.detail(format!(
        "label_palette.colors={}",
        LabelColorAllocator::new().palette().len()
    ));

    match JsonLabelStore::new(&paths.label_store).load() {
        Ok(table) => report.detail(format!("label_store.labels={}", table.labels.len())),
        Err(err) => report.issue(format!("label store unreadable: {err}")),
    }

    let names: Vec<String> = env::vars_os()
        .filter_map(|(key, _)| key.into_string().ok())
        .collect();
    let unknown = unknown_tldr_vars(names.iter().map(String::as_str));
    if unknown.is_empty() {
        report.detail("env.unknown_tldr_vars=none");
    } else if opts.strict {
        report.issue(format!("unknown TLDR_* variables: {}", unknown.join(",")));
    } else {
        report.detail(format!("env.unknown_tldr_vars={}", unknown.join(",")));
    }

    if opts.strict && !report.ok {
        report.issue("strict verify failed");
    }

    Ok(report)
}
