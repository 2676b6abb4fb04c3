use std::env;
use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn filter_for(verbosity: u8, override_directive: Option<String>) -> EnvFilter {
    if let Some(directive) = override_directive
        && let Ok(filter) = EnvFilter::try_new(directive.trim())
    {
        return filter;
    }
    match verbosity {
        0 => EnvFilter::new("tldr_autotag=info"),
        1 => EnvFilter::new("tldr_autotag=debug"),
        _ => EnvFilter::new("tldr_autotag=trace"),
    }
}

/// Install the global subscriber. Events go to stderr; stdout carries JSON payloads.
pub fn init(verbosity: u8) {
    let directive = env::var("TLDR_LOG").ok().filter(|v| !v.trim().is_empty());
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbosity, directive))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false)
                .with_thread_ids(false),
        )
        .try_init();
}
