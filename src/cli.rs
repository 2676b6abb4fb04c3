use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Parser, Debug)]
#[command(
    name = "tldr-autotag",
    version,
    about = "Prepend LLM TL;DR summaries to feed articles and auto-tag them with per-user labels"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the article filter (TL;DR, then auto-tagging) on one article document
    Filter {
        #[arg(long, value_name = "PATH")]
        article: PathBuf,
        /// Write the filtered article here instead of stdout
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Summarize one article on demand from an article snapshot file
    Summarize {
        #[arg(long, value_name = "PATH")]
        articles: PathBuf,
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        owner: i64,
    },
    /// Send a fixed test prompt to the configured completion endpoint
    TestApi,
    /// Check configuration, paths, and the label store
    Verify {
        #[arg(long)]
        strict: bool,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if let Some(payload) = &report.payload {
        println!("{}", serde_json::to_string_pretty(payload)?);
    }
    for line in &report.details {
        eprintln!("{}: {line}", report.command);
    }
    for line in &report.issues {
        eprintln!("{}: issue: {line}", report.command);
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match &cli.command {
        Command::Filter { article, out } => commands::filter::run(&commands::filter::FilterOptions {
            article: article.clone(),
            out: out.clone(),
        })?,
        Command::Summarize { articles, id, owner } => {
            commands::summarize::run(&commands::summarize::SummarizeOptions {
                articles: articles.clone(),
                id: *id,
                owner: *owner,
            })?
        }
        Command::TestApi => commands::test_api::run()?,
        Command::Verify { strict } => {
            commands::verify::run(&commands::verify::VerifyOptions { strict: *strict })?
        }
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} failed", report.command);
    }
    Ok(())
}
