use anyhow::Result;

use crate::commands::{CommandReport, load_runtime};
use crate::tldr::manual::{ApiTestResponse, test_api_connection};

pub fn run() -> Result<CommandReport> {
    let runtime = load_runtime()?;
    let mut report = CommandReport::new("test-api");
    report.detail(format!("base_url={}", runtime.settings.openai.base_url));
    report.detail(format!("model={}", runtime.settings.openai.model));

    let response = test_api_connection(&runtime.client, &runtime.settings);
    if let ApiTestResponse::Error { error } = &response {
        report.issue(format!("api test failed: {error}"));
    }
    report.set_payload(&response)?;
    Ok(report)
}
