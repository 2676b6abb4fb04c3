use crate::tldr::paths::TldrPaths;
use crate::tldr::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: String,
    pub status: String,
    pub message: String,
}

pub fn append_event(paths: &TldrPaths, phase: &str, status: &str, message: &str) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    let event = AuditEvent {
        at_epoch_secs: now_epoch_secs()?,
        phase: phase.to_string(),
        status: status.to_string(),
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let path = paths.logs_dir.join("audit.log");
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::append_event;
    use crate::tldr::paths::TldrPaths;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn append_event_writes_one_json_line_per_call() {
        let tmp = tempdir().expect("tempdir");
        let paths = TldrPaths {
            tldr_home: tmp.path().to_path_buf(),
            config_file: tmp.path().join("tldr.toml"),
            label_store: tmp.path().join("labels.json"),
            logs_dir: tmp.path().join("logs"),
        };

        append_event(&paths, "filter", "ok", "article=1").expect("first");
        append_event(&paths, "filter", "degraded", "article=2").expect("second");

        let raw = fs::read_to_string(paths.logs_dir.join("audit.log")).expect("read");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["status"], "degraded");
        assert_eq!(second["message"], "article=2");
    }
}
