use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TldrPaths {
    pub tldr_home: PathBuf,
    pub config_file: PathBuf,
    pub label_store: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<TldrPaths> {
    let tldr_home = match env::var("TLDR_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".tldr"),
    };

    let config_file = env_or_default_path("TLDR_CONFIG_PATH", tldr_home.join("tldr.toml"));
    let label_store = env_or_default_path("TLDR_LABEL_STORE", tldr_home.join("labels.json"));
    let logs_dir = env_or_default_path("TLDR_LOGS_DIR", tldr_home.join("logs"));

    Ok(TldrPaths {
        tldr_home,
        config_file,
        label_store,
        logs_dir,
    })
}
