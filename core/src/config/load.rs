use std::path::{Path, PathBuf};

use super::types::QuillConfig;

/// Get the default quill data directory: ~/.quill
pub fn get_quill_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".quill"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<QuillConfig> {
    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<QuillConfig>(&s)?;
    Ok(apply_env_overrides(cfg).normalized())
}

pub fn load_default() -> anyhow::Result<QuillConfig> {
    // Priority 1: ~/.quill/config.toml
    let user_config = get_quill_data_dir()?.join("config.toml");

    // Priority 2: ./quill.toml (current directory)
    let local_config = Path::new("quill.toml");

    let cfg: QuillConfig = if user_config.exists() {
        let s = std::fs::read_to_string(&user_config)?;
        toml::from_str::<QuillConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<QuillConfig>(&s)?
    } else {
        QuillConfig::default()
    };

    Ok(apply_env_overrides(cfg).normalized())
}

/// Environment variable overrides (highest priority).
fn apply_env_overrides(mut cfg: QuillConfig) -> QuillConfig {
    if let Some(v) = env_parse::<usize>("QUILL_MAX_CONCURRENCY") {
        cfg.executor.max_concurrency = v;
    }
    if let Some(v) = env_parse::<u32>("QUILL_MAX_RETRIES") {
        cfg.executor.max_retries = v;
    }
    if let Some(v) = env_parse::<u32>("QUILL_MAX_REVISIONS") {
        cfg.cluster.max_revisions = v;
    }
    if let Ok(v) = std::env::var("QUILL_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }
    cfg
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable config override");
            None
        }
    }
}
