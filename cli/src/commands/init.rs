use quill_core::config::QuillConfig;

use crate::error::CliError;

pub fn handle_init_config() -> Result<i32, CliError> {
    print!("{}", render_default_config()?);
    Ok(0)
}

pub fn render_default_config() -> Result<String, CliError> {
    toml::to_string_pretty(&QuillConfig::default()).map_err(|e| CliError::Config(e.to_string()))
}
