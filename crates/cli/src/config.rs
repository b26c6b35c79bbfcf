use std::path::{Path, PathBuf};

use vn_core::domain::settings::ClientSettings;

use crate::commands::CliError;

pub const ENV_BASE_URL: &str = "VN_BASE_URL";
pub const ENV_AUTH_TOKEN: &str = "VN_AUTH_TOKEN";

/// <config_dir>/video-notes/settings.json
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("video-notes").join("settings.json"))
}

/// 設定を読み込む。明示されたファイルが無ければエラー、既定パスに無ければデフォルト値。
pub fn load_settings(explicit: Option<&Path>) -> Result<ClientSettings, CliError> {
    let mut settings = match explicit {
        Some(path) => read_file(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => read_file(&path)?,
            _ => ClientSettings::default(),
        },
    };

    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.validate().map_err(CliError::Config)?;
    Ok(settings)
}

fn read_file(path: &Path) -> Result<ClientSettings, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
    log::debug!("settings loaded from {}", path.display());
    parse_settings(&raw).map_err(|e| CliError::Config(format!("{}: {e}", path.display())))
}

pub fn parse_settings(raw: &str) -> Result<ClientSettings, serde_json::Error> {
    serde_json::from_str(raw)
}

/// 環境変数による上書き（空文字は無視）
pub fn apply_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
        settings.base_url = url;
    }
    if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.trim().is_empty()) {
        settings.auth_token = Some(token);
    }
}
