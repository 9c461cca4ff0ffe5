pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{BackoffSettings, ConvergeSettings, PollSettings, Settings};

use std::path::{Path, PathBuf};

const CONFIG_PATH_ENV: &str = "RECONFLOW_CONFIG_PATH";
const CANDIDATES: [&str; 4] = [
    "reconflow.local.yaml",
    ".reconflow.local.yaml",
    "reconflow.yaml",
    ".reconflow.yaml",
];

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 `RECONFLOW_CONFIG_PATH` (直接パス指定)
/// 2. カレントディレクトリ: reconflow.local.yaml, .reconflow.local.yaml, reconflow.yaml, .reconflow.yaml
/// 3. `./.reconflow/` ディレクトリ内: 同様の順序
/// 4. `~/.config/reconflow/reconflow.yaml` (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ
    if let Some(path) = first_candidate(&current_dir) {
        return Ok(path);
    }

    // 3. ./.reconflow/
    let local_dir = current_dir.join(".reconflow");
    if local_dir.is_dir() {
        if let Some(path) = first_candidate(&local_dir) {
            return Ok(path);
        }
    }

    // 4. グローバル設定
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("reconflow").join("reconflow.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

fn first_candidate(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Load settings from an explicit file
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Settings::from_yaml(&content)
}

/// Load settings from the discovered file, or defaults when there is none
pub fn load_settings() -> Result<Settings> {
    match find_config_file() {
        Ok(path) => load_settings_from(path),
        Err(ConfigError::SettingsFileNotFound) => Ok(Settings::default()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// Runs `f` inside `dir`, restoring the previous working directory after.
    fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let out = f();
        std::env::set_current_dir(original_dir).unwrap();
        out
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("reconflow.yaml"), "{}").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap();
        assert!(found.ends_with("reconflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("reconflow.yaml"), "{}").unwrap();
        fs::write(temp_dir.path().join("reconflow.local.yaml"), "{}").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap();
        assert!(found.ends_with("reconflow.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_dot_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dot_dir = temp_dir.path().join(".reconflow");
        fs::create_dir(&dot_dir).unwrap();
        fs::write(dot_dir.join("reconflow.yaml"), "{}").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap();
        assert!(found.ends_with(".reconflow/reconflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "poll:\n  interval_ms: 50\n").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(config_path.as_os_str()), || {
            assert_eq!(find_config_file().unwrap(), config_path);
            assert_eq!(load_settings().unwrap().poll.interval_ms, 50);
        });
    }

    #[test]
    #[serial]
    fn test_load_settings_defaults_without_file() {
        let temp_dir = tempfile::tempdir().unwrap();

        // A global file under the real config dir would leak in here.
        let has_global = dirs::config_dir()
            .map(|d| d.join("reconflow").join("reconflow.yaml").exists())
            .unwrap_or(false);
        if has_global {
            return;
        }

        let settings = temp_env::with_var_unset(CONFIG_PATH_ENV, || {
            in_dir(temp_dir.path(), load_settings)
        })
        .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("reconflow.yaml");
        fs::write(&path, "converge:\n  max_attempts: 0\n").unwrap();

        let err = load_settings_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
