use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: reconflow.local.yaml, .reconflow.local.yaml, reconflow.yaml, .reconflow.yaml\n\
        - ./.reconflow/\n\
        - ~/.config/reconflow/reconflow.yaml\n\
        or point RECONFLOW_CONFIG_PATH at a file directly"
    )]
    SettingsFileNotFound,

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
