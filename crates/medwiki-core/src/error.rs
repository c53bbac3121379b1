use thiserror::Error;

/// All errors that can occur in medwiki-core.
#[derive(Debug, Error)]
pub enum MedwikiError {
    #[error("Term feed not found: {0}")]
    FeedNotFound(String),

    #[error("Invalid term feed {0}: {1}")]
    InvalidFeed(String, String),

    #[error("No NCBI API key provided. Pass --ncbi-api-key or set {0}.")]
    MissingCredential(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Process exit codes used by the `medwiki` binary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidArgs = 3,
    FileSystemError = 4,
    NetworkError = 6,
    PartialFailure = 7,
}

impl MedwikiError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::FeedNotFound(_) | Self::InvalidFeed(..) | Self::MissingCredential(_) => {
                ExitCode::InvalidArgs
            }
            Self::Io(_) => ExitCode::FileSystemError,
            _ => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, MedwikiError>;
