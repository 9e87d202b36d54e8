use thiserror::Error;

pub type Result<T> = std::result::Result<T, BidboardError>;

#[derive(Debug, Error)]
pub enum BidboardError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("{backend} configuration incomplete, missing: {}", missing.join(", "))]
    MissingCredentials {
        backend: String,
        missing: Vec<&'static str>,
    },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("sql generation error: {0}")]
    Sql(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("timeout: statement did not finish within {seconds}s")]
    Timeout { seconds: u64 },
    #[error("upload error: {0}")]
    Upload(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
