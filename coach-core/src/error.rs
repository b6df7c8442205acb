use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Other error: {0}")]
    Other(String),
}
