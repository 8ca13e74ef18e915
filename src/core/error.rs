use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid configuration: {field} must be {requirement} (got {value})")]
    InvalidConfig {
        field: &'static str,
        requirement: &'static str,
        value: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
