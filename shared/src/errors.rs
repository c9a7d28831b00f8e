//! Shared error types for the scheduler

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid job id: {input:?}")]
    InvalidJobId { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Failed to read configuration file {path}: {message}")]
    ConfigLoad { path: String, message: String },

    #[error("Invalid search URL: {message}")]
    InvalidUrl { message: String },
}

impl SharedError {
    pub fn invalid_config(field: impl Into<String>, value: impl ToString) -> Self {
        SharedError::InvalidConfig {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

pub type SharedResult<T> = Result<T, SharedError>;
