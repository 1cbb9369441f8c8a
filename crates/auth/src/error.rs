use thiserror::Error;

/// Errors that can occur while assembling venue credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A required credential field is empty.
    #[error("Credential field '{0}' must not be empty")]
    EmptyField(&'static str),
}
