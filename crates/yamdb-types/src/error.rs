pub type Result<T, E = ValidationError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}
