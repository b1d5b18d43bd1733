use jsonwebtoken::errors::Error as JwtError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Access token has expired")]
    Expired,

    #[error("Invalid access token: {0}")]
    Invalid(#[source] JwtError),

    #[error("Token subject {0:?} is not a user id")]
    InvalidSubject(String),

    #[error("Cannot sign access token: {0}")]
    Signing(#[source] JwtError),
}

impl From<JwtError> for Error {
    fn from(value: JwtError) -> Self {
        match value.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::Expired,
            _ => Error::Invalid(value),
        }
    }
}
