use std::time::Duration;

/// Generates new confirmation code, which is sent to user's email
/// and later exchanged for an access token.
pub fn confirmation_code() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn is_expired(created_unix_secs: i64, now_unix_secs: i64, validity: Duration) -> bool {
    let validity = i64::try_from(validity.as_secs()).unwrap_or(i64::MAX);
    now_unix_secs.saturating_sub(created_unix_secs) > validity
}
