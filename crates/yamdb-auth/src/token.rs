//! Access tokens handed out in exchange for a confirmation code.
//!
//! A token names the user (id in `sub`, plus the username) and its expiry.
//! Role and superuser flag are not part of it, they are looked up on each request.

use std::time::{Duration, SystemTime};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    exp: u64,
}

/// User an access token was issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: i64,
    pub username: String,
}

impl TryFrom<Claims> for TokenSubject {
    type Error = Error;

    fn try_from(claims: Claims) -> Result<Self> {
        let user_id = claims
            .sub
            .parse()
            .map_err(|_| Error::InvalidSubject(claims.sub.clone()))?;
        Ok(TokenSubject {
            user_id,
            username: claims.username,
        })
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: impl AsRef<[u8]>, validity: Duration) -> Self {
        let mut validation = Validation::default();
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            validity,
            validation,
        }
    }

    pub fn issue(&self, user_id: i64, username: &str) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: unix_secs(SystemTime::now() + self.validity),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding).map_err(Error::Signing)
    }

    pub fn validate(&self, token: &str) -> Result<TokenSubject> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(Error::from)
            .inspect_err(|e| debug!("Token rejected: {e}"))?;
        TokenSubject::try_from(data.claims)
    }
}
