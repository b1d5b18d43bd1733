use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Username that would collide with the own account path `users/me`
pub const RESERVED_USERNAME: &str = "me";

#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[garde(transparent)]
pub struct ValidEmail(#[garde(email, length(max = 254))] String);

impl FromStr for ValidEmail {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let email = ValidEmail(s.to_string());
        email.validate()?;
        Ok(email)
    }
}

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ValidEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_reserved_username(name: &str) -> bool {
    name.eq_ignore_ascii_case(RESERVED_USERNAME)
}

pub fn not_reserved(name: &str, _ctx: &()) -> garde::Result {
    if is_reserved_username(name) {
        Err(garde::Error::new(format!(
            "Username \"{name}\" is reserved, choose another one"
        )))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[garde(transparent)]
pub struct ValidUsername(
    #[garde(length(min = 1, max = 150), pattern(r"^[\w.@+-]+$"), custom(not_reserved))] String,
);

impl FromStr for ValidUsername {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = ValidUsername(s.to_string());
        name.validate()?;
        Ok(name)
    }
}

impl AsRef<str> for ValidUsername {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ValidUsername {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use fake::Fake as _;
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    impl Arbitrary for ValidEmail {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            let email: String = fake::faker::internet::en::SafeEmail().fake();
            ValidEmail(email)
        }
    }

    #[quickcheck]
    fn test_valid_email_arbitrary(valid_email: ValidEmail) {
        assert!(valid_email.validate().is_ok());
    }

    #[test]
    fn test_valid_email() {
        let email = ValidEmail::from_str("admin@localhost").unwrap();
        assert_eq!(email.as_ref(), "admin@localhost");
    }

    #[test]
    fn test_invalid_email() {
        let email = ValidEmail::from_str("admin");
        assert!(email.is_err());

        let email = ValidEmail("admin".to_string());
        assert!(email.validate().is_err());
    }

    #[test]
    fn test_reserved_username() {
        for name in ["me", "ME", "Me", "mE"] {
            assert!(ValidUsername::from_str(name).is_err(), "{name} accepted");
        }
        assert!(ValidUsername::from_str("meme").is_ok());
        assert!(ValidUsername::from_str("me.too").is_ok());
    }

    #[test]
    fn test_username_pattern() {
        assert!(ValidUsername::from_str("ivan.novak+test@home-1").is_ok());
        assert!(ValidUsername::from_str("").is_err());
        assert!(ValidUsername::from_str("with space").is_err());
        assert!(ValidUsername::from_str("semi;colon").is_err());
        assert!(ValidUsername::from_str(&"x".repeat(151)).is_err());
    }
}
