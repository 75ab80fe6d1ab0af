//! Vendor passwords
//!
//! A password is either plaintext fresh from input or a bcrypt hash loaded
//! from storage. Only hashes are ever persisted.

use std::fmt;

/// Lowest cost bcrypt accepts
pub const MIN_HASH_COST: u32 = 4;

/// Highest cost bcrypt accepts
pub const MAX_HASH_COST: u32 = 31;

/// Default work factor for new hashes
pub const DEFAULT_HASH_COST: u32 = 10;

/// Minimum length of a plaintext password
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    Plain(String),
    Hashed(String),
}

impl Password {
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    pub fn hashed(value: impl Into<String>) -> Self {
        Self::Hashed(value.into())
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, Self::Hashed(_))
    }

    /// The stored hash, if this value has been hashed
    pub fn as_hash(&self) -> Option<&str> {
        match self {
            Self::Hashed(hash) => Some(hash),
            Self::Plain(_) => None,
        }
    }

    /// Hash a plaintext value; hashes pass through untouched
    pub fn into_hashed(self, cost: u32) -> Result<Self, bcrypt::BcryptError> {
        match self {
            Self::Plain(plain) => Ok(Self::Hashed(bcrypt::hash(plain, cost)?)),
            hashed => Ok(hashed),
        }
    }

    /// Check `candidate` against this password
    pub fn verify(&self, candidate: &str) -> bool {
        match self {
            Self::Hashed(hash) => bcrypt::verify(candidate, hash).unwrap_or(false),
            Self::Plain(plain) => plain == candidate,
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => write!(f, "Password::Plain([REDACTED])"),
            Self::Hashed(_) => write!(f, "Password::Hashed([REDACTED])"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = Password::plain("correct horse").into_hashed(MIN_HASH_COST).unwrap();

        assert!(password.is_hashed());
        assert_ne!(password.as_hash(), Some("correct horse"));
        assert!(password.verify("correct horse"));
        assert!(!password.verify("battery staple"));
    }

    #[test]
    fn test_hashing_is_idempotent_for_hashes() {
        let hashed = Password::plain("secret-pass").into_hashed(MIN_HASH_COST).unwrap();
        let again = hashed.clone().into_hashed(MIN_HASH_COST).unwrap();
        assert_eq!(hashed, again);
    }

    #[test]
    fn test_debug_redacts() {
        let rendered = format!("{:?}", Password::plain("hunter22"));
        assert!(!rendered.contains("hunter22"));
    }
}
