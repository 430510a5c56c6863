//! Public key material recorded on a payment channel
//!
//! When the requester supplies keys at channel creation the engine later
//! creates the target account with them. The set is immutable once recorded.

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// The four-role key set required to create a target-chain account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeySet {
    /// Owner authority key
    pub owner: String,
    /// Active authority key
    pub active: String,
    /// Posting authority key
    pub posting: String,
    /// Memo encryption key
    pub memo: String,
}

impl PublicKeySet {
    /// Validate that every role is present and plausibly a public key.
    ///
    /// Target-chain public keys are base58 strings with an `STM` prefix;
    /// the full checksum validation belongs to the keychain collaborator.
    pub fn validate(&self) -> Result<()> {
        for (role, key) in [
            ("owner", &self.owner),
            ("active", &self.active),
            ("posting", &self.posting),
            ("memo", &self.memo),
        ] {
            if key.trim().is_empty() {
                return Err(EngineError::validation(format!(
                    "Missing required {role} public key"
                )));
            }
            if !key.starts_with("STM") || key.len() < 50 {
                return Err(EngineError::validation(format!(
                    "Malformed {role} public key: {key}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_key() -> String {
        format!("STM{}", "5".repeat(50))
    }

    #[test]
    fn complete_set_validates() {
        let keys = PublicKeySet {
            owner: valid_key(),
            active: valid_key(),
            posting: valid_key(),
            memo: valid_key(),
        };
        assert!(keys.validate().is_ok());
    }

    #[test]
    fn empty_role_is_rejected() {
        let keys = PublicKeySet {
            owner: valid_key(),
            active: String::new(),
            posting: valid_key(),
            memo: valid_key(),
        };
        let err = keys.validate().unwrap_err();
        assert!(err.to_string().contains("active"));
    }

    #[test]
    fn wrong_prefix_is_rejected() {
        let keys = PublicKeySet {
            owner: format!("EOS{}", "5".repeat(50)),
            active: valid_key(),
            posting: valid_key(),
            memo: valid_key(),
        };
        assert!(keys.validate().is_err());
    }
}
