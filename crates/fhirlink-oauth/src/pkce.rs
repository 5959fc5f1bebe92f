//! PKCE (Proof Key for Code Exchange) verifier and challenge.
//!
//! Implements RFC 7636 with the S256 method only.
//!
//! # Example
//!
//! ```
//! use fhirlink_oauth::pkce::{PkceChallenge, PkceVerifier};
//! use fhirlink_oauth::random::OsRandom;
//!
//! let verifier = PkceVerifier::generate(&OsRandom);
//! let challenge = PkceChallenge::from_verifier(&verifier);
//! assert_eq!(verifier.as_str().len(), 43);
//! assert_eq!(challenge.as_str().len(), 43);
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::OAuthError;
use crate::random::RandomSource;

/// The only challenge method sent in authorization requests.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier.
///
/// 43-128 characters from `[A-Za-z0-9-._~]`. Generated verifiers are 32 random
/// bytes encoded as unpadded base64url, i.e. exactly 43 characters.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Wraps an existing verifier, validating length and alphabet.
    ///
    /// # Errors
    ///
    /// Returns `invalid_session` if the verifier is not RFC 7636 compliant.
    pub fn new(verifier: impl Into<String>) -> Result<Self, OAuthError> {
        let verifier = verifier.into();
        let len = verifier.len();

        if !(43..=128).contains(&len) {
            return Err(OAuthError::invalid_session(format!(
                "code verifier must be 43-128 characters, got {len}"
            )));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
        {
            return Err(OAuthError::invalid_session(
                "code verifier contains characters outside [A-Za-z0-9-._~]",
            ));
        }

        Ok(Self(verifier))
    }

    /// Generates a verifier from 32 random bytes.
    #[must_use]
    pub fn generate(random: &dyn RandomSource) -> Self {
        let mut bytes = [0u8; 32];
        random.fill(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Returns the verifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the verifier and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

// The verifier is a secret.
impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PkceVerifier(..)")
    }
}

/// S256 code challenge: `BASE64URL(SHA256(ASCII(code_verifier)))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Derives the challenge for a verifier.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        Self::from_verifier_str(verifier.as_str())
    }

    /// Derives the challenge for a raw verifier string.
    #[must_use]
    pub fn from_verifier_str(verifier: &str) -> Self {
        let hash = Sha256::digest(verifier.as_bytes());
        Self(URL_SAFE_NO_PAD.encode(hash))
    }

    /// Returns the challenge string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PkceChallenge {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{OsRandom, SequenceRandom};

    #[test]
    fn test_generated_verifier_is_43_base64url_chars() {
        let verifier = PkceVerifier::generate(&OsRandom);
        assert_eq!(verifier.as_str().len(), 43);
        assert!(
            verifier
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert!(PkceVerifier::new(verifier.as_str()).is_ok());
    }

    #[test]
    fn test_generated_verifiers_differ() {
        let random = SequenceRandom::new(0);
        let v1 = PkceVerifier::generate(&random);
        let v2 = PkceVerifier::generate(&random);
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_verifier_validation() {
        assert!(PkceVerifier::new("a".repeat(42)).is_err());
        assert!(PkceVerifier::new("a".repeat(43)).is_ok());
        assert!(PkceVerifier::new("a".repeat(128)).is_ok());
        assert!(PkceVerifier::new("a".repeat(129)).is_err());

        let err = PkceVerifier::new(format!("{}!", "a".repeat(50))).unwrap_err();
        assert_eq!(err.kind(), "invalid_session");
    }

    #[test]
    fn test_debug_hides_secret() {
        let verifier = PkceVerifier::new("a".repeat(43)).unwrap();
        assert_eq!(format!("{verifier:?}"), "PkceVerifier(..)");
    }

    #[test]
    fn test_rfc7636_appendix_b_test_vector() {
        let verifier = PkceVerifier::new("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk").unwrap();
        let challenge = PkceChallenge::from_verifier(&verifier);
        assert_eq!(
            challenge.as_str(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }
}
