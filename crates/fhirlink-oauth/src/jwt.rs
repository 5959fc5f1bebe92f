//! JWT helpers: unverified payload decoding, RSA signing keys and the
//! client assertion used by JWT-bearer refresh.
//!
//! Tokens received from vendors are only *read* here. Their signatures are
//! not verified; the client trusts the TLS channel to the token endpoint.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OAuthError;

// ============================================================================
// Payload decoding
// ============================================================================

/// Decodes the payload segment of a compact JWT without verifying it.
///
/// # Errors
///
/// Returns `invalid_jwt` if the token is not three dot-separated segments or
/// the payload is not base64url-encoded JSON object.
pub fn decode_payload(token: &str) -> Result<Map<String, Value>, OAuthError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(OAuthError::invalid_jwt("expected three dot-separated segments"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| OAuthError::invalid_jwt(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(OAuthError::invalid_jwt("payload is not a JSON object")),
        Err(e) => Err(OAuthError::invalid_jwt(format!("payload is not JSON: {e}"))),
    }
}

/// Reads a claim as a string. Numbers are rendered in decimal.
#[must_use]
pub fn claim_str(claims: &Map<String, Value>, name: &str) -> Option<String> {
    match claims.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Returns the last `/`-separated segment of a reference such as
/// `https://ehr/fhir/Patient/123` or `Patient/123`.
#[must_use]
pub fn last_segment(reference: &str) -> &str {
    let trimmed = reference.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

// ============================================================================
// Keys
// ============================================================================

/// RSA signing algorithms accepted by SMART authorization servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384. Preferred by SMART backend services.
    #[default]
    RS384,
}

impl SigningAlgorithm {
    fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
        }
    }

    /// Returns the JOSE algorithm name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Creates a set holding one key.
    #[must_use]
    pub fn single(key: Jwk) -> Self {
        Self { keys: vec![key] }
    }
}

/// Public RSA JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always "RSA".
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig").
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// Modulus (base64url).
    pub n: String,

    /// Public exponent (base64url).
    pub e: String,
}

/// An RSA private key used to sign client assertions.
pub struct SigningKeyPair {
    /// Key ID, sent as the `kid` header and in the registered JWK.
    pub kid: String,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    encoding_key: EncodingKey,
    n: Vec<u8>,
    e: Vec<u8>,
}

impl SigningKeyPair {
    /// Loads a private key from PEM. Both PKCS#8 (`BEGIN PRIVATE KEY`) and
    /// PKCS#1 (`BEGIN RSA PRIVATE KEY`) encodings are accepted.
    ///
    /// # Errors
    ///
    /// Returns `invalid_config` if the PEM is not an RSA private key.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
    ) -> Result<Self, OAuthError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| OAuthError::invalid_config(format!("invalid RSA private key: {e}")))?;
        Self::from_private_key(kid.into(), algorithm, &private_key)
    }

    /// Generates a fresh 2048-bit key.
    ///
    /// # Errors
    ///
    /// Returns `assertion_failed` if key generation fails.
    pub fn generate(kid: impl Into<String>, algorithm: SigningAlgorithm) -> Result<Self, OAuthError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| OAuthError::assertion(format!("key generation failed: {e}")))?;
        Self::from_private_key(kid.into(), algorithm, &private_key)
    }

    fn from_private_key(
        kid: String,
        algorithm: SigningAlgorithm,
        private_key: &RsaPrivateKey,
    ) -> Result<Self, OAuthError> {
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| OAuthError::invalid_config(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| OAuthError::invalid_config(e.to_string()))?;

        Ok(Self {
            kid,
            algorithm,
            encoding_key,
            n: private_key.n().to_bytes_be(),
            e: private_key.e().to_bytes_be(),
        })
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: self.algorithm.as_str().to_string(),
            n: URL_SAFE_NO_PAD.encode(&self.n),
            e: URL_SAFE_NO_PAD.encode(&self.e),
        }
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client assertions
// ============================================================================

/// Claims of a JWT-bearer client assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer: the registered client id.
    pub iss: String,
    /// Subject: the registered client id.
    pub sub: String,
    /// Audience: the token endpoint URL.
    pub aud: String,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Unique assertion id.
    pub jti: String,
}

/// Signs client assertions.
///
/// Injected into the JWT-bearer refresher so callers can keep the private key
/// in whatever key store they use.
pub trait AssertionSigner: Send + Sync {
    /// Returns the compact serialization of a signed JWT carrying `claims`.
    ///
    /// # Errors
    ///
    /// Returns `assertion_failed` if signing fails.
    fn sign(&self, claims: &AssertionClaims) -> Result<String, OAuthError>;
}

impl AssertionSigner for SigningKeyPair {
    fn sign(&self, claims: &AssertionClaims) -> Result<String, OAuthError> {
        let mut header = Header::new(self.algorithm.to_jwt_algorithm());
        header.kid = Some(self.kid.clone());
        header.typ = Some("JWT".to_string());

        encode(&header, claims, &self.encoding_key).map_err(|e| OAuthError::assertion(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde_json::json;

    use super::*;

    fn unsigned(payload: &Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn test_decode_payload() {
        let token = unsigned(&json!({"fhirUser": "Patient/123", "n": 7}));
        let claims = decode_payload(&token).unwrap();
        assert_eq!(claim_str(&claims, "fhirUser").as_deref(), Some("Patient/123"));
        assert_eq!(claim_str(&claims, "n").as_deref(), Some("7"));
        assert!(claim_str(&claims, "missing").is_none());
    }

    #[test]
    fn test_decode_payload_rejects_garbage() {
        assert_eq!(decode_payload("opaque-token").unwrap_err().kind(), "invalid_jwt");
        assert_eq!(decode_payload("a.!!!.c").unwrap_err().kind(), "invalid_jwt");
        assert_eq!(decode_payload("a.b.c.d").unwrap_err().kind(), "invalid_jwt");

        let array = format!("x.{}.y", URL_SAFE_NO_PAD.encode("[1]"));
        assert_eq!(decode_payload(&array).unwrap_err().kind(), "invalid_jwt");
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("https://ehr/fhir/Patient/123"), "123");
        assert_eq!(last_segment("Patient/123/"), "123");
        assert_eq!(last_segment("123"), "123");
    }

    #[test]
    fn test_jwk_export() {
        let key = SigningKeyPair::generate("kid-1", SigningAlgorithm::RS384).unwrap();
        let jwk = key.to_jwk();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "kid-1");
        assert_eq!(jwk.alg, "RS384");
        assert_eq!(jwk.e, "AQAB");

        let json = serde_json::to_value(Jwks::single(jwk)).unwrap();
        assert_eq!(json["keys"][0]["use"], "sig");
    }

    #[test]
    fn test_from_pem_round_trips_through_pkcs8() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let key = SigningKeyPair::from_pem("k", SigningAlgorithm::RS256, &pem).unwrap();
        assert_eq!(key.to_jwk().alg, "RS256");

        let err = SigningKeyPair::from_pem("k", SigningAlgorithm::RS384, "not a key").unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
    }

    #[test]
    fn test_signed_assertion_verifies_against_jwk() {
        let key = SigningKeyPair::generate("kid-1", SigningAlgorithm::RS384).unwrap();
        let claims = AssertionClaims {
            iss: "client".to_string(),
            sub: "client".to_string(),
            aud: "https://ehr/token".to_string(),
            exp: 4_000_000_000,
            iat: 3_999_999_700,
            jti: "jti-1".to_string(),
        };
        let token = key.sign(&claims).unwrap();

        let jwk = key.to_jwk();
        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).unwrap();
        let mut validation = Validation::new(Algorithm::RS384);
        validation.set_audience(&["https://ehr/token"]);
        let data = decode::<AssertionClaims>(&token, &decoding_key, &validation).unwrap();

        assert_eq!(data.claims, claims);
        assert_eq!(data.header.kid.as_deref(), Some("kid-1"));
    }
}
