use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::auth::AdmissionError;

/// Claims read from an admission token. Only `email` is consulted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub email: Option<String>,
}

/// Strategy for turning a bearer token into claims.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<TokenClaims, AdmissionError>;
}

/// Decodes the token structure and claims without checking the signature,
/// expiry or audience. Anyone able to mint a well-formed JWT with a matching
/// `email` claim is admitted.
#[derive(Debug, Clone, Default)]
pub struct UnverifiedDecoder;

impl TokenVerifier for UnverifiedDecoder {
    fn verify(&self, token: &str) -> Result<TokenClaims, AdmissionError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Admission token failed to decode");
                AdmissionError::InvalidToken
            })
    }
}

/// Validates an HS256 signature with a shared secret before reading claims.
#[derive(Clone)]
pub struct SharedSecretVerifier {
    secret: Vec<u8>,
}

impl SharedSecretVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl TokenVerifier for SharedSecretVerifier {
    fn verify(&self, token: &str) -> Result<TokenClaims, AdmissionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Admission token failed verification");
                AdmissionError::InvalidToken
            })
    }
}
