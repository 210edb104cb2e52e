//! Admission control for the admin chat.
//!
//! A connection presents a bearer token in its `token` query parameter. A
//! [`TokenVerifier`] turns it into claims, then [`AdmissionPolicy`] checks the
//! `email` claim against the organisation's domain.

pub mod jwt;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use jwt::{SharedSecretVerifier, TokenClaims, TokenVerifier, UnverifiedDecoder};

/// Identity used when a token carries no `email` claim.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// The email address an admitted connection is known by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local part of the address, used as the chat sender label.
    pub fn sender_label(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("invalid token")]
    InvalidToken,
    #[error("access denied for {identity}")]
    AccessDenied { identity: String },
}

impl AdmissionError {
    /// The system notice sent to the rejected connection before it is closed.
    pub fn notice(&self) -> &'static str {
        match self {
            Self::InvalidToken => "Invalid token.",
            Self::AccessDenied { .. } => "Access denied: not an admin.",
        }
    }
}

/// Admits identities whose email ends with the organisation's domain.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    domain_suffix: String,
}

impl AdmissionPolicy {
    /// `domain` may be given as `bullride.us` or `@bullride.us`.
    pub fn new(domain: &str) -> Self {
        let domain = domain.trim().trim_start_matches('@');
        Self {
            domain_suffix: format!("@{}", domain),
        }
    }

    pub fn check(&self, claims: TokenClaims) -> Result<Identity, AdmissionError> {
        let email = claims
            .email
            .filter(|email| !email.is_empty())
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());

        if email.ends_with(&self.domain_suffix) {
            Ok(Identity::new(email))
        } else {
            Err(AdmissionError::AccessDenied { identity: email })
        }
    }
}

/// Verifier plus policy, shared by every upgrade request.
#[derive(Clone)]
pub struct Admission {
    verifier: Arc<dyn TokenVerifier>,
    policy: AdmissionPolicy,
}

impl Admission {
    pub fn new(verifier: Arc<dyn TokenVerifier>, policy: AdmissionPolicy) -> Self {
        Self { verifier, policy }
    }

    /// Admission without signature checks.
    pub fn unverified(domain: &str) -> Self {
        Self::new(Arc::new(UnverifiedDecoder), AdmissionPolicy::new(domain))
    }

    /// A missing or empty token is treated as invalid.
    pub fn admit(&self, token: Option<&str>) -> Result<Identity, AdmissionError> {
        let token = token
            .filter(|token| !token.is_empty())
            .ok_or(AdmissionError::InvalidToken)?;
        let claims = self.verifier.verify(token)?;
        self.policy.check(claims)
    }
}
