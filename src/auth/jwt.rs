//! JWT Claim Codec
//! Mission: Sign and verify claim payloads with a single shared HMAC secret

use crate::auth::{
    clock::Clock,
    error::TokenError,
    models::{Claim, TokenKind},
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::debug;

/// Only algorithm accepted on decode; anything else is rejected before the
/// signature is even checked.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Encodes and decodes signed claims
pub struct ClaimCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl ClaimCodec {
    /// Create a codec from the process signing secret
    pub fn new(secret: &[u8], issuer: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked against the injected clock in `decode`
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            clock,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Sign a claim
    pub fn encode(&self, claim: &Claim) -> Result<String, TokenError> {
        encode(&Header::new(SIGNING_ALGORITHM), claim, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, shape, expiry and kind, in that order
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claim, TokenError> {
        let claim = decode::<Claim>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidIssuer => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::MalformedToken,
            })?
            .claims;

        let body = claim.body();
        if body.exp <= body.iat {
            return Err(TokenError::MalformedToken);
        }

        if self.clock.now().timestamp() >= body.exp {
            return Err(TokenError::Expired);
        }

        if claim.kind() != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claim.kind(),
            });
        }

        debug!(
            "Decoded {} token for user {}",
            claim.kind(),
            claim.subject()
        );

        Ok(claim)
    }
}
