//! RS256 token validation.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::claims::Claims;
use crate::error::{AuthError, Result};

/// Validates bearer tokens against the public key fetched at startup.
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Build a validator from an RSA public key in PEM form.
    pub fn from_rsa_pem(public_key_pem: &[u8], issuer: &str) -> Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Validate a token's signature, issuer, and expiry, returning its
    /// claims.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidIssuer => AuthError::WrongIssuer,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;
        Ok(data.claims)
    }
}
