//! JWT claims for the authorization context.
//!
//! Tokens are only validated here: issuance belongs to the identity service.
//! Role checks happen at the API layer, before any engine call.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Caller role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Borrower,
    Librarian,
    Admin,
}

/// JWT Claims for authenticated callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub borrower_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// Create a new JWT token (used by tests and tooling; the server never mints)
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and validate a JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_librarian(&self) -> bool {
        matches!(self.role, Role::Librarian | Role::Admin)
    }

    /// Require librarian (or admin) privileges
    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Librarian privileges required".to_string(),
            ))
        }
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Administrator privileges required".to_string(),
            ))
        }
    }

    /// Borrowers may only act on their own loans; librarians on anyone's
    pub fn require_self_or_librarian(&self, borrower_id: i32) -> Result<(), AppError> {
        if self.is_librarian() || self.borrower_id == borrower_id {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Cannot act on another borrower's loans".to_string(),
            ))
        }
    }
}
