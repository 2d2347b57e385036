//! Access and refresh token creation and verification.
//!
//! Both token kinds are HS256 JWTs signed with the configured `secret_key`. A
//! `token_type` claim keeps one kind from being accepted in place of the other.

use std::{collections::BTreeSet, time::Duration};

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, errors::Error, types::Capability, types::UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // Hyphenated user id
    pub permissions: BTreeSet<Capability>,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies tokens with a secret fixed at construction.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret_key = config.secret_key.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| Error::Internal {
            operation: "token codec: secret_key is required".to_string(),
        })?;

        Ok(Self::new(
            secret_key.as_bytes(),
            config.auth.security.access_token_expiry,
            config.auth.security.refresh_token_expiry,
        ))
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access_token(&self, subject: UserId, permissions: &BTreeSet<Capability>) -> Result<String, Error> {
        let (iat, exp) = window(self.access_ttl)?;
        let claims = AccessClaims {
            sub: subject.to_string(),
            permissions: permissions.clone(),
            token_type: TokenType::Access,
            iat,
            exp,
        };
        self.sign(&claims)
    }

    pub fn issue_refresh_token(&self, subject: UserId) -> Result<String, Error> {
        let (iat, exp) = window(self.refresh_ttl)?;
        let claims = RefreshClaims {
            sub: subject.to_string(),
            token_type: TokenType::Refresh,
            iat,
            exp,
        };
        self.sign(&claims)
    }

    pub fn issue_pair(&self, subject: UserId, permissions: &BTreeSet<Capability>) -> Result<TokenPair, Error> {
        Ok(TokenPair {
            access_token: self.issue_access_token(subject, permissions)?,
            refresh_token: self.issue_refresh_token(subject)?,
        })
    }

    /// Verify an access token, returning its subject and permission snapshot.
    pub fn decode_access_token(&self, token: &str) -> Result<(UserId, BTreeSet<Capability>), Error> {
        let claims: AccessClaims = self.verify(token)?;
        expect_type(claims.token_type, TokenType::Access)?;
        Ok((parse_subject(&claims.sub)?, claims.permissions))
    }

    /// Verify a refresh token, returning its subject.
    pub fn decode_refresh_token(&self, token: &str) -> Result<UserId, Error> {
        let claims: RefreshClaims = self.verify(token)?;
        expect_type(claims.token_type, TokenType::Refresh)?;
        parse_subject(&claims.sub)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, Error> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|e| Error::Internal {
            operation: format!("create JWT: {e}"),
        })
    }

    fn verify<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Result<T, Error> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}

fn window(ttl: Duration) -> Result<(i64, i64), Error> {
    let now = Utc::now();
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::Internal {
        operation: format!("compute token expiry: {e}"),
    })?;
    Ok((now.timestamp(), (now + ttl).timestamp()))
}

fn expect_type(actual: TokenType, expected: TokenType) -> Result<(), Error> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::InvalidToken {
            reason: format!("expected {expected:?} token, got {actual:?}"),
        })
    }
}

fn parse_subject(sub: &str) -> Result<UserId, Error> {
    Uuid::parse_str(sub).map_err(|e| Error::InvalidToken {
        reason: format!("subject is not a user id: {e}"),
    })
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens.
        // A payload that fails to deserialize passed the signature check, so it
        // is a token of some other shape rather than a server fault.
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::ExpiredSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm => Error::InvalidToken {
            reason: format!("{e}"),
        },

        // Server errors (500) - key issues, internal failures
        ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::RsaFailedSigning
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::MissingAlgorithm
        | ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    }
}
