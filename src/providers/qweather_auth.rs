//! Short-lived EdDSA tokens for QWeather requests

use super::{ProviderError, ProviderResult};
use crate::config::WeatherSigningKey;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// `iat` is backdated so a slightly fast upstream clock still accepts the token
const ISSUED_AT_SKEW_SECS: i64 = 30;
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// A cached token is replaced once it is this close to `exp`
const REFRESH_MARGIN_SECS: i64 = 300;

/// Claims QWeather expects in a request token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Project id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Signs QWeather tokens with an Ed25519 key and reuses them until shortly before expiry
pub struct TokenSigner {
    key: EncodingKey,
    key_id: String,
    project_id: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSigner {
    /// Read the PKCS#8 PEM key named in `settings`
    pub fn load(settings: &WeatherSigningKey<'_>) -> ProviderResult<Self> {
        let pem = std::fs::read(settings.private_key_path).map_err(|e| {
            ProviderError::Config(format!(
                "Cannot read QWeather signing key {}: {e}",
                settings.private_key_path
            ))
        })?;
        Self::from_pem(&pem, settings.key_id, settings.project_id)
    }

    pub fn from_pem(pem: &[u8], key_id: &str, project_id: &str) -> ProviderResult<Self> {
        let key = EncodingKey::from_ed_pem(pem)
            .map_err(|e| ProviderError::Config(format!("Invalid QWeather signing key: {e}")))?;
        Ok(Self {
            key,
            key_id: key_id.to_string(),
            project_id: project_id.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// Token valid for the current request
    pub fn token(&self) -> ProviderResult<String> {
        self.token_at(Utc::now())
    }

    pub fn token_at(&self, now: DateTime<Utc>) -> ProviderResult<String> {
        let now = now.timestamp();
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        match cached.as_ref() {
            Some(current) if current.expires_at - REFRESH_MARGIN_SECS > now => {
                Ok(current.token.clone())
            }
            _ => {
                let fresh = self.sign(now)?;
                let token = fresh.token.clone();
                *cached = Some(fresh);
                Ok(token)
            }
        }
    }

    fn sign(&self, now: i64) -> ProviderResult<CachedToken> {
        let claims = TokenClaims {
            sub: self.project_id.clone(),
            iat: now - ISSUED_AT_SKEW_SECS,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &claims, &self.key)
            .map_err(|e| ProviderError::Config(format!("Failed to sign QWeather token: {e}")))?;
        Ok(CachedToken {
            token,
            expires_at: claims.exp,
        })
    }
}
