use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use super::token_store::RefreshTokenStore;
use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Signing and verification keys. Access and refresh tokens use distinct secrets.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(1) as u64) * 60),
        }
    }

    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<(String, Claims)> {
        let now = OffsetDateTime::now_utc();
        let (ttl, key) = match kind {
            TokenKind::Access => (self.access_ttl, &self.access_encoding),
            TokenKind::Refresh => (self.refresh_ttl, &self.refresh_encoding),
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok((token, claims))
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Access).map(|(token, _)| token)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Refresh).map(|(token, _)| token)
    }

    fn verify_with_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        let data = decode::<Claims>(token, key, &validation)?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {:?} token, got {:?}", kind, data.claims.kind);
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Refresh)
    }
}

/// Issues, verifies and revokes tokens. Refresh tokens are only honoured while
/// present in the backing [`RefreshTokenStore`].
#[derive(Clone)]
pub struct TokenService {
    keys: JwtKeys,
    store: Arc<dyn RefreshTokenStore>,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl TokenService {
    pub fn new(keys: JwtKeys, store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { keys, store }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn issue_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.keys.sign_access(user_id)
    }

    pub async fn issue_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (token, claims) = self.keys.sign_with_kind(user_id, TokenKind::Refresh)?;
        self.store.insert(&token, claims.exp as i64).await?;
        Ok(token)
    }

    pub async fn verify_refresh(&self, token: &str) -> Result<Uuid, AppError> {
        if !self.store.contains(token).await? {
            warn!("refresh token not in valid set");
            return Err(AppError::InvalidToken);
        }
        let claims = match self.keys.verify_refresh(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "refresh token rejected");
                // expired or otherwise unusable: stop tracking it
                self.store.remove(token).await?;
                return Err(AppError::InvalidToken);
            }
        };
        Ok(claims.sub)
    }

    pub async fn revoke(&self, token: &str) -> anyhow::Result<()> {
        if self.store.remove(token).await? {
            debug!("refresh token revoked");
        }
        Ok(())
    }

    /// Stateless: access tokens cannot be revoked individually.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, AppError> {
        self.keys
            .verify_access(token)
            .map(|c| c.sub)
            .map_err(|_| AppError::Unauthorized)
    }
}
