use super::dispatch::ActionPlan;
use crate::shared::ids::{ChannelId, CommandName, PrincipalId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_VERSION: u8 = 1;
const CLOCK_SKEW_SECS: i64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("confirmation token is malformed")]
    Malformed,
    #[error("confirmation token signature does not match")]
    BadSignature,
    #[error("confirmation token version {0} is not supported")]
    UnsupportedVersion(u8),
    #[error("confirmation token expired {age_secs}s after it was issued")]
    Expired { age_secs: i64 },
    #[error("confirmation token was issued in the future")]
    IssuedInFuture,
    #[error("failed to encode confirmation token: {0}")]
    Encode(String),
    #[error("failed to generate confirmation nonce: {0}")]
    Randomness(String),
}

/// Everything needed to execute a proposed action later, carried by the
/// token itself so no proposal state lives in the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationClaims {
    pub v: u8,
    pub command: CommandName,
    pub plan: ActionPlan,
    pub proposed_by: PrincipalId,
    #[serde(default)]
    pub channel: Option<ChannelId>,
    pub issued_at: i64,
    pub nonce: String,
}

#[derive(Clone)]
pub struct ConfirmationSigner {
    key: Vec<u8>,
    ttl_secs: u64,
}

impl std::fmt::Debug for ConfirmationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationSigner")
            .field("key", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl ConfirmationSigner {
    pub fn new(key: Vec<u8>, ttl_secs: u64) -> Self {
        Self { key, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn ttl_as_i64(&self) -> i64 {
        i64::try_from(self.ttl_secs).unwrap_or(i64::MAX)
    }

    /// Instant after which a token issued at `issued_at` no longer verifies.
    pub fn expires_at(&self, issued_at: i64) -> i64 {
        issued_at.saturating_add(self.ttl_as_i64())
    }

    pub fn issue(
        &self,
        command: &CommandName,
        plan: &ActionPlan,
        proposed_by: &PrincipalId,
        channel: Option<&ChannelId>,
        now: i64,
    ) -> Result<(String, ConfirmationClaims), TokenError> {
        let claims = ConfirmationClaims {
            v: TOKEN_VERSION,
            command: command.clone(),
            plan: plan.clone(),
            proposed_by: proposed_by.clone(),
            channel: channel.cloned(),
            issued_at: now,
            nonce: generate_nonce()?,
        };
        let json = serde_json::to_vec(&claims).map_err(|e| TokenError::Encode(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.mac(payload.as_bytes())?.finalize().into_bytes());
        Ok((format!("{payload}.{signature}"), claims))
    }

    pub fn verify(&self, token: &str, now: i64) -> Result<ConfirmationClaims, TokenError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;
        self.mac(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: ConfirmationClaims =
            serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;
        if claims.v != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(claims.v));
        }

        let age_secs = now.saturating_sub(claims.issued_at);
        if age_secs < -CLOCK_SKEW_SECS {
            return Err(TokenError::IssuedInFuture);
        }
        if age_secs > self.ttl_as_i64() {
            return Err(TokenError::Expired { age_secs });
        }
        Ok(claims)
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|e| TokenError::Encode(e.to_string()))?;
        mac.update(payload);
        Ok(mac)
    }
}

fn generate_nonce() -> Result<String, TokenError> {
    let mut bytes = [0_u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|e| TokenError::Randomness(e.to_string()))?;
    Ok(hex::encode(bytes))
}
