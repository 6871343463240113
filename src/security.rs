//! Webhook signature verification.
//! LINE signs every webhook body with the channel secret: the
//! `X-Line-Signature` header holds base64(HMAC-SHA256(secret, body)).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::BotError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Check a raw body against its signature header value
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), BotError> {
    let expected = STANDARD.decode(signature.trim()).map_err(|_| {
        warn!("Security: Signature header is not valid base64");
        BotError::InvalidSignature
    })?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| BotError::InvalidSignature)?;
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected).map_err(|_| {
        warn!("Security: Blocked webhook with mismatched signature");
        BotError::InvalidSignature
    })
}

/// Produce the signature LINE would send for `body`
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}
