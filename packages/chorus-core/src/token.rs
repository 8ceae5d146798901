//! Signed streaming tokens.
//!
//! Each track in a live session carries an opaque bearer token that the
//! public stream endpoint validates. Claims are deliberately terse (`id`,
//! `f`, `b`) to keep tokens short; expiry is fixed at 24 hours. Rotating
//! the signing key invalidates outstanding tokens, which is acceptable
//! because sessions are ephemeral.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChorusError;
use crate::protocol_constants::STREAM_TOKEN_TTL_SECS;

/// Claims carried by a stream token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamClaims {
    /// Media file ID.
    pub id: String,
    /// Requested transcode format, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f: Option<String>,
    /// Requested max bit rate (kbps), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<u32>,
    /// Expiry as a Unix timestamp (seconds).
    pub exp: u64,
}

/// Mints and validates HS256 stream tokens.
pub struct StreamTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl StreamTokens {
    /// Creates a minter from a stable secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Creates a minter with a process-random key.
    ///
    /// Tokens minted by a previous process become invalid, which is fine:
    /// live sessions do not survive a restart either.
    pub fn generate() -> Self {
        let secret = [Uuid::new_v4().into_bytes(), Uuid::new_v4().into_bytes()].concat();
        Self::new(&secret)
    }

    /// Mints a token for one media file.
    pub fn mint(
        &self,
        media_file_id: &str,
        format: Option<&str>,
        max_bit_rate: Option<u32>,
    ) -> String {
        let claims = StreamClaims {
            id: media_file_id.to_string(),
            f: format.map(str::to_string),
            b: max_bit_rate.filter(|&b| b > 0),
            exp: now_secs() + STREAM_TOKEN_TTL_SECS,
        };
        encode(&Header::default(), &claims, &self.encoding).unwrap_or_default()
    }

    /// Validates a token and returns its claims.
    pub fn decode(&self, token: &str) -> Result<StreamClaims, ChorusError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<StreamClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| ChorusError::InvalidToken(err.to_string()))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_and_decode_round_trip() {
        let tokens = StreamTokens::generate();
        let token = tokens.mint("mf-42", Some("opus"), Some(192));

        let claims = tokens.decode(&token).unwrap();
        assert_eq!(claims.id, "mf-42");
        assert_eq!(claims.f.as_deref(), Some("opus"));
        assert_eq!(claims.b, Some(192));
        assert!(claims.exp > now_secs());
    }

    #[test]
    fn optional_claims_are_omitted() {
        let tokens = StreamTokens::generate();
        let claims = tokens.decode(&tokens.mint("mf-1", None, None)).unwrap();
        assert_eq!(claims.f, None);
        assert_eq!(claims.b, None);
    }

    #[test]
    fn zero_bit_rate_is_treated_as_unset() {
        let tokens = StreamTokens::generate();
        let claims = tokens.decode(&tokens.mint("mf-1", None, Some(0))).unwrap();
        assert_eq!(claims.b, None);
    }

    #[test]
    fn foreign_key_is_rejected() {
        let minter = StreamTokens::generate();
        let verifier = StreamTokens::generate();
        let token = minter.mint("mf-1", None, None);
        assert!(verifier.decode(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let tokens = StreamTokens::generate();
        assert!(tokens.decode("not-a-token").is_err());
    }
}
