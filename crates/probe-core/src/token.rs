use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime stamped into every forged token.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

const FILLER: char = 'x';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user: String,
    pub role: String,
    /// Expiry as unix seconds
    pub exp: i64,
    /// Opaque filler whose length is the quantity under test
    pub payload: String,
}

/// Unsigned token: `<header>.<claims>.` with an empty signature segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    header: TokenHeader,
    claims: TokenClaims,
    encoded: String,
}

impl AuthToken {
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    pub fn payload_size(&self) -> usize {
        self.claims.payload.len()
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Forge a token that expires one hour from now.
pub fn forge(subject: &str, role: &str, payload_size: usize) -> AuthToken {
    forge_at(subject, role, payload_size, Utc::now())
}

pub fn forge_at(subject: &str, role: &str, payload_size: usize, now: DateTime<Utc>) -> AuthToken {
    let header = TokenHeader::default();
    let claims = TokenClaims {
        user: subject.to_string(),
        role: role.to_string(),
        exp: (now + Duration::seconds(TOKEN_LIFETIME_SECS)).timestamp(),
        payload: std::iter::repeat(FILLER).take(payload_size).collect(),
    };

    let encoded = format!("{}.{}.", encode_segment(&header), encode_segment(&claims));
    AuthToken {
        header,
        claims,
        encoded,
    }
}

fn encode_segment<T: Serialize>(value: &T) -> String {
    // Plain structs of strings and integers always serialize.
    let json = serde_json::to_vec(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Split and decode the first two segments of a token.
pub fn decode(token: &str) -> anyhow::Result<(TokenHeader, TokenClaims)> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        anyhow::bail!(
            "token must have exactly three segments, found {}",
            segments.len()
        );
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(segments[0])
        .context("header segment is not URL-safe base64")?;
    let claims_bytes = URL_SAFE_NO_PAD
        .decode(segments[1])
        .context("claims segment is not URL-safe base64")?;

    let header: TokenHeader =
        serde_json::from_slice(&header_bytes).context("header segment is not valid JSON")?;
    let claims: TokenClaims =
        serde_json::from_slice(&claims_bytes).context("claims segment is not valid JSON")?;
    Ok((header, claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_shape() {
        let token = forge("example_user", "admin", 20);
        let s = token.as_str();
        assert_eq!(s.matches('.').count(), 2);
        assert!(s.ends_with('.'), "signature segment must be empty");
        assert!(!s.contains('='), "segments must not be padded");
        assert!(!s.contains('+') && !s.contains('/'));
    }

    #[test]
    fn test_same_instant_is_deterministic() {
        let a = forge_at("example_user", "admin", 40, fixed_now());
        let b = forge_at("example_user", "admin", 40, fixed_now());
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_decoded_claims() {
        let token = forge_at("example_user", "admin", 80, fixed_now());
        let (header, claims) = decode(token.as_str()).unwrap();

        assert_eq!(header.alg, "none");
        assert_eq!(header.typ, "JWT");
        assert_eq!(claims.user, "example_user");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp, fixed_now().timestamp() + 3600);
        assert_eq!(claims.payload.len(), 80);
        assert!(claims.payload.chars().all(|c| c == 'x'));
        assert_eq!(&claims, token.claims());
    }

    #[test]
    fn test_payload_length_exact_across_sizes() {
        for size in [0, 1, 2, 3, 20, 640, 10240] {
            let token = forge("u", "r", size);
            let (_, claims) = decode(token.as_str()).unwrap();
            assert_eq!(claims.payload.len(), size);
            assert_eq!(token.payload_size(), size);
        }
    }

    #[test]
    fn test_expiry_is_one_hour_ahead() {
        let before = Utc::now().timestamp();
        let token = forge("u", "r", 1);
        let after = Utc::now().timestamp();
        let exp = token.claims().exp;
        assert!(exp >= before + 3600 && exp <= after + 3600);
    }

    #[test]
    fn test_decode_rejects_bad_tokens() {
        assert!(decode("only.two").is_err());
        assert!(decode("a.b.c.d").is_err());
        assert!(decode("!!!.???.").is_err());
    }
}
