// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-SHA256 request signing shared with the gateway.
//!
//! The gateway and this service compute the same signature independently, so
//! the payload layout and the hex encoding are a wire contract:
//!
//! ```text
//! authenticated: "{user_id}:{user_role}:{timestamp}:{nonce}"
//! public:        "public:{timestamp}:{nonce}"
//! ```
//!
//! The signature is the lowercase hex encoding of the 32-byte MAC.

use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Marker used in place of the caller identity for unauthenticated requests.
const PUBLIC_MARKER: &str = "public";

/// HMAC-SHA256 signer keyed once with the gateway secret.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    pub fn new(secret: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Sign `payload` and return the lowercase hex digest.
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

/// One-shot signing with an ad-hoc secret.
pub fn sign(secret: &str, payload: &str) -> Result<String, InvalidLength> {
    Ok(Signer::new(secret.as_bytes())?.sign(payload))
}

/// Equality check whose running time depends only on the input lengths.
///
/// Strings of different length compare unequal immediately; that leaks the
/// length but nothing about the content.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The exact string the gateway signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignaturePayload<'a> {
    /// Request carries an `Authorization` header.
    Authenticated {
        user_id: &'a str,
        user_role: &'a str,
        timestamp: &'a str,
        nonce: &'a str,
    },
    /// Anonymous request.
    Public { timestamp: &'a str, nonce: &'a str },
}

impl SignaturePayload<'_> {
    pub fn canonical(&self) -> String {
        match self {
            SignaturePayload::Authenticated {
                user_id,
                user_role,
                timestamp,
                nonce,
            } => format!("{user_id}:{user_role}:{timestamp}:{nonce}"),
            SignaturePayload::Public { timestamp, nonce } => {
                format!("{PUBLIC_MARKER}:{timestamp}:{nonce}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_rfc4231_vector() {
        // RFC 4231, test case 2
        assert_eq!(
            sign("Jefe", "what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = Signer::new(b"gateway-secret").unwrap();
        let first = signer.sign("user_1:ADMIN:1700000000000:abc");
        let second = signer.sign("user_1:ADMIN:1700000000000:abc");
        assert_eq!(first, second);
        assert_eq!(first, sign("gateway-secret", "user_1:ADMIN:1700000000000:abc").unwrap());
    }

    #[test]
    fn output_is_lowercase_hex_of_32_bytes() {
        let sig = sign("k", "").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn different_secret_changes_signature() {
        assert_ne!(sign("a", "payload").unwrap(), sign("b", "payload").unwrap());
    }

    #[test]
    fn keys_of_any_length_are_accepted() {
        assert!(Signer::new(b"").is_ok());
        assert!(Signer::new(&[7u8; 200]).is_ok());
        assert!(sign("", "payload").is_ok());
    }

    #[test]
    fn constant_time_eq_matches_string_equality() {
        let cases = [
            ("", "", true),
            ("", "a", false),
            ("a", "", false),
            ("abc", "abc", true),
            ("abc", "abd", false),
            ("abc", "xbc", false),
            ("abc", "abcd", false),
            ("Abc", "abc", false),
        ];
        for (a, b, expected) in cases {
            assert_eq!(constant_time_eq(a, b), expected, "{a:?} vs {b:?}");
            assert_eq!(constant_time_eq(a, b), a == b);
        }
    }

    #[test]
    fn authenticated_payload_layout() {
        let payload = SignaturePayload::Authenticated {
            user_id: "user_1",
            user_role: "ADMIN",
            timestamp: "1700000000000",
            nonce: "n-1",
        };
        assert_eq!(payload.canonical(), "user_1:ADMIN:1700000000000:n-1");
    }

    #[test]
    fn public_payload_layout() {
        let payload = SignaturePayload::Public {
            timestamp: "1700000000000",
            nonce: "n-1",
        };
        assert_eq!(payload.canonical(), "public:1700000000000:n-1");
    }
}
