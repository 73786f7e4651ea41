// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway signature verification.
//!
//! A request moves from *unverified* to either *verified* or *rejected* in a
//! single pass, in this order:
//!
//! 1. timestamp, nonce and signature must be present
//! 2. the timestamp must be a base-10 integer
//! 3. `|now - timestamp|` must not exceed [`MAX_REQUEST_AGE_MS`]
//! 4. choose the verification path (see [`VerificationPath`])
//! 5. on the signed path, recompute the HMAC and compare in constant time
//!
//! The freshness window is symmetric, so timestamps up to five minutes in the
//! future are accepted as clock skew.

use chrono::Utc;
use hmac::digest::InvalidLength;
use tracing::warn;

use super::headers::SecurityHeaders;
use super::signer::{constant_time_eq, SignaturePayload, Signer};
use super::SecurityError;
use crate::replay::NonceKey;

/// Freshness window (5 minutes), inclusive.
pub const MAX_REQUEST_AGE_MS: u64 = 5 * 60 * 1000;

/// How a request's signature was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPath {
    /// Federation flag set and the pre-shared gateway signature presented.
    /// Lets the gateway build the supergraph and run codegen against the
    /// schema without signing each request.
    TrustedGateway,
    /// HMAC over the signature payload checked against the gateway secret.
    Signed,
}

/// Output of a successful verification, consumed by the replay guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRequest {
    pub nonce_key: NonceKey,
    /// Timestamp header as received
    pub timestamp: String,
    pub path: VerificationPath,
}

/// Verifies freshness and authenticity of gateway requests.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    signer: Signer,
    gateway_signature: String,
    max_age_ms: u64,
}

impl SignatureVerifier {
    /// # Arguments
    /// - `gateway_secret`: HMAC key shared with the gateway
    /// - `gateway_signature`: static signature the gateway presents on
    ///   schema federation requests
    pub fn new(
        gateway_secret: &str,
        gateway_signature: impl Into<String>,
    ) -> Result<Self, InvalidLength> {
        Ok(Self {
            signer: Signer::new(gateway_secret.as_bytes())?,
            gateway_signature: gateway_signature.into(),
            max_age_ms: MAX_REQUEST_AGE_MS,
        })
    }

    /// Verify against the current wall clock.
    pub fn verify(&self, headers: &SecurityHeaders) -> Result<VerifiedRequest, SecurityError> {
        self.verify_at(headers, Utc::now().timestamp_millis())
    }

    /// Verify against `now_ms` (epoch milliseconds).
    pub fn verify_at(
        &self,
        headers: &SecurityHeaders,
        now_ms: i64,
    ) -> Result<VerifiedRequest, SecurityError> {
        let (Some(timestamp), Some(nonce), Some(signature)) = (
            non_empty(&headers.timestamp),
            non_empty(&headers.nonce),
            non_empty(&headers.signature),
        ) else {
            warn!("Rejected request: missing gateway security headers");
            return Err(SecurityError::MissingSecurityHeaders);
        };

        let request_time: i64 = timestamp.parse().map_err(|_| {
            warn!(timestamp, "Rejected request: unparseable gateway timestamp");
            SecurityError::InvalidTimestamp
        })?;

        let age_ms = now_ms.abs_diff(request_time);
        if age_ms > self.max_age_ms {
            warn!(age_ms, "Rejected request: timestamp outside freshness window");
            return Err(SecurityError::RequestExpired { age_ms });
        }

        let path = self.select_path(headers, signature);
        match path {
            VerificationPath::TrustedGateway => {
                warn!(
                    "Skipping signature verification for gateway request to allow supergraph build or codegen schema generation"
                );
            }
            VerificationPath::Signed => {
                let payload = signature_payload(headers, timestamp, nonce);
                let expected = self.signer.sign(&payload.canonical());
                if !constant_time_eq(signature, &expected) {
                    warn!(
                        user_id = headers.user_id.as_deref().unwrap_or("anonymous"),
                        "Invalid signature detected"
                    );
                    return Err(SecurityError::InvalidSignature);
                }
            }
        }

        Ok(VerifiedRequest {
            nonce_key: NonceKey::new(nonce),
            timestamp: timestamp.to_owned(),
            path,
        })
    }

    /// The trusted-gateway path needs both the federation flag and the
    /// pre-shared signature; anything less goes through the HMAC check.
    fn select_path(&self, headers: &SecurityHeaders, signature: &str) -> VerificationPath {
        if headers.federation && constant_time_eq(signature, &self.gateway_signature) {
            VerificationPath::TrustedGateway
        } else {
            VerificationPath::Signed
        }
    }
}

/// Authenticated form when an `Authorization` header is present, public
/// form otherwise. Missing identity fields sign as empty strings.
fn signature_payload<'a>(
    headers: &'a SecurityHeaders,
    timestamp: &'a str,
    nonce: &'a str,
) -> SignaturePayload<'a> {
    if non_empty(&headers.authorization).is_some() {
        SignaturePayload::Authenticated {
            user_id: headers.user_id.as_deref().unwrap_or(""),
            user_role: headers.user_role.as_deref().unwrap_or(""),
            timestamp,
            nonce,
        }
    } else {
        SignaturePayload::Public { timestamp, nonce }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signer::sign;

    const SECRET: &str = "gateway-secret";
    const GATEWAY_SIGNATURE: &str = "static-federation-signature";
    const NOW: i64 = 1_700_000_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET, GATEWAY_SIGNATURE).unwrap()
    }

    fn signed_headers(timestamp: i64, nonce: &str) -> SecurityHeaders {
        let ts = timestamp.to_string();
        let payload = format!("user_1:ADMIN:{ts}:{nonce}");
        SecurityHeaders {
            timestamp: Some(ts),
            nonce: Some(nonce.to_string()),
            signature: Some(sign(SECRET, &payload).unwrap()),
            authorization: Some("Bearer token".to_string()),
            user_id: Some("user_1".to_string()),
            user_role: Some("ADMIN".to_string()),
            ..Default::default()
        }
    }

    fn public_headers(timestamp: i64, nonce: &str) -> SecurityHeaders {
        let ts = timestamp.to_string();
        SecurityHeaders {
            signature: Some(sign(SECRET, &format!("public:{ts}:{nonce}")).unwrap()),
            timestamp: Some(ts),
            nonce: Some(nonce.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_authenticated_signature() {
        let verified = verifier().verify_at(&signed_headers(NOW, "n-1"), NOW).unwrap();
        assert_eq!(verified.nonce_key.as_str(), "nonce:n-1");
        assert_eq!(verified.timestamp, NOW.to_string());
        assert_eq!(verified.path, VerificationPath::Signed);
    }

    #[test]
    fn accepts_valid_public_signature() {
        let verified = verifier().verify_at(&public_headers(NOW, "n-2"), NOW).unwrap();
        assert_eq!(verified.path, VerificationPath::Signed);
    }

    #[test]
    fn public_signature_rejected_when_authorization_present() {
        let mut headers = public_headers(NOW, "n-3");
        headers.authorization = Some("Bearer token".to_string());
        assert_eq!(
            verifier().verify_at(&headers, NOW),
            Err(SecurityError::InvalidSignature)
        );
    }

    #[test]
    fn authenticated_signature_rejected_without_authorization() {
        let mut headers = signed_headers(NOW, "n-4");
        headers.authorization = None;
        assert_eq!(
            verifier().verify_at(&headers, NOW),
            Err(SecurityError::InvalidSignature)
        );
    }

    #[test]
    fn missing_headers_rejected_as_gateway_unauthorized() {
        let full = signed_headers(NOW, "n-5");
        let mut no_ts = full.clone();
        no_ts.timestamp = None;
        let mut no_nonce = full.clone();
        no_nonce.nonce = None;
        let mut no_sig = full.clone();
        no_sig.signature = None;
        let mut empty_sig = full;
        empty_sig.signature = Some(String::new());

        for headers in [no_ts, no_nonce, no_sig, empty_sig] {
            assert_eq!(
                verifier().verify_at(&headers, NOW),
                Err(SecurityError::MissingSecurityHeaders)
            );
        }
    }

    #[test]
    fn unparseable_timestamp_rejected_as_invalid_request() {
        for ts in ["abc", "12.5", "1700000000000ms", " 1700000000000"] {
            let mut headers = signed_headers(NOW, "n-6");
            headers.timestamp = Some(ts.to_string());
            assert_eq!(
                verifier().verify_at(&headers, NOW),
                Err(SecurityError::InvalidTimestamp),
                "{ts:?}"
            );
        }
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let v = verifier();
        let at_limit = signed_headers(NOW - 300_000, "n-7");
        assert!(v.verify_at(&at_limit, NOW).is_ok());

        let past_limit = signed_headers(NOW - 300_001, "n-8");
        assert_eq!(
            v.verify_at(&past_limit, NOW),
            Err(SecurityError::RequestExpired { age_ms: 300_001 })
        );
    }

    #[test]
    fn future_timestamps_within_window_are_accepted() {
        let v = verifier();
        assert!(v.verify_at(&signed_headers(NOW + 300_000, "n-9"), NOW).is_ok());
        assert_eq!(
            v.verify_at(&signed_headers(NOW + 300_001, "n-10"), NOW),
            Err(SecurityError::RequestExpired { age_ms: 300_001 })
        );
    }

    #[test]
    fn freshness_checked_before_signature() {
        let mut headers = signed_headers(NOW - 3_600_000, "n-11");
        headers.signature = Some("bogus".to_string());
        assert!(matches!(
            verifier().verify_at(&headers, NOW),
            Err(SecurityError::RequestExpired { .. })
        ));
    }

    #[test]
    fn tampered_identity_breaks_signature() {
        let mut headers = signed_headers(NOW, "n-12");
        headers.user_role = Some("USER".to_string());
        assert_eq!(
            verifier().verify_at(&headers, NOW),
            Err(SecurityError::InvalidSignature)
        );
    }

    #[test]
    fn trusted_gateway_bypass_requires_flag_and_signature() {
        let v = verifier();
        let bypass = SecurityHeaders {
            timestamp: Some(NOW.to_string()),
            nonce: Some("n-13".to_string()),
            signature: Some(GATEWAY_SIGNATURE.to_string()),
            federation: true,
            ..Default::default()
        };
        let verified = v.verify_at(&bypass, NOW).unwrap();
        assert_eq!(verified.path, VerificationPath::TrustedGateway);

        let mut no_flag = bypass.clone();
        no_flag.federation = false;
        assert_eq!(
            v.verify_at(&no_flag, NOW),
            Err(SecurityError::InvalidSignature)
        );

        let mut wrong_signature = bypass;
        wrong_signature.signature = Some("not-the-gateway-signature".to_string());
        assert_eq!(
            v.verify_at(&wrong_signature, NOW),
            Err(SecurityError::InvalidSignature)
        );
    }

    #[test]
    fn federation_flag_with_valid_hmac_still_verifies() {
        let mut headers = signed_headers(NOW, "n-14");
        headers.federation = true;
        let verified = verifier().verify_at(&headers, NOW).unwrap();
        assert_eq!(verified.path, VerificationPath::Signed);
    }

    #[test]
    fn bypass_does_not_skip_freshness() {
        let headers = SecurityHeaders {
            timestamp: Some((NOW - 600_000).to_string()),
            nonce: Some("n-15".to_string()),
            signature: Some(GATEWAY_SIGNATURE.to_string()),
            federation: true,
            ..Default::default()
        };
        assert!(matches!(
            verifier().verify_at(&headers, NOW),
            Err(SecurityError::RequestExpired { .. })
        ));
    }

    #[test]
    fn verify_uses_wall_clock() {
        let now = Utc::now().timestamp_millis();
        assert!(verifier().verify(&signed_headers(now, "n-16")).is_ok());
    }
}
