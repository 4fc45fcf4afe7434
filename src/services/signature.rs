// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment provider signature verification.
//!
//! All providers sign with HMAC-SHA256 and send the digest hex-encoded.
//! They differ in what bytes are signed and how the header is laid out:
//!
//! - Razorpay checkout: `"{order_id}|{payment_id}"` with the key secret
//! - Razorpay webhook: the raw body with the webhook secret
//! - Stripe: `"{t}.{body}"`, header `t=..,v1=..`
//! - Paddle: `"{ts}:{body}"`, header `ts=..;h1=..`

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

// Type alias for HMAC-SHA256
pub type HmacSha256 = Hmac<Sha256>;

/// Maximum age (either direction) of a timestamped webhook signature.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature header: {0}")]
    Malformed(&'static str),

    #[error("signature timestamp outside tolerance ({age_secs}s)")]
    Stale { age_secs: i64 },

    #[error("signature mismatch")]
    Mismatch,
}

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn hmac_sha256_hex(secret: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Compare a computed hex digest with a supplied one without early exit.
fn digest_matches(expected_hex: &str, supplied_hex: &str) -> bool {
    let supplied = supplied_hex.trim().to_ascii_lowercase();
    expected_hex.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Verify the signature Razorpay Checkout returns after a payment.
pub fn verify_razorpay_payment(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), SignatureError> {
    let payload = format!("{}|{}", order_id, payment_id);
    let expected = hmac_sha256_hex(key_secret.as_bytes(), payload.as_bytes());

    if digest_matches(&expected, signature) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Verify the `X-Razorpay-Signature` header over a raw webhook body.
pub fn verify_razorpay_webhook(
    webhook_secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), SignatureError> {
    let expected = hmac_sha256_hex(webhook_secret.as_bytes(), body);

    if digest_matches(&expected, signature) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
///
/// Any matching `v1` entry is accepted so secret rotation keeps working.
pub fn verify_stripe(
    webhook_secret: &str,
    body: &[u8],
    header: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed("missing t"))?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed("missing v1"));
    }
    check_timestamp(timestamp, now_unix)?;

    let mut signed = Vec::with_capacity(timestamp.len() + 1 + body.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(body);
    let expected = hmac_sha256_hex(webhook_secret.as_bytes(), &signed);

    if candidates.iter().any(|c| digest_matches(&expected, c)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Verify a `Paddle-Signature` header (`ts=<unix>;h1=<hex>`).
pub fn verify_paddle(
    webhook_secret: &str,
    body: &[u8],
    header: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(';') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => timestamp = Some(value),
            Some(("h1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed("missing ts"))?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed("missing h1"));
    }
    check_timestamp(timestamp, now_unix)?;

    let mut signed = Vec::with_capacity(timestamp.len() + 1 + body.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b':');
    signed.extend_from_slice(body);
    let expected = hmac_sha256_hex(webhook_secret.as_bytes(), &signed);

    if candidates.iter().any(|c| digest_matches(&expected, c)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn check_timestamp(raw: &str, now_unix: i64) -> Result<(), SignatureError> {
    let timestamp: i64 = raw
        .parse()
        .map_err(|_| SignatureError::Malformed("timestamp is not an integer"))?;

    let age_secs = now_unix
        .checked_sub(timestamp)
        .ok_or(SignatureError::Malformed("timestamp out of range"))?;
    if age_secs.unsigned_abs() > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Stale { age_secs });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_780_000_000;

    fn stripe_header(secret: &str, body: &[u8], ts: i64) -> String {
        let mut signed = format!("{}.", ts).into_bytes();
        signed.extend_from_slice(body);
        format!("t={},v1={}", ts, hmac_sha256_hex(secret.as_bytes(), &signed))
    }

    fn paddle_header(secret: &str, body: &[u8], ts: i64) -> String {
        let mut signed = format!("{}:", ts).into_bytes();
        signed.extend_from_slice(body);
        format!("ts={};h1={}", ts, hmac_sha256_hex(secret.as_bytes(), &signed))
    }

    #[test]
    fn test_razorpay_payment_signature_valid() {
        let signature = hmac_sha256_hex(b"rzp_secret", b"order_ABC|pay_XYZ");
        assert_eq!(
            verify_razorpay_payment("rzp_secret", "order_ABC", "pay_XYZ", &signature),
            Ok(())
        );
    }

    #[test]
    fn test_razorpay_payment_signature_swapped_fields() {
        let signature = hmac_sha256_hex(b"rzp_secret", b"order_ABC|pay_XYZ");
        assert_eq!(
            verify_razorpay_payment("rzp_secret", "pay_XYZ", "order_ABC", &signature),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_razorpay_payment_signature_accepts_uppercase_hex() {
        let signature = hmac_sha256_hex(b"rzp_secret", b"order_1|pay_1").to_uppercase();
        assert!(verify_razorpay_payment("rzp_secret", "order_1", "pay_1", &signature).is_ok());
    }

    #[test]
    fn test_razorpay_webhook_every_single_byte_mutation_fails() {
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        let signature = hmac_sha256_hex(b"whsec", body);
        assert!(verify_razorpay_webhook("whsec", body, &signature).is_ok());

        for i in 0..body.len() {
            let mut mutated = body.to_vec();
            mutated[i] ^= 0x01;
            assert_eq!(
                verify_razorpay_webhook("whsec", &mutated, &signature),
                Err(SignatureError::Mismatch),
                "mutation at byte {} verified",
                i
            );
        }
    }

    #[test]
    fn test_stripe_valid_and_every_single_byte_mutation_fails() {
        let body = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = stripe_header("whsec_abc", body, NOW);
        assert_eq!(verify_stripe("whsec_abc", body, &header, NOW), Ok(()));

        for i in 0..body.len() {
            let mut mutated = body.to_vec();
            mutated[i] = mutated[i].wrapping_add(1);
            assert_eq!(
                verify_stripe("whsec_abc", &mutated, &header, NOW),
                Err(SignatureError::Mismatch),
                "mutation at byte {} verified",
                i
            );
        }
    }

    #[test]
    fn test_stripe_rejects_stale_timestamp() {
        let body = b"{}";
        let header = stripe_header("whsec_abc", body, NOW - 600);
        assert_eq!(
            verify_stripe("whsec_abc", body, &header, NOW),
            Err(SignatureError::Stale { age_secs: 600 })
        );
    }

    #[test]
    fn test_extreme_timestamps_are_rejected_without_overflow() {
        for ts in ["-9223372036854775808", "9223372036854775807"] {
            let header = format!("t={},v1=00", ts);
            assert!(verify_stripe("whsec", b"{}", &header, NOW).is_err());

            let header = format!("ts={};h1=00", ts);
            assert!(verify_paddle("pdl", b"{}", &header, NOW).is_err());
        }
        assert_eq!(
            verify_stripe("whsec", b"{}", "t=-9223372036854775808,v1=00", 1),
            Err(SignatureError::Malformed("timestamp out of range"))
        );
    }

    #[test]
    fn test_stripe_accepts_any_matching_v1() {
        let body = b"{}";
        let good = stripe_header("whsec_abc", body, NOW);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good_sig);
        assert!(verify_stripe("whsec_abc", body, &header, NOW).is_ok());
    }

    #[test]
    fn test_stripe_malformed_header() {
        assert_eq!(
            verify_stripe("whsec_abc", b"{}", "v1=deadbeef", NOW),
            Err(SignatureError::Malformed("missing t"))
        );
        assert_eq!(
            verify_stripe("whsec_abc", b"{}", &format!("t={}", NOW), NOW),
            Err(SignatureError::Malformed("missing v1"))
        );
        assert_eq!(
            verify_stripe("whsec_abc", b"{}", "t=soon,v1=deadbeef", NOW),
            Err(SignatureError::Malformed("timestamp is not an integer"))
        );
    }

    #[test]
    fn test_paddle_valid_and_wrong_secret() {
        let body = br#"{"event_type":"transaction.completed"}"#;
        let header = paddle_header("pdl_secret", body, NOW);
        assert_eq!(verify_paddle("pdl_secret", body, &header, NOW), Ok(()));
        assert_eq!(
            verify_paddle("other_secret", body, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_paddle_every_single_byte_mutation_fails() {
        let body = br#"{"event_type":"subscription.canceled","data":{}}"#;
        let header = paddle_header("pdl_secret", body, NOW);

        for i in 0..body.len() {
            let mut mutated = body.to_vec();
            mutated[i] ^= 0x80;
            assert!(verify_paddle("pdl_secret", &mutated, &header, NOW).is_err());
        }
    }
}
