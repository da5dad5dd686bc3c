use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::{MarketError, MarketResult};

type HmacSha256 = Hmac<Sha256>;

/// Checks `Payment-Signature: t=<unix seconds>,v1=<hex hmac>` headers.
/// The MAC covers `"{t}.{raw body}"`.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    pub fn verify(&self, payload: &[u8], header: Option<&str>, now: DateTime<Utc>) -> MarketResult<()> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MarketError::InvalidSignature("missing signature header".to_string()))?;
        let parsed = parse_header(header)?;

        // Header is unauthenticated here; abs_diff cannot overflow on hostile values
        let skew = now.timestamp().abs_diff(parsed.timestamp);
        if skew > self.tolerance.num_seconds().unsigned_abs() {
            return Err(MarketError::InvalidSignature(format!(
                "timestamp outside tolerance ({}s off)",
                skew
            )));
        }

        for signature in &parsed.signatures {
            let mac = self.mac(parsed.timestamp, payload)?;
            if mac.verify_slice(signature).is_ok() {
                return Ok(());
            }
        }

        Err(MarketError::InvalidSignature("signature mismatch".to_string()))
    }

    /// Header value for `payload` signed at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> MarketResult<String> {
        let digest = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> MarketResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| MarketError::InvalidSignature(format!("unusable signing secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

fn parse_header(header: &str) -> MarketResult<ParsedHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    MarketError::InvalidSignature(format!("invalid timestamp '{}'", value))
                })?);
            }
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| MarketError::InvalidSignature("signature header has no timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(MarketError::InvalidSignature("signature header has no v1 signature".to_string()));
    }

    Ok(ParsedHeader { timestamp, signatures })
}
