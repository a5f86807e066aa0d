use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("malformed signature header")]
    Malformed,
    #[error("no matching v1 signature")]
    Mismatch,
    #[error("timestamp outside tolerance")]
    Stale,
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?),
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            // v0 and unknown schemes
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks a `t=<unix>,v1=<hex>` webhook signature over the raw body.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let parsed = parse_header(header)?;

    let matched = parsed.signatures.iter().try_fold(false, |found, sig| {
        if found {
            return Ok(true);
        }
        let mac = mac_for(payload, secret, parsed.timestamp)?;
        Ok::<_, SignatureError>(mac.verify_slice(sig).is_ok())
    })?;
    if !matched {
        return Err(SignatureError::Mismatch);
    }

    if (now_unix - parsed.timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Stale);
    }
    Ok(())
}

/// Builds a header the way the provider does.
#[cfg(test)]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mac = mac_for(payload, secret, timestamp).unwrap();
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    #[test]
    fn accepts_valid_signature() {
        let header = sign(BODY, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(BODY, Some(&header), SECRET, 1_700_000_010, 300),
            Ok(())
        );
    }

    #[test]
    fn accepts_when_any_v1_matches() {
        let good = sign(BODY, SECRET, 1_700_000_000);
        let header = format!("{good},v1={}", "00".repeat(32));
        assert!(verify_signature(BODY, Some(&header), SECRET, 1_700_000_000, 300).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign(BODY, SECRET, 1_700_000_000);
        let tampered = br#"{"id":"evt_1","type":"checkout.session.completed","x":1}"#;
        assert_eq!(
            verify_signature(tampered, Some(&header), SECRET, 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = sign(BODY, "whsec_other", 1_700_000_000);
        assert_eq!(
            verify_signature(BODY, Some(&header), SECRET, 1_700_000_000, 300),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let header = sign(BODY, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(BODY, Some(&header), SECRET, 1_700_000_301, 300),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert_eq!(
            verify_signature(BODY, None, SECRET, 0, 300),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_signature(BODY, Some("v1=abcd"), SECRET, 0, 300),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(BODY, Some("t=123"), SECRET, 123, 300),
            Err(SignatureError::Malformed)
        );
    }
}
