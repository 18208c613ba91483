//! Webhook signature verification against a candidate secret set
//!
//! One endpoint can serve several independently-configured merchant
//! accounts, each with its own signing secret. Verification therefore runs
//! against an ordered candidate list and short-circuits on the first secret
//! that verifies; only if every candidate fails is the delivery rejected.
//! The currency scoped to the winning secret becomes the default currency
//! context for events that do not carry one themselves.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::providers::{CandidateSecret, PaymentMethod};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Missing signature header '{0}'")]
    MissingHeader(&'static str),

    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("Signature did not verify against any of {candidates} candidate secrets")]
    NoSecretMatched { candidates: usize },
}

/// Signature layout used by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// `t=<unix>,v1=<hex>` header; the MAC covers `"{t}.{body}"`
    Timestamped,
    /// Plain hex HMAC of the raw body
    Plain,
}

impl SignatureScheme {
    pub fn for_provider(provider: PaymentMethod) -> Self {
        match provider {
            PaymentMethod::Stripe => SignatureScheme::Timestamped,
            _ => SignatureScheme::Plain,
        }
    }

    /// Header carrying the signature for this scheme.
    pub fn header_name(&self) -> &'static str {
        match self {
            SignatureScheme::Timestamped => "stripe-signature",
            SignatureScheme::Plain => "x-webhook-signature",
        }
    }
}

/// Parsed signature ready to check against one secret.
enum ParsedSignature {
    Timestamped { timestamp: String, mac: Vec<u8> },
    Plain { mac: Vec<u8> },
}

fn parse_header(scheme: SignatureScheme, header: &str) -> Result<ParsedSignature, SignatureError> {
    match scheme {
        SignatureScheme::Timestamped => {
            let mut timestamp = None;
            let mut mac = None;
            for part in header.split(',') {
                match part.trim().split_once('=') {
                    Some(("t", v)) => timestamp = Some(v.to_string()),
                    Some(("v1", v)) => {
                        mac = Some(hex::decode(v).map_err(|_| {
                            SignatureError::MalformedHeader("v1 is not hex".to_string())
                        })?);
                    }
                    _ => {}
                }
            }
            match (timestamp, mac) {
                (Some(timestamp), Some(mac)) => Ok(ParsedSignature::Timestamped { timestamp, mac }),
                _ => Err(SignatureError::MalformedHeader(
                    "expected t=<ts>,v1=<hex>".to_string(),
                )),
            }
        }
        SignatureScheme::Plain => {
            let mac = hex::decode(header.trim())
                .map_err(|_| SignatureError::MalformedHeader("signature is not hex".to_string()))?;
            Ok(ParsedSignature::Plain { mac })
        }
    }
}

fn verify_one(parsed: &ParsedSignature, body: &[u8], secret: &str) -> bool {
    // Mac::verify_slice is constant-time
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    match parsed {
        ParsedSignature::Timestamped { timestamp, mac: sig } => {
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(body);
            mac.verify_slice(sig).is_ok()
        }
        ParsedSignature::Plain { mac: sig } => {
            mac.update(body);
            mac.verify_slice(sig).is_ok()
        }
    }
}

/// Verify `body` against every candidate secret in order.
///
/// Returns the currency hint of the secret that verified (None for the
/// global fallback secret).
pub fn verify_signature(
    scheme: SignatureScheme,
    signature_header: Option<&str>,
    body: &[u8],
    candidates: &[CandidateSecret],
) -> Result<Option<String>, SignatureError> {
    let header = signature_header.ok_or(SignatureError::MissingHeader(scheme.header_name()))?;
    let parsed = parse_header(scheme, header)?;

    for candidate in candidates {
        if verify_one(&parsed, body, &candidate.secret) {
            return Ok(candidate.currency.clone());
        }
    }
    Err(SignatureError::NoSecretMatched {
        candidates: candidates.len(),
    })
}

/// Produce a valid signature header for `body`. Test and tooling helper.
pub fn sign(scheme: SignatureScheme, body: &[u8], secret: &str, timestamp: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    match scheme {
        SignatureScheme::Timestamped => {
            mac.update(timestamp.as_bytes());
            mac.update(b".");
            mac.update(body);
            format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
        }
        SignatureScheme::Plain => {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
    }
}
