//! The signed record a name resolves through, and its wire codec.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::path::PathError;

/// Validity kind of a record carrying an end-of-life timestamp.
pub const VALIDITY_EOL: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Interpretation of a record's validity field.
pub enum ValidityKind {
    /// The validity field is an RFC 3339 end-of-life timestamp.
    Eol,
    /// A kind this implementation does not recognize. Records with one still
    /// resolve; their validity field is ignored.
    Unrecognized(u64),
}

#[derive(thiserror::Error, Debug)]
/// Errors decoding a record or its target value.
pub enum DecodeError {
    #[error("failed to parse record bytes: {0}")]
    Bencode(#[from] serde_bencode::Error),

    #[error("record value is not valid UTF-8")]
    ValueNotUtf8,

    #[error("record value is not a valid path: {0}")]
    Value(#[from] PathError),
}

#[derive(thiserror::Error, Debug)]
/// Errors extracting a record's end-of-life under a recognized validity kind.
pub enum ValidityError {
    #[error("record has an EOL validity kind but no validity field")]
    Missing,

    #[error("validity is not valid UTF-8")]
    NotUtf8,

    #[error("failed to parse EOL timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// A versioned, signed name record.
///
/// Signature verification is the routing substrate's responsibility; the
/// resolver only decodes records and reads their freshness fields.
pub struct Record {
    /// Monotonic version; substrates prefer higher sequences during quorum
    /// aggregation.
    sequence: u64,

    /// ed25519 signature over [encode_signable].
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,

    /// Explicit cache lifetime in nanoseconds.
    #[serde(default)]
    ttl: Option<u64>,

    /// Validity bytes; an RFC 3339 timestamp when `validity_kind` is
    /// [VALIDITY_EOL].
    #[serde(default)]
    #[serde(with = "serde_bytes")]
    validity: Option<Vec<u8>>,

    validity_kind: u64,

    /// Target value: either a bare content multihash (legacy records) or a
    /// path string.
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
}

impl Record {
    /// Create and sign a record with an EOL validity.
    pub fn new(
        signer: &SigningKey,
        value: &[u8],
        sequence: u64,
        eol: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Record {
        let validity = eol
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .into_bytes();
        let signable = encode_signable(value, Some(&validity), VALIDITY_EOL, sequence);
        let signature = signer.sign(&signable);

        Record {
            sequence,
            signature: signature.to_bytes().to_vec(),
            ttl: ttl.map(|ttl| ttl.as_nanos() as u64),
            validity: Some(validity),
            validity_kind: VALIDITY_EOL,
            value: value.to_vec(),
        }
    }

    /// Assemble a record from already validated wire data, without signing.
    pub fn new_unchecked(
        value: &[u8],
        signature: &[u8],
        validity_kind: u64,
        validity: Option<&[u8]>,
        sequence: u64,
        ttl: Option<Duration>,
    ) -> Record {
        Record {
            sequence,
            signature: signature.to_vec(),
            ttl: ttl.map(|ttl| ttl.as_nanos() as u64),
            validity: validity.map(|v| v.to_vec()),
            validity_kind,
            value: value.to_vec(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Record, DecodeError> {
        let record = serde_bencode::from_bytes(bytes)?;

        Ok(record)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        let bytes = serde_bencode::to_bytes(self)?;

        Ok(bytes)
    }

    /// Verify this record's signature, e.g. from a substrate's validator.
    pub fn verify(&self, key: &VerifyingKey) -> Result<(), SignatureError> {
        let signature = Signature::from_slice(&self.signature)?;
        let signable = encode_signable(
            &self.value,
            self.validity.as_deref(),
            self.validity_kind,
            self.sequence,
        );

        key.verify(&signable, &signature)
    }

    /// The record's end-of-life, if it carries a recognized one.
    ///
    /// An unrecognized validity kind yields `Ok(None)` so that newer records
    /// keep resolving on older software; a malformed EOL under the
    /// recognized kind is an error.
    pub fn eol(&self) -> Result<Option<DateTime<Utc>>, ValidityError> {
        match self.kind() {
            ValidityKind::Unrecognized(_) => Ok(None),
            ValidityKind::Eol => {
                let validity = self.validity.as_deref().ok_or(ValidityError::Missing)?;
                let string =
                    std::str::from_utf8(validity).map_err(|_| ValidityError::NotUtf8)?;
                let eol = DateTime::parse_from_rfc3339(string)?;

                Ok(Some(eol.with_timezone(&Utc)))
            }
        }
    }

    // === Getters ===

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl.map(Duration::from_nanos)
    }

    pub fn kind(&self) -> ValidityKind {
        match self.validity_kind {
            VALIDITY_EOL => ValidityKind::Eol,
            kind => ValidityKind::Unrecognized(kind),
        }
    }
}

/// Canonical byte layout covered by a record's signature.
pub fn encode_signable(
    value: &[u8],
    validity: Option<&[u8]>,
    validity_kind: u64,
    sequence: u64,
) -> Box<[u8]> {
    let mut signable = vec![];

    signable.extend(format!("1:v{}:", value.len()).into_bytes());
    signable.extend(value);

    if let Some(validity) = validity {
        signable.extend(format!("3:val{}:", validity.len()).into_bytes());
        signable.extend(validity);
    }

    signable.extend(format!("2:vki{}e3:seqi{}e", validity_kind, sequence).into_bytes());

    signable.into()
}
