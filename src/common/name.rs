//! Self-certifying names and the peer identities they encode.

use std::convert::TryInto;
use std::fmt::{self, Debug, Display, Formatter};

use ed25519_dalek::{VerifyingKey, PUBLIC_KEY_LENGTH};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix marking a path as a name in the naming scheme.
pub const NAME_PREFIX: &str = "/name/";

/// Multihash code for an inlined (identity) digest.
pub const IDENTITY: u64 = 0x00;
/// Multihash code for SHA-1.
pub const SHA1: u64 = 0x11;
/// Multihash code for SHA2-256.
pub const SHA2_256: u64 = 0x12;
/// Multihash code for SHA2-512.
pub const SHA2_512: u64 = 0x13;

#[derive(thiserror::Error, Debug)]
/// Errors decoding a name or a multihash.
pub enum NameError {
    #[error("invalid base58 string: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("multihash is truncated")]
    Truncated,

    #[error("unknown multihash code: {0:#x}")]
    UnknownCode(u64),

    #[error("multihash digest length is {actual}, expected {declared}")]
    DigestLength { declared: usize, actual: usize },

    #[error("multihash is not a public key hash")]
    NotAPublicKey,
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// A self-describing hash: uvarint code, uvarint digest length, digest.
pub struct Multihash {
    bytes: Vec<u8>,
    code: u64,
    digest_start: usize,
}

impl Multihash {
    /// Parse and validate multihash bytes. Returns Err on a truncated
    /// encoding, an unrecognized code, or a digest length mismatch.
    pub fn from_bytes(bytes: &[u8]) -> Result<Multihash, NameError> {
        let (code, code_len) = read_uvarint(bytes).ok_or(NameError::Truncated)?;
        let (declared, len_len) =
            read_uvarint(&bytes[code_len..]).ok_or(NameError::Truncated)?;

        let digest_start = code_len + len_len;
        let digest = &bytes[digest_start..];

        if digest.len() as u64 != declared {
            return Err(NameError::DigestLength {
                declared: declared as usize,
                actual: digest.len(),
            });
        }

        if let Some(expected) = expected_digest_len(code)? {
            if digest.len() != expected {
                return Err(NameError::DigestLength {
                    declared: expected,
                    actual: digest.len(),
                });
            }
        }

        Ok(Multihash {
            bytes: bytes.to_vec(),
            code,
            digest_start,
        })
    }

    /// Parse a base58 encoded multihash.
    pub fn from_base58(string: &str) -> Result<Multihash, NameError> {
        let bytes = bs58::decode(string).into_vec()?;
        Multihash::from_bytes(&bytes)
    }

    /// SHA2-256 multihash of `data`.
    pub fn sha2_256(data: &[u8]) -> Multihash {
        Multihash::pack(SHA2_256, &Sha256::digest(data))
    }

    /// Identity multihash carrying `data` inline.
    pub fn identity(data: &[u8]) -> Multihash {
        Multihash::pack(IDENTITY, data)
    }

    fn pack(code: u64, digest: &[u8]) -> Multihash {
        let mut bytes = vec![];
        write_uvarint(&mut bytes, code);
        write_uvarint(&mut bytes, digest.len() as u64);
        let digest_start = bytes.len();
        bytes.extend_from_slice(digest);

        Multihash {
            bytes,
            code,
            digest_start,
        }
    }

    // === Getters ===

    pub fn code(&self) -> u64 {
        self.code
    }

    pub fn digest(&self) -> &[u8] {
        &self.bytes[self.digest_start..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(&self.bytes).into_string()
    }
}

impl Debug for Multihash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({:#x}, {})", self.code, self.to_base58())
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// The routing-addressable identity a name certifies; a validated multihash
/// of a public key.
pub struct PeerId(Multihash);

impl PeerId {
    /// Decode a name (with or without the [NAME_PREFIX]) into a peer id.
    pub fn from_name(name: &str) -> Result<PeerId, NameError> {
        let name = name.strip_prefix(NAME_PREFIX).unwrap_or(name);
        let hash = Multihash::from_base58(name)?;

        PeerId::from_multihash(hash)
    }

    /// Validate a multihash as a public key hash.
    ///
    /// Accepts SHA2-256 digests and identity multihashes carrying an
    /// ed25519 public key inline.
    pub fn from_multihash(hash: Multihash) -> Result<PeerId, NameError> {
        match hash.code() {
            SHA2_256 => Ok(PeerId(hash)),
            IDENTITY if hash.digest().len() == PUBLIC_KEY_LENGTH => Ok(PeerId(hash)),
            _ => Err(NameError::NotAPublicKey),
        }
    }

    /// Derive the peer id of a public key by hashing it.
    pub fn from_public_key(key: &VerifyingKey) -> PeerId {
        PeerId(Multihash::sha2_256(key.as_bytes()))
    }

    /// Derive a peer id carrying the public key itself inline, so resolvers
    /// can extract it without a substrate lookup.
    pub fn from_inline_public_key(key: &VerifyingKey) -> PeerId {
        PeerId(Multihash::identity(key.as_bytes()))
    }

    /// Generate a random (SHA2-256) peer id, useful for tests and probing.
    pub fn random() -> PeerId {
        let mut rng = rand::thread_rng();
        let digest: [u8; 32] = rng.gen();

        PeerId(Multihash::sha2_256(&digest))
    }

    /// Extract the public key from an identity multihash, if this peer id
    /// carries one inline.
    pub fn inline_public_key(&self) -> Option<VerifyingKey> {
        if self.0.code() != IDENTITY {
            return None;
        }

        let raw: [u8; PUBLIC_KEY_LENGTH] = self.0.digest().try_into().ok()?;

        VerifyingKey::from_bytes(&raw).ok()
    }

    /// Whether `key` is the public key this peer id was derived from.
    pub fn matches_public_key(&self, key: &VerifyingKey) -> bool {
        match self.0.code() {
            IDENTITY => self.0.digest() == key.as_bytes(),
            SHA2_256 => self.0.digest() == Sha256::digest(key.as_bytes()).as_slice(),
            _ => false,
        }
    }

    /// Render this peer id as a name path (`/name/<base58>`).
    pub fn to_name(&self) -> String {
        format!("{}{}", NAME_PREFIX, self.to_base58())
    }

    // === Getters ===

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn multihash(&self) -> &Multihash {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        self.0.to_base58()
    }
}

impl Debug for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_base58())
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

fn expected_digest_len(code: u64) -> Result<Option<usize>, NameError> {
    match code {
        IDENTITY => Ok(None),
        SHA1 => Ok(Some(20)),
        SHA2_256 => Ok(Some(32)),
        SHA2_512 => Ok(Some(64)),
        _ => Err(NameError::UnknownCode(code)),
    }
}

fn read_uvarint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;

    for (i, byte) in bytes.iter().enumerate() {
        if i >= 9 {
            return None;
        }

        value |= u64::from(byte & 0x7f) << (7 * i as u32);

        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }

    None
}

fn write_uvarint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;

        if value == 0 {
            out.push(byte);
            break;
        }

        out.push(byte | 0x80);
    }
}
