//! Normalization of configured Nostr key material.
//!
//! Keys may be configured either as 64 hex characters or as NIP-19 bech32
//! strings (`npub1…` / `nsec1…`). Whatever the input form, the output is the
//! same 64-character lower-case hex string for the same 32 bytes.

use thiserror::Error;

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32_GENERATORS: [u32; 5] = [
    0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3,
];
const BECH32_SEPARATOR: char = '1';
const CHECKSUM_LENGTH: usize = 6;
const KEY_LENGTH: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Nostr key is empty")]
    Empty,
    #[error("Bech32 keys cannot use mixed case")]
    MixedCase,
    #[error("Invalid bech32 key format")]
    InvalidFormat,
    #[error("Invalid bech32 character: {0:?}")]
    InvalidCharacter(char),
    #[error("Invalid bech32 checksum")]
    InvalidChecksum,
    #[error("Invalid bech32 padding")]
    InvalidPadding,
    #[error("Expected bech32 prefix {expected}, found {found}")]
    UnexpectedPrefix { expected: String, found: String },
    #[error("Invalid {prefix} key length: expected 32 bytes, got {length}")]
    InvalidLength { prefix: String, length: usize },
}

/// Which half of a key pair a configured value is supposed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Public,
    Secret,
}

impl KeyRole {
    /// The NIP-19 human-readable prefix for this role.
    pub fn prefix(&self) -> &'static str {
        match self {
            KeyRole::Public => "npub",
            KeyRole::Secret => "nsec",
        }
    }
}

/// Normalizes a configured key for the given role.
pub fn normalize_key(input: &str, role: KeyRole) -> Result<String, KeyError> {
    normalize_key_with_prefix(input, role.prefix())
}

/// Normalizes `input` to lower-case hex, accepting hex or bech32 with `expected_prefix`.
pub fn normalize_key_with_prefix(input: &str, expected_prefix: &str) -> Result<String, KeyError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(KeyError::Empty);
    }
    if is_hex_key(trimmed) {
        return Ok(trimmed.to_ascii_lowercase());
    }

    let (prefix, words) = decode_bech32(trimmed)?;
    let expected = expected_prefix.to_lowercase();
    if prefix != expected {
        return Err(KeyError::UnexpectedPrefix {
            expected,
            found: prefix,
        });
    }

    let bytes = convert_bits(&words, 5, 8, false)?;
    if bytes.len() != KEY_LENGTH {
        return Err(KeyError::InvalidLength {
            prefix: expected,
            length: bytes.len(),
        });
    }
    Ok(hex::encode(bytes))
}

fn is_hex_key(value: &str) -> bool {
    value.len() == KEY_LENGTH * 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Splits a bech32 string into its prefix and payload words, checksum removed.
fn decode_bech32(value: &str) -> Result<(String, Vec<u8>), KeyError> {
    if value != value.to_lowercase() && value != value.to_uppercase() {
        return Err(KeyError::MixedCase);
    }
    let normalized = value.to_lowercase();

    let separator = normalized
        .rfind(BECH32_SEPARATOR)
        .ok_or(KeyError::InvalidFormat)?;
    let payload = &normalized[separator + 1..];
    if separator < 1 || payload.chars().count() < CHECKSUM_LENGTH {
        return Err(KeyError::InvalidFormat);
    }

    let prefix = &normalized[..separator];
    let mut data = Vec::with_capacity(payload.len());
    for c in payload.chars() {
        let word = BECH32_CHARSET
            .iter()
            .position(|&symbol| symbol as char == c)
            .ok_or(KeyError::InvalidCharacter(c))?;
        data.push(word as u8);
    }

    let mut checked = prefix_expand(prefix);
    checked.extend_from_slice(&data);
    if polymod(&checked) != 1 {
        return Err(KeyError::InvalidChecksum);
    }

    data.truncate(data.len() - CHECKSUM_LENGTH);
    Ok((prefix.to_string(), data))
}

fn prefix_expand(prefix: &str) -> Vec<u8> {
    let bytes = prefix.as_bytes();
    let mut expanded = Vec::with_capacity(bytes.len() * 2 + 1);
    expanded.extend(bytes.iter().map(|b| b >> 5));
    expanded.push(0);
    expanded.extend(bytes.iter().map(|b| b & 0x1f));
    expanded
}

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &value in values {
        let top = chk >> 25;
        chk = ((chk & 0x1ff_ffff) << 5) ^ u32::from(value);
        for (i, generator) in BECH32_GENERATORS.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= generator;
            }
        }
    }
    chk
}

/// Regroups `data` from `from_bits`-wide words into `to_bits`-wide words.
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Result<Vec<u8>, KeyError> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_value: u32 = (1 << to_bits) - 1;
    let max_acc: u32 = (1 << (from_bits + to_bits - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from_bits as usize / to_bits as usize + 1);

    for &value in data {
        let value = u32::from(value);
        if value >> from_bits != 0 {
            return Err(KeyError::InvalidFormat);
        }
        acc = ((acc << from_bits) | value) & max_acc;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to_bits - bits)) & max_value) as u8);
        }
    } else if bits >= from_bits || (acc << (to_bits - bits)) & max_value != 0 {
        return Err(KeyError::InvalidPadding);
    }

    Ok(out)
}

/// Normalized key material for one signing operation.
///
/// Built fresh for every send from the raw configured strings; nothing here
/// is cached between events.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    public_hex: String,
    secret_hex: String,
}

impl KeyPair {
    /// Normalizes both halves independently.
    pub fn normalize(public_key: &str, secret_key: &str) -> Result<Self, KeyError> {
        Ok(Self {
            public_hex: normalize_key(public_key, KeyRole::Public)?,
            secret_hex: normalize_key(secret_key, KeyRole::Secret)?,
        })
    }

    pub fn public_hex(&self) -> &str {
        &self.public_hex
    }

    pub fn secret_hex(&self) -> &str {
        &self.secret_hex
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_hex", &self.public_hex)
            .field("secret_hex", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_sdk::prelude::{Keys, ToBech32};

    const GENERATOR_X: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const GENERATOR_NPUB: &str = "npub10xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqpkge6d";
    const SECRET_ONE_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const SECRET_ONE_NSEC: &str = "nsec1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqsmhltgl";

    fn create_checksum(prefix: &str, words: &[u8]) -> Vec<u8> {
        let mut values = prefix_expand(prefix);
        values.extend_from_slice(words);
        values.extend_from_slice(&[0; CHECKSUM_LENGTH]);
        let modulus = polymod(&values) ^ 1;
        (0..CHECKSUM_LENGTH)
            .map(|p| ((modulus >> (5 * (5 - p))) & 31) as u8)
            .collect()
    }

    fn encode(prefix: &str, bytes: &[u8]) -> String {
        let mut words = convert_bits(bytes, 8, 5, true).unwrap();
        let checksum = create_checksum(prefix, &words);
        words.extend(checksum);
        let payload: String = words
            .iter()
            .map(|&w| BECH32_CHARSET[w as usize] as char)
            .collect();
        format!("{prefix}1{payload}")
    }

    #[test]
    fn test_hex_keys_are_lowercased() {
        let upper = "A".repeat(64);
        assert_eq!(normalize_key(&upper, KeyRole::Public).unwrap(), "a".repeat(64));
        assert_eq!(
            normalize_key(&format!("  {}\n", GENERATOR_X), KeyRole::Public).unwrap(),
            GENERATOR_X
        );
    }

    #[test]
    fn test_decodes_known_vectors() {
        assert_eq!(normalize_key(GENERATOR_NPUB, KeyRole::Public).unwrap(), GENERATOR_X);
        assert_eq!(normalize_key(SECRET_ONE_NSEC, KeyRole::Secret).unwrap(), SECRET_ONE_HEX);
        assert_eq!(
            normalize_key(&GENERATOR_NPUB.to_uppercase(), KeyRole::Public).unwrap(),
            GENERATOR_X
        );
    }

    #[test]
    fn test_roundtrip_arbitrary_bytes() {
        for fill in [0x00u8, 0x01, 0x7f, 0xaa, 0xbb, 0xff] {
            let bytes = [fill; 32];
            let expected = hex::encode(bytes);
            let npub = encode("npub", &bytes);
            let nsec = encode("nsec", &bytes);
            assert_eq!(normalize_key(&npub, KeyRole::Public).unwrap(), expected);
            assert_eq!(normalize_key(&nsec, KeyRole::Secret).unwrap(), expected);
        }
    }

    #[test]
    fn test_matches_nostr_sdk_encoding() {
        for _ in 0..8 {
            let keys = Keys::generate();
            let npub = keys.public_key().to_bech32().unwrap();
            let nsec = keys.secret_key().to_bech32().unwrap();
            assert_eq!(
                normalize_key(&npub, KeyRole::Public).unwrap(),
                keys.public_key().to_hex()
            );
            assert_eq!(
                normalize_key(&nsec, KeyRole::Secret).unwrap(),
                keys.secret_key().to_secret_hex()
            );
        }
    }

    #[test]
    fn test_rejects_wrong_prefix() {
        let err = normalize_key(GENERATOR_NPUB, KeyRole::Secret).unwrap_err();
        assert_eq!(
            err,
            KeyError::UnexpectedPrefix {
                expected: "nsec".to_string(),
                found: "npub".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_flipped_checksum_bit() {
        let last = GENERATOR_NPUB.chars().last().unwrap();
        let index = BECH32_CHARSET.iter().position(|&c| c as char == last).unwrap();
        let flipped = BECH32_CHARSET[index ^ 1] as char;
        let corrupted = format!("{}{}", &GENERATOR_NPUB[..GENERATOR_NPUB.len() - 1], flipped);

        assert_eq!(
            normalize_key(&corrupted, KeyRole::Public).unwrap_err(),
            KeyError::InvalidChecksum
        );
    }

    #[test]
    fn test_rejects_mixed_case() {
        let mixed = format!("NPUB{}", &GENERATOR_NPUB[4..]);
        assert_eq!(
            normalize_key(&mixed, KeyRole::Public).unwrap_err(),
            KeyError::MixedCase
        );
    }

    #[test]
    fn test_rejects_short_and_long_hex() {
        assert!(normalize_key(&"a".repeat(63), KeyRole::Public).is_err());
        assert!(normalize_key(&"a".repeat(65), KeyRole::Public).is_err());
        assert!(normalize_key(&format!("1{}", "a".repeat(64)), KeyRole::Public).is_err());
    }

    #[test]
    fn test_rejects_empty_and_garbage() {
        assert_eq!(normalize_key("", KeyRole::Public).unwrap_err(), KeyError::Empty);
        assert_eq!(normalize_key("   ", KeyRole::Public).unwrap_err(), KeyError::Empty);
        assert_eq!(
            normalize_key("npubqqqq", KeyRole::Public).unwrap_err(),
            KeyError::InvalidFormat
        );
        assert_eq!(
            normalize_key("1qqqqqqqq", KeyRole::Public).unwrap_err(),
            KeyError::InvalidFormat
        );
        assert_eq!(
            normalize_key("npub1qqqqqbqq", KeyRole::Public).unwrap_err(),
            KeyError::InvalidCharacter('b')
        );
    }

    #[test]
    fn test_rejects_wrong_length_payload() {
        let short = encode("npub", &[0xaa; 31]);
        assert_eq!(
            normalize_key(&short, KeyRole::Public).unwrap_err(),
            KeyError::InvalidLength {
                prefix: "npub".to_string(),
                length: 31,
            }
        );
    }

    #[test]
    fn test_rejects_nonzero_padding() {
        // 32 bytes encode to 52 words with 4 padding bits; set the lowest one.
        let mut words = convert_bits(&[0u8; 32], 8, 5, true).unwrap();
        let last = words.len() - 1;
        words[last] |= 1;
        let checksum = create_checksum("npub", &words);
        words.extend(checksum);
        let payload: String = words
            .iter()
            .map(|&w| BECH32_CHARSET[w as usize] as char)
            .collect();

        assert_eq!(
            normalize_key(&format!("npub1{payload}"), KeyRole::Public).unwrap_err(),
            KeyError::InvalidPadding
        );
    }

    #[test]
    fn test_key_pair_debug_redacts_secret() {
        let pair = KeyPair::normalize(GENERATOR_NPUB, SECRET_ONE_NSEC).unwrap();
        assert_eq!(pair.public_hex(), GENERATOR_X);
        assert_eq!(pair.secret_hex(), SECRET_ONE_HEX);
        let debug = format!("{:?}", pair);
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains(SECRET_ONE_HEX));
    }
}
