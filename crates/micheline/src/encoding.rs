//! Decoders for packed binary forms of on-chain identifiers.
//!
//! Values given as `{"bytes": ...}` in optimized wire data are rendered in
//! their base58check text form, the same one a node returns in readable mode.

use sha2::{Digest, Sha256};

use crate::deserialize::MichelineError;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const TZ1: &[u8] = &[6, 161, 159];
const TZ2: &[u8] = &[6, 161, 161];
const TZ3: &[u8] = &[6, 161, 164];
const TZ4: &[u8] = &[6, 161, 166];
const KT1: &[u8] = &[2, 90, 121];
const EDPK: &[u8] = &[13, 15, 37, 217];
const SPPK: &[u8] = &[3, 254, 226, 86];
const P2PK: &[u8] = &[3, 178, 139, 127];
const SIG: &[u8] = &[4, 130, 43];
const NET: &[u8] = &[87, 82, 0];

const HASH_LEN: usize = 20;

/// Base58 encoding of `data` (leading zero bytes become leading `1`s).
pub fn base58_encode(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|b| **b == 0).count();
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
    for &byte in &data[zeros..] {
        let mut carry = byte as u32;
        for d in digits.iter_mut() {
            carry += (*d as u32) << 8;
            *d = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut out = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        out.push('1');
    }
    for d in digits.iter().rev() {
        out.push(ALPHABET[*d as usize] as char);
    }
    out
}

/// `prefix || payload || sha256(sha256(prefix || payload))[..4]`, base58 encoded.
pub fn base58check(prefix: &[u8], payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(prefix.len() + payload.len() + 4);
    data.extend_from_slice(prefix);
    data.extend_from_slice(payload);
    let first = Sha256::digest(&data);
    let second = Sha256::digest(first);
    data.extend_from_slice(&second[..4]);
    base58_encode(&data)
}

fn decode_hex(value: &str) -> Result<Vec<u8>, MichelineError> {
    hex::decode(value).map_err(|_| MichelineError::InvalidHex {
        value: value.to_string(),
    })
}

fn check_len(kind: &'static str, bytes: &[u8], expected: usize) -> Result<(), MichelineError> {
    if bytes.len() < expected {
        return Err(MichelineError::InvalidLength {
            kind,
            expected,
            got: bytes.len(),
        });
    }
    Ok(())
}

fn implicit_prefix(tag: u8) -> Result<&'static [u8], MichelineError> {
    match tag {
        0 => Ok(TZ1),
        1 => Ok(TZ2),
        2 => Ok(TZ3),
        3 => Ok(TZ4),
        other => Err(MichelineError::UnknownTag {
            kind: "key_hash",
            tag: other,
        }),
    }
}

/// Decode a packed address (22 bytes, optionally followed by an entrypoint name).
pub fn decode_address(hex_value: &str) -> Result<String, MichelineError> {
    let bytes = decode_hex(hex_value)?;
    check_len("address", &bytes, 22)?;
    let base = match bytes[0] {
        0 => base58check(implicit_prefix(bytes[1])?, &bytes[2..22]),
        1 => base58check(KT1, &bytes[1..1 + HASH_LEN]),
        other => {
            return Err(MichelineError::UnknownTag {
                kind: "address",
                tag: other,
            })
        }
    };
    if bytes.len() > 22 {
        let entrypoint = String::from_utf8_lossy(&bytes[22..]);
        return Ok(format!("{}%{}", base, entrypoint));
    }
    Ok(base)
}

/// Decode a packed key hash (curve tag + 20 bytes).
pub fn decode_key_hash(hex_value: &str) -> Result<String, MichelineError> {
    let bytes = decode_hex(hex_value)?;
    check_len("key_hash", &bytes, 1 + HASH_LEN)?;
    Ok(base58check(
        implicit_prefix(bytes[0])?,
        &bytes[1..1 + HASH_LEN],
    ))
}

/// Decode a packed public key (curve tag + 32 or 33 bytes).
pub fn decode_public_key(hex_value: &str) -> Result<String, MichelineError> {
    let bytes = decode_hex(hex_value)?;
    check_len("key", &bytes, 1)?;
    let (prefix, len) = match bytes[0] {
        0 => (EDPK, 32),
        1 => (SPPK, 33),
        2 => (P2PK, 33),
        other => {
            return Err(MichelineError::UnknownTag {
                kind: "key",
                tag: other,
            })
        }
    };
    check_len("key", &bytes, 1 + len)?;
    Ok(base58check(prefix, &bytes[1..1 + len]))
}

/// Decode a packed signature (64 bytes) into its generic `sig...` form.
pub fn decode_signature(hex_value: &str) -> Result<String, MichelineError> {
    let bytes = decode_hex(hex_value)?;
    check_len("signature", &bytes, 64)?;
    Ok(base58check(SIG, &bytes[..64]))
}

/// Decode a packed chain id (4 bytes).
pub fn decode_chain_id(hex_value: &str) -> Result<String, MichelineError> {
    let bytes = decode_hex(hex_value)?;
    check_len("chain_id", &bytes, 4)?;
    Ok(base58check(NET, &bytes[..4]))
}
