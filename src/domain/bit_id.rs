//! Compact Id-Set Codec
//!
//! Encodes a set of positive ids as a URL-safe string: id `n` sets bit
//! `n - 1` of a bitmask, which is written six bits per character, most
//! significant chunk first, with no padding. Ids above [`MAX_ID`] are
//! rejected, which bounds both the mask and the encoded string.

use std::collections::BTreeSet;

use crate::error::{CallweaveError, Result};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const CHUNK_BITS: u64 = 6;

/// Largest id a bit id can carry.
pub const MAX_ID: u64 = 1 << 20;

/// Characters needed for a set holding `MAX_ID`.
const MAX_LEN: usize = ((MAX_ID - 1) / CHUNK_BITS + 1) as usize;

fn char_value(c: char) -> Option<u64> {
    match c {
        'A'..='Z' => Some(c as u64 - 'A' as u64),
        'a'..='z' => Some(c as u64 - 'a' as u64 + 26),
        '0'..='9' => Some(c as u64 - '0' as u64 + 52),
        '-' => Some(62),
        '_' => Some(63),
        _ => None,
    }
}

/// Little-endian 64-bit limbs of the bitmask.
fn bitmask<'a>(ids: impl IntoIterator<Item = &'a u64>) -> Result<Vec<u64>> {
    let mut limbs: Vec<u64> = Vec::new();
    for id in ids {
        // 0 has no bit
        if *id == 0 {
            continue;
        }
        if *id > MAX_ID {
            return Err(CallweaveError::InvalidBitId(format!("id {} is above the limit of {}", id, MAX_ID)));
        }
        let bit = id - 1;
        let limb = (bit / 64) as usize;
        if limbs.len() <= limb {
            limbs.resize(limb + 1, 0);
        }
        limbs[limb] |= 1u64 << (bit % 64);
    }
    Ok(limbs)
}

fn bit_set(limbs: &[u64], bit: u64) -> bool {
    limbs
        .get((bit / 64) as usize)
        .is_some_and(|limb| limb & (1u64 << (bit % 64)) != 0)
}

/// Encode a set of ids. The empty set is `"A"`.
pub fn encode<'a>(ids: impl IntoIterator<Item = &'a u64>) -> Result<String> {
    let limbs = bitmask(ids)?;
    let highest_bit = limbs
        .iter()
        .enumerate()
        .rev()
        .find(|(_, limb)| **limb != 0)
        .map(|(index, limb)| index as u64 * 64 + (63 - limb.leading_zeros() as u64));

    let Some(highest_bit) = highest_bit else {
        return Ok("A".to_string());
    };

    let chunks = highest_bit / CHUNK_BITS + 1;
    let encoded: String = (0..chunks)
        .rev()
        .map(|chunk| {
            let value = (0..CHUNK_BITS)
                .filter(|offset| bit_set(&limbs, chunk * CHUNK_BITS + offset))
                .fold(0usize, |acc, offset| acc | (1usize << offset));
            ALPHABET[value] as char
        })
        .collect();
    Ok(encoded)
}

pub fn decode(encoded: &str) -> Result<BTreeSet<u64>> {
    if encoded.is_empty() || encoded.len() > MAX_LEN {
        return Err(CallweaveError::InvalidBitId(encoded.to_string()));
    }

    let values = encoded
        .chars()
        .map(char_value)
        .collect::<Option<Vec<u64>>>()
        .ok_or_else(|| CallweaveError::InvalidBitId(encoded.to_string()))?;

    let mut ids = BTreeSet::new();
    for (chunk, value) in values.iter().rev().enumerate() {
        for offset in 0..CHUNK_BITS {
            if value & (1u64 << offset) != 0 {
                let id = chunk as u64 * CHUNK_BITS + offset + 1;
                if id > MAX_ID {
                    return Err(CallweaveError::InvalidBitId(encoded.to_string()));
                }
                ids.insert(id);
            }
        }
    }
    Ok(ids)
}
