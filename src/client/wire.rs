//! Wire format helpers for signed transactions
//!
//! A signed transaction is laid out as a compact-u16 signature count, the
//! 64-byte signatures in signer order, then the serialized message.

use crate::error::{EngineError, EngineResult};
use crate::signer::TransactionSigner;
use crate::types::Signature;

use std::sync::Arc;

/// Length of an ed25519 signature
pub const SIGNATURE_LEN: usize = 64;

/// Encode a length as compact-u16 (7 bits per byte, high bit = continuation)
pub fn encode_compact_u16(value: u16, out: &mut Vec<u8>) {
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Decode a compact-u16, returning the value and bytes consumed
pub fn decode_compact_u16(bytes: &[u8]) -> EngineResult<(u16, usize)> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(3).enumerate() {
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            let value = u16::try_from(value)
                .map_err(|_| EngineError::Signer("compact-u16 overflow".to_string()))?;
            return Ok((value, i + 1));
        }
    }
    Err(EngineError::Signer(
        "truncated compact-u16 length prefix".to_string(),
    ))
}

/// Sign `message` with each signer in order and assemble the wire form
pub fn sign_and_assemble(
    message: &[u8],
    signers: &[Arc<dyn TransactionSigner>],
) -> EngineResult<Vec<u8>> {
    if signers.is_empty() {
        return Err(EngineError::Signer(
            "unsigned transaction requires at least one signer".to_string(),
        ));
    }
    let count = u16::try_from(signers.len())
        .map_err(|_| EngineError::Signer(format!("too many signers: {}", signers.len())))?;

    let mut wire = Vec::with_capacity(3 + signers.len() * SIGNATURE_LEN + message.len());
    encode_compact_u16(count, &mut wire);

    for signer in signers {
        let sig = signer.sign(message)?;
        if sig.len() != SIGNATURE_LEN {
            return Err(EngineError::Signer(format!(
                "signer {} produced {} bytes, expected {}",
                signer.public_key(),
                sig.len(),
                SIGNATURE_LEN
            )));
        }
        wire.extend_from_slice(&sig);
    }

    wire.extend_from_slice(message);
    Ok(wire)
}

/// Extract the signatures carried by a wire transaction, base58-encoded
pub fn signatures_of(wire: &[u8]) -> EngineResult<Vec<Signature>> {
    let (count, offset) = decode_compact_u16(wire)?;
    let count = usize::from(count);
    let end = offset + count * SIGNATURE_LEN;
    if wire.len() < end {
        return Err(EngineError::Signer(format!(
            "wire transaction too short for {} signatures",
            count
        )));
    }

    Ok(wire[offset..end]
        .chunks_exact(SIGNATURE_LEN)
        .map(|sig| Signature::new(bs58::encode(sig).into_string()))
        .collect())
}
