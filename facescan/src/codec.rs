//! Embedding blob encoding: little-endian f32, no header.

use crate::{ScanError, ScanResult};

/// Serializes an embedding to raw little-endian f32 bytes.
pub fn encode_embedding(emb: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(emb.len() * 4);
    for x in emb {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Parses bytes produced by [`encode_embedding`].
pub fn decode_embedding(data: &[u8]) -> ScanResult<Vec<f32>> {
    if data.len() % 4 != 0 {
        return Err(ScanError::Codec(format!(
            "embedding blob length {} is not a multiple of 4",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
