//! XOR-RLE compression for Quetzal CMem chunks
//!
//! The current dynamic memory is XORed with the original story image and
//! runs of zero bytes are run-length encoded.

use crate::error::{ZError, ZResult};
use log::debug;

/// Compress dynamic memory against the original image.
/// Trailing unchanged bytes are omitted entirely.
pub fn compress_memory(current: &[u8], original: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut zeros = 0usize;

    for (i, &byte) in current.iter().enumerate() {
        let xor_byte = byte ^ original.get(i).copied().unwrap_or(0);
        if xor_byte == 0 {
            zeros += 1;
            continue;
        }
        while zeros > 0 {
            let run = zeros.min(256);
            compressed.push(0);
            compressed.push((run - 1) as u8);
            zeros -= run;
        }
        compressed.push(xor_byte);
    }

    debug!("Compressed {} bytes to {} bytes", current.len(), compressed.len());
    compressed
}

/// Rebuild `len` bytes of dynamic memory from compressed data and the original image
pub fn decompress_memory(compressed: &[u8], original: &[u8], len: usize) -> ZResult<Vec<u8>> {
    if original.len() < len {
        return Err(ZError::InvalidSave(format!(
            "original image has {} bytes, need {len}",
            original.len()
        )));
    }
    let mut memory = original[..len].to_vec();
    let mut pos = 0usize;
    let mut bytes = compressed.iter();

    while let Some(&byte) = bytes.next() {
        if byte == 0 {
            let run = *bytes
                .next()
                .ok_or_else(|| ZError::InvalidSave("incomplete RLE sequence".into()))?
                as usize
                + 1;
            pos += run;
            if pos > len {
                return Err(ZError::InvalidSave("RLE run extends beyond memory".into()));
            }
        } else {
            let slot = memory
                .get_mut(pos)
                .ok_or_else(|| ZError::InvalidSave("compressed data extends beyond memory".into()))?;
            *slot ^= byte;
            pos += 1;
        }
    }
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress() {
        let original = vec![0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];
        let current = vec![0x10, 0x21, 0x30, 0x40, 0x50, 0x60, 0x71, 0x80];

        let compressed = compress_memory(&current, &original);
        assert_eq!(compressed, vec![0, 0, 0x01, 0, 3, 0x01]);
        let restored = decompress_memory(&compressed, &original, original.len()).unwrap();
        assert_eq!(current, restored);
    }

    #[test]
    fn test_long_run_of_zeros() {
        let original = vec![0xFF; 1000];
        let mut current = original.clone();
        current[700] = 0xFE;

        let compressed = compress_memory(&current, &original);
        // 700 unchanged bytes need three run markers
        assert_eq!(compressed.len(), 7);
        let restored = decompress_memory(&compressed, &original, 1000).unwrap();
        assert_eq!(current, restored);
    }

    #[test]
    fn test_overrun_is_rejected() {
        let original = vec![0; 4];
        assert!(decompress_memory(&[0, 9], &original, 4).is_err());
        assert!(decompress_memory(&[1, 1, 1, 1, 1], &original, 4).is_err());
        assert!(decompress_memory(&[0], &original, 4).is_err());
    }
}
