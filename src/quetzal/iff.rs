//! IFF (Interchange File Format) container for Quetzal data

use crate::error::{ZError, ZResult};

/// IFF form: a type tag and its chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IffFile {
    /// Form type - "IFZS" for Quetzal
    pub form_type: [u8; 4],
    pub chunks: Vec<IffChunk>,
}

/// Individual chunk in an IFF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IffChunk {
    /// 4-character chunk type identifier
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
}

impl Default for IffFile {
    fn default() -> Self {
        Self::new()
    }
}

fn be_u32(bytes: &[u8], offset: usize) -> ZResult<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| ZError::InvalidSave(format!("truncated IFF data at offset {offset}")))
}

fn tag(bytes: &[u8], offset: usize) -> ZResult<[u8; 4]> {
    bytes
        .get(offset..offset + 4)
        .map(|b| [b[0], b[1], b[2], b[3]])
        .ok_or_else(|| ZError::InvalidSave(format!("truncated IFF tag at offset {offset}")))
}

impl IffFile {
    /// Create an empty Quetzal form
    pub fn new() -> Self {
        IffFile {
            form_type: *b"IFZS",
            chunks: Vec::new(),
        }
    }

    pub fn add_chunk(&mut self, chunk_type: [u8; 4], data: Vec<u8>) {
        self.chunks.push(IffChunk { chunk_type, data });
    }

    /// Serialize as `FORM <size> <type> <chunks...>`, padding odd chunks
    pub fn to_bytes(&self) -> Vec<u8> {
        let body: usize = self
            .chunks
            .iter()
            .map(|c| 8 + c.data.len() + c.data.len() % 2)
            .sum();
        let mut bytes = Vec::with_capacity(12 + body);
        bytes.extend_from_slice(b"FORM");
        bytes.extend_from_slice(&((4 + body) as u32).to_be_bytes());
        bytes.extend_from_slice(&self.form_type);
        for chunk in &self.chunks {
            bytes.extend_from_slice(&chunk.chunk_type);
            bytes.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
            bytes.extend_from_slice(&chunk.data);
            if chunk.data.len() % 2 == 1 {
                bytes.push(0);
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> ZResult<Self> {
        if tag(bytes, 0)? != *b"FORM" {
            return Err(ZError::InvalidSave("missing FORM header".into()));
        }
        let declared = be_u32(bytes, 4)? as usize;
        let end = 8 + declared;
        if end > bytes.len() {
            return Err(ZError::InvalidSave(format!(
                "FORM declares {declared} bytes but only {} follow",
                bytes.len() - 8
            )));
        }
        let mut iff = IffFile {
            form_type: tag(bytes, 8)?,
            chunks: Vec::new(),
        };

        let mut offset = 12;
        while offset + 8 <= end {
            let chunk_type = tag(bytes, offset)?;
            let size = be_u32(bytes, offset + 4)? as usize;
            let start = offset + 8;
            let data = bytes
                .get(start..start + size)
                .filter(|_| start + size <= end)
                .ok_or_else(|| {
                    ZError::InvalidSave(format!(
                        "chunk {} overruns the form",
                        String::from_utf8_lossy(&chunk_type)
                    ))
                })?;
            iff.chunks.push(IffChunk {
                chunk_type,
                data: data.to_vec(),
            });
            offset = start + size + size % 2;
        }
        Ok(iff)
    }

    /// Find a chunk by type
    pub fn find_chunk(&self, chunk_type: &[u8; 4]) -> Option<&IffChunk> {
        self.chunks.iter().find(|c| &c.chunk_type == chunk_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_chunks_are_padded() {
        let mut iff = IffFile::new();
        iff.add_chunk(*b"ABCD", vec![1, 2, 3]);
        iff.add_chunk(*b"WXYZ", vec![4, 5]);
        let bytes = iff.to_bytes();
        assert_eq!(bytes.len(), 12 + 8 + 4 + 8 + 2);
        assert_eq!(&bytes[4..8], &((bytes.len() - 8) as u32).to_be_bytes());

        let parsed = IffFile::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, iff);
        assert_eq!(parsed.find_chunk(b"WXYZ").unwrap().data, vec![4, 5]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(IffFile::from_bytes(b"NOPE").is_err());
        assert!(IffFile::from_bytes(b"FORM\x00\x00\x10\x00IFZS").is_err());
    }
}
