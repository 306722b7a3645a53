//! Version-dependent constants, computed once at load time.
//!
//! Handlers consult the profile instead of testing the version number
//! themselves:
//! - V1-3: 32 attributes, 9-byte objects, 31 default properties, short
//!   property headers, 6 Z-character dictionary words
//! - V4+: 48 attributes, 14-byte objects, 63 default properties, long
//!   property headers, 9 Z-character dictionary words

use crate::error::{ZError, ZResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyFormat {
    /// One size/number byte, data length 1-8
    Short,
    /// One or two size bytes, data length 1-64
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionProfile {
    pub version: u8,
    /// Scale factor for packed routine and string addresses
    pub packed_multiplier: u32,
    /// V6/7 routine offset, already scaled by 8
    pub routine_offset: u32,
    /// V6/7 string offset, already scaled by 8
    pub string_offset: u32,
    pub attribute_bytes: usize,
    pub object_entry_size: usize,
    pub default_property_count: u16,
    pub max_objects: u16,
    pub property_format: PropertyFormat,
    pub dictionary_word_bytes: usize,
    pub dictionary_zchars: usize,
    /// Scale factor for the file length word at 0x1A
    pub file_length_multiplier: usize,
}

impl VersionProfile {
    pub fn new(version: u8, routines_offset: u16, strings_offset: u16) -> ZResult<Self> {
        if !(1..=8).contains(&version) {
            return Err(ZError::MalformedImage(format!(
                "unsupported version {version}"
            )));
        }
        let small = version <= 3;
        let (packed_multiplier, file_length_multiplier) = match version {
            1..=3 => (2, 2),
            4 | 5 => (4, 4),
            6 | 7 => (4, 8),
            _ => (8, 8),
        };
        let (routine_offset, string_offset) = if version == 6 || version == 7 {
            (routines_offset as u32 * 8, strings_offset as u32 * 8)
        } else {
            (0, 0)
        };
        Ok(VersionProfile {
            version,
            packed_multiplier,
            routine_offset,
            string_offset,
            attribute_bytes: if small { 4 } else { 6 },
            object_entry_size: if small { 9 } else { 14 },
            default_property_count: if small { 31 } else { 63 },
            max_objects: if small { 255 } else { 65535 },
            property_format: if small {
                PropertyFormat::Short
            } else {
                PropertyFormat::Long
            },
            dictionary_word_bytes: if small { 4 } else { 6 },
            dictionary_zchars: if small { 6 } else { 9 },
            file_length_multiplier,
        })
    }

    pub fn attribute_count(&self) -> u16 {
        (self.attribute_bytes * 8) as u16
    }

    pub fn unpack_routine(&self, packed: u16) -> u32 {
        packed as u32 * self.packed_multiplier + self.routine_offset
    }

    pub fn unpack_string(&self, packed: u16) -> u32 {
        packed as u32 * self.packed_multiplier + self.string_offset
    }

    /// Routine headers carry initial local values only before V5
    pub fn routine_has_local_defaults(&self) -> bool {
        self.version <= 4
    }

    /// V6 enters through a packed main routine instead of a raw PC
    pub fn starts_with_main_routine(&self) -> bool {
        self.version == 6
    }

    /// Save/restore report through a store from V4 on, a branch before that
    pub fn save_uses_store(&self) -> bool {
        self.version >= 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_multipliers() {
        let v3 = VersionProfile::new(3, 0, 0).unwrap();
        let v5 = VersionProfile::new(5, 0, 0).unwrap();
        let v8 = VersionProfile::new(8, 0, 0).unwrap();
        assert_eq!(v3.unpack_routine(0x1234), 0x2468);
        assert_eq!(v5.unpack_string(0x1000), 0x4000);
        assert_eq!(v8.unpack_routine(0x1000), 0x8000);
    }

    #[test]
    fn test_v6_offsets() {
        let v6 = VersionProfile::new(6, 0x10, 0x20).unwrap();
        assert_eq!(v6.unpack_routine(0x100), 0x400 + 0x80);
        assert_eq!(v6.unpack_string(0x100), 0x400 + 0x100);
        assert!(v6.starts_with_main_routine());
    }

    #[test]
    fn test_object_layout_split() {
        let v3 = VersionProfile::new(3, 0, 0).unwrap();
        let v4 = VersionProfile::new(4, 0, 0).unwrap();
        assert_eq!(v3.attribute_count(), 32);
        assert_eq!(v4.attribute_count(), 48);
        assert_eq!(v3.object_entry_size, 9);
        assert_eq!(v4.object_entry_size, 14);
        assert_eq!(v3.property_format, PropertyFormat::Short);
        assert_eq!(v4.dictionary_word_bytes, 6);
    }

    #[test]
    fn test_rejects_version_zero() {
        assert!(VersionProfile::new(0, 0, 0).is_err());
        assert!(VersionProfile::new(9, 0, 0).is_err());
    }
}
