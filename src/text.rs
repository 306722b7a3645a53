//! Z-string decoding and encoding.
//!
//! Strings are runs of 16-bit words, three 5-bit Z-characters each, ending at
//! the word with bit 15 set. Z-characters index one of three alphabets
//! (lower case, upper case, punctuation); the rest are shifts, abbreviation
//! references and a 10-bit ZSCII escape. Decoding yields ZSCII codes so
//! output stream 3 can store them unchanged; [`TextCodec::zscii_to_char`] maps them to
//! Unicode for the screen.

use crate::error::{ZError, ZResult};
use crate::header::{word_at, Header};
use log::trace;

pub const ALPHABET_A0: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
pub const ALPHABET_A1: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Position 0 is the escape marker, never looked up
const ALPHABET_A2_V1: &[u8; 26] = b" 0123456789.,!?_#'\"/\\<-:()";
const ALPHABET_A2: &[u8; 26] = b" \r0123456789.,!?_#'\"/\\-:()";

pub const ZSCII_NEWLINE: u16 = 13;

/// Unicode values for ZSCII 155-223 when the story supplies no table
const DEFAULT_UNICODE: [u16; 69] = [
    0xe4, 0xf6, 0xfc, 0xc4, 0xd6, 0xdc, 0xdf, 0xbb, 0xab, 0xeb, 0xef, 0xff, 0xcb, 0xcf, 0xe1,
    0xe9, 0xed, 0xf3, 0xfa, 0xfd, 0xc1, 0xc9, 0xcd, 0xd3, 0xda, 0xdd, 0xe0, 0xe8, 0xec, 0xf2,
    0xf9, 0xc0, 0xc8, 0xcc, 0xd2, 0xd9, 0xe2, 0xea, 0xee, 0xf4, 0xfb, 0xc2, 0xca, 0xce, 0xd4,
    0xdb, 0xe5, 0xc5, 0xf8, 0xd8, 0xe3, 0xf1, 0xf5, 0xc3, 0xd1, 0xd5, 0xe6, 0xc6, 0xe7, 0xc7,
    0xfe, 0xf0, 0xde, 0xd0, 0xa3, 0x153, 0x152, 0xa1, 0xbf,
];

/// Alphabet and character tables for one story, read once at load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCodec {
    pub version: u8,
    abbrev_table: u32,
    alphabets: [[u8; 26]; 3],
    /// Unicode values for ZSCII 155 onwards
    unicode: Vec<u16>,
}

impl TextCodec {
    pub fn new(memory: &[u8], header: &Header) -> Self {
        let version = header.version;
        let mut alphabets = TextCodec::default_for(version).alphabets;
        if version >= 5 && header.alphabet_table != 0 {
            let base = header.alphabet_table as usize;
            if let Some(table) = memory.get(base..base + 78) {
                for (row, chunk) in alphabets.iter_mut().zip(table.chunks(26)) {
                    row.copy_from_slice(chunk);
                }
                // Escape and newline keep their meaning in a custom A2
                alphabets[2][0] = b' ';
                alphabets[2][1] = b'\r';
            }
        }

        let unicode = if header.unicode_table != 0 {
            let base = header.unicode_table as usize;
            let count = memory.get(base).copied().unwrap_or(0) as usize;
            (0..count).map(|i| word_at(memory, base + 1 + i * 2)).collect()
        } else {
            DEFAULT_UNICODE.to_vec()
        };

        TextCodec {
            version,
            abbrev_table: header.abbrev_table as u32,
            alphabets,
            unicode,
        }
    }

    /// Codec with the standard alphabets and Unicode table, no abbreviations
    pub fn default_for(version: u8) -> Self {
        TextCodec {
            version,
            abbrev_table: 0,
            alphabets: [
                *ALPHABET_A0,
                *ALPHABET_A1,
                if version == 1 {
                    *ALPHABET_A2_V1
                } else {
                    *ALPHABET_A2
                },
            ],
            unicode: DEFAULT_UNICODE.to_vec(),
        }
    }

    /// Decode the Z-string at `addr`, returning ZSCII codes and the bytes consumed
    pub fn decode(&self, memory: &[u8], addr: u32) -> ZResult<(Vec<u16>, usize)> {
        self.decode_inner(memory, addr, false)
    }

    /// Decode straight to a host string
    pub fn decode_to_string(&self, memory: &[u8], addr: u32) -> ZResult<(String, usize)> {
        let (zscii, len) = self.decode(memory, addr)?;
        Ok((self.zscii_to_string(&zscii), len))
    }

    fn decode_inner(
        &self,
        memory: &[u8],
        addr: u32,
        in_abbreviation: bool,
    ) -> ZResult<(Vec<u16>, usize)> {
        let mut zchars = Vec::new();
        let mut offset = addr as usize;
        loop {
            if offset + 1 >= memory.len() {
                return Err(ZError::OutOfBounds {
                    addr: offset as u32,
                    size: memory.len(),
                });
            }
            let word = word_at(memory, offset);
            offset += 2;
            zchars.extend_from_slice(&[
                ((word >> 10) & 0x1F) as u8,
                ((word >> 5) & 0x1F) as u8,
                (word & 0x1F) as u8,
            ]);
            if word & 0x8000 != 0 {
                break;
            }
        }
        trace!("Z-chars at {:05x}: {:?}", addr, zchars);

        let mut out = Vec::with_capacity(zchars.len());
        let mut lock = 0usize;
        let mut current = 0usize;
        let mut i = 0;
        while i < zchars.len() {
            let zc = zchars[i];
            i += 1;
            match zc {
                0 => out.push(32),
                1 if self.version == 1 => out.push(ZSCII_NEWLINE),
                1..=3 if self.version >= 3 || (self.version == 2 && zc == 1) => {
                    // Abbreviation: the next Z-char completes the index
                    let Some(&next) = zchars.get(i) else { break };
                    i += 1;
                    if in_abbreviation {
                        return Err(ZError::NestedAbbreviation { addr });
                    }
                    let index = 32 * (zc as u32 - 1) + next as u32;
                    let entry = self.abbrev_table + index * 2;
                    let target = word_at(memory, entry as usize) as u32 * 2;
                    let (expansion, _) = self.decode_inner(memory, target, true)?;
                    out.extend(expansion);
                }
                2 | 3 => {
                    // V1-2 single shift
                    current = (lock + zc as usize - 1) % 3;
                    continue;
                }
                4 | 5 if self.version <= 2 => {
                    lock = (lock + zc as usize - 3) % 3;
                    current = lock;
                    continue;
                }
                4 | 5 => {
                    current = zc as usize - 3;
                    continue;
                }
                6 if current == 2 => {
                    // 10-bit ZSCII escape
                    let (Some(&hi), Some(&lo)) = (zchars.get(i), zchars.get(i + 1)) else {
                        break;
                    };
                    i += 2;
                    out.push(((hi as u16) << 5) | lo as u16);
                }
                7 if current == 2 && self.version >= 2 => out.push(ZSCII_NEWLINE),
                _ => {
                    let code = self.alphabets[current][(zc - 6) as usize];
                    out.push(if code == b'\r' { ZSCII_NEWLINE } else { code as u16 });
                }
            }
            current = lock;
        }
        Ok((out, offset - addr as usize))
    }

    /// Map a ZSCII output code to a host character; `None` for codes that print nothing
    pub fn zscii_to_char(&self, code: u16) -> Option<char> {
        match code {
            0 => None,
            9 => Some('\t'),
            11 => Some(' '),
            13 => Some('\n'),
            32..=126 => Some(code as u8 as char),
            155..=251 => Some(
                self.unicode
                    .get((code - 155) as usize)
                    .and_then(|&u| char::from_u32(u as u32))
                    .unwrap_or('?'),
            ),
            _ => Some('?'),
        }
    }

    pub fn zscii_to_string(&self, codes: &[u16]) -> String {
        codes.iter().filter_map(|&c| self.zscii_to_char(c)).collect()
    }

    /// Map a host character to ZSCII, if it has a representation
    pub fn char_to_zscii(&self, ch: char) -> Option<u16> {
        match ch {
            '\n' | '\r' => Some(ZSCII_NEWLINE),
            ' '..='~' => Some(ch as u16),
            _ => self
                .unicode
                .iter()
                .position(|&u| u as u32 == ch as u32)
                .map(|p| 155 + p as u16),
        }
    }

    /// Whether a Unicode character can be printed and/or read (`check_unicode` result bits)
    pub fn unicode_support(&self, ch: u16) -> u16 {
        match char::from_u32(ch as u32) {
            Some(c) if self.char_to_zscii(c).is_some() => 3,
            _ => 0,
        }
    }

    fn zchars_for(&self, code: u16, out: &mut Vec<u8>) {
        let (shift_up, shift_punct) = if self.version <= 2 { (2, 3) } else { (4, 5) };
        if code == 32 {
            out.push(0);
            return;
        }
        for (row, alphabet) in self.alphabets.iter().enumerate() {
            // A2 starts with the escape, then (V2+) newline
            let start = match row {
                2 if self.version == 1 => 1,
                2 => 2,
                _ => 0,
            };
            if code < 256 {
                if let Some(pos) = alphabet[start..].iter().position(|&c| c as u16 == code) {
                    match row {
                        1 => out.push(shift_up),
                        2 => out.push(shift_punct),
                        _ => {}
                    }
                    out.push((pos + start + 6) as u8);
                    return;
                }
            }
        }
        if code == ZSCII_NEWLINE && self.version >= 2 {
            out.extend_from_slice(&[shift_punct, 7]);
            return;
        }
        out.extend_from_slice(&[shift_punct, 6, ((code >> 5) & 0x1F) as u8, (code & 0x1F) as u8]);
    }

    /// Encode ZSCII text into exactly `zchar_count` Z-characters, padded with 5s
    pub fn encode_zchars(&self, text: &[u16], zchar_count: usize) -> Vec<u8> {
        let mut zchars = Vec::with_capacity(zchar_count + 3);
        for &code in text {
            if zchars.len() >= zchar_count {
                break;
            }
            self.zchars_for(code, &mut zchars);
        }
        zchars.resize(zchar_count, 5);
        zchars
    }

    /// Encode a dictionary word (6 or 9 Z-characters depending on version)
    pub fn encode_word(&self, text: &[u16], zchar_count: usize) -> Vec<u8> {
        pack_zchars(&self.encode_zchars(text, zchar_count))
    }

    /// Encode arbitrary-length text as a complete Z-string
    pub fn encode_string(&self, text: &str) -> Vec<u8> {
        let mut zchars = Vec::new();
        for ch in text.chars() {
            if let Some(code) = self.char_to_zscii(ch) {
                self.zchars_for(code, &mut zchars);
            }
        }
        if zchars.is_empty() || zchars.len() % 3 != 0 {
            let padded = zchars.len().div_ceil(3).max(1) * 3;
            zchars.resize(padded, 5);
        }
        pack_zchars(&zchars)
    }
}

/// Pack Z-characters three to a word, marking the last word
pub fn pack_zchars(zchars: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(zchars.len() / 3 * 2);
    let words = zchars.chunks(3).count();
    for (n, chunk) in zchars.chunks(3).enumerate() {
        let get = |i: usize| chunk.get(i).copied().unwrap_or(5) as u16;
        let mut word = (get(0) << 10) | (get(1) << 5) | get(2);
        if n + 1 == words {
            word |= 0x8000;
        }
        bytes.push((word >> 8) as u8);
        bytes.push(word as u8);
    }
    bytes
}
