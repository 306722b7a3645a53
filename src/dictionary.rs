use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use log::{debug, trace};

use crate::error::ZResult;
use crate::text::TextCodec;
use crate::vm::VM;

/// View of a dictionary table in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    pub addr: u32,
    /// Word-separator ZSCII codes
    pub separators: Vec<u8>,
    pub entry_length: u8,
    /// Negative counts mark an unsorted table
    pub entry_count: i16,
    pub entries_addr: u32,
    /// Encoded word width in bytes (4 or 6)
    pub word_bytes: usize,
    pub zchars: usize,
}

/// One word found by the tokeniser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Offset of the word in the text buffer
    pub position: usize,
    pub text: Vec<u16>,
}

impl Dictionary {
    pub fn load(vm: &VM, addr: u32) -> ZResult<Dictionary> {
        let n = vm.read_byte(addr)? as u32;
        let separators = (0..n)
            .map(|i| vm.read_byte(addr + 1 + i))
            .collect::<ZResult<Vec<u8>>>()?;
        let entry_length = vm.read_byte(addr + 1 + n)?;
        let entry_count = vm.read_word(addr + 2 + n)? as i16;
        Ok(Dictionary {
            addr,
            separators,
            entry_length,
            entry_count,
            entries_addr: addr + 4 + n,
            word_bytes: vm.profile.dictionary_word_bytes,
            zchars: vm.profile.dictionary_zchars,
        })
    }

    pub fn len(&self) -> usize {
        self.entry_count.unsigned_abs() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn entry_addr(&self, index: usize) -> u32 {
        self.entries_addr + index as u32 * self.entry_length as u32
    }

    fn entry_bytes<'a>(&self, memory: &'a [u8], index: usize) -> &'a [u8] {
        let start = self.entry_addr(index) as usize;
        memory.get(start..start + self.word_bytes).unwrap_or(&[])
    }

    /// Address of the entry matching an encoded word, if present
    pub fn lookup(&self, memory: &[u8], encoded: &[u8]) -> Option<u32> {
        if self.entry_count > 0 {
            let mut lo = 0usize;
            let mut hi = self.len();
            while lo < hi {
                let mid = (lo + hi) / 2;
                match self.entry_bytes(memory, mid).cmp(encoded) {
                    std::cmp::Ordering::Equal => return Some(self.entry_addr(mid)),
                    std::cmp::Ordering::Less => lo = mid + 1,
                    std::cmp::Ordering::Greater => hi = mid,
                }
            }
            None
        } else {
            (0..self.len())
                .find(|&i| self.entry_bytes(memory, i) == encoded)
                .map(|i| self.entry_addr(i))
        }
    }

    /// Encode ZSCII text the way entries are stored, then look it up
    pub fn lookup_text(&self, memory: &[u8], codec: &TextCodec, text: &[u16]) -> Option<u32> {
        let encoded = codec.encode_word(text, self.zchars);
        self.lookup(memory, &encoded)
    }

    /// Decoded text of every entry, in table order
    pub fn words(&self, memory: &[u8], codec: &TextCodec) -> ZResult<Vec<String>> {
        (0..self.len())
            .map(|i| {
                codec
                    .decode_to_string(memory, self.entry_addr(i))
                    .map(|(word, _)| word)
            })
            .collect()
    }

    /// Split text into words: spaces separate, separators are words of their own
    pub fn split(&self, text: &[u16]) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;
        for (i, &c) in text.iter().enumerate() {
            let is_separator = c < 256 && self.separators.contains(&(c as u8));
            if c == 32 || is_separator {
                if let Some(s) = start.take() {
                    tokens.push(Token {
                        position: s,
                        text: text[s..i].to_vec(),
                    });
                }
                if is_separator {
                    tokens.push(Token {
                        position: i,
                        text: vec![c],
                    });
                }
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            tokens.push(Token {
                position: s,
                text: text[s..].to_vec(),
            });
        }
        tokens
    }
}

/// Read the typed text out of a text buffer, returning it and the offset it starts at
pub fn read_text_buffer(vm: &VM, text_addr: u32) -> ZResult<(Vec<u16>, u32)> {
    let mut text = Vec::new();
    if vm.profile.version >= 5 {
        let count = vm.read_byte(text_addr + 1)? as u32;
        for i in 0..count {
            text.push(vm.read_byte(text_addr + 2 + i)? as u16);
        }
        Ok((text, 2))
    } else {
        let max = vm.read_byte(text_addr)? as u32;
        for i in 0..max {
            let c = vm.read_byte(text_addr + 1 + i)?;
            if c == 0 {
                break;
            }
            text.push(c as u16);
        }
        Ok((text, 1))
    }
}

/// Fill a parse buffer from a text buffer (the parse step of `read`, and `tokenise`).
///
/// With `skip_unknown`, words missing from the dictionary keep whatever their
/// parse-buffer slot held, though they still count.
pub fn tokenise(
    vm: &mut VM,
    codec: &TextCodec,
    text_addr: u32,
    parse_addr: u32,
    dictionary_addr: u32,
    skip_unknown: bool,
) -> ZResult<()> {
    let dictionary = Dictionary::load(vm, dictionary_addr)?;
    let (text, text_start) = read_text_buffer(vm, text_addr)?;
    let max_words = vm.read_byte(parse_addr)? as usize;
    let tokens = dictionary.split(&text);
    trace!("tokenise {:?} into {} words", tokens, tokens.len());

    let mut count = 0;
    for token in tokens.iter().take(max_words) {
        let entry = parse_addr + 2 + count as u32 * 4;
        count += 1;
        let found = dictionary.lookup_text(&vm.game.memory, codec, &token.text);
        if found.is_none() && skip_unknown {
            continue;
        }
        vm.write_word(entry, found.unwrap_or(0) as u16)?;
        vm.write_byte(entry + 2, token.text.len() as u8)?;
        vm.write_byte(entry + 3, (token.position as u32 + text_start) as u8)?;
    }
    vm.write_byte(parse_addr + 1, count as u8)?;
    debug!("tokenised {} words", count);
    Ok(())
}

impl Display for Dictionary {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        writeln!(
            f,
            "Number of separator / input codes: {}, word size: {}, word count: {}",
            self.separators.len(),
            self.entry_length,
            self.entry_count
        )?;
        write!(f, "separators:")?;
        for c in &self.separators {
            write!(f, " '{}'", *c as char)?;
        }
        Ok(())
    }
}
