//! Assemble small synthetic story images for tests and tooling.
//!
//! Layout used for every version:
//!
//! ```text
//! 0x0000  header
//! 0x0040  abbreviation table (96 entries)
//! 0x0100  global variables (240 words)
//! 0x02e0  object table: property defaults, entries, property tables
//! 0x1000  scratch (left zero)
//! 0x1100  tables allocated with `table()`
//! 0x2000  static memory: dictionary
//! 0x3000  high memory: abbreviation strings, routines, strings, main code
//! ```

use crate::text::TextCodec;

pub const ABBREVIATIONS_ADDR: usize = 0x40;
pub const GLOBALS_ADDR: usize = 0x100;
pub const OBJECT_TABLE_ADDR: usize = 0x2E0;
pub const SCRATCH_ADDR: usize = 0x1000;
pub const TABLES_ADDR: usize = 0x1100;
pub const STATIC_BASE: usize = 0x2000;
pub const HIGH_BASE: usize = 0x3000;

#[derive(Debug, Clone, Default)]
struct ObjectSpec {
    name: String,
    parent: u16,
    attributes: Vec<u16>,
    /// (number, data), any order
    properties: Vec<(u8, Vec<u8>)>,
}

/// Builder for a minimal but valid story image
#[derive(Debug, Clone)]
pub struct StoryBuilder {
    version: u8,
    memory: Vec<u8>,
    codec: TextCodec,
    objects: Vec<ObjectSpec>,
    defaults: Vec<(u8, u16)>,
    separators: Vec<u8>,
    words: Vec<String>,
    table_cursor: usize,
    high_cursor: usize,
    initial_pc: Option<u16>,
}

impl StoryBuilder {
    pub fn new(version: u8) -> Self {
        StoryBuilder {
            version,
            memory: vec![0; HIGH_BASE],
            codec: TextCodec::default_for(version),
            objects: Vec::new(),
            defaults: Vec::new(),
            separators: vec![b'.', b','],
            words: Vec::new(),
            table_cursor: TABLES_ADDR,
            high_cursor: HIGH_BASE,
            initial_pc: None,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    fn multiplier(&self) -> usize {
        match self.version {
            1..=3 => 2,
            4..=7 => 4,
            _ => 8,
        }
    }

    fn append_high(&mut self, bytes: &[u8], align: usize) -> u32 {
        while self.high_cursor % align != 0 {
            self.high_cursor += 1;
        }
        let addr = self.high_cursor;
        if self.memory.len() < addr + bytes.len() {
            self.memory.resize(addr + bytes.len(), 0);
        }
        self.memory[addr..addr + bytes.len()].copy_from_slice(bytes);
        self.high_cursor += bytes.len();
        addr as u32
    }

    /// Packed form of a routine or string address
    pub fn packed(&self, addr: u32) -> u16 {
        (addr as usize / self.multiplier()) as u16
    }

    /// Add a routine with zeroed locals; returns its byte address
    pub fn routine(&mut self, num_locals: u8, code: &[u8]) -> u32 {
        self.routine_with_defaults(&vec![0; num_locals as usize], code)
    }

    /// Add a routine whose locals start with the given values (V1-4 only keep them)
    pub fn routine_with_defaults(&mut self, defaults: &[u16], code: &[u8]) -> u32 {
        let mut bytes = vec![defaults.len() as u8];
        if self.version <= 4 {
            for value in defaults {
                bytes.extend_from_slice(&value.to_be_bytes());
            }
        }
        bytes.extend_from_slice(code);
        let align = self.multiplier();
        self.append_high(&bytes, align)
    }

    /// Add a string in high memory; returns its byte address
    pub fn string(&mut self, text: &str) -> u32 {
        let bytes = self.codec.encode_string(text);
        let align = self.multiplier();
        self.append_high(&bytes, align)
    }

    /// Encoded Z-string bytes, for inline `print` operands
    pub fn encode(&self, text: &str) -> Vec<u8> {
        self.codec.encode_string(text)
    }

    /// Set the code execution starts at (a routine body in V6)
    pub fn main(&mut self, code: &[u8]) -> u32 {
        if self.version == 6 {
            let addr = self.routine(0, code);
            self.initial_pc = Some(self.packed(addr));
            addr
        } else {
            let addr = self.append_high(code, 1);
            self.initial_pc = Some(addr as u16);
            addr
        }
    }

    pub fn abbreviation(&mut self, index: usize, text: &str) {
        let bytes = self.codec.encode_string(text);
        let addr = self.append_high(&bytes, 2);
        let entry = ABBREVIATIONS_ADDR + index * 2;
        self.memory[entry..entry + 2].copy_from_slice(&((addr / 2) as u16).to_be_bytes());
    }

    pub fn global(&mut self, var: u8, value: u16) {
        let addr = GLOBALS_ADDR + (var as usize - 0x10) * 2;
        self.memory[addr..addr + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Copy bytes into dynamic memory; returns their address
    pub fn table(&mut self, data: &[u8]) -> u32 {
        let addr = self.table_cursor;
        self.memory[addr..addr + data.len()].copy_from_slice(data);
        self.table_cursor += data.len().max(1);
        if self.table_cursor % 2 == 1 {
            self.table_cursor += 1;
        }
        addr as u32
    }

    /// Add an object; returns its number
    pub fn object(&mut self, name: &str, parent: u16) -> u16 {
        self.objects.push(ObjectSpec {
            name: name.to_string(),
            parent,
            ..Default::default()
        });
        self.objects.len() as u16
    }

    pub fn attribute(&mut self, object: u16, attribute: u16) {
        self.objects[object as usize - 1].attributes.push(attribute);
    }

    pub fn property(&mut self, object: u16, number: u8, data: &[u8]) {
        self.objects[object as usize - 1]
            .properties
            .push((number, data.to_vec()));
    }

    pub fn default_property(&mut self, number: u8, value: u16) {
        self.defaults.push((number, value));
    }

    pub fn separators(&mut self, separators: &[u8]) {
        self.separators = separators.to_vec();
    }

    pub fn word(&mut self, word: &str) {
        self.words.push(word.to_string());
    }

    /// Poke raw bytes anywhere in the image
    pub fn poke(&mut self, addr: usize, bytes: &[u8]) {
        if self.memory.len() < addr + bytes.len() {
            self.memory.resize(addr + bytes.len(), 0);
        }
        self.memory[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    /// Address of object `n`'s entry in the built image
    pub fn object_entry_addr(&self, object: u16) -> usize {
        let (defaults, entry) = if self.version <= 3 { (31, 9) } else { (63, 14) };
        OBJECT_TABLE_ADDR + defaults * 2 + (object as usize - 1) * entry
    }

    fn write_objects(&self, memory: &mut [u8]) {
        let small = self.version <= 3;
        let (default_count, entry_size, attr_bytes) = if small { (31, 9, 4) } else { (63, 14, 6) };
        for &(number, value) in &self.defaults {
            let addr = OBJECT_TABLE_ADDR + (number as usize - 1) * 2;
            memory[addr..addr + 2].copy_from_slice(&value.to_be_bytes());
        }

        let count = self.objects.len();
        let entries = OBJECT_TABLE_ADDR + default_count * 2;
        let mut prop_cursor = entries + count * entry_size;

        let mut child = vec![0u16; count + 1];
        let mut sibling = vec![0u16; count + 1];
        // Link children in reverse so the first declared ends up first in the chain
        for (i, spec) in self.objects.iter().enumerate().rev() {
            let id = i as u16 + 1;
            if spec.parent != 0 {
                sibling[id as usize] = child[spec.parent as usize];
                child[spec.parent as usize] = id;
            }
        }

        for (i, spec) in self.objects.iter().enumerate() {
            let id = i + 1;
            let entry = entries + i * entry_size;
            for &attr in &spec.attributes {
                memory[entry + attr as usize / 8] |= 0x80 >> (attr % 8);
            }
            let links = [spec.parent, sibling[id], child[id]];
            for (n, &link) in links.iter().enumerate() {
                if small {
                    memory[entry + attr_bytes + n] = link as u8;
                } else {
                    let at = entry + attr_bytes + n * 2;
                    memory[at..at + 2].copy_from_slice(&link.to_be_bytes());
                }
            }
            let prop_at = entry + attr_bytes + if small { 3 } else { 6 };
            memory[prop_at..prop_at + 2].copy_from_slice(&(prop_cursor as u16).to_be_bytes());

            let name = if spec.name.is_empty() {
                Vec::new()
            } else {
                self.codec.encode_string(&spec.name)
            };
            memory[prop_cursor] = (name.len() / 2) as u8;
            prop_cursor += 1;
            memory[prop_cursor..prop_cursor + name.len()].copy_from_slice(&name);
            prop_cursor += name.len();

            let mut props = spec.properties.clone();
            props.sort_by(|a, b| b.0.cmp(&a.0));
            for (number, data) in props {
                if small {
                    memory[prop_cursor] = (((data.len() - 1) as u8) << 5) | number;
                    prop_cursor += 1;
                } else if data.len() <= 2 {
                    memory[prop_cursor] = number | if data.len() == 2 { 0x40 } else { 0 };
                    prop_cursor += 1;
                } else {
                    memory[prop_cursor] = 0x80 | number;
                    memory[prop_cursor + 1] = 0x80 | (data.len() as u8 & 0x3F);
                    prop_cursor += 2;
                }
                memory[prop_cursor..prop_cursor + data.len()].copy_from_slice(&data);
                prop_cursor += data.len();
            }
            memory[prop_cursor] = 0;
            prop_cursor += 1;
        }
        debug_assert!(prop_cursor < SCRATCH_ADDR, "object table overflows scratch area");
    }

    fn write_dictionary(&self, memory: &mut [u8]) {
        let zchars = if self.version <= 3 { 6 } else { 9 };
        let word_bytes = zchars / 3 * 2;
        let mut encoded: Vec<Vec<u8>> = self
            .words
            .iter()
            .map(|w| {
                let text: Vec<u16> = w.bytes().map(|b| b as u16).collect();
                self.codec.encode_word(&text, zchars)
            })
            .collect();
        encoded.sort();
        encoded.dedup();

        let mut at = STATIC_BASE;
        memory[at] = self.separators.len() as u8;
        at += 1;
        memory[at..at + self.separators.len()].copy_from_slice(&self.separators);
        at += self.separators.len();
        memory[at] = (word_bytes + 3) as u8;
        memory[at + 1..at + 3].copy_from_slice(&(encoded.len() as u16).to_be_bytes());
        at += 3;
        for word in encoded {
            memory[at..at + word_bytes].copy_from_slice(&word);
            at += word_bytes + 3;
        }
    }

    /// Produce the finished image, with file length and checksum filled in
    pub fn build(&self) -> Vec<u8> {
        let mut builder = self.clone();
        if builder.initial_pc.is_none() {
            // quit
            builder.main(&[0xBA]);
        }
        let mut memory = builder.memory.clone();
        let align = match self.version {
            1..=3 => 2,
            4 | 5 => 4,
            _ => 8,
        };
        let len = memory.len().div_ceil(align) * align;
        memory.resize(len, 0);

        builder.write_objects(&mut memory);
        builder.write_dictionary(&mut memory);

        let put = |memory: &mut Vec<u8>, at: usize, value: u16| {
            memory[at..at + 2].copy_from_slice(&value.to_be_bytes());
        };
        memory[0] = self.version;
        put(&mut memory, 0x02, 1);
        put(&mut memory, 0x04, HIGH_BASE as u16);
        put(&mut memory, 0x06, builder.initial_pc.unwrap_or(HIGH_BASE as u16));
        put(&mut memory, 0x08, STATIC_BASE as u16);
        put(&mut memory, 0x0A, OBJECT_TABLE_ADDR as u16);
        put(&mut memory, 0x0C, GLOBALS_ADDR as u16);
        put(&mut memory, 0x0E, STATIC_BASE as u16);
        memory[0x12..0x18].copy_from_slice(b"260101");
        put(&mut memory, 0x18, ABBREVIATIONS_ADDR as u16);
        put(&mut memory, 0x1A, (len / align) as u16);
        let checksum = memory[0x40..]
            .iter()
            .fold(0u16, |sum, &b| sum.wrapping_add(b as u16));
        put(&mut memory, 0x1C, checksum);
        memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    #[test]
    fn test_built_image_parses() {
        let mut story = StoryBuilder::new(5);
        story.word("lamp");
        let memory = story.build();
        let header = Header::parse(&memory).unwrap();
        assert_eq!(header.version, 5);
        assert_eq!(header.len_file, memory.len());
        assert!(header.verify_checksum(&memory).is_ok());
        assert_eq!(memory[header.initial_pc as usize], 0xBA);
    }

    #[test]
    fn test_object_links() {
        let mut story = StoryBuilder::new(3);
        let room = story.object("room", 0);
        let lamp = story.object("lamp", room);
        let box_ = story.object("box", room);
        let memory = story.build();
        let room_entry = story.object_entry_addr(room);
        // child of room is the first declared child
        assert_eq!(memory[room_entry + 6] as u16, lamp);
        assert_eq!(memory[story.object_entry_addr(lamp) + 5] as u16, box_);
        assert_eq!(memory[story.object_entry_addr(box_) + 4] as u16, room);
    }
}
