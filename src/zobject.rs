//! Z-Machine object tree and property tables
//!
//! One implementation serves every version; the layout differences come
//! from the VM's `VersionProfile`:
//! - V1-3: 9-byte entries (4 attribute bytes, byte links), 31 defaults,
//!   property header `size-1` in bits 7-5 and number in bits 4-0
//! - V4+: 14-byte entries (6 attribute bytes, word links), 63 defaults,
//!   one or two header bytes, data length up to 64
//!
//! Relationships are object numbers, never references; object 0 means
//! "nothing".

use crate::error::{ZError, ZResult};
use crate::version::PropertyFormat;
use crate::vm::VM;
use log::{debug, warn};

/// A property as stored in an object's property table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyEntry {
    pub number: u16,
    /// Address of the first data byte
    pub data_addr: u32,
    pub len: u16,
    /// Address of the next property header
    pub next_addr: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Parent,
    Sibling,
    Child,
}

pub trait ObjectTree {
    fn object_addr(&self, obj: u16) -> ZResult<u32>;
    fn get_parent(&self, obj: u16) -> ZResult<u16>;
    fn get_sibling(&self, obj: u16) -> ZResult<u16>;
    fn get_child(&self, obj: u16) -> ZResult<u16>;
    fn test_attribute(&self, obj: u16, attr: u16) -> ZResult<bool>;
    fn set_attribute(&mut self, obj: u16, attr: u16) -> ZResult<()>;
    fn clear_attribute(&mut self, obj: u16, attr: u16) -> ZResult<()>;
    fn insert_object(&mut self, obj: u16, dest: u16) -> ZResult<()>;
    fn remove_object(&mut self, obj: u16) -> ZResult<()>;
    fn get_property(&self, obj: u16, prop: u16) -> ZResult<u16>;
    fn put_property(&mut self, obj: u16, prop: u16, value: u16) -> ZResult<()>;
    fn get_property_addr(&self, obj: u16, prop: u16) -> ZResult<u32>;
    fn get_property_len(&self, data_addr: u32) -> ZResult<u16>;
    fn get_next_property(&self, obj: u16, prop: u16) -> ZResult<u16>;
    /// Address of the object's short-name Z-string, if it has one
    fn object_name_addr(&self, obj: u16) -> ZResult<Option<u32>>;
    fn children_of(&self, obj: u16) -> ZResult<Vec<u16>>;
}

impl VM {
    fn read_link(&self, obj: u16, link: Link) -> ZResult<u16> {
        let addr = self.object_addr(obj)? + self.profile.attribute_bytes as u32;
        match self.profile.property_format {
            PropertyFormat::Short => Ok(self.read_byte(addr + link as u32)? as u16),
            PropertyFormat::Long => self.read_word(addr + link as u32 * 2),
        }
    }

    fn write_link(&mut self, obj: u16, link: Link, value: u16) -> ZResult<()> {
        let addr = self.object_addr(obj)? + self.profile.attribute_bytes as u32;
        match self.profile.property_format {
            PropertyFormat::Short => self.write_byte(addr + link as u32, value as u8),
            PropertyFormat::Long => self.write_word(addr + link as u32 * 2, value),
        }
    }

    fn property_table_addr(&self, obj: u16) -> ZResult<u32> {
        let offset = match self.profile.property_format {
            PropertyFormat::Short => 7,
            PropertyFormat::Long => 12,
        };
        Ok(self.read_word(self.object_addr(obj)? + offset)? as u32)
    }

    fn first_property_addr(&self, obj: u16) -> ZResult<u32> {
        let table = self.property_table_addr(obj)?;
        let text_words = self.read_byte(table)? as u32;
        Ok(table + 1 + text_words * 2)
    }

    /// Decode the property header at `addr`; `None` at the end-of-list marker
    pub fn property_at(&self, addr: u32) -> ZResult<Option<PropertyEntry>> {
        let size_byte = self.read_byte(addr)?;
        if size_byte == 0 {
            return Ok(None);
        }
        let (number, len, header_len) = match self.profile.property_format {
            PropertyFormat::Short => ((size_byte & 0x1F) as u16, (size_byte >> 5) as u16 + 1, 1),
            PropertyFormat::Long => {
                let number = (size_byte & 0x3F) as u16;
                if size_byte & 0x80 != 0 {
                    let len = (self.read_byte(addr + 1)? & 0x3F) as u16;
                    (number, if len == 0 { 64 } else { len }, 2)
                } else if size_byte & 0x40 != 0 {
                    (number, 2, 1)
                } else {
                    (number, 1, 1)
                }
            }
        };
        let data_addr = addr + header_len;
        Ok(Some(PropertyEntry {
            number,
            data_addr,
            len,
            next_addr: data_addr + len as u32,
        }))
    }

    /// Find a property on an object, walking the descending list
    pub fn find_property(&self, obj: u16, prop: u16) -> ZResult<Option<PropertyEntry>> {
        let mut addr = self.first_property_addr(obj)?;
        while let Some(entry) = self.property_at(addr)? {
            if entry.number == prop {
                return Ok(Some(entry));
            }
            if entry.number < prop {
                break;
            }
            addr = entry.next_addr;
        }
        Ok(None)
    }

    /// Every property of an object, in table order
    pub fn properties_of(&self, obj: u16) -> ZResult<Vec<PropertyEntry>> {
        let mut props = Vec::new();
        let mut addr = self.first_property_addr(obj)?;
        while let Some(entry) = self.property_at(addr)? {
            addr = entry.next_addr;
            props.push(entry);
        }
        Ok(props)
    }

    fn require_property_object(&self, obj: u16, prop: u16) -> ZResult<()> {
        if obj == 0 {
            return Err(ZError::MissingProperty {
                object: 0,
                property: prop,
            });
        }
        Ok(())
    }

    /// Whether `obj` is `dest` or one of its ancestors
    fn is_ancestor_or_self(&self, obj: u16, dest: u16) -> ZResult<bool> {
        let mut current = dest;
        // Bounded in case the story already linked a cycle
        for _ in 0..=self.profile.max_objects {
            if current == obj {
                return Ok(true);
            }
            if current == 0 {
                return Ok(false);
            }
            current = self.read_link(current, Link::Parent)?;
        }
        Ok(false)
    }

    fn attribute_location(&self, obj: u16, attr: u16) -> ZResult<Option<(u32, u8)>> {
        if attr >= self.profile.attribute_count() {
            warn!("attribute {} out of range on object {}", attr, obj);
            return Ok(None);
        }
        let addr = self.object_addr(obj)? + attr as u32 / 8;
        Ok(Some((addr, 0x80 >> (attr % 8))))
    }
}

impl ObjectTree for VM {
    fn object_addr(&self, obj: u16) -> ZResult<u32> {
        if obj == 0 || obj > self.profile.max_objects {
            return Err(ZError::InvalidObject { object: obj });
        }
        let defaults = self.game.header.object_table_addr as u32;
        let entries = defaults + self.profile.default_property_count as u32 * 2;
        Ok(entries + (obj as u32 - 1) * self.profile.object_entry_size as u32)
    }

    fn get_parent(&self, obj: u16) -> ZResult<u16> {
        if obj == 0 {
            warn!("get_parent of object 0");
            return Ok(0);
        }
        self.read_link(obj, Link::Parent)
    }

    fn get_sibling(&self, obj: u16) -> ZResult<u16> {
        if obj == 0 {
            warn!("get_sibling of object 0");
            return Ok(0);
        }
        self.read_link(obj, Link::Sibling)
    }

    fn get_child(&self, obj: u16) -> ZResult<u16> {
        if obj == 0 {
            warn!("get_child of object 0");
            return Ok(0);
        }
        self.read_link(obj, Link::Child)
    }

    fn test_attribute(&self, obj: u16, attr: u16) -> ZResult<bool> {
        if obj == 0 {
            warn!("test_attr {} on object 0", attr);
            return Ok(false);
        }
        match self.attribute_location(obj, attr)? {
            Some((addr, mask)) => Ok(self.read_byte(addr)? & mask != 0),
            None => Ok(false),
        }
    }

    fn set_attribute(&mut self, obj: u16, attr: u16) -> ZResult<()> {
        if obj == 0 {
            warn!("set_attr {} on object 0", attr);
            return Ok(());
        }
        if let Some((addr, mask)) = self.attribute_location(obj, attr)? {
            let byte = self.read_byte(addr)?;
            self.write_byte(addr, byte | mask)?;
        }
        Ok(())
    }

    fn clear_attribute(&mut self, obj: u16, attr: u16) -> ZResult<()> {
        if obj == 0 {
            warn!("clear_attr {} on object 0", attr);
            return Ok(());
        }
        if let Some((addr, mask)) = self.attribute_location(obj, attr)? {
            let byte = self.read_byte(addr)?;
            self.write_byte(addr, byte & !mask)?;
        }
        Ok(())
    }

    fn insert_object(&mut self, obj: u16, dest: u16) -> ZResult<()> {
        if obj == 0 || dest == 0 {
            warn!("insert_obj {} into {} ignored", obj, dest);
            return Ok(());
        }
        if self.is_ancestor_or_self(obj, dest)? {
            warn!("insert_obj {} into {} would form a cycle, ignored", obj, dest);
            return Ok(());
        }
        self.remove_object(obj)?;
        let first_child = self.read_link(dest, Link::Child)?;
        self.write_link(obj, Link::Sibling, first_child)?;
        self.write_link(obj, Link::Parent, dest)?;
        self.write_link(dest, Link::Child, obj)?;
        debug!("insert_obj {} -> {}", obj, dest);
        Ok(())
    }

    fn remove_object(&mut self, obj: u16) -> ZResult<()> {
        if obj == 0 {
            warn!("remove_obj 0 ignored");
            return Ok(());
        }
        let parent = self.read_link(obj, Link::Parent)?;
        if parent == 0 {
            return Ok(());
        }
        let next = self.read_link(obj, Link::Sibling)?;
        let first = self.read_link(parent, Link::Child)?;
        if first == obj {
            self.write_link(parent, Link::Child, next)?;
        } else {
            let mut cursor = first;
            while cursor != 0 {
                let sibling = self.read_link(cursor, Link::Sibling)?;
                if sibling == obj {
                    self.write_link(cursor, Link::Sibling, next)?;
                    break;
                }
                cursor = sibling;
            }
        }
        self.write_link(obj, Link::Parent, 0)?;
        self.write_link(obj, Link::Sibling, 0)?;
        Ok(())
    }

    fn get_property(&self, obj: u16, prop: u16) -> ZResult<u16> {
        self.require_property_object(obj, prop)?;
        if prop == 0 || prop > self.profile.default_property_count {
            return Err(ZError::MissingProperty {
                object: obj,
                property: prop,
            });
        }
        match self.find_property(obj, prop)? {
            Some(entry) => match entry.len {
                1 => Ok(self.read_byte(entry.data_addr)? as u16),
                2 => self.read_word(entry.data_addr),
                len => {
                    warn!("get_prop {} on object {} has length {}", prop, obj, len);
                    self.read_word(entry.data_addr)
                }
            },
            None => {
                let defaults = self.game.header.object_table_addr as u32;
                self.read_word(defaults + (prop as u32 - 1) * 2)
            }
        }
    }

    fn put_property(&mut self, obj: u16, prop: u16, value: u16) -> ZResult<()> {
        self.require_property_object(obj, prop)?;
        let entry = self
            .find_property(obj, prop)?
            .ok_or(ZError::MissingProperty {
                object: obj,
                property: prop,
            })?;
        if entry.len == 1 {
            self.write_byte(entry.data_addr, value as u8)
        } else {
            self.write_word(entry.data_addr, value)
        }
    }

    fn get_property_addr(&self, obj: u16, prop: u16) -> ZResult<u32> {
        self.require_property_object(obj, prop)?;
        Ok(self
            .find_property(obj, prop)?
            .map_or(0, |entry| entry.data_addr))
    }

    fn get_property_len(&self, data_addr: u32) -> ZResult<u16> {
        if data_addr == 0 {
            return Ok(0);
        }
        let size_byte = self.read_byte(data_addr - 1)?;
        Ok(match self.profile.property_format {
            PropertyFormat::Short => (size_byte >> 5) as u16 + 1,
            PropertyFormat::Long => {
                if size_byte & 0x80 != 0 {
                    match size_byte & 0x3F {
                        0 => 64,
                        len => len as u16,
                    }
                } else if size_byte & 0x40 != 0 {
                    2
                } else {
                    1
                }
            }
        })
    }

    fn get_next_property(&self, obj: u16, prop: u16) -> ZResult<u16> {
        self.require_property_object(obj, prop)?;
        let next_addr = if prop == 0 {
            self.first_property_addr(obj)?
        } else {
            self.find_property(obj, prop)?
                .ok_or(ZError::MissingProperty {
                    object: obj,
                    property: prop,
                })?
                .next_addr
        };
        Ok(self.property_at(next_addr)?.map_or(0, |entry| entry.number))
    }

    fn object_name_addr(&self, obj: u16) -> ZResult<Option<u32>> {
        let table = self.property_table_addr(obj)?;
        if self.read_byte(table)? == 0 {
            Ok(None)
        } else {
            Ok(Some(table + 1))
        }
    }

    fn children_of(&self, obj: u16) -> ZResult<Vec<u16>> {
        let mut children = Vec::new();
        let mut cursor = self.get_child(obj)?;
        while cursor != 0 {
            if children.contains(&cursor) {
                warn!("sibling chain under object {} loops at {}", obj, cursor);
                break;
            }
            children.push(cursor);
            cursor = self.get_sibling(cursor)?;
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;
    use crate::test_utils::StoryBuilder;
    use crate::vm::Game;
    use test_log::test;

    fn load(story: &StoryBuilder) -> VM {
        let config = InterpreterConfig::default();
        VM::new(Game::from_memory(story.build(), &config).unwrap(), &config).unwrap()
    }

    fn world(version: u8) -> (StoryBuilder, [u16; 4]) {
        let mut story = StoryBuilder::new(version);
        let room = story.object("room", 0);
        let lamp = story.object("lamp", room);
        let sword = story.object("sword", room);
        let bottle = story.object("bottle", room);
        story.attribute(lamp, 3);
        story.attribute(lamp, 31);
        story.property(lamp, 18, &[0x12, 0x34]);
        story.property(lamp, 10, &[0x07]);
        story.property(lamp, 5, &[1, 2, 3, 4]);
        story.default_property(7, 0x0777);
        (story, [room, lamp, sword, bottle])
    }

    #[test]
    fn test_tree_links() {
        for version in [3, 5] {
            let (story, [room, lamp, sword, bottle]) = world(version);
            let vm = load(&story);
            assert_eq!(vm.get_child(room).unwrap(), lamp);
            assert_eq!(vm.get_sibling(lamp).unwrap(), sword);
            assert_eq!(vm.get_parent(bottle).unwrap(), room);
            assert_eq!(vm.children_of(room).unwrap(), vec![lamp, sword, bottle]);
        }
    }

    #[test]
    fn test_remove_middle_child() {
        let (story, [room, lamp, sword, bottle]) = world(3);
        let mut vm = load(&story);
        vm.remove_object(sword).unwrap();
        assert_eq!(vm.get_parent(sword).unwrap(), 0);
        assert_eq!(vm.get_sibling(sword).unwrap(), 0);
        assert_eq!(vm.children_of(room).unwrap(), vec![lamp, bottle]);
    }

    #[test]
    fn test_insert_moves_to_front() {
        let (story, [room, lamp, sword, bottle]) = world(5);
        let mut vm = load(&story);
        vm.insert_object(bottle, lamp).unwrap();
        assert_eq!(vm.children_of(room).unwrap(), vec![lamp, sword]);
        assert_eq!(vm.children_of(lamp).unwrap(), vec![bottle]);
        vm.insert_object(sword, lamp).unwrap();
        assert_eq!(vm.children_of(lamp).unwrap(), vec![sword, bottle]);
        assert_eq!(vm.get_parent(sword).unwrap(), lamp);
    }

    #[test]
    fn test_insert_into_descendant_refused() {
        let (story, [room, lamp, sword, bottle]) = world(3);
        let mut vm = load(&story);
        vm.insert_object(bottle, lamp).unwrap();
        // room > lamp > bottle: neither room nor lamp may move below bottle
        vm.insert_object(room, bottle).unwrap();
        vm.insert_object(lamp, bottle).unwrap();
        vm.insert_object(lamp, lamp).unwrap();
        assert_eq!(vm.get_parent(room).unwrap(), 0);
        assert_eq!(vm.get_parent(lamp).unwrap(), room);
        assert_eq!(vm.children_of(room).unwrap(), vec![lamp, sword]);
        assert_eq!(vm.children_of(bottle).unwrap(), Vec::<u16>::new());

        // Moving a descendant upward is still fine
        vm.insert_object(bottle, room).unwrap();
        assert_eq!(vm.children_of(room).unwrap(), vec![bottle, lamp, sword]);
    }

    #[test]
    fn test_attributes() {
        let (story, [_, lamp, sword, _]) = world(3);
        let mut vm = load(&story);
        assert!(vm.test_attribute(lamp, 3).unwrap());
        assert!(vm.test_attribute(lamp, 31).unwrap());
        assert!(!vm.test_attribute(sword, 3).unwrap());
        vm.set_attribute(sword, 0).unwrap();
        assert!(vm.test_attribute(sword, 0).unwrap());
        vm.clear_attribute(lamp, 31).unwrap();
        assert!(!vm.test_attribute(lamp, 31).unwrap());
        // Out of range attribute numbers read as clear
        assert!(!vm.test_attribute(lamp, 40).unwrap());
    }

    #[test]
    fn test_object_zero_sentinels() {
        let (story, _) = world(5);
        let mut vm = load(&story);
        assert_eq!(vm.get_parent(0).unwrap(), 0);
        assert_eq!(vm.get_child(0).unwrap(), 0);
        assert!(!vm.test_attribute(0, 1).unwrap());
        vm.set_attribute(0, 1).unwrap();
        vm.remove_object(0).unwrap();
    }

    #[test]
    fn test_properties_v3() {
        let (story, [room, lamp, _, _]) = world(3);
        let mut vm = load(&story);
        assert_eq!(vm.get_property(lamp, 18).unwrap(), 0x1234);
        assert_eq!(vm.get_property(lamp, 10).unwrap(), 0x07);
        assert_eq!(vm.get_property(lamp, 7).unwrap(), 0x0777);
        assert_eq!(vm.get_property(room, 18).unwrap(), 0);

        vm.put_property(lamp, 10, 0x1FF).unwrap();
        assert_eq!(vm.get_property(lamp, 10).unwrap(), 0xFF);

        let addr = vm.get_property_addr(lamp, 5).unwrap();
        assert_eq!(vm.get_property_len(addr).unwrap(), 4);
        assert_eq!(vm.get_property_addr(lamp, 6).unwrap(), 0);
        assert_eq!(vm.get_property_len(0).unwrap(), 0);

        assert_eq!(vm.get_next_property(lamp, 0).unwrap(), 18);
        assert_eq!(vm.get_next_property(lamp, 18).unwrap(), 10);
        assert_eq!(vm.get_next_property(lamp, 5).unwrap(), 0);
    }

    #[test]
    fn test_long_property_v5() {
        let mut story = StoryBuilder::new(5);
        let obj = story.object("chest", 0);
        story.property(obj, 40, &[9; 10]);
        story.property(obj, 2, &[1, 2]);
        let vm = load(&story);
        let addr = vm.get_property_addr(obj, 40).unwrap();
        assert_eq!(vm.get_property_len(addr).unwrap(), 10);
        assert_eq!(vm.get_property(obj, 2).unwrap(), 0x0102);
        assert_eq!(vm.get_next_property(obj, 40).unwrap(), 2);
    }

    #[test]
    fn test_missing_property_errors() {
        let (story, [_, lamp, _, _]) = world(3);
        let mut vm = load(&story);
        assert_eq!(
            vm.get_property(0, 12),
            Err(ZError::MissingProperty {
                object: 0,
                property: 12
            })
        );
        assert!(matches!(
            vm.put_property(lamp, 11, 1),
            Err(ZError::MissingProperty { .. })
        ));
        assert!(matches!(
            vm.get_next_property(lamp, 11),
            Err(ZError::MissingProperty { .. })
        ));
        assert!(matches!(
            vm.get_property(lamp, 32),
            Err(ZError::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_object_name_addr() {
        let mut story = StoryBuilder::new(3);
        let named = story.object("lamp", 0);
        let unnamed = story.object("", 0);
        let vm = load(&story);
        assert!(vm.object_name_addr(named).unwrap().is_some());
        assert_eq!(vm.object_name_addr(unnamed).unwrap(), None);
    }
}
