//! Object tree, attributes and property blocks
//!
//! Layout depends on the version:
//! - v1-3: 31 default properties, 9-byte entries, 32 attributes, byte links
//! - v4+:  63 default properties, 14-byte entries, 48 attributes, word links

use std::fmt::{Display, Error, Formatter, Write};

use bitvec::prelude::*;
use log::debug;

use crate::memory::MemoryImage;
use crate::text::TextCodec;

pub const MAX_OBJECTS_V3: u16 = 255;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Link {
    Parent,
    Sibling,
    Child,
}

/// One property block inside an object's property table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyBlock {
    pub id: u8,
    pub len: usize,
    pub data_addr: usize,
    /// Address of the first size byte
    pub header_addr: usize,
}

/// Snapshot of a single object, for inspection
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub id: u16,
    pub attributes: Vec<u16>,
    pub parent: u16,
    pub sibling: u16,
    pub child: u16,
    pub properties_addr: usize,
    pub name: String,
    pub properties: Vec<PropertyBlock>,
}

impl Display for ObjectEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "{}. \"{}\"", self.id, self.name)?;
        writeln!(f, "  Attributes: {:?}", self.attributes)?;
        writeln!(
            f,
            "  Parent: {}  Sibling: {}  Child: {}",
            self.parent, self.sibling, self.child
        )?;
        write!(f, "  Properties @ 0x{:04x}:", self.properties_addr)?;
        for p in &self.properties {
            write!(f, " [{}:{}]", p.id, p.len)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ObjectTable {
    version: u8,
    defaults_addr: usize,
    entries_addr: usize,
    entry_size: usize,
    attribute_count: u16,
    max_properties: u8,
}

impl ObjectTable {
    pub fn new(mem: &MemoryImage, table_addr: usize) -> ObjectTable {
        let version = mem.version();
        let (defaults, entry_size, attribute_count) = if version < 4 {
            (31, 9, 32)
        } else {
            (63, 14, 48)
        };
        ObjectTable {
            version,
            defaults_addr: table_addr,
            entries_addr: table_addr + defaults * 2,
            entry_size,
            attribute_count,
            max_properties: defaults as u8,
        }
    }

    pub fn attribute_count(&self) -> u16 {
        self.attribute_count
    }

    fn object_addr(&self, obj: u16) -> Result<usize, String> {
        if obj == 0 {
            return Err("Reference to object 0".to_string());
        }
        if self.version < 4 && obj > MAX_OBJECTS_V3 {
            return Err(format!(
                "Invalid object number {obj} (max {MAX_OBJECTS_V3} before version 4)"
            ));
        }
        Ok(self.entries_addr + (obj as usize - 1) * self.entry_size)
    }

    fn link_offset(&self, link: Link) -> usize {
        let slot = match link {
            Link::Parent => 0,
            Link::Sibling => 1,
            Link::Child => 2,
        };
        if self.version < 4 {
            4 + slot
        } else {
            6 + slot * 2
        }
    }

    fn get_link(&self, mem: &MemoryImage, obj: u16, link: Link) -> Result<u16, String> {
        let addr = self.object_addr(obj)? + self.link_offset(link);
        if self.version < 4 {
            Ok(mem.get_byte(addr)? as u16)
        } else {
            mem.get_word(addr)
        }
    }

    fn set_link(&self, mem: &mut MemoryImage, obj: u16, link: Link, value: u16) -> Result<(), String> {
        let addr = self.object_addr(obj)? + self.link_offset(link);
        if self.version < 4 {
            if value > MAX_OBJECTS_V3 {
                return Err(format!("Object link {value} does not fit in a byte"));
            }
            mem.write_byte(addr, value as u8)
        } else {
            mem.write_word(addr, value)
        }
    }

    pub fn parent(&self, mem: &MemoryImage, obj: u16) -> Result<u16, String> {
        self.get_link(mem, obj, Link::Parent)
    }

    pub fn sibling(&self, mem: &MemoryImage, obj: u16) -> Result<u16, String> {
        self.get_link(mem, obj, Link::Sibling)
    }

    pub fn child(&self, mem: &MemoryImage, obj: u16) -> Result<u16, String> {
        self.get_link(mem, obj, Link::Child)
    }

    fn check_attribute(&self, attr: u16) -> Result<(), String> {
        if attr >= self.attribute_count {
            return Err(format!(
                "Attribute {} out of range (0..{})",
                attr, self.attribute_count
            ));
        }
        Ok(())
    }

    fn attribute_bytes(&self, mem: &MemoryImage, obj: u16) -> Result<Vec<u8>, String> {
        let addr = self.object_addr(obj)?;
        Ok(mem.read_bytes(addr, self.attribute_count as usize / 8)?.to_vec())
    }

    pub fn test_attribute(&self, mem: &MemoryImage, obj: u16, attr: u16) -> Result<bool, String> {
        self.check_attribute(attr)?;
        let bytes = self.attribute_bytes(mem, obj)?;
        Ok(bytes.view_bits::<Msb0>()[attr as usize])
    }

    pub fn set_attribute(
        &self,
        mem: &mut MemoryImage,
        obj: u16,
        attr: u16,
        on: bool,
    ) -> Result<(), String> {
        self.check_attribute(attr)?;
        let mut bytes = self.attribute_bytes(mem, obj)?;
        bytes.view_bits_mut::<Msb0>().set(attr as usize, on);
        let addr = self.object_addr(obj)?;
        mem.write_bytes(addr, &bytes)
    }

    /// All set attribute numbers, ascending
    pub fn attributes(&self, mem: &MemoryImage, obj: u16) -> Result<Vec<u16>, String> {
        let bytes = self.attribute_bytes(mem, obj)?;
        Ok(bytes
            .view_bits::<Msb0>()
            .iter_ones()
            .map(|i| i as u16)
            .collect())
    }

    pub fn properties_addr(&self, mem: &MemoryImage, obj: u16) -> Result<usize, String> {
        let offset = if self.version < 4 { 7 } else { 12 };
        Ok(mem.get_word(self.object_addr(obj)? + offset)? as usize)
    }

    pub fn short_name(&self, mem: &MemoryImage, codec: &TextCodec, obj: u16) -> Result<String, String> {
        let addr = self.properties_addr(mem, obj)?;
        if mem.get_byte(addr)? == 0 {
            return Ok(String::new());
        }
        Ok(codec.decode(mem, addr + 1)?.text)
    }

    fn read_block(&self, mem: &MemoryImage, addr: usize) -> Result<Option<PropertyBlock>, String> {
        let b = mem.get_byte(addr)?;
        if b == 0 {
            return Ok(None);
        }
        let block = if self.version < 4 {
            PropertyBlock {
                id: b & 0x1F,
                len: (b >> 5) as usize + 1,
                data_addr: addr + 1,
                header_addr: addr,
            }
        } else if b & 0x80 != 0 {
            let len = match mem.get_byte(addr + 1)? & 0x3F {
                0 => 64,
                n => n as usize,
            };
            PropertyBlock {
                id: b & 0x3F,
                len,
                data_addr: addr + 2,
                header_addr: addr,
            }
        } else {
            PropertyBlock {
                id: b & 0x3F,
                len: if b & 0x40 != 0 { 2 } else { 1 },
                data_addr: addr + 1,
                header_addr: addr,
            }
        };
        Ok(Some(block))
    }

    /// Every property block of `obj`, in table order (descending id)
    pub fn properties(&self, mem: &MemoryImage, obj: u16) -> Result<Vec<PropertyBlock>, String> {
        let table = self.properties_addr(mem, obj)?;
        let name_words = mem.get_byte(table)? as usize;
        let mut addr = table + 1 + name_words * 2;
        let mut blocks = Vec::new();
        while let Some(block) = self.read_block(mem, addr)? {
            if blocks.len() >= self.max_properties as usize + 1 {
                return Err(format!("Runaway property table for object {obj}"));
            }
            addr = block.data_addr + block.len;
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn find_property(&self, mem: &MemoryImage, obj: u16, prop: u16) -> Result<Option<PropertyBlock>, String> {
        Ok(self
            .properties(mem, obj)?
            .into_iter()
            .find(|b| b.id as u16 == prop))
    }

    fn check_property(&self, prop: u16) -> Result<(), String> {
        if prop == 0 || prop > self.max_properties as u16 {
            return Err(format!(
                "Property {} out of range (1..={})",
                prop, self.max_properties
            ));
        }
        Ok(())
    }

    pub fn default_property(&self, mem: &MemoryImage, prop: u16) -> Result<u16, String> {
        self.check_property(prop)?;
        mem.get_word(self.defaults_addr + (prop as usize - 1) * 2)
    }

    /// Property value, falling back to the defaults table
    pub fn get_property(&self, mem: &MemoryImage, obj: u16, prop: u16) -> Result<u16, String> {
        self.check_property(prop)?;
        match self.find_property(mem, obj, prop)? {
            Some(b) if b.len == 1 => Ok(mem.get_byte(b.data_addr)? as u16),
            Some(b) if b.len == 2 => mem.get_word(b.data_addr),
            Some(b) => Err(format!(
                "Property {} of object {} has length {}, too long to read",
                prop, obj, b.len
            )),
            None => {
                debug!("object {} has no property {}, using default", obj, prop);
                self.default_property(mem, prop)
            }
        }
    }

    pub fn put_property(&self, mem: &mut MemoryImage, obj: u16, prop: u16, value: u16) -> Result<(), String> {
        match self.find_property(mem, obj, prop)? {
            Some(b) if b.len == 1 => mem.write_byte(b.data_addr, value as u8),
            Some(b) if b.len == 2 => mem.write_word(b.data_addr, value),
            Some(b) => Err(format!(
                "Property {} of object {} has length {}, too long to write",
                prop, obj, b.len
            )),
            None => Err(format!("Object {obj} has no property {prop}")),
        }
    }

    /// Data address of the property, or 0 when absent
    pub fn property_address(&self, mem: &MemoryImage, obj: u16, prop: u16) -> Result<u16, String> {
        Ok(self
            .find_property(mem, obj, prop)?
            .map(|b| b.data_addr as u16)
            .unwrap_or(0))
    }

    /// Length of the property whose data starts at `data_addr`
    pub fn property_length(&self, mem: &MemoryImage, data_addr: usize) -> Result<u16, String> {
        if data_addr == 0 {
            return Ok(0);
        }
        let b = mem.get_byte(data_addr - 1)?;
        let len = if self.version < 4 {
            (b >> 5) + 1
        } else if b & 0x80 != 0 {
            match b & 0x3F {
                0 => 64,
                n => n,
            }
        } else if b & 0x40 != 0 {
            2
        } else {
            1
        };
        Ok(len as u16)
    }

    /// Id of the property after `prop`; `prop` 0 asks for the first
    pub fn next_property(&self, mem: &MemoryImage, obj: u16, prop: u16) -> Result<u16, String> {
        let blocks = self.properties(mem, obj)?;
        if prop == 0 {
            return Ok(blocks.first().map(|b| b.id as u16).unwrap_or(0));
        }
        match blocks.iter().position(|b| b.id as u16 == prop) {
            Some(i) => Ok(blocks.get(i + 1).map(|b| b.id as u16).unwrap_or(0)),
            None => Err(format!("get_next_prop: object {obj} has no property {prop}")),
        }
    }

    /// Detach `obj` from its parent, splicing the sibling chain
    pub fn remove(&self, mem: &mut MemoryImage, obj: u16) -> Result<(), String> {
        let parent = self.parent(mem, obj)?;
        if parent == 0 {
            return Ok(());
        }
        let next = self.sibling(mem, obj)?;
        let first = self.child(mem, parent)?;
        if first == obj {
            self.set_link(mem, parent, Link::Child, next)?;
        } else {
            let mut cur = first;
            let mut guard = 0;
            loop {
                if cur == 0 {
                    return Err(format!(
                        "Object {obj} is not in the child list of its parent {parent}"
                    ));
                }
                let sib = self.sibling(mem, cur)?;
                if sib == obj {
                    self.set_link(mem, cur, Link::Sibling, next)?;
                    break;
                }
                cur = sib;
                guard += 1;
                if guard > 0xFFFF {
                    return Err(format!("Sibling chain under {parent} loops"));
                }
            }
        }
        self.set_link(mem, obj, Link::Parent, 0)?;
        self.set_link(mem, obj, Link::Sibling, 0)
    }

    /// Make `obj` the first child of `dest`; its own children travel with it
    pub fn insert(&self, mem: &mut MemoryImage, obj: u16, dest: u16) -> Result<(), String> {
        if obj == dest {
            return Err(format!("Cannot insert object {obj} into itself"));
        }
        self.remove(mem, obj)?;
        let first = self.child(mem, dest)?;
        self.set_link(mem, obj, Link::Sibling, first)?;
        self.set_link(mem, obj, Link::Parent, dest)?;
        self.set_link(mem, dest, Link::Child, obj)
    }

    pub fn entry(&self, mem: &MemoryImage, codec: &TextCodec, obj: u16) -> Result<ObjectEntry, String> {
        Ok(ObjectEntry {
            id: obj,
            attributes: self.attributes(mem, obj)?,
            parent: self.parent(mem, obj)?,
            sibling: self.sibling(mem, obj)?,
            child: self.child(mem, obj)?,
            properties_addr: self.properties_addr(mem, obj)?,
            name: self.short_name(mem, codec, obj)?,
            properties: self.properties(mem, obj)?,
        })
    }

    /// Objects end where the first property table begins
    pub fn object_count(&self, mem: &MemoryImage) -> u16 {
        let max = if self.version < 4 { MAX_OBJECTS_V3 } else { u16::MAX };
        let mut lowest = usize::MAX;
        let mut count = 0;
        for obj in 1..=max {
            let addr = match self.object_addr(obj) {
                Ok(a) => a,
                Err(_) => break,
            };
            if addr + self.entry_size > lowest || addr + self.entry_size > mem.len() {
                break;
            }
            match self.properties_addr(mem, obj) {
                Ok(p) if p > addr => lowest = lowest.min(p),
                _ => break,
            }
            count = obj;
        }
        count
    }

    /// Indented rendering of every root and its descendants
    pub fn tree(&self, mem: &MemoryImage, codec: &TextCodec) -> Result<String, String> {
        let mut out = String::new();
        for obj in 1..=self.object_count(mem) {
            if self.parent(mem, obj)? == 0 {
                self.render_subtree(mem, codec, obj, 0, &mut out)?;
            }
        }
        Ok(out)
    }

    fn render_subtree(
        &self,
        mem: &MemoryImage,
        codec: &TextCodec,
        obj: u16,
        depth: usize,
        out: &mut String,
    ) -> Result<(), String> {
        if depth > 64 {
            return Err(format!("Object tree too deep at {obj}"));
        }
        let name = self.short_name(mem, codec, obj)?;
        writeln!(out, "{}{} ({})", "  ".repeat(depth), name, obj)
            .map_err(|e| format!("Cannot render object {obj}: {e}"))?;
        let mut child = self.child(mem, obj)?;
        while child != 0 {
            self.render_subtree(mem, codec, child, depth + 1, out)?;
            child = self.sibling(mem, child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const TABLE: usize = 0x100;
    const ENTRIES: usize = TABLE + 62;

    fn word(a: u8, b: u8, c: u8) -> u16 {
        ((a as u16) << 10) | ((b as u16) << 5) | c as u16
    }

    fn set_entry(bytes: &mut [u8], obj: usize, parent: u8, sibling: u8, child: u8, props: u16) {
        let base = ENTRIES + (obj - 1) * 9;
        bytes[base + 4] = parent;
        bytes[base + 5] = sibling;
        bytes[base + 6] = child;
        bytes[base + 7..base + 9].copy_from_slice(&props.to_be_bytes());
    }

    // room (1) holds box (2) and lamp (3); box holds coin (4)
    fn v3_world() -> (MemoryImage, ObjectTable, TextCodec) {
        let mut bytes = vec![0u8; 0x800];
        bytes[0] = 3;
        bytes[0x0E] = 0x04;
        bytes[0x0A] = 0x01;
        // default for property 7 is 0x0777
        bytes[TABLE + 12] = 0x07;
        bytes[TABLE + 13] = 0x77;

        set_entry(&mut bytes, 1, 0, 0, 2, 0x200);
        set_entry(&mut bytes, 2, 1, 3, 4, 0x220);
        set_entry(&mut bytes, 3, 1, 0, 0, 0x240);
        set_entry(&mut bytes, 4, 2, 0, 0, 0x260);

        // "box": name, prop 5 (len 2), prop 3 (len 1), prop 2 (len 4)
        let p = 0x220;
        bytes[p] = 1;
        bytes[p + 1..p + 3].copy_from_slice(&(0x8000 | word(7, 20, 29)).to_be_bytes());
        bytes[p + 3..p + 6].copy_from_slice(&[0x25, 0x12, 0x34]);
        bytes[p + 6..p + 8].copy_from_slice(&[0x03, 0x56]);
        bytes[p + 8..p + 13].copy_from_slice(&[0x62, 1, 2, 3, 4]);
        bytes[p + 13] = 0;

        // the others have no name and no properties
        for p in [0x200, 0x240, 0x260] {
            bytes[p] = 0;
            bytes[p + 1] = 0;
        }

        let mem = MemoryImage::new(bytes).unwrap();
        let table = ObjectTable::new(&mem, TABLE);
        let codec = TextCodec::new(&mem).unwrap();
        (mem, table, codec)
    }

    fn children(table: &ObjectTable, mem: &MemoryImage, obj: u16) -> Vec<u16> {
        let mut out = vec![];
        let mut c = table.child(mem, obj).unwrap();
        while c != 0 {
            out.push(c);
            c = table.sibling(mem, c).unwrap();
        }
        out
    }

    #[test]
    fn test_relations() {
        let (mem, table, _) = v3_world();
        assert_eq!(table.parent(&mem, 2).unwrap(), 1);
        assert_eq!(table.sibling(&mem, 2).unwrap(), 3);
        assert_eq!(table.child(&mem, 2).unwrap(), 4);
        assert_eq!(children(&table, &mem, 1), vec![2, 3]);
        assert!(table.parent(&mem, 0).is_err());
        assert!(table.parent(&mem, 256).is_err());
    }

    #[test]
    fn test_attributes_set_and_clear() {
        let (mut mem, table, _) = v3_world();
        let before = mem.dynamic().to_vec();
        for attr in 0..32 {
            assert!(!table.test_attribute(&mem, 2, attr).unwrap());
            table.set_attribute(&mut mem, 2, attr, true).unwrap();
            assert!(table.test_attribute(&mem, 2, attr).unwrap());
            table.set_attribute(&mut mem, 2, attr, false).unwrap();
        }
        assert_eq!(mem.dynamic(), &before[..]);
        assert!(table.test_attribute(&mem, 2, 32).is_err());
        assert!(table.set_attribute(&mut mem, 2, 32, true).is_err());
    }

    #[test]
    fn test_attribute_bit_order() {
        let (mut mem, table, _) = v3_world();
        table.set_attribute(&mut mem, 1, 0, true).unwrap();
        table.set_attribute(&mut mem, 1, 9, true).unwrap();
        assert_eq!(mem.get_byte(ENTRIES).unwrap(), 0x80);
        assert_eq!(mem.get_byte(ENTRIES + 1).unwrap(), 0x40);
        assert_eq!(table.attributes(&mem, 1).unwrap(), vec![0, 9]);
    }

    #[test]
    fn test_properties() {
        let (mem, table, codec) = v3_world();
        assert_eq!(table.short_name(&mem, &codec, 2).unwrap(), "box");
        assert_eq!(table.get_property(&mem, 2, 5).unwrap(), 0x1234);
        assert_eq!(table.get_property(&mem, 2, 3).unwrap(), 0x56);
        assert_eq!(table.get_property(&mem, 2, 7).unwrap(), 0x0777);
        assert!(table.get_property(&mem, 2, 2).is_err());
        assert!(table.get_property(&mem, 2, 0).is_err());

        let addr = table.property_address(&mem, 2, 2).unwrap();
        assert_eq!(addr, 0x220 + 9);
        assert_eq!(table.property_length(&mem, addr as usize).unwrap(), 4);
        assert_eq!(table.property_length(&mem, 0).unwrap(), 0);
        assert_eq!(table.property_address(&mem, 2, 9).unwrap(), 0);
    }

    #[test]
    fn test_next_property() {
        let (mem, table, _) = v3_world();
        assert_eq!(table.next_property(&mem, 2, 0).unwrap(), 5);
        assert_eq!(table.next_property(&mem, 2, 5).unwrap(), 3);
        assert_eq!(table.next_property(&mem, 2, 3).unwrap(), 2);
        assert_eq!(table.next_property(&mem, 2, 2).unwrap(), 0);
        assert!(table.next_property(&mem, 2, 4).is_err());
        assert_eq!(table.next_property(&mem, 3, 0).unwrap(), 0);
    }

    #[test]
    fn test_put_property() {
        let (mut mem, table, _) = v3_world();
        table.put_property(&mut mem, 2, 5, 0xBEEF).unwrap();
        table.put_property(&mut mem, 2, 3, 0x1FF).unwrap();
        assert_eq!(table.get_property(&mem, 2, 5).unwrap(), 0xBEEF);
        assert_eq!(table.get_property(&mem, 2, 3).unwrap(), 0xFF);
        assert!(table.put_property(&mut mem, 2, 7, 1).is_err());
        assert!(table.put_property(&mut mem, 2, 2, 1).is_err());
    }

    #[test]
    fn test_remove_head_and_middle() {
        let (mut mem, table, _) = v3_world();
        table.remove(&mut mem, 2).unwrap();
        assert_eq!(children(&table, &mem, 1), vec![3]);
        assert_eq!(table.parent(&mem, 2).unwrap(), 0);
        assert_eq!(table.sibling(&mem, 2).unwrap(), 0);
        // coin stays inside the box
        assert_eq!(table.child(&mem, 2).unwrap(), 4);

        let (mut mem, table, _) = v3_world();
        table.remove(&mut mem, 3).unwrap();
        assert_eq!(children(&table, &mem, 1), vec![2]);
        assert_eq!(table.parent(&mem, 3).unwrap(), 0);
    }

    #[test]
    fn test_insert_keeps_chain() {
        let (mut mem, table, _) = v3_world();
        table.insert(&mut mem, 4, 1).unwrap();
        assert_eq!(children(&table, &mem, 1), vec![4, 2, 3]);
        assert_eq!(children(&table, &mem, 2), Vec::<u16>::new());
        assert_eq!(table.parent(&mem, 4).unwrap(), 1);

        table.insert(&mut mem, 2, 3).unwrap();
        assert_eq!(children(&table, &mem, 1), vec![4, 3]);
        assert_eq!(children(&table, &mem, 3), vec![2]);
        assert!(table.insert(&mut mem, 3, 3).is_err());
    }

    #[test]
    fn test_entry_and_tree() {
        let (mem, table, codec) = v3_world();
        assert_eq!(table.object_count(&mem), 4);
        let entry = table.entry(&mem, &codec, 2).unwrap();
        assert_eq!(entry.name, "box");
        assert_eq!(entry.properties.len(), 3);
        let tree = table.tree(&mem, &codec).unwrap();
        assert_eq!(tree, " (1)\n  box (2)\n     (4)\n   (3)\n");
    }

    #[test]
    fn test_v4_property_sizes() {
        let mut bytes = vec![0u8; 0x800];
        bytes[0] = 5;
        bytes[0x0E] = 0x04;
        bytes[0x0A] = 0x01;
        let entries = TABLE + 126;
        bytes[entries + 12..entries + 14].copy_from_slice(&0x200u16.to_be_bytes());
        // prop 40 with an explicit 0-means-64 size, prop 20 of 2, prop 10 of 1
        let mut p = 0x200;
        bytes[p] = 0;
        p += 1;
        bytes[p] = 0x80 | 40;
        bytes[p + 1] = 0x80;
        p += 2 + 64;
        bytes[p] = 0x40 | 20;
        bytes[p + 1] = 0xAB;
        bytes[p + 2] = 0xCD;
        p += 3;
        bytes[p] = 10;
        bytes[p + 1] = 0x42;
        let mem = MemoryImage::new(bytes).unwrap();
        let table = ObjectTable::new(&mem, TABLE);

        let blocks = table.properties(&mem, 1).unwrap();
        let sizes: Vec<(u8, usize)> = blocks.iter().map(|b| (b.id, b.len)).collect();
        assert_eq!(sizes, vec![(40, 64), (20, 2), (10, 1)]);
        assert_eq!(table.get_property(&mem, 1, 20).unwrap(), 0xABCD);
        assert_eq!(table.get_property(&mem, 1, 10).unwrap(), 0x42);
        let addr = table.property_address(&mem, 1, 40).unwrap() as usize;
        assert_eq!(table.property_length(&mem, addr).unwrap(), 64);
        assert_eq!(table.attribute_count(), 48);
        assert!(table.test_attribute(&mem, 1, 47).is_ok());
        assert!(table.test_attribute(&mem, 1, 48).is_err());
    }
}
