// Story images for integration tests, built through the public API only
#![allow(dead_code)]

use zvm::host::RecordingHost;
use zvm::{Interpreter, MachineBuilder};

pub const OBJECTS: usize = 0x100;
pub const DICTIONARY: usize = 0x300;
pub const GLOBALS: usize = 0x400;
pub const TEXT_BUFFER: usize = 0x600;
pub const PARSE_BUFFER: usize = 0x660;
pub const STATIC: usize = 0x700;
pub const CODE: usize = 0x800;

/// Pack lowercase letters and spaces into z-characters, padded with 5s
pub fn encode(text: &str, zchars: usize) -> Vec<u8> {
    let mut codes: Vec<u16> = text
        .bytes()
        .map(|b| if b == b' ' { 0 } else { (b - b'a' + 6) as u16 })
        .take(zchars)
        .collect();
    codes.resize(zchars, 5);
    let words = zchars / 3;
    let mut out = Vec::new();
    for (i, c) in codes.chunks(3).enumerate() {
        let mut word = (c[0] << 10) | (c[1] << 5) | c[2];
        if i + 1 == words {
            word |= 0x8000;
        }
        out.extend_from_slice(&word.to_be_bytes());
    }
    out
}

/// Inline text for `print`
pub fn text(s: &str) -> Vec<u8> {
    encode(s, ((s.len() + 2) / 3 * 3).max(3))
}

pub struct Story {
    version: u8,
    bytes: Vec<u8>,
    words: Vec<&'static str>,
}

impl Story {
    pub fn new(version: u8) -> Self {
        let mut bytes = vec![0u8; 0x1000];
        bytes[0x00] = version;
        for (field, value) in [
            (0x04, CODE),
            (0x06, CODE),
            (0x08, DICTIONARY),
            (0x0A, OBJECTS),
            (0x0C, GLOBALS),
            (0x0E, STATIC),
        ] {
            bytes[field..field + 2].copy_from_slice(&(value as u16).to_be_bytes());
        }
        bytes[TEXT_BUFFER] = 40;
        bytes[PARSE_BUFFER] = 8;
        Story {
            version,
            bytes,
            words: Vec::new(),
        }
    }

    pub fn at(mut self, addr: usize, data: &[u8]) -> Self {
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
        self
    }

    pub fn code(self, code: &[u8]) -> Self {
        self.at(CODE, code)
    }

    pub fn global(self, var: u8, value: u16) -> Self {
        self.at(GLOBALS + (var as usize - 0x10) * 2, &value.to_be_bytes())
    }

    pub fn routine(self, addr: usize, locals: &[u16], body: &[u8]) -> Self {
        let mut data = vec![locals.len() as u8];
        if self.version < 5 {
            for l in locals {
                data.extend_from_slice(&l.to_be_bytes());
            }
        }
        data.extend_from_slice(body);
        self.at(addr, &data)
    }

    pub fn words(mut self, words: &[&'static str]) -> Self {
        self.words = words.to_vec();
        self
    }

    /// Version 3 object entries after an empty defaults table; each object
    /// gets an empty property list with the given short name
    pub fn v3_objects(mut self, objects: &[(u8, u8, u8, &str)]) -> Self {
        let entries = OBJECTS + 31 * 2;
        let mut props = entries + 9 * objects.len();
        for (i, (parent, sibling, child, name)) in objects.iter().enumerate() {
            let entry = entries + i * 9;
            self.bytes[entry + 4] = *parent;
            self.bytes[entry + 5] = *sibling;
            self.bytes[entry + 6] = *child;
            self.bytes[entry + 7..entry + 9].copy_from_slice(&(props as u16).to_be_bytes());
            let name = if name.is_empty() { Vec::new() } else { text(name) };
            self.bytes[props] = (name.len() / 2) as u8;
            self.bytes[props + 1..props + 1 + name.len()].copy_from_slice(&name);
            props += 2 + name.len();
        }
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let zchars = if self.version <= 3 { 6 } else { 9 };
        let text_len = zchars / 3 * 2;
        let entry_len = text_len + 3;
        let mut encoded: Vec<Vec<u8>> = self.words.iter().map(|w| encode(w, zchars)).collect();
        encoded.sort();
        let d = DICTIONARY;
        self.bytes[d] = 2;
        self.bytes[d + 1] = b'.';
        self.bytes[d + 2] = b',';
        self.bytes[d + 3] = entry_len as u8;
        self.bytes[d + 4..d + 6].copy_from_slice(&(encoded.len() as u16).to_be_bytes());
        for (i, e) in encoded.iter().enumerate() {
            let at = d + 6 + i * entry_len;
            self.bytes[at..at + text_len].copy_from_slice(e);
        }
        self.bytes
    }

    pub fn machine(self, source_name: &str, host: &RecordingHost) -> Interpreter {
        MachineBuilder::new(self.build())
            .source_name(source_name)
            .recording(host)
            .build()
            .expect("story should load")
    }
}

/// Address of entry `i` in the dictionary `Story::build` writes
pub fn dictionary_entry(version: u8, i: usize) -> u16 {
    let entry_len = if version <= 3 { 7 } else { 9 };
    (DICTIONARY + 6 + i * entry_len) as u16
}
