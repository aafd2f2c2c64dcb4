// Story images assembled in memory for unit tests
use crate::builder::MachineBuilder;
use crate::host::RecordingHost;
use crate::interpreter::Interpreter;

pub const OBJECTS: usize = 0x100;
pub const DICTIONARY: usize = 0x300;
pub const GLOBALS: usize = 0x400;
pub const TEXT_BUFFER: usize = 0x600;
pub const PARSE_BUFFER: usize = 0x660;
pub const STATIC: usize = 0x700;
pub const CODE: usize = 0x800;

/// Encode lowercase letters and spaces as dictionary-width z-characters
pub fn encode_word(word: &str, version: u8) -> Vec<u8> {
    let len = if version <= 3 { 6 } else { 9 };
    encode(word, len)
}

/// Encode lowercase letters and spaces with no fixed width
pub fn encode_text(text: &str) -> Vec<u8> {
    let len = (text.len() + 2) / 3 * 3;
    encode(text, len.max(3))
}

fn encode(text: &str, len: usize) -> Vec<u8> {
    let mut zchars: Vec<u16> = text
        .bytes()
        .map(|b| if b == b' ' { 0 } else { (b - b'a' + 6) as u16 })
        .take(len)
        .collect();
    zchars.resize(len, 5);
    let words = len / 3;
    let mut out = Vec::new();
    for (i, c) in zchars.chunks(3).enumerate() {
        let mut word = (c[0] << 10) | (c[1] << 5) | c[2];
        if i + 1 == words {
            word |= 0x8000;
        }
        out.extend_from_slice(&word.to_be_bytes());
    }
    out
}

pub struct TestObject {
    pub parent: u16,
    pub sibling: u16,
    pub child: u16,
    pub attributes: Vec<u16>,
    pub name: String,
    pub properties: Vec<(u8, Vec<u8>)>,
}

pub struct TestStory {
    pub version: u8,
    bytes: Vec<u8>,
    objects: Vec<TestObject>,
    words: Vec<String>,
}

impl TestStory {
    pub fn new(version: u8) -> Self {
        let mut bytes = vec![0u8; 0x1000];
        bytes[0x00] = version;
        bytes[0x04..0x06].copy_from_slice(&(CODE as u16).to_be_bytes());
        bytes[0x06..0x08].copy_from_slice(&(CODE as u16).to_be_bytes());
        bytes[0x08..0x0A].copy_from_slice(&(DICTIONARY as u16).to_be_bytes());
        bytes[0x0A..0x0C].copy_from_slice(&(OBJECTS as u16).to_be_bytes());
        bytes[0x0C..0x0E].copy_from_slice(&(GLOBALS as u16).to_be_bytes());
        bytes[0x0E..0x10].copy_from_slice(&(STATIC as u16).to_be_bytes());
        // text buffer holds 40 characters, parse buffer 8 words
        bytes[TEXT_BUFFER] = 40;
        bytes[PARSE_BUFFER] = 8;
        TestStory {
            version,
            bytes,
            objects: Vec::new(),
            words: Vec::new(),
        }
    }

    pub fn code(self, code: &[u8]) -> Self {
        self.bytes_at(CODE, code)
    }

    pub fn bytes_at(mut self, addr: usize, data: &[u8]) -> Self {
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
        self
    }

    pub fn global(self, var: u8, value: u16) -> Self {
        let addr = GLOBALS + (var as usize - 0x10) * 2;
        self.bytes_at(addr, &value.to_be_bytes())
    }

    /// A routine header and body; local defaults are dropped from version 5
    pub fn routine(self, addr: usize, locals: &[u16], body: &[u8]) -> Self {
        let mut data = vec![locals.len() as u8];
        if self.version < 5 {
            for l in locals {
                data.extend_from_slice(&l.to_be_bytes());
            }
        }
        data.extend_from_slice(body);
        self.bytes_at(addr, &data)
    }

    pub fn object(
        mut self,
        (parent, sibling, child): (u16, u16, u16),
        attributes: &[u16],
        name: &str,
        properties: &[(u8, &[u8])],
    ) -> Self {
        self.objects.push(TestObject {
            parent,
            sibling,
            child,
            attributes: attributes.to_vec(),
            name: name.to_string(),
            properties: properties
                .iter()
                .map(|(id, data)| (*id, data.to_vec()))
                .collect(),
        });
        self
    }

    pub fn words(mut self, words: &[&str]) -> Self {
        self.words = words.iter().map(|w| w.to_string()).collect();
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.write_objects();
        self.write_dictionary();
        self.bytes
    }

    pub fn machine(self) -> (Interpreter, RecordingHost) {
        let host = RecordingHost::new();
        let interp = MachineBuilder::new(self.build())
            .source_name("test.z")
            .recording(&host)
            .build()
            .unwrap();
        (interp, host)
    }

    fn write_objects(&mut self) {
        let v3 = self.version <= 3;
        let (defaults, entry_size) = if v3 { (31, 9) } else { (63, 14) };
        let entries = OBJECTS + defaults * 2;
        let mut props = entries + entry_size * self.objects.len();

        for (i, obj) in self.objects.iter().enumerate() {
            let entry = entries + i * entry_size;
            for &attr in &obj.attributes {
                let byte = entry + attr as usize / 8;
                self.bytes[byte] |= 0x80 >> (attr % 8);
            }
            if v3 {
                self.bytes[entry + 4] = obj.parent as u8;
                self.bytes[entry + 5] = obj.sibling as u8;
                self.bytes[entry + 6] = obj.child as u8;
                self.bytes[entry + 7..entry + 9].copy_from_slice(&(props as u16).to_be_bytes());
            } else {
                for (k, link) in [obj.parent, obj.sibling, obj.child].iter().enumerate() {
                    let at = entry + 6 + k * 2;
                    self.bytes[at..at + 2].copy_from_slice(&link.to_be_bytes());
                }
                self.bytes[entry + 12..entry + 14]
                    .copy_from_slice(&(props as u16).to_be_bytes());
            }

            let name = if obj.name.is_empty() {
                Vec::new()
            } else {
                encode_text(&obj.name)
            };
            self.bytes[props] = (name.len() / 2) as u8;
            self.bytes[props + 1..props + 1 + name.len()].copy_from_slice(&name);
            props += 1 + name.len();

            let mut sorted = obj.properties.clone();
            sorted.sort_by(|a, b| b.0.cmp(&a.0));
            for (id, data) in sorted {
                if v3 {
                    self.bytes[props] = ((data.len() as u8 - 1) << 5) | id;
                    props += 1;
                } else if data.len() <= 2 {
                    self.bytes[props] = if data.len() == 2 { 0x40 | id } else { id };
                    props += 1;
                } else {
                    self.bytes[props] = 0x80 | id;
                    self.bytes[props + 1] = 0x80 | data.len() as u8;
                    props += 2;
                }
                self.bytes[props..props + data.len()].copy_from_slice(&data);
                props += data.len();
            }
            self.bytes[props] = 0;
            props += 1;
        }
        assert!(props <= DICTIONARY, "object table overflows");
    }

    fn write_dictionary(&mut self) {
        let text_len = if self.version <= 3 { 4 } else { 6 };
        let entry_len = text_len + 3;
        let mut encoded: Vec<Vec<u8>> = self
            .words
            .iter()
            .map(|w| encode_word(w, self.version))
            .collect();
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
        assert!(d + 6 + encoded.len() * entry_len <= GLOBALS, "dictionary overflows");
    }
}

/// Address of dictionary entry `i` in a story built by `TestStory`
pub fn dictionary_entry(version: u8, i: usize) -> u16 {
    let entry_len = if version <= 3 { 7 } else { 9 };
    (DICTIONARY + 6 + i * entry_len) as u16
}
