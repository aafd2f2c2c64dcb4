use std::cmp::Ordering;
use std::fmt::{Display, Error, Formatter};

use indexmap::IndexMap;
use log::debug;

use crate::memory::MemoryImage;
use crate::text::TextCodec;

#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryEntry {
    pub text: String,
    pub addr: usize,
    /// Encoded text as stored, used for collation
    pub encoded: Vec<u8>,
    pub data_addr: usize,
    pub data_len: usize,
}

/// A word found in player input
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    /// Character offset into the original input
    pub start: usize,
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    pub addr: usize,
    pub separators: Vec<char>,
    pub entry_length: usize,
    /// Negative when the story leaves the entries unsorted
    pub entry_count: i16,
    entries: Vec<DictionaryEntry>,
    index: IndexMap<String, u16>,
    zchars: usize,
}

impl Dictionary {
    pub fn new(mem: &MemoryImage, codec: &TextCodec, addr: usize) -> Result<Dictionary, String> {
        let version = mem.version();
        let mut cur = addr;
        let n = mem.get_byte(cur)? as usize;
        cur += 1;
        let mut separators = Vec::with_capacity(n);
        for code in mem.read_bytes(cur, n)? {
            if let Some(c) = codec.zscii_to_unicode(*code as u16)? {
                separators.push(c);
            }
        }
        cur += n;
        let entry_length = mem.get_byte(cur)? as usize;
        cur += 1;
        let entry_count = mem.get_word(cur)? as i16;
        cur += 2;

        let (text_bytes, zchars) = if version < 4 { (4, 6) } else { (6, 9) };
        if entry_count != 0 && entry_length < text_bytes {
            return Err(format!(
                "Dictionary entry length {entry_length} is shorter than its {text_bytes} text bytes"
            ));
        }

        let count = entry_count.unsigned_abs() as usize;
        let mut entries = Vec::with_capacity(count);
        let mut index = IndexMap::with_capacity(count);
        for i in 0..count {
            let entry_addr = cur + i * entry_length;
            let zs = codec.decode_bounded(mem, entry_addr, text_bytes)?;
            if entry_addr > u16::MAX as usize {
                return Err(format!("Dictionary entry {i} lies beyond 0xFFFF"));
            }
            index.entry(zs.text.clone()).or_insert(entry_addr as u16);
            entries.push(DictionaryEntry {
                text: zs.text,
                addr: entry_addr,
                encoded: mem.read_bytes(entry_addr, text_bytes)?.to_vec(),
                data_addr: entry_addr + text_bytes,
                data_len: entry_length - text_bytes,
            });
        }
        debug!(
            "dictionary at 0x{:04x}: {} entries of {} bytes",
            addr,
            entries.len(),
            entry_length
        );

        Ok(Dictionary {
            addr,
            separators,
            entry_length,
            entry_count,
            entries,
            index,
            zchars,
        })
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Word length in z-characters
    pub fn word_zchars(&self) -> usize {
        self.zchars
    }

    /// Address of `word`'s entry through the text index, or 0
    pub fn lookup(&self, mem: &MemoryImage, codec: &TextCodec, word: &str) -> Result<u16, String> {
        let encoded = codec.encode(word, self.zchars)?;
        let normalized = codec.decode_bytes(mem, &encoded)?.text;
        Ok(self.index.get(&normalized).copied().unwrap_or(0))
    }

    /// Address of `word`'s entry by searching the encoded entries, or 0
    pub fn binary_search(&self, codec: &TextCodec, word: &str) -> Result<u16, String> {
        let encoded = codec.encode(word, self.zchars)?;
        let found = if self.entry_count < 0 {
            self.entries.iter().find(|e| e.encoded == encoded)
        } else {
            self.entries
                .binary_search_by(|e| e.encoded.as_slice().cmp(&encoded))
                .ok()
                .map(|i| &self.entries[i])
        };
        Ok(found.map(|e| e.addr as u16).unwrap_or(0))
    }

    /// Compare two words the way the story collates them
    pub fn collate(&self, codec: &TextCodec, a: &str, b: &str) -> Result<Ordering, String> {
        Ok(codec.encode(a, self.zchars)?.cmp(&codec.encode(b, self.zchars)?))
    }

    /// Split on whitespace; every separator is a token of its own
    pub fn tokenize(&self, input: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current: Option<Token> = None;
        for (i, c) in input.chars().enumerate() {
            if c == ' ' || c == '\t' || c == '\n' {
                tokens.extend(current.take());
            } else if self.separators.contains(&c) {
                tokens.extend(current.take());
                tokens.push(Token {
                    text: c.to_string(),
                    start: i,
                });
            } else {
                current
                    .get_or_insert_with(|| Token {
                        text: String::new(),
                        start: i,
                    })
                    .text
                    .push(c);
            }
        }
        tokens.extend(current);
        tokens
    }
}

impl Display for Dictionary {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        writeln!(
            f,
            "Number of separators: {}, word size: {}, word count: {}",
            self.separators.len(),
            self.entry_length,
            self.entry_count
        )?;
        write!(f, "separators:")?;
        for c in &self.separators {
            write!(f, " '{c}'")?;
        }
        writeln!(f)?;
        for (i, e) in self.entries.iter().enumerate() {
            writeln!(f, "[{:4}] 0x{:04x} {}", i + 1, e.addr, e.text)?;
        }
        Ok(())
    }
}
