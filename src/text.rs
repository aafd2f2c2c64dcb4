//! Z-string compression and ZSCII translation
//!
//! Strings are packed three 5-bit z-characters to a word, with the top bit
//! of the final word marking the end. Decoding walks the z-characters with
//! a small state machine for alphabet shifts, abbreviations and the 10-bit
//! ZSCII escape.

use std::collections::HashMap;

use bitreader::{BitReader, BitReaderError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::memory::MemoryImage;

/// The three alphabet rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Alphabet {
    #[default]
    A0,
    A1,
    A2,
}

impl Alphabet {
    fn index(self) -> u8 {
        match self {
            Alphabet::A0 => 0,
            Alphabet::A1 => 1,
            Alphabet::A2 => 2,
        }
    }

    fn from_index(i: u8) -> Alphabet {
        match i % 3 {
            0 => Alphabet::A0,
            1 => Alphabet::A1,
            _ => Alphabet::A2,
        }
    }

    /// Move `by` rows forward, wrapping
    fn rotate(self, by: u8) -> Alphabet {
        Alphabet::from_index(self.index() + by)
    }
}

lazy_static! {
    // entries start at z-character 6; the first A2 slot is the escape
    pub static ref ALPHABETMAP: HashMap<Alphabet, &'static str> = {
        let mut m = HashMap::new();
        m.insert(Alphabet::A0, "abcdefghijklmnopqrstuvwxyz");
        m.insert(Alphabet::A1, "ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        m.insert(Alphabet::A2, " \n0123456789.,!?_#'\"/\\-:()");
        m
    };

    static ref DEFAULT_UNICODE: Vec<char> = [
        0xe4u32, 0xf6, 0xfc, 0xc4, 0xd6, 0xdc, 0xdf, 0xbb, 0xab, 0xeb, 0xef, 0xff, 0xcb, 0xcf,
        0xe1, 0xe9, 0xed, 0xf3, 0xfa, 0xfd, 0xc1, 0xc9, 0xcd, 0xd3, 0xda, 0xdd, 0xe0, 0xe8,
        0xec, 0xf2, 0xf9, 0xc0, 0xc8, 0xcc, 0xd2, 0xd9, 0xe2, 0xea, 0xee, 0xf4, 0xfb, 0xc2,
        0xca, 0xce, 0xd4, 0xdb, 0xe5, 0xc5, 0xf8, 0xd8, 0xe3, 0xf1, 0xf5, 0xc3, 0xd1, 0xd5,
        0xe6, 0xc6, 0xe7, 0xc7, 0xfe, 0xf0, 0xde, 0xd0, 0xa3, 0x153, 0x152, 0xa1, 0xbf,
    ]
    .iter()
    .filter_map(|c| char::from_u32(*c))
    .collect();

    static ref UNICODE_TO_ZSCII: HashMap<char, u8> = DEFAULT_UNICODE
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, FIRST_EXTRA_ZSCII + i as u8))
        .collect();
}

const A2_V1: &str = " 0123456789.,!?_#'\"/\\<-:()";

const FIRST_EXTRA_ZSCII: u8 = 155;
const LAST_EXTRA_ZSCII: u8 = 223;

/// Padding z-character used to fill the tail of an encoded word
const PAD_ZCHAR: u8 = 5;

/// Result of decoding a z-string
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZString {
    pub text: String,
    /// Bytes of story memory consumed
    pub length: usize,
    /// ZSCII codes of each produced character
    pub zscii: Vec<u16>,
}

#[derive(Debug, Clone, Copy)]
struct PackedChars {
    last: bool,
    chars: [u8; 3],
}

fn read_zchars_from_word(word: &[u8; 2]) -> Result<PackedChars, BitReaderError> {
    let mut br = BitReader::new(word);

    // top bit marks the final word
    let mut pc = PackedChars {
        last: br.read_u8(1)? == 1,
        chars: [0, 0, 0],
    };

    for i in 0..3 {
        pc.chars[i] = br.read_u8(5)?;
    }

    Ok(pc)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecodeState {
    Normal,
    Abbreviation(u8),
    EscapeHigh,
    EscapeLow(u8),
}

/// Text codec bound to one story's version and tables
#[derive(Debug, Clone)]
pub struct TextCodec {
    version: u8,
    abbreviations: usize,
    custom_alphabet: usize,
    custom_unicode: usize,
}

impl TextCodec {
    pub fn new(mem: &MemoryImage) -> Result<TextCodec, String> {
        let version = mem.version();
        let abbreviations = if version >= 2 {
            mem.abbreviations_table()?
        } else {
            0
        };
        let (custom_alphabet, custom_unicode) = if version >= 5 {
            (mem.alphabet_table()?, mem.unicode_table()?)
        } else {
            (0, 0)
        };
        if custom_alphabet != 0 {
            warn!("story declares a custom alphabet table at 0x{custom_alphabet:04x}");
        }
        Ok(TextCodec {
            version,
            abbreviations,
            custom_alphabet,
            custom_unicode,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    fn lookup(&self, alphabet: Alphabet, zchar: u8) -> char {
        let row = if alphabet == Alphabet::A2 && self.version == 1 {
            A2_V1
        } else {
            ALPHABETMAP[&alphabet]
        };
        row.as_bytes()[(zchar - 6) as usize] as char
    }

    /// Decode the string at `addr`, starting in alphabet A0
    pub fn decode(&self, mem: &MemoryImage, addr: usize) -> Result<ZString, String> {
        self.decode_from(mem, addr, None, Alphabet::A0)
            .map(|(zs, _)| zs)
    }

    /// Decode at most `max_bytes` bytes, used for fixed-width dictionary text
    pub fn decode_bounded(
        &self,
        mem: &MemoryImage,
        addr: usize,
        max_bytes: usize,
    ) -> Result<ZString, String> {
        self.decode_from(mem, addr, Some(max_bytes), Alphabet::A0)
            .map(|(zs, _)| zs)
    }

    /// Decode starting from a locked alphabet. Returns the lock in effect
    /// afterwards; from version 3 on that is always A0.
    pub fn decode_from(
        &self,
        mem: &MemoryImage,
        addr: usize,
        max_bytes: Option<usize>,
        start: Alphabet,
    ) -> Result<(ZString, Alphabet), String> {
        let words = mem
            .bytes()
            .get(addr..)
            .ok_or_else(|| format!("String address 0x{addr:05x} is outside memory"))?;
        self.decode_inner(mem, words, max_bytes, start, false)
            .map_err(|e| format!("{e} (string at 0x{addr:05x})"))
    }

    /// Decode z-characters held outside story memory, such as freshly encoded text
    pub fn decode_bytes(&self, mem: &MemoryImage, bytes: &[u8]) -> Result<ZString, String> {
        self.decode_inner(mem, bytes, Some(bytes.len()), Alphabet::A0, false)
            .map(|(zs, _)| zs)
    }

    fn decode_inner(
        &self,
        mem: &MemoryImage,
        words: &[u8],
        max_bytes: Option<usize>,
        start: Alphabet,
        in_abbreviation: bool,
    ) -> Result<(ZString, Alphabet), String> {
        if self.custom_alphabet != 0 {
            return Err(format!(
                "Custom alphabet table at 0x{:04x} is not supported",
                self.custom_alphabet
            ));
        }

        let mut out = ZString::default();
        let mut state = DecodeState::Normal;
        let mut lock = if self.version >= 3 { Alphabet::A0 } else { start };
        let mut current = lock;
        let mut offset = 0;

        loop {
            if let Some(max) = max_bytes {
                if offset >= max {
                    break;
                }
            }
            let word = words
                .get(offset..offset + 2)
                .ok_or_else(|| "Unterminated string".to_string())?;
            let packed = read_zchars_from_word(&[word[0], word[1]])
                .map_err(|e| format!("Bad z-character word at offset {offset}: {e}"))?;
            offset += 2;

            for z in packed.chars {
                state = match state {
                    DecodeState::Abbreviation(bank) => {
                        let expansion = self.expand_abbreviation(mem, bank, z)?;
                        out.text.push_str(&expansion.text);
                        out.zscii.extend_from_slice(&expansion.zscii);
                        DecodeState::Normal
                    }
                    DecodeState::EscapeHigh => DecodeState::EscapeLow(z),
                    DecodeState::EscapeLow(high) => {
                        let code = ((high as u16) << 5) | z as u16;
                        self.push_zscii(&mut out, code)?;
                        current = lock;
                        DecodeState::Normal
                    }
                    DecodeState::Normal => {
                        self.decode_zchar(z, &mut out, &mut lock, &mut current, in_abbreviation)?
                    }
                };
            }

            if packed.last {
                break;
            }
        }

        out.length = offset;
        Ok((out, if self.version >= 3 { Alphabet::A0 } else { lock }))
    }

    fn decode_zchar(
        &self,
        z: u8,
        out: &mut ZString,
        lock: &mut Alphabet,
        current: &mut Alphabet,
        in_abbreviation: bool,
    ) -> Result<DecodeState, String> {
        match z {
            0 => {
                out.text.push(' ');
                out.zscii.push(32);
                *current = *lock;
            }
            1 if self.version == 1 => {
                out.text.push('\n');
                out.zscii.push(13);
                *current = *lock;
            }
            1..=3 if self.version >= 3 || z == 1 => {
                if in_abbreviation {
                    return Err("Abbreviation nested inside an abbreviation".to_string());
                }
                return Ok(DecodeState::Abbreviation(z));
            }
            2 | 3 => {
                // versions 1-2: single character shift
                *current = lock.rotate(z - 1);
            }
            4 | 5 if self.version >= 3 => {
                *current = if z == 4 { Alphabet::A1 } else { Alphabet::A2 };
            }
            4 | 5 => {
                *lock = lock.rotate(z - 3);
                *current = *lock;
            }
            6 if *current == Alphabet::A2 => {
                return Ok(DecodeState::EscapeHigh);
            }
            _ => {
                let c = self.lookup(*current, z);
                out.text.push(c);
                out.zscii.push(if c == '\n' { 13 } else { c as u16 });
                *current = *lock;
            }
        }
        Ok(DecodeState::Normal)
    }

    fn expand_abbreviation(&self, mem: &MemoryImage, bank: u8, z: u8) -> Result<ZString, String> {
        let entry = 32 * (bank as usize - 1) + z as usize;
        let word_addr = mem.get_word(self.abbreviations + entry * 2)? as usize;
        debug!("abbreviation {} at 0x{:05x}", entry, word_addr * 2);
        let words = mem
            .bytes()
            .get(word_addr * 2..)
            .ok_or_else(|| format!("Abbreviation {entry} points outside memory"))?;
        self.decode_inner(mem, words, None, Alphabet::A0, true)
            .map(|(zs, _)| zs)
    }

    fn push_zscii(&self, out: &mut ZString, code: u16) -> Result<(), String> {
        if let Some(c) = self.zscii_to_unicode(code)? {
            out.text.push(c);
        }
        out.zscii.push(code);
        Ok(())
    }

    /// Translate one ZSCII output code
    pub fn zscii_to_unicode(&self, code: u16) -> Result<Option<char>, String> {
        let c = match code {
            0 => return Ok(None),
            9 => '\t',
            11 => ' ',
            13 => '\n',
            32..=126 => code as u8 as char,
            155..=223 => {
                if self.custom_unicode != 0 {
                    return Err(format!(
                        "Custom unicode translation table at 0x{:04x} is not supported",
                        self.custom_unicode
                    ));
                }
                DEFAULT_UNICODE[(code - FIRST_EXTRA_ZSCII as u16) as usize]
            }
            _ => {
                warn!("no output translation for ZSCII {}", code);
                '?'
            }
        };
        Ok(Some(c))
    }

    /// Encode `text` into exactly `zchar_len` z-characters, padding or truncating
    pub fn encode(&self, text: &str, zchar_len: usize) -> Result<Vec<u8>, String> {
        let (shift1, shift2) = if self.version >= 3 { (4, 5) } else { (2, 3) };
        let a2 = if self.version == 1 {
            A2_V1
        } else {
            ALPHABETMAP[&Alphabet::A2]
        };

        let mut zchars: Vec<u8> = Vec::with_capacity(zchar_len + 4);
        for ch in text.chars() {
            if zchars.len() >= zchar_len {
                break;
            }
            match ch {
                ' ' => zchars.push(0),
                '\n' if self.version == 1 => zchars.push(1),
                'a'..='z' => zchars.push(ch as u8 - b'a' + 6),
                'A'..='Z' => zchars.extend_from_slice(&[shift1, ch as u8 - b'A' + 6]),
                _ => match a2.char_indices().skip(1).find(|(_, c)| *c == ch) {
                    Some((i, _)) => zchars.extend_from_slice(&[shift2, i as u8 + 6]),
                    None => {
                        let code = unicode_to_zscii(ch) as u16;
                        if code > 0x3FF {
                            return Err(format!("Cannot encode character {ch:?}"));
                        }
                        zchars.extend_from_slice(&[
                            shift2,
                            6,
                            (code >> 5) as u8,
                            (code & 0x1F) as u8,
                        ]);
                    }
                },
            }
        }

        zchars.resize(zchar_len, PAD_ZCHAR);

        let mut bytes = Vec::with_capacity(zchar_len / 3 * 2);
        let words = zchar_len / 3;
        for (i, chunk) in zchars.chunks(3).take(words).enumerate() {
            let mut word = ((chunk[0] as u16) << 10) | ((chunk[1] as u16) << 5) | chunk[2] as u16;
            if i + 1 == words {
                word |= 0x8000;
            }
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        Ok(bytes)
    }

    /// ZSCII codes for text typed by the player
    pub fn to_zscii(&self, text: &str) -> Vec<u8> {
        text.chars().map(unicode_to_zscii).collect()
    }
}

/// Map an input character to ZSCII, falling back to a space
pub fn unicode_to_zscii(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\n' | '\r' => 13,
        '\u{7f}' | '\u{8}' => 8,
        '\u{1b}' => 27,
        _ => match UNICODE_TO_ZSCII.get(&c) {
            Some(code) => *code,
            None => {
                debug!("no ZSCII code for {:?}", c);
                b' '
            }
        },
    }
}

pub fn is_extra_zscii(code: u16) -> bool {
    (FIRST_EXTRA_ZSCII as u16..=LAST_EXTRA_ZSCII as u16).contains(&code)
}
