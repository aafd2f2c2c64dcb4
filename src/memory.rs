//! Story memory image
//!
//! The image is split into three contiguous regions taken from the header:
//! dynamic `[0, static)`, static `[static, high)` and high `[high, end)`.
//! Only dynamic memory is writable by the story. Game-visible loads are
//! limited to the first 64K, while instruction fetch and string decoding
//! may read anywhere in the image.

use log::{debug, info};

/// Highest address a story may load from with `loadb`/`loadw`
pub const MAX_LOAD_ADDRESS: usize = 0xFFFF;

/// Smallest image that can hold a header
pub const HEADER_SIZE: usize = 0x40;

const ROUTINES_OFFSET: usize = 0x28;
const STRINGS_OFFSET: usize = 0x2A;

/// Byte image of a loaded story together with a pristine copy for restart
#[derive(Debug, Clone)]
pub struct MemoryImage {
    bytes: Vec<u8>,
    backup: Vec<u8>,
    version: u8,
    static_base: usize,
    high_base: usize,
}

impl MemoryImage {
    /// Build an image from raw story bytes, validating the region boundaries
    pub fn new(bytes: Vec<u8>) -> Result<Self, String> {
        if bytes.len() < HEADER_SIZE {
            return Err(format!(
                "Story image too small for header: {} bytes",
                bytes.len()
            ));
        }

        let version = bytes[0];
        if !(1..=8).contains(&version) {
            return Err(format!("Unsupported Z-machine version {version}"));
        }

        let high_base = u16::from_be_bytes([bytes[0x04], bytes[0x05]]) as usize;
        let static_base = u16::from_be_bytes([bytes[0x0E], bytes[0x0F]]) as usize;

        if static_base < HEADER_SIZE {
            return Err(format!(
                "Static memory base 0x{static_base:04x} overlaps the header"
            ));
        }
        if static_base > bytes.len() {
            return Err(format!(
                "Static memory base 0x{:04x} lies past the end of a {} byte image",
                static_base,
                bytes.len()
            ));
        }
        if high_base > bytes.len() {
            return Err(format!(
                "High memory base 0x{:05x} lies past the end of a {} byte image",
                high_base,
                bytes.len()
            ));
        }

        debug!(
            "memory: version {} dynamic 0x0000-0x{:04x} high 0x{:05x} end 0x{:05x}",
            version,
            static_base,
            high_base,
            bytes.len()
        );

        Ok(MemoryImage {
            backup: bytes.clone(),
            bytes,
            version,
            static_base,
            high_base,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn static_base(&self) -> usize {
        self.static_base
    }

    pub fn high_base(&self) -> usize {
        self.high_base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw view of the whole image
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The untouched image as loaded
    pub fn pristine(&self) -> &[u8] {
        &self.backup
    }

    /// Read a byte anywhere in the image
    pub fn get_byte(&self, addr: usize) -> Result<u8, String> {
        self.bytes.get(addr).copied().ok_or_else(|| {
            format!(
                "Illegal byte read at 0x{:05x}, last address is 0x{:05x}",
                addr,
                self.bytes.len().saturating_sub(1)
            )
        })
    }

    /// Read a big-endian word anywhere in the image
    pub fn get_word(&self, addr: usize) -> Result<u16, String> {
        if addr + 1 >= self.bytes.len() {
            return Err(format!(
                "Illegal word read at 0x{:05x}, last address is 0x{:05x}",
                addr,
                self.bytes.len().saturating_sub(2)
            ));
        }
        Ok(u16::from_be_bytes([self.bytes[addr], self.bytes[addr + 1]]))
    }

    /// Write a byte anywhere in the image, ignoring region protection
    pub fn set_byte(&mut self, addr: usize, value: u8) -> Result<(), String> {
        match self.bytes.get_mut(addr) {
            Some(b) => {
                *b = value;
                Ok(())
            }
            None => Err(format!("Illegal byte write at 0x{addr:05x}")),
        }
    }

    /// Write a big-endian word anywhere in the image, ignoring region protection
    pub fn set_word(&mut self, addr: usize, value: u16) -> Result<(), String> {
        if addr + 1 >= self.bytes.len() {
            return Err(format!("Illegal word write at 0x{addr:05x}"));
        }
        let [hi, lo] = value.to_be_bytes();
        self.bytes[addr] = hi;
        self.bytes[addr + 1] = lo;
        Ok(())
    }

    /// Story-visible byte write, only permitted in dynamic memory
    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), String> {
        if addr >= self.static_base {
            return Err(format!(
                "Illegal byte write to 0x{:05x}: static memory begins at 0x{:04x}",
                addr, self.static_base
            ));
        }
        self.set_byte(addr, value)
    }

    /// Story-visible word write, only permitted in dynamic memory
    pub fn write_word(&mut self, addr: usize, value: u16) -> Result<(), String> {
        if addr + 1 >= self.static_base {
            return Err(format!(
                "Illegal word write to 0x{:05x}: static memory begins at 0x{:04x}",
                addr, self.static_base
            ));
        }
        self.set_word(addr, value)
    }

    /// Story-visible byte load, limited to the first 64K
    pub fn load_byte(&self, addr: usize) -> Result<u8, String> {
        if addr > MAX_LOAD_ADDRESS {
            return Err(format!("Illegal byte load from 0x{addr:05x}"));
        }
        self.get_byte(addr)
    }

    /// Story-visible word load, limited to the first 64K
    pub fn load_word(&self, addr: usize) -> Result<u16, String> {
        if addr + 1 > MAX_LOAD_ADDRESS {
            return Err(format!("Illegal word load from 0x{addr:05x}"));
        }
        self.get_word(addr)
    }

    /// Copy `len` bytes starting at `addr`
    pub fn read_bytes(&self, addr: usize, len: usize) -> Result<&[u8], String> {
        self.bytes
            .get(addr..addr + len)
            .ok_or_else(|| format!("Illegal read of {len} bytes at 0x{addr:05x}"))
    }

    /// Copy `data` into dynamic memory starting at `addr`
    pub fn write_bytes(&mut self, addr: usize, data: &[u8]) -> Result<(), String> {
        for (i, b) in data.iter().enumerate() {
            self.write_byte(addr + i, *b)?;
        }
        Ok(())
    }

    /// Byte address of a packed routine address
    pub fn unpack_routine(&self, packed: u16) -> usize {
        self.unpack(packed, ROUTINES_OFFSET)
    }

    /// Byte address of a packed string address
    pub fn unpack_string(&self, packed: u16) -> usize {
        self.unpack(packed, STRINGS_OFFSET)
    }

    fn unpack(&self, packed: u16, offset_field: usize) -> usize {
        let packed = packed as usize;
        match self.version {
            1..=3 => packed << 1,
            4 | 5 => packed << 2,
            6 | 7 => {
                let offset = u16::from_be_bytes([
                    self.bytes[offset_field],
                    self.bytes[offset_field + 1],
                ]) as usize;
                (packed << 2) + (offset << 3)
            }
            _ => packed << 3,
        }
    }

    /// Current dynamic memory
    pub fn dynamic(&self) -> &[u8] {
        &self.bytes[..self.static_base]
    }

    /// Dynamic memory as it was at load
    pub fn pristine_dynamic(&self) -> &[u8] {
        &self.backup[..self.static_base]
    }

    /// Replace dynamic memory with a previously exported copy
    pub fn restore_dynamic(&mut self, data: &[u8]) -> Result<(), String> {
        if data.len() != self.static_base {
            return Err(format!(
                "Dynamic memory size mismatch: expected {} bytes, got {}",
                self.static_base,
                data.len()
            ));
        }
        self.bytes[..self.static_base].copy_from_slice(data);
        Ok(())
    }

    /// Copy the pristine image back over working memory
    pub fn reset(&mut self) {
        info!("memory: restoring pristine image");
        self.bytes.copy_from_slice(&self.backup);
    }

    /// Sum of the pristine bytes from the end of the header to `file_len`
    pub fn checksum(&self, file_len: usize) -> u16 {
        let end = file_len.min(self.backup.len());
        if end <= HEADER_SIZE {
            return 0;
        }
        self.backup[HEADER_SIZE..end]
            .iter()
            .fold(0u16, |acc, b| acc.wrapping_add(*b as u16))
    }
}
