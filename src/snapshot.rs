//! Save snapshots and their compressed on-disk form
//!
//! Dynamic memory is stored XORed against the pristine image with runs of
//! zeros run-length encoded: a zero byte followed by the run length minus one.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::stack::CallStack;
use crate::text::Alphabet;
use crate::vm::VM;

/// Everything needed to resume a story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Address of the save instruction
    pub pc: usize,
    pub fp: usize,
    /// Dynamic memory, uncompressed
    pub memory: Vec<u8>,
    pub stack: Vec<u16>,
    pub alphabet: Alphabet,
    /// Identifies the story the snapshot belongs to
    pub source_name: String,
}

impl Snapshot {
    pub fn capture(vm: &VM, pc: usize, source_name: &str) -> Snapshot {
        Snapshot {
            pc,
            fp: vm.stack.frame_pointer(),
            memory: vm.memory.dynamic().to_vec(),
            stack: vm.stack.cells().to_vec(),
            alphabet: vm.alphabet,
            source_name: source_name.to_string(),
        }
    }

    /// Load into `vm`, leaving it untouched when the snapshot does not fit
    pub fn apply(&self, vm: &mut VM) -> Result<(), String> {
        let stack = CallStack::from_parts(self.stack.clone(), self.fp)?;
        if self.pc >= vm.memory.len() {
            return Err(format!("Saved PC 0x{:05x} is outside the story", self.pc));
        }
        vm.memory.restore_dynamic(&self.memory)?;
        vm.stack = stack;
        vm.pc = self.pc;
        vm.alphabet = self.alphabet;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string(self).map_err(|e| format!("Cannot serialize snapshot: {e}"))
    }

    pub fn from_toml(text: &str) -> Result<Snapshot, String> {
        toml::from_str(text).map_err(|e| format!("Invalid snapshot: {e}"))
    }
}

/// A snapshot with its dynamic memory compressed against the pristine image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    pub source_name: String,
    pub pc: usize,
    pub fp: usize,
    pub alphabet: Alphabet,
    pub stack: Vec<u16>,
    pub cmem: Vec<u8>,
}

impl SavedGame {
    pub fn compress(snapshot: &Snapshot, pristine: &[u8]) -> Result<SavedGame, String> {
        Ok(SavedGame {
            source_name: snapshot.source_name.clone(),
            pc: snapshot.pc,
            fp: snapshot.fp,
            alphabet: snapshot.alphabet,
            stack: snapshot.stack.clone(),
            cmem: compress_memory(&snapshot.memory, pristine)?,
        })
    }

    pub fn expand(&self, pristine: &[u8]) -> Result<Snapshot, String> {
        Ok(Snapshot {
            pc: self.pc,
            fp: self.fp,
            memory: decompress_memory(&self.cmem, pristine)?,
            stack: self.stack.clone(),
            alphabet: self.alphabet,
            source_name: self.source_name.clone(),
        })
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string(self).map_err(|e| format!("Cannot serialize saved game: {e}"))
    }

    pub fn from_toml(text: &str) -> Result<SavedGame, String> {
        toml::from_str(text).map_err(|e| format!("Invalid saved game: {e}"))
    }
}

/// XOR `current` against `original` and run-length encode the zeros
pub fn compress_memory(current: &[u8], original: &[u8]) -> Result<Vec<u8>, String> {
    if current.len() != original.len() {
        return Err(format!(
            "Memory sizes don't match for compression: {} vs {}",
            current.len(),
            original.len()
        ));
    }

    let mut compressed = Vec::new();
    let mut i = 0;
    while i < current.len() {
        let xor_byte = current[i] ^ original[i];
        if xor_byte != 0 {
            compressed.push(xor_byte);
            i += 1;
            continue;
        }

        let start = i;
        while i < current.len() && current[i] == original[i] {
            i += 1;
        }
        let mut remaining = i - start;
        while remaining > 0 {
            let run = remaining.min(256);
            compressed.push(0);
            compressed.push((run - 1) as u8);
            remaining -= run;
        }
    }

    debug!("compressed {} bytes to {}", current.len(), compressed.len());
    Ok(compressed)
}

/// Undo `compress_memory`. Missing trailing runs mean unchanged bytes.
pub fn decompress_memory(compressed: &[u8], original: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(original.len());
    let mut bytes = compressed.iter();

    while let Some(&byte) = bytes.next() {
        if byte == 0 {
            let run = *bytes
                .next()
                .ok_or_else(|| "Incomplete run at end of compressed memory".to_string())?
                as usize
                + 1;
            if out.len() + run > original.len() {
                return Err("Run extends beyond memory".to_string());
            }
            out.extend_from_slice(&original[out.len()..out.len() + run]);
        } else {
            let i = out.len();
            let base = original
                .get(i)
                .ok_or_else(|| "Compressed data extends beyond memory".to_string())?;
            out.push(base ^ byte);
        }
    }

    if out.len() < original.len() {
        warn!(
            "compressed memory ends early at {} of {} bytes",
            out.len(),
            original.len()
        );
        out.extend_from_slice(&original[out.len()..]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_compress_decompress() {
        let original = vec![0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];
        let current = vec![0x10, 0x21, 0x30, 0x40, 0x50, 0x60, 0x71, 0x80];

        let compressed = compress_memory(&current, &original).unwrap();
        assert_eq!(compressed, vec![0, 0, 0x01, 0, 3, 0x01, 0, 0]);
        let restored = decompress_memory(&compressed, &original).unwrap();
        assert_eq!(current, restored);
    }

    #[test]
    fn test_long_run_of_zeros() {
        let original = vec![0xFF; 1000];
        let mut current = original.clone();
        current[500] = 0xFE;

        let compressed = compress_memory(&current, &original).unwrap();
        assert!(compressed.len() < 16);
        let restored = decompress_memory(&compressed, &original).unwrap();
        assert_eq!(current, restored);
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        assert!(compress_memory(&[1, 2], &[1]).is_err());
        assert!(decompress_memory(&[0, 9], &[1, 2]).is_err());
        assert!(decompress_memory(&[0], &[1, 2]).is_err());
    }

    #[test]
    fn test_truncated_stream_keeps_original_tail() {
        let original = vec![1, 2, 3, 4];
        assert_eq!(decompress_memory(&[0x03], &original).unwrap(), vec![2, 2, 3, 4]);
    }

    #[test]
    fn test_snapshot_toml_round_trip() {
        let snapshot = Snapshot {
            pc: 0x4f05,
            fp: 4,
            memory: vec![3, 0, 0, 7],
            stack: vec![0, 0, 0, 0, 0, 0x4f, 0, 0x0100],
            alphabet: Alphabet::A1,
            source_name: "zork1.z3".to_string(),
        };
        let text = snapshot.to_toml().unwrap();
        assert_eq!(Snapshot::from_toml(&text).unwrap(), snapshot);

        let pristine = vec![3, 1, 0, 7];
        let saved = SavedGame::compress(&snapshot, &pristine).unwrap();
        let text = saved.to_toml().unwrap();
        let back = SavedGame::from_toml(&text).unwrap().expand(&pristine).unwrap();
        assert_eq!(back, snapshot);
    }
}
