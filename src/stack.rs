//! The shared value stack and its routine frames
//!
//! A frame occupies the cells starting at the frame pointer:
//!
//! ```text
//! fp+0  return address bits 16..30 (bit 14 set: discard the result)
//! fp+1  return address bits 0..15
//! fp+2  previous frame pointer
//! fp+3  store variable << 8 | local count
//! fp+4  locals, then the routine's evaluation stack
//! ```

use log::debug;

/// Hard limit on the number of stack cells
pub const MAX_STACK_CELLS: usize = 0x10000;

const IGNORE_RESULT: u16 = 0x4000;
const FRAME_HEADER: usize = 4;

/// Where a returning routine hands control back to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReturn {
    pub return_addr: usize,
    /// Variable that receives the result, `None` when it is discarded
    pub store: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallStack {
    cells: Vec<u16>,
    fp: usize,
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStack {
    /// A stack holding only the empty outermost frame
    pub fn new() -> CallStack {
        CallStack {
            cells: vec![0, 0, 0, 0],
            fp: 0,
        }
    }

    /// Rebuild from saved cells, checking the frame chain
    pub fn from_parts(cells: Vec<u16>, fp: usize) -> Result<CallStack, String> {
        let stack = CallStack { cells, fp };
        let mut frame = fp;
        loop {
            if frame + FRAME_HEADER > stack.cells.len() {
                return Err(format!("Saved frame pointer {frame} is past the stack"));
            }
            let locals = (stack.cells[frame + 3] & 0xFF) as usize;
            if frame + FRAME_HEADER + locals > stack.cells.len() {
                return Err(format!("Saved frame at {frame} is truncated"));
            }
            if frame == 0 {
                break;
            }
            let prev = stack.cells[frame + 2] as usize;
            if prev >= frame {
                return Err(format!("Saved frame chain loops at {frame}"));
            }
            frame = prev;
        }
        Ok(stack)
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    pub fn frame_pointer(&self) -> usize {
        self.fp
    }

    pub fn depth(&self) -> usize {
        self.cells.len()
    }

    fn local_count(&self) -> usize {
        (self.cells[self.fp + 3] & 0xFF) as usize
    }

    /// First cell of the active routine's evaluation stack
    fn frame_top(&self) -> usize {
        self.fp + FRAME_HEADER + self.local_count()
    }

    /// Values on the active routine's evaluation stack
    pub fn routine_stack_len(&self) -> usize {
        self.cells.len() - self.frame_top()
    }

    pub fn push(&mut self, value: u16) -> Result<(), String> {
        if self.cells.len() >= MAX_STACK_CELLS {
            return Err("Stack overflow".to_string());
        }
        self.cells.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, String> {
        if self.cells.len() <= self.frame_top() {
            return Err("Stack underflow".to_string());
        }
        self.cells
            .pop()
            .ok_or_else(|| "Stack underflow".to_string())
    }

    pub fn peek(&self) -> Result<u16, String> {
        if self.cells.len() <= self.frame_top() {
            return Err("Stack underflow reading the top value".to_string());
        }
        Ok(self.cells[self.cells.len() - 1])
    }

    /// Replace the top value without popping it
    pub fn set_top(&mut self, value: u16) -> Result<(), String> {
        if self.cells.len() <= self.frame_top() {
            return Err("Stack underflow writing the top value".to_string());
        }
        let top = self.cells.len() - 1;
        self.cells[top] = value;
        Ok(())
    }

    pub fn locals(&self) -> &[u16] {
        let start = self.fp + FRAME_HEADER;
        &self.cells[start..start + self.local_count()]
    }

    fn local_index(&self, n: u8) -> Result<usize, String> {
        if n == 0 || n as usize > self.local_count() {
            return Err(format!(
                "Local {} does not exist (routine has {})",
                n,
                self.local_count()
            ));
        }
        Ok(self.fp + 3 + n as usize)
    }

    pub fn local(&self, n: u8) -> Result<u16, String> {
        Ok(self.cells[self.local_index(n)?])
    }

    pub fn set_local(&mut self, n: u8, value: u16) -> Result<(), String> {
        let i = self.local_index(n)?;
        self.cells[i] = value;
        Ok(())
    }

    /// Enter a routine. `locals` are the initial local values.
    pub fn push_frame(
        &mut self,
        return_addr: usize,
        store: Option<u8>,
        locals: &[u16],
    ) -> Result<(), String> {
        if locals.len() > 15 {
            return Err(format!("Routine declares {} locals", locals.len()));
        }
        if return_addr > 0x3FFF_FFFF {
            return Err(format!("Return address 0x{return_addr:x} is out of range"));
        }
        if self.cells.len() + FRAME_HEADER + locals.len() > MAX_STACK_CELLS {
            return Err("Stack overflow entering routine".to_string());
        }
        let mut high = ((return_addr >> 16) & 0x3FFF) as u16;
        if store.is_none() {
            high |= IGNORE_RESULT;
        }
        let new_fp = self.cells.len();
        self.cells.push(high);
        self.cells.push((return_addr & 0xFFFF) as u16);
        self.cells.push(self.fp as u16);
        self.cells
            .push(((store.unwrap_or(0) as u16) << 8) | locals.len() as u16);
        self.cells.extend_from_slice(locals);
        debug!(
            "frame at {} returns to 0x{:05x}, {} locals",
            new_fp,
            return_addr,
            locals.len()
        );
        self.fp = new_fp;
        Ok(())
    }

    /// Leave the active routine, discarding its locals and evaluation stack
    pub fn pop_frame(&mut self) -> Result<FrameReturn, String> {
        if self.fp == 0 {
            return Err("Return from the outermost frame".to_string());
        }
        let high = self.cells[self.fp];
        let low = self.cells[self.fp + 1];
        let prev = self.cells[self.fp + 2] as usize;
        let packed = self.cells[self.fp + 3];

        let return_addr = (((high & 0x3FFF) as usize) << 16) | low as usize;
        let store = if high & IGNORE_RESULT != 0 {
            None
        } else {
            Some((packed >> 8) as u8)
        };

        self.cells.truncate(self.fp);
        self.fp = prev;
        Ok(FrameReturn { return_addr, store })
    }

    /// Number of active frames, not counting the outermost
    pub fn frame_count(&self) -> usize {
        let mut count = 0;
        let mut frame = self.fp;
        while frame != 0 {
            count += 1;
            frame = self.cells[frame + 2] as usize;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_outermost_frame() {
        let mut stack = CallStack::new();
        assert_eq!(stack.depth(), 4);
        assert_eq!(stack.frame_pointer(), 0);
        assert!(stack.pop().is_err());
        assert!(stack.pop_frame().is_err());
        stack.push(7).unwrap();
        assert_eq!(stack.peek().unwrap(), 7);
        assert_eq!(stack.pop().unwrap(), 7);
    }

    #[test]
    fn test_call_and_return_restores_depth() {
        let mut stack = CallStack::new();
        stack.push(1).unwrap();
        let depth = stack.depth();
        stack.push_frame(0x1_2345, None, &[]).unwrap();
        assert_eq!(stack.frame_count(), 1);
        let ret = stack.pop_frame().unwrap();
        assert_eq!(ret.return_addr, 0x1_2345);
        assert_eq!(ret.store, None);
        assert_eq!(stack.depth(), depth);
        assert_eq!(stack.frame_pointer(), 0);
        assert_eq!(stack.pop().unwrap(), 1);
    }

    #[test]
    fn test_locals_and_store() {
        let mut stack = CallStack::new();
        stack.push_frame(0x500, Some(0x10), &[1, 2, 3]).unwrap();
        assert_eq!(stack.locals(), &[1, 2, 3]);
        assert_eq!(stack.local(2).unwrap(), 2);
        stack.set_local(3, 99).unwrap();
        assert_eq!(stack.local(3).unwrap(), 99);
        assert!(stack.local(0).is_err());
        assert!(stack.local(4).is_err());

        // the routine's evaluation stack starts empty
        assert!(stack.pop().is_err());
        stack.push(5).unwrap();
        stack.push(6).unwrap();
        assert_eq!(stack.routine_stack_len(), 2);

        let ret = stack.pop_frame().unwrap();
        assert_eq!(ret.store, Some(0x10));
        assert_eq!(stack.depth(), 4);
    }

    #[test]
    fn test_nested_frames() {
        let mut stack = CallStack::new();
        stack.push_frame(0x100, Some(0), &[9]).unwrap();
        let outer_fp = stack.frame_pointer();
        stack.push(42).unwrap();
        stack.push_frame(0x200, Some(1), &[]).unwrap();
        assert_eq!(stack.frame_count(), 2);
        assert_eq!(stack.pop_frame().unwrap().return_addr, 0x200);
        assert_eq!(stack.frame_pointer(), outer_fp);
        assert_eq!(stack.local(1).unwrap(), 9);
        assert_eq!(stack.pop().unwrap(), 42);
    }

    #[test]
    fn test_top_in_place() {
        let mut stack = CallStack::new();
        assert!(stack.set_top(1).is_err());
        stack.push(10).unwrap();
        stack.set_top(11).unwrap();
        assert_eq!(stack.depth(), 5);
        assert_eq!(stack.peek().unwrap(), 11);
    }

    #[test]
    fn test_from_parts_validates_chain() {
        let mut stack = CallStack::new();
        stack.push_frame(0x300, Some(2), &[4, 5]).unwrap();
        stack.push(8).unwrap();
        let copy = CallStack::from_parts(stack.cells().to_vec(), stack.frame_pointer()).unwrap();
        assert_eq!(copy, stack);
        assert!(CallStack::from_parts(stack.cells().to_vec(), 40).is_err());
        assert!(CallStack::from_parts(vec![0, 0], 0).is_err());
    }

    #[test]
    fn test_too_many_locals() {
        let mut stack = CallStack::new();
        assert!(stack.push_frame(0x100, None, &[0; 16]).is_err());
    }
}
