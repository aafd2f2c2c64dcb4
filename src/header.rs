use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use log::debug;

use crate::config::EngineConfig;
use crate::memory::MemoryImage;

pub const VERSION: usize = 0x00;
pub const FLAGS1: usize = 0x01;
pub const RELEASE: usize = 0x02;
pub const HIGH_MEMORY: usize = 0x04;
pub const INITIAL_PC: usize = 0x06;
pub const DICTIONARY: usize = 0x08;
pub const OBJECT_TABLE: usize = 0x0A;
pub const GLOBALS: usize = 0x0C;
pub const STATIC_MEMORY: usize = 0x0E;
pub const FLAGS2: usize = 0x10;
pub const SERIAL: usize = 0x12;
pub const ABBREVIATIONS: usize = 0x18;
pub const FILE_LENGTH: usize = 0x1A;
pub const CHECKSUM: usize = 0x1C;
pub const INTERPRETER_NUMBER: usize = 0x1E;
pub const INTERPRETER_VERSION: usize = 0x1F;
pub const SCREEN_HEIGHT_LINES: usize = 0x20;
pub const SCREEN_WIDTH_CHARS: usize = 0x21;
pub const SCREEN_WIDTH_UNITS: usize = 0x22;
pub const SCREEN_HEIGHT_UNITS: usize = 0x24;
pub const ROUTINES_OFFSET: usize = 0x28;
pub const STRINGS_OFFSET: usize = 0x2A;
pub const DEFAULT_BACKGROUND: usize = 0x2C;
pub const DEFAULT_FOREGROUND: usize = 0x2D;
pub const TERMINATING_CHARS: usize = 0x2E;
pub const STREAM3_WIDTH: usize = 0x30;
pub const STANDARD_REVISION: usize = 0x32;
pub const ALPHABET_TABLE: usize = 0x34;
pub const HEADER_EXTENSION: usize = 0x36;

/// Low byte of the flags 2 word, where most of its bits live
const FLAGS2_LOW: usize = FLAGS2 + 1;

pub const COLOUR_BLACK: u8 = 2;
pub const COLOUR_YELLOW: u8 = 5;

/// Fixed header fields, validated once at load
#[derive(Debug, Clone)]
pub struct Header {
    pub version: u8,
    pub release: u16,
    pub serial: String,
    pub base_high_mem: usize,
    pub base_static_mem: usize,
    pub initial_pc: usize,
    pub dictionary: usize,
    pub object_table_addr: usize,
    pub global_variables: usize,
    pub abbrev_table: usize,
    pub len_file: usize,
    pub checksum_file: u16,
}

impl Header {
    pub fn new(mem: &MemoryImage) -> Result<Header, String> {
        let word = |addr: usize| -> Result<usize, String> { Ok(mem.get_word(addr)? as usize) };
        let version = mem.get_byte(VERSION)?;

        let scale = match version {
            1..=3 => 2,
            4 | 5 => 4,
            _ => 8,
        };
        let stated_len = word(FILE_LENGTH)? * scale;
        // some early files leave the length blank
        let len_file = if stated_len == 0 {
            mem.len()
        } else {
            stated_len.min(mem.len())
        };

        let header = Header {
            version,
            release: word(RELEASE)? as u16,
            serial: mem
                .read_bytes(SERIAL, 6)?
                .iter()
                .map(|b| *b as char)
                .collect(),
            base_high_mem: word(HIGH_MEMORY)?,
            base_static_mem: word(STATIC_MEMORY)?,
            initial_pc: word(INITIAL_PC)?,
            dictionary: word(DICTIONARY)?,
            object_table_addr: word(OBJECT_TABLE)?,
            global_variables: word(GLOBALS)?,
            abbrev_table: word(ABBREVIATIONS)?,
            len_file,
            checksum_file: word(CHECKSUM)? as u16,
        };

        for (name, addr) in [
            ("initial PC", header.initial_pc),
            ("dictionary", header.dictionary),
            ("object table", header.object_table_addr),
            ("globals table", header.global_variables),
        ] {
            if addr >= mem.len() {
                return Err(format!(
                    "Header {} address 0x{:05x} lies outside the {} byte image",
                    name,
                    addr,
                    mem.len()
                ));
            }
        }

        debug!(
            "header: v{} release {} serial {}",
            header.version, header.release, header.serial
        );
        Ok(header)
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "
Z-code version:           {}
Release number:           {}
Size of resident memory:  {:#06x}
Start PC:                 {:#06x}
Dictionary address:       {:#06x}
Object table address:     {:#06x}
Global variables address: {:#06x}
Size of dynamic memory:   {:#06x}
Serial number:            {}
Abbreviations address:    {:#06x}
File size:                {:#06x}
Checksum:                 {:#06x}
",
            self.version,
            self.release,
            self.base_high_mem,
            self.initial_pc,
            self.dictionary,
            self.object_table_addr,
            self.global_variables,
            self.base_static_mem,
            self.serial,
            self.abbrev_table,
            self.len_file,
            self.checksum_file,
        )
    }
}

/// Version-gated header accessors. Each one refuses to run outside the
/// versions where its field exists.
impl MemoryImage {
    fn require_version(&self, min: u8, max: Option<u8>, what: &str) -> Result<(), String> {
        let v = self.version();
        let ok = v >= min && max.map_or(true, |m| v <= m);
        if ok {
            Ok(())
        } else {
            Err(format!("Header field '{what}' is not defined in version {v}"))
        }
    }

    fn header_flag(&self, byte: usize, bit: u8, min: u8, max: Option<u8>, what: &str) -> Result<bool, String> {
        self.require_version(min, max, what)?;
        Ok(self.get_byte(byte)? & (1 << bit) != 0)
    }

    fn set_header_flag(
        &mut self,
        byte: usize,
        bit: u8,
        on: bool,
        min: u8,
        max: Option<u8>,
        what: &str,
    ) -> Result<(), String> {
        self.require_version(min, max, what)?;
        let old = self.get_byte(byte)?;
        let new = if on { old | (1 << bit) } else { old & !(1 << bit) };
        self.set_byte(byte, new)
    }

    // ---- flags 1, versions 1-3 ----

    pub fn status_line_shows_time(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 1, 1, Some(3), "status line type")
    }

    pub fn is_story_split(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 2, 1, Some(3), "story file split")
    }

    pub fn is_status_line_unavailable(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 4, 1, Some(3), "status line unavailable")
    }

    pub fn set_status_line_available(&mut self, available: bool) -> Result<(), String> {
        // the bit is phrased as "not available"
        self.set_header_flag(FLAGS1, 4, !available, 1, Some(3), "status line unavailable")
    }

    pub fn is_screen_split_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 5, 1, Some(3), "screen splitting")
    }

    pub fn set_screen_split_available(&mut self, available: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS1, 5, available, 1, Some(3), "screen splitting")
    }

    pub fn is_variable_pitch_default(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 6, 1, Some(3), "variable pitch font")
    }

    pub fn set_variable_pitch_default(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS1, 6, on, 1, Some(3), "variable pitch font")
    }

    // ---- flags 1, versions 4+ ----

    pub fn is_colour_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 0, 5, None, "colours available")
    }

    pub fn set_colour_available(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS1, 0, on, 5, None, "colours available")
    }

    pub fn is_picture_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 1, 6, None, "pictures available")
    }

    pub fn is_bold_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 2, 4, None, "boldface available")
    }

    pub fn set_bold_available(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS1, 2, on, 4, None, "boldface available")
    }

    pub fn is_italic_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 3, 4, None, "italic available")
    }

    pub fn set_italic_available(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS1, 3, on, 4, None, "italic available")
    }

    pub fn is_fixed_space_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 4, 4, None, "fixed-space available")
    }

    pub fn set_fixed_space_available(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS1, 4, on, 4, None, "fixed-space available")
    }

    pub fn is_sound_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 5, 6, None, "sound effects available")
    }

    pub fn is_timed_input_available(&self) -> Result<bool, String> {
        self.header_flag(FLAGS1, 7, 4, None, "timed keyboard input")
    }

    pub fn set_timed_input_available(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS1, 7, on, 4, None, "timed keyboard input")
    }

    // ---- flags 2 ----

    pub fn is_transcripting(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 0, 1, None, "transcripting")
    }

    pub fn set_transcripting(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS2_LOW, 0, on, 1, None, "transcripting")
    }

    pub fn is_fixed_pitch_forced(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 1, 3, None, "force fixed pitch")
    }

    pub fn set_fixed_pitch_forced(&mut self, on: bool) -> Result<(), String> {
        self.set_header_flag(FLAGS2_LOW, 1, on, 3, None, "force fixed pitch")
    }

    pub fn is_redraw_requested(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 2, 6, None, "screen redraw")
    }

    pub fn wants_pictures(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 3, 5, None, "wants pictures")
    }

    pub fn wants_undo(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 4, 5, None, "wants undo")
    }

    pub fn wants_mouse(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 5, 5, None, "wants mouse")
    }

    pub fn wants_colours(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 6, 5, None, "wants colours")
    }

    pub fn wants_sound(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2_LOW, 7, 5, None, "wants sound")
    }

    pub fn wants_menus(&self) -> Result<bool, String> {
        self.header_flag(FLAGS2, 0, 6, None, "wants menus")
    }

    // ---- interpreter and screen fields ----

    pub fn interpreter_number(&self) -> Result<u8, String> {
        self.require_version(4, None, "interpreter number")?;
        self.get_byte(INTERPRETER_NUMBER)
    }

    pub fn set_interpreter_number(&mut self, num: u8) -> Result<(), String> {
        self.require_version(4, None, "interpreter number")?;
        self.set_byte(INTERPRETER_NUMBER, num)
    }

    pub fn interpreter_version(&self) -> Result<u8, String> {
        self.require_version(4, None, "interpreter version")?;
        self.get_byte(INTERPRETER_VERSION)
    }

    pub fn set_interpreter_version(&mut self, num: u8) -> Result<(), String> {
        self.require_version(4, None, "interpreter version")?;
        self.set_byte(INTERPRETER_VERSION, num)
    }

    pub fn screen_height_lines(&self) -> Result<u8, String> {
        self.require_version(4, None, "screen height")?;
        self.get_byte(SCREEN_HEIGHT_LINES)
    }

    pub fn set_screen_height_lines(&mut self, lines: u8) -> Result<(), String> {
        self.require_version(4, None, "screen height")?;
        self.set_byte(SCREEN_HEIGHT_LINES, lines)
    }

    pub fn screen_width_chars(&self) -> Result<u8, String> {
        self.require_version(4, None, "screen width")?;
        self.get_byte(SCREEN_WIDTH_CHARS)
    }

    pub fn set_screen_width_chars(&mut self, chars: u8) -> Result<(), String> {
        self.require_version(4, None, "screen width")?;
        self.set_byte(SCREEN_WIDTH_CHARS, chars)
    }

    pub fn screen_width_units(&self) -> Result<u16, String> {
        self.require_version(5, None, "screen width in units")?;
        self.get_word(SCREEN_WIDTH_UNITS)
    }

    pub fn set_screen_width_units(&mut self, units: u16) -> Result<(), String> {
        self.require_version(5, None, "screen width in units")?;
        self.set_word(SCREEN_WIDTH_UNITS, units)
    }

    pub fn screen_height_units(&self) -> Result<u16, String> {
        self.require_version(5, None, "screen height in units")?;
        self.get_word(SCREEN_HEIGHT_UNITS)
    }

    pub fn set_screen_height_units(&mut self, units: u16) -> Result<(), String> {
        self.require_version(5, None, "screen height in units")?;
        self.set_word(SCREEN_HEIGHT_UNITS, units)
    }

    // the two font bytes swap places between version 5 and 6
    fn font_width_field(&self) -> usize {
        if self.version() == 5 {
            0x26
        } else {
            0x27
        }
    }

    fn font_height_field(&self) -> usize {
        if self.version() == 5 {
            0x27
        } else {
            0x26
        }
    }

    pub fn font_width(&self) -> Result<u8, String> {
        self.require_version(5, None, "font width")?;
        self.get_byte(self.font_width_field())
    }

    pub fn set_font_width(&mut self, units: u8) -> Result<(), String> {
        self.require_version(5, None, "font width")?;
        self.set_byte(self.font_width_field(), units)
    }

    pub fn font_height(&self) -> Result<u8, String> {
        self.require_version(5, None, "font height")?;
        self.get_byte(self.font_height_field())
    }

    pub fn set_font_height(&mut self, units: u8) -> Result<(), String> {
        self.require_version(5, None, "font height")?;
        self.set_byte(self.font_height_field(), units)
    }

    pub fn routines_offset(&self) -> Result<u16, String> {
        self.require_version(6, Some(7), "routines offset")?;
        self.get_word(ROUTINES_OFFSET)
    }

    pub fn strings_offset(&self) -> Result<u16, String> {
        self.require_version(6, Some(7), "static strings offset")?;
        self.get_word(STRINGS_OFFSET)
    }

    pub fn default_background(&self) -> Result<u8, String> {
        self.require_version(5, None, "default background colour")?;
        self.get_byte(DEFAULT_BACKGROUND)
    }

    pub fn set_default_background(&mut self, colour: u8) -> Result<(), String> {
        self.require_version(5, None, "default background colour")?;
        self.set_byte(DEFAULT_BACKGROUND, colour)
    }

    pub fn default_foreground(&self) -> Result<u8, String> {
        self.require_version(5, None, "default foreground colour")?;
        self.get_byte(DEFAULT_FOREGROUND)
    }

    pub fn set_default_foreground(&mut self, colour: u8) -> Result<(), String> {
        self.require_version(5, None, "default foreground colour")?;
        self.set_byte(DEFAULT_FOREGROUND, colour)
    }

    pub fn terminating_chars_table(&self) -> Result<usize, String> {
        self.require_version(5, None, "terminating characters table")?;
        Ok(self.get_word(TERMINATING_CHARS)? as usize)
    }

    pub fn stream3_width(&self) -> Result<u16, String> {
        self.require_version(6, None, "stream 3 pixel width")?;
        self.get_word(STREAM3_WIDTH)
    }

    pub fn standard_revision(&self) -> Result<u16, String> {
        self.get_word(STANDARD_REVISION)
    }

    pub fn set_standard_revision(&mut self, major: u8, minor: u8) -> Result<(), String> {
        self.set_word(STANDARD_REVISION, ((major as u16) << 8) | minor as u16)
    }

    pub fn abbreviations_table(&self) -> Result<usize, String> {
        self.require_version(2, None, "abbreviations table")?;
        Ok(self.get_word(ABBREVIATIONS)? as usize)
    }

    pub fn alphabet_table(&self) -> Result<usize, String> {
        self.require_version(5, None, "alphabet table")?;
        Ok(self.get_word(ALPHABET_TABLE)? as usize)
    }

    pub fn header_extension_table(&self) -> Result<usize, String> {
        self.require_version(5, None, "header extension table")?;
        Ok(self.get_word(HEADER_EXTENSION)? as usize)
    }

    /// Word `n` (1-based) of the header extension table, if the table is that long
    pub fn header_extension_word(&self, n: usize) -> Result<Option<u16>, String> {
        let table = self.header_extension_table()?;
        if table == 0 {
            return Ok(None);
        }
        let count = self.get_word(table)? as usize;
        if n == 0 || n > count {
            return Ok(None);
        }
        Ok(Some(self.get_word(table + 2 * n)?))
    }

    pub fn unicode_table(&self) -> Result<usize, String> {
        Ok(self.header_extension_word(3)?.unwrap_or(0) as usize)
    }

    /// Advertise what this interpreter can do. Runs at load and at restart.
    pub fn init_interpreter_fields(&mut self, config: &EngineConfig) -> Result<(), String> {
        let version = self.version();
        if version < 4 {
            self.set_status_line_available(true)?;
            self.set_screen_split_available(true)?;
            self.set_variable_pitch_default(true)?;
        } else {
            if version >= 5 {
                self.set_colour_available(true)?;
            }
            self.set_bold_available(true)?;
            self.set_italic_available(true)?;
            self.set_fixed_space_available(true)?;
            self.set_timed_input_available(true)?;

            self.set_interpreter_number(config.interpreter_number)?;
            self.set_interpreter_version(config.interpreter_version)?;
            self.set_screen_height_lines(config.screen_height)?;
            self.set_screen_width_chars(config.screen_width)?;
        }

        self.set_standard_revision(1, 0)?;

        if version >= 5 {
            self.set_screen_width_units(config.screen_width as u16)?;
            self.set_screen_height_units(config.screen_height as u16)?;
            self.set_default_background(COLOUR_YELLOW)?;
            self.set_default_foreground(COLOUR_BLACK)?;
            self.set_font_width(1)?;
            self.set_font_height(1)?;
        }

        self.set_transcripting(config.transcript)?;
        debug!("header: interpreter fields initialised for v{}", version);
        Ok(())
    }
}
