//! 16-bit arithmetic as the story sees it
//!
//! Values travel as `u16`. Bit 15 is the sign for ordinary arithmetic and
//! comparisons; branch offsets use a 14-bit encoding with bit 13 as sign.

/// Interpret a word as a signed 16-bit value
pub fn to_signed(value: u16) -> i16 {
    value as i16
}

/// Sign-extend a 14-bit branch offset
pub fn signed_14(value: u16) -> i16 {
    let value = value & 0x3FFF;
    if value & 0x2000 != 0 {
        (value | 0xC000) as i16
    } else {
        value as i16
    }
}

pub fn add(a: u16, b: u16) -> u16 {
    a.wrapping_add(b)
}

pub fn sub(a: u16, b: u16) -> u16 {
    a.wrapping_sub(b)
}

pub fn mul(a: u16, b: u16) -> u16 {
    a.wrapping_mul(b)
}

/// Signed division rounding toward negative infinity
pub fn div(a: u16, b: u16) -> Result<u16, String> {
    if b == 0 {
        return Err("Division by zero".to_string());
    }
    let (a, b) = (to_signed(a) as i32, to_signed(b) as i32);
    Ok(a.div_euclid(b).wrapping_add(floor_adjust(a, b)) as u16)
}

/// Remainder matching `div`, so `a == b * div(a, b) + rem(a, b)`
pub fn rem(a: u16, b: u16) -> Result<u16, String> {
    if b == 0 {
        return Err("Modulo by zero".to_string());
    }
    let (sa, sb) = (to_signed(a) as i32, to_signed(b) as i32);
    let q = to_signed(div(a, b)?) as i32;
    Ok((sa - sb * q) as u16)
}

// div_euclid rounds toward negative infinity only for positive divisors
fn floor_adjust(a: i32, b: i32) -> i32 {
    if b < 0 && a.rem_euclid(b) != 0 {
        -1
    } else {
        0
    }
}

/// Signed less-than
pub fn lt(a: u16, b: u16) -> bool {
    to_signed(a) < to_signed(b)
}

/// Signed greater-than
pub fn gt(a: u16, b: u16) -> bool {
    to_signed(a) > to_signed(b)
}
