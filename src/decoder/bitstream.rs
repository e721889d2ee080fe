//! Mode-dispatch decoding of the corrected data codewords into text.

use log::debug;

use crate::decoder::bits::BitSource;
use crate::decoder::charset::{self, Charset};
use crate::error::{DecodeError, Result};
use crate::models::{Decoded, EcLevel, StructuredAppend, Version};

const ALPHANUMERIC_CHARS: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// GS1 group separator substituted for a lone `%` under FNC1.
const GS: char = '\u{1d}';

/// Segment mode indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Terminator,
    Numeric,
    Alphanumeric,
    StructuredAppend,
    Byte,
    Fnc1FirstPosition,
    Eci,
    Kanji,
    Fnc1SecondPosition,
}

impl Mode {
    fn for_bits(bits: u32) -> Result<Self> {
        match bits {
            0x0 => Ok(Mode::Terminator),
            0x1 => Ok(Mode::Numeric),
            0x2 => Ok(Mode::Alphanumeric),
            0x3 => Ok(Mode::StructuredAppend),
            0x4 => Ok(Mode::Byte),
            0x5 => Ok(Mode::Fnc1FirstPosition),
            0x7 => Ok(Mode::Eci),
            0x8 => Ok(Mode::Kanji),
            0x9 => Ok(Mode::Fnc1SecondPosition),
            // 0xD is Hanzi (GB2312); not handled.
            _ => Err(DecodeError::Format),
        }
    }

    /// Width of the character count field, by version class.
    fn character_count_bits(self, version: Version) -> Result<usize> {
        let index = match version.number() {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        let widths: [usize; 3] = match self {
            Mode::Numeric => [10, 12, 14],
            Mode::Alphanumeric => [9, 11, 13],
            Mode::Byte => [8, 16, 16],
            Mode::Kanji => [8, 10, 12],
            _ => return Err(DecodeError::Format),
        };
        Ok(widths[index])
    }
}

/// Parse the concatenated data codewords into the decoded payload.
pub fn decode(bytes: &[u8], version: Version, ec_level: EcLevel) -> Result<Decoded> {
    let mut bits = BitSource::new(bytes);
    let mut text = String::new();
    let mut byte_segments: Vec<Vec<u8>> = Vec::new();
    let mut structured_append = None;
    let mut current_charset: Option<Charset> = None;
    let mut fc1_in_effect = false;

    loop {
        // Short on bits for another indicator means an implicit terminator.
        let mode = if bits.available() < 4 {
            Mode::Terminator
        } else {
            Mode::for_bits(bits.read_bits(4)?)?
        };

        match mode {
            Mode::Terminator => break,
            Mode::Fnc1FirstPosition | Mode::Fnc1SecondPosition => {
                fc1_in_effect = true;
            }
            Mode::StructuredAppend => {
                if bits.available() < 16 {
                    return Err(DecodeError::Format);
                }
                structured_append = Some(StructuredAppend {
                    sequence: bits.read_bits(8)? as u8,
                    parity: bits.read_bits(8)? as u8,
                });
            }
            Mode::Eci => {
                let value = parse_eci_designator(&mut bits)?;
                current_charset = Some(charset::for_eci(value)?);
            }
            Mode::Numeric => {
                let count = bits.read_bits(mode.character_count_bits(version)?)? as usize;
                decode_numeric_segment(&mut bits, &mut text, count)?;
            }
            Mode::Alphanumeric => {
                let count = bits.read_bits(mode.character_count_bits(version)?)? as usize;
                decode_alphanumeric_segment(&mut bits, &mut text, count, fc1_in_effect)?;
            }
            Mode::Byte => {
                let count = bits.read_bits(mode.character_count_bits(version)?)? as usize;
                decode_byte_segment(&mut bits, &mut text, count, current_charset, &mut byte_segments)?;
            }
            Mode::Kanji => {
                let count = bits.read_bits(mode.character_count_bits(version)?)? as usize;
                decode_kanji_segment(&mut bits, &mut text, count)?;
            }
        }
    }

    debug!(
        "decoded {} chars, {} byte segment(s)",
        text.chars().count(),
        byte_segments.len()
    );
    Ok(Decoded {
        text,
        raw_bytes: bytes.to_vec(),
        byte_segments,
        version,
        ec_level,
        structured_append,
        mirrored: false,
    })
}

/// ECI designator: 1 to 3 bytes, length keyed by the top bits of the first.
fn parse_eci_designator(bits: &mut BitSource) -> Result<u32> {
    let first_byte = bits.read_bits(8)?;
    if first_byte & 0x80 == 0 {
        return Ok(first_byte & 0x7F);
    }
    if first_byte & 0xC0 == 0x80 {
        let second_byte = bits.read_bits(8)?;
        return Ok(((first_byte & 0x3F) << 8) | second_byte);
    }
    if first_byte & 0xE0 == 0xC0 {
        let second_third_bytes = bits.read_bits(16)?;
        return Ok(((first_byte & 0x1F) << 16) | second_third_bytes);
    }
    Err(DecodeError::Format)
}

/// Digits in groups of three (10 bits), two (7 bits), one (4 bits).
fn decode_numeric_segment(bits: &mut BitSource, text: &mut String, mut count: usize) -> Result<()> {
    while count >= 3 {
        let three_digits = bits.read_bits(10)?;
        if three_digits >= 1000 {
            return Err(DecodeError::Format);
        }
        text.push(digit(three_digits / 100)?);
        text.push(digit(three_digits / 10 % 10)?);
        text.push(digit(three_digits % 10)?);
        count -= 3;
    }
    if count == 2 {
        let two_digits = bits.read_bits(7)?;
        if two_digits >= 100 {
            return Err(DecodeError::Format);
        }
        text.push(digit(two_digits / 10)?);
        text.push(digit(two_digits % 10)?);
    } else if count == 1 {
        let one_digit = bits.read_bits(4)?;
        if one_digit >= 10 {
            return Err(DecodeError::Format);
        }
        text.push(digit(one_digit)?);
    }
    Ok(())
}

fn digit(value: u32) -> Result<char> {
    char::from_digit(value, 10).ok_or(DecodeError::Format)
}

/// Character pairs in 11 bits, a trailing single in 6; FNC1 escapes applied
/// afterwards over the freshly appended slice.
fn decode_alphanumeric_segment(
    bits: &mut BitSource,
    text: &mut String,
    mut count: usize,
    fc1_in_effect: bool,
) -> Result<()> {
    let start = text.len();
    while count > 1 {
        let pair = bits.read_bits(11)?;
        append_alphanumeric(text, pair / 45)?;
        append_alphanumeric(text, pair % 45)?;
        count -= 2;
    }
    if count == 1 {
        let single = bits.read_bits(6)?;
        append_alphanumeric(text, single)?;
    }

    if fc1_in_effect {
        // %% is a literal percent; a lone % is the GS1 separator.
        let rewritten: String = {
            let segment = &text[start..];
            let mut out = String::with_capacity(segment.len());
            let mut chars = segment.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '%' {
                    if chars.peek() == Some(&'%') {
                        chars.next();
                        out.push('%');
                    } else {
                        out.push(GS);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        };
        text.truncate(start);
        text.push_str(&rewritten);
    }
    Ok(())
}

fn append_alphanumeric(text: &mut String, index: u32) -> Result<()> {
    let index = index as usize;
    if index >= ALPHANUMERIC_CHARS.len() {
        return Err(DecodeError::Format);
    }
    text.push(ALPHANUMERIC_CHARS[index] as char);
    Ok(())
}

/// 8-bit bytes, interpreted in the active ECI charset or sniffed.
fn decode_byte_segment(
    bits: &mut BitSource,
    text: &mut String,
    count: usize,
    current_charset: Option<Charset>,
    byte_segments: &mut Vec<Vec<u8>>,
) -> Result<()> {
    if count * 8 > bits.available() {
        return Err(DecodeError::Format);
    }
    let mut read_bytes = Vec::with_capacity(count);
    for _ in 0..count {
        read_bytes.push(bits.read_bits(8)? as u8);
    }
    let charset = current_charset.unwrap_or_else(|| charset::guess(&read_bytes));
    text.push_str(&charset::decode(&read_bytes, charset)?);
    byte_segments.push(read_bytes);
    Ok(())
}

/// 13-bit pairs mapped back into two-byte Shift-JIS.
fn decode_kanji_segment(bits: &mut BitSource, text: &mut String, count: usize) -> Result<()> {
    if count * 13 > bits.available() {
        return Err(DecodeError::Format);
    }
    let mut sjis = Vec::with_capacity(2 * count);
    for _ in 0..count {
        let two_bytes = bits.read_bits(13)?;
        let assembled = (two_bytes / 0x0C0) << 8 | (two_bytes % 0x0C0);
        let assembled = if assembled < 0x01F00 {
            assembled + 0x08140
        } else {
            assembled + 0x0C140
        };
        sjis.push((assembled >> 8) as u8);
        sjis.push(assembled as u8);
    }
    text.push_str(&charset::decode(&sjis, Charset::ShiftJis)?);
    Ok(())
}
