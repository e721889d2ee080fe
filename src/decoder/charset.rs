//! Character set handling for byte-mode segments: ECI designators and the
//! heuristic used when a symbol carries none.

use encoding_rs::Encoding;

use crate::error::{DecodeError, Result};

/// Character encodings a byte segment may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// ISO-8859-1, the QR default when no ECI is present.
    Latin1,
    /// US-ASCII; decoded as latin-1 with a validity check.
    Ascii,
    ShiftJis,
    Utf8,
    /// Anything else `encoding_rs` knows, selected through an ECI.
    Other(&'static Encoding),
}

/// Map an ECI designator to its character set. Unknown designators are a
/// format error; values above 899 (structured append and application
/// indicators live there) are out of the character-set range entirely.
pub fn for_eci(value: u32) -> Result<Charset> {
    use encoding_rs::*;
    let charset = match value {
        0..=2 => Charset::Latin1, // CP437 readings are latin-1 in practice
        3 => Charset::Latin1,
        4 => Charset::Other(ISO_8859_2),
        5 => Charset::Other(ISO_8859_3),
        6 => Charset::Other(ISO_8859_4),
        7 => Charset::Other(ISO_8859_5),
        8 => Charset::Other(ISO_8859_6),
        9 => Charset::Other(ISO_8859_7),
        10 => Charset::Other(ISO_8859_8),
        12 => Charset::Other(ISO_8859_10),
        15 => Charset::Other(ISO_8859_13),
        16 => Charset::Other(ISO_8859_14),
        17 => Charset::Other(ISO_8859_15),
        18 => Charset::Other(ISO_8859_16),
        20 => Charset::ShiftJis,
        21 => Charset::Other(WINDOWS_1250),
        22 => Charset::Other(WINDOWS_1251),
        23 => Charset::Other(WINDOWS_1252),
        24 => Charset::Other(WINDOWS_1256),
        25 => Charset::Other(UTF_16BE),
        26 => Charset::Utf8,
        27 | 170 => Charset::Ascii,
        28 => Charset::Other(BIG5),
        29 => Charset::Other(GB18030),
        30 => Charset::Other(EUC_KR),
        _ => return Err(DecodeError::Format),
    };
    Ok(charset)
}

/// Guess the charset of a byte segment with no active ECI.
///
/// Valid UTF-8 wins; a Shift-JIS lead/trail shape comes next; everything
/// else is read as ISO-8859-1.
pub fn guess(bytes: &[u8]) -> Charset {
    if bytes.is_ascii() {
        return Charset::Latin1;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Charset::Utf8;
    }
    if looks_like_shift_jis(bytes) {
        return Charset::ShiftJis;
    }
    Charset::Latin1
}

fn looks_like_shift_jis(bytes: &[u8]) -> bool {
    let mut i = 0;
    let mut double_byte_pairs = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            // Single-byte: ASCII or half-width katakana.
            0x00..=0x7F | 0xA1..=0xDF => i += 1,
            // Double-byte lead.
            0x81..=0x9F | 0xE0..=0xEF => {
                if i + 1 >= bytes.len() {
                    return false;
                }
                let trail = bytes[i + 1];
                if !(0x40..=0xFC).contains(&trail) || trail == 0x7F {
                    return false;
                }
                double_byte_pairs += 1;
                i += 2;
            }
            _ => return false,
        }
    }
    double_byte_pairs > 0
}

/// Decode `bytes` under `charset` into UTF-8; undecodable input is a format
/// error.
pub fn decode(bytes: &[u8], charset: Charset) -> Result<String> {
    match charset {
        Charset::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        Charset::Ascii => {
            if bytes.is_ascii() {
                Ok(bytes.iter().map(|&b| b as char).collect())
            } else {
                Err(DecodeError::Format)
            }
        }
        Charset::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::Format),
        Charset::ShiftJis => decode_with(encoding_rs::SHIFT_JIS, bytes),
        Charset::Other(encoding) => decode_with(encoding, bytes),
    }
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|s| s.into_owned())
        .ok_or(DecodeError::Format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eci_designators() {
        assert_eq!(for_eci(3).unwrap(), Charset::Latin1);
        assert_eq!(for_eci(20).unwrap(), Charset::ShiftJis);
        assert_eq!(for_eci(26).unwrap(), Charset::Utf8);
        assert!(matches!(for_eci(29).unwrap(), Charset::Other(_)));
        assert_eq!(for_eci(900), Err(DecodeError::Format));
        assert_eq!(for_eci(11), Err(DecodeError::Format));
    }

    #[test]
    fn guesses_utf8_for_multibyte_sequences() {
        assert_eq!(guess("héllo".as_bytes()), Charset::Utf8);
        assert_eq!(guess("日本".as_bytes()), Charset::Utf8);
    }

    #[test]
    fn guesses_ascii_as_latin1() {
        assert_eq!(guess(b"plain ascii"), Charset::Latin1);
    }

    #[test]
    fn guesses_shift_jis_pairs() {
        // "日本" in Shift-JIS: 0x93 0xFA 0x96 0x7B. Not valid UTF-8.
        assert_eq!(guess(&[0x93, 0xFA, 0x96, 0x7B]), Charset::ShiftJis);
    }

    #[test]
    fn lone_high_bytes_fall_back_to_latin1() {
        // Latin-1 "café": the trailing 0xE9 cannot open a Shift-JIS pair.
        assert_eq!(guess(&[0x63, 0x61, 0x66, 0xE9]), Charset::Latin1);
    }

    #[test]
    fn decodes_each_charset() {
        assert_eq!(decode(&[0x63, 0xE9], Charset::Latin1).unwrap(), "cé");
        assert_eq!(
            decode(&[0x93, 0xFA, 0x96, 0x7B], Charset::ShiftJis).unwrap(),
            "日本"
        );
        assert_eq!(decode("日本".as_bytes(), Charset::Utf8).unwrap(), "日本");
        assert_eq!(decode(&[0xFF, 0xFE], Charset::Utf8), Err(DecodeError::Format));
        assert_eq!(decode(&[0x80], Charset::Ascii), Err(DecodeError::Format));
    }
}
