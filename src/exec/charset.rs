//! exec::charset
//!
//! Encoding of client stdin and decoding of client output according to
//! `P4CHARSET`.
//!
//! Supported: the UTF-8 variants, UTF-16, ISO-8859-1 and the two Latin
//! code pages that differ from it in a handful of bytes (`winansi`, which
//! is Windows-1252, and `iso8859-15`). Multi-byte code pages such as
//! `shiftjis` or `eucjp` and the Cyrillic and Greek pages are reported as
//! unsupported and callers fall back to UTF-8.

use thiserror::Error;

/// Encoding problems. Callers recover by using UTF-8.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CharsetError {
    #[error("unsupported charset '{0}'")]
    Unsupported(String),

    #[error("character {ch:?} cannot be encoded in {charset}")]
    Unmappable { ch: char, charset: &'static str },
}

/// Windows-1252 bytes that differ from ISO-8859-1. The unassigned bytes
/// 0x81, 0x8D, 0x8F, 0x90 and 0x9D keep their C1 meaning.
const WINDOWS_1252: &[(u8, char)] = &[
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

/// ISO-8859-15 bytes that differ from ISO-8859-1.
const ISO_8859_15: &[(u8, char)] = &[
    (0xA4, '\u{20AC}'),
    (0xA6, '\u{0160}'),
    (0xA8, '\u{0161}'),
    (0xB4, '\u{017D}'),
    (0xB8, '\u{017E}'),
    (0xBC, '\u{0152}'),
    (0xBD, '\u{0153}'),
    (0xBE, '\u{0178}'),
];

/// A supported `P4CHARSET` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Latin1,
    Latin9,
    Windows1252,
    Utf16Le,
    Utf16Be,
}

impl Charset {
    /// Map a `P4CHARSET` name. `None`, `none` and `auto` mean UTF-8.
    pub fn from_p4_name(name: Option<&str>) -> Result<Self, CharsetError> {
        let Some(name) = name else {
            return Ok(Charset::Utf8);
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "auto" | "utf8" | "utf8-bom" | "utf8unchecked"
            | "utf8unchecked-bom" => Ok(Charset::Utf8),
            "iso8859-1" => Ok(Charset::Latin1),
            "iso8859-15" => Ok(Charset::Latin9),
            "winansi" => Ok(Charset::Windows1252),
            "utf16" | "utf16le" | "utf16le-bom" | "utf16-nobom" => Ok(Charset::Utf16Le),
            "utf16be" | "utf16be-bom" => Ok(Charset::Utf16Be),
            other => Err(CharsetError::Unsupported(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf8",
            Charset::Latin1 => "iso8859-1",
            Charset::Latin9 => "iso8859-15",
            Charset::Windows1252 => "winansi",
            Charset::Utf16Le => "utf16le",
            Charset::Utf16Be => "utf16be",
        }
    }

    /// Single-byte overrides on top of ISO-8859-1.
    fn patches(self) -> &'static [(u8, char)] {
        match self {
            Charset::Latin9 => ISO_8859_15,
            Charset::Windows1252 => WINDOWS_1252,
            _ => &[],
        }
    }

    fn encode_char(self, ch: char) -> Result<u8, CharsetError> {
        let patches = self.patches();
        if let Some(&(byte, _)) = patches.iter().find(|&&(_, c)| c == ch) {
            return Ok(byte);
        }
        match u8::try_from(u32::from(ch)) {
            Ok(byte) if !patches.iter().any(|&(b, _)| b == byte) => Ok(byte),
            _ => Err(CharsetError::Unmappable {
                ch,
                charset: self.name(),
            }),
        }
    }

    fn decode_byte(self, byte: u8) -> char {
        self.patches()
            .iter()
            .find(|&&(b, _)| b == byte)
            .map_or(char::from(byte), |&(_, ch)| ch)
    }

    /// Encode text for the client's stdin.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, CharsetError> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::Latin1 | Charset::Latin9 | Charset::Windows1252 => {
                text.chars().map(|ch| self.encode_char(ch)).collect()
            }
            Charset::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Charset::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }

    /// Decode client output. Invalid sequences become U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 | Charset::Latin9 | Charset::Windows1252 => {
                bytes.iter().map(|&b| self.decode_byte(b)).collect()
            }
            Charset::Utf16Le | Charset::Utf16Be => {
                let units: Vec<u16> = bytes
                    .chunks(2)
                    .map(|pair| {
                        let pair = [pair[0], *pair.get(1).unwrap_or(&0)];
                        if self == Charset::Utf16Le {
                            u16::from_le_bytes(pair)
                        } else {
                            u16::from_be_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_charsets() {
        assert_eq!(Charset::from_p4_name(None), Ok(Charset::Utf8));
        assert_eq!(Charset::from_p4_name(Some("none")), Ok(Charset::Utf8));
        assert_eq!(Charset::from_p4_name(Some("ISO8859-1")), Ok(Charset::Latin1));
        assert!(matches!(
            Charset::from_p4_name(Some("shiftjis")),
            Err(CharsetError::Unsupported(_))
        ));
    }

    #[test]
    fn latin1_rejects_wide_chars() {
        assert_eq!(Charset::Latin1.encode("café").unwrap(), b"caf\xe9".to_vec());
        assert!(Charset::Latin1.encode("日本").is_err());
    }

    #[test]
    fn decode_inverts_encode() {
        for charset in [
            Charset::Utf8,
            Charset::Latin1,
            Charset::Latin9,
            Charset::Windows1252,
            Charset::Utf16Le,
            Charset::Utf16Be,
        ] {
            let text = "Change 42: façade";
            let bytes = charset.encode(text).unwrap();
            assert_eq!(charset.decode(&bytes), text);
        }
    }

    #[test]
    fn windows_1252_uses_its_own_high_bytes() {
        assert_eq!(Charset::from_p4_name(Some("winansi")), Ok(Charset::Windows1252));
        assert_eq!(
            Charset::Windows1252.encode("\u{20AC}5 \u{2014} caf\u{E9}").unwrap(),
            b"\x805 \x97 caf\xe9".to_vec()
        );
        assert_eq!(Charset::Windows1252.decode(b"\x93ok\x94"), "\u{201C}ok\u{201D}");
        // unassigned bytes keep their C1 code points
        assert_eq!(Charset::Windows1252.decode(b"\x81"), "\u{81}");
        // C1 characters displaced by the code page cannot be encoded
        assert!(Charset::Windows1252.encode("\u{80}").is_err());
    }

    #[test]
    fn latin9_replaces_currency_sign_with_euro() {
        assert_eq!(Charset::from_p4_name(Some("iso8859-15")), Ok(Charset::Latin9));
        assert_eq!(Charset::Latin9.encode("\u{20AC}").unwrap(), vec![0xA4]);
        assert_eq!(Charset::Latin9.decode(&[0xA4, 0xE9]), "\u{20AC}\u{E9}");
        assert!(Charset::Latin9.encode("\u{A4}").is_err());
        assert_eq!(Charset::Latin1.decode(&[0xA4]), "\u{A4}");
    }
}
