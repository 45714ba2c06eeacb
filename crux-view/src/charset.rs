//! Encoding of generated host pages into the configured output charset.

use crate::error::{ViewError, ViewResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCharset {
    Utf8,
    /// Big endian with a leading byte order mark.
    Utf16,
    Utf16Be,
    Utf16Le,
    Latin1,
    Ascii,
}

/// Written in place of characters the charset cannot represent.
const REPLACEMENT: u8 = b'?';

impl OutputCharset {
    /// Resolve a charset name; case and `-`/`_` spelling are ignored.
    pub fn from_name(name: &str) -> ViewResult<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "utf8" => Ok(OutputCharset::Utf8),
            "utf16" => Ok(OutputCharset::Utf16),
            "utf16be" => Ok(OutputCharset::Utf16Be),
            "utf16le" => Ok(OutputCharset::Utf16Le),
            "iso88591" | "latin1" | "l1" => Ok(OutputCharset::Latin1),
            "usascii" | "ascii" => Ok(OutputCharset::Ascii),
            _ => Err(ViewError::UnsupportedCharset {
                charset: name.to_string(),
            }),
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            OutputCharset::Utf8 => text.as_bytes().to_vec(),
            OutputCharset::Utf16 => {
                let mut out = vec![0xFE, 0xFF];
                out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
                out
            }
            OutputCharset::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            OutputCharset::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            OutputCharset::Latin1 => encode_single_byte(text, 0xFF),
            OutputCharset::Ascii => encode_single_byte(text, 0x7F),
        }
    }
}

fn encode_single_byte(text: &str, max: u32) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= max {
                code as u8
            } else {
                REPLACEMENT
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(OutputCharset::from_name("UTF-8").unwrap(), OutputCharset::Utf8);
        assert_eq!(OutputCharset::from_name("utf_16le").unwrap(), OutputCharset::Utf16Le);
        assert_eq!(OutputCharset::from_name("ISO-8859-1").unwrap(), OutputCharset::Latin1);
        assert!(matches!(
            OutputCharset::from_name("EBCDIC"),
            Err(ViewError::UnsupportedCharset { .. })
        ));
    }

    #[test]
    fn test_latin1_replaces_unmappable() {
        let bytes = OutputCharset::Latin1.encode("é€");
        assert_eq!(bytes, vec![0xE9, b'?']);
    }

    #[test]
    fn test_utf16_has_bom() {
        let bytes = OutputCharset::Utf16.encode("A");
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0x41]);
        assert_eq!(OutputCharset::Utf16Le.encode("A"), vec![0x41, 0x00]);
    }
}
