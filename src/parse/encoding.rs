//! Single-byte text codecs used to turn a line into the bytes the splitter scans.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec applied to a line before splitting and to each word afterwards.
///
/// The IOC shell is byte oriented: every separator, quote and redirect
/// character is ASCII, so any codec that keeps ASCII bytes intact scans the
/// same way. `Latin1` maps each byte to exactly one char and is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StringEncoding {
    #[default]
    Latin1,
    Ascii,
    Utf8,
}

/// Encoding name not recognised by [`StringEncoding::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown string encoding: {0:?} (expected latin-1, ascii or utf-8)")]
pub struct UnknownEncoding(pub String);

impl StringEncoding {
    /// Canonical name, as written in config files.
    pub fn name(self) -> &'static str {
        match self {
            StringEncoding::Latin1 => "latin-1",
            StringEncoding::Ascii => "ascii",
            StringEncoding::Utf8 => "utf-8",
        }
    }

    /// Encode `text`, returning the first char the codec cannot represent.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, char> {
        match self {
            StringEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| c))
                .collect(),
            StringEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { Ok(c as u8) } else { Err(c) })
                .collect(),
            StringEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        }
    }

    /// Decode bytes produced by [`encode`](Self::encode) (or a compacted slice of them).
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            StringEncoding::Latin1 | StringEncoding::Ascii => {
                bytes.iter().map(|&b| char::from(b)).collect()
            }
            StringEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl FromStr for StringEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(StringEncoding::Latin1),
            "ascii" | "us-ascii" => Ok(StringEncoding::Ascii),
            "utf-8" | "utf8" => Ok(StringEncoding::Utf8),
            _ => Err(UnknownEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for StringEncoding {
    type Error = UnknownEncoding;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StringEncoding> for String {
    fn from(value: StringEncoding) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_latin1() {
        assert_eq!(StringEncoding::default(), StringEncoding::Latin1);
    }

    #[test]
    fn parse_aliases() {
        assert_eq!("LATIN_1".parse::<StringEncoding>(), Ok(StringEncoding::Latin1));
        assert_eq!("iso-8859-1".parse::<StringEncoding>(), Ok(StringEncoding::Latin1));
        assert_eq!("US-ASCII".parse::<StringEncoding>(), Ok(StringEncoding::Ascii));
        assert_eq!("utf8".parse::<StringEncoding>(), Ok(StringEncoding::Utf8));
    }

    #[test]
    fn parse_unknown() {
        let err = "ebcdic".parse::<StringEncoding>().unwrap_err();
        assert_eq!(err, UnknownEncoding("ebcdic".into()));
    }

    #[test]
    fn latin1_maps_bytes_to_chars() {
        let bytes = StringEncoding::Latin1.encode("caf\u{e9}").unwrap();
        assert_eq!(bytes, b"caf\xe9");
        assert_eq!(StringEncoding::Latin1.decode(&bytes), "caf\u{e9}");
    }

    #[test]
    fn latin1_rejects_wide_chars() {
        assert_eq!(StringEncoding::Latin1.encode("a\u{3b1}b"), Err('\u{3b1}'));
    }

    #[test]
    fn ascii_rejects_high_chars() {
        assert_eq!(StringEncoding::Ascii.encode("caf\u{e9}"), Err('\u{e9}'));
    }

    #[test]
    fn utf8_passes_through() {
        let bytes = StringEncoding::Utf8.encode("\u{3b1}\u{3b2}").unwrap();
        assert_eq!(StringEncoding::Utf8.decode(&bytes), "\u{3b1}\u{3b2}");
    }
}
