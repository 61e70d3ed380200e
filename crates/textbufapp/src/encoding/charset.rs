use crate::error::{BufferError, Result};
use crate::model::ByteOrderMark;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Utf8,
    Utf16,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
    Whatwg(&'static Encoding),
}

/// Labels handled without going through the WHATWG label table. WHATWG maps
/// `iso-8859-1` and `us-ascii` to windows-1252, which would silently accept
/// characters those charsets cannot represent.
static BUILTIN_LABELS: Lazy<HashMap<&'static str, Charset>> = Lazy::new(|| {
    let mut labels = HashMap::new();
    for label in ["utf-8", "utf8", "unicode-1-1-utf-8"] {
        labels.insert(label, Charset::UTF_8);
    }
    for label in ["utf-16", "utf16", "unicode", "ucs-2"] {
        labels.insert(label, Charset::UTF_16);
    }
    for label in ["utf-16le", "utf16le", "x-utf-16le"] {
        labels.insert(label, Charset::UTF_16LE);
    }
    for label in ["utf-16be", "utf16be", "x-utf-16be"] {
        labels.insert(label, Charset::UTF_16BE);
    }
    for label in [
        "iso-8859-1",
        "iso8859-1",
        "iso_8859-1",
        "iso8859_1",
        "latin1",
        "l1",
        "cp819",
        "ibm819",
    ] {
        labels.insert(label, Charset::ISO_8859_1);
    }
    for label in ["us-ascii", "ascii", "646", "iso646-us", "ansi_x3.4-1968"] {
        labels.insert(label, Charset::US_ASCII);
    }
    labels
});

/// A resolved character encoding that can decode bytes and encode text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    name: &'static str,
    codec: Codec,
}

impl Charset {
    pub const UTF_8: Charset = Charset {
        name: "UTF-8",
        codec: Codec::Utf8,
    };
    /// Byte order taken from the mark when reading, big-endian when there is
    /// none. Always written big-endian with its mark.
    pub const UTF_16: Charset = Charset {
        name: "UTF-16",
        codec: Codec::Utf16,
    };
    pub const UTF_16LE: Charset = Charset {
        name: "UTF-16LE",
        codec: Codec::Utf16Le,
    };
    pub const UTF_16BE: Charset = Charset {
        name: "UTF-16BE",
        codec: Codec::Utf16Be,
    };
    pub const ISO_8859_1: Charset = Charset {
        name: "ISO-8859-1",
        codec: Codec::Latin1,
    };
    pub const US_ASCII: Charset = Charset {
        name: "US-ASCII",
        codec: Codec::Ascii,
    };

    /// Look up a charset by name or alias, case-insensitively.
    ///
    /// Fails with [`BufferError::IllegalEncodingName`] when the name is not
    /// syntactically a charset name, and with [`BufferError::UnsupportedEncoding`]
    /// when it is well formed but unknown.
    pub fn for_name(name: &str) -> Result<Charset> {
        if !is_legal_name(name) {
            return Err(BufferError::IllegalEncodingName(name.to_string()));
        }

        let label = name.to_ascii_lowercase();
        if let Some(charset) = BUILTIN_LABELS.get(label.as_str()) {
            return Ok(*charset);
        }

        match Encoding::for_label_no_replacement(label.as_bytes()) {
            Some(enc) if enc == encoding_rs::UTF_8 => Ok(Charset::UTF_8),
            Some(enc) if enc == encoding_rs::UTF_16LE => Ok(Charset::UTF_16LE),
            Some(enc) if enc == encoding_rs::UTF_16BE => Ok(Charset::UTF_16BE),
            Some(enc) => Ok(Charset {
                name: enc.name(),
                codec: Codec::Whatwg(enc),
            }),
            None => Err(BufferError::UnsupportedEncoding(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The mark written in front of content for charsets that have one.
    /// `UTF-16` handles its mark itself and reports none here.
    pub fn byte_order_mark(&self) -> Option<ByteOrderMark> {
        match self.codec {
            Codec::Utf8 => Some(ByteOrderMark::Utf8),
            Codec::Utf16Le => Some(ByteOrderMark::Utf16Le),
            Codec::Utf16Be => Some(ByteOrderMark::Utf16Be),
            _ => None,
        }
    }

    /// Decode bytes to text. Malformed sequences become U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        self.decode_checked(bytes).0
    }

    /// Decode bytes to text, also reporting whether any malformed sequence had
    /// to be replaced with U+FFFD.
    pub fn decode_checked(&self, bytes: &[u8]) -> (String, bool) {
        let (text, had_errors) = match self.codec {
            Codec::Utf8 => encoding_rs::UTF_8.decode_without_bom_handling(bytes),
            Codec::Utf16 => match ByteOrderMark::detect(bytes) {
                Some(ByteOrderMark::Utf16Le) => {
                    encoding_rs::UTF_16LE.decode_without_bom_handling(&bytes[2..])
                }
                Some(ByteOrderMark::Utf16Be) => {
                    encoding_rs::UTF_16BE.decode_without_bom_handling(&bytes[2..])
                }
                _ => encoding_rs::UTF_16BE.decode_without_bom_handling(bytes),
            },
            Codec::Utf16Le => encoding_rs::UTF_16LE.decode_without_bom_handling(bytes),
            Codec::Utf16Be => encoding_rs::UTF_16BE.decode_without_bom_handling(bytes),
            Codec::Latin1 => (encoding_rs::mem::decode_latin1(bytes), false),
            Codec::Ascii => {
                let malformed = !bytes.is_ascii();
                let text = bytes
                    .iter()
                    .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                    .collect();
                return (text, malformed);
            }
            Codec::Whatwg(enc) => enc.decode_without_bom_handling(bytes),
        };
        (text.into_owned(), had_errors)
    }

    /// Encode text. Fails on the first character the charset cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self.codec {
            Codec::Utf8 => Ok(text.as_bytes().to_vec()),
            Codec::Utf16 => Ok(ByteOrderMark::Utf16Be
                .bytes()
                .iter()
                .copied()
                .chain(text.encode_utf16().flat_map(u16::to_be_bytes))
                .collect()),
            Codec::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Codec::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Codec::Latin1 => self.encode_single_byte(text, 0xFF),
            Codec::Ascii => self.encode_single_byte(text, 0x7F),
            Codec::Whatwg(enc) => {
                let (bytes, _, had_unmappable) = enc.encode(text);
                if had_unmappable {
                    return Err(self.mapping_failed(first_unmappable(enc, text)));
                }
                Ok(bytes.into_owned())
            }
        }
    }

    fn encode_single_byte(&self, text: &str, max: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len());
        for c in text.chars() {
            if c as u32 > max {
                return Err(self.mapping_failed(c));
            }
            out.push(c as u32 as u8);
        }
        Ok(out)
    }

    fn mapping_failed(&self, character: char) -> BufferError {
        BufferError::CharsetMappingFailed {
            charset: self.name.to_string(),
            character,
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn first_unmappable(enc: &'static Encoding, text: &str) -> char {
    let mut buf = [0u8; 4];
    text.chars()
        .find(|c| enc.encode(c.encode_utf8(&mut buf)).2)
        .unwrap_or('\u{FFFD}')
}

/// Charset names start with a letter or digit and continue with letters,
/// digits, `-`, `+`, `.`, `:` or `_`.
fn is_legal_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | ':' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(Charset::for_name("utf-8").unwrap(), Charset::UTF_8);
        assert_eq!(Charset::for_name("UTF8").unwrap(), Charset::UTF_8);
        assert_eq!(Charset::for_name("Latin1").unwrap(), Charset::ISO_8859_1);
        assert_eq!(Charset::for_name("UTF-16LE").unwrap(), Charset::UTF_16LE);
    }

    #[test]
    fn test_whatwg_charsets_resolve() {
        assert_eq!(Charset::for_name("windows-1252").unwrap().name(), "windows-1252");
        assert_eq!(Charset::for_name("Shift_JIS").unwrap().name(), "Shift_JIS");
        assert_eq!(Charset::for_name("UTF-16").unwrap(), Charset::UTF_16);
        assert_eq!(Charset::for_name("utf-16").unwrap().name(), "UTF-16");
    }

    #[test]
    fn test_utf16_follows_the_mark() {
        assert_eq!(Charset::UTF_16.decode(b"\xFE\xFF\x00h\x00i"), "hi");
        assert_eq!(Charset::UTF_16.decode(b"\xFF\xFEh\x00i\x00"), "hi");
        // No mark means big-endian
        assert_eq!(Charset::UTF_16.decode(b"\x00h\x00i"), "hi");
    }

    #[test]
    fn test_utf16_writes_big_endian_with_mark() {
        let bytes = Charset::UTF_16.encode("hi").unwrap();
        assert_eq!(bytes, b"\xFE\xFF\x00h\x00i");
        assert_eq!(Charset::UTF_16.decode(&bytes), "hi");
        assert_eq!(Charset::UTF_16.byte_order_mark(), None);
    }

    #[test]
    fn test_decode_checked_reports_malformed_input() {
        assert_eq!(
            Charset::UTF_8.decode_checked(b"caf\xE9"),
            ("caf\u{FFFD}".to_string(), true)
        );
        assert_eq!(
            Charset::UTF_8.decode_checked("café".as_bytes()),
            ("café".to_string(), false)
        );
        assert!(Charset::US_ASCII.decode_checked(b"a\xE9").1);
        assert!(!Charset::ISO_8859_1.decode_checked(b"caf\xE9").1);
        assert!(Charset::UTF_16LE.decode_checked(b"a").1);
    }

    #[test]
    fn test_illegal_vs_unsupported_names() {
        assert!(matches!(
            Charset::for_name("x-no-such-charset"),
            Err(BufferError::UnsupportedEncoding(_))
        ));
        assert!(matches!(
            Charset::for_name("bad name"),
            Err(BufferError::IllegalEncodingName(_))
        ));
        assert!(matches!(
            Charset::for_name("-leading"),
            Err(BufferError::IllegalEncodingName(_))
        ));
        assert!(matches!(
            Charset::for_name(""),
            Err(BufferError::IllegalEncodingName(_))
        ));
    }

    #[test]
    fn test_round_trip_representable_texts() {
        let cases = [
            (Charset::UTF_8, "café ☕ 日本"),
            (Charset::UTF_16LE, "café ☕ 日本 𝄞"),
            (Charset::UTF_16BE, "café ☕ 日本 𝄞"),
            (Charset::ISO_8859_1, "café ÿ\u{80}"),
            (Charset::US_ASCII, "plain text\n"),
            (Charset::for_name("windows-1252").unwrap(), "café €"),
            (Charset::for_name("Shift_JIS").unwrap(), "日本語"),
        ];
        for (charset, text) in cases {
            let bytes = charset.encode(text).unwrap();
            assert_eq!(charset.decode(&bytes), text, "charset {}", charset);
        }
    }

    #[test]
    fn test_latin1_is_not_windows_1252() {
        // 0x80 is a C1 control in Latin-1 but the euro sign in windows-1252
        assert_eq!(Charset::ISO_8859_1.decode(&[0x80]), "\u{80}");
        assert_eq!(Charset::for_name("windows-1252").unwrap().decode(&[0x80]), "€");
    }

    #[test]
    fn test_unmappable_character_fails() {
        let err = Charset::US_ASCII.encode("naïve").unwrap_err();
        match err {
            BufferError::CharsetMappingFailed { charset, character } => {
                assert_eq!(charset, "US-ASCII");
                assert_eq!(character, 'ï');
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = Charset::ISO_8859_1.encode("price: €5").unwrap_err();
        assert!(matches!(err, BufferError::CharsetMappingFailed { character: '€', .. }));

        let sjis = Charset::for_name("Shift_JIS").unwrap();
        let err = sjis.encode("日本 😀").unwrap_err();
        assert!(matches!(err, BufferError::CharsetMappingFailed { character: '😀', .. }));
    }

    #[test]
    fn test_ascii_decode_replaces_high_bytes() {
        assert_eq!(Charset::US_ASCII.decode(&[b'a', 0xE9]), "a\u{FFFD}");
    }

    #[test]
    fn test_byte_order_marks() {
        assert_eq!(Charset::UTF_8.byte_order_mark(), Some(ByteOrderMark::Utf8));
        assert_eq!(Charset::UTF_16BE.byte_order_mark(), Some(ByteOrderMark::Utf16Be));
        assert_eq!(Charset::ISO_8859_1.byte_order_mark(), None);
    }
}
