//! # Encoding Resolution
//!
//! Text files do not say which charset they are in. This module decides, for a
//! given buffer, how its bytes become text and how its text becomes bytes again.
//!
//! ## Resolution Order (reading)
//!
//! 1. **Explicit override**: set by the user on the buffer. Always wins.
//! 2. **Content sniffing**: a [`ContentSniffer`] looks at a fresh stream on the
//!    content. A BOM or an XML declaration names a charset.
//! 3. **BOM without charset**: keep the charset resolved previously.
//! 4. **Default**: the [`DefaultEncodingProvider`] (config or platform locale).
//!
//! BOM detection always runs, even with an override: the override decides the
//! decoding charset, not whether the file starts with a mark.
//!
//! ## Resolution Order (writing)
//!
//! Override, then a sniff of the in-memory text (an XML declaration the user just
//! edited), then the charset the file was read with if it had a BOM, then the
//! default. See [`EncodingResolver::resolve_for_commit`].
//!
//! ## BOM Handling
//!
//! Codecs never see the mark. [`decode_content`] strips it before decoding and
//! [`encode_content`] puts it back in front of the encoded bytes, for UTF-8 and
//! the two UTF-16 byte orders. A BOM is only re-emitted when one was read.
//! The endian-neutral `UTF-16` is the exception: its codec reads the byte order
//! from the mark and always writes big-endian with a mark.
//!
//! ## Failure Modes
//!
//! - Unknown charset name → `UnsupportedEncoding`
//! - Malformed charset name → `IllegalEncodingName`
//! - Character not representable on write → `CharsetMappingFailed`; the text is
//!   fully encoded before any byte reaches the store, so nothing is written.
//! - Bytes invalid in the charset → decoded as U+FFFD and flagged on the
//!   [`Decoded`] result, so callers can refuse to write the lossy text back.
//! - Sniffer failure → ignored, next strategy applies.

use crate::error::Result;

pub mod charset;
pub mod platform;
pub mod resolver;
pub mod sniff;

pub use charset::Charset;
pub use platform::{DefaultEncodingProvider, FixedEncoding, PlatformEncoding};
pub use resolver::EncodingResolver;
pub use sniff::{BomSniffer, ContentSniffer};

/// Decoded text, and whether bytes invalid in the charset were replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub malformed: bool,
}

/// Decode stored bytes, consuming a leading BOM when one was recorded and it
/// belongs to `charset`.
pub fn decode_content(bytes: &[u8], charset_name: &str, has_bom: bool) -> Result<Decoded> {
    let charset = Charset::for_name(charset_name)?;
    let body = match charset.byte_order_mark() {
        Some(mark) if has_bom => bytes.strip_prefix(mark.bytes()).unwrap_or(bytes),
        _ => bytes,
    };
    let (text, malformed) = charset.decode_checked(body);
    Ok(Decoded { text, malformed })
}

/// Encode text for storage, prefixing the charset's BOM when one was recorded.
pub fn encode_content(text: &str, charset_name: &str, has_bom: bool) -> Result<Vec<u8>> {
    let charset = Charset::for_name(charset_name)?;
    let encoded = charset.encode(text)?;
    match charset.byte_order_mark() {
        Some(mark) if has_bom => {
            let mut out = Vec::with_capacity(mark.bytes().len() + encoded.len());
            out.extend_from_slice(mark.bytes());
            out.extend_from_slice(&encoded);
            Ok(out)
        }
        _ => Ok(encoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BufferError;

    #[test]
    fn test_utf8_bom_is_consumed_on_read() {
        let decoded = decode_content(b"\xEF\xBB\xBFcaf\xC3\xA9", "UTF-8", true).unwrap();
        assert_eq!(decoded.text, "café");
        assert!(!decoded.malformed);
    }

    #[test]
    fn test_utf8_bom_kept_when_not_recorded() {
        let decoded = decode_content(b"\xEF\xBB\xBFa", "UTF-8", false).unwrap();
        assert_eq!(decoded.text, "\u{FEFF}a");
    }

    #[test]
    fn test_utf8_bom_round_trip() {
        let bytes = encode_content("café", "UTF-8", true).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(decode_content(&bytes, "UTF-8", true).unwrap().text, "café");
    }

    #[test]
    fn test_utf16_bom_round_trip() {
        for charset in ["UTF-16LE", "UTF-16BE"] {
            let bytes = encode_content("日本 𝄞", charset, true).unwrap();
            assert_eq!(bytes.len(), 2 + 2 * "日本 𝄞".encode_utf16().count());
            assert_eq!(decode_content(&bytes, charset, true).unwrap().text, "日本 𝄞");
        }
    }

    #[test]
    fn test_utf16_mark_is_never_doubled() {
        let bytes = encode_content("hi", "UTF-16", true).unwrap();
        assert_eq!(bytes, b"\xFE\xFF\x00h\x00i");
        let decoded = decode_content(&bytes, "UTF-16", true).unwrap();
        assert_eq!(decoded.text, "hi");
    }

    #[test]
    fn test_latin1_bytes_flagged_as_malformed_utf8() {
        let decoded = decode_content(b"caf\xE9", "UTF-8", false).unwrap();
        assert_eq!(decoded.text, "caf\u{FFFD}");
        assert!(decoded.malformed);
    }

    #[test]
    fn test_no_bom_for_single_byte_charsets() {
        let bytes = encode_content("abc", "ISO-8859-1", true).unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[test]
    fn test_never_invents_bom() {
        let bytes = encode_content("abc", "UTF-8", false).unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[test]
    fn test_bad_names_fail_before_coding() {
        assert!(matches!(
            decode_content(b"x", "no such", false),
            Err(BufferError::IllegalEncodingName(_))
        ));
        assert!(matches!(
            encode_content("x", "x-unknown-9", false),
            Err(BufferError::UnsupportedEncoding(_))
        ));
    }
}
