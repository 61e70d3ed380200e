use crate::error::{BufferError, Result};
use crate::model::{ByteOrderMark, ContentDescription};
use std::io::Read;

pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_XML: &str = "application/xml";

const XML_EXTENSIONS: &[&str] = &["xml", "xsd", "xsl", "xslt", "svg", "xhtml", "plist"];

/// Content-type and charset sniffing collaborator.
///
/// Sniffers are consulted by the [`EncodingResolver`](super::EncodingResolver)
/// on load (bytes) and on commit (in-memory text). A returned error is treated
/// as "no information" by the resolver.
pub trait ContentSniffer: Send + Sync {
    fn describe_bytes(&self, stream: &mut dyn Read, name: &str) -> Result<ContentDescription>;

    fn describe_text(&self, text: &str, name: &str) -> Result<ContentDescription>;
}

/// Default sniffer: byte order marks, XML declarations and file extensions.
///
/// A BOM implies its charset. For XML content (by extension or by a leading
/// `<?xml`), the `encoding` pseudo-attribute of the declaration names the
/// charset when no BOM does.
pub struct BomSniffer {
    limit: usize,
}

impl Default for BomSniffer {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl BomSniffer {
    /// `limit` bounds the number of bytes read from a stream.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(4),
        }
    }

    fn describe_prefix(
        &self,
        prefix: &str,
        name: &str,
        bom: Option<ByteOrderMark>,
    ) -> ContentDescription {
        let is_xml = is_xml_name(name) || prefix.trim_start().starts_with("<?xml");
        let charset = match bom {
            Some(mark) => Some(mark.charset().to_string()),
            None if is_xml => xml_declared_encoding(prefix),
            None => None,
        };
        let content_type = if is_xml {
            CONTENT_TYPE_XML
        } else {
            CONTENT_TYPE_TEXT
        };
        ContentDescription {
            charset,
            byte_order_mark: bom,
            content_type: Some(content_type.to_string()),
        }
    }
}

impl ContentSniffer for BomSniffer {
    fn describe_bytes(&self, stream: &mut dyn Read, name: &str) -> Result<ContentDescription> {
        let mut prefix = Vec::with_capacity(self.limit.min(8192));
        stream
            .take(self.limit as u64)
            .read_to_end(&mut prefix)
            .map_err(|e| BufferError::ContentProbe {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let bom = ByteOrderMark::detect(&prefix);
        let body = &prefix[bom.map_or(0, |b| b.bytes().len())..];
        let text = match bom {
            Some(ByteOrderMark::Utf16Le) => {
                encoding_rs::UTF_16LE.decode_without_bom_handling(body).0
            }
            Some(ByteOrderMark::Utf16Be) => {
                encoding_rs::UTF_16BE.decode_without_bom_handling(body).0
            }
            _ => String::from_utf8_lossy(body),
        };
        Ok(self.describe_prefix(&text, name, bom))
    }

    fn describe_text(&self, text: &str, name: &str) -> Result<ContentDescription> {
        let end = floor_char_boundary(text, self.limit);
        Ok(self.describe_prefix(&text[..end], name, None))
    }
}

fn is_xml_name(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| XML_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Extracts the value of `encoding="..."` from a leading XML declaration.
pub fn xml_declared_encoding(text: &str) -> Option<String> {
    let decl = text.trim_start().strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];
    let after = &decl[decl.find("encoding")? + "encoding".len()..];
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after[1..];
    let value = &value[..value.find(quote)?];
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
