use super::platform::DefaultEncodingProvider;
use super::sniff::ContentSniffer;
use crate::error::Result;
use crate::model::{ContentDescription, EncodingState};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Decides which charset a buffer reads and writes with.
pub struct EncodingResolver {
    sniffer: Arc<dyn ContentSniffer>,
    defaults: Arc<dyn DefaultEncodingProvider>,
}

impl EncodingResolver {
    pub fn new(
        sniffer: Arc<dyn ContentSniffer>,
        defaults: Arc<dyn DefaultEncodingProvider>,
    ) -> Self {
        Self { sniffer, defaults }
    }

    pub fn sniffer(&self) -> &dyn ContentSniffer {
        self.sniffer.as_ref()
    }

    pub fn default_encoding(&self) -> String {
        self.defaults.default_encoding()
    }

    /// Resolve the encoding used to read content.
    ///
    /// `probe` opens a fresh stream on the content; failing to open it (e.g. the
    /// file does not exist yet) or failing to sniff it only means there is no
    /// content information. `previous` is the charset cached from an earlier
    /// resolution, kept when the content carries a BOM but no charset.
    pub fn resolve<F>(
        &self,
        explicit_override: Option<&str>,
        name: &str,
        probe: F,
        previous: Option<&str>,
    ) -> EncodingState
    where
        F: FnOnce() -> Result<Box<dyn Read + Send>>,
    {
        let explicit = explicit_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let description = match probe() {
            Ok(mut stream) => self.describe_stream(&mut *stream, name),
            Err(e) => {
                debug!(name, error = %e, "No content to probe");
                None
            }
        }
        .unwrap_or_default();

        let has_bom = description.byte_order_mark.is_some();
        let resolved = explicit
            .clone()
            .or(description.charset)
            .or_else(|| previous.filter(|_| has_bom).map(str::to_string))
            .unwrap_or_else(|| self.default_encoding());

        debug!(name, charset = %resolved, has_bom, "Resolved encoding");
        EncodingState {
            resolved_charset: resolved,
            explicit_override: explicit,
            has_byte_order_mark: has_bom,
        }
    }

    /// Resolve the encoding used to write `text`.
    ///
    /// Explicit override first, then a probe of the in-memory text, then the
    /// charset the content was read with if it carried a BOM, then the default.
    pub fn resolve_for_commit(&self, state: &EncodingState, text: &str, name: &str) -> String {
        if let Some(explicit) = state.explicit_override.as_deref() {
            return explicit.to_string();
        }

        match self.sniffer.describe_text(text, name) {
            Ok(ContentDescription {
                charset: Some(charset),
                ..
            }) => return charset,
            Ok(_) => {}
            Err(e) => debug!(name, error = %e, "Content probe failed, trying next strategy"),
        }

        if state.has_byte_order_mark && !state.resolved_charset.is_empty() {
            return state.resolved_charset.clone();
        }

        self.default_encoding()
    }

    /// Describe content for purposes other than charset resolution.
    pub fn describe_stream(
        &self,
        stream: &mut dyn Read,
        name: &str,
    ) -> Option<ContentDescription> {
        match self.sniffer.describe_bytes(stream, name) {
            Ok(description) => Some(description),
            Err(e) => {
                debug!(name, error = %e, "Content probe failed, trying next strategy");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::platform::FixedEncoding;
    use crate::encoding::sniff::BomSniffer;
    use crate::error::BufferError;
    use crate::model::ByteOrderMark;
    use std::io::Cursor;

    /// Reports a fixed description regardless of content.
    struct FixedSniffer(ContentDescription);

    impl ContentSniffer for FixedSniffer {
        fn describe_bytes(&self, _: &mut dyn Read, _: &str) -> Result<ContentDescription> {
            Ok(self.0.clone())
        }

        fn describe_text(&self, _: &str, _: &str) -> Result<ContentDescription> {
            Ok(ContentDescription {
                byte_order_mark: None,
                ..self.0.clone()
            })
        }
    }

    struct FailingSniffer;

    impl ContentSniffer for FailingSniffer {
        fn describe_bytes(&self, _: &mut dyn Read, name: &str) -> Result<ContentDescription> {
            Err(BufferError::ContentProbe {
                name: name.to_string(),
                reason: "boom".to_string(),
            })
        }

        fn describe_text(&self, _: &str, name: &str) -> Result<ContentDescription> {
            Err(BufferError::ContentProbe {
                name: name.to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    fn resolver(sniffer: impl ContentSniffer + 'static) -> EncodingResolver {
        EncodingResolver::new(Arc::new(sniffer), Arc::new(FixedEncoding("UTF-8".into())))
    }

    fn bytes(content: &'static [u8]) -> impl FnOnce() -> Result<Box<dyn Read + Send>> {
        move || Ok(Box::new(Cursor::new(content)) as Box<dyn Read + Send>)
    }

    fn missing() -> impl FnOnce() -> Result<Box<dyn Read + Send>> {
        || {
            Err(BufferError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "missing",
            )))
        }
    }

    #[test]
    fn test_explicit_override_wins_over_sniffed_charset() {
        let r = resolver(FixedSniffer(ContentDescription {
            charset: Some("ISO-8859-1".into()),
            ..Default::default()
        }));
        let state = r.resolve(Some("UTF-8"), "a.txt", bytes(b"x"), None);
        assert_eq!(state.resolved_charset, "UTF-8");
        assert_eq!(state.explicit_override.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_bom_is_sniffed_even_with_override() {
        let r = resolver(BomSniffer::default());
        let state = r.resolve(Some("ISO-8859-1"), "a.txt", bytes(b"\xEF\xBB\xBFhi"), None);
        assert_eq!(state.charset(), "ISO-8859-1");
        assert!(state.has_byte_order_mark);
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let r = resolver(BomSniffer::default());
        let state = r.resolve(Some("  "), "a.txt", bytes(b"hi"), None);
        assert_eq!(state.explicit_override, None);
        assert_eq!(state.resolved_charset, "UTF-8");
    }

    #[test]
    fn test_sniffed_charset_used_without_override() {
        let r = resolver(BomSniffer::default());
        let state = r.resolve(None, "a.txt", bytes(b"\xFE\xFF\x00h"), None);
        assert_eq!(state.resolved_charset, "UTF-16BE");
        assert!(state.has_byte_order_mark);
    }

    #[test]
    fn test_bom_without_charset_keeps_previous() {
        let r = resolver(FixedSniffer(ContentDescription {
            byte_order_mark: Some(ByteOrderMark::Utf8),
            ..Default::default()
        }));
        let state = r.resolve(None, "a.txt", bytes(b"x"), Some("windows-1252"));
        assert_eq!(state.resolved_charset, "windows-1252");
        assert!(state.has_byte_order_mark);
    }

    #[test]
    fn test_falls_back_to_default() {
        let r = EncodingResolver::new(
            Arc::new(BomSniffer::default()),
            Arc::new(FixedEncoding("ISO-8859-1".into())),
        );
        let state = r.resolve(None, "a.txt", bytes(b"plain"), Some("UTF-16LE"));
        assert_eq!(state.resolved_charset, "ISO-8859-1");
        assert!(!state.has_byte_order_mark);
    }

    #[test]
    fn test_probe_failures_are_soft() {
        let r = resolver(FailingSniffer);
        let state = r.resolve(None, "a.txt", bytes(b"x"), None);
        assert_eq!(state.resolved_charset, "UTF-8");

        let r = resolver(BomSniffer::default());
        let state = r.resolve(None, "a.txt", missing(), None);
        assert_eq!(state.resolved_charset, "UTF-8");
        assert!(!state.has_byte_order_mark);
    }

    #[test]
    fn test_commit_priority() {
        let r = resolver(BomSniffer::default());

        let explicit = EncodingState {
            resolved_charset: "UTF-8".into(),
            explicit_override: Some("UTF-16LE".into()),
            has_byte_order_mark: true,
        };
        assert_eq!(r.resolve_for_commit(&explicit, "text", "a.txt"), "UTF-16LE");

        let declared = EncodingState {
            resolved_charset: "UTF-8".into(),
            ..Default::default()
        };
        let xml = "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>";
        assert_eq!(r.resolve_for_commit(&declared, xml, "a.xml"), "ISO-8859-1");

        let with_bom = EncodingState {
            resolved_charset: "UTF-16BE".into(),
            explicit_override: None,
            has_byte_order_mark: true,
        };
        assert_eq!(r.resolve_for_commit(&with_bom, "text", "a.txt"), "UTF-16BE");

        let without_bom = EncodingState {
            resolved_charset: "UTF-16BE".into(),
            explicit_override: None,
            has_byte_order_mark: false,
        };
        assert_eq!(r.resolve_for_commit(&without_bom, "text", "a.txt"), "UTF-8");
    }

    #[test]
    fn test_commit_probe_failure_falls_through() {
        let r = resolver(FailingSniffer);
        let state = EncodingState {
            resolved_charset: "UTF-16LE".into(),
            explicit_override: None,
            has_byte_order_mark: true,
        };
        assert_eq!(r.resolve_for_commit(&state, "text", "a.txt"), "UTF-16LE");
    }
}
