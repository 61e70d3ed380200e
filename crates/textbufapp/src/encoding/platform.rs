use super::charset::Charset;

/// Supplies the process-wide fallback charset.
pub trait DefaultEncodingProvider: Send + Sync {
    fn default_encoding(&self) -> String;
}

/// A fixed fallback, typically taken from configuration.
pub struct FixedEncoding(pub String);

impl DefaultEncodingProvider for FixedEncoding {
    fn default_encoding(&self) -> String {
        self.0.clone()
    }
}

/// The codeset of the user's locale (`LC_ALL`, then `LC_CTYPE`, then `LANG`),
/// or UTF-8 when no locale names a charset this crate can handle.
pub struct PlatformEncoding;

impl DefaultEncodingProvider for PlatformEncoding {
    fn default_encoding(&self) -> String {
        let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty());

        locale
            .as_deref()
            .and_then(codeset_from_locale)
            .and_then(|codeset| Charset::for_name(&codeset).ok())
            .unwrap_or(Charset::UTF_8)
            .name()
            .to_string()
    }
}

/// `en_US.ISO-8859-1@euro` → `ISO-8859-1`. `C` and `POSIX` mean ASCII.
pub fn codeset_from_locale(locale: &str) -> Option<String> {
    if locale == "C" || locale == "POSIX" {
        return Some(Charset::US_ASCII.name().to_string());
    }
    let (_, rest) = locale.split_once('.')?;
    let codeset = rest.split('@').next().unwrap_or(rest);
    if codeset.is_empty() {
        None
    } else {
        Some(codeset.to_string())
    }
}
