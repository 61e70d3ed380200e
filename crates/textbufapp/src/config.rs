//! # Configuration
//!
//! textbuf configuration is managed by [`clapfig`], which handles layered loading
//! from TOML files, environment variables, and programmatic overrides.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `TEXTBUF__DEFAULT_ENCODING`, `TEXTBUF__ATOMIC_WRITES`, etc.
//! 2. **Local Config**: `.textbuf/textbuf.toml` in the working directory.
//! 3. **User Config**: OS-appropriate config directory (via `directories` crate).
//! 4. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `default_encoding` | unset | Fallback charset; unset means the platform locale's |
//! | `atomic_writes` | `true` | Commit through a temp file and a rename |
//! | `sniff_limit` | `8192` | Max bytes read when sniffing content |

use crate::encoding::{Charset, DefaultEncodingProvider, FixedEncoding, PlatformEncoding};
use crate::error::{BufferError, Result};
use confique::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for textbuf, stored in `textbuf.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Charset used when neither an override nor the content names one.
    /// When absent, the platform locale decides.
    pub default_encoding: Option<String>,

    /// Write commits to a temp file and rename it over the target.
    #[config(default = true)]
    pub atomic_writes: bool,

    /// Max bytes read from a file when sniffing its charset.
    #[config(default = 8192)]
    pub sniff_limit: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            default_encoding: None,
            atomic_writes: true,
            sniff_limit: 8192,
        }
    }
}

impl BufferConfig {
    /// Check that the configured default charset exists.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.default_encoding() {
            Charset::for_name(name)
                .map_err(|e| BufferError::Config(format!("default_encoding: {}", e)))?;
        }
        Ok(())
    }

    /// The configured default charset, ignoring blank values.
    pub fn default_encoding(&self) -> Option<&str> {
        self.default_encoding
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn encoding_provider(&self) -> Arc<dyn DefaultEncodingProvider> {
        match self.default_encoding() {
            Some(name) => Arc::new(FixedEncoding(name.to_string())),
            None => Arc::new(PlatformEncoding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BufferConfig::default();
        assert_eq!(config.default_encoding, None);
        assert!(config.atomic_writes);
        assert_eq!(config.sniff_limit, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_default_encoding_is_unset() {
        let config = BufferConfig {
            default_encoding: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.default_encoding(), None);
    }

    #[test]
    fn test_fixed_encoding_provider() {
        let config = BufferConfig {
            default_encoding: Some("windows-1252".to_string()),
            ..Default::default()
        };
        assert_eq!(config.encoding_provider().default_encoding(), "windows-1252");
    }

    #[test]
    fn test_validate_rejects_unknown_charset() {
        let config = BufferConfig {
            default_encoding: Some("x-klingon".to_string()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BufferError::Config(_)));
        assert!(err.to_string().contains("default_encoding"));
    }

    #[test]
    fn test_deserialize_toml() {
        let config: BufferConfig = toml::from_str(
            r#"
            default_encoding = "UTF-16LE"
            atomic_writes = false
            sniff_limit = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.default_encoding(), Some("UTF-16LE"));
        assert!(!config.atomic_writes);
        assert_eq!(config.sniff_limit, 512);
    }
}
