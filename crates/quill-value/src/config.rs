//! Per-context runtime configuration
//!
//! The active configuration lives in a thread-local slot. A context installs
//! its configuration for the duration of a call with [`ConfigGuard`]; code
//! deep inside the value engine reads it with [`with_active`]. When nothing is
//! installed the defaults apply.
//!
//! ```ignore
//! let _guard = RuntimeConfig::default().with_unicode_semantics(true).install();
//! // string literals created here are UTF-16
//! ```

use serde::Deserialize;
use std::cell::RefCell;

/// Byte encoding used when transcoding between binary and unicode strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TextEncoding {
    /// UTF-8 (invalid sequences fall back to byte-per-code-unit)
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    Utf8,
    /// ISO-8859-1, one byte per code unit
    #[serde(
        rename = "latin-1",
        alias = "latin1",
        alias = "iso-8859-1",
        alias = "ISO-8859-1"
    )]
    Latin1,
}

/// Runtime configuration for one execution context
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Encoding for binary/unicode conversions
    pub encoding: TextEncoding,
    /// When true, string literals and decoded strings are unicode buffers
    pub unicode_semantics: bool,
    /// Chunk size of the large binary builder
    pub large_chunk_size: usize,
    /// Length at which a binary builder is promoted to the chunked builder
    pub large_threshold: usize,
    /// Maximum container nesting accepted by the codec
    pub max_depth: usize,
}

const DEFAULT_CONFIG: RuntimeConfig = RuntimeConfig {
    encoding: TextEncoding::Utf8,
    unicode_semantics: false,
    large_chunk_size: 4096,
    large_threshold: 4096,
    max_depth: 512,
};

impl Default for RuntimeConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

impl RuntimeConfig {
    /// Set the transcoding encoding
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enable or disable unicode string semantics
    pub fn with_unicode_semantics(mut self, enabled: bool) -> Self {
        self.unicode_semantics = enabled;
        self
    }

    /// Set the large-builder chunk size and promotion threshold
    pub fn with_large_strings(mut self, chunk_size: usize, threshold: usize) -> Self {
        self.large_chunk_size = chunk_size.max(1);
        self.large_threshold = threshold;
        self
    }

    /// Set the codec nesting limit
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Install this configuration for the current thread until the guard drops
    pub fn install(self) -> ConfigGuard {
        ConfigGuard::new(self)
    }
}

thread_local! {
    /// Configuration of the context currently running on this thread
    static ACTIVE: RefCell<Option<RuntimeConfig>> = const { RefCell::new(None) };
}

/// Run a closure against the active configuration (or the defaults)
pub fn with_active<F, R>(f: F) -> R
where
    F: FnOnce(&RuntimeConfig) -> R,
{
    ACTIVE.with(|c| {
        let borrowed = c.borrow();
        match borrowed.as_ref() {
            Some(config) => f(config),
            None => f(&DEFAULT_CONFIG),
        }
    })
}

/// Check if a configuration is installed on this thread
pub fn has_active() -> bool {
    ACTIVE.with(|c| c.borrow().is_some())
}

/// Active transcoding encoding
pub fn encoding() -> TextEncoding {
    with_active(|c| c.encoding)
}

/// Whether unicode string semantics are enabled
pub fn unicode_semantics() -> bool {
    with_active(|c| c.unicode_semantics)
}

/// RAII guard that installs a configuration and restores the previous one on drop
pub struct ConfigGuard {
    previous: Option<RuntimeConfig>,
}

impl ConfigGuard {
    /// Install `config` for the current thread
    pub fn new(config: RuntimeConfig) -> Self {
        let previous = ACTIVE.with(|c| c.borrow_mut().replace(config));
        Self { previous }
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|c| {
            *c.borrow_mut() = previous;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_install() {
        assert!(!has_active());
        assert_eq!(encoding(), TextEncoding::Utf8);
        assert!(!unicode_semantics());
        assert_eq!(with_active(|c| c.large_chunk_size), 4096);
    }

    #[test]
    fn test_guard_nesting_restores() {
        {
            let _outer = RuntimeConfig::default()
                .with_encoding(TextEncoding::Latin1)
                .install();
            assert_eq!(encoding(), TextEncoding::Latin1);
            {
                let _inner = RuntimeConfig::default().with_unicode_semantics(true).install();
                assert!(unicode_semantics());
                assert_eq!(encoding(), TextEncoding::Utf8);
            }
            assert!(!unicode_semantics());
            assert_eq!(encoding(), TextEncoding::Latin1);
        }
        assert!(!has_active());
    }

    #[test]
    fn test_large_strings_clamps_chunk_size() {
        let config = RuntimeConfig::default().with_large_strings(0, 10);
        assert_eq!(config.large_chunk_size, 1);
        assert_eq!(config.large_threshold, 10);
    }
}
