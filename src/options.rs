//! Stream configuration: a partially specified [`Options`] is turned into an
//! immutable, validated [`Config`] by [`Config::new`].
//!
//! ```
//! use ztream::options::{Config, Options};
//!
//! let config = Config::new(Options {
//!     file_size: Some(1 << 20),
//!     ..Options::default()
//! })?;
//! assert_eq!(config.file_size(), 1 << 20);
//! assert_eq!(config.sample_compress_size(), ztream::options::DEFAULT_SAMPLE_COMPRESS_SIZE);
//! # Ok::<(), ztream::ZtreamError>(())
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZtreamError};
use crate::verifier::Verifier;

// ── Defaults and bounds ──────────────────────────────────────────────────────

/// Default preallocated container size (128 MiB).
pub const DEFAULT_FILE_SIZE:            u32 = 1 << 27;
pub const DEFAULT_SAMPLE_COMPRESS_SIZE: usize = 4 * 1024;
pub const DEFAULT_COMPRESSION_THRESHOLD: f32 = 0.75;
/// Deflate level 1, fastest.
pub const DEFAULT_COMPRESSION_LEVEL:    u32 = 1;

pub const MIN_FILE_SIZE:            u32 = 1 << 18;
pub const MAX_FILE_SIZE:            u32 = 1 << 30;
pub const MIN_SAMPLE_COMPRESS_SIZE: usize = 512;
pub const MAX_SAMPLE_COMPRESS_SIZE: usize = 1024 * 1024;
pub const MAX_COMPRESSION_THRESHOLD: f32 = 0.999;
pub const MAX_COMPRESSION_LEVEL:    u32 = 9;

// ── Options ──────────────────────────────────────────────────────────────────

/// Caller-supplied configuration.  Unset fields take the defaults above.
#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Size the container is preallocated to by `Stream::create`.  Neither
    /// used nor bounds-checked by `Stream::open`, which takes the size of the
    /// existing file.
    pub file_size:             Option<u32>,
    /// Prefix length used to probe compressibility.  `Some(0)` disables
    /// compression entirely.
    pub sample_compress_size:  Option<usize>,
    /// Compress only if the sample shrinks below `threshold × sample length`.
    pub compression_threshold: Option<f32>,
    /// Deflate level, 0..=9.
    pub compression_level:     Option<u32>,
    /// When set, `Stream::open` scans and verifies every entry eagerly.
    #[serde(skip)]
    pub verifier:              Option<Box<dyn Verifier>>,
}

impl Options {
    pub fn with_verifier<V: Verifier + 'static>(mut self, verifier: V) -> Self {
        self.verifier = Some(Box::new(verifier));
        self
    }

    /// Load the numeric options from a JSON document such as
    /// `{"file_size": 1048576, "compression_level": 6}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ZtreamError::InvalidOptions(e.to_string()))
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("file_size", &self.file_size)
            .field("sample_compress_size", &self.sample_compress_size)
            .field("compression_threshold", &self.compression_threshold)
            .field("compression_level", &self.compression_level)
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

// ── Config ───────────────────────────────────────────────────────────────────

/// Validated, immutable stream configuration.
pub struct Config {
    settings: Settings,
    verifier: Option<Box<dyn Verifier>>,
}

/// The numeric part of a [`Config`], printable and serializable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settings {
    pub file_size:             u32,
    pub sample_compress_size:  usize,
    pub compression_threshold: f32,
    pub compression_level:     u32,
}

impl Config {
    /// Apply defaults to every unset field, then bounds-check the result.
    pub fn new(opts: Options) -> Result<Self> {
        Self::build(opts, true)
    }

    /// Like [`Config::new`], but for an existing container whose size is
    /// taken from the file: `file_size` is not bounds-checked.
    pub(crate) fn for_existing(opts: Options) -> Result<Self> {
        Self::build(opts, false)
    }

    fn build(opts: Options, check_file_size: bool) -> Result<Self> {
        let settings = Settings {
            file_size:             opts.file_size.unwrap_or(DEFAULT_FILE_SIZE),
            sample_compress_size:  opts.sample_compress_size.unwrap_or(DEFAULT_SAMPLE_COMPRESS_SIZE),
            compression_threshold: opts.compression_threshold.unwrap_or(DEFAULT_COMPRESSION_THRESHOLD),
            compression_level:     opts.compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL),
        };
        if check_file_size {
            settings.validate_file_size()?;
        }
        settings.validate_compression()?;
        Ok(Self { settings, verifier: opts.verifier })
    }

    pub fn file_size(&self) -> u32 { self.settings.file_size }
    pub fn sample_compress_size(&self) -> usize { self.settings.sample_compress_size }
    pub fn compression_threshold(&self) -> f32 { self.settings.compression_threshold }
    pub fn compression_level(&self) -> u32 { self.settings.compression_level }
    pub fn settings(&self) -> Settings { self.settings }

    pub fn has_verifier(&self) -> bool { self.verifier.is_some() }

    pub(crate) fn verifier_mut(&mut self) -> Option<&mut (dyn Verifier + 'static)> {
        self.verifier.as_deref_mut()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

impl Settings {
    fn validate_file_size(&self) -> Result<()> {
        if self.file_size < MIN_FILE_SIZE {
            return invalid(format!("file size {} is too small, must be at least {MIN_FILE_SIZE}", self.file_size));
        }
        if self.file_size > MAX_FILE_SIZE {
            return invalid(format!("file size {} is too large, must be at most {MAX_FILE_SIZE}", self.file_size));
        }
        Ok(())
    }

    fn validate_compression(&self) -> Result<()> {
        let sample = self.sample_compress_size;
        if sample != 0 && sample < MIN_SAMPLE_COMPRESS_SIZE {
            return invalid(format!("sample compress size {sample} is too small, must be 0 or at least {MIN_SAMPLE_COMPRESS_SIZE}"));
        }
        if sample > MAX_SAMPLE_COMPRESS_SIZE {
            return invalid(format!("sample compress size {sample} is too large, must be at most {MAX_SAMPLE_COMPRESS_SIZE}"));
        }

        // NaN fails both comparisons below, so check it explicitly.
        let threshold = self.compression_threshold;
        if threshold.is_nan() || threshold < 0.0 {
            return invalid(format!("compression threshold {threshold} must be at least 0.0"));
        }
        if threshold >= MAX_COMPRESSION_THRESHOLD {
            return invalid(format!("compression threshold {threshold} must be smaller than {MAX_COMPRESSION_THRESHOLD}"));
        }

        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return invalid(format!("compression level {} must be in 0..={MAX_COMPRESSION_LEVEL}", self.compression_level));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(ZtreamError::InvalidOptions(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(opts: Options) -> Result<Config> {
        Config::new(opts)
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let c = config(Options::default()).unwrap();
        assert_eq!(c.file_size(), DEFAULT_FILE_SIZE);
        assert_eq!(c.sample_compress_size(), DEFAULT_SAMPLE_COMPRESS_SIZE);
        assert_eq!(c.compression_threshold(), DEFAULT_COMPRESSION_THRESHOLD);
        assert_eq!(c.compression_level(), DEFAULT_COMPRESSION_LEVEL);
        assert!(!c.has_verifier());
    }

    #[test]
    fn file_size_bounds() {
        assert!(config(Options { file_size: Some(MIN_FILE_SIZE - 1), ..Default::default() }).is_err());
        assert!(config(Options { file_size: Some(MAX_FILE_SIZE + 1), ..Default::default() }).is_err());
        assert!(config(Options { file_size: Some(MIN_FILE_SIZE), ..Default::default() }).is_ok());
        assert!(config(Options { file_size: Some(MAX_FILE_SIZE), ..Default::default() }).is_ok());
    }

    #[test]
    fn existing_containers_skip_the_file_size_bound() {
        let c = Config::for_existing(Options { file_size: Some(1000), ..Default::default() }).unwrap();
        assert_eq!(c.file_size(), 1000);
        assert!(Config::for_existing(Options { compression_level: Some(10), ..Default::default() }).is_err());
    }

    #[test]
    fn sample_size_zero_disables_compression() {
        let c = config(Options { sample_compress_size: Some(0), ..Default::default() }).unwrap();
        assert_eq!(c.sample_compress_size(), 0);
        assert!(config(Options { sample_compress_size: Some(511), ..Default::default() }).is_err());
        assert!(config(Options { sample_compress_size: Some(MAX_SAMPLE_COMPRESS_SIZE + 1), ..Default::default() }).is_err());
    }

    #[test]
    fn threshold_bounds() {
        assert!(config(Options { compression_threshold: Some(-0.1), ..Default::default() }).is_err());
        assert!(config(Options { compression_threshold: Some(0.999), ..Default::default() }).is_err());
        assert!(config(Options { compression_threshold: Some(f32::NAN), ..Default::default() }).is_err());
        assert!(config(Options { compression_threshold: Some(0.0), ..Default::default() }).is_ok());
    }

    #[test]
    fn level_bounds() {
        assert!(config(Options { compression_level: Some(10), ..Default::default() }).is_err());
        assert!(config(Options { compression_level: Some(0), ..Default::default() }).is_ok());
        assert!(config(Options { compression_level: Some(9), ..Default::default() }).is_ok());
    }

    #[test]
    fn options_from_json() {
        let opts: Options = serde_json::from_str(r#"{"file_size": 1048576, "compression_level": 6}"#).unwrap();
        let c = config(opts).unwrap();
        assert_eq!(c.file_size(), 1 << 20);
        assert_eq!(c.compression_level(), 6);

        let bad: std::result::Result<Options, _> = serde_json::from_str(r#"{"filesize": 1}"#);
        assert!(bad.is_err());
    }
}
