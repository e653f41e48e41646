//! Job configuration.
//!
//! Settings are read once at job start, validated, and then treated as an
//! immutable value. Saving or merging settings files is the host's job.
//!
//! # Example
//!
//! ```no_run
//! use vsg_timeline::config::Settings;
//!
//! let settings = Settings::load(".config/sync.toml").unwrap();
//! println!("Sync mode: {}", settings.strategy.sync_mode.name());
//! ```

mod settings;

use std::path::Path;

pub use settings::{
    ChapterSettings, ClassifierSettings, LoggingSettings, SamplingSettings, SceneSettings,
    Settings, StrategySettings, TimingSettings, VerificationSettings,
};

use crate::error::ConfigError;

pub type ConfigResult<T> = Result<T, ConfigError>;

impl Settings {
    /// Parse and validate settings from a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!("[Config] Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        let c = &self.classifier;
        if c.min_samples == 0 {
            return Err(ConfigError::invalid("classifier.min_samples", "must be at least 1"));
        }
        if !(c.uniform_tolerance_ms > 0.0) {
            return Err(ConfigError::invalid(
                "classifier.uniform_tolerance_ms",
                "must be positive",
            ));
        }
        if !(c.step_threshold_ms > 0.0) {
            return Err(ConfigError::invalid(
                "classifier.step_threshold_ms",
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&c.min_confidence) {
            return Err(ConfigError::invalid(
                "classifier.min_confidence",
                "must be within [0, 1]",
            ));
        }
        if c.drift_min_samples < 2 {
            return Err(ConfigError::invalid(
                "classifier.drift_min_samples",
                "a line needs at least 2 samples",
            ));
        }

        let s = &self.sampling;
        if s.chunk_count == 0 {
            return Err(ConfigError::invalid("sampling.chunk_count", "must be at least 1"));
        }
        if !(0.0..=100.0).contains(&s.scan_start_pct)
            || !(0.0..=100.0).contains(&s.scan_end_pct)
            || s.scan_start_pct >= s.scan_end_pct
        {
            return Err(ConfigError::invalid(
                "sampling.scan_start_pct",
                format!(
                    "scan window {}%..{}% is not a valid range",
                    s.scan_start_pct, s.scan_end_pct
                ),
            ));
        }

        if self.scene.fallback_threshold > self.scene.threshold {
            return Err(ConfigError::invalid(
                "scene.fallback_threshold",
                "retry threshold must be more sensitive (lower) than the primary",
            ));
        }

        let v = &self.verification;
        if !(0.0..=1.0).contains(&v.min_match_fraction) {
            return Err(ConfigError::invalid(
                "verification.min_match_fraction",
                "must be within [0, 1]",
            ));
        }
        if v.hash_size < 2 {
            return Err(ConfigError::invalid("verification.hash_size", "must be at least 2"));
        }

        if self
            .strategy
            .anchor_positions_pct
            .iter()
            .any(|p| !(0.0..=100.0).contains(p))
        {
            return Err(ConfigError::invalid(
                "strategy.anchor_positions_pct",
                "positions must be within [0, 100]",
            ));
        }

        if self.chapters.snap_threshold_ms < 0.0 {
            return Err(ConfigError::invalid(
                "chapters.snap_threshold_ms",
                "must not be negative",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MergePreference, SnapMode};
    use crate::sync::SyncModeType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.classifier.min_samples, 3);
        assert_eq!(settings.scene.threshold, 27.0);
        assert_eq!(settings.chapters.snap_threshold_ms, 250.0);
        assert!(settings.chapters.snap_starts_only);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [strategy]
            sync_mode = "video-verified"

            [classifier]
            merge_preference = "earlier"

            [chapters]
            snap_mode = "nearest"
            "#,
        )
        .unwrap();

        assert_eq!(settings.strategy.sync_mode, SyncModeType::VideoVerified);
        assert_eq!(settings.classifier.merge_preference, MergePreference::Earlier);
        assert_eq!(settings.classifier.step_threshold_ms, 50.0);
        assert_eq!(settings.chapters.snap_mode, SnapMode::Nearest);
        assert_eq!(settings.strategy.anchor_positions_pct, vec![10.0, 50.0, 90.0]);
    }

    #[test]
    fn inverted_scan_window_is_rejected() {
        let err = Settings::from_toml_str(
            r#"
            [sampling]
            scan_start_pct = 80.0
            scan_end_pct = 20.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "sampling.scan_start_pct"));
    }

    #[test]
    fn unknown_sync_mode_is_parse_error() {
        let err = Settings::from_toml_str("[strategy]\nsync_mode = \"magic\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nrounding = \"aegisub\"").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(
            settings.timing.rounding,
            crate::models::RoundingPolicy::Aegisub
        );
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let err = Settings::load("/nonexistent/sync.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
