//! Backend configuration
//!
//! The engine keeps its settings in a console-variable store; this module
//! reads the handful of values the media backend consumes, either from such a
//! store ([`ConfigSource`]) or from a JSON file using the same key names.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// How `s_khz` maps to a playback rate.
///
/// The original selection chain assigns 44100 for `44` and then overwrites it
/// in the `else` arm of the `22` test, so only `22` ever selects anything but
/// 11025. `Legacy` keeps that behaviour; `Intended` selects what the values
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatePolicy {
    /// 22 -> 22050, anything else (44 included) -> 11025
    #[default]
    Legacy,
    /// 44 -> 44100, 22 -> 22050, anything else -> 11025
    Intended,
}

/// Media backend settings, keyed by console variable name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Disable CD audio entirely (`cd_nocd`)
    #[serde(rename = "cd_nocd")]
    pub cd_disabled: bool,
    /// Loops of a looping track before switching to the loop track (`cd_loopcount`)
    #[serde(rename = "cd_loopcount")]
    pub cd_loop_count: u32,
    /// Track played once the loop count is reached (`cd_looptrack`)
    #[serde(rename = "cd_looptrack")]
    pub cd_loop_track: i32,
    /// CD playback volume, 0.0 to 1.0 (`cd_volume`)
    #[serde(rename = "cd_volume")]
    pub cd_volume: f32,
    /// Sample rate selector in kHz (`s_khz`)
    #[serde(rename = "s_khz")]
    pub sound_khz: u32,
    /// Interpretation of `s_khz` (`s_rate_policy`)
    #[serde(rename = "s_rate_policy")]
    pub rate_policy: RatePolicy,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cd_disabled: false,
            cd_loop_count: 4,
            cd_loop_track: 11,
            cd_volume: 1.0,
            sound_khz: 11,
            rate_policy: RatePolicy::Legacy,
        }
    }
}

/// External key-value store holding console variables
pub trait ConfigSource {
    /// Raw string value of `key`, if set
    fn value(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigSource for HashMap<&str, &str> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| (*v).to_string())
    }
}

impl MediaConfig {
    /// Read every known key from `source`, keeping defaults for unset keys.
    ///
    /// Numeric values are read the way console variables are: as floats,
    /// truncated where an integer is needed.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = number(source, "cd_nocd")? {
            cfg.cd_disabled = v != 0.0;
        }
        if let Some(v) = number(source, "cd_loopcount")? {
            cfg.cd_loop_count = v.max(0.0) as u32;
        }
        if let Some(v) = number(source, "cd_looptrack")? {
            cfg.cd_loop_track = v as i32;
        }
        if let Some(v) = number(source, "cd_volume")? {
            cfg.cd_volume = v;
        }
        if let Some(v) = number(source, "s_khz")? {
            cfg.sound_khz = v.max(0.0) as u32;
        }
        if let Some(v) = source.value("s_rate_policy") {
            cfg.rate_policy = match v.trim().to_ascii_lowercase().as_str() {
                "legacy" => RatePolicy::Legacy,
                "intended" => RatePolicy::Intended,
                other => {
                    return Err(Error::ConfigError(format!(
                        "s_rate_policy must be 'legacy' or 'intended', got '{other}'"
                    )))
                }
            };
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON document with console-variable keys
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values outside their documented ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.cd_volume) {
            return Err(Error::ConfigError(format!(
                "cd_volume must be within 0.0..=1.0, got {}",
                self.cd_volume
            )));
        }
        Ok(())
    }

    /// Set `cd_nocd`
    pub fn cd_disabled(mut self, disabled: bool) -> Self {
        self.cd_disabled = disabled;
        self
    }

    /// Set `cd_loopcount`
    pub fn cd_loop_count(mut self, count: u32) -> Self {
        self.cd_loop_count = count;
        self
    }

    /// Set `cd_looptrack`
    pub fn cd_loop_track(mut self, track: i32) -> Self {
        self.cd_loop_track = track;
        self
    }

    /// Set `cd_volume`
    pub fn cd_volume(mut self, volume: f32) -> Self {
        self.cd_volume = volume;
        self
    }

    /// Set `s_khz`
    pub fn sound_khz(mut self, khz: u32) -> Self {
        self.sound_khz = khz;
        self
    }

    /// Set `s_rate_policy`
    pub fn rate_policy(mut self, policy: RatePolicy) -> Self {
        self.rate_policy = policy;
        self
    }
}

fn number(source: &dyn ConfigSource, key: &str) -> Result<Option<f32>> {
    match source.value(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f32>()
            .map(Some)
            .map_err(|e| Error::ConfigError(format!("{key} = '{raw}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_match_console_variables() {
        let cfg = MediaConfig::default();
        assert!(!cfg.cd_disabled);
        assert_eq!(cfg.cd_loop_count, 4);
        assert_eq!(cfg.cd_loop_track, 11);
        assert_relative_eq!(cfg.cd_volume, 1.0);
        assert_eq!(cfg.rate_policy, RatePolicy::Legacy);
    }

    #[test]
    fn test_from_source_reads_cvars() {
        let mut store = HashMap::new();
        store.insert("cd_nocd", "1");
        store.insert("cd_loopcount", "2.0");
        store.insert("cd_volume", "0.5");
        store.insert("s_khz", "22");
        store.insert("s_rate_policy", "Intended");

        let cfg = MediaConfig::from_source(&store).unwrap();
        assert!(cfg.cd_disabled);
        assert_eq!(cfg.cd_loop_count, 2);
        assert_eq!(cfg.cd_loop_track, 11, "unset key keeps its default");
        assert_relative_eq!(cfg.cd_volume, 0.5);
        assert_eq!(cfg.sound_khz, 22);
        assert_eq!(cfg.rate_policy, RatePolicy::Intended);
    }

    #[test]
    fn test_from_source_rejects_garbage() {
        let mut store = HashMap::new();
        store.insert("cd_volume", "loud");
        assert!(matches!(
            MediaConfig::from_source(&store),
            Err(Error::ConfigError(_))
        ));

        let mut store = HashMap::new();
        store.insert("cd_volume", "1.5");
        assert!(MediaConfig::from_source(&store).is_err());
    }

    #[test]
    fn test_json_partial_document() {
        let cfg = MediaConfig::from_json_str(r#"{ "s_khz": 44, "s_rate_policy": "intended" }"#)
            .unwrap();
        assert_eq!(cfg.sound_khz, 44);
        assert_eq!(cfg.rate_policy, RatePolicy::Intended);
        assert_eq!(cfg.cd_loop_count, 4);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cd_looptrack": 3, "cd_volume": 0.25 }}"#).unwrap();

        let cfg = MediaConfig::load(file.path()).unwrap();
        assert_eq!(cfg.cd_loop_track, 3);
        assert_relative_eq!(cfg.cd_volume, 0.25);
    }

    #[test]
    fn test_builder() {
        let cfg = MediaConfig::default()
            .cd_disabled(true)
            .sound_khz(22)
            .rate_policy(RatePolicy::Intended);
        assert!(cfg.cd_disabled);
        assert_eq!(cfg.sound_khz, 22);
        assert_eq!(cfg.rate_policy, RatePolicy::Intended);
    }
}
