//! User-facing spectrogram settings: range validation, unit conversion and
//! JSON persistence.

use crate::dsp::spectrogram::{
    ConfigError, DEFAULT_CHART_LENGTH_SEC, DEFAULT_MAX_SHOWN_FREQUENCY, DEFAULT_STEP_LENGTH_SEC,
    SpectrogramConfig, SpectrogramEngine,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_FREQUENCY_RANGE_HZ: RangeInclusive<f32> = 2.0..=1_000.0;
pub const STEP_LENGTH_RANGE_MS: RangeInclusive<f32> = 2.0..=1_000.0;
pub const CHART_LENGTH_RANGE_MS: RangeInclusive<f32> = 100.0..=30_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    MaxFrequency,
    StepLength,
    ChartLength,
}

impl Field {
    pub fn range(self) -> RangeInclusive<f32> {
        match self {
            Field::MaxFrequency => MAX_FREQUENCY_RANGE_HZ,
            Field::StepLength => STEP_LENGTH_RANGE_MS,
            Field::ChartLength => CHART_LENGTH_RANGE_MS,
        }
    }

    pub fn out_of_range_message(self) -> &'static str {
        match self {
            Field::MaxFrequency => "Max spectrogram frequency out of range.",
            Field::StepLength => "Spectrogram step length out of range.",
            Field::ChartLength => "Spectrogram chart length out of range.",
        }
    }

    fn check(self, value: f32) -> Result<f32, SettingsError> {
        if self.range().contains(&value) {
            Ok(value)
        } else {
            Err(SettingsError::OutOfRange { field: self, value })
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::MaxFrequency => "max frequency (Hz)",
            Field::StepLength => "step length (ms)",
            Field::ChartLength => "chart length (ms)",
        })
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{} ({field} = {value})", .field.out_of_range_message())]
    OutOfRange { field: Field, value: f32 },
    #[error("settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Spectrogram settings in the units a user edits them in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectrogramSettings {
    pub channel: Option<usize>,
    pub max_frequency_hz: f32,
    pub step_length_ms: f32,
    pub chart_length_ms: f32,
}

impl Default for SpectrogramSettings {
    fn default() -> Self {
        Self {
            channel: Some(0),
            max_frequency_hz: DEFAULT_MAX_SHOWN_FREQUENCY,
            step_length_ms: DEFAULT_STEP_LENGTH_SEC * 1_000.0,
            chart_length_ms: DEFAULT_CHART_LENGTH_SEC * 1_000.0,
        }
    }
}

impl SpectrogramSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        Field::MaxFrequency.check(self.max_frequency_hz)?;
        Field::StepLength.check(self.step_length_ms)?;
        Field::ChartLength.check(self.chart_length_ms)?;
        Ok(())
    }

    /// Resets out-of-range fields to their defaults. Returns whether anything changed.
    pub fn sanitize(&mut self) -> bool {
        let defaults = Self::default();
        let mut changed = false;
        let mut fix = |field: Field, value: &mut f32, default: f32| {
            if field.check(*value).is_err() {
                *value = default;
                changed = true;
            }
        };
        fix(
            Field::MaxFrequency,
            &mut self.max_frequency_hz,
            defaults.max_frequency_hz,
        );
        fix(
            Field::StepLength,
            &mut self.step_length_ms,
            defaults.step_length_ms,
        );
        fix(
            Field::ChartLength,
            &mut self.chart_length_ms,
            defaults.chart_length_ms,
        );
        changed
    }

    // Setters keep the last good value when the input is rejected.

    pub fn set_max_frequency_hz(&mut self, value: f32) -> Result<(), SettingsError> {
        self.max_frequency_hz = Field::MaxFrequency.check(value)?;
        Ok(())
    }

    pub fn set_step_length_ms(&mut self, value: f32) -> Result<(), SettingsError> {
        self.step_length_ms = Field::StepLength.check(value)?;
        Ok(())
    }

    pub fn set_chart_length_ms(&mut self, value: f32) -> Result<(), SettingsError> {
        self.chart_length_ms = Field::ChartLength.check(value)?;
        Ok(())
    }

    pub fn set_channel(&mut self, channel: Option<usize>) {
        self.channel = channel;
    }

    pub fn to_config(&self, sample_rate: f32) -> SpectrogramConfig {
        SpectrogramConfig {
            sample_rate,
            step_length_sec: self.step_length_ms / 1_000.0,
            max_shown_frequency: self.max_frequency_hz,
            chart_length_sec: self.chart_length_ms / 1_000.0,
        }
    }

    pub fn from_config(config: &SpectrogramConfig, channel: Option<usize>) -> Self {
        Self {
            channel,
            max_frequency_hz: config.max_shown_frequency,
            step_length_ms: config.step_length_sec * 1_000.0,
            chart_length_ms: config.chart_length_sec * 1_000.0,
        }
    }

    /// Pushes these settings into `engine`, which resets its history.
    pub fn apply(&self, engine: &mut SpectrogramEngine, sample_rate: f32) -> Result<(), ConfigError> {
        engine.reconfigure(self.to_config(sample_rate))?;
        if engine.selected_channel() != self.channel {
            engine.select_channel(self.channel);
        }
        Ok(())
    }
}

pub fn config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spectroscroll")
}

pub fn default_path() -> PathBuf {
    config_dir().join("settings.json")
}

#[derive(Debug)]
pub struct SettingsManager {
    path: PathBuf,
    pub data: SpectrogramSettings,
}

impl SettingsManager {
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut data: SpectrogramSettings = fs::read_to_string(&path)
            .ok()
            .and_then(|s| {
                serde_json::from_str(&s)
                    .map_err(|e| warn!("[settings] parse error {path:?}: {e}"))
                    .ok()
            })
            .unwrap_or_default();
        if data.sanitize() {
            warn!("[settings] out-of-range values in {path:?} replaced with defaults");
        }
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &SpectrogramSettings {
        &self.data
    }

    /// Writes the settings as pretty JSON via a temporary file and rename.
    pub fn save(&self) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(&self.data)?;
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &json)
            .and_then(|()| fs::rename(&temp_path, &self.path))
            .map_err(io_err)?;
        info!("[settings] saved {:?}", self.path);
        Ok(())
    }
}
