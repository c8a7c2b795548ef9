//! Streaming spectrogram built on a rectangular-window short-time Fourier transform.
//!
//! Samples of one selected channel arrive in arbitrarily sized blocks. Each
//! complete window of `samples_per_step` samples becomes one column of
//! magnitudes in a rolling history of fixed width; samples that do not yet
//! fill a window are carried over to the next block.

pub mod history;
pub mod shared;

pub use history::RollingMatrix;
pub use shared::{SeenState, SpectrogramReader, SpectrogramSnapshot};

use super::{AudioBlock, AudioProcessor, ProcessorUpdate, Reconfigurable};
use crate::util::audio::DEFAULT_SAMPLE_RATE;
use realfft::{FftError, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;
use shared::{Publisher, SnapshotMeta};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_STEP_LENGTH_SEC: f32 = 0.1;
pub const DEFAULT_MAX_SHOWN_FREQUENCY: f32 = 300.0;
pub const DEFAULT_CHART_LENGTH_SEC: f32 = 5.0;

/// Longest FFT window accepted, in samples.
pub const MAX_WINDOW_SAMPLES: usize = 1 << 24;
/// Largest history accepted, in cells (columns times frequency rows).
pub const MAX_HISTORY_CELLS: usize = 1 << 26;

/// User-facing analysis parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrogramConfig {
    /// Sample rate of the selected channel, in Hz.
    pub sample_rate: f32,
    /// Duration covered by one column; also the FFT window length.
    pub step_length_sec: f32,
    /// Highest frequency kept per column, in Hz.
    pub max_shown_frequency: f32,
    /// Duration of the retained history.
    pub chart_length_sec: f32,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            step_length_sec: DEFAULT_STEP_LENGTH_SEC,
            max_shown_frequency: DEFAULT_MAX_SHOWN_FREQUENCY,
            chart_length_sec: DEFAULT_CHART_LENGTH_SEC,
        }
    }
}

impl SpectrogramConfig {
    /// Derives buffer geometry, rejecting parameters the engine cannot honour.
    pub fn layout(&self) -> Result<SpectrogramLayout, ConfigError> {
        let positive = |value: f32| value.is_finite() && value > 0.0;
        if !positive(self.sample_rate) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if !positive(self.step_length_sec) {
            return Err(ConfigError::InvalidStepLength(self.step_length_sec));
        }
        if !positive(self.max_shown_frequency) {
            return Err(ConfigError::InvalidMaxFrequency(self.max_shown_frequency));
        }
        if !(self.chart_length_sec.is_finite() && self.chart_length_sec >= 0.0) {
            return Err(ConfigError::InvalidChartLength(self.chart_length_sec));
        }

        // Float-to-int casts saturate; the bounds below reject anything that did.
        let samples_per_step = (self.sample_rate * self.step_length_sec).round() as usize;
        if samples_per_step == 0 {
            return Err(ConfigError::EmptyWindow {
                sample_rate: self.sample_rate,
                step_length_sec: self.step_length_sec,
            });
        }
        if samples_per_step > MAX_WINDOW_SAMPLES {
            return Err(ConfigError::WindowTooLong {
                sample_rate: self.sample_rate,
                step_length_sec: self.step_length_sec,
            });
        }

        let available = samples_per_step / 2 + 1;
        let highest_bin = (self.max_shown_frequency * self.step_length_sec).floor();
        if highest_bin >= available as f32 {
            return Err(ConfigError::TooManyBins {
                requested: (highest_bin as usize).saturating_add(1),
                available,
            });
        }
        let freqs_per_column = highest_bin as usize + 1;

        let num_columns = (self.chart_length_sec / self.step_length_sec).round() as usize;
        num_columns
            .checked_mul(freqs_per_column)
            .filter(|&cells| cells <= MAX_HISTORY_CELLS)
            .ok_or(ConfigError::HistoryTooLarge {
                chart_length_sec: self.chart_length_sec,
                step_length_sec: self.step_length_sec,
            })?;

        Ok(SpectrogramLayout {
            samples_per_step,
            freqs_per_column,
            num_columns,
            sqrt_bandwidth: (1.0 / self.step_length_sec).sqrt(),
        })
    }
}

/// Buffer geometry derived from a [`SpectrogramConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrogramLayout {
    pub samples_per_step: usize,
    pub freqs_per_column: usize,
    pub num_columns: usize,
    /// Normalises FFT magnitudes to amplitude spectral density.
    pub sqrt_bandwidth: f32,
}

impl SpectrogramLayout {
    pub fn available_bins(&self) -> usize {
        self.samples_per_step / 2 + 1
    }

    pub fn matrix_len(&self) -> usize {
        self.num_columns * self.freqs_per_column
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),
    #[error("step length must be positive, got {0} s")]
    InvalidStepLength(f32),
    #[error("max shown frequency must be positive, got {0} Hz")]
    InvalidMaxFrequency(f32),
    #[error("chart length must not be negative, got {0} s")]
    InvalidChartLength(f32),
    #[error("step of {step_length_sec} s at {sample_rate} Hz holds no samples")]
    EmptyWindow {
        sample_rate: f32,
        step_length_sec: f32,
    },
    #[error("step of {step_length_sec} s at {sample_rate} Hz exceeds {max} samples", max = MAX_WINDOW_SAMPLES)]
    WindowTooLong {
        sample_rate: f32,
        step_length_sec: f32,
    },
    #[error("{requested} frequency bins requested but the window only yields {available}")]
    TooManyBins { requested: usize, available: usize },
    #[error(
        "{chart_length_sec} s of history at {step_length_sec} s per column exceeds {max} cells",
        max = MAX_HISTORY_CELLS
    )]
    HistoryTooLarge {
        chart_length_sec: f32,
        step_length_sec: f32,
    },
}

/// Indexed parameter surface used by generic parameter editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    Channel,
    MaxShownFrequency,
    StepLength,
    ChartLength,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::Channel,
        Parameter::MaxShownFrequency,
        Parameter::StepLength,
        Parameter::ChartLength,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Parameter::Channel => "PARAM_CHANNEL",
            Parameter::MaxShownFrequency => "PARAM_MAX_SHOWN_FREQ",
            Parameter::StepLength => "PARAM_STEP_LENGTH_SEC",
            Parameter::ChartLength => "PARAM_CHART_LENGTH_SEC",
        }
    }
}

/// Incremental update emitted for each host block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrogramUpdate {
    pub new_columns: usize,
    pub last_update: u64,
    pub generation: u64,
    pub freqs_per_column: usize,
    pub num_columns: usize,
    /// Set when the history was cleared since the previous update.
    pub reset: bool,
}

/// Real-input forward transform producing scaled bin magnitudes.
struct ColumnTransform {
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl fmt::Debug for ColumnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnTransform")
            .field("len", &self.input.len())
            .finish_non_exhaustive()
    }
}

impl ColumnTransform {
    fn new(planner: &mut RealFftPlanner<f32>, len: usize) -> Self {
        let fft = planner.plan_fft_forward(len);
        Self {
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
        }
    }

    fn len(&self) -> usize {
        self.input.len()
    }

    /// Writes `|X_k| * scale` for the first `out.len()` bins of `window`.
    fn magnitudes(&mut self, window: &[f32], scale: f32, out: &mut [f32]) -> Result<(), FftError> {
        // The transform uses its input as scratch space.
        self.input.copy_from_slice(window);
        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;
        for (value, bin) in out.iter_mut().zip(&self.spectrum) {
            *value = bin.norm() * scale;
        }
        Ok(())
    }
}

fn write_column(
    transform: &mut ColumnTransform,
    matrix: &mut RollingMatrix,
    window: &[f32],
    scale: f32,
) -> bool {
    let Some(slot) = matrix.next_column_mut() else {
        return false;
    };
    if let Err(err) = transform.magnitudes(window, scale, slot) {
        warn!("[spectrogram] transform failed, column left empty: {err}");
        slot.fill(f32::NAN);
    }
    true
}

/// Incremental spectrogram over one selected channel.
///
/// `ingest` and the reconfiguration methods take `&mut self` and must be
/// called from a single thread; renderers observe results through a
/// [`SpectrogramReader`].
pub struct SpectrogramEngine {
    config: SpectrogramConfig,
    layout: SpectrogramLayout,
    channel: Option<usize>,
    planner: RealFftPlanner<f32>,
    transform: ColumnTransform,
    accumulator: Vec<f32>,
    leftover: usize,
    channel_scratch: Vec<f32>,
    matrix: RollingMatrix,
    last_update: u64,
    generation: u64,
    publisher: Publisher,
    pending_reset: bool,
    rejected_sample_rate: Option<f32>,
}

impl fmt::Debug for SpectrogramEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrogramEngine")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl SpectrogramEngine {
    /// Builds an engine listening to channel 0.
    pub fn new(config: SpectrogramConfig) -> Result<Self, ConfigError> {
        let layout = config.layout()?;
        let mut planner = RealFftPlanner::<f32>::new();
        let transform = ColumnTransform::new(&mut planner, layout.samples_per_step);
        let mut engine = Self {
            config,
            layout,
            channel: Some(0),
            planner,
            transform,
            accumulator: vec![0.0; layout.samples_per_step],
            leftover: 0,
            channel_scratch: Vec::new(),
            matrix: RollingMatrix::new(layout.num_columns, layout.freqs_per_column),
            last_update: 0,
            generation: 0,
            publisher: Publisher::default(),
            pending_reset: true,
            rejected_sample_rate: None,
        };
        engine.log_layout();
        engine.publish_reset();
        Ok(engine)
    }

    pub fn config(&self) -> SpectrogramConfig {
        self.config
    }

    pub fn layout(&self) -> SpectrogramLayout {
        self.layout
    }

    pub fn selected_channel(&self) -> Option<usize> {
        self.channel
    }

    pub fn is_ready(&self) -> bool {
        self.channel.is_some()
    }

    pub fn matrix(&self) -> &RollingMatrix {
        &self.matrix
    }

    pub fn samples_per_step(&self) -> usize {
        self.layout.samples_per_step
    }

    pub fn freqs_per_column(&self) -> usize {
        self.layout.freqs_per_column
    }

    pub fn num_columns(&self) -> usize {
        self.layout.num_columns
    }

    pub fn max_shown_frequency(&self) -> f32 {
        self.config.max_shown_frequency
    }

    pub fn step_length_sec(&self) -> f32 {
        self.config.step_length_sec
    }

    pub fn chart_length_sec(&self) -> f32 {
        self.config.chart_length_sec
    }

    /// Samples waiting in the accumulator for the next window.
    pub fn leftover_len(&self) -> usize {
        self.leftover
    }

    /// Logical clock advanced once per block that produced columns.
    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    /// Bumped whenever the history is reallocated or cleared.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reader(&self) -> SpectrogramReader {
        self.publisher.reader()
    }

    /// Applies new parameters and clears all state. On error the previous
    /// configuration, buffers and history are left untouched.
    ///
    /// Allocates; do not call from a real-time thread.
    pub fn reconfigure(&mut self, config: SpectrogramConfig) -> Result<(), ConfigError> {
        let layout = config.layout().inspect_err(|err| {
            warn!("[spectrogram] rejected configuration {config:?}: {err}");
        })?;

        if layout.samples_per_step != self.transform.len() {
            self.transform = ColumnTransform::new(&mut self.planner, layout.samples_per_step);
        }
        self.config = config;
        self.layout = layout;
        self.rejected_sample_rate = None;
        self.log_layout();
        self.resize_buffers();
        Ok(())
    }

    /// Switches the analysed channel; `None` disables ingestion.
    pub fn select_channel(&mut self, channel: Option<usize>) {
        if self.channel != channel {
            info!("[spectrogram] channel {:?} -> {:?}", self.channel, channel);
        }
        self.channel = channel;
        self.resize_buffers();
    }

    pub fn set_parameter(&mut self, parameter: Parameter, value: f32) -> Result<(), ConfigError> {
        let config = match parameter {
            Parameter::Channel => {
                let channel = (value >= 0.0).then_some(value as usize);
                self.select_channel(channel);
                return Ok(());
            }
            Parameter::MaxShownFrequency => SpectrogramConfig {
                max_shown_frequency: value,
                ..self.config
            },
            Parameter::StepLength => SpectrogramConfig {
                step_length_sec: value,
                ..self.config
            },
            Parameter::ChartLength => SpectrogramConfig {
                chart_length_sec: value,
                ..self.config
            },
        };
        self.reconfigure(config)
    }

    pub fn parameter(&self, parameter: Parameter) -> f32 {
        match parameter {
            Parameter::Channel => self.channel.map_or(-1.0, |channel| channel as f32),
            Parameter::MaxShownFrequency => self.config.max_shown_frequency,
            Parameter::StepLength => self.config.step_length_sec,
            Parameter::ChartLength => self.config.chart_length_sec,
        }
    }

    /// Feeds samples of the selected channel and returns the number of
    /// columns appended. A no-op while no channel is selected.
    pub fn ingest(&mut self, samples: &[f32]) -> usize {
        if self.channel.is_none() {
            return 0;
        }

        let samples_per_step = self.layout.samples_per_step;
        let total = self.leftover + samples.len();
        if total < samples_per_step {
            self.accumulator[self.leftover..total].copy_from_slice(samples);
            self.leftover = total;
            self.flush_pending();
            return 0;
        }

        let scale = 1.0 / self.layout.sqrt_bandwidth;
        let (head, rest) = samples.split_at(samples_per_step - self.leftover);
        self.accumulator[self.leftover..].copy_from_slice(head);
        let mut produced = usize::from(write_column(
            &mut self.transform,
            &mut self.matrix,
            &self.accumulator,
            scale,
        ));

        let mut windows = rest.chunks_exact(samples_per_step);
        for window in windows.by_ref() {
            produced += usize::from(write_column(
                &mut self.transform,
                &mut self.matrix,
                window,
                scale,
            ));
        }

        let remainder = windows.remainder();
        self.accumulator[..remainder.len()].copy_from_slice(remainder);
        self.leftover = remainder.len();

        // A zero-length history stores nothing, so there is nothing to announce.
        if produced == 0 {
            self.flush_pending();
            return 0;
        }
        self.last_update += 1;
        let meta = self.snapshot_meta();
        self.publisher.try_publish(&self.matrix, meta);
        produced
    }

    fn flush_pending(&mut self) {
        if self.publisher.is_pending() {
            let meta = self.snapshot_meta();
            self.publisher.try_publish(&self.matrix, meta);
        }
    }

    fn resize_buffers(&mut self) {
        let layout = self.layout;
        self.accumulator = vec![0.0; layout.samples_per_step];
        self.leftover = 0;
        self.matrix = RollingMatrix::new(layout.num_columns, layout.freqs_per_column);
        self.publish_reset();
    }

    fn publish_reset(&mut self) {
        self.generation += 1;
        self.pending_reset = true;
        let meta = self.snapshot_meta();
        self.publisher.publish(&self.matrix, meta);
    }

    fn snapshot_meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            freqs_per_column: self.layout.freqs_per_column,
            num_columns: self.layout.num_columns,
            max_shown_frequency: self.config.max_shown_frequency,
            step_length_sec: self.config.step_length_sec,
            chart_length_sec: self.config.chart_length_sec,
            last_update: self.last_update,
            generation: self.generation,
        }
    }

    fn log_layout(&self) {
        info!(
            "[spectrogram] {} Hz, step {} s: window={} samples, rows={}, columns={}",
            self.config.sample_rate,
            self.config.step_length_sec,
            self.layout.samples_per_step,
            self.layout.freqs_per_column,
            self.layout.num_columns
        );
    }
}

impl AudioProcessor for SpectrogramEngine {
    type Output = SpectrogramUpdate;

    fn process_block(&mut self, block: &AudioBlock<'_>) -> ProcessorUpdate<Self::Output> {
        let Some(channel) = self.channel else {
            return ProcessorUpdate::None;
        };
        if block.frame_count() == 0 || channel >= block.channels {
            return ProcessorUpdate::None;
        }

        if (self.config.sample_rate - block.sample_rate).abs() > f32::EPSILON {
            if self.rejected_sample_rate == Some(block.sample_rate) {
                return ProcessorUpdate::None;
            }
            debug!(
                "[spectrogram] sample rate changed {} -> {}",
                self.config.sample_rate, block.sample_rate
            );
            let config = SpectrogramConfig {
                sample_rate: block.sample_rate,
                ..self.config
            };
            if self.reconfigure(config).is_err() {
                // Blocks at this rate are dropped until the rate or the config changes.
                self.rejected_sample_rate = Some(block.sample_rate);
                return ProcessorUpdate::None;
            }
        }

        let mut scratch = std::mem::take(&mut self.channel_scratch);
        scratch.clear();
        scratch.extend(block.channel(channel));
        let new_columns = self.ingest(&scratch);
        self.channel_scratch = scratch;

        if new_columns == 0 && !self.pending_reset {
            return ProcessorUpdate::None;
        }

        let reset = std::mem::take(&mut self.pending_reset);
        ProcessorUpdate::Snapshot(SpectrogramUpdate {
            new_columns,
            last_update: self.last_update,
            generation: self.generation,
            freqs_per_column: self.layout.freqs_per_column,
            num_columns: self.layout.num_columns,
            reset,
        })
    }

    fn reset(&mut self) {
        self.accumulator.fill(0.0);
        self.leftover = 0;
        self.matrix.clear();
        self.publish_reset();
    }
}

impl Reconfigurable<SpectrogramConfig> for SpectrogramEngine {
    type Error = ConfigError;

    fn update_config(&mut self, config: SpectrogramConfig) -> Result<(), Self::Error> {
        self.reconfigure(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{AudioBlock, ProcessorUpdate};

    fn reference_config() -> SpectrogramConfig {
        SpectrogramConfig {
            sample_rate: 1_000.0,
            step_length_sec: 0.1,
            max_shown_frequency: 300.0,
            chart_length_sec: 5.0,
        }
    }

    /// 10-sample windows, a single DC row, five columns. Bin 0 of a DC
    /// block of level `a` comes out as exactly `a` after normalisation.
    fn dc_config() -> SpectrogramConfig {
        SpectrogramConfig {
            sample_rate: 1_000.0,
            step_length_sec: 0.01,
            max_shown_frequency: 50.0,
            chart_length_sec: 0.05,
        }
    }

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (core::f32::consts::TAU * freq * n as f32 / sample_rate).sin())
            .collect()
    }

    fn assert_all_nan(engine: &SpectrogramEngine) {
        assert!(engine.matrix().to_vec().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn reference_layout() {
        let layout = reference_config().layout().unwrap();
        assert_eq!(layout.samples_per_step, 100);
        assert_eq!(layout.freqs_per_column, 31);
        assert_eq!(layout.num_columns, 50);
        assert!((layout.sqrt_bandwidth - 10f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn new_engine_is_empty() {
        let engine = SpectrogramEngine::new(reference_config()).unwrap();
        assert_eq!(engine.matrix().len(), 50 * 31);
        assert_eq!(engine.leftover_len(), 0);
        assert_eq!(engine.last_update(), 0);
        assert!(engine.is_ready());
        assert_all_nan(&engine);
    }

    #[test]
    fn reconfigure_is_idempotent_and_forgets_ingestion() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        engine.ingest(&vec![0.5; 250]);
        assert_eq!(engine.leftover_len(), 50);

        for _ in 0..2 {
            engine.reconfigure(reference_config()).unwrap();
            assert_eq!(engine.matrix().len(), 50 * 31);
            assert_eq!(engine.leftover_len(), 0);
            assert_all_nan(&engine);
        }
    }

    #[test]
    fn exact_window_produces_one_column() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        assert_eq!(engine.ingest(&vec![0.1; 100]), 1);
        assert_eq!(engine.leftover_len(), 0);
        assert_eq!(engine.last_update(), 1);

        let newest = engine.matrix().column(49).unwrap();
        assert!(newest.iter().all(|v| v.is_finite()));
        assert!(engine.matrix().column(48).unwrap()[0].is_nan());
    }

    #[test]
    fn completing_a_partial_window_leaves_no_leftover() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        engine.ingest(&[0.0; 37]);
        assert_eq!(engine.ingest(&[0.0; 63]), 1);
        assert_eq!(engine.leftover_len(), 0);
    }

    #[test]
    fn short_blocks_accumulate_across_calls() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        let block = vec![0.25; 99];
        let calls = 250;

        let mut columns = 0;
        let mut producing_calls = 0;
        for _ in 0..calls {
            let produced = engine.ingest(&block);
            columns += produced;
            producing_calls += usize::from(produced > 0);
        }

        assert_eq!(columns, calls * 99 / 100);
        assert_eq!(engine.leftover_len(), calls * 99 % 100);
        assert_eq!(engine.last_update(), producing_calls as u64);
    }

    #[test]
    fn three_short_blocks_make_one_column() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        let produced: Vec<usize> = (0..3).map(|_| engine.ingest(&[1.0; 40])).collect();

        assert_eq!(produced, vec![0, 0, 1]);
        assert_eq!(engine.leftover_len(), 20);
        assert_eq!(engine.last_update(), 1);
    }

    #[test]
    fn large_block_yields_several_columns_in_order() {
        let mut engine = SpectrogramEngine::new(dc_config()).unwrap();
        assert_eq!(engine.freqs_per_column(), 1);
        assert_eq!(engine.num_columns(), 5);

        let block: Vec<f32> = (1..=8)
            .flat_map(|level| std::iter::repeat_n(level as f32, 10))
            .chain([9.0; 4])
            .collect();
        assert_eq!(engine.ingest(&block), 8);
        assert_eq!(engine.leftover_len(), 4);
        assert_eq!(engine.last_update(), 1);

        let values = engine.matrix().to_vec();
        let expected = [4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(values.len(), expected.len());
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-3 * expected, "{value} != {expected}");
        }
    }

    #[test]
    fn sine_peaks_in_its_bin() {
        let config = reference_config();
        let mut engine = SpectrogramEngine::new(config).unwrap();
        engine.ingest(&sine(120.0, config.sample_rate, 100));

        let column = engine.matrix().column(49).unwrap();
        let (peak, magnitude) = column
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert_eq!(peak, 12);

        // Amplitude 1 over 100 samples: |X| = 50, normalised by sqrt(10).
        let expected = 50.0 / 10f32.sqrt();
        assert!((magnitude - expected).abs() < expected * 0.01);
    }

    #[test]
    fn rejects_too_many_bins_and_keeps_state() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        engine.ingest(&vec![0.3; 130]);
        let before = engine.matrix().to_vec();
        let generation = engine.generation();

        let err = engine
            .set_parameter(Parameter::MaxShownFrequency, 600.0)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::TooManyBins {
                requested: 61,
                available: 51
            }
        );
        assert_eq!(engine.max_shown_frequency(), 300.0);
        assert_eq!(engine.freqs_per_column(), 31);
        assert_eq!(engine.leftover_len(), 30);
        assert_eq!(engine.generation(), generation);
        let after = engine.matrix().to_vec();
        assert!(
            before
                .iter()
                .zip(&after)
                .all(|(a, b)| a.to_bits() == b.to_bits())
        );
    }

    #[test]
    fn rejects_degenerate_parameters() {
        let base = reference_config();
        let cases = [
            (
                SpectrogramConfig {
                    sample_rate: 1.0,
                    ..base
                },
                ConfigError::EmptyWindow {
                    sample_rate: 1.0,
                    step_length_sec: 0.1,
                },
            ),
            (
                SpectrogramConfig {
                    step_length_sec: 0.0,
                    ..base
                },
                ConfigError::InvalidStepLength(0.0),
            ),
            (
                SpectrogramConfig {
                    sample_rate: -1.0,
                    ..base
                },
                ConfigError::InvalidSampleRate(-1.0),
            ),
            (
                SpectrogramConfig {
                    chart_length_sec: -1.0,
                    ..base
                },
                ConfigError::InvalidChartLength(-1.0),
            ),
        ];

        for (config, expected) in cases {
            assert_eq!(config.layout().unwrap_err(), expected);
            assert!(SpectrogramEngine::new(config).is_err());
        }
    }

    #[test]
    fn rejects_extreme_parameters_without_overflow() {
        let base = reference_config();

        let loud = SpectrogramConfig {
            max_shown_frequency: f32::MAX,
            ..base
        };
        assert_eq!(
            loud.layout().unwrap_err(),
            ConfigError::TooManyBins {
                requested: usize::MAX,
                available: 51
            }
        );

        let fast = SpectrogramConfig {
            sample_rate: f32::MAX,
            ..base
        };
        assert_eq!(
            fast.layout().unwrap_err(),
            ConfigError::WindowTooLong {
                sample_rate: f32::MAX,
                step_length_sec: 0.1
            }
        );

        let long = SpectrogramConfig {
            chart_length_sec: 1.0e30,
            ..base
        };
        let expected = ConfigError::HistoryTooLarge {
            chart_length_sec: 1.0e30,
            step_length_sec: 0.1,
        };
        assert_eq!(SpectrogramEngine::new(long).unwrap_err(), expected);

        let mut engine = SpectrogramEngine::new(base).unwrap();
        engine.ingest(&[0.2; 130]);
        assert_eq!(engine.reconfigure(long).unwrap_err(), expected);
        assert_eq!(engine.num_columns(), 50);
        assert_eq!(engine.leftover_len(), 30);
        assert_eq!(engine.last_update(), 1);
    }

    #[test]
    fn zero_length_chart_reports_no_columns() {
        let mut engine = SpectrogramEngine::new(SpectrogramConfig {
            chart_length_sec: 0.0,
            ..reference_config()
        })
        .unwrap();
        let reader = engine.reader();
        assert_eq!(engine.num_columns(), 0);

        assert_eq!(engine.ingest(&[1.0; 250]), 0);
        assert_eq!(engine.leftover_len(), 50);
        assert_eq!(engine.last_update(), 0);
        assert_eq!(reader.last_update(), 0);
        assert!(reader.snapshot().values.is_empty());
    }

    #[test]
    fn unusable_sample_rate_is_remembered_until_config_changes() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        let generation = engine.generation();

        // One sample per 0.1 s step rounds to an empty window.
        let samples = vec![0.5; 8];
        let slow = AudioBlock::new(&samples, 1, 1.0);
        assert_eq!(engine.process_block(&slow), ProcessorUpdate::None);
        assert_eq!(engine.rejected_sample_rate, Some(1.0));
        assert_eq!(engine.process_block(&slow), ProcessorUpdate::None);
        assert_eq!(engine.generation(), generation);
        assert_eq!(engine.config().sample_rate, 1_000.0);

        // Blocks at the configured rate keep flowing meanwhile.
        let window = vec![0.5; 100];
        let normal = AudioBlock::new(&window, 1, 1_000.0);
        let update: Option<SpectrogramUpdate> = engine.process_block(&normal).into();
        assert_eq!(update.map(|u| u.new_columns), Some(1));
        assert_eq!(engine.rejected_sample_rate, Some(1.0));

        engine
            .set_parameter(Parameter::MaxShownFrequency, 0.5)
            .unwrap();
        assert_eq!(engine.rejected_sample_rate, None);
        engine.set_parameter(Parameter::StepLength, 2.0).unwrap();
        let update: Option<SpectrogramUpdate> = engine.process_block(&slow).into();
        assert!(update.expect("rate accepted after step change").reset);
        assert_eq!(engine.samples_per_step(), 2);
    }

    #[test]
    fn disabled_channel_ignores_samples() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        engine.select_channel(None);
        assert!(!engine.is_ready());

        assert_eq!(engine.ingest(&vec![1.0; 500]), 0);
        assert_eq!(engine.leftover_len(), 0);
        assert_eq!(engine.last_update(), 0);
        assert_all_nan(&engine);
    }

    #[test]
    fn parameter_surface_round_trips() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        assert_eq!(Parameter::from_index(2), Some(Parameter::StepLength));
        assert_eq!(Parameter::from_index(Parameter::COUNT), None);
        assert_eq!(Parameter::ChartLength.name(), "PARAM_CHART_LENGTH_SEC");

        engine.set_parameter(Parameter::ChartLength, 2.0).unwrap();
        assert_eq!(engine.parameter(Parameter::ChartLength), 2.0);
        assert_eq!(engine.num_columns(), 20);

        engine.set_parameter(Parameter::Channel, -1.0).unwrap();
        assert_eq!(engine.parameter(Parameter::Channel), -1.0);
        engine.set_parameter(Parameter::Channel, 3.0).unwrap();
        assert_eq!(engine.selected_channel(), Some(3));
    }

    #[test]
    fn reconfigure_drops_leftover_samples() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        engine.ingest(&[1.0; 60]);
        engine.set_parameter(Parameter::StepLength, 0.05).unwrap();
        assert_eq!(engine.samples_per_step(), 50);
        assert_eq!(engine.leftover_len(), 0);
        assert_eq!(engine.ingest(&[1.0; 49]), 0);
    }

    #[test]
    fn process_block_reads_selected_channel() {
        let config = dc_config();
        let mut engine = SpectrogramEngine::new(config).unwrap();
        engine.select_channel(Some(1));

        let interleaved: Vec<f32> = (0..10).flat_map(|_| [0.0, 2.0]).collect();
        let block = AudioBlock::new(&interleaved, 2, config.sample_rate);
        let update = match engine.process_block(&block) {
            ProcessorUpdate::Snapshot(update) => update,
            ProcessorUpdate::None => panic!("expected snapshot"),
        };

        assert_eq!(update.new_columns, 1);
        assert!(update.reset);
        let value = engine.matrix().get(4, 0).unwrap();
        assert!((value - 2.0).abs() < 1e-3);

        // Nothing new and no reset pending.
        let short = AudioBlock::new(&interleaved[..4], 2, config.sample_rate);
        assert_eq!(engine.process_block(&short), ProcessorUpdate::None);
    }

    #[test]
    fn process_block_follows_sample_rate_changes() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        let generation = engine.generation();
        let samples = vec![0.0; 200];
        let block = AudioBlock::new(&samples, 1, 2_000.0);

        let update: Option<SpectrogramUpdate> = engine.process_block(&block).into();
        let update = update.expect("reset must be reported");
        assert!(update.reset);
        assert_eq!(update.new_columns, 1);
        assert_eq!(engine.samples_per_step(), 200);
        assert!(engine.generation() > generation);
    }

    #[test]
    fn reset_clears_history_but_keeps_config() {
        let mut engine = SpectrogramEngine::new(reference_config()).unwrap();
        engine.ingest(&vec![1.0; 150]);
        engine.reset();
        assert_eq!(engine.leftover_len(), 0);
        assert_eq!(engine.samples_per_step(), 100);
        assert_all_nan(&engine);
    }

    #[test]
    fn reader_observes_published_columns() {
        let mut engine = SpectrogramEngine::new(dc_config()).unwrap();
        let reader = engine.reader();
        let mut seen = SeenState::default();

        let initial = reader.poll(&mut seen).expect("initial snapshot");
        assert_eq!(initial.values.len(), 5);
        assert!(initial.values.iter().all(|v| v.is_nan()));
        drop(initial);
        assert!(reader.poll(&mut seen).is_none());

        engine.ingest(&[3.0; 10]);
        let snapshot = reader.poll(&mut seen).expect("new column");
        assert_eq!(snapshot.last_update, 1);
        assert!((snapshot.value(4, 0).unwrap() - 3.0).abs() < 1e-3);
    }

    #[test]
    fn held_snapshot_defers_but_never_loses_updates() {
        let mut engine = SpectrogramEngine::new(dc_config()).unwrap();
        let reader = engine.reader();

        let guard = reader.snapshot();
        assert_eq!(engine.ingest(&[1.0; 10]), 1);
        assert_eq!(guard.last_update, 0);
        drop(guard);
        assert_eq!(reader.last_update(), 0);

        // A block too short for a column still flushes the pending snapshot.
        assert_eq!(engine.ingest(&[1.0; 3]), 0);
        assert_eq!(reader.last_update(), 1);
        assert!((reader.snapshot().value(4, 0).unwrap() - 1.0).abs() < 1e-3);
    }
}
