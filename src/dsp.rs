pub mod spectrogram;

/// Interleaved block of samples as delivered by the host.
#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    pub samples: &'a [f32],
    pub channels: usize,
    pub sample_rate: f32,
}

impl<'a> AudioBlock<'a> {
    pub fn new(samples: &'a [f32], channels: usize, sample_rate: f32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    /// Samples of one channel over complete frames; empty if `channel` is out of range.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        let stride = self.channels.max(1);
        let start = if channel < self.channels {
            channel
        } else {
            self.samples.len()
        };
        self.samples
            .get(start..)
            .unwrap_or_default()
            .iter()
            .step_by(stride)
            .take(self.frame_count())
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorUpdate<T> {
    None,
    Snapshot(T),
}

impl<T> From<ProcessorUpdate<T>> for Option<T> {
    fn from(update: ProcessorUpdate<T>) -> Self {
        match update {
            ProcessorUpdate::Snapshot(s) => Some(s),
            ProcessorUpdate::None => None,
        }
    }
}

pub trait AudioProcessor {
    type Output;

    fn process_block(&mut self, block: &AudioBlock<'_>) -> ProcessorUpdate<Self::Output>;
    fn reset(&mut self);
}

pub trait Reconfigurable<Cfg> {
    type Error;

    fn update_config(&mut self, config: Cfg) -> Result<(), Self::Error>;
}
