use std::f64::consts::TAU;

// Default sample rate (Hz) used when the host has not reported one yet.
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub amplitude: f32,
}

/// Linear chirp restarting every `period_sec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    pub from_hz: f32,
    pub to_hz: f32,
    pub period_sec: f32,
    pub amplitude: f32,
}

impl Sweep {
    fn value_at(&self, t: f64) -> f64 {
        let period = f64::from(self.period_sec.max(f32::EPSILON));
        let t = t % period;
        let f0 = f64::from(self.from_hz);
        let slope = (f64::from(self.to_hz) - f0) / period;
        let phase = TAU * (f0 * t + 0.5 * slope * t * t);
        f64::from(self.amplitude) * phase.sin()
    }
}

/// Deterministic interleaved test source: per-channel tones plus an optional
/// sweep mixed into every channel.
#[derive(Debug, Clone)]
pub struct TestSignal {
    sample_rate: f32,
    tones: Vec<Vec<Tone>>,
    sweep: Option<Sweep>,
    position: u64,
}

impl TestSignal {
    pub fn new(sample_rate: f32, channels: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1.0),
            tones: vec![Vec::new(); channels.max(1)],
            sweep: None,
            position: 0,
        }
    }

    pub fn with_tone(mut self, channel: usize, frequency: f32, amplitude: f32) -> Self {
        if let Some(tones) = self.tones.get_mut(channel) {
            tones.push(Tone {
                frequency,
                amplitude,
            });
        }
        self
    }

    pub fn with_sweep(mut self, sweep: Sweep) -> Self {
        self.sweep = Some(sweep);
        self
    }

    pub fn channels(&self) -> usize {
        self.tones.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Fills `out` with whole frames; a trailing partial frame is zeroed.
    pub fn fill_interleaved(&mut self, out: &mut [f32]) {
        let channels = self.channels();
        let sample_rate = f64::from(self.sample_rate);
        let mut frames = out.chunks_exact_mut(channels);
        for frame in frames.by_ref() {
            let t = self.position as f64 / sample_rate;
            let sweep = self.sweep.map_or(0.0, |sweep| sweep.value_at(t));
            for (sample, tones) in frame.iter_mut().zip(&self.tones) {
                let sum: f64 = tones
                    .iter()
                    .map(|tone| {
                        f64::from(tone.amplitude) * (TAU * f64::from(tone.frequency) * t).sin()
                    })
                    .sum();
                *sample = (sum + sweep) as f32;
            }
            self.position += 1;
        }
        frames.into_remainder().fill(0.0);
    }
}
