use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};
use spectroscroll::dsp::spectrogram::{SeenState, SpectrogramEngine};
use spectroscroll::dsp::{AudioBlock, AudioProcessor, ProcessorUpdate};
use spectroscroll::render::{SpectrogramImage, color_index};
use spectroscroll::settings::{self, SettingsManager};
use spectroscroll::util::audio::{Sweep, TestSignal};
use spectroscroll::util::telemetry;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const SAMPLE_RATE: f32 = 2_000.0;
const CHANNELS: usize = 2;
const BLOCK_FRAMES: usize = 64;
const CHANNEL_CAPACITY: usize = 64;
const REFRESH_INTERVAL: Duration = Duration::from_millis(20);
const RUN_DURATION: Duration = Duration::from_secs(6);

fn main() {
    telemetry::init();
    info!("spectroscroll starting up");

    if let Err(err) = run() {
        error!("[host] failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let dump_path = std::env::args_os().nth(1).map(PathBuf::from);

    let manager = SettingsManager::load_or_default(settings::default_path());
    if !manager.path().exists() {
        if let Err(err) = manager.save() {
            warn!("[settings] could not write defaults: {err}");
        }
    }
    let settings = *manager.settings();
    if settings.channel.is_some_and(|channel| channel >= CHANNELS) {
        warn!(
            "[host] channel {:?} not present in a {CHANNELS}-channel stream; nothing will be drawn",
            settings.channel
        );
    }

    let mut engine = SpectrogramEngine::new(settings.to_config(SAMPLE_RATE))
        .context("spectrogram settings rejected")?;
    if engine.selected_channel() != settings.channel {
        engine.select_channel(settings.channel);
    }
    let reader = engine.reader();

    let (sender, receiver) = async_channel::bounded::<Vec<f32>>(CHANNEL_CAPACITY);
    let control = receiver.clone();
    let source = spawn_source(sender).context("failed to spawn sample source thread")?;
    let worker = spawn_engine(engine, receiver).context("failed to spawn engine thread")?;

    let mut image = SpectrogramImage::default();
    let mut seen = SeenState::default();
    let mut redraws = 0u64;
    let started = Instant::now();
    while started.elapsed() < RUN_DURATION {
        if let Some(snapshot) = reader.poll(&mut seen) {
            image.update_from(&snapshot);
            redraws += 1;

            let (filled, index_sum) = snapshot
                .values
                .iter()
                .filter(|value| !value.is_nan())
                .fold((0usize, 0usize), |(n, sum), value| (n + 1, sum + color_index(*value)));
            debug!(
                "[host] redraw #{redraws}: update={} generation={} filled={filled} mean_index={}",
                snapshot.last_update,
                snapshot.generation,
                index_sum.checked_div(filled).unwrap_or(0)
            );
        }
        thread::sleep(REFRESH_INTERVAL);
    }

    control.close();
    let blocks = source
        .join()
        .map_err(|_| anyhow!("sample source thread panicked"))?;
    let engine = worker
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?;

    info!(
        "[host] {blocks} blocks in, {} updates, {redraws} redraws, {} leftover samples",
        engine.last_update(),
        engine.leftover_len()
    );

    if let Some(path) = dump_path {
        image.update_from(&reader.snapshot());
        let file = File::create(&path).with_context(|| format!("creating {path:?}"))?;
        image
            .write_ppm(BufWriter::new(file))
            .with_context(|| format!("writing {path:?}"))?;
        info!(
            "[host] wrote {}x{} spectrogram to {path:?}",
            image.width(),
            image.height()
        );
    }

    Ok(())
}

fn spawn_source(sender: Sender<Vec<f32>>) -> std::io::Result<JoinHandle<u64>> {
    thread::Builder::new()
        .name("spectroscroll-source".into())
        .spawn(move || {
            let mut signal = TestSignal::new(SAMPLE_RATE, CHANNELS)
                .with_tone(0, 50.0, 1.0e-3)
                .with_tone(1, 120.0, 5.0e-4)
                .with_sweep(Sweep {
                    from_hz: 10.0,
                    to_hz: 900.0,
                    period_sec: 2.0,
                    amplitude: 1.0e-4,
                });
            let block_period = Duration::from_secs_f32(BLOCK_FRAMES as f32 / SAMPLE_RATE);

            let mut blocks = 0u64;
            loop {
                let mut block = vec![0.0; BLOCK_FRAMES * CHANNELS];
                signal.fill_interleaved(&mut block);
                if sender.send_blocking(block).is_err() {
                    break;
                }
                blocks += 1;
                thread::sleep(block_period);
            }
            debug!("[host] sample source stopped after {blocks} blocks");
            blocks
        })
}

fn spawn_engine(
    mut engine: SpectrogramEngine,
    receiver: Receiver<Vec<f32>>,
) -> std::io::Result<JoinHandle<SpectrogramEngine>> {
    thread::Builder::new()
        .name("spectroscroll-engine".into())
        .spawn(move || {
            while let Ok(samples) = receiver.recv_blocking() {
                let block = AudioBlock::new(&samples, CHANNELS, SAMPLE_RATE);
                if let ProcessorUpdate::Snapshot(update) = engine.process_block(&block) {
                    if update.reset {
                        debug!(
                            "[host] history reset: {} x {}",
                            update.num_columns, update.freqs_per_column
                        );
                    }
                }
            }
            engine
        })
}
