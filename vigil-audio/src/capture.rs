//! Microphone capture with cpal
//!
//! The session only ever sees the [`MicrophoneProvider`] seam. The cpal
//! implementation keeps the (non-`Send`) host stream on a dedicated thread
//! and hands back a small `Send` handle that stops it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BuildStreamError, DefaultStreamConfigError, Device, FromSample, PlayStreamError, Sample, SampleFormat,
    SizedSample, StreamConfig,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use crate::error::{AudioError, Result};
use crate::gain::AutomaticGain;
use crate::resampler::{first_channel, Resampler};
use crate::AudioConfig;

/// Called from the capture thread with one fixed-size mono frame
pub type FrameCallback = Arc<dyn Fn(Vec<f32>) + Send + Sync>;

/// Capability to open the microphone
pub trait MicrophoneProvider: Send + Sync {
    /// Acquire the device and start delivering frames to `on_frame`.
    ///
    /// May block while the platform resolves device access.
    fn acquire(&self, config: &AudioConfig, on_frame: FrameCallback) -> Result<Box<dyn MicrophoneStream>>;
}

/// An acquired microphone stream
pub trait MicrophoneStream: Send {
    /// Stop delivering frames and release the device. Idempotent.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Audio device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    pub max_input_channels: u16,
    pub default_sample_rate: u32,
}

/// Enumerate input devices on the default host
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::device(format!("Failed to enumerate devices: {}", e)))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Unknown Device {}", index));
            let (max_input_channels, default_sample_rate) = device
                .default_input_config()
                .map(|c| (c.channels(), c.sample_rate().0))
                .unwrap_or((0, 0));

            DeviceInfo {
                index,
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                max_input_channels,
                default_sample_rate,
            }
        })
        .collect())
}

/// Microphone provider backed by the default cpal host
#[derive(Debug, Default, Clone)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }
}

impl MicrophoneProvider for CpalMicrophone {
    fn acquire(&self, config: &AudioConfig, on_frame: FrameCallback) -> Result<Box<dyn MicrophoneStream>> {
        config.validate()?;

        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let active = Arc::new(AtomicBool::new(false));

        let thread_config = config.clone();
        let thread_active = Arc::clone(&active);

        thread::Builder::new()
            .name("vigil-mic".to_string())
            .spawn(move || {
                let stream = match open_stream(&thread_config, Arc::clone(&thread_active), on_frame) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                thread_active.store(true, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(()));

                // Park until stop() or the handle is dropped
                let _ = stop_rx.recv();
                thread_active.store(false, Ordering::SeqCst);
                drop(stream);
                debug!("Microphone stream released");
            })?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::stream("Capture thread exited before reporting"))??;

        Ok(Box::new(CpalStreamHandle {
            active,
            stop_tx: Some(stop_tx),
        }))
    }
}

struct CpalStreamHandle {
    active: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
}

impl MicrophoneStream for CpalStreamHandle {
    fn stop(&mut self) {
        // The flag goes first so an in-flight callback drops its frame
        self.active.store(false, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
            info!("Microphone capture stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for CpalStreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn select_device(config: &AudioConfig) -> Result<Device> {
    let host = cpal::default_host();

    match config.device_index {
        Some(index) => {
            let mut devices = host
                .input_devices()
                .map_err(|e| AudioError::classify(format!("Failed to enumerate devices: {}", e)))?;
            devices
                .nth(index)
                .ok_or_else(|| AudioError::DeviceAbsent(format!("Device index {} not found", index)))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceAbsent("No default input device found".to_string())),
    }
}

fn open_stream(config: &AudioConfig, active: Arc<AtomicBool>, on_frame: FrameCallback) -> Result<cpal::Stream> {
    let device = select_device(config)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device.default_input_config().map_err(|e| match e {
        DefaultStreamConfigError::DeviceNotAvailable => AudioError::DeviceAbsent(e.to_string()),
        other => AudioError::classify(other.to_string()),
    })?;

    let source_rate = supported.sample_rate().0;
    let source_channels = supported.channels();

    info!(
        "Opening microphone '{}': {} Hz x{} → {} Hz mono, frame {} samples",
        device_name, source_rate, source_channels, config.sample_rate, config.frame_size
    );
    if config.echo_cancellation {
        debug!("Echo cancellation requested; not offered by the cpal host, capturing unprocessed input");
    }
    if config.noise_suppression {
        warn!("Noise suppression requested but never applied: distress artifacts must reach the engine");
    }

    let stream_config = StreamConfig {
        channels: source_channels,
        sample_rate: cpal::SampleRate(source_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let assembler = Arc::new(Mutex::new(FrameAssembler::new(config, source_rate, source_channels)?));

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, assembler, active, on_frame),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, assembler, active, on_frame),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, assembler, active, on_frame),
        SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, assembler, active, on_frame),
        other => Err(AudioError::device(format!("Unsupported sample format: {:?}", other))),
    }?;

    stream.play().map_err(|e| match e {
        PlayStreamError::DeviceNotAvailable => AudioError::DeviceAbsent(e.to_string()),
        other => AudioError::classify(other.to_string()),
    })?;

    Ok(stream)
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    assembler: Arc<Mutex<FrameAssembler>>,
    active: Arc<AtomicBool>,
    on_frame: FrameCallback,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !active.load(Ordering::Relaxed) {
                    return;
                }

                let samples: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
                let frames = assembler.lock().push(&samples);
                for frame in frames {
                    on_frame(frame);
                }
            },
            |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| match e {
            BuildStreamError::DeviceNotAvailable => AudioError::DeviceAbsent(e.to_string()),
            other => AudioError::classify(other.to_string()),
        })
}

/// Turns host-sized interleaved blocks into fixed-size 16 kHz mono frames
pub(crate) struct FrameAssembler {
    channels: u16,
    frame_size: usize,
    resampler: Resampler,
    gain: Option<AutomaticGain>,
    pending: Vec<f32>,
}

impl FrameAssembler {
    pub(crate) fn new(config: &AudioConfig, source_rate: u32, source_channels: u16) -> Result<Self> {
        Ok(Self {
            channels: source_channels,
            frame_size: config.frame_size,
            resampler: Resampler::new(source_rate, config.sample_rate)?,
            gain: config
                .auto_gain_control
                .then(|| AutomaticGain::new(config.sample_rate)),
            pending: Vec::with_capacity(config.frame_size * 2),
        })
    }

    pub(crate) fn push(&mut self, interleaved: &[f32]) -> Vec<Vec<f32>> {
        let mono = first_channel(interleaved, self.channels);
        let mut audio = match self.resampler.push(&mono) {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Dropping block: {}", e);
                return Vec::new();
            }
        };

        if let Some(gain) = self.gain.as_mut() {
            gain.process_inplace(&mut audio);
        }

        self.pending.extend_from_slice(&audio);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_size {
            frames.push(self.pending.drain(..self.frame_size).collect());
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(frame_size: usize, agc: bool) -> AudioConfig {
        AudioConfig {
            frame_size,
            auto_gain_control: agc,
            ..Default::default()
        }
    }

    #[test]
    fn test_assembler_emits_fixed_frames() {
        let mut assembler = FrameAssembler::new(&config(4, false), 16000, 1).unwrap();

        assert!(assembler.push(&[0.1, 0.2, 0.3]).is_empty());
        let frames = assembler.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(frames, vec![vec![0.1, 0.2, 0.3, 0.4], vec![0.5, 0.6, 0.7, 0.8]]);
    }

    #[test]
    fn test_assembler_downmixes_to_first_channel() {
        let mut assembler = FrameAssembler::new(&config(2, false), 16000, 2).unwrap();
        let frames = assembler.push(&[0.1, 0.9, 0.2, 0.9]);
        assert_eq!(frames, vec![vec![0.1, 0.2]]);
    }

    #[test]
    fn test_assembler_resamples() {
        let mut assembler = FrameAssembler::new(&config(1600, false), 48000, 1).unwrap();
        let frames = assembler.push(&vec![0.0; 48000]);
        // One second at 48 kHz is ~16000 samples, i.e. about ten frames
        assert!(frames.len() >= 9 && frames.len() <= 10, "got {} frames", frames.len());
        assert!(frames.iter().all(|f| f.len() == 1600));
    }

    #[test]
    fn test_cpal_microphone_rejects_invalid_config() {
        let mic = CpalMicrophone::new();
        let bad = AudioConfig {
            frame_size: 0,
            ..Default::default()
        };
        let result = mic.acquire(&bad, Arc::new(|_| {}));
        assert!(matches!(result, Err(AudioError::InvalidConfig(_))));
    }
}
