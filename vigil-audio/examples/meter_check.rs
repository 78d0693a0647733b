//! Capture for five seconds and print the meter level of every frame

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use vigil_audio::{encode_pcm16, AudioConfig, CpalMicrophone, MicrophoneProvider, VolumeMeter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AudioConfig::default();
    let meter = Arc::new(Mutex::new(VolumeMeter::new(config.fft_size)));

    let frame_meter = Arc::clone(&meter);
    let mut stream = CpalMicrophone::new().acquire(
        &config,
        Arc::new(move |frame: Vec<f32>| {
            let level = frame_meter.lock().sample(&frame);
            let encoded = encode_pcm16(&frame);
            println!(
                "frame: {} samples, {} base64 chars, level {:?}",
                encoded.sample_count,
                encoded.data.len(),
                level
            );
        }),
    )?;

    thread::sleep(Duration::from_secs(5));
    stream.stop();
    Ok(())
}
