//! List available input devices

use vigil_audio::list_devices;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Input devices:");
    for device in list_devices()? {
        println!(
            "  [{}] {}{} ({} ch, {} Hz)",
            device.index,
            device.name,
            if device.is_default { " (default)" } else { "" },
            device.max_input_channels,
            device.default_sample_rate
        );
    }
    Ok(())
}
