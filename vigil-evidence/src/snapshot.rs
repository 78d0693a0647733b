//! Lossy snapshot encoding

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

use crate::error::{EvidenceError, Result};

/// Fixed JPEG quality (0.5 on a 0..1 scale)
pub const JPEG_QUALITY: u8 = 50;

/// Encode a frame as a `data:image/jpeg;base64,...` URL
pub fn encode_jpeg_data_url(frame: &RgbImage, quality: u8) -> Result<String> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(EvidenceError::feed_not_ready("empty frame"));
    }

    let mut jpeg = Vec::with_capacity((width * height / 4) as usize);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
        encoder.encode(frame.as_raw(), width, height, ExtendedColorType::Rgb8)?;
    }

    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_decodes_to_jpeg() {
        let frame = RgbImage::from_fn(32, 24, |x, y| image::Rgb([(x * 8) as u8, (y * 10) as u8, 128]));
        let url = encode_jpeg_data_url(&frame, JPEG_QUALITY).unwrap();

        let payload = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = BASE64.decode(payload).unwrap();
        // SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let frame = RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * y) as u8, (x ^ y) as u8, (x + y) as u8]));
        let low = encode_jpeg_data_url(&frame, 10).unwrap();
        let high = encode_jpeg_data_url(&frame, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_empty_frame_rejected() {
        let frame = RgbImage::new(0, 0);
        assert!(matches!(
            encode_jpeg_data_url(&frame, JPEG_QUALITY),
            Err(EvidenceError::FeedNotReady(_))
        ));
    }
}
