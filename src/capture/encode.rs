use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::error::{Error, Result};

use super::Frame;

/// Encode a raw RGB frame as a JPEG still suitable for upload.
pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()).ok_or_else(
        || {
            Error::Device(format!(
                "frame buffer of {} bytes does not match {}x{}",
                frame.rgb.len(),
                frame.width,
                frame.height
            ))
        },
    )?;

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
    Ok(bytes)
}
