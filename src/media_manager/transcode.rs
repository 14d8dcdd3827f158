use std::io::Cursor;

use image::ImageOutputFormat;

use crate::media_manager::MediaError;

/// Re-encodes any decodable image as PNG.
pub fn to_png(data: &[u8]) -> Result<Vec<u8>, MediaError> {
    let img = image::load_from_memory(data).map_err(|e| MediaError::Transcode(e.to_string()))?;

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| MediaError::Transcode(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Like [`to_png`], but hands back the original bytes when they cannot be decoded.
pub fn to_png_or_original(data: Vec<u8>) -> Vec<u8> {
    match to_png(&data) {
        Ok(png) => png,
        Err(e) => {
            tracing::warn!(
                target: "tg2nostr::media_manager::transcode::to_png_or_original",
                "PNG conversion failed, keeping original bytes: {}",
                e
            );
            data
        }
    }
}
