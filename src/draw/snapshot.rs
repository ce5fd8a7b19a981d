use crate::draw::render::RgbaCanvas;
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

pub fn encode_png(canvas: &RgbaCanvas) -> Result<Vec<u8>> {
    let image = image::RgbaImage::from_raw(canvas.width(), canvas.height(), canvas.pixels().to_vec())
        .ok_or_else(|| {
            anyhow!(
                "pixel buffer does not match {}x{} canvas",
                canvas.width(),
                canvas.height()
            )
        })?;
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .context("encode canvas snapshot as png")?;
    Ok(bytes)
}

/// Snapshot of the whole canvas, as a `data:image/png;base64,...` URI.
pub fn data_uri(canvas: &RgbaCanvas) -> Result<String> {
    let png = encode_png(canvas)?;
    Ok(format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(png)))
}

pub fn decode_data_uri(uri: &str) -> Result<RgbaCanvas> {
    let payload = uri
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .ok_or_else(|| anyhow!("not a base64 png data uri"))?;
    let bytes = STANDARD.decode(payload).context("decode data uri payload")?;
    let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
        .context("decode png snapshot")?
        .to_rgba8();
    Ok(RgbaCanvas::from_rgba(
        image.width(),
        image.height(),
        image.into_raw(),
    ))
}
