use super::DecodeError;

/// Decode a single still image (the upload path).
///
/// Independent of any live session: each call gets its own short-lived
/// decoder state and shares nothing with a running camera scan. Pixel work
/// runs on the blocking pool.
///
/// With `strict` set, an image carrying more than one detectable code is
/// rejected instead of silently picking the first.
pub async fn decode_image(bytes: &[u8], strict: bool) -> Result<String, DecodeError> {
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || decode_image_blocking(&bytes, strict))
        .await
        .map_err(|err| DecodeError::ResourceUnavailable {
            reason: format!("decode worker join failed: {err}"),
        })?
}

fn decode_image_blocking(bytes: &[u8], strict: bool) -> Result<String, DecodeError> {
    let img = image::load_from_memory(bytes).map_err(|err| DecodeError::UnreadableImage {
        reason: err.to_string(),
    })?;
    let luma = img.to_luma8();
    decode_luma(luma.width(), luma.height(), luma.as_raw(), strict)
}

/// Shared symbol decode over a greyscale buffer; also used per-frame by the
/// live path. Row-major, one byte per pixel.
pub(crate) fn decode_luma(
    width: u32,
    height: u32,
    luma: &[u8],
    strict: bool,
) -> Result<String, DecodeError> {
    let width = width as usize;
    let height = height as usize;
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);

    let grids = prepared.detect_grids();
    if grids.is_empty() {
        return Err(DecodeError::NoSymbolFound);
    }
    if strict && grids.len() > 1 {
        return Err(DecodeError::AmbiguousSymbols { count: grids.len() });
    }

    let mut last_failure = None;
    for grid in &grids {
        match grid.decode() {
            Ok((_, content)) => return Ok(content),
            Err(err) => last_failure = Some(err.to_string()),
        }
    }

    Err(DecodeError::SymbolCorrupt {
        reason: last_failure.unwrap_or_else(|| "unknown".to_string()),
    })
}
