//! Tile decoding into RGB pixels.
//!
//! JPEG tiles go through the `image` crate. JPEG 2000 tiles need the
//! `jpeg2000` feature; Aperio stores them as YCbCr (33003) or RGB (33005)
//! codestreams without a color transform, so YCbCr components are converted
//! here.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, Rgb, RgbImage};

use crate::error::SlideError;
use crate::format::Tile;

/// Fill color for area not covered by stored tile data
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Decodes [`Tile`]s into RGB images.
#[derive(Debug, Clone, Default)]
pub struct TileDecoder {}

impl TileDecoder {
    pub fn new() -> Self {
        Self {}
    }

    /// Decode a tile.
    ///
    /// `tile_size` is the nominal tile size of the level; missing tiles
    /// become a background-filled image of that size.
    pub fn decode(&self, tile: &Tile, tile_size: (u32, u32)) -> Result<RgbImage, SlideError> {
        match tile {
            Tile::Jpeg(data) => decode_jpeg(data),
            Tile::Jp2k { data, ycbcr } => decode_jp2k(data, *ycbcr),
            Tile::Missing => Ok(RgbImage::from_pixel(tile_size.0, tile_size.1, BACKGROUND)),
        }
    }
}

/// Decode a complete JPEG stream.
pub fn decode_jpeg(data: &[u8]) -> Result<RgbImage, SlideError> {
    let reader = ImageReader::with_format(Cursor::new(data), ImageFormat::Jpeg);
    let image = reader.decode().map_err(|e| SlideError::Decode {
        message: e.to_string(),
    })?;
    Ok(image.to_rgb8())
}

#[cfg(feature = "jpeg2000")]
pub fn decode_jp2k(data: &[u8], ycbcr: bool) -> Result<RgbImage, SlideError> {
    let image = jpeg2k::Image::from_bytes(data).map_err(|e| SlideError::Decode {
        message: format!("JPEG 2000: {}", e),
    })?;

    let (width, height) = (image.width(), image.height());
    let components = image.components();

    let planes: Vec<Plane<'_>> = components
        .iter()
        .map(|c| Plane {
            data: c.data(),
            width: c.width(),
            height: c.height(),
            shift: c.precision().saturating_sub(8),
        })
        .collect();

    let mut output = RgbImage::new(width, height);
    match planes.as_slice() {
        [gray] => {
            for (x, y, pixel) in output.enumerate_pixels_mut() {
                let v = gray.sample(x, y, width, height);
                *pixel = Rgb([v, v, v]);
            }
        }
        [c0, c1, c2, ..] => {
            for (x, y, pixel) in output.enumerate_pixels_mut() {
                let samples = [
                    c0.sample(x, y, width, height),
                    c1.sample(x, y, width, height),
                    c2.sample(x, y, width, height),
                ];
                *pixel = if ycbcr {
                    ycbcr_to_rgb(samples[0], samples[1], samples[2])
                } else {
                    Rgb(samples)
                };
            }
        }
        _ => {
            return Err(SlideError::Decode {
                message: format!("JPEG 2000: unsupported component count {}", planes.len()),
            })
        }
    }

    Ok(output)
}

#[cfg(not(feature = "jpeg2000"))]
pub fn decode_jp2k(_data: &[u8], _ycbcr: bool) -> Result<RgbImage, SlideError> {
    Err(SlideError::Decode {
        message: "JPEG 2000 support is not enabled (build with the `jpeg2000` feature)"
            .to_string(),
    })
}

/// One decoded JPEG 2000 component, possibly subsampled.
#[cfg(feature = "jpeg2000")]
struct Plane<'a> {
    data: &'a [i32],
    width: u32,
    height: u32,
    /// Right shift bringing samples down to 8 bits
    shift: u32,
}

#[cfg(feature = "jpeg2000")]
impl Plane<'_> {
    /// 8-bit sample at image coordinates, scaled for subsampled planes.
    fn sample(&self, x: u32, y: u32, image_width: u32, image_height: u32) -> u8 {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        let px = (x as u64 * self.width as u64 / image_width.max(1) as u64) as usize;
        let py = (y as u64 * self.height as u64 / image_height.max(1) as u64) as usize;
        let index = py * self.width as usize + px;
        let value = self.data.get(index).copied().unwrap_or(0) >> self.shift;
        value.clamp(0, 255) as u8
    }
}

/// Full-range BT.601 YCbCr to RGB, as used by JPEG.
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> Rgb<u8> {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;

    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;

    Rgb([clamp_channel(r), clamp_channel(g), clamp_channel(b)])
}

#[inline]
fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

// =============================================================================
// Tests
// =============================================================================
