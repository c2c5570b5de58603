//! Flatten a transparent sticker onto an opaque white backdrop.
//!
//! JPEG has no alpha channel. Encoding an RGBA sticker straight to JPEG
//! would drop alpha and expose whatever colour the transparent pixels
//! happen to carry (often black). Blending over white first gives the look
//! a sticker has in a light-themed chat.
//!
//! The backdrop is built once per process and only ever read; concurrent
//! runs each take their own cropped copy.

use crate::config::OverlayPolicy;
use crate::model::{CompositedPhoto, DecodedImage};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use tracing::debug;

/// Side of the pre-built backdrop. Stickers are at most 512 px per side.
pub const BACKDROP_SIDE: u32 = 512;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

static BACKDROP: Lazy<Backdrop> = Lazy::new(|| Backdrop::new(BACKDROP_SIDE, WHITE));

/// An immutable uniform canvas that hands out cropped copies.
#[derive(Debug)]
pub struct Backdrop {
    canvas: RgbImage,
    colour: Rgb<u8>,
}

impl Backdrop {
    pub fn new(side: u32, colour: Rgb<u8>) -> Self {
        Self {
            canvas: RgbImage::from_pixel(side, side, colour),
            colour,
        }
    }

    /// The process-wide white backdrop.
    pub fn shared() -> &'static Backdrop {
        &BACKDROP
    }

    /// A `width`×`height` copy of the region at the origin.
    ///
    /// The canvas behaves as if unbounded: requests larger than the
    /// pre-built area are filled with the same colour.
    pub fn crop(&self, width: u32, height: u32) -> RgbImage {
        if width <= self.canvas.width() && height <= self.canvas.height() {
            imageops::crop_imm(&self.canvas, 0, 0, width, height).to_image()
        } else {
            RgbImage::from_pixel(width, height, self.colour)
        }
    }
}

/// Blend `decoded` over the white backdrop at `width`×`height`.
///
/// Callers must pass positive dimensions
/// (see [`crate::model::StickerMessage::target_dimensions`]).
pub fn composite_photo(
    decoded: &DecodedImage,
    width: u32,
    height: u32,
    policy: OverlayPolicy,
) -> CompositedPhoto {
    let mut canvas = Backdrop::shared().crop(width, height);

    let source: Cow<'_, RgbaImage> = match policy {
        OverlayPolicy::ResizeToFit
            if decoded.width() != width || decoded.height() != height =>
        {
            debug!(
                "Resizing sticker {}x{} → {}x{} before compositing",
                decoded.width(),
                decoded.height(),
                width,
                height
            );
            Cow::Owned(imageops::resize(&decoded.pixels, width, height, FilterType::Triangle))
        }
        _ => Cow::Borrowed(&decoded.pixels),
    };

    // Anything outside the overlap keeps the backdrop (smaller source) or
    // is clipped away (larger source).
    let w = width.min(source.width());
    let h = height.min(source.height());
    for y in 0..h {
        for x in 0..w {
            let dst = canvas.get_pixel_mut(x, y);
            *dst = blend_over(*source.get_pixel(x, y), *dst);
        }
    }

    CompositedPhoto { pixels: canvas }
}

/// Source-over blend of one pixel onto an opaque one:
/// `out = src·α + dst·(1−α)` per channel, rounded to nearest.
pub fn blend_over(src: Rgba<u8>, dst: Rgb<u8>) -> Rgb<u8> {
    let a = u32::from(src[3]);
    let mix = |s: u8, d: u8| ((u32::from(s) * a + u32::from(d) * (255 - a) + 127) / 255) as u8;
    Rgb([mix(src[0], dst[0]), mix(src[1], dst[1]), mix(src[2], dst[2])])
}
