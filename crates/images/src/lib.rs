#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	clippy::expect_used,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::as_conversions,
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;

pub use error::{Error, Result};
pub use image::DynamicImage;

use image::ImageFormat;
use std::{fs, io::Cursor, io::Read, path::Path};

/// The maximum file size that an image can be in order to be mirrored.
///
/// This value is in MiB.
const MAXIMUM_FILE_SIZE: u64 = MIB * 24;

/// The size of 1MiB in bytes
const MIB: u64 = 1_048_576;

/// Load an image from disk, refusing anything over [`MAXIMUM_FILE_SIZE`].
pub fn load_image(path: &Path) -> Result<DynamicImage> {
	let mut file = fs::File::open(path)?;
	if file.metadata()?.len() > MAXIMUM_FILE_SIZE {
		return Err(Error::TooLarge);
	}
	let mut data = vec![];
	file.read_to_end(&mut data)?;
	Ok(image::load_from_memory(&data)?)
}

/// Mirror an image around its vertical axis.
///
/// Pure pixel-row reversal, no channel or color modification. Applying it
/// twice reproduces the original pixel data exactly.
#[must_use]
pub fn mirror_horizontal(image: &DynamicImage) -> DynamicImage {
	image.fliph()
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
	let mut bytes = Cursor::new(vec![]);
	image.write_to(&mut bytes, ImageFormat::Png)?;
	Ok(bytes.into_inner())
}

/// Load, mirror and re-encode in one step.
///
/// This is the whole transform applied to every collection image, kept here
/// so callers only deal in paths and bytes.
pub fn mirror_file(path: &Path) -> Result<Vec<u8>> {
	let image = load_image(path)?;
	encode_png(&mirror_horizontal(&image))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use image::{Rgba, RgbaImage};

	fn gradient(width: u32, height: u32) -> DynamicImage {
		let mut img = RgbaImage::new(width, height);
		for (x, y, pixel) in img.enumerate_pixels_mut() {
			*pixel = Rgba([
				u8::try_from(x % 256).unwrap(),
				u8::try_from(y % 256).unwrap(),
				u8::try_from((x + y) % 256).unwrap(),
				255,
			]);
		}
		DynamicImage::ImageRgba8(img)
	}

	#[test]
	fn mirror_reverses_pixel_rows() {
		let img = gradient(5, 3);
		let mirrored = mirror_horizontal(&img);

		let src = img.to_rgba8();
		let out = mirrored.to_rgba8();
		for y in 0..3 {
			for x in 0..5 {
				assert_eq!(src.get_pixel(x, y), out.get_pixel(4 - x, y));
			}
		}
	}

	#[test]
	fn mirror_twice_is_identity() {
		let img = gradient(16, 9);
		let round_trip = mirror_horizontal(&mirror_horizontal(&img));
		assert_eq!(img.to_rgba8().as_raw(), round_trip.to_rgba8().as_raw());
	}

	#[test]
	fn png_round_trip_preserves_pixels() {
		let img = gradient(8, 8);
		let bytes = encode_png(&img).unwrap();
		let decoded = image::load_from_memory(&bytes).unwrap();
		assert_eq!(img.to_rgba8().as_raw(), decoded.to_rgba8().as_raw());
	}
}
