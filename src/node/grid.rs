use super::error::LoadError;
use super::Color;

use std::path::Path;

/// A decoded raster held as a flat row-major matrix of RGBA samples.
///
/// This is the snapshot the tree builder reads from: the pixel data of an
/// image, captured once together with its dimensions, and never written
/// to again. Rows are addressed first (`at(row, col)`), top to bottom.
///
/// A grid always has at least one pixel; the constructors refuse
/// zero-size input so the builder never has to consider an empty image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
	height: u32,
	width: u32,
	pixels: Vec<Color>,
}

impl PixelGrid {
	/// Decodes the image file at `path` into a pixel grid.
	///
	/// Accepts any format the `image` crate can decode. Fails with a
	/// `LoadError` when the file cannot be decoded or describes an image
	/// with a zero dimension; no grid is produced in either case.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<PixelGrid, LoadError> {
		let raster = image::open(path)?.into_rgba8();
		if raster.width() == 0 || raster.height() == 0 {
			return Err(LoadError::EmptyImage);
		}
		Ok(PixelGrid::from_image(&raster))
	}

	/// Captures an already decoded raster.
	///
	/// # Panics
	///
	/// Panics if the raster has a zero dimension.
	pub fn from_image(raster: &image::RgbaImage) -> PixelGrid {
		assert!(
			raster.width() > 0 && raster.height() > 0,
			"zero-size raster"
		);
		PixelGrid {
			height: raster.height(),
			width: raster.width(),
			pixels: raster.pixels().copied().collect(),
		}
	}

	/// Builds a grid from raw parts. `pixels` lists the samples row by
	/// row and must hold exactly `height * width` entries.
	///
	/// # Panics
	///
	/// Panics if either dimension is zero or the pixel count does not
	/// match the dimensions.
	pub fn from_raw(height: u32, width: u32, pixels: Vec<Color>) -> PixelGrid {
		assert!(height > 0 && width > 0, "zero-size grid");
		assert_eq!(
			pixels.len(),
			height as usize * width as usize,
			"pixel count does not match the dimensions"
		);
		PixelGrid { height, width, pixels }
	}

	/// The sample at `row`, `col`. Rows run top to bottom and columns
	/// left to right; both must be inside the grid.
	pub fn at(&self, row: u32, col: u32) -> Color {
		self.pixels[row as usize * self.width as usize + col as usize]
	}

	/// Number of pixel rows.
	pub fn height(&self) -> u32 {
		self.height
	}

	/// Number of pixel columns.
	pub fn width(&self) -> u32 {
		self.width
	}
}
