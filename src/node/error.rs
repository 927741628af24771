use thiserror::Error;

/// Reason why an image file couldn't be captured as a pixel grid.
#[derive(Debug, Error)]
pub enum LoadError {
	/// The file could not be read or its contents are not a decodable image.
	#[error("could not decode image: {0}")]
	Decode(#[from] image::ImageError),
	/// The decoded image has a zero dimension; there is nothing to compress.
	#[error("image has zero width or height")]
	EmptyImage,
}

/// Reason why QUAD data couldn't be decoded back into a tree.
///
/// Every variant rejects the input as a whole; a failed decode never
/// hands back a partially rebuilt tree.
#[derive(Debug, Error)]
pub enum DecodeError {
	/// Reading the underlying file failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// There was no valid QUAD file header.
	#[error("missing QUAD header")]
	MissingHeader,
	/// The header names a format revision this build does not read.
	#[error("unsupported QUAD version {0}")]
	UnsupportedVersion(u8),
	/// A node record was expected but the data ended first.
	#[error("unexpected end of data at byte {0}")]
	InsufficientData(usize),
	/// A node's flags byte has reserved bits set.
	#[error("reserved flag bits set in {0:#04x}")]
	ReservedFlags(u8),
	/// Node records are nested deeper than the decoder follows.
	#[error("node records nested {0} levels deep")]
	ExcessiveNesting(usize),
	/// The header describes an image with a zero dimension.
	#[error("header describes a zero-size image")]
	EmptyImage,
	/// The header describes an image whose raster would overflow the
	/// address space.
	#[error("image dimensions {height}x{width} overflow the address space")]
	OversizedImage {
		/// Recorded image height in pixels.
		height: u32,
		/// Recorded image width in pixels.
		width: u32,
	},
	/// A region record has a zero width or height.
	#[error("zero-size region in record at byte {0}")]
	EmptyRegion(usize),
	/// The recorded accuracy is outside [0, 1].
	#[error("accuracy {0} out of range")]
	BadAccuracy(f64),
	/// The root region does not span the image named in the header.
	#[error("root region does not span the image")]
	RootMismatch,
	/// A node's children fail to partition its rectangle exactly.
	#[error("children do not tile the region at ({x}, {y})")]
	BrokenTiling {
		/// Leftmost column of the offending region.
		x: u32,
		/// Topmost row of the offending region.
		y: u32,
	},
	/// Leftover bytes after a complete tree.
	#[error("{0} trailing bytes after the tree")]
	TrailingData(usize),
}

/// Reason why a region couldn't be painted onto a raster.
#[derive(Debug, Error)]
pub enum PaintError {
	/// The region's rectangle extends past the raster's bounds.
	#[error(
		"region ({x}, {y}) {width}x{height} does not fit a {raster_width}x{raster_height} raster"
	)]
	OutOfBounds {
		/// Leftmost column of the region.
		x: u32,
		/// Topmost row of the region.
		y: u32,
		/// Region width in pixels.
		width: u32,
		/// Region height in pixels.
		height: u32,
		/// Width of the destination raster.
		raster_width: u32,
		/// Height of the destination raster.
		raster_height: u32,
	},
}
