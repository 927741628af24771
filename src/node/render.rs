use super::error::PaintError;
use super::{Color, ColorRegion, QuadTree};

use image::RgbaImage;

/// Outline color used when region divisions are drawn.
const DIVISION_COLOR: Color = image::Rgba([0, 0, 0, 255]);

/// Paints a region node into `raster`, descending at most `level` levels.
///
/// A node at the cutoff, and any leaf reached sooner, is drawn as a solid
/// rectangle of its resolved color; `show_divisions` additionally outlines
/// each drawn rectangle in black along its own border. Painting at the
/// node's stored coordinates, the rectangle must fit inside the raster.
pub fn paint(
	raster: &mut RgbaImage,
	node: &ColorRegion,
	level: u32,
	show_divisions: bool,
) -> Result<(), PaintError> {
	let fits_x = node.x as u64 + node.width as u64 <= raster.width() as u64;
	let fits_y = node.y as u64 + node.height as u64 <= raster.height() as u64;
	if !fits_x || !fits_y {
		return Err(PaintError::OutOfBounds {
			x: node.x,
			y: node.y,
			width: node.width,
			height: node.height,
			raster_width: raster.width(),
			raster_height: raster.height(),
		});
	}
	walk(raster, node, level, show_divisions);
	Ok(())
}

/// Traversal behind `paint`. Children lie inside their parent, so the
/// entry check covers every rectangle drawn here.
fn walk(raster: &mut RgbaImage, node: &ColorRegion, level: u32, show_divisions: bool) {
	if level == 0 || node.is_leaf() {
		fill(raster, node);
		if show_divisions {
			outline(raster, node);
		}
		return;
	}
	for child in node.children.iter().flatten() {
		walk(raster, child, level - 1, show_divisions);
	}
}

fn fill(raster: &mut RgbaImage, node: &ColorRegion) {
	for row in node.y..node.y + node.height {
		for col in node.x..node.x + node.width {
			raster.put_pixel(col, row, node.color);
		}
	}
}

fn outline(raster: &mut RgbaImage, node: &ColorRegion) {
	let right = node.x + node.width - 1;
	let bottom = node.y + node.height - 1;
	for col in node.x..=right {
		raster.put_pixel(col, node.y, DIVISION_COLOR);
		raster.put_pixel(col, bottom, DIVISION_COLOR);
	}
	for row in node.y..=bottom {
		raster.put_pixel(node.x, row, DIVISION_COLOR);
		raster.put_pixel(right, row, DIVISION_COLOR);
	}
}

impl QuadTree {
	/// Renders the tree into a fresh raster of the source image's size.
	///
	/// `level` bounds the traversal depth: 0 paints the root as a single
	/// rectangle, `height() - 1` reaches the deepest leaves, and anything
	/// larger changes nothing further.
	///
	/// The raster is allocated up front. Decoding caps dimensions to an
	/// addressable buffer, not to available memory, so a tree near that
	/// cap can still abort on allocation.
	pub fn render(&self, level: u32, show_divisions: bool) -> RgbaImage {
		let mut raster = RgbaImage::new(self.image_width, self.image_height);
		match paint(&mut raster, &self.root, level, show_divisions) {
			Ok(_) => (),
			Err(_) => unreachable!("root region outside its own raster"),
		}
		raster
	}
}
