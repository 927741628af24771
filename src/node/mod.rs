pub mod error;
pub mod grid;

use grid::PixelGrid;

use std::collections::HashMap;

/// Color type used throughout: four 8-bit channels, R, G, B, A.
pub type Color = image::Rgba<u8>;

/// Per-channel sums accumulated while computing a mean color.
type ChannelSum = [u64; 4];

fn color_add(acc: ChannelSum, c: Color) -> ChannelSum {
	[
		acc[0] + c.0[0] as u64,
		acc[1] + c.0[1] as u64,
		acc[2] + c.0[2] as u64,
		acc[3] + c.0[3] as u64,
	]
}

/// Divides per-channel sums by a sample count, rounding each channel to
/// the nearest 8-bit step (halves away from zero). The result is the
/// per-channel mean of the normalized colors, scaled back to 8 bits.
fn color_div(acc: ChannelSum, div: u64) -> Color {
	image::Rgba([
		(acc[0] as f64 / div as f64).round() as u8,
		(acc[1] as f64 / div as f64).round() as u8,
		(acc[2] as f64 / div as f64).round() as u8,
		(acc[3] as f64 / div as f64).round() as u8,
	])
}

/// Node in a region quadtree approximating an image.
///
/// Covers the axis-aligned rectangle starting at (`x`, `y`) and spanning
/// `width` columns by `height` rows, with up to four exclusively owned
/// children in fixed slots. A node with no children (a leaf) stands in
/// for every pixel it covers with one color.
///
/// Every node carries a resolved color, internal ones the mean of their
/// children's, such that tree descent can stop at any level and still
/// paint a meaningful preview.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorRegion {
	x: u32,
	y: u32,
	height: u32,
	width: u32,
	color: Color,
	children: [Option<Box<ColorRegion>>; 4],
}

impl ColorRegion {
	/// Creates a childless region covering the given rectangle. The color
	/// starts out as transparent black; the builder and the decoder both
	/// assign the real one before the node becomes reachable from a tree.
	pub(crate) fn new(x: u32, y: u32, height: u32, width: u32) -> ColorRegion {
		ColorRegion {
			x,
			y,
			height,
			width,
			color: image::Rgba([0; 4]),
			children: [None, None, None, None],
		}
	}

	pub(crate) fn set_color(&mut self, color: Color) {
		self.color = color;
	}

	pub(crate) fn set_child(&mut self, slot: usize, child: ColorRegion) {
		self.children[slot] = Some(Box::new(child));
	}

	/// Component-wise mean of every present child's color.
	///
	/// Must not be called on a node with zero present children; no branch
	/// of the builder can reach that state, because each one populates at
	/// least two slots before averaging.
	pub fn average_of_children(&self) -> Color {
		let mut sum = [0; 4];
		let mut div = 0;
		for child in self.children.iter().flatten() {
			sum = color_add(sum, child.color);
			div += 1;
		}
		debug_assert!(div > 0, "averaging a childless region");
		color_div(sum, div)
	}

	/// Whether no child slot is occupied.
	pub fn is_leaf(&self) -> bool {
		self.children.iter().all(Option::is_none)
	}

	/// Leftmost column of the region.
	pub fn x(&self) -> u32 {
		self.x
	}

	/// Topmost row of the region.
	pub fn y(&self) -> u32 {
		self.y
	}

	/// Height of the region's rectangle in pixels.
	pub fn height(&self) -> u32 {
		self.height
	}

	/// Width of the region's rectangle in pixels.
	pub fn width(&self) -> u32 {
		self.width
	}

	/// The region's resolved color.
	pub fn color(&self) -> Color {
		self.color
	}

	/// The four child slots, in fixed order. Which slots are occupied,
	/// and what rectangle each child covers, depends on how the region
	/// was split; present children always tile the parent's rectangle
	/// exactly.
	pub fn children(&self) -> &[Option<Box<ColorRegion>>; 4] {
		&self.children
	}
}

/// An image compressed into a region quadtree.
///
/// Built once from a pixel grid snapshot and read-only afterwards: the
/// tree owns its root exclusively and no accessor hands out mutable
/// state. The accuracy that drove the subdivision decisions is captured
/// next to the image dimensions, so a persisted and reloaded tree
/// carries the same metadata it was built with.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadTree {
	image_height: u32,
	image_width: u32,
	accuracy: f64,
	root: ColorRegion,
}

impl QuadTree {
	/// Compresses a pixel grid into a quadtree.
	///
	/// `accuracy` is the homogeneity threshold in [0, 1]: the fraction of
	/// a region's pixels that must share one exact color for the region
	/// to be kept whole. 1.0 splits everything that is not perfectly
	/// uniform; 0.0 accepts the entire image as a single region. The
	/// value is used as given; callers wanting clamping must clamp
	/// beforehand.
	pub fn from_grid(grid: &PixelGrid, accuracy: f64) -> QuadTree {
		let root = compress(grid, accuracy, 0, 0, grid.height(), grid.width());
		let tree = QuadTree {
			image_height: grid.height(),
			image_width: grid.width(),
			accuracy,
			root,
		};
		log::debug!(
			"compressed {}x{} grid at accuracy {} into {} regions over {} levels",
			tree.image_width,
			tree.image_height,
			tree.accuracy,
			tree.root.node_count(),
			tree.height()
		);
		tree
	}

	pub(crate) fn from_parts(
		image_height: u32,
		image_width: u32,
		accuracy: f64,
		root: ColorRegion,
	) -> QuadTree {
		QuadTree { image_height, image_width, accuracy, root }
	}

	/// Number of levels in the tree. A tree that is a lone leaf has
	/// height 1; an absent subtree counts as 0.
	pub fn height(&self) -> u32 {
		subtree_height(&self.root)
	}

	/// The region covering the whole image.
	pub fn root(&self) -> &ColorRegion {
		&self.root
	}

	/// Height of the source image in pixels. Distinct from any node's
	/// rectangle height and from the tree height.
	pub fn image_height(&self) -> u32 {
		self.image_height
	}

	/// Width of the source image in pixels.
	pub fn image_width(&self) -> u32 {
		self.image_width
	}

	/// The homogeneity threshold the tree was built with.
	pub fn accuracy(&self) -> f64 {
		self.accuracy
	}
}

fn subtree_height(node: &ColorRegion) -> u32 {
	1 + node
		.children()
		.iter()
		.flatten()
		.map(|child| subtree_height(child))
		.max()
		.unwrap_or(0)
}

/// Recursively decomposes the rectangle at row `i`, column `j`, sized
/// `h` by `w`, into a region node. The node is created at x = `j`,
/// y = `i`; rows address the grid first, the rectangle stores the
/// column coordinate first.
fn compress(grid: &PixelGrid, accuracy: f64, i: u32, j: u32, h: u32, w: u32) -> ColorRegion {
	let mut node = ColorRegion::new(j, i, h, w);
	if h == 1 && w == 1 {
		// A single pixel keeps its exact color.
		node.set_color(grid.at(i, j));
	} else if h == 1 || w == 1 {
		// Degenerate strip, one pixel thick. A quadrant split cannot
		// shrink the thin side, so the thick side is carved on its own:
		// unit steps while it is short, halves while it is longer. That
		// keeps every region rectangular and the recursion finite.
		if h == 1 {
			if w <= 4 {
				for k in 0..w {
					node.set_child(k as usize, compress(grid, accuracy, i, j + k, h, 1));
				}
			} else {
				let w_ = w / 2;
				node.set_child(0, compress(grid, accuracy, i, j, 1, w_));
				node.set_child(1, compress(grid, accuracy, i, j + w_, 1, w - w_));
			}
		} else if h <= 4 {
			for k in 0..h {
				node.set_child(k as usize, compress(grid, accuracy, i + k, j, 1, w));
			}
		} else {
			let h_ = h / 2;
			node.set_child(0, compress(grid, accuracy, i, j, h_, 1));
			node.set_child(1, compress(grid, accuracy, i + h_, j, h - h_, 1));
		}
		// A strip's color comes from its children, not from a direct
		// pixel mean. Observable in the output; do not unify with the
		// accepted-region branch below.
		let avg = node.average_of_children();
		node.set_color(avg);
	} else if let Some(c) = region_color(grid, accuracy, i, j, h, w) {
		// Homogeneous enough; the whole region becomes one leaf.
		node.set_color(c);
	} else {
		// Subdivide into quadrants and average the results.
		let h_ = h / 2;
		let w_ = w / 2;

		node.set_child(0, compress(grid, accuracy, i, j + w_, h_, w - w_));
		node.set_child(1, compress(grid, accuracy, i, j, h_, w_));
		node.set_child(2, compress(grid, accuracy, i + h_, j, h - h_, w_));
		node.set_child(3, compress(grid, accuracy, i + h_, j + w_, h - h_, w - w_));

		let avg = node.average_of_children();
		node.set_color(avg);
	}
	node
}

/// Scores the rectangle's homogeneity and, when it passes the threshold,
/// returns the color to store for it.
///
/// One pass accumulates two statistics: the component-wise mean over
/// every pixel, and the occurrence count of the most frequent exact
/// color. The region is accepted when `mode / size >= accuracy`, ties
/// included, and the stored color is then the mean, never the winning
/// color. The two statistics are deliberately different; both show in
/// the output.
fn region_color(
	grid: &PixelGrid,
	accuracy: f64,
	i: u32,
	j: u32,
	h: u32,
	w: u32,
) -> Option<Color> {
	let mut counts: HashMap<Color, u64> = HashMap::new();
	let mut sum = [0; 4];
	for row in i..i + h {
		for col in j..j + w {
			let c = grid.at(row, col);
			sum = color_add(sum, c);
			*counts.entry(c).or_insert(0) += 1;
		}
	}
	let size = h as u64 * w as u64;
	let mode = counts.values().max().copied().unwrap_or(0);
	let current = mode as f64 / size as f64;
	if current >= accuracy {
		Some(color_div(sum, size))
	} else {
		None
	}
}

pub mod quad;
pub mod render;
