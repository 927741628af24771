use super::error::*;
use super::{ColorRegion, QuadTree};

use std::path::Path;

/// Magic bytes opening every QUAD file.
const MAGIC: &[u8; 6] = b"QuadTr";

/// The only schema version this build reads and writes.
const VERSION: u8 = 0x01;

/// Bytes in the fixed header: magic, version, image height and width,
/// accuracy bit pattern.
const HEADER_LEN: usize = 23;

/// Bytes in one node record: flags, the four rectangle fields, RGBA.
const NODE_LEN: usize = 21;

/// Deepest record nesting the decoder follows. Subdivision at least
/// halves a side per level, so no tree over u32 dimensions nests past
/// about 40 levels.
const MAX_NESTING: usize = 64;

/// Byte cursor over QUAD data, tracking the offset for error reports.
struct Reader<'a> {
	data: &'a [u8],
	at: usize,
}

impl<'a> Reader<'a> {
	fn new(data: &'a [u8]) -> Reader<'a> {
		Reader { data, at: 0 }
	}

	fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
		if self.data.len() - self.at < len {
			return Err(DecodeError::InsufficientData(self.at));
		}
		let slice = &self.data[self.at..self.at + len];
		self.at += len;
		Ok(slice)
	}

	fn u8(&mut self) -> Result<u8, DecodeError> {
		Ok(self.take(1)?[0])
	}

	fn u32(&mut self) -> Result<u32, DecodeError> {
		let b = self.take(4)?;
		Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
	}

	fn u64(&mut self) -> Result<u64, DecodeError> {
		let b = self.take(8)?;
		Ok(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
	}

	fn remaining(&self) -> usize {
		self.data.len() - self.at
	}
}

impl ColorRegion {
	/// Appends this node's fixed-size record, then the records of its
	/// children in slot order.
	///
	/// The flags byte marks occupied child slots, bit n for slot n; the
	/// upper four bits stay zero. All multi-byte fields are big-endian.
	fn encode(&self, buffer: &mut Vec<u8>) {
		let mut flags = 0u8;
		for (slot, child) in self.children.iter().enumerate() {
			if child.is_some() {
				flags |= 1 << slot;
			}
		}
		buffer.push(flags);
		buffer.extend_from_slice(&self.x.to_be_bytes());
		buffer.extend_from_slice(&self.y.to_be_bytes());
		buffer.extend_from_slice(&self.height.to_be_bytes());
		buffer.extend_from_slice(&self.width.to_be_bytes());
		buffer.extend_from_slice(&self.color.0);
		for child in self.children.iter().flatten() {
			child.encode(buffer);
		}
	}

	/// Reads one node record plus, recursively, the children its flags
	/// announce. Records nested deeper than `MAX_NESTING` levels are
	/// rejected, which also bounds the decoder's own recursion. Every
	/// decoded node's children are verified to tile it before the node
	/// is returned.
	fn decode(reader: &mut Reader, depth: usize) -> Result<ColorRegion, DecodeError> {
		if depth >= MAX_NESTING {
			return Err(DecodeError::ExcessiveNesting(depth));
		}
		let record_at = reader.at;
		let flags = reader.u8()?;
		if flags & 0xf0 != 0 {
			return Err(DecodeError::ReservedFlags(flags));
		}
		let x = reader.u32()?;
		let y = reader.u32()?;
		let height = reader.u32()?;
		let width = reader.u32()?;
		if height == 0 || width == 0 {
			return Err(DecodeError::EmptyRegion(record_at));
		}
		let rgba = reader.take(4)?;
		let mut node = ColorRegion::new(x, y, height, width);
		node.set_color(image::Rgba([rgba[0], rgba[1], rgba[2], rgba[3]]));
		for slot in 0..4 {
			if flags & (1 << slot) != 0 {
				node.set_child(slot, ColorRegion::decode(reader, depth + 1)?);
			}
		}
		node.check_tiling()?;
		Ok(node)
	}

	/// Rejects decoded nodes whose children fail to exactly partition the
	/// parent rectangle. Containment and pairwise disjointness are checked
	/// directly; with those held, an area match rules out gaps. Arithmetic
	/// is widened so that hostile coordinates cannot overflow.
	fn check_tiling(&self) -> Result<(), DecodeError> {
		if self.is_leaf() {
			return Ok(());
		}
		let broken = || DecodeError::BrokenTiling { x: self.x, y: self.y };
		let kids: Vec<&ColorRegion> =
			self.children.iter().filter_map(|c| c.as_deref()).collect();
		let x_end = self.x as u64 + self.width as u64;
		let y_end = self.y as u64 + self.height as u64;
		let mut area = 0u128;
		for k in &kids {
			if (k.x as u64) < (self.x as u64)
				|| (k.y as u64) < (self.y as u64)
				|| k.x as u64 + k.width as u64 > x_end
				|| k.y as u64 + k.height as u64 > y_end
			{
				return Err(broken());
			}
			area += k.width as u128 * k.height as u128;
		}
		for (ind, a) in kids.iter().enumerate() {
			for b in &kids[ind + 1..] {
				let apart_x = a.x as u64 + a.width as u64 <= b.x as u64
					|| b.x as u64 + b.width as u64 <= a.x as u64;
				let apart_y = a.y as u64 + a.height as u64 <= b.y as u64
					|| b.y as u64 + b.height as u64 <= a.y as u64;
				if !apart_x && !apart_y {
					return Err(broken());
				}
			}
		}
		if area != self.width as u128 * self.height as u128 {
			return Err(broken());
		}
		Ok(())
	}
}

impl QuadTree {
	/// Serializes the tree into QUAD data: the fixed header followed by
	/// the root's record in pre-order.
	pub fn to_quad_bytes(&self) -> Vec<u8> {
		let mut buffer =
			Vec::with_capacity(HEADER_LEN + NODE_LEN * self.root.node_count());
		buffer.extend_from_slice(MAGIC);
		buffer.push(VERSION);
		buffer.extend_from_slice(&self.image_height.to_be_bytes());
		buffer.extend_from_slice(&self.image_width.to_be_bytes());
		buffer.extend_from_slice(&self.accuracy.to_bits().to_be_bytes());
		self.root.encode(&mut buffer);
		log::debug!(
			"encoded {} regions into {} bytes",
			self.root.node_count(),
			buffer.len()
		);
		buffer
	}

	/// Parses QUAD data back into a tree.
	///
	/// The whole input is validated before anything is returned: magic and
	/// version, the header's dimensions and accuracy, every node record's
	/// flags, geometry and nesting depth, and the absence of bytes past
	/// the tree. A failed decode yields no tree at all.
	pub fn from_quad_bytes(data: &[u8]) -> Result<QuadTree, DecodeError> {
		let mut reader = Reader::new(data);
		let magic = reader
			.take(MAGIC.len())
			.map_err(|_| DecodeError::MissingHeader)?;
		if magic != MAGIC {
			return Err(DecodeError::MissingHeader);
		}
		let version = reader.u8().map_err(|_| DecodeError::MissingHeader)?;
		if version != VERSION {
			return Err(DecodeError::UnsupportedVersion(version));
		}
		let image_height = reader.u32()?;
		let image_width = reader.u32()?;
		if image_height == 0 || image_width == 0 {
			return Err(DecodeError::EmptyImage);
		}
		// Four bytes per pixel; a raster longer than usize::MAX could
		// never be built, so such headers are data errors.
		if image_height as u128 * image_width as u128 * 4 > usize::MAX as u128 {
			return Err(DecodeError::OversizedImage {
				height: image_height,
				width: image_width,
			});
		}
		let accuracy = f64::from_bits(reader.u64()?);
		if !(0.0..=1.0).contains(&accuracy) {
			return Err(DecodeError::BadAccuracy(accuracy));
		}
		let root = ColorRegion::decode(&mut reader, 0)?;
		if root.x != 0
			|| root.y != 0
			|| root.height != image_height
			|| root.width != image_width
		{
			return Err(DecodeError::RootMismatch);
		}
		if reader.remaining() > 0 {
			return Err(DecodeError::TrailingData(reader.remaining()));
		}
		log::debug!(
			"decoded {} bytes into {} regions",
			data.len(),
			root.node_count()
		);
		Ok(QuadTree::from_parts(image_height, image_width, accuracy, root))
	}

	/// Writes the tree to a QUAD file.
	pub fn save_quad<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
		std::fs::write(path, self.to_quad_bytes())
	}

	/// Reads and decodes a QUAD file.
	pub fn load_quad<P: AsRef<Path>>(path: P) -> Result<QuadTree, DecodeError> {
		QuadTree::from_quad_bytes(&std::fs::read(path)?)
	}
}

#[cfg(test)]
mod tests {
	use super::super::grid::PixelGrid;
	use super::*;

	const RED: image::Rgba<u8> = image::Rgba([255, 0, 0, 255]);
	const GREEN: image::Rgba<u8> = image::Rgba([0, 255, 0, 255]);
	const BLUE: image::Rgba<u8> = image::Rgba([0, 0, 255, 255]);

	fn gray(v: u8) -> image::Rgba<u8> {
		image::Rgba([v, v, v, 255])
	}

	/// 2x2 tree of four distinct leaves: root record at byte 23, child
	/// records at 44, 65, 86 and 107.
	fn quartered() -> QuadTree {
		let grid = PixelGrid::from_raw(2, 2, vec![RED, GREEN, BLUE, gray(9)]);
		QuadTree::from_grid(&grid, 1.0)
	}

	fn patterned(height: u32, width: u32) -> PixelGrid {
		let pixels = (0..height * width).map(|v| gray((v * 37 % 251) as u8)).collect();
		PixelGrid::from_raw(height, width, pixels)
	}

	#[test]
	fn round_trips_a_leaf_only_tree() {
		let grid = PixelGrid::from_raw(1, 1, vec![RED]);
		let tree = QuadTree::from_grid(&grid, 1.0);
		let decoded = QuadTree::from_quad_bytes(&tree.to_quad_bytes()).unwrap();
		assert_eq!(decoded, tree);
	}

	#[test_log::test]
	fn round_trips_nested_and_strip_trees() {
		for (grid, accuracy) in [
			(patterned(4, 4), 0.5),
			(patterned(5, 7), 1.0),
			(patterned(1, 6), 1.0),
			(patterned(3, 1), 1.0),
		] {
			let tree = QuadTree::from_grid(&grid, accuracy);
			let decoded = QuadTree::from_quad_bytes(&tree.to_quad_bytes()).unwrap();
			assert_eq!(decoded, tree);
		}
	}

	#[test]
	fn layout_of_a_single_leaf_file_is_stable() {
		let grid = PixelGrid::from_raw(1, 1, vec![RED]);
		let data = QuadTree::from_grid(&grid, 1.0).to_quad_bytes();

		assert_eq!(data.len(), HEADER_LEN + NODE_LEN);
		assert_eq!(&data[..6], b"QuadTr");
		assert_eq!(data[6], 0x01);
		assert_eq!(&data[7..11], &1u32.to_be_bytes());
		assert_eq!(&data[11..15], &1u32.to_be_bytes());
		assert_eq!(&data[15..23], &1.0f64.to_bits().to_be_bytes());
		// Root record: no children, origin rectangle, the pixel's color.
		assert_eq!(data[23], 0x00);
		assert_eq!(&data[24..40], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1]);
		assert_eq!(&data[40..44], &RED.0);
	}

	#[test]
	fn subdivided_root_sets_one_flag_bit_per_child() {
		let data = quartered().to_quad_bytes();
		assert_eq!(data.len(), HEADER_LEN + 5 * NODE_LEN);
		assert_eq!(data[23], 0x0f);
	}

	#[test]
	fn rejects_bad_magic() {
		let mut data = quartered().to_quad_bytes();
		data[0] = b'X';
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::MissingHeader));
	}

	#[test]
	fn rejects_data_shorter_than_the_magic() {
		let err = QuadTree::from_quad_bytes(b"Quad").unwrap_err();
		assert!(matches!(err, DecodeError::MissingHeader));
	}

	#[test]
	fn rejects_unknown_version() {
		let mut data = quartered().to_quad_bytes();
		data[6] = 0x02;
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::UnsupportedVersion(0x02)));
	}

	#[test]
	fn rejects_truncated_records() {
		let data = quartered().to_quad_bytes();
		for cut in [data.len() - 1, data.len() - NODE_LEN, HEADER_LEN, HEADER_LEN + 3] {
			let err = QuadTree::from_quad_bytes(&data[..cut]).unwrap_err();
			assert!(matches!(err, DecodeError::InsufficientData(_)), "cut at {}", cut);
		}
	}

	#[test]
	fn rejects_reserved_flag_bits() {
		let mut data = quartered().to_quad_bytes();
		data[23] |= 0x10;
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::ReservedFlags(0x1f)));
	}

	#[test]
	fn rejects_zero_size_image_header() {
		let mut data = quartered().to_quad_bytes();
		data[7..11].copy_from_slice(&0u32.to_be_bytes());
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::EmptyImage));
	}

	#[test]
	fn rejects_dimensions_too_large_to_raster() {
		// A 44-byte file claiming a u32::MAX square with one spanning leaf.
		let mut data = Vec::new();
		data.extend_from_slice(b"QuadTr");
		data.push(0x01);
		data.extend_from_slice(&u32::MAX.to_be_bytes());
		data.extend_from_slice(&u32::MAX.to_be_bytes());
		data.extend_from_slice(&1.0f64.to_bits().to_be_bytes());
		data.push(0x00);
		data.extend_from_slice(&0u32.to_be_bytes());
		data.extend_from_slice(&0u32.to_be_bytes());
		data.extend_from_slice(&u32::MAX.to_be_bytes());
		data.extend_from_slice(&u32::MAX.to_be_bytes());
		data.extend_from_slice(&RED.0);

		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(
			err,
			DecodeError::OversizedImage { height: u32::MAX, width: u32::MAX }
		));
	}

	#[test]
	fn rejects_zero_size_regions() {
		let mut data = quartered().to_quad_bytes();
		// Root height field.
		data[32..36].copy_from_slice(&0u32.to_be_bytes());
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::EmptyRegion(23)));
	}

	#[test]
	fn rejects_accuracy_outside_the_unit_interval() {
		let mut data = quartered().to_quad_bytes();
		data[15..23].copy_from_slice(&2.0f64.to_bits().to_be_bytes());
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::BadAccuracy(a) if a == 2.0));

		data[15..23].copy_from_slice(&f64::NAN.to_bits().to_be_bytes());
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::BadAccuracy(a) if a.is_nan()));
	}

	#[test]
	fn rejects_a_root_that_does_not_span_the_image() {
		let mut data = quartered().to_quad_bytes();
		data[11..15].copy_from_slice(&3u32.to_be_bytes());
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::RootMismatch));
	}

	#[test]
	fn rejects_overlapping_children() {
		let mut data = quartered().to_quad_bytes();
		// Move the first child onto the second: x field of the record at 44.
		data[45..49].copy_from_slice(&0u32.to_be_bytes());
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::BrokenTiling { x: 0, y: 0 }));
	}

	#[test]
	fn rejects_children_outside_their_parent() {
		let mut data = quartered().to_quad_bytes();
		data[45..49].copy_from_slice(&7u32.to_be_bytes());
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::BrokenTiling { x: 0, y: 0 }));
	}

	#[test]
	fn rejects_gapped_tilings() {
		let mut data = quartered().to_quad_bytes();
		// Drop the fourth child: clear its flag bit and cut its record.
		data[23] = 0x07;
		data.truncate(data.len() - NODE_LEN);
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::BrokenTiling { x: 0, y: 0 }));
	}

	#[test]
	fn rejects_deeply_nested_records() {
		// 200 000 nested single-child records, each spanning its parent's
		// own 1x1 rectangle, closed by one leaf. Every record on its own
		// is schema-valid.
		let mut data = Vec::new();
		data.extend_from_slice(b"QuadTr");
		data.push(0x01);
		data.extend_from_slice(&1u32.to_be_bytes());
		data.extend_from_slice(&1u32.to_be_bytes());
		data.extend_from_slice(&1.0f64.to_bits().to_be_bytes());
		let mut record = |flags: u8| {
			data.push(flags);
			data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1]);
			data.extend_from_slice(&RED.0);
		};
		for _ in 0..200_000 {
			record(0x01);
		}
		record(0x00);

		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::ExcessiveNesting(_)));
	}

	#[test]
	fn rejects_trailing_bytes() {
		let mut data = quartered().to_quad_bytes();
		data.push(0);
		let err = QuadTree::from_quad_bytes(&data).unwrap_err();
		assert!(matches!(err, DecodeError::TrailingData(1)));
	}

	#[test]
	fn saves_and_loads_a_quad_file() {
		let tree = QuadTree::from_grid(&patterned(5, 7), 0.5);
		let path =
			std::env::temp_dir().join(format!("quadpress-codec-{}.quad", std::process::id()));
		tree.save_quad(&path).unwrap();
		let loaded = QuadTree::load_quad(&path).unwrap();
		std::fs::remove_file(&path).unwrap();
		assert_eq!(loaded, tree);
	}

	#[test]
	fn loading_a_missing_file_reports_io() {
		let path =
			std::env::temp_dir().join(format!("quadpress-missing-{}.quad", std::process::id()));
		let err = QuadTree::load_quad(&path).unwrap_err();
		assert!(matches!(err, DecodeError::Io(_)));
	}
}
