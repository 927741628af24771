pub mod node;

pub use node::*;

impl ColorRegion {
	/// Counts the nodes of this region's subtree, itself included.
	pub fn node_count(&self) -> usize {
		1 + self
			.children()
			.iter()
			.flatten()
			.map(|child| child.node_count())
			.sum::<usize>()
	}

	/// Counts the leaves of this region's subtree. A childless region
	/// counts itself.
	pub fn leaf_count(&self) -> usize {
		if self.is_leaf() {
			1
		} else {
			self.children()
				.iter()
				.flatten()
				.map(|child| child.leaf_count())
				.sum()
		}
	}
}
