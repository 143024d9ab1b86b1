//! Dotted-path utilities and the prefix index that maps model paths to the
//! nodes bound under them.

use crate::node::Node;
use std::collections::HashMap;
use std::sync::Arc;

/// Whether a dotted path is well-formed: non-empty, with no empty segments.
///
/// # Examples
///
/// ```
/// use formbind::path::is_valid_path;
///
/// assert!(is_valid_path("a.b.c"));
/// assert!(!is_valid_path(""));
/// assert!(!is_valid_path("a..c"));
/// assert!(!is_valid_path(".a"));
/// ```
pub fn is_valid_path(path: &str) -> bool {
	!path.is_empty() && path.split('.').all(|segment| !segment.is_empty())
}

/// All prefixes of a dotted path, shortest first.
///
/// # Examples
///
/// ```
/// use formbind::path::path_prefixes;
///
/// assert_eq!(path_prefixes("a.b.c"), vec!["a", "a.b", "a.b.c"]);
/// assert!(path_prefixes("").is_empty());
/// ```
pub fn path_prefixes(path: &str) -> Vec<String> {
	if path.is_empty() {
		return Vec::new();
	}
	let mut prefixes = Vec::new();
	let mut current = String::new();
	for segment in path.split('.') {
		if !current.is_empty() {
			current.push('.');
		}
		current.push_str(segment);
		prefixes.push(current.clone());
	}
	prefixes
}

/// Maps every prefix of a registered node's name to the bucket of nodes
/// sharing that prefix.
///
/// A node named `"a.b.c"` lands in the buckets for `"a"`, `"a.b"` and
/// `"a.b.c"`, exactly once each, for as long as it stays registered. Names
/// are immutable while a node is attached, so the prefix set computed at
/// registration time is always the one removed at unregistration.
#[derive(Default)]
pub struct PathIndex {
	buckets: HashMap<String, Vec<Arc<Node>>>,
}

impl PathIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append the node to every prefix bucket of its name.
	pub fn register(&mut self, node: &Arc<Node>) {
		for prefix in path_prefixes(&node.name()) {
			self.buckets.entry(prefix).or_default().push(Arc::clone(node));
		}
	}

	/// Remove the node from every bucket it was registered in.
	pub fn unregister(&mut self, node: &Arc<Node>) {
		for prefix in path_prefixes(&node.name()) {
			if let Some(bucket) = self.buckets.get_mut(&prefix) {
				bucket.retain(|other| !Arc::ptr_eq(other, node));
				if bucket.is_empty() {
					self.buckets.remove(&prefix);
				}
			}
		}
	}

	/// All nodes whose name equals or is prefixed by the given path, in
	/// registration order.
	pub fn lookup(&self, path: &str) -> &[Arc<Node>] {
		self.buckets.get(path).map(Vec::as_slice).unwrap_or(&[])
	}

	/// The first registered node whose full name equals the path exactly.
	///
	/// With several exact matches, whichever registered first is returned;
	/// the tie-break is deliberately unspecified.
	pub fn find_by_exact_name(&self, path: &str) -> Option<Arc<Node>> {
		self.lookup(path)
			.iter()
			.find(|node| node.name() == path)
			.cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node::Node;
	use rstest::rstest;

	#[rstest]
	fn test_prefixes_of_nested_name() {
		assert_eq!(
			path_prefixes("my.data.name"),
			vec!["my", "my.data", "my.data.name"]
		);
	}

	#[rstest]
	fn test_register_and_lookup_shared_prefix() {
		// Arrange
		let mut index = PathIndex::new();
		let addr = Node::builder().name("addr").build();
		let city = Node::builder().name("addr.city").build();

		// Act
		index.register(&addr);
		index.register(&city);

		// Assert: "addr" bucket holds both, "addr.city" only the nested one
		assert_eq!(index.lookup("addr").len(), 2);
		assert_eq!(index.lookup("addr.city").len(), 1);
		assert!(Arc::ptr_eq(&index.lookup("addr.city")[0], &city));
	}

	#[rstest]
	fn test_unregister_removes_from_every_bucket() {
		// Arrange
		let mut index = PathIndex::new();
		let node = Node::builder().name("a.b.c").build();
		index.register(&node);

		// Act
		index.unregister(&node);

		// Assert
		assert!(index.lookup("a").is_empty());
		assert!(index.lookup("a.b").is_empty());
		assert!(index.lookup("a.b.c").is_empty());
	}

	#[rstest]
	fn test_find_by_exact_name_skips_prefix_matches() {
		// Arrange
		let mut index = PathIndex::new();
		let nested = Node::builder().name("addr.city").build();
		index.register(&nested);

		// Act & Assert: "addr" bucket exists but holds no exact match
		assert!(index.find_by_exact_name("addr").is_none());
		assert!(index.find_by_exact_name("addr.city").is_some());
	}
}
