use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use anyhow::{anyhow, bail, Context, Result};
use crate::coord::Coordinate;
use crate::dependency::{Dependency, Exclusion};
use crate::repository::RemoteRepository;

/// One collected dependency, with the children found below it.
///
/// The graph is a tree: two siblings may carry the same dependency (deduplication is a later
/// conflict-resolution pass, not collection's business), and a cycle is truncated into a
/// childless node at the first re-encounter of a versionless coordinate on the path.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
	/// `None` only for the artificial root of a multi-root collection.
	pub dependency: Option<Dependency>,
	/// In visit order, which is descriptor declaration order.
	pub children: Vec<Node>,
	/// The constraint the version was selected from, as the resolver normalized it.
	pub version_constraint: Option<String>,
	/// All versions matching the constraint, in resolver order; the last one was selected.
	pub versions: Vec<String>,
	/// The merged repository list this node's descendants were read with.
	pub repositories: Vec<RemoteRepository>,
	/// The coordinates a relocation chain walked through before settling on `dependency`.
	pub relocations: Vec<Coordinate>,
	pub managed: ManagedBits,
	pub premanaged: Premanaged,
}

impl Node {
	pub fn new(dependency: Dependency) -> Node {
		Node {
			dependency: Some(dependency),
			children: Vec::new(),
			version_constraint: None,
			versions: Vec::new(),
			repositories: Vec::new(),
			relocations: Vec::new(),
			managed: ManagedBits::default(),
			premanaged: Premanaged::default(),
		}
	}

	/// The artificial root carrying no dependency of its own.
	pub fn artificial() -> Node {
		Node {
			dependency: None,
			children: Vec::new(),
			version_constraint: None,
			versions: Vec::new(),
			repositories: Vec::new(),
			relocations: Vec::new(),
			managed: ManagedBits::default(),
			premanaged: Premanaged::default(),
		}
	}

	fn label(&self) -> String {
		match &self.dependency {
			Some(dependency) => format!("{dependency}"),
			None => String::from("(root)"),
		}
	}

	/// Traverse the graph breadth first by reference.
	///
	/// ```
	/// # use pretty_assertions::assert_eq;
	/// use dependency_collector::graph::Node;
	///
	/// let graph = Node::from_text("a:r:jar:1:compile\n  a:b:jar:1:compile\n  a:c:jar:1:compile\n").unwrap();
	/// let order: Vec<String> = graph.breadth_first().map(|x| x.dependency.as_ref().unwrap().coord.artifact.clone()).collect();
	/// assert_eq!(order, ["r", "b", "c"]);
	/// ```
	pub fn breadth_first(&self) -> BreadthFirst<'_> {
		BreadthFirst { queue: vec![self].into() }
	}

	/// Renders the graph to its plain textual form: one `coord:scope` line per node (`(root)`
	/// for the artificial root), children indented by two spaces per level.
	///
	/// [Node::from_text] parses this form back; round trips preserve the structure.
	pub fn to_text(&self) -> String {
		let mut out = String::new();

		let mut stack = vec![(self, 0usize)];
		while let Some((node, depth)) = stack.pop() {
			for _ in 0..depth {
				out.push_str("  ");
			}
			out.push_str(&node.label());
			out.push('\n');

			for child in node.children.iter().rev() {
				stack.push((child, depth + 1));
			}
		}

		out
	}

	/// Parses the form [Node::to_text] produces.
	///
	/// Only the dependency and the structure survive a round trip; versions, repositories and
	/// management records are not part of the textual form.
	pub fn from_text(text: &str) -> Result<Node> {
		let mut stack: Vec<(usize, Node)> = Vec::new();
		let mut root = None;

		let attach = |stack: &mut Vec<(usize, Node)>, root: &mut Option<Node>| -> Result<()> {
			let Some((_, node)) = stack.pop() else {
				bail!("no node to attach");
			};
			match stack.last_mut() {
				Some((_, parent)) => parent.children.push(node),
				None if root.is_none() => *root = Some(node),
				None => bail!("more than one root line"),
			}
			Ok(())
		};

		for line in text.lines().filter(|x| !x.trim().is_empty()) {
			let label = line.trim_start_matches(' ');
			let indent = line.len() - label.len();
			if indent % 2 != 0 {
				bail!("odd indentation in line {line:?}");
			}
			let depth = indent / 2;

			let node = if label == "(root)" {
				Node::artificial()
			} else {
				Node::new(Dependency::from_str(label).with_context(|| anyhow!("bad node line {line:?}"))?)
			};

			while stack.len() > depth {
				attach(&mut stack, &mut root)?;
			}
			if stack.len() < depth {
				bail!("indentation jumps past the parent in line {line:?}");
			}

			stack.push((depth, node));
		}

		while !stack.is_empty() {
			attach(&mut stack, &mut root)?;
		}

		root.context("empty graph text")
	}
}

impl Display for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		self.fmt_with(f, Palette::GRAPH)
	}
}

impl Node {
	fn fmt_with(&self, f: &mut Formatter<'_>, palette: Palette) -> std::fmt::Result {
		writeln!(f, "{}", self.label())?;

		let mut queue = VecDeque::new();
		for (i, child) in self.children.iter().rev().enumerate() {
			queue.push_front((child, i == 0, vec![]));
		}

		while let Some((node, last, is_last_path)) = queue.pop_front() {
			for (i, child) in node.children.iter().rev().enumerate() {
				let mut is_last_path = is_last_path.clone();
				is_last_path.push(last);

				queue.push_front((child, i == 0, is_last_path));
			}

			for last in is_last_path {
				f.pad(if last { palette.last_skip } else { palette.middle_skip })?;
			}
			f.pad(if last { palette.last_item } else { palette.middle_item })?;

			writeln!(f, "{}", node.label())?;
		}

		Ok(())
	}

	/// Renders like [Display], but with the given [Palette].
	pub fn display_with(&self, palette: Palette) -> impl Display + '_ {
		struct WithPalette<'node>(&'node Node, Palette);

		impl Display for WithPalette<'_> {
			fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
				self.0.fmt_with(f, self.1)
			}
		}

		WithPalette(self, palette)
	}
}

/// See [Node::breadth_first].
#[derive(Debug)]
pub struct BreadthFirst<'node> {
	queue: VecDeque<&'node Node>,
}

impl<'node> Iterator for BreadthFirst<'node> {
	type Item = &'node Node;

	fn next(&mut self) -> Option<Self::Item> {
		self.queue.pop_front().map(|node| {
			self.queue.extend(&node.children);
			node
		})
	}
}

#[derive(Debug, Copy, Clone)]
pub struct Palette {
	pub middle_item: &'static str,
	pub middle_skip: &'static str,
	pub last_item: &'static str,
	pub last_skip: &'static str,
}

impl Palette {
	pub const ASCII: Palette = Palette {
		middle_item: "+- ",
		middle_skip: "|  ",
		last_item:  "\\- ",
		last_skip:   "   ",
	};
	pub const GRAPH: Palette = Palette {
		middle_item: "├── ",
		middle_skip: "│   ",
		last_item:   "└── ",
		last_skip:   "    ",
	};
}

/// Which aspects of a node's dependency were rewritten by management along the path.
///
/// Only recorded in verbose sessions, and only for aspects whose value actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagedBits(u8);

impl ManagedBits {
	pub const VERSION: ManagedBits = ManagedBits(1 << 0);
	pub const SCOPE: ManagedBits = ManagedBits(1 << 1);
	pub const OPTIONAL: ManagedBits = ManagedBits(1 << 2);
	pub const PROPERTIES: ManagedBits = ManagedBits(1 << 3);
	pub const EXCLUSIONS: ManagedBits = ManagedBits(1 << 4);

	pub fn contains(self, bits: ManagedBits) -> bool {
		self.0 & bits.0 == bits.0
	}

	pub fn insert(&mut self, bits: ManagedBits) {
		self.0 |= bits.0;
	}

	pub fn is_empty(self) -> bool {
		self.0 == 0
	}
}

/// The values a node's dependency held before management rewrote them.
///
/// The sidecar of a verbose collection; in a non-verbose session every field stays `None` and
/// the node costs nothing extra. `optional` is doubly optional on purpose: the outer level is
/// "was it overridden", the inner level is the tri-state flag itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Premanaged {
	pub version: Option<String>,
	pub scope: Option<String>,
	pub optional: Option<Option<bool>>,
	pub properties: Option<BTreeMap<String, String>>,
	pub exclusions: Option<Vec<Exclusion>>,
}

impl Premanaged {
	pub fn is_empty(&self) -> bool {
		self.version.is_none() &&
			self.scope.is_none() &&
			self.optional.is_none() &&
			self.properties.is_none() &&
			self.exclusions.is_none()
	}
}
