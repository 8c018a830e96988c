use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::coord::PathKey;
use crate::dependency::{Dependency, Exclusion};

/// The aspects of a [Dependency] that management decided to override, with the values to use.
///
/// An aspect that is `None` is left alone. `optional` carries the managed flag itself (the
/// tri-state collapses: management always decides). `exclusions` are the patterns management
/// contributes; the collector unions them with the dependency's own. `properties` replace the
/// coordinate's property map wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyManagement {
	pub version: Option<String>,
	pub scope: Option<String>,
	pub optional: Option<bool>,
	pub properties: Option<BTreeMap<String, String>>,
	pub exclusions: Option<Vec<Exclusion>>,
}

impl DependencyManagement {
	pub fn is_empty(&self) -> bool {
		self.version.is_none() &&
			self.scope.is_none() &&
			self.optional.is_none() &&
			self.properties.is_none() &&
			self.exclusions.is_none()
	}
}

/// One managed entry, keyed by [PathKey] inside a [Layer].
///
/// An entry only manages the aspects its declaration actually pins down: an empty version or
/// scope manages nothing, and an unset optional flag stays unset.
#[derive(Debug)]
struct Entry {
	version: Option<String>,
	scope: Option<String>,
	optional: Option<bool>,
	properties: BTreeMap<String, String>,
	exclusions: Vec<Exclusion>,
}

impl Entry {
	fn from_dependency(dependency: &Dependency) -> Entry {
		Entry {
			version: Some(dependency.coord.version.clone()).filter(|x| !x.is_empty()),
			scope: Some(dependency.scope.clone()).filter(|x| !x.is_empty()),
			optional: dependency.optional,
			properties: dependency.coord.properties.clone(),
			exclusions: dependency.exclusions.clone(),
		}
	}
}

/// One immutable slice of management state: everything a single descriptor (or the request)
/// declared, remembered together with the node depth it was discovered at.
#[derive(Debug)]
struct Layer {
	discovered: usize,
	entries: HashMap<PathKey, Entry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
	/// Management discovered at depth 0 or 1 applies to all descendants; deeper management only
	/// to the declaring node's direct children.
	Classic,
	/// Every layer on the path applies to all descendants.
	Transitive,
	/// Management is switched off entirely.
	Disabled,
}

/// The path-contextual policy engine rewriting descendant dependencies.
///
/// One capability, three behaviors: [DependencyManager::classic],
/// [DependencyManager::transitive] and [DependencyManager::disabled] are constructors, not
/// subtypes. State is a stack of immutable layers keyed by versionless coordinate;
/// [DependencyManager::derive] pushes a layer and is pure (the parent manager is untouched), so
/// sibling subtrees never see each other's management.
///
/// When a key matches entries in several applicable layers, the shallowest declaration wins per
/// aspect; properties merge key-wise with the shallowest value per key; exclusions union.
#[derive(Debug, Clone)]
pub struct DependencyManager {
	rule: Rule,
	/// Depth of the nodes this manager manages: the layer a [DependencyManager::derive] call
	/// adds was discovered at this depth.
	depth: usize,
	layers: Vec<Arc<Layer>>,
}

impl DependencyManager {
	pub fn classic() -> DependencyManager {
		DependencyManager { rule: Rule::Classic, depth: 0, layers: Vec::new() }
	}

	pub fn transitive() -> DependencyManager {
		DependencyManager { rule: Rule::Transitive, depth: 0, layers: Vec::new() }
	}

	pub fn disabled() -> DependencyManager {
		DependencyManager { rule: Rule::Disabled, depth: 0, layers: Vec::new() }
	}

	/// Folds a managed list in at depth 0, without descending. This is how the request's
	/// externally-supplied managed dependencies (and pre-seeded session management) enter; the
	/// derived manager still manages root-level dependencies.
	pub fn derive_root(&self, managed: &[Dependency]) -> DependencyManager {
		self.push_layer(managed, 0, self.depth)
	}

	/// Folds a descriptor's managed list in while descending into the declaring node: the
	/// layer is discovered at the current depth, and the derived manager manages one level
	/// deeper.
	pub fn derive(&self, managed: &[Dependency]) -> DependencyManager {
		self.push_layer(managed, self.depth, self.depth + 1)
	}

	fn push_layer(&self, managed: &[Dependency], discovered: usize, depth: usize) -> DependencyManager {
		let mut layers = self.layers.clone();

		if self.rule != Rule::Disabled && !managed.is_empty() {
			let mut entries = HashMap::new();
			for dependency in managed {
				// first declaration per key wins within one list
				entries.entry(dependency.coord.path_key())
					.or_insert_with(|| Entry::from_dependency(dependency));
			}
			layers.push(Arc::new(Layer { discovered, entries }));
		}

		DependencyManager { rule: self.rule, depth, layers }
	}

	fn applies(&self, layer: &Layer) -> bool {
		match self.rule {
			Rule::Disabled => false,
			Rule::Transitive => true,
			Rule::Classic => layer.discovered <= 1 || layer.discovered + 1 == self.depth,
		}
	}

	/// Decides what to override on `dependency`, or `None` when nothing applies.
	///
	/// Pure: neither the manager nor the dependency is touched.
	pub fn manage(&self, dependency: &Dependency) -> Option<DependencyManagement> {
		let key = dependency.coord.path_key();

		let mut management = DependencyManagement::default();
		let mut properties: BTreeMap<String, String> = BTreeMap::new();
		let mut exclusions: Vec<Exclusion> = Vec::new();

		// outermost first, so the shallowest declaration is found first
		for layer in self.layers.iter().filter(|x| self.applies(x)) {
			let Some(entry) = layer.entries.get(&key) else { continue };

			if management.version.is_none() {
				management.version = entry.version.clone();
			}
			if management.scope.is_none() {
				management.scope = entry.scope.clone();
			}
			if management.optional.is_none() {
				management.optional = entry.optional;
			}
			for (property, value) in &entry.properties {
				properties.entry(property.clone()).or_insert_with(|| value.clone());
			}
			for exclusion in &entry.exclusions {
				if !exclusions.contains(exclusion) {
					exclusions.push(exclusion.clone());
				}
			}
		}

		if !properties.is_empty() {
			management.properties = Some(properties);
		}
		if !exclusions.is_empty() {
			management.exclusions = Some(exclusions);
		}

		if management.is_empty() {
			None
		} else {
			Some(management)
		}
	}
}
