use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use crate::coord::{Coordinate, PathKey};
use crate::dependency::{scopes, Dependency, Exclusion};
use crate::descriptor::{Descriptor, DescriptorErrorKind, DescriptorReader, DescriptorRequest, DescriptorResult};
use crate::error::{CollectError, CollectErrorKind, DependencyCollectionError};
use crate::graph::{ManagedBits, Node, Premanaged};
use crate::manager::{DependencyManagement, DependencyManager};
use crate::repository::{DefaultRepositoryMerger, RemoteRepository, RepositoryMerger};
use crate::version::{VersionRangeRequest, VersionRangeResolver};

/// A relocation chain longer than this does not terminate.
const MAX_RELOCATION_HOPS: usize = 20;

/// The policy of one collection call. Carries no traversal state, so one session can serve any
/// number of concurrent calls.
#[derive(Debug, Clone)]
pub struct Session {
	/// The management to start from. Pre-seeded managers (see
	/// [DependencyManager::derive_root]) apply on top of the request's managed list.
	pub manager: DependencyManager,
	/// Scopes that are not collected transitively. Dependencies in these scopes still collect
	/// when they are declared roots.
	pub ignored_scopes: Vec<String>,
	/// Record managed bits and premanaged values on the nodes.
	pub verbose: bool,
	/// Treat a missing descriptor as an empty one instead of recording an error.
	pub missing_descriptors_as_empty: bool,
	/// Escalate descriptor errors: the call returns `Err` with the partial result attached
	/// instead of an `Ok` result carrying the errors.
	pub descriptor_errors_fatal: bool,
	pub token: CancellationToken,
}

impl Default for Session {
	fn default() -> Session {
		Session {
			manager: DependencyManager::classic(),
			ignored_scopes: vec![scopes::TEST.to_owned(), scopes::SYSTEM.to_owned()],
			verbose: false,
			missing_descriptors_as_empty: false,
			descriptor_errors_fatal: false,
			token: CancellationToken::new(),
		}
	}
}

/// A cloneable cancellation flag. The engine checks it between descriptor fetches; once
/// cancelled, the call returns with whatever partial graph exists.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
	cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
	pub fn new() -> CancellationToken {
		CancellationToken::default()
	}

	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Relaxed)
	}
}

/// What to collect: either one root dependency, or a list of roots that are co-required (each
/// root then sees the others as direct dependencies, so the union must resolve together).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CollectRequest {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub root: Option<Dependency>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub roots: Vec<Dependency>,
	/// An externally-supplied managed list, applied at depth 0.
	#[serde(default, rename = "managedDependencies", skip_serializing_if = "Vec::is_empty")]
	pub managed_dependencies: Vec<Dependency>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub repositories: Vec<RemoteRepository>,
	#[serde(default, rename = "requestContext", skip_serializing_if = "String::is_empty")]
	pub request_context: String,
}

impl CollectRequest {
	pub fn with_root(root: Dependency) -> CollectRequest {
		CollectRequest { root: Some(root), ..CollectRequest::default() }
	}

	pub fn with_roots(roots: Vec<Dependency>) -> CollectRequest {
		CollectRequest { roots, ..CollectRequest::default() }
	}
}

/// The collected graph, every recoverable error met on the way, and the truncated cycles.
#[derive(Debug)]
pub struct CollectResult {
	/// Carries a dependency for a single-root request; the artificial root otherwise.
	pub root: Node,
	pub exceptions: Vec<CollectError>,
	/// One entry per truncation: the coordinates from the root down to (and including) the
	/// re-encountered one.
	pub cycles: Vec<Vec<Coordinate>>,
	pub request: CollectRequest,
}

/// The traversal driver: discovers every reachable dependency by reading descriptors,
/// managing, resolving version ranges and truncating cycles, depth first.
///
/// Holds only the collaborator references; all traversal state is per call, so a collector is
/// safe to share and to call concurrently.
#[derive(Debug, Clone)]
pub struct Collector<R, V, M = DefaultRepositoryMerger> {
	reader: R,
	versions: V,
	merger: M,
}

impl<R, V> Collector<R, V, DefaultRepositoryMerger> {
	pub fn new(reader: R, versions: V) -> Collector<R, V, DefaultRepositoryMerger> {
		Collector { reader, versions, merger: DefaultRepositoryMerger }
	}
}

impl<R, V, M> Collector<R, V, M> {
	pub fn with_merger(reader: R, versions: V, merger: M) -> Collector<R, V, M> {
		Collector { reader, versions, merger }
	}
}

/// One frame of the explicit work stack: a node whose children are still being enumerated,
/// with everything the path down to it determines.
struct Frame {
	node: Node,
	children: std::vec::IntoIter<Dependency>,
	manager: DependencyManager,
	repositories: Vec<RemoteRepository>,
	/// The versionless coordinates on the path, this node included. Cycle truncation.
	keys: HashSet<PathKey>,
	/// Exclusions of every dependency on the path, this node's included.
	exclusions: Vec<Exclusion>,
	/// The coordinates from the root down to this node, for cycle reporting.
	path: Vec<Coordinate>,
	/// The depth the children of this frame sit at; 0 for declared roots.
	depth: usize,
}

enum Outcome {
	/// Nothing to add (excluded, filtered, or the subtree was pruned by an error).
	Skip,
	/// A finished leaf.
	Attach(Node),
	/// A node with children still to enumerate.
	Recurse(Box<Frame>),
	Cancelled,
}

enum CacheEntry {
	Descriptor(Arc<DescriptorResult>),
	Empty,
	Failed,
}

enum ReadOutcome {
	Descriptor(Arc<DescriptorResult>),
	Empty,
	Failed,
}

/// The state of one `collect_dependencies` call; released on return.
#[derive(Default)]
struct State {
	cache: HashMap<Coordinate, CacheEntry>,
	exceptions: Vec<CollectError>,
	cycles: Vec<Vec<Coordinate>>,
}

impl<R, V, M> Collector<R, V, M>
where
	R: DescriptorReader,
	V: VersionRangeResolver,
	M: RepositoryMerger,
{
	/// Collects the transitive dependencies of the request's root(s).
	///
	/// Recoverable errors (unreadable descriptors, empty version ranges, relocation loops)
	/// prune their subtree and accumulate on the result. The call itself only fails when the
	/// request names no root at all, when the session escalates descriptor errors, or on
	/// cancellation; the partial result stays attached to the error in every case.
	pub async fn collect_dependencies(&self, session: &Session, request: CollectRequest)
			-> Result<CollectResult, DependencyCollectionError> {

		let roots: Vec<Dependency> = match &request.root {
			Some(root) => vec![root.clone()],
			None => request.roots.clone(),
		};

		if roots.is_empty() {
			let result = CollectResult {
				root: Node::artificial(),
				exceptions: vec![CollectError::failed("the request names no root dependency")],
				cycles: Vec::new(),
				request,
			};
			return Err(DependencyCollectionError { kind: CollectErrorKind::Failed, result });
		}

		debug!("collecting {count} root(s) against {repositories} repositories",
			count = roots.len(),
			repositories = request.repositories.len(),
		);

		let single = roots.len() == 1;
		let cross_links: Vec<Dependency> = if single { Vec::new() } else { roots.clone() };

		let mut state = State::default();

		let mut stack = vec![Frame {
			node: Node::artificial(),
			children: roots.into_iter(),
			manager: session.manager.derive_root(&request.managed_dependencies),
			repositories: request.repositories.clone(),
			keys: HashSet::new(),
			exclusions: Vec::new(),
			path: Vec::new(),
			depth: 0,
		}];

		let mut root = None;
		while !stack.is_empty() {
			if session.token.is_cancelled() {
				return Err(Self::cancelled(stack, single, state, request));
			}

			let top = stack.len() - 1;
			let Some(dependency) = stack[top].children.next() else {
				if let Some(frame) = stack.pop() {
					match stack.last_mut() {
						Some(parent) => parent.node.children.push(frame.node),
						None => root = Some(frame.node),
					}
				}
				continue;
			};

			let outcome = self.process_dependency(
				session, &mut state, &stack[top], &cross_links, &request.request_context, dependency,
			).await;

			match outcome {
				Outcome::Skip => {}
				Outcome::Attach(node) => stack[top].node.children.push(node),
				Outcome::Recurse(frame) => stack.push(*frame),
				Outcome::Cancelled => return Err(Self::cancelled(stack, single, state, request)),
			}
		}

		let result = CollectResult {
			root: Self::finish_root(root.unwrap_or_else(Node::artificial), single),
			exceptions: state.exceptions,
			cycles: state.cycles,
			request,
		};

		if session.descriptor_errors_fatal && result.exceptions.iter().any(|x| x.kind == CollectErrorKind::Descriptor) {
			return Err(DependencyCollectionError { kind: CollectErrorKind::Descriptor, result });
		}

		Ok(result)
	}

	/// Runs one dependency through the pipeline: manage, cycle check, exclusions, the
	/// below-root filters, version selection, descriptor read (following relocations), and
	/// repository merging.
	async fn process_dependency(&self, session: &Session, state: &mut State, frame: &Frame,
			cross_links: &[Dependency], request_context: &str, dependency: Dependency) -> Outcome {

		let child_depth = frame.depth;
		let declared = dependency.clone();

		let mut dependency = dependency;
		let mut managed_bits = ManagedBits::default();
		let mut premanaged = Premanaged::default();

		let management = frame.manager.manage(&dependency);
		apply_management(&mut dependency, management, session.verbose, &mut managed_bits, &mut premanaged);

		// a versionless coordinate already on the path ends the walk here, without an error
		if frame.keys.contains(&dependency.coord.path_key()) {
			trace!("cycle at {coord}, truncating", coord = dependency.coord);

			let mut cycle = frame.path.clone();
			cycle.push(dependency.coord.clone());
			state.cycles.push(cycle);

			let mut node = Node::new(dependency);
			node.managed = managed_bits;
			node.premanaged = premanaged;
			return Outcome::Attach(node);
		}

		if let Some(exclusion) = frame.exclusions.iter().find(|x| x.matches(&dependency.coord)) {
			trace!("skipping {coord}, excluded by {exclusion}", coord = dependency.coord);
			return Outcome::Skip;
		}

		if child_depth > 0 {
			if dependency.is_optional() {
				trace!("skipping optional {coord}", coord = dependency.coord);
				return Outcome::Skip;
			}
			if session.ignored_scopes.iter().any(|x| x == &dependency.scope) {
				trace!("skipping {coord}, scope {scope:?} is not collected transitively",
					coord = dependency.coord, scope = dependency.scope);
				return Outcome::Skip;
			}
		}

		let range = match self.versions.resolve_range(VersionRangeRequest {
			coord: dependency.coord.clone(),
			repositories: &frame.repositories,
			request_context,
		}).await {
			Ok(range) => range,
			Err(error) => {
				warn!("{error}");
				state.exceptions.push(CollectError::version_resolution(error));
				return root_leaf_or_skip(child_depth, dependency, managed_bits, premanaged);
			}
		};

		let Some(version) = range.selected() else {
			state.exceptions.push(CollectError::empty_range(dependency.coord.clone()));
			return root_leaf_or_skip(child_depth, dependency, managed_bits, premanaged);
		};
		dependency.coord.version = version.to_owned();

		let mut relocations: Vec<Coordinate> = Vec::new();
		let result = loop {
			if session.token.is_cancelled() {
				return Outcome::Cancelled;
			}

			match self.read_cached(session, state, &dependency.coord, &frame.repositories, request_context).await {
				ReadOutcome::Failed => break None,
				ReadOutcome::Empty => {
					break Some(Arc::new(DescriptorResult::of(Descriptor::empty(dependency.coord.clone()))));
				}
				ReadOutcome::Descriptor(result) => {
					let relocation = result.descriptor.relocation.clone();
					let Some(target) = relocation else { break Some(result) };

					if relocations.len() >= MAX_RELOCATION_HOPS
						|| relocations.contains(&target)
						|| target == dependency.coord
					{
						state.exceptions.push(CollectError::relocation_loop(target, &relocations));
						return root_leaf_or_skip(child_depth, dependency, managed_bits, premanaged);
					}

					warn!("following relocation {from} -> {to}", from = dependency.coord, to = target);
					relocations.push(dependency.coord.clone());
					// the coordinate is replaced; scope, optional and exclusions stay the requester's
					dependency.coord = target;

					let management = frame.manager.manage(&dependency);
					apply_management(&mut dependency, management, session.verbose, &mut managed_bits, &mut premanaged);
				}
			}
		};

		let Some(result) = result else {
			return root_leaf_or_skip(child_depth, dependency, managed_bits, premanaged);
		};

		// descriptor-declared repositories become visible to everything below, and never
		// narrow the accumulated list down to the repository that hosted the selected version
		let merged = self.merger.merge(&frame.repositories, &result.descriptor.repositories);

		let mut node = Node::new(dependency.clone());
		node.version_constraint = Some(range.constraint);
		node.versions = range.versions;
		node.repositories = merged.clone();
		node.relocations = relocations;
		node.managed = managed_bits;
		node.premanaged = premanaged;

		let mut child_dependencies = result.descriptor.dependencies.clone();
		if child_depth == 0 {
			// every other declared root is a direct dependency of this root
			child_dependencies.extend(cross_links.iter().filter(|x| **x != declared).cloned());
		}

		if child_dependencies.is_empty() {
			return Outcome::Attach(node);
		}

		let manager = frame.manager.derive(&result.descriptor.managed_dependencies);

		let mut keys = frame.keys.clone();
		keys.insert(dependency.coord.path_key());

		let mut path = frame.path.clone();
		path.push(dependency.coord.clone());

		let mut exclusions = frame.exclusions.clone();
		for exclusion in &dependency.exclusions {
			if !exclusions.contains(exclusion) {
				exclusions.push(exclusion.clone());
			}
		}

		Outcome::Recurse(Box::new(Frame {
			node,
			children: child_dependencies.into_iter(),
			manager,
			repositories: merged,
			keys,
			exclusions,
			path,
			depth: child_depth + 1,
		}))
	}

	/// Reads a descriptor through the per-call cache. Failed reads are cached too, so a
	/// missing descriptor is recorded exactly once per distinct coordinate.
	async fn read_cached(&self, session: &Session, state: &mut State, coord: &Coordinate,
			repositories: &[RemoteRepository], request_context: &str) -> ReadOutcome {

		if let Some(entry) = state.cache.get(coord) {
			trace!("descriptor cache hit for {coord}");
			return match entry {
				CacheEntry::Descriptor(result) => ReadOutcome::Descriptor(Arc::clone(result)),
				CacheEntry::Empty => ReadOutcome::Empty,
				CacheEntry::Failed => ReadOutcome::Failed,
			};
		}

		trace!("reading descriptor for {coord}");
		let request = DescriptorRequest { coord: coord.clone(), repositories, request_context };
		match self.reader.read_descriptor(request).await {
			Ok(result) => {
				let result = Arc::new(result);
				state.cache.insert(coord.clone(), CacheEntry::Descriptor(Arc::clone(&result)));
				ReadOutcome::Descriptor(result)
			}
			Err(error) if error.kind == DescriptorErrorKind::Missing && session.missing_descriptors_as_empty => {
				debug!("no descriptor for {coord}, taking it as empty");
				state.cache.insert(coord.clone(), CacheEntry::Empty);
				ReadOutcome::Empty
			}
			Err(error) => {
				warn!("{error}");
				state.exceptions.push(CollectError::descriptor(error));
				state.cache.insert(coord.clone(), CacheEntry::Failed);
				ReadOutcome::Failed
			}
		}
	}

	fn cancelled(stack: Vec<Frame>, single: bool, state: State, request: CollectRequest) -> DependencyCollectionError {
		DependencyCollectionError {
			kind: CollectErrorKind::Cancelled,
			result: CollectResult {
				root: Self::finish_root(Self::collapse(stack), single),
				exceptions: state.exceptions,
				cycles: state.cycles,
				request,
			},
		}
	}

	/// Folds the remaining frames into the partial graph collected so far.
	fn collapse(mut stack: Vec<Frame>) -> Node {
		let mut node = None;
		while let Some(mut frame) = stack.pop() {
			if let Some(child) = node.take() {
				frame.node.children.push(child);
			}
			node = Some(frame.node);
		}
		node.unwrap_or_else(Node::artificial)
	}

	/// A single-root request's result is the root node itself, not the artificial one.
	fn finish_root(bootstrap: Node, single: bool) -> Node {
		if single {
			bootstrap.children.into_iter().next().unwrap_or_else(Node::artificial)
		} else {
			bootstrap
		}
	}
}

/// Applies a management decision to the dependency, recording (in verbose sessions) which
/// aspects actually changed and what they were before. Management during relocation hops calls
/// this repeatedly; only the first override of an aspect records the premanaged value.
fn apply_management(dependency: &mut Dependency, management: Option<DependencyManagement>,
		verbose: bool, bits: &mut ManagedBits, premanaged: &mut Premanaged) {

	let Some(management) = management else { return };

	if let Some(version) = management.version {
		if version != dependency.coord.version {
			if verbose {
				bits.insert(ManagedBits::VERSION);
				if premanaged.version.is_none() {
					premanaged.version = Some(dependency.coord.version.clone());
				}
			}
			dependency.coord.version = version;
		}
	}

	if let Some(scope) = management.scope {
		if scope != dependency.scope {
			if verbose {
				bits.insert(ManagedBits::SCOPE);
				if premanaged.scope.is_none() {
					premanaged.scope = Some(dependency.scope.clone());
				}
			}
			dependency.scope = scope;
		}
	}

	if let Some(optional) = management.optional {
		if Some(optional) != dependency.optional {
			if verbose {
				bits.insert(ManagedBits::OPTIONAL);
				if premanaged.optional.is_none() {
					premanaged.optional = Some(dependency.optional);
				}
			}
			dependency.optional = Some(optional);
		}
	}

	if let Some(properties) = management.properties {
		if properties != dependency.coord.properties {
			if verbose {
				bits.insert(ManagedBits::PROPERTIES);
				if premanaged.properties.is_none() {
					premanaged.properties = Some(dependency.coord.properties.clone());
				}
			}
			dependency.coord.properties = properties;
		}
	}

	if let Some(exclusions) = management.exclusions {
		let mut merged = dependency.exclusions.clone();
		for exclusion in exclusions {
			if !merged.contains(&exclusion) {
				merged.push(exclusion);
			}
		}
		if merged != dependency.exclusions {
			if verbose {
				bits.insert(ManagedBits::EXCLUSIONS);
				if premanaged.exclusions.is_none() {
					premanaged.exclusions = Some(dependency.exclusions.clone());
				}
			}
			dependency.exclusions = merged;
		}
	}
}

fn root_leaf_or_skip(child_depth: usize, dependency: Dependency, managed: ManagedBits, premanaged: Premanaged) -> Outcome {
	if child_depth == 0 {
		// a root always yields a node, even when its subtree could not be collected
		let mut node = Node::new(dependency);
		node.managed = managed;
		node.premanaged = premanaged;
		Outcome::Attach(node)
	} else {
		Outcome::Skip
	}
}
