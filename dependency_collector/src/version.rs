use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use crate::coord::Coordinate;
use crate::repository::RemoteRepository;

#[derive(Debug, Clone)]
pub struct VersionRangeRequest<'a> {
	/// The coordinate whose `version` may be a range constraint.
	pub coord: Coordinate,
	/// Every repository accumulated along the path. Ranges must be expanded across all of them.
	pub repositories: &'a [RemoteRepository],
	pub request_context: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionRangeResult {
	/// All versions matching the constraint, in the resolver's order. The engine selects the
	/// last entry; ties and ordering are the resolver's business.
	pub versions: Vec<String>,
	/// The constraint the versions were expanded from, normalized by the resolver.
	pub constraint: String,
	/// Which repository hosts which version, where the resolver knows.
	pub repositories: BTreeMap<String, RemoteRepository>,
}

impl VersionRangeResult {
	/// The version the engine will use: the highest by the resolver's ordering.
	pub fn selected(&self) -> Option<&str> {
		self.versions.last().map(String::as_str)
	}

	pub fn repository_of(&self, version: &str) -> Option<&RemoteRepository> {
		self.repositories.get(version)
	}
}

/// Expands a version constraint to concrete versions against a repository list.
pub trait VersionRangeResolver {
	// note: can't rewrite with async, bc of `+ Send`
	#[allow(clippy::manual_async_fn)]
	fn resolve_range(&self, request: VersionRangeRequest<'_>) -> impl Future<Output = Result<VersionRangeResult, VersionRangeError>> + Send;
}

#[derive(Debug)]
pub struct VersionRangeError {
	pub coord: Coordinate,
	pub source: anyhow::Error,
}

impl VersionRangeError {
	pub fn new(coord: Coordinate, source: anyhow::Error) -> VersionRangeError {
		VersionRangeError { coord, source }
	}
}

impl Display for VersionRangeError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "failed to resolve version range {version:?} of {key}",
			version = self.coord.version,
			key = self.coord.path_key(),
		)
	}
}

impl std::error::Error for VersionRangeError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(self.source.as_ref())
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use std::collections::BTreeMap;
	use crate::version::VersionRangeResult;

	#[test]
	fn selected_is_the_last_version() {
		let result = VersionRangeResult {
			versions: vec!["1.0".to_owned(), "1.1".to_owned(), "2.0".to_owned()],
			constraint: "[1.0,2.0]".to_owned(),
			repositories: BTreeMap::new(),
		};
		assert_eq!(result.selected(), Some("2.0"));

		let empty = VersionRangeResult { versions: Vec::new(), ..result };
		assert_eq!(empty.selected(), None);
	}
}
