use std::fmt::{Display, Formatter};
use crate::collector::CollectResult;
use crate::coord::Coordinate;
use crate::descriptor::DescriptorError;
use crate::version::VersionRangeError;

/// The classification of everything that can go wrong while collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectErrorKind {
	/// The session's cancellation token fired; the partial graph is attached to the result.
	Cancelled,
	/// No root could be processed at all.
	Failed,
	/// A descriptor could not be read; the offending subtree is pruned.
	Descriptor,
	/// A version constraint matched nothing (or the resolver failed); the subtree is pruned.
	VersionResolution,
	/// A relocation chain revisited a coordinate; fatal for that subtree.
	RelocationLoop,
}

impl Display for CollectErrorKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.pad(match self {
			CollectErrorKind::Cancelled => "collection cancelled",
			CollectErrorKind::Failed => "collection failed",
			CollectErrorKind::Descriptor => "descriptor error",
			CollectErrorKind::VersionResolution => "version resolution error",
			CollectErrorKind::RelocationLoop => "relocation loop",
		})
	}
}

/// One recoverable error, accumulated on the result while the traversal keeps going.
#[derive(Debug)]
pub struct CollectError {
	pub kind: CollectErrorKind,
	/// The coordinate the error happened at, where one exists.
	pub coord: Option<Coordinate>,
	pub source: Option<anyhow::Error>,
}

impl CollectError {
	pub(crate) fn failed(message: &'static str) -> CollectError {
		CollectError {
			kind: CollectErrorKind::Failed,
			coord: None,
			source: Some(anyhow::anyhow!(message)),
		}
	}

	pub(crate) fn descriptor(error: DescriptorError) -> CollectError {
		CollectError {
			kind: CollectErrorKind::Descriptor,
			coord: Some(error.coord.clone()),
			source: Some(anyhow::Error::new(error)),
		}
	}

	pub(crate) fn version_resolution(error: VersionRangeError) -> CollectError {
		CollectError {
			kind: CollectErrorKind::VersionResolution,
			coord: Some(error.coord.clone()),
			source: Some(anyhow::Error::new(error)),
		}
	}

	pub(crate) fn empty_range(coord: Coordinate) -> CollectError {
		CollectError {
			kind: CollectErrorKind::VersionResolution,
			source: Some(anyhow::anyhow!("no versions match {version:?}", version = coord.version)),
			coord: Some(coord),
		}
	}

	pub(crate) fn relocation_loop(coord: Coordinate, chain: &[Coordinate]) -> CollectError {
		let chain = chain.iter()
			.map(|x| format!("{x}"))
			.chain(Some(format!("{coord}")))
			.collect::<Vec<_>>()
			.join(" -> ");
		CollectError {
			kind: CollectErrorKind::RelocationLoop,
			source: Some(anyhow::anyhow!("relocation chain does not terminate: {chain}")),
			coord: Some(coord),
		}
	}
}

impl Display for CollectError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match &self.coord {
			Some(coord) => write!(f, "{kind} at {coord}", kind = self.kind),
			None => write!(f, "{kind}", kind = self.kind),
		}
	}
}

impl std::error::Error for CollectError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.source.as_deref().map(|x| x as &(dyn std::error::Error + 'static))
	}
}

/// The terminal error of a collection call, wrapping the partial result.
///
/// Returned instead of an `Ok` result exactly when no root could be processed, when the session
/// escalates descriptor errors, or on cancellation. The partial graph, the accumulated errors
/// and the request all remain reachable through `result`.
#[derive(Debug)]
pub struct DependencyCollectionError {
	pub kind: CollectErrorKind,
	pub result: CollectResult,
}

impl Display for DependencyCollectionError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "dependency collection did not finish ({kind}, {count} error(s) attached)",
			kind = self.kind,
			count = self.result.exceptions.len(),
		)
	}
}

impl std::error::Error for DependencyCollectionError {}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::coord::Coordinate;
	use crate::error::CollectError;

	#[test]
	fn display_names_the_coordinate() {
		let coord = Coordinate::from_group_artifact_version("org.example", "foo", "[9,10)");
		let error = CollectError::empty_range(coord);
		assert_eq!(format!("{error}"), "version resolution error at org.example:foo:jar:[9,10)");
	}

	#[test]
	fn relocation_loop_reports_the_chain() {
		let a = Coordinate::from_group_artifact_version("g", "a", "1");
		let b = Coordinate::from_group_artifact_version("g", "b", "1");
		let error = CollectError::relocation_loop(a.clone(), &[a, b]);

		let source = format!("{}", error.source.as_ref().unwrap());
		assert_eq!(source, "relocation chain does not terminate: g:a:jar:1 -> g:b:jar:1 -> g:a:jar:1");
	}
}
