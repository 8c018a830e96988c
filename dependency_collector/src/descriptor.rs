use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use serde::{Deserialize, Serialize};
use crate::coord::Coordinate;
use crate::dependency::Dependency;
use crate::repository::RemoteRepository;

/// The metadata document of one artifact: its dependencies, managed dependencies, declared
/// repositories and (possibly) a relocation directive.
///
/// A relocation says "this coordinate is a redirect"; the collector follows the directive and
/// accumulates the chain, so a descriptor only ever carries a single hop.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Descriptor {
	pub coord: Coordinate,
	#[serde(default, rename = "managedDependencies", skip_serializing_if = "Vec::is_empty")]
	pub managed_dependencies: Vec<Dependency>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub dependencies: Vec<Dependency>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub repositories: Vec<RemoteRepository>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub relocation: Option<Coordinate>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub properties: BTreeMap<String, String>,
}

impl Descriptor {
	/// A descriptor declaring nothing. This is what a missing descriptor degrades to when the
	/// session tolerates missing ones.
	pub fn empty(coord: Coordinate) -> Descriptor {
		Descriptor {
			coord,
			managed_dependencies: Vec::new(),
			dependencies: Vec::new(),
			repositories: Vec::new(),
			relocation: None,
			properties: BTreeMap::new(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct DescriptorRequest<'a> {
	pub coord: Coordinate,
	/// Every repository accumulated along the path, request-supplied ones first. Readers must
	/// consult all of them, not just the one a version was selected from.
	pub repositories: &'a [RemoteRepository],
	pub request_context: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorResult {
	/// The requested coordinate with all its properties expanded by the reader.
	pub coord: Coordinate,
	pub descriptor: Descriptor,
	/// Repositories the reader learned about on the side (mirrors, say); purely informational.
	pub alternate_repositories: Vec<RemoteRepository>,
}

impl DescriptorResult {
	pub fn of(descriptor: Descriptor) -> DescriptorResult {
		DescriptorResult {
			coord: descriptor.coord.clone(),
			descriptor,
			alternate_repositories: Vec::new(),
		}
	}
}

/// Resolves a [Coordinate] to its [Descriptor].
///
/// Implementations must be idempotent for equal coordinates within one collection (the engine
/// additionally caches per call, so a well-behaved reader is asked once per coordinate).
pub trait DescriptorReader {
	// note: can't rewrite with async, bc of `+ Send`
	#[allow(clippy::manual_async_fn)]
	fn read_descriptor(&self, request: DescriptorRequest<'_>) -> impl Future<Output = Result<DescriptorResult, DescriptorError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorErrorKind {
	/// The transfer failed; trying again may succeed.
	Io,
	/// The descriptor exists but cannot be parsed; trying again will not help.
	Invalid,
	/// No repository has a descriptor for the coordinate. Session policy decides whether this
	/// degrades to an empty descriptor or is recorded as an error.
	Missing,
}

impl DescriptorErrorKind {
	pub fn is_retryable(self) -> bool {
		matches!(self, DescriptorErrorKind::Io)
	}
}

#[derive(Debug)]
pub struct DescriptorError {
	pub kind: DescriptorErrorKind,
	pub coord: Coordinate,
	pub source: Option<anyhow::Error>,
}

impl DescriptorError {
	pub fn io(coord: Coordinate, source: anyhow::Error) -> DescriptorError {
		DescriptorError { kind: DescriptorErrorKind::Io, coord, source: Some(source) }
	}

	pub fn invalid(coord: Coordinate, source: anyhow::Error) -> DescriptorError {
		DescriptorError { kind: DescriptorErrorKind::Invalid, coord, source: Some(source) }
	}

	pub fn missing(coord: Coordinate) -> DescriptorError {
		DescriptorError { kind: DescriptorErrorKind::Missing, coord, source: None }
	}
}

impl Display for DescriptorError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let what = match self.kind {
			DescriptorErrorKind::Io => "failed to transfer descriptor",
			DescriptorErrorKind::Invalid => "invalid descriptor",
			DescriptorErrorKind::Missing => "missing descriptor",
		};
		write!(f, "{what} for {coord}", coord = self.coord)
	}
}

impl std::error::Error for DescriptorError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.source.as_deref().map(|x| x as &(dyn std::error::Error + 'static))
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use anyhow::anyhow;
	use crate::coord::Coordinate;
	use crate::dependency::{scopes, Dependency};
	use crate::descriptor::{Descriptor, DescriptorError};
	use crate::repository::RemoteRepository;

	#[test]
	fn wire_form_round_trips() {
		let mut coord = Coordinate::from_group_artifact_version("org.example", "foo", "1.0");
		coord.properties.insert("localPath".to_owned(), "/x/foo.jar".to_owned());

		let descriptor = Descriptor {
			managed_dependencies: vec![
				Dependency::new(Coordinate::from_group_artifact_version("org.example", "managed", "2.0"), scopes::RUNTIME),
			],
			dependencies: vec![
				Dependency::new(Coordinate::from_group_artifact_version("com.example", "bar", "0.2"), scopes::COMPILE),
			],
			repositories: vec![RemoteRepository::new("project", "invalid://maven.example.org")],
			relocation: Some(Coordinate::from_group_artifact_version("org.example", "foo-relocated", "1.0")),
			..Descriptor::empty(coord)
		};

		let json = serde_json::to_string(&descriptor).unwrap();
		assert_eq!(serde_json::from_str::<Descriptor>(&json).unwrap(), descriptor);

		// the identity fields keep their descriptor names on the wire
		assert!(json.contains("\"groupId\":\"org.example\""));
		assert!(json.contains("\"artifactId\":\"foo\""));
		assert!(json.contains("\"managedDependencies\""));
	}

	#[test]
	fn error_kinds_classify_retryability() {
		let coord = Coordinate::from_group_artifact_version("org.example", "foo", "1.0");
		assert!(DescriptorError::io(coord.clone(), anyhow!("connection reset")).kind.is_retryable());
		assert!(!DescriptorError::invalid(coord.clone(), anyhow!("not xml")).kind.is_retryable());
		assert!(!DescriptorError::missing(coord.clone()).kind.is_retryable());
		assert_eq!(format!("{}", DescriptorError::missing(coord)), "missing descriptor for org.example:foo:jar:1.0");
	}
}
