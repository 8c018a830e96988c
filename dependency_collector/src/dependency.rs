use std::fmt::{Display, Formatter};
use std::str::FromStr;
use anyhow::{anyhow, Context, Error};
use serde::{Deserialize, Serialize};
use crate::coord::Coordinate;

/// The well-known scope names.
///
/// Scope is an open string on [Dependency] (an unknown or empty scope is legal), so these are
/// plain constants rather than an enum.
pub mod scopes {
	pub const COMPILE: &str = "compile";
	pub const RUNTIME: &str = "runtime";
	pub const TEST: &str = "test";
	pub const SYSTEM: &str = "system";
	pub const PROVIDED: &str = "provided";
}

/// A [Coordinate] with a scope, an optional flag and exclusions; the unit of collection input.
///
/// The `optional` flag is tri-state. `None` means "not declared", and must stay distinguishable
/// from an explicit `Some(false)`: management may only rewrite the flag where it was actually
/// declared differently, and verbose collection records which of the two a descriptor said.
///
/// The empty scope is legal and is not the same as any managed scope.
///
/// [Dependency] implements [Display] and [FromStr], format `group:artifact[:extension[:classifier]]:version:scope`.
/// The scope part may be empty. Round trips between the two are possible.
/// ```
/// use std::str::FromStr;
/// # use pretty_assertions::assert_eq;
/// use dependency_collector::dependency::Dependency;
///
/// let a = "org.example:foo:jar:1.0:compile";
/// assert_eq!(a, format!("{}", Dependency::from_str(a).unwrap()));
///
/// let no_scope = Dependency::from_str("org.example:foo:jar:1.0:").unwrap();
/// assert_eq!(no_scope.scope, "");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dependency {
	pub coord: Coordinate,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub scope: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub optional: Option<bool>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub exclusions: Vec<Exclusion>,
}

impl Dependency {
	pub fn new(coord: Coordinate, scope: &str) -> Dependency {
		Dependency {
			coord,
			scope: scope.to_owned(),
			optional: None,
			exclusions: Vec::new(),
		}
	}

	/// An unset flag counts as non-optional.
	pub fn is_optional(&self) -> bool {
		self.optional == Some(true)
	}
}

impl Display for Dependency {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{coord}:{scope}", coord = self.coord, scope = self.scope)
	}
}

impl FromStr for Dependency {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (coord, scope) = s.rsplit_once(':')
			.with_context(|| anyhow!("expected \":\" to separate the scope from the coordinate: {s:?}"))?;

		Ok(Dependency {
			coord: Coordinate::from_str(coord).with_context(|| anyhow!("failed to parse coordinate part: {s:?}"))?,
			scope: scope.to_owned(),
			optional: None,
			exclusions: Vec::new(),
		})
	}
}

/// An exclusion pattern carried by a [Dependency], pruning matching artifacts from the subtree
/// below the dependency that declared it.
///
/// Each field may be the `*` wildcard. A coordinate matches iff every non-`*` field equals the
/// coordinate's field, with an absent classifier compared as the empty string.
/// ```
/// # use pretty_assertions::assert_eq;
/// use dependency_collector::coord::Coordinate;
/// use dependency_collector::dependency::Exclusion;
///
/// let coord = Coordinate::from_group_artifact_version("org.example", "foo", "1.0");
/// assert!(Exclusion::new("org.example", "foo").matches(&coord));
/// assert!(Exclusion::new("*", "*").matches(&coord));
/// assert!(!Exclusion::new("org.example", "bar").matches(&coord));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Exclusion {
	#[serde(rename = "groupId")]
	pub group: String,
	#[serde(rename = "artifactId")]
	pub artifact: String,
	#[serde(default = "wildcard")]
	pub classifier: String,
	#[serde(default = "wildcard")]
	pub extension: String,
}

fn wildcard() -> String {
	String::from("*")
}

impl Exclusion {
	/// An exclusion over group and artifact, with classifier and extension wildcarded.
	pub fn new(group: &str, artifact: &str) -> Exclusion {
		Exclusion {
			group: group.to_owned(),
			artifact: artifact.to_owned(),
			classifier: wildcard(),
			extension: wildcard(),
		}
	}

	pub fn matches(&self, coord: &Coordinate) -> bool {
		fn field_matches(pattern: &str, value: &str) -> bool {
			pattern == "*" || pattern == value
		}

		field_matches(&self.group, &coord.group) &&
			field_matches(&self.artifact, &coord.artifact) &&
			field_matches(&self.classifier, coord.classifier.as_deref().unwrap_or("")) &&
			field_matches(&self.extension, &coord.extension)
	}
}

impl Display for Exclusion {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{group}:{artifact}:{extension}:{classifier}",
			group = self.group,
			artifact = self.artifact,
			extension = self.extension,
			classifier = self.classifier,
		)
	}
}
