use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

fn jar() -> String {
	String::from("jar")
}

/// A `group`, `artifact`, `extension`, `classifier` and `version` together, plus free-form properties.
///
/// Also known as an artifact coordinate. The five identity fields decide equality and hashing;
/// the properties carry auxiliary data (a local path, say) and never affect identity.
///
/// [Coordinate] implements [FromStr]. Format is: `group:artifact[:extension[:classifier]]:version`.
/// ```
/// use std::str::FromStr;
/// # use pretty_assertions::assert_eq;
/// use dependency_collector::coord::Coordinate;
/// let a = Coordinate::from_str("org.example:artifact:war:sources:1.0").unwrap();
/// let b = Coordinate {
///     group: "org.example".to_owned(),
///     artifact: "artifact".to_owned(),
///     version: "1.0".to_owned(),
///     classifier: Some("sources".to_owned()),
///     extension: "war".to_owned(),
///     properties: Default::default(),
/// };
///
/// assert_eq!(a, b);
/// ```
/// [Coordinate] also implements [Display], which exactly produces a format parsed by [FromStr],
/// always listing the extension.
/// ```
/// use std::str::FromStr;
/// # use pretty_assertions::assert_eq;
/// use dependency_collector::coord::Coordinate;
///
/// let a = "org.example:artifact:1.0"; // notice: no extension, no classifier
/// let b = "org.example:artifact:jar:1.0"; // equivalent, since the default extension is "jar"
/// assert_eq!(b, format!("{}", Coordinate::from_str(a).unwrap()));
///
/// let a = "org.example:artifact:ear:javadoc:1.0";
/// assert_eq!(a, format!("{}", Coordinate::from_str(a).unwrap()));
/// ```
/// This means that round trips with [Display] and [FromStr] are possible.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Coordinate {
	#[serde(rename = "groupId")]
	pub group: String,
	#[serde(rename = "artifactId")]
	pub artifact: String,
	/// May be a concrete version or a range constraint; the version range resolver decides.
	pub version: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub classifier: Option<String>,
	#[serde(default = "jar")]
	pub extension: String,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub properties: BTreeMap<String, String>,
}

impl Coordinate {
	/// Takes a `group`, `artifact` and `version` and constructs one, with no classifier and extension `jar`.
	///
	/// This is the default for any artifact that doesn't declare a custom extension or classifier.
	pub fn from_group_artifact_version(group: &str, artifact: &str, version: &str) -> Coordinate {
		Coordinate {
			group: group.to_owned(),
			artifact: artifact.to_owned(),
			version: version.to_owned(),
			classifier: None,
			extension: jar(),
			properties: BTreeMap::new(),
		}
	}

	/// The same coordinate with another version.
	pub fn with_version(&self, version: &str) -> Coordinate {
		Coordinate {
			version: version.to_owned(),
			..self.clone()
		}
	}

	/// The versionless key of this coordinate, which gates cycles and management matching.
	pub fn path_key(&self) -> PathKey {
		PathKey {
			group: self.group.clone(),
			artifact: self.artifact.clone(),
			classifier: self.classifier.clone(),
			extension: self.extension.clone(),
		}
	}
}

// identity is the five coordinate fields; properties are carried along but never compared
impl PartialEq for Coordinate {
	fn eq(&self, other: &Self) -> bool {
		self.group == other.group &&
			self.artifact == other.artifact &&
			self.version == other.version &&
			self.classifier == other.classifier &&
			self.extension == other.extension
	}
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.group.hash(state);
		self.artifact.hash(state);
		self.version.hash(state);
		self.classifier.hash(state);
		self.extension.hash(state);
	}
}

impl Display for Coordinate {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{group}:{artifact}:{extension}{classifier_colon}{classifier}:{version}",
			group = self.group,
			artifact = self.artifact,
			extension = self.extension,
			classifier_colon = if self.classifier.is_some() { ":" } else { "" },
			classifier = self.classifier.as_deref().unwrap_or(""),
			version = self.version,
		)
	}
}

impl FromStr for Coordinate {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let fields: Vec<&str> = s.split(':').collect();

		let (group, artifact, extension, classifier, version) = match fields[..] {
			[group, artifact, version] => (group, artifact, None, None, version),
			[group, artifact, extension, version] => (group, artifact, Some(extension), None, version),
			[group, artifact, extension, classifier, version] => (group, artifact, Some(extension), Some(classifier), version),
			_ => bail!("expected `group:artifact[:extension[:classifier]]:version`, got {s:?}"),
		};

		Ok(Coordinate {
			group: group.to_owned(),
			artifact: artifact.to_owned(),
			version: version.to_owned(),
			classifier: classifier.map(|x| x.to_owned()),
			extension: extension.unwrap_or("jar").to_owned(),
			properties: BTreeMap::new(),
		})
	}
}

/// A versionless [Coordinate].
///
/// Two dependencies with equal path keys are the "same" artifact for cycle truncation and for
/// dependency management matching, no matter which versions they name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathKey {
	pub group: String,
	pub artifact: String,
	pub classifier: Option<String>,
	pub extension: String,
}

impl PathKey {
	pub fn new(group: &str, artifact: &str) -> PathKey {
		PathKey {
			group: group.to_owned(),
			artifact: artifact.to_owned(),
			classifier: None,
			extension: jar(),
		}
	}
}

impl Display for PathKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{group}:{artifact}:{extension}{classifier_colon}{classifier}",
			group = self.group,
			artifact = self.artifact,
			extension = self.extension,
			classifier_colon = if self.classifier.is_some() { ":" } else { "" },
			classifier = self.classifier.as_deref().unwrap_or(""),
		)
	}
}
