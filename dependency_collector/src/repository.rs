use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A remote repository that descriptors and version metadata can be read from.
///
/// Repositories are identified by `id`; two entries with the same id are the same repository no
/// matter their urls, and merging keeps the first-seen entry (so credentials supplied with the
/// request are never shadowed by a descriptor-declared repository reusing the id).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteRepository {
	pub id: String,
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authentication: Option<Authentication>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub proxy: Option<Proxy>,
}

impl RemoteRepository {
	pub fn new(id: &str, url: &str) -> RemoteRepository {
		RemoteRepository {
			id: id.to_owned(),
			url: url.to_owned(),
			authentication: None,
			proxy: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Authentication {
	pub username: String,
	pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Proxy {
	pub host: String,
	pub port: u16,
}

/// Combines repository lists across the traversal path.
///
/// The engine calls this once per descriptor to make the descriptor-declared repositories
/// visible to descendant reads, without ever narrowing the accumulated list.
pub trait RepositoryMerger {
	/// Order preserving: `base` first, then the unseen `additions`, deduplicated by id.
	/// On an id conflict the `base` entry wins, authentication and proxy included.
	fn merge(&self, base: &[RemoteRepository], additions: &[RemoteRepository]) -> Vec<RemoteRepository>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRepositoryMerger;

impl RepositoryMerger for DefaultRepositoryMerger {
	fn merge(&self, base: &[RemoteRepository], additions: &[RemoteRepository]) -> Vec<RemoteRepository> {
		let mut merged: IndexMap<&str, &RemoteRepository> = IndexMap::new();

		for repository in base.iter().chain(additions) {
			merged.entry(&repository.id).or_insert(repository);
		}

		merged.into_values().cloned().collect()
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::repository::{Authentication, DefaultRepositoryMerger, RemoteRepository, RepositoryMerger};

	fn repo(id: &str) -> RemoteRepository {
		RemoteRepository::new(id, &format!("invalid://maven.example.org/{id}"))
	}

	#[test]
	fn merge_keeps_first_seen_order() {
		let base = [repo("central"), repo("snapshots")];
		let additions = [repo("project"), repo("central")];

		let merged = DefaultRepositoryMerger.merge(&base, &additions);

		assert_eq!(merged.iter().map(|x| x.id.as_str()).collect::<Vec<_>>(), ["central", "snapshots", "project"]);
	}

	#[test]
	fn merge_base_wins_on_id_conflict() {
		let authenticated = RemoteRepository {
			authentication: Some(Authentication {
				username: "deploy".to_owned(),
				password: "hunter2".to_owned(),
			}),
			..repo("central")
		};
		let imposter = RemoteRepository::new("central", "invalid://maven.example.com/other");

		let merged = DefaultRepositoryMerger.merge(&[authenticated.clone()], &[imposter]);

		assert_eq!(merged, [authenticated]);
	}

	#[test]
	fn merge_with_empty_sides() {
		let base = [repo("central")];
		assert_eq!(DefaultRepositoryMerger.merge(&base, &[]), base);
		assert_eq!(DefaultRepositoryMerger.merge(&[], &base), base);
		assert_eq!(DefaultRepositoryMerger.merge(&[], &[]), Vec::<RemoteRepository>::new());
	}
}
