//! The dependency collection engine of an artifact repository resolver.
//!
//! Given one or more root dependencies, [collector::Collector::collect_dependencies]
//! transitively discovers every reachable dependency by reading each artifact's descriptor,
//! applies version, scope, optional and exclusion management along the path, truncates cycles,
//! and produces a deterministic, ordered [graph::Node] tree. Metadata only: nothing here
//! downloads artifact binaries.
//!
//! The external collaborators stay abstract: a [descriptor::DescriptorReader] fetches and
//! parses one descriptor, a [version::VersionRangeResolver] expands a version constraint, a
//! [repository::RepositoryMerger] combines repository lists along the path, and underneath the
//! readers sits the [transport::Transporter] surface.

pub mod collector;
pub mod coord;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod manager;
pub mod repository;
pub mod transport;
pub mod version;

pub use collector::{CancellationToken, CollectRequest, CollectResult, Collector, Session};
pub use coord::{Coordinate, PathKey};
pub use dependency::{Dependency, Exclusion};
pub use descriptor::{Descriptor, DescriptorReader};
pub use error::{CollectError, CollectErrorKind, DependencyCollectionError};
pub use graph::Node;
pub use manager::DependencyManager;
pub use repository::{RemoteRepository, RepositoryMerger};
pub use version::VersionRangeResolver;
