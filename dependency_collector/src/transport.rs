use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::PathBuf;
use anyhow::Result;
use bytes::Bytes;

/// The transfer contract beneath descriptor readers and version resolvers.
///
/// The collection engine never speaks wire protocols itself; these are the interfaces its
/// collaborators are built on, so that readers stay swappable down to the transport.
/// A transporter is bound to one repository; `peek` checks existence without transferring,
/// `get` fetches into memory or a file (optionally resuming at an offset), `put` uploads from
/// memory or a file.
pub trait Transporter {
	// note: can't rewrite with async, bc of `+ Send`
	#[allow(clippy::manual_async_fn)]
	fn peek(&self, task: PeekTask) -> impl Future<Output = Result<()>> + Send;

	#[allow(clippy::manual_async_fn)]
	fn get(&self, task: GetTask<'_>) -> impl Future<Output = Result<GetResult>> + Send;

	#[allow(clippy::manual_async_fn)]
	fn put(&self, task: PutTask<'_>) -> impl Future<Output = Result<()>> + Send;

	/// Sorts an error of one of the other three calls into "the resource is not there" versus
	/// everything else. Callers probe with `peek`/`get` and use this to tell a miss from a
	/// failure.
	fn classify(&self, error: &anyhow::Error) -> TransportErrorKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
	NotFound,
	Other,
}

/// Existence check for a resource, no transfer.
#[derive(Debug, Clone)]
pub struct PeekTask {
	pub location: String,
}

impl PeekTask {
	pub fn new(location: &str) -> PeekTask {
		PeekTask { location: location.to_owned() }
	}
}

/// A download. The listener (if any) sees `started` once and `progressed` per chunk, and can
/// cancel at either point by returning an error.
pub struct GetTask<'a> {
	pub location: String,
	pub target: GetTarget,
	/// Skip this many bytes of the resource: resuming a partial previous transfer.
	pub resume_offset: u64,
	pub listener: Option<&'a mut dyn TransferListener>,
}

impl<'a> GetTask<'a> {
	pub fn new(location: &str, target: GetTarget) -> GetTask<'a> {
		GetTask {
			location: location.to_owned(),
			target,
			resume_offset: 0,
			listener: None,
		}
	}
}

#[derive(Debug, Clone)]
pub enum GetTarget {
	Memory,
	File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResult {
	/// The transferred bytes for [GetTarget::Memory]; `None` when they went to a file.
	pub data: Option<Bytes>,
}

/// An upload, from memory or from a file.
pub struct PutTask<'a> {
	pub location: String,
	pub source: PutSource,
	pub listener: Option<&'a mut dyn TransferListener>,
}

impl<'a> PutTask<'a> {
	pub fn new(location: &str, source: PutSource) -> PutTask<'a> {
		PutTask {
			location: location.to_owned(),
			source,
			listener: None,
		}
	}
}

#[derive(Debug, Clone)]
pub enum PutSource {
	Memory(Bytes),
	File(PathBuf),
}

/// What a [TransferListener] is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResource {
	pub location: String,
	/// The total size where the transporter knows it up front.
	pub size: Option<u64>,
	pub resume_offset: u64,
}

/// Observes one transfer. Returning an error from either callback cancels the transfer, which
/// then fails with [TransferCancelled] as the cause.
pub trait TransferListener: Send {
	fn started(&mut self, resource: &TransferResource) -> Result<()>;

	fn progressed(&mut self, resource: &TransferResource, transferred: u64) -> Result<()>;
}

/// The cause a cancelled transfer fails with; [Transporter::classify] sorts it as
/// [TransportErrorKind::Other].
#[derive(Debug)]
pub struct TransferCancelled {
	pub location: String,
	pub source: anyhow::Error,
}

impl TransferCancelled {
	/// Wraps the listener's refusal into the error the transfer fails with.
	pub fn new(location: &str, source: anyhow::Error) -> anyhow::Error {
		anyhow::Error::new(TransferCancelled { location: location.to_owned(), source })
	}
}

impl Display for TransferCancelled {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "transfer of {location:?} cancelled by the listener", location = self.location)
	}
}

impl std::error::Error for TransferCancelled {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(self.source.as_ref())
	}
}
