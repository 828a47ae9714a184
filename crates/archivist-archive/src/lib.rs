#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! On-demand archive pipeline: resolve a directory, run the archiver in it and relay its
//! stdout in bounded chunks.
//! Layout: resolver.rs (identifier → directory), supervisor.rs (archiver lifecycle),
//! relay.rs (chunk pump), shutdown.rs (phases and active stream accounting), error.rs.

pub mod error;
pub mod relay;
pub mod resolver;
pub mod shutdown;
pub mod supervisor;

pub use error::{ArchiveError, ArchiveResult, CancelReason};
pub use relay::{
    BodyItem, ChannelWriter, ChunkWriter, DEFAULT_CHUNK_SIZE, RelaySettings, RelayStats, relay,
};
pub use resolver::{ArchiveRequest, DirectoryResolver};
pub use shutdown::{ActiveStreams, ShutdownController, ShutdownPhase, ShutdownWatch, StreamLease};
pub use supervisor::{
    ArchiveProcess, ArchiverCommand, DEFAULT_TERMINATE_GRACE, ProcessSupervisor, Termination,
};
