//! snaplink: deduplicating file-tree replicator
//!
//! Given a source tree and a reference tree that plausibly shares many
//! regular files with it, snaplink produces (or edits in place) a
//! destination tree whose contents equal the source, but in which every
//! regular file that is byte-for-byte and metadata-identical to its
//! reference counterpart is a hard link into the reference tree rather
//! than an independent copy. Incremental snapshots of a hierarchy then
//! cost only the storage of the files that actually changed.
//!
//! The engine is a synchronized walk over up to three directory handles
//! (source, destination, reference) using handle-relative `*at` syscalls
//! throughout: see [`walker`] for the decision engine, [`compare`] for
//! the equality oracle, [`materialize`] for the copy/link/recreate
//! primitives, and [`gate`] for the failure-mask policy that decides
//! which operation failures warn and which abort.

pub mod cli;
pub mod compare;
pub mod dirfd;
pub mod error;
pub mod gate;
pub mod materialize;
pub mod metadata;
pub mod stats;
pub mod trail;
pub mod walker;
pub mod xattrs;

pub use error::{LinkError, Result};
pub use gate::FailMask;
pub use stats::RunStats;
pub use walker::{replicate, OpMode, Options};
