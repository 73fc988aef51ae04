//! Barrel Manager: fixed-width forward barrels keyed by document id and
//! contiguous, forward-growing posting barrels keyed by token id.
//!
//! Every barrel write is a whole-file replace through a temp file and a
//! rename, taken under a per-barrel lock, so concurrent readers only ever
//! see complete files.

mod forward;
mod io;
mod locks;
mod posting;
mod range;

pub use forward::{AppendOutcome, FetchResult, ForwardBarrel, ForwardBarrelStore, FORWARD_HEADER};
pub use locks::BarrelLocks;
pub use posting::{PostingBarrel, PostingBarrelStore, PostingLookup, POSTING_HEADER};
pub use range::{validate_contiguous, BarrelRange};
