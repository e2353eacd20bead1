//! Taper generation.
//!
//! Discrete prolate spheroidal sequences (Slepian tapers) and a process-wide
//! cache for them.

mod cache;
mod dpss;

pub use cache::{clear_taper_cache, dpss_windows_cached};
pub(crate) use cache::cached_tapers;
pub use dpss::*;
