//! Client-side trace view state.
//!
//! ARCHITECTURE
//! ============
//! `trace` holds the synchronous navigation controller. `navigation` carries
//! the one-shot "open this trace" token other views hand over.

pub mod navigation;
pub mod trace;
