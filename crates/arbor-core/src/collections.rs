//! Hash map aliases used by the reconciler.
//!
//! The fast `rustc-hash` maps are the default; enabling the `std-hash`
//! feature swaps in the `std` hasher.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
}
