//! Object Handles
//!
//! Handles are generation-indexed slot-map keys. A handle whose object has
//! been destroyed keeps its stale generation, so it can never alias a newer
//! object occupying the same slot.

use slotmap::{Key, KeyData, new_key_type};
use smallvec::SmallVec;

new_key_type! {
    /// Opaque identifier of a backend-owned object.
    pub struct ObjectHandle;
}

impl ObjectHandle {
    /// Packs the handle into a single `u64` (index and generation), for logs
    /// and FFI-style diagnostics.
    #[inline]
    #[must_use]
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuilds a handle from [`to_bits`](Self::to_bits) output.
    #[inline]
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        Self::from(KeyData::from_ffi(bits))
    }
}

/// Handle list used for batches and event payloads. Most batches are small.
pub type HandleList = SmallVec<[ObjectHandle; 8]>;
