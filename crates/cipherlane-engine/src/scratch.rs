//! Handle lifetime for engine computations
//!
//! A formula allocates a handful of intermediate ciphertexts for every value
//! it returns. `Scratch` wraps the backend for one computation, remembers
//! every handle it produced and releases all but the outputs when finished.
//! `Memo` keeps the latest result per read-only query so that repeating a
//! query does not allocate again until the underlying state changes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use cipherlane_core::{Ciphertext, EncryptedAlu, EncryptedBool, Handle, LaneConfig};

use crate::analytics::EncryptedValue;

/// Handles a computed value keeps alive
pub trait Outputs {
    fn handles(&self) -> Vec<Handle>;
}

impl Outputs for Ciphertext {
    fn handles(&self) -> Vec<Handle> {
        vec![self.handle()]
    }
}

impl Outputs for EncryptedBool {
    fn handles(&self) -> Vec<Handle> {
        vec![self.handle()]
    }
}

impl Outputs for EncryptedValue {
    fn handles(&self) -> Vec<Handle> {
        match self {
            EncryptedValue::Uint(ct) => ct.handles(),
            EncryptedValue::Bool(b) => b.handles(),
        }
    }
}

impl Outputs for LaneConfig {
    fn handles(&self) -> Vec<Handle> {
        self.reveal_handles().iter().map(Ciphertext::handle).collect()
    }
}

/// Backend wrapper that tracks every handle produced through it
pub struct Scratch<'a> {
    alu: &'a dyn EncryptedAlu,
    produced: Mutex<Vec<Handle>>,
}

impl<'a> Scratch<'a> {
    pub fn new(alu: &'a dyn EncryptedAlu) -> Self {
        Self {
            alu,
            produced: Mutex::new(Vec::new()),
        }
    }

    /// Release every tracked handle except those in `keep`
    pub fn finish(self, keep: &[Handle]) {
        let produced = self.produced.into_inner().unwrap_or_else(PoisonError::into_inner);
        let dropped: Vec<Handle> = produced.into_iter().filter(|h| !keep.contains(h)).collect();
        self.alu.release(&dropped);
    }

    fn track(&self, handle: Handle) -> Handle {
        self.produced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        handle
    }

    fn uint(&self, ct: Ciphertext) -> Ciphertext {
        Ciphertext::from_handle(self.track(ct.handle()))
    }

    fn flag(&self, b: EncryptedBool) -> EncryptedBool {
        EncryptedBool::from_handle(self.track(b.handle()))
    }
}

impl EncryptedAlu for Scratch<'_> {
    fn constant(&self, value: u32) -> Ciphertext {
        self.alu.constant(value)
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        self.uint(self.alu.add(a, b))
    }

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        self.uint(self.alu.sub(a, b))
    }

    fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        self.uint(self.alu.mul(a, b))
    }

    fn div(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        self.uint(self.alu.div(a, b))
    }

    fn abs(&self, a: &Ciphertext) -> Ciphertext {
        self.uint(self.alu.abs(a))
    }

    fn gt(&self, a: &Ciphertext, b: &Ciphertext) -> EncryptedBool {
        self.flag(self.alu.gt(a, b))
    }

    fn lt(&self, a: &Ciphertext, b: &Ciphertext) -> EncryptedBool {
        self.flag(self.alu.lt(a, b))
    }

    fn and(&self, a: &EncryptedBool, b: &EncryptedBool) -> EncryptedBool {
        self.flag(self.alu.and(a, b))
    }

    fn or(&self, a: &EncryptedBool, b: &EncryptedBool) -> EncryptedBool {
        self.flag(self.alu.or(a, b))
    }

    fn select(&self, cond: &EncryptedBool, if_true: &Ciphertext, if_false: &Ciphertext) -> Ciphertext {
        self.uint(self.alu.select(cond, if_true, if_false))
    }

    fn release(&self, handles: &[Handle]) {
        self.alu.release(handles)
    }
}

/// Latest result per query key, tagged with the state revision it was computed at
pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, (u64, V)>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Outputs + Clone> Memo<K, V> {
    /// Cached value for `key` if it was computed at `revision`, otherwise a
    /// fresh one; the superseded value's handles are released
    pub fn get_or_compute(
        &self,
        alu: &dyn EncryptedAlu,
        key: K,
        revision: u64,
        compute: impl FnOnce() -> V,
    ) -> V {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((at, value)) = entries.get(&key) {
            if *at == revision {
                return value.clone();
            }
        }

        let value = compute();
        if let Some((_, stale)) = entries.insert(key, (revision, value.clone())) {
            alu.release(&stale.handles());
        }
        value
    }
}
