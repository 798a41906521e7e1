//! The data-item table (`spec.md` §3): a deduplicated array of runtime
//! handles referenced from emitted instructions via index. Pointer-tag
//! bits in the low-order bits of a handle distinguish handle kinds, but
//! the core itself never inspects them — it only deduplicates and hands
//! back indices.

use std::collections::HashMap;

#[derive(Default)]
pub struct DataItems {
    items: Vec<u64>,
    index: HashMap<u64, u32>,
}

impl DataItems {
    pub fn new() -> DataItems {
        DataItems::default()
    }

    /// Returns the existing index for `handle`, or appends it and
    /// returns the new index.
    pub fn intern(&mut self, handle: u64) -> u32 {
        if let Some(&idx) = self.index.get(&handle) {
            return idx;
        }
        let idx = self.items.len() as u32;
        self.items.push(handle);
        self.index.insert(handle, idx);
        idx
    }

    pub fn into_vec(self) -> Vec<u64> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates() {
        let mut items = DataItems::new();
        let a = items.intern(0xdead);
        let b = items.intern(0xbeef);
        let a2 = items.intern(0xdead);
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(items.len(), 2);
    }
}
