//! # Fixed-Width Records
//!
//! The atoms stored in tree nodes. A [`Key`] is an opaque byte buffer whose
//! width is fixed at index construction (`keysize`); a [`Value`] is the same
//! with `valuesize`. Keys order lexicographically over their bytes and
//! compare equal on byte-wise identity, which the derived `Ord`/`Eq` on the
//! inner `Vec<u8>` provides directly.
//!
//! The paired forms mirror the two slot layouts: [`KeyValuePair`] for leaf
//! slots, [`KeyPointerPair`] for interior slots (the pointer names a block in
//! the backing store).

/// Opaque fixed-width key, ordered lexicographically over its bytes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key(Vec<u8>);

impl Key {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Opaque fixed-width value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value(Vec<u8>);

impl Value {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A leaf slot record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValuePair {
    pub key: Key,
    pub value: Value,
}

impl KeyValuePair {
    pub fn new(key: Key, value: Value) -> Self {
        Self { key, value }
    }
}

/// An interior slot record: a separator key and the block number of the
/// child to its right.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPointerPair {
    pub key: Key,
    pub pointer: u64,
}

impl KeyPointerPair {
    pub fn new(key: Key, pointer: u64) -> Self {
        Self { key, pointer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_lexicographically() {
        let a = Key::new(b"AAAA");
        let b = Key::new(b"AAAB");
        let c = Key::new(b"B");

        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, Key::new(b"AAAA"));
    }

    #[test]
    fn key_order_is_unsigned_bytewise() {
        let lo = Key::new(&[0x01, 0x00]);
        let hi = Key::new(&[0xFF, 0x00]);

        assert!(lo < hi);
    }

    #[test]
    fn pairs_carry_their_parts() {
        let kv = KeyValuePair::new(Key::new(b"k"), Value::new(b"v"));
        assert_eq!(kv.key.as_bytes(), b"k");
        assert_eq!(kv.value.as_bytes(), b"v");

        let kp = KeyPointerPair::new(Key::new(b"k"), 7);
        assert_eq!(kp.pointer, 7);
    }
}
