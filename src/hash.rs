//! Hash functions in the classic GLib shape.
//!
//! `StrHasher` is the djb2 string hash (`h = h * 33 + byte`, seeded with
//! 5381). `DirectHasher` passes integer keys through unchanged, which is
//! what a pointer/int/int64/double hash amounts to once keys are values
//! rather than addresses. Both produce values that fit the table's 32-bit
//! hash domain.

use core::hash::{BuildHasherDefault, Hasher};

/// djb2 over every byte written.
#[derive(Clone, Copy, Debug)]
pub struct StrHasher {
    h: u32,
}

impl Default for StrHasher {
    fn default() -> Self {
        Self { h: 5381 }
    }
}

impl Hasher for StrHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            // The byte is sign-extended: keys are hashed as C `char`.
            self.h = (self.h << 5)
                .wrapping_add(self.h)
                .wrapping_add(b as i8 as i32 as u32);
        }
    }

    // `str::hash` appends a 0xff terminator; skip it so the value matches
    // hashing the raw bytes.
    #[inline]
    fn write_u8(&mut self, i: u8) {
        if i != 0xff {
            self.write(&[i]);
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.h as u64
    }
}

/// Identity hash for integer keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectHasher {
    h: u64,
}

impl Hasher for DirectHasher {
    fn write(&mut self, bytes: &[u8]) {
        // Non-integer input: fold bytes in so the hasher stays total.
        for &b in bytes {
            self.h = self.h.rotate_left(8) ^ b as u64;
        }
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.h = i as u64;
    }

    #[inline]
    fn write_i32(&mut self, i: i32) {
        self.h = i as u32 as u64;
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.h = i as u32 as u64;
    }

    #[inline]
    fn write_i64(&mut self, i: i64) {
        self.h = i as u32 as u64;
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.h = i as u32 as u64;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.h
    }
}

pub type BuildStrHasher = BuildHasherDefault<StrHasher>;
pub type BuildDirectHasher = BuildHasherDefault<DirectHasher>;

/// Hash a float the way `double_hash` does: truncate to an integer.
#[inline]
pub fn double_hash(v: f64) -> u32 {
    v as i64 as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::{BuildHasher, Hash};

    fn djb2(s: &str) -> u32 {
        let mut h: u32 = 5381;
        for b in s.bytes() {
            h = h.wrapping_mul(33).wrapping_add(b as u32);
        }
        h
    }

    #[test]
    fn str_hasher_matches_djb2_for_ascii() {
        let b = BuildStrHasher::default();
        for s in ["", "a", "hello", "The quick brown fox"] {
            assert_eq!(b.hash_one(s), djb2(s) as u64, "{s:?}");
        }
    }

    #[test]
    fn str_hasher_agrees_between_str_and_string() {
        let b = BuildStrHasher::default();
        assert_eq!(b.hash_one("key"), b.hash_one("key".to_string()));
    }

    #[test]
    fn direct_hasher_is_identity_on_ints() {
        let b = BuildDirectHasher::default();
        assert_eq!(b.hash_one(42u32), 42);
        assert_eq!(b.hash_one(7i32), 7);
        assert_eq!(b.hash_one(-1i32), u32::MAX as u64);
        assert_eq!(b.hash_one(0x1_0000_0005u64), 5);
        let mut h = DirectHasher::default();
        9usize.hash(&mut h);
        assert_eq!(h.finish(), 9);
    }

    #[test]
    fn double_hash_truncates() {
        assert_eq!(double_hash(3.9), 3);
        assert_eq!(double_hash(-1.0), u32::MAX);
    }
}
