use core::hash::BuildHasher;
use core::hash::Hash;

/// A stateless hashing strategy for elements of type `T`.
///
/// Tables never store a hasher instance: the hash of an element must be a
/// pure function of the element itself, and it must agree with `T`'s
/// equality (equal elements produce equal hashes).
///
/// # Examples
///
/// ```rust
/// use tomb_hash::hash::ElementHasher;
/// use tomb_hash::hash_table::HashTable;
///
/// struct ModuloHasher;
///
/// impl ElementHasher<u32> for ModuloHasher {
///     fn get_hash(element: &u32) -> u64 {
///         u64::from(*element).wrapping_mul(0x9E37_79B9_7F4A_7C15)
///     }
/// }
///
/// let mut table: HashTable<u32, ModuloHasher> = HashTable::new();
/// table.add(7);
/// assert!(table.contains(&7));
/// ```
pub trait ElementHasher<T: ?Sized> {
    /// Computes the 64-bit hash of `element`.
    fn get_hash(element: &T) -> u64;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        type DefaultBuildHasher = foldhash::fast::FixedState;
    } else if #[cfg(feature = "std")] {
        type DefaultBuildHasher =
            std::hash::BuildHasherDefault<std::collections::hash_map::DefaultHasher>;
    } else {
        type DefaultBuildHasher = core::hash::BuildHasherDefault<FnvHasher>;

        /// Fowler-Noll-Vo (FNV-1a) hasher used when neither `foldhash` nor
        /// `std` is available.
        #[derive(Debug, Clone, Copy)]
        pub struct FnvHasher {
            hash: u64,
        }

        impl FnvHasher {
            const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
            const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
        }

        impl Default for FnvHasher {
            fn default() -> Self {
                Self {
                    hash: Self::FNV_OFFSET_BASIS,
                }
            }
        }

        impl core::hash::Hasher for FnvHasher {
            fn finish(&self) -> u64 {
                self.hash
            }

            fn write(&mut self, bytes: &[u8]) {
                for byte in bytes {
                    self.hash ^= u64::from(*byte);
                    self.hash = self.hash.wrapping_mul(Self::FNV_PRIME);
                }
            }
        }
    }
}

/// The default hashing strategy, usable for any `T: Hash`.
///
/// The backend is chosen at compile time and is always deterministic: the
/// same element hashes to the same value in every table and every run.
/// - `foldhash` feature: `foldhash::fast::FixedState`.
/// - `std` without `foldhash`: the standard library's SipHash with zero keys.
/// - neither: FNV-1a.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHasher;

impl<T: Hash + ?Sized> ElementHasher<T> for DefaultHasher {
    #[inline]
    fn get_hash(element: &T) -> u64 {
        DefaultBuildHasher::default().hash_one(element)
    }
}
