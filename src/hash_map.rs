use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::Index;
use core::ops::IndexMut;

use crate::hash::DefaultHasher;
use crate::hash::ElementHasher;
use crate::hash_table::HashTable;
use crate::hash_table::InsertResult;
use crate::hash_table::RemoveResult;
use crate::hash_table::Slot;

/// The storage unit of a [`HashMap`]: a key and its value, constructed and
/// destroyed together.
///
/// Equality and hashing consider the key only.
#[derive(Clone)]
pub struct Bucket<K, V> {
    key: K,
    value: V,
}

impl<K, V> Bucket<K, V> {
    /// Returns the key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the value mutably.
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Splits the bucket into its key and value.
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K: PartialEq, V> PartialEq for Bucket<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq, V> Eq for Bucket<K, V> {}

impl<K: Debug, V: Debug> Debug for Bucket<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Bucket")
            .field(&self.key)
            .field(&self.value)
            .finish()
    }
}

/// Hashes a [`Bucket`] by its key with the key hasher `H`.
pub struct BucketHasher<H>(PhantomData<fn() -> H>);

impl<K, V, H> ElementHasher<Bucket<K, V>> for BucketHasher<H>
where
    H: ElementHasher<K>,
{
    #[inline]
    fn get_hash(bucket: &Bucket<K, V>) -> u64 {
        H::get_hash(&bucket.key)
    }
}

/// A key-value map stored in a [`HashTable`] of [`Bucket`]s.
///
/// Lookups probe the table with the key's hash and a key-only comparison, so
/// no placeholder value is ever constructed to search for a key.
///
/// # Performance Characteristics
///
/// - **Memory**: 1 byte per slot overhead, plus the size of `(K, V)`.
///
/// # Examples
///
/// ```rust
/// use tomb_hash::HashMap;
///
/// let mut bindings: HashMap<String, u32> = HashMap::new();
/// *bindings.get_or_add("gbuffer.albedo".to_string()) = 3;
/// bindings.add("gbuffer.normal".to_string(), 4);
///
/// assert_eq!(*bindings.at(&"gbuffer.albedo".to_string()), 3);
/// assert_eq!(bindings.get_if_exists(&"depth".to_string()), None);
/// ```
pub struct HashMap<K, V, H = DefaultHasher> {
    table: HashTable<Bucket<K, V>, BucketHasher<H>>,
}

impl<K, V, H> Debug for HashMap<K, V, H>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, H> Clone for HashMap<K, V, H>
where
    K: Clone,
    V: Clone,
    H: ElementHasher<K>,
{
    /// Copies the entries into a new map sized for exactly the current
    /// number of entries.
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K, V, H> Default for HashMap<K, V, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> HashMap<K, V, H> {
    /// Creates an empty map without allocating.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let map: HashMap<u32, String> = HashMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub const fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }

    /// Creates an empty map that can hold at least `capacity` entries
    /// without reallocating.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let map: HashMap<u32, String> = HashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the total number of allocated slots.
    pub fn slot_count(&self) -> usize {
        self.table.slot_count()
    }

    /// Returns the number of entries the map can hold before it grows.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes every entry, keeping the allocation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut map: HashMap<u32, u32> = (0..10).map(|k| (k, k)).collect();
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert!(map.capacity() >= 10);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Removes every entry and releases the allocation.
    pub fn clear_and_shrink(&mut self) {
        self.table.clear_and_shrink();
    }

    /// Returns an iterator over the entries in arbitrary order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let map: HashMap<u32, u32> = (1..=3).map(|k| (k, k * 10)).collect();
    /// let mut entries: Vec<(u32, u32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    /// entries.sort();
    /// assert_eq!(entries, [(1, 10), (2, 20), (3, 30)]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the entries with mutable access to the values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut map: HashMap<u32, u32> = (1..=3).map(|k| (k, k)).collect();
    /// for (_, value) in map.iter_mut() {
    ///     *value *= 2;
    /// }
    /// assert_eq!(*map.at(&3), 6);
    /// ```
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes every entry, yielding them by value. The allocation is kept.
    pub fn drain(&mut self) -> Drain<'_, K, V, H> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<K, V, H> HashMap<K, V, H>
where
    K: Eq,
    H: ElementHasher<K>,
{
    fn find_index(&self, key: &K) -> Option<usize> {
        self.table
            .find_by_hash(H::get_hash(key), |bucket| bucket.key == *key)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.find_index(key).is_some()
    }

    /// Returns the value stored for `key`, if any.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut map: HashMap<u32, &str> = HashMap::new();
    /// map.add(1, "one");
    /// assert_eq!(map.get_if_exists(&1), Some(&"one"));
    /// assert_eq!(map.get_if_exists(&2), None);
    /// ```
    pub fn get_if_exists(&self, key: &K) -> Option<&V> {
        let index = self.find_index(key)?;
        self.table.element_at(index).map(Bucket::value)
    }

    /// Returns the value stored for `key` mutably, if any.
    pub fn get_if_exists_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.find_index(key)?;
        // SAFETY: `find_index` only returns occupied slots.
        Some(unsafe { &mut self.table.element_at_unchecked_mut(index).value })
    }

    /// Returns the value stored for `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut map: HashMap<u32, u32> = HashMap::new();
    /// map.add(75, 150);
    /// assert_eq!(*map.at(&75), 150);
    /// ```
    pub fn at(&self, key: &K) -> &V {
        match self.get_if_exists(key) {
            Some(value) => value,
            None => panic!("key is not present in the hash map"),
        }
    }

    /// Returns the value stored for `key` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not present.
    pub fn at_mut(&mut self, key: &K) -> &mut V {
        match self.get_if_exists_mut(key) {
            Some(value) => value,
            None => panic!("key is not present in the hash map"),
        }
    }

    /// Locates `key`, or prepares the slot it will be inserted into.
    fn find_or_prepare_insert(&mut self, hash: u64, key: &K) -> Slot {
        self.table
            .find_or_prepare_insert(hash, |bucket| bucket.key == *key)
    }

    /// Returns the value stored for `key`, inserting `V::default()` first if
    /// the key is missing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut counts: HashMap<&str, u32> = HashMap::new();
    /// *counts.get_or_add("draw_calls") += 1;
    /// *counts.get_or_add("draw_calls") += 1;
    /// assert_eq!(*counts.at(&"draw_calls"), 2);
    /// ```
    pub fn get_or_add(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_add_with(key, V::default)
    }

    /// Returns the value stored for `key`, inserting `default()` first if the
    /// key is missing. `default` is only called for a missing key.
    pub fn get_or_add_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        let hash = H::get_hash(&key);
        match self.find_or_prepare_insert(hash, &key) {
            // SAFETY: The index comes from a probe of the current allocation.
            Slot::Occupied(index) => unsafe {
                &mut self.table.element_at_unchecked_mut(index).value
            },
            Slot::Vacant(index) => {
                let bucket = Bucket {
                    key,
                    value: default(),
                };
                // SAFETY: The slot was prepared for `hash` and nothing has
                // touched the table since.
                unsafe { &mut self.table.write_slot(index, hash, bucket).value }
            }
        }
    }

    /// Inserts an entry for a key that is known not to be present.
    ///
    /// Adding a key that is already present is a logic error caught by a
    /// debug assertion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut map: HashMap<u32, &str> = HashMap::new();
    /// *map.add(1, "one") = "uno";
    /// assert_eq!(*map.at(&1), "uno");
    /// ```
    pub fn add(&mut self, key: K, value: V) -> &mut V {
        debug_assert!(!self.contains(&key), "key is already present in the hash map");

        let hash = H::get_hash(&key);
        let index = self.table.prepare_insert(hash);
        // SAFETY: The slot was just prepared for `hash`.
        unsafe { &mut self.table.write_slot(index, hash, Bucket { key, value }).value }
    }

    /// Inserts the entry unless `key` is already present, in which case the
    /// map is unchanged and `value` is dropped.
    pub fn add_if_not_existing(&mut self, key: K, value: V) -> InsertResult {
        let hash = H::get_hash(&key);
        match self.find_or_prepare_insert(hash, &key) {
            Slot::Occupied(_) => InsertResult::EntryAlreadyExists,
            Slot::Vacant(index) => {
                // SAFETY: The slot was just prepared for `hash`.
                unsafe {
                    self.table.write_slot(index, hash, Bucket { key, value });
                }
                InsertResult::InsertedNewEntry
            }
        }
    }

    /// Inserts or overwrites the value for `key`, returning the previous
    /// value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut map: HashMap<u32, &str> = HashMap::new();
    /// assert_eq!(map.insert(1, "a"), None);
    /// assert_eq!(map.insert(1, "b"), Some("a"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = H::get_hash(&key);
        match self.find_or_prepare_insert(hash, &key) {
            Slot::Occupied(index) => {
                // SAFETY: The index comes from a probe of the current allocation.
                let stored = unsafe { self.table.element_at_unchecked_mut(index) };
                Some(core::mem::replace(&mut stored.value, value))
            }
            Slot::Vacant(index) => {
                // SAFETY: The slot was just prepared for `hash`.
                unsafe {
                    self.table.write_slot(index, hash, Bucket { key, value });
                }
                None
            }
        }
    }

    /// Removes the entry for a key that is known to be present.
    ///
    /// Removing a missing key is a logic error caught by a debug assertion;
    /// in release builds it does nothing.
    pub fn remove(&mut self, key: &K) {
        let result = self.remove_if_exists(key);
        debug_assert_eq!(
            result,
            RemoveResult::RemovedExistingEntry,
            "key is not present in the hash map"
        );
    }

    /// Removes the entry for `key`, if there is one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// # use tomb_hash::hash_table::RemoveResult;
    /// let mut map: HashMap<u32, u32> = (0..4).map(|k| (k, k)).collect();
    /// assert_eq!(map.remove_if_exists(&2), RemoveResult::RemovedExistingEntry);
    /// assert_eq!(map.remove_if_exists(&2), RemoveResult::EntryDoesNotExist);
    /// ```
    pub fn remove_if_exists(&mut self, key: &K) -> RemoveResult {
        match self.take_entry(key) {
            Some(_) => RemoveResult::RemovedExistingEntry,
            None => RemoveResult::EntryDoesNotExist,
        }
    }

    /// Removes the entry for `key` and returns its value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.take_entry(key).map(|(_, value)| value)
    }

    /// Removes the entry for `key` and returns the stored key and value.
    pub fn take_entry(&mut self, key: &K) -> Option<(K, V)> {
        let index = self.find_index(key)?;
        // SAFETY: `find_index` only returns occupied slots.
        Some(unsafe { self.table.take_slot(index) }.into_parts())
    }

    /// Reserves room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Rebuilds the map into the smallest allocation that holds its entries.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }
}

impl<K, V, H> PartialEq for HashMap<K, V, H>
where
    K: Eq,
    V: PartialEq,
    H: ElementHasher<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get_if_exists(key) == Some(value))
    }
}

impl<K, V, H> Eq for HashMap<K, V, H>
where
    K: Eq,
    V: Eq,
    H: ElementHasher<K>,
{
}

impl<K, V, H> Index<&K> for HashMap<K, V, H>
where
    K: Eq,
    H: ElementHasher<K>,
{
    type Output = V;

    /// Same as [`HashMap::at`].
    fn index(&self, key: &K) -> &V {
        self.at(key)
    }
}

impl<K, V, H> IndexMut<&K> for HashMap<K, V, H>
where
    K: Eq + Clone,
    V: Default,
    H: ElementHasher<K>,
{
    /// Same as [`HashMap::get_or_add`]: a missing key is inserted with
    /// `V::default()`. The key is only cloned when it is inserted.
    ///
    /// ```rust
    /// # use tomb_hash::HashMap;
    /// let mut pressed: HashMap<u32, bool> = HashMap::new();
    /// pressed[&32] = true;
    /// assert!(pressed[&32]);
    /// ```
    fn index_mut(&mut self, key: &K) -> &mut V {
        let hash = H::get_hash(key);
        match self.find_or_prepare_insert(hash, key) {
            // SAFETY: The index comes from a probe of the current allocation.
            Slot::Occupied(index) => unsafe {
                &mut self.table.element_at_unchecked_mut(index).value
            },
            Slot::Vacant(index) => {
                let bucket = Bucket {
                    key: key.clone(),
                    value: V::default(),
                };
                // SAFETY: The slot was prepared for `hash` and nothing has
                // touched the table since.
                unsafe { &mut self.table.write_slot(index, hash, bucket).value }
            }
        }
    }
}

impl<K, V, H> FromIterator<(K, V)> for HashMap<K, V, H>
where
    K: Eq,
    H: ElementHasher<K>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, H> Extend<(K, V)> for HashMap<K, V, H>
where
    K: Eq,
    H: ElementHasher<K>,
{
    /// Inserts every entry, overwriting the values of keys already present.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let additional = if self.is_empty() {
            iter.size_hint().0
        } else {
            iter.size_hint().0.div_ceil(2)
        };
        self.reserve(additional);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V, H> IntoIterator for &'a HashMap<K, V, H> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, H> IntoIterator for &'a mut HashMap<K, V, H> {
    type IntoIter = IterMut<'a, K, V>;
    type Item = (&'a K, &'a mut V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, H> IntoIterator for HashMap<K, V, H> {
    type IntoIter = IntoIter<K, V, H>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

/// An iterator over the key-value pairs of a `HashMap`.
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, Bucket<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|bucket| (&bucket.key, &bucket.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// An iterator over the key-value pairs of a `HashMap` with mutable values.
pub struct IterMut<'a, K, V> {
    inner: crate::hash_table::IterMut<'a, Bucket<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|bucket| {
            let Bucket { key, value } = bucket;
            (&*key, value)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}

/// An iterator over mutable references to the values of a `HashMap`.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the key-value pairs of a `HashMap`.
pub struct Drain<'a, K, V, H = DefaultHasher> {
    inner: crate::hash_table::Drain<'a, Bucket<K, V>, BucketHasher<H>>,
}

impl<K, V, H> Iterator for Drain<'_, K, V, H> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Bucket::into_parts)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, H> ExactSizeIterator for Drain<'_, K, V, H> {}

impl<K, V, H> FusedIterator for Drain<'_, K, V, H> {}

/// An owning iterator over the key-value pairs of a `HashMap`.
pub struct IntoIter<K, V, H = DefaultHasher> {
    inner: crate::hash_table::IntoIter<Bucket<K, V>, BucketHasher<H>>,
}

impl<K, V, H> Iterator for IntoIter<K, V, H> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Bucket::into_parts)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, H> ExactSizeIterator for IntoIter<K, V, H> {}

impl<K, V, H> FusedIterator for IntoIter<K, V, H> {}
