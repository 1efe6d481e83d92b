use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::hash::DefaultHasher;
use crate::hash::ElementHasher;

/// Set on every metadata byte whose slot does not hold a live element.
const AVAILABLE_BIT: u8 = 0b1000_0000;
/// The slot has never held an element since the last clear or rehash. Ends a
/// probe sequence.
const NEVER_USED: u8 = 0b1000_0000;
/// The slot held an element that was removed. Probes continue past it.
const TOMBSTONE: u8 = 0b1100_0000;

const LOW_HASH_BITS: u32 = 7;
const LOW_HASH_MASK: u64 = (1 << LOW_HASH_BITS) - 1;

const MAX_LOAD_FACTOR_PERCENT: u128 = 75;

/// The number of elements `slot_count` slots may hold before the table must
/// grow.
#[inline]
fn max_occupied(slot_count: usize) -> usize {
    ((slot_count as u128 * MAX_LOAD_FACTOR_PERCENT) / 100) as usize
}

/// The smallest slot count that holds `required` elements under the maximum
/// load factor.
#[inline]
pub(crate) fn minimal_slot_count(required: usize) -> usize {
    usize::try_from((required as u128 * 100) / MAX_LOAD_FACTOR_PERCENT)
        .ok()
        .and_then(|slot_count| slot_count.checked_add(1))
        .expect("capacity overflow")
}

#[inline(always)]
fn low_hash(hash: u64) -> u8 {
    (hash & LOW_HASH_MASK) as u8
}

#[inline(always)]
fn is_available(metadata: u8) -> bool {
    metadata & AVAILABLE_BIT != 0
}

/// The outcome of [`HashTable::add_if_not_existing`] and
/// [`HashMap::add_if_not_existing`](crate::hash_map::HashMap::add_if_not_existing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertResult {
    /// The element was not present and has been inserted.
    InsertedNewEntry,
    /// An equal element was already present; the table is unchanged.
    EntryAlreadyExists,
}

/// The outcome of [`HashTable::remove_if_exists`] and
/// [`HashMap::remove_if_exists`](crate::hash_map::HashMap::remove_if_exists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoveResult {
    /// The element was present and has been destroyed.
    RemovedExistingEntry,
    /// No equal element was present; the table is unchanged.
    EntryDoesNotExist,
}

/// Result of a probe that either locates an element or the slot it would be
/// inserted into.
enum Probe {
    Found(usize),
    /// First tombstone or never-used slot on the probe sequence, if any.
    Vacant(Option<usize>),
}

/// A slot located by [`HashTable::find_or_prepare_insert`].
pub(crate) enum Slot {
    Occupied(usize),
    /// Ready to be written with [`HashTable::write_slot`]; no reallocation
    /// may happen before the write.
    Vacant(usize),
}

#[derive(Debug)]
struct DataLayout {
    layout: Layout,
    metadata_offset: usize,
}

impl DataLayout {
    const EMPTY: Self = DataLayout {
        layout: Layout::new::<()>(),
        metadata_offset: 0,
    };

    fn new<T>(slot_count: usize) -> Self {
        let slots_layout =
            Layout::array::<MaybeUninit<T>>(slot_count).expect("allocation size overflow");
        let metadata_layout = Layout::array::<u8>(slot_count).expect("allocation size overflow");

        let (layout, metadata_offset) = slots_layout
            .extend(metadata_layout)
            .expect("allocation size overflow");

        DataLayout {
            layout: layout.pad_to_align(),
            metadata_offset,
        }
    }
}

/// Slot occupancy and memory statistics for a [`HashTable`].
///
/// Available with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Slots holding a live element.
    pub occupied_slots: usize,
    /// Slots holding a tombstone.
    pub tombstone_slots: usize,
    /// Slots that have never been used since the last clear or rehash.
    pub never_used_slots: usize,
    /// Total number of slots allocated.
    pub slot_count: usize,
    /// Elements the table can hold before it grows.
    pub capacity: usize,
    /// Load factor (occupied_slots / slot_count).
    pub load_factor: f64,
    /// Longest distance between an element and its home slot.
    pub max_probe_length: usize,
    /// Total memory in bytes used by the table.
    pub total_bytes: usize,
    /// Bytes spent on slots that do not hold a live element.
    pub wasted_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.occupied_slots,
            self.slot_count,
            self.load_factor * 100.0
        );
        println!(
            "Slots: {} occupied, {} tombstones, {} never used (capacity {})",
            self.occupied_slots, self.tombstone_slots, self.never_used_slots, self.capacity
        );
        println!("Longest probe: {}", self.max_probe_length);
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// Distribution of the distance between each element and its home slot.
///
/// `counts[d]` is the number of elements stored `d` slots after their home
/// slot. Available with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    /// Element count per probe distance.
    pub counts: alloc::vec::Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// Total number of elements in the histogram.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Longest probe distance with at least one element.
    pub fn max_probe_length(&self) -> usize {
        self.counts.iter().rposition(|count| *count != 0).unwrap_or(0)
    }

    /// Pretty-print the histogram as a bar chart.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.counts.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!("probe histogram ({} entries):", self.total());

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = match units % 8 {
                0 => None,
                1 => Some('▏'),
                2 => Some('▎'),
                3 => Some('▍'),
                4 => Some('▌'),
                5 => Some('▋'),
                6 => Some('▊'),
                _ => Some('▉'),
            };
            bar.extend(partial);
            bar
        };

        for (distance, &count) in self.counts.iter().enumerate() {
            println!("{:>3} | {} ({})", distance, make_bar(count), count);
        }
    }
}

/// An open-addressing hash table with linear probing and tombstones.
///
/// `HashTable<T, H>` stores elements of type `T` in a single allocation: the
/// element slots followed by one metadata byte per slot. The metadata byte of
/// an occupied slot caches the low 7 bits of the element's hash, so most
/// mismatches during a probe are rejected without comparing elements. Removed
/// elements leave a tombstone, which keeps later elements of the same probe
/// sequence reachable.
///
/// Elements are hashed with the stateless strategy `H` (see
/// [`ElementHasher`]). The table keeps at most 75% of its slots occupied,
/// growing before an insertion would exceed that.
///
/// ## Performance Characteristics
///
/// - **Memory**: 1 byte per slot overhead, plus the size of `T`.
/// - **Lookup**: one home slot computation, then a linear scan that stops at
///   the first never-used slot.
///
/// ## Example
///
/// ```rust
/// use tomb_hash::hash_table::HashTable;
/// use tomb_hash::hash_table::InsertResult;
///
/// let mut table: HashTable<u64> = HashTable::new();
/// table.add(7);
/// assert_eq!(table.add_if_not_existing(7), InsertResult::EntryAlreadyExists);
/// assert_eq!(table.add_if_not_existing(8), InsertResult::InsertedNewEntry);
///
/// let index = table.find(&8).unwrap();
/// assert_eq!(table.element_at(index), Some(&8));
/// ```
pub struct HashTable<T, H = DefaultHasher> {
    layout: DataLayout,
    alloc: NonNull<u8>,

    slot_count: usize,
    occupied_slot_count: usize,
    tombstone_slot_count: usize,

    _phantom: PhantomData<(T, fn() -> H)>,
}

// SAFETY: The table uniquely owns its allocation and the elements in it, the
// same way `Vec<T>` does.
unsafe impl<T: Send, H> Send for HashTable<T, H> {}

// SAFETY: Shared references only hand out `&T`.
unsafe impl<T: Sync, H> Sync for HashTable<T, H> {}

impl<T, H> Debug for HashTable<T, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::string::ToString;
        use alloc::vec::Vec;

        if self.slot_count == 0 {
            return f
                .debug_struct("HashTable")
                .field("metadata", &"unallocated")
                .field("occupied_slot_count", &self.occupied_slot_count)
                .field("slot_count", &self.slot_count)
                .finish();
        }

        // SAFETY: slot_count > 0, so the metadata slice is backed by the allocation.
        let metadata = unsafe { self.metadata_ptr().as_ref() };
        f.debug_struct("HashTable")
            .field(
                "metadata",
                &metadata
                    .chunks(16)
                    .map(|row| {
                        row.iter()
                            .map(|byte| match *byte {
                                NEVER_USED => "..".to_string(),
                                TOMBSTONE => "xx".to_string(),
                                low => format!("{low:02x}"),
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .collect::<Vec<String>>(),
            )
            .field("occupied_slot_count", &self.occupied_slot_count)
            .field("tombstone_slot_count", &self.tombstone_slot_count)
            .field("slot_count", &self.slot_count)
            .finish()
    }
}

impl<T, H> Clone for HashTable<T, H>
where
    T: Clone,
    H: ElementHasher<T>,
{
    /// Copies the live elements into a new table sized for exactly the
    /// occupied count. Tombstones and spare capacity are not carried over.
    fn clone(&self) -> Self {
        let mut new_table = Self::with_capacity(self.occupied_slot_count);

        for element in self.iter() {
            let hash = H::get_hash(element);
            let Some(index) = new_table.first_available_slot(hash) else {
                unreachable!("a table sized for the source has an available slot");
            };
            // SAFETY: `index` was just returned by a probe of `new_table` and
            // nothing has been written since.
            unsafe {
                new_table.write_slot(index, hash, element.clone());
            }
        }

        debug_assert_eq!(new_table.occupied_slot_count, self.occupied_slot_count);
        new_table
    }
}

impl<T, H> Default for HashTable<T, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, H> Drop for HashTable<T, H> {
    fn drop(&mut self) {
        self.drop_elements();

        // SAFETY: `layout` and `alloc` describe the current allocation.
        unsafe { Self::deallocate(&self.layout, self.alloc) };
    }
}

impl<T, H> HashTable<T, H> {
    /// Creates an empty hash table without allocating.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let table: HashTable<u32> = HashTable::new();
    /// assert_eq!(table.slot_count(), 0);
    /// assert!(table.is_empty());
    /// ```
    pub const fn new() -> Self {
        Self {
            layout: DataLayout::EMPTY,
            alloc: NonNull::dangling(),
            slot_count: 0,
            occupied_slot_count: 0,
            tombstone_slot_count: 0,
            _phantom: PhantomData,
        }
    }

    /// Creates an empty hash table that can hold at least `capacity` elements
    /// without reallocating.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            return Self::new();
        }

        let slot_count = minimal_slot_count(capacity);
        let (layout, alloc) = Self::allocate(slot_count);
        Self {
            layout,
            alloc,
            slot_count,
            occupied_slot_count: 0,
            tombstone_slot_count: 0,
            _phantom: PhantomData,
        }
    }

    fn allocate(slot_count: usize) -> (DataLayout, NonNull<u8>) {
        let layout = DataLayout::new::<T>(slot_count);
        if layout.layout.size() == 0 {
            return (layout, NonNull::dangling());
        }

        // SAFETY: We have validated that the layout size is non-zero. The `alloc`
        // function returns a valid pointer, and we handle allocation errors
        // if it returns null. The metadata array lies inside the allocation.
        unsafe {
            let raw_alloc = alloc::alloc::alloc(layout.layout);
            if raw_alloc.is_null() {
                handle_alloc_error(layout.layout);
            }

            core::ptr::write_bytes(raw_alloc.add(layout.metadata_offset), NEVER_USED, slot_count);

            (layout, NonNull::new_unchecked(raw_alloc))
        }
    }

    /// # Safety
    ///
    /// `layout` and `alloc` must come from the same call to
    /// [`HashTable::allocate`], and the allocation must not be used afterwards.
    unsafe fn deallocate(layout: &DataLayout, alloc: NonNull<u8>) {
        if layout.layout.size() != 0 {
            // SAFETY: Caller guarantees `alloc` was allocated with `layout`.
            unsafe { alloc::alloc::dealloc(alloc.as_ptr(), layout.layout) };
        }
    }

    fn slots_ptr(&self) -> NonNull<[MaybeUninit<T>]> {
        let base = if self.slot_count == 0 {
            NonNull::dangling()
        } else {
            self.alloc.cast()
        };
        NonNull::slice_from_raw_parts(base, self.slot_count)
    }

    fn metadata_ptr(&self) -> NonNull<[u8]> {
        // SAFETY: `metadata_offset` is within the allocation, or zero for the
        // empty layout.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.metadata_offset),
                self.slot_count,
            )
        }
    }

    #[inline(always)]
    fn home_slot(&self, hash: u64) -> usize {
        debug_assert!(self.slot_count > 0);
        ((hash >> LOW_HASH_BITS) % self.slot_count as u64) as usize
    }

    #[inline(always)]
    fn next_slot(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slot_count { 0 } else { next }
    }

    /// Returns the number of elements in the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<&str> = HashTable::new();
    /// table.add("albedo");
    /// table.add("normal");
    /// assert_eq!(table.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        self.occupied_slot_count
    }

    /// Returns `true` if the table holds no elements.
    pub fn is_empty(&self) -> bool {
        self.occupied_slot_count == 0
    }

    /// Returns the total number of allocated slots.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Returns the number of elements the table can hold before it grows.
    pub fn capacity(&self) -> usize {
        max_occupied(self.slot_count)
    }

    /// Returns the element stored in slot `index`, or `None` if the index is
    /// out of bounds or the slot holds no live element.
    ///
    /// Indices come from [`HashTable::find`] and stay valid until the next
    /// mutation.
    pub fn element_at(&self, index: usize) -> Option<&T> {
        if index >= self.slot_count {
            return None;
        }

        // SAFETY: `index` is in bounds, and an occupied metadata byte means the
        // slot is initialized.
        unsafe {
            if is_available(*self.metadata_ptr().as_ref().get_unchecked(index)) {
                return None;
            }
            Some(self.slots_ptr().as_ref().get_unchecked(index).assume_init_ref())
        }
    }

    /// # Safety
    ///
    /// `index` must be the index of an occupied slot.
    pub(crate) unsafe fn element_at_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.slot_count);
        // SAFETY: Caller guarantees the slot is occupied and therefore
        // initialized.
        unsafe {
            debug_assert!(!is_available(*self.metadata_ptr().as_ref().get_unchecked(index)));
            self.slots_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .assume_init_mut()
        }
    }

    /// Locates the element with the given hash for which `eq` returns `true`.
    ///
    /// Stops at the first never-used slot and visits at most `slot_count`
    /// slots.
    pub(crate) fn find_by_hash(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<usize> {
        if self.occupied_slot_count == 0 {
            return None;
        }

        let low = low_hash(hash);
        let mut index = self.home_slot(hash);

        // SAFETY: `index` stays below `slot_count`, and metadata equal to a low
        // hash means the slot is initialized.
        unsafe {
            let metadata = self.metadata_ptr().as_ref();
            let slots = self.slots_ptr().as_ref();
            for _ in 0..self.slot_count {
                let byte = *metadata.get_unchecked(index);
                if byte == low && eq(slots.get_unchecked(index).assume_init_ref()) {
                    return Some(index);
                }
                if byte == NEVER_USED {
                    return None;
                }
                index = self.next_slot(index);
            }
        }

        None
    }

    /// Locates the element for which `eq` returns `true`, or else the first
    /// available slot on its probe sequence.
    fn find_element_or_first_available_slot(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Probe {
        if self.slot_count == 0 {
            return Probe::Vacant(None);
        }

        let low = low_hash(hash);
        let mut index = self.home_slot(hash);
        let mut first_available = None;

        // SAFETY: `index` stays below `slot_count`, and metadata equal to a low
        // hash means the slot is initialized.
        unsafe {
            let metadata = self.metadata_ptr().as_ref();
            let slots = self.slots_ptr().as_ref();
            for _ in 0..self.slot_count {
                let byte = *metadata.get_unchecked(index);
                if byte == low && eq(slots.get_unchecked(index).assume_init_ref()) {
                    return Probe::Found(index);
                }
                if byte == NEVER_USED {
                    return Probe::Vacant(Some(first_available.unwrap_or(index)));
                }
                if byte == TOMBSTONE && first_available.is_none() {
                    first_available = Some(index);
                }
                index = self.next_slot(index);
            }
        }

        Probe::Vacant(first_available)
    }

    /// First tombstone or never-used slot on the probe sequence of `hash`.
    fn first_available_slot(&self, hash: u64) -> Option<usize> {
        if self.slot_count == 0 {
            return None;
        }

        let mut index = self.home_slot(hash);
        // SAFETY: `index` stays below `slot_count`.
        unsafe {
            let metadata = self.metadata_ptr().as_ref();
            for _ in 0..self.slot_count {
                if is_available(*metadata.get_unchecked(index)) {
                    return Some(index);
                }
                index = self.next_slot(index);
            }
        }

        None
    }

    /// Constructs `element` in slot `index` and returns a reference to it.
    ///
    /// # Safety
    ///
    /// `index` must be an available slot returned by a probe of this table for
    /// `hash`, with no reallocation in between.
    pub(crate) unsafe fn write_slot(&mut self, index: usize, hash: u64, element: T) -> &mut T {
        debug_assert!(index < self.slot_count);
        // SAFETY: Caller guarantees `index` is an in-bounds available slot.
        unsafe {
            let metadata = self.metadata_ptr().as_mut().get_unchecked_mut(index);
            debug_assert!(is_available(*metadata));
            if *metadata == TOMBSTONE {
                self.tombstone_slot_count -= 1;
            }
            *metadata = low_hash(hash);
            self.occupied_slot_count += 1;

            self.slots_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .write(element)
        }
    }

    /// Moves the element out of slot `index`, leaving a tombstone behind.
    ///
    /// # Safety
    ///
    /// `index` must be the index of an occupied slot.
    pub(crate) unsafe fn take_slot(&mut self, index: usize) -> T {
        debug_assert!(index < self.slot_count);
        // SAFETY: Caller guarantees the slot is occupied and therefore
        // initialized. The tombstone ensures it is never read again.
        unsafe {
            let metadata = self.metadata_ptr().as_mut().get_unchecked_mut(index);
            debug_assert!(!is_available(*metadata));
            *metadata = TOMBSTONE;
            self.occupied_slot_count -= 1;
            self.tombstone_slot_count += 1;

            self.slots_ptr()
                .as_ref()
                .get_unchecked(index)
                .assume_init_read()
        }
    }

    fn drop_elements(&mut self) {
        if !core::mem::needs_drop::<T>() || self.occupied_slot_count == 0 {
            return;
        }

        // SAFETY: Only slots with an occupied metadata byte are dropped. Each
        // slot is marked a tombstone before its destructor runs, so a panicking
        // destructor leaves no dropped element marked occupied.
        unsafe {
            let metadata = self.metadata_ptr().as_mut();
            let slots = self.slots_ptr().as_mut();
            for index in 0..self.slot_count {
                if self.occupied_slot_count == 0 {
                    break;
                }

                let byte = metadata.get_unchecked_mut(index);
                if !is_available(*byte) {
                    *byte = TOMBSTONE;
                    self.occupied_slot_count -= 1;
                    self.tombstone_slot_count += 1;
                    slots.get_unchecked_mut(index).assume_init_drop();
                }
            }
        }
    }

    fn reset_metadata(&mut self) {
        // SAFETY: The metadata slice is valid for `slot_count` bytes.
        unsafe { self.metadata_ptr().as_mut().fill(NEVER_USED) };
        self.occupied_slot_count = 0;
        self.tombstone_slot_count = 0;
    }

    /// Drops every element and marks every slot never used. The allocation
    /// is kept.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<u32> = (0..10).collect();
    /// let slot_count = table.slot_count();
    /// table.clear();
    /// assert!(table.is_empty());
    /// assert_eq!(table.slot_count(), slot_count);
    /// ```
    pub fn clear(&mut self) {
        self.drop_elements();
        self.reset_metadata();
    }

    /// Drops every element and releases the allocation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<u32> = (0..10).collect();
    /// table.clear_and_shrink();
    /// assert!(table.is_empty());
    /// assert_eq!(table.slot_count(), 0);
    /// ```
    pub fn clear_and_shrink(&mut self) {
        // Dropping the old table releases both its elements and its memory.
        *self = Self::new();
    }

    /// Returns an iterator over the elements in physical slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let table: HashTable<u32> = (1..=3).collect();
    /// let mut elements: Vec<u32> = table.iter().copied().collect();
    /// elements.sort();
    /// assert_eq!(elements, [1, 2, 3]);
    /// ```
    pub fn iter(&self) -> Iter<'_, T> {
        // SAFETY: Both slices are valid for `slot_count` entries while `self`
        // is borrowed.
        unsafe {
            Iter {
                slots: self.slots_ptr().as_ref().iter(),
                metadata: self.metadata_ptr().as_ref().iter(),
                remaining: self.occupied_slot_count,
            }
        }
    }

    /// Mutable iteration for containers whose equality ignores part of the
    /// element. Mutating the hashed part of an element is a logic error.
    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, T> {
        // SAFETY: The slot and metadata slices do not overlap, and both are
        // valid for `slot_count` entries while `self` is mutably borrowed.
        unsafe {
            IterMut {
                slots: self.slots_ptr().as_mut().iter_mut(),
                metadata: self.metadata_ptr().as_ref().iter(),
                remaining: self.occupied_slot_count,
            }
        }
    }

    /// Removes every element, yielding them by value. The allocation is kept.
    ///
    /// Elements not consumed by the iterator are dropped when it is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<u32> = (0..4).collect();
    /// let mut drained: Vec<u32> = table.drain().collect();
    /// drained.sort();
    /// assert_eq!(drained, [0, 1, 2, 3]);
    /// assert!(table.is_empty());
    /// ```
    pub fn drain(&mut self) -> Drain<'_, T, H> {
        Drain {
            table: self,
            cursor: 0,
        }
    }

    /// Moves the next live element at or after `cursor` out of the table.
    /// The vacated slot is marked never used, which breaks probe sequences;
    /// callers reset or drop the table before probing again.
    fn take_next(&mut self, cursor: &mut usize) -> Option<T> {
        if self.occupied_slot_count == 0 {
            return None;
        }

        // SAFETY: `cursor` is bounds checked, and an occupied metadata byte means
        // the slot is initialized. The slot is marked available before returning
        // so it is never read or dropped again.
        unsafe {
            let metadata = self.metadata_ptr().as_mut();
            while *cursor < self.slot_count {
                let index = *cursor;
                *cursor += 1;

                let byte = metadata.get_unchecked_mut(index);
                if !is_available(*byte) {
                    *byte = NEVER_USED;
                    self.occupied_slot_count -= 1;
                    return Some(self.slots_ptr().as_ref().get_unchecked(index).assume_init_read());
                }
            }
        }

        None
    }
}

impl<T, H> HashTable<T, H>
where
    H: ElementHasher<T>,
{
    /// Rebuilds the table into a fresh allocation of `new_slot_count` slots.
    ///
    /// Every live element is re-hashed and moved to the first available slot
    /// of its new probe sequence. Tombstones are discarded.
    fn re_allocate_to_fixed(&mut self, new_slot_count: usize) {
        debug_assert!(max_occupied(new_slot_count) >= self.occupied_slot_count);

        let (new_layout, new_alloc) = Self::allocate(new_slot_count);
        let old_layout = core::mem::replace(&mut self.layout, new_layout);
        let old_alloc = core::mem::replace(&mut self.alloc, new_alloc);
        let old_slot_count = core::mem::replace(&mut self.slot_count, new_slot_count);
        self.tombstone_slot_count = 0;

        if self.occupied_slot_count > 0 {
            // SAFETY: The old allocation holds `old_slot_count` slots followed by
            // their metadata. Each live element is moved exactly once, and the
            // old allocation is freed without dropping anything in it.
            unsafe {
                let old_slots = old_alloc.cast::<MaybeUninit<T>>();
                let old_metadata = core::slice::from_raw_parts(
                    old_alloc.add(old_layout.metadata_offset).as_ptr(),
                    old_slot_count,
                );

                for (old_index, &byte) in old_metadata.iter().enumerate() {
                    if is_available(byte) {
                        continue;
                    }

                    let old_slot = old_slots.add(old_index);
                    let hash = H::get_hash(old_slot.as_ref().assume_init_ref());
                    let Some(new_index) = self.first_available_slot(hash) else {
                        unreachable!("rehash target has room for every live element");
                    };

                    core::ptr::copy_nonoverlapping(
                        old_slot.as_ptr(),
                        self.slots_ptr().as_mut().as_mut_ptr().add(new_index),
                        1,
                    );
                    *self.metadata_ptr().as_mut().get_unchecked_mut(new_index) = byte;
                }
            }
        }

        // SAFETY: The old allocation is no longer referenced.
        unsafe { Self::deallocate(&old_layout, old_alloc) };
    }

    /// Slot count after growing to hold `required` elements: double the
    /// current count, or the minimal count if doubling is not enough.
    fn grown_slot_count(&self, required: usize) -> usize {
        let doubled = self.slot_count.saturating_mul(2);
        if max_occupied(doubled) >= required {
            doubled
        } else {
            minimal_slot_count(required)
        }
    }

    /// Makes room for one more element and returns the slot it goes into.
    ///
    /// `available` is the result of probing the current allocation. After any
    /// reallocation that slot is stale, so the probe is repeated.
    fn prepare_insert_slot(&mut self, hash: u64, available: Option<usize>) -> usize {
        let required = self.occupied_slot_count + 1;
        let budget = max_occupied(self.slot_count);

        match available {
            Some(index) if required <= budget => {
                // SAFETY: Probes only return in-bounds indices.
                let byte = unsafe { *self.metadata_ptr().as_ref().get_unchecked(index) };
                if byte == TOMBSTONE
                    || self.occupied_slot_count + self.tombstone_slot_count < budget
                {
                    return index;
                }

                // Consuming a never-used slot would leave too few of them to
                // terminate probes. Purge tombstones, growing if the table is
                // mostly live.
                if required <= budget / 2 {
                    self.re_allocate_to_fixed(self.slot_count);
                } else {
                    self.re_allocate_to_fixed(self.grown_slot_count(required));
                }
            }
            _ => self.re_allocate_to_fixed(self.grown_slot_count(required)),
        }

        match self.first_available_slot(hash) {
            Some(index) => index,
            None => unreachable!("a freshly rebuilt table has an available slot"),
        }
    }

    /// Returns the slot for a new element with the given hash, growing first
    /// if required. The caller must not have an equal element in the table.
    pub(crate) fn prepare_insert(&mut self, hash: u64) -> usize {
        let available = self.first_available_slot(hash);
        self.prepare_insert_slot(hash, available)
    }

    /// Locates the element for which `eq` returns `true`, or prepares a slot
    /// to insert it into.
    pub(crate) fn find_or_prepare_insert(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Slot {
        match self.find_element_or_first_available_slot(hash, eq) {
            Probe::Found(index) => Slot::Occupied(index),
            Probe::Vacant(available) => Slot::Vacant(self.prepare_insert_slot(hash, available)),
        }
    }

    /// Reserves room for at least `additional` more elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<u32> = HashTable::new();
    /// table.reserve(1000);
    /// let slot_count = table.slot_count();
    /// table.extend(0..1000);
    /// assert_eq!(table.slot_count(), slot_count);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        let required = self
            .occupied_slot_count
            .checked_add(additional)
            .expect("capacity overflow");
        if required > max_occupied(self.slot_count) {
            self.re_allocate_to_fixed(self.grown_slot_count(required));
        }
    }

    /// Rebuilds the table into the smallest allocation that holds its
    /// elements, discarding tombstones.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<u32> = (0..1000).collect();
    /// for value in 10..1000 {
    ///     table.remove(&value);
    /// }
    /// table.shrink_to_fit();
    /// assert!(table.slot_count() < 20);
    /// assert_eq!(table.len(), 10);
    /// ```
    pub fn shrink_to_fit(&mut self) {
        if self.occupied_slot_count == 0 {
            self.clear_and_shrink();
            return;
        }

        let minimal = minimal_slot_count(self.occupied_slot_count);
        if minimal < self.slot_count || self.tombstone_slot_count > 0 {
            self.re_allocate_to_fixed(minimal.min(self.slot_count));
        }
    }

    /// Collects occupancy and memory statistics.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let total_bytes = self.layout.layout.size();
        let unused_slots = self.slot_count - self.occupied_slot_count;
        DebugStats {
            occupied_slots: self.occupied_slot_count,
            tombstone_slots: self.tombstone_slot_count,
            never_used_slots: unused_slots - self.tombstone_slot_count,
            slot_count: self.slot_count,
            capacity: self.capacity(),
            load_factor: if self.slot_count == 0 {
                0.0
            } else {
                self.occupied_slot_count as f64 / self.slot_count as f64
            },
            max_probe_length: self.probe_histogram().max_probe_length(),
            total_bytes,
            wasted_bytes: unused_slots * (core::mem::size_of::<T>() + 1)
                + (total_bytes - self.slot_count * (core::mem::size_of::<T>() + 1)),
        }
    }

    /// Computes the distribution of distances between each element and its
    /// home slot.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut counts = alloc::vec::Vec::new();
        // SAFETY: Both slices are valid for `slot_count` entries, and only slots
        // with an occupied metadata byte are read.
        unsafe {
            let metadata = self.metadata_ptr().as_ref();
            let slots = self.slots_ptr().as_ref();
            for (index, (slot, byte)) in slots.iter().zip(metadata).enumerate() {
                if is_available(*byte) {
                    continue;
                }
                let home = self.home_slot(H::get_hash(slot.assume_init_ref()));
                let distance = (index + self.slot_count - home) % self.slot_count;
                if counts.len() <= distance {
                    counts.resize(distance + 1, 0);
                }
                counts[distance] += 1;
            }
        }
        ProbeHistogram { counts }
    }
}

impl<T, H> HashTable<T, H>
where
    T: Eq,
    H: ElementHasher<T>,
{
    /// Returns the slot index of the element equal to `element`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let table: HashTable<u32> = (0..8).collect();
    /// let index = table.find(&5).unwrap();
    /// assert_eq!(table.element_at(index), Some(&5));
    /// assert_eq!(table.find(&9), None);
    /// ```
    pub fn find(&self, element: &T) -> Option<usize> {
        self.find_by_hash(H::get_hash(element), |candidate| candidate == element)
    }

    /// Returns `true` if an element equal to `element` is present.
    pub fn contains(&self, element: &T) -> bool {
        self.find(element).is_some()
    }

    /// Returns a reference to the stored element equal to `element`.
    pub fn get(&self, element: &T) -> Option<&T> {
        let index = self.find(element)?;
        self.element_at(index)
    }

    /// Inserts an element that is known not to be present.
    ///
    /// Adding an element equal to one already stored is a logic error: it is
    /// caught by a debug assertion, and in release builds the table ends up
    /// with two equal elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<&str> = HashTable::new();
    /// table.add("forward");
    /// table.add("deferred");
    /// assert!(table.contains(&"deferred"));
    /// ```
    pub fn add(&mut self, element: T) {
        debug_assert!(
            !self.contains(&element),
            "element is already present in the hash table"
        );

        let hash = H::get_hash(&element);
        let index = self.prepare_insert(hash);
        // SAFETY: `index` was just prepared for `hash`.
        unsafe {
            self.write_slot(index, hash, element);
        }
    }

    /// Inserts `element` unless an equal element is already present, in
    /// which case `element` is dropped and the table is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// # use tomb_hash::hash_table::InsertResult;
    /// let mut table: HashTable<u32> = HashTable::new();
    /// assert_eq!(table.add_if_not_existing(3), InsertResult::InsertedNewEntry);
    /// assert_eq!(table.add_if_not_existing(3), InsertResult::EntryAlreadyExists);
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn add_if_not_existing(&mut self, element: T) -> InsertResult {
        let hash = H::get_hash(&element);
        match self.find_or_prepare_insert(hash, |candidate| *candidate == element) {
            Slot::Occupied(_) => InsertResult::EntryAlreadyExists,
            Slot::Vacant(index) => {
                // SAFETY: `index` was just prepared for `hash`.
                unsafe {
                    self.write_slot(index, hash, element);
                }
                InsertResult::InsertedNewEntry
            }
        }
    }

    /// Removes an element that is known to be present.
    ///
    /// Removing a missing element is a logic error caught by a debug
    /// assertion; in release builds it does nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// let mut table: HashTable<u32> = (0..4).collect();
    /// table.remove(&2);
    /// assert!(!table.contains(&2));
    /// assert_eq!(table.len(), 3);
    /// ```
    pub fn remove(&mut self, element: &T) {
        let result = self.remove_if_exists(element);
        debug_assert_eq!(
            result,
            RemoveResult::RemovedExistingEntry,
            "element is not present in the hash table"
        );
    }

    /// Removes the element equal to `element`, if there is one.
    ///
    /// The slot becomes a tombstone and the allocation is never shrunk.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tomb_hash::hash_table::HashTable;
    /// # use tomb_hash::hash_table::RemoveResult;
    /// let mut table: HashTable<u32> = (0..4).collect();
    /// assert_eq!(table.remove_if_exists(&1), RemoveResult::RemovedExistingEntry);
    /// assert_eq!(table.remove_if_exists(&1), RemoveResult::EntryDoesNotExist);
    /// ```
    pub fn remove_if_exists(&mut self, element: &T) -> RemoveResult {
        match self.take(element) {
            Some(_) => RemoveResult::RemovedExistingEntry,
            None => RemoveResult::EntryDoesNotExist,
        }
    }

    /// Removes the element equal to `element` and returns it.
    pub fn take(&mut self, element: &T) -> Option<T> {
        let index = self.find(element)?;
        // SAFETY: `find` only returns occupied slots.
        Some(unsafe { self.take_slot(index) })
    }
}

impl<T, H> FromIterator<T> for HashTable<T, H>
where
    T: Eq,
    H: ElementHasher<T>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

impl<T, H> Extend<T> for HashTable<T, H>
where
    T: Eq,
    H: ElementHasher<T>,
{
    /// Adds every element not already present.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        // Elements may already be present, so a non-empty table reserves half.
        let additional = if self.is_empty() {
            iter.size_hint().0
        } else {
            iter.size_hint().0.div_ceil(2)
        };
        self.reserve(additional);
        for element in iter {
            self.add_if_not_existing(element);
        }
    }
}

impl<'a, T, H> IntoIterator for &'a HashTable<T, H> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, H> IntoIterator for HashTable<T, H> {
    type IntoIter = IntoIter<T, H>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            table: self,
            cursor: 0,
        }
    }
}

/// An iterator over the elements of a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, T> {
    slots: core::slice::Iter<'a, MaybeUninit<T>>,
    metadata: core::slice::Iter<'a, u8>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let slot = self.slots.next()?;
            let byte = *self.metadata.next()?;
            if !is_available(byte) {
                self.remaining -= 1;
                // SAFETY: An occupied metadata byte means the slot is initialized.
                return Some(unsafe { slot.assume_init_ref() });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            metadata: self.metadata.clone(),
            remaining: self.remaining,
        }
    }
}

pub(crate) struct IterMut<'a, T> {
    slots: core::slice::IterMut<'a, MaybeUninit<T>>,
    metadata: core::slice::Iter<'a, u8>,
    remaining: usize,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let slot = self.slots.next()?;
            let byte = *self.metadata.next()?;
            if !is_available(byte) {
                self.remaining -= 1;
                // SAFETY: An occupied metadata byte means the slot is initialized.
                return Some(unsafe { slot.assume_init_mut() });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

impl<T> FusedIterator for IterMut<'_, T> {}

/// A draining iterator over the elements of a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, T, H = DefaultHasher> {
    table: &'a mut HashTable<T, H>,
    cursor: usize,
}

impl<T, H> Drop for Drain<'_, T, H> {
    fn drop(&mut self) {
        for _ in &mut *self {}
        self.table.reset_metadata();
    }
}

impl<T, H> Iterator for Drain<'_, T, H> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.table.take_next(&mut self.cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len(), Some(self.table.len()))
    }
}

impl<T, H> ExactSizeIterator for Drain<'_, T, H> {}

impl<T, H> FusedIterator for Drain<'_, T, H> {}

/// An owning iterator over the elements of a [`HashTable`].
pub struct IntoIter<T, H = DefaultHasher> {
    table: HashTable<T, H>,
    cursor: usize,
}

impl<T, H> Iterator for IntoIter<T, H> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.table.take_next(&mut self.cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len(), Some(self.table.len()))
    }
}

impl<T, H> ExactSizeIterator for IntoIter<T, H> {}

impl<T, H> FusedIterator for IntoIter<T, H> {}
