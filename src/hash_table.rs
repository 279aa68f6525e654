use alloc::alloc::handle_alloc_error;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::fmt::Debug;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::group::GROUP_SLOTS;
use crate::group::GroupMeta;
use crate::group::broadcast;

/// Number of probe groups per sub-table. The starting group of a probe is
/// the 9-bit middle slice of the hash, so this is fixed at 512 regardless of
/// how deep the directory grows.
const GROUP_COUNT: usize = 512;

const GROUP_MASK: usize = GROUP_COUNT - 1;

/// Slots per sub-table: 512 groups of 7.
const SUB_TABLE_SLOTS: usize = GROUP_COUNT * GROUP_SLOTS;

/// Live + tombstoned slots at which a sub-table splits: 87.5% of capacity.
const SPLIT_THRESHOLD: u32 = (SUB_TABLE_SLOTS as u32 / 8) * 7;

/// Live count at or below which a sub-table looks for a merge partner
/// (a quarter of the split threshold, ~21.9% of capacity).
const MERGE_THRESHOLD: u32 = SPLIT_THRESHOLD / 4;

/// Combined live count two buddies may have and still merge (~65.6% of
/// capacity), leaving headroom before the merged table would split again.
const MERGE_FIT: u32 = SPLIT_THRESHOLD / 4 * 3;

/// Deepest supported directory. The top 47 bits of the hash index the
/// directory; the remaining 17 select the starting group and the tag byte.
const MAX_LEVEL: u32 = 47;

/// Directory slot for `hash` at directory depth `level`.
#[inline(always)]
fn dir_index(hash: u64, level: u32) -> usize {
    if level == 0 {
        0
    } else {
        (hash >> (64 - level)) as usize
    }
}

/// Starting probe group for `hash`, independent of directory depth.
#[inline(always)]
fn start_group(hash: u64) -> usize {
    ((hash >> 8) as usize) & GROUP_MASK
}

/// Tag byte stored for an element with `hash`.
#[inline(always)]
fn hash_tag(hash: u64) -> u8 {
    hash as u8
}

#[inline(always)]
fn prefetch<T>(ptr: *const T) {
    cfg_if::cfg_if! {
        if #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))] {
            // SAFETY: prefetch is a hint with no memory effects; any address
            // is acceptable.
            unsafe {
                use core::arch::x86_64::*;
                _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
            }
        } else {
            let _ = ptr;
        }
    }
}

/// Errors reported by table growth.
///
/// Lookups and removals of absent keys are ordinary `None` results, never
/// errors; this enum only covers the cases where the table could not
/// restructure itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sub-table allocation failed. The growth or shrink step that needed
    /// it was rolled back and the table is still fully usable.
    AllocationFailed,
    /// A split would need to double the directory past the deepest supported
    /// level (47 bits of directory index). The triggering insert fails;
    /// existing elements are untouched.
    DirectoryOverflow,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::AllocationFailed => f.write_str("sub-table allocation failed"),
            Error::DirectoryOverflow => f.write_str("directory depth exhausted"),
        }
    }
}

impl core::error::Error for Error {}

/// Result of a sub-table insert probe.
enum Probe {
    /// An equal element already lives at this position.
    Found { group: usize, slot: usize },
    /// No equal element; this is the first free slot seen on the probe path.
    Free { group: usize, slot: usize },
    /// Every slot of the sub-table is occupied.
    Full,
}

/// One fixed-size open-addressed table: 512 groups of 7 slots, stored
/// struct-of-arrays in a single allocation so that probing walks a dense
/// array of metadata words.
///
/// The header counts live elements, tombstones (slots freed while their
/// group was marked ever-full, which keep probes walking past the group),
/// and ever-full groups. `local_level` is the number of hash bits this
/// sub-table owns in the directory: the table is aliased by exactly
/// `2^(table.level - local_level)` contiguous directory slots.
#[repr(C)]
struct SubTable<V> {
    num_elm: u32,
    num_tomb: u32,
    num_ever_full: u32,
    local_level: u32,
    metas: [GroupMeta; GROUP_COUNT],
    hashes: [[MaybeUninit<u64>; GROUP_SLOTS]; GROUP_COUNT],
    slots: [[MaybeUninit<V>; GROUP_SLOTS]; GROUP_COUNT],
}

impl<V> SubTable<V> {
    /// Allocates an empty sub-table owning `local_level` directory bits.
    ///
    /// The allocation is left uninitialized except for the header and the
    /// metadata words; a zeroed metadata word marks all seven slots free.
    fn alloc(local_level: u32) -> Result<NonNull<Self>, Error> {
        let layout = Layout::new::<Self>();
        debug_assert!(layout.size() != 0);
        // SAFETY: the layout has non-zero size.
        let raw = unsafe { alloc::alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<Self>()) else {
            return Err(Error::AllocationFailed);
        };
        // SAFETY: freshly allocated and sized for `SubTable<V>`. Zeroing up
        // to the hashes array clears the header and every metadata word;
        // hashes and slots stay uninitialized until their occupied bit is
        // set.
        unsafe {
            core::ptr::write_bytes(raw, 0, core::mem::offset_of!(SubTable<V>, hashes));
            (*ptr.as_ptr()).local_level = local_level;
        }
        Ok(ptr)
    }

    /// Frees a sub-table allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`SubTable::alloc`] and must not be used again.
    /// `drop_values` must be `false` iff every live value has already been
    /// moved out (as split and merge do).
    unsafe fn free(ptr: NonNull<Self>, drop_values: bool) {
        // SAFETY: the caller hands over unique ownership of the allocation;
        // occupied bits identify exactly the initialized slots.
        unsafe {
            if drop_values && core::mem::needs_drop::<V>() {
                let sub = &mut *ptr.as_ptr();
                for group in 0..GROUP_COUNT {
                    let mut occupied = sub.metas[group].occupied();
                    while occupied != 0 {
                        let slot = occupied.trailing_zeros() as usize;
                        occupied &= occupied - 1;
                        sub.slots[group][slot].assume_init_drop();
                    }
                }
            }
            alloc::alloc::dealloc(ptr.as_ptr().cast::<u8>(), Layout::new::<Self>());
        }
    }

    /// Probes for an element matching `eq`, returning its position.
    ///
    /// Walks groups starting at the hash's start group. A group that has
    /// never overflowed and holds no match proves the element absent; an
    /// ever-full group forces the probe onward. Bounded by the group count,
    /// so a sub-table where every group has overflowed still terminates.
    fn find_slot(&self, hash: u64, eq: &impl Fn(&V) -> bool) -> Option<(usize, usize)> {
        let needle = broadcast(hash_tag(hash));
        let mut group = start_group(hash);
        prefetch(&self.slots[group]);
        for _ in 0..GROUP_COUNT {
            let hits = self.metas[group].probe(needle);
            let mut candidates = hits.candidates();
            while candidates != 0 {
                let slot = candidates.trailing_zeros() as usize;
                candidates &= candidates - 1;
                // SAFETY: candidates only report occupied slots, and
                // occupied slots are initialized.
                if eq(unsafe { self.slots[group][slot].assume_init_ref() }) {
                    return Some((group, slot));
                }
            }
            if !hits.keep_probing() {
                return None;
            }
            group = (group + 1) & GROUP_MASK;
        }
        None
    }

    /// Insert-probe: find an equal element or the slot a fresh element
    /// should occupy.
    ///
    /// Remembers the first free slot on the probe path (which may be a
    /// tombstone). Any visited group with no free slot is durably marked
    /// ever-full, since the new element may come to rest beyond it and
    /// later probes must keep walking.
    fn probe_insert(&mut self, hash: u64, eq: &impl Fn(&V) -> bool) -> Probe {
        let needle = broadcast(hash_tag(hash));
        let mut group = start_group(hash);
        let mut free: Option<(usize, usize)> = None;
        prefetch(&self.slots[group]);
        for _ in 0..GROUP_COUNT {
            let hits = self.metas[group].probe(needle);
            let mut candidates = hits.candidates();
            while candidates != 0 {
                let slot = candidates.trailing_zeros() as usize;
                candidates &= candidates - 1;
                // SAFETY: candidates only report occupied slots, and
                // occupied slots are initialized.
                if eq(unsafe { self.slots[group][slot].assume_init_ref() }) {
                    return Probe::Found { group, slot };
                }
            }
            match self.metas[group].free_slot() {
                Some(slot) => {
                    if free.is_none() {
                        free = Some((group, slot));
                    }
                    if !hits.keep_probing() {
                        // A miss in a never-overflowed group proves absence.
                        break;
                    }
                }
                None => {
                    if !self.metas[group].set_ever_full() {
                        self.num_ever_full += 1;
                    }
                }
            }
            group = (group + 1) & GROUP_MASK;
        }
        match free {
            Some((group, slot)) => Probe::Free { group, slot },
            None => Probe::Full,
        }
    }

    /// Files an element during a split or merge rebuild.
    ///
    /// Never compares elements: rebuild sources hold disjoint keys by
    /// construction, so only a free slot is needed. Panics if the rebuilt
    /// table has no room, which would mean the fill accounting that sized
    /// this rebuild was wrong.
    fn refile(&mut self, hash: u64, value: V) {
        let mut group = start_group(hash);
        for _ in 0..GROUP_COUNT {
            if let Some(slot) = self.metas[group].free_slot() {
                self.metas[group].set_tag(slot, hash_tag(hash));
                self.metas[group].set_occupied(slot);
                self.hashes[group][slot] = MaybeUninit::new(hash);
                self.slots[group][slot] = MaybeUninit::new(value);
                self.num_elm += 1;
                return;
            }
            if !self.metas[group].set_ever_full() {
                self.num_ever_full += 1;
            }
            group = (group + 1) & GROUP_MASK;
        }
        unreachable!("rebuilt sub-table ran out of slots");
    }

    /// Frees an occupied slot and moves its value out.
    ///
    /// If the owning group has ever overflowed, the freed slot becomes a
    /// tombstone: later probes cannot treat it as proof of absence, so it
    /// stays counted until a split or merge rebuilds the group.
    ///
    /// # Safety
    ///
    /// `group`/`slot` must identify an occupied slot.
    unsafe fn take_slot(&mut self, group: usize, slot: usize) -> V {
        debug_assert!(self.metas[group].is_occupied(slot));
        self.metas[group].clear_slot(slot);
        if self.metas[group].ever_full() {
            self.num_tomb += 1;
        }
        self.num_elm -= 1;
        // SAFETY: the caller guarantees the slot was occupied, hence
        // initialized; the occupied bit is already cleared so no other path
        // will read it again.
        unsafe { self.slots[group][slot].assume_init_read() }
    }
}

/// A hash table built from fixed-size tagged-group sub-tables behind an
/// extendible-hashing directory.
///
/// One 64-bit hash is sliced three ways: the top bits pick a directory slot
/// (and through it a sub-table), nine middle bits pick the starting probe
/// group inside that sub-table, and the low byte is a tag compared against
/// seven packed tag bytes per group to reject non-matches without touching
/// the elements. An overfull sub-table splits in two, and the directory
/// doubles only when the splitting sub-table was its sole owner, so growth
/// never rehashes more than one sub-table's 3584 slots at a time. Sparse
/// sub-tables merge back with their split sibling.
///
/// Like the low-level tables in `hashbrown`, this type does not hash:
/// every operation takes the element's hash and an equality predicate.
/// Elements are stored by value and returned by reference.
///
/// The table is not internally synchronized; `&mut` methods require the
/// usual exclusive access.
///
/// # Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use ext_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # fn hash_u64(n: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     n.hash(&mut hasher);
/// #     hasher.finish()
/// # }
/// #
/// let mut table: HashTable<u64> = HashTable::new();
/// table
///     .entry(hash_u64(7), |&v| v == 7)
///     .unwrap()
///     .or_insert(7);
///
/// assert_eq!(table.find(hash_u64(7), |&v| v == 7), Some(&7));
/// assert_eq!(table.find(hash_u64(8), |&v| v == 8), None);
/// ```
pub struct HashTable<V> {
    /// `2^level` pointers; contiguous runs alias one sub-table. Empty until
    /// the first insert.
    dir: Vec<NonNull<SubTable<V>>>,
    level: u32,
    populated: usize,

    _phantom: core::marker::PhantomData<SubTable<V>>,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;

        let mut subs = Vec::new();
        let mut index = 0;
        while index < self.dir.len() {
            // SAFETY: directory entries always point at live sub-tables.
            let sub = unsafe { self.dir[index].as_ref() };
            subs.push(format!(
                "L{} elm={} tomb={} ever_full={}",
                sub.local_level, sub.num_elm, sub.num_tomb, sub.num_ever_full
            ));
            index += 1usize << (self.level - sub.local_level);
        }

        f.debug_struct("HashTable")
            .field("level", &self.level)
            .field("populated", &self.populated)
            .field("sub_tables", &subs)
            .finish()
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        let mut new_table = HashTable {
            dir: Vec::with_capacity(self.dir.len()),
            level: self.level,
            populated: 0,
            _phantom: core::marker::PhantomData,
        };

        let mut index = 0;
        while index < self.dir.len() {
            // SAFETY: directory entries always point at live sub-tables.
            let source = unsafe { self.dir[index].as_ref() };
            let span = 1usize << (self.level - source.local_level);

            let copy = match SubTable::<V>::alloc(source.local_level) {
                Ok(copy) => copy,
                Err(_) => handle_alloc_error(Layout::new::<SubTable<V>>()),
            };
            // The alias run goes into the directory before any value is
            // cloned, so a panicking `clone` leaves `new_table` droppable.
            for _ in 0..span {
                new_table.dir.push(copy);
            }

            // SAFETY: `copy` is freshly allocated and disjoint from
            // `source`; metadata is updated slot by slot as values land, so
            // the copy is consistent at every step.
            unsafe {
                let dst = &mut *copy.as_ptr();
                for group in 0..GROUP_COUNT {
                    let mut occupied = source.metas[group].occupied();
                    while occupied != 0 {
                        let slot = occupied.trailing_zeros() as usize;
                        occupied &= occupied - 1;
                        let value = source.slots[group][slot].assume_init_ref().clone();
                        dst.slots[group][slot] = MaybeUninit::new(value);
                        dst.hashes[group][slot] = source.hashes[group][slot];
                        dst.metas[group].set_tag(slot, source.metas[group].tag(slot));
                        dst.metas[group].set_occupied(slot);
                        dst.num_elm += 1;
                        new_table.populated += 1;
                    }
                    if source.metas[group].ever_full() {
                        dst.metas[group].set_ever_full();
                    }
                }
                dst.num_tomb = source.num_tomb;
                dst.num_ever_full = source.num_ever_full;
            }

            index += span;
        }

        debug_assert_eq!(new_table.populated, self.populated);
        new_table
    }
}

impl<V> Drop for HashTable<V> {
    fn drop(&mut self) {
        // SAFETY: the directory is discarded along with the table.
        unsafe { self.free_sub_tables() };
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table.
    ///
    /// Nothing is allocated until the first insert, which sets up a
    /// single-slot directory and one empty sub-table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<i32> = HashTable::new();
    /// assert!(table.is_empty());
    /// ```
    pub const fn new() -> Self {
        Self {
            dir: Vec::new(),
            level: 0,
            populated: 0,
            _phantom: core::marker::PhantomData,
        }
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Current directory depth: the directory holds `2^level` slots.
    ///
    /// An empty, never-used table reports level 0.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Total slots across all distinct sub-tables.
    ///
    /// This is storage, not a resize limit: a sub-table splits at 87.5%
    /// fill, so the table restructures before its slots run out.
    pub fn capacity(&self) -> usize {
        let mut subs = 0usize;
        let mut index = 0;
        while index < self.dir.len() {
            // SAFETY: directory entries always point at live sub-tables.
            let sub = unsafe { self.dir[index].as_ref() };
            subs += 1;
            index += 1usize << (self.level - sub.local_level);
        }
        subs * SUB_TABLE_SLOTS
    }

    /// Frees every distinct sub-table, dropping live values.
    ///
    /// # Safety
    ///
    /// Leaves the directory entries dangling; the caller must clear or
    /// discard `self.dir` without dereferencing them again.
    unsafe fn free_sub_tables(&mut self) {
        let mut index = 0;
        while index < self.dir.len() {
            let ptr = self.dir[index];
            // SAFETY: each contiguous alias run is one sub-table; advancing
            // by the run length visits and frees every distinct sub-table
            // exactly once.
            unsafe {
                let span = 1usize << (self.level - ptr.as_ref().local_level);
                SubTable::free(ptr, true);
                index += span;
            }
        }
    }

    /// Removes all elements and releases all storage.
    ///
    /// The table returns to its never-used state: the next insert
    /// re-allocates a fresh level-0 directory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table.entry(17, |&v| v == 1).unwrap().or_insert(1);
    /// table.clear();
    /// assert!(table.is_empty());
    ///
    /// // The table is fully reusable after clearing.
    /// table.entry(17, |&v| v == 1).unwrap().or_insert(1);
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn clear(&mut self) {
        // SAFETY: the dangling directory entries are discarded immediately.
        unsafe { self.free_sub_tables() };
        self.dir.clear();
        self.level = 0;
        self.populated = 0;
    }

    /// Allocates the level-0 directory on the first insert.
    fn ensure_root(&mut self) -> Result<(), Error> {
        if self.dir.is_empty() {
            let root = SubTable::alloc(0)?;
            self.dir.push(root);
            self.level = 0;
        }
        Ok(())
    }

    /// Finds a value by hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use ext_hash::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table
    ///     .entry(hash_u64(42), |&v| v == 42)
    ///     .unwrap()
    ///     .or_insert(42);
    ///
    /// assert_eq!(table.find(hash_u64(42), |&v| v == 42), Some(&42));
    /// assert_eq!(table.find(hash_u64(99), |&v| v == 99), None);
    /// ```
    #[inline]
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        if self.populated == 0 {
            return None;
        }

        // SAFETY: directory entries always point at live sub-tables, and a
        // shared borrow of the table keeps them alive.
        let sub = unsafe { self.dir[dir_index(hash, self.level)].as_ref() };
        let (group, slot) = sub.find_slot(hash, &eq)?;
        // SAFETY: `find_slot` only returns occupied slots.
        Some(unsafe { sub.slots[group][slot].assume_init_ref() })
    }

    /// Finds a value by hash and equality predicate, returning a mutable
    /// reference.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        if self.populated == 0 {
            return None;
        }

        let mut ptr = self.dir[dir_index(hash, self.level)];
        // SAFETY: directory entries always point at live sub-tables, and the
        // exclusive borrow of the table makes this the only live reference.
        let sub = unsafe { ptr.as_mut() };
        let (group, slot) = sub.find_slot(hash, &eq)?;
        // SAFETY: `find_slot` only returns occupied slots.
        Some(unsafe { sub.slots[group][slot].assume_init_mut() })
    }

    /// Finds a value by hash and an *alternate* comparator.
    ///
    /// This is `find` with the equality predicate swapped for an arbitrary
    /// match function, for lookups through a secondary key: an interning
    /// cache, for example, can find a record by the identity of one of its
    /// components without building a complete probe key.
    ///
    /// The probe only walks the path of the *given* hash. A comparator that
    /// could accept elements inserted under a different hash will silently
    /// miss them, and using `locate` to decide whether to insert can then
    /// produce two elements answering the same predicate. Keep the
    /// comparator at least as selective as the equality used at insert.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use ext_hash::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table: HashTable<(u64, &str)> = HashTable::new();
    /// table
    ///     .entry(hash_u64(1), |&(id, _)| id == 1)
    ///     .unwrap()
    ///     .or_insert((1, "one"));
    ///
    /// // Look up by id alone; the stored name comes along.
    /// let found = table.locate(hash_u64(1), |&(id, _)| id == 1);
    /// assert_eq!(found, Some(&(1, "one")));
    /// ```
    #[inline]
    pub fn locate(&self, hash: u64, cmp: impl Fn(&V) -> bool) -> Option<&V> {
        self.find(hash, cmp)
    }

    /// Removes and returns a value by hash and equality predicate.
    ///
    /// Removal may merge the now-sparser sub-table with its split sibling;
    /// merging is best-effort and never fails the removal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use ext_hash::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table
    ///     .entry(hash_u64(42), |&v| v == 42)
    ///     .unwrap()
    ///     .or_insert(42);
    ///
    /// assert_eq!(table.remove(hash_u64(42), |&v| v == 42), Some(42));
    /// assert_eq!(table.remove(hash_u64(42), |&v| v == 42), None);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        if self.populated == 0 {
            return None;
        }

        let index = dir_index(hash, self.level);
        let mut ptr = self.dir[index];
        // SAFETY: directory entries always point at live sub-tables, and the
        // exclusive borrow of the table makes this the only live reference.
        let sub = unsafe { ptr.as_mut() };
        let (group, slot) = sub.find_slot(hash, &eq)?;
        // SAFETY: `find_slot` only returns occupied slots.
        let value = unsafe { sub.take_slot(group, slot) };
        self.populated -= 1;
        self.compact(index);
        Some(value)
    }

    /// Gets the entry for the element matching `hash`/`eq`.
    ///
    /// This is the insertion path: if the target sub-table is over its fill
    /// threshold, it is split (growing the directory if it was that
    /// sub-table's sole owner) before probing, so the returned entry always
    /// has room to insert into.
    ///
    /// # Errors
    ///
    /// [`Error::AllocationFailed`] if a needed split cannot allocate, and
    /// [`Error::DirectoryOverflow`] if the directory cannot double any
    /// further. The table is usable and unchanged either way.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use ext_hash::hash_table::Entry;
    /// # use ext_hash::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table: HashTable<String> = HashTable::new();
    /// match table.entry(hash_str("key"), |s| s == "key").unwrap() {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert("key".to_string());
    ///     }
    ///     Entry::Occupied(_) => unreachable!(),
    /// }
    ///
    /// match table.entry(hash_str("key"), |s| s == "key").unwrap() {
    ///     Entry::Occupied(entry) => assert_eq!(entry.get(), "key"),
    ///     Entry::Vacant(_) => unreachable!(),
    /// }
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Result<Entry<'_, V>, Error> {
        self.ensure_root()?;

        // Grow before inserting into an over-loaded sub-table.
        let index = dir_index(hash, self.level);
        // SAFETY: directory entries always point at live sub-tables.
        let over = unsafe {
            let sub = self.dir[index].as_ref();
            sub.num_elm + sub.num_tomb >= SPLIT_THRESHOLD
        };
        if over {
            self.split(index)?;
        }

        loop {
            let index = dir_index(hash, self.level);
            let mut ptr = self.dir[index];
            // SAFETY: directory entries always point at live sub-tables, and
            // the exclusive borrow of the table makes this the only live
            // reference.
            let sub = unsafe { ptr.as_mut() };
            match sub.probe_insert(hash, &eq) {
                Probe::Found { group, slot } => {
                    return Ok(Entry::Occupied(OccupiedEntry {
                        table: self,
                        dir_index: index,
                        group,
                        slot,
                    }));
                }
                Probe::Free { group, slot } => {
                    return Ok(Entry::Vacant(VacantEntry {
                        table: self,
                        dir_index: index,
                        hash,
                        group,
                        slot,
                    }));
                }
                // The sub-table is completely full (heavily skewed hashes
                // can outrun the entry-time threshold check). Keep splitting
                // until the probe finds room or the directory bottoms out.
                Probe::Full => self.split(index)?,
            }
        }
    }

    /// Inserts a value, keeping at most one element per equal key.
    ///
    /// If an equal element is already present, the table is unchanged: the
    /// first inserter wins, and the rejected value is handed back alongside
    /// a reference to the survivor.
    ///
    /// # Errors
    ///
    /// As [`HashTable::entry`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use ext_hash::hash_table::HashTable;
    /// # use ext_hash::hash_table::Insert;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// let hash = hash_u64(5);
    ///
    /// assert!(matches!(
    ///     table.insert(hash, 5, |&v| v == 5).unwrap(),
    ///     Insert::Inserted(_),
    /// ));
    /// assert!(matches!(
    ///     table.insert(hash, 5, |&v| v == 5).unwrap(),
    ///     Insert::AlreadyPresent { rejected: 5, .. },
    /// ));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn insert(
        &mut self,
        hash: u64,
        value: V,
        eq: impl Fn(&V) -> bool,
    ) -> Result<Insert<'_, V>, Error> {
        match self.entry(hash, eq)? {
            Entry::Occupied(entry) => Ok(Insert::AlreadyPresent {
                current: entry.into_mut(),
                rejected: value,
            }),
            Entry::Vacant(entry) => Ok(Insert::Inserted(entry.insert(value))),
        }
    }

    /// Retains only the elements for which `f` returns `true`.
    ///
    /// After the sweep, sub-tables left sparse enough are merged with their
    /// siblings, exactly as if the dropped elements had been removed one by
    /// one.
    pub fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) {
        let mut index = 0;
        while index < self.dir.len() {
            let mut ptr = self.dir[index];
            // SAFETY: directory entries always point at live sub-tables, and
            // the exclusive borrow of the table makes this the only live
            // reference.
            let sub = unsafe { ptr.as_mut() };
            let span = 1usize << (self.level - sub.local_level);
            for group in 0..GROUP_COUNT {
                let mut occupied = sub.metas[group].occupied();
                while occupied != 0 {
                    let slot = occupied.trailing_zeros() as usize;
                    occupied &= occupied - 1;
                    // SAFETY: occupied slots are initialized.
                    if !f(unsafe { sub.slots[group][slot].assume_init_mut() }) {
                        // SAFETY: the slot is occupied; the value is dropped
                        // here.
                        drop(unsafe { sub.take_slot(group, slot) });
                        self.populated -= 1;
                    }
                }
            }
            index += span;
        }

        // Merge what the sweep left sparse.
        let mut index = 0;
        while index < self.dir.len() {
            self.compact(index);
            // SAFETY: directory entries always point at live sub-tables.
            let sub = unsafe { self.dir[index].as_ref() };
            // A merge may have widened this run past `index`; realign to its
            // start before stepping to the next run.
            let span = 1usize << (self.level - sub.local_level);
            index = (index & !(span - 1)) + span;
        }
    }

    /// Returns an iterator over all values.
    ///
    /// Order is deterministic for a given table structure: directory order,
    /// then group order within a sub-table, then slot order within a group.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// for k in 0..4u64 {
    ///     // The hash picks group `k`, so iteration follows key order.
    ///     table.entry(k << 8, |&v| v == k).unwrap().or_insert(k);
    /// }
    ///
    /// let keys: Vec<u64> = table.iter().copied().collect();
    /// assert_eq!(keys, vec![0, 1, 2, 3]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        let occupied = if self.dir.is_empty() {
            0
        } else {
            // SAFETY: directory entries always point at live sub-tables.
            unsafe { self.dir[0].as_ref() }.metas[0].occupied()
        };
        Iter {
            table: self,
            dir_index: 0,
            group: 0,
            occupied,
        }
    }

    /// Returns an iterator that removes and yields all values.
    ///
    /// The table is empty once the iterator is consumed or dropped, but
    /// keeps its directory structure and sub-table storage.
    pub fn drain(&mut self) -> Drain<'_, V> {
        let occupied = if self.dir.is_empty() {
            0
        } else {
            // SAFETY: directory entries always point at live sub-tables.
            unsafe { self.dir[0].as_ref() }.metas[0].occupied()
        };
        Drain {
            table: self,
            dir_index: 0,
            group: 0,
            occupied,
        }
    }

    /// Splits the sub-table at `index` in two, doubling the directory first
    /// if that sub-table was its sole owner.
    ///
    /// Live elements are redistributed between the halves by the one
    /// additional hash bit the deeper directory prefix exposes; tombstones
    /// are dropped, which is what makes splitting double as compaction.
    /// On allocation failure everything allocated so far is released and
    /// the original sub-table is left in place. (A directory doubling that
    /// already happened is kept: an oversized directory is harmless.)
    #[cold]
    fn split(&mut self, mut index: usize) -> Result<(), Error> {
        let old_ptr = self.dir[index];
        // SAFETY: directory entries always point at live sub-tables.
        let old_level = unsafe { old_ptr.as_ref().local_level };

        if old_level == self.level {
            if self.level == MAX_LEVEL {
                return Err(Error::DirectoryOverflow);
            }
            self.double_directory();
            index *= 2;
        }

        let new_level = old_level + 1;
        debug_assert!(new_level <= self.level);
        let shift = self.level - new_level;
        let span = 1usize << shift;
        let start = (index >> (shift + 1)) << (shift + 1);

        let low = SubTable::<V>::alloc(new_level)?;
        let high = match SubTable::<V>::alloc(new_level) {
            Ok(high) => high,
            Err(err) => {
                // SAFETY: freshly allocated and still empty.
                unsafe { SubTable::free(low, false) };
                return Err(err);
            }
        };

        // SAFETY: the retiring sub-table is live and disjoint from both
        // fresh halves. Values are moved out slot by slot and the old
        // allocation is freed without running destructors for the moved-out
        // contents.
        unsafe {
            let old = old_ptr.as_ref();
            for group in 0..GROUP_COUNT {
                let mut occupied = old.metas[group].occupied();
                while occupied != 0 {
                    let slot = occupied.trailing_zeros() as usize;
                    occupied &= occupied - 1;
                    let hash = old.hashes[group][slot].assume_init_read();
                    let value = old.slots[group][slot].assume_init_read();
                    let target = if (hash >> (64 - new_level)) & 1 == 0 {
                        low
                    } else {
                        high
                    };
                    (*target.as_ptr()).refile(hash, value);
                }
            }

            for offset in 0..span {
                self.dir[start + offset] = low;
                self.dir[start + span + offset] = high;
            }
            SubTable::free(old_ptr, false);
        }

        Ok(())
    }

    /// Doubles the directory in place, duplicating old slot `i` into new
    /// slots `2i` and `2i + 1`.
    ///
    /// The copy scans high to low so every source slot is read before
    /// either of its destinations is written; this is what keeps alias runs
    /// contiguous through the resize.
    fn double_directory(&mut self) {
        let old_len = self.dir.len();
        self.dir.resize(old_len * 2, NonNull::dangling());
        for i in (0..old_len).rev() {
            let sub = self.dir[i];
            self.dir[2 * i] = sub;
            self.dir[2 * i + 1] = sub;
        }
        self.level += 1;
    }

    /// Merges the sub-table at `index` with its split sibling while both
    /// stay sparse enough, repeating because one merge can enable the next.
    ///
    /// The sibling is the directory run differing in the single bit that
    /// distinguished the two at split time; it is only a valid partner
    /// while it still has the same `local_level` (a deeper sibling has been
    /// split again). Tombstones are dropped by the rebuild. Allocation
    /// failure just ends the loop: shrinking is optional.
    fn compact(&mut self, mut index: usize) {
        loop {
            let sub_ptr = self.dir[index];
            // SAFETY: directory entries always point at live sub-tables.
            let (num_elm, local_level) = unsafe {
                let sub = sub_ptr.as_ref();
                (sub.num_elm, sub.local_level)
            };
            if num_elm > MERGE_THRESHOLD || local_level == 0 {
                return;
            }

            let shift = self.level - local_level;
            let buddy_index = index ^ (1usize << shift);
            let buddy_ptr = self.dir[buddy_index];
            debug_assert!(buddy_ptr != sub_ptr);
            // SAFETY: as above.
            let (buddy_elm, buddy_level) = unsafe {
                let buddy = buddy_ptr.as_ref();
                (buddy.num_elm, buddy.local_level)
            };
            if buddy_level != local_level || num_elm + buddy_elm > MERGE_FIT {
                return;
            }

            let Ok(merged) = SubTable::<V>::alloc(local_level - 1) else {
                return;
            };

            let start = (index >> (shift + 1)) << (shift + 1);
            let span = 1usize << (shift + 1);

            // SAFETY: both retiring sub-tables are live and disjoint from
            // the fresh one. Values are moved out slot by slot and the old
            // allocations are freed without running destructors for the
            // moved-out contents.
            unsafe {
                for ptr in [sub_ptr, buddy_ptr] {
                    let retiring = ptr.as_ref();
                    for group in 0..GROUP_COUNT {
                        let mut occupied = retiring.metas[group].occupied();
                        while occupied != 0 {
                            let slot = occupied.trailing_zeros() as usize;
                            occupied &= occupied - 1;
                            let hash = retiring.hashes[group][slot].assume_init_read();
                            let value = retiring.slots[group][slot].assume_init_read();
                            (*merged.as_ptr()).refile(hash, value);
                        }
                    }
                }

                for offset in 0..span {
                    self.dir[start + offset] = merged;
                }
                SubTable::free(sub_ptr, false);
                SubTable::free(buddy_ptr, false);
            }

            index = start;
        }
    }

    /// Recounts every structural invariant. Test-only.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        if self.dir.is_empty() {
            assert_eq!(self.populated, 0);
            return;
        }
        assert_eq!(self.dir.len(), 1usize << self.level);

        let mut total = 0usize;
        let mut index = 0;
        while index < self.dir.len() {
            let ptr = self.dir[index];
            // SAFETY: directory entries always point at live sub-tables.
            let sub = unsafe { ptr.as_ref() };
            assert!(sub.local_level <= self.level);
            let span = 1usize << (self.level - sub.local_level);
            assert_eq!(index % span, 0, "alias run must be aligned");
            for offset in 0..span {
                assert_eq!(self.dir[index + offset], ptr, "alias run must be contiguous");
            }
            if index + span < self.dir.len() {
                assert_ne!(self.dir[index + span], ptr, "alias run must be maximal");
            }

            let mut live = 0u32;
            let mut ever_full_groups = 0u32;
            let mut free_in_ever_full = 0u32;
            for group in 0..GROUP_COUNT {
                let meta = sub.metas[group];
                live += meta.occupied().count_ones();
                if meta.ever_full() {
                    ever_full_groups += 1;
                    free_in_ever_full += GROUP_SLOTS as u32 - meta.occupied().count_ones();
                }
                let mut occupied = meta.occupied();
                while occupied != 0 {
                    let slot = occupied.trailing_zeros() as usize;
                    occupied &= occupied - 1;
                    // SAFETY: occupied slots have initialized hashes.
                    let hash = unsafe { sub.hashes[group][slot].assume_init_read() };
                    assert_eq!(meta.tag(slot), hash as u8, "tag must match stored hash");
                    let di = dir_index(hash, self.level);
                    assert!(
                        index <= di && di < index + span,
                        "element must live in its own directory run"
                    );
                }
            }
            assert_eq!(live, sub.num_elm);
            assert_eq!(ever_full_groups, sub.num_ever_full);
            assert!(sub.num_tomb <= free_in_ever_full);

            total += sub.num_elm as usize;
            index += span;
        }
        assert_eq!(total, self.populated);
    }

    /// Storage statistics. Test-only.
    #[cfg(test)]
    pub(crate) fn debug_stats(&self) -> DebugStats {
        let mut stats = DebugStats {
            populated: self.populated,
            level: self.level,
            sub_tables: 0,
            total_slots: 0,
            tombstones: 0,
            ever_full_groups: 0,
        };
        let mut index = 0;
        while index < self.dir.len() {
            // SAFETY: directory entries always point at live sub-tables.
            let sub = unsafe { self.dir[index].as_ref() };
            stats.sub_tables += 1;
            stats.total_slots += SUB_TABLE_SLOTS;
            stats.tombstones += sub.num_tomb as usize;
            stats.ever_full_groups += sub.num_ever_full as usize;
            index += 1usize << (self.level - sub.local_level);
        }
        stats
    }
}

/// Storage statistics for tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct DebugStats {
    pub populated: usize,
    pub level: u32,
    pub sub_tables: usize,
    pub total_slots: usize,
    pub tombstones: usize,
    pub ever_full_groups: usize,
}

/// Outcome of [`HashTable::insert`].
pub enum Insert<'a, V> {
    /// The value was inserted; the reference points at its new home.
    Inserted(&'a mut V),
    /// An equal element was already present. The table is unchanged: the
    /// original element survives and the attempted value is handed back.
    AlreadyPresent {
        /// The element that was already in the table.
        current: &'a mut V,
        /// The value that was not inserted.
        rejected: V,
    },
}

/// A view into a single position in the table, vacant or occupied.
///
/// Constructed by [`HashTable::entry`].
pub enum Entry<'a, V> {
    /// No matching element; holds the slot a fresh insert will use.
    Vacant(VacantEntry<'a, V>),
    /// A matching element is present.
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `default` if the entry is vacant; returns a mutable
    /// reference to the element either way.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant; returns a
    /// mutable reference to the element either way.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to the element if one is present, returning a mutable
    /// reference to it; returns `None` without inserting otherwise.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if the entry is vacant; returns a mutable
    /// reference to the element either way.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into an occupied table position.
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    dir_index: usize,
    group: usize,
    slot: usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Returns a reference to the element.
    pub fn get(&self) -> &V {
        // SAFETY: the entry's position was validated by the probe, and the
        // borrow of the table pins the structure.
        unsafe {
            self.table.dir[self.dir_index].as_ref().slots[self.group][self.slot].assume_init_ref()
        }
    }

    /// Returns a mutable reference to the element.
    pub fn get_mut(&mut self) -> &mut V {
        let mut ptr = self.table.dir[self.dir_index];
        // SAFETY: as in `get`; the exclusive borrow makes this the only
        // live reference.
        unsafe { ptr.as_mut().slots[self.group][self.slot].assume_init_mut() }
    }

    /// Converts the entry into a mutable reference with the table borrow's
    /// lifetime.
    pub fn into_mut(self) -> &'a mut V {
        let mut ptr = self.table.dir[self.dir_index];
        // SAFETY: as in `get_mut`.
        unsafe { ptr.as_mut().slots[self.group][self.slot].assume_init_mut() }
    }

    /// Removes the element and returns it.
    ///
    /// Like [`HashTable::remove`], this may merge the sub-table with its
    /// split sibling.
    pub fn remove(self) -> V {
        let table = self.table;
        let mut ptr = table.dir[self.dir_index];
        // SAFETY: the entry's position was validated by the probe and
        // refers to an occupied slot.
        let value = unsafe { ptr.as_mut().take_slot(self.group, self.slot) };
        table.populated -= 1;
        table.compact(self.dir_index);
        value
    }
}

/// A view into a vacant table position.
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    dir_index: usize,
    hash: u64,
    group: usize,
    slot: usize,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts `value` and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        let mut ptr = self.table.dir[self.dir_index];
        // SAFETY: the probe chose a free slot, and the entry's exclusive
        // borrow pins the structure between the probe and this write.
        unsafe {
            let sub = ptr.as_mut();
            debug_assert!(!sub.metas[self.group].is_occupied(self.slot));

            // A free slot in a group that has overflowed is a tombstone
            // being recycled.
            if sub.metas[self.group].ever_full() {
                debug_assert!(sub.num_tomb > 0);
                sub.num_tomb -= 1;
            }
            sub.metas[self.group].set_tag(self.slot, hash_tag(self.hash));
            sub.metas[self.group].set_occupied(self.slot);
            sub.hashes[self.group][self.slot] = MaybeUninit::new(self.hash);
            sub.slots[self.group][self.slot] = MaybeUninit::new(value);
            sub.num_elm += 1;
            self.table.populated += 1;

            sub.slots[self.group][self.slot].assume_init_mut()
        }
    }
}

/// An iterator over the values in a [`HashTable`].
///
/// Created by [`HashTable::iter`]. Yields values in directory, then group,
/// then slot order; aliased directory slots are visited once.
pub struct Iter<'a, V> {
    table: &'a HashTable<V>,
    dir_index: usize,
    group: usize,
    /// Slot bits of the current group not yet yielded.
    occupied: u8,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let dir = &self.table.dir;
        if dir.is_empty() {
            return None;
        }

        while self.occupied == 0 {
            self.group += 1;
            if self.group == GROUP_COUNT {
                self.group = 0;
                // Skip directory slots aliasing the sub-table just
                // finished.
                loop {
                    self.dir_index += 1;
                    if self.dir_index >= dir.len() {
                        return None;
                    }
                    if dir[self.dir_index] != dir[self.dir_index - 1] {
                        break;
                    }
                }
            }
            // SAFETY: directory entries always point at live sub-tables.
            self.occupied = unsafe { dir[self.dir_index].as_ref() }.metas[self.group].occupied();
        }

        let slot = self.occupied.trailing_zeros() as usize;
        self.occupied &= self.occupied - 1;
        // SAFETY: the occupied mask only reports initialized slots, and the
        // shared borrow keeps the table unchanged while the iterator lives.
        Some(unsafe { dir[self.dir_index].as_ref().slots[self.group][slot].assume_init_ref() })
    }
}

/// A draining iterator over the values in a [`HashTable`].
///
/// Created by [`HashTable::drain`]. Yields owned values in iteration order;
/// once consumed or dropped, the table is empty but keeps its structure.
pub struct Drain<'a, V> {
    table: &'a mut HashTable<V>,
    dir_index: usize,
    group: usize,
    occupied: u8,
}

impl<V> Iterator for Drain<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.table.dir.is_empty() {
            return None;
        }

        while self.occupied == 0 {
            self.group += 1;
            if self.group == GROUP_COUNT {
                self.group = 0;
                loop {
                    self.dir_index += 1;
                    if self.dir_index >= self.table.dir.len() {
                        return None;
                    }
                    if self.table.dir[self.dir_index] != self.table.dir[self.dir_index - 1] {
                        break;
                    }
                }
            }
            // SAFETY: directory entries always point at live sub-tables.
            self.occupied =
                unsafe { self.table.dir[self.dir_index].as_ref() }.metas[self.group].occupied();
        }

        let slot = self.occupied.trailing_zeros() as usize;
        self.occupied &= self.occupied - 1;
        let mut ptr = self.table.dir[self.dir_index];
        // SAFETY: the occupied snapshot only reports slots that were live
        // when the group was entered and none is taken twice; the exclusive
        // borrow makes this the only live reference.
        let value = unsafe { ptr.as_mut().take_slot(self.group, slot) };
        self.table.populated -= 1;
        Some(value)
    }
}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}

        // Every value is out; scrub the leftover tombstone and overflow
        // bookkeeping so the empty sub-tables probe like fresh ones.
        let mut index = 0;
        while index < self.table.dir.len() {
            let mut ptr = self.table.dir[index];
            // SAFETY: directory entries always point at live sub-tables,
            // and the drain holds the exclusive table borrow.
            let sub = unsafe { ptr.as_mut() };
            sub.metas = [GroupMeta::empty(); GROUP_COUNT];
            sub.num_elm = 0;
            sub.num_tomb = 0;
            sub.num_ever_full = 0;
            index += 1usize << (self.table.level - sub.local_level);
        }
    }
}
