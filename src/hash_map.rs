use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::hash_table::Entry as TableEntry;
use crate::hash_table::Error;
use crate::hash_table::HashTable;
use crate::hash_table::OccupiedEntry as TableOccupiedEntry;
use crate::hash_table::VacantEntry as TableVacantEntry;

#[cold]
#[inline(never)]
fn growth_failed(err: Error) -> ! {
    panic!("hash table growth failed: {err}")
}

/// A hash map implemented on the extendible hash table.
///
/// `HashMap<K, V, S>` stores key-value pairs where keys implement
/// `Hash + Eq` and uses a configurable hasher builder `S` to hash keys.
/// Storage grows one sub-table split at a time, so inserts never pay for a
/// whole-map rehash.
///
/// With the default `foldhash` feature, `ext_hash::DefaultHashBuilder` is a
/// ready-made `S`.
#[derive(Clone)]
pub struct HashMap<K, V, S> {
    table: HashTable<(K, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates an empty map with the default hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::DefaultHashBuilder;
    /// # use ext_hash::HashMap;
    /// #
    /// let map: HashMap<i32, String, DefaultHashBuilder> = HashMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use ext_hash::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: HashTable::new(),
            hash_builder,
        }
    }

    /// Returns the number of key-value pairs in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no key-value pairs.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Total slots across the map's sub-tables.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all key-value pairs and releases all storage.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Inserts a key-value pair, returning the previous value for the key
    /// if there was one.
    ///
    /// # Panics
    ///
    /// Panics if the table cannot grow (allocation failure or directory
    /// exhaustion).
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::DefaultHashBuilder;
    /// # use ext_hash::HashMap;
    /// #
    /// let mut map: HashMap<&str, i32, DefaultHashBuilder> = HashMap::new();
    /// assert_eq!(map.insert("a", 1), None);
    /// assert_eq!(map.insert("a", 2), Some(1));
    /// assert_eq!(map.get(&"a"), Some(&2));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entry(key) {
            Entry::Occupied(mut entry) => Some(entry.insert(value)),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Returns a reference to the value for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::DefaultHashBuilder;
    /// # use ext_hash::HashMap;
    /// #
    /// let mut map: HashMap<&str, i32, DefaultHashBuilder> = HashMap::new();
    /// map.insert("a", 1);
    /// assert_eq!(map.get(&"a"), Some(&1));
    /// assert_eq!(map.get(&"b"), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hash_builder.hash_one(key);
        self.table.find(hash, |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_builder.hash_one(key);
        self.table.find_mut(hash, |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the stored key-value pair matching `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let hash = self.hash_builder.hash_one(key);
        self.table.find(hash, |(k, _)| k == key).map(|(k, v)| (k, v))
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key` from the map, returning its value if it was present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::DefaultHashBuilder;
    /// # use ext_hash::HashMap;
    /// #
    /// let mut map: HashMap<&str, i32, DefaultHashBuilder> = HashMap::new();
    /// map.insert("a", 1);
    /// assert_eq!(map.remove(&"a"), Some(1));
    /// assert_eq!(map.remove(&"a"), None);
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key` from the map, returning the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hash_builder.hash_one(key);
        self.table.remove(hash, |(k, _)| k == key)
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// # Panics
    ///
    /// Panics if the table cannot grow (allocation failure or directory
    /// exhaustion).
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::DefaultHashBuilder;
    /// # use ext_hash::HashMap;
    /// #
    /// let mut map: HashMap<&str, i32, DefaultHashBuilder> = HashMap::new();
    /// *map.entry("count").or_insert(0) += 1;
    /// *map.entry("count").or_insert(0) += 1;
    /// assert_eq!(map.get(&"count"), Some(&2));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V> {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry(hash, |(k, _)| *k == key) {
            Ok(TableEntry::Occupied(inner)) => Entry::Occupied(OccupiedEntry { inner }),
            Ok(TableEntry::Vacant(inner)) => Entry::Vacant(VacantEntry { key, inner }),
            Err(err) => growth_failed(err),
        }
    }

    /// Retains only the pairs for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        self.table.retain(|entry| f(&entry.0, &mut entry.1));
    }

    /// Returns an iterator over the map's key-value pairs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ext_hash::DefaultHashBuilder;
    /// # use ext_hash::HashMap;
    /// #
    /// let mut map: HashMap<&str, i32, DefaultHashBuilder> = HashMap::new();
    /// map.insert("a", 1);
    /// map.insert("b", 2);
    ///
    /// let mut pairs: Vec<(&str, i32)> = map.iter().map(|(&k, &v)| (k, v)).collect();
    /// pairs.sort();
    /// assert_eq!(pairs, [("a", 1), ("b", 2)]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the map's keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the map's values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator that removes and yields all key-value pairs.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A view into a single entry in the map, which may be vacant or occupied.
///
/// Constructed by [`HashMap::entry`].
pub enum Entry<'a, K, V> {
    /// The key is not present.
    Vacant(VacantEntry<'a, K, V>),
    /// The key is present.
    Occupied(OccupiedEntry<'a, K, V>),
}

impl<'a, K, V> Entry<'a, K, V> {
    /// Inserts `default` if the entry is vacant; returns a mutable
    /// reference to the value either way.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant; returns a
    /// mutable reference to the value either way.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to the value if the entry is occupied, then returns the
    /// entry.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            vacant => vacant,
        }
    }

    /// Inserts `V::default()` if the entry is vacant; returns a mutable
    /// reference to the value either way.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into an occupied map entry.
pub struct OccupiedEntry<'a, K, V> {
    inner: TableOccupiedEntry<'a, (K, V)>,
}

impl<'a, K, V> OccupiedEntry<'a, K, V> {
    /// Returns the entry's key.
    pub fn key(&self) -> &K {
        &self.inner.get().0
    }

    /// Returns a reference to the value.
    pub fn get(&self) -> &V {
        &self.inner.get().1
    }

    /// Returns a mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.inner.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value with the
    /// map borrow's lifetime.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.inner.into_mut().1
    }

    /// Replaces the value, returning the old one.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }

    /// Removes the entry, returning the value.
    pub fn remove(self) -> V {
        self.inner.remove().1
    }

    /// Removes the entry, returning the stored key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.inner.remove()
    }
}

/// A view into a vacant map entry.
pub struct VacantEntry<'a, K, V> {
    key: K,
    inner: TableVacantEntry<'a, (K, V)>,
}

impl<'a, K, V> VacantEntry<'a, K, V> {
    /// Returns the key that would be inserted.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes the key back out of the entry.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts `value` under the entry's key and returns a mutable
    /// reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.inner.insert((self.key, value)).1
    }
}

/// An iterator over a map's key-value pairs.
///
/// Created by [`HashMap::iter`].
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| (&entry.0, &entry.1))
    }
}

/// An iterator over a map's keys.
///
/// Created by [`HashMap::keys`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// An iterator over a map's values.
///
/// Created by [`HashMap::values`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// A draining iterator over a map's key-value pairs.
///
/// Created by [`HashMap::drain`].
pub struct Drain<'a, K, V> {
    inner: crate::hash_table::Drain<'a, (K, V)>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
