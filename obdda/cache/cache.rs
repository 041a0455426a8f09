use std::fmt::Display;
use std::mem::size_of;

use derive_more::derive::From;

use crate::component::signature::encode;
use crate::component::{Component, PackingContext, Signature};

const INITIAL_BUCKETS: usize = 1 << 10;
const MAX_LOAD: usize = 2;

/// Position of an entry in the [`ComponentCache`]. Positions are dense and
/// change when entries are erased or the cache is cleared; every such
/// operation reports how positions moved.
#[derive(PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Debug, Hash, From)]
pub struct CacheLoc(pub(crate) u32);

impl CacheLoc {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for CacheLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Outcome of erasing an entry. Erasure swaps the last entry into the freed
/// position: whoever held `moved_from` must now hold `erased` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erasure {
    pub erased: CacheLoc,
    pub moved_from: Option<CacheLoc>,
}

impl Erasure {
    /// New position of an entry previously at `loc`, `None` if it was the erased one.
    #[must_use]
    pub fn relocate(&self, loc: CacheLoc) -> Option<CacheLoc> {
        if loc == self.erased {
            None
        } else if Some(loc) == self.moved_from {
            Some(self.erased)
        } else {
            Some(loc)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Links {
    parent: Option<CacheLoc>,
    first_child: Option<CacheLoc>,
    next_sibling: Option<CacheLoc>,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    hash: u64,
    signature: Signature,
    /// `None` while the component is still being solved.
    value: Option<V>,
    links: Links,
}

impl<V> Entry<V> {
    fn bytes(&self) -> usize {
        size_of::<Entry<V>>() + self.signature.heap_bytes()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub lookups: usize,
    pub hits: usize,
    pub misses: usize,
    pub erasures: usize,
    pub clears: usize,
}

/// Hash table from component signatures to the value of the component.
///
/// Entries live in a dense vector and the buckets hold their positions.
/// Pending entries can be linked into a tree mirroring the decomposition so
/// that abandoning a component drops everything solved below it.
#[derive(Debug)]
pub struct ComponentCache<V> {
    ctx: PackingContext,
    entries: Vec<Entry<V>>,
    buckets: Vec<Vec<u32>>,
    entry_bytes: usize,
    bucket_bytes: usize,
    statistics: CacheStatistics,
}

impl<V> ComponentCache<V> {
    #[must_use]
    pub fn new(ctx: PackingContext) -> Self {
        let mut cache = ComponentCache {
            ctx,
            entries: Vec::new(),
            buckets: Vec::new(),
            entry_bytes: 0,
            bucket_bytes: 0,
            statistics: CacheStatistics::default(),
        };
        cache.rebuild_buckets(INITIAL_BUCKETS);
        cache
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn statistics(&self) -> CacheStatistics {
        self.statistics
    }

    /// Approximate heap footprint of entries, signatures and buckets.
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        self.entry_bytes + self.bucket_bytes
    }

    /// Look the component up and insert it as pending on a miss. The
    /// component remembers the returned position.
    pub fn hit_or_insert(&mut self, component: &mut Component) -> CacheLoc {
        let signature = encode(component, &self.ctx);
        let hash = signature.fingerprint();
        self.statistics.lookups += 1;

        let loc = if let Some(loc) = self.find(hash, &signature) {
            if self.entries[loc.index()].value.is_some() {
                self.statistics.hits += 1;
            } else {
                self.statistics.misses += 1;
            }
            loc
        } else {
            self.statistics.misses += 1;
            self.insert(hash, signature)
        };

        component.set_caching_loc(Some(loc));
        loc
    }

    #[cfg(test)]
    pub(crate) fn lookup(&self, component: &Component) -> Option<CacheLoc> {
        let signature = encode(component, &self.ctx);
        self.find(signature.fingerprint(), &signature)
    }

    fn find(&self, hash: u64, signature: &Signature) -> Option<CacheLoc> {
        self.buckets[self.bucket_of(hash)]
            .iter()
            .map(|&idx| CacheLoc(idx))
            .find(|loc| {
                let entry = &self.entries[loc.index()];
                entry.hash == hash && entry.signature == *signature
            })
    }

    fn insert(&mut self, hash: u64, signature: Signature) -> CacheLoc {
        if self.entries.len() >= self.buckets.len() * MAX_LOAD {
            self.rebuild_buckets(self.buckets.len() * 2);
        }

        let loc = CacheLoc(self.entries.len() as u32);
        let entry = Entry {
            hash,
            signature,
            value: None,
            links: Links::default(),
        };
        self.entry_bytes += entry.bytes();
        self.entries.push(entry);
        self.push_to_bucket(hash, loc);
        loc
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn push_to_bucket(&mut self, hash: u64, loc: CacheLoc) {
        let bucket = self.bucket_of(hash);
        let bucket = &mut self.buckets[bucket];
        let before = bucket.capacity();
        bucket.push(loc.0);
        self.bucket_bytes += (bucket.capacity() - before) * size_of::<u32>();
    }

    fn rebuild_buckets(&mut self, count: usize) {
        debug_assert!(count.is_power_of_two());
        self.buckets = vec![Vec::new(); count];
        self.bucket_bytes = count * size_of::<Vec<u32>>();
        self.entry_bytes = 0;
        for idx in 0..self.entries.len() {
            let hash = self.entries[idx].hash;
            self.entry_bytes += self.entries[idx].bytes();
            self.push_to_bucket(hash, CacheLoc(idx as u32));
        }
        tracing::trace!(buckets = count, entries = self.entries.len(), "rebuilt cache buckets");
    }

    /// Value of a solved component, `None` while pending.
    #[must_use]
    pub fn value(&self, loc: CacheLoc) -> Option<&V> {
        self.entries[loc.index()].value.as_ref()
    }

    #[must_use]
    pub fn is_known(&self, loc: CacheLoc) -> bool {
        self.entries[loc.index()].value.is_some()
    }

    /// Record the value of a pending component.
    pub fn store(&mut self, loc: CacheLoc, value: V) {
        let entry = &mut self.entries[loc.index()];
        debug_assert!(entry.value.is_none(), "cache entry {loc} written twice");
        entry.value = Some(value);
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries
            .iter_mut()
            .filter_map(|entry| entry.value.as_mut())
    }

    /// Component stored at `loc`.
    #[cfg(test)]
    pub(crate) fn component(&self, loc: CacheLoc) -> Component {
        let signature = &self.entries[loc.index()].signature;
        let (vars, clauses) = crate::component::signature::decode(signature, &self.ctx);
        Component::new(vars, clauses)
    }

    /// Remove the entry at `loc`. Its links are dropped first, and the last
    /// entry is moved into the hole.
    pub fn erase(&mut self, loc: CacheLoc) -> Erasure {
        self.set_isolated(loc);

        let hash = self.entries[loc.index()].hash;
        let bucket = self.bucket_of(hash);
        if let Some(pos) = self.buckets[bucket].iter().position(|&idx| idx == loc.0) {
            self.buckets[bucket].swap_remove(pos);
        }

        self.entry_bytes -= self.entries[loc.index()].bytes();
        self.entries.swap_remove(loc.index());
        self.statistics.erasures += 1;

        let last = CacheLoc(self.entries.len() as u32);
        if last == loc {
            return Erasure {
                erased: loc,
                moved_from: None,
            };
        }

        let hash = self.entries[loc.index()].hash;
        let bucket = self.bucket_of(hash);
        if let Some(slot) = self.buckets[bucket].iter_mut().find(|idx| **idx == last.0) {
            *slot = loc.0;
        }

        let links = self.entries[loc.index()].links;
        if let Some(parent) = links.parent {
            if self.entries[parent.index()].links.first_child == Some(last) {
                self.entries[parent.index()].links.first_child = Some(loc);
            } else {
                let mut sibling = self.entries[parent.index()].links.first_child;
                while let Some(current) = sibling {
                    let next = self.entries[current.index()].links.next_sibling;
                    if next == Some(last) {
                        self.entries[current.index()].links.next_sibling = Some(loc);
                        break;
                    }
                    sibling = next;
                }
            }
        }
        for child in self.children(loc) {
            self.entries[child.index()].links.parent = Some(loc);
        }

        Erasure {
            erased: loc,
            moved_from: Some(last),
        }
    }

    /// Drop every entry except those at `keep`. Returns the new position of
    /// each kept entry, in the order of `keep`. Links between kept entries survive.
    pub fn clear_keeping(&mut self, keep: &[CacheLoc]) -> Vec<CacheLoc> {
        let mut old = std::mem::take(&mut self.entries);
        let mut remap: Vec<Option<CacheLoc>> = vec![None; old.len()];
        let mut parents = Vec::with_capacity(keep.len());
        let mut kept = Vec::with_capacity(keep.len());

        for &loc in keep {
            let new = if let Some(new) = remap[loc.index()] {
                new
            } else {
                let entry = &mut old[loc.index()];
                let new = CacheLoc(self.entries.len() as u32);
                parents.push(entry.links.parent);
                self.entries.push(Entry {
                    hash: entry.hash,
                    signature: std::mem::replace(&mut entry.signature, Signature::Small(0)),
                    value: entry.value.take(),
                    links: Links::default(),
                });
                remap[loc.index()] = Some(new);
                new
            };
            kept.push(new);
        }

        for (idx, parent) in parents.into_iter().enumerate() {
            if let Some(parent) = parent.and_then(|parent| remap[parent.index()]) {
                self.connect_child(parent, CacheLoc(idx as u32));
            }
        }

        let buckets = (self.entries.len() / MAX_LOAD + 1)
            .next_power_of_two()
            .max(INITIAL_BUCKETS);
        self.rebuild_buckets(buckets);
        self.statistics.clears += 1;
        tracing::debug!(
            dropped = old.len() - self.entries.len(),
            kept = self.entries.len(),
            "cleared component cache"
        );

        kept
    }

    #[must_use]
    pub fn parent(&self, loc: CacheLoc) -> Option<CacheLoc> {
        self.entries[loc.index()].links.parent
    }

    #[must_use]
    pub fn children(&self, loc: CacheLoc) -> Vec<CacheLoc> {
        let mut children = Vec::new();
        let mut child = self.entries[loc.index()].links.first_child;
        while let Some(current) = child {
            children.push(current);
            child = self.entries[current.index()].links.next_sibling;
        }
        children
    }

    /// Attach `child` under `parent`.
    pub fn connect_child(&mut self, parent: CacheLoc, child: CacheLoc) {
        debug_assert_ne!(parent, child);
        debug_assert!(self.parent(child).is_none(), "{child} already has a parent");

        match self.entries[parent.index()].links.first_child {
            Some(first) => self.add_sibling(first, child),
            None => {
                self.entries[parent.index()].links.first_child = Some(child);
                self.entries[child.index()].links.parent = Some(parent);
            }
        }
    }

    /// Insert `sibling` right after `loc` under the same parent.
    pub fn add_sibling(&mut self, loc: CacheLoc, sibling: CacheLoc) {
        let links = self.entries[loc.index()].links;
        let sibling_links = &mut self.entries[sibling.index()].links;
        sibling_links.parent = links.parent;
        sibling_links.next_sibling = links.next_sibling;
        self.entries[loc.index()].links.next_sibling = Some(sibling);
    }

    /// Detach `loc` from its parent. Its own children stay attached.
    pub fn disconnect_parent(&mut self, loc: CacheLoc) {
        let links = self.entries[loc.index()].links;
        let Some(parent) = links.parent else {
            return;
        };

        if self.entries[parent.index()].links.first_child == Some(loc) {
            self.entries[parent.index()].links.first_child = links.next_sibling;
        } else {
            let mut sibling = self.entries[parent.index()].links.first_child;
            while let Some(current) = sibling {
                let next = self.entries[current.index()].links.next_sibling;
                if next == Some(loc) {
                    self.entries[current.index()].links.next_sibling = links.next_sibling;
                    break;
                }
                sibling = next;
            }
        }

        let links = &mut self.entries[loc.index()].links;
        links.parent = None;
        links.next_sibling = None;
    }

    /// Detach `loc` from its parent and from all of its children.
    pub fn set_isolated(&mut self, loc: CacheLoc) {
        self.disconnect_parent(loc);
        for child in self.children(loc) {
            let links = &mut self.entries[child.index()].links;
            links.parent = None;
            links.next_sibling = None;
        }
        self.entries[loc.index()].links.first_child = None;
    }

    /// Erase `root` and everything linked below it. Erasures are applied from
    /// the highest position down so no pending position is moved, and are
    /// returned in the order they happened.
    pub fn reset_subtree(&mut self, root: CacheLoc) -> Vec<Erasure> {
        let mut subtree = vec![root];
        let mut next = 0;
        while next < subtree.len() {
            let children = self.children(subtree[next]);
            subtree.extend(children);
            next += 1;
        }

        subtree.sort_unstable_by(|a, b| b.cmp(a));
        subtree.into_iter().map(|loc| self.erase(loc)).collect()
    }
}
