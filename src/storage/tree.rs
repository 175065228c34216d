//! Self-Balancing Binary Search Tree Engine
//!
//! An AVL-style tree ordered by record key. Nodes live in an arena and refer
//! to each other by [`NodeId`], so parent back-links need neither `Rc` nor
//! raw pointers. Freed ids go on a free list and are handed out again by later
//! inserts; every other id stays valid.
//!
//! ## Cached Depths
//!
//! Every node caches the height of both subtrees, the left one negated:
//!
//! ```text
//!            d (-2, +1)          balance = left_depth + right_depth
//!           / \
//!   (-1,+0) b   e (0,0)          d: -2 + 1 = -1
//!          /
//!   (0,0) a
//! ```
//!
//! After a structural change the caches are repaired bottom-up from the
//! children's caches, never by rescanning a subtree. A node whose balance
//! reaches ±2 is rotated on the spot:
//!
//! - heavy child leaning the same way (or level): single rotation
//! - heavy child leaning the other way: double rotation, child first
//!
//! ## Deletion
//!
//! A node with at most one child is replaced by that child. A node with two
//! children is replaced by its in-order successor (the leftmost node of its
//! right subtree), which is first unhooked from its own position. Rebalancing
//! then runs from the lowest node whose children changed up to the root.

use crate::error::{Result, StoreError};
use crate::storage::dump;
use crate::storage::expiry::{Clock, ExpiryTimer};
use crate::storage::record::{Record, RecordFilter, RecordPatch};
use crate::storage::{EngineKind, KeyValueStore};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, error, warn};

/// Stable handle to a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Position of an in-order walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// On a live node
    At(NodeId),
    /// Past the last record
    End,
}

#[derive(Debug)]
struct Node {
    record: Record,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    /// Height of the left subtree, negated
    left_depth: i32,
    /// Height of the right subtree
    right_depth: i32,
}

impl Node {
    fn new(record: Record, parent: Option<NodeId>) -> Self {
        Self {
            record,
            parent,
            left: None,
            right: None,
            left_depth: 0,
            right_depth: 0,
        }
    }

    #[inline]
    fn balance(&self) -> i32 {
        self.left_depth + self.right_depth
    }

    #[inline]
    fn height(&self) -> i32 {
        1 + (-self.left_depth).max(self.right_depth)
    }
}

/// The arena and the tree shape, without expiry.
#[derive(Debug)]
struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
    max_nodes: usize,
}

impl Tree {
    fn new(max_nodes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            max_nodes,
        }
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("dangling node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("dangling node id")
    }

    fn alloc(&mut self, record: Record, parent: Option<NodeId>) -> Result<NodeId> {
        if self.len >= self.max_nodes {
            return Err(StoreError::CapacityExceeded {
                max: self.max_nodes,
            });
        }

        let node = Some(Node::new(record, parent));
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        };
        self.len += 1;
        Ok(id)
    }

    fn release(&mut self, id: NodeId) -> Record {
        let node = self.nodes[id.0].take().expect("dangling node id");
        self.free.push(id);
        self.len -= 1;
        node.record
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    fn find(&self, key: &str) -> Option<NodeId> {
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = self.node(id);
            cur = match key.cmp(node.record.key.as_str()) {
                Ordering::Equal => return Some(id),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        None
    }

    /// Attaches `record` as a new leaf. Returns `None` if the key is taken.
    fn insert(&mut self, record: Record) -> Result<Option<NodeId>> {
        let Some(mut cur) = self.root else {
            let id = self.alloc(record, None)?;
            self.root = Some(id);
            return Ok(Some(id));
        };

        loop {
            let node = self.node(cur);
            let (next, go_left) = match record.key.cmp(&node.record.key) {
                Ordering::Equal => return Ok(None),
                Ordering::Less => (node.left, true),
                Ordering::Greater => (node.right, false),
            };

            match next {
                Some(child) => cur = child,
                None => {
                    let id = self.alloc(record, Some(cur))?;
                    if go_left {
                        self.node_mut(cur).left = Some(id);
                    } else {
                        self.node_mut(cur).right = Some(id);
                    }
                    self.rebalance(Some(id));
                    return Ok(Some(id));
                }
            }
        }
    }

    /// Unlinks `id` from the tree and returns its record.
    fn remove(&mut self, id: NodeId) -> Record {
        let (parent, left, right) = {
            let node = self.node(id);
            (node.parent, node.left, node.right)
        };

        let (replacement, rebalance_from) = match (left, right) {
            (None, None) => (None, parent),
            (Some(child), None) | (None, Some(child)) => (Some(child), parent),
            (Some(left), Some(right)) => {
                let successor = self.leftmost(right);
                if successor == right {
                    self.node_mut(successor).left = Some(left);
                    self.node_mut(left).parent = Some(successor);
                    (Some(successor), Some(successor))
                } else {
                    // The successor has no left child; its right subtree takes
                    // its place under its old parent.
                    let above = self.node(successor).parent.expect("successor below right child");
                    let orphan = self.node(successor).right;
                    self.node_mut(above).left = orphan;
                    if let Some(orphan) = orphan {
                        self.node_mut(orphan).parent = Some(above);
                    }

                    let node = self.node_mut(successor);
                    node.left = Some(left);
                    node.right = Some(right);
                    self.node_mut(left).parent = Some(successor);
                    self.node_mut(right).parent = Some(successor);
                    (Some(successor), Some(above))
                }
            }
        };

        self.replace_child(parent, id, replacement);
        let record = self.release(id);
        self.rebalance(rebalance_from);
        record
    }

    /// Points `parent`'s link to `old` (or the root) at `new`.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = self.node_mut(p);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
        if let Some(new) = new {
            self.node_mut(new).parent = parent;
        }
    }

    /// Recomputes the cached depths of `id` from its children's caches.
    fn refresh(&mut self, id: NodeId) {
        let (left, right) = {
            let node = self.node(id);
            (node.left, node.right)
        };
        let left_depth = left.map_or(0, |l| -self.node(l).height());
        let right_depth = right.map_or(0, |r| self.node(r).height());

        let node = self.node_mut(id);
        node.left_depth = left_depth;
        node.right_depth = right_depth;
    }

    /// Walks from `start` to the root, repairing caches and rotating.
    fn rebalance(&mut self, start: Option<NodeId>) {
        let mut cur = start;
        while let Some(id) = cur {
            self.refresh(id);
            let balance = self.node(id).balance();

            let top = if balance <= -2 {
                let left = self.node(id).left.expect("left-heavy node without left child");
                if self.node(left).balance() > 0 {
                    self.rotate_left(left);
                }
                self.rotate_right(id)
            } else if balance >= 2 {
                let right = self.node(id).right.expect("right-heavy node without right child");
                if self.node(right).balance() < 0 {
                    self.rotate_right(right);
                }
                self.rotate_left(id)
            } else {
                id
            };

            cur = self.node(top).parent;
        }
    }

    /// Lifts `id`'s right child into its place. Returns the new subtree root.
    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let parent = self.node(id).parent;
        let pivot = self.node(id).right.expect("rotate_left without right child");
        let inner = self.node(pivot).left;

        self.node_mut(id).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(id);
        }
        self.node_mut(pivot).left = Some(id);
        self.node_mut(id).parent = Some(pivot);
        self.replace_child(parent, id, Some(pivot));

        self.refresh(id);
        self.refresh(pivot);
        pivot
    }

    /// Lifts `id`'s left child into its place. Returns the new subtree root.
    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let parent = self.node(id).parent;
        let pivot = self.node(id).left.expect("rotate_right without left child");
        let inner = self.node(pivot).right;

        self.node_mut(id).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(id);
        }
        self.node_mut(pivot).right = Some(id);
        self.node_mut(id).parent = Some(pivot);
        self.replace_child(parent, id, Some(pivot));

        self.refresh(id);
        self.refresh(pivot);
        pivot
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.node(id).left {
            id = left;
        }
        id
    }

    /// In-order successor, using only parent and child links.
    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.node(id).right {
            return Some(self.leftmost(right));
        }

        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            if self.node(parent).left == Some(cur) {
                return Some(parent);
            }
            cur = parent;
        }
        None
    }

    fn first(&self) -> Cursor {
        self.root
            .map_or(Cursor::End, |root| Cursor::At(self.leftmost(root)))
    }

    fn advance(&self, cursor: Cursor) -> Result<Cursor> {
        match cursor {
            Cursor::End => Err(StoreError::CursorExhausted),
            Cursor::At(id) => Ok(self.successor(id).map_or(Cursor::End, Cursor::At)),
        }
    }

    fn iter(&self) -> Iter<'_> {
        Iter {
            tree: self,
            cursor: self.first(),
        }
    }
}

/// In-order iterator over the records of a [`TreeStore`].
pub struct Iter<'a> {
    tree: &'a Tree,
    cursor: Cursor,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        let Cursor::At(id) = self.cursor else {
            return None;
        };
        self.cursor = self.tree.advance(self.cursor).ok()?;
        Some(&self.tree.node(id).record)
    }
}

/// Largest number of nodes the arena can address.
fn default_node_limit() -> usize {
    isize::MAX as usize / std::mem::size_of::<Option<Node>>()
}

/// Balanced tree engine with lazy expiry.
///
/// # Example
///
/// ```
/// use twinkv::storage::{KeyValueStore, Record, TreeStore};
///
/// let mut store = TreeStore::new();
/// for key in ["c", "a", "b"] {
///     store.set(Record::new(key, "Smith", "John", 1990, "Paris", 0), None).unwrap();
/// }
///
/// assert_eq!(store.keys(), vec!["a", "b", "c"]);
/// ```
#[derive(Debug)]
pub struct TreeStore {
    tree: Tree,
    timer: ExpiryTimer<NodeId>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    /// Creates an empty tree on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Clock::System)
    }

    /// Creates an empty tree whose expiry runs on `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            tree: Tree::new(default_node_limit()),
            timer: ExpiryTimer::new(clock),
        }
    }

    /// Creates an empty tree that refuses to hold more than `max_nodes`.
    pub fn with_node_limit(max_nodes: usize) -> Self {
        Self {
            tree: Tree::new(max_nodes),
            timer: ExpiryTimer::new(Clock::System),
        }
    }

    /// Height of the tree, `0` when empty.
    pub fn height(&self) -> usize {
        self.tree
            .root
            .map_or(0, |root| self.tree.node(root).height() as usize)
    }

    /// Cursor on the smallest key, or [`Cursor::End`] when empty.
    pub fn first(&self) -> Cursor {
        self.tree.first()
    }

    /// Moves `cursor` to the next key.
    ///
    /// Advancing a cursor that is already at [`Cursor::End`] is an error.
    pub fn advance(&self, cursor: Cursor) -> Result<Cursor> {
        self.tree.advance(cursor)
    }

    /// Record under `cursor`, if any.
    ///
    /// Cursors do not survive mutation: one taken before a `del` may name a
    /// freed or reused node.
    pub fn record(&self, cursor: Cursor) -> Option<&Record> {
        match cursor {
            Cursor::At(id) => self.tree.nodes.get(id.0)?.as_ref().map(|n| &n.record),
            Cursor::End => None,
        }
    }

    /// In-order iterator. Does not reap expired records.
    pub fn iter(&self) -> Iter<'_> {
        self.tree.iter()
    }

    /// Drops every record and every expiry counter.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.timer.clear();
    }

    fn tick(&mut self) {
        let tree = &mut self.tree;
        self.timer.tick(|id| {
            tree.remove(id);
        });
    }

    fn load(&mut self, path: &Path) -> usize {
        let records = match dump::read_records(path) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Upload failed");
                return 0;
            }
        };

        let mut loaded = 0;
        for record in records {
            if let Err(e) = self.set(record, None) {
                error!(path = %path.display(), loaded, error = %e, "Upload aborted");
                break;
            }
            loaded += 1;
        }
        loaded
    }
}

impl KeyValueStore for TreeStore {
    fn kind(&self) -> EngineKind {
        EngineKind::Tree
    }

    fn set(&mut self, record: Record, ttl: Option<u64>) -> Result<bool> {
        self.tick();
        match self.tree.insert(record)? {
            Some(id) => {
                if let Some(secs) = ttl {
                    self.timer.track(id, secs);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get(&mut self, key: &str) -> Option<&Record> {
        self.tick();
        self.tree.find(key).map(|id| &self.tree.node(id).record)
    }

    fn exists(&mut self, key: &str) -> bool {
        self.tick();
        self.tree.find(key).is_some()
    }

    fn del(&mut self, key: &str) -> bool {
        self.tick();
        match self.tree.find(key) {
            Some(id) => {
                self.timer.forget(&id);
                self.tree.remove(id);
                true
            }
            None => false,
        }
    }

    fn update(&mut self, key: &str, patch: &RecordPatch) -> bool {
        self.tick();
        match self.tree.find(key) {
            Some(id) => {
                self.tree.node_mut(id).record.apply(patch);
                true
            }
            None => false,
        }
    }

    fn keys(&mut self) -> Vec<String> {
        self.tick();
        self.tree.iter().map(|r| r.key.clone()).collect()
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<bool> {
        self.tick();
        let Some(id) = self.tree.find(old) else {
            return Ok(false);
        };
        if old == new {
            return Ok(true);
        }

        if let Some(taken) = self.tree.find(new) {
            self.timer.forget(&taken);
            self.tree.remove(taken);
        }

        let lifetime = self.timer.forget(&id);
        let mut record = self.tree.remove(id);
        record.key = new.to_string();

        if let Some(id) = self.tree.insert(record)? {
            if let Some(lifetime) = lifetime {
                self.timer.track_for(id, lifetime);
            }
        }
        Ok(true)
    }

    fn ttl(&mut self, key: &str) -> u64 {
        self.tick();
        self.tree
            .find(key)
            .map_or(0, |id| self.timer.remaining(&id))
    }

    fn find(&mut self, filter: &RecordFilter) -> Vec<String> {
        self.tick();
        self.tree
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.key.clone())
            .collect()
    }

    fn show_all(&mut self) -> Vec<&Record> {
        self.tick();
        self.tree.iter().collect()
    }

    fn upload(&mut self, path: &Path) -> usize {
        self.tick();
        let count = self.load(path);
        debug!(path = %path.display(), records = count, height = self.height(), "Upload complete");
        count
    }

    fn export(&mut self, path: &Path) -> usize {
        self.tick();
        match dump::write_records(path, self.tree.iter()) {
            Ok(count) => count,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Export failed");
                0
            }
        }
    }

    fn count(&mut self) -> usize {
        self.tick();
        self.tree.len
    }

    fn len(&self) -> usize {
        self.tree.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::expiry::ManualClock;
    use std::time::Duration;

    fn record(key: &str) -> Record {
        Record::new(key, "Smith", "John", 1990, "Paris", 100)
    }

    /// Checks links, ordering, cached depths and the balance bound.
    /// Returns the number of reachable nodes.
    fn check(store: &TreeStore) -> usize {
        fn walk(tree: &Tree, id: NodeId, parent: Option<NodeId>, count: &mut usize) -> i32 {
            let node = tree.node(id);
            *count += 1;
            assert_eq!(node.parent, parent, "bad parent link at {}", node.record.key);

            let left = node.left.map_or(0, |l| {
                assert!(tree.node(l).record.key < node.record.key);
                walk(tree, l, Some(id), count)
            });
            let right = node.right.map_or(0, |r| {
                assert!(tree.node(r).record.key > node.record.key);
                walk(tree, r, Some(id), count)
            });

            assert_eq!(node.left_depth, -left, "stale left depth at {}", node.record.key);
            assert_eq!(node.right_depth, right, "stale right depth at {}", node.record.key);
            assert!(node.balance().abs() <= 1, "unbalanced at {}", node.record.key);
            1 + left.max(right)
        }

        let tree = &store.tree;
        let mut count = 0;
        if let Some(root) = tree.root {
            walk(tree, root, None, &mut count);
        }
        assert_eq!(count, tree.len);
        count
    }

    /// Deterministic pseudo-random sequence.
    fn lcg(seed: &mut u64) -> u64 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *seed >> 33
    }

    #[test]
    fn test_sequential_inserts_stay_balanced() {
        let mut store = TreeStore::new();
        for key in ["a", "b", "c", "d", "e"] {
            store.set(record(key), None).unwrap();
            check(&store);
        }

        assert_eq!(store.keys(), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(store.height(), 3);
    }

    #[test]
    fn test_height_is_logarithmic() {
        let mut store = TreeStore::new();
        for i in 0..1024 {
            store.set(record(&format!("{i:05}")), None).unwrap();
        }
        check(&store);

        // AVL bound: h < 1.44 log2(n + 2)
        assert!(store.height() <= 14, "height {}", store.height());
        assert_eq!(store.len(), 1024);
    }

    #[test]
    fn test_double_rotations() {
        let mut store = TreeStore::new();
        for key in ["m", "c", "f"] {
            store.set(record(key), None).unwrap();
        }
        check(&store);
        let root = store.tree.root.map_or(Cursor::End, Cursor::At);
        assert_eq!(store.record(root).unwrap().key, "f");

        let mut store = TreeStore::new();
        for key in ["c", "m", "f"] {
            store.set(record(key), None).unwrap();
        }
        check(&store);
        assert_eq!(store.keys(), vec!["c", "f", "m"]);
    }

    #[test]
    fn test_existing_key_is_noop() {
        let mut store = TreeStore::new();
        store.set(record("k"), None).unwrap();

        let mut other = record("k");
        other.coins = 1;
        assert!(!store.set(other, None).unwrap());
        assert_eq!(store.get("k").unwrap().coins, 100);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_cases() {
        let mut store = TreeStore::new();
        for key in ["d", "b", "f", "a", "c", "e", "g", "h"] {
            store.set(record(key), None).unwrap();
        }
        check(&store);

        // two children, successor is the right child
        assert!(store.del("b"));
        check(&store);
        // leaf
        assert!(store.del("a"));
        check(&store);
        // one child
        assert!(store.del("g"));
        check(&store);
        // two children again, after the rotation above
        assert!(store.del("d"));
        check(&store);

        assert!(!store.del("d"));
        assert_eq!(store.keys(), vec!["c", "e", "f", "h"]);
    }

    #[test]
    fn test_delete_deep_successor() {
        let mut store = TreeStore::new();
        for i in 0..31 {
            store.set(record(&format!("{i:02}")), None).unwrap();
        }
        let root = store.tree.root.map_or(Cursor::End, Cursor::At);
        let root_key = store.record(root).unwrap().key.clone();

        assert!(store.del(&root_key));
        check(&store);
        assert!(!store.exists(&root_key));
        assert_eq!(store.len(), 30);
    }

    #[test]
    fn test_random_churn_keeps_invariants() {
        let mut store = TreeStore::new();
        let mut seed = 7;
        let mut live = std::collections::BTreeSet::new();

        for _ in 0..2000 {
            let key = format!("k{:03}", lcg(&mut seed) % 300);
            if lcg(&mut seed) % 3 == 0 {
                assert_eq!(store.del(&key), live.remove(&key));
            } else {
                assert_eq!(store.set(record(&key), None).unwrap(), live.insert(key));
            }
            check(&store);
        }

        let expected: Vec<String> = live.into_iter().collect();
        assert_eq!(store.keys(), expected);
    }

    #[test]
    fn test_delete_everything() {
        let mut store = TreeStore::new();
        for i in 0..50 {
            store.set(record(&format!("k{i}")), None).unwrap();
        }
        for i in (0..50).rev() {
            assert!(store.del(&format!("k{i}")));
            check(&store);
        }
        assert!(store.is_empty());
        assert_eq!(store.first(), Cursor::End);
    }

    #[test]
    fn test_cursor() {
        let mut store = TreeStore::new();
        assert_eq!(store.first(), Cursor::End);

        for key in ["b", "a"] {
            store.set(record(key), None).unwrap();
        }

        let cursor = store.first();
        assert_eq!(store.record(cursor).unwrap().key, "a");
        let cursor = store.advance(cursor).unwrap();
        assert_eq!(store.record(cursor).unwrap().key, "b");
        let cursor = store.advance(cursor).unwrap();
        assert_eq!(cursor, Cursor::End);
        assert!(store.record(cursor).is_none());

        assert!(matches!(store.advance(cursor), Err(StoreError::CursorExhausted)));
    }

    #[test]
    fn test_node_limit() {
        let mut store = TreeStore::with_node_limit(2);
        store.set(record("a"), None).unwrap();
        store.set(record("b"), None).unwrap();

        assert!(!store.set(record("a"), None).unwrap());
        assert!(matches!(
            store.set(record("c"), None),
            Err(StoreError::CapacityExceeded { max: 2 })
        ));
        assert_eq!(store.len(), 2);

        store.del("a");
        assert!(store.set(record("c"), None).unwrap());
    }

    #[test]
    fn test_expiry_removes_inner_node() {
        let clock = ManualClock::new();
        let mut store = TreeStore::with_clock(Clock::Manual(clock.clone()));

        for key in ["d", "b", "f", "a", "c", "e", "g"] {
            let ttl = if key == "b" { Some(2) } else { None };
            store.set(record(key), ttl).unwrap();
        }
        assert_eq!(store.ttl("b"), 2);

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.ttl("b"), 1);
        assert!(store.exists("b"));

        clock.advance(Duration::from_secs(1));
        assert!(!store.exists("b"));
        assert_eq!(store.ttl("b"), 0);
        check(&store);
        assert_eq!(store.keys(), vec!["a", "c", "d", "e", "f", "g"]);
    }

    #[test]
    fn test_freed_id_does_not_inherit_ttl() {
        let clock = ManualClock::new();
        let mut store = TreeStore::with_clock(Clock::Manual(clock.clone()));

        store.set(record("x"), Some(5)).unwrap();
        store.del("x");
        store.set(record("y"), None).unwrap();

        clock.advance(Duration::from_secs(10));
        assert!(store.exists("y"));
        assert_eq!(store.ttl("y"), 0);
    }

    #[test]
    fn test_rename_repositions() {
        let clock = ManualClock::new();
        let mut store = TreeStore::with_clock(Clock::Manual(clock.clone()));
        for key in ["b", "c", "d"] {
            store.set(record(key), None).unwrap();
        }
        store.set(record("old"), Some(30)).unwrap();

        assert!(store.rename("old", "a").unwrap());
        check(&store);
        assert!(!store.exists("old"));
        assert_eq!(store.get("a").unwrap().key, "a");
        assert_eq!(store.keys(), vec!["a", "b", "c", "d"]);
        assert_eq!(store.ttl("a"), 30);

        assert!(store.rename("a", "d").unwrap());
        assert_eq!(store.keys(), vec!["b", "c", "d"]);
        assert_eq!(store.ttl("d"), 30);

        assert!(!store.rename("zzz", "y").unwrap());
    }

    #[test]
    fn test_update_and_find() {
        let mut store = TreeStore::new();
        store.set(record("a"), None).unwrap();
        store.set(Record::new("b", "Doe", "Jane", 1985, "Rome", 3), None).unwrap();
        store.set(record("c"), None).unwrap();

        let patch = RecordPatch {
            last_name: Some("Doe".into()),
            ..Default::default()
        };
        assert!(store.update("c", &patch));
        assert!(!store.update("zzz", &patch));

        assert_eq!(store.find(&RecordFilter::any().last_name("Smith")), vec!["a"]);
        assert_eq!(store.find(&RecordFilter::any().last_name("Doe")), vec!["b", "c"]);
        assert_eq!(store.find(&RecordFilter::any().last_name("Doe").coins(3)), vec!["b"]);
        assert_eq!(store.show_all().len(), 3);
    }

    #[test]
    fn test_export_upload_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.dat");

        let mut store = TreeStore::new();
        for key in ["m", "q", "a", "z", "f"] {
            store.set(record(key), None).unwrap();
        }
        assert_eq!(store.export(&path), 5);

        let mut copy = TreeStore::new();
        assert_eq!(copy.upload(&path), 5);
        check(&copy);

        let before: Vec<String> = store.show_all().iter().map(|r| r.to_string()).collect();
        let loaded: Vec<String> = copy.show_all().iter().map(|r| r.to_string()).collect();
        assert_eq!(before, loaded);
    }

    #[test]
    fn test_upload_stops_at_node_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.dat");
        std::fs::write(&path, "a A A 1 X 1\nb B B 2 Y 2\nc C C 3 Z 3\n").unwrap();

        let mut store = TreeStore::with_node_limit(2);
        assert_eq!(store.upload(&path), 2);
        assert_eq!(store.keys(), vec!["a", "b"]);
    }
}
