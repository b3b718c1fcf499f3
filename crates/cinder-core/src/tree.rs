//! Order-statistics tree over sorted-set entries.
//!
//! An AVL tree augmented with subtree sizes, giving O(log n) insert,
//! remove, rank (`index_of`), select (`get`), and positional removal.
//! Nodes live in a `Vec` arena with a free list; links are indices, so
//! the tree needs no `unsafe` and no parent pointers.
//!
//! Lookups go through the [`OrderKey`] seam, so the same code path ranks
//! stored entries and synthetic range probes — the tree itself knows
//! nothing about inclusive or exclusive bounds.

use std::cmp::Ordering;
use std::mem::size_of;

use crate::entry::{Entry, OrderKey};

const NIL: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct Node {
    entry: Entry,
    left: u32,
    right: u32,
    /// Entries in this subtree, including this node.
    size: u32,
    /// Subtree height; a leaf is 1.
    height: u8,
}

/// Balanced tree of entries ordered by (score, member).
#[derive(Debug, Clone)]
pub struct ScoreSet {
    nodes: Vec<Node>,
    root: u32,
    free: Vec<u32>,
}

impl Default for ScoreSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreSet {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NIL,
            free: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.subtree_size(self.root) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Inserts an entry; returns `false` if an equal entry is present.
    pub fn insert(&mut self, entry: Entry) -> bool {
        let (root, inserted) = self.insert_at(self.root, entry);
        self.root = root;
        inserted
    }

    /// Removes the entry that compares equal to `key`, if any.
    pub(crate) fn remove<K: OrderKey + ?Sized>(&mut self, key: &K) -> Option<Entry> {
        let (root, removed) = self.remove_at(self.root, key);
        self.root = root;
        removed
    }

    /// Removes the entry at rank `rank` (0-based, lowest first).
    pub fn remove_index(&mut self, rank: usize) -> Option<Entry> {
        if rank >= self.len() {
            return None;
        }
        let (root, removed) = self.remove_index_at(self.root, rank as u32);
        self.root = root;
        Some(removed)
    }

    /// Rank of `key`: the number of stored entries strictly less than it.
    /// For an absent key this is its insertion index.
    pub(crate) fn index_of<K: OrderKey + ?Sized>(&self, key: &K) -> usize {
        let mut idx = self.root;
        let mut rank = 0usize;
        while idx != NIL {
            let node = &self.nodes[idx as usize];
            match key.cmp_entry(&node.entry) {
                Ordering::Less => idx = node.left,
                Ordering::Equal => return rank + self.subtree_size(node.left) as usize,
                Ordering::Greater => {
                    rank += self.subtree_size(node.left) as usize + 1;
                    idx = node.right;
                }
            }
        }
        rank
    }

    /// The entry at rank `rank`, if in bounds.
    pub fn get(&self, rank: usize) -> Option<&Entry> {
        if rank >= self.len() {
            return None;
        }
        let mut idx = self.root;
        let mut rank = rank as u32;
        loop {
            let node = &self.nodes[idx as usize];
            let left_size = self.subtree_size(node.left);
            match rank.cmp(&left_size) {
                Ordering::Less => idx = node.left,
                Ordering::Equal => return Some(&node.entry),
                Ordering::Greater => {
                    rank -= left_size + 1;
                    idx = node.right;
                }
            }
        }
    }

    /// Lazy iterator over up to `count` entries starting at rank `start`,
    /// ascending, or descending when `reverse`.
    pub fn range(&self, start: usize, count: usize, reverse: bool) -> Range<'_> {
        let mut stack = Vec::new();
        if start < self.len() && count > 0 {
            let mut idx = self.root;
            let mut target = start as u32;
            while idx != NIL {
                let node = &self.nodes[idx as usize];
                let left_size = self.subtree_size(node.left);
                match (target.cmp(&left_size), reverse) {
                    (Ordering::Equal, _) => {
                        stack.push(idx);
                        break;
                    }
                    (Ordering::Less, false) => {
                        stack.push(idx);
                        idx = node.left;
                    }
                    (Ordering::Less, true) => idx = node.left,
                    (Ordering::Greater, false) => {
                        target -= left_size + 1;
                        idx = node.right;
                    }
                    (Ordering::Greater, true) => {
                        stack.push(idx);
                        target -= left_size + 1;
                        idx = node.right;
                    }
                }
            }
        }
        Range {
            tree: self,
            stack,
            remaining: count,
            reverse,
        }
    }

    /// In-order iterator over the whole tree.
    pub fn iter(&self) -> Range<'_> {
        self.range(0, self.len(), false)
    }

    /// Structural heap use: the node arena and free list. Member and
    /// score buffers are accounted by the member map.
    pub fn size_in_bytes(&self) -> usize {
        size_of::<Self>()
            + self.nodes.capacity() * size_of::<Node>()
            + self.free.capacity() * size_of::<u32>()
    }

    // -- arena plumbing --

    fn subtree_size(&self, idx: u32) -> u32 {
        if idx == NIL {
            0
        } else {
            self.nodes[idx as usize].size
        }
    }

    fn subtree_height(&self, idx: u32) -> i32 {
        if idx == NIL {
            0
        } else {
            i32::from(self.nodes[idx as usize].height)
        }
    }

    fn alloc(&mut self, entry: Entry) -> u32 {
        let node = Node {
            entry,
            left: NIL,
            right: NIL,
            size: 1,
            height: 1,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx as usize] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    /// Takes the entry out of a detached node and recycles the slot.
    fn release(&mut self, idx: u32) -> Entry {
        let entry = std::mem::replace(&mut self.nodes[idx as usize].entry, Entry::vacant());
        self.free.push(idx);
        entry
    }

    // -- balancing --

    fn refresh(&mut self, idx: u32) {
        let (left, right) = {
            let node = &self.nodes[idx as usize];
            (node.left, node.right)
        };
        let size = 1 + self.subtree_size(left) + self.subtree_size(right);
        let height = 1 + self.subtree_height(left).max(self.subtree_height(right));
        let node = &mut self.nodes[idx as usize];
        node.size = size;
        node.height = height as u8;
    }

    fn balance_factor(&self, idx: u32) -> i32 {
        let node = &self.nodes[idx as usize];
        self.subtree_height(node.left) - self.subtree_height(node.right)
    }

    fn rotate_right(&mut self, idx: u32) -> u32 {
        let pivot = self.nodes[idx as usize].left;
        self.nodes[idx as usize].left = self.nodes[pivot as usize].right;
        self.nodes[pivot as usize].right = idx;
        self.refresh(idx);
        self.refresh(pivot);
        pivot
    }

    fn rotate_left(&mut self, idx: u32) -> u32 {
        let pivot = self.nodes[idx as usize].right;
        self.nodes[idx as usize].right = self.nodes[pivot as usize].left;
        self.nodes[pivot as usize].left = idx;
        self.refresh(idx);
        self.refresh(pivot);
        pivot
    }

    /// Recomputes this node's stats and restores the AVL invariant,
    /// returning the subtree's new root.
    fn rebalance(&mut self, idx: u32) -> u32 {
        self.refresh(idx);
        let balance = self.balance_factor(idx);
        if balance > 1 {
            let left = self.nodes[idx as usize].left;
            if self.balance_factor(left) < 0 {
                let new_left = self.rotate_left(left);
                self.nodes[idx as usize].left = new_left;
            }
            return self.rotate_right(idx);
        }
        if balance < -1 {
            let right = self.nodes[idx as usize].right;
            if self.balance_factor(right) > 0 {
                let new_right = self.rotate_right(right);
                self.nodes[idx as usize].right = new_right;
            }
            return self.rotate_left(idx);
        }
        idx
    }

    // -- recursive mutators --

    fn insert_at(&mut self, idx: u32, entry: Entry) -> (u32, bool) {
        if idx == NIL {
            return (self.alloc(entry), true);
        }
        match entry.cmp_entry(&self.nodes[idx as usize].entry) {
            Ordering::Less => {
                let left = self.nodes[idx as usize].left;
                let (new_left, inserted) = self.insert_at(left, entry);
                self.nodes[idx as usize].left = new_left;
                if !inserted {
                    return (idx, false);
                }
                (self.rebalance(idx), true)
            }
            Ordering::Greater => {
                let right = self.nodes[idx as usize].right;
                let (new_right, inserted) = self.insert_at(right, entry);
                self.nodes[idx as usize].right = new_right;
                if !inserted {
                    return (idx, false);
                }
                (self.rebalance(idx), true)
            }
            Ordering::Equal => (idx, false),
        }
    }

    fn remove_at<K: OrderKey + ?Sized>(&mut self, idx: u32, key: &K) -> (u32, Option<Entry>) {
        if idx == NIL {
            return (NIL, None);
        }
        match key.cmp_entry(&self.nodes[idx as usize].entry) {
            Ordering::Less => {
                let left = self.nodes[idx as usize].left;
                let (new_left, removed) = self.remove_at(left, key);
                self.nodes[idx as usize].left = new_left;
                if removed.is_none() {
                    return (idx, None);
                }
                (self.rebalance(idx), removed)
            }
            Ordering::Greater => {
                let right = self.nodes[idx as usize].right;
                let (new_right, removed) = self.remove_at(right, key);
                self.nodes[idx as usize].right = new_right;
                if removed.is_none() {
                    return (idx, None);
                }
                (self.rebalance(idx), removed)
            }
            Ordering::Equal => {
                let (subtree, removed) = self.unlink(idx);
                (subtree, Some(removed))
            }
        }
    }

    fn remove_index_at(&mut self, idx: u32, rank: u32) -> (u32, Entry) {
        let node = &self.nodes[idx as usize];
        let (left, right) = (node.left, node.right);
        let left_size = self.subtree_size(left);
        match rank.cmp(&left_size) {
            Ordering::Less => {
                let (new_left, removed) = self.remove_index_at(left, rank);
                self.nodes[idx as usize].left = new_left;
                (self.rebalance(idx), removed)
            }
            Ordering::Equal => self.unlink(idx),
            Ordering::Greater => {
                let (new_right, removed) = self.remove_index_at(right, rank - left_size - 1);
                self.nodes[idx as usize].right = new_right;
                (self.rebalance(idx), removed)
            }
        }
    }

    /// Detaches the node at `idx` from its subtree and returns the new
    /// subtree root plus the removed entry. A node with two children
    /// swaps in its in-order successor's entry.
    fn unlink(&mut self, idx: u32) -> (u32, Entry) {
        let (left, right) = {
            let node = &self.nodes[idx as usize];
            (node.left, node.right)
        };
        if left == NIL || right == NIL {
            let child = if left == NIL { right } else { left };
            return (child, self.release(idx));
        }
        let (new_right, successor) = self.detach_min(right);
        let successor_entry = self.release(successor);
        let removed = std::mem::replace(&mut self.nodes[idx as usize].entry, successor_entry);
        self.nodes[idx as usize].right = new_right;
        (self.rebalance(idx), removed)
    }

    /// Unlinks the minimum node of the subtree, returning the new subtree
    /// root and the detached node's index (still holding its entry).
    fn detach_min(&mut self, idx: u32) -> (u32, u32) {
        let left = self.nodes[idx as usize].left;
        if left == NIL {
            return (self.nodes[idx as usize].right, idx);
        }
        let (new_left, min) = self.detach_min(left);
        self.nodes[idx as usize].left = new_left;
        (self.rebalance(idx), min)
    }
}

/// Lazy in-order (or reverse) walk produced by [`ScoreSet::range`].
pub struct Range<'a> {
    tree: &'a ScoreSet,
    /// Ancestors still to visit; the top is the next entry yielded.
    stack: Vec<u32>,
    remaining: usize,
    reverse: bool,
}

impl<'a> Iterator for Range<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.stack.pop()?;
        self.remaining -= 1;
        let node = &self.tree.nodes[idx as usize];
        // push the walk's continuation under the yielded node
        let mut child = if self.reverse { node.left } else { node.right };
        while child != NIL {
            self.stack.push(child);
            let next = &self.tree.nodes[child as usize];
            child = if self.reverse { next.right } else { next.left };
        }
        Some(&node.entry)
    }
}
