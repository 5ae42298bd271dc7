//! B+Tree over fixed-size pages.
//!
//! Every table is one tree. Leaves hold `(key, row slab)` cells and chain
//! left-to-right through `next_leaf`; internal nodes hold `(max key of
//! subtree, child)` pivots plus a `right_child` for everything greater.
//! The root page index is fixed for the lifetime of a table: growing the
//! tree copies the old root into a fresh page and re-initializes the root
//! in place, shrinking it copies the last remaining child back.
//!
//! Structural invariants kept between externally observable operations:
//! keys strictly increase within and across leaves, every pivot equals the
//! max key of its subtree, and every non-root node stays at or above the
//! classical ⌈M/2⌉ fill bound. [`BTree::check_invariants`] walks all of
//! them on demand.

use super::cursor::Cursor;
use super::node::{
    InternalCell, InternalNode, LeafCell, Node, PageIdx, INTERNAL_MIN_KEYS, NO_PAGE,
};
use super::pager::Pager;
use crate::errors::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy)]
pub struct BTree {
    pub root_page: PageIdx,
    /// Leaf cell payload size (the owning table's encoded row slab).
    pub value_size: usize,
}

impl BTree {
    pub fn new(root_page: PageIdx, value_size: usize) -> Self {
        BTree {
            root_page,
            value_size,
        }
    }

    /// Descends from the root towards `key`. Returns the cursor (pointing at
    /// the match or at the insertion slot) and whether the key was found.
    pub fn seek(&self, pager: &mut Pager, key: u64) -> Result<(Cursor, bool), Error> {
        let mut page_idx = self.root_page;
        loop {
            let page = pager.get_page(page_idx, self.value_size)?;
            let child = {
                let node = page.lock()?;
                match &*node {
                    Node::Internal(internal) => {
                        let i = internal.find_child_index(key as u32);
                        internal.child_at(i)
                    }
                    Node::Leaf(leaf) => {
                        return Ok(match leaf.find(key) {
                            Ok(cell_idx) => {
                                (Cursor::at(page_idx, cell_idx, self.value_size), true)
                            }
                            Err(cell_idx) => {
                                (Cursor::at(page_idx, cell_idx, self.value_size), false)
                            }
                        });
                    }
                }
            };
            page_idx = child;
        }
    }

    /// Cursor at the leftmost leaf, cell 0; `end_of_table` when the table is
    /// empty.
    pub fn seek_first(&self, pager: &mut Pager) -> Result<Cursor, Error> {
        let mut page_idx = self.root_page;
        loop {
            let page = pager.get_page(page_idx, self.value_size)?;
            let next = {
                let node = page.lock()?;
                match &*node {
                    Node::Internal(internal) => internal.child_at(0),
                    Node::Leaf(leaf) => {
                        let mut cursor = Cursor::at(page_idx, 0, self.value_size);
                        cursor.end_of_table = leaf.cells.is_empty();
                        return Ok(cursor);
                    }
                }
            };
            page_idx = next;
        }
    }

    /// Largest key in the tree, `None` when empty.
    pub fn seek_max_key(&self, pager: &mut Pager) -> Result<Option<u64>, Error> {
        let mut page_idx = self.root_page;
        loop {
            let page = pager.get_page(page_idx, self.value_size)?;
            let next = {
                let node = page.lock()?;
                match &*node {
                    Node::Internal(internal) => internal.right_child,
                    Node::Leaf(leaf) => return Ok(leaf.max_key()),
                }
            };
            page_idx = next;
        }
    }

    /// Max key of the subtree rooted at `idx` (rightmost descent).
    fn max_key_of(&self, pager: &mut Pager, idx: PageIdx) -> Result<u64, Error> {
        let mut page_idx = idx;
        loop {
            let page = pager.get_page(page_idx, self.value_size)?;
            let next = {
                let node = page.lock()?;
                match &*node {
                    Node::Internal(internal) => internal.right_child,
                    Node::Leaf(leaf) => {
                        return leaf.max_key().ok_or_else(|| {
                            err!(Storage, "Max key requested from empty leaf {}.", page_idx)
                        });
                    }
                }
            };
            page_idx = next;
        }
    }

    /// Inserts `(key, value)`. Fails with a duplicate-key validation error
    /// when the key is already present.
    pub fn insert(&self, pager: &mut Pager, key: u64, value: Vec<u8>) -> Result<(), Error> {
        let (cursor, found) = self.seek(pager, key)?;
        if found {
            return Err(err!(Validation, "Duplicate key {}.", key));
        }

        let page = pager.get_page(cursor.page_idx, self.value_size)?;
        {
            let mut node = page.lock()?;
            let leaf = node.leaf_mut()?;
            if !leaf.is_full() {
                leaf.cells.insert(cursor.cell_idx, LeafCell { key, value });
                return Ok(());
            }
        }
        self.leaf_split_insert(pager, cursor, key, value)
    }

    /// Splits the full leaf under the cursor, landing the new cell in its
    /// sorted position, and attaches the new right sibling to the parent.
    fn leaf_split_insert(
        &self,
        pager: &mut Pager,
        cursor: Cursor,
        key: u64,
        value: Vec<u8>,
    ) -> Result<(), Error> {
        let new_idx = pager.unused_page_idx();
        debug!(page = cursor.page_idx, new_page = new_idx, key, "Splitting leaf node.");

        let old_page = pager.get_page(cursor.page_idx, self.value_size)?;
        let new_page = pager.get_page(new_idx, self.value_size)?;

        let (was_root, parent_idx) = {
            let mut old_node = old_page.lock()?;
            let mut new_node = new_page.lock()?;
            let old_leaf = old_node.leaf_mut()?;
            let new_leaf = new_node.leaf_mut()?;

            new_leaf.parent = old_leaf.parent;
            // The old leaf's sibling becomes the new leaf; the new leaf takes
            // over whatever the old one pointed at.
            new_leaf.next_leaf = old_leaf.next_leaf;
            old_leaf.next_leaf = new_idx;

            let mut cells = std::mem::take(&mut old_leaf.cells);
            cells.insert(cursor.cell_idx, LeafCell { key, value });
            let left_count = old_leaf.left_split_count();
            new_leaf.cells = cells.split_off(left_count);
            old_leaf.cells = cells;

            (old_leaf.is_root, old_leaf.parent)
        };

        if was_root {
            self.create_new_root(pager, new_idx)
        } else {
            // The left half kept the smaller keys; its pivot shrank.
            self.propagate_max_key(pager, cursor.page_idx)?;
            self.internal_insert(pager, parent_idx, new_idx)
        }
    }

    /// Attaches `child_idx` to the internal node at `parent_idx`, splitting
    /// the parent when it is already at capacity.
    fn internal_insert(
        &self,
        pager: &mut Pager,
        parent_idx: PageIdx,
        child_idx: PageIdx,
    ) -> Result<(), Error> {
        trace!(parent = parent_idx, child = child_idx, "Internal insert.");

        let parent_page = pager.get_page(parent_idx, self.value_size)?;
        let (is_full, right_child) = {
            let node = parent_page.lock()?;
            let internal = node.internal()?;
            (internal.is_full(), internal.right_child)
        };
        if is_full {
            return self.internal_split_insert(pager, parent_idx, child_idx);
        }

        let child_max = self.max_key_of(pager, child_idx)? as u32;
        let right_max = self.max_key_of(pager, right_child)? as u32;

        {
            let mut node = parent_page.lock()?;
            let internal = node.internal_mut()?;
            if child_max > right_max {
                // The new child becomes the rightmost; the old right child is
                // demoted to the last pivot slot.
                internal.cells.push(InternalCell {
                    key: right_max,
                    child: internal.right_child,
                });
                internal.right_child = child_idx;
            } else {
                let i = internal.find_child_index(child_max);
                internal.cells.insert(
                    i,
                    InternalCell {
                        key: child_max,
                        child: child_idx,
                    },
                );
            }
        }

        let child_page = pager.get_page(child_idx, self.value_size)?;
        child_page.lock()?.set_parent(parent_idx);

        // Attaching the child can raise the parent's subtree max (the child
        // may have become the rightmost); ancestor pivots must follow.
        self.propagate_max_key(pager, parent_idx)?;
        Ok(())
    }

    /// Splits a full internal node while attaching one more child. The node's
    /// children (pivots plus `right_child`) are rebuilt as an ordered
    /// `(max key, child)` list, the extra child is slotted in, and the list
    /// is cut in half with the right half rounding up.
    fn internal_split_insert(
        &self,
        pager: &mut Pager,
        page_idx: PageIdx,
        extra_child_idx: PageIdx,
    ) -> Result<(), Error> {
        let new_idx = pager.unused_page_idx();
        debug!(page = page_idx, new_page = new_idx, "Splitting internal node.");

        let (was_root, parent_idx, mut pairs, right_child) = {
            let page = pager.get_page(page_idx, self.value_size)?;
            let node = page.lock()?;
            let internal = node.internal()?;
            let pairs: Vec<(u32, PageIdx)> =
                internal.cells.iter().map(|c| (c.key, c.child)).collect();
            (
                internal.is_root,
                internal.parent,
                pairs,
                internal.right_child,
            )
        };

        let right_max = self.max_key_of(pager, right_child)? as u32;
        pairs.push((right_max, right_child));
        let extra_max = self.max_key_of(pager, extra_child_idx)? as u32;
        let pos = pairs.partition_point(|(k, _)| *k < extra_max);
        pairs.insert(pos, (extra_max, extra_child_idx));

        let total = pairs.len();
        let right_count = (total + 1) / 2;
        let left_count = total - right_count;
        let right_pairs = pairs.split_off(left_count);
        let left_pairs = pairs;

        // The freshly allocated page arrives as a leaf; rewrite it as the
        // right internal sibling.
        {
            let page = pager.get_page(new_idx, self.value_size)?;
            let mut node = page.lock()?;
            *node = Node::Internal(InternalNode {
                is_root: false,
                parent: parent_idx,
                right_child: right_pairs[right_pairs.len() - 1].1,
                cells: right_pairs[..right_pairs.len() - 1]
                    .iter()
                    .map(|&(key, child)| InternalCell { key, child })
                    .collect(),
            });
        }
        {
            let page = pager.get_page(page_idx, self.value_size)?;
            let mut node = page.lock()?;
            let internal = node.internal_mut()?;
            internal.right_child = left_pairs[left_pairs.len() - 1].1;
            internal.cells = left_pairs[..left_pairs.len() - 1]
                .iter()
                .map(|&(key, child)| InternalCell { key, child })
                .collect();
        }

        for &(_, child) in &right_pairs {
            let page = pager.get_page(child, self.value_size)?;
            page.lock()?.set_parent(new_idx);
        }

        if was_root {
            self.create_new_root(pager, new_idx)
        } else {
            self.propagate_max_key(pager, page_idx)?;
            self.internal_insert(pager, parent_idx, new_idx)
        }
    }

    /// Grows the tree by one level. The current root is deep-copied into a
    /// fresh left page, the root page is re-initialized as an internal node
    /// over `(left copy, right sibling)`, and reparenting is fixed up.
    fn create_new_root(&self, pager: &mut Pager, right_child_idx: PageIdx) -> Result<(), Error> {
        let left_idx = pager.unused_page_idx();
        debug!(
            root = self.root_page,
            left = left_idx,
            right = right_child_idx,
            "Creating a new root."
        );

        let left_page = pager.get_page(left_idx, self.value_size)?;
        let root_page = pager.get_page(self.root_page, self.value_size)?;
        let left_children = {
            let mut root = root_page.lock()?;
            let mut left = left_page.lock()?;
            *left = root.clone();
            left.set_root(false);
            left.set_parent(self.root_page);

            *root = Node::Internal(InternalNode {
                is_root: true,
                parent: NO_PAGE,
                right_child: right_child_idx,
                cells: Vec::new(),
            });

            match &*left {
                Node::Internal(internal) => internal.children(),
                Node::Leaf(_) => Vec::new(),
            }
        };

        // The copied node's children still point at the root page.
        for child in left_children {
            let page = pager.get_page(child, self.value_size)?;
            page.lock()?.set_parent(left_idx);
        }

        let left_max = self.max_key_of(pager, left_idx)? as u32;
        {
            let page = pager.get_page(self.root_page, self.value_size)?;
            let mut node = page.lock()?;
            node.internal_mut()?.cells.push(InternalCell {
                key: left_max,
                child: left_idx,
            });
        }
        let right_page = pager.get_page(right_child_idx, self.value_size)?;
        right_page.lock()?.set_parent(self.root_page);
        Ok(())
    }

    /// Re-derives the parent pivot for `idx` and walks the fix upward. Safe
    /// to call whenever a node's max key may have changed.
    fn propagate_max_key(&self, pager: &mut Pager, idx: PageIdx) -> Result<(), Error> {
        let mut idx = idx;
        loop {
            let parent_idx = {
                let page = pager.get_page(idx, self.value_size)?;
                let node = page.lock()?;
                if node.is_root() {
                    return Ok(());
                }
                node.parent()
            };
            let child_max = self.max_key_of(pager, idx)? as u32;

            let parent_page = pager.get_page(parent_idx, self.value_size)?;
            {
                let mut node = parent_page.lock()?;
                let internal = node.internal_mut()?;
                let pos = internal.position_of_child(idx).ok_or_else(|| {
                    err!(
                        Storage,
                        "Page {} is not a child of its recorded parent {}.",
                        idx,
                        parent_idx
                    )
                })?;
                if pos < internal.keys_num() {
                    internal.cells[pos].key = child_max;
                }
            }
            idx = parent_idx;
        }
    }

    /// Removes `key`. Returns false (and leaves the tree untouched) when the
    /// key is not present.
    pub fn delete(&self, pager: &mut Pager, key: u64) -> Result<bool, Error> {
        let (cursor, found) = self.seek(pager, key)?;
        if !found {
            return Ok(false);
        }
        debug!(page = cursor.page_idx, key, "Deleting key.");

        let page = pager.get_page(cursor.page_idx, self.value_size)?;
        let (is_root, has_cells) = {
            let mut node = page.lock()?;
            let leaf = node.leaf_mut()?;
            leaf.cells.remove(cursor.cell_idx);
            (leaf.is_root, !leaf.cells.is_empty())
        };

        if !is_root && has_cells {
            // The removed cell may have been the leaf max.
            self.propagate_max_key(pager, cursor.page_idx)?;
        }
        self.rebalance(pager, cursor.page_idx)?;
        Ok(true)
    }

    /// Restores the fill bound at `idx` after a removal, borrowing from a
    /// sibling when one has spare cells and merging otherwise, then repeats
    /// at the parent level. An empty internal root collapses.
    fn rebalance(&self, pager: &mut Pager, idx: PageIdx) -> Result<(), Error> {
        let (is_root, underflow, parent_idx, empty_internal_root) = {
            let page = pager.get_page(idx, self.value_size)?;
            let node = page.lock()?;
            match &*node {
                Node::Leaf(leaf) => (leaf.is_root, leaf.is_underflow(), leaf.parent, false),
                Node::Internal(internal) => (
                    internal.is_root,
                    internal.is_underflow(),
                    internal.parent,
                    internal.is_root && internal.keys_num() == 0,
                ),
            }
        };

        if is_root {
            if empty_internal_root {
                self.collapse_root(pager)?;
            }
            return Ok(());
        }
        if !underflow {
            return Ok(());
        }

        let parent_page = pager.get_page(parent_idx, self.value_size)?;
        let (pos, keys_num) = {
            let node = parent_page.lock()?;
            let internal = node.internal()?;
            let pos = internal.position_of_child(idx).ok_or_else(|| {
                err!(
                    Storage,
                    "Page {} is not a child of its recorded parent {}.",
                    idx,
                    parent_idx
                )
            })?;
            (pos, internal.keys_num())
        };

        // Prefer the left-adjacent sibling, then the right one.
        if pos > 0 {
            let left_idx = self.sibling_at(pager, parent_idx, pos - 1)?;
            if self.has_spare(pager, left_idx)? {
                self.borrow_from_left(pager, parent_idx, pos, left_idx, idx)?;
                return Ok(());
            }
        }
        if pos < keys_num {
            let right_idx = self.sibling_at(pager, parent_idx, pos + 1)?;
            if self.has_spare(pager, right_idx)? {
                self.borrow_from_right(pager, parent_idx, pos, idx, right_idx)?;
                return Ok(());
            }
        }

        if pos > 0 {
            self.merge(pager, parent_idx, pos - 1)?;
        } else if keys_num > 0 {
            self.merge(pager, parent_idx, pos)?;
        } else {
            // A transient zero-key parent is fixed on the way up.
            warn!(page = idx, parent = parent_idx, "Underflowing node has no sibling.");
            return self.rebalance(pager, parent_idx);
        }
        self.rebalance(pager, parent_idx)
    }

    fn sibling_at(
        &self,
        pager: &mut Pager,
        parent_idx: PageIdx,
        pos: usize,
    ) -> Result<PageIdx, Error> {
        let page = pager.get_page(parent_idx, self.value_size)?;
        let node = page.lock()?;
        Ok(node.internal()?.child_at(pos))
    }

    /// Whether the node can donate a cell without underflowing itself.
    fn has_spare(&self, pager: &mut Pager, idx: PageIdx) -> Result<bool, Error> {
        let page = pager.get_page(idx, self.value_size)?;
        let node = page.lock()?;
        Ok(match &*node {
            Node::Leaf(leaf) => leaf.cells.len() > leaf.min_cells(),
            Node::Internal(internal) => internal.keys_num() > INTERNAL_MIN_KEYS,
        })
    }

    /// Moves the left sibling's last entry into `idx` and adjusts the pivot
    /// between them.
    fn borrow_from_left(
        &self,
        pager: &mut Pager,
        parent_idx: PageIdx,
        pos: usize,
        left_idx: PageIdx,
        idx: PageIdx,
    ) -> Result<(), Error> {
        trace!(page = idx, donor = left_idx, "Borrowing from the left sibling.");
        let parent_page = pager.get_page(parent_idx, self.value_size)?;
        let left_page = pager.get_page(left_idx, self.value_size)?;
        let self_page = pager.get_page(idx, self.value_size)?;

        let mut moved_child = None;
        {
            let mut parent_node = parent_page.lock()?;
            let parent = parent_node.internal_mut()?;
            let mut left_node = left_page.lock()?;
            let mut self_node = self_page.lock()?;

            match (&mut *left_node, &mut *self_node) {
                (Node::Leaf(left), Node::Leaf(leaf)) => {
                    let cell = left.cells.pop().ok_or_else(|| {
                        err!(Storage, "Donor leaf {} is empty.", left_idx)
                    })?;
                    leaf.cells.insert(0, cell);
                    parent.cells[pos - 1].key = left.max_key().ok_or_else(|| {
                        err!(Storage, "Donor leaf {} drained dry.", left_idx)
                    })? as u32;
                }
                (Node::Internal(left), Node::Internal(internal)) => {
                    // The separator key is the max of the left subtree; it
                    // becomes the pivot for the child moving over.
                    let sep = parent.cells[pos - 1].key;
                    internal.cells.insert(
                        0,
                        InternalCell {
                            key: sep,
                            child: left.right_child,
                        },
                    );
                    moved_child = Some(left.right_child);
                    let last = left.cells.pop().ok_or_else(|| {
                        err!(Storage, "Donor internal node {} is empty.", left_idx)
                    })?;
                    left.right_child = last.child;
                    parent.cells[pos - 1].key = last.key;
                }
                _ => {
                    return Err(err!(
                        Corruption,
                        "Siblings {} and {} have different node variants.",
                        left_idx,
                        idx
                    ));
                }
            }
        }

        if let Some(child) = moved_child {
            let page = pager.get_page(child, self.value_size)?;
            page.lock()?.set_parent(idx);
        }
        Ok(())
    }

    /// Moves the right sibling's first entry into `idx` and adjusts the pivot
    /// between them.
    fn borrow_from_right(
        &self,
        pager: &mut Pager,
        parent_idx: PageIdx,
        pos: usize,
        idx: PageIdx,
        right_idx: PageIdx,
    ) -> Result<(), Error> {
        trace!(page = idx, donor = right_idx, "Borrowing from the right sibling.");
        let parent_page = pager.get_page(parent_idx, self.value_size)?;
        let self_page = pager.get_page(idx, self.value_size)?;
        let right_page = pager.get_page(right_idx, self.value_size)?;

        let mut moved_child = None;
        {
            let mut parent_node = parent_page.lock()?;
            let parent = parent_node.internal_mut()?;
            let mut self_node = self_page.lock()?;
            let mut right_node = right_page.lock()?;

            match (&mut *self_node, &mut *right_node) {
                (Node::Leaf(leaf), Node::Leaf(right)) => {
                    if right.cells.is_empty() {
                        return Err(err!(Storage, "Donor leaf {} is empty.", right_idx));
                    }
                    let cell = right.cells.remove(0);
                    leaf.cells.push(cell);
                    parent.cells[pos].key = leaf.max_key().ok_or_else(|| {
                        err!(Storage, "Leaf {} empty after borrowing.", idx)
                    })? as u32;
                }
                (Node::Internal(internal), Node::Internal(right)) => {
                    let sep = parent.cells[pos].key;
                    internal.cells.push(InternalCell {
                        key: sep,
                        child: internal.right_child,
                    });
                    if right.cells.is_empty() {
                        return Err(err!(Storage, "Donor internal node {} is empty.", right_idx));
                    }
                    let first = right.cells.remove(0);
                    internal.right_child = first.child;
                    moved_child = Some(first.child);
                    parent.cells[pos].key = first.key;
                }
                _ => {
                    return Err(err!(
                        Corruption,
                        "Siblings {} and {} have different node variants.",
                        idx,
                        right_idx
                    ));
                }
            }
        }

        if let Some(child) = moved_child {
            let page = pager.get_page(child, self.value_size)?;
            page.lock()?.set_parent(idx);
        }
        Ok(())
    }

    /// Merges the child at `left_pos + 1` into the child at `left_pos`,
    /// removing the separator from the parent. The emptied page is orphaned.
    fn merge(&self, pager: &mut Pager, parent_idx: PageIdx, left_pos: usize) -> Result<(), Error> {
        let (left_idx, right_idx, sep, right_was_rightmost) = {
            let page = pager.get_page(parent_idx, self.value_size)?;
            let node = page.lock()?;
            let parent = node.internal()?;
            (
                parent.child_at(left_pos),
                parent.child_at(left_pos + 1),
                parent.cells[left_pos].key,
                left_pos + 1 == parent.keys_num(),
            )
        };
        debug!(left = left_idx, right = right_idx, parent = parent_idx, "Merging siblings.");

        let left_page = pager.get_page(left_idx, self.value_size)?;
        let right_page = pager.get_page(right_idx, self.value_size)?;
        let mut moved_children = Vec::new();
        {
            let mut left_node = left_page.lock()?;
            let mut right_node = right_page.lock()?;
            match (&mut *left_node, &mut *right_node) {
                (Node::Leaf(left), Node::Leaf(right)) => {
                    left.cells.append(&mut right.cells);
                    left.next_leaf = right.next_leaf;
                }
                (Node::Internal(left), Node::Internal(right)) => {
                    moved_children = right.cells.iter().map(|cell| cell.child).collect();
                    moved_children.push(right.right_child);
                    left.cells.push(InternalCell {
                        key: sep,
                        child: left.right_child,
                    });
                    left.cells.append(&mut right.cells);
                    left.right_child = right.right_child;
                }
                _ => {
                    return Err(err!(
                        Corruption,
                        "Siblings {} and {} have different node variants.",
                        left_idx,
                        right_idx
                    ));
                }
            }
        }

        for child in moved_children {
            let page = pager.get_page(child, self.value_size)?;
            page.lock()?.set_parent(left_idx);
        }

        {
            let page = pager.get_page(parent_idx, self.value_size)?;
            let mut node = page.lock()?;
            let parent = node.internal_mut()?;
            if right_was_rightmost {
                parent.right_child = left_idx;
            } else {
                parent.cells[left_pos + 1].child = left_idx;
            }
            parent.cells.remove(left_pos);
        }

        // The absorbed sibling may have been emptied out before the merge,
        // leaving its old pivot stale; re-derive it from the merged node.
        self.propagate_max_key(pager, left_idx)?;
        Ok(())
    }

    /// Shrinks the tree by one level: the root's sole remaining child is
    /// copied into the root page and its page is orphaned.
    fn collapse_root(&self, pager: &mut Pager) -> Result<(), Error> {
        let child_idx = {
            let page = pager.get_page(self.root_page, self.value_size)?;
            let node = page.lock()?;
            node.internal()?.right_child
        };
        debug!(root = self.root_page, child = child_idx, "Collapsing the root.");

        let child_clone = {
            let page = pager.get_page(child_idx, self.value_size)?;
            let node = page.lock()?;
            node.clone()
        };
        let grandchildren = match &child_clone {
            Node::Internal(internal) => internal.children(),
            Node::Leaf(_) => Vec::new(),
        };

        {
            let page = pager.get_page(self.root_page, self.value_size)?;
            let mut node = page.lock()?;
            *node = child_clone;
            node.set_root(true);
            node.set_parent(NO_PAGE);
        }
        for child in grandchildren {
            let page = pager.get_page(child, self.value_size)?;
            page.lock()?.set_parent(self.root_page);
        }
        Ok(())
    }

    /// Tree height: 1 for a lone root leaf.
    pub fn depth(&self, pager: &mut Pager) -> Result<usize, Error> {
        let mut depth = 1;
        let mut page_idx = self.root_page;
        loop {
            let page = pager.get_page(page_idx, self.value_size)?;
            let next = {
                let node = page.lock()?;
                match &*node {
                    Node::Internal(internal) => internal.child_at(0),
                    Node::Leaf(_) => return Ok(depth),
                }
            };
            depth += 1;
            page_idx = next;
        }
    }

    /// Walks the whole tree and verifies the structural invariants: variant
    /// consistency, parent pointers, strictly increasing keys, fill bounds,
    /// pivot-equals-subtree-max, uniform leaf depth, and the leaf chain.
    pub fn check_invariants(&self, pager: &mut Pager) -> Result<(), Error> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.check_node(pager, self.root_page, None, 1, &mut leaf_depth, &mut leaves)?;

        let mut previous_key: Option<u64> = None;
        for (i, &leaf_idx) in leaves.iter().enumerate() {
            let page = pager.get_page(leaf_idx, self.value_size)?;
            let node = page.lock()?;
            let leaf = node.leaf()?;

            let expected_next = leaves.get(i + 1).copied().unwrap_or(NO_PAGE);
            if leaf.next_leaf != expected_next {
                return Err(err!(
                    Storage,
                    "Leaf {} links to {} instead of {}.",
                    leaf_idx,
                    leaf.next_leaf,
                    expected_next
                ));
            }
            for cell in &leaf.cells {
                if let Some(prev) = previous_key {
                    if cell.key <= prev {
                        return Err(err!(
                            Storage,
                            "Key {} on leaf {} is not greater than its predecessor {}.",
                            cell.key,
                            leaf_idx,
                            prev
                        ));
                    }
                }
                previous_key = Some(cell.key);
            }
        }
        Ok(())
    }

    fn check_node(
        &self,
        pager: &mut Pager,
        idx: PageIdx,
        expected_parent: Option<PageIdx>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<PageIdx>,
    ) -> Result<(), Error> {
        let snapshot = {
            let page = pager.get_page(idx, self.value_size)?;
            let node = page.lock()?;
            node.clone()
        };

        let is_root = expected_parent.is_none();
        if snapshot.is_root() != is_root {
            return Err(err!(Storage, "Page {} has a wrong root flag.", idx));
        }
        if let Some(parent) = expected_parent {
            if snapshot.parent() != parent {
                return Err(err!(
                    Storage,
                    "Page {} records parent {} instead of {}.",
                    idx,
                    snapshot.parent(),
                    parent
                ));
            }
        }

        match snapshot {
            Node::Leaf(leaf) => {
                if let Some(expected) = *leaf_depth {
                    if depth != expected {
                        return Err(err!(
                            Storage,
                            "Leaf {} sits at depth {} instead of {}.",
                            idx,
                            depth,
                            expected
                        ));
                    }
                } else {
                    *leaf_depth = Some(depth);
                }
                if !is_root && leaf.cells.len() < leaf.min_cells() {
                    return Err(err!(
                        Storage,
                        "Leaf {} holds {} cells, below the minimum {}.",
                        idx,
                        leaf.cells.len(),
                        leaf.min_cells()
                    ));
                }
                for win in leaf.cells.windows(2) {
                    if win[0].key >= win[1].key {
                        return Err(err!(Storage, "Keys out of order on leaf {}.", idx));
                    }
                }
                leaves.push(idx);
            }
            Node::Internal(internal) => {
                if internal.right_child == NO_PAGE {
                    return Err(err!(Storage, "Internal node {} has no right child.", idx));
                }
                if !is_root && internal.keys_num() < INTERNAL_MIN_KEYS {
                    return Err(err!(
                        Storage,
                        "Internal node {} holds {} keys, below the minimum {}.",
                        idx,
                        internal.keys_num(),
                        INTERNAL_MIN_KEYS
                    ));
                }
                for win in internal.cells.windows(2) {
                    if win[0].key >= win[1].key {
                        return Err(err!(Storage, "Pivots out of order on node {}.", idx));
                    }
                }
                for cell in &internal.cells {
                    let subtree_max = self.max_key_of(pager, cell.child)? as u32;
                    if subtree_max != cell.key {
                        return Err(err!(
                            Storage,
                            "Pivot {} on node {} does not match subtree max {}.",
                            cell.key,
                            idx,
                            subtree_max
                        ));
                    }
                }
                if let Some(last) = internal.cells.last() {
                    let right_max = self.max_key_of(pager, internal.right_child)? as u32;
                    if right_max <= last.key {
                        return Err(err!(
                            Storage,
                            "Right subtree max {} of node {} is not past the last pivot {}.",
                            right_max,
                            idx,
                            last.key
                        ));
                    }
                }
                for child in internal.children() {
                    self.check_node(pager, child, Some(idx), depth + 1, leaf_depth, leaves)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Payload size chosen so a leaf holds exactly 13 cells:
    /// (4096 − 14) / (8 + 306) = 13.
    const SPLIT_VALUE_SIZE: usize = 306;

    /// Payload size chosen so a leaf holds exactly one cell, which keeps
    /// trees deep and exercises every structural path.
    const TINY_LEAF_VALUE_SIZE: usize = 2100;

    fn fresh_tree(dir: &tempfile::TempDir, value_size: usize) -> (BTree, Pager) {
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let page = pager.get_page(0, value_size).unwrap();
        page.lock().unwrap().set_root(true);
        (BTree::new(0, value_size), pager)
    }

    fn payload(value_size: usize, key: u64) -> Vec<u8> {
        let mut value = vec![0u8; value_size];
        value[0] = key as u8;
        value
    }

    fn insert_key(tree: &BTree, pager: &mut Pager, key: u64) {
        tree.insert(pager, key, payload(tree.value_size, key))
            .unwrap();
    }

    fn collect_keys(tree: &BTree, pager: &mut Pager) -> Vec<u64> {
        let mut keys = Vec::new();
        let mut cursor = tree.seek_first(pager).unwrap();
        while !cursor.end_of_table {
            keys.push(cursor.key(pager).unwrap());
            cursor.advance(pager).unwrap();
        }
        keys
    }

    #[test]
    fn leaf_split_produces_two_half_full_leaves() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, SPLIT_VALUE_SIZE);

        for key in 0..14 {
            insert_key(&tree, &mut pager, key);
        }
        tree.check_invariants(&mut pager).unwrap();

        // Root stays on page 0; the right sibling lands on page 1 and the
        // old root's cells move to page 2.
        let root_page = pager.get_page(0, SPLIT_VALUE_SIZE).unwrap();
        let root_node = root_page.lock().unwrap();
        let root = root_node.internal().unwrap();
        assert_eq!(root.keys_num(), 1);
        assert_eq!(root.cells[0], InternalCell { key: 6, child: 2 });
        assert_eq!(root.right_child, 1);
        drop(root_node);

        for (page_idx, expected_len, expected_next) in [(2u32, 7usize, 1u32), (1, 7, NO_PAGE)] {
            let page = pager.get_page(page_idx, SPLIT_VALUE_SIZE).unwrap();
            let node = page.lock().unwrap();
            let leaf = node.leaf().unwrap();
            assert_eq!(leaf.cells.len(), expected_len);
            assert_eq!(leaf.next_leaf, expected_next);
        }

        assert_eq!(collect_keys(&tree, &mut pager), (0..14).collect::<Vec<_>>());
    }

    #[test]
    fn sequential_inserts_keep_invariants_and_order() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, SPLIT_VALUE_SIZE);

        for key in 0..100 {
            insert_key(&tree, &mut pager, key);
            if key % 9 == 0 {
                tree.check_invariants(&mut pager).unwrap();
            }
        }
        tree.check_invariants(&mut pager).unwrap();
        assert_eq!(collect_keys(&tree, &mut pager), (0..100).collect::<Vec<_>>());

        for key in 0..100 {
            let (_, found) = tree.seek(&mut pager, key).unwrap();
            assert!(found, "key {} went missing", key);
        }
        assert_eq!(tree.seek_max_key(&mut pager).unwrap(), Some(99));
    }

    #[test]
    fn duplicate_key_is_rejected_without_structural_change() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, SPLIT_VALUE_SIZE);

        for key in 0..20 {
            insert_key(&tree, &mut pager, key);
        }
        let pages_before = pager.total_pages();
        let err = tree.insert(&mut pager, 11, payload(SPLIT_VALUE_SIZE, 11));
        assert!(matches!(err, Err(Error::Validation(_))));
        assert_eq!(pager.total_pages(), pages_before);
        tree.check_invariants(&mut pager).unwrap();
        assert_eq!(collect_keys(&tree, &mut pager).len(), 20);
    }

    #[test]
    fn deleting_a_missing_key_is_a_no_op() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, SPLIT_VALUE_SIZE);

        for key in 0..30 {
            insert_key(&tree, &mut pager, key);
        }
        assert!(!tree.delete(&mut pager, 555).unwrap());
        tree.check_invariants(&mut pager).unwrap();
        assert_eq!(collect_keys(&tree, &mut pager).len(), 30);
    }

    #[test]
    fn delete_all_collapses_back_to_an_empty_root_leaf() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, SPLIT_VALUE_SIZE);

        for key in 0..100 {
            insert_key(&tree, &mut pager, key);
        }
        for key in 0..100 {
            assert!(tree.delete(&mut pager, key).unwrap());
            if key % 7 == 0 {
                tree.check_invariants(&mut pager).unwrap();
            }
        }
        tree.check_invariants(&mut pager).unwrap();

        let page = pager.get_page(0, SPLIT_VALUE_SIZE).unwrap();
        let node = page.lock().unwrap();
        let leaf = node.leaf().unwrap();
        assert!(leaf.is_root);
        assert!(leaf.cells.is_empty());
    }

    #[test]
    fn three_level_tree_grows_and_drains() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, TINY_LEAF_VALUE_SIZE);
        assert_eq!(
            crate::storage::node::max_leaf_cells(TINY_LEAF_VALUE_SIZE),
            1
        );

        for key in 0..600 {
            insert_key(&tree, &mut pager, key);
            if key % 97 == 0 {
                tree.check_invariants(&mut pager).unwrap();
            }
        }
        tree.check_invariants(&mut pager).unwrap();
        assert_eq!(tree.depth(&mut pager).unwrap(), 3);
        assert_eq!(collect_keys(&tree, &mut pager), (0..600).collect::<Vec<_>>());

        for key in 0..600 {
            assert!(tree.delete(&mut pager, key).unwrap());
            if key % 83 == 0 {
                tree.check_invariants(&mut pager).unwrap();
            }
        }
        tree.check_invariants(&mut pager).unwrap();
        assert_eq!(tree.depth(&mut pager).unwrap(), 1);
        assert!(collect_keys(&tree, &mut pager).is_empty());
    }

    #[test]
    fn interleaved_deletes_and_reinserts_hold_up() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, TINY_LEAF_VALUE_SIZE);

        for key in 0..40 {
            insert_key(&tree, &mut pager, key);
        }
        for key in (0..40).step_by(2) {
            assert!(tree.delete(&mut pager, key).unwrap());
        }
        tree.check_invariants(&mut pager).unwrap();
        assert_eq!(
            collect_keys(&tree, &mut pager),
            (1..40).step_by(2).collect::<Vec<_>>()
        );

        for key in (0..40).step_by(2) {
            insert_key(&tree, &mut pager, key);
        }
        tree.check_invariants(&mut pager).unwrap();
        assert_eq!(collect_keys(&tree, &mut pager), (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn deleting_from_the_tail_updates_pivots() {
        let dir = tempdir().unwrap();
        let (tree, mut pager) = fresh_tree(&dir, SPLIT_VALUE_SIZE);

        for key in 0..50 {
            insert_key(&tree, &mut pager, key);
        }
        for key in (25..50).rev() {
            assert!(tree.delete(&mut pager, key).unwrap());
            tree.check_invariants(&mut pager).unwrap();
        }
        assert_eq!(tree.seek_max_key(&mut pager).unwrap(), Some(24));
    }
}
