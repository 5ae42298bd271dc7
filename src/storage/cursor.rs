//! # Database Cursor Module
//!
//! A cursor is a `{page, cell}` position into a table's B+Tree, used for
//! ordered traversal and point reads/writes. Structural changes (splits,
//! merges) invalidate cursors; UPDATE and DELETE therefore collect key
//! snapshots before mutating instead of advancing through a changing tree.

use super::node::{Node, PageIdx, NO_PAGE};
use super::pager::Pager;
use crate::errors::Error;

#[derive(Debug, Clone)]
pub struct Cursor {
    /// Current page number in the table's tree.
    pub page_idx: PageIdx,

    /// Current cell number within the leaf.
    pub cell_idx: usize,

    /// Indicates a position one past the last element.
    pub end_of_table: bool,

    /// Leaf payload size, needed to fault pages in.
    value_size: usize,
}

impl Cursor {
    pub fn at(page_idx: PageIdx, cell_idx: usize, value_size: usize) -> Self {
        Cursor {
            page_idx,
            cell_idx,
            end_of_table: false,
            value_size,
        }
    }

    /// Key of the cell under the cursor.
    pub fn key(&self, pager: &mut Pager) -> Result<u64, Error> {
        let page = pager.get_page(self.page_idx, self.value_size)?;
        let node = page.lock()?;
        let leaf = node.leaf()?;
        leaf.cells
            .get(self.cell_idx)
            .map(|cell| cell.key)
            .ok_or_else(|| {
                err!(
                    Storage,
                    "Cursor cell {} is out of bounds on page {}.",
                    self.cell_idx,
                    self.page_idx
                )
            })
    }

    /// Copies the payload of the cell under the cursor.
    pub fn value(&self, pager: &mut Pager) -> Result<Vec<u8>, Error> {
        let page = pager.get_page(self.page_idx, self.value_size)?;
        let node = page.lock()?;
        let leaf = node.leaf()?;
        leaf.cells
            .get(self.cell_idx)
            .map(|cell| cell.value.clone())
            .ok_or_else(|| {
                err!(
                    Storage,
                    "Cursor cell {} is out of bounds on page {}.",
                    self.cell_idx,
                    self.page_idx
                )
            })
    }

    /// Overwrites the payload of the cell under the cursor in place; the
    /// cell key is unchanged.
    pub fn overwrite_value(&self, pager: &mut Pager, value: &[u8]) -> Result<(), Error> {
        if value.len() != self.value_size {
            return Err(err!(
                Storage,
                "Payload of {} bytes in a {}-byte cell slot.",
                value.len(),
                self.value_size
            ));
        }
        let page = pager.get_page(self.page_idx, self.value_size)?;
        let mut node = page.lock()?;
        let leaf = node.leaf_mut()?;
        let cell = leaf.cells.get_mut(self.cell_idx).ok_or_else(|| {
            err!(
                Storage,
                "Cursor cell {} is out of bounds on page {}.",
                self.cell_idx,
                self.page_idx
            )
        })?;
        cell.value = value.to_vec();
        Ok(())
    }

    /// Advances to the next cell, hopping to the next leaf in the chain at
    /// the end of the page and flagging `end_of_table` past the last leaf.
    pub fn advance(&mut self, pager: &mut Pager) -> Result<(), Error> {
        let page = pager.get_page(self.page_idx, self.value_size)?;
        let (num_cells, next_leaf) = {
            let node = page.lock()?;
            let leaf = node.leaf()?;
            (leaf.cells.len(), leaf.next_leaf)
        };

        self.cell_idx += 1;
        if self.cell_idx < num_cells {
            return Ok(());
        }
        if next_leaf == NO_PAGE {
            self.end_of_table = true;
            return Ok(());
        }

        self.page_idx = next_leaf;
        self.cell_idx = 0;
        let page = pager.get_page(self.page_idx, self.value_size)?;
        let node = page.lock()?;
        if let Node::Leaf(leaf) = &*node {
            if leaf.cells.is_empty() {
                self.end_of_table = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::btree::BTree;
    use tempfile::tempdir;

    // Small enough payloads that several leaves are involved: a 500-byte
    // payload gives (4096 − 14) / 508 = 8 cells per leaf.
    const VALUE_SIZE: usize = 500;

    fn populated_tree(pager: &mut Pager, keys: u64) -> BTree {
        let page = pager.get_page(0, VALUE_SIZE).unwrap();
        page.lock().unwrap().set_root(true);
        let tree = BTree::new(0, VALUE_SIZE);
        for key in 0..keys {
            let mut value = vec![0u8; VALUE_SIZE];
            value[0] = key as u8;
            tree.insert(pager, key, value).unwrap();
        }
        tree
    }

    #[test]
    fn advance_walks_the_leaf_chain_in_key_order() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let tree = populated_tree(&mut pager, 30);

        let mut cursor = tree.seek_first(&mut pager).unwrap();
        let mut seen = Vec::new();
        let mut pages = Vec::new();
        while !cursor.end_of_table {
            seen.push(cursor.key(&mut pager).unwrap());
            if pages.last() != Some(&cursor.page_idx) {
                pages.push(cursor.page_idx);
            }
            cursor.advance(&mut pager).unwrap();
        }
        assert_eq!(seen, (0..30).collect::<Vec<_>>());
        assert!(pages.len() > 1, "expected the walk to cross leaves");
    }

    #[test]
    fn overwrite_changes_the_payload_but_not_the_key() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let tree = populated_tree(&mut pager, 10);

        let (cursor, found) = tree.seek(&mut pager, 4).unwrap();
        assert!(found);
        let mut replacement = vec![9u8; VALUE_SIZE];
        replacement[1] = 7;
        cursor.overwrite_value(&mut pager, &replacement).unwrap();

        let (cursor, found) = tree.seek(&mut pager, 4).unwrap();
        assert!(found);
        assert_eq!(cursor.key(&mut pager).unwrap(), 4);
        assert_eq!(cursor.value(&mut pager).unwrap(), replacement);
    }

    #[test]
    fn overwrite_rejects_mis_sized_payloads() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let tree = populated_tree(&mut pager, 3);

        let (cursor, _) = tree.seek(&mut pager, 1).unwrap();
        let outcome = cursor.overwrite_value(&mut pager, &[1, 2, 3]);
        assert!(matches!(outcome, Err(Error::Storage(_))));
    }

    #[test]
    fn empty_table_starts_at_the_end() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        let tree = populated_tree(&mut pager, 0);
        let cursor = tree.seek_first(&mut pager).unwrap();
        assert!(cursor.end_of_table);
    }
}
