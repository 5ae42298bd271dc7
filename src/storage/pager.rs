//! The pager owns the database file and a bounded in-memory page table.
//!
//! Page `k` lives at byte offset `k × PAGE_SIZE`. Pages are decoded lazily on
//! first access, handed out as shared [`PageRef`] guards, and written back
//! only on explicit flush. Nothing is ever evicted; the database flushes
//! every cached page on close.

use super::node::{LeafNode, Node, PageIdx, PAGE_SIZE};
use crate::errors::Error;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Page cache capacity; exceeding it is a hard `Capacity` error.
pub const MAX_PAGES: usize = 1024;

/// Shared handle to one cached page.
#[derive(Clone)]
pub struct PageRef(Arc<Mutex<Node>>);

impl PageRef {
    fn new(node: Node) -> Self {
        PageRef(Arc::new(Mutex::new(node)))
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Node>, Error> {
        self.0
            .try_lock()
            .map_err(|_| Error::LockPage("Failed to lock the page.".to_string()))
    }
}

pub struct Pager {
    file: File,
    /// Dense page table: entry `k` caches page `k`, `None` until faulted.
    pages: heapless::Vec<Option<PageRef>, MAX_PAGES>,
    total_pages: u32,
}

impl Pager {
    /// Opens (or creates) the database file and sizes the page table.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_size = file.seek(SeekFrom::End(0))?;
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Corruption,
                "Database file size {} is not a multiple of the page size {}.",
                file_size,
                PAGE_SIZE
            ));
        }
        let total_pages = (file_size / PAGE_SIZE as u64) as u32;
        if total_pages as usize > MAX_PAGES {
            return Err(err!(
                Capacity,
                "Database file holds {} pages, the pager caps at {}.",
                total_pages,
                MAX_PAGES
            ));
        }

        let mut pages = heapless::Vec::new();
        for _ in 0..total_pages {
            // Sized at open; cannot overflow past the check above.
            let _ = pages.push(None);
        }

        debug!(total_pages, "Opened pager.");
        Ok(Pager {
            file,
            pages,
            total_pages,
        })
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Next page index a fresh allocation would take.
    pub fn unused_page_idx(&self) -> PageIdx {
        self.total_pages
    }

    /// Returns the page at `idx`, materializing it if needed: an index below
    /// `total_pages` is read from the file, `total_pages` itself allocates a
    /// fresh empty leaf, anything beyond fails. Leaf payloads are sliced
    /// with `value_size`.
    pub fn get_page(&mut self, idx: PageIdx, value_size: usize) -> Result<PageRef, Error> {
        if idx > self.total_pages {
            return Err(err!(
                Storage,
                "Page {} is beyond the end of the file ({} pages).",
                idx,
                self.total_pages
            ));
        }

        if idx == self.total_pages {
            let page = PageRef::new(Node::Leaf(LeafNode::new(value_size)));
            self.pages.push(Some(page.clone())).map_err(|_| {
                err!(Capacity, "Page cache is full ({} pages).", MAX_PAGES)
            })?;
            self.total_pages += 1;
            trace!(page = idx, "Allocated page.");
            return Ok(page);
        }

        if let Some(page) = &self.pages[idx as usize] {
            return Ok(page.clone());
        }

        let mut buf = [0u8; PAGE_SIZE];
        self.file
            .seek(SeekFrom::Start(idx as u64 * PAGE_SIZE as u64))?;
        self.file.read_exact(&mut buf)?;
        let page = PageRef::new(Node::decode(&buf, value_size)?);
        self.pages[idx as usize] = Some(page.clone());
        trace!(page = idx, "Read page.");
        Ok(page)
    }

    /// Encodes the cached page at `idx` and writes it at its file offset.
    pub fn flush(&mut self, idx: PageIdx) -> Result<(), Error> {
        let buf = {
            let page = self
                .pages
                .get(idx as usize)
                .and_then(|p| p.as_ref())
                .ok_or_else(|| err!(Storage, "Nil page {}: nothing cached to flush.", idx))?;
            page.lock()?.encode()?
        };
        self.file
            .seek(SeekFrom::Start(idx as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Flushes every cached page and syncs the file.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        let mut flushed = 0;
        for idx in 0..self.total_pages {
            if self.pages[idx as usize].is_some() {
                self.flush(idx)?;
                flushed += 1;
            }
        }
        self.file.sync_all()?;
        debug!(flushed, "Flushed pages.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::node::LeafCell;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn opens_empty_file_with_zero_pages() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(&dir.path().join("db")).unwrap();
        assert_eq!(pager.total_pages(), 0);
    }

    #[test]
    fn allocates_fresh_leaves_in_order() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();

        let page = pager.get_page(0, 16).unwrap();
        assert_eq!(pager.total_pages(), 1);
        assert!(!page.lock().unwrap().is_internal());

        pager.get_page(1, 16).unwrap();
        assert_eq!(pager.total_pages(), 2);
    }

    #[test]
    fn rejects_access_beyond_the_end() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        assert!(matches!(pager.get_page(5, 16), Err(Error::Storage(_))));
    }

    #[test]
    fn flush_then_reopen_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        {
            let mut pager = Pager::open(&path).unwrap();
            let page = pager.get_page(0, 4).unwrap();
            {
                let mut node = page.lock().unwrap();
                let leaf = node.leaf_mut().unwrap();
                leaf.is_root = true;
                leaf.cells.push(LeafCell {
                    key: 5,
                    value: vec![1, 2, 3, 4],
                });
            }
            pager.flush_all().unwrap();
        }

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.total_pages(), 1);
        let page = pager.get_page(0, 4).unwrap();
        let node = page.lock().unwrap();
        let leaf = node.leaf().unwrap();
        assert!(leaf.is_root);
        assert_eq!(leaf.cells.len(), 1);
        assert_eq!(leaf.cells[0].key, 5);
        assert_eq!(leaf.cells[0].value, vec![1, 2, 3, 4]);
    }

    #[test]
    fn flushing_an_uncached_page_fails() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        assert!(matches!(pager.flush(0), Err(Error::Storage(_))));
    }

    #[test]
    fn rejects_torn_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        drop(file);
        assert!(matches!(Pager::open(&path), Err(Error::Corruption(_))));
    }

    #[test]
    fn page_cache_is_bounded() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("db")).unwrap();
        for idx in 0..MAX_PAGES as u32 {
            pager.get_page(idx, 1).unwrap();
        }
        assert!(matches!(
            pager.get_page(MAX_PAGES as u32, 1),
            Err(Error::Capacity(_))
        ));
    }
}
