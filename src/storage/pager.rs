//! # File-Backed Page Cache
//!
//! The pager owns the backing file and a vector of page slots indexed by
//! page number. A slot starts empty; the first access seeks to the page's
//! file offset and reads it into a fresh buffer. Short reads at the end of
//! the file leave the tail of the buffer zeroed, so a file whose length is
//! not a page multiple still presents whole pages.
//!
//! Mutable access marks a slot dirty. Dirty pages are written back by
//! `flush_page`/`flush_all`; nothing is written before that, and a flushed
//! page writes its full buffer regardless of how much of it is meaningful.
//!
//! ## Lifecycle
//!
//! ```text
//! open -> page/page_mut/allocate_page ... -> flush_all -> close
//! ```
//!
//! Pages are never freed: allocation extends the file by one slot at a
//! time and the cache holds every touched page until the pager is dropped.
//! `close` flushes all dirty pages and syncs the file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use super::{MAX_PAGES, PAGE_SIZE};

#[derive(Debug)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
    dirty: bool,
}

impl Page {
    fn zeroed() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[derive(Debug)]
pub struct Pager {
    file: File,
    path: PathBuf,
    pages: Vec<Option<Page>>,
    num_pages: u32,
}

impl Pager {
    /// Opens or creates the backing file. Computes the page count from the
    /// file length without reading any page.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();

        let num_pages = file_size.div_ceil(PAGE_SIZE as u64) as u32;
        ensure!(
            num_pages <= MAX_PAGES,
            "file '{}' has {} pages, limit is {}",
            path.display(),
            num_pages,
            MAX_PAGES
        );

        let pages = (0..num_pages).map(|_| None).collect();

        Ok(Self {
            file,
            path,
            pages,
            num_pages,
        })
    }

    /// Returns the page buffer, reading it from disk on first access.
    pub fn page(&mut self, page_no: u32) -> Result<&[u8]> {
        let page = self.fetch(page_no)?;
        Ok(&page.data[..])
    }

    /// Returns the page buffer for mutation and marks the slot dirty.
    pub fn page_mut(&mut self, page_no: u32) -> Result<&mut [u8]> {
        let page = self.fetch(page_no)?;
        page.dirty = true;
        Ok(&mut page.data[..])
    }

    /// Appends a zeroed page slot, already marked dirty, and returns its
    /// page number.
    pub fn allocate_page(&mut self) -> Result<u32> {
        ensure!(
            self.num_pages < MAX_PAGES,
            "no free pages: limit of {} pages reached",
            MAX_PAGES
        );

        let page_no = self.num_pages;
        let mut page = Page::zeroed();
        page.dirty = true;
        self.pages.push(Some(page));
        self.num_pages += 1;
        Ok(page_no)
    }

    /// Writes the page back if it is dirty; a clean or untouched slot is a
    /// no-op.
    pub fn flush_page(&mut self, page_no: u32) -> Result<()> {
        let Some(page) = self
            .pages
            .get_mut(page_no as usize)
            .and_then(|slot| slot.as_mut())
        else {
            return Ok(());
        };
        if !page.dirty {
            return Ok(());
        }

        let offset = page_no as u64 * PAGE_SIZE as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("failed to seek to page {}", page_no))?;
        self.file
            .write_all(&page.data[..])
            .wrap_err_with(|| format!("failed to write page {} to '{}'", page_no, self.path.display()))?;

        page.dirty = false;
        Ok(())
    }

    /// Flushes every dirty page, then syncs the file to disk.
    pub fn flush_all(&mut self) -> Result<()> {
        for page_no in 0..self.num_pages {
            self.flush_page(page_no)?;
        }
        self.file
            .sync_all()
            .wrap_err_with(|| format!("failed to sync '{}'", self.path.display()))
    }

    /// Flushes everything and releases the file handle.
    pub fn close(mut self) -> Result<()> {
        self.flush_all()
    }

    pub fn page_count(&self) -> u32 {
        self.num_pages
    }

    pub fn file_size(&self) -> u64 {
        self.num_pages as u64 * PAGE_SIZE as u64
    }

    fn fetch(&mut self, page_no: u32) -> Result<&mut Page> {
        ensure!(
            page_no < MAX_PAGES,
            "page {} out of bounds (max {})",
            page_no,
            MAX_PAGES
        );
        ensure!(
            page_no < self.num_pages,
            "page {} beyond end of file ({} pages)",
            page_no,
            self.num_pages
        );

        let idx = page_no as usize;
        if self.pages[idx].is_none() {
            let page = load_page(&mut self.file, page_no)
                .wrap_err_with(|| format!("failed to read page {} from '{}'", page_no, self.path.display()))?;
            self.pages[idx] = Some(page);
        }

        // INVARIANT: the slot was populated above
        Ok(self.pages[idx].as_mut().unwrap())
    }
}

/// Seeks to the page offset and reads up to a full page. A short read at
/// end of file leaves the buffer tail zeroed.
fn load_page(file: &mut File, page_no: u32) -> Result<Page> {
    let mut page = Page::zeroed();
    let offset = page_no as u64 * PAGE_SIZE as u64;

    file.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < PAGE_SIZE {
        let n = file.read(&mut page.data[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(page)
}
