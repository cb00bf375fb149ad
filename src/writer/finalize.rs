//! Finalization: turning a flat chain of leaf pages into a balanced table
//! b-tree, and salvaging files whose writer died mid-append.
//!
//! The build is bottom-up and runs out of the writer's one page buffer.
//! Each level of the tree is scanned left to right; for every page a
//! separator row id is fetched with two 12-byte reads, an inner cell is
//! appended to the interior page under construction, and full interior
//! pages are emitted as they close. The level just emitted becomes the
//! next level's input, until a level closes with a single page: the root.

use byteorder::{BigEndian, ByteOrder};

use crate::checksum;
use crate::dbheader;
use crate::error::Error;
use crate::page;
use crate::record::{self, LEN_OF_REC_LEN};
use crate::varint;
use crate::vfs::WriteVfs;
use crate::MASTER_ROOTPAGE_COLIDX;

use super::WriteContext;

/// First data-leaf page number; page 1 is the header page.
const FIRST_LEAF_PAGE: u32 = 2;

impl<V: WriteVfs> WriteContext<V> {
    /// Flushes the open page and records it as the last leaf in the page-1
    /// header, leaving the unfinalized magic in place. This is enough to
    /// make binary search and append work; the interior tree can be built
    /// later. A no-op on an already finalized file.
    pub fn partial_finalize(&mut self) -> Result<(), Error> {
        if self.dirty {
            self.flush()?;
        }
        self.read_page_into_buf(1)?;
        if &self.buf[0..16] == dbheader::SQLITE_MAGIC {
            return Ok(());
        }
        dbheader::set_last_leaf_page(&mut self.buf, self.cur_write_page);
        self.write_page(1)
    }

    /// Builds the interior b-tree over the leaves written so far, patches
    /// the master record's root page and the header page count, and flips
    /// the magic to the canonical one. The file is a complete database
    /// afterwards.
    pub fn finalize(&mut self) -> Result<(), Error> {
        self.partial_finalize()?;

        // Bottom-up interior build. Page numbers: the current level spans
        // [cur_level_pos, next_level_begin), output goes to next_level_cur.
        let mut next_level_cur = self.cur_write_page + 1;
        let mut next_level_begin = next_level_cur;
        let mut cur_level_pos = FIRST_LEAF_PAGE;
        if self.cur_write_page != FIRST_LEAF_PAGE {
            loop {
                page::init_interior(&mut self.buf);
                while cur_level_pos < next_level_begin {
                    let rowid = self.last_rowid_in_subtree(cur_level_pos)?;
                    let is_last = cur_level_pos + 1 == next_level_begin;
                    if add_inner_cell(&mut self.buf, cur_level_pos, rowid, is_last) {
                        self.write_page(next_level_cur)?;
                        next_level_cur += 1;
                        page::init_interior(&mut self.buf);
                    }
                    cur_level_pos += 1;
                }
                if next_level_begin == next_level_cur - 1 {
                    // The level closed as a single page: the root.
                    break;
                }
                cur_level_pos = next_level_begin;
                next_level_begin = next_level_cur;
            }
        }
        let root_page = next_level_cur - 1;

        self.read_page_into_buf(1)?;
        let rec_pos = page::heap_pos(&self.buf, dbheader::DB_HEADER_BYTES) as usize;
        let col = record::locate_column(&self.buf, rec_pos, MASTER_ROOTPAGE_COLIDX)?;
        BigEndian::write_u32(&mut self.buf[col.data_pos..col.data_pos + 4], root_page);
        dbheader::set_page_count(&mut self.buf, root_page);
        dbheader::set_magic(&mut self.buf, true);
        self.write_page(1)?;
        self.vfs.flush()
    }

    /// Salvages a database whose writer stopped without `partial_finalize`
    /// (unfinalized magic, empty last-leaf slot) and finalizes it. Scans
    /// the data pages from page 2 forward and keeps everything up to the
    /// last readable leaf — with checksums enabled, the last leaf whose
    /// sums verify.
    pub fn recover(&mut self) -> Result<(), Error> {
        let mut head = [0u8; dbheader::HEADER_PREFIX_BYTES];
        self.vfs.read_at(0, &mut head)?;
        let info = dbheader::parse(&head)?;
        if info.finalized {
            return Ok(());
        }
        if info.page_size_exp != self.page_size_exp {
            self.page_size_exp = info.page_size_exp;
            self.buf = vec![0u8; 1usize << info.page_size_exp].into_boxed_slice();
        }
        self.page_resv_bytes = info.resv_bytes;
        if self.checksums && (info.resv_bytes as usize) < checksum::CHKSUM_LEN {
            // The file was created without room for checksums.
            self.checksums = false;
        }

        let mut last_good: u32 = 0;
        let mut page_no = FIRST_LEAF_PAGE;
        loop {
            if self.read_page_into_buf(page_no).is_err() {
                break;
            }
            if self.buf[0] != page::LEAF || page::heap_pos(&self.buf, 0) == 0 {
                break;
            }
            if self.checksums
                && checksum::verify_leaf(&self.buf, self.page_resv_bytes as usize).is_err()
            {
                break;
            }
            last_good = page_no;
            page_no += 1;
        }

        if last_good == 0 {
            // Nothing salvageable: finalize as an empty table.
            self.cur_write_page = FIRST_LEAF_PAGE;
            self.cur_write_rowid = 0;
            page::init_leaf(&mut self.buf);
        } else {
            self.cur_write_page = last_good;
            self.cur_write_rowid = self.last_rowid_in_subtree(last_good)?;
            self.read_page_into_buf(last_good)?;
        }
        self.dirty = true;
        self.finalize()
    }

    /// Greatest row id stored under `page_no`: follows right-child
    /// pointers of interior pages down to a leaf, then decodes the row id
    /// of the leaf's last cell. Reads 12 bytes at a time so the page
    /// buffer is never disturbed.
    pub(super) fn last_rowid_in_subtree(&mut self, mut page_no: u32) -> Result<u32, Error> {
        loop {
            let mut head = [0u8; 12];
            self.vfs.read_at(self.page_off(page_no), &mut head)?;
            if head[0] == page::INTERIOR {
                page_no = BigEndian::read_u32(&head[8..12]);
                continue;
            }
            if head[0] != page::LEAF {
                return Err(Error::Malformed);
            }
            let last_pos = BigEndian::read_u16(&head[5..7]);
            if last_pos == 0 {
                return Ok(0);
            }
            let mut cell = [0u8; 12];
            self.vfs
                .read_at(self.page_off(page_no) + last_pos as u64, &mut cell)?;
            let (rowid, _) = varint::read_u32(&cell[LEN_OF_REC_LEN..]);
            return Ok(rowid);
        }
    }
}

/// Appends the cell `(child, rowid)` to the interior page in `buf`.
/// Returns true when the page is done — because it filled up, or because
/// `is_last` promoted this child to the right-child slot — and must be
/// written out by the caller.
fn add_inner_cell(buf: &mut [u8], child: u32, rowid: u32, is_last: bool) -> bool {
    let page_size = buf.len();
    let heap = page::heap_pos(buf, 0) as usize;
    let count = page::rec_count(buf, 0) + 1;
    let rec_len = 4 + varint::len_u32(rowid);

    let mut last_pos = if heap == 0 {
        page_size - rec_len
    } else if heap < rec_len || heap - rec_len < 12 + count as usize * 2 {
        0
    } else {
        heap - rec_len
    };
    if is_last {
        last_pos = 0;
    }
    if last_pos == 0 {
        page::set_right_child(buf, child);
        return true;
    }
    BigEndian::write_u32(&mut buf[last_pos..last_pos + 4], child);
    varint::write_u32(&mut buf[last_pos + 4..], rowid);
    page::set_rec_count(buf, 0, count);
    page::set_cell_ptr(buf, 0, count as usize - 1, last_pos as u16);
    page::set_heap_pos(buf, 0, last_pos as u16);
    false
}
