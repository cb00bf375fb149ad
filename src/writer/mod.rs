//! The streaming writer: builds rows in place inside one page-sized buffer
//! and hands full pages to the host.
//!
//! The writer keeps exactly one open leaf in its buffer at all times. Rows
//! are appended as all-NULL records and filled in column by column; a value
//! that no longer fits the open page takes the in-progress record along to
//! a fresh page. Nothing outside the buffer is ever touched in memory, so
//! the whole context runs in a couple of KiB regardless of file size.

mod finalize;

use itertools::Itertools;

use crate::checksum;
use crate::dbheader;
use crate::error::Error;
use crate::page;
use crate::record::{self, LEN_OF_HDR_LEN, LEN_OF_REC_LEN};
use crate::serial_type;
use crate::value::Value;
use crate::varint;
use crate::vfs::WriteVfs;
use crate::DEFAULT_TABLE_NAME;

/// Tuning knobs supplied when constructing a [`WriteContext`].
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Number of columns in the logged table.
    pub col_count: u8,
    /// Page size as a power of two, 9 (512 bytes) through 16 (65536).
    pub page_size_exp: u8,
    /// Reserved bytes at the end of every page. Raised to 3 when
    /// checksums are enabled.
    pub page_resv_bytes: u8,
    /// Stamp and maintain per-page checksums (see the `checksum` module).
    pub checksums: bool,
}

impl Default for WriteOptions {
    fn default() -> WriteOptions {
        WriteOptions {
            col_count: 1,
            page_size_exp: 12,
            page_resv_bytes: 0,
            checksums: false,
        }
    }
}

/// The write context: one open database being logged to.
///
/// Owns the single page buffer and the host storage. Construct with
/// [`WriteContext::new`], then either [`init`](WriteContext::init) a fresh
/// file or [`init_for_append`](WriteContext::init_for_append) an existing
/// unfinalized one.
pub struct WriteContext<V: WriteVfs> {
    vfs: V,
    buf: Box<[u8]>,
    col_count: u8,
    page_size_exp: u8,
    page_resv_bytes: u8,
    checksums: bool,
    /// Page number (1-origin) of the page currently in the buffer.
    cur_write_page: u32,
    /// Row id of the most recently appended row.
    cur_write_rowid: u32,
    /// The buffer holds changes not yet handed to the host.
    dirty: bool,
}

impl<V: WriteVfs> WriteContext<V> {
    /// Validates the options and allocates the page buffer. Does not touch
    /// storage.
    pub fn new(vfs: V, opts: WriteOptions) -> Result<WriteContext<V>, Error> {
        if opts.page_size_exp < 9 || opts.page_size_exp > 16 {
            return Err(Error::InvalidPageSize);
        }
        let resv = if opts.checksums {
            opts.page_resv_bytes.max(checksum::CHKSUM_LEN as u8)
        } else {
            opts.page_resv_bytes
        };
        Ok(WriteContext {
            vfs,
            buf: vec![0u8; 1usize << opts.page_size_exp].into_boxed_slice(),
            col_count: opts.col_count,
            page_size_exp: opts.page_size_exp,
            page_resv_bytes: resv,
            checksums: opts.checksums,
            cur_write_page: 0,
            cur_write_rowid: 0,
            dirty: false,
        })
    }

    /// Formats page 1 for a table named `t1` with columns `c001..cNNN`.
    pub fn init(&mut self) -> Result<(), Error> {
        self.form_page1(None, None)
    }

    /// Formats page 1 with the given table name and optional CREATE TABLE
    /// script. The table name should match the one in the script.
    pub fn init_with_script(
        &mut self,
        table_name: &str,
        table_script: Option<&str>,
    ) -> Result<(), Error> {
        self.form_page1(Some(table_name), table_script)
    }

    /// Row id of the most recently appended row.
    pub fn cur_row_id(&self) -> u32 {
        self.cur_write_rowid
    }

    /// Hands the storage back, consuming the context.
    pub fn into_vfs(self) -> V {
        self.vfs
    }

    pub fn page_size(&self) -> usize {
        1usize << self.page_size_exp
    }

    /// Offset of the b-tree header inside the buffer: 100 while the buffer
    /// holds page 1, 0 for every data page.
    fn btree_off(&self) -> usize {
        if self.buf[0] == page::LEAF {
            0
        } else {
            dbheader::DB_HEADER_BYTES
        }
    }

    fn page_off(&self, page_no: u32) -> u64 {
        (page_no as u64 - 1) * self.page_size() as u64
    }

    /// Stamps checksums if enabled and writes the buffer out as `page_no`.
    fn write_page(&mut self, page_no: u32) -> Result<(), Error> {
        if page_no == 0 {
            // No init yet; there is no page to write the buffer as.
            return Err(Error::Failed);
        }
        if self.checksums {
            if page_no == 1 {
                checksum::stamp_page1(&mut self.buf);
            } else if self.buf[0] == page::LEAF {
                checksum::stamp_leaf(&mut self.buf, self.page_resv_bytes as usize);
            }
        }
        self.vfs.write_at(self.page_off(page_no), &self.buf)
    }

    fn read_page_into_buf(&mut self, page_no: u32) -> Result<(), Error> {
        let pos = self.page_off(page_no);
        self.vfs.read_at(pos, &mut self.buf)
    }

    /// Largest admissible cell (prefix plus payload) on a fresh leaf.
    fn max_cell_len(&self) -> usize {
        // 8-byte page header, one cell pointer, checksum slack, and one
        // spare byte for serial-type growth.
        self.page_size() - self.page_resv_bytes as usize - 8 - 2 - checksum::CHKSUM_LEN - 1
    }

    /// Finds space for a new cell of the given size, spilling the open
    /// page to the host when it is full. Returns the cell position and the
    /// cell count including the new cell.
    fn make_room_for_new_row(
        &mut self,
        prefix_len: usize,
        payload_len: usize,
    ) -> Result<(usize, u16), Error> {
        let page_size = self.page_size();
        let resv = self.page_resv_bytes as usize;
        let hdr = self.btree_off();
        let need = prefix_len + payload_len;
        let heap = page::heap_pos(&self.buf, hdr) as usize;
        if heap == 0 {
            return Ok((page_size - resv - need, page::rec_count(&self.buf, hdr) + 1));
        }
        let count = page::rec_count(&self.buf, hdr) + 1;
        let floor = hdr + 9 + checksum::CHKSUM_LEN + count as usize * 2;
        if heap < need || heap - need < floor {
            self.write_page(self.cur_write_page)?;
            self.cur_write_page += 1;
            page::init_leaf(&mut self.buf);
            return Ok((page_size - resv - need, 1));
        }
        Ok((heap - need, count))
    }

    /// Appends a fresh all-NULL row and advances the row id.
    ///
    /// The record header reserves one byte per declared column, so every
    /// column can be located (and overwritten in place) immediately.
    pub fn append_row(&mut self) -> Result<(), Error> {
        let rowid = self.cur_write_rowid + 1;
        let prefix_len = LEN_OF_REC_LEN + varint::len_u32(rowid);
        let payload_len = self.col_count as usize + LEN_OF_HDR_LEN;
        if prefix_len + payload_len > self.max_cell_len() {
            return Err(Error::TooLong);
        }
        self.cur_write_rowid = rowid;
        let (last_pos, count) = self.make_room_for_new_row(prefix_len, payload_len)?;
        let hdr = self.btree_off();
        self.buf[last_pos..last_pos + prefix_len + payload_len].fill(0);
        record::write_cell_prefix(
            &mut self.buf,
            last_pos,
            payload_len as u16,
            self.cur_write_rowid,
            payload_len as u16,
        );
        page::set_rec_count(&mut self.buf, hdr, count);
        page::set_heap_pos(&mut self.buf, hdr, last_pos as u16);
        page::set_cell_ptr(&mut self.buf, hdr, count as usize - 1, last_pos as u16);
        self.dirty = true;
        Ok(())
    }

    /// Appends a whole row in one call, one value per declared column.
    pub fn append_row_with_values(&mut self, values: &[Value]) -> Result<(), Error> {
        if values.len() != self.col_count as usize {
            return Err(Error::Malformed);
        }
        let rowid = self.cur_write_rowid + 1;
        let prefix_len = LEN_OF_REC_LEN + varint::len_u32(rowid);
        let hdr_len = LEN_OF_HDR_LEN
            + values
                .iter()
                .map(|v| varint::len_u32(serial_type::derive_type_or_len(v)))
                .sum::<usize>();
        let payload_len = hdr_len + values.iter().map(serial_type::stored_len).sum::<usize>();
        if prefix_len + payload_len > self.max_cell_len() {
            return Err(Error::TooLong);
        }
        self.cur_write_rowid = rowid;
        let (last_pos, count) = self.make_room_for_new_row(prefix_len, payload_len)?;
        let hdr = self.btree_off();
        let mut pos = last_pos
            + record::write_cell_prefix(
                &mut self.buf,
                last_pos,
                payload_len as u16,
                self.cur_write_rowid,
                hdr_len as u16,
            );
        for v in values {
            pos += varint::write_u32(&mut self.buf[pos..], serial_type::derive_type_or_len(v));
        }
        for v in values {
            pos += serial_type::write_body(&mut self.buf[pos..], v);
        }
        page::set_rec_count(&mut self.buf, hdr, count);
        page::set_heap_pos(&mut self.buf, hdr, last_pos as u16);
        page::set_cell_ptr(&mut self.buf, hdr, count as usize - 1, last_pos as u16);
        self.dirty = true;
        Ok(())
    }

    /// Position of the open row's cell, appending a row first if none is
    /// open yet.
    fn acquire_last_pos(&mut self) -> Result<usize, Error> {
        let hdr = self.btree_off();
        let heap = page::heap_pos(&self.buf, hdr);
        if heap == 0 {
            self.append_row()?;
            let hdr = self.btree_off();
            return Ok(page::heap_pos(&self.buf, hdr) as usize);
        }
        Ok(heap as usize)
    }

    /// Sets the value of one column of the current row, growing or
    /// shrinking the record in place. When the grown record would collide
    /// with the cell pointer array, the page is written out without it and
    /// the record migrates to a fresh page.
    pub fn set_col_val(&mut self, col_idx: usize, val: &Value) -> Result<(), Error> {
        let page_size = self.page_size();
        let resv = self.page_resv_bytes as usize;
        let mut last_pos = self.acquire_last_pos()?;
        let mut hdr = self.btree_off();
        let mut count = page::rec_count(&self.buf, hdr);

        let col = record::locate_column(&self.buf, last_pos, col_idx)?;
        let mut hdr_pos = col.hdr_pos;
        let mut data_pos = col.data_pos;
        let rec_len = col.rec_len as usize;
        let rec_hdr_len = col.hdr_len as usize;
        let (cur_type, cur_type_len) = varint::read_u32(&self.buf[hdr_pos..]);
        let cur_len = serial_type::derive_data_len(cur_type) as usize;

        let new_len = serial_type::stored_len(val);
        let diff = new_len as isize - cur_len as isize;
        let rowid_len = varint::len_u32(self.cur_write_rowid);
        let grown = LEN_OF_REC_LEN as isize + rowid_len as isize + rec_len as isize + diff + 2;
        if grown > self.max_cell_len() as isize {
            return Err(Error::TooLong);
        }

        // Spill check: where would the cell start after growing, keeping
        // two spare bytes for serial-type growth?
        let floor = hdr + 9 + checksum::CHKSUM_LEN + count as usize * 2;
        if (last_pos as isize - diff - LEN_OF_HDR_LEN as isize) < floor as isize {
            // Roll the open cell back and write the page without it.
            if count < 2 {
                return Err(Error::TooLong);
            }
            let prev_pos = page::cell_ptr(&self.buf, hdr, count as usize - 2);
            page::set_rec_count(&mut self.buf, hdr, count - 1);
            page::set_heap_pos(&mut self.buf, hdr, prev_pos);
            self.write_page(self.cur_write_page)?;
            self.cur_write_page += 1;
            page::init_leaf(&mut self.buf);
            hdr = 0;
            // Relocate the in-progress cell to the top of the fresh page.
            let (_, rowid_len) = record::read_rowid(&self.buf, last_pos);
            let total = LEN_OF_REC_LEN + rowid_len + rec_len;
            let new_pos = page_size - resv - total;
            self.buf.copy_within(last_pos..last_pos + total, new_pos);
            hdr_pos = hdr_pos - last_pos + new_pos;
            data_pos = data_pos - last_pos + new_pos;
            last_pos = new_pos;
            count = 1;
            page::set_rec_count(&mut self.buf, hdr, count);
            page::set_heap_pos(&mut self.buf, hdr, last_pos as u16);
        }

        // Make (or reclaim) room for the body and write it.
        let new_last_pos = (last_pos as isize - diff) as usize;
        self.buf.copy_within(last_pos..data_pos, new_last_pos);
        let data_pos = (data_pos as isize - diff) as usize;
        serial_type::write_body(&mut self.buf[data_pos..], val);

        // Same for the serial type, if its varint changed width.
        let new_type = serial_type::derive_type_or_len(val);
        let hdr_diff = varint::len_u32(new_type) as isize - cur_type_len as isize;
        let diff = diff + hdr_diff;
        if hdr_diff != 0 {
            let moved = hdr_pos - last_pos;
            self.buf.copy_within(
                new_last_pos..new_last_pos + moved,
                (new_last_pos as isize - hdr_diff) as usize,
            );
        }
        varint::write_u32(&mut self.buf[(hdr_pos as isize - diff) as usize..], new_type);

        let new_last_pos = (new_last_pos as isize - hdr_diff) as usize;
        record::write_cell_prefix(
            &mut self.buf,
            new_last_pos,
            (rec_len as isize + diff) as u16,
            self.cur_write_rowid,
            (rec_hdr_len as isize + hdr_diff) as u16,
        );
        page::set_heap_pos(&mut self.buf, hdr, new_last_pos as u16);
        page::set_cell_ptr(&mut self.buf, hdr, count as usize - 1, new_last_pos as u16);
        self.dirty = true;
        Ok(())
    }

    /// Reads back a column of the current row straight out of the buffer.
    /// Returns the serial type and the body bytes.
    pub fn get_col_val(&self, col_idx: usize) -> Result<(u32, &[u8]), Error> {
        let hdr = self.btree_off();
        let last_pos = page::heap_pos(&self.buf, hdr) as usize;
        if last_pos == 0 {
            return Err(Error::NotFound);
        }
        let col = record::locate_column(&self.buf, last_pos, col_idx)?;
        let (type_or_len, _) = varint::read_u32(&self.buf[col.hdr_pos..]);
        let len = serial_type::derive_data_len(type_or_len) as usize;
        Ok((type_or_len, &self.buf[col.data_pos..col.data_pos + len]))
    }

    /// Writes the open page and invokes the host flush. The page is
    /// otherwise written only when it fills up.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.write_page(self.cur_write_page)?;
        self.vfs.flush()?;
        self.dirty = false;
        Ok(())
    }

    /// Reports whether the file still needs [`finalize`](Self::finalize).
    pub fn not_finalized(&mut self) -> Result<bool, Error> {
        let mut head = [0u8; dbheader::HEADER_PREFIX_BYTES];
        self.vfs.read_at(0, &mut head)?;
        Ok(!dbheader::check_signature(&head)?)
    }

    /// Resumes writing an existing database: re-arms the unfinalized
    /// magic, clears the last-leaf slot (a crash from here on leaves the
    /// file in the needs-recovery state), loads the last leaf and opens a
    /// fresh row on it.
    ///
    /// Fails with `NotFinalized` when the last-leaf slot is empty, which
    /// means a previous session crashed mid-append; run
    /// [`recover`](Self::recover) first.
    pub fn init_for_append(&mut self) -> Result<(), Error> {
        let mut head = [0u8; dbheader::HEADER_PREFIX_BYTES];
        self.vfs.read_at(0, &mut head)?;
        let info = dbheader::parse(&head)?;
        if info.page_size_exp != self.page_size_exp {
            self.page_size_exp = info.page_size_exp;
            self.buf = vec![0u8; 1usize << info.page_size_exp].into_boxed_slice();
        }
        self.page_resv_bytes = info.resv_bytes;
        if self.checksums && info.resv_bytes < checksum::CHKSUM_LEN as u8 {
            // The file was created without room for checksums.
            self.checksums = false;
        }
        self.read_page_into_buf(1)?;
        self.dirty = false;
        self.cur_write_page = dbheader::last_leaf_page(&self.buf);
        if self.cur_write_page == 0 {
            return Err(Error::NotFinalized);
        }
        dbheader::set_magic(&mut self.buf, false);
        dbheader::set_last_leaf_page(&mut self.buf, 0);
        self.write_page(1)?;
        self.cur_write_rowid = self.last_rowid_in_subtree(self.cur_write_page)?;
        self.read_page_into_buf(self.cur_write_page)?;
        if self.checksums {
            checksum::verify_leaf(&self.buf, self.page_resv_bytes as usize)?;
        }
        self.append_row()
    }

    /// Builds page 1: the file header and the single master-table record
    /// whose `rootpage` the finalizer later patches in place.
    fn form_page1(
        &mut self,
        table_name: Option<&str>,
        table_script: Option<&str>,
    ) -> Result<(), Error> {
        let page_size = self.page_size();
        let resv = self.page_resv_bytes as usize;
        self.cur_write_rowid = 0;

        dbheader::write(&mut self.buf, self.page_size_exp, self.page_resv_bytes);
        self.buf[dbheader::DB_HEADER_BYTES..].fill(0);
        page::init_leaf(&mut self.buf[dbheader::DB_HEADER_BYTES..]);

        let name = table_name.unwrap_or(DEFAULT_TABLE_NAME);
        let generated;
        let script = match table_script {
            Some(s) => s,
            None => {
                generated = format!(
                    "CREATE TABLE {} ({})",
                    name,
                    (1..=self.col_count as usize).map(|i| format!("c{:03}", i)).join(",")
                );
                &generated
            }
        };
        // The master record must fit page 1 whole: header page bytes, leaf
        // header, one cell pointer, checksum slack, the cell prefix, the
        // record header for five columns, and the first four bodies.
        let overhead = dbheader::DB_HEADER_BYTES
            + 8
            + 2
            + checksum::CHKSUM_LEN
            + (LEN_OF_REC_LEN + 1)
            + (LEN_OF_HDR_LEN + 6)
            + 5
            + 2 * name.len()
            + 4;
        if script.len() + overhead > page_size - resv {
            return Err(Error::TooLong);
        }

        let orig_col_count = self.col_count;
        self.col_count = 5;
        self.cur_write_page = 1;
        let res = self.write_master_record(name, script);
        self.col_count = orig_col_count;
        res?;

        self.write_page(1)?;
        self.cur_write_page = 2;
        self.cur_write_rowid = 0;
        page::init_leaf(&mut self.buf);
        // An empty log still finalizes into a valid (empty) table.
        self.dirty = true;
        Ok(())
    }

    fn write_master_record(&mut self, name: &str, script: &str) -> Result<(), Error> {
        self.append_row()?;
        self.set_col_val(0, &Value::Text("table"))?;
        self.set_col_val(1, &Value::Text(name))?;
        self.set_col_val(2, &Value::Text(name))?;
        self.set_col_val(3, &Value::Int32(2))?;
        self.set_col_val(4, &Value::Text(script))?;
        Ok(())
    }
}
