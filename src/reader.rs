//! The reader: cursor motion, row-id lookup and value binary search over a
//! file produced by the writer, out of a single page-sized buffer.
//!
//! Cross-page searches never load whole candidate pages up front. The leaf
//! chain is probed with two 12-byte reads per page (page head, then the
//! last cell's prefix) plus, for value searches, exactly the last record;
//! only the final landing page is read in full.

use std::cmp::Ordering;
use std::ops::Range;

use byteorder::{BigEndian, ByteOrder};

use crate::checksum;
use crate::dbheader;
use crate::error::Error;
use crate::page;
use crate::record::{self, LEN_OF_REC_LEN};
use crate::serial_type;
use crate::value::Value;
use crate::varint;
use crate::vfs::ReadVfs;
use crate::MASTER_ROOTPAGE_COLIDX;

/// First data-leaf page number; page 1 is the header page.
const FIRST_LEAF_PAGE: u32 = 2;

/// The read context: a cursor over one database.
///
/// Works on finalized files and, for plain iteration, on unfinalized ones.
/// Cannot read databases produced or since modified by other SQLite
/// writers — it relies on the layout this library emits.
pub struct ReadContext<V: ReadVfs> {
    vfs: V,
    buf: Box<[u8]>,
    page_size_exp: u8,
    page_resv_bytes: u8,
    checksums: bool,
    last_leaf_page: u32,
    /// Root of the interior tree, looked up from the master record the
    /// first time a row-id search needs it.
    root_page: u32,
    /// Page currently in the buffer; 0 before the first positioning call.
    cur_page: u32,
    /// Record index of the cursor within the current page.
    cur_rec_pos: u16,
}

/// One column value located during a search probe: either the row id from
/// the cell prefix or a body slice (by range, so the page buffer can keep
/// moving underneath).
enum ProbedVal {
    RowId(u32),
    Col { type_or_len: u32, body: Range<usize> },
}

impl<V: ReadVfs> ReadContext<V> {
    /// Validates the header and prepares a cursor. Reads only the 72-byte
    /// header prefix; the page buffer is sized from it.
    pub fn open(vfs: V) -> Result<ReadContext<V>, Error> {
        Self::open_inner(vfs, false)
    }

    /// Like [`open`](Self::open), but verifies page checksums on every
    /// full-page load. Only meaningful for files written with checksums.
    pub fn open_checked(vfs: V) -> Result<ReadContext<V>, Error> {
        Self::open_inner(vfs, true)
    }

    fn open_inner(mut vfs: V, checksums: bool) -> Result<ReadContext<V>, Error> {
        let mut head = [0u8; dbheader::HEADER_PREFIX_BYTES];
        vfs.read_at(0, &mut head)?;
        let info = dbheader::parse(&head)?;
        Ok(ReadContext {
            vfs,
            buf: vec![0u8; 1usize << info.page_size_exp].into_boxed_slice(),
            page_size_exp: info.page_size_exp,
            page_resv_bytes: info.resv_bytes,
            checksums,
            last_leaf_page: info.last_leaf_page,
            root_page: 0,
            cur_page: 0,
            cur_rec_pos: 0,
        })
    }

    /// Hands the storage back, consuming the context.
    pub fn into_vfs(self) -> V {
        self.vfs
    }

    pub fn page_size(&self) -> usize {
        1usize << self.page_size_exp
    }

    fn page_off(&self, page_no: u32) -> u64 {
        (page_no as u64 - 1) * self.page_size() as u64
    }

    /// Reads `page_no` into the buffer, verifying leaf checksums when
    /// enabled.
    fn load_page(&mut self, page_no: u32) -> Result<(), Error> {
        let pos = self.page_off(page_no);
        self.vfs.read_at(pos, &mut self.buf)?;
        if self.checksums {
            if page_no == 1 {
                checksum::verify_page1(&self.buf)?;
            } else if self.buf[0] == page::LEAF {
                checksum::verify_leaf(&self.buf, self.page_resv_bytes as usize)?;
            }
        }
        Ok(())
    }

    /// Loads `cur_page` and insists it is a leaf. Read failures mean the
    /// cursor walked off the data; they surface as `NotFound`.
    fn read_cur_page(&mut self) -> Result<(), Error> {
        match self.load_page(self.cur_page) {
            Ok(()) => {}
            Err(Error::Read) => return Err(Error::NotFound),
            Err(e) => return Err(e),
        }
        if self.buf[0] != page::LEAF {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Positions the cursor on the first row.
    pub fn read_first_row(&mut self) -> Result<(), Error> {
        self.cur_page = FIRST_LEAF_PAGE;
        self.read_cur_page()?;
        if page::rec_count(&self.buf, 0) == 0 {
            return Err(Error::NotFound);
        }
        self.cur_rec_pos = 0;
        Ok(())
    }

    /// Advances the cursor one row, crossing to the next leaf as needed.
    pub fn read_next_row(&mut self) -> Result<(), Error> {
        if self.cur_page == 0 {
            return self.read_first_row();
        }
        let rec_count = page::rec_count(&self.buf, 0);
        self.cur_rec_pos += 1;
        if self.cur_rec_pos == rec_count {
            self.cur_page += 1;
            self.read_cur_page()?;
            self.cur_rec_pos = 0;
        }
        Ok(())
    }

    /// Moves the cursor one row back, crossing to the previous leaf as
    /// needed.
    pub fn read_prev_row(&mut self) -> Result<(), Error> {
        if self.cur_page == 0 {
            return Err(Error::NotFound);
        }
        if self.cur_rec_pos == 0 {
            if self.cur_page == FIRST_LEAF_PAGE {
                return Err(Error::NotFound);
            }
            self.cur_page -= 1;
            self.read_cur_page()?;
            self.cur_rec_pos = page::rec_count(&self.buf, 0);
        }
        self.cur_rec_pos -= 1;
        Ok(())
    }

    /// Positions the cursor on the last row. Needs the last-leaf slot, so
    /// the file must be at least partially finalized.
    pub fn read_last_row(&mut self) -> Result<(), Error> {
        if self.last_leaf_page == 0 {
            return Err(Error::NotFinalized);
        }
        self.cur_page = self.last_leaf_page;
        self.read_cur_page()?;
        let rec_count = page::rec_count(&self.buf, 0);
        if rec_count == 0 {
            return Err(Error::NotFound);
        }
        self.cur_rec_pos = rec_count - 1;
        Ok(())
    }

    fn cur_rec_cell_pos(&self) -> usize {
        page::cell_ptr(&self.buf, 0, self.cur_rec_pos as usize) as usize
    }

    /// Returns the serial type and body bytes of one column of the current
    /// row. Positions on the first row if no cursor motion happened yet.
    pub fn read_col_val(&mut self, col_idx: usize) -> Result<(u32, &[u8]), Error> {
        if self.cur_page == 0 {
            self.read_first_row()?;
        }
        let cell_pos = self.cur_rec_cell_pos();
        let col = record::locate_column(&self.buf, cell_pos, col_idx)?;
        let (type_or_len, _) = varint::read_u32(&self.buf[col.hdr_pos..]);
        let len = serial_type::derive_data_len(type_or_len) as usize;
        Ok((type_or_len, &self.buf[col.data_pos..col.data_pos + len]))
    }

    /// Number of columns stored in the current record.
    pub fn cur_row_col_count(&mut self) -> Result<usize, Error> {
        if self.cur_page == 0 {
            self.read_first_row()?;
        }
        Ok(record::col_count(&self.buf, self.cur_rec_cell_pos()))
    }

    /// Row id of the current record.
    pub fn cur_row_id(&mut self) -> Result<u32, Error> {
        if self.cur_page == 0 {
            self.read_first_row()?;
        }
        Ok(record::read_rowid(&self.buf, self.cur_rec_cell_pos()).0)
    }

    /// Row id of the record at `idx` on the loaded page, leaf or interior.
    fn rowid_at(&self, idx: u16) -> u32 {
        let cell_pos = page::cell_ptr(&self.buf, 0, idx as usize) as usize;
        let skip = if self.buf[0] == page::LEAF {
            LEN_OF_REC_LEN
        } else {
            4
        };
        varint::read_u32(&self.buf[cell_pos + skip..]).0
    }

    /// Root page of the interior tree, from the master-table record.
    fn root_page_no(&mut self) -> Result<u32, Error> {
        if self.root_page != 0 {
            return Ok(self.root_page);
        }
        self.load_page(1)?;
        let rec_pos = page::heap_pos(&self.buf, dbheader::DB_HEADER_BYTES) as usize;
        let col = record::locate_column(&self.buf, rec_pos, MASTER_ROOTPAGE_COLIDX)?;
        self.root_page = BigEndian::read_u32(&self.buf[col.data_pos..col.data_pos + 4]);
        Ok(self.root_page)
    }

    /// Finds the row with exactly the given row id by descending the
    /// interior tree. On a miss the cursor stays where it was.
    pub fn srch_row_by_id(&mut self, rowid: u32) -> Result<(), Error> {
        if self.last_leaf_page == 0 {
            return Err(Error::NotFinalized);
        }
        let mut srch_page = self.root_page_no()?;
        if srch_page == 0 {
            return Err(Error::NotFinalized);
        }
        loop {
            self.load_page(srch_page)?;
            let rec_count = page::rec_count(&self.buf, 0);
            let mut first: u16 = 0;
            let mut size = rec_count;
            while first < size {
                let middle = (first + size) >> 1;
                let rowid_at = self.rowid_at(middle);
                match rowid_at.cmp(&rowid) {
                    Ordering::Less => first = middle + 1,
                    Ordering::Greater => size = middle,
                    Ordering::Equal => {
                        if self.buf[0] == page::INTERIOR {
                            size = middle;
                            break;
                        }
                        self.cur_page = srch_page;
                        self.cur_rec_pos = middle;
                        return Ok(());
                    }
                }
            }
            if self.buf[0] != page::INTERIOR {
                break;
            }
            srch_page = if first == rec_count {
                page::right_child(&self.buf)
            } else {
                let cell_pos = page::cell_ptr(&self.buf, 0, size as usize) as usize;
                BigEndian::read_u32(&self.buf[cell_pos..cell_pos + 4])
            };
        }
        // Leave the cursor where it was, including the loaded page.
        if self.cur_page != 0 {
            self.load_page(self.cur_page)?;
        }
        Err(Error::NotFound)
    }

    /// Reads the last record of `page_no` piecewise and extracts the row
    /// id or column `col_idx`, without loading the whole page. The column
    /// body lands at the front of the buffer.
    fn probe_last_val(
        &mut self,
        page_no: u32,
        col_idx: usize,
        is_rowid: bool,
    ) -> Result<(ProbedVal, u16), Error> {
        let mut head = [0u8; 12];
        self.vfs.read_at(self.page_off(page_no), &mut head)?;
        if head[0] != page::LEAF {
            return Err(Error::Malformed);
        }
        let rec_count = BigEndian::read_u16(&head[3..5]);
        if rec_count == 0 {
            return Err(Error::NotFound);
        }
        let rec_pos = rec_count - 1;
        let last_pos = BigEndian::read_u16(&head[5..7]) as u64;
        let mut prefix = [0u8; 12];
        self.vfs
            .read_at(self.page_off(page_no) + last_pos, &mut prefix)?;
        let (payload_len, _) = varint::read_u16(&prefix[..LEN_OF_REC_LEN]);
        let (rowid, rowid_len) = varint::read_u32(&prefix[LEN_OF_REC_LEN..]);
        if is_rowid {
            return Ok((ProbedVal::RowId(rowid), rec_pos));
        }
        let total = LEN_OF_REC_LEN + rowid_len + payload_len as usize;
        let pos = self.page_off(page_no) + last_pos;
        self.vfs.read_at(pos, &mut self.buf[..total])?;
        let col = record::locate_column(&self.buf, 0, col_idx)?;
        let (type_or_len, _) = varint::read_u32(&self.buf[col.hdr_pos..]);
        let len = serial_type::derive_data_len(type_or_len) as usize;
        Ok((
            ProbedVal::Col {
                type_or_len,
                body: col.data_pos..col.data_pos + len,
            },
            rec_pos,
        ))
    }

    /// Extracts the row id or column `col_idx` of record `idx` on the
    /// loaded page.
    fn probe_val_at(&self, idx: u16, col_idx: usize, is_rowid: bool) -> Result<ProbedVal, Error> {
        let cell_pos = page::cell_ptr(&self.buf, 0, idx as usize) as usize;
        if is_rowid {
            return Ok(ProbedVal::RowId(record::read_rowid(&self.buf, cell_pos).0));
        }
        let col = record::locate_column(&self.buf, cell_pos, col_idx)?;
        let (type_or_len, _) = varint::read_u32(&self.buf[col.hdr_pos..]);
        let len = serial_type::derive_data_len(type_or_len) as usize;
        Ok(ProbedVal::Col {
            type_or_len,
            body: col.data_pos..col.data_pos + len,
        })
    }

    fn compare_probed(&self, probed: &ProbedVal, val: &Value, is_rowid: bool) -> Result<Ordering, Error> {
        match probed {
            ProbedVal::RowId(r) => Ok(r.cmp(&rowid_of(val)?)),
            ProbedVal::Col { type_or_len, body } => {
                compare_stored(*type_or_len, &self.buf[body.clone()], val)
            }
        }
    }

    /// Binary search by the value of column `col_idx` (or by row id when
    /// `is_rowid` is set, in which case `val` carries the row id as an
    /// integer).
    ///
    /// Lands on the first row whose value is equal to or greater than the
    /// target and returns success; `NotFound` arises only at empty
    /// extremes. Needs the last-leaf slot, so the file must be at least
    /// partially finalized.
    pub fn bin_srch_row_by_val(
        &mut self,
        col_idx: usize,
        val: &Value,
        is_rowid: bool,
    ) -> Result<(), Error> {
        let res = self.bin_srch_inner(col_idx, val, is_rowid);
        if res.is_err() && self.cur_page != 0 {
            // The probes reuse the buffer; put the cursor's page back.
            self.load_page(self.cur_page)?;
        }
        res
    }

    fn bin_srch_inner(&mut self, col_idx: usize, val: &Value, is_rowid: bool) -> Result<(), Error> {
        if self.last_leaf_page == 0 {
            return Err(Error::NotFinalized);
        }
        // Phase one: find the leftmost leaf whose last record is >= the
        // target, probing last records without loading pages.
        let mut first: u32 = FIRST_LEAF_PAGE;
        let mut size: u32 = self.last_leaf_page + 1;
        while first < size {
            let middle = (first + size) >> 1;
            let (probed, rec_pos) = self.probe_last_val(middle, col_idx, is_rowid)?;
            match self.compare_probed(&probed, val, is_rowid)? {
                Ordering::Less => first = middle + 1,
                Ordering::Greater => size = middle,
                Ordering::Equal => {
                    self.cur_page = middle;
                    self.cur_rec_pos = rec_pos;
                    return self.load_page(middle);
                }
            }
        }
        if size == self.last_leaf_page + 1 {
            // Everything compares below the target; settle for the last leaf.
            size -= 1;
        }
        let found_page = size;
        self.load_page(found_page)?;

        // Phase two: binary search within the landing leaf. Its last
        // record is already known to be >= the target (or it is the very
        // last leaf), so the last index is the fallback position.
        let rec_count = page::rec_count(&self.buf, 0);
        if rec_count == 0 {
            return Err(Error::NotFound);
        }
        let mut first: u16 = 0;
        let mut size: u16 = rec_count - 1;
        while first < size {
            let middle = (first + size) >> 1;
            let probed = self.probe_val_at(middle, col_idx, is_rowid)?;
            match self.compare_probed(&probed, val, is_rowid)? {
                Ordering::Less => first = middle + 1,
                Ordering::Greater => size = middle,
                Ordering::Equal => {
                    self.cur_page = found_page;
                    self.cur_rec_pos = middle;
                    return Ok(());
                }
            }
        }
        self.cur_page = found_page;
        self.cur_rec_pos = size;
        Ok(())
    }
}

/// Comparison key for a row-id search target.
fn rowid_of(val: &Value) -> Result<u32, Error> {
    let id = val.as_i64().ok_or(Error::TypeMismatch)?;
    u32::try_from(id).map_err(|_| Error::TypeMismatch)
}

/// Compares a stored column body against a search value, by the rules of
/// each storage kind. A kind mismatch is an error, not an ordering.
fn compare_stored(type_or_len: u32, stored: &[u8], val: &Value) -> Result<Ordering, Error> {
    match val {
        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => {
            let stored_int = match type_or_len {
                1..=6 => serial_type::int_from_body(stored),
                8 => 0,
                9 => 1,
                _ => return Err(Error::TypeMismatch),
            };
            Ok(stored_int.cmp(&val.as_i64().unwrap()))
        }
        Value::Real32(f) => {
            if type_or_len != 7 {
                return Err(Error::TypeMismatch);
            }
            let stored_bits = BigEndian::read_u64(stored) as i64;
            Ok(stored_bits.cmp(&(serial_type::f32_to_f64_bits(f.to_bits()) as i64)))
        }
        Value::Real64(f) => {
            if type_or_len != 7 {
                return Err(Error::TypeMismatch);
            }
            let stored_bits = BigEndian::read_u64(stored) as i64;
            Ok(stored_bits.cmp(&(f.to_bits() as i64)))
        }
        Value::Text(s) => {
            if type_or_len < 13 || type_or_len % 2 == 0 {
                return Err(Error::TypeMismatch);
            }
            Ok(stored.cmp(s.as_bytes()))
        }
        Value::Blob(b) => {
            if type_or_len < 12 || type_or_len % 2 == 1 {
                return Err(Error::TypeMismatch);
            }
            Ok(stored.cmp(b))
        }
        Value::Null => Err(Error::TypeMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::vfs::MemVfs;
    use crate::writer::{WriteContext, WriteOptions};
    use pretty_assertions::assert_eq;

    fn logged_db(rows: u32) -> MemVfs {
        let mut ctx = WriteContext::new(
            MemVfs::new(),
            WriteOptions {
                col_count: 2,
                page_size_exp: 9,
                ..WriteOptions::default()
            },
        )
        .unwrap();
        ctx.init().unwrap();
        for i in 1..=rows {
            ctx.append_row().unwrap();
            ctx.set_col_val(0, &Value::Int32(i as i32 * 3)).unwrap();
            ctx.set_col_val(1, &Value::Text(&format!("row {}", i))).unwrap();
        }
        ctx.finalize().unwrap();
        MemVfs::from_bytes(ctx.into_vfs().into_bytes())
    }

    fn col0(rctx: &mut ReadContext<MemVfs>) -> i32 {
        let (t, data) = rctx.read_col_val(0).unwrap();
        *serial_type::decode(t, data).unwrap().as_int32().unwrap()
    }

    #[test]
    fn test_iteration_forward_and_back() {
        let mut rctx = ReadContext::open(logged_db(1000)).unwrap();
        rctx.read_first_row().unwrap();
        assert_eq!(rctx.cur_row_id().unwrap(), 1);
        assert_eq!(col0(&mut rctx), 3);
        assert_eq!(rctx.cur_row_col_count().unwrap(), 2);

        let mut n = 1;
        while rctx.read_next_row().is_ok() {
            n += 1;
            assert_eq!(rctx.cur_row_id().unwrap(), n);
        }
        assert_eq!(n, 1000);

        rctx.read_last_row().unwrap();
        assert_eq!(rctx.cur_row_id().unwrap(), 1000);
        let mut n = 1000;
        while rctx.read_prev_row().is_ok() {
            n -= 1;
            assert_eq!(rctx.cur_row_id().unwrap(), n);
        }
        assert_eq!(n, 1);
    }

    #[test]
    fn test_read_col_val_positions_lazily() {
        let mut rctx = ReadContext::open(logged_db(5)).unwrap();
        assert_eq!(col0(&mut rctx), 3);
        assert_eq!(rctx.cur_row_id().unwrap(), 1);
    }

    #[test]
    fn test_empty_db() {
        let mut rctx = ReadContext::open(logged_db(0)).unwrap();
        assert_eq!(rctx.read_first_row(), Err(Error::NotFound));
        assert_eq!(rctx.read_last_row(), Err(Error::NotFound));
        let mut rctx = ReadContext::open(logged_db(0)).unwrap();
        assert_eq!(rctx.srch_row_by_id(1), Err(Error::NotFound));
        assert_eq!(
            rctx.bin_srch_row_by_val(0, &Value::Int32(1), false),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn test_srch_row_by_id() {
        let mut rctx = ReadContext::open(logged_db(5000)).unwrap();
        for rowid in [1u32, 2, 36, 37, 1000, 2500, 4999, 5000] {
            rctx.srch_row_by_id(rowid).unwrap();
            assert_eq!(rctx.cur_row_id().unwrap(), rowid);
            assert_eq!(col0(&mut rctx), rowid as i32 * 3);
        }
        assert_eq!(rctx.srch_row_by_id(0), Err(Error::NotFound));
        assert_eq!(rctx.srch_row_by_id(5001), Err(Error::NotFound));
        // A miss leaves the cursor usable.
        rctx.srch_row_by_id(42).unwrap();
        assert_eq!(rctx.srch_row_by_id(9999), Err(Error::NotFound));
        assert_eq!(rctx.cur_row_id().unwrap(), 42);
    }

    #[test]
    fn test_srch_row_by_id_requires_finality() {
        let mut ctx = WriteContext::new(
            MemVfs::new(),
            WriteOptions {
                col_count: 1,
                page_size_exp: 9,
                ..WriteOptions::default()
            },
        )
        .unwrap();
        ctx.init().unwrap();
        ctx.append_row().unwrap();
        ctx.flush().unwrap();
        let mut rctx = ReadContext::open(MemVfs::from_bytes(ctx.into_vfs().into_bytes())).unwrap();
        assert_eq!(rctx.srch_row_by_id(1), Err(Error::NotFinalized));
    }

    #[test]
    fn test_bin_srch_by_rowid() {
        let mut rctx = ReadContext::open(logged_db(3000)).unwrap();
        rctx.bin_srch_row_by_val(0, &Value::Int32(700), true).unwrap();
        assert_eq!(rctx.cur_row_id().unwrap(), 700);
        assert_eq!(
            rctx.bin_srch_row_by_val(0, &Value::Text("x"), true),
            Err(Error::TypeMismatch)
        );
    }

    #[test]
    fn test_bin_srch_by_int_value_closest_right() {
        let mut rctx = ReadContext::open(logged_db(3000)).unwrap();
        // Exact hit: value 3k lives at rowid k.
        rctx.bin_srch_row_by_val(0, &Value::Int32(1500), false).unwrap();
        assert_eq!(rctx.cur_row_id().unwrap(), 500);
        // Between values: lands on the next greater one.
        rctx.bin_srch_row_by_val(0, &Value::Int32(1501), false).unwrap();
        assert_eq!(rctx.cur_row_id().unwrap(), 501);
        // Below the minimum: lands on the first row.
        rctx.bin_srch_row_by_val(0, &Value::Int32(-1), false).unwrap();
        assert_eq!(rctx.cur_row_id().unwrap(), 1);
        // Past the maximum: lands on the last row.
        rctx.bin_srch_row_by_val(0, &Value::Int64(1 << 40), false).unwrap();
        assert_eq!(rctx.cur_row_id().unwrap(), 3000);
    }

    #[test]
    fn test_bin_srch_type_mismatch() {
        let mut rctx = ReadContext::open(logged_db(100)).unwrap();
        assert_eq!(
            rctx.bin_srch_row_by_val(0, &Value::Text("7"), false),
            Err(Error::TypeMismatch)
        );
        assert_eq!(
            rctx.bin_srch_row_by_val(1, &Value::Int32(7), false),
            Err(Error::TypeMismatch)
        );
        assert_eq!(
            rctx.bin_srch_row_by_val(0, &Value::Null, false),
            Err(Error::TypeMismatch)
        );
    }

    #[test]
    fn test_compare_stored_rules() {
        // INT: stored bodies sign-extend before the signed compare.
        assert_eq!(
            compare_stored(1, &[0xff], &Value::Int32(0)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_stored(2, &[0x01, 0x00], &Value::Int16(256)).unwrap(),
            Ordering::Equal
        );
        // REAL: bit-pattern compare, f32 targets widened first.
        let stored = 2.5f64.to_bits().to_be_bytes();
        assert_eq!(
            compare_stored(7, &stored, &Value::Real32(2.5)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare_stored(7, &stored, &Value::Real64(3.0)).unwrap(),
            Ordering::Less
        );
        // TEXT: byte-lexicographic, shorter is smaller on a prefix tie.
        assert_eq!(
            compare_stored(19, b"abc", &Value::Text("abcd")).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_stored(19, b"abd", &Value::Text("abc")).unwrap(),
            Ordering::Greater
        );
        // BLOB vs TEXT is a mismatch either way.
        assert_eq!(
            compare_stored(18, b"abc", &Value::Text("abc")),
            Err(Error::TypeMismatch)
        );
    }
}
