//! Leaf cells hold records, one per logged row.
//!
//! A cell is `varint(payload_len) · varint(row_id) · payload`, and the
//! payload is `varint(hdr_len) · serial_types* · bodies*`, where `hdr_len`
//! counts itself. See https://www.sqlite.org/fileformat.html#record_format
//!
//! The writer always emits `payload_len` as a 3-byte varint and `hdr_len`
//! as a 2-byte varint, padded with continuation bytes. Redundant encodings
//! are legal to read, and the fixed widths let a record grow in place
//! without its prefix changing size.

use crate::error::Error;
use crate::serial_type;
use crate::varint;

/// Width of the always-3-byte payload-length varint in a leaf cell.
pub const LEN_OF_REC_LEN: usize = 3;
/// Width of the always-2-byte header-length varint in a record.
pub const LEN_OF_HDR_LEN: usize = 2;

/// Where one column of a record lives inside a page buffer.
///
/// `hdr_pos` is the absolute position of the column's serial-type varint,
/// `data_pos` the absolute position of its body. `rec_len` and `hdr_len`
/// are the record's stored payload and header lengths.
#[derive(Debug, PartialEq)]
pub struct ColumnPos {
    pub hdr_pos: usize,
    pub data_pos: usize,
    pub rec_len: u16,
    pub hdr_len: u16,
}

/// Walks the record header of the cell starting at `rec_pos` and locates
/// column `col_idx`. Fails with `Malformed` when the walk would cross the
/// header boundary, which also covers a column index out of range.
pub fn locate_column(buf: &[u8], rec_pos: usize, col_idx: usize) -> Result<ColumnPos, Error> {
    let mut hdr_pos = rec_pos;
    let (rec_len, n) = varint::read_u16(&buf[hdr_pos..]);
    hdr_pos += n;
    let (_rowid, n) = varint::read_u32(&buf[hdr_pos..]);
    hdr_pos += n;
    let hdr_start = hdr_pos;
    let (hdr_len, n) = varint::read_u16(&buf[hdr_pos..]);
    hdr_pos += n;
    let hdr_end = hdr_start + hdr_len as usize;
    if hdr_end > buf.len() {
        return Err(Error::Malformed);
    }
    let mut data_pos = hdr_end;
    for _ in 0..col_idx {
        if hdr_pos >= hdr_end {
            return Err(Error::Malformed);
        }
        let (type_or_len, n) = varint::read_u32(&buf[hdr_pos..]);
        hdr_pos += n;
        data_pos += serial_type::derive_data_len(type_or_len) as usize;
    }
    if hdr_pos >= hdr_end {
        return Err(Error::Malformed);
    }
    Ok(ColumnPos {
        hdr_pos,
        data_pos,
        rec_len,
        hdr_len,
    })
}

/// Writes the cell prefix — payload length, row id, header length — at
/// `pos` and returns its width. The payload length is forced to 3 bytes and
/// the header length to 2; the row id takes its natural width.
pub fn write_cell_prefix(buf: &mut [u8], pos: usize, rec_len: u16, rowid: u32, hdr_len: u16) -> usize {
    buf[pos] = 0x80 | (rec_len >> 14) as u8;
    buf[pos + 1] = 0x80 | ((rec_len >> 7) & 0x7f) as u8;
    buf[pos + 2] = (rec_len & 0x7f) as u8;
    let n = varint::write_u32(&mut buf[pos + 3..], rowid);
    let p = pos + LEN_OF_REC_LEN + n;
    buf[p] = 0x80 | (hdr_len >> 7) as u8;
    buf[p + 1] = (hdr_len & 0x7f) as u8;
    LEN_OF_REC_LEN + n + LEN_OF_HDR_LEN
}

/// Reads the row id of the cell starting at `cell_pos`. Returns the row id
/// and its encoded width.
pub fn read_rowid(buf: &[u8], cell_pos: usize) -> (u32, usize) {
    varint::read_u32(&buf[cell_pos + LEN_OF_REC_LEN..])
}

/// Counts the serial types in the record header of the cell at `rec_pos`.
pub fn col_count(buf: &[u8], rec_pos: usize) -> usize {
    let mut pos = rec_pos + LEN_OF_REC_LEN;
    let (_, n) = varint::read_u32(&buf[pos..]);
    pos += n;
    let (hdr_len, n) = varint::read_u16(&buf[pos..]);
    let hdr_end = pos + hdr_len as usize;
    pos += n;
    let mut count = 0;
    while pos < hdr_end {
        let (_, n) = varint::read_u32(&buf[pos..]);
        pos += n;
        count += 1;
    }
    count
}

#[cfg(test)]
fn build_test_record(buf: &mut [u8], rowid: u32, values: &[crate::value::Value]) -> usize {
    let hdr_len =
        LEN_OF_HDR_LEN + values.iter().map(|v| varint::len_u32(serial_type::derive_type_or_len(v))).sum::<usize>();
    let body_len = values.iter().map(serial_type::stored_len).sum::<usize>();
    let mut pos = write_cell_prefix(buf, 0, (hdr_len + body_len) as u16, rowid, hdr_len as u16);
    for v in values {
        pos += varint::write_u32(&mut buf[pos..], serial_type::derive_type_or_len(v));
    }
    for v in values {
        pos += serial_type::write_body(&mut buf[pos..], v);
    }
    pos
}

#[test]
fn test_locate_column() {
    use crate::value::Value;
    let mut buf = [0u8; 64];
    let values = [Value::Int8(7), Value::Text("Ten"), Value::Null, Value::Int32(-1)];
    build_test_record(&mut buf, 42, &values);

    for (i, v) in values.iter().enumerate() {
        let col = locate_column(&buf, 0, i).unwrap();
        let (t, _) = varint::read_u32(&buf[col.hdr_pos..]);
        assert_eq!(t, serial_type::derive_type_or_len(v));
        let len = serial_type::derive_data_len(t) as usize;
        let decoded = serial_type::decode(t, &buf[col.data_pos..col.data_pos + len]).unwrap();
        assert_eq!(&decoded, v);
    }
    assert_eq!(read_rowid(&buf, 0), (42, 1));
    assert_eq!(col_count(&buf, 0), 4);
}

#[test]
fn test_locate_column_out_of_range() {
    use crate::value::Value;
    let mut buf = [0u8; 64];
    build_test_record(&mut buf, 1, &[Value::Int8(1), Value::Int8(2)]);
    assert!(locate_column(&buf, 0, 1).is_ok());
    assert_eq!(locate_column(&buf, 0, 2), Err(Error::Malformed));
    assert_eq!(locate_column(&buf, 0, 100), Err(Error::Malformed));
}

#[test]
fn test_cell_prefix_widths() {
    let mut buf = [0u8; 16];
    let n = write_cell_prefix(&mut buf, 0, 7, 1, 7);
    // 3-byte payload length, 1-byte row id, 2-byte header length.
    assert_eq!(n, 6);
    assert_eq!(buf[..6], [0x80, 0x80, 0x07, 0x01, 0x80, 0x07]);
    let (rec_len, n) = varint::read_u16(&buf[..]);
    assert_eq!((rec_len, n), (7, 3));
}
