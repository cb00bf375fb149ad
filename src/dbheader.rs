//! dbheader reads and writes the 100-byte header on page 1.
//!
//! The layout is the standard database file header, with two slots given
//! a private meaning:
//! - bytes 60..64 (the "user version") hold the last data-leaf page number
//!   once known, which is what makes binary search and append possible;
//! - bytes 68..72 (the "application id") start with the sentinel `0xA5`.
//!
//! While a log is being written the magic reads `"SQLite3 uLogger\0"`;
//! finalizing flips it to the canonical `"SQLite format 3\0"`.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::io::Cursor;

use crate::error::Error;

pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";
pub const ULOG_MAGIC: &[u8; 16] = b"SQLite3 uLogger\0";
pub const APP_ID_BYTE: u8 = 0xa5;

/// Bytes of page 1 taken by the file header.
pub const DB_HEADER_BYTES: usize = 100;
/// Bytes needed to parse everything [`parse`] looks at.
pub const HEADER_PREFIX_BYTES: usize = 72;

const VERSION_VALID_FOR: u32 = 105;
const SQLITE_VERSION_NUMBER: u32 = 3016000;

/// The fields of the header a reader needs to get going.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub page_size_exp: u8,
    pub resv_bytes: u8,
    pub last_leaf_page: u32,
    pub finalized: bool,
}

/// Maps the stored page-size field to a size exponent. The field stores
/// the literal size except that 0 and 1 both mean 65536.
pub fn page_size_exp(size_field: u32) -> Option<u8> {
    match size_field {
        0 | 1 => Some(16),
        512 | 1024 | 2048 | 4096 | 8192 | 16384 | 32768 => {
            Some(size_field.trailing_zeros() as u8)
        }
        _ => None,
    }
}

/// Maps a page size back to the stored field value.
pub fn page_size_field(page_size: u32) -> u16 {
    if page_size == 65536 {
        1
    } else {
        page_size as u16
    }
}

/// Checks that `buf` starts with one of the two accepted magics and
/// carries the application-id sentinel. Returns whether the file is
/// finalized.
pub fn check_signature(buf: &[u8]) -> Result<bool, Error> {
    let finalized = if &buf[0..16] == SQLITE_MAGIC {
        true
    } else if &buf[0..16] == ULOG_MAGIC {
        false
    } else {
        return Err(Error::InvalidSig);
    };
    if buf[68] != APP_ID_BYTE {
        return Err(Error::InvalidSig);
    }
    Ok(finalized)
}

/// Parses the first 72 bytes of a file written by this library.
pub fn parse(buf: &[u8]) -> Result<HeaderInfo, Error> {
    let finalized = check_signature(buf)?;
    let mut c = Cursor::new(&buf[16..]);
    // Offset	Size	Description
    // 16	    2	    The database page size in bytes, or 1 for 65536.
    let size_field = c.read_u16::<BigEndian>().map_err(|_| Error::Read)?;
    let page_size_exp = page_size_exp(size_field as u32).ok_or(Error::InvalidSig)?;
    // 18	    1	    File format write version.
    // 19	    1	    File format read version.
    // 20	    1	    Bytes of reserved space at the end of each page.
    let _ = c.read_u8().map_err(|_| Error::Read)?;
    let _ = c.read_u8().map_err(|_| Error::Read)?;
    let resv_bytes = c.read_u8().map_err(|_| Error::Read)?;
    // 60	    4	    The "user version": our last data-leaf page slot.
    let last_leaf_page = BigEndian::read_u32(&buf[60..64]);
    Ok(HeaderInfo {
        page_size_exp,
        resv_bytes,
        last_leaf_page,
        finalized,
    })
}

/// Fills bytes 0..100 of `buf` with a fresh unfinalized header.
pub fn write(buf: &mut [u8], page_size_exp: u8, resv_bytes: u8) {
    let page_size: u32 = 1 << page_size_exp;
    // Offset	Size	Description
    // 0	    16	    The header string.
    buf[0..16].copy_from_slice(ULOG_MAGIC);
    // 16	    2	    The database page size in bytes, or 1 for 65536.
    BigEndian::write_u16(&mut buf[16..18], page_size_field(page_size));
    // 18	    1	    File format write version. 1 for legacy.
    // 19	    1	    File format read version. 1 for legacy.
    buf[18] = 1;
    buf[19] = 1;
    // 20	    1	    Bytes of reserved space at the end of each page.
    // 21	    1	    Maximum embedded payload fraction. Must be 64.
    // 22	    1	    Minimum embedded payload fraction. Must be 32.
    // 23	    1	    Leaf payload fraction. Must be 32.
    buf[20] = resv_bytes;
    buf[21] = 64;
    buf[22] = 32;
    buf[23] = 32;
    // 24	    4	    File change counter.
    // 28	    4	    Size of the database file in pages.
    // 32	    4	    First freelist trunk page.
    // 36	    4	    Total number of freelist pages.
    // 40	    4	    The schema cookie.
    buf[24..44].fill(0);
    BigEndian::write_u32(&mut buf[28..32], 2); // patched again by finalize
    // 44	    4	    The schema format number.
    BigEndian::write_u32(&mut buf[44..48], 4);
    // 48	    4	    Default page cache size.
    // 52	    4	    Largest root b-tree page (vacuum modes only).
    buf[48..56].fill(0);
    // 56	    4	    The database text encoding. 1 means UTF-8.
    BigEndian::write_u32(&mut buf[56..60], 1);
    // 60	    4	    The "user version": our last data-leaf page slot,
    //                  zero until the first partial finalize.
    // 64	    4	    Incremental-vacuum mode. Zero.
    buf[60..68].fill(0);
    // 68	    4	    The "Application ID": 0xA5 sentinel, rest reserved.
    BigEndian::write_u32(&mut buf[68..72], (APP_ID_BYTE as u32) << 24);
    // 72	    20	    Reserved for expansion. Must be zero.
    buf[72..92].fill(0);
    // 92	    4	    The version-valid-for number.
    // 96	    4	    SQLITE_VERSION_NUMBER
    BigEndian::write_u32(&mut buf[92..96], VERSION_VALID_FOR);
    BigEndian::write_u32(&mut buf[96..100], SQLITE_VERSION_NUMBER);
}

pub fn last_leaf_page(buf: &[u8]) -> u32 {
    BigEndian::read_u32(&buf[60..64])
}

pub fn set_last_leaf_page(buf: &mut [u8], page_no: u32) {
    BigEndian::write_u32(&mut buf[60..64], page_no);
}

pub fn set_page_count(buf: &mut [u8], count: u32) {
    BigEndian::write_u32(&mut buf[28..32], count);
}

pub fn set_magic(buf: &mut [u8], finalized: bool) {
    buf[0..16].copy_from_slice(if finalized { SQLITE_MAGIC } else { ULOG_MAGIC });
}

#[test]
fn test_page_size_exp_mapping() {
    assert_eq!(page_size_exp(0), Some(16));
    assert_eq!(page_size_exp(1), Some(16));
    assert_eq!(page_size_exp(512), Some(9));
    assert_eq!(page_size_exp(4096), Some(12));
    assert_eq!(page_size_exp(32768), Some(15));
    assert_eq!(page_size_exp(256), None);
    assert_eq!(page_size_exp(513), None);
    assert_eq!(page_size_exp(65536), None); // stored as 1, never literally

    assert_eq!(page_size_field(512), 512);
    assert_eq!(page_size_field(65536), 1);
}

#[test]
fn test_write_then_parse() {
    let mut buf = vec![0u8; DB_HEADER_BYTES];
    write(&mut buf, 9, 3);
    let info = parse(&buf).unwrap();
    assert_eq!(info.page_size_exp, 9);
    assert_eq!(info.resv_bytes, 3);
    assert_eq!(info.last_leaf_page, 0);
    assert!(!info.finalized);

    set_last_leaf_page(&mut buf, 17);
    set_magic(&mut buf, true);
    let info = parse(&buf).unwrap();
    assert_eq!(info.last_leaf_page, 17);
    assert!(info.finalized);
}

#[test]
fn test_bad_signature_rejected() {
    let mut buf = vec![0u8; DB_HEADER_BYTES];
    write(&mut buf, 12, 0);
    buf[0] = b'X';
    assert_eq!(parse(&buf).unwrap_err(), Error::InvalidSig);

    write(&mut buf, 12, 0);
    buf[68] = 0;
    assert_eq!(parse(&buf).unwrap_err(), Error::InvalidSig);
}
