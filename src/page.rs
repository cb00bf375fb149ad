//! The b-tree page layout shared by leaves and interior pages.
//!
//! A b-tree page is divided into regions in the following order
//! 1. The 100-byte database file header (page 1 only)
//! 2. The 8 or 12 byte b-tree page header
//! 3. The cell pointer array
//! 4. Unallocated space
//! 5. The cell content area, growing from the page end downward
//! 6. The reserved region at the very end of the page
//!
//! Page header fields, from https://www.sqlite.org/fileformat.html:
//!
//! Offset	Size	Description
//! 0	1	The b-tree page type.
//! 1	2	Start of the first freeblock, or zero.
//! 3	2	Number of cells on the page.
//! 5	2	Start of the cell content area. Zero means empty here.
//! 7	1	Number of fragmented free bytes in the cell content area.
//! 8	4	Right-most child pointer (interior pages only).

use byteorder::{BigEndian, ByteOrder};

/// Tag byte of a table b-tree leaf page.
pub const LEAF: u8 = 0x0d;
/// Tag byte of a table b-tree interior page.
pub const INTERIOR: u8 = 0x05;

/// Initializes `buf` as an empty table leaf. Only the 8 header bytes are
/// touched; stale cell content is left behind and never referenced.
pub fn init_leaf(buf: &mut [u8]) {
    buf[0] = LEAF;
    buf[1..8].fill(0);
}

/// Initializes `buf` as an empty table interior page, including a zeroed
/// right-child slot.
pub fn init_interior(buf: &mut [u8]) {
    buf[0] = INTERIOR;
    buf[1..12].fill(0);
}

/// Byte length of the page header for the page starting at `hdr` in `buf`.
pub fn header_len(buf: &[u8], hdr: usize) -> usize {
    if buf[hdr] == INTERIOR {
        12
    } else {
        8
    }
}

pub fn rec_count(buf: &[u8], hdr: usize) -> u16 {
    BigEndian::read_u16(&buf[hdr + 3..hdr + 5])
}

pub fn set_rec_count(buf: &mut [u8], hdr: usize, count: u16) {
    BigEndian::write_u16(&mut buf[hdr + 3..hdr + 5], count);
}

/// Offset of the most recently added cell, i.e. the bottom of the heap.
/// Zero means the page holds no cells yet.
pub fn heap_pos(buf: &[u8], hdr: usize) -> u16 {
    BigEndian::read_u16(&buf[hdr + 5..hdr + 7])
}

pub fn set_heap_pos(buf: &mut [u8], hdr: usize, pos: u16) {
    BigEndian::write_u16(&mut buf[hdr + 5..hdr + 7], pos);
}

/// Reads entry `idx` of the cell pointer array.
pub fn cell_ptr(buf: &[u8], hdr: usize, idx: usize) -> u16 {
    let base = hdr + header_len(buf, hdr) + idx * 2;
    BigEndian::read_u16(&buf[base..base + 2])
}

pub fn set_cell_ptr(buf: &mut [u8], hdr: usize, idx: usize, pos: u16) {
    let base = hdr + header_len(buf, hdr) + idx * 2;
    BigEndian::write_u16(&mut buf[base..base + 2], pos);
}

/// The right-most child pointer of an interior page.
pub fn right_child(buf: &[u8]) -> u32 {
    BigEndian::read_u32(&buf[8..12])
}

pub fn set_right_child(buf: &mut [u8], child: u32) {
    BigEndian::write_u32(&mut buf[8..12], child);
}

#[test]
fn test_leaf_header_round_trip() {
    let mut page = vec![0xaau8; 512];
    init_leaf(&mut page);
    assert_eq!(page[0], LEAF);
    assert_eq!(rec_count(&page, 0), 0);
    assert_eq!(heap_pos(&page, 0), 0);
    assert_eq!(header_len(&page, 0), 8);

    set_rec_count(&mut page, 0, 3);
    set_heap_pos(&mut page, 0, 480);
    set_cell_ptr(&mut page, 0, 0, 500);
    set_cell_ptr(&mut page, 0, 1, 490);
    set_cell_ptr(&mut page, 0, 2, 480);
    assert_eq!(rec_count(&page, 0), 3);
    assert_eq!(heap_pos(&page, 0), 480);
    assert_eq!(cell_ptr(&page, 0, 1), 490);
    // The pointer array starts right after the 8-byte header.
    assert_eq!(&page[8..14], &[0x01, 0xf4, 0x01, 0xea, 0x01, 0xe0]);
}

#[test]
fn test_interior_header_round_trip() {
    let mut page = vec![0u8; 512];
    init_interior(&mut page);
    assert_eq!(page[0], INTERIOR);
    assert_eq!(header_len(&page, 0), 12);
    set_right_child(&mut page, 7);
    assert_eq!(right_child(&page), 7);
    set_cell_ptr(&mut page, 0, 0, 300);
    assert_eq!(BigEndian::read_u16(&page[12..14]), 300);
}

#[test]
fn test_known_leaf_page_parses() {
    // A 512-byte leaf with ten small records, captured from a real file.
    use hex::FromHex;
    const HEAD: &str = "0d00 0000 0a01 ce00 01fb 01f6 01f1 01ec
                        01e7 01e2 01dd 01d8 01d3 01ce";
    let head: Vec<u8> = Vec::from_hex(HEAD.replace([' ', '\n'], "")).unwrap();
    let mut page = vec![0u8; 512];
    page[..head.len()].copy_from_slice(&head);
    assert_eq!(page[0], LEAF);
    assert_eq!(rec_count(&page, 0), 10);
    assert_eq!(heap_pos(&page, 0), 0x01ce);
    assert_eq!(cell_ptr(&page, 0, 0), 0x01fb);
    assert_eq!(cell_ptr(&page, 0, 9), 0x01ce);
}
