use anyhow::Result;
use pretty_assertions::assert_eq;

use microlog::serial_type;
use microlog::vfs::{MemVfs, ReadVfs, WriteVfs};
use microlog::writer::{WriteContext, WriteOptions};
use microlog::{Error, ReadContext, Value};

fn decode_col(rctx: &mut ReadContext<MemVfs>, col_idx: usize) -> Result<Value<'_>> {
    let (t, data) = rctx.read_col_val(col_idx)?;
    Ok(serial_type::decode(t, data)?)
}

#[test]
fn test_hello_world() -> Result<()> {
    let mut ctx = WriteContext::new(
        MemVfs::new(),
        WriteOptions {
            col_count: 5,
            page_size_exp: 9,
            ..WriteOptions::default()
        },
    )?;
    ctx.init()?;
    ctx.append_row()?;
    for (i, word) in ["Hello", "World", "How", "Are", "You"].iter().enumerate() {
        ctx.set_col_val(i, &Value::Text(word))?;
    }
    ctx.finalize()?;
    let file = ctx.into_vfs().into_bytes();

    // A finalized single-leaf database: canonical magic, two pages,
    // root page 2.
    assert_eq!(&file[0..16], b"SQLite format 3\0");
    assert_eq!(&file[16..18], &[0x02, 0x00]);
    assert_eq!(file[68], 0xa5);
    assert_eq!(u32::from_be_bytes(file[28..32].try_into()?), 2);
    assert_eq!(file.len(), 2 * 512);

    let mut rctx = ReadContext::open(MemVfs::from_bytes(file))?;
    rctx.read_first_row()?;
    assert_eq!(rctx.cur_row_col_count()?, 5);
    for (i, word) in ["Hello", "World", "How", "Are", "You"].iter().enumerate() {
        assert_eq!(decode_col(&mut rctx, i)?, Value::Text(word));
    }
    assert_eq!(rctx.read_next_row(), Err(Error::NotFound));
    Ok(())
}

#[test]
fn test_multi_page_leaf_chain() -> Result<()> {
    let rows = 5000u32;
    let mut ctx = WriteContext::new(
        MemVfs::new(),
        WriteOptions {
            col_count: 3,
            page_size_exp: 9,
            ..WriteOptions::default()
        },
    )?;
    ctx.init()?;
    for i in 1..=rows {
        ctx.append_row()?;
        ctx.set_col_val(0, &Value::Text(&format!("entry-{:05}", i)))?;
        ctx.set_col_val(1, &Value::Int32(i as i32))?;
        ctx.set_col_val(2, &Value::Real64(i as f64 / 2.0))?;
    }
    ctx.finalize()?;
    let file = ctx.into_vfs().into_bytes();

    // The header page count matches the file size exactly.
    let page_count = u32::from_be_bytes(file[28..32].try_into()?);
    assert_eq!(file.len(), page_count as usize * 512);

    let mut rctx = ReadContext::open(MemVfs::from_bytes(file))?;
    let mut n = 0u32;
    let mut res = rctx.read_first_row();
    while res.is_ok() {
        n += 1;
        assert_eq!(rctx.cur_row_id()?, n);
        res = rctx.read_next_row();
    }
    assert_eq!(n, rows);

    // Row lookups land on exactly what the writer supplied.
    for rowid in [1u32, 499, 500, 4999, rows] {
        rctx.srch_row_by_id(rowid)?;
        assert_eq!(
            decode_col(&mut rctx, 0)?,
            Value::Text(&format!("entry-{:05}", rowid))
        );
        assert_eq!(decode_col(&mut rctx, 1)?, Value::Int32(rowid as i32));
        assert_eq!(decode_col(&mut rctx, 2)?, Value::Real64(rowid as f64 / 2.0));
    }
    Ok(())
}

#[test]
fn test_append_resumes_row_ids() -> Result<()> {
    let opts = WriteOptions {
        col_count: 1,
        page_size_exp: 9,
        ..WriteOptions::default()
    };
    let mut ctx = WriteContext::new(MemVfs::new(), opts)?;
    ctx.init()?;
    for i in 1..=1000u32 {
        ctx.append_row()?;
        ctx.set_col_val(0, &Value::Int32(i as i32))?;
    }
    // Stop without building the tree: the artefact keeps the unfinalized
    // magic and a populated last-leaf slot.
    ctx.partial_finalize()?;
    let file = ctx.into_vfs().into_bytes();
    assert_eq!(&file[0..16], b"SQLite3 uLogger\0");
    assert_ne!(u32::from_be_bytes(file[60..64].try_into()?), 0);

    let mut ctx = WriteContext::new(MemVfs::from_bytes(file), opts)?;
    ctx.init_for_append()?;
    assert_eq!(ctx.cur_row_id(), 1001);
    ctx.set_col_val(0, &Value::Int32(1001))?;
    for i in 1002..=1500u32 {
        ctx.append_row()?;
        ctx.set_col_val(0, &Value::Int32(i as i32))?;
    }
    ctx.finalize()?;

    let mut rctx = ReadContext::open(MemVfs::from_bytes(ctx.into_vfs().into_bytes()))?;
    let mut n = 0u32;
    let mut res = rctx.read_first_row();
    while res.is_ok() {
        n += 1;
        assert_eq!(rctx.cur_row_id()?, n);
        assert_eq!(decode_col(&mut rctx, 0)?, Value::Int32(n as i32));
        res = rctx.read_next_row();
    }
    assert_eq!(n, 1500);
    Ok(())
}

#[test]
fn test_grown_record_migrates_and_reads_back() -> Result<()> {
    let mut ctx = WriteContext::new(
        MemVfs::new(),
        WriteOptions {
            col_count: 2,
            page_size_exp: 10,
            ..WriteOptions::default()
        },
    )?;
    ctx.init()?;
    // A first row eats most of the 1024-byte page.
    ctx.append_row()?;
    ctx.set_col_val(0, &Value::Text(&"p".repeat(600)))?;
    // The second row fits, then outgrows the remaining space; the second
    // set_col_val must migrate it to a fresh page with both values intact.
    ctx.append_row()?;
    let col0 = "a".repeat(200);
    let col1 = "b".repeat(400);
    ctx.set_col_val(0, &Value::Text(&col0))?;
    ctx.set_col_val(1, &Value::Text(&col1))?;
    ctx.finalize()?;

    let mut rctx = ReadContext::open(MemVfs::from_bytes(ctx.into_vfs().into_bytes()))?;
    rctx.srch_row_by_id(2)?;
    assert_eq!(decode_col(&mut rctx, 0)?, Value::Text(&col0));
    assert_eq!(decode_col(&mut rctx, 1)?, Value::Text(&col1));
    Ok(())
}

#[test]
fn test_row_ids_across_varint_width_boundaries() -> Result<()> {
    let rows = 20000u32;
    let mut ctx = WriteContext::new(
        MemVfs::new(),
        WriteOptions {
            col_count: 1,
            page_size_exp: 9,
            ..WriteOptions::default()
        },
    )?;
    ctx.init()?;
    // Empty rows are real records, so row ids alone pad the file across
    // the 1-, 2- and 3-byte varint boundaries.
    for _ in 0..rows {
        ctx.append_row()?;
    }
    ctx.finalize()?;

    let mut rctx = ReadContext::open(MemVfs::from_bytes(ctx.into_vfs().into_bytes()))?;
    for rowid in [1u32, 127, 128, 16383, 16384, rows] {
        rctx.srch_row_by_id(rowid)?;
        assert_eq!(rctx.cur_row_id()?, rowid);
        // Padding rows read back as a single NULL.
        let (t, data) = rctx.read_col_val(0)?;
        assert_eq!((t, data.len()), (0, 0));
    }
    rctx.read_last_row()?;
    assert_eq!(rctx.cur_row_id()?, rows);
    Ok(())
}

#[test]
fn test_binary_search_by_int_value() -> Result<()> {
    let rows = 10000u32;
    let mut ctx = WriteContext::new(
        MemVfs::new(),
        WriteOptions {
            col_count: 1,
            page_size_exp: 9,
            ..WriteOptions::default()
        },
    )?;
    ctx.init()?;
    for i in 1..=rows {
        ctx.append_row()?;
        ctx.set_col_val(0, &Value::Int32(i as i32 * 3))?;
    }
    ctx.finalize()?;

    let mut rctx = ReadContext::open(MemVfs::from_bytes(ctx.into_vfs().into_bytes()))?;
    rctx.bin_srch_row_by_val(0, &Value::Int32(15000), false)?;
    assert_eq!(rctx.cur_row_id()?, 5000);
    rctx.bin_srch_row_by_val(0, &Value::Int32(15001), false)?;
    assert_eq!(rctx.cur_row_id()?, 5001);
    rctx.bin_srch_row_by_val(0, &Value::Int32(-1), false)?;
    assert_eq!(rctx.cur_row_id()?, 1);
    Ok(())
}

#[test]
fn test_binary_search_by_text_and_real() -> Result<()> {
    let rows = 2000u32;
    let mut ctx = WriteContext::new(
        MemVfs::new(),
        WriteOptions {
            col_count: 2,
            page_size_exp: 9,
            ..WriteOptions::default()
        },
    )?;
    ctx.init()?;
    for i in 1..=rows {
        ctx.append_row()?;
        ctx.set_col_val(0, &Value::Text(&format!("key-{:06}", i)))?;
        ctx.set_col_val(1, &Value::Real64(i as f64))?;
    }
    ctx.finalize()?;
    let mut rctx = ReadContext::open(MemVfs::from_bytes(ctx.into_vfs().into_bytes()))?;

    rctx.bin_srch_row_by_val(0, &Value::Text("key-000700"), false)?;
    assert_eq!(rctx.cur_row_id()?, 700);
    // A prefix sorts before its extensions: closest-right lands on it.
    rctx.bin_srch_row_by_val(0, &Value::Text("key-0007"), false)?;
    assert_eq!(rctx.cur_row_id()?, 700);

    rctx.bin_srch_row_by_val(1, &Value::Real64(1234.0), false)?;
    assert_eq!(rctx.cur_row_id()?, 1234);
    // A 4-byte float target is widened before the bit-pattern compare.
    rctx.bin_srch_row_by_val(1, &Value::Real32(1234.0), false)?;
    assert_eq!(rctx.cur_row_id()?, 1234);
    Ok(())
}

#[test]
fn test_checksums_reject_tampered_leaf() -> Result<()> {
    let mut ctx = WriteContext::new(
        MemVfs::new(),
        WriteOptions {
            col_count: 1,
            page_size_exp: 9,
            page_resv_bytes: 0, // raised to 3 by the checksum option
            checksums: true,
        },
    )?;
    ctx.init()?;
    for i in 1..=100u32 {
        ctx.append_row()?;
        ctx.set_col_val(0, &Value::Int32(i as i32))?;
    }
    ctx.finalize()?;
    let clean = ctx.into_vfs().into_bytes();

    // Untampered, every page verifies during a full scan.
    let mut rctx = ReadContext::open_checked(MemVfs::from_bytes(clean.clone()))?;
    let mut n = 0;
    let mut res = rctx.read_first_row();
    while res.is_ok() {
        n += 1;
        res = rctx.read_next_row();
    }
    assert_eq!(n, 100);

    // Flip one record byte inside the first data leaf.
    let mut tampered = clean.clone();
    tampered[512 + 500] ^= 0x01;
    let mut rctx = ReadContext::open_checked(MemVfs::from_bytes(tampered))?;
    assert_eq!(rctx.read_first_row(), Err(Error::InvalidChecksum));

    // The plain reader does not look at checksums.
    let mut tampered = clean;
    tampered[512 + 500] ^= 0x01;
    let mut rctx = ReadContext::open(MemVfs::from_bytes(tampered))?;
    rctx.read_first_row()?;
    Ok(())
}

/// Storage that starts failing after a set number of writes, to exercise
/// host-error passthrough.
struct FlakyVfs {
    inner: MemVfs,
    writes_left: u32,
}

impl WriteVfs for FlakyVfs {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), Error> {
        ReadVfs::read_at(&mut self.inner, pos, buf)
    }
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<(), Error> {
        if self.writes_left == 0 {
            return Err(Error::Write);
        }
        self.writes_left -= 1;
        self.inner.write_at(pos, buf)
    }
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[test]
fn test_host_write_failure_is_surfaced() -> Result<()> {
    let vfs = FlakyVfs {
        inner: MemVfs::new(),
        writes_left: 0,
    };
    let mut ctx = WriteContext::new(
        vfs,
        WriteOptions {
            col_count: 1,
            page_size_exp: 9,
            ..WriteOptions::default()
        },
    )?;
    assert_eq!(ctx.init(), Err(Error::Write));
    Ok(())
}
