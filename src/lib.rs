//! An append-only logger that writes standard SQLite 3 database files.
//!
//! Rows are streamed one column value at a time into a single page-sized
//! buffer and packed into a table b-tree leaf chain on disk. Finalizing
//! builds the interior b-tree pages over the leaves and patches the file
//! header, leaving a database any SQLite tool can open. The whole write
//! path runs in one page of working memory, which is what makes the
//! library usable on very small systems.
//!
//! Storage is abstracted behind the callbacks in [`vfs`]; the library never
//! opens files itself.
//!
//! ```
//! use microlog::vfs::MemVfs;
//! use microlog::writer::{WriteContext, WriteOptions};
//! use microlog::{ReadContext, Value};
//!
//! let mut ctx = WriteContext::new(
//!     MemVfs::new(),
//!     WriteOptions { col_count: 2, page_size_exp: 9, ..WriteOptions::default() },
//! )
//! .unwrap();
//! ctx.init().unwrap();
//! ctx.append_row().unwrap();
//! ctx.set_col_val(0, &Value::Int32(42)).unwrap();
//! ctx.set_col_val(1, &Value::Text("hello")).unwrap();
//! ctx.finalize().unwrap();
//!
//! let mut rctx = ReadContext::open(MemVfs::from_bytes(ctx.into_vfs().into_bytes())).unwrap();
//! rctx.read_first_row().unwrap();
//! let (serial_type, body) = rctx.read_col_val(1).unwrap();
//! assert_eq!(microlog::serial_type::decode(serial_type, body).unwrap(), Value::Text("hello"));
//! ```

pub mod checksum;
pub mod dbheader;
mod error;
pub mod page;
pub mod reader;
pub mod record;
pub mod serial_type;
pub mod value;
pub mod varint;
pub mod vfs;
pub mod writer;

pub use error::Error;
pub use reader::ReadContext;
pub use value::Value;
pub use writer::{WriteContext, WriteOptions};

// Page 1 holds a one-record master table mirroring
// "CREATE TABLE sqlite_schema (type text, name text, tbl_name text, rootpage integer, sql text)".
// The finalizer and the reader both need the rootpage column of that record.
pub(crate) const MASTER_ROOTPAGE_COLIDX: usize = 3;
pub(crate) const DEFAULT_TABLE_NAME: &str = "t1";
