//! PackStream — a compact, self-describing binary serialization format and
//! its streaming codec.
//!
//! PackStream encodes a dynamically-typed value tree (nulls, booleans,
//! signed integers, IEEE-754 doubles, UTF-8 strings, raw byte arrays,
//! ordered lists, string-keyed maps, and application-defined structs —
//! tagged tuples) into a byte stream, and decodes it back with full
//! fidelity, bit-exact with other language implementations of the format.
//!
//! # Architecture
//!
//! - **`marker`** — Wire-byte constants and the classification function
//!   `peek_next_type` is built on.
//! - **`value`** — The materialized value tree (`Value`) and its `Kind`.
//! - **`sink`** — `ByteSink`, a buffered write abstraction over any
//!   `AsyncWrite` channel.
//! - **`source`** — `ByteSource`, a buffered read abstraction with a
//!   bounded reassembly buffer that transparently spans arbitrary
//!   underlying chunking.
//! - **`packer`** — `Packer`, which selects the narrowest legal size class
//!   for every value.
//! - **`unpacker`** — `Unpacker`, a pull-based decoder driven by explicit
//!   `unpack*` calls, dispatched off a non-destructive marker peek.
//!
//! This crate is the codec only: it has no opinion on transport (it is
//! generic over any `AsyncRead`/`AsyncWrite` channel) and no opinion on
//! higher-level, application-specific value types layered on top of
//! `Struct` (such as a graph database's node/relationship/temporal types) —
//! those are built by consumers of this crate, not part of it.

pub mod error;
pub mod marker;
pub mod packer;
pub mod sink;
pub mod source;
pub mod unpacker;
pub mod value;

pub use error::Error;
pub use packer::Packer;
pub use sink::ByteSink;
pub use source::ByteSource;
pub use unpacker::Unpacker;
pub use value::{Kind, Struct, Value};
