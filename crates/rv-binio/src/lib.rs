//! Little-endian binary I/O primitives shared by every Real Virtuality
//! asset format crate in this workspace.
//!
//! Little-endian is a precondition of the whole corpus, not a runtime
//! choice: every multi-byte read/write here assumes the host matches wire
//! order, and that assumption is checked once at compile time below.

mod error;
mod io;

pub use error::{Error, Result};
pub use io::{ReadExt, SeekReadExt, WriteExt};

const _ASSERT_LITTLE_ENDIAN_HOST: () = assert!(
    cfg!(target_endian = "little"),
    "Real Virtuality asset formats are little-endian only"
);
