//! PDF writing for incremental updates.
//!
//! ## Architecture
//!
//! ```text
//! original bytes
//!     ↓
//! [IncrementalUpdate] (appends objects, new xref section, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! updated PDF bytes
//! ```

mod incremental;
mod object_serializer;

pub use incremental::IncrementalUpdate;
pub(crate) use object_serializer::write_string;
pub use object_serializer::{encode_text_string, ObjectSerializer};
