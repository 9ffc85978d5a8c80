//! Arena memory for serialized OSM entities.
//!
//! - `Buffer`: fixed-capacity append/commit byte arena
//! - `item`: the documented byte layout of items and their sections
//! - `view`: zero-copy read access to committed items

pub mod buffer;
pub mod item;
pub mod view;

pub use buffer::Buffer;
pub use item::{padded_len, SublistKind, ALIGNMENT};
pub use view::{items, CommentRef, ItemRef, MemberRef, NodeRef};
