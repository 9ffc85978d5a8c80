//! Builders assembling serialized items inside a [`Buffer`].
//!
//! A [`Builder`] owns the offset of a size slot in the buffer and the slots
//! of all enclosing builders. Every write is counted into those slots, so
//! size prefixes are back-patched as content grows instead of being fixed
//! up from a pointer graph. Builders do not borrow the buffer; each
//! operation takes `&mut Buffer`, and finalization is the explicit
//! `finish` step that flushes trailing padding.

pub mod object;

use crate::error::{Error, Result};
use crate::memory::item::{self, ALIGNMENT};
use crate::memory::view::ItemRef;
use crate::memory::Buffer;

pub use object::{
    AreaBuilder, ChangesetDiscussionBuilder, NodeRefListBuilder, ObjectBuilder,
    RelationMemberListBuilder, TagListBuilder,
};

/// Write cursor with a back-patched size slot.
///
/// Size accounting: appends and interior padding count into this builder's
/// slot and every enclosing slot; the trailing padding written by
/// [`Builder::flush_padding`] counts into the enclosing slots only, so a
/// size prefix is always the exact payload length while the outermost item
/// size still covers every byte up to its own trailing padding.
#[derive(Debug)]
pub struct Builder {
    /// Absolute offset of this builder's u64 size slot.
    size_slot: usize,
    /// Size slots of enclosing builders, innermost first.
    enclosing: Vec<usize>,
}

impl Builder {
    /// Builder for an outermost item.
    pub(crate) fn new_root(size_slot: usize) -> Self {
        Builder {
            size_slot,
            enclosing: Vec::new(),
        }
    }

    /// Builder nested inside `parent`.
    pub(crate) fn new_child(size_slot: usize, parent: &Builder) -> Self {
        let mut enclosing = Vec::with_capacity(parent.enclosing.len() + 1);
        enclosing.push(parent.size_slot);
        enclosing.extend_from_slice(&parent.enclosing);
        Builder {
            size_slot,
            enclosing,
        }
    }

    /// Current value of this builder's size slot.
    pub fn size(&self, buffer: &Buffer) -> u64 {
        item::read_u64(buffer.bytes(), self.size_slot)
    }

    fn bump(&self, buffer: &mut Buffer, n: u64, include_self: bool) {
        let data = buffer.bytes_mut();
        if include_self {
            let size = item::read_u64(data, self.size_slot);
            item::write_u64(data, self.size_slot, size + n);
        }
        for &slot in &self.enclosing {
            let size = item::read_u64(data, slot);
            item::write_u64(data, slot, size + n);
        }
    }

    /// Count `n` bytes that were written through [`Builder::reserve_space`].
    pub fn add_size(&self, buffer: &mut Buffer, n: usize) {
        self.bump(buffer, n as u64, true);
    }

    /// Append bytes and count them.
    pub fn append(&self, buffer: &mut Buffer, bytes: &[u8]) -> Result<()> {
        buffer.reserve(bytes.len())?.copy_from_slice(bytes);
        self.add_size(buffer, bytes.len());
        Ok(())
    }

    /// Append a single NUL byte.
    pub fn append_zero(&self, buffer: &mut Buffer) -> Result<()> {
        buffer.reserve(1)?;
        self.add_size(buffer, 1);
        Ok(())
    }

    /// Reserve `n` zeroed bytes for a fixed-size record and return their
    /// offset. The caller writes the record and then calls
    /// [`Builder::add_size`].
    pub fn reserve_space(&self, buffer: &mut Buffer, n: usize) -> Result<usize> {
        let offset = buffer.written();
        buffer.reserve(n)?;
        Ok(offset)
    }

    /// Write zero bytes until this builder's size reaches the next
    /// alignment boundary. With `extra`, at least one byte is written even
    /// when already aligned; this is the explicit-terminator form used
    /// after comment text.
    pub fn add_padding(&self, buffer: &mut Buffer, extra: bool) -> Result<()> {
        let mut padding = (ALIGNMENT - self.size(buffer) as usize % ALIGNMENT) % ALIGNMENT;
        if extra && padding == 0 {
            padding = ALIGNMENT;
        }
        if padding > 0 {
            buffer.reserve(padding)?;
            self.add_size(buffer, padding);
        }
        Ok(())
    }

    /// Append a NUL-terminated user string, update the item's user-length
    /// scalar at `user_size_slot` and pad to alignment.
    pub fn add_user(&self, buffer: &mut Buffer, user_size_slot: usize, user: &str) -> Result<()> {
        let user_size = u16::try_from(user.len() + 1)
            .map_err(|_| Error::SchemaViolation("user name too long".to_string()))?;
        self.append(buffer, user.as_bytes())?;
        self.append_zero(buffer)?;
        item::write_u16(buffer.bytes_mut(), user_size_slot, user_size);
        self.add_padding(buffer, false)
    }

    /// Append a previously built item verbatim, padded to alignment. Used
    /// for embedding full members into relations.
    pub fn add_item(&self, buffer: &mut Buffer, full_item: &ItemRef<'_>) -> Result<()> {
        self.append(buffer, full_item.bytes())?;
        self.add_padding(buffer, false)
    }

    /// Flush trailing padding so the enclosing cursor is word-aligned. The
    /// padding is counted into the enclosing slots but not this builder's
    /// own size prefix.
    pub fn flush_padding(&self, buffer: &mut Buffer) -> Result<()> {
        let padding = (ALIGNMENT - self.size(buffer) as usize % ALIGNMENT) % ALIGNMENT;
        if padding > 0 {
            buffer.reserve(padding)?;
            self.bump(buffer, padding as u64, false);
        }
        Ok(())
    }
}
