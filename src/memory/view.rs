//! Zero-copy read access to committed items.
//!
//! An [`ItemRef`] borrows the bytes of one item and exposes typed accessors
//! plus iterators over the item's sections. Nothing is copied; strings are
//! handed out as slices of the buffer.

use crate::memory::item::{self, padded_len, padded_len_forced, SublistKind};
use crate::osm::{Bounds, ItemKind, Location, ObjectId, Timestamp};

/// Iterate the whole items in a committed byte range.
pub fn items(data: &[u8]) -> ItemIter<'_> {
    ItemIter { data, pos: 0 }
}

/// Iterator over the items of a buffer.
pub struct ItemIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = ItemRef<'a>;

    fn next(&mut self) -> Option<ItemRef<'a>> {
        if self.pos + item::COMMON_HEADER_LEN > self.data.len() {
            return None;
        }
        let size = item::read_u64(self.data, self.pos + item::ITEM_SIZE) as usize;
        let end = self.pos + size;
        if size < item::COMMON_HEADER_LEN || end > self.data.len() {
            return None;
        }
        let item = ItemRef {
            data: &self.data[self.pos..end],
        };
        self.pos += padded_len(size);
        Some(item)
    }
}

/// A borrowed view of one serialized item.
#[derive(Debug, Clone, Copy)]
pub struct ItemRef<'a> {
    data: &'a [u8],
}

impl<'a> ItemRef<'a> {
    /// View an item starting at the beginning of `data`. Returns `None`
    /// when the bytes do not hold a complete item.
    pub fn parse(data: &'a [u8]) -> Option<ItemRef<'a>> {
        items(data).next()
    }

    /// Raw bytes of this item (unpadded extent).
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Item size excluding trailing padding.
    #[inline]
    pub fn size(&self) -> usize {
        item::read_u64(self.data, item::ITEM_SIZE) as usize
    }

    /// Entity kind.
    pub fn kind(&self) -> ItemKind {
        ItemKind::from_u8(self.data[item::ITEM_KIND]).expect("corrupt item kind")
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        item::read_i64(self.data, item::ITEM_ID)
    }

    #[inline]
    pub fn version(&self) -> u32 {
        item::read_u32(self.data, item::ITEM_VERSION)
    }

    #[inline]
    pub fn changeset(&self) -> u32 {
        item::read_u32(self.data, item::ITEM_CHANGESET)
    }

    #[inline]
    pub fn uid(&self) -> u32 {
        item::read_u32(self.data, item::ITEM_UID)
    }

    #[inline]
    pub fn visible(&self) -> bool {
        self.data[item::ITEM_VISIBLE] != 0
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::new(item::read_i64(self.data, item::ITEM_TIMESTAMP))
    }

    /// The user name, without its NUL terminator.
    pub fn user(&self) -> &'a str {
        let user_size = item::read_u16(self.data, item::ITEM_USER_SIZE) as usize;
        if user_size < 2 {
            return "";
        }
        let start = item::header_len(self.kind());
        std::str::from_utf8(&self.data[start..start + user_size - 1]).unwrap_or("")
    }

    /// Node location. `None` for other kinds; may be undefined.
    pub fn location(&self) -> Option<Location> {
        if self.kind() != ItemKind::Node {
            return None;
        }
        Some(Location::new(
            item::read_i32(self.data, item::NODE_LON),
            item::read_i32(self.data, item::NODE_LAT),
        ))
    }

    /// Changeset bounding box. `None` for other kinds.
    pub fn bounds(&self) -> Option<Bounds> {
        if self.kind() != ItemKind::Changeset {
            return None;
        }
        let mut bounds = Bounds::new();
        bounds.extend(Location::new(
            item::read_i32(self.data, item::CHANGESET_MIN_LON),
            item::read_i32(self.data, item::CHANGESET_MIN_LAT),
        ));
        bounds.extend(Location::new(
            item::read_i32(self.data, item::CHANGESET_MAX_LON),
            item::read_i32(self.data, item::CHANGESET_MAX_LAT),
        ));
        Some(bounds)
    }

    /// Iterate the size-prefixed sections of this item.
    pub fn sections(&self) -> SectionIter<'a> {
        let user_size = item::read_u16(self.data, item::ITEM_USER_SIZE) as usize;
        let start = item::header_len(self.kind()) + padded_len(user_size);
        SectionIter {
            data: self.data,
            pos: start.min(self.data.len()),
        }
    }

    fn section(&self, kind: SublistKind) -> Option<SectionRef<'a>> {
        self.sections().find(|s| s.kind == Some(kind))
    }

    /// Tags in source order. Empty when the item has no tag section.
    pub fn tags(&self) -> TagIter<'a> {
        TagIter {
            payload: self
                .section(SublistKind::TagList)
                .map(|s| s.payload)
                .unwrap_or(&[]),
        }
    }

    /// Way node refs in source order.
    pub fn node_refs(&self) -> NodeRefIter<'a> {
        NodeRefIter {
            payload: self
                .section(SublistKind::WayNodeList)
                .map(|s| s.payload)
                .unwrap_or(&[]),
        }
    }

    /// Relation members in source order.
    pub fn members(&self) -> MemberIter<'a> {
        MemberIter {
            payload: self
                .section(SublistKind::RelationMemberList)
                .map(|s| s.payload)
                .unwrap_or(&[]),
        }
    }

    /// Changeset discussion comments in source order.
    pub fn comments(&self) -> CommentIter<'a> {
        CommentIter {
            payload: self
                .section(SublistKind::Discussion)
                .map(|s| s.payload)
                .unwrap_or(&[]),
        }
    }
}

/// One section of an item.
#[derive(Debug, Clone, Copy)]
pub struct SectionRef<'a> {
    /// Section kind, `None` for unrecognized discriminators.
    pub kind: Option<SublistKind>,
    /// Payload bytes, excluding the section header and trailing padding.
    pub payload: &'a [u8],
}

/// Iterator over the sections of an item.
pub struct SectionIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for SectionIter<'a> {
    type Item = SectionRef<'a>;

    fn next(&mut self) -> Option<SectionRef<'a>> {
        if self.pos + item::SECTION_HEADER_LEN > self.data.len() {
            return None;
        }
        let size = item::read_u64(self.data, self.pos + item::SECTION_SIZE) as usize;
        let kind = SublistKind::from_u8(self.data[self.pos + item::SECTION_KIND]);
        let payload_start = self.pos + item::SECTION_HEADER_LEN;
        if payload_start + size > self.data.len() {
            return None;
        }
        self.pos = payload_start + padded_len(size);
        Some(SectionRef {
            kind,
            payload: &self.data[payload_start..payload_start + size],
        })
    }
}

/// Iterator over `key\0value\0` pairs of a tag section.
pub struct TagIter<'a> {
    payload: &'a [u8],
}

impl<'a> Iterator for TagIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<(&'a str, &'a str)> {
        if self.payload.is_empty() {
            return None;
        }
        let key_end = memchr::memchr(0, self.payload)?;
        let value_end = key_end + 1 + memchr::memchr(0, &self.payload[key_end + 1..])?;
        let key = std::str::from_utf8(&self.payload[..key_end]).unwrap_or("");
        let value = std::str::from_utf8(&self.payload[key_end + 1..value_end]).unwrap_or("");
        self.payload = &self.payload[value_end + 1..];
        Some((key, value))
    }
}

/// A reference from a way to a node, optionally with a resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    pub id: ObjectId,
    pub location: Location,
}

impl NodeRef {
    pub fn new(id: ObjectId, location: Location) -> Self {
        NodeRef { id, location }
    }
}

/// Iterator over the fixed-size records of a way node list.
pub struct NodeRefIter<'a> {
    payload: &'a [u8],
}

impl<'a> Iterator for NodeRefIter<'a> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        if self.payload.len() < item::NODE_REF_LEN {
            return None;
        }
        let node_ref = NodeRef {
            id: item::read_i64(self.payload, item::NODE_REF_ID),
            location: Location::new(
                item::read_i32(self.payload, item::NODE_REF_LON),
                item::read_i32(self.payload, item::NODE_REF_LAT),
            ),
        };
        self.payload = &self.payload[item::NODE_REF_LEN..];
        Some(node_ref)
    }
}

/// One relation member.
#[derive(Debug, Clone, Copy)]
pub struct MemberRef<'a> {
    pub kind: ItemKind,
    pub id: ObjectId,
    pub role: &'a str,
    full_member: Option<&'a [u8]>,
}

impl<'a> MemberRef<'a> {
    /// The embedded full member item, if one was supplied.
    pub fn full_member(&self) -> Option<ItemRef<'a>> {
        self.full_member.and_then(ItemRef::parse)
    }
}

/// Iterator over relation members.
pub struct MemberIter<'a> {
    payload: &'a [u8],
}

impl<'a> Iterator for MemberIter<'a> {
    type Item = MemberRef<'a>;

    fn next(&mut self) -> Option<MemberRef<'a>> {
        if self.payload.len() < item::MEMBER_LEN {
            return None;
        }
        let id = item::read_i64(self.payload, item::MEMBER_REF);
        let kind = ItemKind::from_u8(self.payload[item::MEMBER_KIND])?;
        let flags = self.payload[item::MEMBER_FLAGS];
        let role_size = item::read_u16(self.payload, item::MEMBER_ROLE_SIZE) as usize;

        let role_start = item::MEMBER_LEN;
        let role_end = role_start + role_size.saturating_sub(1);
        if role_end > self.payload.len() {
            return None;
        }
        let role = std::str::from_utf8(&self.payload[role_start..role_end]).unwrap_or("");

        let mut pos = role_start + padded_len(role_size);
        let full_member = if flags & item::MEMBER_FLAG_FULL != 0 {
            if pos + item::COMMON_HEADER_LEN > self.payload.len() {
                return None;
            }
            let member_size = item::read_u64(self.payload, pos + item::ITEM_SIZE) as usize;
            let slice = &self.payload[pos..pos + member_size];
            pos += padded_len(member_size);
            Some(slice)
        } else {
            None
        };

        let member = MemberRef {
            kind,
            id,
            role,
            full_member,
        };
        self.payload = &self.payload[pos.min(self.payload.len())..];
        Some(member)
    }
}

/// One changeset discussion comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentRef<'a> {
    pub date: Timestamp,
    pub uid: u32,
    pub user: &'a str,
    pub text: &'a str,
}

/// Iterator over discussion comments.
pub struct CommentIter<'a> {
    payload: &'a [u8],
}

impl<'a> Iterator for CommentIter<'a> {
    type Item = CommentRef<'a>;

    fn next(&mut self) -> Option<CommentRef<'a>> {
        if self.payload.len() < item::COMMENT_LEN {
            return None;
        }
        let date = Timestamp::new(item::read_i64(self.payload, item::COMMENT_DATE));
        let uid = item::read_u32(self.payload, item::COMMENT_UID);
        let user_size = item::read_u16(self.payload, item::COMMENT_USER_SIZE) as usize;
        let text_size = item::read_u16(self.payload, item::COMMENT_TEXT_SIZE) as usize;

        let user_start = item::COMMENT_LEN;
        let user_end = user_start + user_size.saturating_sub(1);
        let text_start = user_start + padded_len(user_size);
        let text_end = text_start + text_size.saturating_sub(1);
        // Text storage uses forced padding; absent text occupies nothing.
        let text_storage = if text_size == 0 {
            0
        } else {
            padded_len_forced(text_size)
        };
        let next = text_start + text_storage;
        if user_end > self.payload.len() || text_end > self.payload.len() {
            return None;
        }

        let comment = CommentRef {
            date,
            uid,
            user: std::str::from_utf8(&self.payload[user_start..user_end]).unwrap_or(""),
            text: std::str::from_utf8(&self.payload[text_start..text_end]).unwrap_or(""),
        };
        self.payload = &self.payload[next.min(self.payload.len())..];
        Some(comment)
    }
}
