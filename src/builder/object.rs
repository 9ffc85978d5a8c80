//! Entity and sublist builders.
//!
//! An [`ObjectBuilder`] reserves and zero-initializes the fixed header for
//! its kind, then exposes scalar setters writing into the reserved region.
//! Sublists (tags, node refs, members, discussion) are appended through
//! their own builders, at most one live per entity at a time; creating a
//! builder of a different kind requires finishing the current one first,
//! which flushes its padding and back-patches its size prefix.

use crate::error::{Error, Result};
use crate::memory::item::{self, header_len, SublistKind};
use crate::memory::view::{ItemRef, NodeRef};
use crate::memory::{Buffer, ALIGNMENT};
use crate::osm::{area_id_from_object, ItemKind, Location, Timestamp};

use super::Builder;

/// Builder for one OSM entity item.
#[derive(Debug)]
pub struct ObjectBuilder {
    item_offset: usize,
    kind: ItemKind,
    builder: Builder,
}

impl ObjectBuilder {
    /// Start a new item of the given kind at the current buffer position.
    /// The header is reserved and zero-initialized; visibility defaults to
    /// true and coordinates to the undefined sentinel.
    pub fn new(buffer: &mut Buffer, kind: ItemKind) -> Result<Self> {
        let item_offset = buffer.written();
        debug_assert!(item_offset % ALIGNMENT == 0);

        let len = header_len(kind);
        buffer.reserve(len)?;
        let data = buffer.bytes_mut();
        item::write_u64(data, item_offset + item::ITEM_SIZE, len as u64);
        data[item_offset + item::ITEM_KIND] = kind.as_u8();
        data[item_offset + item::ITEM_VISIBLE] = 1;
        match kind {
            ItemKind::Node => {
                item::write_i32(data, item_offset + item::NODE_LON, i32::MAX);
                item::write_i32(data, item_offset + item::NODE_LAT, i32::MAX);
            }
            ItemKind::Changeset => {
                for field in [
                    item::CHANGESET_MIN_LON,
                    item::CHANGESET_MIN_LAT,
                    item::CHANGESET_MAX_LON,
                    item::CHANGESET_MAX_LAT,
                ] {
                    item::write_i32(data, item_offset + field, i32::MAX);
                }
            }
            _ => {}
        }

        Ok(ObjectBuilder {
            item_offset,
            kind,
            builder: Builder::new_root(item_offset + item::ITEM_SIZE),
        })
    }

    pub fn node(buffer: &mut Buffer) -> Result<Self> {
        ObjectBuilder::new(buffer, ItemKind::Node)
    }

    pub fn way(buffer: &mut Buffer) -> Result<Self> {
        ObjectBuilder::new(buffer, ItemKind::Way)
    }

    pub fn relation(buffer: &mut Buffer) -> Result<Self> {
        ObjectBuilder::new(buffer, ItemKind::Relation)
    }

    pub fn changeset(buffer: &mut Buffer) -> Result<Self> {
        ObjectBuilder::new(buffer, ItemKind::Changeset)
    }

    /// Kind of the item under construction.
    #[inline]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Offset of the item in the buffer.
    #[inline]
    pub fn item_offset(&self) -> usize {
        self.item_offset
    }

    pub(crate) fn builder(&self) -> &Builder {
        &self.builder
    }

    pub fn set_id(&mut self, buffer: &mut Buffer, id: i64) {
        item::write_i64(buffer.bytes_mut(), self.item_offset + item::ITEM_ID, id);
    }

    pub fn set_version(&mut self, buffer: &mut Buffer, version: u32) {
        item::write_u32(
            buffer.bytes_mut(),
            self.item_offset + item::ITEM_VERSION,
            version,
        );
    }

    pub fn set_changeset(&mut self, buffer: &mut Buffer, changeset: u32) {
        item::write_u32(
            buffer.bytes_mut(),
            self.item_offset + item::ITEM_CHANGESET,
            changeset,
        );
    }

    pub fn set_uid(&mut self, buffer: &mut Buffer, uid: u32) {
        item::write_u32(buffer.bytes_mut(), self.item_offset + item::ITEM_UID, uid);
    }

    pub fn set_visible(&mut self, buffer: &mut Buffer, visible: bool) {
        buffer.bytes_mut()[self.item_offset + item::ITEM_VISIBLE] = visible.into();
    }

    pub fn set_timestamp(&mut self, buffer: &mut Buffer, timestamp: Timestamp) {
        item::write_i64(
            buffer.bytes_mut(),
            self.item_offset + item::ITEM_TIMESTAMP,
            timestamp.seconds(),
        );
    }

    /// Install a node location. No-op for other kinds.
    pub fn set_location(&mut self, buffer: &mut Buffer, location: Location) {
        if self.kind != ItemKind::Node {
            return;
        }
        let data = buffer.bytes_mut();
        item::write_i32(data, self.item_offset + item::NODE_LON, location.lon());
        item::write_i32(data, self.item_offset + item::NODE_LAT, location.lat());
    }

    /// Grow the changeset bounding box. No-op for other kinds or undefined
    /// locations.
    pub fn extend_bounds(&mut self, buffer: &mut Buffer, location: Location) {
        if self.kind != ItemKind::Changeset || !location.is_defined() {
            return;
        }
        let data = buffer.bytes_mut();
        let mut bounds = crate::osm::Bounds::new();
        let min = Location::new(
            item::read_i32(data, self.item_offset + item::CHANGESET_MIN_LON),
            item::read_i32(data, self.item_offset + item::CHANGESET_MIN_LAT),
        );
        let max = Location::new(
            item::read_i32(data, self.item_offset + item::CHANGESET_MAX_LON),
            item::read_i32(data, self.item_offset + item::CHANGESET_MAX_LAT),
        );
        bounds.extend(min);
        bounds.extend(max);
        bounds.extend(location);
        item::write_i32(
            data,
            self.item_offset + item::CHANGESET_MIN_LON,
            bounds.min().lon(),
        );
        item::write_i32(
            data,
            self.item_offset + item::CHANGESET_MIN_LAT,
            bounds.min().lat(),
        );
        item::write_i32(
            data,
            self.item_offset + item::CHANGESET_MAX_LON,
            bounds.max().lon(),
        );
        item::write_i32(
            data,
            self.item_offset + item::CHANGESET_MAX_LAT,
            bounds.max().lat(),
        );
    }

    /// Generic attribute setter: dispatches recognized names to the typed
    /// setters and ignores everything else (editor extras like `action`).
    pub fn set_attribute(&mut self, buffer: &mut Buffer, name: &str, value: &str) -> Result<()> {
        match name {
            "id" => {
                let id = value.parse().map_err(|_| bad_attribute("id", value))?;
                self.set_id(buffer, id);
            }
            "version" => {
                let version = value.parse().map_err(|_| bad_attribute("version", value))?;
                self.set_version(buffer, version);
            }
            "changeset" => {
                let changeset = value
                    .parse()
                    .map_err(|_| bad_attribute("changeset", value))?;
                self.set_changeset(buffer, changeset);
            }
            "uid" => {
                let uid = value.parse().map_err(|_| bad_attribute("uid", value))?;
                self.set_uid(buffer, uid);
            }
            "timestamp" => {
                let timestamp =
                    Timestamp::parse(value).ok_or_else(|| bad_attribute("timestamp", value))?;
                self.set_timestamp(buffer, timestamp);
            }
            "visible" => match value {
                "true" => self.set_visible(buffer, true),
                "false" => self.set_visible(buffer, false),
                _ => return Err(bad_attribute("visible", value)),
            },
            _ => {}
        }
        Ok(())
    }

    /// Append the NUL-terminated user string and record its length in the
    /// header.
    pub fn add_user(&mut self, buffer: &mut Buffer, user: &str) -> Result<()> {
        self.builder
            .add_user(buffer, self.item_offset + item::ITEM_USER_SIZE, user)
    }

    /// Convenience: append a whole tag list at once.
    pub fn add_tags(&mut self, buffer: &mut Buffer, tags: &[(&str, &str)]) -> Result<()> {
        let mut tag_list = TagListBuilder::new(buffer, self)?;
        for (key, value) in tags {
            tag_list.add_tag(buffer, key, value)?;
        }
        tag_list.finish(buffer)
    }

    /// Convenience: append a whole way node list at once.
    pub fn add_node_refs(&mut self, buffer: &mut Buffer, refs: &[NodeRef]) -> Result<()> {
        let mut list = NodeRefListBuilder::new(buffer, self, SublistKind::WayNodeList)?;
        for node_ref in refs {
            list.add_node_ref(buffer, *node_ref)?;
        }
        list.finish(buffer)
    }

    /// Flush trailing padding. The caller commits the buffer afterwards.
    pub fn finish(self, buffer: &mut Buffer) -> Result<()> {
        self.builder.flush_padding(buffer)
    }
}

fn bad_attribute(name: &str, value: &str) -> Error {
    Error::SchemaViolation(format!("bad {name} attribute: \"{value}\""))
}

/// Start a section of the given kind under `parent`.
fn new_sublist(buffer: &mut Buffer, parent: &ObjectBuilder, kind: SublistKind) -> Result<Builder> {
    let offset = buffer.written();
    debug_assert!(offset % ALIGNMENT == 0);
    buffer.reserve(item::SECTION_HEADER_LEN)?;
    buffer.bytes_mut()[offset + item::SECTION_KIND] = kind.as_u8();
    let builder = Builder::new_child(offset + item::SECTION_SIZE, parent.builder());
    // The section header itself counts into the enclosing item.
    parent.builder().add_size(buffer, item::SECTION_HEADER_LEN);
    Ok(builder)
}

/// Builds the tag list section. Tags keep source order.
#[derive(Debug)]
pub struct TagListBuilder {
    builder: Builder,
}

impl TagListBuilder {
    pub fn new(buffer: &mut Buffer, parent: &ObjectBuilder) -> Result<Self> {
        Ok(TagListBuilder {
            builder: new_sublist(buffer, parent, SublistKind::TagList)?,
        })
    }

    /// Append one `key\0value\0` pair.
    pub fn add_tag(&mut self, buffer: &mut Buffer, key: &str, value: &str) -> Result<()> {
        self.builder.append(buffer, key.as_bytes())?;
        self.builder.append_zero(buffer)?;
        self.builder.append(buffer, value.as_bytes())?;
        self.builder.append_zero(buffer)
    }

    pub fn finish(self, buffer: &mut Buffer) -> Result<()> {
        self.builder.flush_padding(buffer)
    }
}

/// Builds a node ref list section: way node lists or area rings, selected
/// by the section kind.
#[derive(Debug)]
pub struct NodeRefListBuilder {
    builder: Builder,
}

impl NodeRefListBuilder {
    pub fn new(buffer: &mut Buffer, parent: &ObjectBuilder, kind: SublistKind) -> Result<Self> {
        debug_assert!(matches!(
            kind,
            SublistKind::WayNodeList | SublistKind::OuterRing | SublistKind::InnerRing
        ));
        Ok(NodeRefListBuilder {
            builder: new_sublist(buffer, parent, kind)?,
        })
    }

    /// Append one fixed-size node ref record.
    pub fn add_node_ref(&mut self, buffer: &mut Buffer, node_ref: NodeRef) -> Result<()> {
        let offset = self.builder.reserve_space(buffer, item::NODE_REF_LEN)?;
        let data = buffer.bytes_mut();
        item::write_i64(data, offset + item::NODE_REF_ID, node_ref.id);
        item::write_i32(data, offset + item::NODE_REF_LON, node_ref.location.lon());
        item::write_i32(data, offset + item::NODE_REF_LAT, node_ref.location.lat());
        self.builder.add_size(buffer, item::NODE_REF_LEN);
        Ok(())
    }

    pub fn finish(self, buffer: &mut Buffer) -> Result<()> {
        self.builder.flush_padding(buffer)
    }
}

/// Builds the relation member list section. Member order is preserved.
#[derive(Debug)]
pub struct RelationMemberListBuilder {
    builder: Builder,
}

impl RelationMemberListBuilder {
    pub fn new(buffer: &mut Buffer, parent: &ObjectBuilder) -> Result<Self> {
        Ok(RelationMemberListBuilder {
            builder: new_sublist(buffer, parent, SublistKind::RelationMemberList)?,
        })
    }

    /// Append one member: the fixed record, the padded NUL-terminated role
    /// and, when supplied, a verbatim copy of the full member item.
    pub fn add_member(
        &mut self,
        buffer: &mut Buffer,
        kind: ItemKind,
        id: i64,
        role: &str,
        full_member: Option<&ItemRef<'_>>,
    ) -> Result<()> {
        let role_size = u16::try_from(role.len() + 1)
            .map_err(|_| Error::SchemaViolation("relation member role too long".to_string()))?;

        let offset = self.builder.reserve_space(buffer, item::MEMBER_LEN)?;
        let data = buffer.bytes_mut();
        item::write_i64(data, offset + item::MEMBER_REF, id);
        data[offset + item::MEMBER_KIND] = kind.as_u8();
        if full_member.is_some() {
            data[offset + item::MEMBER_FLAGS] = item::MEMBER_FLAG_FULL;
        }
        item::write_u16(data, offset + item::MEMBER_ROLE_SIZE, role_size);
        self.builder.add_size(buffer, item::MEMBER_LEN);

        self.builder.append(buffer, role.as_bytes())?;
        self.builder.append_zero(buffer)?;
        self.builder.add_padding(buffer, false)?;

        if let Some(full) = full_member {
            self.builder.add_item(buffer, full)?;
        }
        Ok(())
    }

    pub fn finish(self, buffer: &mut Buffer) -> Result<()> {
        self.builder.flush_padding(buffer)
    }
}

/// Builds the changeset discussion section. Comments and their texts keep
/// input order.
#[derive(Debug)]
pub struct ChangesetDiscussionBuilder {
    builder: Builder,
    /// Offset of the comment record awaiting its text size.
    current_comment: Option<usize>,
}

impl ChangesetDiscussionBuilder {
    pub fn new(buffer: &mut Buffer, parent: &ObjectBuilder) -> Result<Self> {
        Ok(ChangesetDiscussionBuilder {
            builder: new_sublist(buffer, parent, SublistKind::Discussion)?,
            current_comment: None,
        })
    }

    /// Write a comment header followed by the padded user string.
    pub fn add_comment(
        &mut self,
        buffer: &mut Buffer,
        date: Timestamp,
        uid: u32,
        user: &str,
    ) -> Result<()> {
        let user_size = u16::try_from(user.len() + 1)
            .map_err(|_| Error::SchemaViolation("comment user too long".to_string()))?;

        let offset = self.builder.reserve_space(buffer, item::COMMENT_LEN)?;
        let data = buffer.bytes_mut();
        item::write_i64(data, offset + item::COMMENT_DATE, date.seconds());
        item::write_u32(data, offset + item::COMMENT_UID, uid);
        item::write_u16(data, offset + item::COMMENT_USER_SIZE, user_size);
        self.builder.add_size(buffer, item::COMMENT_LEN);

        self.builder.append(buffer, user.as_bytes())?;
        self.builder.append_zero(buffer)?;
        self.builder.add_padding(buffer, false)?;

        self.current_comment = Some(offset);
        Ok(())
    }

    /// Append the text payload of the current comment, terminated by
    /// forced padding.
    pub fn add_comment_text(&mut self, buffer: &mut Buffer, text: &str) -> Result<()> {
        let Some(offset) = self.current_comment.take() else {
            debug_assert!(false, "comment text without a comment");
            return Ok(());
        };
        let text_size = u16::try_from(text.len() + 1)
            .map_err(|_| Error::SchemaViolation("comment text too long".to_string()))?;
        item::write_u16(
            buffer.bytes_mut(),
            offset + item::COMMENT_TEXT_SIZE,
            text_size,
        );

        self.builder.append(buffer, text.as_bytes())?;
        self.builder.append_zero(buffer)?;
        self.builder.add_padding(buffer, true)
    }

    pub fn finish(self, buffer: &mut Buffer) -> Result<()> {
        self.builder.flush_padding(buffer)
    }
}

/// Builder for area items, assembled downstream from ways and relations.
#[derive(Debug)]
pub struct AreaBuilder {
    inner: ObjectBuilder,
}

impl AreaBuilder {
    pub fn new(buffer: &mut Buffer) -> Result<Self> {
        Ok(AreaBuilder {
            inner: ObjectBuilder::new(buffer, ItemKind::Area)?,
        })
    }

    /// Access the underlying object builder for scalar setters and tags.
    pub fn object(&mut self) -> &mut ObjectBuilder {
        &mut self.inner
    }

    /// Derive the area's attributes from the way or relation it was
    /// assembled from: the id is mapped (ways even, relations odd), the
    /// remaining scalars and the user are copied.
    pub fn initialize_from_object(
        &mut self,
        buffer: &mut Buffer,
        source: &ItemRef<'_>,
    ) -> Result<()> {
        self.inner
            .set_id(buffer, area_id_from_object(source.id(), source.kind()));
        self.inner.set_version(buffer, source.version());
        self.inner.set_changeset(buffer, source.changeset());
        self.inner.set_timestamp(buffer, source.timestamp());
        self.inner.set_visible(buffer, source.visible());
        self.inner.set_uid(buffer, source.uid());
        self.inner.add_user(buffer, source.user())
    }

    /// Append an outer ring.
    pub fn add_outer_ring(&mut self, buffer: &mut Buffer, refs: &[NodeRef]) -> Result<()> {
        self.add_ring(buffer, SublistKind::OuterRing, refs)
    }

    /// Append an inner ring.
    pub fn add_inner_ring(&mut self, buffer: &mut Buffer, refs: &[NodeRef]) -> Result<()> {
        self.add_ring(buffer, SublistKind::InnerRing, refs)
    }

    fn add_ring(
        &mut self,
        buffer: &mut Buffer,
        kind: SublistKind,
        refs: &[NodeRef],
    ) -> Result<()> {
        let mut ring = NodeRefListBuilder::new(buffer, &self.inner, kind)?;
        for node_ref in refs {
            ring.add_node_ref(buffer, *node_ref)?;
        }
        ring.finish(buffer)
    }

    pub fn finish(self, buffer: &mut Buffer) -> Result<()> {
        self.inner.finish(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::view::items;
    use crate::memory::{padded_len, ALIGNMENT};

    fn build_node(buffer: &mut Buffer) {
        let mut node = ObjectBuilder::node(buffer).unwrap();
        node.set_id(buffer, 1);
        node.set_version(buffer, 1);
        node.set_uid(buffer, 7);
        node.set_location(buffer, Location::from_degrees(2.5, 1.5));
        node.add_user(buffer, "a").unwrap();
        node.add_tags(buffer, &[("highway", "primary")]).unwrap();
        node.finish(buffer).unwrap();
        buffer.commit();
    }

    #[test]
    fn test_node_round_trip() {
        let mut buffer = Buffer::with_capacity(4096);
        build_node(&mut buffer);

        let node = items(buffer.committed_bytes()).next().unwrap();
        assert_eq!(node.kind(), ItemKind::Node);
        assert_eq!(node.id(), 1);
        assert_eq!(node.version(), 1);
        assert_eq!(node.uid(), 7);
        assert!(node.visible());
        assert_eq!(node.user(), "a");
        assert_eq!(
            node.location(),
            Some(Location::new(25_000_000, 15_000_000))
        );
        let tags: Vec<_> = node.tags().collect();
        assert_eq!(tags, vec![("highway", "primary")]);
    }

    #[test]
    fn test_item_extent_is_aligned_and_exact() {
        let mut buffer = Buffer::with_capacity(4096);
        build_node(&mut buffer);
        build_node(&mut buffer);

        assert_eq!(buffer.committed() % ALIGNMENT, 0);
        let collected: Vec<_> = items(buffer.committed_bytes()).collect();
        assert_eq!(collected.len(), 2);
        // Items tile the committed range exactly.
        let total: usize = collected.iter().map(|i| padded_len(i.size())).sum();
        assert_eq!(total, buffer.committed());
    }

    #[test]
    fn test_section_skip_reaches_item_end() {
        let mut buffer = Buffer::with_capacity(4096);
        let mut way = ObjectBuilder::way(&mut buffer).unwrap();
        way.set_id(&mut buffer, 10);
        way.add_user(&mut buffer, "").unwrap();
        way.add_tags(&mut buffer, &[("h", "yes"), ("oneway", "no")])
            .unwrap();
        way.add_node_refs(
            &mut buffer,
            &[
                NodeRef::new(1, Location::UNDEFINED),
                NodeRef::new(2, Location::UNDEFINED),
            ],
        )
        .unwrap();
        way.finish(&mut buffer).unwrap();
        buffer.commit();

        let way = items(buffer.committed_bytes()).next().unwrap();
        let mut end = item::header_len(ItemKind::Way)
            + padded_len(item::read_u16(way.bytes(), item::ITEM_USER_SIZE) as usize);
        for section in way.sections() {
            end += item::SECTION_HEADER_LEN + padded_len(section.payload.len());
        }
        assert_eq!(end, way.size());
    }

    #[test]
    fn test_way_refs_in_order() {
        let mut buffer = Buffer::with_capacity(4096);
        let mut way = ObjectBuilder::way(&mut buffer).unwrap();
        way.add_user(&mut buffer, "").unwrap();
        way.add_node_refs(
            &mut buffer,
            &[
                NodeRef::new(3, Location::UNDEFINED),
                NodeRef::new(1, Location::from_degrees(1.0, 2.0)),
                NodeRef::new(2, Location::UNDEFINED),
            ],
        )
        .unwrap();
        way.finish(&mut buffer).unwrap();
        buffer.commit();

        let way = items(buffer.committed_bytes()).next().unwrap();
        let refs: Vec<_> = way.node_refs().collect();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].id, 3);
        assert!(!refs[0].location.is_defined());
        assert_eq!(refs[1].id, 1);
        assert_eq!(refs[1].location, Location::from_degrees(1.0, 2.0));
        assert_eq!(refs[2].id, 2);
    }

    #[test]
    fn test_relation_members_with_roles() {
        let mut buffer = Buffer::with_capacity(4096);
        let mut relation = ObjectBuilder::relation(&mut buffer).unwrap();
        relation.set_id(&mut buffer, 5);
        relation.add_user(&mut buffer, "").unwrap();
        let mut members = RelationMemberListBuilder::new(&mut buffer, &relation).unwrap();
        members
            .add_member(&mut buffer, ItemKind::Node, 1, "a", None)
            .unwrap();
        members
            .add_member(&mut buffer, ItemKind::Way, 2, "", None)
            .unwrap();
        members
            .add_member(&mut buffer, ItemKind::Relation, 3, "sevenchr", None)
            .unwrap();
        members.finish(&mut buffer).unwrap();
        relation.finish(&mut buffer).unwrap();
        buffer.commit();

        let relation = items(buffer.committed_bytes()).next().unwrap();
        let members: Vec<_> = relation.members().collect();
        assert_eq!(members.len(), 3);
        assert_eq!((members[0].kind, members[0].id, members[0].role), (ItemKind::Node, 1, "a"));
        assert_eq!((members[1].kind, members[1].id, members[1].role), (ItemKind::Way, 2, ""));
        assert_eq!(
            (members[2].kind, members[2].id, members[2].role),
            (ItemKind::Relation, 3, "sevenchr")
        );
        assert!(members.iter().all(|m| m.full_member().is_none()));
    }

    #[test]
    fn test_relation_member_with_full_member() {
        let mut node_buffer = Buffer::with_capacity(4096);
        build_node(&mut node_buffer);
        let committed = node_buffer.committed_bytes().to_vec();
        let node = ItemRef::parse(&committed).unwrap();

        let mut buffer = Buffer::with_capacity(4096);
        let mut relation = ObjectBuilder::relation(&mut buffer).unwrap();
        relation.add_user(&mut buffer, "").unwrap();
        let mut members = RelationMemberListBuilder::new(&mut buffer, &relation).unwrap();
        members
            .add_member(&mut buffer, ItemKind::Node, 1, "role", Some(&node))
            .unwrap();
        members
            .add_member(&mut buffer, ItemKind::Way, 2, "", None)
            .unwrap();
        members.finish(&mut buffer).unwrap();
        relation.finish(&mut buffer).unwrap();
        buffer.commit();

        let relation = items(buffer.committed_bytes()).next().unwrap();
        let members: Vec<_> = relation.members().collect();
        assert_eq!(members.len(), 2);
        let full = members[0].full_member().unwrap();
        assert_eq!(full.kind(), ItemKind::Node);
        assert_eq!(full.id(), 1);
        assert_eq!(full.user(), "a");
        assert_eq!(members[1].id, 2);
    }

    #[test]
    fn test_discussion_comments() {
        let mut buffer = Buffer::with_capacity(4096);
        let mut changeset = ObjectBuilder::changeset(&mut buffer).unwrap();
        changeset.set_id(&mut buffer, 1);
        changeset.add_user(&mut buffer, "creator").unwrap();
        let mut discussion = ChangesetDiscussionBuilder::new(&mut buffer, &changeset).unwrap();
        discussion
            .add_comment(&mut buffer, Timestamp::new(1_577_836_800), 7, "a")
            .unwrap();
        discussion.add_comment_text(&mut buffer, "hi").unwrap();
        // Second comment with text sized exactly to the alignment boundary
        // exercises the forced terminator.
        discussion
            .add_comment(&mut buffer, Timestamp::new(1_577_836_801), 8, "b")
            .unwrap();
        discussion.add_comment_text(&mut buffer, "1234567").unwrap();
        discussion.finish(&mut buffer).unwrap();
        changeset.finish(&mut buffer).unwrap();
        buffer.commit();

        let changeset = items(buffer.committed_bytes()).next().unwrap();
        let comments: Vec<_> = changeset.comments().collect();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].date.seconds(), 1_577_836_800);
        assert_eq!(comments[0].uid, 7);
        assert_eq!(comments[0].user, "a");
        assert_eq!(comments[0].text, "hi");
        assert_eq!(comments[1].user, "b");
        assert_eq!(comments[1].text, "1234567");
    }

    #[test]
    fn test_changeset_bounds() {
        let mut buffer = Buffer::with_capacity(4096);
        let mut changeset = ObjectBuilder::changeset(&mut buffer).unwrap();
        changeset.extend_bounds(&mut buffer, Location::from_degrees(1.0, 2.0));
        changeset.extend_bounds(&mut buffer, Location::from_degrees(-1.0, 4.0));
        changeset.add_user(&mut buffer, "").unwrap();
        changeset.finish(&mut buffer).unwrap();
        buffer.commit();

        let changeset = items(buffer.committed_bytes()).next().unwrap();
        let bounds = changeset.bounds().unwrap();
        assert_eq!(bounds.min(), Location::from_degrees(-1.0, 2.0));
        assert_eq!(bounds.max(), Location::from_degrees(1.0, 4.0));
    }

    #[test]
    fn test_area_initialize_from_object() {
        let mut source_buffer = Buffer::with_capacity(4096);
        let mut way = ObjectBuilder::way(&mut source_buffer).unwrap();
        way.set_id(&mut source_buffer, 17);
        way.set_version(&mut source_buffer, 3);
        way.set_changeset(&mut source_buffer, 21);
        way.set_uid(&mut source_buffer, 9);
        way.set_timestamp(&mut source_buffer, Timestamp::new(1000));
        way.add_user(&mut source_buffer, "mapper").unwrap();
        way.finish(&mut source_buffer).unwrap();
        source_buffer.commit();
        let committed = source_buffer.committed_bytes().to_vec();
        let source = ItemRef::parse(&committed).unwrap();

        let mut buffer = Buffer::with_capacity(4096);
        let mut area = AreaBuilder::new(&mut buffer).unwrap();
        area.initialize_from_object(&mut buffer, &source).unwrap();
        area.add_outer_ring(
            &mut buffer,
            &[
                NodeRef::new(1, Location::from_degrees(0.0, 0.0)),
                NodeRef::new(2, Location::from_degrees(1.0, 0.0)),
                NodeRef::new(1, Location::from_degrees(0.0, 0.0)),
            ],
        )
        .unwrap();
        area.finish(&mut buffer).unwrap();
        buffer.commit();

        let area = items(buffer.committed_bytes()).next().unwrap();
        assert_eq!(area.kind(), ItemKind::Area);
        assert_eq!(area.id(), 34);
        assert_eq!(area.version(), 3);
        assert_eq!(area.changeset(), 21);
        assert_eq!(area.uid(), 9);
        assert_eq!(area.timestamp().seconds(), 1000);
        assert_eq!(area.user(), "mapper");
    }

    #[test]
    fn test_entity_too_large_for_buffer() {
        let mut buffer = Buffer::with_capacity(64);
        let mut node = ObjectBuilder::node(&mut buffer).unwrap();
        let result = node.add_user(&mut buffer, "a user name that does not fit at all");
        assert_eq!(result, Err(Error::BufferFull));
    }
}
