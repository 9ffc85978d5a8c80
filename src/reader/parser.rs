//! Parser state machine driving builders from XML events.
//!
//! The OSM XML schema is walked as a nested-context state machine: the
//! parser tracks where it is (root, inside the root element, inside an
//! entity, inside a discussion comment, ...) and drives the entity and
//! sublist builders accordingly. At most one sublist builder is live per
//! entity; switching sublist kind finishes the previous builder, which
//! flushes its padding and back-patches its size prefix.

use crossbeam_channel::Sender;
use tracing::trace;

use crate::builder::{
    ChangesetDiscussionBuilder, NodeRefListBuilder, ObjectBuilder, RelationMemberListBuilder,
    TagListBuilder,
};
use crate::error::{Error, Result};
use crate::memory::buffer::DEFAULT_CAPACITY;
use crate::memory::view::NodeRef;
use crate::memory::{Buffer, SublistKind};
use crate::osm::{parse_coordinate, ItemKind, Location, Timestamp};
use crate::xml::{Attribute, XmlHandler};

use super::filter::EntityFilter;
use super::header::Header;

/// Configuration knobs of the reader.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Entity kinds to produce; everything else is consumed and discarded.
    pub read_types: EntityFilter,
    /// Capacity of each output buffer.
    pub buffer_capacity: usize,
    /// Committed size above which a buffer is handed to the output queue.
    pub flush_threshold: usize,
}

impl ReaderConfig {
    /// Configuration with the given buffer capacity and the default 90%
    /// flush threshold.
    pub fn with_capacity(buffer_capacity: usize) -> Self {
        ReaderConfig {
            read_types: EntityFilter::ALL,
            buffer_capacity,
            flush_threshold: buffer_capacity / 10 * 9,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig::with_capacity(DEFAULT_CAPACITY)
    }
}

/// Where in the document the parser currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Root,
    Top,
    Node,
    Way,
    Relation,
    Changeset,
    Discussion,
    Comment,
    CommentText,
    IgnoredNode,
    IgnoredWay,
    IgnoredRelation,
    IgnoredChangeset,
    InObject,
}

/// The one live sublist builder of the current entity.
#[derive(Debug)]
enum Sublist {
    Tags(TagListBuilder),
    WayNodes(NodeRefListBuilder),
    Members(RelationMemberListBuilder),
    Discussion(ChangesetDiscussionBuilder),
}

/// Push parser for OSM XML and osmChange streams.
///
/// Implements [`XmlHandler`]; committed buffers and the one-shot header go
/// out through the channels handed to [`OsmXmlParser::new`].
pub struct OsmXmlParser {
    context: Context,
    last_context: Context,
    /// Nesting depth of unrecognized elements below an entity child.
    in_object_depth: u32,
    /// Only used for change files, which group entities into create,
    /// modify and delete sections.
    in_delete_section: bool,
    header: Header,
    header_done: bool,
    buffer: Buffer,
    object: Option<ObjectBuilder>,
    sublist: Option<Sublist>,
    comment_text: String,
    read_types: EntityFilter,
    buffer_capacity: usize,
    flush_threshold: usize,
    output: Sender<std::result::Result<Buffer, Error>>,
    header_tx: Option<Sender<std::result::Result<Header, Error>>>,
}

impl OsmXmlParser {
    pub fn new(
        config: ReaderConfig,
        output: Sender<std::result::Result<Buffer, Error>>,
        header_tx: Sender<std::result::Result<Header, Error>>,
    ) -> Self {
        OsmXmlParser {
            context: Context::Root,
            last_context: Context::Root,
            in_object_depth: 0,
            in_delete_section: false,
            header: Header::new(),
            header_done: false,
            buffer: Buffer::with_capacity(config.buffer_capacity),
            object: None,
            sublist: None,
            comment_text: String::new(),
            read_types: config.read_types,
            buffer_capacity: config.buffer_capacity,
            flush_threshold: config.flush_threshold,
            output,
            header_tx: Some(header_tx),
        }
    }

    /// The configured read filter.
    pub fn read_types(&self) -> EntityFilter {
        self.read_types
    }

    /// True once the header has been delivered.
    pub fn header_is_done(&self) -> bool {
        self.header_done
    }

    /// Fulfill the one-shot header promise. Subsequent calls are no-ops.
    pub fn mark_header_as_done(&mut self) {
        self.header_done = true;
        if let Some(tx) = self.header_tx.take() {
            let _ = tx.send(Ok(self.header.clone()));
        }
    }

    /// Deliver the header if still pending and hand the final partial
    /// buffer to the output queue. Called after the last chunk was fed.
    pub fn flush_final(&mut self) -> Result<()> {
        self.mark_header_as_done();
        if self.buffer.committed() > 0 {
            let mut fresh = Buffer::with_capacity(self.buffer_capacity);
            self.buffer.swap(&mut fresh);
            self.send_buffer(fresh)?;
        }
        Ok(())
    }

    /// Propagate a fatal error: the header promise (if unfulfilled) and
    /// the output queue both receive it, so consumers see the failure
    /// in-order relative to the buffers already produced.
    pub fn fail(&mut self, error: Error) {
        self.header_done = true;
        if let Some(tx) = self.header_tx.take() {
            let _ = tx.send(Err(error.clone()));
        }
        let _ = self.output.send(Err(error));
    }

    fn send_buffer(&self, buffer: Buffer) -> Result<()> {
        trace!(committed = buffer.committed(), "handing buffer to output queue");
        self.output
            .send(Ok(buffer))
            .map_err(|_| Error::Io("output queue closed".to_string()))
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.committed() > self.flush_threshold {
            let mut fresh = Buffer::with_capacity(self.buffer_capacity);
            self.buffer.swap(&mut fresh);
            self.send_buffer(fresh)?;
        }
        Ok(())
    }

    fn finish_sublist(&mut self) -> Result<()> {
        if let Some(sublist) = self.sublist.take() {
            match sublist {
                Sublist::Tags(builder) => builder.finish(&mut self.buffer)?,
                Sublist::WayNodes(builder) => builder.finish(&mut self.buffer)?,
                Sublist::Members(builder) => builder.finish(&mut self.buffer)?,
                Sublist::Discussion(builder) => builder.finish(&mut self.buffer)?,
            }
        }
        Ok(())
    }

    /// Scalar attributes common to nodes, ways and relations. `lon`/`lat`
    /// collect into a Location installed on nodes; `user` is appended
    /// after the scan; everything else goes through the generic setter.
    /// Inside a delete section visibility is forced off, regardless of a
    /// `visible` attribute.
    fn init_object(&mut self, object: &mut ObjectBuilder, attrs: &[Attribute<'_>]) -> Result<()> {
        let mut user = "";
        let mut location = Location::UNDEFINED;

        for attr in attrs {
            match attr.name {
                "lon" => location.set_lon(parse_coordinate(&attr.value)),
                "lat" => location.set_lat(parse_coordinate(&attr.value)),
                "user" => user = attr.value.as_ref(),
                _ => object.set_attribute(&mut self.buffer, attr.name, &attr.value)?,
            }
        }

        if location.is_defined() && object.kind() == ItemKind::Node {
            object.set_location(&mut self.buffer, location);
        }
        if self.in_delete_section {
            object.set_visible(&mut self.buffer, false);
        }
        object.add_user(&mut self.buffer, user)
    }

    /// Changeset attributes: like `init_object`, plus the four bounding
    /// box corners.
    fn init_changeset(
        &mut self,
        object: &mut ObjectBuilder,
        attrs: &[Attribute<'_>],
    ) -> Result<()> {
        let mut user = "";
        let mut min = Location::UNDEFINED;
        let mut max = Location::UNDEFINED;

        for attr in attrs {
            match attr.name {
                "min_lon" => min.set_lon(parse_coordinate(&attr.value)),
                "min_lat" => min.set_lat(parse_coordinate(&attr.value)),
                "max_lon" => max.set_lon(parse_coordinate(&attr.value)),
                "max_lat" => max.set_lat(parse_coordinate(&attr.value)),
                "user" => user = attr.value.as_ref(),
                _ => object.set_attribute(&mut self.buffer, attr.name, &attr.value)?,
            }
        }

        object.extend_bounds(&mut self.buffer, min);
        object.extend_bounds(&mut self.buffer, max);
        object.add_user(&mut self.buffer, user)
    }

    fn begin_object(
        &mut self,
        kind: ItemKind,
        attrs: &[Attribute<'_>],
        active: Context,
        ignored: Context,
    ) -> Result<()> {
        self.mark_header_as_done();
        if !self.read_types.contains(kind) {
            self.context = ignored;
            return Ok(());
        }

        let mut object = ObjectBuilder::new(&mut self.buffer, kind)?;
        if kind == ItemKind::Changeset {
            self.init_changeset(&mut object, attrs)?;
        } else {
            self.init_object(&mut object, attrs)?;
        }
        self.object = Some(object);
        self.context = active;
        Ok(())
    }

    /// Append a `<tag k= v=>` pair, switching the live sublist to the tag
    /// list if necessary.
    fn get_tag(&mut self, attrs: &[Attribute<'_>]) -> Result<()> {
        let mut key = "";
        let mut value = "";
        for attr in attrs {
            match attr.name {
                "k" => key = attr.value.as_ref(),
                "v" => value = attr.value.as_ref(),
                _ => {}
            }
        }

        if !matches!(self.sublist, Some(Sublist::Tags(_))) {
            self.finish_sublist()?;
            if let Some(object) = &self.object {
                self.sublist = Some(Sublist::Tags(TagListBuilder::new(&mut self.buffer, object)?));
            }
        }
        if let Some(Sublist::Tags(tags)) = &mut self.sublist {
            tags.add_tag(&mut self.buffer, key, value)?;
        }
        Ok(())
    }

    /// Append a `<nd ref= [lon lat]>` way node.
    fn get_way_node(&mut self, attrs: &[Attribute<'_>]) -> Result<()> {
        let mut id = 0i64;
        let mut location = Location::UNDEFINED;
        for attr in attrs {
            match attr.name {
                "ref" => {
                    id = attr.value.parse().map_err(|_| {
                        Error::SchemaViolation(format!("bad ref on way node: \"{}\"", attr.value))
                    })?;
                }
                "lon" => location.set_lon(parse_coordinate(&attr.value)),
                "lat" => location.set_lat(parse_coordinate(&attr.value)),
                _ => {}
            }
        }

        if !matches!(self.sublist, Some(Sublist::WayNodes(_))) {
            self.finish_sublist()?;
            if let Some(object) = &self.object {
                self.sublist = Some(Sublist::WayNodes(NodeRefListBuilder::new(
                    &mut self.buffer,
                    object,
                    SublistKind::WayNodeList,
                )?));
            }
        }
        if let Some(Sublist::WayNodes(list)) = &mut self.sublist {
            list.add_node_ref(&mut self.buffer, NodeRef::new(id, location))?;
        }
        Ok(())
    }

    /// Append a `<member type= ref= role=>` relation member. Unknown types
    /// and missing or zero refs are schema violations.
    fn get_member(&mut self, attrs: &[Attribute<'_>]) -> Result<()> {
        let mut kind = None;
        let mut id = 0i64;
        let mut role = "";
        for attr in attrs {
            match attr.name {
                "type" => kind = attr.value.bytes().next().and_then(ItemKind::from_member_char),
                "ref" => {
                    id = attr.value.parse().map_err(|_| {
                        Error::SchemaViolation(format!(
                            "bad ref on relation member: \"{}\"",
                            attr.value
                        ))
                    })?;
                }
                "role" => role = attr.value.as_ref(),
                _ => {}
            }
        }
        let kind = kind
            .ok_or_else(|| Error::SchemaViolation("unknown type on relation member".to_string()))?;
        if id == 0 {
            return Err(Error::SchemaViolation(
                "missing ref on relation member".to_string(),
            ));
        }

        if !matches!(self.sublist, Some(Sublist::Members(_))) {
            self.finish_sublist()?;
            if let Some(object) = &self.object {
                self.sublist = Some(Sublist::Members(RelationMemberListBuilder::new(
                    &mut self.buffer,
                    object,
                )?));
            }
        }
        if let Some(Sublist::Members(members)) = &mut self.sublist {
            members.add_member(&mut self.buffer, kind, id, role, None)?;
        }
        Ok(())
    }

    /// Append a `<comment date= uid= user=>` header to the discussion.
    fn get_comment(&mut self, attrs: &[Attribute<'_>]) -> Result<()> {
        let mut date = Timestamp::default();
        let mut uid = 0u32;
        let mut user = "";
        for attr in attrs {
            match attr.name {
                "date" => {
                    date = Timestamp::parse(&attr.value).ok_or_else(|| {
                        Error::SchemaViolation(format!("bad date attribute: \"{}\"", attr.value))
                    })?;
                }
                "uid" => {
                    uid = attr.value.parse().map_err(|_| {
                        Error::SchemaViolation(format!("bad uid attribute: \"{}\"", attr.value))
                    })?;
                }
                "user" => user = attr.value.as_ref(),
                _ => {}
            }
        }
        if let Some(Sublist::Discussion(discussion)) = &mut self.sublist {
            discussion.add_comment(&mut self.buffer, date, uid, user)?;
        }
        Ok(())
    }

    /// Close the current entity: finish the sublist and entity builders in
    /// reverse construction order, commit, then possibly flush.
    fn close_object(&mut self) -> Result<()> {
        self.finish_sublist()?;
        if let Some(object) = self.object.take() {
            object.finish(&mut self.buffer)?;
        }
        self.buffer.commit();
        self.context = Context::Top;
        self.flush_buffer()
    }

    fn root_element(&mut self, name: &str, attrs: &[Attribute<'_>]) -> Result<()> {
        if name != "osm" && name != "osmChange" {
            return Err(Error::UnknownTopLevel(name.to_string()));
        }
        if name == "osmChange" {
            self.header.set_multiple_object_versions(true);
        }
        for attr in attrs {
            match attr.name {
                "version" => {
                    self.header.set_version(&attr.value);
                    if attr.value != "0.6" {
                        return Err(Error::FormatVersion(attr.value.to_string()));
                    }
                }
                "generator" => self.header.set_generator(&attr.value),
                _ => {}
            }
        }
        if self.header.version().is_empty() {
            return Err(Error::FormatVersion(String::new()));
        }
        self.context = Context::Top;
        Ok(())
    }

    fn top_element(&mut self, name: &str, attrs: &[Attribute<'_>]) -> Result<()> {
        debug_assert!(self.sublist.is_none());
        match name {
            "node" => self.begin_object(ItemKind::Node, attrs, Context::Node, Context::IgnoredNode),
            "way" => self.begin_object(ItemKind::Way, attrs, Context::Way, Context::IgnoredWay),
            "relation" => self.begin_object(
                ItemKind::Relation,
                attrs,
                Context::Relation,
                Context::IgnoredRelation,
            ),
            "changeset" => self.begin_object(
                ItemKind::Changeset,
                attrs,
                Context::Changeset,
                Context::IgnoredChangeset,
            ),
            "bounds" => {
                let mut min = Location::UNDEFINED;
                let mut max = Location::UNDEFINED;
                for attr in attrs {
                    match attr.name {
                        "minlon" => min.set_lon(parse_coordinate(&attr.value)),
                        "minlat" => min.set_lat(parse_coordinate(&attr.value)),
                        "maxlon" => max.set_lon(parse_coordinate(&attr.value)),
                        "maxlat" => max.set_lat(parse_coordinate(&attr.value)),
                        _ => {}
                    }
                }
                let mut bounds = crate::osm::Bounds::new();
                bounds.extend(min);
                bounds.extend(max);
                self.header.add_box(bounds);
                Ok(())
            }
            "delete" => {
                self.in_delete_section = true;
                Ok(())
            }
            // create/modify sections and unknown elements open and close
            // without leaving the top context.
            _ => Ok(()),
        }
    }
}

impl XmlHandler for OsmXmlParser {
    fn start_element(&mut self, name: &str, attrs: &[Attribute<'_>]) -> Result<()> {
        match self.context {
            Context::Root => self.root_element(name, attrs),
            Context::Top => self.top_element(name, attrs),
            Context::Node => {
                self.last_context = Context::Node;
                self.context = Context::InObject;
                if name == "tag" {
                    self.get_tag(attrs)?;
                }
                Ok(())
            }
            Context::Way => {
                self.last_context = Context::Way;
                self.context = Context::InObject;
                match name {
                    "nd" => self.get_way_node(attrs),
                    "tag" => self.get_tag(attrs),
                    _ => Ok(()),
                }
            }
            Context::Relation => {
                self.last_context = Context::Relation;
                self.context = Context::InObject;
                match name {
                    "member" => self.get_member(attrs),
                    "tag" => self.get_tag(attrs),
                    _ => Ok(()),
                }
            }
            Context::Changeset => {
                self.last_context = Context::Changeset;
                if name == "discussion" {
                    self.context = Context::Discussion;
                    if !matches!(self.sublist, Some(Sublist::Discussion(_))) {
                        self.finish_sublist()?;
                        if let Some(object) = &self.object {
                            self.sublist = Some(Sublist::Discussion(
                                ChangesetDiscussionBuilder::new(&mut self.buffer, object)?,
                            ));
                        }
                    }
                    Ok(())
                } else {
                    self.context = Context::InObject;
                    if name == "tag" {
                        self.finish_sublist()?;
                        self.get_tag(attrs)?;
                    }
                    Ok(())
                }
            }
            Context::Discussion => {
                if name == "comment" {
                    self.context = Context::Comment;
                    self.get_comment(attrs)?;
                }
                Ok(())
            }
            Context::Comment => {
                if name == "text" {
                    self.context = Context::CommentText;
                }
                Ok(())
            }
            Context::CommentText
            | Context::IgnoredNode
            | Context::IgnoredWay
            | Context::IgnoredRelation
            | Context::IgnoredChangeset => Ok(()),
            Context::InObject => {
                self.in_object_depth += 1;
                Ok(())
            }
        }
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        match self.context {
            Context::Root => Ok(()),
            Context::Top => {
                if name == "osm" || name == "osmChange" {
                    self.mark_header_as_done();
                    self.context = Context::Root;
                } else if name == "delete" {
                    self.in_delete_section = false;
                }
                Ok(())
            }
            Context::Node | Context::Way | Context::Relation | Context::Changeset => {
                self.close_object()
            }
            Context::Discussion => {
                self.context = Context::Changeset;
                Ok(())
            }
            Context::Comment => {
                self.context = Context::Discussion;
                Ok(())
            }
            Context::CommentText => {
                self.context = Context::Comment;
                let text = std::mem::take(&mut self.comment_text);
                if let Some(Sublist::Discussion(discussion)) = &mut self.sublist {
                    discussion.add_comment_text(&mut self.buffer, &text)?;
                }
                Ok(())
            }
            Context::InObject => {
                if self.in_object_depth > 0 {
                    self.in_object_depth -= 1;
                } else {
                    self.context = self.last_context;
                }
                Ok(())
            }
            Context::IgnoredNode => {
                if name == "node" {
                    self.context = Context::Top;
                }
                Ok(())
            }
            Context::IgnoredWay => {
                if name == "way" {
                    self.context = Context::Top;
                }
                Ok(())
            }
            Context::IgnoredRelation => {
                if name == "relation" {
                    self.context = Context::Top;
                }
                Ok(())
            }
            Context::IgnoredChangeset => {
                if name == "changeset" {
                    self.context = Context::Top;
                }
                Ok(())
            }
        }
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if self.context == Context::CommentText {
            self.comment_text.push_str(text);
        } else {
            self.comment_text.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::view::{items, ItemRef};
    use crate::xml::XmlEventSource;

    type StdResult<T, E> = std::result::Result<T, E>;

    fn run_with(
        xml: &str,
        config: ReaderConfig,
    ) -> (
        Option<StdResult<Header, Error>>,
        Vec<StdResult<Buffer, Error>>,
    ) {
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        let (header_tx, header_rx) = crossbeam_channel::bounded(1);
        let mut parser = OsmXmlParser::new(config, out_tx, header_tx);
        let mut source = XmlEventSource::new();
        let result = source
            .feed(xml.as_bytes(), true, &mut parser)
            .and_then(|_| parser.flush_final());
        if let Err(err) = result {
            parser.fail(err);
        }
        drop(parser);
        (header_rx.try_recv().ok(), out_rx.try_iter().collect())
    }

    fn run(xml: &str) -> (Header, Vec<Buffer>) {
        let (header, buffers) = run_with(xml, ReaderConfig::default());
        (
            header.expect("no header").expect("header error"),
            buffers.into_iter().map(|b| b.expect("buffer error")).collect(),
        )
    }

    fn with_item<R>(buffers: &[Buffer], index: usize, f: impl FnOnce(ItemRef<'_>) -> R) -> R {
        let item = buffers
            .iter()
            .flat_map(|b| items(b.committed_bytes()))
            .nth(index)
            .expect("no such item");
        f(item)
    }

    fn kinds_and_ids(buffers: &[Buffer]) -> Vec<(ItemKind, i64)> {
        buffers
            .iter()
            .flat_map(|b| items(b.committed_bytes()))
            .map(|i| (i.kind(), i.id()))
            .collect()
    }

    #[test]
    fn test_minimal_node() {
        let (header, buffers) = run(
            "<osm version=\"0.6\"><node id=\"1\" version=\"1\" lat=\"1.5\" lon=\"2.5\" \
             uid=\"7\" user=\"a\" timestamp=\"2020-01-01T00:00:00Z\"/></osm>",
        );
        assert_eq!(header.version(), "0.6");
        assert_eq!(kinds_and_ids(&buffers), vec![(ItemKind::Node, 1)]);
        with_item(&buffers, 0, |node| {
            assert_eq!(node.version(), 1);
            assert_eq!(node.uid(), 7);
            assert_eq!(node.user(), "a");
            assert!(node.visible());
            assert_eq!(node.timestamp().seconds(), 1_577_836_800);
            assert_eq!(node.location(), Some(Location::new(25_000_000, 15_000_000)));
            assert_eq!(node.tags().count(), 0);
        });
    }

    #[test]
    fn test_way_with_nds_and_tags() {
        let (_, buffers) = run(
            "<osm version=\"0.6\"><way id=\"10\"><nd ref=\"1\"/><nd ref=\"2\"/>\
             <tag k=\"h\" v=\"yes\"/></way></osm>",
        );
        assert_eq!(kinds_and_ids(&buffers), vec![(ItemKind::Way, 10)]);
        with_item(&buffers, 0, |way| {
            let refs: Vec<_> = way.node_refs().collect();
            assert_eq!(refs.len(), 2);
            assert_eq!(refs[0].id, 1);
            assert_eq!(refs[1].id, 2);
            assert!(refs.iter().all(|r| !r.location.is_defined()));

            let tags: Vec<_> = way.tags().collect();
            assert_eq!(tags, vec![("h", "yes")]);

            // Internal layout: user section, then the tag section with a
            // non-empty payload, then two 16-byte node ref records.
            let sections: Vec<_> = way.sections().collect();
            assert_eq!(sections.len(), 2);
            assert_eq!(sections[0].kind, Some(SublistKind::WayNodeList));
            assert_eq!(sections[0].payload.len(), 32);
            assert_eq!(sections[1].kind, Some(SublistKind::TagList));
            assert!(!sections[1].payload.is_empty());
        });
    }

    #[test]
    fn test_relation_with_typed_members() {
        let (_, buffers) = run(
            "<osm version=\"0.6\"><relation id=\"5\">\
             <member type=\"n\" ref=\"1\" role=\"a\"/>\
             <member type=\"w\" ref=\"2\" role=\"\"/>\
             <tag k=\"t\" v=\"v\"/></relation></osm>",
        );
        with_item(&buffers, 0, |relation| {
            let members: Vec<_> = relation.members().collect();
            assert_eq!(members.len(), 2);
            assert_eq!(
                (members[0].kind, members[0].id, members[0].role),
                (ItemKind::Node, 1, "a")
            );
            assert_eq!(
                (members[1].kind, members[1].id, members[1].role),
                (ItemKind::Way, 2, "")
            );
            assert_eq!(relation.tags().count(), 1);
        });
    }

    #[test]
    fn test_member_long_type_names() {
        let (_, buffers) = run(
            "<osm version=\"0.6\"><relation id=\"5\">\
             <member type=\"node\" ref=\"1\" role=\"x\"/>\
             <member type=\"relation\" ref=\"2\" role=\"\"/></relation></osm>",
        );
        with_item(&buffers, 0, |relation| {
            let members: Vec<_> = relation.members().collect();
            assert_eq!(members[0].kind, ItemKind::Node);
            assert_eq!(members[1].kind, ItemKind::Relation);
        });
    }

    #[test]
    fn test_member_schema_violations() {
        let (_, results) = run_with(
            "<osm version=\"0.6\"><relation id=\"5\"><member type=\"x\" ref=\"1\"/></relation></osm>",
            ReaderConfig::default(),
        );
        assert!(matches!(
            results.last(),
            Some(Err(Error::SchemaViolation(_)))
        ));

        let (_, results) = run_with(
            "<osm version=\"0.6\"><relation id=\"5\"><member type=\"n\" role=\"a\"/></relation></osm>",
            ReaderConfig::default(),
        );
        assert!(matches!(
            results.last(),
            Some(Err(Error::SchemaViolation(_)))
        ));
    }

    #[test]
    fn test_osmchange_delete_semantics() {
        let (header, buffers) = run(
            "<osmChange version=\"0.6\"><delete><node id=\"9\" version=\"3\"/></delete>\
             <create><node id=\"10\" version=\"1\"/></create></osmChange>",
        );
        assert!(header.multiple_object_versions());
        assert_eq!(
            kinds_and_ids(&buffers),
            vec![(ItemKind::Node, 9), (ItemKind::Node, 10)]
        );
        with_item(&buffers, 0, |node| assert!(!node.visible()));
        with_item(&buffers, 1, |node| assert!(node.visible()));
    }

    #[test]
    fn test_delete_overrides_visible_attribute() {
        let (_, buffers) = run(
            "<osmChange version=\"0.6\"><delete>\
             <node id=\"9\" version=\"3\" visible=\"true\"/></delete></osmChange>",
        );
        with_item(&buffers, 0, |node| assert!(!node.visible()));
    }

    #[test]
    fn test_changeset_with_discussion() {
        let (_, buffers) = run(
            "<osm version=\"0.6\"><changeset id=\"1\">\
             <discussion><comment date=\"2020-01-01T00:00:00Z\" uid=\"7\" user=\"a\">\
             <text>hi</text></comment></discussion></changeset></osm>",
        );
        assert_eq!(kinds_and_ids(&buffers), vec![(ItemKind::Changeset, 1)]);
        with_item(&buffers, 0, |changeset| {
            let comments: Vec<_> = changeset.comments().collect();
            assert_eq!(comments.len(), 1);
            assert_eq!(comments[0].date.seconds(), 1_577_836_800);
            assert_eq!(comments[0].uid, 7);
            assert_eq!(comments[0].user, "a");
            assert_eq!(comments[0].text, "hi");
        });
    }

    #[test]
    fn test_changeset_tags_after_discussion() {
        let (_, buffers) = run(
            "<osm version=\"0.6\"><changeset id=\"1\" min_lon=\"1.0\" min_lat=\"2.0\" \
             max_lon=\"3.0\" max_lat=\"4.0\" created_at=\"2020-01-01T00:00:00Z\">\
             <tag k=\"comment\" v=\"fix\"/>\
             <discussion><comment date=\"2020-01-02T00:00:00Z\" uid=\"1\" user=\"u\">\
             <text>ok</text></comment></discussion></changeset></osm>",
        );
        with_item(&buffers, 0, |changeset| {
            assert_eq!(changeset.tags().collect::<Vec<_>>(), vec![("comment", "fix")]);
            assert_eq!(changeset.comments().count(), 1);
            let bounds = changeset.bounds().unwrap();
            assert_eq!(bounds.min(), Location::from_degrees(1.0, 2.0));
            assert_eq!(bounds.max(), Location::from_degrees(3.0, 4.0));
        });
    }

    #[test]
    fn test_entity_declaration_rejected_without_output() {
        let (header, results) = run_with(
            "<!DOCTYPE x [<!ENTITY a \"b\">]><osm version=\"0.6\"/>",
            ReaderConfig::default(),
        );
        assert_eq!(header, Some(Err(Error::EntitiesNotSupported)));
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::EntitiesNotSupported)));
    }

    #[test]
    fn test_version_gate() {
        let (header, _) = run_with("<osm version=\"0.5\"/>", ReaderConfig::default());
        assert_eq!(header, Some(Err(Error::FormatVersion("0.5".to_string()))));

        let (header, _) = run_with("<osm/>", ReaderConfig::default());
        assert_eq!(header, Some(Err(Error::FormatVersion(String::new()))));
    }

    #[test]
    fn test_unknown_top_level() {
        let (header, _) = run_with("<something/>", ReaderConfig::default());
        assert_eq!(
            header,
            Some(Err(Error::UnknownTopLevel("something".to_string())))
        );
    }

    #[test]
    fn test_bounds_element_extends_header() {
        let (header, _) = run(
            "<osm version=\"0.6\"><bounds minlon=\"-1.0\" minlat=\"-2.0\" \
             maxlon=\"1.0\" maxlat=\"2.0\"/></osm>",
        );
        assert_eq!(header.boxes().len(), 1);
        assert_eq!(header.boxes()[0].min(), Location::from_degrees(-1.0, -2.0));
        assert_eq!(header.boxes()[0].max(), Location::from_degrees(1.0, 2.0));
    }

    #[test]
    fn test_read_filter_restricts_to_source_order_subsequence() {
        let xml = "<osm version=\"0.6\">\
                   <node id=\"1\"/><way id=\"2\"/><node id=\"3\"/>\
                   <relation id=\"4\"><member type=\"n\" ref=\"1\" role=\"\"/></relation>\
                   <changeset id=\"5\"/><way id=\"6\"/></osm>";

        let (_, buffers) = run_with(
            xml,
            ReaderConfig {
                read_types: EntityFilter::NODES | EntityFilter::WAYS,
                ..ReaderConfig::default()
            },
        );
        let buffers: Vec<_> = buffers.into_iter().map(|b| b.unwrap()).collect();
        assert_eq!(
            kinds_and_ids(&buffers),
            vec![
                (ItemKind::Node, 1),
                (ItemKind::Way, 2),
                (ItemKind::Node, 3),
                (ItemKind::Way, 6),
            ]
        );
    }

    #[test]
    fn test_empty_filter_produces_only_header() {
        let (header, results) = run_with(
            "<osm version=\"0.6\"><node id=\"1\"/><way id=\"2\"/></osm>",
            ReaderConfig {
                read_types: EntityFilter::NOTHING,
                ..ReaderConfig::default()
            },
        );
        assert!(matches!(header, Some(Ok(_))));
        assert!(results.is_empty());
    }

    #[test]
    fn test_locale_independent_coordinates() {
        let (_, buffers) = run("<osm version=\"0.6\"><node id=\"1\" lon=\"1,5\" lat=\"2\"/></osm>");
        with_item(&buffers, 0, |node| {
            // C-locale semantics: "1,5" parses as 1.0, never 1.5.
            assert_eq!(node.location(), Some(Location::new(10_000_000, 20_000_000)));
        });
    }

    #[test]
    fn test_unknown_children_are_tolerated() {
        let (_, buffers) = run(
            "<osm version=\"0.6\"><node id=\"1\"><extension><data/></extension>\
             <tag k=\"a\" v=\"b\"/></node></osm>",
        );
        with_item(&buffers, 0, |node| {
            assert_eq!(node.tags().collect::<Vec<_>>(), vec![("a", "b")]);
        });
    }

    #[test]
    fn test_flush_policy() {
        let mut xml = String::from("<osm version=\"0.6\">");
        for i in 1..=100 {
            xml.push_str(&format!("<node id=\"{i}\"/>"));
        }
        xml.push_str("</osm>");

        let config = ReaderConfig::with_capacity(1024);
        let threshold = config.flush_threshold;
        let (_, buffers) = run_with(&xml, config);
        let buffers: Vec<_> = buffers.into_iter().map(|b| b.unwrap()).collect();

        assert!(buffers.len() > 1);
        // Every buffer but the last was flushed because it crossed the
        // threshold; all buffers stay within capacity.
        for buffer in &buffers[..buffers.len() - 1] {
            assert!(buffer.committed() > threshold);
            assert!(buffer.committed() <= buffer.capacity());
        }
        // All items arrive, in order.
        let ids: Vec<_> = kinds_and_ids(&buffers).iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, (1..=100).collect::<Vec<i64>>());

        let total: usize = buffers.iter().map(|b| b.committed()).sum();
        let expected = total.div_ceil(threshold);
        assert!((buffers.len() as i64 - expected as i64).abs() <= 1);
    }

    #[test]
    fn test_header_fires_on_first_entity() {
        let (out_tx, _out_rx) = crossbeam_channel::unbounded();
        let (header_tx, header_rx) = crossbeam_channel::bounded(1);
        let mut parser = OsmXmlParser::new(ReaderConfig::default(), out_tx, header_tx);
        let mut source = XmlEventSource::new();

        source
            .feed(b"<osm version=\"0.6\" generator=\"test\">", false, &mut parser)
            .unwrap();
        assert!(header_rx.try_recv().is_err());

        source.feed(b"<node id=\"1\"/>", false, &mut parser).unwrap();
        let header = header_rx.try_recv().unwrap().unwrap();
        assert_eq!(header.generator(), "test");

        // Header is one-shot; closing the root must not send again.
        source.feed(b"</osm>", true, &mut parser).unwrap();
        assert!(header_rx.try_recv().is_err());
    }

    #[test]
    fn test_comment_text_with_entities_and_whitespace() {
        let (_, buffers) = run(
            "<osm version=\"0.6\"><changeset id=\"1\">\n  <discussion>\n    \
             <comment date=\"2020-01-01T00:00:00Z\" uid=\"7\" user=\"a\">\n      \
             <text>a &amp; b</text>\n    </comment>\n  </discussion>\n</changeset></osm>",
        );
        with_item(&buffers, 0, |changeset| {
            let comments: Vec<_> = changeset.comments().collect();
            assert_eq!(comments[0].text, "a & b");
        });
    }
}
