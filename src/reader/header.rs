//! File-level header of an OSM XML stream.

use crate::osm::Bounds;

/// Metadata gathered from the root element and its `bounds` children.
///
/// Delivered exactly once per stream through the header channel: on the
/// first top-level entity, or when the root element closes, whichever
/// comes first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    version: String,
    generator: String,
    boxes: Vec<Bounds>,
    multiple_object_versions: bool,
}

impl Header {
    pub fn new() -> Self {
        Header::default()
    }

    /// Format version from the root element; empty until parsed.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
    }

    /// Producing software, from the `generator` attribute.
    pub fn generator(&self) -> &str {
        &self.generator
    }

    pub fn set_generator(&mut self, generator: &str) {
        self.generator = generator.to_string();
    }

    /// Bounding boxes from `bounds` elements, in source order.
    pub fn boxes(&self) -> &[Bounds] {
        &self.boxes
    }

    pub fn add_box(&mut self, bounds: Bounds) {
        self.boxes.push(bounds);
    }

    /// True for change files, which may contain several versions of the
    /// same object.
    pub fn multiple_object_versions(&self) -> bool {
        self.multiple_object_versions
    }

    pub fn set_multiple_object_versions(&mut self, value: bool) {
        self.multiple_object_versions = value;
    }
}
