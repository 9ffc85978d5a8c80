//! OSM domain model: locations, bounds, timestamps, ids and entity kinds.

pub mod location;
pub mod timestamp;
pub mod types;

pub use location::{Bounds, Location};
pub use timestamp::Timestamp;
pub use types::{
    area_id_from_object, parse_coordinate, ChangesetId, ItemKind, ObjectId, UserId, VersionNum,
};
