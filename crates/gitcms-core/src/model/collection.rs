//! Collection catalogue

use crate::errors::{CmsError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structural shape of a collection file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionShape {
    /// A JSON array of records keyed by `id`
    Array,
    /// A single JSON object that always exists
    Singleton,
}

/// Identifies which collection file an edit targets
///
/// Ordering is the declaration order; it fixes the order in which
/// collections are fetched and written within an attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    Videos,
    BuildOrders,
    Replays,
    Masterclasses,
    Coaches,
    Events,
    About,
    Sponsorships,
}

impl CollectionKind {
    /// The media collection other collections point into
    pub const MEDIA: CollectionKind = CollectionKind::Videos;

    /// Array-valued field holding identifiers of media records
    pub const REFERENCE_FIELD: &'static str = "videoIds";

    const ALL: [CollectionKind; 8] = [
        CollectionKind::Videos,
        CollectionKind::BuildOrders,
        CollectionKind::Replays,
        CollectionKind::Masterclasses,
        CollectionKind::Coaches,
        CollectionKind::Events,
        CollectionKind::About,
        CollectionKind::Sponsorships,
    ];

    pub fn all() -> &'static [CollectionKind] {
        &Self::ALL
    }

    /// Wire tag, as used in batch requests
    pub fn tag(self) -> &'static str {
        match self {
            CollectionKind::Videos => "videos",
            CollectionKind::BuildOrders => "build-orders",
            CollectionKind::Replays => "replays",
            CollectionKind::Masterclasses => "masterclasses",
            CollectionKind::Coaches => "coaches",
            CollectionKind::Events => "events",
            CollectionKind::About => "about",
            CollectionKind::Sponsorships => "sponsorships",
        }
    }

    /// Path of the collection file inside the repository
    pub fn path(self) -> &'static str {
        match self {
            CollectionKind::Videos => "data/videos.json",
            CollectionKind::BuildOrders => "data/build-orders.json",
            CollectionKind::Replays => "data/replays.json",
            CollectionKind::Masterclasses => "data/masterclasses.json",
            CollectionKind::Coaches => "data/coaches.json",
            CollectionKind::Events => "data/events.json",
            CollectionKind::About => "data/about.json",
            CollectionKind::Sponsorships => "data/sponsorships.json",
        }
    }

    pub fn shape(self) -> CollectionShape {
        match self {
            CollectionKind::About | CollectionKind::Sponsorships => CollectionShape::Singleton,
            _ => CollectionShape::Array,
        }
    }

    pub fn is_singleton(self) -> bool {
        self.shape() == CollectionShape::Singleton
    }

    /// Whether records of this collection carry a `videoIds` reference list
    pub fn references_media(self) -> bool {
        matches!(
            self,
            CollectionKind::BuildOrders | CollectionKind::Replays | CollectionKind::Masterclasses
        )
    }

    /// Every collection holding references into [`CollectionKind::MEDIA`]
    pub fn media_referrers() -> impl Iterator<Item = CollectionKind> {
        Self::ALL.into_iter().filter(|k| k.references_media())
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CollectionKind {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.tag() == s)
            .ok_or_else(|| {
                CmsError::new(ErrorKind::ValidationFailed)
                    .with_op("parse_collection")
                    .with_message(format!("Unknown collection '{}'", s))
            })
    }
}
