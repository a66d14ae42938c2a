//! Identifier and capacity newtypes shared across the crate.

use nutype::nutype;
use uuid::Uuid;

/// Unique identifier of a declared route.
#[nutype(
    derive(Clone, Debug, Display, Hash, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |s: &str| !s.is_empty()),
)]
pub struct RouteId(String);

/// Priority of a route within the route table. Lower values are scanned
/// first during matching.
#[nutype(derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    From,
    AsRef
))]
pub struct RouteOrder(i32);

/// Sort key for a filter within a composed chain. Lower values run their
/// pre-phase earlier and their post-phase later.
#[nutype(derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    From,
    AsRef
))]
pub struct FilterOrder(i32);

/// Upper bound on bytes buffered by the default body write handler.
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |size: &usize| *size > 0),
)]
pub struct BodyCapacity(usize);

/// Default cap for in-memory body materialization.
pub const DEFAULT_BODY_CAPACITY_BYTES: usize = 10 * 1024 * 1024;

impl Default for BodyCapacity {
    fn default() -> Self {
        Self::try_new(DEFAULT_BODY_CAPACITY_BYTES).expect("10MiB is valid")
    }
}

/// Request ID correlating log lines and observer events for one exchange.
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |id: &Uuid| id.get_version_num() == 7),
)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new RequestId with a v7 UUID.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("now_v7 always produces a v7 UUID")
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}
