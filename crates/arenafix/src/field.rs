//! Field nodes and the bucketed store backing every group instance.
//!
//! Fields live in a per-message slab; a deleted field is unlinked from its
//! bucket chain but its slot is never reused; the slab dies with the
//! message, the same way the original arena never reclaims individual
//! nodes. Bucket heads live in [`GroupStore`]s, which the parser pools and
//! recycles across messages.

use crate::arena::Region;
use crate::utils;
use smallvec::SmallVec;

/// Bucket count of every field store. Tag `T` chains in bucket `T % BUCKETS`.
pub(crate) const BUCKETS: usize = 64;

pub(crate) type FieldId = u32;

/// Handle to one repeating-group instance inside a [`Message`].
///
/// [`GroupId::ROOT`] addresses the message's top-level fields; handles for
/// nested instances come from [`Message::add_group`] and [`Message::group`].
/// A handle stays valid until its instance is deleted.
///
/// [`Message`]: crate::Message
/// [`Message::add_group`]: crate::Message::add_group
/// [`Message::group`]: crate::Message::group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    /// The top level of a message.
    pub const ROOT: GroupId = GroupId(0);
}

#[derive(Debug)]
pub(crate) enum FieldKind {
    /// Raw bytes owned by the message arena.
    Value(Region),
    /// Ordered group instances, addressed through the message registry.
    Group(SmallVec<[GroupId; 4]>),
}

#[derive(Debug)]
pub(crate) struct Field {
    pub(crate) tag: u32,
    /// This field's contribution to the message `BodyLength`.
    pub(crate) body_len: u32,
    pub(crate) kind: FieldKind,
    pub(crate) next: Option<FieldId>,
}

/// Bucketed chain heads for one group instance (or the message root).
#[derive(Debug)]
pub(crate) struct GroupStore {
    buckets: [Option<FieldId>; BUCKETS],
}

impl Default for GroupStore {
    fn default() -> Self {
        GroupStore {
            buckets: [None; BUCKETS],
        }
    }
}

impl GroupStore {
    pub(crate) fn head(&self, tag: u32) -> Option<FieldId> {
        self.buckets[tag as usize % BUCKETS]
    }

    pub(crate) fn set_head(&mut self, tag: u32, id: Option<FieldId>) {
        self.buckets[tag as usize % BUCKETS] = id;
    }

    pub(crate) fn heads(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.buckets.iter().filter_map(|h| *h)
    }

    pub(crate) fn clear(&mut self) {
        self.buckets = [None; BUCKETS];
    }
}

/// `BeginString`, `BodyLength`, and `CheckSum` never count toward the body.
pub(crate) fn is_anchor(tag: u32) -> bool {
    matches!(tag, crate::tags::BEGIN_STRING | crate::tags::BODY_LENGTH | crate::tags::CHECK_SUM)
}

/// `tag=` + value + separator, zero for the anchor fields.
pub(crate) fn value_contribution(tag: u32, len: usize) -> u32 {
    if is_anchor(tag) {
        0
    } else {
        utils::digits(tag) + 1 + len as u32 + 1
    }
}

/// `tag=` + instance count + separator.
pub(crate) fn group_contribution(tag: u32, count: usize) -> u32 {
    utils::digits(tag) + 1 + utils::digits(count as u32) + 1
}
