//! The message object: an arena-backed field tree with typed accessors.
//!
//! Every mutation keeps the running `BodyLength` in sync, so serialization
//! never has to walk the tree twice. Group instances are addressed through
//! [`GroupId`] handles registered on the message; the handle for the top
//! level is [`GroupId::ROOT`], mirroring the original API where a null group
//! pointer meant "the message itself".

use crate::arena::{Arena, Pools};
use crate::error::{FixError, Result};
use crate::field::{self, Field, FieldId, FieldKind, GroupId, GroupStore};
use crate::tags;
use crate::utils;
use arenafix_dictionary::{FieldCategory, FieldTable, FixVersion, MsgDescr};
use smallvec::smallvec;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// A FIX message owned by a [`Parser`](crate::Parser).
///
/// Dropping the message returns its pages and group stores to the parser
/// pools in O(1) list splices.
#[derive(Debug)]
pub struct Message {
    pub(crate) shared: Rc<RefCell<Pools>>,
    pub(crate) descr: Arc<MsgDescr>,
    pub(crate) version: FixVersion,
    pub(crate) arena: Arena,
    pub(crate) fields: Vec<Field>,
    pub(crate) groups: Vec<Option<Box<GroupStore>>>,
    /// `(parent handle, group tag)` per registered instance; the root entry
    /// is a sentinel.
    pub(crate) groups_meta: Vec<(GroupId, u32)>,
    pub(crate) body_len: u32,
}

impl Message {
    pub(crate) fn new(
        shared: Rc<RefCell<Pools>>,
        descr: Arc<MsgDescr>,
        version: FixVersion,
    ) -> Result<Message> {
        let root = shared.borrow_mut().acquire_group()?;
        let mut msg = Message {
            shared,
            descr: Arc::clone(&descr),
            version,
            arena: Arena::default(),
            fields: Vec::new(),
            groups: vec![Some(root)],
            groups_meta: vec![(GroupId::ROOT, 0)],
            body_len: 0,
        };
        msg.set_raw(
            GroupId::ROOT,
            tags::BEGIN_STRING,
            version.transport_begin_string().as_bytes(),
        )?;
        msg.set_raw(GroupId::ROOT, tags::MSG_TYPE, descr.msg_type().as_bytes())?;
        Ok(msg)
    }

    /// The descriptor this message was built against.
    #[must_use]
    pub fn descr(&self) -> &Arc<MsgDescr> {
        &self.descr
    }

    /// The `MsgType` token of this message.
    #[must_use]
    pub fn msg_type(&self) -> &str {
        self.descr.msg_type()
    }

    /// The running `BodyLength` of this message.
    #[must_use]
    pub fn body_len(&self) -> u32 {
        self.body_len
    }

    // ------------------------------------------------------------------
    // Typed setters
    // ------------------------------------------------------------------

    /// Stores raw bytes under `tag` within the group instance `grp`.
    ///
    /// An existing value field is overwritten in place; a tag the governing
    /// descriptor does not know fails with `UnknownField`, a group tag with
    /// `FieldHasWrongType`.
    pub fn set_raw(&mut self, grp: GroupId, tag: u32, value: &[u8]) -> Result<()> {
        let result = self.set_raw_inner(grp, tag, value);
        self.record(result)
    }

    /// Stores a string value.
    pub fn set_string(&mut self, grp: GroupId, tag: u32, value: &str) -> Result<()> {
        self.set_raw(grp, tag, value.as_bytes())
    }

    /// Stores a single ASCII character.
    pub fn set_char(&mut self, grp: GroupId, tag: u32, value: char) -> Result<()> {
        if !value.is_ascii() {
            let err = FixError::InvalidArgument("char fields hold a single ASCII byte".into());
            return self.record(Err(err));
        }
        self.set_raw(grp, tag, &[value as u8])
    }

    /// Stores an integer in shortest-decimal form.
    pub fn set_i32(&mut self, grp: GroupId, tag: u32, value: i32) -> Result<()> {
        self.set_i64(grp, tag, i64::from(value))
    }

    /// Stores an integer in shortest-decimal form.
    pub fn set_i64(&mut self, grp: GroupId, tag: u32, value: i64) -> Result<()> {
        let mut buf = [0u8; utils::I64_WIDTH];
        let rendered = utils::fmt_i64(value, &mut buf);
        self.set_raw(grp, tag, rendered)
    }

    /// Stores a float in plain decimal with trailing zeros trimmed.
    pub fn set_f64(&mut self, grp: GroupId, tag: u32, value: f64) -> Result<()> {
        let mut buf = [0u8; utils::F64_WIDTH];
        let len = utils::fmt_f64(value, &mut buf).len();
        self.set_raw(grp, tag, &buf[..len])
    }

    // ------------------------------------------------------------------
    // Typed getters
    // ------------------------------------------------------------------

    /// The raw bytes stored under `tag` in the group instance `grp`.
    pub fn get_raw(&self, grp: GroupId, tag: u32) -> Result<&[u8]> {
        let result = self.get_raw_inner(grp, tag);
        self.record(result)
    }

    /// The stored bytes as UTF-8 text.
    pub fn get_str(&self, grp: GroupId, tag: u32) -> Result<&str> {
        let raw = self.get_raw(grp, tag)?;
        let result = std::str::from_utf8(raw)
            .map_err(|_| FixError::InvalidArgument("field value is not valid UTF-8".into()));
        self.record(result)
    }

    /// The stored bytes parsed as a decimal integer.
    pub fn get_i64(&self, grp: GroupId, tag: u32) -> Result<i64> {
        let raw = self.get_raw(grp, tag)?;
        let result = match utils::ascii_to_i64(raw, 0) {
            Some((value, consumed)) if consumed == raw.len() => Ok(value),
            _ => Err(FixError::WrongField(
                format!("field {tag} does not hold an integer").into(),
            )),
        };
        self.record(result)
    }

    /// The stored bytes parsed as a decimal integer, narrowed to 32 bits.
    pub fn get_i32(&self, grp: GroupId, tag: u32) -> Result<i32> {
        let wide = self.get_i64(grp, tag)?;
        let result = i32::try_from(wide).map_err(|_| {
            FixError::WrongField(format!("field {tag} overflows a 32-bit integer").into())
        });
        self.record(result)
    }

    /// The stored bytes parsed as a decimal number.
    pub fn get_f64(&self, grp: GroupId, tag: u32) -> Result<f64> {
        let text = self.get_str(grp, tag)?;
        let result = text.parse::<f64>().map_err(|_| {
            FixError::WrongField(format!("field {tag} does not hold a number").into())
        });
        self.record(result)
    }

    /// The stored byte as a character.
    pub fn get_char(&self, grp: GroupId, tag: u32) -> Result<char> {
        let raw = self.get_raw(grp, tag)?;
        let result = match raw {
            [b] => Ok(*b as char),
            _ => Err(FixError::WrongField(
                format!("field {tag} does not hold a single char").into(),
            )),
        };
        self.record(result)
    }

    // ------------------------------------------------------------------
    // Field and group removal, group handles
    // ------------------------------------------------------------------

    /// Unlinks `tag` from the group instance `grp`, recursively releasing
    /// group instances when the field heads a repeating group.
    pub fn del_field(&mut self, grp: GroupId, tag: u32) -> Result<()> {
        let result = self.del_field_inner(grp, tag);
        self.record(result)
    }

    /// Appends a fresh instance to the repeating group `tag`, creating the
    /// group field on first use. Returns the handle of the new instance.
    pub fn add_group(&mut self, grp: GroupId, tag: u32) -> Result<GroupId> {
        let result = self.add_group_inner(grp, tag);
        self.record(result)
    }

    /// The handle of instance `index` of the repeating group `tag`.
    pub fn group(&self, grp: GroupId, tag: u32, index: usize) -> Result<GroupId> {
        let result = self.group_inner(grp, tag, index);
        self.record(result)
    }

    /// The instance count of the repeating group `tag`.
    pub fn group_count(&self, grp: GroupId, tag: u32) -> Result<usize> {
        let result = self.group_count_inner(grp, tag);
        self.record(result)
    }

    /// Releases instance `index` of the repeating group `tag`, shifting the
    /// tail left. Deleting the last instance deletes the field.
    pub fn del_group(&mut self, grp: GroupId, tag: u32, index: usize) -> Result<()> {
        let result = self.del_group_inner(grp, tag, index);
        self.record(result)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.shared.borrow_mut().set_error(err);
        }
        result
    }

    fn check_handle(&self, grp: GroupId) -> Result<()> {
        match self.groups.get(grp.0 as usize) {
            Some(Some(_)) => Ok(()),
            _ => Err(FixError::InvalidArgument(
                "group handle addresses a released instance".into(),
            )),
        }
    }

    /// The descriptor table governing the group instance `grp`.
    pub(crate) fn table_of(&self, grp: GroupId) -> Result<&FieldTable> {
        self.check_handle(grp)?;
        if grp == GroupId::ROOT {
            return Ok(self.descr.fields());
        }
        let (parent, tag) = self.groups_meta[grp.0 as usize];
        let parent_table = self.table_of(parent)?;
        parent_table
            .get(tag)
            .and_then(|d| d.nested())
            .ok_or_else(|| {
                FixError::UnknownField(format!("tag {tag} heads no group here").into())
            })
    }

    pub(crate) fn find_in(&self, grp: GroupId, tag: u32) -> Option<FieldId> {
        let store = self.groups.get(grp.0 as usize)?.as_ref()?;
        let mut cursor = store.head(tag);
        while let Some(id) = cursor {
            let node = &self.fields[id as usize];
            if node.tag == tag {
                return Some(id);
            }
            cursor = node.next;
        }
        None
    }

    fn resolve_descr(&self, grp: GroupId, tag: u32) -> Result<FieldCategory> {
        let table = self.table_of(grp)?;
        let descr = table.get(tag).ok_or_else(|| {
            FixError::UnknownField(
                format!(
                    "tag {tag} not defined for message '{}' in this context",
                    self.descr.name()
                )
                .into(),
            )
        })?;
        Ok(descr.category())
    }

    fn set_raw_inner(&mut self, grp: GroupId, tag: u32, value: &[u8]) -> Result<()> {
        if self.resolve_descr(grp, tag)? == FieldCategory::Group {
            return Err(FixError::FieldHasWrongType { tag });
        }
        let contribution = field::value_contribution(tag, value.len());
        match self.find_in(grp, tag) {
            Some(id) => {
                let region = match &self.fields[id as usize].kind {
                    FieldKind::Value(region) => *region,
                    FieldKind::Group(_) => return Err(FixError::FieldHasWrongType { tag }),
                };
                let mut pools = self.shared.borrow_mut();
                let region = self.arena.overwrite(&mut pools, region, value)?;
                drop(pools);
                let node = &mut self.fields[id as usize];
                self.body_len = self.body_len - node.body_len + contribution;
                node.body_len = contribution;
                node.kind = FieldKind::Value(region);
            }
            None => {
                let mut pools = self.shared.borrow_mut();
                let region = self.arena.alloc(&mut pools, value)?;
                drop(pools);
                let id = self.fields.len() as FieldId;
                let store = self.store_mut(grp)?;
                let next = store.head(tag);
                store.set_head(tag, Some(id));
                self.fields.push(Field {
                    tag,
                    body_len: contribution,
                    kind: FieldKind::Value(region),
                    next,
                });
                self.body_len += contribution;
            }
        }
        Ok(())
    }

    fn get_raw_inner(&self, grp: GroupId, tag: u32) -> Result<&[u8]> {
        self.check_handle(grp)?;
        let id = self
            .find_in(grp, tag)
            .ok_or(FixError::FieldNotFound { tag })?;
        match &self.fields[id as usize].kind {
            FieldKind::Value(region) => Ok(self.arena.bytes(*region)),
            FieldKind::Group(_) => Err(FixError::FieldHasWrongType { tag }),
        }
    }

    fn del_field_inner(&mut self, grp: GroupId, tag: u32) -> Result<()> {
        self.check_handle(grp)?;
        let head = self.store_mut(grp)?.head(tag);
        let mut prev: Option<FieldId> = None;
        let mut cursor = head;
        while let Some(id) = cursor {
            let (node_tag, next) = {
                let node = &self.fields[id as usize];
                (node.tag, node.next)
            };
            if node_tag == tag {
                self.free_field(id);
                match prev {
                    None => self.store_mut(grp)?.set_head(tag, next),
                    Some(prev_id) => self.fields[prev_id as usize].next = next,
                }
                return Ok(());
            }
            prev = cursor;
            cursor = next;
        }
        Err(FixError::FieldNotFound { tag })
    }

    fn add_group_inner(&mut self, grp: GroupId, tag: u32) -> Result<GroupId> {
        if self.resolve_descr(grp, tag)? != FieldCategory::Group {
            return Err(FixError::FieldHasWrongType { tag });
        }
        let existing = self.find_in(grp, tag);
        let store = self.shared.borrow_mut().acquire_group()?;
        let gid = GroupId(self.groups.len() as u32);
        self.groups.push(Some(store));
        self.groups_meta.push((grp, tag));
        match existing {
            Some(id) => {
                let count = match &mut self.fields[id as usize].kind {
                    FieldKind::Group(instances) => {
                        instances.push(gid);
                        instances.len()
                    }
                    FieldKind::Value(_) => {
                        // Roll the registry back before reporting the clash.
                        if let Some(store) = self.groups.pop().flatten() {
                            self.shared.borrow_mut().release_group(store);
                        }
                        self.groups_meta.pop();
                        return Err(FixError::FieldHasWrongType { tag });
                    }
                };
                let contribution = field::group_contribution(tag, count);
                let node = &mut self.fields[id as usize];
                self.body_len = self.body_len - node.body_len + contribution;
                node.body_len = contribution;
            }
            None => {
                let contribution = field::group_contribution(tag, 1);
                let id = self.fields.len() as FieldId;
                let store = self.store_mut(grp)?;
                let next = store.head(tag);
                store.set_head(tag, Some(id));
                self.fields.push(Field {
                    tag,
                    body_len: contribution,
                    kind: FieldKind::Group(smallvec![gid]),
                    next,
                });
                self.body_len += contribution;
            }
        }
        Ok(gid)
    }

    fn group_inner(&self, grp: GroupId, tag: u32, index: usize) -> Result<GroupId> {
        self.check_handle(grp)?;
        let id = self
            .find_in(grp, tag)
            .ok_or(FixError::FieldNotFound { tag })?;
        match &self.fields[id as usize].kind {
            FieldKind::Group(instances) => instances
                .get(index)
                .copied()
                .ok_or(FixError::GroupWrongIndex { tag, index }),
            FieldKind::Value(_) => Err(FixError::FieldHasWrongType { tag }),
        }
    }

    fn group_count_inner(&self, grp: GroupId, tag: u32) -> Result<usize> {
        self.check_handle(grp)?;
        let id = self
            .find_in(grp, tag)
            .ok_or(FixError::FieldNotFound { tag })?;
        match &self.fields[id as usize].kind {
            FieldKind::Group(instances) => Ok(instances.len()),
            FieldKind::Value(_) => Err(FixError::FieldHasWrongType { tag }),
        }
    }

    fn del_group_inner(&mut self, grp: GroupId, tag: u32, index: usize) -> Result<()> {
        self.check_handle(grp)?;
        let id = self
            .find_in(grp, tag)
            .ok_or(FixError::FieldNotFound { tag })?;
        let (victim, remaining) = match &mut self.fields[id as usize].kind {
            FieldKind::Group(instances) => {
                if index >= instances.len() {
                    return Err(FixError::GroupWrongIndex { tag, index });
                }
                let victim = instances.remove(index);
                (victim, instances.len())
            }
            FieldKind::Value(_) => return Err(FixError::FieldHasWrongType { tag }),
        };
        self.free_group_instance(victim);
        if remaining == 0 {
            // The released instance is already gone from the registry, so
            // the recursive free inside del touches nothing twice.
            self.del_field_inner(grp, tag)
        } else {
            let contribution = field::group_contribution(tag, remaining);
            let node = &mut self.fields[id as usize];
            self.body_len = self.body_len - node.body_len + contribution;
            node.body_len = contribution;
            Ok(())
        }
    }

    fn store_mut(&mut self, grp: GroupId) -> Result<&mut GroupStore> {
        match self.groups.get_mut(grp.0 as usize) {
            Some(Some(store)) => Ok(store),
            _ => Err(FixError::InvalidArgument(
                "group handle addresses a released instance".into(),
            )),
        }
    }

    /// Subtracts the field's body-length contribution and releases every
    /// group instance it owns. The slab slot itself is left in place.
    fn free_field(&mut self, id: FieldId) {
        let instances = match &self.fields[id as usize].kind {
            FieldKind::Value(_) => None,
            FieldKind::Group(instances) => Some(instances.clone()),
        };
        if let Some(instances) = instances {
            for gid in instances {
                self.free_group_instance(gid);
            }
        }
        self.body_len -= self.fields[id as usize].body_len;
    }

    fn free_group_instance(&mut self, gid: GroupId) {
        let Some(store) = self.groups[gid.0 as usize].take() else {
            return;
        };
        let heads: Vec<FieldId> = store.heads().collect();
        for head in heads {
            let mut cursor = Some(head);
            while let Some(id) = cursor {
                let next = self.fields[id as usize].next;
                self.free_field(id);
                cursor = next;
            }
        }
        self.shared.borrow_mut().release_group(store);
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        let mut pools = self.shared.borrow_mut();
        for slot in &mut self.groups {
            if let Some(store) = slot.take() {
                pools.release_group(store);
            }
        }
        self.arena.release_into(&mut pools);
    }
}

#[cfg(test)]
mod tests {
    use crate::error::FixError;
    use crate::field::GroupId;
    use crate::testutil;

    const ROOT: GroupId = GroupId::ROOT;

    #[test]
    fn creation_presets_begin_string_and_msg_type() {
        let parser = testutil::parser_default();
        let msg = parser.create_msg("D").unwrap();
        assert_eq!(msg.get_raw(ROOT, 8).unwrap(), b"FIX.4.4");
        assert_eq!(msg.get_str(ROOT, 35).unwrap(), "D");
        // BeginString contributes nothing; "35=D|" contributes 5.
        assert_eq!(msg.body_len(), 5);
    }

    #[test]
    fn body_len_tracks_every_mutation() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("D").unwrap();
        let base = msg.body_len();

        // "55=AAA|" contributes 2 + 1 + 3 + 1.
        msg.set_string(ROOT, 55, "AAA").unwrap();
        assert_eq!(msg.body_len(), base + 7);

        // Overwrite with a shorter value shrinks the contribution.
        msg.set_string(ROOT, 55, "A").unwrap();
        assert_eq!(msg.body_len(), base + 5);

        // "38=100|" adds 2 + 1 + 3 + 1 on top.
        msg.set_i64(ROOT, 38, 100).unwrap();
        assert_eq!(msg.body_len(), base + 5 + 7);

        msg.del_field(ROOT, 38).unwrap();
        msg.del_field(ROOT, 55).unwrap();
        assert_eq!(msg.body_len(), base);
    }

    #[test]
    fn anchor_fields_contribute_zero() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("D").unwrap();
        let before = msg.body_len();
        msg.set_i64(ROOT, 9, 142).unwrap();
        msg.set_raw(ROOT, 10, b"000").unwrap();
        assert_eq!(msg.body_len(), before);
    }

    #[test]
    fn typed_round_trips() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("D").unwrap();
        msg.set_i64(ROOT, 38, 100).unwrap();
        msg.set_f64(ROOT, 44, 50.5).unwrap();
        msg.set_char(ROOT, 54, '1').unwrap();
        msg.set_string(ROOT, 11, "CL1").unwrap();
        assert_eq!(msg.get_i64(ROOT, 38).unwrap(), 100);
        assert_eq!(msg.get_i32(ROOT, 38).unwrap(), 100);
        assert_eq!(msg.get_f64(ROOT, 44).unwrap(), 50.5);
        assert_eq!(msg.get_char(ROOT, 54).unwrap(), '1');
        assert_eq!(msg.get_str(ROOT, 11).unwrap(), "CL1");
        assert_eq!(msg.get_raw(ROOT, 44).unwrap(), b"50.5");
    }

    #[test]
    fn unknown_tags_are_rejected_by_setters() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("D").unwrap();
        assert!(matches!(
            msg.set_string(ROOT, 9999, "x"),
            Err(FixError::UnknownField(_))
        ));
        // Tag 262 belongs to "W", not "D".
        assert!(matches!(
            msg.set_string(ROOT, 262, "x"),
            Err(FixError::UnknownField(_))
        ));
    }

    #[test]
    fn kind_mismatches_are_rejected() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("W").unwrap();
        // 268 heads a group: value writes must fail.
        assert!(matches!(
            msg.set_string(ROOT, 268, "2"),
            Err(FixError::FieldHasWrongType { tag: 268 })
        ));
        // 262 holds a value: group adds must fail.
        assert!(matches!(
            msg.add_group(ROOT, 262),
            Err(FixError::FieldHasWrongType { tag: 262 })
        ));
    }

    #[test]
    fn missing_fields_report_not_found() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("D").unwrap();
        assert!(matches!(
            msg.get_raw(ROOT, 55),
            Err(FixError::FieldNotFound { tag: 55 })
        ));
        assert!(matches!(
            msg.del_field(ROOT, 55),
            Err(FixError::FieldNotFound { tag: 55 })
        ));
    }

    #[test]
    fn colliding_tags_share_a_bucket_without_clashes() {
        // 11 and 75 are congruent modulo the bucket count.
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("D").unwrap();
        msg.set_string(ROOT, 11, "CL1").unwrap();
        msg.set_string(ROOT, 75, "20240101").unwrap();
        assert_eq!(msg.get_str(ROOT, 11).unwrap(), "CL1");
        assert_eq!(msg.get_str(ROOT, 75).unwrap(), "20240101");
        msg.del_field(ROOT, 75).unwrap();
        assert_eq!(msg.get_str(ROOT, 11).unwrap(), "CL1");
        // Updates in place: no duplicate node for tag 11.
        msg.set_string(ROOT, 11, "CL2").unwrap();
        assert_eq!(msg.get_str(ROOT, 11).unwrap(), "CL2");
    }

    #[test]
    fn groups_grow_shift_and_collapse() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("W").unwrap();
        let g0 = msg.add_group(ROOT, 268).unwrap();
        let g1 = msg.add_group(ROOT, 268).unwrap();
        let g2 = msg.add_group(ROOT, 268).unwrap();
        msg.set_char(g0, 269, '0').unwrap();
        msg.set_char(g1, 269, '1').unwrap();
        msg.set_char(g2, 269, '2').unwrap();
        assert_eq!(msg.group_count(ROOT, 268).unwrap(), 3);

        // Deleting the middle instance shifts the tail left.
        msg.del_group(ROOT, 268, 1).unwrap();
        assert_eq!(msg.group_count(ROOT, 268).unwrap(), 2);
        let now1 = msg.group(ROOT, 268, 1).unwrap();
        assert_eq!(msg.get_char(now1, 269).unwrap(), '2');

        assert!(matches!(
            msg.group(ROOT, 268, 2),
            Err(FixError::GroupWrongIndex { tag: 268, index: 2 })
        ));

        // Removing the rest deletes the group field entirely.
        msg.del_group(ROOT, 268, 1).unwrap();
        msg.del_group(ROOT, 268, 0).unwrap();
        assert!(matches!(
            msg.group_count(ROOT, 268),
            Err(FixError::FieldNotFound { tag: 268 })
        ));
    }

    #[test]
    fn group_body_len_counts_tag_and_count() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("W").unwrap();
        let base = msg.body_len();
        let g0 = msg.add_group(ROOT, 268).unwrap();
        // "268=1|" = 3 + 1 + 1 + 1
        assert_eq!(msg.body_len(), base + 6);
        msg.set_char(g0, 269, '0').unwrap();
        assert_eq!(msg.body_len(), base + 6 + 6);
        msg.del_group(ROOT, 268, 0).unwrap();
        assert_eq!(msg.body_len(), base);
    }

    #[test]
    fn stale_group_handles_are_rejected() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("W").unwrap();
        let g0 = msg.add_group(ROOT, 268).unwrap();
        msg.del_group(ROOT, 268, 0).unwrap();
        assert!(matches!(
            msg.set_char(g0, 269, '0'),
            Err(FixError::InvalidArgument(_))
        ));
    }

    #[test]
    fn nested_groups_resolve_their_own_tables() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("W").unwrap();
        let entry = msg.add_group(ROOT, 268).unwrap();
        msg.set_char(entry, 269, '0').unwrap();
        let party = msg.add_group(entry, 453).unwrap();
        msg.set_string(party, 448, "DESK7").unwrap();
        assert_eq!(msg.get_str(party, 448).unwrap(), "DESK7");
        // 448 only exists inside the party group.
        assert!(matches!(
            msg.set_string(entry, 448, "X"),
            Err(FixError::UnknownField(_))
        ));
        // Deleting the entry releases the nested instance too.
        msg.del_group(ROOT, 268, 0).unwrap();
        assert!(matches!(
            msg.get_str(party, 448),
            Err(FixError::InvalidArgument(_))
        ));
    }

    #[test]
    fn last_error_is_recorded_on_the_parser() {
        let parser = testutil::parser_default();
        let mut msg = parser.create_msg("D").unwrap();
        let _ = msg.set_string(ROOT, 9999, "x");
        let (code, text) = parser.last_error().unwrap();
        assert_eq!(code, crate::ErrorCode::UnknownField);
        assert!(text.contains("9999"));
    }
}
