//! Descriptor-ordered message serialization.
//!
//! The wire layout is dictated entirely by the dictionary: header fields
//! first (`BeginString`, `BodyLength`, `MsgType` lead the header table),
//! body fields in declaration order with groups unrolled recursively, and
//! the trailer's `CheckSum` last, patched with the byte sum of everything
//! emitted before it.

use crate::error::{FixError, Result};
use crate::field::{FieldKind, GroupId};
use crate::message::Message;
use crate::tags;
use crate::utils;
use arenafix_dictionary::FieldTable;
use std::sync::Arc;

struct Writer<'a> {
    out: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.out.len() {
            return Err(FixError::NoMoreSpace {
                needed: end,
                capacity: self.out.len(),
            });
        }
        self.out[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn put_field(&mut self, tag: u32, value: &[u8], delim: u8) -> Result<()> {
        let mut buf = [0u8; utils::I64_WIDTH];
        let tag_bytes = utils::fmt_i64(i64::from(tag), &mut buf);
        self.put(tag_bytes)?;
        self.put(b"=")?;
        self.put(value)?;
        self.put(&[delim])
    }
}

impl Message {
    /// Serializes the message into `out` and returns the byte count.
    ///
    /// `BodyLength` is rewritten from the running count and `CheckSum` from
    /// the emitted bytes, so the stored fields always match the wire after a
    /// successful call. Fails with `NoMoreSpace` when `out` is too small; the
    /// buffer contents are unspecified in that case.
    pub fn encode(&mut self, delim: u8, out: &mut [u8]) -> Result<usize> {
        let result = self.encode_inner(delim, out);
        if let Err(err) = &result {
            self.shared.borrow_mut().set_error(err);
        }
        result
    }

    fn encode_inner(&mut self, delim: u8, out: &mut [u8]) -> Result<usize> {
        // The anchors are preset at creation; re-synthesize defensively and
        // bring BodyLength up to date before any byte is emitted.
        if self.find_in(GroupId::ROOT, tags::BEGIN_STRING).is_none() {
            let token = self.version.transport_begin_string();
            self.set_raw(GroupId::ROOT, tags::BEGIN_STRING, token.as_bytes())?;
        }
        if self.find_in(GroupId::ROOT, tags::MSG_TYPE).is_none() {
            let descr = Arc::clone(self.descr());
            self.set_raw(GroupId::ROOT, tags::MSG_TYPE, descr.msg_type().as_bytes())?;
        }
        let body_len = self.body_len();
        self.set_i64(GroupId::ROOT, tags::BODY_LENGTH, i64::from(body_len))?;
        if self.find_in(GroupId::ROOT, tags::CHECK_SUM).is_none() {
            self.set_raw(GroupId::ROOT, tags::CHECK_SUM, b"000")?;
        }

        let descr = Arc::clone(self.descr());
        let mut writer = Writer { out, pos: 0 };
        self.emit_table(descr.fields(), GroupId::ROOT, delim, &mut writer)?;

        let crc = utils::checksum(&writer.out[..writer.pos]);
        let crc_digits = [b'0' + crc / 100, b'0' + crc / 10 % 10, b'0' + crc % 10];
        self.set_raw(GroupId::ROOT, tags::CHECK_SUM, &crc_digits)?;
        writer.put_field(tags::CHECK_SUM, &crc_digits, delim)?;
        Ok(writer.pos)
    }

    fn emit_table(
        &self,
        table: &FieldTable,
        grp: GroupId,
        delim: u8,
        writer: &mut Writer<'_>,
    ) -> Result<()> {
        for descr in table.iter() {
            let tag = descr.tag();
            if tag == tags::CHECK_SUM {
                continue;
            }
            let Some(id) = self.find_in(grp, tag) else {
                continue;
            };
            match &self.fields[id as usize].kind {
                FieldKind::Value(region) => {
                    writer.put_field(tag, self.arena.bytes(*region), delim)?;
                }
                FieldKind::Group(instances) => {
                    let mut buf = [0u8; utils::I64_WIDTH];
                    let count = utils::fmt_i64(instances.len() as i64, &mut buf);
                    writer.put_field(tag, count, delim)?;
                    if let Some(nested) = descr.nested() {
                        for gid in instances {
                            self.emit_table(nested, *gid, delim, writer)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
