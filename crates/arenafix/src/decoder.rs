//! The field tokenizer and the header preview.

use crate::error::{FixError, Result};
use crate::tags;
use crate::utils;

/// `10=NNN<SEP>`: the fixed width of the checksum field on the wire.
pub(crate) const CRC_FIELD_LEN: usize = 7;

/// One tokenized `tag=value<SEP>` record.
pub(crate) struct RawField<'a> {
    pub(crate) tag: u32,
    pub(crate) value: &'a [u8],
    /// Offset one past the record's separator.
    pub(crate) next: usize,
}

/// Tokenizes the record starting at `pos`.
pub(crate) fn next_field(data: &[u8], pos: usize, delim: u8) -> Result<RawField<'_>> {
    if pos >= data.len() {
        return Err(FixError::ParseMsg("unexpected end of input".into()));
    }
    let eq = data[pos..]
        .iter()
        .position(|&b| b == b'=')
        .map(|i| i + pos)
        .ok_or_else(|| FixError::ParseMsg("field has no '='".into()))?;
    let tag = match utils::ascii_to_i64(&data[pos..eq], 0) {
        Some((value, consumed)) if consumed == eq - pos && value > 0 && value <= i64::from(u32::MAX) => {
            value as u32
        }
        _ => return Err(FixError::ParseMsg("malformed tag".into())),
    };
    let sep = data[eq + 1..]
        .iter()
        .position(|&b| b == delim)
        .map(|i| i + eq + 1)
        .ok_or_else(|| FixError::ParseMsg("field has no separator".into()))?;
    Ok(RawField {
        tag,
        value: &data[eq + 1..sep],
        next: sep + 1,
    })
}

/// The five header fields extracted by [`decode_header`], borrowed from the
/// input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderView<'a> {
    /// Tag 8.
    pub begin_string: &'a [u8],
    /// Tag 35.
    pub msg_type: &'a [u8],
    /// Tag 49.
    pub sender_comp_id: &'a [u8],
    /// Tag 56.
    pub target_comp_id: &'a [u8],
    /// Tag 34; never zero.
    pub msg_seq_num: u64,
}

/// Extracts the routing header from `data` without building a message tree.
///
/// The first three fields must be `BeginString`, `BodyLength`, and `MsgType`
/// in that order; `SenderCompID`, `TargetCompID`, and `MsgSeqNum` may appear
/// anywhere up to the end of the body. Scanning stops as soon as all five
/// are found. A `MsgSeqNum` of zero is rejected: the protocol numbers
/// sessions from one, and a zero would be indistinguishable from a missing
/// field.
pub fn decode_header(data: &[u8], delim: u8) -> Result<HeaderView<'_>> {
    let first = next_field(data, 0, delim)
        .map_err(|_| FixError::ParseMsg("unable to parse BeginString field".into()))?;
    if first.tag != tags::BEGIN_STRING {
        return Err(FixError::WrongField(
            format!("first field is '{}', but must be BeginString", first.tag).into(),
        ));
    }
    let second = next_field(data, first.next, delim)
        .map_err(|_| FixError::ParseMsg("unable to parse BodyLength field".into()))?;
    if second.tag != tags::BODY_LENGTH {
        return Err(FixError::WrongField(
            format!("second field is '{}', but must be BodyLength", second.tag).into(),
        ));
    }
    let body_len = match utils::ascii_to_i64(second.value, delim) {
        Some((value, consumed)) if consumed == second.value.len() && value >= 0 => value as u64,
        _ => return Err(FixError::ParseMsg("BodyLength value not a number".into())),
    };
    let delim9 = second.next - 1;
    if body_len + CRC_FIELD_LEN as u64 > (data.len() - delim9) as u64 {
        return Err(FixError::DataTooShort { body_len });
    }
    let body_end = delim9 + body_len as usize;

    let third = next_field(data, second.next, delim)
        .map_err(|_| FixError::ParseMsg("unable to parse MsgType field".into()))?;
    if third.tag != tags::MSG_TYPE {
        return Err(FixError::WrongField(
            format!("field is '{}', but must be MsgType", third.tag).into(),
        ));
    }

    let mut sender: Option<&[u8]> = None;
    let mut target: Option<&[u8]> = None;
    let mut seq_num: Option<u64> = None;
    let mut pos = third.next;
    while pos <= body_end && (sender.is_none() || target.is_none() || seq_num.is_none()) {
        let field = next_field(data, pos, delim)?;
        match field.tag {
            tags::SENDER_COMP_ID => sender = Some(field.value),
            tags::TARGET_COMP_ID => target = Some(field.value),
            tags::MSG_SEQ_NUM => {
                let value = match utils::ascii_to_i64(field.value, delim) {
                    Some((v, consumed)) if consumed == field.value.len() => v,
                    _ => return Err(FixError::WrongField("wrong MsgSeqNum".into())),
                };
                if value <= 0 {
                    return Err(FixError::WrongField("MsgSeqNum must be positive".into()));
                }
                seq_num = Some(value as u64);
            }
            _ => {}
        }
        pos = field.next;
    }

    let sender =
        sender.ok_or_else(|| FixError::WrongField("unable to find SenderCompID field".into()))?;
    let target =
        target.ok_or_else(|| FixError::WrongField("unable to find TargetCompID field".into()))?;
    let msg_seq_num =
        seq_num.ok_or_else(|| FixError::WrongField("unable to find MsgSeqNum field".into()))?;
    Ok(HeaderView {
        begin_string: first.value,
        msg_type: third.value,
        sender_comp_id: sender,
        target_comp_id: target,
        msg_seq_num,
    })
}
