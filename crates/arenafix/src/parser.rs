//! The parser object: protocol dictionary, resource pools, decode loop.

use crate::arena::Pools;
use crate::config::{CheckFlags, ParserConfig};
use crate::decoder::{CRC_FIELD_LEN, next_field};
use crate::error::{ErrorCode, FixError, Result};
use crate::field::GroupId;
use crate::message::Message;
use crate::tags;
use crate::utils;
use arenafix_dictionary::{Dictionary, FieldCategory, FieldDescr, FixVersion};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// A FIX parser bound to one protocol dictionary.
///
/// The parser owns the page and group pools every derived [`Message`] draws
/// from; parser and messages together form one single-threaded ownership
/// island. Independent parsers never share state and may run in parallel.
pub struct Parser {
    dict: Dictionary,
    flags: CheckFlags,
    shared: Rc<RefCell<Pools>>,
}

impl Parser {
    /// Creates a parser over a compiled dictionary.
    pub fn new(dict: Dictionary, config: ParserConfig, flags: CheckFlags) -> Result<Parser> {
        config.validate()?;
        log::debug!(
            "parser ready: protocol {}, {} pages of {} bytes",
            dict.version().begin_string(),
            config.num_pages,
            config.page_size,
        );
        Ok(Parser {
            dict,
            flags,
            shared: Rc::new(RefCell::new(Pools::new(&config))),
        })
    }

    /// Loads the protocol XML at `path` and creates a parser over it.
    pub fn from_xml_path<P: AsRef<Path>>(
        path: P,
        config: ParserConfig,
        flags: CheckFlags,
    ) -> Result<Parser> {
        let dict = Dictionary::from_path(path)?;
        Parser::new(dict, config, flags)
    }

    /// The protocol version of the loaded dictionary.
    #[must_use]
    pub fn version(&self) -> FixVersion {
        self.dict.version()
    }

    /// The compiled dictionary backing this parser.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// The validations this parser applies while decoding.
    #[must_use]
    pub fn flags(&self) -> CheckFlags {
        self.flags
    }

    /// The code and text of the most recent failure on this island, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<(ErrorCode, String)> {
        self.shared.borrow().last_error().cloned()
    }

    /// The code of the most recent failure on this island, if any.
    #[must_use]
    pub fn last_error_code(&self) -> Option<ErrorCode> {
        self.shared.borrow().last_error().map(|(code, _)| *code)
    }

    /// Creates an empty message of the given type, with `BeginString` and
    /// `MsgType` preset from the dictionary.
    pub fn create_msg(&self, msg_type: &str) -> Result<Message> {
        self.shared.borrow_mut().reset_error();
        let result = self.create_msg_inner(msg_type);
        self.record(result)
    }

    /// Parses one message from `data`.
    ///
    /// Returns the message and the offset one past its checksum separator,
    /// which is where the next message of a back-to-back stream starts.
    pub fn parse(&self, data: &[u8], delim: u8) -> Result<(Message, usize)> {
        self.shared.borrow_mut().reset_error();
        let result = self.parse_inner(data, delim);
        self.record(result)
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.shared.borrow_mut().set_error(err);
        }
        result
    }

    fn create_msg_inner(&self, msg_type: &str) -> Result<Message> {
        let descr = self
            .dict
            .message(msg_type)
            .ok_or_else(|| FixError::UnknownMsg(msg_type.into()))?;
        Message::new(
            Rc::clone(&self.shared),
            Arc::clone(descr),
            self.dict.version(),
        )
    }

    fn parse_inner(&self, data: &[u8], delim: u8) -> Result<(Message, usize)> {
        let first = next_field(data, 0, delim)
            .map_err(|_| FixError::ParseMsg("unable to parse BeginString field".into()))?;
        if first.tag != tags::BEGIN_STRING {
            return Err(FixError::WrongField(
                format!("first field is '{}', but must be BeginString", first.tag).into(),
            ));
        }
        let expected = self.dict.version().transport_begin_string();
        if first.value != expected.as_bytes() {
            return Err(FixError::WrongProtocolVer {
                expected,
                actual: String::from_utf8_lossy(first.value).into_owned().into(),
            });
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

        // The checksum field is structurally fixed at the body end.
        let crc_window = (body_end + 1 + CRC_FIELD_LEN).min(data.len());
        let crc_field = next_field(&data[..crc_window], body_end + 1, delim)
            .map_err(|_| FixError::ParseMsg("unable to parse CheckSum field".into()))?;
        if crc_field.tag != tags::CHECK_SUM {
            return Err(FixError::WrongField(
                format!("field is '{}', but must be CheckSum", crc_field.tag).into(),
            ));
        }
        let stop = crc_field.next;

        if self.flags.contains(CheckFlags::CRC) {
            let declared = match utils::ascii_to_i64(crc_field.value, delim) {
                Some((value, consumed))
                    if consumed == crc_field.value.len() && (0..=255).contains(&value) =>
                {
                    value as u8
                }
                _ => return Err(FixError::ParseMsg("CheckSum value not a number".into())),
            };
            let actual = utils::checksum(&data[..=body_end]);
            if actual != declared {
                log::debug!("checksum mismatch: declared {declared}, computed {actual}");
                return Err(FixError::IntegrityCheck {
                    expected: declared,
                    actual,
                });
            }
        }

        let third = next_field(data, second.next, delim)
            .map_err(|_| FixError::ParseMsg("unable to parse MsgType field".into()))?;
        if third.tag != tags::MSG_TYPE {
            return Err(FixError::WrongField(
                format!("field is '{}', but must be MsgType", third.tag).into(),
            ));
        }
        let msg_type = std::str::from_utf8(third.value)
            .map_err(|_| FixError::ParseMsg("MsgType is not valid text".into()))?;

        let mut msg = self.create_msg_inner(msg_type)?;
        msg.set_i64(GroupId::ROOT, tags::BODY_LENGTH, body_len as i64)?;
        msg.set_raw(GroupId::ROOT, tags::CHECK_SUM, crc_field.value)?;

        let descr = Arc::clone(msg.descr());
        let body = &data[..body_end + 1];
        let mut pos = third.next;
        while pos <= body_end {
            let field = next_field(body, pos, delim)?;
            pos = field.next;
            let Some(fdescr) = descr.fields().get(field.tag) else {
                if self.flags.contains(CheckFlags::EXISTING) {
                    return Err(FixError::UnknownField(
                        format!(
                            "field with tag {} not found in message '{}' description",
                            field.tag,
                            descr.name()
                        )
                        .into(),
                    ));
                }
                continue;
            };
            self.check_value(fdescr, field.value)?;
            match fdescr.category() {
                FieldCategory::Value => {
                    msg.set_raw(GroupId::ROOT, field.tag, field.value)?;
                }
                FieldCategory::Group => {
                    let count = group_count_value(field.tag, field.value)?;
                    pos = self.parse_group(&mut msg, GroupId::ROOT, fdescr, count, body, pos, delim)?;
                }
            }
        }

        if self.flags.contains(CheckFlags::REQUIRED) {
            for fdescr in descr.fields() {
                if fdescr.required() && msg.find_in(GroupId::ROOT, fdescr.tag()).is_none() {
                    return Err(FixError::UnknownField(
                        format!("required field '{}' not found", fdescr.name()).into(),
                    ));
                }
            }
        }

        Ok((msg, stop))
    }

    /// Parses exactly `count` instances of the group headed by `gdescr`.
    ///
    /// Every instance must open with the group's delimiter field (the first
    /// entry of its nested table); the first tag outside the table closes
    /// the group.
    #[allow(clippy::too_many_arguments)]
    fn parse_group(
        &self,
        msg: &mut Message,
        parent: GroupId,
        gdescr: &FieldDescr,
        count: usize,
        data: &[u8],
        mut pos: usize,
        delim: u8,
    ) -> Result<usize> {
        let table = gdescr.nested().ok_or(FixError::FieldHasWrongType {
            tag: gdescr.tag(),
        })?;
        let delim_descr = table.first().ok_or(FixError::FieldHasWrongType {
            tag: gdescr.tag(),
        })?;
        let delim_tag = delim_descr.tag();
        for index in 0..count {
            let head = next_field(data, pos, delim)?;
            if head.tag != delim_tag {
                return Err(FixError::WrongField(
                    format!(
                        "instance {} of group '{}' must begin with field '{}'",
                        index,
                        gdescr.name(),
                        delim_descr.name()
                    )
                    .into(),
                ));
            }
            let gid = msg.add_group(parent, gdescr.tag())?;
            let mut field = head;
            loop {
                let Some(fdescr) = table.get(field.tag) else {
                    break;
                };
                self.check_value(fdescr, field.value)?;
                match fdescr.category() {
                    FieldCategory::Value => {
                        msg.set_raw(gid, field.tag, field.value)?;
                        pos = field.next;
                    }
                    FieldCategory::Group => {
                        let inner = group_count_value(field.tag, field.value)?;
                        pos = self.parse_group(msg, gid, fdescr, inner, data, field.next, delim)?;
                    }
                }
                if pos >= data.len() {
                    break;
                }
                let peek = next_field(data, pos, delim)?;
                if peek.tag == delim_tag || !table.contains(peek.tag) {
                    break;
                }
                field = peek;
            }
        }
        Ok(pos)
    }

    fn check_value(&self, descr: &FieldDescr, value: &[u8]) -> Result<()> {
        if self.flags.contains(CheckFlags::VALUE) && !descr.accepts_value(value) {
            return Err(FixError::WrongField(
                format!(
                    "value '{}' not allowed for field '{}'",
                    String::from_utf8_lossy(value),
                    descr.name()
                )
                .into(),
            ));
        }
        Ok(())
    }
}

fn group_count_value(tag: u32, value: &[u8]) -> Result<usize> {
    match utils::ascii_to_i64(value, 0) {
        Some((count, consumed)) if consumed == value.len() && count >= 0 => Ok(count as usize),
        _ => Err(FixError::InvalidArgument(
            format!("unable to get group tag {tag} value").into(),
        )),
    }
}
