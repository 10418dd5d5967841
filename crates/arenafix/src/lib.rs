//! # `arenafix` - arena-backed FIX tag/value codec
//!
//! This crate builds, parses, and serializes messages of the FIX protocol's
//! classic tag/value encoding, directed by a protocol dictionary compiled
//! with [`arenafix-dictionary`](arenafix_dictionary).
//!
//! Three subsystems share the hot path:
//!
//! - **Dictionary** - per-message descriptors with recursive repeating-group
//!   tables and O(1) tag lookup.
//! - **Arena** - every message draws its field bytes from pooled fixed-size
//!   pages and its group stores from a pooled free list, so building or
//!   decoding a message costs no per-field heap traffic and freeing one is
//!   a constant number of list splices.
//! - **Codec** - typed setters and getters keep `BodyLength` current on
//!   every mutation; serialization emits dictionary order and patches
//!   `CheckSum`; decoding walks the dictionary to unroll repeating groups.
//!
//! ## Usage
//!
//! ```no_run
//! use arenafix::{CheckFlags, GroupId, Parser, ParserConfig};
//! use arenafix_dictionary::Dictionary;
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let dict = Dictionary::from_path("fix44.xml")?;
//!     let parser = Parser::new(dict, ParserConfig::default(), CheckFlags::CRC)?;
//!
//!     // Build and serialize a NewOrderSingle.
//!     let mut msg = parser.create_msg("D")?;
//!     msg.set_string(GroupId::ROOT, 49, "SENDER")?;
//!     msg.set_string(GroupId::ROOT, 56, "TARGET")?;
//!     msg.set_i64(GroupId::ROOT, 34, 1)?;
//!     let mut wire = [0u8; 512];
//!     let n = msg.encode(0x01, &mut wire)?;
//!
//!     // Parse it back.
//!     let (parsed, _consumed) = parser.parse(&wire[..n], 0x01)?;
//!     assert_eq!(parsed.get_str(GroupId::ROOT, 49)?, "SENDER");
//!     Ok(())
//! }
//! ```
//!
//! A parser and the messages derived from it form one single-threaded
//! ownership island; separate parsers are fully independent.

#![warn(missing_docs)]

mod arena;
mod config;
mod decoder;
mod encoder;
mod error;
mod field;
mod message;
mod parser;
mod utils;

pub use arenafix_dictionary::{
    DictError, Dictionary, FieldCategory, FixDatatype, FixVersion,
};
pub use config::{CheckFlags, ParserConfig};
pub use decoder::{HeaderView, decode_header};
pub use error::{ErrorCode, FixError, Result};
pub use field::GroupId;
pub use message::Message;
pub use parser::Parser;

/// Well-known tags the codec itself cares about.
pub mod tags {
    /// Tag 8, the first field of every message.
    pub const BEGIN_STRING: u32 = 8;
    /// Tag 9, the second field of every message.
    pub const BODY_LENGTH: u32 = 9;
    /// Tag 10, the last field of every message.
    pub const CHECK_SUM: u32 = 10;
    /// Tag 34, the session sequence number.
    pub const MSG_SEQ_NUM: u32 = 34;
    /// Tag 35, the message type.
    pub const MSG_TYPE: u32 = 35;
    /// Tag 49, the sending counterparty.
    pub const SENDER_COMP_ID: u32 = 49;
    /// Tag 56, the receiving counterparty.
    pub const TARGET_COMP_ID: u32 = 56;
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::config::{CheckFlags, ParserConfig};
    use crate::parser::Parser;
    use crate::utils;
    use arenafix_dictionary::Dictionary;

    pub(crate) const FIX44_MINI: &str = include_str!("../tests/data/fix44.xml");

    pub(crate) fn dictionary() -> Dictionary {
        Dictionary::from_xml(FIX44_MINI).unwrap()
    }

    pub(crate) fn parser_default() -> Parser {
        parser_with(CheckFlags::NONE)
    }

    pub(crate) fn parser_with(flags: CheckFlags) -> Parser {
        Parser::new(dictionary(), ParserConfig::default(), flags).unwrap()
    }

    /// Assembles a valid wire image around `body` (everything after the
    /// BodyLength field, each record `|`-terminated).
    pub(crate) fn frame(body: &str) -> String {
        let head = format!("8=FIX.4.4|9={}|{body}", body.len());
        let crc = utils::checksum(head.as_bytes());
        format!("{head}10={crc:03}|")
    }
}
