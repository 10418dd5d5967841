//! Error types for codec and parser operations.

use arenafix_dictionary::DictError;
use smartstring::{LazyCompact, SmartString};
use thiserror::Error;

type FixString = SmartString<LazyCompact>;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, FixError>;

/// Main error type for codec and parser operations.
#[derive(Debug, Error)]
pub enum FixError {
    /// An argument violates the API contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(FixString),

    /// The input bytes do not tokenize as `tag=value<SEP>` records.
    #[error("unable to parse message: {0}")]
    ParseMsg(FixString),

    /// A well-formed field appeared where the protocol forbids it.
    #[error("{0}")]
    WrongField(FixString),

    /// The input ends before `BodyLength` plus the checksum field.
    #[error("data too short: body length {body_len} exceeds available input")]
    DataTooShort { body_len: u64 },

    /// `BeginString` does not match the loaded protocol.
    #[error("wrong protocol: expected '{expected}', actual '{actual}'")]
    WrongProtocolVer {
        expected: &'static str,
        actual: FixString,
    },

    /// `CheckSum` does not match the byte sum of the message.
    #[error("checksum check failed: expected {expected}, actual {actual}")]
    IntegrityCheck { expected: u8, actual: u8 },

    /// A value operation addressed a group field, or vice versa.
    #[error("field {tag} has wrong type")]
    FieldHasWrongType { tag: u32 },

    /// No field with this tag in the addressed group instance.
    #[error("field {tag} not found")]
    FieldNotFound { tag: u32 },

    /// Group instance index at or beyond the instance count.
    #[error("group {tag} has no instance {index}")]
    GroupWrongIndex { tag: u32, index: usize },

    /// A tag outside the governing descriptor, or a required field missing.
    #[error("{0}")]
    UnknownField(FixString),

    /// `MsgType` absent from the loaded dictionary.
    #[error("unknown message type '{0}'")]
    UnknownMsg(FixString),

    /// The page pool is exhausted.
    #[error("no more pages: limit of {max_pages} pages reached")]
    NoMorePages { max_pages: u32 },

    /// The group-store pool is exhausted.
    #[error("no more groups: limit of {max_groups} group stores reached")]
    NoMoreGroups { max_groups: u32 },

    /// A single allocation larger than one page.
    #[error("allocation of {requested} bytes exceeds page size {page_size}")]
    TooBigPage { requested: usize, page_size: u32 },

    /// The output buffer cannot hold the serialized message.
    #[error("output buffer too small: need {needed} bytes, have {capacity}")]
    NoMoreSpace { needed: usize, capacity: usize },

    /// Protocol description failed to load.
    #[error(transparent)]
    Dictionary(#[from] DictError),
}

/// Stable numeric codes, frozen to the original C ABI numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
#[allow(missing_docs)]
pub enum ErrorCode {
    FieldHasWrongType = 1,
    FieldNotFound = 2,
    GroupWrongIndex = 3,
    XmlAttrNotFound = 4,
    XmlAttrWrongValue = 5,
    ProtocolXmlLoadFailed = 6,
    UnknownField = 7,
    WrongProtocolVer = 8,
    DuplicateFieldDescr = 9,
    UnknownMsg = 10,
    Libxml = 11,
    InvalidArgument = 12,
    /// Kept for code-table stability; never produced by this implementation.
    Malloc = 13,
    UnknownProtocolDescr = 14,
    NoMorePages = 15,
    NoMoreGroups = 16,
    TooBigPage = 17,
    NoMoreSpace = 18,
    ParseMsg = 19,
    WrongField = 20,
    IntegrityCheck = 21,
    DataTooShort = 22,
}

impl FixError {
    /// The stable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            FixError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            FixError::ParseMsg(_) => ErrorCode::ParseMsg,
            FixError::WrongField(_) => ErrorCode::WrongField,
            FixError::DataTooShort { .. } => ErrorCode::DataTooShort,
            FixError::WrongProtocolVer { .. } => ErrorCode::WrongProtocolVer,
            FixError::IntegrityCheck { .. } => ErrorCode::IntegrityCheck,
            FixError::FieldHasWrongType { .. } => ErrorCode::FieldHasWrongType,
            FixError::FieldNotFound { .. } => ErrorCode::FieldNotFound,
            FixError::GroupWrongIndex { .. } => ErrorCode::GroupWrongIndex,
            FixError::UnknownField(_) => ErrorCode::UnknownField,
            FixError::UnknownMsg(_) => ErrorCode::UnknownMsg,
            FixError::NoMorePages { .. } => ErrorCode::NoMorePages,
            FixError::NoMoreGroups { .. } => ErrorCode::NoMoreGroups,
            FixError::TooBigPage { .. } => ErrorCode::TooBigPage,
            FixError::NoMoreSpace { .. } => ErrorCode::NoMoreSpace,
            FixError::Dictionary(dict) => match dict {
                DictError::AttrNotFound { .. } => ErrorCode::XmlAttrNotFound,
                DictError::AttrWrongValue { .. } => ErrorCode::XmlAttrWrongValue,
                DictError::DuplicateField { .. } => ErrorCode::DuplicateFieldDescr,
                DictError::UnresolvedComponent(_) => ErrorCode::UnknownProtocolDescr,
                DictError::MissingSection(_) | DictError::EmptyGroup(_) | DictError::Load(_) => {
                    ErrorCode::ProtocolXmlLoadFailed
                }
                DictError::Xml(_) => ErrorCode::Libxml,
            },
        }
    }
}
