//! # `arenafix-dictionary`
//!
//! Compiles a QuickFIX-style protocol XML description into in-memory message
//! descriptors for the `arenafix` codec.
//!
//! The compiled form is optimized for the decode hot path: every message owns
//! a [`FieldTable`] with an ordered field list (canonical wire order: header,
//! body, trailer) plus a tag-indexed map for O(1) lookup, and repeating
//! groups carry their own nested tables, recursively. Field declarations are
//! deduplicated: every message and group referring to tag 55 shares one
//! [`FieldTypeDecl`].
//!
//! ```no_run
//! use arenafix_dictionary::Dictionary;
//!
//! let dict = Dictionary::from_path("fix44.xml")?;
//! let nos = dict.message("D").expect("NewOrderSingle");
//! assert_eq!(nos.name(), "NewOrderSingle");
//! # Ok::<(), arenafix_dictionary::DictError>(())
//! ```

mod datatype;
mod quickfix;
mod version;

pub use datatype::FixDatatype;
pub use version::FixVersion;

use nohash_hasher::IntMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};
use std::path::Path;
use std::sync::Arc;

/// Inline-capable string used for descriptor names and message types.
pub type FixString = SmartString<LazyCompact>;

/// The error type that can arise while compiling a protocol description.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("required attribute '{attr}' missing on <{element}>")]
    AttrNotFound {
        element: &'static str,
        attr: &'static str,
    },
    #[error("attribute '{attr}' has unsupported value '{value}'")]
    AttrWrongValue { attr: &'static str, value: FixString },
    #[error("duplicate field descriptor for tag {tag} ('{name}')")]
    DuplicateField { tag: u32, name: FixString },
    #[error("unresolved component reference '{0}'")]
    UnresolvedComponent(FixString),
    #[error("missing <{0}> section")]
    MissingSection(&'static str),
    #[error("group '{0}' declares no members")]
    EmptyGroup(FixString),
    #[error("malformed protocol XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("unable to load protocol description: {0}")]
    Load(#[from] std::io::Error),
}

/// A field declaration from the `<fields>` section, shared by every message
/// and group that references it.
#[derive(Debug)]
pub struct FieldTypeDecl {
    pub(crate) tag: u32,
    pub(crate) name: FixString,
    pub(crate) datatype: FixDatatype,
    pub(crate) values: Option<SmallVec<[FixString; 8]>>,
}

impl FieldTypeDecl {
    #[must_use]
    pub fn tag(&self) -> u32 {
        self.tag
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn datatype(&self) -> FixDatatype {
        self.datatype
    }

    /// The permitted wire values, when the dictionary restricts them.
    #[must_use]
    pub fn values(&self) -> Option<&[FixString]> {
        self.values.as_deref()
    }
}

/// Whether a field holds a value or heads a repeating group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    Value,
    Group,
}

/// One field's slot within a message or group layout.
#[derive(Debug)]
pub struct FieldDescr {
    pub(crate) decl: Arc<FieldTypeDecl>,
    pub(crate) required: bool,
    pub(crate) nested: Option<FieldTable>,
}

impl FieldDescr {
    #[must_use]
    pub fn tag(&self) -> u32 {
        self.decl.tag
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    #[must_use]
    pub fn datatype(&self) -> FixDatatype {
        self.decl.datatype
    }

    #[must_use]
    pub fn decl(&self) -> &Arc<FieldTypeDecl> {
        &self.decl
    }

    #[must_use]
    pub fn required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn category(&self) -> FieldCategory {
        if self.nested.is_some() {
            FieldCategory::Group
        } else {
            FieldCategory::Value
        }
    }

    /// The nested field table, present iff this descriptor heads a group.
    #[must_use]
    pub fn nested(&self) -> Option<&FieldTable> {
        self.nested.as_ref()
    }

    /// Membership test against the declared value set.
    ///
    /// A field without a value restriction accepts everything.
    #[must_use]
    pub fn accepts_value(&self, raw: &[u8]) -> bool {
        match self.decl.values() {
            Some(values) => values.iter().any(|v| v.as_bytes() == raw),
            None => true,
        }
    }
}

/// An ordered, tag-indexed collection of [`FieldDescr`]s: the layout of a
/// message or of one repeating-group instance.
#[derive(Debug, Default)]
pub struct FieldTable {
    ordered: Vec<FieldDescr>,
    by_tag: IntMap<u32, usize>,
}

impl FieldTable {
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&FieldDescr> {
        self.by_tag.get(&tag).map(|&i| &self.ordered[i])
    }

    #[must_use]
    pub fn contains(&self, tag: u32) -> bool {
        self.by_tag.contains_key(&tag)
    }

    /// Descriptors in canonical wire order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescr> {
        self.ordered.iter()
    }

    /// The group's delimiter field: the first descriptor of the table.
    #[must_use]
    pub fn first(&self) -> Option<&FieldDescr> {
        self.ordered.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub(crate) fn push(&mut self, descr: FieldDescr) -> Result<(), DictError> {
        if self.by_tag.contains_key(&descr.tag()) {
            return Err(DictError::DuplicateField {
                tag: descr.tag(),
                name: descr.name().into(),
            });
        }
        self.by_tag.insert(descr.tag(), self.ordered.len());
        self.ordered.push(descr);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FieldTable {
    type Item = &'a FieldDescr;
    type IntoIter = std::slice::Iter<'a, FieldDescr>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A compiled message descriptor.
#[derive(Debug)]
pub struct MsgDescr {
    pub(crate) msg_type: FixString,
    pub(crate) name: FixString,
    pub(crate) fields: FieldTable,
}

impl MsgDescr {
    #[must_use]
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full layout: header fields, then body, then trailer.
    #[must_use]
    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }
}

/// A compiled protocol description.
#[derive(Debug, Clone)]
pub struct Dictionary {
    version: FixVersion,
    decls_by_tag: Arc<IntMap<u32, Arc<FieldTypeDecl>>>,
    messages: Arc<FxHashMap<FixString, Arc<MsgDescr>>>,
}

impl Dictionary {
    /// Compiles a dictionary from XML text.
    pub fn from_xml(xml: &str) -> Result<Self, DictError> {
        let doc = roxmltree::Document::parse(xml)?;
        let dict = quickfix::read_document(&doc)?;
        log::debug!(
            "loaded protocol {} with {} message types",
            dict.version.begin_string(),
            dict.messages.len()
        );
        Ok(dict)
    }

    /// Reads and compiles a dictionary from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DictError> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    #[must_use]
    pub fn version(&self) -> FixVersion {
        self.version
    }

    /// Looks up a message descriptor by its `MsgType` token.
    #[must_use]
    pub fn message(&self, msg_type: &str) -> Option<&Arc<MsgDescr>> {
        self.messages.get(msg_type)
    }

    /// Looks up a field declaration by tag.
    #[must_use]
    pub fn field_decl(&self, tag: u32) -> Option<&Arc<FieldTypeDecl>> {
        self.decls_by_tag.get(&tag)
    }

    /// Iterates all compiled message descriptors, in no particular order.
    pub fn messages(&self) -> impl Iterator<Item = &Arc<MsgDescr>> {
        self.messages.values()
    }

    pub(crate) fn assemble(
        version: FixVersion,
        decls_by_tag: IntMap<u32, Arc<FieldTypeDecl>>,
        messages: FxHashMap<FixString, Arc<MsgDescr>>,
    ) -> Self {
        Dictionary {
            version,
            decls_by_tag: Arc::new(decls_by_tag),
            messages: Arc::new(messages),
        }
    }
}
