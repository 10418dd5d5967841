//! QuickFIX-style protocol XML reader.
//!
//! Walks the roxmltree node tree in five passes: version attributes, the
//! `<fields>` registry, the `<components>` index, then one message descriptor
//! per `<message>` with `<header>` and `<trailer>` inlined around the body.
//! Component references are resolved recursively at the point of use;
//! `<group>` elements open a nested field table, recursively.

use crate::{
    DictError, Dictionary, FieldDescr, FieldTable, FieldTypeDecl, FixDatatype, FixString,
    FixVersion, MsgDescr,
};
use nohash_hasher::IntMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::str::FromStr;
use std::sync::Arc;

type Node<'a> = roxmltree::Node<'a, 'a>;

pub(crate) fn read_document(doc: &roxmltree::Document<'_>) -> Result<Dictionary, DictError> {
    QuickFixReader::new(doc)?.read()
}

struct QuickFixReader<'a> {
    version: FixVersion,
    node_with_header: Node<'a>,
    node_with_trailer: Node<'a>,
    node_with_messages: Node<'a>,
    node_with_components: Option<Node<'a>>,
    node_with_fields: Node<'a>,
}

impl<'a> QuickFixReader<'a> {
    fn new(doc: &'a roxmltree::Document<'a>) -> Result<Self, DictError> {
        let root = doc.root_element();
        let find_section = |tag: &'static str| {
            root.children()
                .find(|n| n.has_tag_name(tag))
                .ok_or(DictError::MissingSection(tag))
        };
        let fix_type = root.attribute("type").unwrap_or("FIX");
        let major = root.attribute("major").ok_or(DictError::AttrNotFound {
            element: "fix",
            attr: "major",
        })?;
        let minor = root.attribute("minor").ok_or(DictError::AttrNotFound {
            element: "fix",
            attr: "minor",
        })?;
        let servicepack = root.attribute("servicepack").unwrap_or("0");
        let version = FixVersion::from_xml_attrs(fix_type, major, minor, servicepack).ok_or_else(
            || DictError::AttrWrongValue {
                attr: "version",
                value: format!("{fix_type}.{major}.{minor}-SP{servicepack}").into(),
            },
        )?;
        Ok(QuickFixReader {
            version,
            node_with_header: find_section("header")?,
            node_with_trailer: find_section("trailer")?,
            node_with_messages: find_section("messages")?,
            node_with_components: root.children().find(|n| n.has_tag_name("components")),
            node_with_fields: find_section("fields")?,
        })
    }

    fn read(self) -> Result<Dictionary, DictError> {
        let mut decls = DeclRegistry::default();
        for child in self.node_with_fields.children().filter(Node::is_element) {
            decls.import_field(child)?;
        }

        let mut components: FxHashMap<&str, Node<'a>> = FxHashMap::default();
        if let Some(section) = self.node_with_components {
            for child in section.children().filter(Node::is_element) {
                let name = attr(child, "component", "name")?;
                components.insert(name, child);
            }
        }

        let importer = MemberImporter {
            decls: &decls,
            components,
        };
        let mut messages: FxHashMap<FixString, Arc<MsgDescr>> = FxHashMap::default();
        for child in self.node_with_messages.children().filter(Node::is_element) {
            let name = attr(child, "message", "name")?;
            let msg_type = attr(child, "message", "msgtype")?;
            if messages.contains_key(msg_type) {
                return Err(DictError::AttrWrongValue {
                    attr: "msgtype",
                    value: msg_type.into(),
                });
            }
            let mut table = FieldTable::default();
            let mut stack = Vec::new();
            importer.import_members(self.node_with_header, &mut table, &mut stack)?;
            importer.import_members(child, &mut table, &mut stack)?;
            importer.import_members(self.node_with_trailer, &mut table, &mut stack)?;
            let descr = MsgDescr {
                msg_type: msg_type.into(),
                name: name.into(),
                fields: table,
            };
            messages.insert(msg_type.into(), Arc::new(descr));
        }

        Ok(Dictionary::assemble(self.version, decls.by_tag, messages))
    }
}

/// The `<fields>` registry: one shared declaration per tag.
#[derive(Default)]
struct DeclRegistry {
    by_tag: IntMap<u32, Arc<FieldTypeDecl>>,
    by_name: FxHashMap<FixString, Arc<FieldTypeDecl>>,
}

impl DeclRegistry {
    fn import_field(&mut self, node: Node<'_>) -> Result<(), DictError> {
        let number = attr(node, "field", "number")?;
        let tag: u32 = number.parse().map_err(|_| DictError::AttrWrongValue {
            attr: "number",
            value: number.into(),
        })?;
        let name = attr(node, "field", "name")?;
        let type_token = attr(node, "field", "type")?;
        let datatype =
            FixDatatype::from_str(type_token).map_err(|_| DictError::AttrWrongValue {
                attr: "type",
                value: type_token.into(),
            })?;
        if self.by_tag.contains_key(&tag) || self.by_name.contains_key(name) {
            return Err(DictError::DuplicateField {
                tag,
                name: name.into(),
            });
        }
        let mut values: SmallVec<[FixString; 8]> = SmallVec::new();
        for child in node.children().filter(Node::is_element) {
            values.push(attr(child, "value", "enum")?.into());
        }
        let decl = Arc::new(FieldTypeDecl {
            tag,
            name: name.into(),
            datatype,
            values: if values.is_empty() {
                None
            } else {
                Some(values)
            },
        });
        self.by_tag.insert(tag, Arc::clone(&decl));
        self.by_name.insert(decl.name.clone(), decl);
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&Arc<FieldTypeDecl>, DictError> {
        self.by_name
            .get(name)
            .ok_or_else(|| DictError::AttrWrongValue {
                attr: "name",
                value: name.into(),
            })
    }
}

struct MemberImporter<'a> {
    decls: &'a DeclRegistry,
    components: FxHashMap<&'a str, Node<'a>>,
}

impl<'a> MemberImporter<'a> {
    /// Inlines the member elements of `node` into `table`.
    ///
    /// `stack` carries the component names currently being expanded; a
    /// re-entrant name is a reference cycle and is reported as unresolved.
    fn import_members(
        &self,
        node: Node<'a>,
        table: &mut FieldTable,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), DictError> {
        for child in node.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "field" => {
                    let name = attr(child, "field", "name")?;
                    let decl = self.decls.lookup(name)?;
                    table.push(FieldDescr {
                        decl: Arc::clone(decl),
                        required: required_flag(child)?,
                        nested: None,
                    })?;
                }
                "group" => {
                    let name = attr(child, "group", "name")?;
                    let decl = self.decls.lookup(name)?;
                    let mut nested = FieldTable::default();
                    self.import_members(child, &mut nested, stack)?;
                    if nested.is_empty() {
                        return Err(DictError::EmptyGroup(name.into()));
                    }
                    table.push(FieldDescr {
                        decl: Arc::clone(decl),
                        required: required_flag(child)?,
                        nested: Some(nested),
                    })?;
                }
                "component" => {
                    let name = attr(child, "component", "name")?;
                    if stack.contains(&name) {
                        return Err(DictError::UnresolvedComponent(name.into()));
                    }
                    let target = self
                        .components
                        .get(name)
                        .copied()
                        .ok_or_else(|| DictError::UnresolvedComponent(name.into()))?;
                    stack.push(name);
                    self.import_members(target, table, stack)?;
                    stack.pop();
                }
                // Unknown member elements are tolerated.
                _ => {}
            }
        }
        Ok(())
    }
}

fn attr<'a>(node: Node<'a>, element: &'static str, name: &'static str) -> Result<&'a str, DictError> {
    node.attribute(name).ok_or(DictError::AttrNotFound {
        element,
        attr: name,
    })
}

fn required_flag(node: Node<'_>) -> Result<bool, DictError> {
    match attr(node, "member", "required")? {
        "Y" => Ok(true),
        "N" => Ok(false),
        other => Err(DictError::AttrWrongValue {
            attr: "required",
            value: other.into(),
        }),
    }
}
