//! Type and attribute descriptors
//!
//! Schema fragments arrive as loosely typed JSON (`kind: "objs"` and so on).
//! They are parsed into raw structs first and then converted into the closed
//! [`AttributeKind`] / [`TypeKind`] enums, so an unknown kind rejects the
//! whole fragment before anything is registered.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{ModelXError, Result};

/// Kind of a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Enum,
}

impl TypeKind {
    fn parse(type_name: &str, kind: &str) -> Result<Self> {
        match kind {
            "class" => Ok(TypeKind::Class),
            "enum" => Ok(TypeKind::Enum),
            other => Err(ModelXError::UnknownTypeKind {
                type_name: type_name.to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

/// Closed set of attribute kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Scalar: string, number, or boolean
    Prim,
    /// Literal of a registered enum type
    Enum,
    /// Weak reference to one element
    Ref,
    /// Ordered weak references
    Refs,
    /// Single owned child
    Obj,
    /// Ordered owned children
    Objs,
    /// Opaque custom value with its own read/serialize hooks
    Var,
}

impl AttributeKind {
    /// Parse the wire name of an attribute kind
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "prim" => Some(AttributeKind::Prim),
            "enum" => Some(AttributeKind::Enum),
            "ref" => Some(AttributeKind::Ref),
            "refs" => Some(AttributeKind::Refs),
            "obj" => Some(AttributeKind::Obj),
            "objs" => Some(AttributeKind::Objs),
            "var" | "custom" => Some(AttributeKind::Var),
            _ => None,
        }
    }

    /// True for `obj` and `objs`
    pub fn is_owning(&self) -> bool {
        matches!(self, AttributeKind::Obj | AttributeKind::Objs)
    }

    /// True for `ref` and `refs`
    pub fn is_weak(&self) -> bool {
        matches!(self, AttributeKind::Ref | AttributeKind::Refs)
    }

    /// True for the ordered collection kinds
    pub fn is_collection(&self) -> bool {
        matches!(self, AttributeKind::Objs | AttributeKind::Refs)
    }
}

/// One attribute of a class
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
    /// Target type: scalar type name, enum name, element type, or custom type
    #[serde(rename = "type")]
    pub type_name: String,
    pub visible: bool,
    pub transient: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<serde_json::Value>,
}

impl AttributeDescriptor {
    /// Create a visible, writable attribute without a default
    pub fn new(name: impl Into<String>, kind: AttributeKind, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: type_name.into(),
            visible: true,
            transient: false,
            read_only: false,
            default: None,
            options: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// A registered type: class with attributes, or enum with literals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    #[serde(rename = "super", skip_serializing_if = "Option::is_none")]
    pub super_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,
}

impl TypeDescriptor {
    /// Create a class descriptor
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Class,
            super_type: None,
            attributes: Vec::new(),
            literals: Vec::new(),
        }
    }

    /// Create an enum descriptor with ordered literals
    pub fn enumeration<I, S>(name: impl Into<String>, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: TypeKind::Enum,
            super_type: None,
            attributes: Vec::new(),
            literals: literals.into_iter().map(Into::into).collect(),
        }
    }

    pub fn extends(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declared (non-inherited) attribute by name
    pub fn own_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Ordered mapping of type name to descriptor
pub type SchemaFragment = IndexMap<String, TypeDescriptor>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttribute {
    name: String,
    kind: String,
    #[serde(rename = "type", default)]
    type_name: String,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    transient: bool,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    options: Vec<serde_json::Value>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawType {
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(rename = "super", default)]
    super_type: Option<String>,
    #[serde(default)]
    attributes: Vec<RawAttribute>,
    #[serde(default)]
    literals: Vec<serde_json::Value>,
}

fn default_kind() -> String {
    "class".to_string()
}

/// Parse a schema fragment from its JSON wire shape
///
/// # Errors
///
/// - `Serialization` if the JSON does not have the fragment shape
/// - `UnknownTypeKind` / `UnknownAttributeKind` for kinds outside the closed sets
pub fn parse_fragment(value: &serde_json::Value) -> Result<SchemaFragment> {
    let raw: IndexMap<String, RawType> = serde_json::from_value(value.clone())?;
    let mut fragment = SchemaFragment::with_capacity(raw.len());

    for (name, raw_type) in raw {
        let kind = TypeKind::parse(&name, &raw_type.kind)?;

        let attributes = raw_type
            .attributes
            .into_iter()
            .map(|a| {
                let attr_kind =
                    AttributeKind::from_wire(&a.kind).ok_or_else(|| {
                        ModelXError::UnknownAttributeKind {
                            type_name: name.clone(),
                            attribute: a.name.clone(),
                            kind: a.kind.clone(),
                        }
                    })?;
                Ok(AttributeDescriptor {
                    name: a.name,
                    kind: attr_kind,
                    type_name: a.type_name,
                    visible: a.visible,
                    transient: a.transient,
                    read_only: a.read_only,
                    default: a.default,
                    options: a.options,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Literals may be bare strings or `{name: ...}` objects
        let literals = raw_type
            .literals
            .iter()
            .filter_map(|l| match l {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(o) => {
                    o.get("name").and_then(|n| n.as_str()).map(str::to_string)
                }
                _ => None,
            })
            .collect();

        fragment.insert(
            name.clone(),
            TypeDescriptor {
                name,
                kind,
                super_type: raw_type.super_type,
                attributes,
                literals,
            },
        );
    }

    Ok(fragment)
}
