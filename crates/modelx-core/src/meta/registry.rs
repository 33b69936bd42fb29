use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;

use super::descriptor::{parse_fragment, AttributeDescriptor, AttributeKind, SchemaFragment, TypeDescriptor, TypeKind};
use crate::errors::{ModelXError, Result};
use crate::model::{CustomValue, Value};

/// Interned index of a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Precomputed is-a table, valid until the next registration
#[derive(Debug, Clone, Default)]
struct AncestryTable {
    index: HashMap<String, TypeId>,
    /// Reflexive ancestor set per type, indexed by `TypeId`
    ancestors: Vec<HashSet<TypeId>>,
}

/// Registry of type descriptors
///
/// Fragments are merged additively and may arrive in any order: a type may
/// name a superclass that is registered later. Names are only resolved when
/// queried. After all fragments are in, [`MetaModel::finalize`] interns the
/// type names and precomputes every type's ancestor set so is-a checks are
/// constant-time lookups.
#[derive(Debug, Clone, Default)]
pub struct MetaModel {
    types: IndexMap<String, TypeDescriptor>,
    ancestry: Option<AncestryTable>,
}

impl MetaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fragment into the registry
    ///
    /// A descriptor registered under an existing name replaces it. Returns
    /// the number of descriptors merged. Invalidates the ancestry table.
    pub fn register(&mut self, fragment: SchemaFragment) -> usize {
        let count = fragment.len();
        for (name, descriptor) in fragment {
            tracing::debug!(type_name = %name, kind = ?descriptor.kind, "register type");
            self.types.insert(name, descriptor);
        }
        self.ancestry = None;
        count
    }

    /// Merge a fragment given in its JSON wire shape
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttributeKind`/`UnknownTypeKind` or `Serialization`
    /// if the fragment is malformed. Nothing is registered in that case.
    pub fn register_json(&mut self, value: &serde_json::Value) -> Result<usize> {
        let fragment = parse_fragment(value).inspect_err(|e| {
            tracing::error!(error = %e, "schema fragment rejected");
        })?;
        Ok(self.register(fragment))
    }

    /// Merge a fragment given as JSON text
    ///
    /// # Errors
    ///
    /// Same as [`MetaModel::register_json`].
    pub fn register_str(&mut self, json: &str) -> Result<usize> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        self.register_json(&value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Look up a descriptor by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the name is not registered.
    pub fn descriptor(&self, name: &str) -> Result<&TypeDescriptor> {
        self.types.get(name).ok_or_else(|| ModelXError::UnknownType {
            type_name: name.to_string(),
        })
    }

    /// The type followed by its ancestors, nearest first
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the type or any ancestor is unregistered, or
    /// `InheritanceCycle` if the super chain loops.
    pub fn super_chain(&self, name: &str) -> Result<Vec<&TypeDescriptor>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(name);

        while let Some(type_name) = current {
            if !seen.insert(type_name) {
                return Err(ModelXError::InheritanceCycle {
                    type_name: type_name.to_string(),
                });
            }
            let descriptor = self.descriptor(type_name)?;
            chain.push(descriptor);
            current = descriptor.super_type.as_deref();
        }

        Ok(chain)
    }

    /// Full attribute list of a type, inherited attributes first
    ///
    /// An attribute redeclared by a descendant replaces the ancestor's
    /// definition at the ancestor's position.
    ///
    /// # Errors
    ///
    /// Same as [`MetaModel::super_chain`].
    pub fn resolve(&self, name: &str) -> Result<Vec<AttributeDescriptor>> {
        let chain = self.super_chain(name)?;
        let mut resolved: Vec<AttributeDescriptor> = Vec::new();

        for descriptor in chain.iter().rev() {
            for attribute in &descriptor.attributes {
                match resolved.iter_mut().find(|a| a.name == attribute.name) {
                    Some(existing) => *existing = attribute.clone(),
                    None => resolved.push(attribute.clone()),
                }
            }
        }

        Ok(resolved)
    }

    /// Resolved attribute of a type by name
    ///
    /// # Errors
    ///
    /// Same as [`MetaModel::super_chain`].
    pub fn attribute(&self, type_name: &str, attribute: &str) -> Result<Option<AttributeDescriptor>> {
        let chain = self.super_chain(type_name)?;
        Ok(chain
            .iter()
            .find_map(|d| d.own_attribute(attribute))
            .cloned())
    }

    /// Ordered literals of an enum type (empty for classes)
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` if the name is not registered.
    pub fn literals(&self, name: &str) -> Result<&[String]> {
        Ok(&self.descriptor(name)?.literals)
    }

    /// True if `name` is `ancestor` or inherits from it
    ///
    /// Unregistered names and broken chains answer `false`.
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        if let Some(table) = &self.ancestry {
            return match (table.index.get(name), table.index.get(ancestor)) {
                (Some(t), Some(a)) => table.ancestors[t.index()].contains(a),
                _ => false,
            };
        }

        let mut seen = HashSet::new();
        let mut current = Some(name);
        while let Some(type_name) = current {
            if type_name == ancestor {
                return self.types.contains_key(type_name);
            }
            if !seen.insert(type_name) {
                return false;
            }
            current = self
                .types
                .get(type_name)
                .and_then(|d| d.super_type.as_deref());
        }
        false
    }

    /// True if `name` is a subtype of any of `ancestors`
    pub fn is_subtype_of_any<S: AsRef<str>>(&self, name: &str, ancestors: &[S]) -> bool {
        ancestors.iter().any(|a| self.is_subtype(name, a.as_ref()))
    }

    /// Intern type names and precompute ancestor sets
    ///
    /// Types whose chain is broken or cyclic get the ancestors reachable
    /// before the break.
    pub fn finalize(&mut self) {
        let index: HashMap<String, TypeId> = self
            .types
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), TypeId(i as u32)))
            .collect();

        let ancestors = self
            .types
            .keys()
            .map(|name| {
                let mut set = HashSet::new();
                let mut current = Some(name.as_str());
                while let Some(type_name) = current {
                    let Some(id) = index.get(type_name) else { break };
                    if !set.insert(*id) {
                        tracing::warn!(type_name = %name, "inheritance cycle while finalizing");
                        break;
                    }
                    current = self.types[type_name].super_type.as_deref();
                }
                set
            })
            .collect();

        self.ancestry = Some(AncestryTable { index, ancestors });
    }

    pub fn is_finalized(&self) -> bool {
        self.ancestry.is_some()
    }

    /// Interned id of a type, available after [`MetaModel::finalize`]
    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.ancestry.as_ref()?.index.get(name).copied()
    }

    /// Initial attribute values for a new instance of a type
    ///
    /// # Errors
    ///
    /// Returns `UnknownType`/`InheritanceCycle` if the type does not resolve.
    pub fn instantiate_defaults(&self, type_name: &str) -> Result<BTreeMap<String, Value>> {
        let descriptor = self.descriptor(type_name)?;
        if descriptor.kind == TypeKind::Enum {
            return Err(ModelXError::FieldKindMismatch {
                element_id: type_name.to_string(),
                field: String::new(),
                expected: "a class type".to_string(),
            });
        }

        Ok(self
            .resolve(type_name)?
            .into_iter()
            .map(|a| {
                let value = self.default_value(&a);
                (a.name, value)
            })
            .collect())
    }

    /// Default value of one attribute
    pub fn default_value(&self, attribute: &AttributeDescriptor) -> Value {
        let default = attribute.default.as_ref();
        match attribute.kind {
            AttributeKind::Prim => default.map(Value::from_json).unwrap_or(Value::Null),
            AttributeKind::Enum => match default {
                Some(serde_json::Value::String(s)) => Value::Enum(s.clone()),
                Some(serde_json::Value::Number(n)) => n
                    .as_u64()
                    .and_then(|i| {
                        self.types
                            .get(&attribute.type_name)
                            .and_then(|d| d.literals.get(i as usize))
                    })
                    .map(|l| Value::Enum(l.clone()))
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            AttributeKind::Ref => Value::Ref(None),
            AttributeKind::Refs => Value::Refs(Vec::new()),
            AttributeKind::Obj => Value::Obj(None),
            AttributeKind::Objs => Value::Objs(Vec::new()),
            AttributeKind::Var => Value::Custom(CustomValue::new(
                attribute.type_name.clone(),
                default.cloned().unwrap_or(serde_json::Value::Null),
            )),
        }
    }

    /// Drop every registered type
    pub fn clear(&mut self) {
        self.types.clear();
        self.ancestry = None;
    }
}
