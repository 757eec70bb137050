/// Type index over GraphQL schema fragments, parsed with apollo-compiler.
///
/// Extensions (`extend type`) are applied after every base definition, so
/// fragment order never decides whether an extension finds its target.

use apollo_compiler::ast::{self, Definition};
use apollo_compiler::Node;
use std::collections::BTreeMap;
use std::fmt;

pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schema fragment {fragment}: {message}")]
pub struct SdlError {
    pub fragment: usize,
    /// Line and column, when the parser reported one.
    pub location: Option<(usize, usize)>,
    pub message: String,
}

impl SdlError {
    fn new(fragment: usize, message: impl Into<String>) -> Self {
        Self {
            fragment,
            location: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named(),
        }
    }
}

impl From<&ast::Type> for TypeRef {
    fn from(ty: &ast::Type) -> Self {
        match ty {
            ast::Type::Named(name) => TypeRef::Named(name.to_string()),
            ast::Type::NonNullNamed(name) => {
                TypeRef::NonNull(Box::new(TypeRef::Named(name.to_string())))
            }
            ast::Type::List(inner) => TypeRef::List(Box::new(TypeRef::from(&**inner))),
            ast::Type::NonNullList(inner) => TypeRef::NonNull(Box::new(TypeRef::List(Box::new(
                TypeRef::from(&**inner),
            )))),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Object,
    Interface,
    Input,
    Enum(Vec<String>),
    Scalar,
    Union(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<FieldDef>,
}

impl TypeDef {
    fn new(name: &apollo_compiler::Name, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            fields: Vec::new(),
        }
    }

    fn with_fields(name: &apollo_compiler::Name, kind: TypeKind, fields: &[Node<ast::FieldDefinition>]) -> Self {
        let mut def = Self::new(name, kind);
        def.fields = fields
            .iter()
            .map(|field| FieldDef {
                name: field.name.to_string(),
                ty: TypeRef::from(&field.ty),
            })
            .collect();
        def
    }

    fn with_inputs(name: &apollo_compiler::Name, fields: &[Node<ast::InputValueDefinition>]) -> Self {
        let mut def = Self::new(name, TypeKind::Input);
        def.fields = fields
            .iter()
            .map(|field| FieldDef {
                name: field.name.to_string(),
                ty: TypeRef::from(&*field.ty),
            })
            .collect();
        def
    }

    fn enumeration(name: &apollo_compiler::Name, values: &[Node<ast::EnumValueDefinition>]) -> Self {
        let values = values.iter().map(|v| v.value.to_string()).collect();
        Self::new(name, TypeKind::Enum(values))
    }

    fn union(name: &apollo_compiler::Name, members: &[ast::NamedType]) -> Self {
        let members = members.iter().map(ToString::to_string).collect();
        Self::new(name, TypeKind::Union(members))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_fields(&self) -> bool {
        matches!(self.kind, TypeKind::Object | TypeKind::Interface)
    }

    fn upsert_field(&mut self, field: FieldDef) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }
}

/// Every named type across all fragments, extensions applied.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    types: BTreeMap<String, TypeDef>,
}

impl SchemaIndex {
    pub fn build<S: AsRef<str>>(fragments: &[S]) -> Result<Self, SdlError> {
        let mut types = BTreeMap::new();
        for scalar in BUILTIN_SCALARS {
            types.insert(
                scalar.to_string(),
                TypeDef {
                    name: scalar.to_string(),
                    kind: TypeKind::Scalar,
                    fields: Vec::new(),
                },
            );
        }

        let mut extensions = Vec::new();
        for (idx, fragment) in fragments.iter().enumerate() {
            let fragment = fragment.as_ref();
            if fragment.trim().is_empty() {
                continue;
            }
            let document = parse(idx, fragment)?;
            for definition in &document.definitions {
                let def = match definition {
                    Definition::ObjectTypeDefinition(def) => {
                        TypeDef::with_fields(&def.name, TypeKind::Object, &def.fields)
                    }
                    Definition::InterfaceTypeDefinition(def) => {
                        TypeDef::with_fields(&def.name, TypeKind::Interface, &def.fields)
                    }
                    Definition::InputObjectTypeDefinition(def) => {
                        TypeDef::with_inputs(&def.name, &def.fields)
                    }
                    Definition::EnumTypeDefinition(def) => TypeDef::enumeration(&def.name, &def.values),
                    Definition::UnionTypeDefinition(def) => TypeDef::union(&def.name, &def.members),
                    Definition::ScalarTypeDefinition(def) => TypeDef::new(&def.name, TypeKind::Scalar),
                    Definition::ObjectTypeExtension(ext) => {
                        extensions.push((idx, TypeDef::with_fields(&ext.name, TypeKind::Object, &ext.fields)));
                        continue;
                    }
                    Definition::InterfaceTypeExtension(ext) => {
                        extensions
                            .push((idx, TypeDef::with_fields(&ext.name, TypeKind::Interface, &ext.fields)));
                        continue;
                    }
                    Definition::InputObjectTypeExtension(ext) => {
                        extensions.push((idx, TypeDef::with_inputs(&ext.name, &ext.fields)));
                        continue;
                    }
                    Definition::EnumTypeExtension(ext) => {
                        extensions.push((idx, TypeDef::enumeration(&ext.name, &ext.values)));
                        continue;
                    }
                    Definition::UnionTypeExtension(ext) => {
                        extensions.push((idx, TypeDef::union(&ext.name, &ext.members)));
                        continue;
                    }
                    Definition::OperationDefinition(_) | Definition::FragmentDefinition(_) => {
                        return Err(SdlError::new(
                            idx,
                            "operations and fragments are not allowed in a schema fragment",
                        ));
                    }
                    _ => continue,
                };
                // A re-declared type replaces the earlier one.
                types.insert(def.name.clone(), def);
            }
        }

        for (idx, extension) in extensions {
            let Some(target) = types.get_mut(&extension.name) else {
                return Err(SdlError::new(
                    idx,
                    format!("cannot extend undefined type \"{}\"", extension.name),
                ));
            };
            match (&mut target.kind, extension.kind) {
                (TypeKind::Enum(values), TypeKind::Enum(more)) => values.extend(more),
                (TypeKind::Union(members), TypeKind::Union(more)) => members.extend(more),
                _ => {
                    for field in extension.fields {
                        target.upsert_field(field);
                    }
                }
            }
        }

        Ok(Self { types })
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldDef> {
        self.types.get(type_name)?.field(field)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Object types only; these are the ones resolvers attach to.
    pub fn object_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values().filter(|t| t.kind == TypeKind::Object)
    }
}

/// Syntax only. Semantic checks happen against the merged index.
fn parse(fragment: usize, source: &str) -> Result<ast::Document, SdlError> {
    ast::Document::parse(source, format!("fragment-{}.graphql", fragment)).map_err(|invalid| {
        match invalid.errors.iter().next().map(|diagnostic| diagnostic.to_json()) {
            Some(first) => SdlError {
                fragment,
                location: first.locations.first().map(|at| (at.line, at.column)),
                message: first.message,
            },
            None => SdlError::new(fragment, invalid.errors.to_string()),
        }
    })
}
