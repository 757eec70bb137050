use serde_json::{Map, Value};
use std::sync::Arc;

use super::merge::ResolverMap;
use super::sdl::{SchemaIndex, TypeKind, TypeRef};
use crate::module::{mock, resolver, MockFn, MockResolvers, ResolverFn};

/// How many items a mocked list field yields.
pub const MOCK_LIST_LENGTH: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockOptions {
    /// Keep real resolvers and mock only fields that have none.
    pub preserve_resolvers: bool,
}

pub fn builtin_scalar_mocks() -> MockResolvers {
    let mut mocks = MockResolvers::new();
    mocks.insert("Int".to_string(), mock(|| Value::from(42)));
    mocks.insert("Float".to_string(), mock(|| Value::from(4.2)));
    mocks.insert("String".to_string(), mock(|| Value::from("Hello World")));
    mocks.insert("Boolean".to_string(), mock(|| Value::Bool(true)));
    mocks.insert("ID".to_string(), mock(|| Value::from(uuid::Uuid::new_v4().to_string())));
    mocks
}

#[derive(Clone)]
enum Plan {
    Custom(MockFn),
    Enum(Value),
    Object,
    List(Box<Plan>),
    Null,
}

impl Plan {
    fn for_type(ty: &TypeRef, index: &SchemaIndex, mocks: &MockResolvers) -> Self {
        match ty {
            TypeRef::NonNull(inner) => Self::for_type(inner, index, mocks),
            TypeRef::List(inner) => Plan::List(Box::new(Self::for_type(inner, index, mocks))),
            TypeRef::Named(name) => {
                if let Some(custom) = mocks.get(name) {
                    return Plan::Custom(custom.clone());
                }
                match index.get(name).map(|t| &t.kind) {
                    Some(TypeKind::Enum(values)) => values
                        .first()
                        .map(|v| Plan::Enum(Value::from(v.as_str())))
                        .unwrap_or(Plan::Null),
                    Some(TypeKind::Object) | Some(TypeKind::Interface) => Plan::Object,
                    _ => Plan::Null,
                }
            }
        }
    }

    fn produce(&self) -> Value {
        match self {
            Plan::Custom(f) => f(),
            Plan::Enum(value) => value.clone(),
            Plan::Object => Value::Object(Map::new()),
            Plan::List(inner) => Value::Array((0..MOCK_LIST_LENGTH).map(|_| inner.produce()).collect()),
            Plan::Null => Value::Null,
        }
    }
}

fn mock_resolver(field: String, plan: Plan) -> ResolverFn {
    let plan = Arc::new(plan);
    resolver(move |params| {
        // A value already on the parent (from an object mock) wins.
        let value = match params.parent.get(&field) {
            Some(value) => value.clone(),
            None => plan.produce(),
        };
        async move { Ok(value) }
    })
}

/// Installs a mock resolver on every field of every object type. With
/// `preserve_resolvers`, fields that already resolve are left alone. Module
/// mocks take precedence over the built-in scalar mocks.
pub fn install_mocks(
    index: &SchemaIndex,
    resolvers: &mut ResolverMap,
    module_mocks: &MockResolvers,
    options: MockOptions,
) -> usize {
    let mut mocks = builtin_scalar_mocks();
    mocks.extend(module_mocks.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut installed = 0;
    for object in index.object_types() {
        for field in &object.fields {
            let fields = resolvers.entry(object.name.clone()).or_default();
            if options.preserve_resolvers && fields.contains_key(&field.name) {
                continue;
            }
            let plan = Plan::for_type(&field.ty, index, &mocks);
            fields.insert(field.name.clone(), mock_resolver(field.name.clone(), plan));
            installed += 1;
        }
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::module::ResolverParams;
    use serde_json::json;

    const SDL: &str = r#"
        type Query { user(id: ID!): User, version: String!, tags: [String!]! }
        type User { id: ID!, name: String, age: Int, role: Role, friends: [User] }
        enum Role { ADMIN MEMBER }
    "#;

    fn params(parent: Value) -> ResolverParams {
        ResolverParams::new(Arc::new(RequestContext::default())).with_parent(parent)
    }

    fn real_version() -> ResolverFn {
        resolver(|_| async { Ok(json!("1.0.0")) })
    }

    #[tokio::test]
    async fn test_fields_get_type_shaped_values() {
        let index = SchemaIndex::build(&[SDL]).unwrap();
        let mut map = ResolverMap::new();
        install_mocks(&index, &mut map, &MockResolvers::new(), MockOptions::default());

        let user = &map["User"];
        assert_eq!(user["age"](params(json!({}))).await.unwrap(), json!(42));
        assert_eq!(user["name"](params(json!({}))).await.unwrap(), json!("Hello World"));
        assert_eq!(user["role"](params(json!({}))).await.unwrap(), json!("ADMIN"));
        assert_eq!(user["friends"](params(json!({}))).await.unwrap(), json!([{}, {}]));
        assert!(user["id"](params(json!({}))).await.unwrap().is_string());
        assert_eq!(
            map["Query"]["tags"](params(Value::Null)).await.unwrap(),
            json!(["Hello World", "Hello World"])
        );
    }

    #[tokio::test]
    async fn test_module_mocks_feed_nested_fields() {
        let index = SchemaIndex::build(&[SDL]).unwrap();
        let mut map = ResolverMap::new();
        let mut mocks = MockResolvers::new();
        mocks.insert("User".to_string(), mock(|| json!({"name": "John Doe"})));
        install_mocks(&index, &mut map, &mocks, MockOptions::default());

        let user = map["Query"]["user"](params(Value::Null)).await.unwrap();
        assert_eq!(user, json!({"name": "John Doe"}));
        assert_eq!(map["User"]["name"](params(user.clone())).await.unwrap(), json!("John Doe"));
        assert_eq!(map["User"]["age"](params(user)).await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_preserve_resolvers_keeps_real_ones() {
        let index = SchemaIndex::build(&[SDL]).unwrap();

        let mut preserved = ResolverMap::new();
        preserved.entry("Query".to_string()).or_default().insert("version".to_string(), real_version());
        install_mocks(
            &index,
            &mut preserved,
            &MockResolvers::new(),
            MockOptions { preserve_resolvers: true },
        );
        assert_eq!(preserved["Query"]["version"](params(Value::Null)).await.unwrap(), json!("1.0.0"));

        let mut replaced = ResolverMap::new();
        replaced.entry("Query".to_string()).or_default().insert("version".to_string(), real_version());
        install_mocks(&index, &mut replaced, &MockResolvers::new(), MockOptions::default());
        assert_eq!(
            replaced["Query"]["version"](params(Value::Null)).await.unwrap(),
            json!("Hello World")
        );
    }
}
