/// Data source modules: the unit of composition.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Result;
use crate::model::Model;

/// What a field resolver receives.
#[derive(Clone)]
pub struct ResolverParams {
    pub parent: Value,
    pub args: Map<String, Value>,
    pub context: Arc<RequestContext>,
}

impl ResolverParams {
    pub fn new(context: Arc<RequestContext>) -> Self {
        Self {
            parent: Value::Null,
            args: Map::new(),
            context,
        }
    }

    pub fn with_parent(mut self, parent: Value) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }
}

pub type ResolverFuture = BoxFuture<'static, Result<Value>>;
pub type ResolverFn = Arc<dyn Fn(ResolverParams) -> ResolverFuture + Send + Sync>;
pub type MockFn = Arc<dyn Fn() -> Value + Send + Sync>;
pub type FieldResolvers = BTreeMap<String, ResolverFn>;
pub type MockResolvers = BTreeMap<String, MockFn>;

pub fn resolver<F, Fut>(f: F) -> ResolverFn
where
    F: Fn(ResolverParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |params| f(params).boxed())
}

pub fn mock<F>(f: F) -> MockFn
where
    F: Fn() -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Resolvers a module contributes. `data` is keyed by parent type name;
/// `mock` by the type being mocked.
#[derive(Clone, Default)]
pub struct ResolverSet {
    pub query: FieldResolvers,
    pub mutation: FieldResolvers,
    pub data: BTreeMap<String, FieldResolvers>,
    pub mock: Option<MockResolvers>,
}

impl ResolverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, field: impl Into<String>, f: ResolverFn) -> Self {
        self.query.insert(field.into(), f);
        self
    }

    pub fn mutation(mut self, field: impl Into<String>, f: ResolverFn) -> Self {
        self.mutation.insert(field.into(), f);
        self
    }

    pub fn data(mut self, type_name: impl Into<String>, field: impl Into<String>, f: ResolverFn) -> Self {
        self.data
            .entry(type_name.into())
            .or_default()
            .insert(field.into(), f);
        self
    }

    pub fn mock(mut self, type_name: impl Into<String>, f: MockFn) -> Self {
        self.mock
            .get_or_insert_with(BTreeMap::new)
            .insert(type_name.into(), f);
        self
    }
}

impl fmt::Debug for ResolverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSet")
            .field("query", &self.query.keys().collect::<Vec<_>>())
            .field("mutation", &self.mutation.keys().collect::<Vec<_>>())
            .field("data", &self.data.keys().collect::<Vec<_>>())
            .field("mock", &self.mock.as_ref().map(|m| m.keys().collect::<Vec<_>>()))
            .finish()
    }
}

/// Schema fragment, resolvers and model under one context key. Immutable
/// once built.
#[derive(Clone)]
pub struct DataSourceModule {
    context_key: String,
    schema_fragment: String,
    resolvers: ResolverSet,
    model: Arc<dyn Model>,
}

impl DataSourceModule {
    pub fn new(
        context_key: impl Into<String>,
        schema_fragment: impl Into<String>,
        resolvers: ResolverSet,
        model: Arc<dyn Model>,
    ) -> Self {
        Self {
            context_key: context_key.into(),
            schema_fragment: schema_fragment.into(),
            resolvers,
            model,
        }
    }

    pub fn context_key(&self) -> &str {
        &self.context_key
    }

    pub fn schema_fragment(&self) -> &str {
        &self.schema_fragment
    }

    pub fn resolvers(&self) -> &ResolverSet {
        &self.resolvers
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }
}

impl fmt::Debug for DataSourceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceModule")
            .field("context_key", &self.context_key)
            .field("resolvers", &self.resolvers)
            .finish_non_exhaustive()
    }
}
