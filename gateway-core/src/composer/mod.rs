/// Merges data source modules into one schema and one resolver map.

pub mod merge;
pub mod mock;
pub mod sdl;

pub use merge::{merge_mocks, merge_resolvers, ResolverMap, MUTATION_TYPE, QUERY_TYPE};
pub use mock::{builtin_scalar_mocks, install_mocks, MockOptions};
pub use sdl::{SchemaIndex, SdlError, TypeDef, TypeKind, TypeRef};

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{GatewayError, Result};
use crate::model::Model;
use crate::module::{resolver, DataSourceModule, ResolverFn};
use crate::observability::{noop_logger, Logger};

pub const ROOT_SCHEMA: &str = "type Query {\n  version: String!\n}\n\ntype Mutation {\n  ping: Boolean!\n}\n";

pub const VERSION_FIELD: &str = "version";
pub const PING_FIELD: &str = "ping";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSchema {
    pub type_defs: Vec<String>,
}

impl RootSchema {
    pub fn new(type_defs: Vec<String>) -> Self {
        Self { type_defs }
    }
}

impl Default for RootSchema {
    fn default() -> Self {
        Self::new(vec![ROOT_SCHEMA.to_string()])
    }
}

#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Reject resolvers for fields the merged SDL does not declare.
    pub validate_resolvers: bool,
    pub mocks: Option<MockOptions>,
    pub logger: Arc<dyn Logger>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            validate_resolvers: true,
            mocks: None,
            logger: noop_logger(),
        }
    }
}

/// The merged schema and resolver map. Read-only once built.
#[derive(Clone)]
pub struct CompositeSchema {
    type_defs: Vec<String>,
    resolvers: ResolverMap,
    index: SchemaIndex,
    models: Vec<(String, Arc<dyn Model>)>,
    mocked: bool,
}

impl CompositeSchema {
    /// Root fragments first, then one per module in registration order.
    pub fn type_defs(&self) -> &[String] {
        &self.type_defs
    }

    pub fn sdl(&self) -> String {
        self.type_defs.join("\n")
    }

    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    pub fn resolver(&self, type_name: &str, field: &str) -> Option<&ResolverFn> {
        self.resolvers.get(type_name)?.get(field)
    }

    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    /// Each module's model under its context key, in registration order.
    pub fn models(&self) -> &[(String, Arc<dyn Model>)] {
        &self.models
    }

    pub fn is_mocked(&self) -> bool {
        self.mocked
    }
}

impl fmt::Debug for CompositeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSchema")
            .field("type_defs", &self.type_defs.len())
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .field("models", &self.models.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("mocked", &self.mocked)
            .finish()
    }
}

fn builtin_resolvers() -> ResolverMap {
    let version: ResolverFn =
        resolver(|_| async { Ok(Value::from(env!("CARGO_PKG_VERSION"))) });
    let ping: ResolverFn = resolver(|_| async { Ok(Value::Bool(true)) });

    let mut map = ResolverMap::new();
    map.entry(QUERY_TYPE.to_string())
        .or_default()
        .insert(VERSION_FIELD.to_string(), version);
    map.entry(MUTATION_TYPE.to_string())
        .or_default()
        .insert(PING_FIELD.to_string(), ping);
    map
}

fn ensure_unique_keys(modules: &[DataSourceModule]) -> Result<()> {
    let mut seen = HashSet::new();
    for module in modules {
        if !seen.insert(module.context_key()) {
            return Err(GatewayError::DuplicateContextKey(module.context_key().to_string()));
        }
    }
    Ok(())
}

fn validate_resolvers(index: &SchemaIndex, resolvers: &ResolverMap) -> Result<()> {
    for (type_name, fields) in resolvers {
        let Some(def) = index.get(type_name) else {
            return Err(GatewayError::UnknownType(type_name.clone()));
        };
        for field in fields.keys() {
            if !def.has_fields() || def.field(field).is_none() {
                return Err(GatewayError::UnknownResolverField {
                    type_name: type_name.clone(),
                    field: field.clone(),
                });
            }
        }
    }
    Ok(())
}

pub fn compose(
    root: &RootSchema,
    modules: &[DataSourceModule],
    options: &ComposeOptions,
) -> Result<CompositeSchema> {
    ensure_unique_keys(modules)?;

    let type_defs: Vec<String> = root
        .type_defs
        .iter()
        .cloned()
        .chain(modules.iter().map(|m| m.schema_fragment().to_string()))
        .collect();
    let index = SchemaIndex::build(&type_defs)?;

    let mut resolvers = merge_resolvers(builtin_resolvers(), modules, options.logger.as_ref());
    if options.validate_resolvers {
        validate_resolvers(&index, &resolvers)?;
    }

    if let Some(mock_options) = options.mocks {
        let mocks = merge_mocks(modules);
        let installed = install_mocks(&index, &mut resolvers, &mocks, mock_options);
        options.logger.info(&format!(
            "Installed {} mock resolvers (preserve_resolvers = {})",
            installed, mock_options.preserve_resolvers
        ));
    }

    let models = modules
        .iter()
        .map(|m| (m.context_key().to_string(), Arc::clone(m.model())))
        .collect();

    options.logger.info(&format!(
        "Composed schema from {} data sources: {}",
        modules.len(),
        modules.iter().map(|m| m.context_key()).collect::<Vec<_>>().join(", ")
    ));

    Ok(CompositeSchema {
        type_defs,
        resolvers,
        index,
        models,
        mocked: options.mocks.is_some(),
    })
}

/// Shared reference to the current schema. Readers take a snapshot; a
/// rebuild swaps it without disturbing requests that hold the old one.
#[derive(Debug, Clone)]
pub struct SchemaHandle {
    sender: Arc<watch::Sender<Arc<CompositeSchema>>>,
}

impl SchemaHandle {
    pub fn new(schema: CompositeSchema) -> Self {
        let (sender, _) = watch::channel(Arc::new(schema));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> Arc<CompositeSchema> {
        Arc::clone(&self.sender.borrow())
    }

    /// Returns the schema that was replaced.
    pub fn replace(&self, schema: CompositeSchema) -> Arc<CompositeSchema> {
        self.sender.send_replace(Arc::new(schema))
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CompositeSchema>> {
        self.sender.subscribe()
    }
}

/// Field names per type, for diagnostics.
pub fn resolver_summary(schema: &CompositeSchema) -> BTreeMap<String, Vec<String>> {
    schema
        .resolvers()
        .iter()
        .map(|(type_name, fields)| (type_name.clone(), fields.keys().cloned().collect()))
        .collect()
}
