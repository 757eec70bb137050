use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::composer::{compose, ComposeOptions, CompositeSchema, MockOptions, RootSchema, SchemaHandle};
use crate::config::{DeploymentMode, GatewayConfig};
use crate::context::RequestContext;
use crate::error::{GatewayError, Result};
use crate::module::DataSourceModule;
use crate::observability::{noop_logger, setup_logging, Logger, TracingLogger};
use crate::record::{format_error, ErrorFormatter};
use crate::registry::{discover, override_local_sources, ModuleCatalog};
use crate::storage::CacheSettings;

pub const SCHEMA_OPTION: &str = "schema";
pub const CONTEXT_OPTION: &str = "context";

/// The parts of an inbound request that extra-context callbacks may read.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    pub headers: HeaderMap,
}

pub type ExtraContextFn =
    Arc<dyn Fn(&InboundRequest, &ResponseHandle) -> Map<String, Value> + Send + Sync>;

#[derive(Clone)]
pub struct GatewayOptions {
    pub data_sources: Vec<DataSourceModule>,
    pub extra_context: Option<ExtraContextFn>,
    /// Passed through untouched to the execution engine.
    pub engine_options: Map<String, Value>,
    pub logger: Arc<dyn Logger>,
    pub mode: DeploymentMode,
    pub enable_mock_data: bool,
    pub preserve_resolvers: bool,
    pub root_schema: RootSchema,
    pub validate_resolvers: bool,
    /// Handed to configured modules and kept for hosts that build more.
    pub cache: CacheSettings,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            data_sources: Vec::new(),
            extra_context: None,
            engine_options: Map::new(),
            logger: noop_logger(),
            mode: DeploymentMode::default(),
            enable_mock_data: false,
            preserve_resolvers: false,
            root_schema: RootSchema::default(),
            validate_resolvers: true,
            cache: CacheSettings::default(),
        }
    }
}

impl GatewayOptions {
    /// Options driven by configuration: configured data sources are resolved
    /// through `catalog`, built over `cache`, and replace local modules with
    /// the same context key.
    pub fn from_config(
        config: &GatewayConfig,
        local: Vec<DataSourceModule>,
        catalog: &ModuleCatalog,
        cache: CacheSettings,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        let dev = discover(&config.data_source_paths(), catalog, &cache)?;
        let data_sources = override_local_sources(local, dev, logger.as_ref());

        Ok(Self {
            data_sources,
            logger,
            mode: config.mode,
            enable_mock_data: config.mock_data_enabled(),
            preserve_resolvers: config.preserve_resolvers,
            cache,
            ..Self::default()
        })
    }
}

impl fmt::Debug for GatewayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayOptions")
            .field("data_sources", &self.data_sources)
            .field("extra_context", &self.extra_context.is_some())
            .field("engine_options", &self.engine_options)
            .field("mode", &self.mode)
            .field("enable_mock_data", &self.enable_mock_data)
            .field("preserve_resolvers", &self.preserve_resolvers)
            .field("validate_resolvers", &self.validate_resolvers)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Everything an execution engine needs for one request.
#[derive(Clone)]
pub struct ExecutionOptions {
    pub schema: Arc<CompositeSchema>,
    pub context: Arc<RequestContext>,
    pub format_error: Arc<ErrorFormatter>,
    pub engine_options: Map<String, Value>,
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("schema", &self.schema)
            .field("context", &self.context)
            .field("engine_options", &self.engine_options)
            .finish_non_exhaustive()
    }
}

/// Composes the data sources at startup and hands out per-request execution
/// options.
pub struct Gateway {
    schema: SchemaHandle,
    root_schema: RootSchema,
    compose_options: ComposeOptions,
    extra_context: Option<ExtraContextFn>,
    engine_options: Map<String, Value>,
    format_error: Arc<ErrorFormatter>,
    cache: CacheSettings,
    logger: Arc<dyn Logger>,
}

fn reject_reserved_options(engine_options: &Map<String, Value>) -> Result<()> {
    if engine_options.contains_key(SCHEMA_OPTION) {
        return Err(GatewayError::ForbiddenOption(
            "Schema cannot be added directly. Use a data source module instead.".to_string(),
        ));
    }
    if engine_options.contains_key(CONTEXT_OPTION) {
        return Err(GatewayError::ForbiddenOption(
            "Context cannot be added directly. Use the extra context callback instead."
                .to_string(),
        ));
    }
    Ok(())
}

impl Gateway {
    pub fn new(options: GatewayOptions) -> Result<Self> {
        reject_reserved_options(&options.engine_options)?;

        let compose_options = ComposeOptions {
            validate_resolvers: options.validate_resolvers,
            mocks: options.enable_mock_data.then_some(MockOptions {
                preserve_resolvers: options.preserve_resolvers,
            }),
            logger: Arc::clone(&options.logger),
        };
        let schema = compose(&options.root_schema, &options.data_sources, &compose_options)?;

        Ok(Self {
            schema: SchemaHandle::new(schema),
            root_schema: options.root_schema,
            compose_options,
            extra_context: options.extra_context,
            engine_options: options.engine_options,
            format_error: Arc::new(format_error(Some(Arc::clone(&options.logger)), options.mode)),
            cache: options.cache,
            logger: options.logger,
        })
    }

    pub fn schema(&self) -> Arc<CompositeSchema> {
        self.schema.current()
    }

    pub fn schema_handle(&self) -> &SchemaHandle {
        &self.schema
    }

    pub fn error_formatter(&self) -> Arc<ErrorFormatter> {
        Arc::clone(&self.format_error)
    }

    /// The configured cache, for building modules passed to [`Gateway::reload`].
    pub fn cache_settings(&self) -> &CacheSettings {
        &self.cache
    }

    /// Builds a fresh context for one request against the current schema.
    pub fn options_for(&self, request: &InboundRequest, response: &ResponseHandle) -> ExecutionOptions {
        let schema = self.schema.current();
        let extra = self
            .extra_context
            .as_ref()
            .map(|f| f(request, response))
            .unwrap_or_default();
        let context = RequestContext::build(
            schema.models().iter().map(|(key, model)| (key, model)),
            extra,
            self.logger.as_ref(),
        );

        ExecutionOptions {
            schema,
            context: Arc::new(context),
            format_error: Arc::clone(&self.format_error),
            engine_options: self.engine_options.clone(),
        }
    }

    /// Recomposes with a new module list. On failure the current schema
    /// stays in place.
    pub fn reload(&self, modules: Vec<DataSourceModule>) -> Result<Arc<CompositeSchema>> {
        let schema = compose(&self.root_schema, &modules, &self.compose_options)?;
        self.logger.info(&format!("Reloaded schema with {} data sources", modules.len()));
        Ok(self.schema.replace(schema))
    }
}

/// Startup path for a host process: reads the config file, applies the
/// environment, installs logging, opens the cache and composes.
pub async fn bootstrap(
    config_path: impl AsRef<std::path::Path>,
    local: Vec<DataSourceModule>,
    catalog: &ModuleCatalog,
) -> Result<Gateway> {
    let config = GatewayConfig::load(config_path).await?.apply_env();
    setup_logging(&config.logging);
    let cache = CacheSettings::open(&config.cache).await?;

    let logger = TracingLogger::shared("gateway");
    logger.info(&format!(
        "Starting gateway in {:?} mode (mock data: {}, cache: {}, catalog: [{}])",
        config.mode,
        config.mock_data_enabled(),
        cache.is_enabled(),
        catalog.names().collect::<Vec<_>>().join(", ")
    ));
    Gateway::new(GatewayOptions::from_config(&config, local, catalog, cache, logger)?)
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("schema", &self.schema.current())
            .field("engine_options", &self.engine_options)
            .field("mode", &self.format_error.mode())
            .finish_non_exhaustive()
    }
}
