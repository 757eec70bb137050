pub mod composer;
pub mod config;
pub mod connector;
pub mod context;
pub mod error;
pub mod gateway;
pub mod model;
pub mod module;
pub mod observability;
pub mod record;
pub mod registry;
pub mod storage;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use composer::{compose, ComposeOptions, CompositeSchema, RootSchema, SchemaHandle};
pub use config::{DeploymentMode, GatewayConfig};
pub use connector::{Connector, HttpConnector};
pub use context::RequestContext;
pub use error::{ConnectorError, GatewayError, Result};
pub use gateway::{bootstrap, ExecutionOptions, Gateway, GatewayOptions, InboundRequest, ResponseHandle};
pub use model::Model;
pub use module::{resolver, DataSourceModule, ResolverParams, ResolverSet};
pub use record::{format_error, ErrorFormatter, ErrorRecord};
pub use registry::ModuleCatalog;
