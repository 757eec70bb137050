/// Helpers for building modules and models in tests.

use std::any::Any;
use std::sync::Arc;

use crate::connector::testing::ScriptedTransport;
use crate::connector::{Connector, HttpConnector};
use crate::model::Model;
use crate::module::{DataSourceModule, ResolverSet};

pub use crate::connector::testing::Scripted;

/// A model over an [`HttpConnector`] that talks to a [`ScriptedTransport`].
#[derive(Debug)]
pub struct StubModel {
    connector: HttpConnector,
    transport: Arc<ScriptedTransport>,
}

impl StubModel {
    pub fn new(name: &str) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let connector = HttpConnector::builder(name, "https://stub.invalid")
            .cache_enabled(false)
            .build_with(transport.clone());
        Self::with_connector(connector, transport)
    }

    pub fn with_connector(connector: HttpConnector, transport: Arc<ScriptedTransport>) -> Self {
        Self {
            connector,
            transport,
        }
    }

    pub fn shared(name: &str) -> Arc<dyn Model> {
        Arc::new(Self::new(name))
    }

    pub fn transport(&self) -> &ScriptedTransport {
        &self.transport
    }
}

impl Model for StubModel {
    fn connector(&self) -> &dyn Connector {
        &self.connector
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn module(context_key: &str, schema_fragment: &str, resolvers: ResolverSet) -> DataSourceModule {
    DataSourceModule::new(
        context_key,
        schema_fragment,
        resolvers,
        StubModel::shared(&format!("{}Connector", context_key)),
    )
}
