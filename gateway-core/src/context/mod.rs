/// Per-request execution context.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::model::Model;
use crate::observability::Logger;
use crate::record::ErrorRecord;

/// What every resolver sees: each module's model under its context key, plus
/// whatever the caller added for this request.
#[derive(Clone, Default)]
pub struct RequestContext {
    models: BTreeMap<String, Arc<dyn Model>>,
    extra: Map<String, Value>,
}

impl RequestContext {
    /// Extra keys that name a model are dropped; the model wins.
    pub fn build<'a, I>(models: I, mut extra: Map<String, Value>, logger: &dyn Logger) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Arc<dyn Model>)>,
    {
        let models: BTreeMap<String, Arc<dyn Model>> = models
            .into_iter()
            .map(|(key, model)| (key.clone(), Arc::clone(model)))
            .collect();

        for key in models.keys() {
            if extra.remove(key).is_some() {
                logger.warn(&format!(
                    "Extra context key \"{}\" is shadowed by the data source with the same context key",
                    key
                ));
            }
        }

        Self { models, extra }
    }

    pub fn model(&self, key: &str) -> Option<&Arc<dyn Model>> {
        self.models.get(key)
    }

    pub fn model_as<T: Model>(&self, key: &str) -> Option<&T> {
        self.models.get(key)?.downcast_ref::<T>()
    }

    /// Like [`model_as`](Self::model_as) but fails with a record naming the
    /// key, for use directly inside resolvers.
    pub fn require_model<T: Model>(&self, key: &str) -> Result<&T> {
        self.model_as::<T>(key).ok_or_else(|| {
            GatewayError::from(
                ErrorRecord::builder()
                    .description(format!("No data source model is registered under \"{}\"", key))
                    .create(),
            )
        })
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Every top-level key, models first.
    pub fn keys(&self) -> Vec<&str> {
        self.models
            .keys()
            .chain(self.extra.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.models.contains_key(key) || self.extra.contains_key(key)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("extra", &self.extra)
            .finish()
    }
}
