use std::any::Any;

use crate::connector::Connector;

/// Domain-facing façade over exactly one connector.
///
/// A model is created once when its module is registered and shared by every
/// request, so it must not hold request-specific state. Resolvers reach it via
/// [`RequestContext::model_as`](crate::context::RequestContext::model_as).
pub trait Model: Send + Sync + 'static {
    fn connector(&self) -> &dyn Connector;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Model {
    pub fn downcast_ref<T: Model>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn connector_name(&self) -> &str {
        self.connector().name()
    }
}
