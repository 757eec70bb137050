/// Static module registry and data-source list handling.
///
/// Modules are never loaded from disk. A configured location is resolved by
/// its final path component against a [`ModuleCatalog`] of factories that the
/// host registers at startup. Factories receive the configured cache so their
/// connectors share it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::module::DataSourceModule;
use crate::observability::Logger;
use crate::storage::CacheSettings;

pub type ModuleFactory =
    Arc<dyn Fn(&CacheSettings) -> anyhow::Result<DataSourceModule> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: BTreeMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&CacheSettings) -> anyhow::Result<DataSourceModule> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn instantiate(&self, name: &str, cache: &CacheSettings) -> Result<DataSourceModule> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| GatewayError::UnknownModule(name.to_string()))?;
        Ok(factory(cache)?)
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Splits a comma-separated list, dropping blanks.
pub fn parse_source_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

pub fn module_name(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()
}

/// Resolves each location to a module, in order. Pure: no filesystem access.
pub fn discover(
    paths: &[PathBuf],
    catalog: &ModuleCatalog,
    cache: &CacheSettings,
) -> Result<Vec<DataSourceModule>> {
    paths
        .iter()
        .map(|path| {
            let name = module_name(path)
                .ok_or_else(|| GatewayError::UnknownModule(path.display().to_string()))?;
            catalog.instantiate(name, cache)
        })
        .collect()
}

/// Dev modules replace local modules that share a context key, in place.
/// Dev modules with no local counterpart are appended.
pub fn override_local_sources(
    local: Vec<DataSourceModule>,
    dev: Vec<DataSourceModule>,
    logger: &dyn Logger,
) -> Vec<DataSourceModule> {
    let mut dev: Vec<Option<DataSourceModule>> = dev.into_iter().map(Some).collect();

    let mut merged: Vec<DataSourceModule> = local
        .into_iter()
        .map(|module| {
            let position = dev
                .iter()
                .position(|d| matches!(d, Some(d) if d.context_key() == module.context_key()));
            let replacement = position.and_then(|i| dev[i].take());
            match replacement {
                Some(replacement) => {
                    logger.info(&format!(
                        "Overriding local data source \"{}\" with a configured one",
                        module.context_key()
                    ));
                    replacement
                }
                None => module,
            }
        })
        .collect();

    for module in dev.into_iter().flatten() {
        logger.info(&format!("Adding configured data source \"{}\"", module.context_key()));
        merged.push(module);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ResolverSet;
    use crate::observability::{Level, RecordingLogger};
    use crate::testing::module;

    fn catalog() -> ModuleCatalog {
        ModuleCatalog::new()
            .register("externalDataSourceOne", |_| {
                Ok(module("Users", "type User { id: ID }", ResolverSet::new()))
            })
            .register("externalDataSourceTwo", |_| {
                Ok(module("Orders", "type Order { id: ID }", ResolverSet::new()))
            })
            .register("broken", |_| anyhow::bail!("failed to start"))
    }

    #[test]
    fn test_parse_source_list() {
        assert_eq!(
            parse_source_list(" ./a/one ,, ./b/two/ ,"),
            vec![PathBuf::from("./a/one"), PathBuf::from("./b/two/")]
        );
        assert!(parse_source_list("").is_empty());
    }

    #[test]
    fn test_discover_resolves_by_final_component() {
        let paths = parse_source_list("./fixtures/externalDataSourceOne, ../externalDataSourceTwo/");
        let modules = discover(&paths, &catalog(), &CacheSettings::default()).unwrap();
        let keys: Vec<_> = modules.iter().map(|m| m.context_key()).collect();
        assert_eq!(keys, vec!["Users", "Orders"]);
    }

    #[test]
    fn test_discover_errors() {
        let cache = CacheSettings::default();
        let err = discover(&[PathBuf::from("./missing")], &catalog(), &cache).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownModule(name) if name == "missing"));

        let err = discover(&[PathBuf::from("broken")], &catalog(), &cache).unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[test]
    fn test_dev_sources_override_by_context_key() {
        let logger = RecordingLogger::new();
        let local = vec![
            module("Users", "type LocalUser { id: ID }", ResolverSet::new()),
            module("Orders", "type Order { id: ID }", ResolverSet::new()),
        ];
        let dev = vec![
            module("Extra", "type Extra { id: ID }", ResolverSet::new()),
            module("Users", "type DevUser { id: ID }", ResolverSet::new()),
        ];

        let merged = override_local_sources(local, dev, &logger);

        let keys: Vec<_> = merged.iter().map(|m| m.context_key()).collect();
        assert_eq!(keys, vec!["Users", "Orders", "Extra"]);
        assert!(merged[0].schema_fragment().contains("DevUser"));
        assert_eq!(logger.messages_at(Level::Info).len(), 2);
    }
}
