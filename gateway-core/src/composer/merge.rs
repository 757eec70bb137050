use std::collections::{BTreeMap, HashMap};

use crate::module::{DataSourceModule, FieldResolvers, MockResolvers, ResolverFn};
use crate::observability::Logger;

pub type ResolverMap = BTreeMap<String, FieldResolvers>;

pub const QUERY_TYPE: &str = "Query";
pub const MUTATION_TYPE: &str = "Mutation";
pub const BUILT_IN_OWNER: &str = "built-in";

/// Folds module resolvers into `seed`, field by field. A field declared by a
/// later module replaces the earlier one and the replacement is logged with
/// both owners named.
pub fn merge_resolvers(
    seed: ResolverMap,
    modules: &[DataSourceModule],
    logger: &dyn Logger,
) -> ResolverMap {
    let mut merged = Merger::new(seed, logger);

    for module in modules {
        merged.extend(QUERY_TYPE, &module.resolvers().query, module.context_key());
    }
    for module in modules {
        merged.extend(MUTATION_TYPE, &module.resolvers().mutation, module.context_key());
    }
    for module in modules {
        for (type_name, fields) in &module.resolvers().data {
            merged.extend(type_name, fields, module.context_key());
        }
    }

    merged.map
}

/// Later modules win per type name.
pub fn merge_mocks(modules: &[DataSourceModule]) -> MockResolvers {
    modules
        .iter()
        .filter_map(|module| module.resolvers().mock.as_ref())
        .fold(MockResolvers::new(), |mut acc, mocks| {
            acc.extend(mocks.iter().map(|(k, v)| (k.clone(), v.clone())));
            acc
        })
}

struct Merger<'a> {
    map: ResolverMap,
    owners: HashMap<(String, String), String>,
    logger: &'a dyn Logger,
}

impl<'a> Merger<'a> {
    fn new(seed: ResolverMap, logger: &'a dyn Logger) -> Self {
        let owners = seed
            .iter()
            .flat_map(|(type_name, fields)| {
                fields
                    .keys()
                    .map(move |field| ((type_name.clone(), field.clone()), BUILT_IN_OWNER.to_string()))
            })
            .collect();
        Self {
            map: seed,
            owners,
            logger,
        }
    }

    fn extend(&mut self, type_name: &str, fields: &FieldResolvers, owner: &str) {
        for (field, resolver) in fields {
            self.insert(type_name, field, resolver.clone(), owner);
        }
    }

    fn insert(&mut self, type_name: &str, field: &str, resolver: ResolverFn, owner: &str) {
        let key = (type_name.to_string(), field.to_string());
        if let Some(previous) = self.owners.insert(key, owner.to_string()) {
            self.logger.warn(&format!(
                "Resolver {}.{} from \"{}\" replaces the one from \"{}\"",
                type_name, field, owner, previous
            ));
        }
        self.map
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), resolver);
    }
}
