/// Integration tests for composing data sources and serving requests

#[cfg(test)]
mod tests {
    use gateway_core::composer::{QUERY_TYPE, ROOT_SCHEMA};
    use gateway_core::config::{DeploymentMode, GatewayConfig};
    use gateway_core::connector::testing::ScriptedTransport;
    use gateway_core::connector::{Connector, HttpConnector};
    use gateway_core::error::GatewayError;
    use gateway_core::gateway::{Gateway, GatewayOptions, InboundRequest, ResponseHandle};
    use gateway_core::model::Model;
    use gateway_core::module::{mock, resolver, DataSourceModule, ResolverParams, ResolverSet};
    use gateway_core::observability::{Level, RecordingLogger};
    use gateway_core::record::QueryError;
    use gateway_core::registry::ModuleCatalog;
    use gateway_core::storage::{CacheSettings, MemoryStore};
    use gateway_core::testing::module;
    use serde_json::{json, Map, Value};
    use std::any::Any;
    use std::sync::Arc;
    use std::time::Duration;

    const USER_SCHEMA: &str = r#"
        type User {
          id: ID!
          name: String
          email: String
        }

        extend type Query {
          user(id: ID!): User
        }
    "#;

    struct UserConnector {
        http: HttpConnector,
    }

    impl Connector for UserConnector {
        fn http(&self) -> &HttpConnector {
            &self.http
        }
    }

    struct UserModel {
        connector: UserConnector,
    }

    impl UserModel {
        async fn get_user(&self, id: &str) -> gateway_core::Result<Value> {
            Ok(self.connector.get(&format!("/users/{}", id)).await?)
        }
    }

    impl Model for UserModel {
        fn connector(&self) -> &dyn Connector {
            &self.connector
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn user_module(transport: Arc<ScriptedTransport>) -> DataSourceModule {
        let cache = CacheSettings {
            backend: Some(Arc::new(MemoryStore::new())),
            ..CacheSettings::default()
        };
        configured_user_module(transport, &cache)
    }

    fn configured_user_module(transport: Arc<ScriptedTransport>, cache: &CacheSettings) -> DataSourceModule {
        let http = HttpConnector::builder_for::<UserConnector>("https://users.example.com")
            .cache_settings(cache)
            .build_with(transport);
        let model = Arc::new(UserModel {
            connector: UserConnector { http },
        });

        let resolvers = ResolverSet::new()
            .query(
                "user",
                resolver(|p: ResolverParams| async move {
                    let id = p.arg("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    p.context.require_model::<UserModel>("Users")?.get_user(&id).await
                }),
            )
            .data(
                "User",
                "email",
                resolver(|p: ResolverParams| async move {
                    Ok(p.parent.get("email").cloned().unwrap_or(Value::Null))
                }),
            )
            .mock("User", mock(|| json!({"id": "1234", "name": "John Doe"})));

        DataSourceModule::new("Users", USER_SCHEMA, resolvers, model)
    }

    fn users_transport() -> Arc<ScriptedTransport> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "https://users.example.com/users/7",
            200,
            json!({"id": "7", "name": "Ada", "email": "ada@example.com"}),
        );
        transport
    }

    #[tokio::test]
    async fn test_resolvers_reach_models_through_context() {
        let transport = users_transport();
        let gateway = Gateway::new(GatewayOptions {
            data_sources: vec![user_module(transport.clone())],
            ..GatewayOptions::default()
        })
        .unwrap();

        let options = gateway.options_for(&InboundRequest::default(), &ResponseHandle::default());
        let user = options.schema.resolver(QUERY_TYPE, "user").unwrap();
        let params = ResolverParams::new(options.context.clone()).with_arg("id", json!("7"));

        let value = user(params).await.unwrap();
        assert_eq!(value["name"], json!("Ada"));
        assert_eq!(transport.calls_to("https://users.example.com/users/7"), 1);

        let email = options.schema.resolver("User", "email").unwrap();
        let email = email(ResolverParams::new(options.context.clone()).with_parent(value))
            .await
            .unwrap();
        assert_eq!(email, json!("ada@example.com"));
    }

    #[tokio::test]
    async fn test_context_namespaces_each_model() {
        let mut extra = Map::new();
        extra.insert("requestId".to_string(), json!("abc"));
        let gateway = Gateway::new(GatewayOptions {
            data_sources: vec![
                module("Foo", "type Foo { id: ID }", ResolverSet::new()),
                module("Bar", "type Bar { id: ID }", ResolverSet::new()),
            ],
            extra_context: Some(Arc::new(move |_: &InboundRequest, _: &ResponseHandle| {
                extra.clone()
            })),
            ..GatewayOptions::default()
        })
        .unwrap();

        let options = gateway.options_for(&InboundRequest::default(), &ResponseHandle::default());

        assert_eq!(options.context.keys(), vec!["Bar", "Foo", "requestId"]);
        assert_eq!(options.context.model("Foo").unwrap().connector_name(), "FooConnector");
        assert_eq!(options.context.model("Bar").unwrap().connector_name(), "BarConnector");
        assert_eq!(options.context.extra("requestId"), Some(&json!("abc")));
    }

    #[test]
    fn test_duplicate_context_keys_abort_startup() {
        let result = Gateway::new(GatewayOptions {
            data_sources: vec![
                module("Foo", "type Foo { id: ID }", ResolverSet::new()),
                module("Foo", "type Other { id: ID }", ResolverSet::new()),
            ],
            ..GatewayOptions::default()
        });
        assert!(matches!(result, Err(GatewayError::DuplicateContextKey(key)) if key == "Foo"));
    }

    #[tokio::test]
    async fn test_mock_mode_uses_module_mocks() {
        let transport = users_transport();
        let gateway = Gateway::new(GatewayOptions {
            data_sources: vec![user_module(transport.clone())],
            enable_mock_data: true,
            ..GatewayOptions::default()
        })
        .unwrap();

        let options = gateway.options_for(&InboundRequest::default(), &ResponseHandle::default());
        let user = options.schema.resolver(QUERY_TYPE, "user").unwrap();
        let value = user(ResolverParams::new(options.context.clone()).with_arg("id", json!("7")))
            .await
            .unwrap();

        assert_eq!(value, json!({"id": "1234", "name": "John Doe"}));
        assert_eq!(transport.calls_to("https://users.example.com/users/7"), 0);

        let email = options.schema.resolver("User", "email").unwrap();
        let email = email(ResolverParams::new(options.context.clone()).with_parent(value))
            .await
            .unwrap();
        assert_eq!(email, json!("Hello World"));
    }

    #[tokio::test]
    async fn test_preserved_resolvers_still_fetch() {
        let transport = users_transport();
        let gateway = Gateway::new(GatewayOptions {
            data_sources: vec![user_module(transport.clone())],
            enable_mock_data: true,
            preserve_resolvers: true,
            ..GatewayOptions::default()
        })
        .unwrap();

        let options = gateway.options_for(&InboundRequest::default(), &ResponseHandle::default());
        let user = options.schema.resolver(QUERY_TYPE, "user").unwrap();
        let value = user(ResolverParams::new(options.context.clone()).with_arg("id", json!("7")))
            .await
            .unwrap();

        assert_eq!(value["name"], json!("Ada"));
        let name = options.schema.resolver("User", "name").unwrap();
        assert_eq!(
            name(ResolverParams::new(options.context.clone()).with_parent(value)).await.unwrap(),
            json!("Ada")
        );
    }

    #[tokio::test]
    async fn test_errors_are_formatted_for_clients_and_logged_for_operators() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("https://users.example.com/users/7", "timeout");
        let logger = Arc::new(RecordingLogger::new());
        let gateway = Gateway::new(GatewayOptions {
            data_sources: vec![user_module(transport)],
            logger: logger.clone(),
            mode: DeploymentMode::Production,
            ..GatewayOptions::default()
        })
        .unwrap();

        let options = gateway.options_for(&InboundRequest::default(), &ResponseHandle::default());
        let user = options.schema.resolver(QUERY_TYPE, "user").unwrap();
        let err = user(ResolverParams::new(options.context.clone()).with_arg("id", json!("7")))
            .await
            .unwrap_err();

        let body = options.format_error.format_to_value(err);
        assert_eq!(body["statusCode"], json!(500));
        assert_eq!(body["errorCode"], json!("GRAPHQL_QUERY_ERROR"));
        assert!(body["description"].as_str().unwrap().contains("timeout"));
        assert!(body.get("targetEndpoint").is_none());

        let guid = body["guid"].as_str().unwrap();
        let logged = logger.messages_at(Level::Error);
        assert!(logged.iter().any(|line| line.contains(guid)
            && line.contains("https://users.example.com/users/7")));

        let query = options
            .format_error
            .format_to_value(QueryError::new("Cannot query field \"nope\" on type \"Query\".").at(1, 3));
        assert_eq!(query["errorCode"], json!("GRAPHQL_ERROR"));
        assert_eq!(query["data"]["locations"], json!([{"line": 1, "column": 3}]));
        assert!(!query["description"].as_str().unwrap().contains('"'));
    }

    #[tokio::test]
    async fn test_gateway_from_config_overrides_local_sources() {
        let transport = users_transport();
        let dev_transport = transport.clone();
        let catalog = ModuleCatalog::new().register("users-dev", move |cache: &CacheSettings| {
            Ok(configured_user_module(dev_transport.clone(), cache))
        });
        let cache = CacheSettings {
            backend: Some(Arc::new(MemoryStore::new())),
            ttl: Duration::from_secs(42),
        };
        let config = GatewayConfig::default().with_overrides(Some("production"), Some("./sources/users-dev"));
        let local = vec![
            module("Users", "type LocalUser { id: ID }", ResolverSet::new()),
            module("Orders", "type Order { id: ID }", ResolverSet::new()),
        ];

        let options =
            GatewayOptions::from_config(&config, local, &catalog, cache, Arc::new(RecordingLogger::new()))
                .unwrap();
        assert!(!options.enable_mock_data);
        assert_eq!(options.mode, DeploymentMode::Production);

        let gateway = Gateway::new(options).unwrap();
        let schema = gateway.schema();
        assert_eq!(schema.type_defs()[0], ROOT_SCHEMA);
        assert!(schema.index().get("User").is_some());
        assert!(schema.index().get("LocalUser").is_none());
        let keys: Vec<_> = schema.models().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Users", "Orders"]);

        let users = schema.models()[0].1.downcast_ref::<UserModel>().unwrap();
        assert!(users.connector.http().cache_enabled());
        assert_eq!(users.connector.http().cache_ttl(), Duration::from_secs(42));
        assert_eq!(gateway.cache_settings().ttl, Duration::from_secs(42));
    }
}
