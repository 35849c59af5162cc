use std::collections::BTreeMap;

use utoipa::openapi::{
    path::{OperationBuilder, ParameterBuilder, ParameterIn, PathItemBuilder, PathItemType},
    request_body::RequestBodyBuilder,
    security::{HttpAuthScheme, HttpBuilder, SecurityRequirement, SecurityScheme},
    ComponentsBuilder, InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder, Required,
    ResponseBuilder,
};

use super::{Endpoint, Verb};

const BEARER: &str = "bearer_auth";

impl From<Verb> for PathItemType {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => PathItemType::Get,
            Verb::Post => PathItemType::Post,
            Verb::Put => PathItemType::Put,
            Verb::Delete => PathItemType::Delete,
        }
    }
}

/// `/accounts/:code` becomes `/accounts/{code}` plus the parameter names.
fn openapi_path(path: &str) -> (String, Vec<String>) {
    let mut params = Vec::new();
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => {
                params.push(name.to_string());
                format!("{{{}}}", name)
            }
            None => segment.to_string(),
        })
        .collect();
    (segments.join("/"), params)
}

fn operation_id(verb: Verb, path: &str) -> String {
    let mut id = format!("{:?}", verb).to_lowercase();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        id.push('_');
        id.push_str(&segment.trim_start_matches(':').replace('-', "_"));
    }
    id
}

fn public_operation(tag: &str, summary: &str, verb: Verb, path: &str) -> OperationBuilder {
    let mut op = OperationBuilder::new()
        .tag(tag)
        .summary(Some(summary))
        .operation_id(Some(operation_id(verb, path)))
        .response("200", ResponseBuilder::new().description("Success").build());
    if matches!(verb, Verb::Post | Verb::Put) {
        op = op.request_body(Some(
            RequestBodyBuilder::new()
                .description(Some("JSON request body"))
                .required(Some(Required::True))
                .build(),
        ));
    }
    op
}

/// OpenAPI 3 document for the given endpoints and the public routes.
pub fn openapi(endpoints: &[Endpoint]) -> OpenApi {
    let mut items: BTreeMap<String, PathItemBuilder> = BTreeMap::new();

    for (verb, path, tag, summary) in [
        (Verb::Get, "/health", "system", "Service health"),
        (Verb::Get, "/metrics", "system", "Prometheus metrics"),
        (Verb::Post, "/auth/login", "auth", "Exchange a username and password for a bearer token"),
    ] {
        let op = public_operation(tag, summary, verb, path).build();
        let item = items.remove(path).unwrap_or_else(PathItemBuilder::new);
        items.insert(path.to_string(), item.operation(verb.into(), op));
    }

    for endpoint in endpoints {
        let (path, params) = openapi_path(&endpoint.path);
        let mut op = public_operation(endpoint.tag, endpoint.summary, endpoint.verb, &endpoint.path)
            .response("401", ResponseBuilder::new().description("Missing or invalid credentials").build())
            .response("403", ResponseBuilder::new().description("Role not permitted").build())
            .security(SecurityRequirement::new(BEARER, Vec::<String>::new()));
        for name in params {
            op = op.parameter(
                ParameterBuilder::new()
                    .name(name)
                    .parameter_in(ParameterIn::Path)
                    .required(Required::True)
                    .build(),
            );
        }
        let item = items.remove(&path).unwrap_or_else(PathItemBuilder::new);
        items.insert(path, item.operation(endpoint.verb.into(), op.build()));
    }

    let paths = items
        .into_iter()
        .fold(PathsBuilder::new(), |paths, (path, item)| paths.path(path, item.build()));

    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("ACAS")
                .version(env!("CARGO_PKG_VERSION"))
                .description(Some(env!("CARGO_PKG_DESCRIPTION")))
                .build(),
        )
        .paths(paths.build())
        .components(Some(
            ComponentsBuilder::new()
                .security_scheme(
                    BEARER,
                    SecurityScheme::Http(
                        HttpBuilder::new()
                            .scheme(HttpAuthScheme::Bearer)
                            .bearer_format("JWT")
                            .build(),
                    ),
                )
                .build(),
        ))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_path_parameters() {
        let (path, params) = openapi_path("/api/v1/journals/:number/reverse");
        assert_eq!(path, "/api/v1/journals/{number}/reverse");
        assert_eq!(params, vec!["number".to_string()]);
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let endpoints = super::super::endpoints();
        let mut ids: Vec<String> = endpoints
            .iter()
            .map(|e| operation_id(e.verb, &e.path))
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_document_lists_every_endpoint() {
        let endpoints = super::super::endpoints();
        let doc = serde_json::to_value(openapi(&endpoints)).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        for endpoint in &endpoints {
            let (path, _) = openapi_path(&endpoint.path);
            let method = format!("{:?}", endpoint.verb).to_lowercase();
            assert!(paths[&path].get(&method).is_some(), "{} {}", method, path);
        }
        assert!(paths.contains_key("/auth/login"));
    }
}
