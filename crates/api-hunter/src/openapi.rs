//! Swagger 2.0 / OpenAPI 3.x document parsing.
//!
//! Reduces a JSON or YAML API description to [`ApiOperation`]s. Only the
//! parts that name endpoints are read: paths, verbs, parameter names, and
//! the top-level properties of request bodies.

use std::collections::BTreeSet;

use serde_json::Value;
use url::Url;

use crate::store::ApiOperation;
use crate::types::{HunterError, HunterResult, Method};

/// Parse an API description. JSON is tried first, then YAML.
pub fn parse_document(text: &str, document: &str) -> HunterResult<Vec<ApiOperation>> {
    let root: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(json_err) => serde_yaml::from_str(text).map_err(|yaml_err| {
            HunterError::malformed(
                document,
                format!("neither JSON ({json_err}) nor YAML ({yaml_err})"),
            )
        })?,
    };

    let paths = root
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| HunterError::malformed(document, "no `paths` object"))?;
    let prefix = path_prefix(&root);

    let mut operations = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        let shared = item
            .get("parameters")
            .map(|p| parameter_names(&root, p))
            .unwrap_or_default();

        for (verb, op) in item {
            let Some(method) = Method::parse(verb) else {
                continue;
            };
            let mut parameters = shared.clone();
            if let Some(params) = op.get("parameters") {
                parameters.extend(parameter_names(&root, params));
            }
            if let Some(body) = op.get("requestBody") {
                parameters.extend(request_body_properties(&root, body));
            }
            operations.push(ApiOperation {
                path: join_prefix(&prefix, path),
                method,
                parameters,
            });
        }
    }

    Ok(operations)
}

/// Swagger 2 `basePath`, else the path of the first OpenAPI 3 server URL.
fn path_prefix(root: &Value) -> String {
    let raw = root
        .get("basePath")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            let server = root.get("servers")?.get(0)?.get("url")?.as_str()?;
            match Url::parse(server) {
                Ok(url) => Some(url.path().to_string()),
                Err(_) if server.starts_with('/') => {
                    Some(server.split(['?', '#']).next().unwrap_or("").to_string())
                }
                Err(_) => None,
            }
        })
        .unwrap_or_default();
    raw.trim_end_matches('/').to_string()
}

fn join_prefix(prefix: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

/// Names from a `parameters` array. Swagger 2 `in: body` parameters
/// contribute their schema's properties instead of their own name.
fn parameter_names(root: &Value, params: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for param in params.as_array().into_iter().flatten() {
        let param = resolve_ref(root, param);
        if param.get("in").and_then(Value::as_str) == Some("body") {
            if let Some(schema) = param.get("schema") {
                names.extend(schema_properties(root, schema));
            }
            continue;
        }
        if let Some(name) = param.get("name").and_then(Value::as_str) {
            names.insert(name.to_string());
        }
    }
    names
}

fn request_body_properties(root: &Value, body: &Value) -> BTreeSet<String> {
    let body = resolve_ref(root, body);
    body.get("content")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|content| content.values())
        .filter_map(|media| media.get("schema"))
        .flat_map(|schema| schema_properties(root, schema))
        .collect()
}

fn schema_properties(root: &Value, schema: &Value) -> BTreeSet<String> {
    resolve_ref(root, schema)
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

/// Follow one local `$ref` (`#/definitions/..`, `#/components/..`).
fn resolve_ref<'a>(root: &'a Value, value: &'a Value) -> &'a Value {
    value
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix('#'))
        .and_then(|pointer| root.pointer(pointer))
        .unwrap_or(value)
}
