//! Endpoint resolution: view props → [`EndpointsMapping`].
//!
//! Resolution runs on every reconciliation, including ones that leave the
//! mapping unchanged, so every resolver must be a pure function of the
//! props it is given.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use tether_api::Endpoint;

use crate::error::CoreError;
use crate::mapping::{EndpointsMapping, Key};
use crate::merge::Props;

type ResolveFn = dyn Fn(&Props) -> Result<EndpointsMapping, CoreError> + Send + Sync;

/// Produces the endpoint mapping for the current props.
#[derive(Clone)]
pub enum EndpointResolver {
    /// The same mapping regardless of props.
    Fixed(EndpointsMapping),
    /// A caller-supplied function of the props.
    Dynamic(Arc<ResolveFn>),
    /// Per-key path templates with `{prop}` placeholders.
    Templated(IndexMap<Key, EndpointTemplate>),
}

impl EndpointResolver {
    pub fn fixed(mapping: EndpointsMapping) -> Self {
        Self::Fixed(mapping)
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Props) -> Result<EndpointsMapping, CoreError> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Parse one template per key, e.g. `transactions = "account/{code}/transactions"`.
    pub fn templated<K, S>(templates: impl IntoIterator<Item = (K, S)>) -> Result<Self, CoreError>
    where
        K: Into<Key>,
        S: AsRef<str>,
    {
        let parsed = templates
            .into_iter()
            .map(|(key, template)| Ok((key.into(), EndpointTemplate::parse(template.as_ref())?)))
            .collect::<Result<IndexMap<_, _>, CoreError>>()?;
        Ok(Self::Templated(parsed))
    }

    pub fn resolve(&self, props: &Props) -> Result<EndpointsMapping, CoreError> {
        match self {
            Self::Fixed(mapping) => Ok(mapping.clone()),
            Self::Dynamic(f) => f(props),
            Self::Templated(templates) => {
                let mut mapping = EndpointsMapping::new();
                for (key, template) in templates {
                    if let Some(endpoint) = template.render(props)? {
                        mapping.insert(key.clone(), endpoint);
                    }
                }
                Ok(mapping)
            }
        }
    }
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(mapping) => f.debug_tuple("Fixed").field(mapping).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::Templated(templates) => f.debug_tuple("Templated").field(templates).finish(),
        }
    }
}

impl From<EndpointsMapping> for EndpointResolver {
    fn from(mapping: EndpointsMapping) -> Self {
        Self::Fixed(mapping)
    }
}

// ── Templates ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// An endpoint path with `{name}` placeholders filled from props.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl EndpointTemplate {
    pub fn parse(source: &str) -> Result<Self, CoreError> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find(['{', '}']) {
            if rest[open..].starts_with('}') {
                return Err(CoreError::resolution(format!(
                    "unmatched '}}' in endpoint template '{source}'"
                )));
            }
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_owned()));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                CoreError::resolution(format!("unterminated '{{' in endpoint template '{source}'"))
            })?;
            let name = &after[..close];
            if name.is_empty() || name.contains('{') {
                return Err(CoreError::resolution(format!(
                    "invalid placeholder '{{{name}}}' in endpoint template '{source}'"
                )));
            }
            segments.push(Segment::Placeholder(name.to_owned()));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the props this template reads.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill in the placeholders.
    ///
    /// Returns `Ok(None)` when a referenced prop is absent, `null` or an
    /// empty string: the key is then left out of the mapping.
    pub fn render(&self, props: &Props) -> Result<Option<Endpoint>, CoreError> {
        let mut path = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Placeholder(name) => match props.get(name) {
                    None | Some(Value::Null) => return Ok(None),
                    // An empty segment would collapse into a different endpoint.
                    Some(Value::String(s)) if s.is_empty() => return Ok(None),
                    Some(Value::String(s)) => path.push_str(s),
                    Some(v @ (Value::Number(_) | Value::Bool(_))) => path.push_str(&v.to_string()),
                    Some(Value::Array(_) | Value::Object(_)) => {
                        return Err(CoreError::resolution(format!(
                            "prop '{name}' used in '{}' is not a scalar",
                            self.source
                        )));
                    }
                },
            }
        }
        Ok(Some(Endpoint::new(path)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn props(value: Value) -> Props {
        match value {
            Value::Object(map) => map,
            _ => Props::new(),
        }
    }

    #[test]
    fn fixed_ignores_props() {
        let mapping = EndpointsMapping::new().with("devices", "devices/registered");
        let resolver = EndpointResolver::fixed(mapping.clone());
        assert_eq!(resolver.resolve(&props(json!({ "x": 1 }))).unwrap(), mapping);
    }

    #[test]
    fn dynamic_reads_props() {
        let resolver = EndpointResolver::from_fn(|p| {
            let id = p
                .get("deviceID")
                .and_then(Value::as_str)
                .ok_or_else(|| CoreError::resolution("deviceID missing"))?;
            Ok(EndpointsMapping::new().with("status", format!("devices/{id}/status")))
        });

        let mapping = resolver.resolve(&props(json!({ "deviceID": "abc" }))).unwrap();
        assert_eq!(mapping.get("status"), Some(&Endpoint::from("devices/abc/status")));

        let err = resolver.resolve(&Props::new()).unwrap_err();
        assert!(matches!(err, CoreError::Resolution { .. }));
    }

    #[test]
    fn template_fills_placeholders() {
        let resolver = EndpointResolver::templated([
            ("transactions", "account/{code}/transactions"),
            ("balance", "account/{code}/balance"),
            ("version", "version"),
        ])
        .unwrap();

        let mapping = resolver.resolve(&props(json!({ "code": "tbtc" }))).unwrap();
        assert_eq!(
            mapping,
            EndpointsMapping::new()
                .with("transactions", "account/tbtc/transactions")
                .with("balance", "account/tbtc/balance")
                .with("version", "version")
        );
    }

    #[test]
    fn template_omits_keys_with_missing_props() {
        let resolver = EndpointResolver::templated([
            ("transactions", "account/{code}/transactions"),
            ("accounts", "accounts"),
        ])
        .unwrap();

        let mapping = resolver.resolve(&props(json!({ "code": null }))).unwrap();
        assert_eq!(mapping, EndpointsMapping::new().with("accounts", "accounts"));
    }

    #[test]
    fn template_treats_empty_string_as_missing() {
        let t = EndpointTemplate::parse("account/{code}").unwrap();
        assert_eq!(t.render(&props(json!({ "code": "" }))).unwrap(), None);

        let resolver = EndpointResolver::templated([
            ("balance", "account/{code}/balance"),
            ("accounts", "accounts"),
        ])
        .unwrap();
        let mapping = resolver.resolve(&props(json!({ "code": "" }))).unwrap();
        assert_eq!(mapping, EndpointsMapping::new().with("accounts", "accounts"));
    }

    #[test]
    fn template_renders_numbers_and_bools() {
        let t = EndpointTemplate::parse("page/{n}/{flag}").unwrap();
        let ep = t.render(&props(json!({ "n": 3, "flag": true }))).unwrap();
        assert_eq!(ep, Some(Endpoint::from("page/3/true")));
    }

    #[test]
    fn template_rejects_structured_props() {
        let t = EndpointTemplate::parse("account/{code}").unwrap();
        let err = t.render(&props(json!({ "code": ["a"] }))).unwrap_err();
        assert!(matches!(err, CoreError::Resolution { .. }));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(EndpointTemplate::parse("account/{code").is_err());
        assert!(EndpointTemplate::parse("account/code}").is_err());
        assert!(EndpointTemplate::parse("account/{}").is_err());
    }

    #[test]
    fn placeholders_are_listed() {
        let t = EndpointTemplate::parse("devices/{deviceID}/{sub}").unwrap();
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["deviceID", "sub"]);
    }
}
