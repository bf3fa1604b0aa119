//! Request template engine.
//!
//! A [`RequestConfig`] is compiled once into a [`RequestTemplate`]; every
//! iteration then draws its random values into an [`IterationContext`] and
//! materializes a concrete request from it. All validation happens during
//! compilation, so materializing never fails.
mod order;
mod slots;


use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;

use crate::args::{HttpMethod, RandomField};
use crate::error::ConfigError;

use slots::{Segment, parse_segments, whole_slot};

pub use order::{DEFAULT_ORDER_URL, order_body, order_random_fields};

/// Immutable description of the request every iteration sends.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: HttpMethod,
    pub url: String,
    headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub random_fields: Vec<RandomField>,
    pub vars: BTreeMap<String, Value>,
}

impl RequestConfig {
    #[must_use]
    pub const fn new(method: HttpMethod, url: String) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            random_fields: Vec::new(),
            vars: BTreeMap::new(),
        }
    }

    /// Sets a header, replacing any existing header with the same name
    /// (compared case-insensitively).
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name = name.trim();
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            entry.1 = value.to_owned();
            return;
        }
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Per-iteration state. Built fresh for every iteration and dropped once the
/// result has been recorded.
#[derive(Debug, Clone)]
pub struct IterationContext {
    pub worker: usize,
    pub iteration: u64,
    pub idempotency_key: Arc<str>,
    pub random_values: BTreeMap<String, i64>,
    pub timestamp_ms: i64,
}

impl IterationContext {
    #[must_use]
    pub fn new(
        worker: usize,
        iteration: u64,
        idempotency_key: Arc<str>,
        random_values: BTreeMap<String, i64>,
    ) -> Self {
        Self {
            worker,
            iteration,
            idempotency_key,
            random_values,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A request ready for the transport.
#[derive(Debug, Clone)]
pub struct MaterializedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MaterializedRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    IdempotencyKey,
    Iteration,
    Worker,
    TimestampMs,
}

impl Builtin {
    const ALL: [(&'static str, Builtin); 4] = [
        ("idempotency_key", Builtin::IdempotencyKey),
        ("iteration", Builtin::Iteration),
        ("worker", Builtin::Worker),
        ("timestamp_ms", Builtin::TimestampMs),
    ];

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(builtin_name, _)| *builtin_name == name)
            .map(|(_, builtin)| *builtin)
    }

    fn value(self, ctx: &IterationContext) -> Value {
        match self {
            Builtin::IdempotencyKey => Value::String(ctx.idempotency_key.to_string()),
            Builtin::Iteration => Value::from(ctx.iteration),
            Builtin::Worker => Value::from(ctx.worker),
            Builtin::TimestampMs => Value::from(ctx.timestamp_ms),
        }
    }
}

#[derive(Debug, Clone)]
enum SlotRef {
    Random(String),
    Var(Value),
    Builtin(Builtin),
}

impl SlotRef {
    fn value(&self, ctx: &IterationContext) -> Value {
        match self {
            SlotRef::Random(name) => {
                Value::from(ctx.random_values.get(name).copied().unwrap_or_default())
            }
            SlotRef::Var(value) => value.clone(),
            SlotRef::Builtin(builtin) => builtin.value(ctx),
        }
    }

    fn push_text(&self, ctx: &IterationContext, out: &mut String) {
        match self.value(ctx) {
            Value::String(text) => out.push_str(&text),
            other => out.push_str(&other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Slot(SlotRef),
}

#[derive(Debug, Clone)]
struct TextTemplate {
    parts: Vec<Part>,
}

impl TextTemplate {
    fn render(&self, ctx: &IterationContext) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Slot(slot) => slot.push_text(ctx, &mut out),
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
enum BodyNode {
    Literal(Value),
    Slot(SlotRef),
    Text(TextTemplate),
    Array(Vec<BodyNode>),
    Object(Vec<(String, BodyNode)>),
}

impl BodyNode {
    fn render(&self, ctx: &IterationContext) -> Value {
        match self {
            BodyNode::Literal(value) => value.clone(),
            BodyNode::Slot(slot) => slot.value(ctx),
            BodyNode::Text(text) => Value::String(text.render(ctx)),
            BodyNode::Array(items) => {
                Value::Array(items.iter().map(|item| item.render(ctx)).collect())
            }
            BodyNode::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, node)| (key.clone(), node.render(ctx)))
                    .collect(),
            ),
        }
    }
}

/// Compiled, validated form of a [`RequestConfig`].
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: HttpMethod,
    url: TextTemplate,
    headers: Vec<(String, TextTemplate)>,
    body: Option<BodyNode>,
    random_fields: Vec<RandomField>,
}

impl RequestTemplate {
    /// Validates the config and resolves every `{{slot}}`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a slot is not declared, a random range is
    /// empty, a name is reserved or declared twice, or the URL or a header
    /// is invalid.
    pub fn compile(config: &RequestConfig) -> Result<Self, ConfigError> {
        let mut random: BTreeMap<String, RandomField> = BTreeMap::new();
        for field in &config.random_fields {
            if Builtin::from_name(&field.name).is_some() {
                return Err(ConfigError::ReservedTemplateField {
                    name: field.name.clone(),
                });
            }
            if field.min > field.max {
                return Err(ConfigError::InvalidRandomRange {
                    name: field.name.clone(),
                    min: field.min,
                    max: field.max,
                });
            }
            random.insert(field.name.clone(), field.clone());
        }
        for name in config.vars.keys() {
            if Builtin::from_name(name).is_some() {
                return Err(ConfigError::ReservedTemplateField { name: name.clone() });
            }
            if random.contains_key(name) {
                return Err(ConfigError::DuplicateTemplateField { name: name.clone() });
            }
        }

        let resolver = SlotResolver {
            random: &random,
            vars: &config.vars,
        };

        let url = resolver.text(&config.url)?;
        let mut headers = Vec::with_capacity(config.headers.len());
        for (name, value) in &config.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::InvalidHeaderName { name: name.clone() });
            }
            headers.push((name.clone(), resolver.text(value)?));
        }
        let body = config
            .body
            .as_ref()
            .map(|body| resolver.body(body))
            .transpose()?;

        let template = Self {
            method: config.method,
            url,
            headers,
            body,
            random_fields: random.into_values().collect(),
        };
        template.validate_sample()?;
        Ok(template)
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn random_fields(&self) -> &[RandomField] {
        &self.random_fields
    }

    /// Draws one value per declared random field.
    pub fn draw<R>(&self, rng: &mut R) -> BTreeMap<String, i64>
    where
        R: Rng + ?Sized,
    {
        self.random_fields
            .iter()
            .map(|field| (field.name.clone(), rng.gen_range(field.min..=field.max)))
            .collect()
    }

    #[must_use]
    pub fn materialize(&self, ctx: &IterationContext) -> MaterializedRequest {
        let body = self
            .body
            .as_ref()
            .map(|node| node.render(ctx).to_string().into_bytes())
            .unwrap_or_default();
        MaterializedRequest {
            method: self.method,
            url: self.url.render(ctx),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.render(ctx)))
                .collect(),
            body,
        }
    }

    fn validate_sample(&self) -> Result<(), ConfigError> {
        let random_values = self
            .random_fields
            .iter()
            .map(|field| (field.name.clone(), field.min))
            .collect();
        let sample = IterationContext::new(0, 0, Arc::from("sample"), random_values);
        let request = self.materialize(&sample);

        let parsed = url::Url::parse(&request.url).map_err(|err| ConfigError::InvalidUrl {
            url: request.url.clone(),
            source: err,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme { url: request.url });
        }
        for (name, value) in &request.headers {
            if HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::InvalidHeaderValue { name: name.clone() });
            }
        }
        Ok(())
    }
}

struct SlotResolver<'cfg> {
    random: &'cfg BTreeMap<String, RandomField>,
    vars: &'cfg BTreeMap<String, Value>,
}

impl SlotResolver<'_> {
    fn slot(&self, name: &str) -> Result<SlotRef, ConfigError> {
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(SlotRef::Builtin(builtin));
        }
        if self.random.contains_key(name) {
            return Ok(SlotRef::Random(name.to_owned()));
        }
        if let Some(value) = self.vars.get(name) {
            return Ok(SlotRef::Var(value.clone()));
        }
        Err(ConfigError::MissingTemplateField {
            name: name.to_owned(),
        })
    }

    fn text(&self, input: &str) -> Result<TextTemplate, ConfigError> {
        let mut parts = Vec::new();
        for segment in parse_segments(input) {
            parts.push(match segment {
                Segment::Literal(text) => Part::Literal(text),
                Segment::Slot(name) => Part::Slot(self.slot(&name)?),
            });
        }
        Ok(TextTemplate { parts })
    }

    fn body(&self, value: &Value) -> Result<BodyNode, ConfigError> {
        match value {
            Value::String(text) => {
                if let Some(name) = whole_slot(text) {
                    return Ok(BodyNode::Slot(self.slot(&name)?));
                }
                let template = self.text(text)?;
                if template
                    .parts
                    .iter()
                    .all(|part| matches!(part, Part::Literal(_)))
                {
                    Ok(BodyNode::Literal(value.clone()))
                } else {
                    Ok(BodyNode::Text(template))
                }
            }
            Value::Array(items) => Ok(BodyNode::Array(
                items
                    .iter()
                    .map(|item| self.body(item))
                    .collect::<Result<_, _>>()?,
            )),
            Value::Object(fields) => {
                let mut nodes = Vec::with_capacity(fields.len());
                for (key, field) in fields {
                    nodes.push((key.clone(), self.body(field)?));
                }
                Ok(BodyNode::Object(nodes))
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(BodyNode::Literal(value.clone())),
        }
    }
}
