//! Filters, projections and pagination for document queries

use crate::core::error::{DocError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Sort direction for sort keys and index fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Comparison operator of a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Regex,
}

/// A single condition on a (possibly dotted) field path
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

/// Sort key of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    /// Parse `field`, `field:asc` or `field:desc`
    pub fn parse(expr: &str) -> Result<Self> {
        let (field, direction) = match expr.split_once(':') {
            Some((field, "asc")) => (field, SortDirection::Ascending),
            Some((field, "desc")) => (field, SortDirection::Descending),
            Some((_, other)) => {
                return Err(DocError::field_validation(
                    "sort",
                    format!("unknown sort direction '{}'", other),
                ));
            }
            None => (expr, SortDirection::Ascending),
        };

        if field.is_empty() {
            return Err(DocError::field_validation("sort", "sort field is empty"));
        }

        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Conjunction of conditions plus an optional sort key
///
/// # Example
/// ```rust,ignore
/// let filter = Filter::new()
///     .eq("instance_id", "shop-1")
///     .gte("quantity", 1)
///     .sort_by("date_created", SortDirection::Descending);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
    sort: Option<SortKey>,
}

impl Filter {
    /// An empty filter matching every document
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, field: impl Into<String>, op: Operator, value: Value) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Operator::Eq, value.into())
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Operator::Ne, value.into())
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Operator::Gt, value.into())
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Operator::Gte, value.into())
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Operator::Lt, value.into())
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Operator::Lte, value.into())
    }

    pub fn is_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.with(field, Operator::In, Value::Array(values))
    }

    /// Regular-expression match on a string field
    pub fn matches(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(field, Operator::Regex, Value::String(pattern.into()))
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn sort(&self) -> Option<&SortKey> {
        self.sort.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse a filter from its JSON form
    ///
    /// # Format
    /// - Exact match: `{"field": "value"}`
    /// - Comparison: `{"field>": v, "field>=": v, "field<": v, "field<=": v}`
    /// - Negation: `{"field!": v}`
    /// - Pattern: `{"field~": "^abc"}`
    /// - Membership: `{"field": [v1, v2]}` on a scalar field is an `$in`
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(DocError::field_validation(
                "filter",
                "filter must be a JSON object",
            ));
        };

        let mut filter = Filter::new();
        for (key, value) in object {
            let (field, op) = if let Some(field) = key.strip_suffix(">=") {
                (field, Operator::Gte)
            } else if let Some(field) = key.strip_suffix("<=") {
                (field, Operator::Lte)
            } else if let Some(field) = key.strip_suffix('>') {
                (field, Operator::Gt)
            } else if let Some(field) = key.strip_suffix('<') {
                (field, Operator::Lt)
            } else if let Some(field) = key.strip_suffix('!') {
                (field, Operator::Ne)
            } else if let Some(field) = key.strip_suffix('~') {
                (field, Operator::Regex)
            } else if value.is_array() {
                (key.as_str(), Operator::In)
            } else {
                (key.as_str(), Operator::Eq)
            };

            if field.is_empty() {
                return Err(DocError::field_validation("filter", "empty field name"));
            }
            if op == Operator::Regex && !value.is_string() {
                return Err(DocError::field_validation(
                    "filter",
                    format!("pattern for '{}' must be a string", field),
                ));
            }
            filter = filter.with(field, op, value.clone());
        }

        Ok(filter)
    }

    /// Evaluate the filter against a document held in memory
    pub fn matches_document(&self, document: &Value) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(lookup_path(document, &condition.field)))
    }
}

impl Condition {
    fn matches(&self, actual: Option<&Value>) -> bool {
        let actual = actual.unwrap_or(&Value::Null);
        match self.op {
            Operator::Eq => value_equals(actual, &self.value),
            Operator::Ne => !value_equals(actual, &self.value),
            Operator::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => match &self.value {
                Value::Array(candidates) => {
                    candidates.iter().any(|candidate| value_equals(actual, candidate))
                }
                other => value_equals(actual, other),
            },
            Operator::Regex => {
                let (Some(pattern), Some(text)) = (self.value.as_str(), actual.as_str()) else {
                    return false;
                };
                Regex::new(pattern).is_ok_and(|re| re.is_match(text))
            }
        }
    }
}

/// Resolve a dotted path (`price.currency`) inside a JSON document
///
/// Array segments are not traversed; use [`collect_path_values`] for that.
pub fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

/// Collect every scalar reachable through a dotted path, fanning out over arrays
///
/// `variants.prices.currency` on a product yields the currency of every price
/// of every variant.
pub fn collect_path_values<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    collect_into(document, &segments, &mut out);
    out
}

fn collect_into<'a>(current: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    if let Value::Array(items) = current {
        for item in items {
            collect_into(item, segments, out);
        }
        return;
    }

    match segments.split_first() {
        None => {
            if !current.is_null() {
                out.push(current);
            }
        }
        Some((head, rest)) => {
            if let Some(next) = current.get(*head) {
                collect_into(next, rest, out);
            }
        }
    }
}

/// Equality with numeric normalization; an array field equals a scalar when
/// any of its elements does
fn value_equals(actual: &Value, expected: &Value) -> bool {
    if let (Value::Array(items), false) = (actual, expected.is_array()) {
        return items.iter().any(|item| value_equals(item, expected));
    }
    match (actual, expected) {
        (Value::Number(_), Value::Number(_)) => {
            compare_values(actual, expected) == Some(Ordering::Equal)
        }
        _ => actual == expected,
    }
}

/// Order two JSON values of the same kind
///
/// Strings that both parse as RFC 3339 instants compare chronologically.
/// Values of different kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (
                x.parse::<DateTime<Utc>>().ok(),
                y.parse::<DateTime<Utc>>().ok(),
            ) {
                (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Fields to keep when reading documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Add fields that must always survive projection
    pub fn including<'a>(mut self, always: impl IntoIterator<Item = &'a str>) -> Self {
        for field in always {
            if !self.fields.iter().any(|f| f == field) {
                self.fields.push(field.to_string());
            }
        }
        self
    }

    /// Apply the projection to a top-level document
    ///
    /// Only the first segment of a dotted field is considered.
    pub fn apply(&self, document: Value) -> Value {
        let Value::Object(object) = document else {
            return document;
        };

        let kept: Map<String, Value> = object
            .into_iter()
            .filter(|(name, _)| {
                self.fields
                    .iter()
                    .any(|field| field.split('.').next() == Some(name.as_str()))
            })
            .collect();
        Value::Object(kept)
    }
}

/// Page selection for listings (pages start at 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: usize,
    size: usize,
}

impl Page {
    /// Maximum page size
    pub const MAX_SIZE: usize = 100;

    /// Highest page number whose offset still fits in a `usize`
    pub const MAX_NUMBER: usize = usize::MAX / Self::MAX_SIZE;

    pub fn new(number: usize, size: usize) -> Self {
        Self {
            number: number.clamp(1, Self::MAX_NUMBER),
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of documents skipped before this page
    pub fn offset(&self) -> usize {
        (self.number - 1).saturating_mul(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Store-level query: filter, projection and window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub projection: Option<Projection>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_projection(mut self, projection: Option<Projection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_page(mut self, page: Option<Page>) -> Self {
        if let Some(page) = page {
            self.skip = page.offset();
            self.limit = Some(page.size());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product() -> Value {
        json!({
            "name": "Sneaker",
            "quantity": 3,
            "visible": true,
            "tags": ["shoe", "sport"],
            "price": {"value": 49.5, "currency": "USD"},
            "variants": [
                {"sku": "a", "prices": [{"currency": "USD"}, {"currency": "EUR"}]},
                {"sku": "b", "prices": [{"currency": "NGN"}]}
            ],
            "date_created": "2024-03-01T10:00:00Z"
        })
    }

    #[test]
    fn test_eq_and_dotted_path() {
        let doc = product();
        assert!(Filter::new().eq("name", "Sneaker").matches_document(&doc));
        assert!(Filter::new().eq("price.currency", "USD").matches_document(&doc));
        assert!(!Filter::new().eq("price.currency", "EUR").matches_document(&doc));
    }

    #[test]
    fn test_numeric_equality_normalizes() {
        let doc = product();
        assert!(Filter::new().eq("quantity", 3.0).matches_document(&doc));
        assert!(Filter::new().eq("price.value", 49.5).matches_document(&doc));
    }

    #[test]
    fn test_comparisons() {
        let doc = product();
        assert!(Filter::new().gt("quantity", 2).matches_document(&doc));
        assert!(Filter::new().gte("quantity", 3).matches_document(&doc));
        assert!(!Filter::new().lt("quantity", 3).matches_document(&doc));
        assert!(Filter::new().lte("quantity", 3).matches_document(&doc));
        assert!(!Filter::new().gt("name", 2).matches_document(&doc));
    }

    #[test]
    fn test_datetime_strings_compare_chronologically() {
        let doc = product();
        assert!(
            Filter::new()
                .gt("date_created", "2024-02-29T23:59:59.999999Z")
                .matches_document(&doc)
        );
        assert!(
            !Filter::new()
                .gt("date_created", "2024-03-01T10:00:00.5Z")
                .matches_document(&doc)
        );
    }

    #[test]
    fn test_array_field_equality() {
        let doc = product();
        assert!(Filter::new().eq("tags", "sport").matches_document(&doc));
        assert!(!Filter::new().eq("tags", "golf").matches_document(&doc));
    }

    #[test]
    fn test_in_and_regex() {
        let doc = product();
        assert!(
            Filter::new()
                .is_in("name", vec![json!("Boot"), json!("Sneaker")])
                .matches_document(&doc)
        );
        assert!(Filter::new().matches("name", "^Sne").matches_document(&doc));
        assert!(!Filter::new().matches("name", "^Boo").matches_document(&doc));
        assert!(!Filter::new().matches("name", "([").matches_document(&doc));
    }

    #[test]
    fn test_missing_field_equals_null() {
        let doc = product();
        assert!(Filter::new().eq("domain", Value::Null).matches_document(&doc));
        assert!(Filter::new().ne("domain", "x").matches_document(&doc));
    }

    #[test]
    fn test_from_json() {
        let filter = Filter::from_json(&json!({
            "visible": true,
            "quantity>=": 2,
            "name~": "^S",
            "tags": ["shoe"]
        }))
        .expect("valid filter");
        assert_eq!(filter.conditions().len(), 4);
        assert!(filter.matches_document(&product()));

        assert!(Filter::from_json(&json!([1, 2])).is_err());
        assert!(Filter::from_json(&json!({"name~": 3})).is_err());
    }

    #[test]
    fn test_sort_key_parse() {
        let key = SortKey::parse("date_created:desc").expect("valid");
        assert_eq!(key.field, "date_created");
        assert_eq!(key.direction, SortDirection::Descending);

        let key = SortKey::parse("name").expect("valid");
        assert_eq!(key.direction, SortDirection::Ascending);

        assert!(SortKey::parse("name:sideways").is_err());
        assert!(SortKey::parse(":asc").is_err());
    }

    #[test]
    fn test_collect_path_values_fans_out() {
        let doc = product();
        let currencies: Vec<&str> = collect_path_values(&doc, "variants.prices.currency")
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(currencies, vec!["USD", "EUR", "NGN"]);
        assert!(collect_path_values(&doc, "missing.path").is_empty());
    }

    #[test]
    fn test_projection() {
        let projection = Projection::new(["name", "price.value"]).including(["id"]);
        let projected = projection.apply(json!({"id": 1, "name": "x", "price": {}, "tags": []}));
        assert_eq!(projected, json!({"id": 1, "name": "x", "price": {}}));
    }

    #[test]
    fn test_page_clamps() {
        let page = Page::new(0, 1000);
        assert_eq!(page.number(), 1);
        assert_eq!(page.size(), Page::MAX_SIZE);
        assert_eq!(Page::new(3, 10).offset(), 20);

        let far = Page::new(usize::MAX, 1000);
        assert_eq!(far.number(), Page::MAX_NUMBER);
        assert!(far.offset() <= usize::MAX - Page::MAX_SIZE);

        let query = Query::new(Filter::new()).with_page(Some(Page::new(2, 5)));
        assert_eq!(query.skip, 5);
        assert_eq!(query.limit, Some(5));
    }
}
