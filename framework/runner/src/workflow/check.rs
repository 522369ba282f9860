use std::time::Duration;

use loadline_http_client::prelude::HttpResponse;
use serde_json::Value;

/// What a [Check] asserts about a response.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckPredicate {
    Status(u16),
    /// Any one of the listed statuses
    StatusIn(Vec<u16>),
    /// Latency strictly below the bound
    LatencyBelow(Duration),
    /// The body is JSON and has a non-null value at the dotted path
    BodyFieldPresent(String),
    BodyFieldEquals(String, Value),
}

/// A named, non-fatal assertion evaluated against every response of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    name: String,
    predicate: CheckPredicate,
}

impl Check {
    pub fn new(name: impl Into<String>, predicate: CheckPredicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    pub fn status(name: impl Into<String>, status: u16) -> Self {
        Self::new(name, CheckPredicate::Status(status))
    }

    pub fn status_in(name: impl Into<String>, statuses: impl IntoIterator<Item = u16>) -> Self {
        Self::new(name, CheckPredicate::StatusIn(statuses.into_iter().collect()))
    }

    pub fn latency_below(name: impl Into<String>, bound: Duration) -> Self {
        Self::new(name, CheckPredicate::LatencyBelow(bound))
    }

    pub fn body_field_present(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, CheckPredicate::BodyFieldPresent(path.into()))
    }

    pub fn body_field_equals(
        name: impl Into<String>,
        path: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(name, CheckPredicate::BodyFieldEquals(path.into(), value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `body` is the response body parsed as JSON, if it parsed.
    pub(crate) fn evaluate(&self, response: &HttpResponse, body: Option<&Value>) -> bool {
        match &self.predicate {
            CheckPredicate::Status(status) => response.status == *status,
            CheckPredicate::StatusIn(statuses) => statuses.contains(&response.status),
            CheckPredicate::LatencyBelow(bound) => response.latency < *bound,
            CheckPredicate::BodyFieldPresent(path) => body
                .and_then(|body| lookup_path(body, path))
                .is_some_and(|v| !v.is_null()),
            CheckPredicate::BodyFieldEquals(path, expected) => body
                .and_then(|body| lookup_path(body, path))
                .is_some_and(|v| v == expected),
        }
    }
}

/// Take a value out of a JSON response body and store it for later steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    /// Dotted path into the body, numeric segments index arrays
    pub path: String,
}

impl Capture {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Strings are taken as-is, other values in their JSON form. Null counts as absent.
    pub(crate) fn extract(&self, body: &Value) -> Option<String> {
        match lookup_path(body, &self.path)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

pub(crate) fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
