//! Typed access to loosely-typed tool arguments.
//!
//! `null` counts as absent everywhere, so agents can send every optional
//! field of the umbrella tool without tripping validation.

use mcprt_core::JsonObject;
use serde_json::Value;
use thiserror::Error;

use super::operation::Operation;

/// Argument validation failure, already phrased for the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("{}", missing_message(.operation, .fields))]
    Missing {
        operation: &'static str,
        fields: &'static [&'static str],
    },

    #[error("Error: '{field}' must be {expected} for {operation}")]
    Invalid {
        operation: &'static str,
        field: &'static str,
        expected: &'static str,
    },
}

fn missing_message(operation: &str, fields: &[&str]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("'{f}'")).collect();
    let verb = if fields.len() == 1 { "is" } else { "are" };
    format!(
        "Error: {} {verb} required for {operation}",
        quoted.join(" and ")
    )
}

pub(crate) struct Args<'a> {
    operation: Operation,
    fields: &'a JsonObject,
}

impl<'a> Args<'a> {
    /// Wrap `fields`, checking the operation's required fields first.
    ///
    /// When any required field is missing the error names all of them.
    pub(crate) fn new(operation: Operation, fields: &'a JsonObject) -> Result<Self, ArgError> {
        let args = Self { operation, fields };
        let required = operation.required();
        if required.iter().any(|name| args.get(name).is_none()) {
            return Err(ArgError::Missing {
                operation: operation.name(),
                fields: required,
            });
        }
        Ok(args)
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    const fn invalid(&self, field: &'static str, expected: &'static str) -> ArgError {
        ArgError::Invalid {
            operation: self.operation.name(),
            field,
            expected,
        }
    }

    pub(crate) fn string(&self, name: &'static str) -> Result<Option<String>, ArgError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(name, "a string")),
        }
    }

    /// A required string; presence was checked in [`Args::new`].
    pub(crate) fn required_string(&self, name: &'static str) -> Result<String, ArgError> {
        self.string(name)?.ok_or_else(|| self.invalid(name, "a string"))
    }

    pub(crate) fn u32_or(&self, name: &'static str, default: u32) -> Result<u32, ArgError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| self.invalid(name, "a non-negative integer")),
        }
    }

    pub(crate) fn usize_opt(&self, name: &'static str) -> Result<Option<usize>, ArgError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(name, "a non-negative integer")),
        }
    }

    pub(crate) fn i64_or(&self, name: &'static str, default: i64) -> Result<i64, ArgError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.as_i64().ok_or_else(|| self.invalid(name, "an integer")),
        }
    }

    pub(crate) fn f64_or(&self, name: &'static str, default: f64) -> Result<f64, ArgError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| self.invalid(name, "a number")),
        }
    }

    pub(crate) fn bool_or(&self, name: &'static str, default: bool) -> Result<bool, ArgError> {
        match self.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.invalid(name, "a boolean")),
        }
    }

    pub(crate) fn object(&self, name: &'static str) -> Result<JsonObject, ArgError> {
        match self.get(name) {
            None => Ok(JsonObject::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(self.invalid(name, "an object")),
        }
    }

    pub(crate) fn string_list(&self, name: &'static str) -> Result<Option<Vec<String>>, ArgError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| self.invalid(name, "a list of strings"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(name, "a list of strings"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}
