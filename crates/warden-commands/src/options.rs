//! Command option schemas and normalization of raw option values.

use crate::error::{CommandError, CommandResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use warden_common::UserId;

/// Type of a command option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// Free text.
    String,
    /// Signed integer.
    Integer,
    /// True or false.
    Boolean,
    /// A member, given as an id or a mention.
    User,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::User => "user",
        };
        f.write_str(name)
    }
}

/// Declared option of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Option name as typed by the invoker.
    pub name: String,
    /// Help text.
    pub description: String,
    /// Expected kind.
    pub kind: OptionKind,
    /// Whether the option must be present.
    pub required: bool,
}

impl OptionSpec {
    /// A required option.
    pub fn required(name: impl Into<String>, kind: OptionKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    /// An optional option.
    pub fn optional(name: impl Into<String>, kind: OptionKind, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    fn coerce(&self, raw: &Value) -> CommandResult<OptionValue> {
        let value = match (self.kind, raw) {
            (OptionKind::String, Value::String(s)) => Some(OptionValue::String(s.clone())),
            (OptionKind::String, Value::Number(n)) => Some(OptionValue::String(n.to_string())),
            (OptionKind::Integer, Value::Number(n)) => n.as_i64().map(OptionValue::Integer),
            (OptionKind::Integer, Value::String(s)) => s.trim().parse().ok().map(OptionValue::Integer),
            (OptionKind::Boolean, Value::Bool(b)) => Some(OptionValue::Boolean(*b)),
            (OptionKind::Boolean, Value::String(s)) => parse_bool(s).map(OptionValue::Boolean),
            (OptionKind::User, Value::Number(n)) => n.as_u64().map(|id| OptionValue::User(UserId(id))),
            (OptionKind::User, Value::String(s)) => parse_user(s).map(OptionValue::User),
            _ => None,
        };
        value.ok_or_else(|| {
            CommandError::validation(format!(
                "Option `{}` expects a {}, got `{}`",
                self.name,
                self.kind,
                display_raw(raw)
            ))
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Accepts a bare id or a mention such as `<@123>` / `<@!123>`.
fn parse_user(raw: &str) -> Option<UserId> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|rest| rest.trim_start_matches('!'))
        .unwrap_or(raw);
    inner.parse().ok()
}

fn display_raw(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A normalized option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Free text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// True or false.
    Boolean(bool),
    /// A member.
    User(UserId),
}

/// Options of one invocation, checked against the command's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    values: HashMap<String, OptionValue>,
}

impl CommandOptions {
    /// Checks `raw` against `specs`: required options must be present,
    /// unknown names are rejected and values are coerced to their kind.
    pub fn normalize(specs: &[OptionSpec], raw: &Map<String, Value>) -> CommandResult<Self> {
        if let Some(unknown) = raw.keys().find(|name| !specs.iter().any(|s| &s.name == *name)) {
            return Err(CommandError::validation(format!("Unknown option `{unknown}`")));
        }

        let mut values = HashMap::with_capacity(specs.len());
        for spec in specs {
            match raw.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(CommandError::validation(format!(
                        "Missing required option `{}`",
                        spec.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    values.insert(spec.name.clone(), spec.coerce(value)?);
                }
            }
        }
        Ok(Self { values })
    }

    /// Builds options directly from typed values.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, OptionValue)>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Raw value of `name`.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Text option `name`.
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Integer option `name`.
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(OptionValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// Boolean option `name`.
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(OptionValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// User option `name`.
    pub fn user(&self, name: &str) -> Option<UserId> {
        match self.values.get(name) {
            Some(OptionValue::User(id)) => Some(*id),
            _ => None,
        }
    }

    /// Text option `name`, failing when absent.
    pub fn require_str(&self, name: &str) -> CommandResult<&str> {
        self.str(name)
            .ok_or_else(|| CommandError::validation(format!("Missing option `{name}`")))
    }

    /// User option `name`, failing when absent.
    pub fn require_user(&self, name: &str) -> CommandResult<UserId> {
        self.user(name)
            .ok_or_else(|| CommandError::validation(format!("Missing option `{name}`")))
    }

    /// Non-negative integer option `name` that fits in a `u32`.
    pub fn count(&self, name: &str) -> CommandResult<Option<u32>> {
        self.integer(name)
            .map(|n| {
                u32::try_from(n).map_err(|_| {
                    CommandError::validation(format!("Option `{name}` must be between 0 and {}", u32::MAX))
                })
            })
            .transpose()
    }

    /// Number of options present.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no option is present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<OptionSpec> {
        vec![
            OptionSpec::required("user", OptionKind::User, "target"),
            OptionSpec::optional("days", OptionKind::Integer, "length"),
            OptionSpec::optional("granted", OptionKind::Boolean, "grant or deny"),
            OptionSpec::optional("reason", OptionKind::String, "note"),
        ]
    }

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_coercion_from_strings() {
        let options = CommandOptions::normalize(
            &specs(),
            &raw(json!({ "user": "<@!42>", "days": " 7 ", "granted": "no", "reason": 12 })),
        )
        .unwrap();

        assert_eq!(options.user("user"), Some(UserId(42)));
        assert_eq!(options.integer("days"), Some(7));
        assert_eq!(options.boolean("granted"), Some(false));
        assert_eq!(options.str("reason"), Some("12"));
    }

    #[test]
    fn test_optional_options_may_be_absent() {
        let options = CommandOptions::normalize(&specs(), &raw(json!({ "user": 5, "days": null }))).unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options.integer("days"), None);
    }

    #[test]
    fn test_rejections() {
        let missing = CommandOptions::normalize(&specs(), &Map::new()).unwrap_err();
        assert!(missing.to_string().contains("Missing required option `user`"));

        let unknown = CommandOptions::normalize(&specs(), &raw(json!({ "user": 1, "colour": "red" })))
            .unwrap_err();
        assert!(unknown.to_string().contains("Unknown option `colour`"));

        let ambiguous = CommandOptions::normalize(&specs(), &raw(json!({ "user": 1, "granted": "maybe" })))
            .unwrap_err();
        assert!(ambiguous.to_string().contains("expects a boolean"));

        let bad_user = CommandOptions::normalize(&specs(), &raw(json!({ "user": "somebody" }))).unwrap_err();
        assert!(bad_user.is_user_facing());
    }

    #[test]
    fn test_count_rejects_negative() {
        let options = CommandOptions::from_values([("days", OptionValue::Integer(-1))]);
        assert!(options.count("days").is_err());

        let options = CommandOptions::from_values([("days", OptionValue::Integer(3))]);
        assert_eq!(options.count("days").unwrap(), Some(3));
        assert_eq!(options.count("other").unwrap(), None);
    }
}
