//! Access-control policy model
//!
//! A [`Policy`] is the versioned remote object that reconciliation converges.
//! Its `etag` is the concurrency token: it must be submitted back unchanged on
//! write so the server can reject stale read-modify-write cycles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Versioned access-control policy
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Concurrency token returned by the last read
    #[serde(default)]
    pub etag: String,

    /// Role bindings, one per (role, condition)
    #[serde(default)]
    pub bindings: Vec<Binding>,

    /// Fields this crate does not interpret (audit configs, version, ...).
    /// Carried through unchanged so a write never drops them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Policy {
    pub fn new(etag: impl Into<String>) -> Self {
        Self {
            etag: etag.into(),
            ..Self::default()
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Unconditional binding for `role`, if any
    pub fn binding(&self, role: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|b| b.role == role && b.condition.is_none())
    }

    /// Whether `member` is granted `role` unconditionally
    ///
    /// Both sides are compared in [`normalize_member`] form.
    pub fn has_member(&self, role: &str, member: &str) -> bool {
        let wanted = normalize_member(member);
        self.binding(role)
            .map(|b| b.members.iter().any(|m| normalize_member(m) == wanted))
            .unwrap_or(false)
    }
}

/// A role granted to a set of principals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Role identifier (e.g. "roles/viewer")
    pub role: String,

    /// Principals with a type prefix (`user:`, `group:`, `serviceAccount:`, ...)
    #[serde(default)]
    pub members: BTreeSet<String>,

    /// Optional condition restricting when the binding applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Binding {
    pub fn new<I, S>(role: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role: role.into(),
            members: members.into_iter().map(Into::into).collect(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Identity of the binding within a policy
    pub fn key(&self) -> BindingKey {
        BindingKey {
            role: self.role.clone(),
            condition: self.condition.clone(),
        }
    }
}

/// Condition expression attached to a binding
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub expression: String,
}

impl Condition {
    pub fn new(title: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            expression: expression.into(),
        }
    }
}

/// Unique key of a binding: role plus condition
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingKey {
    pub role: String,
    pub condition: Option<Condition>,
}

impl std::fmt::Display for BindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.condition {
            Some(c) => write!(f, "{} [{}]", self.role, c.title),
            None => f.write_str(&self.role),
        }
    }
}

/// Canonical form of a principal identifier
///
/// The type prefix is kept as-is; the value is lowercased unless the
/// principal kind is case sensitive. A `deleted:` prefix is preserved.
pub fn normalize_member(member: &str) -> String {
    if let Some(rest) = member.strip_prefix("deleted:") {
        if is_case_sensitive(rest) {
            return member.to_string();
        }
        return format!("deleted:{}", lowercase_value(rest));
    }
    if is_case_sensitive(member) {
        return member.to_string();
    }
    lowercase_value(member)
}

fn is_case_sensitive(member: &str) -> bool {
    member.contains("allAuthenticatedUsers")
        || member.contains("allUsers")
        || member.starts_with("principalSet:")
        || member.starts_with("principal:")
        || member.starts_with("principalHierarchy:")
}

fn lowercase_value(member: &str) -> String {
    match member.split_once(':') {
        Some((kind, value)) => format!("{}:{}", kind, value.to_lowercase()),
        None => member.to_string(),
    }
}
