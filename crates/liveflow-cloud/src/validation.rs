//! Desired-state validation
//!
//! Validation is a pure function over a typed configuration: it returns every
//! violated constraint and never touches the network.

use crate::error::{CloudError, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// A single violated field constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Field path, e.g. `input_attachment[0].input_settings.filter_strength`
    pub field: String,

    /// What is wrong with the value
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Types that can check their own field constraints
pub trait Validate {
    fn validate(&self) -> Vec<Violation>;

    /// Run [`Validate::validate`] and turn any violation into
    /// [`CloudError::Validation`]
    fn ensure_valid(&self, resource_type: &str) -> Result<()> {
        let violations = self.validate();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CloudError::Validation {
                resource_type: resource_type.to_string(),
                violations,
            })
        }
    }
}

/// Collects violations while walking a configuration
///
/// Nested blocks are validated through [`Validator::nested`], which prefixes
/// every violation with the block's path.
#[derive(Debug, Default)]
pub struct Validator {
    prefix: String,
    violations: Vec<Violation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn path(&self, field: &str) -> String {
        if self.prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.prefix, field)
        }
    }

    /// Record a violation for `field`
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        let path = self.path(field);
        self.violations.push(Violation::new(path, message));
    }

    /// Validate a nested block under `field`
    pub fn nested(&mut self, field: &str, f: impl FnOnce(&mut Validator)) {
        let mut inner = Validator {
            prefix: self.path(field),
            violations: Vec::new(),
        };
        f(&mut inner);
        self.violations.append(&mut inner.violations);
    }

    /// Validate each element of a repeated block as `field[i]`
    pub fn each<T>(&mut self, field: &str, items: &[T], mut f: impl FnMut(&mut Validator, &T)) {
        for (i, item) in items.iter().enumerate() {
            self.nested(&format!("{}[{}]", field, i), |v| f(v, item));
        }
    }

    /// Required string must be non-empty
    pub fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
    }

    /// Required optional value must be present
    pub fn present<T>(&mut self, field: &str, value: Option<&T>) {
        if value.is_none() {
            self.push(field, "is required");
        }
    }

    /// Value must be a member of `allowed` (case sensitive)
    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.push(
                field,
                format!("expected one of [{}], got {:?}", allowed.join(", "), value),
            );
        }
    }

    /// Optional value, when set, must be a member of `allowed`
    pub fn one_of_opt(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) {
        if let Some(value) = value {
            self.one_of(field, value, allowed);
        }
    }

    /// Integer must fall within `min..=max`
    pub fn int_between(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.push(
                field,
                format!("expected to be in the range ({} - {}), got {}", min, max, value),
            );
        }
    }

    /// Collection size must fall within `min..=max` (`None` = unbounded)
    pub fn len_between(&mut self, field: &str, len: usize, min: usize, max: Option<usize>) {
        if len < min {
            self.push(
                field,
                format!("attribute supports {} item minimum, config has {}", min, len),
            );
        }
        if let Some(max) = max {
            if len > max {
                self.push(
                    field,
                    format!("attribute supports {} item maximum, config has {}", max, len),
                );
            }
        }
    }

    /// Value must be an IPv4 CIDR naming a network address (no host bits set)
    pub fn ipv4_cidr(&mut self, field: &str, value: &str) {
        if let Err(message) = check_ipv4_cidr_network(value) {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

fn check_ipv4_cidr_network(value: &str) -> std::result::Result<(), String> {
    let net: Ipv4Net = value
        .parse()
        .map_err(|_| format!("expected an IPv4 CIDR block, got {:?}", value))?;

    if net.trunc() != net {
        return Err(format!(
            "expected a network address, got {:?} (did you mean {}?)",
            value,
            net.trunc()
        ));
    }

    Ok(())
}
