use std::fmt;

use crate::domain::errors::{DomainError, Result};

/// Bus message type identifier in `package/TypeName` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageTypeName {
    package: String,
    name: String,
}

impl MessageTypeName {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || DomainError::InvalidMessageTypeName(raw.to_string());

        let (package, name) = raw.split_once('/').ok_or_else(invalid)?;
        if package.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        let valid_package = package
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        let valid_name = name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid_package || !valid_name {
            return Err(invalid());
        }

        Ok(Self {
            package: package.to_string(),
            name: name.to_string(),
        })
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MessageTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.name)
    }
}
