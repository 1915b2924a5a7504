use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Name of one thing a user may do at the store, written `area.action`
/// (`catalog.write`, `sales.void`, `reports.cash_cut`).
///
/// Administrators hold `*`, which grants every permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

const ALL: &str = "*";

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn all() -> Self {
        Self::new(ALL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether holding `self` lets its owner do `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        self.as_str() == ALL || self == required
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
