//! Runtime load failures as the host reports them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one lazily loaded module (a chunk) for retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleKey(String);

impl ModuleKey {
    pub const UNKNOWN: &'static str = "unknown-chunk";

    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Key for a failure reported by the module loader for module `id`.
    #[must_use]
    pub fn for_module_id(id: &str) -> Self {
        Self(format!("module-{id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An error value: what a rejected dynamic import or a throwing loader produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Error name/class, e.g. `ChunkLoadError`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
    /// Set when the failure came through the loader hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
}

impl LoadFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            module_id: None,
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: message.into(),
            module_id: None,
        }
    }

    #[must_use]
    pub fn with_module_id(mut self, id: impl Into<String>) -> Self {
        self.module_id = Some(id.into());
        self
    }
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Tag of the element whose resource failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementTag {
    Script,
    Link,
    Img,
    Other,
}

/// A global "resource failed to load" / error event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceErrorEvent {
    #[serde(default)]
    pub tag: Option<ElementTag>,
    /// Source URL of the failing element, if any.
    #[serde(default)]
    pub src: Option<String>,
    /// Script file the error was raised from, if any.
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<LoadFailure>,
}

impl ResourceErrorEvent {
    #[must_use]
    pub fn script(src: impl Into<String>) -> Self {
        Self {
            tag: Some(ElementTag::Script),
            src: Some(src.into()),
            ..Self::default()
        }
    }
}

/// What the host should do with the original event after we looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Disposition {
    /// We own this failure; the host may suppress default reporting.
    Handled,
    /// Not ours; default propagation must continue untouched.
    PassThrough,
}

impl Disposition {
    #[must_use]
    pub const fn should_prevent_default(self) -> bool {
        matches!(self, Self::Handled)
    }
}
