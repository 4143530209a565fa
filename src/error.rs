//! Error types with fix suggestions
//!
//! - [`BindError`]: everything a declaration, guard or lookup can fail with
//! - [`LoadError`]: what a [`Loader`](crate::loader::Loader) reports
//! - [`ErrorRecord`]: the memoized failure stored in a `Failed` binding
//! - [`ScenarioError`]: failures of the YAML scenario runner

use thiserror::Error;

use crate::import_spec::{DeclarationSite, ImportSpec};

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Errors raised by the deferred-binding engine
///
/// `Clone + PartialEq` so a failed binding re-raises the identical error on
/// every later lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    // ─────────────────────────────────────────────────────────────
    // Guard errors (LAZY-010, LAZY-070)
    // ─────────────────────────────────────────────────────────────
    #[error("LAZY-010: Call-boundary introspection is unavailable, guard #{guard_id} cannot default to eager mode")]
    Capability { guard_id: u64 },

    #[error("LAZY-070: Guard #{found} closed while guard #{expected} is innermost")]
    GuardOrder { expected: u64, found: u64 },

    // ─────────────────────────────────────────────────────────────
    // Lookup errors (LAZY-020 to LAZY-021)
    // ─────────────────────────────────────────────────────────────
    #[error("LAZY-020: Name '{name}' is declared but not yet visible (call distance {distance}, needs {required}; declared at {site})")]
    NotYetVisible {
        name: String,
        distance: u32,
        required: u32,
        site: DeclarationSite,
    },

    #[error("LAZY-021: Name '{name}' is not defined")]
    Undefined { name: String },

    // ─────────────────────────────────────────────────────────────
    // Resolution errors (LAZY-030 to LAZY-050)
    // ─────────────────────────────────────────────────────────────
    #[error("LAZY-030: Reentrant resolution of '{name}' ({spec}) (caught on deferred import from {site})")]
    Reentrancy {
        name: String,
        spec: String,
        site: DeclarationSite,
    },

    #[error("LAZY-040: {reason} (caught on deferred import from {site})")]
    Loader {
        name: String,
        spec: String,
        reason: String,
        site: DeclarationSite,
    },

    #[error("LAZY-050: Scope owning '{name}' is gone: {reason} (declared at {site})")]
    ScopeMutation {
        name: String,
        reason: String,
        site: DeclarationSite,
    },

    // ─────────────────────────────────────────────────────────────
    // Declaration errors (LAZY-060 to LAZY-062)
    // ─────────────────────────────────────────────────────────────
    #[error("LAZY-060: Wildcard deferred imports are not supported ({spec})")]
    WildcardUnsupported { spec: String },

    #[error("LAZY-061: Invalid identifier '{name}'")]
    InvalidIdentifier { name: String },

    #[error("LAZY-062: Invalid module path '{path}'")]
    InvalidModulePath { path: String },
}

impl BindError {
    /// Stable error code (`LAZY-0xx`)
    pub fn code(&self) -> &'static str {
        match self {
            BindError::Capability { .. } => "LAZY-010",
            BindError::NotYetVisible { .. } => "LAZY-020",
            BindError::Undefined { .. } => "LAZY-021",
            BindError::Reentrancy { .. } => "LAZY-030",
            BindError::Loader { .. } => "LAZY-040",
            BindError::ScopeMutation { .. } => "LAZY-050",
            BindError::WildcardUnsupported { .. } => "LAZY-060",
            BindError::InvalidIdentifier { .. } => "LAZY-061",
            BindError::InvalidModulePath { .. } => "LAZY-062",
            BindError::GuardOrder { .. } => "LAZY-070",
        }
    }

    /// Both "not defined" and "not yet visible" read as an undefined name
    pub fn is_name_error(&self) -> bool {
        matches!(
            self,
            BindError::NotYetVisible { .. } | BindError::Undefined { .. }
        )
    }
}

impl FixSuggestion for BindError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BindError::Capability { .. } => {
                Some("Open the guard with prevent_eager: false to fall back to eager binding")
            }
            BindError::GuardOrder { .. } => Some("Close guards in reverse order of opening"),
            BindError::NotYetVisible { .. } => {
                Some("Read the name from inside a function called after the declaration")
            }
            BindError::Undefined { .. } => Some("Declare or assign the name before reading it"),
            BindError::Reentrancy { .. } => {
                Some("Break the cycle: the module being loaded reads the name it is loading")
            }
            BindError::Loader { .. } => {
                Some("Check the source module exists and exports the item, then restart")
            }
            BindError::ScopeMutation { .. } => {
                Some("Keep the declaring scope alive until its deferred names are read")
            }
            BindError::WildcardUnsupported { .. } => {
                Some("List the imported names explicitly or import outside the guard")
            }
            BindError::InvalidIdentifier { .. } => {
                Some("Use letters, digits and underscores, not starting with a digit")
            }
            BindError::InvalidModulePath { .. } => {
                Some("Use dot-separated identifiers: pkg.sub.leaf")
            }
        }
    }
}

/// Loader failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("No module named '{module}'")]
    ModuleNotFound { module: String },

    #[error("Cannot import name '{item}' from '{module}'")]
    ItemNotFound { module: String, item: String },

    #[error("{0}")]
    Other(String),

    /// A lookup performed while loading failed
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Scenario runner errors
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("LAZY-080: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LAZY-081: YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("LAZY-082: Step {step} failed: {details}")]
    Expectation { step: String, details: String },
}

impl FixSuggestion for ScenarioError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ScenarioError::Io(_) => Some("Check the scenario path exists and is readable"),
            ScenarioError::YamlParse(_) => {
                Some("Each step is a single-key map such as `- lookup: {name: X}`")
            }
            ScenarioError::Bind(err) => err.fix_suggestion(),
            ScenarioError::Expectation { .. } => {
                Some("Compare the step's expect / expect_error with the printed events")
            }
        }
    }
}

/// Why a binding ended up `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Loader reported an error
    Loader { reason: String },
    /// The loader's own execution looked up the binding being resolved
    Reentrancy,
    /// The owning scope could not be written
    ScopeMutation { reason: String },
}

/// Memoized failure of a deferred binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub spec: ImportSpec,
    pub cause: FailureCause,
    pub site: DeclarationSite,
}

impl ErrorRecord {
    pub fn new(spec: ImportSpec, cause: FailureCause, site: DeclarationSite) -> Self {
        Self { spec, cause, site }
    }

    /// Error surfaced to the caller looking up `name`
    pub fn to_error(&self, name: &str) -> BindError {
        let name = name.to_string();
        let site = self.site.clone();
        match &self.cause {
            FailureCause::Loader { reason } => BindError::Loader {
                name,
                spec: self.spec.to_string(),
                reason: reason.clone(),
                site,
            },
            FailureCause::Reentrancy => BindError::Reentrancy {
                name,
                spec: self.spec.to_string(),
                site,
            },
            FailureCause::ScopeMutation { reason } => BindError::ScopeMutation {
                name,
                reason: reason.clone(),
                site,
            },
        }
    }
}
