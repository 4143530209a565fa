//! What a deferred binding resolves to, and where it was declared
//!
//! - [`ImportSpec`]: `(source, item)` pair handed to the loader
//! - [`Item`]: a named member, the whole module, or a wildcard
//! - [`DeclarationSite`]: `file:line` of the declaring statement

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::error::BindError;
use crate::ident::{validate_identifier, validate_module_path};

/// Marker text for "bind the whole module"
pub const MODULE_ITEM: &str = "*module*";

/// Marker text for "bind every member of the module"
pub const WILDCARD_ITEM: &str = "*";

/// Which part of a module a binding refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item {
    /// `import pkg`
    Module,
    /// `from pkg import name`
    Name(Arc<str>),
    /// `from pkg import *`
    Wildcard,
}

impl Item {
    /// Parse the textual form used by scenario files
    ///
    /// `*module*` → [`Item::Module`], `*` → [`Item::Wildcard`], anything else
    /// must be an identifier.
    pub fn parse(s: &str) -> Result<Self, BindError> {
        match s {
            MODULE_ITEM => Ok(Item::Module),
            WILDCARD_ITEM => Ok(Item::Wildcard),
            name => {
                validate_identifier(name)?;
                Ok(Item::Name(Arc::from(name)))
            }
        }
    }

    /// Member name, if this is a named item
    pub fn name(&self) -> Option<&str> {
        match self {
            Item::Name(name) => Some(name),
            Item::Module | Item::Wildcard => None,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Module => f.write_str(MODULE_ITEM),
            Item::Name(name) => f.write_str(name),
            Item::Wildcard => f.write_str(WILDCARD_ITEM),
        }
    }
}

/// What to resolve: a source module path and an item within it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportSpec {
    pub source: Arc<str>,
    pub item: Item,
}

impl ImportSpec {
    pub fn new(source: impl Into<Arc<str>>, item: Item) -> Self {
        Self {
            source: source.into(),
            item,
        }
    }

    /// `import source`
    pub fn module(source: impl Into<Arc<str>>) -> Self {
        Self::new(source, Item::Module)
    }

    /// `from source import name`
    pub fn item(source: impl Into<Arc<str>>, name: &str) -> Self {
        Self::new(source, Item::Name(Arc::from(name)))
    }

    /// `from source import *`
    pub fn wildcard(source: impl Into<Arc<str>>) -> Self {
        Self::new(source, Item::Wildcard)
    }

    /// Check the source path and item name
    pub fn validate(&self) -> Result<(), BindError> {
        validate_module_path(&self.source)?;
        if let Item::Name(name) = &self.item {
            validate_identifier(name)?;
        }
        Ok(())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.item, Item::Wildcard)
    }
}

impl fmt::Display for ImportSpec {
    /// Simulated import statement
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item {
            Item::Module => write!(f, "import {}", self.source),
            Item::Name(name) => write!(f, "from {} import {}", self.source, name),
            Item::Wildcard => write!(f, "from {} import *", self.source),
        }
    }
}

/// Source location of a declaration (`file:line:column`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclarationSite {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl DeclarationSite {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Site of the caller (requires `#[track_caller]` up the chain)
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

impl fmt::Display for DeclarationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
