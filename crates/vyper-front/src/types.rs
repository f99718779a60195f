//! Module-level type tables produced by semantic annotation.

use std::path::PathBuf;
use std::sync::Arc;

use derive_more::Display;
use indexmap::IndexMap;

use crate::ast::{NodeId, SyntaxTree};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Visibility {
    #[display("internal")]
    Internal,
    #[display("external")]
    External,
    #[display("deploy")]
    Deploy,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Mutability {
    #[display("pure")]
    Pure,
    #[display("view")]
    View,
    #[display("nonpayable")]
    Nonpayable,
    #[display("payable")]
    Payable,
}

/// A named, typed slot: function parameter, struct field or event field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub typ: String,
}

#[derive(Clone, Debug)]
pub struct FunctionType {
    pub name: String,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub params: Vec<Member>,
    pub returns: Option<String>,
    pub decl: NodeId,
    pub doc_string: Option<String>,
}

impl FunctionType {
    pub fn is_internal(&self) -> bool {
        self.visibility == Visibility::Internal
    }

    pub fn is_external(&self) -> bool {
        self.visibility == Visibility::External
    }

    pub fn is_deploy(&self) -> bool {
        self.visibility == Visibility::Deploy
    }

    /// `name(a: T, b: U) -> R`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.typ))
            .collect::<Vec<_>>()
            .join(", ");
        match &self.returns {
            Some(returns) => format!("{}({params}) -> {returns}", self.name),
            None => format!("{}({params})", self.name),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VarInfo {
    pub name: String,
    /// Declared type with any `public`/`constant`/... wrapper removed.
    pub typ: String,
    pub is_constant: bool,
    pub is_public: bool,
    pub is_immutable: bool,
    pub is_transient: bool,
    pub decl: NodeId,
}

#[derive(Clone, Debug)]
pub struct FlagType {
    pub name: String,
    pub variants: Vec<String>,
    pub decl: NodeId,
}

#[derive(Clone, Debug)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<Member>,
    pub decl: NodeId,
}

#[derive(Clone, Debug)]
pub struct EventType {
    pub name: String,
    pub fields: Vec<Member>,
    pub decl: NodeId,
}

#[derive(Clone, Debug)]
pub struct InterfaceType {
    pub name: String,
    pub functions: Vec<String>,
    pub decl: NodeId,
}

/// Type information of one module, in declaration order.
#[derive(Clone, Debug)]
pub struct ModuleType {
    pub name: String,
    pub path: Option<PathBuf>,
    /// Annotated tree; `None` for built-in interface modules.
    pub tree: Option<SyntaxTree>,
    pub functions: IndexMap<String, FunctionType>,
    pub variables: IndexMap<String, VarInfo>,
    pub flags: IndexMap<String, FlagType>,
    pub structs: IndexMap<String, StructType>,
    pub events: IndexMap<String, EventType>,
    pub interfaces: IndexMap<String, InterfaceType>,
    /// Imported modules keyed by alias.
    pub imports: IndexMap<String, Arc<ModuleType>>,
}

impl ModuleType {
    pub(crate) fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            tree: None,
            functions: IndexMap::new(),
            variables: IndexMap::new(),
            flags: IndexMap::new(),
            structs: IndexMap::new(),
            events: IndexMap::new(),
            interfaces: IndexMap::new(),
            imports: IndexMap::new(),
        }
    }

    /// Whether `name` is a user-defined type in this module.
    pub fn is_user_type(&self, name: &str) -> bool {
        self.structs.contains_key(name)
            || self.flags.contains_key(name)
            || self.events.contains_key(name)
            || self.interfaces.contains_key(name)
    }
}

/// Every primitive type name: `bool`, `address`, `decimal`, `uint8`..`uint256`,
/// `int8`..`int256`, `bytes1`..`bytes32`.
pub fn base_types() -> Vec<String> {
    let mut types = vec!["bool".to_string(), "address".to_string(), "decimal".to_string()];
    types.extend((8..=256).step_by(8).map(|bits| format!("uint{bits}")));
    types.extend((8..=256).step_by(8).map(|bits| format!("int{bits}")));
    types.extend((1..=32).map(|width| format!("bytes{width}")));
    types
}

pub fn is_base_type(name: &str) -> bool {
    if matches!(name, "bool" | "address" | "decimal") {
        return true;
    }
    let width = |rest: &str| rest.parse::<u32>().ok();
    if let Some(rest) = name.strip_prefix("uint").or_else(|| name.strip_prefix("int")) {
        return width(rest).is_some_and(|bits| (8..=256).contains(&bits) && bits % 8 == 0);
    }
    if let Some(rest) = name.strip_prefix("bytes") {
        return width(rest).is_some_and(|bytes| (1..=32).contains(&bytes));
    }
    false
}
