use vyper_front::{AttrRef, NodeRef};

/// Value a filter expects at the end of an attribute path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    Str(String),
    Bool(bool),
}

impl From<&str> for Expected {
    fn from(value: &str) -> Self {
        Expected::Str(value.to_string())
    }
}

impl From<String> for Expected {
    fn from(value: String) -> Self {
        Expected::Str(value)
    }
}

impl From<bool> for Expected {
    fn from(value: bool) -> Self {
        Expected::Bool(value)
    }
}

/// Conjunction of `(dotted path, expected value)` constraints on a node.
///
/// `NodeFilter::new().eq("func.attr", "foo").eq("func.value.id", "self")`
/// matches calls of the form `self.foo(...)`. A path that cannot be walked
/// to the end never matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeFilter {
    constraints: Vec<(String, Expected)>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: &str, value: impl Into<Expected>) -> Self {
        self.constraints.push((path.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, node: NodeRef<'_>) -> bool {
        self.constraints
            .iter()
            .all(|(path, expected)| match (node.get(path), expected) {
                (Some(AttrRef::Str(actual)), Expected::Str(expected)) => actual == expected,
                (Some(AttrRef::Bool(actual)), Expected::Bool(expected)) => actual == *expected,
                _ => false,
            })
    }
}
