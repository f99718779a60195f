//! Semantic annotation: module type tables, name and type checks, imports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::{Attr, NodeId, NodeKind, NodeRef, Span, SyntaxTree};
use crate::errors::{CompileError, CompileErrorKind, CompileResult};
use crate::parser;
use crate::types::{
    EventType, FlagType, FunctionType, InterfaceType, Member, ModuleType, Mutability, StructType,
    VarInfo, Visibility, is_base_type,
};

/// Call wrappers that decorate a declared type without changing it.
const TYPE_WRAPPERS: &[&str] = &["public", "constant", "immutable", "transient", "indexed"];

/// Environment members reachable through `self` without a declaration.
const SELF_MEMBERS: &[&str] = &["balance", "codehash", "codesize", "is_contract", "code"];

const BUILTIN_MODULE_PREFIX: &str = "ethereum.ercs";

/// Render a type annotation back to its canonical text, e.g. `HashMap[address, uint256]`.
pub fn render_type(node: NodeRef<'_>) -> String {
    match node.kind() {
        NodeKind::Name => node.str_attr("id").unwrap_or_default().to_string(),
        NodeKind::Int => node.str_attr("value").unwrap_or_default().to_string(),
        NodeKind::Attribute => match node.child("value") {
            Some(value) => format!(
                "{}.{}",
                render_type(value),
                node.str_attr("attr").unwrap_or_default()
            ),
            None => node.source_code().to_string(),
        },
        NodeKind::Subscript => {
            let value = node.child("value").map(render_type).unwrap_or_default();
            let slice = match node.child("slice") {
                Some(slice) if slice.is(NodeKind::Tuple) => join_types(&slice.list("elements")),
                Some(slice) => render_type(slice),
                None => String::new(),
            };
            format!("{value}[{slice}]")
        }
        NodeKind::Tuple => format!("({})", join_types(&node.list("elements"))),
        NodeKind::Call => {
            let func = node.child("func").map(render_type).unwrap_or_default();
            format!("{func}({})", join_types(&node.list("args")))
        }
        _ => node.source_code().to_string(),
    }
}

fn join_types(nodes: &[NodeRef<'_>]) -> String {
    nodes.iter().map(|n| render_type(*n)).collect::<Vec<_>>().join(", ")
}

/// Strip `public(...)`, `constant(...)` and similar wrappers.
pub fn unwrap_type(node: NodeRef<'_>) -> NodeRef<'_> {
    let mut current = node;
    while current.is(NodeKind::Call) {
        let is_wrapper = current
            .get_str("func.id")
            .is_some_and(|name| TYPE_WRAPPERS.contains(&name));
        match current.list("args").first() {
            Some(&inner) if is_wrapper => current = inner,
            _ => break,
        }
    }
    current
}

pub(crate) fn annotate(
    raw: &SyntaxTree,
    path: Option<&Path>,
    search_paths: &[PathBuf],
    resolve_imports: bool,
) -> CompileResult<Arc<ModuleType>> {
    let name = path
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut annotator = Annotator {
        search_paths,
        resolve_imports,
        module: ModuleType::empty(name),
        namespace: IndexMap::new(),
        types: Vec::new(),
    };
    annotator.module.path = path.map(Path::to_path_buf);

    let body = raw.root().list("body");
    for node in &body {
        annotator.declare(*node)?;
    }
    for node in &body {
        annotator.check_types(*node)?;
    }
    for node in body.iter().filter(|n| n.is(NodeKind::FunctionDef)) {
        annotator.check_self_access(*node)?;
    }

    let mut arena = raw.arena().clone();
    for (id, typ) in annotator.types.drain(..) {
        arena.get_mut(id).set_attr("type", Attr::Str(typ));
    }
    annotator.module.tree = Some(raw.with_arena(arena));
    tracing::debug!(
        functions = annotator.module.functions.len(),
        variables = annotator.module.variables.len(),
        imports = annotator.module.imports.len(),
        "annotated module"
    );
    Ok(Arc::new(annotator.module))
}

struct Annotator<'a> {
    search_paths: &'a [PathBuf],
    resolve_imports: bool,
    module: ModuleType,
    namespace: IndexMap<String, Span>,
    types: Vec<(NodeId, String)>,
}

impl Annotator<'_> {
    fn claim(&mut self, name: &str, node: NodeRef<'_>) -> CompileResult<()> {
        if let Some(previous) = self.namespace.get(name) {
            return Err(CompileError::at(
                CompileErrorKind::NamespaceCollision,
                format!("'{name}' has already been declared"),
                node.span(),
            )
            .with_annotation(*previous));
        }
        self.namespace.insert(name.to_string(), node.span());
        Ok(())
    }

    fn declare(&mut self, node: NodeRef<'_>) -> CompileResult<()> {
        let name = node.name().unwrap_or_default().to_string();
        match node.kind() {
            NodeKind::Import => {
                let alias = node
                    .str_attr("alias")
                    .unwrap_or_else(|| name.rsplit('.').next().unwrap_or(&name))
                    .to_string();
                self.claim(&alias, node)?;
                let module = self.import_module(&name, 0, node)?;
                self.module.imports.insert(alias, module);
            }
            NodeKind::ImportFrom => {
                let package = node.str_attr("module").unwrap_or_default();
                let level = node
                    .str_attr("level")
                    .and_then(|level| level.parse().ok())
                    .unwrap_or(0);
                let dotted = if package.is_empty() {
                    name.clone()
                } else {
                    format!("{package}.{name}")
                };
                let alias = node.str_attr("alias").unwrap_or(&name).to_string();
                self.claim(&alias, node)?;
                let module = self.import_module(&dotted, level, node)?;
                self.module.imports.insert(alias, module);
            }
            NodeKind::StructDef => {
                self.claim(&name, node)?;
                let fields = members(node);
                self.module.structs.insert(
                    name.clone(),
                    StructType {
                        name,
                        fields,
                        decl: node.id(),
                    },
                );
            }
            NodeKind::EventDef => {
                self.claim(&name, node)?;
                let fields = members(node);
                self.module.events.insert(
                    name.clone(),
                    EventType {
                        name,
                        fields,
                        decl: node.id(),
                    },
                );
            }
            NodeKind::FlagDef => {
                self.claim(&name, node)?;
                let variants = node
                    .list("body")
                    .iter()
                    .filter_map(|member| member.get_str("value.id"))
                    .map(str::to_string)
                    .collect();
                self.module.flags.insert(
                    name.clone(),
                    FlagType {
                        name,
                        variants,
                        decl: node.id(),
                    },
                );
            }
            NodeKind::InterfaceDef => {
                self.claim(&name, node)?;
                let functions = node
                    .list("body")
                    .iter()
                    .filter(|f| f.is(NodeKind::FunctionDef))
                    .filter_map(|f| f.name())
                    .map(str::to_string)
                    .collect();
                self.module
                    .interfaces
                    .insert(name.clone(), InterfaceType { name, functions, decl: node.id() });
            }
            NodeKind::VariableDecl => {
                let name = node.get_str("target.id").unwrap_or_default().to_string();
                self.claim(&name, node)?;
                let typ = node
                    .child("annotation")
                    .map(|annotation| render_type(unwrap_type(annotation)))
                    .unwrap_or_default();
                self.types.push((node.id(), typ.clone()));
                let flag = |key| node.bool_attr(key).unwrap_or(false);
                let info = VarInfo {
                    name: name.clone(),
                    typ,
                    is_constant: flag("is_constant"),
                    is_public: flag("is_public"),
                    is_immutable: flag("is_immutable"),
                    is_transient: flag("is_transient"),
                    decl: node.id(),
                };
                self.module.variables.insert(name, info);
            }
            NodeKind::FunctionDef => {
                self.claim(&name, node)?;
                let function = self.function_type(node)?;
                self.module.functions.insert(name, function);
            }
            _ => {}
        }
        Ok(())
    }

    fn function_type(&mut self, node: NodeRef<'_>) -> CompileResult<FunctionType> {
        let name = node.name().unwrap_or_default().to_string();
        let mut visibility = None;
        let mut mutability = Mutability::Nonpayable;
        for decorator in node.list("decorator_list") {
            let decorator_name = match decorator.kind() {
                NodeKind::Name => decorator.str_attr("id"),
                NodeKind::Call => decorator.get_str("func.id"),
                _ => None,
            };
            match decorator_name {
                Some("external") => visibility = Some(Visibility::External),
                Some("internal") => visibility = Some(Visibility::Internal),
                Some("deploy") => visibility = Some(Visibility::Deploy),
                Some("view") => mutability = Mutability::View,
                Some("pure") => mutability = Mutability::Pure,
                Some("payable") => mutability = Mutability::Payable,
                Some("nonpayable") => mutability = Mutability::Nonpayable,
                Some("nonreentrant") | Some("raw_return") => {}
                Some(other) => {
                    return Err(CompileError::structure(
                        format!("Unknown decorator: {other}"),
                        decorator,
                    ));
                }
                None => return Err(CompileError::structure("Invalid decorator", decorator)),
            }
        }
        let visibility = visibility.unwrap_or(if name == "__init__" {
            Visibility::Deploy
        } else {
            Visibility::Internal
        });

        let mut params = Vec::new();
        for arg in node.child("args").map(|a| a.list("args")).unwrap_or_default() {
            let typ = arg.child("annotation").map(render_type).unwrap_or_default();
            self.types.push((arg.id(), typ.clone()));
            params.push(Member {
                name: arg.str_attr("arg").unwrap_or_default().to_string(),
                typ,
            });
        }

        Ok(FunctionType {
            name,
            visibility,
            mutability,
            params,
            returns: node.child("returns").map(render_type),
            decl: node.id(),
            doc_string: node.str_attr("doc_string").map(|doc| doc.trim().to_string()),
        })
    }

    fn import_module(
        &self,
        dotted: &str,
        level: u32,
        node: NodeRef<'_>,
    ) -> CompileResult<Arc<ModuleType>> {
        if dotted == BUILTIN_MODULE_PREFIX
            || dotted.starts_with(&format!("{BUILTIN_MODULE_PREFIX}."))
        {
            return Ok(Arc::new(ModuleType::empty(dotted)));
        }
        if !self.resolve_imports {
            return Ok(Arc::new(ModuleType::empty(dotted)));
        }

        let relative: PathBuf = dotted.split('.').collect();
        let roots: Vec<PathBuf> = if level > 0 {
            let mut base = self.search_paths.first().cloned().unwrap_or_default();
            for _ in 1..level {
                base.pop();
            }
            vec![base]
        } else {
            self.search_paths.to_vec()
        };

        for root in roots {
            for extension in ["vy", "vyi"] {
                let candidate = root.join(&relative).with_extension(extension);
                if !candidate.is_file() {
                    continue;
                }
                tracing::debug!(module = dotted, path = %candidate.display(), "resolved import");
                return load_module(&candidate, dotted, node);
            }
        }
        Err(CompileError::at(
            CompileErrorKind::ModuleNotFound,
            format!("Module '{dotted}' not found"),
            node.span(),
        ))
    }

    fn check_types(&mut self, node: NodeRef<'_>) -> CompileResult<()> {
        match node.kind() {
            NodeKind::VariableDecl => {
                if let Some(annotation) = node.child("annotation") {
                    self.check_type(unwrap_type(annotation))?;
                }
            }
            NodeKind::StructDef | NodeKind::EventDef => {
                for member in node.list("body") {
                    if let Some(annotation) = member.child("annotation") {
                        self.check_type(unwrap_type(annotation))?;
                    }
                }
            }
            NodeKind::FunctionDef => {
                for arg in node.child("args").map(|a| a.list("args")).unwrap_or_default() {
                    if let Some(annotation) = arg.child("annotation") {
                        self.check_type(annotation)?;
                    }
                }
                if let Some(returns) = node.child("returns") {
                    self.check_type(returns)?;
                }
                for local in node.descendants_of_kind(NodeKind::AnnAssign) {
                    if let Some(annotation) = local.child("annotation") {
                        self.check_type(annotation)?;
                        self.types.push((local.id(), render_type(annotation)));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn is_known_type(&self, name: &str) -> bool {
        is_base_type(name)
            || matches!(name, "String" | "Bytes" | "HashMap" | "DynArray")
            || self.module.structs.contains_key(name)
            || self.module.flags.contains_key(name)
            || self.module.interfaces.contains_key(name)
            || self.module.imports.contains_key(name)
    }

    fn check_type(&self, node: NodeRef<'_>) -> CompileResult<()> {
        match node.kind() {
            NodeKind::Name => {
                let name = node.str_attr("id").unwrap_or_default();
                if self.is_known_type(name) {
                    Ok(())
                } else {
                    Err(unknown_type(name, node))
                }
            }
            NodeKind::Subscript => {
                let Some(value) = node.child("value") else {
                    return Ok(());
                };
                let parameters = match node.child("slice") {
                    Some(slice) if slice.is(NodeKind::Tuple) => slice.list("elements"),
                    Some(slice) => vec![slice],
                    None => Vec::new(),
                };
                match value.str_attr("id") {
                    Some("HashMap") => parameters
                        .into_iter()
                        .take(2)
                        .try_for_each(|p| self.check_type(p)),
                    Some("DynArray") => parameters
                        .into_iter()
                        .take(1)
                        .try_for_each(|p| self.check_type(p)),
                    Some("String") | Some("Bytes") => Ok(()),
                    _ => self.check_type(value),
                }
            }
            NodeKind::Attribute => match node.get_str("value.id") {
                Some(alias) if self.module.imports.contains_key(alias) => Ok(()),
                _ => Err(unknown_type(&render_type(node), node)),
            },
            NodeKind::Tuple => node
                .list("elements")
                .into_iter()
                .try_for_each(|element| self.check_type(element)),
            NodeKind::Call => {
                let inner = unwrap_type(node);
                if inner.id() == node.id() {
                    Ok(())
                } else {
                    self.check_type(inner)
                }
            }
            _ => Ok(()),
        }
    }

    fn check_self_access(&self, function: NodeRef<'_>) -> CompileResult<()> {
        for node in function.descendants() {
            if !node.is(NodeKind::Attribute) || node.get_str("value.id") != Some("self") {
                continue;
            }
            let Some(attr) = node.str_attr("attr") else {
                continue;
            };
            let is_call = node.parent().is_some_and(|parent| {
                parent.is(NodeKind::Call)
                    && parent.child("func").is_some_and(|func| func.id() == node.id())
            });
            let declared = if is_call {
                self.module.functions.contains_key(attr)
            } else {
                self.module.variables.get(attr).is_some_and(|v| !v.is_constant)
                    || SELF_MEMBERS.contains(&attr)
            };
            if !declared {
                return Err(CompileError::at(
                    CompileErrorKind::UndeclaredDefinition,
                    format!("'{attr}' has not been declared"),
                    node.span(),
                ));
            }
        }
        Ok(())
    }
}

fn members(node: NodeRef<'_>) -> Vec<Member> {
    node.list("body")
        .iter()
        .filter(|member| member.is(NodeKind::AnnAssign))
        .map(|member| Member {
            name: member.get_str("target.id").unwrap_or_default().to_string(),
            typ: member
                .child("annotation")
                .map(|annotation| render_type(unwrap_type(annotation)))
                .unwrap_or_default(),
        })
        .collect()
}

fn unknown_type(name: &str, node: NodeRef<'_>) -> CompileError {
    CompileError::at(CompileErrorKind::UnknownType, format!("Unknown type: {name}"), node.span())
}

/// Parse and annotate an imported file, without following its own imports.
fn load_module(path: &Path, dotted: &str, import: NodeRef<'_>) -> CompileResult<Arc<ModuleType>> {
    let relocate = |error: CompileError| {
        CompileError::at(error.kind, format!("{dotted}: {}", error.message), import.span())
    };
    let source = std::fs::read_to_string(path).map_err(|error| {
        CompileError::at(
            CompileErrorKind::ModuleNotFound,
            format!("Could not read {}: {error}", path.display()),
            import.span(),
        )
    })?;
    let parsed = parser::parse(&source).map_err(relocate)?;
    annotate(&parsed.tree, Some(path), &[], false).map_err(relocate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> CompileResult<Arc<ModuleType>> {
        let parsed = parser::parse(source).unwrap();
        annotate(&parsed.tree, None, &[], true)
    }

    #[test]
    fn test_module_tables() {
        let module = check(
            "struct Point:\n    x: int128\n    y: int128\n\nflag Color:\n    RED\n    BLUE\n\nowner: public(address)\nLIMIT: constant(uint256) = 10\n\n@external\n@view\ndef get(p: Point) -> int128:\n    return p.x\n\n@internal\ndef helper():\n    pass\n",
        )
        .unwrap();
        assert_eq!(module.structs["Point"].fields[1].name, "y");
        assert_eq!(module.flags["Color"].variants, vec!["RED", "BLUE"]);
        assert!(module.variables["owner"].is_public);
        assert_eq!(module.variables["owner"].typ, "address");
        assert!(module.variables["LIMIT"].is_constant);
        let get = &module.functions["get"];
        assert_eq!(get.visibility, Visibility::External);
        assert_eq!(get.mutability, Mutability::View);
        assert_eq!(get.signature(), "get(p: Point) -> int128");
        assert!(module.functions["helper"].is_internal());
    }

    #[test]
    fn test_namespace_collision_points_at_both_declarations() {
        let error = check("x: uint256\nx: address\n").unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::NamespaceCollision);
        assert_eq!(error.span.map(|s| s.lineno), Some(2));
        assert_eq!(error.annotations.iter().map(|s| s.lineno).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_unknown_type() {
        let error = check("x: HashMap[address, uint7]\n").unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::UnknownType);
        assert_eq!(error.message, "Unknown type: uint7");
    }

    #[test]
    fn test_undeclared_self_call() {
        let error = check("@external\ndef foo():\n    self.bar()\n").unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::UndeclaredDefinition);
        assert_eq!(error.message, "'bar' has not been declared");
    }

    #[test]
    fn test_unknown_decorator() {
        let error = check("@extrnal\ndef foo():\n    pass\n").unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::StructureException);
    }

    #[test]
    fn test_builtin_interface_import() {
        let module = check("from ethereum.ercs import IERC20\n\ntoken: IERC20\n").unwrap();
        assert!(module.imports.contains_key("IERC20"));
    }

    #[test]
    fn test_missing_module() {
        let error = check("import missing_lib\n").unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::ModuleNotFound);
    }

    #[test]
    fn test_import_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.vy"),
            "counter: uint256\n\n@internal\ndef bump():\n    self.counter += 1\n",
        )
        .unwrap();
        let parsed =
            parser::parse("import lib\n\n@external\ndef foo():\n    lib.bump()\n").unwrap();
        let module = annotate(&parsed.tree, None, &[dir.path().to_path_buf()], true).unwrap();
        let lib = &module.imports["lib"];
        assert!(lib.functions["bump"].is_internal());
        assert!(lib.variables.contains_key("counter"));
        assert_eq!(lib.path.as_deref(), Some(dir.path().join("lib.vy").as_path()));
    }
}
