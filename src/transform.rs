//! Expression normalization.
//!
//! Expands the `state` / `var` / `ref` / `effect` shorthands into canonical
//! statement records. Script passes through untouched. Order is kept exactly
//! as declared; no reordering, no dedup, shadowing allowed. Every declaration
//! of a name bound more than once in a function is written with `var`.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::tree::{ArrayItem, ExpressionNode, Pattern, ValueExpr};

pub const USE_STATE: &str = "useState";
pub const USE_REF: &str = "useRef";
pub const USE_EFFECT: &str = "useEffect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclarationKind {
    /// `const <binding> = <code>;`
    Const,
    /// `<code>;`
    Call,
    /// Copied verbatim.
    Script,
}

/// One normalized statement of a component body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub kind: DeclarationKind,
    /// Rendered binding pattern for `Const` statements.
    pub binding: Option<String>,
    pub bound_names: Vec<String>,
    pub code: String,
    /// Runtime hook this statement calls, if any.
    #[serde(skip)]
    pub hook: Option<&'static str>,
    /// Declared with `var` because one of its names is bound again in the same function.
    pub redeclared: bool,
}

impl Statement {
    fn constant(pattern: &Pattern, code: String, hook: Option<&'static str>) -> Self {
        Statement {
            kind: DeclarationKind::Const,
            binding: Some(pattern.render()),
            bound_names: pattern.bound_names(),
            code,
            hook,
            redeclared: false,
        }
    }

    pub fn keyword(&self) -> &'static str {
        if self.redeclared {
            "var"
        } else {
            "const"
        }
    }

    pub fn render(&self) -> String {
        match self.kind {
            DeclarationKind::Const => format!(
                "{} {} = {};",
                self.keyword(),
                self.binding.as_deref().unwrap_or("_"),
                self.code
            ),
            DeclarationKind::Call => format!("{};", self.code),
            DeclarationKind::Script => self.code.clone(),
        }
    }
}

fn initial_code(initial: &Option<ValueExpr>) -> String {
    initial.as_ref().map(ValueExpr::to_code).unwrap_or_default()
}

pub fn normalize_expression(expression: &ExpressionNode) -> Statement {
    match expression {
        ExpressionNode::Script(code) => Statement {
            kind: DeclarationKind::Script,
            binding: None,
            bound_names: vec![],
            code: code.clone(),
            hook: None,
            redeclared: false,
        },
        ExpressionNode::State {
            getter,
            setter,
            initial,
        } => {
            let pattern = Pattern::Array {
                items: vec![
                    Some(ArrayItem {
                        name: getter.clone(),
                        default: None,
                    }),
                    Some(ArrayItem {
                        name: setter.clone(),
                        default: None,
                    }),
                ],
                rest: None,
            };
            let code = format!("{}({})", USE_STATE, initial_code(initial));
            Statement::constant(&pattern, code, Some(USE_STATE))
        }
        ExpressionNode::Var { pattern, value } => {
            Statement::constant(pattern, value.trim().to_string(), None)
        }
        ExpressionNode::Ref { name, initial } => {
            let code = format!("{}({})", USE_REF, initial_code(initial));
            Statement::constant(&Pattern::Name(name.clone()), code, Some(USE_REF))
        }
        ExpressionNode::Effect { body, dependencies } => {
            let body = body.trim();
            // Multi-line bodies are kept line for line.
            let callback = if body.contains('\n') {
                format!("() => {{\n{}\n}}", body)
            } else {
                format!("() => {{ {} }}", body)
            };
            let code = match dependencies {
                Some(deps) => format!("{}({}, [{}])", USE_EFFECT, callback, deps.join(", ")),
                None => format!("{}({})", USE_EFFECT, callback),
            };
            Statement {
                kind: DeclarationKind::Call,
                binding: None,
                bound_names: vec![],
                code,
                hook: Some(USE_EFFECT),
                redeclared: false,
            }
        }
    }
}

pub fn normalize(expressions: &[ExpressionNode]) -> Vec<Statement> {
    expressions.iter().map(normalize_expression).collect()
}

/// Marks every `Const` statement binding a name that is bound more than once
/// across `outer` (names bound before the body, such as parameters and
/// context locals) and the statements. Returns those names.
pub fn mark_redeclarations(statements: &mut [Statement], outer: &[String]) -> HashSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let declared = statements
        .iter()
        .filter(|s| s.kind == DeclarationKind::Const)
        .flat_map(|s| s.bound_names.iter());
    for name in outer.iter().chain(declared) {
        *counts.entry(name.as_str()).or_default() += 1;
    }
    let repeated: HashSet<String> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(name, _)| name.to_string())
        .collect();

    for statement in statements.iter_mut() {
        if statement.kind == DeclarationKind::Const
            && statement.bound_names.iter().any(|n| repeated.contains(n))
        {
            statement.redeclared = true;
        }
    }
    repeated
}

/// Hooks referenced by `statements`, in first-use order.
pub fn hooks_used(statements: &[Statement]) -> Vec<&'static str> {
    let mut hooks = vec![];
    for hook in statements.iter().filter_map(|s| s.hook) {
        if !hooks.contains(&hook) {
            hooks.push(hook);
        }
    }
    hooks
}
