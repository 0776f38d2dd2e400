//! The immutable intermediate representation.
//!
//! The IR is owned by the program loader (out of scope for this crate —
//! lexing/parsing/lowering happens upstream) and shared read-only with every
//! evaluator. Nothing here is ever mutated after construction; child scopes
//! are produced by the evaluators cloning [`crate::ctx::Ctx`], never by
//! mutating the tree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, typed argument to a decorator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub name: Option<String>,
    pub value: ArgValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    String(String),
    Number(f64),
    Bool(bool),
    Identifier(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) | ArgValue::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Source position, carried through for diagnostics only — never consulted
/// by evaluator logic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

/// One fragment of a shell element's command text: either literal source
/// text or a value-decorator invocation to be expanded at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    Literal(String),
    Decorator { name: String, args: Vec<Arg> },
}

/// The structured content of a `shell`-kind [`ChainElement`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementContent {
    pub parts: Vec<ContentPart>,
}

impl ElementContent {
    pub fn literal(text: impl Into<String>) -> Self {
        ElementContent {
            parts: vec![ContentPart::Literal(text.into())],
        }
    }
}

/// The chain operator joining a [`ChainElement`] to the one that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpNext {
    #[default]
    None,
    And,
    Or,
    Pipe,
    Append,
}

impl fmt::Display for OpNext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpNext::None => "",
            OpNext::And => "&&",
            OpNext::Or => "||",
            OpNext::Pipe => "|",
            OpNext::Append => ">>",
        })
    }
}

/// Note: `pattern` never appears as a `ChainElement` when a pattern
/// decorator is nested *inside* a larger chain — the source grammar only
/// allows it as a whole command/step body. We still model it as a
/// `ChainElement` kind (rather than growing a separate tagged-union IR node
/// type alongside `CommandSeq`/`CommandStep`) so `Program.commands` can stay
/// a plain `CommandSeq`: a pattern-only command body is a `CommandSeq` with
/// one `CommandStep` holding one `ChainElement` of this kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainElementKind {
    Shell,
    Action,
    Block,
    Pattern,
}

/// A single operand of a chain within a [`CommandStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainElement {
    pub kind: ChainElementKind,
    /// Decorator name; present for `action`/`block`/`pattern` kinds, absent
    /// for `shell`.
    pub name: Option<String>,
    pub args: Vec<Arg>,
    /// Present iff `kind == Shell`.
    pub content: Option<ElementContent>,
    /// Present iff `kind == Block`.
    pub inner_steps: Vec<CommandStep>,
    /// Present iff `kind == Pattern`.
    pub branches: Branches,
    pub op_next: OpNext,
    /// Present iff `op_next == Append`.
    pub target: Option<String>,
    pub span: Span,
}

impl ChainElement {
    pub fn shell(content: ElementContent, op_next: OpNext) -> Self {
        ChainElement {
            kind: ChainElementKind::Shell,
            name: None,
            args: Vec::new(),
            content: Some(content),
            inner_steps: Vec::new(),
            branches: Branches::new(),
            op_next,
            target: None,
            span: Span::default(),
        }
    }

    pub fn action(name: impl Into<String>, args: Vec<Arg>) -> Self {
        ChainElement {
            kind: ChainElementKind::Action,
            name: Some(name.into()),
            args,
            content: None,
            inner_steps: Vec::new(),
            branches: Branches::new(),
            op_next: OpNext::None,
            target: None,
            span: Span::default(),
        }
    }

    pub fn block(name: impl Into<String>, args: Vec<Arg>, inner_steps: Vec<CommandStep>) -> Self {
        ChainElement {
            kind: ChainElementKind::Block,
            name: Some(name.into()),
            args,
            content: None,
            inner_steps,
            branches: Branches::new(),
            op_next: OpNext::None,
            target: None,
            span: Span::default(),
        }
    }

    pub fn pattern(name: impl Into<String>, args: Vec<Arg>, branches: Branches) -> Self {
        ChainElement {
            kind: ChainElementKind::Pattern,
            name: Some(name.into()),
            args,
            content: None,
            inner_steps: Vec::new(),
            branches,
            op_next: OpNext::None,
            target: None,
            span: Span::default(),
        }
    }

    /// Validates the `OpNext::Append` ⇒ non-empty `Target` invariant that
    /// the spec mandates be enforced at load time (§9, Open Question 1).
    pub fn validate(&self) -> Result<(), crate::error::ClidefError> {
        if self.op_next == OpNext::Append {
            match &self.target {
                Some(t) if !t.is_empty() => {}
                _ => {
                    return Err(crate::error::ClidefError::parameter_validation(
                        "chain",
                        "append operator (>>) requires a non-empty target path",
                    ))
                }
            }
        }
        for step in &self.inner_steps {
            step.validate()?;
        }
        for seq in self.branches.values() {
            seq.validate()?;
        }
        Ok(())
    }
}

/// An ordered, non-empty chain of [`ChainElement`]s joined by chain operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandStep {
    pub elements: Vec<ChainElement>,
}

impl CommandStep {
    pub fn new(elements: Vec<ChainElement>) -> Self {
        debug_assert!(!elements.is_empty(), "CommandStep must be non-empty");
        CommandStep { elements }
    }

    pub fn validate(&self) -> Result<(), crate::error::ClidefError> {
        for el in &self.elements {
            el.validate()?;
        }
        Ok(())
    }
}

/// Sequential execution of steps; the first failing step short-circuits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSeq {
    pub steps: Vec<CommandStep>,
}

impl CommandSeq {
    pub fn new(steps: Vec<CommandStep>) -> Self {
        CommandSeq { steps }
    }

    pub fn validate(&self) -> Result<(), crate::error::ClidefError> {
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }
}

/// A pattern decorator's named sub-sequences (`main`/`catch`/`finally` for
/// `@try`; arbitrary identifiers plus `default` for `@when`).
pub type Branches = IndexMap<String, CommandSeq>;

/// The top-level container handed to the evaluators: an ordered map from
/// command name to its body, so `generate` mode emits functions in
/// declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub commands: IndexMap<String, CommandSeq>,
}

impl Program {
    pub fn validate(&self) -> Result<(), crate::error::ClidefError> {
        for seq in self.commands.values() {
            seq.validate()?;
        }
        Ok(())
    }
}
