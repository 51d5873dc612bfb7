//! Classification of Python positions as catalog references.
//!
//! A position is a reference when it sits in the inputs or outputs slot of a
//! pipeline-node call. Three gates decide this:
//!
//! - **callable gate**: the callee name contains the node-constructor token
//! - **import gate**: the module imports the token from the library
//! - **slot gate**: the position is a slot keyword argument, or a positional
//!   argument at one of the slot indices
//!
//! Complete calls are checked structurally. While the user is still typing
//! (the argument list has syntax errors, or the position falls between
//! arguments) a backward token scan counts commas instead, and the result is
//! at most [`MatchResult::PotentialReference`].

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::trace;
use tree_sitter::Node;

use crate::source::{PythonSource, string_content_range};

/// Classification of a syntax position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    /// Not a catalog reference.
    NotAReference,

    /// Inside a slot of a complete node call.
    ConfirmedReference,

    /// Plausibly a slot of a node call that is still being typed.
    PotentialReference,
}

impl MatchResult {
    /// Whether the result is confirmed.
    pub fn is_confirmed(self) -> bool {
        self == Self::ConfirmedReference
    }

    /// Whether the result is confirmed or potential.
    pub fn is_candidate(self) -> bool {
        self != Self::NotAReference
    }
}

/// Which argument of the node call a position occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentSlot {
    /// A keyword argument, e.g. `inputs=`.
    Keyword(String),

    /// A positional argument by zero-based index.
    Positional(usize),
}

/// Matcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Library the node constructor is imported from.
    pub library: String,

    /// Token the callee name and the import must mention.
    pub constructor_token: String,

    /// Keywords of the catalog slots.
    pub slot_keywords: Vec<String>,

    /// Zero-based positional indices of the catalog slots.
    pub positional_slots: Vec<usize>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            library: "kedro".to_string(),
            constructor_token: "node".to_string(),
            slot_keywords: vec!["inputs".to_string(), "outputs".to_string()],
            positional_slots: vec![1, 2],
        }
    }
}

impl MatcherConfig {
    /// Set the library name.
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    /// Set the constructor token.
    pub fn with_constructor_token(mut self, token: impl Into<String>) -> Self {
        self.constructor_token = token.into();
        self
    }

    /// Whether `keyword` names a catalog slot.
    ///
    /// Exact matches count, and so do prefixes at most one character short
    /// (`input`, `output`).
    pub fn is_slot_keyword(&self, keyword: &str) -> bool {
        !keyword.is_empty()
            && self.slot_keywords.iter().any(|slot| {
                slot == keyword || (slot.starts_with(keyword) && keyword.len() + 1 >= slot.len())
            })
    }

    /// Whether `index` is a positional catalog slot.
    pub fn is_positional_slot(&self, index: usize) -> bool {
        self.positional_slots.contains(&index)
    }
}

/// Owned description of a classified position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSite {
    /// Classification.
    pub result: MatchResult,

    /// Slot the position occupies, when one could be determined.
    pub slot: Option<ArgumentSlot>,

    /// Callee name of the enclosing call.
    pub callee: Option<String>,

    /// Content of the enclosing string literal, without quotes.
    pub literal: Option<String>,

    /// Byte range of the literal content.
    pub literal_range: Option<Range<usize>>,
}

impl ReferenceSite {
    fn not_a_reference() -> Self {
        Self {
            result: MatchResult::NotAReference,
            slot: None,
            callee: None,
            literal: None,
            literal_range: None,
        }
    }
}

/// Decides whether Python positions are catalog references.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMatcher {
    config: MatcherConfig,
}

impl ReferenceMatcher {
    /// Create a matcher.
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// The matcher configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Classify a node.
    pub fn classify(&self, source: &PythonSource, node: Node<'_>) -> MatchResult {
        self.inspect(source, node).result
    }

    /// Classify the position at a byte offset.
    pub fn site_at(&self, source: &PythonSource, offset: usize) -> ReferenceSite {
        match source.node_at(offset) {
            Some(node) => self.inspect_at(source, node, offset),
            None => ReferenceSite::not_a_reference(),
        }
    }

    /// Classify a node and describe where it sits.
    pub fn inspect(&self, source: &PythonSource, node: Node<'_>) -> ReferenceSite {
        self.inspect_at(source, node, node.start_byte())
    }

    fn inspect_at(&self, source: &PythonSource, node: Node<'_>, offset: usize) -> ReferenceSite {
        let literal = enclosing_string(node);
        let subject = literal.unwrap_or(node);
        let mut site = ReferenceSite::not_a_reference();
        if let Some(string) = literal {
            let (start, end) = string_content_range(string);
            site.literal = Some(source.slice(start, end).to_string());
            site.literal_range = Some(start..end);
        }

        let structural = self
            .enclosing_call(source, subject)
            .and_then(|(call, arguments)| {
                if arguments.has_error() {
                    return None;
                }
                let argument = argument_containing(arguments, subject)?;
                Some((call, arguments, argument))
            });

        let (callee, slot, strict) = match structural {
            Some((call, arguments, argument)) => {
                let callee = callee_name(source, call);
                (callee, self.strict_slot(source, arguments, argument, subject), true)
            }
            None => {
                let scan_from = if literal.is_some() {
                    subject.start_byte()
                } else {
                    offset
                };
                match self.scan_tokens(source, scan_from) {
                    Some(scan) => (Some(scan.callee), scan.slot, false),
                    None => return site,
                }
            }
        };
        site.callee.clone_from(&callee);
        site.slot.clone_from(&slot);

        let Some(callee) = callee else {
            return site;
        };
        if !self.passes_callable_gate(&callee) || !self.passes_import_gate(source) {
            trace!("Call to {callee} fails the node gates");
            return site;
        }

        let slot_ok = match &slot {
            Some(ArgumentSlot::Keyword(keyword)) => self.config.is_slot_keyword(keyword),
            Some(ArgumentSlot::Positional(index)) => self.config.is_positional_slot(*index),
            None => false,
        };
        site.result = match (slot_ok, strict) {
            (true, true) => MatchResult::ConfirmedReference,
            (true, false) => MatchResult::PotentialReference,
            (false, _) => MatchResult::NotAReference,
        };
        site
    }

    /// Whether the callee name contains the constructor token.
    pub fn passes_callable_gate(&self, callee: &str) -> bool {
        callee
            .to_lowercase()
            .contains(&self.config.constructor_token.to_lowercase())
    }

    /// Whether the module imports the constructor token from the library.
    pub fn passes_import_gate(&self, source: &PythonSource) -> bool {
        let library = self.config.library.to_lowercase();
        let token = self.config.constructor_token.to_lowercase();
        source.import_statements().into_iter().any(|import| {
            let import = import.to_lowercase();
            import.contains(&library) && import.contains(&token)
        })
    }

    /// Outermost call passing the callable gate whose arguments contain
    /// `subject`, or the nearest call when none passes.
    fn enclosing_call<'tree>(
        &self,
        source: &PythonSource,
        subject: Node<'tree>,
    ) -> Option<(Node<'tree>, Node<'tree>)> {
        let mut nearest = None;
        let mut outermost = None;
        let mut current = subject.parent();
        while let Some(node) = current {
            if node.kind() == "call"
                && let Some(arguments) = node.child_by_field_name("arguments")
                && contains(arguments, subject)
            {
                if callee_name(source, node).is_some_and(|name| self.passes_callable_gate(&name)) {
                    outermost = Some((node, arguments));
                }
                if nearest.is_none() {
                    nearest = Some((node, arguments));
                }
            }
            current = node.parent();
        }
        outermost.or(nearest)
    }

    /// Slot of a complete argument. Keyword arguments win over position.
    fn strict_slot(
        &self,
        source: &PythonSource,
        arguments: Node<'_>,
        argument: Node<'_>,
        subject: Node<'_>,
    ) -> Option<ArgumentSlot> {
        if argument.kind() == "keyword_argument" {
            let name = argument.child_by_field_name("name")?;
            let value = argument.child_by_field_name("value")?;
            if !contains(value, subject) {
                return None;
            }
            return Some(ArgumentSlot::Keyword(source.node_text(name).to_string()));
        }

        let mut cursor = arguments.walk();
        let index = arguments
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .take_while(|child| child.id() != argument.id())
            .count();
        Some(ArgumentSlot::Positional(index))
    }

    /// Walk tokens backward from `offset` to the nearest unclosed call.
    fn scan_tokens(&self, source: &PythonSource, offset: usize) -> Option<TokenScan> {
        let tokens = tokens_before(source.root(), offset);

        let mut depth = 0usize;
        let mut commas = 0usize;
        let mut keyword: Option<String> = None;

        for (position, token) in tokens.iter().enumerate().rev() {
            match token.kind() {
                ")" | "]" | "}" => depth += 1,
                "(" | "[" | "{" if depth > 0 => depth -= 1,
                "[" | "{" => {
                    commas = 0;
                    keyword = None;
                }
                "(" => {
                    let previous = position.checked_sub(1).map(|p| tokens[p]);
                    match previous.filter(|p| p.kind() == "identifier") {
                        Some(identifier) => {
                            let slot = match keyword {
                                Some(keyword) => ArgumentSlot::Keyword(keyword),
                                None => ArgumentSlot::Positional(commas),
                            };
                            return Some(TokenScan {
                                callee: source.node_text(identifier).to_string(),
                                slot: Some(slot),
                            });
                        }
                        None => {
                            commas = 0;
                            keyword = None;
                        }
                    }
                }
                "," if depth == 0 => commas += 1,
                "=" if depth == 0 && commas == 0 && keyword.is_none() => {
                    keyword = position
                        .checked_sub(1)
                        .map(|p| tokens[p])
                        .filter(|p| p.kind() == "identifier")
                        .map(|p| source.node_text(p).to_string());
                }
                _ => {}
            }
        }

        None
    }
}

struct TokenScan {
    callee: String,
    slot: Option<ArgumentSlot>,
}

fn enclosing_string(node: Node<'_>) -> Option<Node<'_>> {
    std::iter::successors(Some(node), Node::parent)
        .take_while(|n| !matches!(n.kind(), "call" | "argument_list" | "module"))
        .find(|n| n.kind() == "string")
}

fn contains(outer: Node<'_>, inner: Node<'_>) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}

/// Direct child of `arguments` that contains `subject`.
fn argument_containing<'tree>(arguments: Node<'tree>, subject: Node<'_>) -> Option<Node<'tree>> {
    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .find(|child| contains(*child, subject))
}

/// Last identifier of a call's function expression.
fn callee_name(source: &PythonSource, call: Node<'_>) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    let identifier = match function.kind() {
        "identifier" => function,
        "attribute" => function.child_by_field_name("attribute")?,
        _ => return None,
    };
    Some(source.node_text(identifier).to_string())
}

/// Leaf tokens ending at or before `offset`, in document order.
///
/// String literals count as single tokens and comments are skipped.
fn tokens_before(root: Node<'_>, offset: usize) -> Vec<Node<'_>> {
    let mut tokens = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.start_byte() >= offset || node.kind() == "comment" {
            continue;
        }
        if node.child_count() == 0 || node.kind() == "string" {
            if node.end_byte() <= offset {
                tokens.push(node);
            }
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    tokens
}
