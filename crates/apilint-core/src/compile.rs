//! Ahead-of-time compilation of path expressions into anchored patterns.
//!
//! Only a restricted subset of the path-query language is accepted:
//!
//! - member access, direct (`.name`, `['name']`, `[0]`) or descendant (`..name`)
//! - wildcards, direct (`.*`) or descendant (`..*`)
//! - the array wildcard subscript (`[*]`)
//! - filter subscripts made only of `@property === <literal>` comparisons
//!   joined with `||`
//!
//! Everything else compiles to [`CompiledExpression::Unsupported`] and the
//! rule owning it is evaluated by the fallback query engine instead.
//!
//! Patterns are tested against locations built by the traverser: segments
//! pointer-encoded and joined with `/`, without a leading separator. The root
//! document itself is never tested.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::pointer::encode_fragment;

/// The literal root selector.
pub const ROOT: &str = "$";

/// Outcome of compiling one path expression.
#[derive(Debug, Clone)]
pub enum CompiledExpression {
    /// The literal root selector; matches the document itself.
    NoPatternNeeded,
    /// A single anchored pattern.
    Pattern(Regex),
    /// Several anchored patterns; a location matches if any does.
    PatternList(Vec<Regex>),
    /// The expression is outside the compilable subset.
    Unsupported,
}

impl CompiledExpression {
    /// Returns true unless the expression must be evaluated by the fallback
    /// engine.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    /// Returns the patterns carried by this expression.
    #[must_use]
    pub fn patterns(&self) -> &[Regex] {
        match self {
            Self::Pattern(pattern) => std::slice::from_ref(pattern),
            Self::PatternList(patterns) => patterns,
            Self::NoPatternNeeded | Self::Unsupported => &[],
        }
    }

    /// Tests an encoded location string against the patterns.
    #[must_use]
    pub fn matches(&self, location: &str) -> bool {
        self.patterns().iter().any(|p| p.is_match(location))
    }
}

impl PartialEq for CompiledExpression {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NoPatternNeeded, Self::NoPatternNeeded)
            | (Self::Unsupported, Self::Unsupported) => true,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            (Self::PatternList(a), Self::PatternList(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.as_str() == b.as_str())
            }
            _ => false,
        }
    }
}

impl Eq for CompiledExpression {}

/// Reasons an expression falls outside the compilable subset.
///
/// Never surfaced to users; logged at debug level when a rule is demoted.
#[derive(Debug, thiserror::Error)]
enum Unsupported {
    #[error("expression must start with `$`")]
    MissingRoot,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unsupported syntax at offset {0}")]
    Syntax(usize),
    #[error("unsupported filter: {0}")]
    Filter(String),
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Memoizing compiler for path expressions.
///
/// Both supported and unsupported outcomes are cached by raw expression for
/// the lifetime of the compiler. Entries are never evicted.
#[derive(Debug, Default)]
pub struct PathCompiler {
    cache: RwLock<HashMap<String, CompiledExpression>>,
}

static GLOBAL: LazyLock<PathCompiler> = LazyLock::new(PathCompiler::new);

impl PathCompiler {
    /// Creates a compiler with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide compiler used by ruleset loading.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Compiles an expression, consulting the cache first.
    ///
    /// Never fails: expressions outside the subset yield
    /// [`CompiledExpression::Unsupported`].
    pub fn compile(&self, expression: &str) -> CompiledExpression {
        if expression == ROOT {
            return CompiledExpression::NoPatternNeeded;
        }

        if let Some(hit) = self.cache.read().get(expression) {
            return hit.clone();
        }

        let compiled = match compile_uncached(expression) {
            Ok(pattern) => CompiledExpression::Pattern(pattern),
            Err(reason) => {
                debug!("Path `{expression}` not compilable: {reason}");
                CompiledExpression::Unsupported
            }
        };

        self.cache
            .write()
            .entry(expression.to_string())
            .or_insert(compiled)
            .clone()
    }

    /// Compiles a rule's expressions into one value.
    ///
    /// A single expression compiles as [`PathCompiler::compile`] does.
    /// Otherwise root selectors contribute no pattern and the remaining
    /// patterns form a [`CompiledExpression::PatternList`]; callers track
    /// the root themselves. Expressions made only of root selectors yield
    /// [`CompiledExpression::NoPatternNeeded`]. An empty list, or any
    /// unsupported expression, yields [`CompiledExpression::Unsupported`]
    /// for the whole list.
    pub fn compile_many<S: AsRef<str>>(&self, expressions: &[S]) -> CompiledExpression {
        if let [single] = expressions {
            return self.compile(single.as_ref());
        }

        let mut patterns = Vec::with_capacity(expressions.len());
        let mut root = false;
        for expression in expressions {
            match self.compile(expression.as_ref()) {
                CompiledExpression::NoPatternNeeded => root = true,
                CompiledExpression::Pattern(p) => patterns.push(p),
                CompiledExpression::PatternList(ps) => patterns.extend(ps),
                CompiledExpression::Unsupported => return CompiledExpression::Unsupported,
            }
        }
        match (root, patterns.is_empty()) {
            (false, true) => CompiledExpression::Unsupported,
            (true, true) => CompiledExpression::NoPatternNeeded,
            _ => CompiledExpression::PatternList(patterns),
        }
    }

    /// Returns true if the expression has been compiled before.
    #[must_use]
    pub fn is_cached(&self, expression: &str) -> bool {
        self.cache.read().contains_key(expression)
    }

    /// Returns the number of cached expressions.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

/// Compiles an expression with the process-wide compiler.
pub fn compile(expression: &str) -> CompiledExpression {
    PathCompiler::global().compile(expression)
}

// ────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Name(String),
    Wildcard,
    ArrayWildcard,
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    scope: Scope,
    selector: Selector,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn parse(mut self) -> Result<Vec<Step>, Unsupported> {
        if !self.eat(ROOT) {
            return Err(Unsupported::MissingRoot);
        }

        let mut steps = Vec::new();
        while self.pos < self.src.len() {
            if self.eat("..") {
                let selector = match self.peek() {
                    Some('[') => self.bracket()?,
                    Some('*') => {
                        self.pos += 1;
                        Selector::Wildcard
                    }
                    Some(_) => Selector::Name(self.name()?),
                    None => return Err(Unsupported::UnexpectedEnd),
                };
                // `..[*]` selects objects and arrays alike; a digits-only
                // pattern would drop object members.
                if selector == Selector::ArrayWildcard {
                    return Err(Unsupported::Syntax(self.pos));
                }
                steps.push(Step {
                    scope: Scope::Descendant,
                    selector,
                });
            } else if self.eat(".") {
                let selector = if self.eat("*") {
                    Selector::Wildcard
                } else {
                    Selector::Name(self.name()?)
                };
                steps.push(Step {
                    scope: Scope::Child,
                    selector,
                });
            } else if self.peek() == Some('[') {
                let selector = self.bracket()?;
                steps.push(Step {
                    scope: Scope::Child,
                    selector,
                });
            } else {
                return Err(Unsupported::Syntax(self.pos));
            }
        }

        Ok(steps)
    }

    /// Reads a dot-notation member name.
    fn name(&mut self) -> Result<String, Unsupported> {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| c == '.' || c == '[')
            .unwrap_or(self.rest().len());
        let name = &self.rest()[..len];
        if name.is_empty()
            || name.contains(|c: char| {
                c.is_whitespace() || matches!(c, '*' | '@' | '(' | ')' | ']' | '\'' | '"' | ',' | '~' | '^')
            })
        {
            return Err(Unsupported::Syntax(start));
        }
        self.pos += len;
        Ok(name.to_string())
    }

    /// Reads a `[...]` subscript.
    fn bracket(&mut self) -> Result<Selector, Unsupported> {
        let start = self.pos;
        if !self.eat("[") {
            return Err(Unsupported::Syntax(start));
        }
        self.skip_ws();

        let selector = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Selector::ArrayWildcard
            }
            Some('\'' | '"') => Selector::Name(self.quoted()?),
            Some(c) if c.is_ascii_digit() => Selector::Name(self.digits()),
            Some('?') => {
                self.pos += 1;
                let close = find_closing_bracket(self.rest()).ok_or(Unsupported::UnexpectedEnd)?;
                let body = &self.rest()[..close];
                let values = FilterParser::new(body).parse()?;
                self.pos += close;
                Selector::AnyOf(values)
            }
            Some(_) => return Err(Unsupported::Syntax(self.pos)),
            None => return Err(Unsupported::UnexpectedEnd),
        };

        self.skip_ws();
        if !self.eat("]") {
            return Err(Unsupported::Syntax(self.pos));
        }
        Ok(selector)
    }

    fn quoted(&mut self) -> Result<String, Unsupported> {
        let (value, consumed) = read_quoted(self.rest()).ok_or(Unsupported::UnexpectedEnd)?;
        self.pos += consumed;
        Ok(value)
    }

    fn digits(&mut self) -> String {
        let len = self
            .rest()
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest().len());
        let digits = self.rest()[..len].to_string();
        self.pos += len;
        digits
    }
}

/// Reads a single- or double-quoted string starting at `src[0]`.
///
/// Returns the unescaped value and the number of bytes consumed.
fn read_quoted(src: &str) -> Option<(String, usize)> {
    let quote = src.chars().next()?;
    let mut value = String::new();
    let mut escaped = false;
    for (i, c) in src.char_indices().skip(1) {
        if escaped {
            value.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some((value, i + c.len_utf8()));
        } else {
            value.push(c);
        }
    }
    None
}

/// Finds the `]` closing a filter body, skipping quoted strings and nested
/// brackets.
fn find_closing_bracket(src: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = src.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                let (_, consumed) = read_quoted(&src[i..])?;
                // skip the rest of the literal
                let end = i + consumed;
                for _ in src[i + c.len_utf8()..end].chars() {
                    chars.next();
                }
            }
            '[' => depth += 1,
            ']' if depth == 0 => return Some(i),
            ']' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Parser for `@property === 'a' || @property === 'b'` filters.
struct FilterParser<'a> {
    inner: Parser<'a>,
}

impl<'a> FilterParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            inner: Parser::new(src),
        }
    }

    fn unsupported(&self) -> Unsupported {
        Unsupported::Filter(self.inner.src.trim().to_string())
    }

    fn parse(mut self) -> Result<Vec<String>, Unsupported> {
        let values = self.disjunction()?;
        self.inner.skip_ws();
        if self.inner.pos != self.inner.src.len() {
            return Err(self.unsupported());
        }
        Ok(values)
    }

    fn disjunction(&mut self) -> Result<Vec<String>, Unsupported> {
        let mut values = self.term()?;
        loop {
            self.inner.skip_ws();
            if !self.inner.eat("||") {
                return Ok(values);
            }
            values.extend(self.term()?);
        }
    }

    fn term(&mut self) -> Result<Vec<String>, Unsupported> {
        self.inner.skip_ws();
        if self.inner.eat("(") {
            let values = self.disjunction()?;
            self.inner.skip_ws();
            if !self.inner.eat(")") {
                return Err(self.unsupported());
            }
            return Ok(values);
        }

        let left = self.operand()?;
        self.inner.skip_ws();
        if !(self.inner.eat("===") || self.inner.eat("==")) {
            return Err(self.unsupported());
        }
        let right = self.operand()?;

        match (left, right) {
            (Operand::Property, Operand::Literal(value))
            | (Operand::Literal(value), Operand::Property) => Ok(vec![value]),
            _ => Err(self.unsupported()),
        }
    }

    fn operand(&mut self) -> Result<Operand, Unsupported> {
        self.inner.skip_ws();
        if self.inner.eat("@property") {
            let boundary = self
                .inner
                .peek()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '.'));
            return if boundary {
                Ok(Operand::Property)
            } else {
                Err(self.unsupported())
            };
        }
        match self.inner.peek() {
            Some('\'' | '"') => Ok(Operand::Literal(self.inner.quoted()?)),
            Some(c) if c.is_ascii_digit() => Ok(Operand::Literal(self.inner.digits())),
            _ => Err(self.unsupported()),
        }
    }
}

enum Operand {
    Property,
    Literal(String),
}

// ────────────────────────────────────────────
// Pattern emission
// ────────────────────────────────────────────

fn literal(value: &str) -> String {
    regex::escape(&encode_fragment(value))
}

fn fragment(step: &Step) -> String {
    let single = match &step.selector {
        Selector::Name(name) => literal(name),
        Selector::Wildcard => match step.scope {
            Scope::Child => return "[^/]*".to_string(),
            Scope::Descendant => return ".*".to_string(),
        },
        Selector::ArrayWildcard => return "[0-9]+".to_string(),
        Selector::AnyOf(values) => format!(
            "(?:{})",
            values.iter().map(|v| literal(v)).collect::<Vec<_>>().join("|")
        ),
    };

    match step.scope {
        Scope::Child => single,
        Scope::Descendant => format!("(?:.*/{single}|{single})"),
    }
}

fn compile_uncached(expression: &str) -> Result<Regex, Unsupported> {
    let steps = Parser::new(expression).parse()?;
    if steps.is_empty() {
        return Err(Unsupported::UnexpectedEnd);
    }
    let body = steps.iter().map(fragment).collect::<Vec<_>>().join("/");
    Ok(Regex::new(&format!("(?s)^{body}$"))?)
}
