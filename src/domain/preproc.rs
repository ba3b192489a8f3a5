//! Preprocessor function-macro interpretation.
//!
//! Function-like macros embedded in Fortran source, with nested macro
//! calls, `##` token pasting, and multi-line bodies. Macro detection is
//! speculative upstream (any identifier followed by `(...)` is tried
//! against the table), so every failure mode here degrades to an empty
//! expansion rather than an error.

use std::collections::{HashMap, HashSet};

/// Bound on recursive expansion. Definitions registered through the
/// table cannot reference themselves, but a hand-assembled cycle of
/// definitions must still terminate.
const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum TermKind {
    /// Verbatim token text.
    Literal(String),
    /// Reference to a formal parameter, substituted at call time.
    Param(String),
    /// `##` paste marker: suppresses the separator that would otherwise
    /// precede the next token.
    Join,
}

/// One pre-tokenized body token. `spaced` records whether whitespace
/// preceded the token in the source, so expansion reproduces the
/// body's spacing except at paste points.
#[derive(Debug, Clone, PartialEq)]
struct Term {
    kind: TermKind,
    spaced: bool,
}

/// A named function-macro definition with a pre-tokenized body.
#[derive(Debug, Clone)]
pub struct MacroDefinition {
    name: String,
    params: Vec<String>,
    terms: Vec<Term>,
}

impl MacroDefinition {
    /// Parse a definition. `arg_spec` must be of the form
    /// `(p1, p2, ..., pn)`; anything else marks the definition invalid
    /// and later interpretation is a no-op. The body may span multiple
    /// lines joined by a trailing `\`.
    ///
    /// Calls to macros already registered in `table` are interpreted
    /// eagerly here, their expansion spliced into the term list.
    pub fn new(name: &str, arg_spec: &str, body: &str, table: &MacroTable) -> Self {
        let mut def = MacroDefinition {
            name: name.to_string(),
            params: Vec::new(),
            terms: Vec::new(),
        };

        let inner = match arg_spec
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
        {
            Some(inner) => inner,
            None => {
                def.name.clear();
                return def;
            }
        };

        let mut param_set: HashSet<String> = HashSet::new();
        for piece in inner.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            def.params.push(piece.to_string());
            param_set.insert(piece.to_string());
        }

        // Reconstruct one logical body from continued physical lines.
        let mut joined = String::new();
        for line in body.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            joined.push_str(line.strip_suffix('\\').unwrap_or(line));
        }
        if joined.is_empty() {
            return def;
        }

        def.terms = tokenize_body(&joined, &param_set, table, 0);
        def
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Expand one invocation. `arg_str` is the parenthesized argument
    /// text from the call site. Returns the fully substituted token
    /// string, or "" when this is not a valid invocation (malformed
    /// parentheses or arity mismatch).
    ///
    /// `enclosing_params` is non-empty only when expanding a nested
    /// call inside another macro's definition: argument names that are
    /// parameters of the enclosing macro stay parameter references so
    /// the enclosing pass can substitute them later, and empty
    /// arguments between commas are preserved.
    pub fn interpret(
        &self,
        arg_str: &str,
        table: &MacroTable,
        enclosing_params: Option<&HashSet<String>>,
    ) -> String {
        match self.expand_terms(arg_str, table, enclosing_params, 0) {
            Some(terms) => render(&terms),
            None => String::new(),
        }
    }

    /// Expansion to a term sequence, used both by `interpret` and when
    /// splicing a nested call into a defining macro's body. None means
    /// "not a macro invocation".
    fn expand_terms(
        &self,
        arg_str: &str,
        _table: &MacroTable,
        enclosing_params: Option<&HashSet<String>>,
        depth: usize,
    ) -> Option<Vec<Term>> {
        if !self.is_valid() || depth > MAX_EXPANSION_DEPTH {
            return None;
        }
        let inner = arg_str
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))?;

        let mut args: Vec<String> = Vec::new();
        if !inner.trim().is_empty() {
            for piece in inner.split(',') {
                let piece = piece.trim();
                if piece.is_empty() && enclosing_params.is_none() {
                    // An omitted argument is only meaningful inside
                    // another macro's definition.
                    continue;
                }
                args.push(piece.to_string());
            }
        }

        if args.len() != self.params.len() {
            return None;
        }

        let mut out = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            match &term.kind {
                TermKind::Join => out.push(term.clone()),
                TermKind::Literal(_) => out.push(term.clone()),
                TermKind::Param(p) => {
                    let idx = self.params.iter().position(|q| q == p)?;
                    let actual = &args[idx];
                    let kind = match enclosing_params {
                        Some(set) if set.contains(actual) => TermKind::Param(actual.clone()),
                        _ => TermKind::Literal(actual.clone()),
                    };
                    out.push(Term {
                        kind,
                        spaced: term.spaced,
                    });
                }
            }
        }
        Some(out)
    }
}

/// Append-only registry of macro definitions for one preprocessing
/// pass. Passed explicitly into every interpretation; no global state.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    defs: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.defs.get(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Register a definition. Invalid definitions are dropped; a name
    /// seen twice keeps its first definition.
    pub fn add(&mut self, def: MacroDefinition) {
        if def.is_valid() {
            self.defs.entry(def.name.clone()).or_insert(def);
        }
    }

    /// Parse and register in one step, resolving nested calls against
    /// the macros registered so far.
    pub fn define(&mut self, name: &str, arg_spec: &str, body: &str) {
        let def = MacroDefinition::new(name, arg_spec, body, self);
        self.add(def);
    }

    /// Expand a call to a registered macro; "" when the name is
    /// unknown or the invocation is not valid.
    pub fn expand(&self, name: &str, arg_str: &str) -> String {
        self.get(name)
            .map(|def| def.interpret(arg_str, self, None))
            .unwrap_or_default()
    }
}

/// A lexed source token with its leading-whitespace flag.
struct Tok {
    text: String,
    spaced: bool,
}

/// Tokenize a macro body: identifiers, `##`, balanced `(...)` groups
/// as single tokens, and everything else character by character.
fn lex(src: &str) -> Vec<Tok> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let mut spaced = false;
        while i < chars.len() && chars[i].is_whitespace() {
            spaced = true;
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let start = i;
        let c = chars[i];
        if c == '(' {
            // Balanced group as one token, the way call-site argument
            // lists arrive from the tokenizer.
            let mut level = 0;
            while i < chars.len() {
                match chars[i] {
                    '(' => level += 1,
                    ')' => {
                        level -= 1;
                        if level == 0 {
                            i += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
        } else if c == '#' && chars.get(i + 1) == Some(&'#') {
            i += 2;
        } else if c.is_alphanumeric() || c == '_' || c == '$' {
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
        } else {
            i += 1;
        }
        toks.push(Tok {
            text: chars[start..i].iter().collect(),
            spaced,
        });
    }
    toks
}

/// Classify body tokens into terms, expanding calls to known macros
/// eagerly. The defining macro's parameter set is passed down so that
/// parameter names inside nested argument lists stay references.
fn tokenize_body(
    src: &str,
    params: &HashSet<String>,
    table: &MacroTable,
    depth: usize,
) -> Vec<Term> {
    let toks = lex(src);
    let mut terms = Vec::new();
    let mut i = 0;
    while i < toks.len() {
        let tok = &toks[i];
        if tok.text == "##" {
            terms.push(Term {
                kind: TermKind::Join,
                spaced: tok.spaced,
            });
        } else if params.contains(&tok.text) {
            terms.push(Term {
                kind: TermKind::Param(tok.text.clone()),
                spaced: tok.spaced,
            });
        } else if let Some(def) = table.get(&tok.text) {
            let next = toks.get(i + 1);
            let arg_group = next
                .filter(|n| n.text.starts_with('(') && n.text.ends_with(')'))
                .map(|n| n.text.as_str());
            if let Some(arg_group) = arg_group {
                if let Some(mut spliced) =
                    def.expand_terms(arg_group, table, Some(params), depth + 1)
                {
                    if let Some(first) = spliced.first_mut() {
                        first.spaced = tok.spaced;
                    }
                    terms.extend(spliced);
                    i += 2; // consume the argument-list token too
                    continue;
                }
            }
            push_plain(&mut terms, tok, params, table, depth);
        } else {
            push_plain(&mut terms, tok, params, table, depth);
        }
        i += 1;
    }
    terms
}

/// Emit a non-macro token. Parenthesized groups arrive as single
/// tokens and are re-tokenized, so parameter references inside an
/// ordinary (non-macro) call's arguments still substitute.
fn push_plain(
    terms: &mut Vec<Term>,
    tok: &Tok,
    params: &HashSet<String>,
    table: &MacroTable,
    depth: usize,
) {
    if tok.text.len() >= 2 && tok.text.starts_with('(') && tok.text.ends_with(')') {
        terms.push(Term {
            kind: TermKind::Literal("(".to_string()),
            spaced: tok.spaced,
        });
        terms.extend(tokenize_body(
            &tok.text[1..tok.text.len() - 1],
            params,
            table,
            depth,
        ));
        terms.push(Term {
            kind: TermKind::Literal(")".to_string()),
            spaced: false,
        });
    } else {
        terms.push(Term {
            kind: TermKind::Literal(tok.text.clone()),
            spaced: tok.spaced,
        });
    }
}

/// Concatenate terms, reproducing source spacing except where a `##`
/// marker suppresses it.
fn render(terms: &[Term]) -> String {
    let mut out = String::new();
    let mut suppress = false;
    for term in terms {
        match &term.kind {
            TermKind::Join => suppress = true,
            TermKind::Literal(text) | TermKind::Param(text) => {
                if term.spaced && !suppress && !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(text);
                suppress = false;
            }
        }
    }
    out
}
