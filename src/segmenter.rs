use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use regex::{Captures, Regex};
use crate::crawler::Crawler;
use crate::lexer::{is_function_subsequence, Lexer};
use crate::token::{Kind, Token};

static UNIT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"={5,} *([^=\s]*) *=+").expect("unit header pattern"));

// fn add(a, b) => ...
static FULL_WORD_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)([A-Za-z]+)[ \t]+([^\s(=!?]+)[ \t]*\(([^)]*)\)[ \t]*=>")
        .expect("full word function pattern")
});

// add = (a, b) => ...
static PARAMETER_FIRST_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)([^\s(=!?]+)[ \t]*=[ \t]*\(([^)]*)\)[ \t]*=>")
        .expect("parameter first function pattern")
});

// add(a, b) => ...
static NAMED_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)([^\s(=!?]+)[ \t]*\(([^)]*)\)[ \t]*=>").expect("named function pattern")
});

/// One `===== name =====` separated part of an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub name: Option<String>,
    pub body: String,
    /// Line of the input file the body starts on.
    pub first_line: usize,
}

pub fn split_units(source: &str) -> Vec<SourceUnit> {
    let mut units = Vec::new();
    let mut cursor = 0;
    let mut pending_name: Option<String> = None;
    let mut pending_line = 1;
    let mut seen_header = false;

    for captures in UNIT_HEADER.captures_iter(source) {
        let Some(header) = captures.get(0) else {
            continue;
        };
        let body = &source[cursor..header.start()];
        if seen_header || !body.trim().is_empty() {
            units.push(SourceUnit {
                name: pending_name.take(),
                body: body.to_string(),
                first_line: pending_line,
            });
        }

        seen_header = true;
        pending_name = captures
            .get(1)
            .map(|name| name.as_str().to_string())
            .filter(|name| !name.is_empty());
        cursor = header.end();
        pending_line = line_of(source, cursor);
    }

    units.push(SourceUnit {
        name: pending_name,
        body: source[cursor..].to_string(),
        first_line: pending_line,
    });
    units
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Source text after comment stripping, brace normalization and function canonicalization,
/// with the original line of every output line.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub text: String,
    pub lines: Vec<usize>,
}

impl Preprocessed {
    pub fn original_line(&self, line: usize) -> usize {
        self.lines
            .get(line.saturating_sub(1))
            .or(self.lines.last())
            .copied()
            .unwrap_or(line)
    }
}

/// Rewrite a lexed unit into the canonical form the classifier understands.
pub fn preprocess(tokens: Vec<Token>) -> Preprocessed {
    let normalized = normalize_braces(tokens);
    let text = normalized
        .text
        .split('\n')
        .map(canonicalize_function)
        .collect::<Vec<_>>()
        .join("\n");
    Preprocessed {
        text,
        lines: normalized.lines,
    }
}

/// Comments disappear with the tokens. `{` always ends a line and `}` always stands alone.
fn normalize_braces(tokens: Vec<Token>) -> Preprocessed {
    let first_line = tokens.first().map(|token| token.line).unwrap_or(1);
    let mut text = String::new();
    let mut lines = vec![first_line];
    let mut crawler = Crawler::new(tokens);

    let break_line = |text: &mut String, lines: &mut Vec<usize>, line: usize| {
        text.push('\n');
        lines.push(line);
    };

    while let Some(token) = crawler.pop() {
        match token.kind {
            Kind::Eof => break,
            Kind::Newline => break_line(&mut text, &mut lines, token.line + 1),
            Kind::LBrace => {
                text.push('{');
                if !ends_line(crawler.peek_significant()) {
                    skip_whitespace(&mut crawler);
                    break_line(&mut text, &mut lines, token.line);
                }
            }
            Kind::RBrace => {
                let current = text.rsplit('\n').next().unwrap_or("");
                if !current.trim().is_empty() {
                    let trimmed = text.trim_end_matches([' ', '\t']).len();
                    text.truncate(trimmed);
                    break_line(&mut text, &mut lines, token.line);
                }
                text.push('}');
                let next = crawler.peek_significant();
                let terminated = ends_line(next)
                    || next.is_some_and(|t| matches!(t.kind, Kind::Bang | Kind::Question));
                if !terminated {
                    skip_whitespace(&mut crawler);
                    break_line(&mut text, &mut lines, token.line);
                }
            }
            _ => text.push_str(&token.lexeme),
        }
    }

    Preprocessed { text, lines }
}

fn ends_line(token: Option<&Token>) -> bool {
    token.map_or(true, |token| matches!(token.kind, Kind::Newline | Kind::Eof))
}

fn skip_whitespace(crawler: &mut Crawler<Token>) {
    while crawler.peek_at(0).is_some_and(|token| token.kind.is_whitespace()) {
        crawler.pop();
    }
}

/// Fold the three function spellings into `function name(params) =>`.
fn canonicalize_function(line: &str) -> String {
    if let Some(captures) = FULL_WORD_FUNCTION.captures(line) {
        if is_function_subsequence(&captures[2]) {
            return rewrite(line, &captures, &captures[3], &captures[4]);
        }
    }
    if let Some(captures) = PARAMETER_FIRST_FUNCTION.captures(line) {
        return rewrite(line, &captures, &captures[2], &captures[3]);
    }
    if let Some(captures) = NAMED_FUNCTION.captures(line) {
        if !is_keyword(&captures[2]) {
            return rewrite(line, &captures, &captures[2], &captures[3]);
        }
    }
    line.to_string()
}

fn is_keyword(word: &str) -> bool {
    Kind::keyword(&word.to_uppercase()).is_some()
}

fn rewrite(line: &str, captures: &Captures, name: &str, params: &str) -> String {
    let end = captures.get(0).map_or(0, |m| m.end());
    format!(
        "{}function {}({}) =>{}",
        &captures[1],
        name,
        params.trim(),
        &line[end..]
    )
}

/// A candidate statement cut at a terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub text: String,
    /// Count of `!` in the terminator.
    pub priority: usize,
    /// Whether the terminator held a `?`.
    pub debug: bool,
    pub line: usize,
}

/// Cut preprocessed text at newlines and runs of `!`/`?`. Strings keep their terminators.
/// Only a statement that starts a line keeps its leading whitespace.
pub fn split_statements(preprocessed: &Preprocessed, currency: char) -> Vec<RawStatement> {
    let tokens = Lexer::new(&preprocessed.text, Path::new(""))
        .with_currency(currency)
        .tokenize();
    let mut crawler = Crawler::new(tokens);
    let mut statements = Vec::new();
    let mut text = String::new();
    let mut start_line = 1;
    let mut mid_line = false;

    while let Some(token) = crawler.pop() {
        if mid_line && text.is_empty() && token.kind.is_whitespace() {
            continue;
        }
        if text.is_empty() {
            start_line = token.line;
        }

        if token.kind == Kind::Eof || token.kind.is_terminator() {
            mid_line = token.kind != Kind::Newline;
            let mut priority = 0;
            let mut debug = false;
            let mut next = Some(token);
            while let Some(terminator) = next.take() {
                match terminator.kind {
                    Kind::Bang => priority += terminator.lexeme.len(),
                    Kind::Question => debug = true,
                    _ => {}
                }
                if terminator.kind != Kind::Newline
                    && crawler.peek_at(0).is_some_and(|t| matches!(t.kind, Kind::Bang | Kind::Question))
                {
                    next = crawler.pop();
                }
            }

            if !text.trim().is_empty() {
                statements.push(RawStatement {
                    text: std::mem::take(&mut text).trim_end().to_string(),
                    priority,
                    debug,
                    line: preprocessed.original_line(start_line),
                });
            }
            text.clear();
            continue;
        }

        text.push_str(&token.lexeme);
    }

    statements
}

/// Code fragments waiting for a later statement index.
#[derive(Debug, Default)]
pub struct Futures {
    pending: BTreeMap<usize, Vec<String>>,
}

impl Futures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, index: usize, fragment: String) {
        self.pending.entry(index).or_default().push(fragment);
    }

    /// Fragments due at `index`, in scheduling order. Each index is handed out once.
    pub fn take(&mut self, index: usize) -> Vec<String> {
        self.pending.remove(&index).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
