use std::cmp::{Ordering, Reverse};
use crate::crawler::Crawler;
use crate::error::ExpressionError;

const OPERATOR_CHARS: &str = "+-*/\\%^&|<>=;.";
const PREVIOUS: &str = "previous";

/// Score a whitespace character contributes to an operator's priority.
fn whitespace_weight(c: char) -> usize {
    if c == '\t' {
        3
    } else {
        1
    }
}

fn is_operator_char(c: char) -> bool {
    OPERATOR_CHARS.contains(c)
}

fn is_inline_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

fn is_structural(c: char) -> bool {
    "()[]{}:,\n\r".contains(c)
}

/// Static binding strength. Higher binds tighter.
pub fn precedence(operator: &str) -> Option<u8> {
    let precedence = match operator {
        "(" | ")" | "[" | "]" => 20,
        "." => 18,
        "**" => 15,
        "*" | "/" | "\\" | "%" => 13,
        "+" | "-" => 12,
        "<<" | ">>" | ">>>" => 11,
        "<" | ">" | "<=" | ">=" => 10,
        "==" | "===" | "====" | ";=" => 9,
        "&" => 8,
        "^" => 7,
        "|" => 6,
        "&&" => 5,
        "||" => 4,
        _ => return None,
    };
    Some(precedence)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Identifier,
    Operation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawToken {
    kind: RawKind,
    lexeme: String,
    /// Whitespace surrounding an operator. More whitespace binds looser.
    priority: usize,
    /// Target literal for strings; the lexeme keeps the source spelling.
    rendered: Option<String>,
}

impl RawToken {
    fn identifier(lexeme: String) -> Self {
        Self {
            kind: RawKind::Identifier,
            lexeme,
            priority: 0,
            rendered: None,
        }
    }

    fn string(source: String, rendered: String) -> Self {
        Self {
            rendered: Some(rendered),
            ..Self::identifier(source)
        }
    }

    fn operation(lexeme: impl Into<String>, priority: usize) -> Self {
        Self {
            kind: RawKind::Operation,
            lexeme: lexeme.into(),
            priority,
            rendered: None,
        }
    }

    fn is_open(&self) -> bool {
        self.kind == RawKind::Operation && (self.lexeme == "(" || self.lexeme == "[")
    }

    fn is_close(&self) -> bool {
        self.kind == RawKind::Operation && (self.lexeme == ")" || self.lexeme == "]")
    }

    /// Whitespace priority decides first; the static table only breaks ties.
    fn binding(&self) -> (Reverse<usize>, u8) {
        (Reverse(self.priority), precedence(&self.lexeme).unwrap_or(0))
    }

    fn binds_tighter_than(&self, other: &RawToken) -> bool {
        self.binding().cmp(&other.binding()) == Ordering::Greater
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Redirect,
    Identifier,
    Operator,
    Done,
}

struct Scanner {
    crawler: Crawler<char>,
    tokens: Vec<RawToken>,
    expect_operand: bool,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            crawler: Crawler::new(source.chars().collect()),
            tokens: Vec::new(),
            expect_operand: true,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ExpressionError {
        ExpressionError::Malformed {
            reason: reason.into(),
            offset: self.crawler.position(),
        }
    }

    fn skip_spaces(&mut self) {
        while self.crawler.peek_at(0).is_some_and(|c| is_inline_space(*c)) {
            self.crawler.pop();
        }
    }

    fn scan(mut self) -> Result<Vec<RawToken>, ExpressionError> {
        let mut state = State::Redirect;
        while state != State::Done {
            state = match state {
                State::Redirect => self.redirect()?,
                State::Identifier => self.identifier()?,
                State::Operator => self.operator()?,
                State::Done => State::Done,
            };
        }
        Ok(self.tokens)
    }

    fn redirect(&mut self) -> Result<State, ExpressionError> {
        let Some(&next) = self.crawler.peek_skipping(|c| is_inline_space(*c)) else {
            return Ok(State::Done);
        };

        match next {
            '(' | '[' => {
                if !self.expect_operand {
                    return Err(self.malformed(format!("unexpected `{next}` after an operand")));
                }
                self.skip_spaces();
                self.crawler.pop();
                self.tokens.push(RawToken::operation(next.to_string(), 0));
                Ok(State::Redirect)
            }
            ')' | ']' => {
                if self.expect_operand {
                    return Err(self.malformed(format!("`{next}` where an operand was expected")));
                }
                self.skip_spaces();
                self.crawler.pop();
                self.tokens.push(RawToken::operation(next.to_string(), 0));
                Ok(State::Redirect)
            }
            c if is_structural(c) => Err(self.malformed(format!("`{}` cannot start an expression", c.escape_default()))),
            c if is_operator_char(c) => {
                if self.expect_operand {
                    return Err(self.malformed(format!("illegal leading operator `{c}`")));
                }
                Ok(State::Operator)
            }
            _ => {
                if !self.expect_operand {
                    return Err(self.malformed("two operands without an operator between them"));
                }
                Ok(State::Identifier)
            }
        }
    }

    fn identifier(&mut self) -> Result<State, ExpressionError> {
        self.skip_spaces();
        self.expect_operand = false;

        if self.crawler.peek_at(0).is_some_and(|c| is_quote(*c)) {
            let (source, rendered) = self.quoted()?;
            self.tokens.push(RawToken::string(source, rendered));
            return Ok(State::Redirect);
        }

        let lexeme = self.word();
        let lexeme = if lexeme.eq_ignore_ascii_case(PREVIOUS) {
            self.skip_spaces();
            let target = self.word();
            if target.is_empty() {
                return Err(self.malformed("`previous` needs a variable name"));
            }
            format!("{PREVIOUS} {target}")
        } else {
            lexeme
        };

        self.tokens.push(RawToken::identifier(lexeme));
        Ok(State::Redirect)
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.crawler.peek_at(0) {
            let decimal_point = c == '.'
                && word.chars().last().is_some_and(|p| p.is_ascii_digit())
                && word.chars().all(|p| p.is_ascii_digit() || p == '.')
                && self.crawler.peek_at(1).is_some_and(|n| n.is_ascii_digit());
            if !decimal_point && (c.is_whitespace() || is_operator_char(c) || is_structural(c) || is_quote(c)) {
                break;
            }
            word.push(c);
            self.crawler.pop();
        }
        word
    }

    /// A string in any quote format, as its source text and its target literal. The closing
    /// format mirrors the opening one; a string left open runs to the end of the expression.
    fn quoted(&mut self) -> Result<(String, String), ExpressionError> {
        let mut source = String::new();
        let mut quote_format = Vec::new();
        while let Some(&c) = self.crawler.peek_at(0) {
            if !is_quote(c) {
                break;
            }
            quote_format.push(c);
            source.push(c);
            self.crawler.pop();
        }

        let mut content = String::new();
        loop {
            match self.crawler.peek_at(0).copied() {
                None => return Ok((source, render_string(&content))),
                Some(c) if is_quote(c) => break,
                Some(c) => {
                    self.crawler.pop();
                    source.push(c);
                    content.push(c);
                    if c == '\\' {
                        if let Some(escaped) = self.crawler.pop() {
                            source.push(escaped);
                            content.push(escaped);
                        }
                    }
                }
            }
        }

        for expected in quote_format.iter().rev() {
            match self.crawler.pop() {
                Some(c) if c == *expected => source.push(c),
                _ => return Err(self.malformed("string quote format mismatched")),
            }
        }
        Ok((source, render_string(&content)))
    }

    fn operator(&mut self) -> Result<State, ExpressionError> {
        let mut lexeme = String::new();
        let mut priority = 0;

        loop {
            match self.crawler.peek_at(0).copied() {
                Some(c) if is_inline_space(c) => {
                    let mut run = 0;
                    let mut weight = 0;
                    while let Some(c) = self.crawler.pop() {
                        if !is_inline_space(c) {
                            self.crawler.back(1);
                            break;
                        }
                        run += 1;
                        weight += whitespace_weight(c);
                    }
                    if self.crawler.peek_at(0).is_some_and(|c| is_operator_char(*c)) {
                        priority += weight;
                    } else {
                        // Trailing whitespace belongs to the next operand
                        self.crawler.back(run);
                        break;
                    }
                }
                Some(c) if is_operator_char(c) => {
                    self.crawler.pop();
                    lexeme.push(c);
                }
                _ => break,
            }
        }

        if precedence(&lexeme).is_none() {
            return Err(ExpressionError::UnknownOperator(lexeme));
        }
        self.tokens.push(RawToken::operation(lexeme, priority));
        self.expect_operand = true;
        Ok(State::Redirect)
    }
}

/// Reorder into postfix with the whitespace-aware comparison.
fn to_postfix(tokens: Vec<RawToken>) -> Result<Vec<RawToken>, ExpressionError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<RawToken> = Vec::new();

    for token in tokens {
        if token.kind == RawKind::Identifier {
            output.push(token);
        } else if token.is_open() {
            stack.push(token);
        } else if token.is_close() {
            let opener = if token.lexeme == ")" { "(" } else { "[" };
            loop {
                match stack.pop() {
                    Some(top) if top.lexeme == opener => break,
                    Some(top) if top.is_open() => return Err(ExpressionError::UnbalancedBrackets),
                    Some(top) => output.push(top),
                    None => return Err(ExpressionError::UnbalancedBrackets),
                }
            }
        } else {
            while let Some(top) = stack.last() {
                if top.is_open() || token.binds_tighter_than(top) {
                    break;
                }
                if let Some(top) = stack.pop() {
                    output.push(top);
                }
            }
            stack.push(token);
        }
    }

    while let Some(top) = stack.pop() {
        if top.is_open() {
            return Err(ExpressionError::UnbalancedBrackets);
        }
        output.push(top);
    }

    Ok(output)
}

#[derive(Debug, Clone)]
enum Node {
    Identifier(String),
    Literal { text: String, source: String },
    /// Already a runtime expression.
    Call { text: String, source: String },
}

impl Node {
    fn leaf(token: RawToken) -> Self {
        let RawToken { lexeme, rendered, .. } = token;
        if let Some(text) = rendered {
            Node::Literal { text, source: lexeme }
        } else if is_decimal(&lexeme) {
            Node::Literal {
                text: lexeme.clone(),
                source: lexeme,
            }
        } else if lexeme.eq_ignore_ascii_case("true") || lexeme.eq_ignore_ascii_case("false") {
            Node::Literal {
                text: lexeme.to_ascii_lowercase(),
                source: lexeme,
            }
        } else if let Some(name) = previous_target(&lexeme) {
            Node::Call {
                text: previous_call(name),
                source: lexeme.clone(),
            }
        } else {
            Node::Identifier(lexeme)
        }
    }

    fn source(&self) -> &str {
        match self {
            Node::Identifier(text) => text,
            Node::Literal { source, .. } | Node::Call { source, .. } => source,
        }
    }

    /// Text when used as an argument of a resolve call.
    fn argument(&self) -> String {
        match self {
            Node::Identifier(name) => quote_key(name),
            Node::Literal { text, .. } | Node::Call { text, .. } => text.clone(),
        }
    }

    /// Text when this node is the whole expression.
    fn resolved(&self) -> String {
        match self {
            Node::Identifier(name) => get_var(name),
            Node::Literal { text, .. } | Node::Call { text, .. } => text.clone(),
        }
    }
}

/// Digits with an optional `.digits` fraction and an optional leading `-`. Words such as
/// `inf` or `nan` are names, not numbers.
pub fn is_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    digits(whole) && fraction.map_or(true, digits)
}

/// Double-quoted target literal. Backslash escapes pass through as written.
fn render_string(content: &str) -> String {
    let mut rendered = String::from('"');
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                rendered.push('\\');
                rendered.push(chars.next().unwrap_or('\\'));
            }
            '"' => rendered.push_str("\\\""),
            c => rendered.push(c),
        }
    }
    rendered.push('"');
    rendered
}

fn previous_target(lexeme: &str) -> Option<&str> {
    let (keyword, name) = lexeme.split_once(' ')?;
    keyword.eq_ignore_ascii_case(PREVIOUS).then_some(name)
}

/// Variable names are string keys unless they are purely numeric.
pub fn quote_key(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
        name.to_string()
    } else {
        serde_json::Value::String(name.to_string()).to_string()
    }
}

pub fn get_var(name: &str) -> String {
    format!("current_scope.get_var({})", quote_key(name))
}

pub fn previous_call(name: &str) -> String {
    format!("{}.previous()", get_var(name))
}

fn reconstruct(postfix: Vec<RawToken>) -> Result<String, ExpressionError> {
    let mut stack: Vec<Node> = Vec::new();

    for token in postfix {
        if token.kind == RawKind::Identifier {
            stack.push(Node::leaf(token));
            continue;
        }

        let missing = || ExpressionError::Malformed {
            reason: format!("operator `{}` is missing an operand", token.lexeme),
            offset: 0,
        };
        let rhs = stack.pop().ok_or_else(missing)?;
        let lhs = stack.pop().ok_or_else(missing)?;

        let node = if token.lexeme == "====" {
            let folded = (lhs.source() == rhs.source()).to_string();
            Node::Literal {
                text: folded.clone(),
                source: folded,
            }
        } else {
            Node::Call {
                text: format!(
                    "current_scope.resolve({}, {}, {})",
                    lhs.argument(),
                    quote_key(&token.lexeme),
                    rhs.argument()
                ),
                source: format!("{} {} {}", lhs.source(), token.lexeme, rhs.source()),
            }
        };
        stack.push(node);
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(node), true) => Ok(node.resolved()),
        (Some(_), false) => Err(ExpressionError::Malformed {
            reason: "operands without an operator".to_string(),
            offset: 0,
        }),
        (None, _) => Err(ExpressionError::Empty),
    }
}

/// Translate a `{...}` value into a runtime expression. Anything not wrapped in braces is
/// already literal and comes back unchanged.
pub fn evaluate(raw: &str) -> Result<String, ExpressionError> {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) else {
        return Ok(raw.to_string());
    };

    let tokens = Scanner::new(inner).scan()?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    reconstruct(to_postfix(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postfix(source: &str) -> Vec<String> {
        let tokens = Scanner::new(source).scan().expect("scan");
        to_postfix(tokens)
            .expect("postfix")
            .into_iter()
            .map(|t| t.lexeme)
            .collect()
    }

    #[test]
    fn unbracketed_values_pass_through() {
        assert_eq!(evaluate("5").unwrap(), "5");
        assert_eq!(evaluate("\"text\"").unwrap(), "\"text\"");
    }

    #[test]
    fn lone_identifier_resolves_through_the_scope() {
        assert_eq!(evaluate("{x}").unwrap(), "current_scope.get_var(\"x\")");
        assert_eq!(evaluate("{42}").unwrap(), "42");
    }

    #[test]
    fn operator_priority_counts_leading_whitespace() {
        let tokens = Scanner::new("1 +  2\t*3").scan().unwrap();
        assert_eq!(tokens[1].lexeme, "+");
        assert_eq!(tokens[1].priority, 1);
        assert_eq!(tokens[3].lexeme, "*");
        assert_eq!(tokens[3].priority, 3);
    }

    #[test]
    fn default_precedence_without_extra_spaces() {
        assert_eq!(postfix("1 + 2 * 3"), vec!["1", "2", "3", "*", "+"]);
        assert_eq!(postfix("1+2*3"), vec!["1", "2", "3", "*", "+"]);
    }

    #[test]
    fn extra_spaces_loosen_an_operator() {
        assert_eq!(postfix("1 + 2  *  3"), vec!["1", "2", "+", "3", "*"]);
        assert_eq!(postfix("1  +  2 * 3"), vec!["1", "2", "3", "*", "+"]);
        assert_eq!(postfix("1 - 2-3"), vec!["1", "2", "3", "-", "-"]);
    }

    #[test]
    fn grouping_differs_in_generated_code() {
        let tight = evaluate("{1 + 2 * 3}").unwrap();
        let loose = evaluate("{1 + 2  *  3}").unwrap();
        assert_eq!(
            tight,
            "current_scope.resolve(1, \"+\", current_scope.resolve(2, \"*\", 3))"
        );
        assert_eq!(
            loose,
            "current_scope.resolve(current_scope.resolve(1, \"+\", 2), \"*\", 3)"
        );
    }

    #[test]
    fn brackets_group() {
        assert_eq!(postfix("(1 + 2) * 3"), vec!["1", "2", "+", "3", "*"]);
        assert_eq!(postfix("[a]"), vec!["a"]);
    }

    #[test]
    fn identifiers_become_string_keys() {
        assert_eq!(
            evaluate("{x + 1}").unwrap(),
            "current_scope.resolve(\"x\", \"+\", 1)"
        );
        assert_eq!(
            evaluate("{\"a b\" + name}").unwrap(),
            "current_scope.resolve(\"a b\", \"+\", \"name\")"
        );
    }

    #[test]
    fn literal_equality_folds_at_compile_time() {
        assert_eq!(evaluate("{x ==== x}").unwrap(), "true");
        assert_eq!(evaluate("{x ==== y}").unwrap(), "false");
        assert_eq!(evaluate("{1.0 ==== 1}").unwrap(), "false");
    }

    #[test]
    fn previous_reads_the_prior_value() {
        assert_eq!(
            evaluate("{previous x}").unwrap(),
            "current_scope.get_var(\"x\").previous()"
        );
        assert_eq!(
            evaluate("{previous x + 1}").unwrap(),
            "current_scope.resolve(current_scope.get_var(\"x\").previous(), \"+\", 1)"
        );
    }

    #[test]
    fn real_numbers_stay_whole() {
        assert_eq!(postfix("1.5 * a.b"), vec!["1.5", "a", "b", ".", "*"]);
    }

    #[test]
    fn leading_operator_is_malformed() {
        assert!(matches!(
            evaluate("{* 2}"),
            Err(ExpressionError::Malformed { .. })
        ));
        assert!(matches!(
            evaluate("{: 2}"),
            Err(ExpressionError::Malformed { .. })
        ));
    }

    #[test]
    fn unbalanced_brackets_fail() {
        assert_eq!(evaluate("{(1 + 2}"), Err(ExpressionError::UnbalancedBrackets));
        assert!(evaluate("{1 + 2)}").is_err());
        assert_eq!(evaluate("{(1 + 2]}"), Err(ExpressionError::UnbalancedBrackets));
    }

    #[test]
    fn unknown_operators_fail() {
        assert_eq!(
            evaluate("{1 +* 2}"),
            Err(ExpressionError::UnknownOperator("+*".to_string()))
        );
    }

    #[test]
    fn empty_braces_fail() {
        assert_eq!(evaluate("{ }"), Err(ExpressionError::Empty));
    }

    #[test]
    fn float_words_are_names() {
        assert_eq!(evaluate("{nan}").unwrap(), "current_scope.get_var(\"nan\")");
        assert_eq!(
            evaluate("{inf + 1}").unwrap(),
            "current_scope.resolve(\"inf\", \"+\", 1)"
        );
        assert_eq!(evaluate("{Infinity}").unwrap(), "current_scope.get_var(\"Infinity\")");
        assert!(is_decimal("12"));
        assert!(is_decimal("-1.5"));
        assert!(!is_decimal("1."));
        assert!(!is_decimal("1e5"));
        assert!(!is_decimal("NaN"));
    }

    #[test]
    fn booleans_are_lowercased() {
        assert_eq!(evaluate("{TRUE}").unwrap(), "true");
        assert_eq!(
            evaluate("{False || x}").unwrap(),
            "current_scope.resolve(false, \"||\", \"x\")"
        );
    }

    #[test]
    fn open_strings_close_at_the_end() {
        assert_eq!(evaluate("{\"never closed}").unwrap(), "\"never closed\"");
        assert_eq!(evaluate("{'it\\'s}").unwrap(), "\"it\\'s\"");
    }

    #[test]
    fn quote_formats_become_one_literal() {
        assert_eq!(evaluate("{\"\"hello\"\"}").unwrap(), "\"hello\"");
        assert_eq!(evaluate("{'\"say\"' + 1}").unwrap(), "current_scope.resolve(\"say\", \"+\", 1)");
        assert!(matches!(
            evaluate("{\"\"a\"'}"),
            Err(ExpressionError::Malformed { .. })
        ));
    }

    #[test]
    fn quote_format_spelling_matters_for_literal_equality() {
        assert_eq!(evaluate("{\"a\" ==== 'a'}").unwrap(), "false");
        assert_eq!(evaluate("{'a' ==== 'a'}").unwrap(), "true");
    }

    #[test]
    fn numeric_names_are_not_quoted() {
        assert_eq!(quote_key("5"), "5");
        assert_eq!(quote_key("five"), "\"five\"");
    }
}
