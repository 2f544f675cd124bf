use std::path::{Path, PathBuf};
use crate::crawler::Crawler;
use crate::error::LexingError;
use crate::token::{Kind, Token, Value};

/// Currency glyph used when the locale offers none.
pub const GENERIC_CURRENCY: char = '¤';

const FUNCTION_WORD: &str = "FUNCTION";
const CLASS_NAME: &str = "className";

/// Characters that end a bare word. The currency glyph is added per lexer.
const RESERVED_CHARS: &str = "!?;:.,{}()[]+-*/\\<>=%^&|\"'";

/// Characters that pair with a following `=` into one operator.
const ASSIGNING_CHARS: &str = "+-*/\\<>%;";

/// Characters allowed right after the fractional point of a number that has no fraction digits.
const AFTER_POINT: &str = "+-*/\\<>=()[]{}%^&|!?;,:";

enum Scan {
    Token(Kind, Value),
    Comment,
}

impl Scan {
    fn plain(kind: Kind) -> Self {
        Scan::Token(kind, Value::None)
    }

    fn error(message: &str) -> Self {
        Scan::Token(Kind::Error, Value::Message(message.to_string()))
    }
}

pub struct Lexer<'a> {
    file_name: &'a Path,
    crawler: Crawler<char>,
    currency: char,
    line: usize,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, file_name: &'a Path) -> Self {
        Self {
            file_name,
            crawler: Crawler::new(input.chars().collect()),
            currency: GENERIC_CURRENCY,
            line: 1,
            position: 1,
        }
    }

    /// Lines reported by tokens start at `line` instead of 1.
    pub fn starting_at(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn with_currency(mut self, currency: char) -> Self {
        self.currency = currency;
        self
    }

    pub fn file_name(&self) -> &Path {
        self.file_name
    }

    /// All tokens up to and including EOF.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == Kind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    /// Produce exactly one token. Comments are skipped, and EOF repeats once the input is exhausted.
    pub fn next_token(&mut self) -> Token {
        loop {
            let start = self.crawler.position();
            let (line, position) = (self.line, self.position);
            let scanned = self.scan();
            let lexeme: String = self.crawler.since(start).iter().collect();
            self.track(&lexeme);

            match scanned {
                Scan::Comment => continue,
                Scan::Token(kind, value) => {
                    return Token {
                        line,
                        position,
                        kind,
                        lexeme,
                        value,
                    }
                }
            }
        }
    }

    fn track(&mut self, consumed: &str) {
        for c in consumed.chars() {
            if c == '\n' {
                self.line += 1;
                self.position = 1;
            } else {
                self.position += 1;
            }
        }
    }

    fn is_reserved(&self, c: char) -> bool {
        c == self.currency || RESERVED_CHARS.contains(c)
    }

    fn next_is(&self, expected: char) -> bool {
        self.crawler.peek_at(0) == Some(&expected)
    }

    fn scan(&mut self) -> Scan {
        let Some(c) = self.crawler.pop() else {
            return Scan::plain(Kind::Eof);
        };

        match c {
            ' ' => {
                if self.crawler.peek(2) == [' ', ' '] {
                    self.crawler.pop();
                    self.crawler.pop();
                    Scan::plain(Kind::Indent)
                } else {
                    Scan::plain(Kind::Space)
                }
            }
            '!' => {
                while self.next_is('!') {
                    self.crawler.pop();
                }
                Scan::plain(Kind::Bang)
            }
            c if self.next_is('=') && ASSIGNING_CHARS.contains(c) => {
                self.crawler.pop();
                Scan::plain(assigning_kind(c))
            }
            '+' | '-' | '&' | '|' | '*' | '<' => self.scan_doubled(c),
            '>' => self.scan_shift(),
            '=' => self.scan_equals(),
            '"' | '\'' => self.scan_string(c),
            '/' => {
                if self.next_is('/') {
                    while let Some(&next) = self.crawler.peek_at(0) {
                        if next == '\n' || next == '\r' {
                            break;
                        }
                        self.crawler.pop();
                    }
                    Scan::Comment
                } else {
                    Scan::plain(Kind::Divide)
                }
            }
            '\n' => Scan::plain(Kind::Newline),
            '\r' => {
                if self.next_is('\n') {
                    self.crawler.pop();
                }
                Scan::plain(Kind::Newline)
            }
            '\t' => Scan::plain(Kind::Indent),
            c if c == self.currency => Scan::plain(Kind::Currency),
            c => {
                if let Some(kind) = single_char_kind(c) {
                    Scan::plain(kind)
                } else if c.is_ascii_digit() {
                    self.scan_number(c)
                } else if c.is_whitespace() {
                    Scan::plain(Kind::Space)
                } else {
                    self.scan_word(c)
                }
            }
        }
    }

    fn scan_doubled(&mut self, c: char) -> Scan {
        let (single, double) = match c {
            '+' => (Kind::Plus, Kind::Inc),
            '-' => (Kind::Minus, Kind::Dec),
            '&' => (Kind::BitAnd, Kind::And),
            '*' => (Kind::Multiply, Kind::Exponent),
            '<' => (Kind::LThan, Kind::ShiftLeft),
            _ => (Kind::BitOr, Kind::Or),
        };

        match self.crawler.pop() {
            Some('*') if c == '*' && self.next_is('=') => {
                self.crawler.pop();
                Scan::plain(Kind::ExpAssign)
            }
            Some(next) if next == c => Scan::plain(double),
            Some(_) => {
                self.crawler.back(1);
                Scan::plain(single)
            }
            None => Scan::plain(single),
        }
    }

    fn scan_shift(&mut self) -> Scan {
        if !self.next_is('>') {
            return Scan::plain(Kind::GThan);
        }
        self.crawler.pop();
        if self.next_is('>') {
            self.crawler.pop();
            Scan::plain(Kind::ShiftRightZero)
        } else {
            Scan::plain(Kind::ShiftRight)
        }
    }

    fn scan_equals(&mut self) -> Scan {
        let mut equals = 1;
        while self.next_is('=') {
            self.crawler.pop();
            equals += 1;
        }

        match equals {
            1 if self.next_is('>') => {
                self.crawler.pop();
                Scan::plain(Kind::Arrow)
            }
            1 => Scan::plain(Kind::Equal),
            2 => Scan::plain(Kind::LooseEquality),
            3 => Scan::plain(Kind::PreciseEquality),
            4 => Scan::plain(Kind::LiteralEquality),
            _ => Scan::error("Too much equality (max is 4)"),
        }
    }

    fn scan_string(&mut self, open: char) -> Scan {
        let mut quote_format = vec![open];
        while let Some(&c) = self.crawler.peek_at(0) {
            if !is_quote(c) {
                break;
            }
            quote_format.push(c);
            self.crawler.pop();
        }

        let mut content = String::new();
        loop {
            match self.crawler.peek_at(0).copied() {
                // Unterminated strings swallow the rest of the input
                None => return Scan::Token(Kind::String, Value::Str(content)),
                // Strings never span lines; the line end closes them
                Some('\n') | Some('\r') => return Scan::Token(Kind::String, Value::Str(content)),
                Some(c) if is_quote(c) => break,
                Some('\\') => {
                    self.crawler.pop();
                    content.push('\\');
                    if let Some(&escaped) = self.crawler.peek_at(0) {
                        if is_quote(escaped) {
                            self.crawler.pop();
                            content.push(escaped);
                        }
                    }
                }
                Some(c) => {
                    self.crawler.pop();
                    content.push(c);
                }
            }
        }

        for expected in quote_format.iter().rev() {
            match self.crawler.pop() {
                Some(c) if c == *expected => {}
                Some(c) => {
                    if !is_quote(c) {
                        self.crawler.back(1);
                    }
                    return Scan::error("String quote format mismatched");
                }
                None => return Scan::error("String quote format mismatched"),
            }
        }

        Scan::Token(Kind::String, Value::Str(content))
    }

    fn scan_number(&mut self, first: char) -> Scan {
        let mut digits = String::from(first);
        while let Some(&c) = self.crawler.peek_at(0) {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.crawler.pop();
        }

        if self.next_is('.') {
            match self.crawler.peek_at(1).copied() {
                Some(c) if c.is_ascii_digit() => {
                    self.crawler.pop();
                    digits.push('.');
                    while let Some(&c) = self.crawler.peek_at(0) {
                        if !c.is_ascii_digit() {
                            break;
                        }
                        digits.push(c);
                        self.crawler.pop();
                    }
                    return match digits.parse::<f64>() {
                        Ok(real) => Scan::Token(Kind::Real, Value::Real(real)),
                        Err(_) => Scan::error("Malformed real number"),
                    };
                }
                Some(c) if !c.is_whitespace() && !AFTER_POINT.contains(c) => {
                    self.crawler.pop();
                    return Scan::error("Non-operator immediately after real; letters are not real");
                }
                _ => {}
            }
        }

        match digits.parse::<i64>() {
            Ok(int) => Scan::Token(Kind::Int, Value::Int(int)),
            // Too wide for i64; the target's numbers are doubles anyway
            Err(_) => Scan::Token(Kind::Real, Value::Real(digits.parse().unwrap_or(f64::INFINITY))),
        }
    }

    fn scan_word(&mut self, first: char) -> Scan {
        let mut lexeme = String::from(first);
        while let Some(&c) = self.crawler.peek_at(0) {
            if c.is_whitespace() || self.is_reserved(c) {
                break;
            }
            lexeme.push(c);
            self.crawler.pop();
        }

        let upper = lexeme.to_uppercase();
        if let Some(keyword) = Kind::keyword(&upper) {
            return Scan::plain(keyword);
        }

        // Case sensitive on purpose
        if lexeme == CLASS_NAME {
            return Scan::plain(Kind::Class);
        }
        if upper == CLASS_NAME.to_uppercase() {
            return Scan::error(
                "The className keyword is Case-Sensitive, you're hurting its feelings you monster",
            );
        }

        if is_function_subsequence(&upper) {
            Scan::plain(Kind::Function)
        } else {
            Scan::Token(Kind::Identifier, Value::Str(lexeme))
        }
    }
}

fn single_char_kind(c: char) -> Option<Kind> {
    let kind = match c {
        ';' => Kind::Not,
        '\\' => Kind::Divide,
        '.' => Kind::Dot,
        '(' => Kind::LParen,
        ')' => Kind::RParen,
        '[' => Kind::LBracket,
        ']' => Kind::RBracket,
        '{' => Kind::LBrace,
        '}' => Kind::RBrace,
        ':' => Kind::Colon,
        ',' => Kind::Comma,
        '?' => Kind::Question,
        '^' => Kind::BitXor,
        '%' => Kind::Modulo,
        _ => return None,
    };
    Some(kind)
}

/// `c=` for the compound assignments and the two comparisons spelled that way.
fn assigning_kind(c: char) -> Kind {
    match c {
        '+' => Kind::AddAssign,
        '-' => Kind::SubtractAssign,
        '*' => Kind::MultAssign,
        '%' => Kind::ModAssign,
        '<' => Kind::LEqual,
        '>' => Kind::GEqual,
        ';' => Kind::NotEqual,
        _ => Kind::DivAssign,
    }
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Whether every character of `word` appears, in order, within FUNCTION. Case insensitive.
pub fn is_function_subsequence(word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let mut target = FUNCTION_WORD.chars();
    word.chars()
        .flat_map(char::to_uppercase)
        .all(|c| target.any(|t| t == c))
}

/// Gather every ERROR token as a line-numbered diagnostic.
pub fn collect_errors(tokens: &[Token], path: &Path) -> Vec<LexingError> {
    tokens
        .iter()
        .filter(|token| token.kind == Kind::Error)
        .map(|token| {
            LexingError::new(
                PathBuf::from(path),
                token.message().unwrap_or("Unrecognized input").to_string(),
                token.line,
                token.position,
            )
        })
        .collect()
}
