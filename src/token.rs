use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub(crate) line: usize,
    pub(crate) position: usize,
    pub(crate) kind: Kind,
    /// Exact source text the token was scanned from.
    pub(crate) lexeme: String,
    pub(crate) value: Value,
}

/// Decoded payload carried next to the raw lexeme.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    None,
    Int(i64),
    Real(f64),
    Str(String),
    /// Diagnostic attached to `Kind::Error`.
    Message(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Kind {
    // Literals
    String,
    Int,
    Real,
    Identifier,

    // Structural
    LParen,      // (
    RParen,      // )
    LBracket,    // [
    RBracket,    // ]
    LBrace,      // {
    RBrace,      // }
    Dot,         // .
    Colon,       // :
    Comma,       // ,

    // Operators
    Plus,
    Minus,
    Multiply,
    Exponent,    // **
    Divide,      // / and \
    Modulo,
    Not,         // ;
    NotEqual,    // ;=
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,       // <<
    ShiftRight,      // >>
    ShiftRightZero,  // >>>
    LThan,
    GThan,
    LEqual,
    GEqual,
    Equal,
    LooseEquality,
    PreciseEquality,
    LiteralEquality,
    Inc,
    Dec,
    And,
    Or,
    Arrow,
    AddAssign,
    SubtractAssign,
    MultAssign,
    DivAssign,   // /= and \=
    ModAssign,
    ExpAssign,   // **=

    // Terminators
    Bang,        // one or more !
    Question,    // ?

    Currency,

    // Whitespace
    Space,
    Indent,
    Newline,

    // Keywords
    If,
    Else,
    True,
    False,
    Const,
    Var,
    Infinity,
    Function,
    Previous,
    Next,
    Await,
    Export,
    To,
    Class,
    New,
    Use,
    Delete,
    When,
    Return,
    Import,

    Eof,
    Error,
}

impl Kind {
    /// Keyword spellings, matched against the upper-cased lexeme.
    pub fn keyword(upper: &str) -> Option<Kind> {
        let kind = match upper {
            "IF" => Kind::If,
            "ELSE" => Kind::Else,
            "TRUE" => Kind::True,
            "FALSE" => Kind::False,
            "CONST" => Kind::Const,
            "VAR" => Kind::Var,
            "INFINITY" => Kind::Infinity,
            "FUNCTION" => Kind::Function,
            "PREVIOUS" => Kind::Previous,
            "NEXT" => Kind::Next,
            "AWAIT" => Kind::Await,
            "EXPORT" => Kind::Export,
            "TO" => Kind::To,
            "CLASS" => Kind::Class,
            "NEW" => Kind::New,
            "USE" => Kind::Use,
            "DELETE" => Kind::Delete,
            "WHEN" => Kind::When,
            "RETURN" => Kind::Return,
            "IMPORT" => Kind::Import,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_whitespace(self) -> bool {
        matches!(self, Kind::Space | Kind::Indent)
    }

    pub fn is_terminator(self) -> bool {
        matches!(self, Kind::Bang | Kind::Question | Kind::Newline)
    }
}

impl Token {
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn message(&self) -> Option<&str> {
        match &self.value {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            Value::None => write!(f, "{:?}({:?})", self.kind, self.lexeme),
            Value::Int(n) => write!(f, "{:?}({})", self.kind, n),
            Value::Real(n) => write!(f, "{:?}({})", self.kind, n),
            Value::Str(s) => write!(f, "{:?}({:?})", self.kind, s),
            Value::Message(m) => write!(f, "{:?}({})", self.kind, m),
        }
    }
}
