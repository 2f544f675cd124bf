use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
    #[error("FileNotFoundError: {0}")]
    FileNotFound(String),
    #[error("{}", render_all(.0))]
    Lexing(Vec<LexingError>),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("TemplateError: {0}")]
    Template(String),
    #[error("UnitNameError: `{0}` must be a plain file name")]
    UnitName(String),
    #[error("ConfigError: {0}")]
    Config(#[from] serde_json::Error),
}

fn render_all(errors: &[LexingError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("")
}

#[derive(Debug, Error)]
pub struct LexingError {
    pub(crate) path: PathBuf,
    pub(crate) message: String,
    pub(crate) line: usize,
    pub(crate) position: usize,
}

impl LexingError {
    pub fn new(path: PathBuf, message: String, line: usize, position: usize) -> Self {
        Self {
            path,
            message,
            line,
            position,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LexingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "-Tokenizer: ParseError on Line {}: {}\n  --> {}:{}:{}",
            self.line,
            self.message,
            self.path.display(),
            self.line,
            self.position,
        )
    }
}

/// Grammar rule a structural error was raised from. The display names are user facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Indentation,
    Declaration,
    FunctionDeclaration,
    Expression,
    Statement,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Rule::Indentation => "indentation",
            Rule::Declaration => "declaration",
            Rule::FunctionDeclaration => "function declaration",
            Rule::Expression => "expression",
            Rule::Statement => "statement",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub struct SyntaxError {
    pub(crate) path: PathBuf,
    pub(crate) rule: Rule,
    pub(crate) message: String,
    pub(crate) line: usize,
}

impl SyntaxError {
    pub fn new(path: PathBuf, rule: Rule, message: String, line: usize) -> Self {
        Self {
            path,
            rule,
            message,
            line,
        }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "SyntaxError in {}: {}\n  --> {}:{}",
            self.rule,
            self.message,
            self.path.display(),
            self.line,
        )
    }
}

/// Failures of the expression evaluator, before a line number is attached.
#[derive(Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("malformed expression at offset {offset}: {reason}")]
    Malformed { reason: String, offset: usize },
    #[error("unbalanced brackets")]
    UnbalancedBrackets,
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("empty expression")]
    Empty,
}
