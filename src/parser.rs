use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;
use crate::error::{Rule, SyntaxError};

// [const] (const|var) (const|var) name [<lifetime>] [: type] [op]= value
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?P<indent>[ \t]*)",
        r"(?:(?P<third>const|var)[ \t]+)?",
        r"(?P<first>const|var)[ \t]+(?P<second>const|var)[ \t]+",
        r"(?P<name>[^ \t+\-*/<>=()\[\]!;:.{}]+)[ \t]*",
        r"(?:<(?P<lifetime>[^>]*)>)?[ \t]*",
        r"(?::[ \t]*(?P<type>[^=]*?)[ \t]*)?",
        r"(?P<operator>[+\-*/]?)=[ \t]*(?P<value>.*?)[ \t]*$",
    ))
    .expect("declaration pattern")
});

// [previous ...] name [op]= value
static REASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?P<indent>[ \t]*)(?P<previous>(?:previous[ \t]+)*)",
        r"(?P<name>[^ \t+\-*/<>=()\[\]!;:.{}'\x22]+)[ \t]*",
        r"(?P<operator>[+\-*/]?)=[ \t]*(?P<value>[^=>].*?)[ \t]*$",
    ))
    .expect("reassignment pattern")
});

static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<indent>[ \t]*)function[ \t]+(?P<name>[^\s(]+)[ \t]*\((?P<params>[^)]*)\)[ \t]*=>[ \t]*(?P<body>.*?)[ \t]*$",
    )
    .expect("function pattern")
});

static RETURN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<indent>[ \t]*)return(?:[ \t]+(?P<value>.*?))?[ \t]*$").expect("return pattern")
});

static BLOCK_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<indent>[ \t]*)\}[ \t]*$").expect("block close pattern"));

#[derive(Debug, Clone, PartialEq)]
pub enum Lifetime {
    /// Dies this many statements later.
    Statements(usize),
    Seconds(u64),
    Infinity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// The body continues on the following lines.
    Block,
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Declaration {
        indent: String,
        reassignable: bool,
        editable: bool,
        /// `const const const`, reserved for later use.
        triple: bool,
        name: String,
        lifetime: Option<Lifetime>,
        operator: Option<char>,
        value: String,
    },
    Reassignment {
        indent: String,
        /// Leading `previous` keywords. Accepted but inert.
        previous: usize,
        name: String,
        operator: Option<char>,
        value: String,
    },
    Function {
        indent: String,
        name: String,
        params: String,
        body: FunctionBody,
    },
    Return {
        indent: String,
        value: Option<String>,
    },
    BlockClose {
        indent: String,
    },
    Unclassified {
        line: String,
    },
}

pub struct Parser {
    file_path: PathBuf,
}

impl Parser {
    pub fn new(file_name: &Path) -> Self {
        Self {
            file_path: file_name.to_path_buf(),
        }
    }

    fn error(&self, rule: Rule, message: impl Into<String>, line: usize) -> SyntaxError {
        SyntaxError::new(self.file_path.clone(), rule, message.into(), line)
    }

    /// Match a statement against the known shapes, in order.
    pub fn classify(&self, text: &str, line: usize) -> Result<Statement, SyntaxError> {
        self.check_indentation(text, line)?;

        if let Some(captures) = DECLARATION.captures(text) {
            let keyword = |group: &str| captures.name(group).map(|m| m.as_str().to_ascii_lowercase());
            let first = keyword("first").unwrap_or_default();
            let second = keyword("second").unwrap_or_default();
            let triple = match keyword("third") {
                Some(third) => {
                    if [third.as_str(), first.as_str(), second.as_str()] != ["const"; 3] {
                        return Err(self.error(
                            Rule::Declaration,
                            "You thought that having const or var three times without having all of them \
                             being const was a good idea? Well it isn't so fix it",
                            line,
                        ));
                    }
                    true
                }
                None => false,
            };

            let lifetime = match captures.name("lifetime") {
                Some(lifetime) => Some(self.parse_lifetime(lifetime.as_str(), line)?),
                None => None,
            };
            let value = captures["value"].to_string();
            if value.is_empty() {
                return Err(self.error(Rule::Declaration, "missing value after `=`", line));
            }

            return Ok(Statement::Declaration {
                indent: captures["indent"].to_string(),
                reassignable: first == "var",
                editable: second == "var",
                triple,
                name: captures["name"].to_string(),
                lifetime,
                operator: captures["operator"].chars().next(),
                value,
            });
        }

        if let Some(captures) = FUNCTION.captures(text) {
            let body = match &captures["body"] {
                "{" => FunctionBody::Block,
                "" => {
                    return Err(self.error(Rule::FunctionDeclaration, "function has no body", line));
                }
                body => FunctionBody::Expression(body.to_string()),
            };
            return Ok(Statement::Function {
                indent: captures["indent"].to_string(),
                name: captures["name"].to_string(),
                params: captures["params"].trim().to_string(),
                body,
            });
        }

        if let Some(captures) = RETURN.captures(text) {
            return Ok(Statement::Return {
                indent: captures["indent"].to_string(),
                value: captures.name("value").map(|m| m.as_str().to_string()),
            });
        }

        if let Some(captures) = REASSIGNMENT.captures(text) {
            return Ok(Statement::Reassignment {
                indent: captures["indent"].to_string(),
                previous: captures["previous"].split_whitespace().count(),
                name: captures["name"].to_string(),
                operator: captures["operator"].chars().next(),
                value: captures["value"].to_string(),
            });
        }

        if let Some(captures) = BLOCK_CLOSE.captures(text) {
            return Ok(Statement::BlockClose {
                indent: captures["indent"].to_string(),
            });
        }

        Ok(Statement::Unclassified {
            line: text.to_string(),
        })
    }

    /// Leading spaces must come in threes. Tabs count as one indent each.
    pub fn check_indentation(&self, text: &str, line: usize) -> Result<usize, SyntaxError> {
        let leading = &text[..text.len() - text.trim_start_matches([' ', '\t']).len()];
        let spaces = leading.chars().filter(|c| *c == ' ').count();
        if spaces % 3 != 0 {
            return Err(self.error(
                Rule::Indentation,
                format!(
                    "indentation of {spaces} spaces is not a multiple of three; use 3 spaces per level"
                ),
                line,
            ));
        }
        Ok(spaces / 3 + leading.chars().filter(|c| *c == '\t').count())
    }

    fn parse_lifetime(&self, raw: &str, line: usize) -> Result<Lifetime, SyntaxError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("infinity") {
            return Ok(Lifetime::Infinity);
        }
        if let Some(seconds) = raw.strip_suffix('s') {
            if let Ok(seconds) = seconds.parse::<u64>() {
                return Ok(Lifetime::Seconds(seconds));
            }
        }
        raw.parse::<usize>().map(Lifetime::Statements).map_err(|_| {
            self.error(
                Rule::Declaration,
                format!("invalid lifetime `<{raw}>`; expected a statement count, seconds like `5s`, or `infinity`"),
                line,
            )
        })
    }
}
