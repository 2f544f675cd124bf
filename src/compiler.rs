use std::path::Path;
use tracing::{debug, warn};
use crate::error::{CompilerError, ExpressionError, Rule, SyntaxError};
use crate::evaluator::{evaluate, get_var, is_decimal, quote_key};
use crate::lexer::{collect_errors, Lexer, GENERIC_CURRENCY};
use crate::parser::{FunctionBody, Lifetime, Parser, Statement};
use crate::scope::{Scope, VarState};
use crate::segmenter::{preprocess, split_statements, Futures, RawStatement, SourceUnit};

/// Re-evaluates every `when` block. Emitted after each statement.
pub const CHECKPOINT: &str = "WHEN_BLOCK_MANAGER.checkConditions();";
pub const UNCLASSIFIED_MARKER: &str = "// unclassified statement";

/// Lifetime argument for declarations without a runtime-side lifetime.
const DEFAULT_LIFETIME: &str = "-1";

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub currency: char,
    /// Fail on statements no shape matches instead of passing them through.
    pub strict: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            currency: GENERIC_CURRENCY,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    pub name: Option<String>,
    pub body: String,
    pub unclassified: usize,
}

/// Translates one source unit. A fresh compiler per unit keeps scope and futures from leaking.
pub struct Compiler<'a> {
    file_path: &'a Path,
    options: &'a CompileOptions,
    parser: Parser,
    scope: Scope,
    futures: Futures,
    unclassified: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(file_path: &'a Path, options: &'a CompileOptions) -> Self {
        Self {
            file_path,
            options,
            parser: Parser::new(file_path),
            scope: Scope::new(),
            futures: Futures::new(),
            unclassified: 0,
        }
    }

    pub fn compile_unit(
        file_path: &Path,
        options: &CompileOptions,
        unit: &SourceUnit,
    ) -> Result<CompiledUnit, CompilerError> {
        let mut compiler = Compiler::new(file_path, options);
        let body = compiler.compile(unit)?;
        Ok(CompiledUnit {
            name: unit.name.clone(),
            body,
            unclassified: compiler.unclassified,
        })
    }

    pub fn compile(&mut self, unit: &SourceUnit) -> Result<String, CompilerError> {
        let mut lexer = Lexer::new(&unit.body, self.file_path)
            .starting_at(unit.first_line)
            .with_currency(self.options.currency);
        let tokens = lexer.tokenize();

        let errors = collect_errors(&tokens, lexer.file_name());
        if !errors.is_empty() {
            return Err(CompilerError::Lexing(errors));
        }

        let preprocessed = preprocess(tokens);
        let statements = split_statements(&preprocessed, self.options.currency);
        let mut lines = Vec::new();

        for (index, statement) in statements.iter().enumerate() {
            for fragment in self.futures.take(index) {
                debug!(index, %fragment, "splicing deferred fragment");
                lines.push(fragment);
            }

            let classified = self.parser.classify(&statement.text, statement.line)?;
            debug!(index, line = statement.line, ?classified, "classified statement");
            lines.push(self.emit(classified, statement, index)?);

            let indent = leading_whitespace(&statement.text);
            if statement.debug {
                let source = serde_json::Value::String(statement.text.trim().to_string());
                lines.push(format!("{indent}console.debug({source});"));
            }
            lines.push(format!("{indent}{CHECKPOINT}"));
        }

        if !self.futures.is_empty() {
            debug!("deferred fragments scheduled past the end of the unit were dropped");
        }

        let mut body = lines.join("\n");
        body.push('\n');
        Ok(body)
    }

    fn emit(&mut self, statement: Statement, raw: &RawStatement, index: usize) -> Result<String, SyntaxError> {
        let line = raw.line;
        let priority = raw.priority;

        match statement {
            Statement::Declaration {
                indent,
                reassignable,
                editable,
                triple,
                name,
                lifetime,
                operator,
                value,
            } => {
                if triple {
                    debug!(%name, "const const const declaration treated as const const");
                }
                let value = self.value(&compound(&name, operator, &value), line)?;
                let lifetime = match lifetime {
                    None => DEFAULT_LIFETIME.to_string(),
                    Some(Lifetime::Statements(count)) => {
                        self.futures
                            .schedule(index + count, format!("{indent}{}.kill();", get_var(&name)));
                        DEFAULT_LIFETIME.to_string()
                    }
                    Some(Lifetime::Seconds(seconds)) => seconds.to_string(),
                    Some(Lifetime::Infinity) => "Infinity".to_string(),
                };

                self.scope.declare(
                    &name,
                    VarState {
                        reassignable,
                        editable,
                        priority,
                    },
                );

                Ok(format!(
                    "{indent}assign({}, {value}, {reassignable}, {priority}, {lifetime});",
                    quote_key(&name)
                ))
            }
            Statement::Reassignment {
                indent,
                previous,
                name,
                operator,
                value,
            } => {
                if previous > 0 {
                    debug!(%name, previous, "writing through `previous` is not supported; assigning the current value");
                }
                match self.scope.latest(&name) {
                    Some(state) if !state.reassignable => {
                        warn!(%name, line, "reassigning a name whose latest declaration is not reassignable");
                    }
                    None => debug!(%name, line, "reassigning a name not declared in this unit"),
                    _ => {}
                }

                let value = self.value(&compound(&name, operator, &value), line)?;
                Ok(format!(
                    "{indent}assign({}, {value}, undefined, {priority}, {DEFAULT_LIFETIME});",
                    quote_key(&name)
                ))
            }
            Statement::Function {
                indent,
                name,
                params,
                body,
            } => match body {
                FunctionBody::Block => Ok(format!("{indent}function {name}({params}) {{")),
                FunctionBody::Expression(body) => {
                    let body = self.value(&body, line)?;
                    Ok(format!("{indent}function {name}({params}) {{ return {body}; }}"))
                }
            },
            Statement::Return { indent, value } => match value {
                Some(value) => Ok(format!("{indent}return {};", self.value(&value, line)?)),
                None => Ok(format!("{indent}return;")),
            },
            Statement::BlockClose { indent } => Ok(format!("{indent}}}")),
            Statement::Unclassified { line: text } => {
                if self.options.strict {
                    return Err(SyntaxError::new(
                        self.file_path.to_path_buf(),
                        Rule::Statement,
                        format!("no statement shape matches `{}`", text.trim()),
                        line,
                    ));
                }
                warn!(line, statement = %text.trim(), "passing unclassified statement through");
                self.unclassified += 1;
                Ok(format!("{text} {UNCLASSIFIED_MARKER}"))
            }
        }
    }

    /// Plain numbers are emitted as written; everything else goes through the evaluator.
    fn value(&self, raw: &str, line: usize) -> Result<String, SyntaxError> {
        let raw = raw.trim();
        if is_decimal(raw) {
            return Ok(raw.to_string());
        }
        evaluate(&format!("{{{raw}}}")).map_err(|error| self.expression_error(error, line))
    }

    fn expression_error(&self, error: ExpressionError, line: usize) -> SyntaxError {
        SyntaxError::new(self.file_path.to_path_buf(), Rule::Expression, error.to_string(), line)
    }
}

fn compound(name: &str, operator: Option<char>, value: &str) -> String {
    match operator {
        Some(operator) => format!("{name} {operator} {value}"),
        None => value.to_string(),
    }
}

fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start_matches([' ', '\t']).len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<String, CompilerError> {
        let options = CompileOptions::default();
        let unit = SourceUnit {
            name: None,
            body: source.to_string(),
            first_line: 1,
        };
        Compiler::compile_unit(Path::new("test.db"), &options, &unit).map(|unit| unit.body)
    }

    fn code_lines(source: &str) -> Vec<String> {
        compile(source)
            .unwrap()
            .lines()
            .filter(|line| !line.trim().is_empty() && line.trim() != CHECKPOINT)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn var_var_declaration() {
        assert_eq!(
            compile("var var x = 5!\n").unwrap(),
            format!("assign(\"x\", 5, true, 1, -1);\n{CHECKPOINT}\n")
        );
    }

    #[test]
    fn const_const_declaration() {
        assert_eq!(code_lines("const const x = 5"), vec!["assign(\"x\", 5, false, 0, -1);"]);
    }

    #[test]
    fn numeric_names_stay_unquoted() {
        assert_eq!(code_lines("const const 5 = 4"), vec!["assign(5, 4, false, 0, -1);"]);
    }

    #[test]
    fn statement_lifetime_schedules_a_kill() {
        let source = "var const x<2> = 1\na = 1\nb = 2\nc = 3\n";
        assert_eq!(
            code_lines(source),
            vec![
                "assign(\"x\", 1, true, 0, -1);",
                "assign(\"a\", 1, undefined, 0, -1);",
                "current_scope.get_var(\"x\").kill();",
                "assign(\"b\", 2, undefined, 0, -1);",
                "assign(\"c\", 3, undefined, 0, -1);",
            ]
        );
    }

    #[test]
    fn kills_past_the_end_are_dropped() {
        assert_eq!(code_lines("var const x<5> = 1"), vec!["assign(\"x\", 1, true, 0, -1);"]);
    }

    #[test]
    fn seconds_and_infinite_lifetimes_go_to_the_runtime() {
        assert_eq!(
            code_lines("const const x<10s> = 1\nconst const y<infinity> = 2"),
            vec![
                "assign(\"x\", 1, false, 0, 10);",
                "assign(\"y\", 2, false, 0, Infinity);",
            ]
        );
    }

    #[test]
    fn values_go_through_the_evaluator() {
        assert_eq!(
            code_lines("var var x = y + 1"),
            vec!["assign(\"x\", current_scope.resolve(\"y\", \"+\", 1), true, 0, -1);"]
        );
        assert_eq!(
            code_lines("x += 2!!"),
            vec!["assign(\"x\", current_scope.resolve(\"x\", \"+\", 2), undefined, 2, -1);"]
        );
    }

    #[test]
    fn previous_reads_inside_values() {
        assert_eq!(
            code_lines("var var y = previous x"),
            vec!["assign(\"y\", current_scope.get_var(\"x\").previous(), true, 0, -1);"]
        );
    }

    #[test]
    fn every_statement_gets_a_checkpoint() {
        let body = compile("var var x = 1!\nx = 2!\nprint(x)!\n").unwrap();
        assert_eq!(body.matches(CHECKPOINT).count(), 3);
        assert!(body.trim_end().ends_with(CHECKPOINT));
    }

    #[test]
    fn debug_statements_echo_their_source() {
        let lines = code_lines("var var x = 1?");
        assert_eq!(lines[1], "console.debug(\"var var x = 1\");");
    }

    #[test]
    fn functions_in_every_spelling() {
        let expected = "function add(a, b) { return current_scope.resolve(\"a\", \"+\", \"b\"); }";
        assert_eq!(code_lines("fn add(a, b) => a + b"), vec![expected]);
        assert_eq!(code_lines("add = (a, b) => a + b"), vec![expected]);
        assert_eq!(code_lines("add(a, b) => a + b"), vec![expected]);
    }

    #[test]
    fn block_functions() {
        assert_eq!(
            code_lines("func main() => {\n   return 1\n}"),
            vec!["function main() {", "   return 1;", "}"]
        );
        assert_eq!(
            code_lines("fn id(a) => { return a }"),
            vec!["function id(a) {", "return current_scope.get_var(\"a\");", "}"]
        );
    }

    #[test]
    fn unclassified_lines_are_flagged() {
        assert_eq!(code_lines("print(x)"), vec![format!("print(x) {UNCLASSIFIED_MARKER}")]);

        let options = CompileOptions {
            strict: true,
            ..CompileOptions::default()
        };
        let unit = SourceUnit {
            name: None,
            body: "print(x)".to_string(),
            first_line: 1,
        };
        match Compiler::compile_unit(Path::new("t"), &options, &unit) {
            Err(CompilerError::Syntax(error)) => assert_eq!(error.rule(), Rule::Statement),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_indentation_halts_the_unit() {
        match compile("var var x = 1\n    x = 2\n") {
            Err(CompilerError::Syntax(error)) => {
                assert_eq!(error.rule(), Rule::Indentation);
                assert_eq!(error.line(), 2);
                assert!(error.message().contains("not a multiple of three"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_expressions_name_their_rule() {
        match compile("var var x = * 2") {
            Err(CompilerError::Syntax(error)) => assert_eq!(error.rule(), Rule::Expression),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lexical_errors_stop_before_code_generation() {
        match compile("var var x = 1\nvar var y = 5.q\nz ===== w") {
            Err(CompilerError::Lexing(errors)) => {
                assert_eq!(errors.iter().map(|e| e.line()).collect::<Vec<_>>(), vec![2, 3]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn indentation_is_kept() {
        assert_eq!(
            compile("   x = 1").unwrap(),
            format!("   assign(\"x\", 1, undefined, 0, -1);\n   {CHECKPOINT}\n")
        );
    }
}
