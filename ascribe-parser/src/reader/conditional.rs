use crate::{attributes::AttributeStore, error::Error, pattern::tail};

/// A parsed preprocessor conditional line.
#[derive(Debug, PartialEq)]
pub(crate) enum Directive {
    /// `ifdef::a[]`, `ifndef::a,b[]`, `ifdef::a+b[single line]`
    Test {
        negate: bool,
        target: String,
        names: Vec<String>,
        operation: Operation,
        content: Option<String>,
    },
    /// `ifeval::[lhs op rhs]`
    Eval(Ifeval),
    /// `endif::[]` or `endif::target[]`
    Endif { target: Option<String> },
}

/// How multiple attribute names in one test combine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Operation {
    /// `a,b`: any of them is set
    Any,
    /// `a+b`: all of them are set
    All,
}

#[derive(Debug, PartialEq)]
pub(crate) struct Ifeval {
    left: String,
    operator: Operator,
    right: String,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum EvalValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

peg::parser! {
    grammar directive_parser() for str {
        pub(crate) rule directive() -> Directive
            = endif() / ifeval() / test()

        rule endif() -> Directive
            = "endif::" target:$((!['['] [_])*) "[]" ![_] {
                Directive::Endif {
                    target: (!target.is_empty()).then(|| target.to_string()),
                }
            }

        rule ifeval() -> Directive
            = "ifeval::[" left:eval_value() operator:operator() right:eval_value() "]" ![_] {
                Directive::Eval(Ifeval {
                    left: left.trim().to_string(),
                    operator,
                    right: right.trim().to_string(),
                })
            }

        rule test() -> Directive
            = negate:negate() "::" target:$((!['[' | ' ' | '\t'] [_])+) "[" content:$((!("]" ![_]) [_])*) "]" ![_] {
                let (names, operation) = split_target(target);
                Directive::Test {
                    negate,
                    target: target.to_string(),
                    names,
                    operation,
                    content: (!content.is_empty()).then(|| content.to_string()),
                }
            }

        rule negate() -> bool
            = "ifdef" { false }
        / "ifndef" { true }

        rule eval_value() -> &'input str
            = $((!operator() !("]" ![_]) [_])+)

        rule operator() -> Operator
            = "==" { Operator::Equal }
        / "!=" { Operator::NotEqual }
        / "<=" { Operator::LessThanOrEqual }
        / ">=" { Operator::GreaterThanOrEqual }
        / "<" { Operator::LessThan }
        / ">" { Operator::GreaterThan }
    }
}

fn split_target(target: &str) -> (Vec<String>, Operation) {
    let separator = target.find([',', '+']).and_then(|at| tail(target, at).chars().next());
    match separator {
        Some(',') => (
            target.split(',').map(str::to_string).collect(),
            Operation::Any,
        ),
        Some(_) => (
            target.split('+').map(str::to_string).collect(),
            Operation::All,
        ),
        None => (vec![target.to_string()], Operation::All),
    }
}

/// Whether `line` looks like a conditional directive, escaped or not.
pub(crate) fn is_directive(line: &str) -> bool {
    let line = line.strip_prefix('\\').unwrap_or(line);
    line.ends_with(']')
        && ["ifdef::", "ifndef::", "ifeval::", "endif::"]
            .iter()
            .any(|prefix| line.starts_with(prefix))
}

#[tracing::instrument(level = "trace")]
pub(crate) fn parse_line(line: &str) -> Result<Directive, Error> {
    directive_parser::directive(line).map_err(|error| {
        tracing::trace!(?error, "failed to parse conditional directive");
        Error::InvalidConditionalDirective(line.to_string())
    })
}

impl Directive {
    /// Evaluate an `ifdef`/`ifndef`/`ifeval` against the current attributes.
    ///
    /// # Errors
    ///
    /// Fails when an `ifeval` compares values of different types.
    pub(crate) fn evaluate(&self, attributes: &mut AttributeStore) -> Result<bool, Error> {
        match self {
            Self::Test {
                negate,
                names,
                operation,
                ..
            } => {
                let result = match operation {
                    Operation::Any => names.iter().any(|name| attributes.contains(name)),
                    Operation::All => names.iter().all(|name| attributes.contains(name)),
                };
                Ok(result != *negate)
            }
            Self::Eval(ifeval) => ifeval.evaluate(attributes),
            Self::Endif { .. } => Ok(true),
        }
    }
}

impl Ifeval {
    #[tracing::instrument(level = "trace", skip(attributes))]
    fn evaluate(&self, attributes: &mut AttributeStore) -> Result<bool, Error> {
        let left = EvalValue::convert(&self.left, attributes);
        let right = EvalValue::convert(&self.right, attributes);

        match (&left, &right) {
            (EvalValue::Number(_), EvalValue::Number(_))
            | (EvalValue::Boolean(_), EvalValue::Boolean(_))
            | (EvalValue::String(_), EvalValue::String(_)) => {}
            _ => {
                return Err(Error::InvalidIfEvalDirectiveMismatchedTypes(
                    left.type_name().to_string(),
                    right.type_name().to_string(),
                ));
            }
        }

        Ok(match self.operator {
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::LessThan => left < right,
            Operator::GreaterThan => left > right,
            Operator::LessThanOrEqual => left <= right,
            Operator::GreaterThanOrEqual => left >= right,
        })
    }
}

impl EvalValue {
    /// Interpolate attributes, then read the operand as a boolean, a number, an
    /// arithmetic expression, or (failing all of those) a string with its quotes removed.
    fn convert(raw: &str, attributes: &mut AttributeStore) -> Self {
        let value = attributes.resolve(raw);
        let value = value.trim();
        if let Some(unquoted) = strip_quotes(value) {
            return Self::String(unquoted.to_string());
        }
        value
            .parse::<bool>()
            .map(Self::Boolean)
            .or_else(|_| value.parse::<f64>().map(Self::Number))
            .or_else(|_| evalexpr::eval_float(value).map(Self::Number))
            .or_else(|_| {
                #[allow(clippy::cast_precision_loss)]
                evalexpr::eval_int(value)
                    .map(|v| v as f64)
                    .map(Self::Number)
            })
            .unwrap_or_else(|_| Self::String(value.to_string()))
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
        }
    }
}

fn strip_quotes(value: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|quote| {
        value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}
