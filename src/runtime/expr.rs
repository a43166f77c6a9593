/// Side-effect-free expression language for conditions and arithmetic
///
/// Router conditions, filter conditions and the calculator tool all go through
/// this grammar instead of a general-purpose evaluator. An expression sees at
/// most one bound variable (`input` for routers, `item` for filters).
///
/// ```text
/// or      := and (("or" | "||") and)*
/// and     := not (("and" | "&&") not)*
/// not     := ("not" | "!") not | compare
/// compare := sum ((== | != | < | <= | > | >= | in | not in) sum)*
/// sum     := product ((+ | -) product)*
/// product := unary ((* | / | // | %) unary)*
/// unary   := (- | +) unary | power
/// power   := postfix (** unary)?
/// postfix := primary ("." ident | "[" or "]")*
/// primary := number | string | true | false | null | ident | ident "(" args ")"
///          | "(" or ")" | "[" args "]"
/// ```

use crate::runtime::template::display_value;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors raised while lexing, parsing or evaluating an expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Unexpected token '{found}', expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Type mismatch during '{operation}': unsupported operand(s) {operands}")]
    TypeMismatch { operation: String, operands: String },

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Expression nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("Result is not a finite number")]
    NonFinite,
}

type Result<T> = std::result::Result<T, ExprError>;

/// Deepest expression tree the parser will build
///
/// Bounds parser, evaluator and drop recursion alike.
pub const MAX_DEPTH: usize = 100;

/// The single variable visible to an expression
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    binding: Option<(&'a str, &'a Value)>,
}

impl<'a> Scope<'a> {
    /// No variables at all (calculator)
    pub fn empty() -> Self {
        Self { binding: None }
    }

    pub fn with(name: &'a str, value: &'a Value) -> Self {
        Self {
            binding: Some((name, value)),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        match self.binding {
            Some((bound, value)) if bound == name => Ok(value.clone()),
            _ => Err(ExprError::UnknownVariable(name.to_string())),
        }
    }
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Variable(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Chained comparison: `a < b < c` means `a < b and b < c`
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
}

/// Builtin functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Len,
    Lower,
    Upper,
    Str,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "len" => Some(Function::Len),
            "lower" => Some(Function::Lower),
            "upper" => Some(Function::Upper),
            "str" => Some(Function::Str),
            _ => None,
        }
    }
}

/// Parse an expression
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExprError::UnexpectedToken {
            found: token.to_string(),
            expected: "end of expression".to_string(),
        }),
    }
}

/// Parse and evaluate, reducing the result to a boolean
pub fn evaluate_condition(source: &str, scope: Scope<'_>) -> Result<bool> {
    let value = parse(source)?.evaluate(scope)?;
    Ok(is_truthy(&value))
}

/// Truthiness: null, false, zero and empty containers are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Lexer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Symbol(&'static str),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Ident(name) => f.write_str(name),
            Token::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

const SYMBOLS: [&str; 24] = [
    "**", "//", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "!", "(",
    ")", "[", "]", ",", ".", "=", "&",
];

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];

        if ch.is_whitespace() {
            pos += 1;
        } else if ch.is_ascii_digit()
            || (ch == '.' && chars.get(pos + 1).is_some_and(char::is_ascii_digit))
        {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let mut is_float = false;
            if pos < chars.len() && chars[pos] == '.' {
                is_float = true;
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let literal: String = chars[start..pos].iter().collect();
            let token = if is_float {
                literal.parse::<f64>().map(Token::Float)
                    .map_err(|_| ExprError::InvalidNumber(literal.clone()))?
            } else {
                match literal.parse::<i64>() {
                    Ok(n) => Token::Int(n),
                    // too wide for an integer
                    Err(_) => literal.parse::<f64>().map(Token::Float)
                        .map_err(|_| ExprError::InvalidNumber(literal.clone()))?,
                }
            };
            tokens.push(token);
        } else if ch == '"' || ch == '\'' {
            let start = pos;
            let quote = ch;
            let mut text = String::new();
            pos += 1;
            loop {
                let Some(&current) = chars.get(pos) else {
                    return Err(ExprError::UnterminatedString(start));
                };
                pos += 1;
                match current {
                    c if c == quote => break,
                    '\\' => {
                        let Some(&escaped) = chars.get(pos) else {
                            return Err(ExprError::UnterminatedString(start));
                        };
                        pos += 1;
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                    c => text.push(c),
                }
            }
            tokens.push(Token::Str(text));
        } else if ch.is_alphabetic() || ch == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
        } else {
            let symbol = SYMBOLS.iter().find(|symbol| {
                symbol
                    .chars()
                    .enumerate()
                    .all(|(offset, expected)| chars.get(pos + offset) == Some(&expected))
            });
            match symbol {
                // Lone `=` and `&` only exist so the error names the right operator
                Some(&"=") | Some(&"&") | None => {
                    return Err(ExprError::UnexpectedChar { ch, pos });
                }
                Some(&symbol) => {
                    pos += symbol.len();
                    tokens.push(Token::Symbol(symbol));
                }
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Depth of the subtree under construction
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Result<Token> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn expect_symbol(&mut self, symbol: &'static str) -> Result<()> {
        match self.next()? {
            Token::Symbol(s) if s == symbol => Ok(()),
            other => Err(ExprError::UnexpectedToken {
                found: other.to_string(),
                expected: format!("'{}'", symbol),
            }),
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let depth = self.depth;
        self.descend()?;
        let mut left = self.parse_and()?;
        while self.is_keyword("or") || self.is_symbol("||") {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.parse_not()?;
        while self.is_keyword("and") || self.is_symbol("&&") {
            self.pos += 1;
            self.descend()?;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.is_keyword("not") || self.is_symbol("!") {
            self.pos += 1;
            let depth = self.depth;
            self.descend()?;
            let operand = self.parse_not()?;
            self.depth = depth;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_compare()
    }

    fn compare_op(&self) -> Option<(CompareOp, usize)> {
        let op = match self.peek()? {
            Token::Symbol("==") => CompareOp::Eq,
            Token::Symbol("!=") => CompareOp::NotEq,
            Token::Symbol("<") => CompareOp::Lt,
            Token::Symbol("<=") => CompareOp::LtEq,
            Token::Symbol(">") => CompareOp::Gt,
            Token::Symbol(">=") => CompareOp::GtEq,
            Token::Ident(name) if name == "in" => CompareOp::In,
            Token::Ident(name) if name == "not" => {
                return match self.peek_at(1) {
                    Some(Token::Ident(next)) if next == "in" => Some((CompareOp::NotIn, 2)),
                    _ => None,
                };
            }
            _ => return None,
        };
        Some((op, 1))
    }

    fn parse_compare(&mut self) -> Result<Expr> {
        let left = self.parse_sum()?;
        let mut chain = Vec::new();
        while let Some((op, width)) = self.compare_op() {
            self.pos += width;
            chain.push((op, self.parse_sum()?));
        }
        if chain.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), chain))
        }
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("+")) => BinaryOp::Add,
                Some(Token::Symbol("-")) => BinaryOp::Sub,
                _ => {
                    self.depth = depth;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_product()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_product(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("*")) => BinaryOp::Mul,
                Some(Token::Symbol("/")) => BinaryOp::Div,
                Some(Token::Symbol("//")) => BinaryOp::FloorDiv,
                Some(Token::Symbol("%")) => BinaryOp::Mod,
                _ => {
                    self.depth = depth;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Symbol("-")) => UnaryOp::Neg,
            Some(Token::Symbol("+")) => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        let depth = self.depth;
        self.descend()?;
        let operand = self.parse_unary()?;
        self.depth = depth;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.is_symbol("**") {
            self.pos += 1;
            let depth = self.depth;
            self.descend()?;
            let exponent = self.parse_unary()?;
            self.depth = depth;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_symbol(".") || self.is_symbol("[") {
                self.descend()?;
            }
            if self.is_symbol(".") {
                self.pos += 1;
                match self.next()? {
                    Token::Ident(name) => expr = Expr::Field(Box::new(expr), name),
                    other => {
                        return Err(ExprError::UnexpectedToken {
                            found: other.to_string(),
                            expected: "field name".to_string(),
                        })
                    }
                }
            } else if self.is_symbol("[") {
                self.pos += 1;
                let index = self.parse_or()?;
                self.expect_symbol("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    fn parse_arguments(&mut self, close: &'static str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.is_symbol(close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if self.is_symbol(",") {
                self.pos += 1;
                if self.is_symbol(close) {
                    self.pos += 1;
                    return Ok(items);
                }
            } else {
                self.expect_symbol(close)?;
                return Ok(items);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next()? {
            Token::Int(n) => Ok(Expr::Literal(Value::from(n))),
            Token::Float(n) => Ok(Expr::Literal(float_value(n)?)),
            Token::Str(text) => Ok(Expr::Literal(Value::String(text))),
            Token::Symbol("(") => {
                let inner = self.parse_or()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            Token::Symbol("[") => Ok(Expr::List(self.parse_arguments("]")?)),
            Token::Ident(name) => match name.as_str() {
                "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "None" => Ok(Expr::Literal(Value::Null)),
                _ if self.is_symbol("(") => {
                    self.pos += 1;
                    let function =
                        Function::from_name(&name).ok_or(ExprError::UnknownFunction(name))?;
                    Ok(Expr::Call(function, self.parse_arguments(")")?))
                }
                _ => Ok(Expr::Variable(name)),
            },
            other => Err(ExprError::UnexpectedToken {
                found: other.to_string(),
                expected: "a value".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => match number.as_i64() {
                Some(n) => Some(Num::Int(n)),
                None => number.as_f64().map(Num::Float),
            },
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(n) => n,
        }
    }
}

fn float_value(n: f64) -> Result<Value> {
    Number::from_f64(n).map(Value::Number).ok_or(ExprError::NonFinite)
}

/// Exact integer result, or its float approximation once it leaves i64
fn int_or_float(exact: Option<i64>, approximate: impl FnOnce() -> f64) -> Result<Value> {
    match exact {
        Some(n) => Ok(Value::from(n)),
        None => float_value(approximate()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn mismatch(operation: &str, operands: &[&Value]) -> ExprError {
    ExprError::TypeMismatch {
        operation: operation.to_string(),
        operands: operands
            .iter()
            .map(|value| type_name(value))
            .collect::<Vec<_>>()
            .join(" and "),
    }
}

impl Expr {
    /// Evaluate against `scope`
    pub fn evaluate(&self, scope: Scope<'_>) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => items
                .iter()
                .map(|item| item.evaluate(scope))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expr::Variable(name) => scope.lookup(name),
            Expr::Field(target, name) => match target.evaluate(scope)? {
                Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
                other => Err(mismatch(&format!(".{}", name), &[&other])),
            },
            Expr::Index(target, index) => {
                let target = target.evaluate(scope)?;
                let index = index.evaluate(scope)?;
                index_value(&target, &index)
            }
            Expr::Call(function, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<Result<Vec<_>>>()?;
                call(*function, &args)
            }
            Expr::Unary(op, operand) => {
                let value = operand.evaluate(scope)?;
                match (op, Num::of(&value)) {
                    (UnaryOp::Not, _) => Ok(Value::Bool(!is_truthy(&value))),
                    (UnaryOp::Pos, Some(_)) => Ok(value),
                    (UnaryOp::Neg, Some(Num::Int(n))) => int_or_float(n.checked_neg(), || -(n as f64)),
                    (UnaryOp::Neg, Some(Num::Float(n))) => float_value(-n),
                    (UnaryOp::Neg, None) => Err(mismatch("-", &[&value])),
                    (UnaryOp::Pos, None) => Err(mismatch("+", &[&value])),
                }
            }
            Expr::Binary(op, left, right) => {
                let left = left.evaluate(scope)?;
                let right = right.evaluate(scope)?;
                arithmetic(*op, &left, &right)
            }
            Expr::Compare(first, chain) => {
                let mut left = first.evaluate(scope)?;
                for (op, operand) in chain {
                    let right = operand.evaluate(scope)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = left.evaluate(scope)?;
                if is_truthy(&left) {
                    right.evaluate(scope)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = left.evaluate(scope)?;
                if is_truthy(&left) {
                    Ok(left)
                } else {
                    right.evaluate(scope)
                }
            }
        }
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value> {
    match (target, index) {
        (Value::Object(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        (Value::Array(items), _) => {
            let position = resolve_position(index, items.len())?;
            Ok(items[position].clone())
        }
        (Value::String(text), _) => {
            let chars: Vec<char> = text.chars().collect();
            let position = resolve_position(index, chars.len())?;
            Ok(Value::String(chars[position].to_string()))
        }
        _ => Err(mismatch("[]", &[target, index])),
    }
}

/// Python-style index resolution, negative counts from the end
fn resolve_position(index: &Value, len: usize) -> Result<usize> {
    let Some(Num::Int(raw)) = Num::of(index) else {
        return Err(mismatch("[]", &[index]));
    };
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if raw < 0 { raw + signed_len } else { raw };
    if (0..signed_len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(ExprError::IndexOutOfRange { index: raw, len })
    }
}

fn call(function: Function, args: &[Value]) -> Result<Value> {
    let (name, expected) = match function {
        Function::Len => ("len", 1),
        Function::Lower => ("lower", 1),
        Function::Upper => ("upper", 1),
        Function::Str => ("str", 1),
    };
    if args.len() != expected {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        });
    }

    let arg = &args[0];
    match (function, arg) {
        (Function::Len, Value::String(text)) => Ok(Value::from(text.chars().count())),
        (Function::Len, Value::Array(items)) => Ok(Value::from(items.len())),
        (Function::Len, Value::Object(map)) => Ok(Value::from(map.len())),
        (Function::Lower, Value::String(text)) => Ok(Value::String(text.to_lowercase())),
        (Function::Upper, Value::String(text)) => Ok(Value::String(text.to_uppercase())),
        (Function::Str, value) => Ok(Value::String(display_value(value))),
        _ => Err(mismatch(name, &[arg])),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let (l, r) = match (Num::of(left), Num::of(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return match (op, left, right) {
                (BinaryOp::Add, Value::String(a), Value::String(b)) => {
                    Ok(Value::String(format!("{}{}", a, b)))
                }
                (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
                    Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
                }
                _ => Err(mismatch(op.symbol(), &[left, right])),
            };
        }
    };
    match (op, l, r) {
        (BinaryOp::Add, Num::Int(a), Num::Int(b)) => int_or_float(a.checked_add(b), || a as f64 + b as f64),
        (BinaryOp::Sub, Num::Int(a), Num::Int(b)) => int_or_float(a.checked_sub(b), || a as f64 - b as f64),
        (BinaryOp::Mul, Num::Int(a), Num::Int(b)) => int_or_float(a.checked_mul(b), || a as f64 * b as f64),
        (BinaryOp::Add, a, b) => float_value(a.as_f64() + b.as_f64()),
        (BinaryOp::Sub, a, b) => float_value(a.as_f64() - b.as_f64()),
        (BinaryOp::Mul, a, b) => float_value(a.as_f64() * b.as_f64()),
        (BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod, _, b) if b.as_f64() == 0.0 => {
            Err(ExprError::DivisionByZero)
        }
        (BinaryOp::Div, a, b) => float_value(a.as_f64() / b.as_f64()),
        (BinaryOp::FloorDiv, Num::Int(a), Num::Int(b)) => match a.checked_div(b) {
            Some(quotient) => {
                let adjust = if a % b != 0 && ((a < 0) != (b < 0)) { 1 } else { 0 };
                Ok(Value::from(quotient - adjust))
            }
            None => float_value((a as f64 / b as f64).floor()),
        },
        (BinaryOp::FloorDiv, a, b) => float_value((a.as_f64() / b.as_f64()).floor()),
        (BinaryOp::Mod, Num::Int(a), Num::Int(b)) => {
            // i64::MIN % -1 is the only overflowing case
            let remainder = a.checked_rem(b).unwrap_or(0);
            let adjusted = if remainder != 0 && ((remainder < 0) != (b < 0)) {
                remainder + b
            } else {
                remainder
            };
            Ok(Value::from(adjusted))
        }
        (BinaryOp::Mod, a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            float_value(a - b * (a / b).floor())
        }
        (BinaryOp::Pow, Num::Int(a), Num::Int(b)) if b >= 0 => {
            let exact = u32::try_from(b).ok().and_then(|exponent| a.checked_pow(exponent));
            int_or_float(exact, || (a as f64).powf(b as f64))
        }
        (BinaryOp::Pow, a, b) => float_value(a.as_f64().powf(b.as_f64())),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (Num::of(left), Num::of(right)) {
        (Some(l), Some(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    let ordering = |symbol: &str| -> Result<Ordering> {
        match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => match (Num::of(left), Num::of(right)) {
                (Some(l), Some(r)) => l
                    .as_f64()
                    .partial_cmp(&r.as_f64())
                    .ok_or_else(|| mismatch(symbol, &[left, right])),
                _ => Err(mismatch(symbol, &[left, right])),
            },
        }
    };

    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::NotEq => Ok(!values_equal(left, right)),
        CompareOp::Lt => Ok(ordering("<")? == Ordering::Less),
        CompareOp::LtEq => Ok(ordering("<=")? != Ordering::Greater),
        CompareOp::Gt => Ok(ordering(">")? == Ordering::Greater),
        CompareOp::GtEq => Ok(ordering(">=")? != Ordering::Less),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
    }
}

fn contains(container: &Value, needle: &Value) -> Result<bool> {
    match (container, needle) {
        (Value::String(haystack), Value::String(part)) => Ok(haystack.contains(part.as_str())),
        (Value::Array(items), _) => Ok(items.iter().any(|item| values_equal(item, needle))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(mismatch("in", &[needle, container])),
    }
}
