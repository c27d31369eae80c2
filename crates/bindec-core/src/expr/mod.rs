//! Read-only expression language for dynamic counts, lengths and triggers.
//!
//! Expressions are parsed once, when a field definition is derived, and
//! evaluated against a [`Namespace`] every time the field is decoded. The
//! only names an expression can see are unsigned values published by earlier
//! fields and, while a union selects its variant, the prefetch buffer `RAW`.
//!
//! ```
//! use bindec_core::{Expr, Namespace};
//!
//! let expr = Expr::parse("(hdr_len - 4) * 2")?;
//! let mut ns = Namespace::new();
//! ns.publish("hdr_len", 10);
//! assert_eq!(expr.eval_count(&ns)?, 12);
//! # Ok::<(), bindec_core::Error>(())
//! ```

mod lexer;
mod parser;

use crate::error::{Error, Result};
use crate::namespace::{Namespace, RAW_NAME};
use std::cmp::Ordering;
use std::fmt;

/// Binary arithmetic and bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` and `//`, both floor division
    Div,
    /// `%`, result takes the sign of the divisor
    Mod,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `+`
    Pos,
    /// `~`
    Invert,
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Integer literal
    Int(i128),
    /// String literal
    Str(String),
    /// `True` / `False`
    Bool(bool),
    /// Namespace lookup
    Name(String),
    /// `target[index]`
    Index {
        /// Indexed value, normally `RAW`
        target: Box<Node>,
        /// Position; negative counts from the end
        index: Box<Node>,
    },
    /// Prefix operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Node>,
    },
    /// Infix arithmetic or bitwise operator
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: Box<Node>,
        /// Right operand
        rhs: Box<Node>,
    },
    /// `a < b <= c`, evaluated pairwise with short circuit
    Compare {
        /// Leftmost operand
        first: Box<Node>,
        /// Following operator/operand pairs
        rest: Vec<(CmpOp, Node)>,
    },
    /// `lhs and rhs`
    And(Box<Node>, Box<Node>),
    /// `lhs or rhs`
    Or(Box<Node>, Box<Node>),
    /// `not operand`
    Not(Box<Node>),
}

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// Integer
    Int(i128),
    /// Boolean
    Bool(bool),
    /// String literal
    Str(&'a str),
    /// Byte sequence (`RAW`)
    Bytes(&'a [u8]),
}

impl Value<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Truthiness: non-zero numbers and non-empty sequences are true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
        }
    }

    fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i128::from(*b)),
            _ => None,
        }
    }
}

/// A parsed expression together with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    source: String,
    root: Node,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Expr {
    /// Parses `text`, rejecting anything outside the grammar
    pub fn parse(text: &str) -> Result<Self> {
        let root = parser::parse(text)?;
        Ok(Self {
            source: text.to_string(),
            root,
        })
    }

    /// Source text as written in the schema
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed tree
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Evaluates the expression against `ns`
    pub fn evaluate<'a>(&'a self, ns: &'a Namespace) -> Result<Value<'a>> {
        eval(&self.root, ns)
    }

    /// Evaluates to a non-negative integer, as required for counts and lengths
    pub fn eval_count(&self, ns: &Namespace) -> Result<u64> {
        match self.evaluate(ns)? {
            Value::Int(v) if v < 0 => Err(Error::evaluation(format!(
                "expression \"{}\" evaluated to a negative value: {}",
                self.source, v
            ))),
            Value::Int(v) => u64::try_from(v).map_err(|_| {
                Error::evaluation(format!(
                    "expression \"{}\" evaluated to a value too large: {}",
                    self.source, v
                ))
            }),
            other => Err(Error::evaluation(format!(
                "expression \"{}\" evaluated to a {}, integer expected",
                self.source,
                other.type_name()
            ))),
        }
    }

    /// Evaluates a union trigger
    pub fn eval_trigger(&self, ns: &Namespace) -> Result<bool> {
        match self.evaluate(ns)? {
            Value::Bool(b) => Ok(b),
            Value::Int(v) => Ok(v != 0),
            other => Err(Error::evaluation(format!(
                "trigger \"{}\" evaluated to a {}, boolean expected",
                self.source,
                other.type_name()
            ))),
        }
    }
}

fn eval<'a>(node: &'a Node, ns: &'a Namespace) -> Result<Value<'a>> {
    match node {
        Node::Int(v) => Ok(Value::Int(*v)),
        Node::Str(s) => Ok(Value::Str(s.as_str())),
        Node::Bool(b) => Ok(Value::Bool(*b)),
        Node::Name(name) => lookup(name, ns),
        Node::Index { target, index } => {
            let target = eval(target, ns)?;
            let index = eval(index, ns)?;
            index_value(&target, &index)
        }
        Node::Unary { op, operand } => {
            let value = eval(operand, ns)?;
            let v = value.as_int().ok_or_else(|| {
                Error::evaluation(format!("bad operand type for unary operator: {}", value.type_name()))
            })?;
            match op {
                UnaryOp::Neg => v
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| Error::evaluation("integer overflow")),
                UnaryOp::Pos => Ok(Value::Int(v)),
                UnaryOp::Invert => Ok(Value::Int(!v)),
            }
        }
        Node::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, ns)?;
            let rhs = eval(rhs, ns)?;
            match (lhs.as_int(), rhs.as_int()) {
                (Some(a), Some(b)) => arithmetic(*op, a, b).map(Value::Int),
                _ => Err(Error::evaluation(format!(
                    "unsupported operand types for {:?}: {} and {}",
                    op,
                    lhs.type_name(),
                    rhs.type_name()
                ))),
            }
        }
        Node::Compare { first, rest } => {
            let mut lhs = eval(first, ns)?;
            for (op, node) in rest {
                let rhs = eval(node, ns)?;
                if !compare(*op, &lhs, &rhs)? {
                    return Ok(Value::Bool(false));
                }
                lhs = rhs;
            }
            Ok(Value::Bool(true))
        }
        Node::And(lhs, rhs) => {
            let lhs = eval(lhs, ns)?;
            if lhs.is_truthy() {
                eval(rhs, ns)
            } else {
                Ok(lhs)
            }
        }
        Node::Or(lhs, rhs) => {
            let lhs = eval(lhs, ns)?;
            if lhs.is_truthy() {
                Ok(lhs)
            } else {
                eval(rhs, ns)
            }
        }
        Node::Not(operand) => Ok(Value::Bool(!eval(operand, ns)?.is_truthy())),
    }
}

fn lookup<'a>(name: &str, ns: &'a Namespace) -> Result<Value<'a>> {
    if name == RAW_NAME {
        return ns
            .raw()
            .map(Value::Bytes)
            .ok_or_else(|| Error::evaluation("RAW is only available in union triggers"));
    }
    let value = ns
        .get(name)
        .ok_or_else(|| Error::evaluation(format!("name \"{}\" is not defined", name)))?;
    i128::try_from(value)
        .map(Value::Int)
        .map_err(|_| Error::evaluation(format!("value of \"{}\" does not fit in 127 bits", name)))
}

fn index_value<'a>(target: &Value<'a>, index: &Value<'a>) -> Result<Value<'a>> {
    let Value::Bytes(bytes) = target else {
        return Err(Error::evaluation(format!(
            "{} value is not subscriptable",
            target.type_name()
        )));
    };
    let i = index.as_int().ok_or_else(|| {
        Error::evaluation(format!("indices must be integers, not {}", index.type_name()))
    })?;
    let len = bytes.len() as i128;
    let position = if i < 0 { len + i } else { i };
    if position < 0 || position >= len {
        return Err(Error::evaluation(format!(
            "index {} out of range for {} prefetched bytes",
            i, len
        )));
    }
    Ok(Value::Int(i128::from(bytes[position as usize])))
}

fn arithmetic(op: BinOp, a: i128, b: i128) -> Result<i128> {
    let overflow = || Error::evaluation("integer overflow");
    match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinOp::Div => {
            if b == 0 {
                return Err(Error::evaluation("division by zero"));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(q - 1)
            } else {
                Ok(q)
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(Error::evaluation("modulo by zero"));
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(r + b)
            } else {
                Ok(r)
            }
        }
        BinOp::BitAnd => Ok(a & b),
        BinOp::BitOr => Ok(a | b),
        BinOp::BitXor => Ok(a ^ b),
        BinOp::Shl | BinOp::Shr => {
            let shift = u32::try_from(b).map_err(|_| Error::evaluation("negative shift count"))?;
            if op == BinOp::Shr {
                Ok(a.checked_shr(shift).unwrap_or(if a < 0 { -1 } else { 0 }))
            } else {
                let shifted = a.checked_shl(shift).ok_or_else(overflow)?;
                if shifted >> shift != a {
                    return Err(overflow());
                }
                Ok(shifted)
            }
        }
    }
}

fn compare(op: CmpOp, lhs: &Value<'_>, rhs: &Value<'_>) -> Result<bool> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        },
    };

    match (op, ordering) {
        (CmpOp::Eq, Some(o)) => Ok(o == Ordering::Equal),
        (CmpOp::Ne, Some(o)) => Ok(o != Ordering::Equal),
        (CmpOp::Lt, Some(o)) => Ok(o == Ordering::Less),
        (CmpOp::Le, Some(o)) => Ok(o != Ordering::Greater),
        (CmpOp::Gt, Some(o)) => Ok(o == Ordering::Greater),
        (CmpOp::Ge, Some(o)) => Ok(o != Ordering::Less),
        // values of unrelated types are never equal
        (CmpOp::Eq, None) => Ok(false),
        (CmpOp::Ne, None) => Ok(true),
        (_, None) => Err(Error::evaluation(format!(
            "'{:?}' not supported between {} and {}",
            op,
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}
