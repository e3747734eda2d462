//! Algebra expression tree.
//!
//! The expression AST consumed by the processor. It is produced by an
//! external text parser (out of scope here) or built directly through the
//! constructors below, and is immutable during evaluation.
//!
//! Dispatch over the tree is a single exhaustive `match` in the
//! processor; there is no visitor machinery to implement when adding a
//! consumer.

use std::fmt;

/// Comparison operator between a coverage's samples and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        };
        f.write_str(s)
    }
}

/// A boolean/arithmetic expression over named coverages.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgebraExpression {
    /// Logical conjunction of two or more operands.
    And(Vec<AlgebraExpression>),
    /// Logical disjunction of two or more operands.
    Or(Vec<AlgebraExpression>),
    /// Logical negation of exactly one operand.
    Not(Box<AlgebraExpression>),
    /// Per-pixel comparison of one coverage against a literal.
    Compare {
        op: CompareOp,
        property: String,
        value: f64,
    },
    /// Per-pixel inclusive range test on one coverage.
    Between {
        property: String,
        lo: f64,
        hi: f64,
    },
    /// Call into the fixed operator vocabulary; arguments are coverage
    /// names, never nested expressions.
    Function {
        name: String,
        args: Vec<String>,
    },
    /// Reference to a named coverage.
    Property(String),
    /// Numeric literal.
    Literal(f64),
}

impl AlgebraExpression {
    /// `a AND b AND ...`
    #[must_use]
    pub fn and(operands: Vec<AlgebraExpression>) -> Self {
        AlgebraExpression::And(operands)
    }

    /// `a OR b OR ...`
    #[must_use]
    pub fn or(operands: Vec<AlgebraExpression>) -> Self {
        AlgebraExpression::Or(operands)
    }

    /// `NOT a`
    #[must_use]
    pub fn not(operand: AlgebraExpression) -> Self {
        AlgebraExpression::Not(Box::new(operand))
    }

    /// `property <op> value`
    #[must_use]
    pub fn compare(property: impl Into<String>, op: CompareOp, value: f64) -> Self {
        AlgebraExpression::Compare {
            op,
            property: property.into(),
            value,
        }
    }

    /// `property BETWEEN lo AND hi`
    #[must_use]
    pub fn between(property: impl Into<String>, lo: f64, hi: f64) -> Self {
        AlgebraExpression::Between {
            property: property.into(),
            lo,
            hi,
        }
    }

    /// `NAME(arg, ...)`
    #[must_use]
    pub fn function(name: impl Into<String>, args: Vec<String>) -> Self {
        AlgebraExpression::Function {
            name: name.into(),
            args,
        }
    }

    /// Collect every coverage name the expression references, in
    /// first-appearance order without duplicates.
    #[must_use]
    pub fn referenced_coverages(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            AlgebraExpression::And(children) | AlgebraExpression::Or(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
            AlgebraExpression::Not(child) => child.collect_names(names),
            AlgebraExpression::Compare { property, .. }
            | AlgebraExpression::Between { property, .. } => push_unique(names, property),
            AlgebraExpression::Function { args, .. } => {
                for arg in args {
                    push_unique(names, arg);
                }
            }
            AlgebraExpression::Property(name) => push_unique(names, name),
            AlgebraExpression::Literal(_) => {}
        }
    }

    /// Return an equivalent, structurally simpler expression: double
    /// negations are removed and single-operand `And`/`Or` nodes are
    /// replaced by their only child.
    #[must_use]
    pub fn simplify(self) -> AlgebraExpression {
        match self {
            AlgebraExpression::And(children) => {
                let mut simplified: Vec<AlgebraExpression> =
                    children.into_iter().map(AlgebraExpression::simplify).collect();
                if simplified.len() == 1 {
                    simplified.pop().expect("length checked above")
                } else {
                    AlgebraExpression::And(simplified)
                }
            }
            AlgebraExpression::Or(children) => {
                let mut simplified: Vec<AlgebraExpression> =
                    children.into_iter().map(AlgebraExpression::simplify).collect();
                if simplified.len() == 1 {
                    simplified.pop().expect("length checked above")
                } else {
                    AlgebraExpression::Or(simplified)
                }
            }
            AlgebraExpression::Not(child) => match child.simplify() {
                // NOT NOT x == x
                AlgebraExpression::Not(inner) => *inner,
                other => AlgebraExpression::Not(Box::new(other)),
            },
            leaf => leaf,
        }
    }
}

impl fmt::Display for AlgebraExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgebraExpression::And(children) => write_joined(f, children, " AND "),
            AlgebraExpression::Or(children) => write_joined(f, children, " OR "),
            AlgebraExpression::Not(child) => write!(f, "NOT ({child})"),
            AlgebraExpression::Compare {
                op,
                property,
                value,
            } => write!(f, "{property} {op} {value}"),
            AlgebraExpression::Between { property, lo, hi } => {
                write!(f, "{property} BETWEEN {lo} AND {hi}")
            }
            AlgebraExpression::Function { name, args } => {
                write!(f, "{name}({})", args.join(", "))
            }
            AlgebraExpression::Property(name) => f.write_str(name),
            AlgebraExpression::Literal(value) => write!(f, "{value}"),
        }
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[AlgebraExpression],
    separator: &str,
) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}
