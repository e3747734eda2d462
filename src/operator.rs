//! Fixed vocabulary of pixel-wise raster operators.
//!
//! Each operator is a pure function over one or more same-geometry bands,
//! with a declared arity validated at call time. Logical operators treat
//! any nonzero sample as true and produce {0, 1} masks; the arithmetic
//! operators work on raw sample values. N-ary operators fold their
//! operands pairwise, left to right.
//!
//! The table is the extension point: adding an operator means adding one
//! row, not implementing a trait.

use ndarray::{Array2, Zip};

use crate::error::{AlgebraError, Result};

/// Declared operand count of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    /// Whether `count` operands satisfy this arity.
    #[must_use]
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// One entry of the operator vocabulary.
pub struct Operator {
    pub name: &'static str,
    pub arity: Arity,
    func: fn(&[Array2<f64>]) -> Array2<f64>,
}

impl Operator {
    /// Apply the operator after validating the operand count.
    ///
    /// # Errors
    /// Returns [`AlgebraError::Arity`] when the operand count does not
    /// match the declared arity.
    pub fn apply(&self, sources: &[Array2<f64>]) -> Result<Array2<f64>> {
        if !self.arity.accepts(sources.len()) {
            return Err(AlgebraError::Arity {
                operator: self.name.to_string(),
                expected: self.arity.to_string(),
                actual: sources.len(),
            });
        }
        Ok((self.func)(sources))
    }
}

/// The operator vocabulary.
pub static OPERATORS: &[Operator] = &[
    Operator {
        name: "NOT",
        arity: Arity::Exactly(1),
        func: op_not,
    },
    Operator {
        name: "AND",
        arity: Arity::AtLeast(2),
        func: op_and,
    },
    Operator {
        name: "OR",
        arity: Arity::AtLeast(2),
        func: op_or,
    },
    Operator {
        name: "NULL",
        arity: Arity::Exactly(1),
        func: op_null,
    },
    Operator {
        name: "MAX2",
        arity: Arity::AtLeast(1),
        func: op_max2,
    },
    Operator {
        name: "MIN2",
        arity: Arity::AtLeast(1),
        func: op_min2,
    },
    Operator {
        name: "ABS",
        arity: Arity::Exactly(1),
        func: op_abs,
    },
    Operator {
        name: "EXP",
        arity: Arity::Exactly(1),
        func: op_exp,
    },
    Operator {
        name: "LOG",
        arity: Arity::Exactly(1),
        func: op_log,
    },
];

/// Look an operator up by name, case-insensitively.
///
/// # Errors
/// Returns [`AlgebraError::UnknownOperator`] for names outside the
/// vocabulary.
pub fn lookup(name: &str) -> Result<&'static Operator> {
    OPERATORS
        .iter()
        .find(|op| op.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| AlgebraError::UnknownOperator(name.to_string()))
}

#[inline]
fn truthy(v: f64) -> bool {
    v != 0.0
}

fn fold_pairwise(
    sources: &[Array2<f64>],
    combine: fn(&Array2<f64>, &Array2<f64>) -> Array2<f64>,
) -> Array2<f64> {
    let mut out = sources[0].clone();
    for source in &sources[1..] {
        out = combine(&out, source);
    }
    out
}

fn op_not(sources: &[Array2<f64>]) -> Array2<f64> {
    sources[0].mapv(|v| if truthy(v) { 0.0 } else { 1.0 })
}

fn op_and(sources: &[Array2<f64>]) -> Array2<f64> {
    fold_pairwise(sources, |a, b| {
        Zip::from(a).and(b).map_collect(|&x, &y| {
            if truthy(x) && truthy(y) {
                1.0
            } else {
                0.0
            }
        })
    })
}

fn op_or(sources: &[Array2<f64>]) -> Array2<f64> {
    fold_pairwise(sources, |a, b| {
        Zip::from(a).and(b).map_collect(|&x, &y| {
            if truthy(x) || truthy(y) {
                1.0
            } else {
                0.0
            }
        })
    })
}

fn op_null(sources: &[Array2<f64>]) -> Array2<f64> {
    sources[0].clone()
}

fn op_max2(sources: &[Array2<f64>]) -> Array2<f64> {
    fold_pairwise(sources, |a, b| {
        Zip::from(a).and(b).map_collect(|&x, &y| x.max(y))
    })
}

fn op_min2(sources: &[Array2<f64>]) -> Array2<f64> {
    fold_pairwise(sources, |a, b| {
        Zip::from(a).and(b).map_collect(|&x, &y| x.min(y))
    })
}

fn op_abs(sources: &[Array2<f64>]) -> Array2<f64> {
    sources[0].mapv(f64::abs)
}

fn op_exp(sources: &[Array2<f64>]) -> Array2<f64> {
    sources[0].mapv(f64::exp)
}

fn op_log(sources: &[Array2<f64>]) -> Array2<f64> {
    sources[0].mapv(f64::ln)
}
