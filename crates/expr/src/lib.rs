
use common::{DbError, DbResult, RelationRow};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use types::Value;

/// Qualified reference to a column: table name plus column name.
///
/// Query descriptions always reference columns fully qualified; the
/// schema model resolves them during validation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Comparison operators for predicate leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// Right-hand side of a comparison: a literal, or another column for
/// join predicates.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Operand {
    Value(Value),
    Column(ColumnRef),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<ColumnRef> for Operand {
    fn from(c: ColumnRef) -> Self {
        Operand::Column(c)
    }
}

/// A predicate tree: comparison leaves combined with boolean nodes.
///
/// `evaluate` is pure. Null semantics are strict rather than
/// three-valued: `Eq` holds for Null = Null, and every other
/// comparison involving Null is false.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: CompareOp,
        operand: Operand,
    },
    Between {
        column: ColumnRef,
        low: Value,
        high: Value,
    },
    In {
        column: ColumnRef,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Result of constant folding.
    Literal(bool),
}

impl Predicate {
    pub fn compare(column: ColumnRef, op: CompareOp, operand: impl Into<Operand>) -> Self {
        Predicate::Compare {
            column,
            op,
            operand: operand.into(),
        }
    }

    /// Evaluate against one relation row.
    ///
    /// A table missing from the row's scope is an `Exec` error (a plan
    /// bug); a column missing from an in-scope slice reads as Null.
    pub fn evaluate(&self, row: &RelationRow) -> DbResult<bool> {
        match self {
            Predicate::Compare {
                column,
                op,
                operand,
            } => {
                let left = resolve(row, column)?;
                let right = match operand {
                    Operand::Value(v) => v.clone(),
                    Operand::Column(c) => resolve(row, c)?,
                };
                compare(&left, *op, &right)
            }
            Predicate::Between { column, low, high } => {
                let v = resolve(row, column)?;
                Ok(compare(&v, CompareOp::Ge, low)? && compare(&v, CompareOp::Le, high)?)
            }
            Predicate::In { column, values } => {
                let v = resolve(row, column)?;
                if v.is_null() {
                    return Ok(false);
                }
                Ok(values.iter().any(|candidate| {
                    v.eq_same_type(candidate).unwrap_or(false)
                }))
            }
            Predicate::And(children) => {
                for child in children {
                    if !child.evaluate(row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(children) => {
                for child in children {
                    if child.evaluate(row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(inner) => Ok(!inner.evaluate(row)?),
            Predicate::Literal(b) => Ok(*b),
        }
    }

    /// All column references in the tree, operands included.
    pub fn columns(&self) -> Vec<ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<ColumnRef>) {
        match self {
            Predicate::Compare {
                column, operand, ..
            } => {
                out.push(column.clone());
                if let Operand::Column(c) = operand {
                    out.push(c.clone());
                }
            }
            Predicate::Between { column, .. } | Predicate::In { column, .. } => {
                out.push(column.clone());
            }
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
            Predicate::Not(inner) => inner.collect_columns(out),
            Predicate::Literal(_) => {}
        }
    }

    /// Names of the tables this predicate touches.
    pub fn tables(&self) -> BTreeSet<String> {
        self.columns().into_iter().map(|c| c.table).collect()
    }

    /// For `colA = colB` leaves: the two sides of an equi-join pair.
    pub fn as_join_pair(&self) -> Option<(&ColumnRef, &ColumnRef)> {
        match self {
            Predicate::Compare {
                column,
                op: CompareOp::Eq,
                operand: Operand::Column(other),
            } => Some((column, other)),
            _ => None,
        }
    }
}

fn resolve(row: &RelationRow, column: &ColumnRef) -> DbResult<Value> {
    let slice = row.slice(&column.table).ok_or_else(|| {
        DbError::Exec(format!("table '{}' not in scope", column.table))
    })?;
    Ok(slice.values.get(&column.column).cloned().unwrap_or(Value::Null))
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> DbResult<bool> {
    use CompareOp::*;

    // Strict null handling: Null = Null is the only comparison a null
    // value can satisfy.
    if left.is_null() || right.is_null() {
        return Ok(match op {
            Eq => left.is_null() && right.is_null(),
            _ => false,
        });
    }

    let ord = left.cmp_same_type(right).ok_or_else(|| {
        DbError::Exec(format!(
            "incompatible types for {op}: {left:?}, {right:?}"
        ))
    })?;

    Ok(match op {
        Eq => ord == Ordering::Equal,
        Ne => ord != Ordering::Equal,
        Lt => ord == Ordering::Less,
        Le => ord != Ordering::Greater,
        Gt => ord == Ordering::Greater,
        Ge => ord != Ordering::Less,
    })
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare {
                column,
                op,
                operand,
            } => match operand {
                Operand::Value(v) => write!(f, "{column} {op} {v}"),
                Operand::Column(c) => write!(f, "{column} {op} {c}"),
            },
            Predicate::Between { column, low, high } => {
                write!(f, "{column} BETWEEN {low} AND {high}")
            }
            Predicate::In { column, values } => {
                write!(f, "{column} IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Predicate::And(children) => write_joined(f, children, " AND "),
            Predicate::Or(children) => write_joined(f, children, " OR "),
            Predicate::Not(inner) => write!(f, "NOT ({inner})"),
            Predicate::Literal(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}
