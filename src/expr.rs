//! Expression (AST) module: the parsed, validated form of a query predicate document.
//!
//! This module provides the FilterExpr tree and the PredicateParser that builds it from the
//! wire-level shape `{ <field>: { $bitsAllSet: <mask>, ... }, $or: [...] }`. Bit-test operands
//! are validated and normalized here, once, before any document is examined.

use crate::eval::BitRelation;
use crate::mask::{BitSet, MaskSpec};
use crate::options::MatcherOptions;
use crate::types::{Document, Value};
use crate::BitfilterError;
use log::debug;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FilterExpr {
    Logical {
        op: LogicalOp,
        children: Vec<FilterExpr>,
    },
    Field(FieldPredicate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LogicalOp {
    And,
    Or,
    Nor,
}

impl LogicalOp {
    pub fn operator(self) -> &'static str {
        match self {
            LogicalOp::And => "$and",
            LogicalOp::Or => "$or",
            LogicalOp::Nor => "$nor",
        }
    }
}

/// Every clause written against one field. Clauses are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    pub path: String,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Clause {
    BitTest(BitTest),
    Comparison { op: ComparisonOp, operand: Value },
    Exists(bool),
    Not(Vec<Clause>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    pub fn operator(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "$eq",
            ComparisonOp::Ne => "$ne",
            ComparisonOp::Gt => "$gt",
            ComparisonOp::Gte => "$gte",
            ComparisonOp::Lt => "$lt",
            ComparisonOp::Lte => "$lte",
        }
    }

    fn from_operator(name: &str) -> Option<ComparisonOp> {
        match name {
            "$eq" => Some(ComparisonOp::Eq),
            "$ne" => Some(ComparisonOp::Ne),
            "$gt" => Some(ComparisonOp::Gt),
            "$gte" => Some(ComparisonOp::Gte),
            "$lt" => Some(ComparisonOp::Lt),
            "$lte" => Some(ComparisonOp::Lte),
            _ => None,
        }
    }
}

/// A compiled bit test: the relation, its normalized mask, and the operand as written.
#[derive(Debug, Clone, PartialEq)]
pub struct BitTest {
    operator: &'static str,
    relation: BitRelation,
    mask: BitSet,
    operand: Value,
}

impl BitTest {
    pub fn new(operator: &str, operand: &Value, options: &MatcherOptions) -> Result<Self, BitfilterError> {
        let (operator, relation) = Self::resolve_operator(operator, options)?;
        let mask = MaskSpec::from_operand(operand)
            .and_then(|spec| spec.normalize_with_limit(options.max_bit_position))
            .map_err(|source| {
                debug!("rejecting {} operand {}: {}", operator, operand, source);
                BitfilterError::InvalidOperand { operator: operator.to_string(), source }
            })?;
        Ok(Self { operator, relation, mask, operand: operand.clone() })
    }

    fn resolve_operator(name: &str, options: &MatcherOptions) -> Result<(&'static str, BitRelation), BitfilterError> {
        let relation = BitRelation::from_operator(name)
            .ok_or_else(|| BitfilterError::ParseError(format!("unknown operator: {name}")))?;
        if !BitRelation::is_legacy_operator(name) {
            return Ok((relation.operator(), relation));
        }
        if !options.allow_legacy_operators {
            return Err(BitfilterError::ParseError(format!(
                "{name} is no longer supported, use {}",
                relation.operator()
            )));
        }
        let legacy = if relation == BitRelation::AllSet { "$bitsSet" } else { "$bitsClear" };
        Ok((legacy, relation))
    }

    /// The operator as written, legacy spelling included.
    pub fn operator(&self) -> &'static str {
        self.operator
    }

    pub fn relation(&self) -> BitRelation {
        self.relation
    }

    pub fn mask(&self) -> &BitSet {
        &self.mask
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Sorted set bit positions; a negative integer mask lists all of its bits up to 63.
    pub fn bit_positions(&self) -> Vec<u32> {
        self.mask.set_positions()
    }

    pub fn num_bit_positions(&self) -> usize {
        self.bit_positions().len()
    }

    /// Same relation over the same bits, however the operand was spelled.
    pub fn equivalent(&self, other: &BitTest) -> bool {
        self.relation == other.relation && self.mask == other.mask
    }
}

impl Clause {
    pub fn is_bit_test(&self) -> bool {
        match self {
            Clause::BitTest(_) => true,
            Clause::Not(inner) => inner.iter().any(Clause::is_bit_test),
            _ => false,
        }
    }

    fn is_index_satisfiable(&self) -> bool {
        match self {
            Clause::BitTest(_) | Clause::Not(_) => false,
            Clause::Comparison { op, .. } => *op != ComparisonOp::Ne,
            Clause::Exists(exists) => *exists,
        }
    }

    pub fn equivalent(&self, other: &Clause) -> bool {
        match (self, other) {
            (Clause::BitTest(a), Clause::BitTest(b)) => a.equivalent(b),
            (Clause::Not(a), Clause::Not(b)) => clauses_equivalent(a, b),
            _ => self == other,
        }
    }
}

fn clauses_equivalent(a: &[Clause], b: &[Clause]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
}

impl FilterExpr {
    /// Whether an index scan's bounds alone could answer this predicate. Bit tests never can,
    /// so any expression carrying one must be evaluated as a residual filter after fetch.
    pub fn is_index_satisfiable(&self) -> bool {
        match self {
            FilterExpr::Logical { op: LogicalOp::Nor, .. } => false,
            FilterExpr::Logical { children, .. } => children.iter().all(FilterExpr::is_index_satisfiable),
            FilterExpr::Field(field) => field.clauses.iter().all(Clause::is_index_satisfiable),
        }
    }

    pub fn contains_bit_test(&self) -> bool {
        match self {
            FilterExpr::Logical { children, .. } => children.iter().any(FilterExpr::contains_bit_test),
            FilterExpr::Field(field) => field.clauses.iter().any(Clause::is_bit_test),
        }
    }

    /// Structural equivalence; bit-test masks compare by their normalized bits.
    pub fn equivalent(&self, other: &FilterExpr) -> bool {
        match (self, other) {
            (
                FilterExpr::Logical { op: a_op, children: a },
                FilterExpr::Logical { op: b_op, children: b },
            ) => a_op == b_op && a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y)),
            (FilterExpr::Field(a), FilterExpr::Field(b)) => {
                a.path == b.path && clauses_equivalent(&a.clauses, &b.clauses)
            }
            _ => false,
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Logical { op, children } => {
                write!(f, "{}(", op.operator())?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            FilterExpr::Field(field) => write!(f, "{field}"),
        }
    }
}

impl fmt::Display for FieldPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_clauses(f, &self.path, &self.clauses)
    }
}

fn fmt_clauses(f: &mut fmt::Formatter<'_>, path: &str, clauses: &[Clause]) -> fmt::Result {
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            f.write_str(" && ")?;
        }
        match clause {
            Clause::BitTest(test) => {
                write!(f, "{path} {}: [", test.operator)?;
                let positions = test.mask.positions();
                for (j, p) in positions.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if test.mask.is_sign_extended() {
                    if !positions.is_empty() {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}..", test.mask.width())?;
                }
                f.write_str("]")?;
            }
            Clause::Comparison { op, operand } => write!(f, "{path} {} {operand}", op.operator())?,
            Clause::Exists(exists) => write!(f, "{path} $exists {exists}")?,
            Clause::Not(inner) => {
                write!(f, "{path} $not(")?;
                fmt_clauses(f, path, inner)?;
                f.write_str(")")?;
            }
        }
    }
    Ok(())
}

/// Builds a [`FilterExpr`] from a query document, validating every operand.
pub struct PredicateParser<'a> {
    options: &'a MatcherOptions,
}

impl<'a> PredicateParser<'a> {
    pub fn new(options: &'a MatcherOptions) -> Self {
        Self { options }
    }

    pub fn parse(query: &Document, options: &MatcherOptions) -> Result<FilterExpr, BitfilterError> {
        PredicateParser::new(options).parse_document(query)
    }

    fn parse_document(&self, doc: &Document) -> Result<FilterExpr, BitfilterError> {
        let mut children = doc
            .iter()
            .map(|(name, value)| self.parse_entry(name, value))
            .collect::<Result<Vec<_>, _>>()?;
        if children.len() == 1 {
            Ok(children.remove(0))
        } else {
            Ok(FilterExpr::Logical { op: LogicalOp::And, children })
        }
    }

    fn parse_entry(&self, name: &str, value: &Value) -> Result<FilterExpr, BitfilterError> {
        let op = match name {
            "$and" => LogicalOp::And,
            "$or" => LogicalOp::Or,
            "$nor" => LogicalOp::Nor,
            _ if name.starts_with('$') => {
                return Err(BitfilterError::ParseError(format!("unknown top level operator: {name}")))
            }
            _ => return self.parse_field(name, value).map(FilterExpr::Field),
        };
        let items = match value {
            Value::Array(items) if !items.is_empty() => items,
            _ => {
                return Err(BitfilterError::ParseError(format!(
                    "{name} must be a nonempty array"
                )))
            }
        };
        let children = items
            .iter()
            .map(|item| match item {
                Value::Document(doc) => self.parse_document(doc),
                _ => Err(BitfilterError::ParseError(format!(
                    "{name} entries must be objects"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterExpr::Logical { op, children })
    }

    fn parse_field(&self, path: &str, value: &Value) -> Result<FieldPredicate, BitfilterError> {
        let clauses = match value {
            Value::Document(doc) if is_operator_document(doc) => self.parse_operators(doc)?,
            other => vec![Clause::Comparison { op: ComparisonOp::Eq, operand: other.clone() }],
        };
        Ok(FieldPredicate { path: path.to_string(), clauses })
    }

    fn parse_operators(&self, doc: &Document) -> Result<Vec<Clause>, BitfilterError> {
        doc.iter().map(|(op, operand)| self.parse_clause(op, operand)).collect()
    }

    fn parse_clause(&self, op: &str, operand: &Value) -> Result<Clause, BitfilterError> {
        if BitRelation::from_operator(op).is_some() {
            let test = BitTest::new(op, operand, self.options)?;
            debug!(
                "parsed {} with {} mask bits (sign extended: {})",
                test.operator(),
                test.num_bit_positions(),
                test.mask().is_sign_extended()
            );
            return Ok(Clause::BitTest(test));
        }
        if let Some(cmp) = ComparisonOp::from_operator(op) {
            return Ok(Clause::Comparison { op: cmp, operand: operand.clone() });
        }
        match op {
            "$exists" => match operand {
                Value::Bool(b) => Ok(Clause::Exists(*b)),
                Value::Int(i) => Ok(Clause::Exists(*i != 0)),
                Value::Double(d) => Ok(Clause::Exists(*d != 0.0)),
                _ => Err(BitfilterError::ParseError("$exists takes a boolean".to_string())),
            },
            "$not" => match operand {
                Value::Document(doc) if !doc.is_empty() && is_operator_document(doc) => {
                    Ok(Clause::Not(self.parse_operators(doc)?))
                }
                _ => Err(BitfilterError::ParseError("$not needs an operator object".to_string())),
            },
            _ => Err(BitfilterError::ParseError(format!("unknown operator: {op}"))),
        }
    }
}

/// `{ $op: ... }` documents are operator lists; anything else is an equality operand. A document
/// that mixes both is rejected later as an unknown operator.
fn is_operator_document(doc: &Document) -> bool {
    doc.iter().next().map_or(false, |(name, _)| name.starts_with('$'))
}
