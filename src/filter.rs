//! Filter module: wraps compiled filters and provides the main execution API.
//!
//! This module provides the Matcher entry point, the CompiledFilter type and its Explain tree.

use crate::compiler::{CompiledPredicate, DefaultCompiler};
use crate::context::FieldAccessor;
use crate::expr::{Clause, FilterExpr, PredicateParser};
use crate::options::MatcherOptions;
use crate::types::{Document, Value};
use crate::BitfilterError;
use log::debug;
use serde::Serialize;

/// Compiles query documents under one set of options.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    options: MatcherOptions,
}

impl Matcher {
    pub fn new(options: MatcherOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    pub fn parse(&self, query: &Document) -> Result<FilterExpr, BitfilterError> {
        PredicateParser::parse(query, &self.options)
    }

    pub fn compile(&self, query: &Document) -> Result<CompiledFilter, BitfilterError> {
        let expr = self.parse(query)?;
        Ok(CompiledFilter::new(expr))
    }
}

/// A compiled filter, ready for execution against any number of documents.
pub struct CompiledFilter {
    expr: FilterExpr,
    predicate: CompiledPredicate,
}

impl CompiledFilter {
    pub fn new(expr: FilterExpr) -> Self {
        let predicate = DefaultCompiler::compile(&expr);
        debug!(
            "compiled filter {} (bit tests: {}, index satisfiable: {})",
            expr,
            expr.contains_bit_test(),
            expr.is_index_satisfiable()
        );
        Self { expr, predicate }
    }

    pub fn matches(&self, doc: &dyn FieldAccessor) -> bool {
        (self.predicate)(doc)
    }

    /// Lazily yields the candidates that match, in the order they are supplied.
    pub fn scan<'a, D, I>(&'a self, candidates: I) -> impl Iterator<Item = &'a D> + 'a
    where
        D: FieldAccessor + 'a,
        I: IntoIterator<Item = &'a D>,
        I::IntoIter: 'a,
    {
        candidates.into_iter().filter(move |doc| self.matches(*doc))
    }

    pub fn count_matches<'a, D, I>(&'a self, candidates: I) -> usize
    where
        D: FieldAccessor + 'a,
        I: IntoIterator<Item = &'a D>,
        I::IntoIter: 'a,
    {
        self.scan(candidates).count()
    }

    pub fn expr(&self) -> &FilterExpr {
        &self.expr
    }

    /// Bit tests can't be answered from index bounds; the planner must keep this filter as a
    /// residual applied after fetch.
    pub fn requires_residual_filter(&self) -> bool {
        !self.expr.is_index_satisfiable()
    }

    pub fn explain(&self) -> Explain {
        Explain::from_expr(&self.expr)
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter").field("expr", &self.expr).finish_non_exhaustive()
    }
}

/// Structural description of a filter: operator names and operands, no execution counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explain {
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operand: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_positions: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Explain>,
}

impl Explain {
    fn node(operator: &str) -> Self {
        Self {
            operator: operator.to_string(),
            path: None,
            operand: None,
            bit_positions: None,
            children: Vec::new(),
        }
    }

    pub fn from_expr(expr: &FilterExpr) -> Self {
        match expr {
            FilterExpr::Logical { op, children } => Explain {
                children: children.iter().map(Explain::from_expr).collect(),
                ..Explain::node(op.operator())
            },
            FilterExpr::Field(field) => {
                let mut clauses: Vec<Explain> =
                    field.clauses.iter().map(|c| Explain::from_clause(&field.path, c)).collect();
                if clauses.len() == 1 {
                    clauses.remove(0)
                } else {
                    Explain { children: clauses, ..Explain::node("$and") }
                }
            }
        }
    }

    fn from_clause(field_path: &str, clause: &Clause) -> Self {
        let path = Some(field_path.to_string());
        match clause {
            Clause::BitTest(test) => Explain {
                path,
                operand: Some(test.operand().clone()),
                bit_positions: Some(test.bit_positions()),
                ..Explain::node(test.operator())
            },
            Clause::Comparison { op, operand } => Explain {
                path,
                operand: Some(operand.clone()),
                ..Explain::node(op.operator())
            },
            Clause::Exists(exists) => Explain {
                path,
                operand: Some(Value::Bool(*exists)),
                ..Explain::node("$exists")
            },
            Clause::Not(inner) => Explain {
                path,
                children: inner.iter().map(|c| Explain::from_clause(field_path, c)).collect(),
                ..Explain::node("$not")
            },
        }
    }
}
