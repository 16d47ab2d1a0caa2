//! Compiler module: turns a validated FilterExpr into a tree of closures.
//!
//! Each field predicate becomes one closure that reads the field once and ANDs its clauses,
//! stopping at the first clause that fails. Bit tests carry their normalized mask by value, so
//! a compiled predicate shares nothing mutable and can be called from any thread.

use crate::context::FieldAccessor;
use crate::eval::{evaluate, BitRelation};
use crate::expr::{Clause, ComparisonOp, FieldPredicate, FilterExpr, LogicalOp};
use crate::extract::FieldValue;
use crate::mask::BitSet;
use crate::types::Value;
use log::trace;
use std::cmp::Ordering;

pub type CompiledPredicate = Box<dyn Fn(&dyn FieldAccessor) -> bool + Send + Sync + 'static>;
type ClauseFn = Box<dyn Fn(Option<&Value>) -> bool + Send + Sync + 'static>;

pub struct DefaultCompiler;

impl DefaultCompiler {
    pub fn compile(expr: &FilterExpr) -> CompiledPredicate {
        match expr {
            FilterExpr::Logical { op, children } => {
                let children: Vec<CompiledPredicate> = children.iter().map(DefaultCompiler::compile).collect();
                match op {
                    LogicalOp::And => Box::new(move |doc| children.iter().all(|c| c(doc))),
                    LogicalOp::Or => Box::new(move |doc| children.iter().any(|c| c(doc))),
                    LogicalOp::Nor => Box::new(move |doc| !children.iter().any(|c| c(doc))),
                }
            }
            FilterExpr::Field(field) => DefaultCompiler::compile_field(field),
        }
    }

    fn compile_field(field: &FieldPredicate) -> CompiledPredicate {
        let path = field.path.clone();
        let clauses: Vec<ClauseFn> = field.clauses.iter().map(|c| compile_clause(&path, c)).collect();
        Box::new(move |doc| {
            let value = doc.field(&path);
            clauses.iter().all(|c| c(value))
        })
    }
}

fn compile_clause(path: &str, clause: &Clause) -> ClauseFn {
    match clause {
        Clause::BitTest(test) => {
            let relation = test.relation();
            let mask = test.mask().clone();
            let path = path.to_string();
            Box::new(move |value| bit_test(&path, relation, &mask, value))
        }
        Clause::Comparison { op, operand } => {
            let op = *op;
            let operand = operand.clone();
            Box::new(move |value| compare(op, value, &operand))
        }
        Clause::Exists(exists) => {
            let exists = *exists;
            Box::new(move |value| value.is_some() == exists)
        }
        Clause::Not(inner) => {
            let inner: Vec<ClauseFn> = inner.iter().map(|c| compile_clause(path, c)).collect();
            Box::new(move |value| !inner.iter().all(|c| c(value)))
        }
    }
}

fn bit_test(path: &str, relation: BitRelation, mask: &BitSet, value: Option<&Value>) -> bool {
    let field = FieldValue::extract(value);
    if !field.is_comparable() {
        trace!(
            "{} on '{}': {} is not bit-testable",
            relation,
            path,
            value.map_or("missing field".to_string(), |v| v.get_type().to_string())
        );
        return false;
    }
    evaluate(relation, mask, field)
}

fn compare(op: ComparisonOp, value: Option<&Value>, operand: &Value) -> bool {
    let Some(value) = value else {
        // A missing field equals null and nothing else.
        let is_null = matches!(operand, Value::Null);
        return match op {
            ComparisonOp::Eq | ComparisonOp::Gte | ComparisonOp::Lte => is_null,
            ComparisonOp::Ne => !is_null,
            ComparisonOp::Gt | ComparisonOp::Lt => false,
        };
    };
    match op {
        ComparisonOp::Eq => cmp_values(value, operand) == Some(Ordering::Equal),
        ComparisonOp::Ne => cmp_values(value, operand) != Some(Ordering::Equal),
        ComparisonOp::Gt => cmp_values(value, operand) == Some(Ordering::Greater),
        ComparisonOp::Gte => matches!(cmp_values(value, operand), Some(Ordering::Greater | Ordering::Equal)),
        ComparisonOp::Lt => cmp_values(value, operand) == Some(Ordering::Less),
        ComparisonOp::Lte => matches!(cmp_values(value, operand), Some(Ordering::Less | Ordering::Equal)),
    }
}

// Helper for ordered comparisons. Values of unrelated types never compare.
fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Binary(a), Value::Binary(b)) => Some(a.bytes.cmp(&b.bytes)),
        _ if a.get_type().is_numeric() && b.get_type().is_numeric() => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        _ => (a == b).then_some(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::expr::PredicateParser;
    use crate::options::MatcherOptions;
    use crate::types::{Binary, Document};

    fn compile(query: Document) -> CompiledPredicate {
        let expr = PredicateParser::parse(&query, &MatcherOptions::default()).unwrap();
        DefaultCompiler::compile(&expr)
    }

    #[test]
    fn test_compile_and_execute_bit_test() {
        let filter = compile(doc! { "a" => doc! { "$bitsAllSet" => 54 } });
        assert!(filter(&doc! { "a" => 54 }));
        assert!(filter(&doc! { "a" => 255 }));
        assert!(!filter(&doc! { "a" => 88 }));
    }

    #[test]
    fn test_clauses_on_one_field_are_anded() {
        let filter = compile(doc! { "a" => doc! { "$bitsAllSet" => 54, "$bitsAllClear" => 201 } });
        let matched: Vec<i64> = [0, 1, 54, 88, 255].into_iter().filter(|&v| filter(&doc! { "a" => v })).collect();
        assert_eq!(matched, vec![54]);
    }

    #[test]
    fn test_clause_order_does_not_matter() {
        let a = compile(doc! { "a" => doc! { "$bitsAnySet" => 9, "$lt" => 100 } });
        let b = compile(doc! { "a" => doc! { "$lt" => 100, "$bitsAnySet" => 9 } });
        for v in [0, 1, 54, 88, 255] {
            let d = doc! { "a" => v };
            assert_eq!(a(&d), b(&d), "{v}");
        }
    }

    #[test]
    fn test_incomparable_values_do_not_match() {
        let filter = compile(doc! { "a" => doc! { "$bitsAllClear" => 0 } });
        assert!(filter(&doc! { "a" => 0 }));
        assert!(!filter(&doc! { "a" => "0" }));
        assert!(!filter(&doc! { "a" => 1.5 }));
        assert!(!filter(&doc! { "a" => vec![0] }));
        assert!(!filter(&doc! { "b" => 0 }));
        assert!(filter(&doc! { "a" => 2.0 }));
    }

    #[test]
    fn test_not_inverts_including_incomparable() {
        let filter = compile(doc! { "a" => doc! { "$not" => doc! { "$bitsAllSet" => 1 } } });
        assert!(!filter(&doc! { "a" => 1 }));
        assert!(filter(&doc! { "a" => 2 }));
        assert!(filter(&doc! { "a" => "x" }));
    }

    #[test]
    fn test_logical_or_nor() {
        let or = compile(doc! { "$or" => vec![doc! { "a" => doc! { "$bitsAllSet" => 1 } }, doc! { "b" => true }] });
        let nor = compile(doc! { "$nor" => vec![doc! { "a" => doc! { "$bitsAllSet" => 1 } }, doc! { "b" => true }] });
        let docs = [doc! { "a" => 1 }, doc! { "a" => 2, "b" => true }, doc! { "a" => 2 }];
        let or_hits: Vec<bool> = docs.iter().map(|d| or(d)).collect();
        let nor_hits: Vec<bool> = docs.iter().map(|d| nor(d)).collect();
        assert_eq!(or_hits, vec![true, true, false]);
        assert_eq!(nor_hits, vec![false, false, true]);
    }

    #[test]
    fn test_comparisons() {
        let filter = compile(doc! { "a" => doc! { "$gte" => 2, "$lt" => 5.5 } });
        assert!(filter(&doc! { "a" => 2 }));
        assert!(filter(&doc! { "a" => 5.0 }));
        assert!(!filter(&doc! { "a" => 6 }));
        assert!(!filter(&doc! { "a" => "3" }));

        let eq = compile(doc! { "a" => 3 });
        assert!(eq(&doc! { "a" => 3.0 }));
        assert!(!eq(&doc! { "a" => 4 }));

        let null = compile(doc! { "a" => Value::Null });
        assert!(null(&doc! { "b" => 1 }));
        assert!(!null(&doc! { "a" => 1 }));

        let ne = compile(doc! { "a" => doc! { "$ne" => 3 } });
        assert!(ne(&doc! { "b" => 1 }));
        assert!(ne(&doc! { "a" => "3" }));
        assert!(!ne(&doc! { "a" => 3 }));
    }

    #[test]
    fn test_exists_and_dotted_paths() {
        let filter = compile(doc! { "m.flags" => doc! { "$exists" => true, "$bitsAnySet" => Binary::new(vec![0x80]) } });
        assert!(filter(&doc! { "m" => doc! { "flags" => Binary::new(vec![0x81, 0x00]) } }));
        assert!(!filter(&doc! { "m" => doc! { "flags" => Binary::new(vec![0x01]) } }));
        assert!(!filter(&doc! { "m" => 1 }));
    }
}
