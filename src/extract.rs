//! Extract module: classifies a stored field value for bit testing.

use crate::mask::{exact_i64, BitSet};
use crate::types::Value;

/// A document field as the bit-test evaluator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Integer(i64),
    Blob(&'a [u8]),
    /// Missing fields, fractional numbers and every non-numeric, non-binary type.
    Incomparable,
}

impl<'a> FieldValue<'a> {
    /// Classify a field as returned by a [`FieldAccessor`](crate::FieldAccessor); `None` is a
    /// missing field.
    pub fn extract(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::Int(i)) => FieldValue::Integer(*i),
            Some(Value::Double(d)) => exact_i64(*d).map_or(FieldValue::Incomparable, FieldValue::Integer),
            Some(Value::Binary(bin)) => FieldValue::Blob(&bin.bytes),
            _ => FieldValue::Incomparable,
        }
    }

    pub fn is_comparable(&self) -> bool {
        !matches!(self, FieldValue::Incomparable)
    }

    /// Materialize as a [`BitSet`]. The evaluator reads integers and blobs in place and only needs
    /// this for comparing two stored values.
    pub fn to_bit_set(&self) -> Option<BitSet> {
        match self {
            FieldValue::Integer(i) => Some(BitSet::from_i64(*i)),
            FieldValue::Blob(bytes) => Some(BitSet::from_bytes(bytes)),
            FieldValue::Incomparable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::types::Binary;

    #[test]
    fn test_integers() {
        assert_eq!(FieldValue::extract(Some(&Value::Int(-54))), FieldValue::Integer(-54));
        assert_eq!(FieldValue::extract(Some(&Value::Double(88.0))), FieldValue::Integer(88));
        assert_eq!(FieldValue::extract(Some(&Value::Double(-0.0))), FieldValue::Integer(0));
    }

    #[test]
    fn test_fractional_and_non_finite_are_incomparable() {
        for d in [0.5, -1.25, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e20] {
            assert_eq!(FieldValue::extract(Some(&Value::Double(d))), FieldValue::Incomparable, "{d}");
        }
    }

    #[test]
    fn test_binary_ignores_subtype() {
        let a = Value::Binary(Binary::with_subtype(0, vec![1, 2]));
        let b = Value::Binary(Binary::with_subtype(128, vec![1, 2]));
        assert_eq!(FieldValue::extract(Some(&a)), FieldValue::extract(Some(&b)));
        assert_eq!(FieldValue::extract(Some(&a)), FieldValue::Blob(&[1, 2]));
    }

    #[test]
    fn test_other_types_are_incomparable() {
        let others = [
            Value::Null,
            Value::Bool(true),
            Value::from("54"),
            Value::from(vec![54]),
            Value::Document(doc! { "a" => 1 }),
        ];
        for v in &others {
            assert!(!FieldValue::extract(Some(v)).is_comparable(), "{v}");
        }
        assert_eq!(FieldValue::extract(None), FieldValue::Incomparable);
    }

    #[test]
    fn test_to_bit_set() {
        assert_eq!(FieldValue::Integer(54).to_bit_set(), Some(BitSet::from_positions([1, 2, 4, 5])));
        assert_eq!(FieldValue::Blob(&[0x36]).to_bit_set(), Some(BitSet::from_positions([1, 2, 4, 5])));
        assert_eq!(FieldValue::Incomparable.to_bit_set(), None);
    }
}
