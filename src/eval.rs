//! Eval module: the four bit relations between a normalized mask and a field value.
//!
//! Positions are compared one by one. Past the end of its explicit bits an integer reads as its
//! sign and a blob reads as zero, so only one guard bit past the wider operand is ever inspected.

use crate::extract::FieldValue;
use crate::mask::BitSet;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitRelation {
    AllSet,
    AllClear,
    AnySet,
    AnyClear,
}

impl BitRelation {
    pub const ALL: [BitRelation; 4] = [
        BitRelation::AllSet,
        BitRelation::AllClear,
        BitRelation::AnySet,
        BitRelation::AnyClear,
    ];

    pub fn operator(self) -> &'static str {
        match self {
            BitRelation::AllSet => "$bitsAllSet",
            BitRelation::AllClear => "$bitsAllClear",
            BitRelation::AnySet => "$bitsAnySet",
            BitRelation::AnyClear => "$bitsAnyClear",
        }
    }

    /// Resolves an operator name, including the legacy `$bitsSet` / `$bitsClear` aliases.
    pub fn from_operator(name: &str) -> Option<BitRelation> {
        match name {
            "$bitsAllSet" | "$bitsSet" => Some(BitRelation::AllSet),
            "$bitsAllClear" | "$bitsClear" => Some(BitRelation::AllClear),
            "$bitsAnySet" => Some(BitRelation::AnySet),
            "$bitsAnyClear" => Some(BitRelation::AnyClear),
            _ => None,
        }
    }

    pub fn is_legacy_operator(name: &str) -> bool {
        matches!(name, "$bitsSet" | "$bitsClear")
    }

    fn test_word(self, mask: u64, value: u64) -> bool {
        match self {
            BitRelation::AllSet => value & mask == mask,
            BitRelation::AllClear => value & mask == 0,
            BitRelation::AnySet => value & mask != 0,
            BitRelation::AnyClear => value & mask != mask,
        }
    }

    fn fold(self, mut bits: impl Iterator<Item = bool>) -> bool {
        match self {
            BitRelation::AllSet => bits.all(|b| b),
            BitRelation::AllClear => bits.all(|b| !b),
            BitRelation::AnySet => bits.any(|b| b),
            BitRelation::AnyClear => bits.any(|b| !b),
        }
    }
}

impl fmt::Display for BitRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

/// Random access to a bit pattern that is constant past `width()`.
pub trait Bits {
    fn bit(&self, position: u64) -> bool;
    /// One past the last explicitly stored bit.
    fn width(&self) -> u64;
}

impl Bits for BitSet {
    fn bit(&self, position: u64) -> bool {
        self.contains(position)
    }
    fn width(&self) -> u64 {
        BitSet::width(self)
    }
}

impl Bits for i64 {
    fn bit(&self, position: u64) -> bool {
        if position < 64 {
            (*self as u64) >> position & 1 == 1
        } else {
            *self < 0
        }
    }
    fn width(&self) -> u64 {
        64
    }
}

impl Bits for [u8] {
    fn bit(&self, position: u64) -> bool {
        usize::try_from(position / 8)
            .ok()
            .and_then(|k| self.get(k))
            .map_or(false, |byte| byte >> (position % 8) & 1 == 1)
    }
    fn width(&self) -> u64 {
        self.len() as u64 * 8
    }
}

pub fn evaluate(relation: BitRelation, mask: &BitSet, value: FieldValue<'_>) -> bool {
    match value {
        FieldValue::Incomparable => false,
        FieldValue::Integer(v) => match mask.word() {
            Some(word) => relation.test_word(word, v as u64),
            None => evaluate_bits(relation, mask, &v),
        },
        FieldValue::Blob(bytes) => evaluate_bits(relation, mask, bytes),
    }
}

/// Evaluate against any bit source. Every set mask bit is visited in ascending order; a
/// sign-extended mask additionally covers its extension up to and including the guard bit.
pub fn evaluate_bits<B: Bits + ?Sized>(relation: BitRelation, mask: &BitSet, value: &B) -> bool {
    let explicit = mask.positions().iter().map(|&p| u64::from(p));
    #[allow(clippy::reversed_empty_ranges)]
    let extension = if mask.is_sign_extended() {
        mask.width()..=mask.width().max(value.width())
    } else {
        1..=0
    };
    relation.fold(explicit.chain(extension).map(|p| value.bit(p)))
}
