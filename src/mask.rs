//! Mask module: parses and normalizes the right-hand operand of a bit test.
//!
//! A [`MaskSpec`] is what the query said; a [`BitSet`] is the canonical form every relation is
//! evaluated against. Normalization happens once per compiled query.

use crate::options::DEFAULT_MAX_BIT_POSITION;
use crate::types::{Value, ValueType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("bit positions must be >= 0 but got: {position}")]
    NegativePosition { position: i64 },
    #[error("bit position {position} is larger than the maximum of {max}")]
    PositionOutOfRange { position: i64, max: u32 },
    #[error("bit positions must be integers but got an element of type {found}")]
    BadPositionType { found: ValueType },
    #[error("bitmask {value} is not representable as a 64-bit integer")]
    NotRepresentable { value: f64 },
    #[error("takes an array of bit positions, a 64-bit integer bitmask or a binData bitmask, but got type {found}")]
    BadOperandType { found: ValueType },
}

/// The operand of a bit test before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskSpec {
    /// A 64-bit two's-complement bitmask.
    Integer(i64),
    /// Bit positions, bit 0 being the least significant. Validated by [`MaskSpec::normalize`].
    Positions(Vec<i64>),
    /// Byte `k` supplies bits `8k..8k+7`.
    Blob(Vec<u8>),
}

/// Converts an integral double to i64, or `None` if it has a fraction or does not fit.
pub(crate) fn exact_i64(d: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX as f64 rounds up to it.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if d.is_finite() && d.fract() == 0.0 && d >= -LIMIT && d < LIMIT {
        Some(d as i64)
    } else {
        None
    }
}

impl MaskSpec {
    /// Classify a wire-level operand.
    pub fn from_operand(operand: &Value) -> Result<MaskSpec, ValidationError> {
        match operand {
            Value::Int(n) => Ok(MaskSpec::Integer(*n)),
            Value::Double(d) => exact_i64(*d)
                .map(MaskSpec::Integer)
                .ok_or(ValidationError::NotRepresentable { value: *d }),
            Value::Array(items) => {
                let positions = items
                    .iter()
                    .map(|item| match item {
                        Value::Int(i) => Ok(*i),
                        Value::Double(d) => exact_i64(*d).ok_or(ValidationError::BadPositionType {
                            found: ValueType::Double,
                        }),
                        other => Err(ValidationError::BadPositionType { found: other.get_type() }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MaskSpec::Positions(positions))
            }
            Value::Binary(bin) => Ok(MaskSpec::Blob(bin.bytes.clone())),
            other => Err(ValidationError::BadOperandType { found: other.get_type() }),
        }
    }

    pub fn normalize(&self) -> Result<BitSet, ValidationError> {
        self.normalize_with_limit(DEFAULT_MAX_BIT_POSITION)
    }

    pub fn normalize_with_limit(&self, max_position: u32) -> Result<BitSet, ValidationError> {
        match self {
            MaskSpec::Integer(n) => Ok(BitSet::from_i64(*n)),
            MaskSpec::Positions(raw) => {
                let mut positions = Vec::with_capacity(raw.len());
                for &position in raw {
                    if position < 0 {
                        return Err(ValidationError::NegativePosition { position });
                    }
                    match u32::try_from(position) {
                        Ok(p) if p <= max_position => positions.push(p),
                        _ => {
                            return Err(ValidationError::PositionOutOfRange {
                                position,
                                max: max_position,
                            })
                        }
                    }
                }
                Ok(BitSet::from_positions(positions))
            }
            MaskSpec::Blob(bytes) => Ok(BitSet::from_bytes(bytes)),
        }
    }
}

/// Canonical bit set: the sorted set bit positions below `width`, and a sign-extension flag
/// giving the value of every bit at or above `width`.
///
/// Only negative integers sign-extend. Trailing explicit bits equal to the extension are folded
/// into it, so equal bit patterns always compare equal regardless of how they were written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitSet {
    positions: Vec<u32>,
    width: u64,
    sign_extended: bool,
    // Low 64 bits including extension, when every explicit bit sits below 64.
    word: Option<u64>,
}

impl BitSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_i64(n: i64) -> Self {
        let bits = n as u64;
        let positions = (0..64u32).filter(|&p| bits >> p & 1 == 1).collect();
        Self::canonical(positions, 64, n < 0)
    }

    pub fn from_positions(positions: impl IntoIterator<Item = u32>) -> Self {
        let mut positions: Vec<u32> = positions.into_iter().collect();
        positions.sort_unstable();
        positions.dedup();
        let width = positions.last().map_or(0, |&p| u64::from(p) + 1);
        Self::canonical(positions, width, false)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let positions = bytes
            .iter()
            .enumerate()
            .flat_map(|(k, byte)| {
                (0..8u32).filter(move |&b| *byte >> b & 1 == 1).map(move |b| k as u32 * 8 + b)
            })
            .collect::<Vec<_>>();
        let width = positions.last().map_or(0, |&p| u64::from(p) + 1);
        Self::canonical(positions, width, false)
    }

    fn canonical(mut positions: Vec<u32>, mut width: u64, sign_extended: bool) -> Self {
        if sign_extended {
            while width > 0 && positions.last().map(|&p| u64::from(p)) == Some(width - 1) {
                positions.pop();
                width -= 1;
            }
        } else {
            width = positions.last().map_or(0, |&p| u64::from(p) + 1);
        }
        let low: u64 = positions.iter().filter(|&&p| p < 64).fold(0u64, |acc, &p| acc | 1u64 << p);
        let word = if sign_extended {
            // A sign-extended set always comes from an i64, so width < 64 here.
            Some(low | (!0u64).checked_shl(width as u32).unwrap_or(0))
        } else if width <= 64 {
            Some(low)
        } else {
            None
        };
        Self { positions, width, sign_extended, word }
    }

    /// Sorted, de-duplicated explicit set positions.
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Every set position a 64-bit reader would see: the explicit positions, plus `width..64`
    /// when sign-extended.
    pub fn set_positions(&self) -> Vec<u32> {
        let mut all = self.positions.clone();
        if self.sign_extended {
            all.extend(self.width as u32..64);
        }
        all
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn is_sign_extended(&self) -> bool {
        self.sign_extended
    }

    /// True when no bit at all is set, i.e. every relation degenerates to its vacuous case.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && !self.sign_extended
    }

    pub fn contains(&self, position: u64) -> bool {
        if position >= self.width {
            return self.sign_extended;
        }
        u32::try_from(position).map_or(false, |p| self.positions.binary_search(&p).is_ok())
    }

    pub(crate) fn word(&self) -> Option<u64> {
        self.word
    }

    /// Express this set back as an operand. Normalizing the result yields `self` again.
    pub fn to_mask_spec(&self) -> MaskSpec {
        match self.word {
            Some(word) if self.sign_extended => MaskSpec::Integer(word as i64),
            _ => MaskSpec::Positions(self.positions.iter().map(|&p| i64::from(p)).collect()),
        }
    }
}
