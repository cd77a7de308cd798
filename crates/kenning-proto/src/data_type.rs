//! Tensor element data-type codes.
//!
//! Values are stable and chosen to stay cross-tool compatible with DLPack's
//! `DLDataTypeCode`; do not renumber these.

/// A tensor element's data-type code, as carried in [`crate::DataType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataTypeCode {
    /// Signed integer.
    Int = 0,
    /// Unsigned integer.
    Uint = 1,
    /// IEEE-754 floating point.
    Float = 2,
    /// Opaque handle, not a numeric type.
    OpaqueHandle = 3,
    /// Brain floating point.
    Bfloat = 4,
    /// Complex number.
    Complex = 5,
    /// Boolean.
    Bool = 6,
    /// 8-bit float, 3 exponent bits, 4 mantissa bits.
    Float8E3M4 = 7,
    /// 8-bit float, 4 exponent bits, 3 mantissa bits.
    Float8E4M3 = 8,
    /// 8-bit float, 4 exponent bits, 3 mantissa bits, 11-bit bias, no inf/nan.
    Float8E4M3B11Fnuz = 9,
    /// 8-bit float, 4 exponent bits, 3 mantissa bits, finite only.
    Float8E4M3Fn = 10,
    /// 8-bit float, 4 exponent bits, 3 mantissa bits, finite, unsigned zero.
    Float8E4M3Fnuz = 11,
    /// 8-bit float, 5 exponent bits, 2 mantissa bits.
    Float8E5M2 = 12,
    /// 8-bit float, 5 exponent bits, 2 mantissa bits, finite, unsigned zero.
    Float8E5M2Fnuz = 13,
    /// 8-bit float, 8 exponent bits, 0 mantissa bits, unsigned.
    Float8E8M0Fnu = 14,
    /// 6-bit float, 2 exponent bits, 3 mantissa bits, finite only.
    Float6E2M3Fn = 15,
    /// 6-bit float, 3 exponent bits, 2 mantissa bits, finite only.
    Float6E3M2Fn = 16,
    /// 4-bit float, 2 exponent bits, 1 mantissa bit, finite only.
    Float4E2M1Fn = 17,
}

impl DataTypeCode {
    /// Exclusive upper bound on valid data-type codes.
    pub const CODE_END: u8 = 18;
}

impl TryFrom<u8> for DataTypeCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Int),
            1 => Ok(Self::Uint),
            2 => Ok(Self::Float),
            3 => Ok(Self::OpaqueHandle),
            4 => Ok(Self::Bfloat),
            5 => Ok(Self::Complex),
            6 => Ok(Self::Bool),
            7 => Ok(Self::Float8E3M4),
            8 => Ok(Self::Float8E4M3),
            9 => Ok(Self::Float8E4M3B11Fnuz),
            10 => Ok(Self::Float8E4M3Fn),
            11 => Ok(Self::Float8E4M3Fnuz),
            12 => Ok(Self::Float8E5M2),
            13 => Ok(Self::Float8E5M2Fnuz),
            14 => Ok(Self::Float8E8M0Fnu),
            15 => Ok(Self::Float6E2M3Fn),
            16 => Ok(Self::Float6E3M2Fn),
            17 => Ok(Self::Float4E2M1Fn),
            other => Err(other),
        }
    }
}

impl From<DataTypeCode> for u8 {
    fn from(value: DataTypeCode) -> Self {
        value as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_valid_codes() {
        for raw in 0..DataTypeCode::CODE_END {
            let parsed = DataTypeCode::try_from(raw).unwrap();
            assert_eq!(u8::from(parsed), raw);
        }
    }

    #[test]
    fn rejects_code_end_and_beyond() {
        assert!(DataTypeCode::try_from(DataTypeCode::CODE_END).is_err());
        assert!(DataTypeCode::try_from(255).is_err());
    }
}
