//! Packed model specification (the IOSPEC payload).
//!
//! Bit-exact copy of the structure transmitted by the host; field order and
//! padding must match across host and device, so this is a zerocopy packed
//! struct rather than a serde type.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Maximum number of input tensors.
pub const MAX_IN: usize = 2;
/// Maximum number of output tensors.
pub const MAX_OUT: usize = 12;
/// Maximum number of dimensions per tensor.
pub const MAX_DIM: usize = 4;
/// Maximum length, in bytes, of the entry-function and model-name fields.
pub const MAX_NAME: usize = 20;

/// A tensor element's type: a data-type code paired with its bit width.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, PartialEq, Eq)]
pub struct DataType {
    /// Data-type code, drawn from [`crate::DataTypeCode`]'s closed set.
    pub code: u8,
    /// Bit width of one element. Must be a multiple of 8.
    pub bits: u8,
}

impl std::fmt::Debug for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataType").field("code", &self.code).field("bits", &self.bits).finish()
    }
}

/// The packed model specification.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ModelSpec {
    /// Number of input tensors, in `[1, MAX_IN]`.
    pub num_input: u8,
    /// Number of dimensions for each input tensor.
    pub num_input_dim: [u8; MAX_IN],
    /// Shape of each input tensor (only the first `num_input_dim[i]` entries
    /// of each row are meaningful).
    pub input_shape: [[u32; MAX_DIM]; MAX_IN],
    /// Element type of each input tensor.
    pub input_data_type: [DataType; MAX_IN],
    /// Number of output tensors, in `[1, MAX_OUT]`.
    pub num_output: u8,
    /// Number of dimensions for each output tensor.
    pub num_output_dim: [u8; MAX_OUT],
    /// Shape of each output tensor.
    pub output_shape: [[u32; MAX_DIM]; MAX_OUT],
    /// Element type of each output tensor.
    pub output_data_type: [DataType; MAX_OUT],
    /// Entry function name, NUL-padded ASCII.
    pub entry_func: [u8; MAX_NAME],
    /// Model name, NUL-padded ASCII.
    pub model_name: [u8; MAX_NAME],
}

impl ModelSpec {
    /// Size of the serialized structure in bytes.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Parse a model spec from an exact-length byte slice.
    ///
    /// Returns `None` if `bytes.len() != Self::SIZE`, mirroring the wire
    /// contract that a received IOSPEC payload of any other length is
    /// rejected outright before structural validation runs.
    #[must_use]
    pub fn from_exact_bytes(bytes: &[u8]) -> Option<Self> {
        Self::read_from_bytes(bytes).ok()
    }

    /// Serialize to the fixed-size wire form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn ascii_field(field: &[u8; MAX_NAME]) -> String {
        let end = field.iter().position(|&b| b == 0).unwrap_or(MAX_NAME);
        String::from_utf8_lossy(&field[..end]).into_owned()
    }

    /// The entry-function name, with trailing NUL padding stripped.
    #[must_use]
    pub fn entry_func_str(&self) -> String {
        Self::ascii_field(&self.entry_func)
    }

    /// The model name, with trailing NUL padding stripped.
    #[must_use]
    pub fn model_name_str(&self) -> String {
        Self::ascii_field(&self.model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let short = vec![0u8; ModelSpec::SIZE - 1];
        assert!(ModelSpec::from_exact_bytes(&short).is_none());

        let long = vec![0u8; ModelSpec::SIZE + 1];
        assert!(ModelSpec::from_exact_bytes(&long).is_none());
    }

    #[test]
    fn round_trips_exact_length() {
        let bytes = vec![0u8; ModelSpec::SIZE];
        let spec = ModelSpec::from_exact_bytes(&bytes).expect("exact length parses");
        assert_eq!(spec.to_bytes(), bytes);
    }

    #[test]
    fn strips_nul_padding_from_name_fields() {
        let mut bytes = vec![0u8; ModelSpec::SIZE];
        let mut spec = ModelSpec::from_exact_bytes(&bytes).unwrap();
        spec.model_name[..5].copy_from_slice(b"mnist");
        bytes = spec.to_bytes();
        let reparsed = ModelSpec::from_exact_bytes(&bytes).unwrap();
        assert_eq!(reparsed.model_name_str(), "mnist");
    }
}
