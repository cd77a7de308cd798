//! The 16-bit flags field.
//!
//! The original represents this as a C union of two packed bitfield structs
//! over the same `u16` (general-purpose flags, and an IOSPEC-specific
//! overlay). Rust has no safe packed-bitfield union matching that, so
//! `Flags` wraps the raw `u16` and exposes both views as plain accessors
//! over the same bits.

/// Bit position of each general-purpose flag within the 16-bit field.
mod bit {
    pub const SUCCESS: u16 = 0;
    pub const FAIL: u16 = 1;
    pub const IS_HOST_MESSAGE: u16 = 2;
    pub const HAS_PAYLOAD: u16 = 3;
    pub const FIRST: u16 = 4;
    pub const LAST: u16 = 5;
    pub const IS_KENNING: u16 = 6;
    pub const IS_ZEPHYR: u16 = 7;
    // bits 8..12 reserved for future general-purpose use.
    pub const IOSPEC_SERIALIZED: u16 = 12;
}

/// The message header's 16-bit flags field.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u16);

impl Flags {
    /// The all-zero flags value.
    pub const EMPTY: Self = Self(0);

    /// Wrap a raw 16-bit flags value.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw 16-bit value.
    #[must_use]
    pub fn raw(self) -> u16 {
        self.0
    }

    fn get(self, bit: u16) -> bool {
        self.0 & (1 << bit) != 0
    }

    fn set(&mut self, bit: u16, value: bool) {
        if value {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }

    /// The handler reported success.
    #[must_use]
    pub fn success(self) -> bool {
        self.get(bit::SUCCESS)
    }

    /// Set the success flag.
    pub fn set_success(&mut self, value: bool) {
        self.set(bit::SUCCESS, value);
    }

    /// The handler reported failure.
    #[must_use]
    pub fn fail(self) -> bool {
        self.get(bit::FAIL)
    }

    /// Set the fail flag.
    pub fn set_fail(&mut self, value: bool) {
        self.set(bit::FAIL, value);
    }

    /// Origin marker: this message was sent by the host, not the device.
    #[must_use]
    pub fn is_host_message(self) -> bool {
        self.get(bit::IS_HOST_MESSAGE)
    }

    /// Set the host-message origin marker.
    pub fn set_is_host_message(&mut self, value: bool) {
        self.set(bit::IS_HOST_MESSAGE, value);
    }

    /// The message carries a non-empty payload.
    #[must_use]
    pub fn has_payload(self) -> bool {
        self.get(bit::HAS_PAYLOAD)
    }

    /// Set the has-payload flag.
    pub fn set_has_payload(&mut self, value: bool) {
        self.set(bit::HAS_PAYLOAD, value);
    }

    /// This is the first frame of a fragmented transmission.
    #[must_use]
    pub fn first(self) -> bool {
        self.get(bit::FIRST)
    }

    /// Set the first-fragment flag.
    pub fn set_first(&mut self, value: bool) {
        self.set(bit::FIRST, value);
    }

    /// This is the last frame of a fragmented transmission.
    #[must_use]
    pub fn last(self) -> bool {
        self.get(bit::LAST)
    }

    /// Set the last-fragment flag.
    pub fn set_last(&mut self, value: bool) {
        self.set(bit::LAST, value);
    }

    /// Origin marker used by the Kenning host tooling.
    #[must_use]
    pub fn is_kenning(self) -> bool {
        self.get(bit::IS_KENNING)
    }

    /// Set the `is_kenning` marker.
    pub fn set_is_kenning(&mut self, value: bool) {
        self.set(bit::IS_KENNING, value);
    }

    /// Origin marker the dispatcher sets on every response it emits.
    ///
    /// Named after the original firmware's OS target; the wire bit position
    /// and meaning are unchanged even though this implementation is not
    /// Zephyr-specific.
    #[must_use]
    pub fn is_zephyr(self) -> bool {
        self.get(bit::IS_ZEPHYR)
    }

    /// Set the `is_zephyr` origin marker.
    pub fn set_is_zephyr(&mut self, value: bool) {
        self.set(bit::IS_ZEPHYR, value);
    }

    /// IOSPEC-specific overlay bit: the spec payload is in serialized form.
    #[must_use]
    pub fn iospec_serialized(self) -> bool {
        self.get(bit::IOSPEC_SERIALIZED)
    }

    /// Set the IOSPEC `serialized` overlay bit.
    pub fn set_iospec_serialized(&mut self, value: bool) {
        self.set(bit::IOSPEC_SERIALIZED, value);
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flags")
            .field("raw", &format_args!("{:#06x}", self.0))
            .field("success", &self.success())
            .field("fail", &self.fail())
            .field("has_payload", &self.has_payload())
            .field("first", &self.first())
            .field("last", &self.last())
            .finish_non_exhaustive()
    }
}
