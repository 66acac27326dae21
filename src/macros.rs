//! # Internal Macros
//!
//! Boilerplate reduction for zerocopy header structs.
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for header fields stored as
//! little-endian wrapper types (`U32`, `U64`):
//!
//! ```ignore
//! use zerocopy::little_endian::{U32, U64};
//!
//! #[repr(C)]
//! struct NodeHeader {
//!     numkeys: U64,
//!     blocksize: U32,
//! }
//!
//! impl NodeHeader {
//!     zerocopy_accessors! {
//!         numkeys: u64,
//!         blocksize: u32,
//!     }
//! }
//!
//! // Generates:
//! // pub fn numkeys(&self) -> u64 { self.numkeys.get() }
//! // pub fn set_numkeys(&mut self, val: u64) { self.numkeys = U64::new(val); }
//! // ...
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    (@impl $field:ident, u64) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field = ::zerocopy::little_endian::U64::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
