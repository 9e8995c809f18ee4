//! Field accessors for fixed-layout on-disk records.
//!
//! The record type must own a `data` byte buffer; each invocation expands to
//! a getter named after the field.

macro_rules! define_field {
    (u8, $offset:expr, $name:ident) => {
        paste::paste! {
            #[doc = "Get u8 from the " $name " field"]
            pub fn $name(&self) -> u8 {
                self.data.get($offset).copied().unwrap_or(0)
            }
        }
    };

    (u16, $offset:expr, $name:ident) => {
        paste::paste! {
            #[doc = "Get little-endian u16 from the " $name " field"]
            pub fn $name(&self) -> u16 {
                u16::from_le_bytes(self.data[$offset..$offset + 2].try_into().unwrap_or([0; 2]))
            }
        }
    };

    (be16, $offset:expr, $name:ident) => {
        paste::paste! {
            #[doc = "Get big-endian u16 from the " $name " field"]
            pub fn $name(&self) -> u16 {
                u16::from_be_bytes(self.data[$offset..$offset + 2].try_into().unwrap_or([0; 2]))
            }
        }
    };

    (u32, $offset:expr, $name:ident) => {
        paste::paste! {
            #[doc = "Get little-endian u32 from the " $name " field"]
            pub fn $name(&self) -> u32 {
                u32::from_le_bytes(self.data[$offset..$offset + 4].try_into().unwrap_or([0; 4]))
            }
        }
    };

    ([u8; $len:expr], $offset:expr, $name:ident) => {
        paste::paste! {
            #[doc = "Get `&[u8]` from the " $name " field"]
            pub fn $name(&self) -> &[u8] {
                &self.data[$offset..$offset + $len]
            }

            #[doc = "Get the " $name " field as text, stopping at the first NUL"]
            pub fn [<$name _str>](&self) -> alloc::string::String {
                $crate::common::shift_jis(&self.data[$offset..$offset + $len])
            }
        }
    };
}
