//! Endian-aware conversion trait for the primitive types AMF carries.

/// Trait for implementing type-specific safe binary conversion operations.
///
/// This trait provides a unified interface for converting primitive types to
/// and from byte arrays in both little-endian and big-endian formats. It is
/// implemented for every fixed-width type the AMF wire formats and the
/// [`crate::ByteArray`] primitives need, ensuring type safety and consistent
/// behavior across all binary access.
///
/// Each implementation defines a `Bytes` associated type representing the
/// fixed-size byte array for that particular type (e.g. `[u8; 8]` for `f64`).
pub trait AmfIo: Sized {
    /// Associated type representing the byte array type for this numeric type.
    ///
    /// This type must be convertible from a byte slice and is used for reading
    /// binary data in both little-endian and big-endian formats.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]> + AsRef<[u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_amf_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl AmfIo for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_amf_io! {
    u8 => 1, i8 => 1,
    u16 => 2, i16 => 2,
    u32 => 4, i32 => 4,
    u64 => 8, i64 => 8,
    f32 => 4, f64 => 8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_be<T: AmfIo + PartialEq + Copy + std::fmt::Debug>(value: T) {
        assert_eq!(T::from_be_bytes(value.to_be_bytes()), value);
    }

    fn round_trip_le<T: AmfIo + PartialEq + Copy + std::fmt::Debug>(value: T) {
        assert_eq!(T::from_le_bytes(value.to_le_bytes()), value);
    }

    #[test]
    fn integer_round_trips() {
        round_trip_be(0x12u8);
        round_trip_be(-1i8);
        round_trip_be(0x1234u16);
        round_trip_be(-1234i16);
        round_trip_be(0x1234_5678u32);
        round_trip_be(i32::MIN);
        round_trip_be(0x0123_4567_89AB_CDEFu64);
        round_trip_be(i64::MIN);
        round_trip_le(0x1234u16);
        round_trip_le(0x1234_5678u32);
    }

    #[test]
    fn float_byte_order() {
        assert_eq!(
            1.0f64.to_be_bytes(),
            [0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(1.0f32.to_be_bytes(), [0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(1.0f32.to_le_bytes(), [0x00, 0x00, 0x80, 0x3F]);
    }
}
