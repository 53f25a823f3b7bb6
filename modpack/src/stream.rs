//! Little-endian primitive codecs shared by every record of a package.
//!
//! The traits are blanket-implemented for all `Read` / `Write` types so the
//! same functions work over byte slices, files and the compressed stream
//! wrappers used by the container.

use crate::Error;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;
use std::io::{Read, Write};

/// Maximum byte length of a short string (16-bit length prefix).
pub const MAX_SHORT_STRING: usize = u16::MAX as usize;

/// Maximum byte length of a long string or blob (32-bit length prefix).
pub const MAX_LONG_STRING: usize = u32::MAX as usize;

macro_rules! read_int {
    ($($name:ident => $typ:ty, $inner:ident;)+) => {
        $(
            #[inline]
            fn $name(&mut self) -> Result<$typ, Error> {
                Ok(self.$inner::<LittleEndian>()?)
            }
        )+
    };
}

macro_rules! write_int {
    ($($name:ident => $typ:ty, $inner:ident;)+) => {
        $(
            #[inline]
            fn $name(&mut self, value: $typ) -> Result<(), Error> {
                Ok(self.$inner::<LittleEndian>(value)?)
            }
        )+
    };
}

/// Decoding side of the primitive codecs.
pub trait ReadPrimitives: Read {
    #[inline]
    fn read_u8_le(&mut self) -> Result<u8, Error> {
        Ok(ReadBytesExt::read_u8(self)?)
    }

    #[inline]
    fn read_i8_le(&mut self) -> Result<i8, Error> {
        Ok(ReadBytesExt::read_i8(self)?)
    }

    read_int! {
        read_u16_le => u16, read_u16;
        read_u32_le => u32, read_u32;
        read_u64_le => u64, read_u64;
        read_u128_le => u128, read_u128;
        read_i16_le => i16, read_i16;
        read_i32_le => i32, read_i32;
        read_i64_le => i64, read_i64;
        read_i128_le => i128, read_i128;
        read_f32_le => f32, read_f32;
        read_f64_le => f64, read_f64;
    }

    #[inline]
    fn read_f16_le(&mut self) -> Result<f16, Error> {
        Ok(f16::from_bits(self.read_u16_le()?))
    }

    /// Reads a single byte. Any non-zero value is `true`.
    #[inline]
    fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8_le()? != 0)
    }

    /// Reads exactly `len` bytes. The buffer grows with the data actually
    /// present so a corrupted length cannot force a huge allocation up front.
    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        let read = (&mut *self).take(len as u64).read_to_end(&mut buf)?;
        if read != len {
            return Err(Error::Truncated);
        }
        Ok(buf)
    }

    /// Reads a blob with a 32-bit length prefix.
    fn read_blob(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.read_u32_le()? as usize;
        self.read_exact_vec(len)
    }

    /// Reads an utf-8 string with a 16-bit length prefix.
    fn read_short_string(&mut self) -> Result<String, Error> {
        let len = self.read_u16_le()? as usize;
        String::from_utf8(self.read_exact_vec(len)?).map_err(|_| Error::InvalidUtf8)
    }

    /// Reads an utf-8 string with a 32-bit length prefix.
    fn read_long_string(&mut self) -> Result<String, Error> {
        String::from_utf8(self.read_blob()?).map_err(|_| Error::InvalidUtf8)
    }
}

/// Encoding side of the primitive codecs.
pub trait WritePrimitives: Write {
    #[inline]
    fn write_u8_le(&mut self, value: u8) -> Result<(), Error> {
        Ok(WriteBytesExt::write_u8(self, value)?)
    }

    #[inline]
    fn write_i8_le(&mut self, value: i8) -> Result<(), Error> {
        Ok(WriteBytesExt::write_i8(self, value)?)
    }

    write_int! {
        write_u16_le => u16, write_u16;
        write_u32_le => u32, write_u32;
        write_u64_le => u64, write_u64;
        write_u128_le => u128, write_u128;
        write_i16_le => i16, write_i16;
        write_i32_le => i32, write_i32;
        write_i64_le => i64, write_i64;
        write_i128_le => i128, write_i128;
        write_f32_le => f32, write_f32;
        write_f64_le => f64, write_f64;
    }

    #[inline]
    fn write_f16_le(&mut self, value: f16) -> Result<(), Error> {
        self.write_u16_le(value.to_bits())
    }

    /// Writes `1` for `true` and `0` for `false`.
    #[inline]
    fn write_bool(&mut self, value: bool) -> Result<(), Error> {
        self.write_u8_le(value as u8)
    }

    /// Writes a blob with a 32-bit length prefix.
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let len = checked_len(bytes.len(), MAX_LONG_STRING)?;
        self.write_u32_le(len as u32)?;
        Ok(self.write_all(bytes)?)
    }

    /// Writes an utf-8 string with a 16-bit length prefix. Fails without
    /// writing anything when the string is longer than 65535 bytes.
    fn write_short_string(&mut self, value: &str) -> Result<(), Error> {
        let len = checked_len(value.len(), MAX_SHORT_STRING)?;
        self.write_u16_le(len as u16)?;
        Ok(self.write_all(value.as_bytes())?)
    }

    /// Writes an utf-8 string with a 32-bit length prefix.
    fn write_long_string(&mut self, value: &str) -> Result<(), Error> {
        self.write_blob(value.as_bytes())
    }
}

impl<R: Read + ?Sized> ReadPrimitives for R {}

impl<W: Write + ?Sized> WritePrimitives for W {}

#[inline]
fn checked_len(len: usize, max: usize) -> Result<usize, Error> {
    if len > max {
        return Err(Error::TooLong { len, max });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use crate::stream::{ReadPrimitives, WritePrimitives, MAX_SHORT_STRING};
    use crate::Error;
    use half::f16;
    use matches::assert_matches;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_integers_are_little_endian() {
        let mut bytes = Vec::new();
        bytes.write_u16_le(0x0102).unwrap();
        bytes.write_u32_le(0x0304_0506).unwrap();
        bytes.write_i64_le(-2).unwrap();

        assert_eq!(&bytes[0..2], &[0x02, 0x01]);
        assert_eq!(&bytes[2..6], &[0x06, 0x05, 0x04, 0x03]);
        assert_eq!(&bytes[6..14], &[0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_wide_and_float_values() {
        let mut bytes = Vec::new();
        bytes.write_u128_le(u128::MAX - 7).unwrap();
        bytes.write_i128_le(i128::MIN).unwrap();
        bytes.write_f16_le(f16::from_f32(1.5)).unwrap();
        bytes.write_f32_le(-0.25).unwrap();
        bytes.write_f64_le(std::f64::consts::PI).unwrap();
        assert_eq!(bytes.len(), 16 + 16 + 2 + 4 + 8);

        let mut slice = bytes.as_slice();
        assert_eq!(slice.read_u128_le().unwrap(), u128::MAX - 7);
        assert_eq!(slice.read_i128_le().unwrap(), i128::MIN);
        assert_eq!(slice.read_f16_le().unwrap(), f16::from_f32(1.5));
        assert_eq!(slice.read_f32_le().unwrap(), -0.25);
        assert_eq!(slice.read_f64_le().unwrap(), std::f64::consts::PI);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_bool_decodes_any_non_zero_as_true() {
        let bytes = [0u8, 1, 2, 255];
        let mut slice = &bytes[..];

        assert!(!slice.read_bool().unwrap());
        assert!(slice.read_bool().unwrap());
        assert!(slice.read_bool().unwrap());
        assert!(slice.read_bool().unwrap());

        let mut out = Vec::new();
        out.write_bool(true).unwrap();
        out.write_bool(false).unwrap();
        assert_eq!(out, vec![1, 0]);
    }

    #[test]
    fn test_short_string_prefix_counts_bytes() {
        let mut bytes = Vec::new();
        bytes.write_short_string("žaba").unwrap();

        // 'ž' takes two bytes in utf-8
        assert_eq!(&bytes[0..2], &[5, 0]);
        assert_eq!((&bytes[..]).read_short_string().unwrap(), "žaba");
    }

    #[test]
    fn test_short_string_too_long() {
        let long = "a".repeat(MAX_SHORT_STRING + 1);
        let mut bytes = Vec::new();

        assert_matches!(
            bytes.write_short_string(&long),
            Err(Error::TooLong { len, max }) if len == MAX_SHORT_STRING + 1 && max == MAX_SHORT_STRING
        );
        assert!(bytes.is_empty());

        let longest = "a".repeat(MAX_SHORT_STRING);
        bytes.write_short_string(&longest).unwrap();
        assert_eq!(bytes.len(), 2 + MAX_SHORT_STRING);
    }

    #[test]
    fn test_short_reads_are_truncated() {
        assert_matches!((&[1u8][..]).read_u32_le(), Err(Error::Truncated));
        assert_matches!((&[][..]).read_bool(), Err(Error::Truncated));
        // declares ten bytes, carries three
        assert_matches!(
            (&[10u8, 0, 0, 0, 1, 2, 3][..]).read_blob(),
            Err(Error::Truncated)
        );
        assert_matches!(
            (&[4u8, 0, b'a', b'b'][..]).read_short_string(),
            Err(Error::Truncated)
        );
    }

    #[test]
    fn test_invalid_utf8() {
        assert_matches!(
            (&[2u8, 0, 0xC3, 0x28][..]).read_short_string(),
            Err(Error::InvalidUtf8)
        );
        assert_matches!(
            (&[1u8, 0, 0, 0, 0xFF][..]).read_long_string(),
            Err(Error::InvalidUtf8)
        );
    }

    #[quickcheck]
    fn test_random_strings_and_blobs(short: String, long: String, blob: Vec<u8>) -> bool {
        if short.len() > MAX_SHORT_STRING {
            return true;
        }

        let mut bytes = Vec::new();
        bytes.write_short_string(&short).unwrap();
        bytes.write_long_string(&long).unwrap();
        bytes.write_blob(&blob).unwrap();

        let mut slice = bytes.as_slice();
        slice.read_short_string().unwrap() == short
            && slice.read_long_string().unwrap() == long
            && slice.read_blob().unwrap() == blob
            && slice.is_empty()
    }
}
