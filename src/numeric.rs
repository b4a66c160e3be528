//! Fixed-width ASCII numeric field codec.
//!
//! Every container format in this crate stores numbers as fixed-width
//! ASCII fields; only the radix and the justification differ. Decoding
//! is deliberately lenient, matching legacy archive tolerance: it reads
//! digits until the first byte outside the radix or the end of the
//! field, whichever comes first, and an all-space (or empty) field
//! decodes to zero. No error is ever raised on truncation.
//!
//! Encoders come in two shapes:
//!
//! - left-justified digit emitters ([`dec_encode`], [`oct_encode`]) used
//!   by the space-padded ar header, where the surrounding field is
//!   pre-filled with spaces by the caller;
//! - fixed-width fillers ([`oct_field`], [`hex_field`]) used by the
//!   tar/ustar and SVR4 cpio headers, zero-padded on the left.
//!
//! Encoders do not range-check: callers clamp values to the field
//! maximum (and warn) before encoding.

/// Decode a fixed-width decimal field, stopping at the first non-digit.
pub fn dec_decode(field: &[u8]) -> u64 {
    let mut res: u64 = 0;
    for &c in field {
        if !c.is_ascii_digit() {
            break;
        }
        res = res * 10 + u64::from(c - b'0');
    }
    res
}

/// Decode a fixed-width octal field, stopping at the first byte outside
/// `'0'..='7'`.
pub fn oct_decode(field: &[u8]) -> u64 {
    let mut res: u64 = 0;
    for &c in field {
        if !(b'0'..=b'7').contains(&c) {
            break;
        }
        res = (res << 3) | u64::from(c & 7);
    }
    res
}

/// Decode a fixed-width hexadecimal field (either letter case),
/// stopping at the first non-hex byte.
pub fn hex_decode(field: &[u8]) -> u64 {
    let mut res: u64 = 0;
    for &c in field {
        let digit = match c {
            b'0'..=b'9' => u64::from(c - b'0'),
            b'a'..=b'f' => u64::from(c - b'a' + 10),
            b'A'..=b'F' => u64::from(c - b'A' + 10),
            _ => break,
        };
        res = (res << 4) | digit;
    }
    res
}

/// Emit `val` as decimal digits at the start of `dst`, left-justified,
/// and return the digit count. The rest of the field is left untouched
/// (the caller pre-fills it with the pad byte).
///
/// Iterative buffer-reverse form of the classic recursive itoa; the
/// caller guarantees the value fits the field.
pub fn dec_encode(dst: &mut [u8], mut val: u64) -> usize {
    let mut tmp = [0u8; 20];
    let mut n = 0;
    loop {
        tmp[n] = b'0' + (val % 10) as u8;
        n += 1;
        val /= 10;
        if val == 0 {
            break;
        }
    }
    for i in 0..n {
        dst[i] = tmp[n - 1 - i];
    }
    n
}

/// Emit `val` as octal digits at the start of `dst`, left-justified,
/// returning the digit count. Same contract as [`dec_encode`].
pub fn oct_encode(dst: &mut [u8], mut val: u64) -> usize {
    let mut tmp = [0u8; 22];
    let mut n = 0;
    loop {
        tmp[n] = b'0' | (val & 7) as u8;
        n += 1;
        val >>= 3;
        if val == 0 {
            break;
        }
    }
    for i in 0..n {
        dst[i] = tmp[n - 1 - i];
    }
    n
}

/// Fill a tar-style octal field: zero-padded digits right-justified in
/// `dst[..len-1]`, with a NUL terminator in the last byte.
///
/// Returns `false` when the value does not fit in `len - 1` digits; the
/// field is left unmodified in that case so the caller can clamp or
/// skip the member.
pub fn oct_field(dst: &mut [u8], val: u64) -> bool {
    let digits = dst.len() - 1;
    if val > max_octal(digits) {
        return false;
    }
    dst[digits] = 0;
    let mut v = val;
    for i in (0..digits).rev() {
        dst[i] = b'0' | (v & 7) as u8;
        v >>= 3;
    }
    true
}

/// Fill an old-cpio octal field: exactly `dst.len()` zero-padded
/// digits, no terminator.
///
/// Returns `false` (field untouched) when the value does not fit.
pub fn oct_field_full(dst: &mut [u8], val: u64) -> bool {
    if val > max_octal(dst.len()) {
        return false;
    }
    let mut v = val;
    for i in (0..dst.len()).rev() {
        dst[i] = b'0' | (v & 7) as u8;
        v >>= 3;
    }
    true
}

/// Fill an SVR4 cpio hex field: exactly `dst.len()` lowercase hex
/// digits, zero-padded. The caller guarantees the value fits.
pub fn hex_field(dst: &mut [u8], val: u64) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut v = val;
    for i in (0..dst.len()).rev() {
        dst[i] = HEX[(v & 0xf) as usize];
        v >>= 4;
    }
}

/// Largest value representable in `digits` octal digits.
pub const fn max_octal(digits: usize) -> u64 {
    if digits >= 21 {
        u64::MAX
    } else {
        (1u64 << (3 * digits)) - 1
    }
}

/// Largest value representable in `digits` decimal digits.
pub const fn max_decimal(digits: usize) -> u64 {
    let mut max: u64 = 0;
    let mut i = 0;
    while i < digits && max < u64::MAX / 10 {
        max = max * 10 + 9;
        i += 1;
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_all_spaces_is_zero() {
        assert_eq!(dec_decode(b"      "), 0);
        assert_eq!(oct_decode(b"      "), 0);
        assert_eq!(hex_decode(b"        "), 0);
    }

    #[test]
    fn test_decode_stops_at_first_non_digit() {
        assert_eq!(dec_decode(b"123 456"), 123);
        assert_eq!(dec_decode(b"99x99"), 99);
        // '8' is not an octal digit
        assert_eq!(oct_decode(b"1785"), 0o17);
        assert_eq!(hex_decode(b"ffzz"), 0xff);
    }

    #[test]
    fn test_decode_respects_field_width() {
        assert_eq!(dec_decode(&b"123456"[..3]), 123);
        assert_eq!(oct_decode(&b"777777"[..2]), 0o77);
    }

    #[test]
    fn test_dec_encode_left_justified() {
        let mut field = [b' '; 10];
        let n = dec_encode(&mut field, 1234);
        assert_eq!(n, 4);
        assert_eq!(&field, b"1234      ");
    }

    #[test]
    fn test_dec_encode_zero() {
        let mut field = [b' '; 6];
        assert_eq!(dec_encode(&mut field, 0), 1);
        assert_eq!(&field, b"0     ");
    }

    #[test]
    fn test_oct_encode_left_justified() {
        let mut field = [b' '; 8];
        let n = oct_encode(&mut field, 0o644);
        assert_eq!(n, 3);
        assert_eq!(&field, b"644     ");
    }

    #[test]
    fn test_oct_field_zero_padded_with_nul() {
        let mut field = [0xffu8; 8];
        assert!(oct_field(&mut field, 0o644));
        assert_eq!(&field, b"0000644\0");
    }

    #[test]
    fn test_oct_field_overflow_leaves_field_alone() {
        let mut field = [b'x'; 4];
        assert!(!oct_field(&mut field, 0o1000));
        assert_eq!(&field, b"xxxx");
        assert!(oct_field(&mut field, 0o777));
        assert_eq!(&field, b"777\0");
    }

    #[test]
    fn test_oct_field_full_no_terminator() {
        let mut field = [0u8; 6];
        assert!(oct_field_full(&mut field, 0o70707));
        assert_eq!(&field, b"070707");
        assert!(!oct_field_full(&mut field, 0o1000000));
        assert_eq!(&field, b"070707");
    }

    #[test]
    fn test_hex_field_fixed_width() {
        let mut field = [0u8; 8];
        hex_field(&mut field, 0x1a2b);
        assert_eq!(&field, b"00001a2b");
    }

    #[test]
    fn test_field_maxima() {
        assert_eq!(max_octal(7), 0o7777777);
        assert_eq!(max_octal(8), 0o77777777);
        assert_eq!(max_decimal(6), 999_999);
        assert_eq!(max_decimal(10), 9_999_999_999);
        assert_eq!(max_decimal(12), 999_999_999_999);
    }

    #[test]
    fn test_round_trip_through_field_width() {
        let mut field = [b' '; 12];
        let n = dec_encode(&mut field, 999_999_999_999);
        assert_eq!(n, 12);
        assert_eq!(dec_decode(&field), 999_999_999_999);
    }
}
