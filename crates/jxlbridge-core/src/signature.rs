//! Format sniffing.

/// Signature of a bare codestream.
pub const CODESTREAM_SIGNATURE: [u8; 2] = [0xFF, 0x0A];

/// Signature box that opens the ISO-BMFF container.
pub const CONTAINER_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, b'J', b'X', b'L', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];

/// Check whether `data` starts like a JPEG XL file.
///
/// Accepts a bare codestream, or any box stream whose first box type is
/// `JXL `. Nothing past the signature is validated.
pub fn is_jxl(data: &[u8]) -> bool {
    data.starts_with(&CODESTREAM_SIGNATURE) || data.get(4..8) == Some(&CONTAINER_SIGNATURE[4..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codestream() {
        assert!(is_jxl(&[0xFF, 0x0A, 0x00]));
        assert!(!is_jxl(&[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn test_container() {
        assert!(is_jxl(&CONTAINER_SIGNATURE));
        // Only the box type is checked
        assert!(is_jxl(b"\x00\x00\x00\x20JXL rest"));
    }

    #[test]
    fn test_short_input() {
        assert!(!is_jxl(&[]));
        assert!(!is_jxl(&[0xFF]));
        assert!(!is_jxl(b"\x00\x00\x00\x0CJX"));
    }
}
