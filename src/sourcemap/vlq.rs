//! Base64 VLQ codec used by the `mappings` field.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const SHIFT: u32 = 5;
const CONTINUATION: u32 = 1 << SHIFT;
const MASK: u32 = CONTINUATION - 1;

/// Append the VLQ encoding of `value` to `out`.
pub fn encode(value: i64, out: &mut String) {
    let mut vlq: u64 = if value < 0 {
        ((value.unsigned_abs()) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & u64::from(MASK)) as u32;
        vlq >>= SHIFT;
        if vlq > 0 {
            digit |= CONTINUATION;
        }
        out.push(char::from(ALPHABET[digit as usize]));
        if vlq == 0 {
            break;
        }
    }
}

/// Decode every VLQ value of one segment (`AAgBC` -> `[0, 0, 32, 1]`).
pub fn decode_segment(segment: &str) -> Option<Vec<i64>> {
    let mut values = Vec::with_capacity(5);
    let mut acc: u64 = 0;
    let mut shift = 0u32;
    for byte in segment.bytes() {
        let digit = u64::from(decode_digit(byte)?);
        if shift > 60 {
            return None;
        }
        acc |= (digit & u64::from(MASK)) << shift;
        if digit & u64::from(CONTINUATION) != 0 {
            shift += SHIFT;
            continue;
        }
        let negative = acc & 1 == 1;
        let magnitude = (acc >> 1) as i64;
        values.push(if negative { -magnitude } else { magnitude });
        acc = 0;
        shift = 0;
    }
    // dangling continuation bit
    if shift != 0 {
        return None;
    }
    Some(values)
}

fn decode_digit(byte: u8) -> Option<u32> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(u32::from(value))
}
