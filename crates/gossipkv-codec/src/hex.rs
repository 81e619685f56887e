//! Hex encode/decode helpers for the codec's numeric atoms.
//!
//! Clocks are always non-negative; integer field values are a signed
//! `i64`. The wire grammar has no dedicated negative-number form, so a
//! negative value encodes as a literal `-` followed by the hex
//! magnitude and decodes the same way. Zero is always `"0"`, never
//! `"-0"`.

pub fn encode_u64(n: u64) -> String {
    format!("{n:x}")
}

pub fn decode_u64(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

pub fn encode_i64(n: i64) -> String {
    if n < 0 {
        format!("-{:x}", n.unsigned_abs())
    } else {
        format!("{n:x}")
    }
}

pub fn decode_i64(s: &str) -> Option<i64> {
    if let Some(rest) = s.strip_prefix('-') {
        let magnitude = u64::from_str_radix(rest, 16).ok()?;
        if magnitude == 0 {
            return None; // "-0" is not a valid encoding
        }
        i64::try_from(magnitude).ok().map(|m| -m)
    } else {
        if s.is_empty() {
            return None;
        }
        let magnitude = u64::from_str_radix(s, 16).ok()?;
        i64::try_from(magnitude).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_encodes_as_bare_zero() {
        assert_eq!(encode_u64(0), "0");
        assert_eq!(encode_i64(0), "0");
    }

    #[test]
    fn round_trips_positive_and_negative() {
        assert_eq!(decode_i64(&encode_i64(25)), Some(25));
        assert_eq!(decode_i64(&encode_i64(-25)), Some(-25));
        assert_eq!(decode_u64(&encode_u64(255)), Some(255));
    }

    #[test]
    fn rejects_negative_zero_and_empty() {
        assert_eq!(decode_i64("-0"), None);
        assert_eq!(decode_i64(""), None);
        assert_eq!(decode_u64(""), None);
    }

    #[test]
    fn encodes_twenty_five_as_lowercase_hex_digits() {
        assert_eq!(encode_i64(25), "19");
    }
}
