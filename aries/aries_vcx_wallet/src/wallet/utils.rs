use sha2::{Digest, Sha256};

/// The customary credential attribute encoding: 32-bit integers encode as themselves, any
/// other value as the decimal rendering of its SHA-256 digest read as a big-endian integer.
pub fn encode_attribute_value(raw: &str) -> String {
    if let Ok(value) = raw.parse::<i32>() {
        return value.to_string();
    }
    let digest = Sha256::digest(raw.as_bytes());
    bytes_to_decimal(&digest)
}

/// Big-endian unsigned integer to decimal, by repeated division over base-256 digits.
fn bytes_to_decimal(bytes: &[u8]) -> String {
    let mut digits: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if digits.is_empty() {
        return "0".to_owned();
    }

    let mut decimal = Vec::new();
    while !digits.is_empty() {
        let mut remainder: u32 = 0;
        let mut quotient = Vec::with_capacity(digits.len());
        for digit in &digits {
            let acc = (remainder << 8) | u32::from(*digit);
            let q = (acc / 10) as u8;
            remainder = acc % 10;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q);
            }
        }
        decimal.push(b'0' + remainder as u8);
        digits = quotient;
    }
    decimal.reverse();
    String::from_utf8_lossy(&decimal).into_owned()
}
