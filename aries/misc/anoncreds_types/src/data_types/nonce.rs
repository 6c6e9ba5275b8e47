use std::fmt;

use rand::Rng;

/// Decimal nonce binding a request to its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    pub fn new() -> Self {
        // 80 bits, rendered in decimal
        let hi: u64 = rand::thread_rng().gen();
        let lo: u16 = rand::thread_rng().gen();
        let value = ((hi as u128) << 16) | lo as u128;
        Self(value.to_string())
    }

    pub fn from_dec<S: Into<String>>(value: S) -> crate::Result<Self> {
        let value = value.into();
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(crate::Error::from_msg(
                crate::ErrorKind::Conversion,
                format!("Invalid nonce, expected a decimal string: {value}"),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_are_decimal_and_distinct() {
        let a = Nonce::new();
        let b = Nonce::new();
        assert!(Nonce::from_dec(a.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_dec_rejects_hex() {
        assert!(Nonce::from_dec("12ab").is_err());
    }
}
