use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::Error;

pub type HmacSha256 = Hmac<Sha256>;

/// A Brazilian national identifier (CPF), the unique key voters register with.
///
/// Accepts `123.456.789-09` or the bare eleven digits; both check digits are verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpf {
    digits: [u8; 11],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CpfError {
    #[error("expected `ddd.ddd.ddd-dd`, got '{0}'")]
    Format(String),
    #[error("check digits do not match for '{0}'")]
    CheckDigits(String),
}

impl From<CpfError> for Error {
    fn from(err: CpfError) -> Self {
        Error::InvalidIdentifier(err.to_string())
    }
}

impl Cpf {
    /// Digest this identifier with the given secret, for storage.
    pub fn hmac(&self, secret: &[u8]) -> String {
        let mut hmac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
        hmac.update(&self.digits);
        HEXLOWER.encode(&hmac.finalize().into_bytes())
    }
}

/// Compute a CPF check digit over the given prefix.
fn check_digit(prefix: &[u8]) -> u8 {
    let weight_start = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, &d)| u32::from(d) * (weight_start - i as u32))
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => (11 - r) as u8,
    }
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{3}\.?[0-9]{3}\.?[0-9]{3}-?[0-9]{2}$").unwrap())
}

impl FromStr for Cpf {
    type Err = CpfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !pattern().is_match(s) {
            return Err(CpfError::Format(s.to_string()));
        }
        let mut digits = [0u8; 11];
        for (slot, c) in digits.iter_mut().zip(s.chars().filter(char::is_ascii_digit)) {
            *slot = c as u8 - b'0';
        }
        // Repeated digits pass the checksum but are never issued.
        let all_same = digits.iter().all(|&d| d == digits[0]);
        if all_same
            || check_digit(&digits[..9]) != digits[9]
            || check_digit(&digits[..10]) != digits[10]
        {
            return Err(CpfError::CheckDigits(s.to_string()));
        }
        Ok(Self { digits })
    }
}

impl Display for Cpf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let d: Vec<char> = self.digits.iter().map(|&d| char::from(b'0' + d)).collect();
        write!(
            f,
            "{}{}{}.{}{}{}.{}{}{}-{}{}",
            d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7], d[8], d[9], d[10]
        )
    }
}

impl TryFrom<String> for Cpf {
    type Error = CpfError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cpf> for String {
    fn from(cpf: Cpf) -> Self {
        cpf.to_string()
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Cpf {
        pub fn example() -> Self {
            "529.982.247-25".parse().unwrap()
        }

        pub fn example2() -> Self {
            "111.444.777-35".parse().unwrap()
        }
    }
}
