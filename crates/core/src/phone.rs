//! Phone number validation and recipient address normalization.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Domain appended to a digits-only number to form a recipient address.
pub const USER_DOMAIN: &str = "@s.whatsapp.net";

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[0-9]+$").expect("phone pattern compiles"));

/// A validated phone number in pairing form: digits only, no leading `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
	/// Accepts `^\+?\d+$` and strips the leading `+`.
	pub fn parse(raw: &str) -> Result<Self> {
		if !PHONE_PATTERN.is_match(raw) {
			return Err(Error::InvalidPhoneNumber);
		}
		Ok(Self(raw.trim_start_matches('+').to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PhoneNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Keeps only the ASCII digits of `number` and appends [`USER_DOMAIN`].
pub fn recipient_jid(number: &str) -> Result<String> {
	let digits: String = number.chars().filter(char::is_ascii_digit).collect();
	if digits.is_empty() {
		return Err(Error::InvalidRecipient(number.to_string()));
	}
	Ok(format!("{digits}{USER_DOMAIN}"))
}
