//! Fixed inputs for the phone validation scenarios.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneCase {
	pub input: &'static str,
	pub description: &'static str,
}

pub const INVALID_PHONE_NUMBERS: [PhoneCase; 3] = [
	PhoneCase {
		input: "1234",
		description: "4 digits (too short)",
	},
	PhoneCase {
		input: "ab",
		description: "alphabetic characters",
	},
	PhoneCase {
		input: "!@",
		description: "special characters",
	},
];

pub const VALID_PHONE_NUMBER: PhoneCase = PhoneCase {
	input: "0123456789",
	description: "10 digits (valid phone number)",
};

pub const INVALID_PHONE_MESSAGE: &str = "Please enter a valid phone number";
