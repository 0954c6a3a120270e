//! Strongly typed platform identifiers enforced across the broker domain.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "u64", into = "u64")]
		pub struct $name(u64);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: u64) -> Result<Self, IdentifierError> {
				validate_value($kind, value)?;

				Ok(Self(value))
			}

			/// Returns the raw numeric identifier.
			pub const fn get(self) -> u64 {
				self.0
			}
		}
		impl Deref for $name {
			type Target = u64;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl From<$name> for u64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<u64> for $name {
			type Error = IdentifierError;

			fn try_from(value: u64) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}", self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let view = s.trim().trim_matches('"');
				let value = view
					.parse::<u64>()
					.map_err(|_| IdentifierError::NotNumeric { kind: $kind, value: s.to_owned() })?;

				Self::new(value)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was zero, which the platform never issues.
	#[error("{kind} identifier cannot be zero.")]
	Zero {
		/// Kind of identifier (partner, shop).
		kind: &'static str,
	},
	/// The identifier is not a decimal integer.
	#[error("{kind} identifier `{value}` is not a decimal integer.")]
	NotNumeric {
		/// Kind of identifier (partner, shop).
		kind: &'static str,
		/// Rejected input.
		value: String,
	},
}

def_id! { PartnerId, "Platform-issued application identifier.", "Partner" }
def_id! { ShopId, "Identifier of the merchant shop being accessed.", "Shop" }

fn validate_value(kind: &'static str, value: u64) -> Result<(), IdentifierError> {
	if value == 0 {
		return Err(IdentifierError::Zero { kind });
	}

	Ok(())
}
