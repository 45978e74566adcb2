use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt, str::FromStr};

static ACCOUNT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_~.\-]{1,64}$").expect("static regex"));

/// Identifies a peer account. Account ids are also used as link ids and as
/// the last segment of child addresses, so they are restricted to 1-64
/// characters that are valid inside an ILP address segment (plus `.`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// # Panics
    ///
    /// Panics on an invalid id; meant for constants and tests.
    pub fn new(id: &str) -> Self {
        match AccountId::from_str(id) {
            Ok(id) => id,
            Err(err) => panic!("{}", err),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = String;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        if ACCOUNT_ID_PATTERN.is_match(src) {
            Ok(AccountId(src.to_owned()))
        } else {
            Err(format!("Invalid account id: {:?}", src))
        }
    }
}

impl TryFrom<String> for AccountId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if ACCOUNT_ID_PATTERN.is_match(&value) {
            Ok(AccountId(value))
        } else {
            Err(format!("Invalid account id: {:?}", value))
        }
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl AsRef<str> for AccountId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
