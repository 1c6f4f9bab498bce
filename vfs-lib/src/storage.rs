use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

pub const MAX_TYPE_CHARS: usize = 32;

/// logical namespace that a path is addressed in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum StorageType {
    /// owned by a single user
    Personal,
    /// owned by the tenant and visible to all of its users
    Corporate,
    /// items received from other users
    Shared,
    Custom(String),
}

impl StorageType {
    pub fn as_str(&self) -> &str {
        match self {
            StorageType::Personal => "personal",
            StorageType::Corporate => "corporate",
            StorageType::Shared => "shared",
            StorageType::Custom(name) => name.as_str(),
        }
    }

    pub fn is_tenant_scoped(&self) -> bool {
        matches!(self, StorageType::Corporate)
    }
}

pub fn type_name_valid(given: &str) -> bool {
    !given.is_empty()
        && given.len() <= MAX_TYPE_CHARS
        && given.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
}

#[derive(Debug, thiserror::Error)]
#[error("invalid storage type: \"{0}\"")]
pub struct InvalidStorageType(pub String);

impl FromStr for StorageType {
    type Err = InvalidStorageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();

        match lowered.as_str() {
            "personal" => Ok(StorageType::Personal),
            "corporate" => Ok(StorageType::Corporate),
            "shared" => Ok(StorageType::Shared),
            _ => if type_name_valid(&lowered) {
                Ok(StorageType::Custom(lowered))
            } else {
                Err(InvalidStorageType(s.to_owned()))
            }
        }
    }
}

impl TryFrom<String> for StorageType {
    type Error = InvalidStorageType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StorageType::from_str(&value)
    }
}

impl From<StorageType> for String {
    fn from(storage_type: StorageType) -> String {
        match storage_type {
            StorageType::Custom(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_storage_type() {
        let valid = [
            ("personal", StorageType::Personal),
            ("Corporate", StorageType::Corporate),
            (" shared ", StorageType::Shared),
            ("archive_2", StorageType::Custom(String::from("archive_2"))),
        ];

        for (given, expected) in valid {
            match StorageType::from_str(given) {
                Ok(parsed) => assert_eq!(parsed, expected, "given {:?}", given),
                Err(err) => panic!("valid type failed {:?}: {}", given, err),
            }
        }

        let invalid = [
            "",
            "../up",
            "has space",
            "a/b",
        ];

        for test in invalid {
            assert!(StorageType::from_str(test).is_err(), "invalid type parsed {:?}", test);
        }
    }
}
