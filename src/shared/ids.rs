use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-' or '_'"
    ))
}

pub fn validate_token_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(format!("{kind} must not contain whitespace"));
    }
    Ok(())
}

fn normalize_identifier(kind: &str, raw: &str) -> Result<String, String> {
    validate_identifier_value(kind, raw)?;
    Ok(raw.to_string())
}

fn normalize_lowercase_identifier(kind: &str, raw: &str) -> Result<String, String> {
    let lowered = raw.to_ascii_lowercase();
    validate_identifier_value(kind, &lowered)?;
    Ok(lowered)
}

fn normalize_token(kind: &str, raw: &str) -> Result<String, String> {
    validate_token_value(kind, raw)?;
    Ok(raw.to_string())
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal, $normalize:path) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                $normalize($kind, raw).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(PrincipalId, "principal id", normalize_token);
define_id_type!(ChannelId, "channel id", normalize_token);
define_id_type!(RoleName, "role name", normalize_identifier);
define_id_type!(CommandName, "command name", normalize_lowercase_identifier);

pub const VIEWER_ROLE: &str = "viewer";

impl RoleName {
    /// The baseline role that unlocks commands missing from the catalog.
    pub fn viewer() -> Self {
        Self(VIEWER_ROLE.to_string())
    }
}
