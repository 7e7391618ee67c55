use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which local principals may send to a receive endpoint.
///
/// The level maps to permission bits on the queue's socket file. Enforcement
/// is left to the operating system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Any local user.
    None,
    /// Owner and group.
    #[default]
    Standard,
    /// Owner only.
    Admin,
}

impl SecurityLevel {
    /// Permission mode applied to the socket file.
    pub fn socket_mode(self) -> u32 {
        match self {
            SecurityLevel::None => 0o666,
            SecurityLevel::Standard => 0o660,
            SecurityLevel::Admin => 0o600,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::None => "none",
            SecurityLevel::Standard => "standard",
            SecurityLevel::Admin => "admin",
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SecurityLevel::None),
            "standard" => Ok(SecurityLevel::Standard),
            "admin" => Ok(SecurityLevel::Admin),
            other => Err(format!("unknown security level '{other}'")),
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_narrow_with_level() {
        assert_eq!(SecurityLevel::None.socket_mode(), 0o666);
        assert_eq!(SecurityLevel::Standard.socket_mode(), 0o660);
        assert_eq!(SecurityLevel::Admin.socket_mode(), 0o600);
    }

    #[test]
    fn parses_names() {
        for level in [
            SecurityLevel::None,
            SecurityLevel::Standard,
            SecurityLevel::Admin,
        ] {
            assert_eq!(level.as_str().parse::<SecurityLevel>(), Ok(level));
        }
        assert!("root".parse::<SecurityLevel>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&SecurityLevel::Admin).unwrap(), r#""admin""#);
        let level: SecurityLevel = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(level, SecurityLevel::None);
        assert!(serde_json::from_str::<SecurityLevel>(r#""Admin""#).is_err());
    }
}
