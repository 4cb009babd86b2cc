//! Canonical instance and volume names
//!
//! Names end up as host names, file names in the ledger tree and DNS labels,
//! so the base name is restricted to characters safe in all three.

use crate::error::{CoreError, Result};

/// Characters that are never allowed in a base name
const FORBIDDEN_CHARS: &[char] = &[
    '.', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '+', '=', // subdomain-unsafe
    '/', '\\', ':', '?', '"', '<', '>', '|', // path/file-name reserved
];

/// Canonical instance name: `{base}-{env}-{location}`, lowercased
pub fn instance_name(base: &str, environment: &str, location: &str) -> Result<String> {
    validate_base(base)?;
    Ok(format!("{}-{}-{}", base, environment, location).to_lowercase())
}

/// Canonical volume name: `{base}-{env}-{location}-{drive}`, lowercased
pub fn volume_name(
    base: &str,
    environment: &str,
    drive_letter: char,
    location: &str,
) -> Result<String> {
    validate_base(base)?;
    check_drive_letter(drive_letter)?;
    Ok(format!("{}-{}-{}-{}", base, environment, location, drive_letter).to_lowercase())
}

/// Drive letters must be ASCII letters
pub fn check_drive_letter(drive_letter: char) -> Result<()> {
    if !drive_letter.is_ascii_alphabetic() {
        return Err(CoreError::InvalidName {
            name: drive_letter.to_string(),
            reason: "drive letter must be an ASCII letter".to_string(),
        });
    }
    Ok(())
}

fn validate_base(base: &str) -> Result<()> {
    let invalid = |reason: &str| CoreError::InvalidName {
        name: base.to_string(),
        reason: reason.to_string(),
    };

    if base.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if base.starts_with('-') || base.ends_with('-') {
        return Err(invalid("name must not start or end with '-'"));
    }
    if let Some(c) = base
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_whitespace() || c.is_control())
    {
        return Err(invalid(&format!("character {:?} is not allowed", c)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_name_is_deterministic() {
        let first = instance_name("web-1", "prod", "us-east").unwrap();
        let second = instance_name("web-1", "prod", "us-east").unwrap();
        assert_eq!(first, "web-1-prod-us-east");
        assert_eq!(first, second);
    }

    #[test]
    fn test_instance_name_lowercases() {
        assert_eq!(
            instance_name("Web", "Prod", "US-East-1a").unwrap(),
            "web-prod-us-east-1a"
        );
    }

    #[test]
    fn test_rejects_dash_edges() {
        assert!(instance_name("-bad", "prod", "us-east").is_err());
        assert!(instance_name("bad-", "prod", "us-east").is_err());
    }

    #[test]
    fn test_rejects_unsafe_characters() {
        let unsafe_names = [
            "has.dot", "a!b", "a@b", "a#b", "a$b", "a%b", "a^b", "a&b", "a*b", "a(b", "a)b",
            "a+b", "a=b", "a/b", "a\\b", "a:b", "a?b", "a\"b", "a<b", "a>b", "a|b", "a b",
            "a\tb",
        ];
        for base in unsafe_names {
            let err = instance_name(base, "prod", "us-east").unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidName { .. }),
                "{base} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert!(instance_name("", "prod", "us-east").is_err());
        assert!(instance_name("   ", "prod", "us-east").is_err());
    }

    #[test]
    fn test_volume_name() {
        assert_eq!(
            volume_name("db", "prod", 'D', "us-east-1a").unwrap(),
            "db-prod-us-east-1a-d"
        );
        assert!(volume_name("db", "prod", '1', "us-east-1a").is_err());
        assert!(volume_name("has.dot", "prod", 'd', "us-east-1a").is_err());
    }
}
