//! Client-side form validation errors

use chrono::NaiveDate;
use validator::ValidationErrors;

/// A form was rejected before anything was sent
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("invalid {section}: {errors}")]
    Fields {
        section: &'static str,
        errors: ValidationErrors,
    },
    #[error("missing required field: {0}")]
    Missing(&'static str),
    #[error("end date {end} is before start date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },
    #[error("invalid subdomain '{0}': use lowercase letters, digits and hyphens")]
    Subdomain(String),
    #[error("nothing to update")]
    EmptyUpdate,
}

impl FormError {
    pub fn fields(section: &'static str) -> impl FnOnce(ValidationErrors) -> Self {
        move |errors| FormError::Fields { section, errors }
    }
}

/// DNS-label rules: 1-63 chars of `[a-z0-9-]`, no leading/trailing hyphen
pub fn is_valid_subdomain(subdomain: &str) -> bool {
    !subdomain.is_empty()
        && subdomain.len() <= 63
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-')
        && subdomain
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub fn check_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), FormError> {
    if end < start {
        return Err(FormError::DateRange { start, end });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdomain_rules() {
        assert!(is_valid_subdomain("acme"));
        assert!(is_valid_subdomain("acme-2"));
        assert!(!is_valid_subdomain(""));
        assert!(!is_valid_subdomain("-acme"));
        assert!(!is_valid_subdomain("Acme"));
        assert!(!is_valid_subdomain("acme.io"));
        assert!(!is_valid_subdomain(&"a".repeat(64)));
    }

    #[test]
    fn test_date_range() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(check_date_range(start, end).is_ok());
        assert!(check_date_range(start, start).is_ok());
        assert!(matches!(
            check_date_range(end, start),
            Err(FormError::DateRange { .. })
        ));
    }
}
