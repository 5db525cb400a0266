use chrono::NaiveDate;

use crate::files::Country;

/// Validate worker count: must be between 1 and 64.
pub fn validate_workers(s: &str) -> Result<usize, String> {
    let value = s
        .parse::<usize>()
        .map_err(|_| format!("invalid number: {}", s))?;

    if value == 0 {
        return Err("workers must be at least 1".to_string());
    }

    if value > 64 {
        return Err("workers cannot exceed 64".to_string());
    }

    Ok(value)
}

/// Validate page cap: must be between 1 and 10000.
pub fn validate_page_cap(s: &str) -> Result<usize, String> {
    let value = s
        .parse::<usize>()
        .map_err(|_| format!("invalid number: {}", s))?;

    if value == 0 {
        return Err("max pages must be at least 1".to_string());
    }

    if value > 10_000 {
        return Err("max pages cannot exceed 10000".to_string());
    }

    Ok(value)
}

/// Validate a market code (`uk`, `DE`, ...); returns it lower-cased.
pub fn validate_country(s: &str) -> Result<String, String> {
    let country = s
        .parse::<Country>()
        .map_err(|_| format!("unknown country code: {}", s))?;
    Ok(country.code())
}

/// Validate a `YYYY-MM-DD` date.
pub fn validate_date(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("date must be YYYY-MM-DD: {}", s))?;
    Ok(s.to_string())
}

/// Validate a snapshot stamp in `MM_DD_YY` form.
pub fn validate_stamp(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s, "%m_%d_%y")
        .map_err(|_| format!("stamp must be MM_DD_YY: {}", s))?;
    Ok(s.to_string())
}
