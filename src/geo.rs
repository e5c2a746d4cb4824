//! Administrative code normalization for geographic joins.
//!
//! Boundary files key departments and regions by INSEE codes with their own
//! padding conventions. These helpers bring dataset codes onto that keying:
//! Corsica keeps its `2A`/`2B` letters, metropolitan departments use two
//! digits, the overseas range (970-989) three, and regions two.

/// Normalizes a department code for joining against boundary geometries.
pub fn normalize_dept_code(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_uppercase();
    if trimmed == "2A" || trimmed == "2B" {
        return trimmed;
    }
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let Ok(code) = digits.parse::<u32>() else {
        return trimmed;
    };
    if (970..=989).contains(&code) {
        format!("{code:03}")
    } else {
        format!("{code:02}")
    }
}

/// Normalizes a region code to the two-digit INSEE form, tolerating
/// float-shaped strings such as `"11.0"`.
pub fn normalize_region_code(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => format!("{:02}", value as i64),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corsica_codes_round_trip_unchanged() {
        assert_eq!(normalize_dept_code("2A"), "2A");
        assert_eq!(normalize_dept_code(" 2b "), "2B");
    }

    #[test]
    fn department_codes_zero_fill_by_range() {
        assert_eq!(normalize_dept_code("1"), "01");
        assert_eq!(normalize_dept_code("099"), "99");
        assert_eq!(normalize_dept_code("971"), "971");
        assert_eq!(normalize_dept_code("975"), "975");
        assert_eq!(normalize_dept_code("x"), "X");
    }

    #[test]
    fn region_codes_normalize_to_two_digits() {
        assert_eq!(normalize_region_code("84"), "84");
        assert_eq!(normalize_region_code("4"), "04");
        assert_eq!(normalize_region_code("11.0"), "11");
        assert_eq!(normalize_region_code("corse"), "corse");
        assert_eq!(normalize_region_code(""), "");
    }
}
