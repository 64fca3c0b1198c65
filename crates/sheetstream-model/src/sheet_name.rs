use thiserror::Error;

/// Maximum length of a worksheet name, in UTF-16 code units.
pub const EXCEL_MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetNameError {
    #[error("sheet name cannot be empty")]
    Empty,
    #[error("sheet name cannot exceed 31 characters")]
    TooLong,
    #[error("sheet name contains invalid character `{0}`")]
    InvalidCharacter(char),
    #[error("sheet name cannot begin or end with an apostrophe")]
    LeadingOrTrailingApostrophe,
    #[error("sheet name already exists: {0}")]
    Duplicate(String),
}

/// Validate a worksheet name against Excel's rules.
///
/// Uniqueness is a workbook-level concern and is checked by [`crate::Workbook::add_sheet`].
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.is_empty() {
        return Err(SheetNameError::Empty);
    }
    if name.encode_utf16().count() > EXCEL_MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong);
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(SheetNameError::InvalidCharacter(ch));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::LeadingOrTrailingApostrophe);
    }
    Ok(())
}

/// Excel treats sheet names case-insensitively (`Sheet1` and `SHEET1` collide).
pub fn sheet_name_eq_case_insensitive(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_excel_forbidden_names() {
        assert_eq!(validate_sheet_name(""), Err(SheetNameError::Empty));
        assert_eq!(
            validate_sheet_name("Q1/Q2"),
            Err(SheetNameError::InvalidCharacter('/'))
        );
        assert_eq!(
            validate_sheet_name("'quoted'"),
            Err(SheetNameError::LeadingOrTrailingApostrophe)
        );
        assert_eq!(
            validate_sheet_name(&"x".repeat(32)),
            Err(SheetNameError::TooLong)
        );
        assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
        assert!(validate_sheet_name("Budget 2024 (draft)").is_ok());
    }

    #[test]
    fn case_insensitive_comparison_handles_unicode() {
        assert!(sheet_name_eq_case_insensitive("Sheet1", "SHEET1"));
        assert!(sheet_name_eq_case_insensitive("Übersicht", "übersicht"));
        assert!(!sheet_name_eq_case_insensitive("Sheet1", "Sheet2"));
    }
}
