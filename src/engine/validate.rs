use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Parse and bound a `[start, end)` stay from wire strings.
pub fn validate_range(start: &str, end: &str) -> Result<StayRange, EngineError> {
    let start_date = parse_date(start)
        .ok_or_else(|| EngineError::validation(format!("start date {start:?} is not YYYY-MM-DD")))?;
    let end_date = parse_date(end)
        .ok_or_else(|| EngineError::validation(format!("end date {end:?} is not YYYY-MM-DD")))?;
    let range = StayRange::try_new(start_date, end_date)
        .ok_or_else(|| EngineError::validation("end date must be after start date"))?;
    check_stay_len(&range)?;
    Ok(range)
}

pub(crate) fn check_stay_len(range: &StayRange) -> Result<(), EngineError> {
    if range.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::validation(format!(
            "stay of {} nights exceeds the {MAX_STAY_NIGHTS}-night limit",
            range.nights()
        )));
    }
    Ok(())
}

/// Trimmed non-empty value of a required field.
pub(crate) fn required<'a>(field: &str, value: &'a str, max_len: usize) -> Result<&'a str, EngineError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(EngineError::validation(format!("missing {field}")));
    }
    check_len(field, v, max_len)?;
    Ok(v)
}

pub(crate) fn check_len(field: &str, value: &str, max_len: usize) -> Result<(), EngineError> {
    if value.chars().count() > max_len {
        return Err(EngineError::validation(format!("{field} longer than {max_len} characters")));
    }
    Ok(())
}
