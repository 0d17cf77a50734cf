//! Tenor values used to express the settlement period of an FX forward,
//! swap, or NDF leg.

use crate::error::{BidFxError, Result};

pub const BROKEN_DATE: &str = "BD";
pub const TODAY: &str = "TOD";
pub const TOMORROW: &str = "TOM";
pub const SPOT: &str = "Spot";
pub const SPOT_NEXT: &str = "S/N";

pub const IN_1_WEEK: &str = "1W";
pub const IN_2_WEEKS: &str = "2W";
pub const IN_3_WEEKS: &str = "3W";

pub const IN_1_MONTH: &str = "1M";
pub const IN_2_MONTHS: &str = "2M";
pub const IN_3_MONTHS: &str = "3M";
pub const IN_4_MONTHS: &str = "4M";
pub const IN_5_MONTHS: &str = "5M";
pub const IN_6_MONTHS: &str = "6M";
pub const IN_7_MONTHS: &str = "7M";
pub const IN_8_MONTHS: &str = "8M";
pub const IN_9_MONTHS: &str = "9M";
pub const IN_10_MONTHS: &str = "10M";
pub const IN_11_MONTHS: &str = "11M";
pub const IN_18_MONTHS: &str = "18M";
pub const IN_30_MONTHS: &str = "30M";

pub const IN_1_YEAR: &str = "1Y";
pub const IN_2_YEARS: &str = "2Y";
pub const IN_3_YEARS: &str = "3Y";
pub const IN_4_YEARS: &str = "4Y";
pub const IN_5_YEARS: &str = "5Y";

pub const IMM_MARCH: &str = "IMMH";
pub const IMM_JUNE: &str = "IMMM";
pub const IMM_SEPTEMBER: &str = "IMMU";
pub const IMM_DECEMBER: &str = "IMMZ";

/// The weekly tenor of the given number of weeks (1-3).
pub fn of_week(week: u32) -> Result<&'static str> {
    match week {
        1 => Ok(IN_1_WEEK),
        2 => Ok(IN_2_WEEKS),
        3 => Ok(IN_3_WEEKS),
        other => Err(BidFxError::invalid_subject(format!("invalid weekly tenor of {other} weeks"))),
    }
}

/// The monthly tenor of the given number of months.
pub fn of_month(month: u32) -> Result<&'static str> {
    match month {
        1 => Ok(IN_1_MONTH),
        2 => Ok(IN_2_MONTHS),
        3 => Ok(IN_3_MONTHS),
        4 => Ok(IN_4_MONTHS),
        5 => Ok(IN_5_MONTHS),
        6 => Ok(IN_6_MONTHS),
        7 => Ok(IN_7_MONTHS),
        8 => Ok(IN_8_MONTHS),
        9 => Ok(IN_9_MONTHS),
        10 => Ok(IN_10_MONTHS),
        11 => Ok(IN_11_MONTHS),
        18 => Ok(IN_18_MONTHS),
        30 => Ok(IN_30_MONTHS),
        other => Err(BidFxError::invalid_subject(format!("invalid monthly tenor of {other} months"))),
    }
}

/// The yearly tenor of the given number of years (1-5).
pub fn of_year(year: u32) -> Result<&'static str> {
    match year {
        1 => Ok(IN_1_YEAR),
        2 => Ok(IN_2_YEARS),
        3 => Ok(IN_3_YEARS),
        4 => Ok(IN_4_YEARS),
        5 => Ok(IN_5_YEARS),
        other => Err(BidFxError::invalid_subject(format!("invalid yearly tenor of {other} years"))),
    }
}

/// The IMM-contract tenor coinciding with the given calendar month (3, 6, 9, or 12).
pub fn of_imm_month(month: u32) -> Result<&'static str> {
    match month {
        3 => Ok(IMM_MARCH),
        6 => Ok(IMM_JUNE),
        9 => Ok(IMM_SEPTEMBER),
        12 => Ok(IMM_DECEMBER),
        other => Err(BidFxError::invalid_subject(format!("invalid IMM monthly tenor for month {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_tenors() {
        assert_eq!(of_week(1).unwrap(), IN_1_WEEK);
        assert_eq!(of_week(3).unwrap(), IN_3_WEEKS);
        assert!(of_week(4).is_err());
    }

    #[test]
    fn imm_tenors_reject_non_quarter_months() {
        assert_eq!(of_imm_month(3).unwrap(), IMM_MARCH);
        assert_eq!(of_imm_month(12).unwrap(), IMM_DECEMBER);
        assert!(of_imm_month(1).is_err());
    }
}
