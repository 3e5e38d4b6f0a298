use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Compact UTC stamp for terminal headers, e.g. `2025-01-02 10:20 UTC`.
pub(crate) fn format_short_utc(value: OffsetDateTime) -> String {
    let utc = value.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02} UTC",
        utc.year(),
        u8::from(utc.month()),
        utc.day(),
        utc.hour(),
        utc.minute()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn format_offset_preserves_offset() {
        let shifted = datetime!(2025-01-02 10:20:30 UTC).to_offset(UtcOffset::from_hms(3, 0, 0).unwrap());
        assert_eq!(format_offset(shifted), "2025-01-02T13:20:30+03:00");
    }

    #[test]
    fn format_short_utc_normalises_offset() {
        let shifted = datetime!(2025-01-02 23:45:00 -2);
        assert_eq!(format_short_utc(shifted), "2025-01-03 01:45 UTC");
    }
}
