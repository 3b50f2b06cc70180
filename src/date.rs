//! `YYMMDD` date prefixes on media filenames ("220908_Artist_Title.mp4").

use std::path::Path;

/// Days in a month for a two-digit year.
/// Every `YY % 4 == 0` counts as a leap year; there is no century handling.
pub fn days_in_month(yy: u32, mm: u32) -> Option<u32> {
    let days = match mm {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if yy % 4 == 0 => 29,
        2 => 28,
        _ => return None,
    };
    Some(days)
}

/// Extract the leading `YYMMDD` token from a filename.
/// Directories are ignored. Returns `None` unless the first six characters
/// of the file name are digits forming a valid date.
pub fn extract_date(filename: &str) -> Option<String> {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    let prefix = base.get(..6)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| prefix[range].parse::<u32>().ok();
    let (yy, mm, dd) = (field(0..2)?, field(2..4)?, field(4..6)?);

    let max_day = days_in_month(yy, mm)?;
    if dd == 0 || dd > max_day {
        return None;
    }

    Some(prefix.to_string())
}
