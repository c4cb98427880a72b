//! Parser for FTP `LIST` output.
//!
//! Two formats are understood:
//!
//! ```text
//! -rw-r--r--   1 owner group     5120 Mar 14 09:26 Quarterly report.pdf
//! drwxr-xr-x   2 owner group     4096 Dec 31  2023 archive
//! 03-14-24  09:26AM                 5120 Quarterly report.pdf
//! 12-31-23  11:00PM       <DIR>          archive
//! ```
//!
//! Lines that match neither (`total 12`, banners) are skipped.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use super::{EntryKind, RemoteEntry};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse every recognizable line of a listing.
///
/// `now` resolves Unix dates that omit the year.
pub fn parse_listing<S: AsRef<str>>(lines: &[S], now: DateTime<Utc>) -> Vec<RemoteEntry> {
    lines
        .iter()
        .filter_map(|line| parse_line(line.as_ref(), now))
        .collect()
}

/// Parse a single listing line.
pub fn parse_line(line: &str, now: DateTime<Utc>) -> Option<RemoteEntry> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if line.trim().is_empty() {
        return None;
    }
    parse_unix(line, now).or_else(|| parse_dos(line))
}

/// Byte spans of whitespace-separated tokens.
fn token_spans(line: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len()));
    }
    spans
}

fn month_index(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}

fn parse_unix(line: &str, now: DateTime<Utc>) -> Option<RemoteEntry> {
    let spans = token_spans(line);
    let token = |i: usize| spans.get(i).map(|&(s, e)| &line[s..e]);

    let perms = token(0)?;
    if perms.len() < 10 {
        return None;
    }
    let kind = match perms.chars().next()? {
        '-' => EntryKind::File,
        'd' => EntryKind::Directory,
        'l' => EntryKind::Symlink,
        'b' | 'c' | 'p' | 's' => EntryKind::Other,
        _ => return None,
    };

    // The date starts at the first month token preceded by a size, which
    // handles listings with and without a group column.
    let month_at = (3..spans.len().saturating_sub(3)).find(|&i| {
        month_index(token(i).unwrap_or_default()).is_some()
            && token(i - 1).is_some_and(|t| t.parse::<u64>().is_ok())
    })?;

    let size = token(month_at - 1)?.parse::<u64>().ok();
    let month = month_index(token(month_at)?)?;
    let day: u32 = token(month_at + 1)?.parse().ok()?;
    let modified = unix_timestamp(month, day, token(month_at + 2)?, now);

    let name_start = spans.get(month_at + 3)?.0;
    let mut name = &line[name_start..];
    if kind == EntryKind::Symlink {
        if let Some((link, _target)) = name.split_once(" -> ") {
            name = link;
        }
    }

    Some(RemoteEntry {
        name: name.to_string(),
        kind,
        size,
        modified,
    })
}

fn unix_timestamp(month: u32, day: u32, year_or_time: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some((h, m)) = year_or_time.split_once(':') {
        let time = NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)?;
        let at = |year: i32| {
            NaiveDate::from_ymd_opt(year, month, day)
                .map(|d| Utc.from_utc_datetime(&d.and_time(time)))
        };
        let candidate = at(now.year())?;
        // Servers print HH:MM for the last six months; a date ahead of now
        // belongs to the previous year.
        if candidate > now + Duration::days(1) {
            at(now.year() - 1)
        } else {
            Some(candidate)
        }
    } else {
        let year: i32 = year_or_time.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
    }
}

fn parse_dos(line: &str) -> Option<RemoteEntry> {
    let spans = token_spans(line);
    if spans.len() < 4 {
        return None;
    }
    let token = |i: usize| &line[spans[i].0..spans[i].1];

    let date = parse_dos_date(token(0))?;
    let time = parse_dos_time(token(1))?;

    let (kind, size) = match token(2) {
        t if t.eq_ignore_ascii_case("<DIR>") => (EntryKind::Directory, None),
        t => (EntryKind::File, Some(t.parse::<u64>().ok()?)),
    };

    Some(RemoteEntry {
        name: line[spans[3].0..].to_string(),
        kind,
        size,
        modified: Some(Utc.from_utc_datetime(&date.and_time(time))),
    })
}

fn parse_dos_date(token: &str) -> Option<NaiveDate> {
    let mut parts = token.split('-');
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;
    let year = match (year_part.len(), year) {
        (2, y) if y < 70 => 2000 + y,
        (2, y) => 1900 + y,
        (4, y) => y,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_dos_time(token: &str) -> Option<NaiveTime> {
    let upper = token.to_ascii_uppercase();
    let (clock, pm) = if let Some(t) = upper.strip_suffix("PM") {
        (t, Some(true))
    } else if let Some(t) = upper.strip_suffix("AM") {
        (t, Some(false))
    } else {
        (upper.as_str(), None)
    };

    let (h, m) = clock.split_once(':')?;
    let mut hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    match pm {
        Some(true) if hour < 12 => hour += 12,
        Some(false) if hour == 12 => hour = 0,
        _ => {}
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unix_file_with_time() {
        let entry = parse_line(
            "-rw-r--r--   1 owner group     5120 Mar 14 09:26 report.pdf",
            now(),
        )
        .unwrap();
        assert_eq!(entry.name, "report.pdf");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, Some(5120));
        assert_eq!(
            entry.modified,
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 0).unwrap())
        );
    }

    #[test]
    fn test_unix_time_in_future_rolls_back_a_year() {
        let entry = parse_line(
            "-rw-r--r--   1 owner group     10 Nov  2 18:00 old.png",
            now(),
        )
        .unwrap();
        assert_eq!(
            entry.modified,
            Some(Utc.with_ymd_and_hms(2023, 11, 2, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unix_with_year_and_no_group() {
        let entry = parse_line("-rw-r--r-- 1 ftp 77 Dec 31 2022 budget.xlsx", now()).unwrap();
        assert_eq!(entry.name, "budget.xlsx");
        assert_eq!(entry.size, Some(77));
        assert_eq!(
            entry.modified,
            Some(Utc.with_ymd_and_hms(2022, 12, 31, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unix_name_with_spaces() {
        let entry = parse_line(
            "-rw-r--r--   1 owner group  12 Jan  5  2024 Q1  summary final.doc",
            now(),
        )
        .unwrap();
        assert_eq!(entry.name, "Q1  summary final.doc");
    }

    #[test]
    fn test_unix_owner_named_like_a_month() {
        let entry = parse_line(
            "-rw-r--r--   1 may   staff   300 Feb 10 10:00 notes.doc",
            now(),
        )
        .unwrap();
        assert_eq!(entry.name, "notes.doc");
        assert_eq!(entry.size, Some(300));
    }

    #[test]
    fn test_unix_directory_and_symlink() {
        let dir = parse_line("drwxr-xr-x 2 u g 4096 Jan 01 2024 archive", now()).unwrap();
        assert_eq!(dir.kind, EntryKind::Directory);
        assert_eq!(dir.name, "archive");

        let link = parse_line(
            "lrwxrwxrwx 1 u g 9 Jan 01 2024 latest.pdf -> report.pdf",
            now(),
        )
        .unwrap();
        assert_eq!(link.kind, EntryKind::Symlink);
        assert_eq!(link.name, "latest.pdf");
    }

    #[test]
    fn test_dos_entries() {
        let file = parse_line("03-14-24  09:26PM                 5120 Quarterly report.pdf", now())
            .unwrap();
        assert_eq!(file.name, "Quarterly report.pdf");
        assert_eq!(file.kind, EntryKind::File);
        assert_eq!(file.size, Some(5120));
        assert_eq!(
            file.modified,
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 21, 26, 0).unwrap())
        );

        let dir = parse_line("12-31-99  12:05AM       <DIR>          legacy", now()).unwrap();
        assert_eq!(dir.kind, EntryKind::Directory);
        assert_eq!(dir.size, None);
        assert_eq!(
            dir.modified,
            Some(Utc.with_ymd_and_hms(1999, 12, 31, 0, 5, 0).unwrap())
        );
    }

    #[test]
    fn test_unrecognized_lines_are_skipped() {
        let lines = [
            "total 12",
            "",
            "-rw-r--r-- 1 u g 1 Jan 01 2024 a.pdf\r",
            "garbage line here",
        ];
        let entries = parse_listing(&lines, now());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.pdf");
    }
}
