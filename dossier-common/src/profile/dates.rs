//! Record dates at year(+month) granularity
//!
//! Extraction output spells dates in many ways ("2021-03", "Mar 2021",
//! "03/2021", "2021", "Present"). Everything is read leniently into
//! [`EntryDate`] and written back in one canonical form: `YYYY`, `YYYY-MM`
//! or `Present`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Calendar year with an optional month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u8>,
}

impl PartialDate {
    pub fn year(year: i32) -> Self {
        Self { year, month: None }
    }

    pub fn year_month(year: i32, month: u8) -> Self {
        Self {
            year,
            month: Some(month),
        }
    }

    /// True when the month is known.
    pub fn has_month(&self) -> bool {
        self.month.is_some()
    }
}

impl Ord for PartialDate {
    /// A year-only date sorts after every month of the same year; an
    /// unknown month is treated as "some time up to December".
    fn cmp(&self, other: &Self) -> Ordering {
        self.year
            .cmp(&other.year)
            .then_with(|| self.month.unwrap_or(13).cmp(&other.month.unwrap_or(13)))
    }
}

impl PartialOrd for PartialDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(month) => write!(f, "{:04}-{:02}", self.year, month),
            None => write!(f, "{:04}", self.year),
        }
    }
}

/// True unless both ends are concrete dates and the end precedes the start.
///
/// Year-only dates compare loosely against months in the same year.
pub fn range_is_ordered(start: Option<EntryDate>, end: Option<EntryDate>) -> bool {
    match (
        start.and_then(|d| d.as_date()),
        end.and_then(|d| d.as_date()),
    ) {
        (Some(start), Some(end)) => {
            start.year < end.year
                || (start.year == end.year
                    && (start.month.is_none() || end.month.is_none() || start <= end))
        }
        _ => true,
    }
}

/// A start or end date on a record entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryDate {
    /// Ongoing ("Present", "Current", "Now")
    Present,
    Date(PartialDate),
}

impl EntryDate {
    pub fn is_present(&self) -> bool {
        matches!(self, EntryDate::Present)
    }

    pub fn as_date(&self) -> Option<PartialDate> {
        match self {
            EntryDate::Date(d) => Some(*d),
            EntryDate::Present => None,
        }
    }

    /// Specificity rank used when reconciling two spellings of one date:
    /// a month beats a bare year.
    pub fn specificity(&self) -> u8 {
        match self {
            EntryDate::Present => 1,
            EntryDate::Date(d) if d.has_month() => 2,
            EntryDate::Date(_) => 1,
        }
    }

    /// Parse a free-form date string. Returns `None` when no year can be found.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        let lower = text.to_lowercase();
        if matches!(
            lower.as_str(),
            "present" | "current" | "now" | "ongoing" | "today" | "presently" | "to date"
        ) {
            return Some(EntryDate::Present);
        }

        let year = find_year(&lower)?;
        let month = find_numeric_month(&lower, year).or_else(|| find_month_name(&lower));
        Some(EntryDate::Date(PartialDate { year, month }))
    }
}

impl fmt::Display for EntryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDate::Present => f.write_str("Present"),
            EntryDate::Date(d) => d.fmt(f),
        }
    }
}

impl Serialize for EntryDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawDate::deserialize(deserializer)?;
        raw.into_entry_date()
            .ok_or_else(|| serde::de::Error::custom("unrecognized date"))
    }
}

/// Deserialize an optional date, mapping `null`, empty strings and
/// unrecognizable text to `None` instead of failing the whole document.
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<EntryDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawDate>::deserialize(deserializer)?;
    Ok(raw.and_then(RawDate::into_entry_date))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Number(i64),
    Text(String),
    Parts { year: i64, month: Option<i64> },
    Other(serde::de::IgnoredAny),
}

impl RawDate {
    fn into_entry_date(self) -> Option<EntryDate> {
        match self {
            RawDate::Number(n) => plausible_year(n).map(|y| EntryDate::Date(PartialDate::year(y))),
            RawDate::Text(s) => EntryDate::parse(&s),
            RawDate::Parts { year, month } => {
                let year = plausible_year(year)?;
                let month = month.and_then(|m| u8::try_from(m).ok()).filter(|m| (1..=12).contains(m));
                Some(EntryDate::Date(PartialDate { year, month }))
            }
            RawDate::Other(_) => None,
        }
    }
}

fn plausible_year(n: i64) -> Option<i32> {
    (1900..=2100).contains(&n).then_some(n as i32)
}

fn digit_runs(text: &str) -> Vec<(usize, &str)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, &text[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, &text[s..]));
    }
    runs
}

fn find_year(text: &str) -> Option<i32> {
    digit_runs(text)
        .into_iter()
        .filter(|(_, run)| run.len() == 4)
        .find_map(|(_, run)| run.parse::<i64>().ok().and_then(plausible_year))
}

/// Month from numeric forms: `2021-03`, `2021/3`, `03/2021`, `2021-03-15`.
fn find_numeric_month(text: &str, year: i32) -> Option<u8> {
    let year_text = format!("{:04}", year);
    let runs = digit_runs(text);
    let year_pos = runs.iter().position(|(_, run)| *run == year_text)?;

    let candidate = if year_pos == 0 {
        runs.get(1)
    } else {
        runs.get(year_pos - 1)
    }?;

    if candidate.1.len() > 2 {
        return None;
    }
    candidate
        .1
        .parse::<u8>()
        .ok()
        .filter(|m| (1..=12).contains(m))
}

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn find_month_name(text: &str) -> Option<u8> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|word| word.len() >= 3)
        .find_map(|word| {
            MONTH_NAMES
                .iter()
                .position(|name| word.starts_with(name))
                .map(|idx| idx as u8 + 1)
        })
}
