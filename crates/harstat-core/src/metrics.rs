//! Metric schema and the canonical report table.
//!
//! The nine metrics are fixed. Each has a technical key, as it appears in
//! the recorded analytics payloads, and a column name used in every output.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Column holding the calendar day of a record.
pub const DATE_COLUMN: &str = "Date";

/// Column holding the caller supplied label (site or branch name).
pub const LABEL_COLUMN: &str = "Label";

/// Format of dates in every output.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One of the nine reported performance indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    ListingImpressions,
    UniquePageViews,
    AverageBubbleRating,
    AverageRanking,
    DirectReferrals,
    BookingClicks,
    NewReviews,
    AverageBookingLength,
    AverageBookingLeadTime,
}

impl Metric {
    /// All metrics in canonical column order.
    pub const ALL: [Metric; 9] = [
        Metric::ListingImpressions,
        Metric::UniquePageViews,
        Metric::AverageBubbleRating,
        Metric::AverageRanking,
        Metric::DirectReferrals,
        Metric::BookingClicks,
        Metric::NewReviews,
        Metric::AverageBookingLength,
        Metric::AverageBookingLeadTime,
    ];

    /// Key used by the analytics API.
    pub fn technical_key(&self) -> &'static str {
        match self {
            Self::ListingImpressions => "LISTING_IMPRESSION_COUNT",
            Self::UniquePageViews => "UNIQUE_VISIT_COUNT",
            Self::AverageBubbleRating => "BUBBLE_RATING",
            Self::AverageRanking => "RANKING",
            Self::DirectReferrals => "HOTEL_REFERRAL_CLICK_COUNT",
            Self::BookingClicks => "HOTEL_BOOKINGS_CLICK_COUNT",
            Self::NewReviews => "REVIEW_COUNT",
            Self::AverageBookingLength => "HOTEL_SEARCH_TRIP_LENGTH_AVERAGE",
            Self::AverageBookingLeadTime => "HOTEL_SEARCH_LEAD_TIME_AVERAGE",
        }
    }

    /// Column name in reports.
    pub fn column(&self) -> &'static str {
        match self {
            Self::ListingImpressions => "Listing impressions",
            Self::UniquePageViews => "Unique page views",
            Self::AverageBubbleRating => "Average bubble rating",
            Self::AverageRanking => "Average ranking",
            Self::DirectReferrals => "Direct referrals",
            Self::BookingClicks => "Booking clicks",
            Self::NewReviews => "New reviews",
            Self::AverageBookingLength => "Average booking length",
            Self::AverageBookingLeadTime => "Average booking lead time",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_technical_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.technical_key() == key)
    }
}

impl FromStr for Metric {
    type Err = String;

    /// Accepts either the column name or the technical key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.column() == s || m.technical_key() == s)
            .ok_or_else(|| format!("Unknown metric: {}", s))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Column names of the canonical table, in order.
pub fn columns() -> Vec<&'static str> {
    let mut cols = vec![DATE_COLUMN, LABEL_COLUMN];
    cols.extend(Metric::ALL.iter().map(Metric::column));
    cols
}

/// One row of the report: a day, a label and the nine metric values.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub date: NaiveDate,
    pub label: String,
    pub values: [f64; 9],
}

impl MetricRecord {
    /// A record with every metric at zero.
    pub fn new(date: NaiveDate, label: impl Into<String>) -> Self {
        Self {
            date,
            label: label.into(),
            values: [0.0; 9],
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.values[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.values[metric.index()] = value;
    }

    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Cell texts in canonical column order.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![self.date_string(), self.label.clone()];
        cells.extend(self.values.iter().map(|v| format_number(*v)));
        cells
    }
}

impl Serialize for MetricRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + Metric::ALL.len()))?;
        map.serialize_entry(DATE_COLUMN, &self.date_string())?;
        map.serialize_entry(LABEL_COLUMN, &self.label)?;
        for metric in Metric::ALL {
            map.serialize_entry(metric.column(), &self.get(metric))?;
        }
        map.end()
    }
}

/// Integral values print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// The canonical report: unique (date, label) rows in ascending date order.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<MetricRecord>,
}

impl Table {
    /// Build a table from rows that already satisfy the ordering and
    /// uniqueness invariants. Use [`crate::merge::merge`] for raw input.
    pub(crate) fn from_sorted(rows: Vec<MetricRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MetricRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> Vec<&'static str> {
        columns()
    }

    /// Render as a fixed-width text grid for terminal display.
    pub fn render_text(&self) -> String {
        let header: Vec<String> = columns().iter().map(|c| c.to_string()).collect();
        let body: Vec<Vec<String>> = self.rows.iter().map(MetricRecord::cells).collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &body {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&line(&header));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        out.push('\n');
        for row in &body {
            out.push_str(&line(row));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_order() {
        let cols = columns();
        assert_eq!(cols.len(), 11);
        assert_eq!(cols[0], "Date");
        assert_eq!(cols[1], "Label");
        assert_eq!(cols[2], "Listing impressions");
        assert_eq!(cols[10], "Average booking lead time");
    }

    #[test]
    fn test_metric_lookup() {
        assert_eq!(
            Metric::from_technical_key("RANKING"),
            Some(Metric::AverageRanking)
        );
        assert_eq!("New reviews".parse::<Metric>(), Ok(Metric::NewReviews));
        assert_eq!(
            "REVIEW_COUNT".parse::<Metric>(),
            Ok(Metric::NewReviews)
        );
        assert!("reviews".parse::<Metric>().is_err());
        for (i, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), i);
        }
    }

    #[test]
    fn test_record_serialization_keeps_column_order() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut record = MetricRecord::new(date, "Site A");
        record.set(Metric::AverageBubbleRating, 4.5);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with(r#"{"Date":"2024-01-01","Label":"Site A","Listing impressions":0.0"#));
        assert!(json.contains(r#""Average bubble rating":4.5"#));
    }

    #[test]
    fn test_render_text() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut record = MetricRecord::new(date, "Site A");
        record.set(Metric::AverageRanking, 12.0);
        record.set(Metric::AverageBookingLeadTime, 131.5);
        let table = Table::from_sorted(vec![record]);
        let text = table.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Date       | Label "));
        assert!(lines[2].starts_with("2024-01-02 | Site A"));
        assert!(lines[2].contains("| 12 "));
        assert!(lines[2].ends_with("131.5"));
    }
}
