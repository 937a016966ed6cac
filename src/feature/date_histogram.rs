use crate::error::Result;
use crate::query::builder::{Builder, FeatureId};
use crate::query::{
    AggregationKind, BucketOptions, BucketOrder, CalendarInterval, DateInterval, FixedInterval,
};
use crate::request::Request;
use crate::types::{Filter, RangeBound};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Date range facet bucketed by a fixed or calendar interval. Filters on
/// `field.min` / `field.max`.
#[derive(Debug)]
pub struct DateHistogram {
    id: FeatureId,
    field: String,
    fixed: FixedInterval,
    calendar: Option<CalendarInterval>,
    calendar_instead: bool,
    format: Option<String>,
}

impl DateHistogram {
    pub fn new(field: impl Into<String>, default_unit: FixedInterval) -> Self {
        DateHistogram {
            id: FeatureId::next(),
            field: field.into(),
            fixed: default_unit,
            calendar: None,
            calendar_instead: false,
            format: None,
        }
    }

    pub fn with_calendar_interval(mut self, interval: CalendarInterval) -> Self {
        self.calendar = Some(interval);
        self
    }

    /// Bucket by the calendar interval rather than the fixed unit. Has no
    /// effect unless a calendar interval is configured as well.
    pub fn calendar_interval_instead(mut self) -> Self {
        self.calendar_instead = true;
        self
    }

    /// Format for bucket keys, in the backend's date pattern syntax
    /// (e.g. `yyyy-MM-dd`).
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// The interval buckets are computed with.
    pub fn interval(&self) -> DateInterval {
        match (self.calendar_instead, self.calendar) {
            (true, Some(calendar)) => DateInterval::Calendar(calendar),
            _ => DateInterval::Fixed(self.fixed),
        }
    }

    /// A calendar interval without `calendar_interval_instead`, or the other
    /// way round. The fixed unit is used in both cases.
    pub fn has_ignored_calendar_config(&self) -> bool {
        self.calendar_instead != self.calendar.is_some()
    }

    /// Called once when the configured histogram becomes a [`Feature`](super::Feature).
    pub(super) fn finish(self) -> Self {
        if self.has_ignored_calendar_config() {
            tracing::warn!(
                "[FEATURE] date histogram '{}' has calendar_interval_instead={} with calendar interval {:?}; using fixed {}",
                self.field,
                self.calendar_instead,
                self.calendar,
                self.fixed
            );
        }
        self
    }

    pub fn apply(&self, request: &Request, builder: &mut Builder) -> Result<()> {
        let range = request.range_values(&self.field);
        let gte = range.min.and_then(parse_date).map(RangeBound::Date);
        let lte = range.max.and_then(parse_date_upper).map(RangeBound::Date);
        if gte.is_some() || lte.is_some() {
            builder.add_filter(
                self.id,
                Filter::Range {
                    field: self.field.clone(),
                    gte,
                    lte,
                },
            );
        }

        builder.add_aggregation(
            self.id,
            &self.field,
            AggregationKind::DateHistogram {
                field: self.field.clone(),
                interval: self.interval(),
                format: self.format.clone(),
                min_doc_count: 1,
            },
            BucketOptions {
                order: BucketOrder::KeyAsc,
                formatted_keys: true,
                ..BucketOptions::default()
            },
        )
    }
}

/// Parse an RFC 3339 timestamp, a `YYYY-MM-DDTHH:MM:SS` timestamp (UTC), or a
/// `YYYY-MM-DD` date (UTC midnight).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Like [`parse_date`], but a bare date covers its whole day.
fn parse_date_upper(raw: &str) -> Option<DateTime<Utc>> {
    let start = parse_date(raw)?;
    if NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").is_ok() {
        return Some(start + Duration::days(1) - Duration::milliseconds(1));
    }
    Some(start)
}
