//! Reduction of the provider's 3-hourly forecast list to one entry per day.

use chrono::{Local, NaiveDate, TimeZone};
use std::collections::HashSet;

use crate::model::ForecastSample;

/// One representative sample for a calendar date in the viewer's zone.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub sample: ForecastSample,
}

/// Forecast with at most one entry per local calendar date, in first-seen order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyForecast {
    entries: Vec<DailyEntry>,
}

impl DailyForecast {
    pub fn entries(&self) -> &[DailyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for the earliest date present, usually the partial current day.
    pub fn today(&self) -> Option<&DailyEntry> {
        self.entries.first()
    }

    /// Entries at offsets `1..=days`, fewer if the provider returned less.
    pub fn upcoming(&self, days: usize) -> &[DailyEntry] {
        let end = self.entries.len().min(days.saturating_add(1));
        self.entries.get(1..end).unwrap_or(&[])
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.iter().map(|e| e.date)
    }

    pub fn samples(&self) -> impl Iterator<Item = &ForecastSample> {
        self.entries.iter().map(|e| &e.sample)
    }
}

#[derive(Debug, Clone)]
pub struct ForecastNormalizer<Tz: TimeZone = Local> {
    tz: Tz,
}

impl ForecastNormalizer<Local> {
    /// Normalizer keyed by the machine's local time zone.
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl Default for ForecastNormalizer<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz: TimeZone> ForecastNormalizer<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn local_date(&self, sample: &ForecastSample) -> NaiveDate {
        sample.timestamp.with_timezone(&self.tz).date_naive()
    }

    /// Keeps the first sample seen for each local date and drops the rest.
    /// Order of first occurrences is preserved.
    pub fn reduce<I>(&self, raw: I) -> DailyForecast
    where
        I: IntoIterator<Item = ForecastSample>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for sample in raw {
            let date = self.local_date(&sample);
            if seen.insert(date) {
                entries.push(DailyEntry { date, sample });
            }
        }

        DailyForecast { entries }
    }
}
