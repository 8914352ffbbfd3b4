/// Shared data structures for the diary state
///
/// These structs represent the data model that flows between
/// the entry store and whatever front end renders it.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dates;

/// One calendar day's saved outfit photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfitEntry {
    /// Diary day (unique key)
    pub date: NaiveDate,
    /// App-owned copy of the photo, named `{date}.{ext}`
    pub photo_path: PathBuf,
}

/// Date -> photo mapping, iterated in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMap {
    entries: BTreeMap<NaiveDate, PathBuf>,
}

impl EntryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<OutfitEntry> {
        self.entries.get(&date).map(|path| OutfitEntry {
            date,
            photo_path: path.clone(),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.entries.contains_key(&date)
    }

    /// Insert or replace; returns the previous path for that day.
    pub fn insert(&mut self, date: NaiveDate, photo_path: PathBuf) -> Option<PathBuf> {
        self.entries.insert(date, photo_path)
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<PathBuf> {
        self.entries.remove(&date)
    }

    /// Number of saved outfits. This is the count titles unlock on.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> u32 {
        u32::try_from(self.entries.len()).unwrap_or(u32::MAX)
    }

    pub fn iter(&self) -> impl Iterator<Item = OutfitEntry> + '_ {
        self.entries.iter().map(|(date, path)| OutfitEntry {
            date: *date,
            photo_path: path.clone(),
        })
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.entries.values().map(PathBuf::as_path)
    }

    /// Days of the given month that have an outfit (calendar dots).
    pub fn marked_in_month(&self, year: i32, month: u32) -> Vec<NaiveDate> {
        self.entries
            .keys()
            .filter(|d| d.year() == year && d.month() == month)
            .copied()
            .collect()
    }

    /// Consecutive days with an outfit ending today.
    ///
    /// A streak whose last day is yesterday still counts: today can still
    /// be logged.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        let start = if self.contains(today) {
            today
        } else {
            dates::previous_day(today)
        };

        let mut streak = 0;
        let mut day = start;
        while self.contains(day) {
            streak += 1;
            day = dates::previous_day(day);
        }
        streak
    }

    pub fn longest_streak(&self) -> u32 {
        let mut longest = 0;
        let mut run = 0;
        let mut prev: Option<NaiveDate> = None;

        for date in self.dates() {
            run = match prev {
                Some(p) if dates::days_between(p, date) == 1 => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            prev = Some(date);
        }
        longest
    }
}

impl FromIterator<(NaiveDate, PathBuf)> for EntryMap {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, PathBuf)>>(iter: I) -> Self {
        EntryMap {
            entries: iter.into_iter().collect(),
        }
    }
}
