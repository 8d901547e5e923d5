//! Month archive of dated posts.
//!
//! ```text
//! ArchiveIndex
//!   └── [ArchiveYear { year: 2024, months: [ {month: 5, key: "2024-05", count: 2}, .. ] }, ..]
//! ```
//!
//! Years and months keep first-seen order; posts arrive newest first.

use crate::utils::date::archive_key;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveMonth {
    pub month: u32,
    /// `YYYY-MM`, also the listing directory name.
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveYear {
    pub year: i32,
    pub months: Vec<ArchiveMonth>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArchiveIndex {
    years: Vec<ArchiveYear>,
}

impl ArchiveIndex {
    pub fn add(&mut self, date: NaiveDate) {
        let (year, month) = (date.year(), date.month());

        let idx = match self.years.iter().position(|y| y.year == year) {
            Some(idx) => idx,
            None => {
                self.years.push(ArchiveYear { year, months: Vec::new() });
                self.years.len() - 1
            }
        };
        let months = &mut self.years[idx].months;
        match months.iter_mut().find(|m| m.month == month) {
            Some(entry) => entry.count += 1,
            None => months.push(ArchiveMonth {
                month,
                key: archive_key(date),
                count: 1,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    #[cfg(test)]
    pub fn years(&self) -> &[ArchiveYear] {
        &self.years
    }
}
