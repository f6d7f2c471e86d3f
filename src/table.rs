//! Time-indexed tables.
//!
//! Rows are whole calendar periods rather than instants: a period is
//! represented by its final calendar day plus its frequency, with
//! quarterly and yearly periods anchored to a nominated end month (the
//! fiscal-year convention the publishers use). Tables keep a sorted,
//! unique period index and one column per series.

use chrono::Datelike;
use chrono::Duration;
use chrono::Local;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Observation frequency. Anchor months are 1..=12 and give the calendar
/// month a quarterly/yearly period ends in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Monthly,
    /// Quarterly periods ending in the anchor month (and every third month
    /// before it)
    Quarterly(u32),
    /// Yearly periods ending in the anchor month
    Yearly(u32),
}

impl Frequency {
    fn rank(self) -> (u8, u32) {
        match self {
            Frequency::Daily => (0, 0),
            Frequency::Monthly => (1, 0),
            Frequency::Quarterly(anchor) => (2, anchor),
            Frequency::Yearly(anchor) => (3, anchor),
        }
    }
}

/// One whole calendar period of a given frequency.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Period {
    freq: Frequency,
    end: NaiveDate,
}

impl Period {
    /// The period of `freq` containing `date`.
    pub fn from_date(date: NaiveDate, freq: Frequency) -> Period {
        let end = match freq {
            Frequency::Daily => date,
            Frequency::Monthly => month_end(date.year(), date.month()),
            Frequency::Quarterly(anchor) => {
                // Quarter ends fall in every month congruent to the anchor mod 3
                let step = (anchor % 3 + 3 - date.month() % 3) % 3;
                let mut year = date.year();
                let mut month = date.month() + step;
                if month > 12 {
                    month -= 12;
                    year += 1;
                }
                month_end(year, month)
            }
            Frequency::Yearly(anchor) => {
                let year = if date.month() <= anchor {
                    date.year()
                } else {
                    date.year() + 1
                };
                month_end(year, anchor)
            }
        };
        Period { freq, end }
    }

    /// The period of `freq` containing the current local date.
    pub fn today(freq: Frequency) -> Period {
        Period::from_date(Local::now().date_naive(), freq)
    }

    /// Final calendar day of the period.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn frequency(&self) -> Frequency {
        self.freq
    }

    /// The immediately following period.
    pub fn next(&self) -> Period {
        match self.freq {
            Frequency::Daily => Period {
                freq: self.freq,
                end: self.end + Duration::days(1),
            },
            Frequency::Monthly => Period::from_date(self.end + Duration::days(1), self.freq),
            Frequency::Quarterly(_) => {
                Period::from_date(self.end + Duration::days(32), self.freq)
            }
            Frequency::Yearly(anchor) => Period {
                freq: self.freq,
                end: month_end(self.end.year() + 1, anchor),
            },
        }
    }

    fn sort_key(&self) -> (NaiveDate, (u8, u32)) {
        (self.end, self.freq.rank())
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.freq {
            Frequency::Daily => write!(f, "{}", self.end.format("%Y-%m-%d")),
            Frequency::Monthly => write!(f, "{}", self.end.format("%Y-%m")),
            Frequency::Quarterly(anchor) => {
                let month = self.end.month();
                let year = if month <= anchor {
                    self.end.year()
                } else {
                    self.end.year() + 1
                };
                let quarter = (month + 12 - anchor - 1) % 12 / 3 + 1;
                write!(f, "{year}Q{quarter}")
            }
            Frequency::Yearly(_) => write!(f, "{}", self.end.year()),
        }
    }
}

/// Last calendar day of the given month.
fn month_end(year: i32, month: u32) -> NaiveDate {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|date| date.pred_opt())
        .expect("valid month")
}

/// Classifies a date index by the day gaps between successive
/// observations: [28,31] monthly, [90,92] quarterly (December anchored),
/// [365,366] yearly, anything else (or too few points) daily.
pub fn infer_frequency(dates: &[NaiveDate]) -> Frequency {
    let gaps: Vec<i64> = dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .collect();
    let (min, max) = match (gaps.iter().min(), gaps.iter().max()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => return Frequency::Daily,
    };
    if (28..=31).contains(&min) && (28..=31).contains(&max) {
        Frequency::Monthly
    } else if (90..=92).contains(&min) && (90..=92).contains(&max) {
        Frequency::Quarterly(12)
    } else if (365..=366).contains(&min) && (365..=366).contains(&max) {
        Frequency::Yearly(12)
    } else {
        Frequency::Daily
    }
}

/// One named series of a table, aligned with the table index.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub id: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// A time-indexed wide table: one sorted, unique period index and one
/// column per series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    index: Vec<Period>,
    columns: Vec<Column>,
}

impl Table {
    /// Builds a table from parallel rows, restoring the sorted-unique
    /// index invariant. When two rows land on the same period the first
    /// one wins and the clash is logged.
    pub fn build(index: Vec<Period>, columns: Vec<Column>) -> Table {
        let mut order: Vec<usize> = (0..index.len()).collect();
        order.sort_by_key(|&position| index[position].sort_key());

        let mut unique = Vec::<Period>::with_capacity(index.len());
        let mut keep = Vec::<usize>::with_capacity(index.len());
        for position in order {
            let period = index[position];
            if unique.last() == Some(&period) {
                warn!(%period, "duplicate period in index, keeping first row");
                continue;
            }
            unique.push(period);
            keep.push(position);
        }

        let columns = columns
            .into_iter()
            .map(|column| Column {
                id: column.id,
                values: keep
                    .iter()
                    .map(|&position| column.values.get(position).copied().flatten())
                    .collect(),
            })
            .collect();
        Table {
            index: unique,
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn index(&self) -> &[Period] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == id)
    }

    /// Outer join on the period index. Columns of `other` whose id already
    /// exists are dropped: the first occurrence wins. This is the
    /// deliberate de-duplication policy for repeated series identifiers,
    /// not an error.
    pub fn outer_merge(self, other: Table) -> Table {
        if self.index.is_empty() {
            return other;
        }
        if other.index.is_empty() {
            return self;
        }

        let mut positions = BTreeMap::<Period, usize>::new();
        for period in self.index.iter().chain(other.index.iter()) {
            let next = positions.len();
            positions.entry(*period).or_insert(next);
        }
        // BTreeMap iteration is sorted; rebuild the position map in order
        let index: Vec<Period> = positions.keys().copied().collect();
        let positions: BTreeMap<Period, usize> = index
            .iter()
            .enumerate()
            .map(|(position, period)| (*period, position))
            .collect();

        let mut columns = Vec::<Column>::new();
        let mut remap = |table: &Table, columns: &mut Vec<Column>| {
            for column in &table.columns {
                if columns.iter().any(|existing| existing.id == column.id) {
                    continue;
                }
                let mut values = vec![None; index.len()];
                for (period, value) in table.index.iter().zip(column.values.iter()) {
                    values[positions[period]] = *value;
                }
                columns.push(Column {
                    id: column.id.clone(),
                    values,
                });
            }
        };
        remap(&self, &mut columns);
        remap(&other, &mut columns);

        Table { index, columns }
    }

    /// Re-expresses the index at another frequency, mapping each period by
    /// its final day. Collapsing periods keep their first row.
    pub fn to_frequency(&self, freq: Frequency) -> Table {
        let index = self
            .index
            .iter()
            .map(|period| Period::from_date(period.end(), freq))
            .collect();
        Table::build(index, self.columns.clone())
    }
}

/// A single named series with a period index, used for convenience
/// accessors such as the RBA cash-rate reader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Series {
    pub name: String,
    index: Vec<Period>,
    values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, index: Vec<Period>, values: Vec<f64>) -> Series {
        Series {
            name: name.into(),
            index,
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn index(&self) -> &[Period] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last(&self) -> Option<(Period, f64)> {
        self.index
            .last()
            .copied()
            .zip(self.values.last().copied())
    }

    pub fn push(&mut self, period: Period, value: f64) {
        self.index.push(period);
        self.values.push(value);
    }

    /// Re-expresses the series at another frequency, keeping the last
    /// observation inside each collapsing period.
    pub fn to_frequency(&self, freq: Frequency) -> Series {
        let mut index = Vec::<Period>::new();
        let mut values = Vec::<f64>::new();
        for (period, value) in self.index.iter().zip(self.values.iter()) {
            let mapped = Period::from_date(period.end(), freq);
            if index.last() == Some(&mapped) {
                *values.last_mut().expect("parallel vectors") = *value;
            } else {
                index.push(mapped);
                values.push(*value);
            }
        }
        Series {
            name: self.name.clone(),
            index,
            values,
        }
    }

    /// Fills the series onto the complete period range between its first
    /// and last observations, carrying the previous value forward.
    pub fn reindex_filled(&self) -> Series {
        let (first, last) = match (self.index.first(), self.index.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return self.clone(),
        };
        let mut index = Vec::<Period>::new();
        let mut values = Vec::<f64>::new();
        let mut position = 0usize;
        let mut current = self.values[0];
        let mut period = first;
        loop {
            while position < self.index.len() && self.index[position] <= period {
                current = self.values[position];
                position += 1;
            }
            index.push(period);
            values.push(current);
            if period >= last {
                break;
            }
            period = period.next();
        }
        Series {
            name: self.name.clone(),
            index,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn daily(dates: &[NaiveDate]) -> Vec<Period> {
        dates
            .iter()
            .map(|&d| Period::from_date(d, Frequency::Daily))
            .collect()
    }

    #[test]
    fn test_period_from_date_quarterly_anchor() {
        // December anchor: standard calendar quarters
        let period = Period::from_date(date(2023, 2, 15), Frequency::Quarterly(12));
        assert_eq!(period.end(), date(2023, 3, 31));
        assert_eq!(period.to_string(), "2023Q1");

        // June anchor: quarter ending September belongs to the 2024 fiscal year
        let period = Period::from_date(date(2023, 8, 1), Frequency::Quarterly(6));
        assert_eq!(period.end(), date(2023, 9, 30));
        assert_eq!(period.to_string(), "2024Q1");
    }

    #[test]
    fn test_period_from_date_yearly_anchor() {
        let period = Period::from_date(date(2023, 8, 1), Frequency::Yearly(6));
        assert_eq!(period.end(), date(2024, 6, 30));
        let period = Period::from_date(date(2023, 5, 1), Frequency::Yearly(6));
        assert_eq!(period.end(), date(2023, 6, 30));
    }

    #[test]
    fn test_period_next() {
        let period = Period::from_date(date(2023, 11, 30), Frequency::Monthly);
        assert_eq!(period.next().end(), date(2023, 12, 31));
        let period = Period::from_date(date(2023, 12, 31), Frequency::Quarterly(12));
        assert_eq!(period.next().end(), date(2024, 3, 31));
        let period = Period::from_date(date(2024, 2, 28), Frequency::Daily);
        assert_eq!(period.next().end(), date(2024, 2, 29));
    }

    #[test]
    fn test_infer_frequency_gap_bands() {
        let monthly: Vec<NaiveDate> = (1..=6).map(|m| date(2023, m, 28)).collect();
        assert_eq!(infer_frequency(&monthly), Frequency::Monthly);

        let quarterly = vec![
            date(2022, 3, 31),
            date(2022, 6, 30),
            date(2022, 9, 30),
            date(2022, 12, 31),
        ];
        assert_eq!(infer_frequency(&quarterly), Frequency::Quarterly(12));

        let yearly = vec![date(2020, 6, 30), date(2021, 6, 30), date(2022, 6, 30)];
        assert_eq!(infer_frequency(&yearly), Frequency::Yearly(12));

        let daily = vec![date(2023, 1, 2), date(2023, 1, 3), date(2023, 1, 4)];
        assert_eq!(infer_frequency(&daily), Frequency::Daily);

        // Mixed gaps fall back to daily
        let mixed = vec![date(2023, 1, 1), date(2023, 1, 31), date(2023, 6, 30)];
        assert_eq!(infer_frequency(&mixed), Frequency::Daily);

        // Too few observations to measure a gap
        assert_eq!(infer_frequency(&[date(2023, 1, 1)]), Frequency::Daily);
    }

    #[test]
    fn test_outer_merge_first_column_wins() {
        let left = Table::build(
            daily(&[date(2023, 1, 1), date(2023, 1, 2)]),
            vec![Column {
                id: "A1".into(),
                values: vec![Some(1.0), Some(2.0)],
            }],
        );
        let right = Table::build(
            daily(&[date(2023, 1, 2), date(2023, 1, 3)]),
            vec![
                Column {
                    id: "A1".into(),
                    values: vec![Some(99.0), Some(98.0)],
                },
                Column {
                    id: "B2".into(),
                    values: vec![Some(5.0), Some(6.0)],
                },
            ],
        );

        let merged = left.outer_merge(right);
        assert_eq!(merged.index().len(), 3);
        // First sheet's duplicate column survives untouched
        let a1 = merged.column("A1").unwrap();
        assert_eq!(a1.values, vec![Some(1.0), Some(2.0), None]);
        let b2 = merged.column("B2").unwrap();
        assert_eq!(b2.values, vec![None, Some(5.0), Some(6.0)]);
    }

    #[test]
    fn test_build_sorts_and_dedupes_index() {
        let table = Table::build(
            daily(&[date(2023, 1, 3), date(2023, 1, 1), date(2023, 1, 3)]),
            vec![Column {
                id: "X".into(),
                values: vec![Some(3.0), Some(1.0), Some(99.0)],
            }],
        );
        assert_eq!(
            table.index(),
            daily(&[date(2023, 1, 1), date(2023, 1, 3)]).as_slice()
        );
        assert_eq!(table.column("X").unwrap().values, vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_to_frequency_anchors_quarters() {
        let table = Table::build(
            daily(&[date(2022, 9, 1), date(2022, 12, 1), date(2023, 3, 1)]),
            vec![Column {
                id: "X".into(),
                values: vec![Some(1.0), Some(2.0), Some(3.0)],
            }],
        );
        let quarterly = table.to_frequency(Frequency::Quarterly(12));
        let labels: Vec<String> = quarterly.index().iter().map(Period::to_string).collect();
        assert_eq!(labels, vec!["2022Q3", "2022Q4", "2023Q1"]);
    }

    #[test]
    fn test_series_reindex_filled() {
        let index = vec![
            Period::from_date(date(2023, 1, 31), Frequency::Monthly),
            Period::from_date(date(2023, 4, 30), Frequency::Monthly),
        ];
        let series = Series::new("rate", index, vec![1.0, 2.0]).reindex_filled();
        assert_eq!(series.len(), 4);
        assert_eq!(series.values(), &[1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_series_to_frequency_keeps_last_in_period() {
        let index = daily(&[date(2023, 1, 10), date(2023, 1, 20), date(2023, 2, 5)]);
        let series = Series::new("rate", index, vec![1.0, 1.5, 2.0]);
        let monthly = series.to_frequency(Frequency::Monthly);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly.values(), &[1.5, 2.0]);
    }
}
