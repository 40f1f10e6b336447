// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::Duration;

/// How long a card must rest after a review at a given grade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub grade: u32,
    pub value: Duration,
}

impl Interval {
    pub fn new(grade: u32, value: Duration) -> Self {
        Self { grade, value }
    }
}

/// A set of intervals, at most one per grade, ordered by grade.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct IntervalScheme {
    intervals: Vec<Interval>,
}

impl IntervalScheme {
    /// Builds a scheme. When two intervals share a grade, the later one wins.
    pub fn new(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut scheme = Self::default();
        for interval in intervals {
            scheme.insert(interval);
        }
        scheme
    }

    pub fn insert(&mut self, interval: Interval) {
        match self
            .intervals
            .binary_search_by_key(&interval.grade, |i| i.grade)
        {
            Ok(index) => self.intervals[index] = interval,
            Err(index) => self.intervals.insert(index, interval),
        }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Finds the interval for `grade`. Grades with no interval of their own
    /// reuse the interval of the highest defined grade. Returns `None` only
    /// for an empty scheme.
    pub fn interval_for(&self, grade: u32) -> Option<&Interval> {
        match self.intervals.binary_search_by_key(&grade, |i| i.grade) {
            Ok(index) => Some(&self.intervals[index]),
            Err(_) => self.intervals.last(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> IntervalScheme {
        IntervalScheme::new([
            Interval::new(1, Duration::days(3)),
            Interval::new(0, Duration::days(1)),
        ])
    }

    #[test]
    fn test_intervals_sorted_by_grade() {
        let grades: Vec<u32> = scheme().intervals().iter().map(|i| i.grade).collect();
        assert_eq!(grades, vec![0, 1]);
    }

    #[test]
    fn test_duplicate_grade_replaced() {
        let mut scheme = scheme();
        scheme.insert(Interval::new(0, Duration::hours(8)));
        assert_eq!(scheme.intervals().len(), 2);
        assert_eq!(scheme.interval_for(0).unwrap().value, Duration::hours(8));
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(scheme().interval_for(0).unwrap().value, Duration::days(1));
        assert_eq!(scheme().interval_for(1).unwrap().value, Duration::days(3));
    }

    #[test]
    fn test_unknown_grade_uses_highest_interval() {
        assert_eq!(scheme().interval_for(5).unwrap().grade, 1);
    }

    #[test]
    fn test_empty_scheme() {
        assert!(IntervalScheme::default().interval_for(0).is_none());
    }
}
