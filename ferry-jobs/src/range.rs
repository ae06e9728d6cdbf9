use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::JobError;
use crate::job::JobIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A set of job indices given by an operator, such as `"1-5 9"`.
///
/// Ranges are inclusive and separated by whitespace or commas.
pub struct JobRanges(Vec<RangeInclusive<JobIndex>>);

impl JobRanges {
    pub fn single(index: JobIndex) -> Self {
        Self(vec![index..=index])
    }

    pub fn contains(&self, index: JobIndex) -> bool {
        self.0.iter().any(|range| range.contains(&index))
    }
}

impl FromStr for JobRanges {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || JobError::InvalidRange(s.to_string());

        let mut ranges = Vec::new();
        for part in s.split(|c: char| c == ',' || c.is_whitespace()) {
            if part.is_empty() {
                continue;
            }

            let (low, high) = match part.split_once('-') {
                Some((low, high)) => (low, high),
                None => (part, part),
            };
            let low = low.trim().parse::<JobIndex>().map_err(|_| invalid())?;
            let high = high.trim().parse::<JobIndex>().map_err(|_| invalid())?;
            if low == 0 || low > high {
                return Err(invalid());
            }
            ranges.push(low..=high);
        }

        if ranges.is_empty() {
            return Err(invalid());
        }
        Ok(Self(ranges))
    }
}
