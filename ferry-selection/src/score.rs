use std::collections::BTreeSet;

use ferry_node::SlaveName;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The score of a single candidate.
pub struct SlaveScore {
    name: SlaveName,
    score: i64,
}

impl SlaveScore {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn score(&self) -> i64 {
        self.score
    }

    #[inline]
    pub fn add_score(&mut self, delta: i64) {
        self.score = self.score.saturating_add(delta);
    }
}

#[derive(Debug, Clone, Default)]
/// The scores of every candidate for a single placement decision.
///
/// Candidates keep the order they were given in, which is what breaks
/// ties between equal scores. A removed candidate can never come back.
pub struct ScoreChart {
    scores: Vec<SlaveScore>,
    removed: BTreeSet<SlaveName>,
}

impl ScoreChart {
    /// Creates a new chart with every candidate at a score of `0`.
    ///
    /// Duplicate candidates keep their first position.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SlaveName>,
    {
        let mut seen = BTreeSet::new();
        let scores = candidates
            .into_iter()
            .map(Into::into)
            .filter(|name: &SlaveName| seen.insert(name.clone()))
            .map(|name| SlaveScore { name, score: 0 })
            .collect();

        Self {
            scores,
            removed: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    #[inline]
    /// The remaining candidates in their original order.
    pub fn scores(&self) -> &[SlaveScore] {
        &self.scores
    }

    pub fn scores_mut(&mut self) -> impl Iterator<Item = &mut SlaveScore> {
        self.scores.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&SlaveScore> {
        self.scores.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of the remaining candidates.
    pub fn slave_names(&self) -> Vec<SlaveName> {
        self.scores.iter().map(|s| s.name.clone()).collect()
    }

    /// Adds to the score of a candidate, returns `false` if it isn't in the chart.
    pub fn add_score(&mut self, name: &str, delta: i64) -> bool {
        match self.scores.iter_mut().find(|s| s.name == name) {
            Some(score) => {
                score.add_score(delta);
                true
            },
            None => false,
        }
    }

    /// Eliminates a candidate, returns `false` if it wasn't in the chart.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.scores.len();
        self.retain(|s| s.name() != name);
        before != self.scores.len()
    }

    /// Keeps only the candidates matching the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&SlaveScore) -> bool) {
        let (kept, removed): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.scores).into_iter().partition(|s| keep(s));

        self.removed.extend(removed.into_iter().map(|s| s.name));
        self.scores = kept;
    }

    /// Returns if the candidate was eliminated from this chart.
    pub fn was_removed(&self, name: &str) -> bool {
        self.removed.contains(name)
    }

    /// The highest scoring candidate, the earliest one wins a tie.
    pub fn best(&self) -> Option<&SlaveScore> {
        let mut best: Option<&SlaveScore> = None;
        for score in self.scores.iter() {
            match best {
                Some(current) if current.score >= score.score => {},
                _ => best = Some(score),
            }
        }
        best
    }
}
