//! Ordered, frozen case collections. Insertion order is the canonical case
//! order used by the scheduler and the comparison engine; every combinator
//! returns a new `Dataset` and never mutates its source.

use std::sync::Arc;

use rand::seq::SliceRandom;
use verdict_types::EvalCase;

#[derive(Debug, Clone)]
pub struct Dataset {
    cases: Arc<[EvalCase]>,
}

impl Dataset {
    pub fn new(cases: Vec<EvalCase>) -> Self {
        Self { cases: cases.into() }
    }

    pub fn cases(&self) -> &[EvalCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvalCase> {
        self.cases.iter()
    }

    /// New dataset keeping only cases matching the predicate, order
    /// preserved.
    pub fn filter(&self, pred: impl Fn(&EvalCase) -> bool) -> Self {
        Self::new(self.cases.iter().filter(|c| pred(c)).cloned().collect())
    }

    /// New dataset of up to `n` cases drawn without replacement. Survivors
    /// keep their relative order.
    pub fn sample(&self, n: usize) -> Self {
        if n >= self.cases.len() {
            return self.clone();
        }
        let mut indices: Vec<usize> = (0..self.cases.len()).collect();
        indices.shuffle(&mut rand::thread_rng());
        let mut keep: Vec<usize> = indices.into_iter().take(n).collect();
        keep.sort_unstable();
        Self::new(keep.into_iter().map(|i| self.cases[i].clone()).collect())
    }

    /// New dataset with the cases in random order.
    pub fn shuffle(&self) -> Self {
        let mut cases: Vec<EvalCase> = self.cases.to_vec();
        cases.shuffle(&mut rand::thread_rng());
        Self::new(cases)
    }
}

impl From<Vec<EvalCase>> for Dataset {
    fn from(cases: Vec<EvalCase>) -> Self {
        Self::new(cases)
    }
}
