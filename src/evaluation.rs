use std::collections::BTreeMap;
use std::fmt;

use crate::models::UNKNOWN_LABEL;

/// Counts of (true label, predicted label) pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: BTreeMap<(String, String), usize>,
}

impl ConfusionMatrix {
    /// Matrix whose rows and columns start with `labels`; labels seen later
    /// are appended
    pub fn new(labels: &[String]) -> Self {
        Self {
            labels: labels.to_vec(),
            counts: BTreeMap::new(),
        }
    }

    fn register(&mut self, label: &str) {
        if label != UNKNOWN_LABEL && !self.labels.iter().any(|l| l == label) {
            self.labels.push(label.to_string());
        }
    }

    pub fn record(&mut self, truth: &str, predicted: &str) {
        self.register(truth);
        self.register(predicted);
        *self
            .counts
            .entry((truth.to_string(), predicted.to_string()))
            .or_insert(0) += 1;
    }

    pub fn count(&self, truth: &str, predicted: &str) -> usize {
        self.counts
            .get(&(truth.to_string(), predicted.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn correct(&self) -> usize {
        self.counts
            .iter()
            .filter(|((truth, predicted), _)| truth == predicted)
            .map(|(_, n)| n)
            .sum()
    }

    /// Fraction of correct predictions; 0 for an empty matrix
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut columns: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        columns.push(UNKNOWN_LABEL);
        let width = columns.iter().map(|c| c.len()).max().unwrap_or(0).max(5);

        write!(f, "{:>width$}", "true\\pred", width = width + 2)?;
        for column in &columns {
            write!(f, " {:>width$}", column, width = width)?;
        }
        writeln!(f)?;

        for row in &self.labels {
            write!(f, "{:>width$}", row, width = width + 2)?;
            for column in &columns {
                write!(f, " {:>width$}", self.count(row, column), width = width)?;
            }
            writeln!(f)?;
        }

        write!(
            f,
            "accuracy: {}/{} ({:.1}%)",
            self.correct(),
            self.total(),
            100.0 * self.accuracy()
        )
    }
}
