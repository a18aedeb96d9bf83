use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Context;

use crate::models::{ShapeFeatureVector, TrainingEntry};

const FIELD_COUNT: usize = 1 + ShapeFeatureVector::DIMENSIONS;

/// Labelled feature vectors learned from the training images
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingDatabase {
    entries: Vec<TrainingEntry>,
}

impl TrainingDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<TrainingEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: TrainingEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TrainingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingEntry> {
        self.entries.iter()
    }

    /// Distinct labels in first-seen order
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !labels.contains(&entry.label.as_str()) {
                labels.push(&entry.label);
            }
        }
        labels
    }

    /// Load a database written by `save`.
    ///
    /// A missing or unreadable file is an empty database. Blank lines are
    /// ignored and malformed lines are skipped with a warning.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::info!("No training data at {} ({}), starting empty", path.display(), e);
                return Self::new();
            }
        };

        let mut db = Self::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("Stopped reading {} at line {}: {}", path.display(), line_no + 1, e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(entry) => db.push(entry),
                Err(e) => log::warn!("Skipping {} line {}: {}", path.display(), line_no + 1, e),
            }
        }

        log::info!("Loaded {} entries from {}", db.len(), path.display());
        db
    }

    /// Overwrite `path` with one `label,percentFilled,hwRatio,hu1,hu2,hu3` line per entry
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create training file {}", path.display()))?;
        let mut out = BufWriter::new(file);

        for entry in &self.entries {
            if entry.label.contains([',', '\n', '\r']) {
                anyhow::bail!("Label {:?} cannot be stored: contains a separator", entry.label);
            }
            let f = &entry.features;
            writeln!(
                out,
                "{},{},{},{},{},{}",
                entry.label, f.percent_filled, f.hw_ratio, f.hu1, f.hu2, f.hu3
            )?;
        }
        out.flush()?;

        log::info!("Saved {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }
}

impl FromIterator<TrainingEntry> for TrainingDatabase {
    fn from_iter<I: IntoIterator<Item = TrainingEntry>>(iter: I) -> Self {
        Self::from_entries(iter.into_iter().collect())
    }
}

fn parse_line(line: &str) -> anyhow::Result<TrainingEntry> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split(',').collect();
    if fields.len() != FIELD_COUNT {
        anyhow::bail!("expected {} fields, found {}", FIELD_COUNT, fields.len());
    }

    let mut values = [0.0f64; ShapeFeatureVector::DIMENSIONS];
    for (value, field) in values.iter_mut().zip(&fields[1..]) {
        *value = field
            .trim()
            .parse()
            .with_context(|| format!("invalid number {:?}", field))?;
    }

    Ok(TrainingEntry::new(fields[0], ShapeFeatureVector::from_array(values)))
}

/// Training database shared between a trainer and concurrent readers.
///
/// Readers get a snapshot; `replace` swaps in a fully built database, so a
/// reader sees either the old or the new one and never a partial rebuild.
#[derive(Debug, Clone, Default)]
pub struct SharedDatabase {
    inner: Arc<RwLock<Arc<TrainingDatabase>>>,
}

impl SharedDatabase {
    pub fn new(db: TrainingDatabase) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(db))),
        }
    }

    pub fn snapshot(&self) -> Arc<TrainingDatabase> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, db: TrainingDatabase) {
        let db = Arc::new(db);
        match self.inner.write() {
            Ok(mut guard) => *guard = db,
            Err(poisoned) => *poisoned.into_inner() = db,
        }
    }
}
