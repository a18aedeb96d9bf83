mod common;

use common::*;
use shapeclass::SharedDatabase;
use std::fs;
use tempfile::TempDir;

fn sample_db() -> TrainingDatabase {
    TrainingDatabase::from_entries(vec![
        TrainingEntry::new("circle", ShapeFeatureVector::new(0.785, 0.98, 0.796, 5.12, 9.87)),
        TrainingEntry::new("key", ShapeFeatureVector::new(0.41, 0.27, 0.512, 1.0 / 3.0, -2.5e-7)),
        TrainingEntry::new("circle", ShapeFeatureVector::new(0.79, 0.97, 0.8, 5.2, 10.1)),
    ])
}

#[test]
fn test_save_and_load_round_trip() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("training.txt");
    let db = sample_db();

    db.save(&path)?;
    let loaded = TrainingDatabase::load(&path);

    assert_eq!(loaded.len(), db.len());
    for (a, b) in loaded.iter().zip(db.iter()) {
        assert_eq!(a.label, b.label);
        for (x, y) in a.features.to_array().iter().zip(b.features.to_array()) {
            assert!((x - y).abs() < 1e-12);
        }
    }
    assert_eq!(loaded.labels(), vec!["circle", "key"]);
    Ok(())
}

#[test]
fn test_missing_file_loads_empty() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let db = TrainingDatabase::load(dir.path().join("does-not-exist.txt"));

    assert!(db.is_empty());
    Ok(())
}

#[test]
fn test_save_overwrites_previous_contents() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("training.txt");

    sample_db().save(&path)?;
    TrainingDatabase::from_entries(vec![TrainingEntry::new(
        "pen",
        ShapeFeatureVector::new(0.9, 0.1, 1.0, 2.0, 3.0),
    )])
    .save(&path)?;

    let loaded = TrainingDatabase::load(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.entries()[0].label, "pen");
    Ok(())
}

#[test]
fn test_malformed_lines_are_skipped() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("training.txt");
    fs::write(
        &path,
        "circle,0.78,0.95,1.1,2.3,3\n\
         broken,0.5,not-a-number,1,2,3\n\
         \n\
         short,0.5\n\
         square,1,1,0.8,0,0\n",
    )?;

    let db = TrainingDatabase::load(&path);

    let labels: Vec<&str> = db.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["circle", "square"]);
    assert_eq!(db.entries()[0].features, ShapeFeatureVector::new(0.78, 0.95, 1.1, 2.3, 3.0));
    Ok(())
}

#[test]
fn test_label_with_separator_is_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let db = TrainingDatabase::from_entries(vec![TrainingEntry::new(
        "bottle,cap",
        ShapeFeatureVector::default(),
    )]);

    assert!(db.save(dir.path().join("training.txt")).is_err());
    Ok(())
}

#[test]
fn test_shared_database_swaps_atomically() -> anyhow::Result<()> {
    let shared = SharedDatabase::new(TrainingDatabase::new());
    let before = shared.snapshot();

    shared.replace(sample_db());

    assert!(before.is_empty());
    assert_eq!(shared.snapshot().len(), 3);
    Ok(())
}
