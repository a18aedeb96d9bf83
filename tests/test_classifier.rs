mod common;

use common::*;
use shapeclass::ShapeClassifier;
use shapeclass::classify::shape::{classify, nearest};

fn circle_db() -> TrainingDatabase {
    TrainingDatabase::from_entries(vec![TrainingEntry::new(
        "circle",
        ShapeFeatureVector::new(0.78, 0.95, 1.10, 2.30, 3.00),
    )])
}

#[test]
fn test_empty_database_is_unknown() -> anyhow::Result<()> {
    let query = ShapeFeatureVector::new(0.5, 0.5, 1.0, 2.0, 3.0);

    assert_eq!(classify(&query, &TrainingDatabase::new(), f64::INFINITY), UNKNOWN_LABEL);
    assert_eq!(ShapeClassifier::new(TrainingDatabase::new()).classify(&query), UNKNOWN_LABEL);
    Ok(())
}

#[test]
fn test_single_entry_without_threshold_always_matches() -> anyhow::Result<()> {
    let classifier = ShapeClassifier::new(circle_db());

    for query in [
        ShapeFeatureVector::new(0.0, 0.0, 0.0, 0.0, 0.0),
        ShapeFeatureVector::new(1.0, 1.0, 40.0, -12.0, 7.5),
        ShapeFeatureVector::new(0.78, 0.95, 1.10, 2.30, 3.00),
    ] {
        assert_eq!(classifier.classify(&query), "circle");
    }
    Ok(())
}

#[test]
fn test_distant_query_is_rejected() -> anyhow::Result<()> {
    let db = circle_db();
    let query = ShapeFeatureVector::new(0.78, 0.95, 6.10, 2.30, 3.00);

    let (_, dist) = nearest(&query, &db).expect("Expected a nearest entry");
    assert!((dist - 5.0).abs() < 1e-9);
    assert_eq!(classify(&query, &db, 0.5), UNKNOWN_LABEL);
    Ok(())
}

#[test]
fn test_circle_scenario_within_threshold() -> anyhow::Result<()> {
    let db = circle_db();
    let query = ShapeFeatureVector::new(0.80, 0.94, 1.00, 2.20, 2.90);

    let (entry, dist) = nearest(&query, &db).expect("Expected a nearest entry");
    assert_eq!(entry.label, "circle");
    assert!((dist - 0.1746).abs() < 1e-3, "distance {}", dist);

    let classifier = ShapeClassifier::new(db).with_reject_threshold(3.0);
    assert_eq!(classifier.classify(&query), "circle");
    Ok(())
}

#[test]
fn test_distances_are_scaled_per_feature() -> anyhow::Result<()> {
    // hu1 spreads widely across the set, percent filled barely moves
    let db = TrainingDatabase::from_entries(vec![
        TrainingEntry::new("a", ShapeFeatureVector::new(0.50, 0.5, 0.0, 1.0, 1.0)),
        TrainingEntry::new("b", ShapeFeatureVector::new(0.52, 0.5, 100.0, 1.0, 1.0)),
    ]);
    let query = ShapeFeatureVector::new(0.52, 0.5, 40.0, 1.0, 1.0);

    // unscaled "a" is nearer; scaled, the percent-filled gap dominates
    assert_eq!(classify(&query, &db, f64::INFINITY), "b");
    Ok(())
}

#[test]
fn test_equal_distance_prefers_first_entry() -> anyhow::Result<()> {
    let features = ShapeFeatureVector::new(0.7, 0.7, 1.0, 1.0, 1.0);
    let db = TrainingDatabase::from_entries(vec![
        TrainingEntry::new("first", features),
        TrainingEntry::new("second", features),
    ]);

    assert_eq!(classify(&features, &db, f64::INFINITY), "first");
    Ok(())
}
