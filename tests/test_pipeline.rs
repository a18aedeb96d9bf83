mod common;

use common::*;
use shapeclass::analysis::build_shape_pipeline;
use shapeclass::analysis::steps::{
    BinarizeStep, CleanStep, EmbeddingClassifyStep, FeatureStep, SegmentStep,
};
use shapeclass::classify::embedding::EmbeddingInput;
use shapeclass::config::Split;
use shapeclass::training;
use shapeclass::{DatasetManifest, Embedder, Pipeline, SharedDatabase};
use std::sync::Arc;
use tempfile::TempDir;

struct ChannelMeans;

impl Embedder for ChannelMeans {
    fn embed(&self, input: &EmbeddingInput) -> anyhow::Result<Embedding> {
        let plane = (input.size * input.size) as usize;
        Ok(Embedding(
            input
                .data
                .chunks(plane)
                .map(|c| c.iter().sum::<f32>() / plane as f32)
                .collect(),
        ))
    }
}

fn trained_db(recognizer: &ObjectRecognizer) -> TrainingDatabase {
    let mut db = TrainingDatabase::new();
    for (label, shape) in [("box", rectangle()), ("disc", ellipse())] {
        let (features, _) = recognizer
            .features(&object_image(200, 200, shape))
            .expect("Expected an object");
        db.push(TrainingEntry::new(label, features));
    }
    db
}

/// Training and evaluation images written to `dir`, plus a manifest for them
fn write_dataset(dir: &TempDir) -> anyhow::Result<DatasetManifest> {
    let root = dir.path();
    save_png(root, "box_train.png", &object_image(200, 200, rectangle()));
    save_png(root, "disc_train.png", &object_image(200, 200, ellipse()));
    save_png(root, "box_eval.png", &object_image_rgb(200, 200, rectangle().translated(8, -12)));
    save_png(root, "disc_eval.png", &object_image(200, 200, ellipse().translated(-16, 20)));

    let manifest_path = root.join("dataset.csv");
    std::fs::write(
        &manifest_path,
        "# label set: box, disc\n\
         train,box,box_train.png\n\
         train,disc,disc_train.png\n\
         eval,box,box_eval.png\n\
         eval,disc,disc_eval.png\n\
         eval,disc,missing.png\n",
    )?;
    DatasetManifest::load(&manifest_path)
}

#[test]
fn test_recognizer_finds_single_object() -> anyhow::Result<()> {
    let recognizer = ObjectRecognizer::default();

    let analysis = recognizer.analyze(&object_image(200, 200, rectangle()));

    assert!(analysis.threshold > 30.0 && analysis.threshold < 220.0);
    assert_eq!(analysis.segmentation.regions.len(), 1);
    let features = analysis.features().expect("Expected features");
    assert!(features.percent_filled > 0.95);
    assert!((features.hw_ratio - 0.5).abs() < 0.03);
    let region = analysis.region().expect("Expected region");
    assert!(region.orientation.is_some());
    assert!((region.centroid.0 - 99.5).abs() < 0.5);
    Ok(())
}

#[test]
fn test_blank_image_has_no_object() -> anyhow::Result<()> {
    let blank = object_image(120, 120, Shape::Rect { x: 0, y: 0, width: 0, height: 0 });
    let recognizer = ObjectRecognizer::default();

    assert!(recognizer.features(&blank).is_none());

    let pipeline = build_shape_pipeline(RecognizerConfig::default(), SharedDatabase::default());
    assert!(pipeline.run(blank)?.is_empty());
    Ok(())
}

#[test]
fn test_shape_pipeline_labels_translated_object() -> anyhow::Result<()> {
    let recognizer = ObjectRecognizer::default();
    let db = SharedDatabase::new(trained_db(&recognizer));
    let pipeline = build_shape_pipeline(RecognizerConfig::default().with_reject_threshold(3.0), db);

    let results = pipeline.run(object_image(200, 200, ellipse().translated(12, -20)))?;

    assert_eq!(results.len(), 1);
    let item = &results[0];
    assert_eq!(item.label.as_deref(), Some("disc"));
    assert!(item.features.is_some());
    assert!(item.get_float("threshold").is_some());
    assert_eq!(item.get_int("regions"), Some(1));
    Ok(())
}

#[test]
fn test_pipeline_uses_replaced_database() -> anyhow::Result<()> {
    let recognizer = ObjectRecognizer::default();
    let db = SharedDatabase::default();
    let pipeline = build_shape_pipeline(RecognizerConfig::default(), db.clone());
    let img = object_image(200, 200, rectangle());

    assert_eq!(pipeline.run(img.clone())?[0].label.as_deref(), Some(UNKNOWN_LABEL));

    db.replace(trained_db(&recognizer));
    assert_eq!(pipeline.run(img)?[0].label.as_deref(), Some("box"));
    Ok(())
}

#[test]
fn test_debug_output_per_step() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let debug_dir = dir.path().join("debug");
    let pipeline = build_shape_pipeline(RecognizerConfig::default(), SharedDatabase::default())
        .with_debug(debug_dir.clone())?;

    pipeline.run(object_image(200, 200, rectangle()))?;

    for step in [
        "00_input",
        "01_binarize",
        "02_morphology",
        "03_segmentation",
        "04_features",
        "05_shape_classification",
    ] {
        assert!(debug_dir.join(step).join("01.png").exists(), "missing {}", step);
    }

    // a second run into the now non-empty directory is refused
    let again = build_shape_pipeline(RecognizerConfig::default(), SharedDatabase::default())
        .with_debug(debug_dir);
    assert!(again.is_err());
    Ok(())
}

#[test]
fn test_debug_into_existing_empty_directory() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let pipeline = build_shape_pipeline(RecognizerConfig::default(), SharedDatabase::default())
        .with_debug(dir.path().to_path_buf())?;

    let results = pipeline.run_partial(object_image(200, 200, ellipse()), 1)?;

    assert_eq!(results.len(), 1);
    assert!(dir.path().join("00_input").join("01.png").exists());
    assert!(dir.path().join("01_binarize").join("01.png").exists());
    assert!(!dir.path().join("02_morphology").exists());
    Ok(())
}

#[test]
fn test_partial_run_stops_early() -> anyhow::Result<()> {
    let pipeline = build_shape_pipeline(RecognizerConfig::default(), SharedDatabase::default());

    let results = pipeline.run_partial(object_image(200, 200, rectangle()), 2)?;

    assert_eq!(results.len(), 1);
    assert!(results[0].mask.is_some());
    assert!(results[0].region.is_none());
    Ok(())
}

#[test]
fn test_train_and_evaluate_from_manifest() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let manifest = write_dataset(&dir)?;
    let recognizer = ObjectRecognizer::new(RecognizerConfig::default().with_reject_threshold(3.0));

    let db = training::train(&recognizer, &manifest.train);
    assert_eq!(db.labels(), vec!["box", "disc"]);

    let db_path = dir.path().join("training.txt");
    db.save(&db_path)?;
    let db = TrainingDatabase::load(&db_path);

    let evaluation = training::evaluate(&recognizer, &manifest.eval, &db, &manifest.labels);

    // the missing image is skipped, not counted
    assert_eq!(evaluation.predictions.len(), 2);
    assert!(evaluation.predictions.iter().all(|p| p.is_correct()));
    assert_eq!(evaluation.matrix.count("box", "box"), 1);
    assert_eq!(evaluation.matrix.count("disc", "disc"), 1);
    assert!(evaluation.matrix.to_string().ends_with("accuracy: 2/2 (100.0%)"));
    Ok(())
}

#[test]
fn test_embedding_pipeline_against_reference_set() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let manifest = write_dataset(&dir)?;
    let recognizer = ObjectRecognizer::default();

    let references = training::build_reference_set(&recognizer, &manifest.train, &ChannelMeans);
    assert_eq!(references.len(), 2);

    let evaluation = training::evaluate_embeddings(
        &recognizer,
        &manifest.eval,
        &ChannelMeans,
        &references,
        &manifest.labels,
    );
    assert_eq!(evaluation.matrix.count("box", "box"), 1);

    let pipeline = Pipeline::new()
        .add_step(Arc::new(BinarizeStep))
        .add_step(Arc::new(CleanStep))
        .add_step(Arc::new(SegmentStep::default()))
        .add_step(Arc::new(FeatureStep))
        .add_step(Arc::new(EmbeddingClassifyStep {
            embedder: Arc::new(ChannelMeans),
            classifier: references,
        }));
    let results = pipeline.run(object_image(200, 200, rectangle().translated(-8, 4)))?;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].label.as_deref(), Some("box"));
    assert_eq!(results[0].embedding.as_ref().map(|e| e.len()), Some(3));
    Ok(())
}

#[test]
fn test_manifest_built_in_code() -> anyhow::Result<()> {
    let mut manifest = DatasetManifest::new();
    manifest.push(Split::Train, "box", "a.png");
    manifest.push(Split::Eval, "disc", "b.png");
    manifest.push(Split::Eval, "box", "c.png");

    assert_eq!(manifest.labels, vec!["box", "disc"]);
    assert_eq!(manifest.train.len(), 1);
    assert_eq!(manifest.eval.len(), 2);
    Ok(())
}
