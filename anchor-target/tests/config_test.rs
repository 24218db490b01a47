use anchor_target::{
    AnnotationStore, AssignmentStats, CaltechAnnotations, Config, FilterReport, FrameId,
    TargetPreparer,
};
use anyhow::Result;
use std::path::{Path, PathBuf};

lazy_static::lazy_static! {
    static ref TEST_DIR: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests");
    static ref CONFIG_DIR: PathBuf = TEST_DIR.join("cfg");
    static ref ANNOTATION_FILE: PathBuf = TEST_DIR.join("data").join("annotations.json");
}

fn total_report(report: impl IntoIterator<Item = FilterReport>) -> FilterReport {
    report
        .into_iter()
        .fold(FilterReport::default(), |total, report| total.merge(&report))
}

#[test]
fn load_configs() -> Result<()> {
    ["caltech.json5", "undesirable.json5"]
        .iter()
        .try_for_each(|file_name| -> Result<_> {
            let config = Config::open(CONFIG_DIR.join(file_name))?;
            let _preparer = TargetPreparer::new(&config)?;
            Ok(())
        })?;
    Ok(())
}

#[test]
fn missing_config_file() {
    assert!(Config::open(CONFIG_DIR.join("missing.json5")).is_err());
}

#[test]
fn caltech_frames() -> Result<()> {
    let config = Config::open(CONFIG_DIR.join("caltech.json5"))?;
    let preparer = TargetPreparer::new(&config)?;
    assert_eq!(preparer.grid().num_anchors(), 30 * 40 * 5);

    let store = CaltechAnnotations::open(&*ANNOTATION_FILE)?;
    let frames = store.frames();
    assert_eq!(
        frames,
        vec![
            FrameId::new(0, 0, 0),
            FrameId::new(0, 0, 30),
            FrameId::new(0, 0, 59),
            FrameId::new(0, 1, 0),
            FrameId::new(1, 0, 15),
        ]
    );

    let outputs = preparer.prepare_frames(&store, &frames);
    let report = total_report(outputs.iter().map(|output| output.report));
    assert_eq!(report.kept, 3);
    assert_eq!(report.undesirable, 0);
    assert_eq!(report.ignored, 2);
    assert_eq!(report.too_narrow, 1);
    assert_eq!(report.low_visibility, 1);
    assert_eq!(report.unknown_visibility, 1);
    assert_eq!(report.malformed, 1);

    outputs.iter().for_each(|output| {
        let num_truths = output.truth.positives.len();
        (0..num_truths).for_each(|truth_index| {
            assert!(
                output.result.anchors_of(truth_index).next().is_some(),
                "box {} of frame {} has no positive anchor",
                truth_index,
                output.frame
            );
        });
        if num_truths == 0 {
            assert!(output.result.positives.is_empty());
        }
    });

    let stats: AssignmentStats = outputs.iter().map(|output| &output.result).collect();
    assert_eq!(stats.frames, 5);
    assert!(stats.positives >= 3);
    assert!(stats.positive_ratio() > 0.0 && stats.positive_ratio() < 0.01);
    Ok(())
}

#[test]
fn undesirable_frames() -> Result<()> {
    let caltech = TargetPreparer::new(&Config::open(CONFIG_DIR.join("caltech.json5"))?)?;
    let undesirable =
        TargetPreparer::new(&Config::open(CONFIG_DIR.join("undesirable.json5"))?)?;

    let store = CaltechAnnotations::open(&*ANNOTATION_FILE)?;
    let frames = store.frames();
    let plain_outputs = caltech.prepare_frames(&store, &frames);
    let outputs = undesirable.prepare_frames(&store, &frames);

    let report = total_report(outputs.iter().map(|output| output.report));
    assert_eq!(report.kept, 3);
    assert_eq!(report.undesirable, 5);
    assert_eq!(report.malformed, 1);

    // undesirable boxes only take negatives away
    plain_outputs
        .iter()
        .zip(&outputs)
        .for_each(|(plain, output)| {
            assert_eq!(plain.result.positives, output.result.positives);
            assert!(output
                .result
                .negatives
                .iter()
                .all(|index| plain.result.negatives.contains(index)));
        });

    let frame = FrameId::new(0, 0, 30);
    let plain = &plain_outputs[1];
    let output = &outputs[1];
    assert_eq!(output.frame, frame);
    assert!(output.result.num_negatives() < plain.result.num_negatives());
    Ok(())
}
