use anchor_target::{
    AnnotationStore, AssignmentStats, CaltechAnnotations, Config, FilterReport, FrameAssignment,
    TargetPreparer,
};
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use prettytable::{cell, row, Table};
use rand::prelude::*;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Parser)]
enum Opts {
    /// Print the anchor shapes and grid layout.
    Info {
        /// configuration file
        config_file: PathBuf,
    },
    /// Write the training targets of every annotated frame.
    Assign {
        /// configuration file
        config_file: PathBuf,
        /// annotation file
        annotation_file: PathBuf,
        /// output directory
        output_dir: PathBuf,
        /// sample a training minibatch per frame with this seed
        #[clap(long)]
        sample_seed: Option<u64>,
    },
    /// Print label counts over the annotated frames.
    Stats {
        /// configuration file
        config_file: PathBuf,
        /// annotation file
        annotation_file: PathBuf,
    },
}

fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    match Opts::parse() {
        Opts::Info { config_file } => {
            show_info(config_file)?;
        }
        Opts::Assign {
            config_file,
            annotation_file,
            output_dir,
            sample_seed,
        } => {
            write_targets(config_file, annotation_file, output_dir, sample_seed)?;
        }
        Opts::Stats {
            config_file,
            annotation_file,
        } => {
            show_stats(config_file, annotation_file)?;
        }
    }

    Ok(())
}

fn show_info(config_file: impl AsRef<Path>) -> Result<()> {
    let config = Config::open(config_file)?;
    let preparer = TargetPreparer::new(&config)?;
    let grid = preparer.grid();
    let geometry = grid.geometry();

    // print anchor shapes
    {
        let mut table = Table::new();
        table.add_row(row!["shape", "height", "width"]);

        grid.config()
            .shapes()
            .iter()
            .enumerate()
            .for_each(|(index, shape)| {
                table.add_row(row![
                    index,
                    format!("{:.2}", shape.h()),
                    format!("{:.2}", shape.w())
                ]);
            });

        table.printstd();
    }

    // print grid layout
    {
        let mut table = Table::new();
        let input_size = geometry.input_size();
        let assigner = preparer.assigner();

        table.add_row(row![
            "input size",
            format!("{} x {}", input_size.h(), input_size.w())
        ]);
        table.add_row(row![
            "grid size",
            format!("{} x {}", geometry.rows(), geometry.cols())
        ]);
        table.add_row(row!["cell size", geometry.cell_size()]);
        table.add_row(row!["anchors", assigner.num_anchors()]);
        table.add_row(row!["inside anchors", assigner.num_inside_anchors()]);

        table.printstd();
    }

    Ok(())
}

fn write_targets(
    config_file: impl AsRef<Path>,
    annotation_file: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    sample_seed: Option<u64>,
) -> Result<()> {
    let output_dir = output_dir.as_ref();
    let config = Config::open(config_file)?;
    let preparer = TargetPreparer::new(&config)?;
    let store = CaltechAnnotations::open(annotation_file)?;
    let outputs = preparer.prepare_frames(&store, &store.frames());
    let mut rng = sample_seed.map(StdRng::seed_from_u64);

    outputs.iter().try_for_each(|output| -> Result<_> {
        let output = match &mut rng {
            Some(rng) => FrameAssignment {
                result: preparer.sampler().sample(&output.result, rng),
                ..output.clone()
            },
            None => output.clone(),
        };

        let path = output_dir
            .join(output.frame.path_stem())
            .with_extension("json");
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
        }
        let writer = BufWriter::new(
            File::create(&path)
                .with_context(|| format!("failed to create file '{}'", path.display()))?,
        );
        serde_json::to_writer(writer, &output.to_record())?;
        Ok(())
    })?;

    info!(
        "wrote targets of {} frames to '{}'",
        outputs.len(),
        output_dir.display()
    );
    Ok(())
}

fn show_stats(config_file: impl AsRef<Path>, annotation_file: impl AsRef<Path>) -> Result<()> {
    let config = Config::open(config_file)?;
    let preparer = TargetPreparer::new(&config)?;
    let store = CaltechAnnotations::open(annotation_file)?;
    let outputs = preparer.prepare_frames(&store, &store.frames());

    let stats: AssignmentStats = outputs.iter().map(|output| &output.result).collect();
    let report = outputs
        .iter()
        .fold(FilterReport::default(), |total, output| {
            total.merge(&output.report)
        });

    let mut table = Table::new();
    table.add_row(row!["frames", stats.frames]);
    table.add_row(row!["positive anchors", stats.positives]);
    table.add_row(row!["negative anchors", stats.negatives]);
    table.add_row(row!["positive ratio", format!("{:.4}", stats.positive_ratio())]);
    table.add_row(row!["kept boxes", report.kept]);
    table.add_row(row!["undesirable boxes", report.undesirable]);
    table.add_row(row!["ignored objects", report.ignored]);
    table.add_row(row!["too narrow", report.too_narrow]);
    table.add_row(row!["unknown visibility", report.unknown_visibility]);
    table.add_row(row!["low visibility", report.low_visibility]);
    table.add_row(row!["malformed", report.malformed]);
    table.printstd();

    Ok(())
}
