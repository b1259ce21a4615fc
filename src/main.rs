use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use agrimap_io::{
    ClassAreaEntry, ClassScoreEntry, ClassTaxonomy, ConfusionEntry, FeatureImportanceEntry, PredictionSummary,
    ReportWriter, TrainingSummary, TrainingTableReader, TrainingTableWriter, feature_settings_path, require_input,
    write_zonal_csv,
};
use agrimap_raster::{
    ClassRaster, FeatureConfig, FeatureTable, LabelRaster, LabelSource, RandomLabels, build_training_rows,
    extract_features, read_class_raster, read_raster, write_class_raster,
};
use agrimap_rf::{ConfusionMatrix, CrossValidation, RandomForest, RandomForestConfig, TrainTestSplit, train_and_validate};
use agrimap_zonal::{read_regions, zonal_statistics};

#[derive(Parser)]
#[command(name = "agrimap")]
#[command(about = "NDVI crop classification, crop mapping and regional crop area statistics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Crop class taxonomy JSON (defaults to the built-in four classes)
    #[arg(long, global = true)]
    taxonomy: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract per-pixel NDVI features, attach labels and write the training table
    Prepare {
        /// Multi-band NDVI GeoTIFF
        #[arg(long)]
        raster: PathBuf,

        /// Co-registered single-band ground-truth class raster (0 = unlabeled).
        /// Without it, labels are drawn at random from the taxonomy.
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Training table CSV to write
        #[arg(long)]
        output: PathBuf,

        /// Number of leading bands the mean, std and range are computed over
        #[arg(long, default_value_t = 3)]
        derived_bands: usize,
    },

    /// Train and validate the random forest on a training table
    Train {
        /// Training table CSV written by `prepare`
        #[arg(long)]
        table: PathBuf,

        /// Model file to write
        #[arg(long)]
        model: PathBuf,

        /// Directory for `training_report.json`
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Number of trees in the forest
        #[arg(long, default_value_t = 100)]
        trees: usize,

        /// Maximum tree depth (0 = unlimited)
        #[arg(long, default_value_t = 10)]
        max_depth: usize,

        /// Minimum samples required to split a node
        #[arg(long, default_value_t = 5)]
        min_samples_split: usize,

        /// Number of cross-validation folds on the training partition
        #[arg(long, default_value_t = 5)]
        folds: usize,

        /// Fraction of each class held out for testing
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
    },

    /// Classify every pixel of an NDVI raster
    Predict {
        /// Model file written by `train`
        #[arg(long)]
        model: PathBuf,

        /// Multi-band NDVI GeoTIFF
        #[arg(long)]
        raster: PathBuf,

        /// Classified GeoTIFF to write
        #[arg(long)]
        output: PathBuf,

        /// Treatment of pixels with a missing band value: "fill-zero" or "background"
        #[arg(long, default_value = "fill-zero")]
        missing: String,

        /// Number of leading bands the mean, std and range are computed over.
        /// Defaults to the model's; any other value is rejected.
        #[arg(long)]
        derived_bands: Option<usize>,

        /// Directory for `prediction_report.json`
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Tally classified pixels per district and taluk
    Zonal {
        /// Classified GeoTIFF written by `predict`
        #[arg(long)]
        classified: PathBuf,

        /// District boundaries (GeoJSON FeatureCollection, raster CRS)
        #[arg(long)]
        districts: PathBuf,

        /// Feature property holding the district name
        #[arg(long, default_value = "DISTRICT")]
        district_field: String,

        /// Taluk boundaries (GeoJSON FeatureCollection, raster CRS)
        #[arg(long)]
        taluks: Option<PathBuf>,

        /// Feature property holding the taluk name
        #[arg(long, default_value = "TALUK")]
        taluk_field: String,

        /// Output directory for the area CSVs
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingPolicy {
    FillZero,
    Background,
}

impl MissingPolicy {
    fn as_str(self) -> &'static str {
        match self {
            Self::FillZero => "fill-zero",
            Self::Background => "background",
        }
    }
}

fn parse_missing_policy(s: &str) -> Result<MissingPolicy> {
    match s {
        "fill-zero" => Ok(MissingPolicy::FillZero),
        "background" => Ok(MissingPolicy::Background),
        other => anyhow::bail!("unknown missing-value policy: {other} (expected fill-zero or background)"),
    }
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct PrepareOutput {
    output: String,
    label_source: &'static str,
    rows: usize,
    cols: usize,
    n_bands: usize,
    n_samples: usize,
    n_unlabeled: usize,
    n_incomplete: usize,
    class_distribution: BTreeMap<usize, usize>,
}

#[derive(Serialize)]
struct ZonalOutput {
    classified: String,
    outputs: Vec<ZonalFileOutput>,
}

#[derive(Serialize)]
struct ZonalFileOutput {
    path: String,
    n_regions: usize,
    n_records: usize,
}

fn load_taxonomy(path: Option<&Path>) -> Result<ClassTaxonomy> {
    match path {
        Some(path) => {
            require_input(path, "taxonomy file", None)?;
            let taxonomy = ClassTaxonomy::from_json_file(path).context("failed to load class taxonomy")?;
            info!(n_classes = taxonomy.entries().len(), "taxonomy loaded");
            Ok(taxonomy)
        }
        None => Ok(ClassTaxonomy::default()),
    }
}

fn class_name(taxonomy: &ClassTaxonomy, class_id: usize) -> String {
    match u8::try_from(class_id) {
        Ok(id) => taxonomy.name(id).into_owned(),
        Err(_) => format!("Class {class_id}"),
    }
}

fn confusion_entry(matrix: &ConfusionMatrix) -> ConfusionEntry {
    let ids = matrix.class_ids();
    ConfusionEntry {
        class_ids: ids.to_vec(),
        counts: ids
            .iter()
            .map(|&t| ids.iter().map(|&p| matrix.count(t, p)).collect())
            .collect(),
    }
}

fn prepare(
    raster_path: &Path,
    labels_path: Option<&Path>,
    output: &Path,
    derived_bands: usize,
    taxonomy: &ClassTaxonomy,
    seed: u64,
) -> Result<()> {
    require_input(raster_path, "NDVI raster", None)?;
    if let Some(labels_path) = labels_path {
        require_input(labels_path, "label raster", None)?;
    }

    let raster = read_raster(raster_path).context("failed to read NDVI raster")?;
    let config = FeatureConfig::new(derived_bands)?;
    let table = extract_features(&raster, &config).context("feature extraction failed")?;

    let source: Box<dyn LabelSource> = match labels_path {
        Some(path) => Box::new(LabelRaster::open(path).context("failed to read label raster")?),
        None => {
            warn!("no label raster given; assigning random placeholder labels, the model will not be meaningful");
            let ids = taxonomy.ids().into_iter().map(i32::from).collect();
            Box::new(RandomLabels::new(ids, seed)?)
        }
    };
    let labels = source
        .assign(raster.grid())
        .with_context(|| format!("label assignment from {} failed", source.describe()))?;
    let labeled = build_training_rows(&table, &labels)?;
    if labeled.rows.is_empty() {
        anyhow::bail!("no labeled pixels with complete features in {}", raster_path.display());
    }

    let writer = TrainingTableWriter::new(output);
    writer
        .write(&labeled.columns, &labeled.rows, &labeled.labels)
        .context("failed to write training table")?;
    writer
        .write_feature_settings(&config)
        .context("failed to record feature settings")?;

    let grid = raster.grid();
    let summary = PrepareOutput {
        output: output.display().to_string(),
        label_source: source.describe(),
        rows: grid.rows,
        cols: grid.cols,
        n_bands: raster.n_bands(),
        n_samples: labeled.rows.len(),
        n_unlabeled: labeled.n_unlabeled,
        n_incomplete: labeled.n_incomplete,
        class_distribution: labeled.class_distribution(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn train(
    table_path: &Path,
    model_path: &Path,
    report_dir: Option<&Path>,
    config: &RandomForestConfig,
    folds: usize,
    test_fraction: f64,
    taxonomy: &ClassTaxonomy,
    seed: u64,
) -> Result<()> {
    require_input(table_path, "training table", Some("run `agrimap prepare` first"))?;

    let reader = TrainingTableReader::new(table_path);
    let table = reader.read().context("failed to read training table")?;
    info!(n_samples = table.rows.len(), n_dropped = table.n_dropped, "training table loaded");
    let features = match reader
        .read_feature_settings::<FeatureConfig>()
        .context("failed to read feature settings")?
    {
        Some(features) => features,
        None => {
            warn!(
                path = %feature_settings_path(table_path).display(),
                "no feature settings beside the table, assuming the defaults"
            );
            FeatureConfig::default()
        }
    };

    let holdout = TrainTestSplit::new(test_fraction)?.with_seed(seed);
    let cv = CrossValidation::new(folds)?.with_seed(seed);
    let outcome = train_and_validate(config, &holdout, &cv, &table.rows, &table.labels, &table.columns)
        .context("training failed")?;
    info!(
        cv_mean_accuracy = outcome.cross_validation.mean_accuracy,
        cv_std_accuracy = outcome.cross_validation.std_accuracy,
        test_accuracy = outcome.test_accuracy,
        "model validated"
    );

    outcome
        .forest
        .save(model_path, &features)
        .context("failed to save model")?;

    let mut class_distribution = BTreeMap::new();
    for &label in &table.labels {
        *class_distribution.entry(label).or_insert(0) += 1;
    }
    let summary = TrainingSummary {
        table: table_path.display().to_string(),
        model: model_path.display().to_string(),
        feature_columns: table.columns.clone(),
        n_samples: table.rows.len(),
        n_dropped: table.n_dropped,
        class_distribution,
        n_train: outcome.n_train,
        n_test: outcome.n_test,
        n_trees: config.n_trees(),
        max_depth: config.max_depth(),
        min_samples_split: config.min_samples_split(),
        seed,
        fold_accuracies: outcome.cross_validation.fold_accuracies.clone(),
        cv_mean_accuracy: outcome.cross_validation.mean_accuracy,
        cv_std_accuracy: outcome.cross_validation.std_accuracy,
        train_accuracy: outcome.train_accuracy,
        test_accuracy: outcome.test_accuracy,
        feature_importances: outcome
            .importances
            .iter()
            .map(|f| FeatureImportanceEntry {
                name: f.name.clone(),
                importance: f.importance,
                rank: f.rank,
            })
            .collect(),
        test_confusion: confusion_entry(&outcome.test_confusion),
        class_metrics: outcome
            .test_confusion
            .class_metrics()
            .into_iter()
            .map(|m| ClassScoreEntry {
                class_id: m.class_id,
                crop_type: class_name(taxonomy, m.class_id),
                precision: m.precision,
                recall: m.recall,
                f1: m.f1,
                support: m.support,
            })
            .collect(),
    };

    if let Some(dir) = report_dir {
        let path = ReportWriter::new(dir)?.write_training_report(&summary)?;
        info!(path = %path.display(), "training report written");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn predict(
    model_path: &Path,
    raster_path: &Path,
    output: &Path,
    policy: MissingPolicy,
    derived_bands: Option<usize>,
    report_dir: Option<&Path>,
    taxonomy: &ClassTaxonomy,
) -> Result<()> {
    require_input(model_path, "model", Some("run `agrimap train` first"))?;
    require_input(raster_path, "NDVI raster", None)?;

    let (forest, config): (RandomForest, FeatureConfig) =
        RandomForest::load(model_path).context("failed to load model")?;
    if let Some(requested) = derived_bands.filter(|&n| n != config.derived_band_count()) {
        anyhow::bail!(
            "model was trained with {} derived bands, --derived-bands {requested} does not match",
            config.derived_band_count()
        );
    }
    let raster = read_raster(raster_path).context("failed to read NDVI raster")?;
    let mut table = extract_features(&raster, &config).context("feature extraction failed")?;
    forest
        .check_schema(table.columns())
        .context("raster features do not match the model")?;

    let missing = table.fill_missing(0.0);
    if !missing.is_empty() {
        warn!(n_missing = missing.len(), policy = policy.as_str(), "pixels with missing band values");
    }

    let predicted = forest.predict_batch(table.rows()).context("prediction failed")?;
    let mut classes = predicted
        .into_iter()
        .map(|c| u8::try_from(c).with_context(|| format!("class id {c} does not fit a byte raster")))
        .collect::<Result<Vec<u8>>>()?;
    if policy == MissingPolicy::Background {
        for &i in &missing {
            classes[i] = 0;
        }
    }

    let grid = raster.grid().clone();
    let classified = ClassRaster::new(FeatureTable::reshape(classes, grid.rows, grid.cols)?, grid)?;
    write_class_raster(output, &classified).context("failed to write classified raster")?;

    let grid = classified.grid();
    let pixel_area_ha = grid.transform.pixel_area_ha();
    let summary = PredictionSummary {
        model: model_path.display().to_string(),
        raster: raster_path.display().to_string(),
        output: output.display().to_string(),
        rows: grid.rows,
        cols: grid.cols,
        epsg: grid.spatial_ref.epsg(),
        missing_policy: policy.as_str().to_owned(),
        n_missing: missing.len(),
        pixel_area_ha,
        classes: classified
            .class_counts()
            .into_iter()
            .map(|(id, pixel_count)| ClassAreaEntry {
                class_id: id,
                crop_type: taxonomy.name(id).into_owned(),
                color: taxonomy.color(id).map(str::to_owned),
                pixel_count,
                area_ha: pixel_count as f64 * pixel_area_ha,
            })
            .collect(),
    };
    for class in &summary.classes {
        info!(
            class_id = class.class_id,
            crop_type = %class.crop_type,
            pixels = class.pixel_count,
            area_ha = class.area_ha,
            "predicted class area"
        );
    }

    if let Some(dir) = report_dir {
        let path = ReportWriter::new(dir)?.write_prediction_report(&summary)?;
        info!(path = %path.display(), "prediction report written");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn zonal_file(
    classified: &ClassRaster,
    boundaries: &Path,
    name_field: &str,
    region_type: &str,
    output: PathBuf,
    taxonomy: &ClassTaxonomy,
) -> Result<ZonalFileOutput> {
    let regions = read_regions(boundaries, name_field, region_type)
        .with_context(|| format!("failed to read {region_type} boundaries"))?;
    let records = zonal_statistics(classified, &regions, taxonomy)
        .with_context(|| format!("{region_type} statistics failed"))?;
    write_zonal_csv(&output, &records)?;
    Ok(ZonalFileOutput {
        path: output.display().to_string(),
        n_regions: regions.len(),
        n_records: records.len(),
    })
}

fn zonal(
    classified_path: &Path,
    districts: &Path,
    district_field: &str,
    taluks: Option<&Path>,
    taluk_field: &str,
    output_dir: &Path,
    taxonomy: &ClassTaxonomy,
) -> Result<()> {
    require_input(classified_path, "classified raster", Some("run `agrimap predict` first"))?;
    require_input(districts, "district boundaries", None)?;
    if let Some(taluks) = taluks {
        require_input(taluks, "taluk boundaries", None)?;
    }

    let classified = read_class_raster(classified_path).context("failed to read classified raster")?;
    let mut outputs = vec![zonal_file(
        &classified,
        districts,
        district_field,
        "District",
        output_dir.join("districtwise_crop_area.csv"),
        taxonomy,
    )?];
    if let Some(taluks) = taluks {
        outputs.push(zonal_file(
            &classified,
            taluks,
            taluk_field,
            "Taluk",
            output_dir.join("talukwise_crop_area.csv"),
            taxonomy,
        )?);
    }

    let summary = ZonalOutput {
        classified: classified_path.display().to_string(),
        outputs,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    let taxonomy = load_taxonomy(cli.taxonomy.as_deref())?;

    match cli.command {
        Command::Prepare {
            raster,
            labels,
            output,
            derived_bands,
        } => prepare(&raster, labels.as_deref(), &output, derived_bands, &taxonomy, cli.seed),

        Command::Train {
            table,
            model,
            report_dir,
            trees,
            max_depth,
            min_samples_split,
            folds,
            test_fraction,
        } => {
            let config = RandomForestConfig::new(trees)?
                .with_max_depth((max_depth > 0).then_some(max_depth))
                .with_min_samples_split(min_samples_split)
                .with_seed(cli.seed);
            train(
                &table,
                &model,
                report_dir.as_deref(),
                &config,
                folds,
                test_fraction,
                &taxonomy,
                cli.seed,
            )
        }

        Command::Predict {
            model,
            raster,
            output,
            missing,
            derived_bands,
            report_dir,
        } => predict(
            &model,
            &raster,
            &output,
            parse_missing_policy(&missing)?,
            derived_bands,
            report_dir.as_deref(),
            &taxonomy,
        ),

        Command::Zonal {
            classified,
            districts,
            district_field,
            taluks,
            taluk_field,
            output_dir,
        } => zonal(
            &classified,
            &districts,
            &district_field,
            taluks.as_deref(),
            &taluk_field,
            &output_dir,
            &taxonomy,
        ),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
