// tests/config_loading.rs

use std::io::Write;
use std::path::Path;

use pipdag::classifier::{ClassifierKind, ModelRef};
use pipdag::config::{ConfigFile, load_and_validate, parse_str};
use pipdag::errors::PipdagError;
use pipdag::types::{MaskMatching, Mode};
use pipdag_test_utils::builders::{ClassificationBuilder, ConfigFileBuilder};
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r##"
[global]
output_dir = "/scratch/pipeline"
mask_matching = "legacy"
poll_interval_secs = 10

[batch]
walltime = "02:00:00"
extra_directives = ["#SBATCH --partition=broadwl"]

[[data_prep]]
name = "DES"
cmd = "prep {output_dir}"
raw_dir = "/data/des"
types_ia = [1, 101]

[[simulation]]
name = "SIM_TRAIN"
cmd = "sim_input train.input"

[[simulation]]
name = "SIM_TEST"
cmd = "sim_input test.input"
replicates = 5

[[lcfit]]
name = "FIT"
cmd = "split_and_fit {sim_folders}"
fitopts = { DEFAULT = "FITOPT000.FITRES.gz", CAL = "FITOPT001.FITRES.gz" }

[[classification]]
name = "NN_TRAIN"
classifier = "NearestNeighborPyClassifier"
mode = "train"
mask_sim = "TRAIN"

[classification.opts]
FEATURES = "x1 c zHD"

[[classification]]
name = "NN_TEST"
classifier = "NearestNeighborPyClassifier"
mode = "Predict"
mask = "TEST"

[classification.opts]
MODEL = "NN_TRAIN"
FITOPT = "CAL"
"##;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn config_error(result: Result<ConfigFile, PipdagError>) -> (String, String) {
    match result {
        Err(PipdagError::Config { entry, message }) => (entry, message),
        Err(e) => panic!("Expected Config error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn full_config_loads_in_file_order() {
    let file = write_config(FULL_CONFIG);
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.global.output_dir, Path::new("/scratch/pipeline"));
    assert_eq!(cfg.global.mask_matching, MaskMatching::Legacy);
    assert_eq!(cfg.global.poll_interval_secs, 10);
    assert_eq!(cfg.batch.walltime, "02:00:00");
    assert_eq!(cfg.batch.mem, "8GB");

    assert_eq!(cfg.simulation[0].replicates, 1);
    assert_eq!(cfg.simulation[1].replicates, 5);
    assert_eq!(cfg.data_prep[0].types_ia, vec![1, 101]);
    assert_eq!(cfg.lcfit[0].effective_fitopts().len(), 2);

    let names: Vec<&str> = cfg.classification.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["NN_TRAIN", "NN_TEST"]);

    let test = &cfg.classification[1];
    assert_eq!(test.kind, ClassifierKind::NearestNeighborPy);
    assert_eq!(test.mode, Mode::Predict);
    assert_eq!(test.masks.mask, "TEST");
    assert_eq!(test.model, Some(ModelRef::Task("NN_TRAIN".to_string())));
    assert_eq!(test.option_str("FITOPT").as_deref(), Some("CAL"));
}

#[test]
fn defaults_apply_to_minimal_config() {
    let raw = parse_str(
        r#"
[[simulation]]
name = "SIM"
cmd = "sim"
"#,
    )
    .unwrap();
    let cfg = ConfigFile::try_from(raw).unwrap();

    assert_eq!(cfg.global.output_dir, Path::new("pipdag_output"));
    assert_eq!(cfg.global.mask_matching, MaskMatching::FitName);
    assert_eq!(cfg.global.poll_interval_secs, 30);
    assert_eq!(cfg.batch.cpus_per_task, 4);
    assert!(cfg.classification.is_empty());
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_config("[[simulation]\nname = ");
    assert!(matches!(load_and_validate(file.path()), Err(PipdagError::Toml(_))));
}

#[test]
fn missing_mode_names_the_entry() {
    let result = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_classification(
            ClassificationBuilder::new("SNN", "SuperNNovaClassifier")
                .without_mode()
                .build(),
        )
        .try_build();

    let (entry, message) = config_error(result);
    assert_eq!(entry, "SNN");
    assert!(message.contains("needs to specify mode"));
}

#[test]
fn invalid_mode_is_rejected() {
    let mut clas = ClassificationBuilder::new("SNN", "SuperNNovaClassifier").build();
    clas.mode = Some("evaluate".to_string());
    let result = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_classification(clas)
        .try_build();

    let (_, message) = config_error(result);
    assert!(message.contains("invalid mode"));
}

#[test]
fn unknown_classifier_lists_known_ones() {
    let result = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_classification(ClassificationBuilder::new("X", "MagicClassifier").build())
        .try_build();

    let (entry, message) = config_error(result);
    assert_eq!(entry, "X");
    assert!(message.contains("MagicClassifier"));
    assert!(message.contains("SnirfClassifier"));
}

#[test]
fn train_mode_rejected_for_untrainable_classifiers() {
    for id in ["PerfectClassifier", "UnityClassifier", "FitProbClassifier"] {
        let result = ConfigFileBuilder::new()
            .with_simulation("SIM", 1)
            .with_lcfit("FIT", "")
            .with_classification(ClassificationBuilder::new("C", id).train().build())
            .try_build();

        let (_, message) = config_error(result);
        assert!(message.contains("can not use train mode"), "{id}: {message}");
    }
}

#[test]
fn predict_without_model_is_rejected_when_a_model_is_needed() {
    let result = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_lcfit("FIT", "")
        .with_classification(
            ClassificationBuilder::new("NN", "NearestNeighborPyClassifier").build(),
        )
        .try_build();

    let (entry, message) = config_error(result);
    assert_eq!(entry, "NN");
    assert!(message.contains("no MODEL"));
}

#[test]
fn forward_model_reference_is_rejected() {
    let result = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_lcfit("FIT", "")
        .with_classification(
            ClassificationBuilder::new("NN_TEST", "NearestNeighborPyClassifier")
                .model("NN_TRAIN")
                .build(),
        )
        .with_classification(
            ClassificationBuilder::new("NN_TRAIN", "NearestNeighborPyClassifier")
                .train()
                .build(),
        )
        .try_build();

    let (entry, message) = config_error(result);
    assert_eq!(entry, "NN_TEST");
    assert!(message.contains("defined later"));
}

#[test]
fn unknown_model_name_is_rejected() {
    let result = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_lcfit("FIT", "")
        .with_classification(
            ClassificationBuilder::new("NN", "NearestNeighborPyClassifier")
                .model("NOBODY")
                .build(),
        )
        .try_build();

    let (_, message) = config_error(result);
    assert!(message.contains("neither a classification name nor a file path"));
}

#[test]
fn duplicate_names_across_sections_are_rejected() {
    let result = ConfigFileBuilder::new()
        .with_simulation("SAME", 1)
        .with_lcfit("SAME", "")
        .try_build();

    let (entry, _) = config_error(result);
    assert_eq!(entry, "SAME");
}

#[test]
fn zero_replicates_and_empty_lcfit_mask_match_are_rejected() {
    let result = ConfigFileBuilder::new().with_simulation("SIM", 0).try_build();
    let (_, message) = config_error(result);
    assert!(message.contains("replicates"));

    let result = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_lcfit("FIT", "NOTHING")
        .try_build();
    let (entry, _) = config_error(result);
    assert_eq!(entry, "FIT");
}

#[test]
fn config_without_upstream_stages_is_rejected() {
    let result = ConfigFileBuilder::new().try_build();
    assert!(matches!(result, Err(PipdagError::Config { .. })));
}
