// tests/batch_render.rs

use std::error::Error;

use pipdag::config::ConfigFile;
use pipdag::fs::mock::MockFileSystem;
use pipdag::graph::{TaskGraph, build_graph};
use pipdag::task::output::keys;
use pipdag::task::render::render_submission;
use pipdag::task::TaskId;
use pipdag_test_utils::builders::{ClassificationBuilder, ConfigFileBuilder};
use pipdag_test_utils::mock_context;

type TestResult = Result<(), Box<dyn Error>>;

fn graph_for(cfg: &ConfigFile, fs: &MockFileSystem) -> Result<TaskGraph, Box<dyn Error>> {
    Ok(build_graph(cfg, &mock_context(cfg, fs))?)
}

fn render(cfg: &ConfigFile, fs: &MockFileSystem, graph: &TaskGraph, id: TaskId) -> anyhow::Result<String> {
    Ok(render_submission(&mock_context(cfg, fs), graph, id)?.script)
}

fn classifier_tasks(graph: &TaskGraph, name: &str) -> Vec<TaskId> {
    graph.find(|t| t.name() == name && t.as_classifier().is_some())
}

#[test]
fn simulation_script_substitutes_placeholders() -> TestResult {
    let fs = MockFileSystem::new();
    let cfg = ConfigFileBuilder::new().with_simulation("SIM", 2).build();
    let graph = graph_for(&cfg, &fs)?;
    let sim = graph.by_name("SIM").unwrap();

    let script = render(&cfg, &fs, &graph, sim)?;

    assert!(script.starts_with("#!/bin/bash\n#SBATCH --job-name=out__SIM\n"));
    assert!(script.contains("#SBATCH --time=00:55:00"));
    assert!(script.contains("#SBATCH --cpus-per-task=4"));
    assert!(script.contains("# REPLICATES: 2"));
    assert!(script.contains("sim_input SIM --outdir /out/1_SIM/SIM"));
    assert!(script.contains("echo SUCCESS > /out/1_SIM/SIM/done.txt"));
    Ok(())
}

#[test]
fn rendering_is_deterministic() -> TestResult {
    let fs = MockFileSystem::new();
    let cfg = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_lcfit("FIT", "")
        .with_classification(
            ClassificationBuilder::new("SNIRF", "SnirfClassifier")
                .train()
                .opt("N_ESTIMATORS", 200i64)
                .opt("FEATURES", "x1 c")
                .build(),
        )
        .build();
    let graph = graph_for(&cfg, &fs)?;
    let id = classifier_tasks(&graph, "SNIRF")[0];

    let first = render(&cfg, &fs, &graph, id)?;
    let second = render(&cfg, &fs, &graph, id)?;
    assert_eq!(first, second);
    assert!(first.contains("# OPTS: FEATURES=\"x1 c\" N_ESTIMATORS=200"));
    Ok(())
}

#[test]
fn lcfit_reads_folders_of_its_sim() -> TestResult {
    let fs = MockFileSystem::new();
    let cfg = ConfigFileBuilder::new()
        .with_simulation("SIM", 2)
        .with_lcfit("FIT", "")
        .build();
    let graph = graph_for(&cfg, &fs)?;
    let fit = graph.by_name("FIT_SIM").unwrap();

    let script = render(&cfg, &fs, &graph, fit)?;
    assert!(script.contains(
        "split_and_fit /out/1_SIM/SIM/SIM-0001 /out/1_SIM/SIM/SIM-0002 --outdir /out/2_LCFIT/FIT_SIM"
    ));
    assert!(script.contains("# FITOPTS: DEFAULT=FITOPT000.FITRES.gz"));
    Ok(())
}

#[test]
fn nearest_neighbour_predict_uses_trainer_model() -> TestResult {
    let fs = MockFileSystem::new();
    let cfg = ConfigFileBuilder::new()
        .with_simulation("SIM_TRAIN", 1)
        .with_simulation_types("SIM_TEST", 1, &[])
        .with_lcfit("FIT", "")
        .with_classification(
            ClassificationBuilder::new("NN_TRAIN", "NearestNeighborPyClassifier")
                .train()
                .mask_sim("TRAIN")
                .build(),
        )
        .with_classification(
            ClassificationBuilder::new("NN_TEST", "NearestNeighborPyClassifier")
                .mask("TEST")
                .model("NN_TRAIN")
                .build(),
        )
        .build();
    let graph = graph_for(&cfg, &fs)?;

    let trainer = classifier_tasks(&graph, "NN_TRAIN")[0];
    let model = graph
        .task(trainer)
        .output()
        .path(keys::MODEL_FILENAME)
        .unwrap()
        .display()
        .to_string();

    let predict = classifier_tasks(&graph, "NN_TEST");
    assert_eq!(predict.len(), 1);
    let script = render(&cfg, &fs, &graph, predict[0])?;

    assert!(script.contains("nearest_neighbour_python.py -p --features "));
    assert!(script.contains(&format!("--model {model}")));
    // No Ia types on the sim: predict falls back to type 1.
    assert!(script.contains("--types 1 "));
    assert!(script.contains("/out/2_LCFIT/FIT_SIM_TEST/output/SIM_TEST-0001/FITOPT000.FITRES.gz"));
    Ok(())
}

#[test]
fn nearest_neighbour_training_needs_ia_types() -> TestResult {
    let fs = MockFileSystem::new();
    let cfg = ConfigFileBuilder::new()
        .with_simulation_types("SIM", 1, &[])
        .with_lcfit("FIT", "")
        .with_classification(
            ClassificationBuilder::new("NN", "NearestNeighborPyClassifier")
                .train()
                .build(),
        )
        .build();
    let graph = graph_for(&cfg, &fs)?;
    let id = classifier_tasks(&graph, "NN")[0];

    let err = render(&cfg, &fs, &graph, id).unwrap_err();
    assert!(err.to_string().contains("No Ia types"));
    Ok(())
}

#[test]
fn sim_based_classifier_reads_its_replicate_folder() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/models/snn/model.pt", "weights");
    let cfg = ConfigFileBuilder::new()
        .with_simulation("SIM", 2)
        .with_classification(
            ClassificationBuilder::new("SNN", "SuperNNovaClassifier")
                .model("/models/snn/model.pt")
                .build(),
        )
        .build();
    let graph = graph_for(&cfg, &fs)?;
    let ids = classifier_tasks(&graph, "SNN");
    assert_eq!(ids.len(), 2);

    let script = render(&cfg, &fs, &graph, ids[1])?;
    assert!(script.contains("supernnova_classifier.py --predict --done_file "));
    assert!(script.contains("--name PROB_snn"));
    assert!(script.contains("--model /models/snn/model.pt /out/1_SIM/SIM/SIM-0002\n"));
    assert!(script.contains("# INDEX: 1"));
    Ok(())
}

#[test]
fn batch_replace_overrides_header_values() -> TestResult {
    let fs = MockFileSystem::new();
    let mut replace = toml::Table::new();
    replace.insert("REPLACE_WALLTIME".to_string(), "10:00:00".into());
    replace.insert("REPLACE_MEM".to_string(), "32GB".into());

    let cfg = ConfigFileBuilder::new()
        .with_simulation("SIM", 1)
        .with_classification(
            ClassificationBuilder::new("UNITY", "UnityClassifier")
                .opt("BATCH_REPLACE", toml::Value::Table(replace))
                .build(),
        )
        .build();
    let graph = graph_for(&cfg, &fs)?;
    let id = classifier_tasks(&graph, "UNITY")[0];

    let script = render(&cfg, &fs, &graph, id)?;
    assert!(script.contains("#SBATCH --time=10:00:00"));
    assert!(script.contains("#SBATCH --mem=32GB"));
    Ok(())
}

#[test]
fn header_file_replaces_builtin_header() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/templates/pbs.sh", "#!/bin/bash\n#PBS -N REPLACE_NAME\n#PBS -l walltime=REPLACE_WALLTIME\n");
    let cfg = ConfigFileBuilder::new()
        .with_header_file("/templates/pbs.sh")
        .with_simulation("SIM", 1)
        .build();
    let graph = graph_for(&cfg, &fs)?;
    let sim = graph.by_name("SIM").unwrap();

    let script = render(&cfg, &fs, &graph, sim)?;
    assert!(script.contains("#PBS -N out__SIM\n"));
    assert!(script.contains("#PBS -l walltime=00:55:00"));
    assert!(!script.contains("--job-name"));
    Ok(())
}

#[test]
fn missing_header_file_is_an_error() -> TestResult {
    let fs = MockFileSystem::new();
    let cfg = ConfigFileBuilder::new()
        .with_header_file("/templates/missing.sh")
        .with_simulation("SIM", 1)
        .build();
    let graph = graph_for(&cfg, &fs)?;
    let sim = graph.by_name("SIM").unwrap();

    let err = render(&cfg, &fs, &graph, sim).unwrap_err();
    assert!(format!("{err:#}").contains("missing.sh"));
    Ok(())
}
