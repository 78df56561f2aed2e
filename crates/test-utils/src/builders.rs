#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use pipdag::config::{
    BatchSection, ClassificationConfig, ConfigFile, DataPrepConfig, GlobalSection, LcfitConfig,
    RawConfigFile, SimulationConfig,
};
use pipdag::errors::PipdagError;
use pipdag::types::MaskMatching;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Output goes to `/out` unless overridden, which suits
/// [`pipdag::fs::mock::MockFileSystem`].
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                global: GlobalSection {
                    output_dir: PathBuf::from("/out"),
                    ..GlobalSection::default()
                },
                batch: BatchSection::default(),
                data_prep: Vec::new(),
                simulation: Vec::new(),
                lcfit: Vec::new(),
                classification: Vec::new(),
            },
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.global.output_dir = dir.into();
        self
    }

    pub fn with_model_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.global.model_root = Some(dir.into());
        self
    }

    pub fn with_mask_matching(mut self, matching: MaskMatching) -> Self {
        self.config.global.mask_matching = matching;
        self
    }

    pub fn with_header_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.batch.header_file = Some(path.into());
        self
    }

    pub fn with_data_prep(mut self, name: &str, raw_dir: &str, types_ia: &[i64]) -> Self {
        self.config.data_prep.push(DataPrepConfig {
            name: name.to_string(),
            cmd: format!("prep_data {raw_dir}"),
            raw_dir: PathBuf::from(raw_dir),
            types_ia: types_ia.to_vec(),
        });
        self
    }

    pub fn with_simulation(self, name: &str, replicates: usize) -> Self {
        self.with_simulation_types(name, replicates, &[1])
    }

    pub fn with_simulation_types(mut self, name: &str, replicates: usize, types_ia: &[i64]) -> Self {
        self.config.simulation.push(SimulationConfig {
            name: name.to_string(),
            cmd: format!("sim_input {name} --outdir {{output_dir}}"),
            replicates,
            types_ia: types_ia.to_vec(),
        });
        self
    }

    pub fn with_lcfit(mut self, name: &str, mask: &str) -> Self {
        self.config.lcfit.push(LcfitConfig {
            name: name.to_string(),
            cmd: "split_and_fit {sim_folders} --outdir {output_dir}".to_string(),
            mask: mask.to_string(),
            fitopts: BTreeMap::new(),
        });
        self
    }

    pub fn with_classification(mut self, clas: ClassificationConfig) -> Self {
        self.config.classification.push(clas);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile, PipdagError> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ClassificationConfig`.
pub struct ClassificationBuilder {
    clas: ClassificationConfig,
}

impl ClassificationBuilder {
    pub fn new(name: &str, classifier: &str) -> Self {
        Self {
            clas: ClassificationConfig {
                name: name.to_string(),
                classifier: classifier.to_string(),
                mode: Some("predict".to_string()),
                mask: String::new(),
                mask_sim: String::new(),
                mask_fit: String::new(),
                opts: BTreeMap::new(),
            },
        }
    }

    pub fn train(mut self) -> Self {
        self.clas.mode = Some("train".to_string());
        self
    }

    pub fn predict(mut self) -> Self {
        self.clas.mode = Some("predict".to_string());
        self
    }

    pub fn without_mode(mut self) -> Self {
        self.clas.mode = None;
        self
    }

    pub fn mask(mut self, mask: &str) -> Self {
        self.clas.mask = mask.to_string();
        self
    }

    pub fn mask_sim(mut self, mask: &str) -> Self {
        self.clas.mask_sim = mask.to_string();
        self
    }

    pub fn mask_fit(mut self, mask: &str) -> Self {
        self.clas.mask_fit = mask.to_string();
        self
    }

    pub fn opt(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.clas.opts.insert(key.to_string(), value.into());
        self
    }

    pub fn model(self, model: &str) -> Self {
        self.opt("MODEL", model)
    }

    pub fn build(self) -> ClassificationConfig {
        self.clas
    }
}
