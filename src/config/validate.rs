// src/config/validate.rs

use std::collections::{HashMap, HashSet};

use crate::classifier::{ClassifierSpec, ModelRef};
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PipdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let classification = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, classification))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<Vec<ClassifierSpec>> {
    ensure_has_stages(cfg)?;
    validate_unique_names(cfg)?;
    validate_upstream_entries(cfg)?;
    validate_lcfit_masks(cfg)?;

    let specs = cfg
        .classification
        .iter()
        .map(ClassifierSpec::from_config)
        .collect::<Result<Vec<_>>>()?;

    validate_model_references(&specs)?;
    Ok(specs)
}

fn ensure_has_stages(cfg: &RawConfigFile) -> Result<()> {
    if cfg.data_prep.is_empty() && cfg.simulation.is_empty() {
        return Err(PipdagError::config(
            "<config>",
            "config must contain at least one [[data_prep]] or [[simulation]] entry",
        ));
    }
    Ok(())
}

fn validate_unique_names(cfg: &RawConfigFile) -> Result<()> {
    let names = cfg
        .data_prep
        .iter()
        .map(|d| ("data_prep", d.name.as_str()))
        .chain(cfg.simulation.iter().map(|s| ("simulation", s.name.as_str())))
        .chain(cfg.lcfit.iter().map(|l| ("lcfit", l.name.as_str())))
        .chain(
            cfg.classification
                .iter()
                .map(|c| ("classification", c.name.as_str())),
        );

    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (section, name) in names {
        if name.trim().is_empty() {
            return Err(PipdagError::config(
                format!("<unnamed {section}>"),
                "every entry needs a non-empty name",
            ));
        }
        if let Some(prev) = seen.insert(name, section) {
            return Err(PipdagError::config(
                name,
                format!("name is used by both a {prev} entry and a {section} entry"),
            ));
        }
    }
    Ok(())
}

fn validate_upstream_entries(cfg: &RawConfigFile) -> Result<()> {
    for d in &cfg.data_prep {
        if d.cmd.trim().is_empty() {
            return Err(PipdagError::config(&d.name, "cmd must not be empty"));
        }
    }
    for s in &cfg.simulation {
        if s.cmd.trim().is_empty() {
            return Err(PipdagError::config(&s.name, "cmd must not be empty"));
        }
        if s.replicates == 0 {
            return Err(PipdagError::config(
                &s.name,
                "replicates must be >= 1 (got 0)",
            ));
        }
    }
    for l in &cfg.lcfit {
        if l.cmd.trim().is_empty() {
            return Err(PipdagError::config(&l.name, "cmd must not be empty"));
        }
    }
    Ok(())
}

fn validate_lcfit_masks(cfg: &RawConfigFile) -> Result<()> {
    let upstream: Vec<&str> = cfg
        .data_prep
        .iter()
        .map(|d| d.name.as_str())
        .chain(cfg.simulation.iter().map(|s| s.name.as_str()))
        .collect();

    for l in &cfg.lcfit {
        if !upstream.iter().any(|name| name.contains(l.mask.as_str())) {
            return Err(PipdagError::config(
                &l.name,
                format!("mask '{}' matches no data_prep or simulation entry", l.mask),
            ));
        }
    }
    Ok(())
}

/// MODEL values naming another classification must point at an entry
/// defined *earlier* in the file.
fn validate_model_references(specs: &[ClassifierSpec]) -> Result<()> {
    let all: HashSet<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    let mut earlier: HashSet<&str> = HashSet::new();

    for spec in specs {
        if let Some(ModelRef::Task(target)) = &spec.model {
            if target == &spec.name {
                return Err(PipdagError::config(
                    &spec.name,
                    "MODEL cannot refer to the classification itself",
                ));
            }
            if !earlier.contains(target.as_str()) {
                let message = if all.contains(target.as_str()) {
                    format!(
                        "MODEL '{target}' is defined later in the config; a trainer must come before the classifications that use it"
                    )
                } else {
                    format!("MODEL '{target}' is neither a classification name nor a file path")
                };
                return Err(PipdagError::config(&spec.name, message));
            }
        }
        earlier.insert(spec.name.as_str());
    }
    Ok(())
}
