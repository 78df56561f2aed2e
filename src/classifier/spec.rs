// src/classifier/spec.rs

use std::collections::BTreeMap;

use crate::classifier::registry::ClassifierKind;
use crate::config::model::ClassificationConfig;
use crate::errors::{PipdagError, Result};
use crate::types::Mode;

/// Where a predict-mode classifier gets its trained model from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    /// A serialized model on disk (raw, unresolved value).
    Path(String),
    /// The name of an earlier classification entry acting as trainer.
    Task(String),
}

impl ModelRef {
    /// Anything containing a path separator or an extension is a path.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.contains('/') || value.contains('.') {
            ModelRef::Path(value.to_string())
        } else {
            ModelRef::Task(value.to_string())
        }
    }
}

/// Substring filters narrowing which upstream tasks a classifier applies to.
///
/// Empty strings match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskSet {
    pub mask: String,
    pub mask_sim: String,
    pub mask_fit: String,
}

impl MaskSet {
    pub fn is_empty(&self) -> bool {
        self.mask.is_empty() && self.mask_sim.is_empty() && self.mask_fit.is_empty()
    }
}

/// One validated `[[classification]]` entry.
#[derive(Debug, Clone)]
pub struct ClassifierSpec {
    pub name: String,
    pub kind: ClassifierKind,
    pub mode: Mode,
    pub masks: MaskSet,
    /// The full `opts` table, including `MODEL`. Sorted, so rendering it is
    /// deterministic.
    pub options: BTreeMap<String, toml::Value>,
    pub model: Option<ModelRef>,
}

impl ClassifierSpec {
    /// Per-entry checks. Cross-entry rules (unique names, MODEL
    /// back-references) live in `config::validate`.
    pub fn from_config(cfg: &ClassificationConfig) -> Result<Self> {
        let name = cfg.name.trim().to_string();
        if name.is_empty() {
            return Err(PipdagError::config(
                "<unnamed classification>",
                "classification entries need a non-empty name",
            ));
        }

        let kind = ClassifierKind::from_identifier(&cfg.classifier).ok_or_else(|| {
            let known: Vec<_> = ClassifierKind::identifiers().collect();
            PipdagError::config(
                &name,
                format!(
                    "unknown classifier '{}' (known: {})",
                    cfg.classifier,
                    known.join(", ")
                ),
            )
        })?;

        let mode = match cfg.mode.as_deref() {
            None => {
                return Err(PipdagError::config(
                    &name,
                    "classification needs to specify mode as train or predict",
                ));
            }
            Some(raw) => raw
                .parse::<Mode>()
                .map_err(|msg| PipdagError::config(&name, msg))?,
        };

        if mode == Mode::Train && !kind.trainable() {
            return Err(PipdagError::config(
                &name,
                format!("can not use train mode with {kind}"),
            ));
        }

        let model = match cfg.opts.get("MODEL") {
            None => None,
            Some(toml::Value::String(s)) if !s.trim().is_empty() => Some(ModelRef::parse(s)),
            Some(other) => {
                return Err(PipdagError::config(
                    &name,
                    format!("MODEL must be a non-empty string, got {other}"),
                ));
            }
        };

        if mode == Mode::Predict && kind.predict_needs_model() && model.is_none() {
            return Err(PipdagError::config(
                &name,
                format!(
                    "{kind} is in predict mode but has no MODEL; give a model file path or the name of a training classification"
                ),
            ));
        }

        Ok(Self {
            name,
            kind,
            mode,
            masks: MaskSet {
                mask: cfg.mask.clone(),
                mask_sim: cfg.mask_sim.clone(),
                mask_fit: cfg.mask_fit.clone(),
            },
            options: cfg.opts.clone(),
            model,
        })
    }

    /// String view of an option; non-string values use their TOML rendering.
    pub fn option_str(&self, key: &str) -> Option<String> {
        self.options.get(key).map(|v| match v {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
