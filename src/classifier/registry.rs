// src/classifier/registry.rs

//! Static registry of supported classifier implementations.

use std::fmt;

/// What upstream data a classifier implementation consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    /// Needs simulation / data-prep photometry.
    pub needs_sim: bool,
    /// Needs a light-curve-fit FITRES file.
    pub needs_fit: bool,
}

impl Requirements {
    pub const fn new(needs_sim: bool, needs_fit: bool) -> Self {
        Self { needs_sim, needs_fit }
    }
}

/// The closed set of classifier implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierKind {
    SuperNNova,
    Snirf,
    NearestNeighbor,
    NearestNeighborPy,
    FitProb,
    Perfect,
    Unity,
}

const REGISTRY: &[(&str, ClassifierKind)] = &[
    ("SuperNNovaClassifier", ClassifierKind::SuperNNova),
    ("SnirfClassifier", ClassifierKind::Snirf),
    ("NearestNeighborClassifier", ClassifierKind::NearestNeighbor),
    ("NearestNeighborPyClassifier", ClassifierKind::NearestNeighborPy),
    ("FitProbClassifier", ClassifierKind::FitProb),
    ("PerfectClassifier", ClassifierKind::Perfect),
    ("UnityClassifier", ClassifierKind::Unity),
];

impl ClassifierKind {
    /// Look up an implementation by its configuration identifier.
    pub fn from_identifier(id: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(name, _)| *name == id.trim())
            .map(|(_, kind)| *kind)
    }

    /// All registered identifiers, for error messages.
    pub fn identifiers() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(name, _)| *name)
    }

    pub fn identifier(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("UnknownClassifier")
    }

    /// Static requirement declaration. Depends only on the implementation.
    pub fn requirements(&self) -> Requirements {
        match self {
            ClassifierKind::SuperNNova => Requirements::new(true, false),
            ClassifierKind::Snirf => Requirements::new(true, true),
            ClassifierKind::NearestNeighbor => Requirements::new(false, true),
            ClassifierKind::NearestNeighborPy => Requirements::new(false, true),
            ClassifierKind::FitProb => Requirements::new(false, true),
            ClassifierKind::Perfect => Requirements::new(true, false),
            ClassifierKind::Unity => Requirements::new(true, false),
        }
    }

    /// Whether `mode = "train"` is meaningful for this implementation.
    pub fn trainable(&self) -> bool {
        !matches!(
            self,
            ClassifierKind::FitProb | ClassifierKind::Perfect | ClassifierKind::Unity
        )
    }

    /// Whether predict mode needs a MODEL option.
    pub fn predict_needs_model(&self) -> bool {
        self.trainable()
    }

    /// Script invoked by the batch job.
    pub fn program(&self) -> &'static str {
        match self {
            ClassifierKind::SuperNNova => "supernnova_classifier.py",
            ClassifierKind::Snirf => "snirf_classifier.py",
            ClassifierKind::NearestNeighbor => "nearest_neighbour_classifier.py",
            ClassifierKind::NearestNeighborPy => "nearest_neighbour_python.py",
            ClassifierKind::FitProb => "fitprob_classifier.py",
            ClassifierKind::Perfect => "perfect_classifier.py",
            ClassifierKind::Unity => "unity_classifier.py",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}
