//! Response synthesis domain
//!
//! Merging several independent provider outputs into one answer, with a
//! quality score per response and a confidence for the merged result.

pub mod engine;
pub mod quality;
pub mod similarity;
pub mod value_objects;

pub use engine::{Candidate, SynthesisEngine};
pub use quality::QualityScorer;
pub use value_objects::{
    QualityScore, QualityWeights, SynthesisMethod, SynthesisOptions, SynthesisResult,
};
