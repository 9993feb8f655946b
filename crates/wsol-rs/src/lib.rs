pub mod bbox;
pub mod error;
pub mod eval;
pub mod mask;
pub mod metadata;
pub mod params;
pub mod scoremap;
pub mod types;

pub use error::EvalError;
pub use eval::{build_evaluator, evaluate_localization, BoxEvaluator, Evaluator, MaskEvaluator};
pub use metadata::{configure_metadata, Metadata};
pub use params::{DatasetName, EvalParams, EvaluationMode};
pub use types::{BoundingBox, ImageSize, LabelMask, ScoreMap};
