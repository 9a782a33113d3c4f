use thiserror::Error;

/// A feature/target pick the controller refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("column `{0}` is already the target")]
    TargetConflict(String),
    #[error("column `{0}` is already selected as a feature")]
    FeatureConflict(String),
}
