use thiserror::Error;

/// Typed failures raised by the classifier crate.
///
/// Most public functions return `anyhow::Result`; these variants are what
/// ends up inside when the problem is with the data or parameters rather
/// than with IO.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("length mismatch: {what} has {actual} rows, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
    #[error("labels must be 0 or 1, found {0}")]
    InvalidLabel(u8),
    #[error("training labels contain a single class ({0}); both classes are required")]
    SingleClass(u8),
    #[error("class {class} has only {count} member(s); at least {required} are required")]
    TooFewClassMembers {
        class: u8,
        count: usize,
        required: usize,
    },
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
