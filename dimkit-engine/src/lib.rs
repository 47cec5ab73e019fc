pub mod breaking;
pub mod dimension;
pub mod join;
pub mod sequence;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq)]
    pub enum EngineError {
        #[error("primary curve is closed")]
        ClosedPrimary,
        #[error("no curve sequence could be formed")]
        NoSequence,
        #[error("invalid input: {0}")]
        InvalidInput(String),
    }
}
