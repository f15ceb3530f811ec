//! Crate error type

use thiserror::Error;

use crate::data::DataError;
use crate::statemachine::StateMachineError;

/// Any error raised by this crate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Data distribution failure
    #[error(transparent)]
    Data(#[from] DataError),

    /// Scheduler failure
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn push_unknown() -> Result<()> {
        Err::<(), _>(DataError::UnknownChannel("us".into()))?;
        Ok(())
    }

    #[test]
    fn test_from_data_error() {
        let err = push_unknown().unwrap_err();

        assert!(matches!(err, Error::Data(DataError::UnknownChannel(_))));
        assert_eq!(err.to_string(), DataError::UnknownChannel("us".into()).to_string());
    }
}
