#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod params;
pub use params::RegistrationParams;

mod refiner;
pub use refiner::{Refinement, Refiner};

mod session;
pub use session::{ProcessFlag, ProcessGuard, ProcessOutcome, Registration, SessionState};

use cpf_icp::IcpError;
use cpf_matching::MatchingError;

/// Errors raised by the registration session.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RegistrationError {
    /// The session already holds a reference model.
    #[error("A reference model is already loaded with id {model_id}")]
    ModelAlreadyLoaded {
        /// Id of the loaded model.
        model_id: usize,
    },

    /// No reference model was added.
    #[error("No reference model loaded")]
    NoModel,

    /// `process` was called while another call is in flight.
    #[error("Registration is already processing")]
    AlreadyProcessing,

    /// The matcher failed.
    #[error(transparent)]
    Matching(#[from] MatchingError),

    /// The refiner failed.
    #[error(transparent)]
    Refinement(#[from] IcpError),
}
