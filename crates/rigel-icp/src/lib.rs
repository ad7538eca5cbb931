#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod engine;
pub use engine::{
    FailureReason, Registration, RegistrationConfig, RegistrationResult, RegistrationState,
};

mod ops;
