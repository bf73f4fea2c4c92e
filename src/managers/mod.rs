pub mod setup_manager;
pub mod verification_manager;

pub use setup_manager::{SetupManager, SetupSummary, SharedSetupManager};
pub use verification_manager::{
    LoginOutcome, LoginPrecheck, RevokeOutcome, SharedVerificationManager, VerificationManager,
};
