pub mod delay;
pub mod metadata;
pub mod plan;
pub mod trials;

pub use delay::{delay_samples, dispersion_delay, dispersion_smear, dm_factor};
pub use metadata::DmTrialsMetadata;
pub use plan::{DmRange, DmTrialDescriptor, DmTrialPlan};
pub use trials::{DmTrial, DmTrialMut, DmTrials, DmTrialsExchange};
