pub mod controller;
pub mod eligibility;
pub mod error;
pub mod snapshot;
pub mod source;

pub use controller::{RegistryController, RegistryControllerConfig};
pub use eligibility::{EligibilityPolicy, Ineligibility};
pub use error::{RegistryError, Result};
pub use snapshot::RegistrySnapshot;
pub use source::{FileRegistrySource, RegistrySource, StaticRegistrySource};
