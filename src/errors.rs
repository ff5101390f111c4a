mod convert;
mod instantiate;
mod plan;
mod provision;
mod seal;

pub use convert::ConvertErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use plan::PlanErrorKind;
pub use provision::{CyclePath, InstantiatorErrorKind, ProvisionErrorKind, Suggestions};
pub use seal::{Message, SealErrorKind};
