pub mod context;
pub mod error;
pub mod policy;
#[macro_use]
pub mod test_macros;

pub use context::{SecurityContext, SecurityCtxExtractor};
pub use error::SecurityError;
pub use policy::{ensure_capability, Capability};
