pub mod emitter;
pub mod error;

pub use emitter::emit_plan;
pub use error::{PlanError, PlanResult};
