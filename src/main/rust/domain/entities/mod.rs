mod frame_assembler;
mod session_lifecycle;
mod type_registry;

pub use frame_assembler::FrameAssembler;
pub use session_lifecycle::{SessionLifecycle, StateTransition};
pub use type_registry::TypeRegistry;
