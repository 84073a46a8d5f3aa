// Global run-state for the lifecycle orchestrator.
//
// Transitions are driven by the orchestrator; this module only defines the
// states and their classification helpers.

pub mod states;

pub use states::RunState;
