// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Wires the other layers together for one user goal. No model
// code and no printing here, only workflow coordination.
//
// Reference: Clean Architecture pattern

// The training workflow
pub mod train_use_case;

// Standalone evaluation of a saved checkpoint
pub mod test_use_case;
