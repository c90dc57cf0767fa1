// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing what the system works on:
// series, units, sections and hidden-state traces.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums and traits
//
// Everything here can be unit-tested without a device.

// Time series, units and sections
pub mod series;

// Per-unit hidden traces and section seeds
pub mod hidden;

// Core abstractions (traits) that other layers implement
pub mod traits;
