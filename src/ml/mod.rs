// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model code lives here: the network building blocks, the
// encoder variants, the loss, the hidden-state bridge and the
// training / evaluation loops.
//
// What's in this layer:
//
//   gru.rs         — One bidirectional GRU layer whose initial
//                    state can be seeded per direction
//
//   attention.rs   — Windowed (local) self-attention, rotary
//                    embeddings and dynamic position bias
//
//   model.rs       — The SequenceEncoder trait and the
//                    recurrent encoder (with / without attention)
//
//   transformer.rs — The stateless local transformer encoder
//
//   loss.rs        — BCE with logits, target trimming
//
//   bridge.rs      — Unit transition: eval-mode hidden trace →
//                    PreparedUnit
//
//   trainer.rs     — epoch → unit → mini-batch orchestrator
//
//   evaluator.rs   — Test-set scoring
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Cho et al. (2014) GRU
//            Vaswani et al. (2017) Attention Is All You Need

/// Bidirectional GRU layer with seedable state
pub mod gru;

/// Local windowed attention and positional schemes
pub mod attention;

/// SequenceEncoder trait and recurrent encoder
pub mod model;

/// Local transformer encoder
pub mod transformer;

/// Binary cross-entropy with logits
pub mod loss;

/// Hidden-state bridge between units and mini-batches
pub mod bridge;

/// Training orchestrator
pub mod trainer;

/// Test-set predictions
pub mod evaluator;
