//! Reflected line-of-sight link evaluation.
//!
//! Two independent pipelines share the transceiver/reflector position sets:
//! the height sweep (geometry evaluation, best-path aggregation, per-height
//! summary statistics) and the interference run (link sampling, gimbal
//! aiming, beam-volume construction through an injected beam model, and
//! exact-overlap interference detection with multi-stage pruning).

pub mod aiming;
pub mod best;
pub mod geom;
pub mod interference;
pub mod links;
pub mod output;
pub mod reflect;
pub mod settings;
pub mod shapes;
pub mod sweep;
