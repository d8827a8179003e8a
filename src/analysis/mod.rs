//! Deterministic analysis: positional themes and tactical motifs.

pub mod service;
pub mod tactics;
pub mod themes;

pub use service::AnalysisService;
pub use tactics::{detect, MotifKind, PatternSet, TacticalMotif};
pub use themes::{analyze, SidePair, ThemeSet};
