//! Crowd risk analytics.
//!
//! Converts per-frame person counts into a stable three-level risk
//! status, decides when alerts are warranted, and renders the overlay
//! every surface displays. The debouncer in [`debounce`] is the single
//! decision core; [`pipeline::FrameAnalyzer`] composes it with a
//! detector backend and the overlay renderer.

pub mod debounce;
pub mod density;
pub mod overlay;
pub mod pipeline;
pub mod risk;

pub use debounce::{AlertDebouncer, RiskAssessment};
pub use pipeline::{AlertEvent, AnalysisReport, FrameAnalyzer, FrameReport};
pub use risk::{instantaneous_status, RiskStatus, RiskThresholds};
