//! curveintel - bonding-curve trading risk intelligence
//!
//! `analysis_core` holds the numeric engine (metrics, detectors, risk, window optimizer);
//! `pipeline` holds collection, caching and the `IntelligenceEngine` façade.

pub mod analysis_core;
pub mod pipeline;
