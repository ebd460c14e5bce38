//! Headless core of the knowledge-graph explorer: graph normalization and filtering, label
//! level-of-detail, race-safe request lanes and background job polling.

pub mod api;
pub mod graph_utils;
pub mod persistence;
pub mod session;
pub mod view;
