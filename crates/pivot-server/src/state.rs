//! Shared application state.

use pivot_local::digest::DigestService;
use pivot_local::pipeline::PivotPipeline;

/// Everything a handler needs; built once at startup and shared behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PivotPipeline,
    pub digest: DigestService,
}

impl AppState {
    pub fn new(pipeline: PivotPipeline, digest: DigestService) -> Self {
        Self { pipeline, digest }
    }
}
