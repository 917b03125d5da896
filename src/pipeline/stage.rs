//! Pipeline stage trait
//!
//! Defines the interface for pipeline stages; coordinators spawn each
//! stage as its own task and let the shared cancellation token end it.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for pipeline stages that process media data
#[async_trait]
pub trait PipelineStage: Send {
    /// Run the stage until end of stream or cancellation
    async fn run(&mut self) -> Result<()>;

    /// Get the name of this stage for logging
    fn name(&self) -> &'static str;
}
