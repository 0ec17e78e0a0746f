pub mod file;
pub mod stdout;

use async_trait::async_trait;

use crate::Result;

pub use file::FileSink;
pub use stdout::StdoutSink;

/// Destination for a run's final text.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `content`. Delivery is all-or-nothing from the caller's view.
    async fn send(&self, content: &str) -> Result<()>;
}
