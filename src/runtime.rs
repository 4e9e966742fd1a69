use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::agent::PrimaryAgent;
use crate::error::Result;

/// One executor for the whole process that blocking callers submit work to.
///
/// Built once at start-up and reused for every call. Must not be used from
/// inside another async runtime.
pub struct BlockingRunner {
    runtime: Runtime,
}

impl BlockingRunner {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("doc-qa-worker")
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Run the agent for one query and wait for the answer.
    pub fn ask(&self, agent: &Arc<PrimaryAgent>, query: &str) -> Result<String> {
        self.block_on(agent.run(query))
    }
}
