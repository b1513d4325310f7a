use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

/// Worker pool shared by the generation and meshing phases.
///
/// Each phase is dispatched through [`JobSystem::install`], which returns only after
/// every job of the phase has finished. That return is the barrier between phases.
pub struct JobSystem {
    pool: ThreadPool,
}

impl JobSystem {
    pub fn new(num_threads: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|index| format!("chunk-worker-{index}"));
        if let Some(count) = num_threads {
            builder = builder.num_threads(count);
        }

        let pool = builder.build()?;
        debug!("Job system started with {} workers", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Runs `op` inside the pool so that parallel iterators it creates use these workers.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}
