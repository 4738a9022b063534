use std::error::Error;
use std::time::Duration;

use kernel::Kernel;
use kernel_core::{Job, JobId};

/// Poll until the job reaches a terminal state.
pub async fn wait_for_terminal(kernel: &Kernel, job_id: JobId) -> Result<Job, Box<dyn Error>> {
    for _ in 0..200 {
        if let Some(job) = kernel.queue().status(job_id)
            && job.state.is_terminal()
        {
            return Ok(job);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Err(format!("job {} did not finish", job_id).into())
}

/// Route library logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
