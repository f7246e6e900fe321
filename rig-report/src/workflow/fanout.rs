//! Bounded fan-out over sections with a join-all barrier

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error};

use crate::report::Section;

/// Run `task` once per section, at most `parallelism` at a time, and
/// collect every output once all tasks have finished.
///
/// Output order is completion order. A task that panics is logged and
/// contributes nothing; the compiler renders its placeholder.
pub async fn fan_out<F, Fut>(sections: Vec<Section>, parallelism: usize, task: F) -> Vec<Section>
where
    F: Fn(Section) -> Fut,
    Fut: Future<Output = Section> + Send + 'static,
{
    if sections.is_empty() {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let completed = Arc::new(Mutex::new(Vec::with_capacity(sections.len())));

    let mut handles = Vec::with_capacity(sections.len());
    for section in sections {
        let name = section.name.clone();
        let sem_clone = Arc::clone(&semaphore);
        let completed_clone = Arc::clone(&completed);
        let fut = task(section);

        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so acquire cannot fail
            let _permit = sem_clone.acquire_owned().await.ok();
            let section = fut.await;
            debug!(section = %section.name, "Section task finished");
            completed_clone.lock().await.push(section);
        });
        handles.push((name, handle));
    }

    for (name, handle) in handles {
        if let Err(e) = handle.await {
            error!(section = %name, error = %e, "Section task failed");
        }
    }

    let mut completed = completed.lock().await;
    std::mem::take(&mut *completed)
}
