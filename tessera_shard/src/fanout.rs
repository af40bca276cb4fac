//! Spawn-and-wait helpers shared by connection establishment and the
//! cluster fan-out operations.
use std::any::Any;
use std::future::Future;
use std::panic;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Run every future on its own task and wait for all of them.
///
/// Failures are pushed onto a channel sized to the batch, so a send never
/// waits. Once every task has finished, the first error read back is
/// returned; the rest are dropped. Per-task outputs come back in input order.
pub(crate) async fn run_all<T, E, Fut>(futures: Vec<Fut>) -> (Vec<Option<T>>, Option<E>)
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(futures.len().max(1));
    let handles: Vec<JoinHandle<Option<T>>> = futures
        .into_iter()
        .map(|fut| {
            let tx = tx.clone();
            tokio::spawn(async move {
                match fut.await {
                    Ok(out) => Some(out),
                    Err(err) => {
                        let _ = tx.try_send(err);
                        None
                    }
                }
            })
        })
        .collect();
    drop(tx);

    let outputs = join_all(handles).await;
    (outputs, rx.recv().await)
}

/// Barrier over spawned tasks. A panicked or cancelled task is re-raised
/// only after every sibling has finished.
async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut outputs = Vec::with_capacity(handles.len());
    let mut panicked: Option<Box<dyn Any + Send>> = None;
    for handle in handles {
        match handle.await {
            Ok(out) => outputs.push(out),
            Err(err) if err.is_panic() => {
                panicked.get_or_insert(err.into_panic());
            }
            // Tasks are never aborted from here; a cancelled task means the
            // runtime is shutting down.
            Err(err) => {
                panicked.get_or_insert(Box::new(format!("fan-out task cancelled: {err}")));
            }
        }
    }
    if let Some(payload) = panicked {
        panic::resume_unwind(payload);
    }
    outputs
}

/// Fan-out where only the error matters.
pub(crate) async fn first_error<E, Fut>(futures: Vec<Fut>) -> Result<(), E>
where
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    match run_all(futures).await {
        (_, Some(err)) => Err(err),
        (_, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn waits_for_every_task_after_a_failure() {
        let done = Arc::new(AtomicUsize::new(0));
        let futures: Vec<_> = (0..8u64)
            .map(|i| {
                let done = done.clone();
                async move {
                    if i == 0 {
                        return Err("boom");
                    }
                    tokio::time::sleep(Duration::from_millis(5 * i)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                }
            })
            .collect();
        let (outputs, err) = run_all(futures).await;
        assert_eq!(err, Some("boom"));
        assert_eq!(done.load(Ordering::SeqCst), 7);
        assert_eq!(outputs[0], None);
        assert_eq!(outputs[7], Some(7));
    }

    #[tokio::test]
    async fn empty_batch() {
        let futures: Vec<std::future::Ready<Result<(), ()>>> = Vec::new();
        assert_eq!(first_error(futures).await, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[should_panic(expected = "shard exploded")]
    async fn panics_surface_after_barrier() {
        let futures: Vec<_> = (0..3)
            .map(|i| async move {
                if i == 1 {
                    panic!("shard exploded");
                }
                Ok::<(), ()>(())
            })
            .collect();
        let _ = first_error(futures).await;
    }

    #[tokio::test]
    #[should_panic(expected = "fan-out task cancelled")]
    async fn cancelled_task_surfaces_after_barrier() {
        let finished = Arc::new(AtomicUsize::new(0));
        let stuck = tokio::spawn(std::future::pending::<()>());
        stuck.abort();
        let sibling = {
            let finished = finished.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            })
        };
        let outcome = tokio::spawn(join_all(vec![stuck, sibling])).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        if let Err(err) = outcome {
            panic::resume_unwind(err.into_panic());
        }
    }
}
