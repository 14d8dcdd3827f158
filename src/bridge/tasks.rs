//! Awaitable handles for detached work.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared, join_all};

/// A cloneable handle to a spawned task.
///
/// Awaiting any clone waits for the task to finish. Dropping every clone
/// does not cancel the task. A panicking task is logged and counts as
/// finished.
#[derive(Clone)]
pub struct TaskHandle {
    done: Shared<BoxFuture<'static, ()>>,
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let join = tokio::spawn(async move {
            future.await;
            flag.store(true, Ordering::Release);
        });

        let flag = finished.clone();
        let done = async move {
            if let Err(e) = join.await {
                tracing::error!(
                    target: "tg2nostr::bridge::tasks::spawn",
                    "Background task failed: {}",
                    e
                );
                flag.store(true, Ordering::Release);
            }
        }
        .boxed()
        .shared();

        Self { done, finished }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Whether both handles refer to the same task.
    pub fn ptr_eq(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.finished, &other.finished)
    }
}

impl Future for TaskHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.done.poll_unpin(cx)
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Every handle the bridge has handed out and not yet seen finish.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<TaskHandle>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, handle: TaskHandle) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.retain(|tracked| !tracked.is_finished());
        if !handles.iter().any(|tracked| tracked.ptr_eq(&handle)) {
            handles.push(handle);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Waits for every tracked task, including ones tracked while waiting.
    pub async fn drain(&self) {
        loop {
            let pending = {
                let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *handles)
            };
            if pending.is_empty() {
                break;
            }
            join_all(pending).await;
        }
    }
}
