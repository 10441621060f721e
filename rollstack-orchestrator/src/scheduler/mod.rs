//! Task Scheduler
//!
//! A fixed pool of workers draining a bounded queue of cancellable tasks.
//!
//! Every task gets a cancellation token derived from the scheduler's root
//! token when it is enqueued, and the token is tracked by task id until the
//! task finishes. Stopping a task that has not started yet leaves it in the
//! queue with a cancelled token, and the worker discards it on dequeue.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

type TaskBody = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, ()> + Send>;
type PanicHandler = Box<dyn FnOnce(String) -> BoxFuture<'static, ()> + Send>;

/// A unit of background work
pub struct Task {
    id: String,
    body: TaskBody,
    on_panic: Option<PanicHandler>,
}

impl Task {
    /// Create a task whose body receives its cancellation token
    pub fn new<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            id: id.into(),
            body: Box::new(move |token| body(token).boxed()),
            on_panic: None,
        }
    }

    /// Run `handler` with the panic message if the body panics
    #[must_use]
    pub fn on_panic<F, Fut>(mut self, handler: F) -> Self
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_panic = Some(Box::new(move |message| handler(message).boxed()));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("task queue is full, rejected {id}")]
    QueueFull { id: String },

    #[error("scheduler is shutting down")]
    ShuttingDown,

    #[error("scheduler is already running")]
    AlreadyStarted,
}

struct Queued {
    task: Task,
    serial: u64,
    token: CancellationToken,
}

struct Tracked {
    serial: u64,
    token: CancellationToken,
}

struct Inner {
    sender: mpsc::Sender<Queued>,
    receiver: Mutex<mpsc::Receiver<Queued>>,
    tasks: DashMap<String, Tracked>,
    root: CancellationToken,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    next_serial: AtomicU64,
}

/// Cancellable background task scheduler
///
/// Cloning is cheap and every clone drives the same workers.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

impl TaskScheduler {
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                sender,
                receiver: Mutex::new(receiver),
                tasks: DashMap::new(),
                root: CancellationToken::new(),
                workers: std::sync::Mutex::new(Vec::new()),
                worker_count: worker_count.max(1),
                next_serial: AtomicU64::new(0),
            }),
        }
    }

    /// Launch the workers
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.inner.root.is_cancelled() {
            return Err(SchedulerError::ShuttingDown);
        }

        let mut workers = self
            .inner
            .workers
            .lock()
            .map_err(|_| SchedulerError::ShuttingDown)?;
        if !workers.is_empty() {
            return Err(SchedulerError::AlreadyStarted);
        }

        for index in 0..self.inner.worker_count {
            let inner = Arc::clone(&self.inner);
            workers.push(tokio::spawn(async move { inner.work(index).await }));
        }

        info!("Task scheduler started with {} workers", self.inner.worker_count);
        Ok(())
    }

    /// Enqueue a task
    ///
    /// Fails immediately when the queue is full or the scheduler stopped.
    /// A task still tracked under the same id is cancelled, since it could
    /// no longer be stopped by id.
    pub fn add_task(&self, task: Task) -> Result<(), SchedulerError> {
        if self.inner.root.is_cancelled() {
            return Err(SchedulerError::ShuttingDown);
        }

        let permit = match self.inner.sender.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Full(())) => {
                warn!("Task queue is full, rejecting {}", task.id);
                return Err(SchedulerError::QueueFull { id: task.id });
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                return Err(SchedulerError::ShuttingDown);
            }
        };

        let id = task.id.clone();
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.root.child_token();

        let previous = self.inner.tasks.insert(
            id.clone(),
            Tracked {
                serial,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            warn!("Task {} was queued again, cancelled the previous one", id);
        }

        permit.send(Queued {
            task,
            serial,
            token,
        });
        debug!("Task {} queued", id);
        Ok(())
    }

    /// Cancel a queued or running task
    ///
    /// Returns `false` if no task with this id is tracked.
    pub fn stop_task(&self, id: &str) -> bool {
        match self.inner.tasks.remove(id) {
            Some((_, tracked)) => {
                tracked.token.cancel();
                info!("Task {} cancelled", id);
                true
            }
            None => false,
        }
    }

    /// Whether a task with this id is queued or running
    pub fn is_tracked(&self, id: &str) -> bool {
        self.inner.tasks.contains_key(id)
    }

    /// Whether [`stop`](Self::stop) was called
    pub fn is_shutting_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// Cancel every task and wait for the workers to exit
    ///
    /// No task is accepted afterwards.
    pub async fn stop(&self) {
        self.inner.root.cancel();

        let workers = match self.inner.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => return,
        };

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Scheduler worker failed: {}", e);
            }
        }

        self.inner.tasks.clear();
        info!("Task scheduler stopped");
    }
}

impl Inner {
    async fn work(&self, index: usize) {
        debug!("Scheduler worker {} started", index);

        loop {
            let next = {
                let mut receiver = self.receiver.lock().await;
                tokio::select! {
                    biased;
                    _ = self.root.cancelled() => None,
                    queued = receiver.recv() => queued,
                }
            };

            match next {
                Some(queued) => self.run(queued).await,
                None => break,
            }
        }

        debug!("Scheduler worker {} exited", index);
    }

    async fn run(&self, queued: Queued) {
        let Queued {
            task,
            serial,
            token,
        } = queued;
        let Task { id, body, on_panic } = task;

        if token.is_cancelled() {
            info!("Task {} was stopped before it started", id);
            self.untrack(&id, serial);
            return;
        }

        // Cancelled once the body is done so whatever it spawned on the
        // token winds down, even after a panic
        let done = token.clone();
        let span = info_span!("task", id = %id);
        async {
            debug!("Task started");

            // The body is invoked inside the guarded future so a panic while
            // building it is caught as well
            let result = AssertUnwindSafe(async move { body(token).await })
                .catch_unwind()
                .await;

            if let Err(panic) = result {
                let message = panic_message(panic.as_ref());
                error!("Task panicked: {}", message);

                if let Some(handler) = on_panic {
                    let handled = AssertUnwindSafe(async move { handler(message).await })
                        .catch_unwind()
                        .await;
                    if let Err(panic) = handled {
                        error!("Task panic handler panicked: {}", panic_message(panic.as_ref()));
                    }
                }
            }

            debug!("Task finished");
        }
        .instrument(span)
        .await;

        done.cancel();

        self.untrack(&id, serial);
    }

    /// Drop the tracking entry unless a newer task took over the id
    fn untrack(&self, id: &str, serial: u64) {
        self.tasks.remove_if(id, |_, tracked| tracked.serial == serial);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_task_runs_and_is_untracked() {
        let scheduler = TaskScheduler::new(2, 4);
        scheduler.start().unwrap();

        let (tx, rx) = oneshot::channel();
        scheduler
            .add_task(Task::new("work", move |_token| async move {
                let _ = tx.send(42);
            }))
            .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!scheduler.is_tracked("work"));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_full_queue_is_rejected() {
        // Not started, so nothing drains the queue
        let scheduler = TaskScheduler::new(1, 1);
        scheduler
            .add_task(Task::new("first", |_token| async {}))
            .unwrap();

        let err = scheduler
            .add_task(Task::new("second", |_token| async {}))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::QueueFull { ref id } if id == "second"));
        assert!(scheduler.is_tracked("first"));
        assert!(!scheduler.is_tracked("second"));
    }

    #[tokio::test]
    async fn test_same_id_cancels_older_task() {
        let scheduler = TaskScheduler::new(2, 4);
        scheduler.start().unwrap();

        let (started_tx, started_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        scheduler
            .add_task(Task::new("deploy", move |token| async move {
                let _ = started_tx.send(());
                token.cancelled().await;
                let _ = done_tx.send("replaced");
            }))
            .unwrap();
        started_rx.await.unwrap();

        let (second_tx, second_rx) = oneshot::channel();
        scheduler
            .add_task(Task::new("deploy", move |token| async move {
                let _ = second_tx.send(());
                token.cancelled().await;
            }))
            .unwrap();

        assert_eq!(done_rx.await.unwrap(), "replaced");
        second_rx.await.unwrap();

        // The older task finishing must not untrack the newer one
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(scheduler.is_tracked("deploy"));
        assert!(scheduler.stop_task("deploy"));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_before_start_discards_task() {
        let scheduler = TaskScheduler::new(1, 4);
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler
            .add_task(Task::new("pending", move |_token| async move {
                let _ = tx.send(());
            }))
            .unwrap();
        assert!(scheduler.stop_task("pending"));

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_task_cancels_running_body() {
        let scheduler = TaskScheduler::new(1, 4);
        scheduler.start().unwrap();

        let (started_tx, started_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        scheduler
            .add_task(Task::new("long", move |token| async move {
                let _ = started_tx.send(());
                token.cancelled().await;
                let _ = done_tx.send("cancelled");
            }))
            .unwrap();

        started_rx.await.unwrap();
        assert!(scheduler.stop_task("long"));
        assert_eq!(done_rx.await.unwrap(), "cancelled");
        assert!(!scheduler.stop_task("long"));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_panic_is_handled_and_worker_survives() {
        let scheduler = TaskScheduler::new(1, 4);
        scheduler.start().unwrap();

        let (panic_tx, panic_rx) = oneshot::channel();
        scheduler
            .add_task(
                Task::new("explodes", |_token| async {
                    panic!("driver exploded");
                })
                .on_panic(move |message| async move {
                    let _ = panic_tx.send(message);
                }),
            )
            .unwrap();
        assert_eq!(panic_rx.await.unwrap(), "driver exploded");

        let (tx, rx) = oneshot::channel();
        scheduler
            .add_task(Task::new("after", move |_token| async move {
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_finished_task_keeps_newer_registration() {
        let scheduler = TaskScheduler::new(1, 4);
        scheduler.start().unwrap();

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (first_done_tx, first_done_rx) = oneshot::channel();
        scheduler
            .add_task(Task::new("same", move |_token| async move {
                let _ = release_rx.await;
                let _ = first_done_tx.send(());
            }))
            .unwrap();

        // Re-registered while the first one is still running
        let (second_tx, second_rx) = oneshot::channel::<()>();
        scheduler
            .add_task(Task::new("same", move |token| async move {
                token.cancelled().await;
                let _ = second_tx.send(());
            }))
            .unwrap();

        let _ = release_tx.send(());
        first_done_rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The first task's exit must not drop the second task's entry
        assert!(scheduler.stop_task("same"));
        // Either cancelled while running or discarded before it started
        let _ = second_rx.await;
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stopped_scheduler_refuses_work() {
        let scheduler = TaskScheduler::new(1, 4);
        scheduler.start().unwrap();
        scheduler.stop().await;

        let err = scheduler
            .add_task(Task::new("late", |_token| async {}))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ShuttingDown));
    }
}
