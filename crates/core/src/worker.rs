//! 제한된 워커 풀
//!
//! 상태를 바꾸는 작업은 트리거와 비동기적으로 이 풀에서 실행됩니다.
//! `Semaphore`로 동시 실행 수를 제한하고, `TaskTracker`로 종료 시
//! 진행 중인 작업을 기다립니다. 작업 안의 panic은 해당 태스크에만 머뭅니다.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::metrics as m;

/// 워커 풀
///
/// 복제하면 같은 풀을 공유합니다.
#[derive(Clone)]
pub struct WorkerPool {
    name: &'static str,
    max_concurrency: usize,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    submitted: Arc<AtomicU64>,
}

impl WorkerPool {
    /// 최대 동시 실행 수를 지정해 풀을 생성합니다.
    pub fn new(name: &'static str, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            name,
            max_concurrency,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            tracker: TaskTracker::new(),
            submitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 작업을 제출합니다.
    ///
    /// 허가(permit)를 먼저 획득한 뒤 스폰하므로, 풀이 가득 차면 호출자가
    /// 자리가 날 때까지 대기합니다. 디스패처가 대기하는 동안 구독 큐가 차고,
    /// 발행자는 bounded 큐에서 다시 대기합니다.
    ///
    /// 풀이 닫혀 작업을 버리면 `false`.
    pub async fn submit<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            warn!(pool = self.name, "worker pool closed, dropping task");
            return false;
        }
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return false;
        };
        if self.tracker.is_closed() {
            warn!(pool = self.name, "worker pool closed while waiting, dropping task");
            return false;
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.record_in_flight();

        let pool = self.clone();
        self.tracker.spawn(async move {
            task.await;
            drop(permit);
            pool.record_in_flight();
        });
        true
    }

    fn record_in_flight(&self) {
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::WORKER_IN_FLIGHT, m::LABEL_POOL => self.name)
            .set(self.in_flight() as f64);
    }

    /// 현재 실행 중인 작업 수
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.permits.available_permits()
    }

    /// 스폰되어 아직 끝나지 않은 작업 수
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// 지금까지 제출된 작업 수
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// 최대 동시 실행 수
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// 새 작업 제출을 막고 진행 중인 작업이 끝날 때까지 최대 `grace`만큼 기다립니다.
    ///
    /// 제한 시간 안에 모두 끝나면 `true`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        debug!(pool = self.name, pending = self.tracker.len(), "draining worker pool");
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pool = self.name,
                    pending = self.tracker.len(),
                    "worker pool did not drain before grace period"
                );
                false
            }
        }
    }
}

/// 격리 실행 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    /// 제한 시간 초과 (태스크는 중단됨)
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    /// 태스크 panic
    #[error("panicked: {0}")]
    Panicked(String),
}

/// 도메인 로직을 별도 태스크에서 제한 시간과 함께 실행합니다.
///
/// panic은 [`TaskFailure::Panicked`]로, 시간 초과는 태스크를 중단한 뒤
/// [`TaskFailure::TimedOut`]으로 돌려줍니다. 호출한 워커는 영향을 받지 않습니다.
pub async fn run_isolated<F, T>(timeout: Duration, task: F) -> Result<T, TaskFailure>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(task);
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(TaskFailure::Panicked(panic_message(join_err))),
        Err(_) => {
            handle.abort();
            Err(TaskFailure::TimedOut(timeout))
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test]
    async fn submitted_tasks_run_to_completion() {
        let pool = WorkerPool::new("test", 4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            assert!(
                pool.submit(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await
            );
        }
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.submitted(), 10);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let pool = WorkerPool::new("bounded", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .await;
        }
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_task_does_not_poison_pool() {
        let pool = WorkerPool::new("panics", 1);
        pool.submit(async {
            panic!("domain logic blew up");
        })
        .await;
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        pool.submit(async move {
            flag.store(1, Ordering::SeqCst);
        })
        .await;
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_isolated_returns_value() {
        let value = run_isolated(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn run_isolated_reports_panic_message() {
        let result: Result<(), _> = run_isolated(Duration::from_secs(1), async {
            panic!("resolver exploded");
        })
        .await;
        assert_eq!(result, Err(TaskFailure::Panicked("resolver exploded".to_owned())));
    }

    #[tokio::test(start_paused = true)]
    async fn run_isolated_times_out() {
        let result = run_isolated(Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;
        assert_eq!(result, Err(TaskFailure::TimedOut(Duration::from_secs(5))));
    }

    #[tokio::test]
    async fn closed_pool_rejects_new_tasks() {
        let pool = WorkerPool::new("closed", 1);
        assert!(pool.shutdown(Duration::from_millis(10)).await);
        assert!(!pool.submit(async {}).await);
        assert_eq!(pool.submitted(), 0);
    }

    #[tokio::test]
    async fn full_pool_holds_submitter_until_permit_frees() {
        let pool = WorkerPool::new("full", 1);
        let gate = Arc::new(tokio::sync::Notify::new());
        let release = Arc::clone(&gate);
        pool.submit(async move { release.notified().await }).await;
        assert_eq!(pool.in_flight(), 1);

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.submit(async {})).await;
        assert!(blocked.is_err(), "submit should wait while the pool is full");
        assert_eq!(pool.pending(), 1);

        gate.notify_one();
        let accepted = tokio::time::timeout(Duration::from_secs(2), pool.submit(async {}))
            .await
            .unwrap();
        assert!(accepted);
        assert!(pool.shutdown(Duration::from_secs(1)).await);
        assert_eq!(pool.submitted(), 2);
    }
}
