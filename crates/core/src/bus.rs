//! 프로세스 내 메시지 버스
//!
//! 메시지 종류별로 [`Topic`]이 하나씩 있고, 구독자마다 별도의 bounded
//! `mpsc` 큐를 가집니다. 발행은 모든 구독자에게 복제되어 전달됩니다
//! (fire-and-forget, 프로세스 내 at-least-once).
//!
//! 수신 측은 보통 전용 디스패처 태스크가 큐를 비우고, 실제 작업은
//! [`WorkerPool`](crate::worker::WorkerPool)에 넘깁니다.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::BusError;
use crate::message::{
    EventResolved, GenerationScheduled, GenerationStatusChanged, Message, ResolveRequested,
};
use crate::worker::WorkerPool;

/// 기본 구독자 큐 용량
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// 한 종류의 메시지를 다루는 토픽
pub struct Topic<M> {
    name: &'static str,
    capacity: usize,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<M>>>>,
}

impl<M> Clone for Topic<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            capacity: self.capacity,
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<M: Message> Topic<M> {
    /// 새 토픽을 생성합니다.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 토픽 이름
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 새 구독자 큐를 등록하고 수신 채널을 반환합니다.
    pub fn subscribe(&self) -> Result<mpsc::Receiver<M>, BusError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .map_err(|_| BusError::Poisoned { topic: self.name })?
            .push(tx);
        debug!(topic = self.name, "subscriber registered");
        Ok(rx)
    }

    /// 현재 구독자 수 (닫힌 큐 제외)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// 모든 구독자에게 메시지를 전달합니다.
    ///
    /// 큐가 가득 차면 자리가 날 때까지 대기합니다. 닫힌 구독자는 제거됩니다.
    /// 전달된 구독자 수를 반환합니다.
    pub async fn publish(&self, message: M) -> Result<usize, BusError> {
        let senders: Vec<mpsc::Sender<M>> = {
            let mut subs = self
                .subscribers
                .lock()
                .map_err(|_| BusError::Poisoned { topic: self.name })?;
            subs.retain(|tx| !tx.is_closed());
            subs.clone()
        };

        if senders.is_empty() {
            return Err(BusError::NoSubscribers { topic: self.name });
        }

        let mut delivered = 0;
        for tx in senders {
            if tx.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        trace!(
            topic = self.name,
            message_id = message.message_id(),
            delivered,
            "message published"
        );
        Ok(delivered)
    }
}

/// 시스템 전체 메시지 버스
///
/// 복제 비용이 낮으며(내부 `Arc`) 모든 컴포넌트가 같은 버스를 공유합니다.
#[derive(Clone)]
pub struct MessageBus {
    /// Event 해석 요청
    pub resolve_requested: Topic<ResolveRequested>,
    /// Event 해석 완료
    pub event_resolved: Topic<EventResolved>,
    /// Generation 생성 배정
    pub generation_scheduled: Topic<GenerationScheduled>,
    /// Generation 상태 변경
    pub generation_status_changed: Topic<GenerationStatusChanged>,
}

impl MessageBus {
    /// 구독자 큐 용량을 지정해 버스를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            resolve_requested: Topic::new("resolve_requested", capacity),
            event_resolved: Topic::new("event_resolved", capacity),
            generation_scheduled: Topic::new("generation_scheduled", capacity),
            generation_status_changed: Topic::new("generation_status_changed", capacity),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// 구독 큐 하나를 비우는 디스패처 태스크를 시작합니다.
///
/// 메시지마다 `handler`가 만든 작업을 워커 풀에 제출합니다. 디스패처는
/// 도메인 로직을 기다리지 않지만 풀의 빈 자리는 기다립니다. 취소되거나
/// 큐가 닫히면 종료합니다.
pub fn spawn_dispatcher<M, F, Fut>(
    name: &'static str,
    mut rx: mpsc::Receiver<M>,
    pool: WorkerPool,
    cancel: CancellationToken,
    handler: F,
) -> JoinHandle<()>
where
    M: Message,
    F: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        debug!(dispatcher = name, "dispatcher started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => {
                        trace!(
                            dispatcher = name,
                            message_id = message.message_id(),
                            "dispatching message"
                        );
                        // 풀이 가득 차면 여기서 대기하므로 큐가 발행자를 막음
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = pool.submit(handler(message)) => {}
                        }
                    }
                    None => break,
                },
            }
        }
        info!(dispatcher = name, "dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::message::MODULE_INTAKE;

    #[tokio::test]
    async fn publish_fans_out_to_every_subscriber() {
        let bus = MessageBus::new(8);
        let mut first = bus.resolve_requested.subscribe().unwrap();
        let mut second = bus.resolve_requested.subscribe().unwrap();

        let delivered = bus
            .resolve_requested
            .publish(ResolveRequested::new("event-1", MODULE_INTAKE))
            .await
            .unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().event_id, "event-1");
        assert_eq!(second.recv().await.unwrap().event_id, "event-1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_an_error() {
        let bus = MessageBus::default();
        let err = bus
            .event_resolved
            .publish(EventResolved::new("event-1", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NoSubscribers { .. }));
    }

    #[tokio::test]
    async fn closed_subscribers_are_pruned() {
        let bus = MessageBus::new(4);
        let dropped = bus.generation_scheduled.subscribe().unwrap();
        let mut kept = bus.generation_scheduled.subscribe().unwrap();
        drop(dropped);

        let delivered = bus
            .generation_scheduled
            .publish(GenerationScheduled::new("gen-1", "event-1"))
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(bus.generation_scheduled.subscriber_count(), 1);
        assert_eq!(kept.recv().await.unwrap().generation_id, "gen-1");
    }

    #[tokio::test]
    async fn dispatcher_hands_messages_to_pool_until_cancelled() {
        let bus = MessageBus::new(4);
        let rx = bus.resolve_requested.subscribe().unwrap();
        let pool = WorkerPool::new("dispatch-test", 2);
        let cancel = CancellationToken::new();
        let (seen_tx, mut seen_rx) = mpsc::channel(4);

        let task = spawn_dispatcher(
            "test",
            rx,
            pool.clone(),
            cancel.clone(),
            move |msg: ResolveRequested| {
                let seen_tx = seen_tx.clone();
                async move {
                    let _ = seen_tx.send(msg.event_id).await;
                }
            },
        );

        bus.resolve_requested
            .publish(ResolveRequested::new("event-9", MODULE_INTAKE))
            .await
            .unwrap();
        let seen = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
            .await
            .unwrap();
        assert_eq!(seen.as_deref(), Some("event-9"));

        cancel.cancel();
        task.await.unwrap();
        assert!(pool.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn full_pool_pushes_back_on_publisher() {
        let bus = MessageBus::new(1);
        let rx = bus.resolve_requested.subscribe().unwrap();
        let pool = WorkerPool::new("backpressure", 1);
        let cancel = CancellationToken::new();
        let gate = Arc::new(tokio::sync::Semaphore::new(0));

        let handler_gate = Arc::clone(&gate);
        let task = spawn_dispatcher(
            "test",
            rx,
            pool.clone(),
            cancel.clone(),
            move |_msg: ResolveRequested| {
                let gate = Arc::clone(&handler_gate);
                async move {
                    let _ = gate.acquire().await;
                }
            },
        );

        // 실행 중 1개, 디스패처가 들고 대기 1개, 큐 1개
        for i in 0..3 {
            let publish = bus
                .resolve_requested
                .publish(ResolveRequested::new(format!("event-{i}"), MODULE_INTAKE));
            tokio::time::timeout(Duration::from_secs(2), publish)
                .await
                .unwrap()
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let blocked = tokio::time::timeout(
            Duration::from_millis(100),
            bus.resolve_requested
                .publish(ResolveRequested::new("event-3", MODULE_INTAKE)),
        )
        .await;
        assert!(blocked.is_err(), "publisher should wait while the pool is full");
        assert_eq!(pool.pending(), 1);

        gate.add_permits(4);
        tokio::time::timeout(
            Duration::from_secs(2),
            bus.resolve_requested
                .publish(ResolveRequested::new("event-4", MODULE_INTAKE)),
        )
        .await
        .unwrap()
        .unwrap();

        cancel.cancel();
        task.await.unwrap();
        assert!(pool.shutdown(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn cloned_bus_shares_topics() {
        let bus = MessageBus::new(4);
        let mut rx = bus.resolve_requested.subscribe().unwrap();
        let clone = bus.clone();
        clone
            .resolve_requested
            .publish(ResolveRequested::new("event-2", MODULE_INTAKE))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().event_id, "event-2");
    }
}
