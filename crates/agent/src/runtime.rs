//! Process wiring: event source → ingestor, plus the periodic sweep.

use parley_core::channel::{EventSource, Inbound};
use parley_core::error::ChannelError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ingest::Ingestor;

pub struct BotRuntime {
    source: Arc<dyn EventSource>,
    ingestor: Arc<Ingestor>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BotRuntime {
    pub fn new(source: Arc<dyn EventSource>, ingestor: Arc<Ingestor>) -> Self {
        Self {
            source,
            ingestor,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn ingestor(&self) -> &Arc<Ingestor> {
        &self.ingestor
    }

    /// Connect the event source and start both triggers.
    pub async fn start(&self) -> Result<(), ChannelError> {
        let mut inbound = self.source.start().await?;
        info!(source = %self.source.name(), "Event source started");

        let scheduler = self.ingestor.scheduler();
        let shutdown = scheduler.context().shutdown_token().clone();
        let sweep = scheduler.spawn_periodic();

        let ingestor = Arc::clone(&self.ingestor);
        let pump = tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    item = inbound.recv() => item,
                };

                match item {
                    Some(Ok(Inbound::Event(event))) => {
                        // Queue inline; only the drain runs off the pump.
                        if ingestor.enqueue(*event).await {
                            let ingestor = Arc::clone(&ingestor);
                            tokio::spawn(async move { ingestor.drain().await });
                        }
                    }
                    Some(Ok(Inbound::Ready(logins))) => {
                        for login in logins {
                            info!(
                                platform = login.platform.as_deref().unwrap_or("unknown"),
                                self_id = login.self_id.as_deref().unwrap_or("unknown"),
                                "Bot account ready"
                            );
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Event source error"),
                    None => {
                        info!("Event source closed");
                        break;
                    }
                }
            }
            debug!("Event pump stopped");
        });

        self.tasks.lock().await.extend([sweep, pump]);
        Ok(())
    }

    /// Stop the source, the sweep, the pump, and every running cycle.
    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.ingestor
            .scheduler()
            .context()
            .shutdown_token()
            .cancel();

        if let Err(e) = self.source.stop().await {
            warn!(error = %e, "Failed to stop event source");
        }

        for task in self.tasks.lock().await.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionRegistry;
    use crate::actions::test_support::RecordingSender;
    use crate::context::BotContext;
    use crate::dispatcher::Dispatcher;
    use crate::planner::Planner;
    use crate::scheduler::Scheduler;
    use crate::scheduler::test_support::ScriptedProvider;
    use async_trait::async_trait;
    use parley_config::{BotConfig, LlmConfig, LoopLimits};
    use parley_core::event::{Event, EventChannel, EventMessage, EventUser, Login};
    use parley_store::InMemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelSource {
        receiver: Mutex<Option<mpsc::Receiver<Result<Inbound, ChannelError>>>>,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl EventSource for ChannelSource {
        fn name(&self) -> &str {
            "test"
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<Inbound, ChannelError>>, ChannelError> {
            self.receiver
                .lock()
                .await
                .take()
                .ok_or_else(|| ChannelError::NotConfigured("already started".into()))
        }

        async fn stop(&self) -> Result<(), ChannelError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn runtime_with(
        rx: mpsc::Receiver<Result<Inbound, ChannelError>>,
        provider: Arc<ScriptedProvider>,
    ) -> (BotRuntime, Arc<ChannelSource>) {
        let source = Arc::new(ChannelSource {
            receiver: Mutex::new(Some(rx)),
            stopped: AtomicBool::new(false),
        });
        let store = Arc::new(InMemoryStore::new());
        let llm = LlmConfig {
            api_key: Some("k".into()),
            base_url: Some("http://localhost".into()),
            model: Some("m".into()),
            ..LlmConfig::default()
        };
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(BotContext::new(LoopLimits::default())),
            Arc::new(Planner::new(provider, &llm, &BotConfig::default()).unwrap()),
            Dispatcher::new(Arc::new(ActionRegistry::standard(
                store.clone(),
                Arc::new(RecordingSender::default()),
                "Parley",
            ))),
            store.clone(),
        ));
        let runtime = BotRuntime::new(
            source.clone(),
            Arc::new(Ingestor::new(scheduler, store)),
        );
        (runtime, source)
    }

    fn message(id: &str, content: &str) -> Inbound {
        Inbound::Event(Box::new(Event {
            channel: Some(EventChannel {
                id: "c1".into(),
                name: None,
            }),
            user: Some(EventUser {
                id: "alice".into(),
                ..EventUser::default()
            }),
            message: Some(EventMessage {
                id: id.into(),
                content: content.into(),
                ..EventMessage::default()
            }),
            ..Event::default()
        }))
    }

    async fn wait_for_calls(provider: &ScriptedProvider, n: usize) {
        for _ in 0..500 {
            if provider.calls() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn pumps_events_into_the_ingestor() {
        let (tx, rx) = mpsc::channel(8);
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let (runtime, source) = runtime_with(rx, provider.clone());
        runtime.start().await.unwrap();

        tx.send(Ok(Inbound::Ready(vec![Login::default()]))).await.unwrap();
        tx.send(Err(ChannelError::ConnectionLost("reset".into())))
            .await
            .unwrap();
        tx.send(Ok(message("m1", "hi"))).await.unwrap();

        wait_for_calls(&provider, 1).await;
        assert_eq!(provider.calls(), 1);

        runtime.shutdown().await;
        assert!(source.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn events_are_processed_in_arrival_order() {
        let (tx, rx) = mpsc::channel(64);
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let (runtime, _source) = runtime_with(rx, provider.clone());
        runtime.start().await.unwrap();

        let expected: Vec<String> = (0..40).map(|i| format!("n{i:02}")).collect();
        for (i, content) in expected.iter().enumerate() {
            tx.send(Ok(message(&format!("m{i}"), content))).await.unwrap();
        }

        wait_for_calls(&provider, expected.len()).await;
        let seen: Vec<String> = provider
            .incoming_lines()
            .iter()
            .filter_map(|line| line.rsplit(": ").next())
            .map(str::to_string)
            .collect();
        assert_eq!(seen, expected);

        runtime.shutdown().await;
    }
}
