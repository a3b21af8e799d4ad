/// Wraps the real-time data service in the service lifecycle
use crate::logger::{self, LogTag};
use crate::services::{Service, ServiceHealth};
use crate::stream::RealTimeDataService;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct StreamService {
    stream: Arc<RealTimeDataService>,
}

impl StreamService {
    pub fn new(stream: Arc<RealTimeDataService>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Service for StreamService {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["maintenance"]
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let mut handles = self.stream.start();

        // Bridge the manager's shutdown into the stream's own stop
        let stream = self.stream.clone();
        handles.push(tokio::spawn(async move {
            shutdown.notified().await;
            stream.stop();
        }));

        logger::info(LogTag::Stream, "Real-time streaming started");
        Ok(handles)
    }

    async fn stop(&mut self) -> Result<(), String> {
        self.stream.stop();
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}
