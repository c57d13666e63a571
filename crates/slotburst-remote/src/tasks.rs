//! Deferred-task service client.
//!
//! Submission is a one-way handoff: the service either accepts the task
//! (and owns delivery and redelivery from then on) or rejects it. Nothing
//! about the task flows back into this process afterwards.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RemoteResult;
use crate::rest::RestClient;

/// A task to deliver to `target_url` at `schedule_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub target_url: String,
    /// JSON body POSTed to the target.
    pub body: serde_json::Value,
    /// Unix seconds.
    pub schedule_time: u64,
}

/// Name the service assigned to an accepted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub name: String,
}

/// Remote queue of deferred HTTP calls.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn schedule_task(&self, task: TaskSubmission) -> RemoteResult<TaskHandle>;
}

#[derive(Serialize)]
struct CreateTaskBody<'a> {
    target_url: &'a str,
    http_method: &'static str,
    headers: BTreeMap<&'static str, &'static str>,
    body: &'a serde_json::Value,
    schedule_time: u64,
}

/// Deferred-task service reached over JSON/HTTP.
#[derive(Clone)]
pub struct HttpTaskQueue {
    rest: RestClient,
    queue_path: String,
}

impl HttpTaskQueue {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        queue_location: &str,
        queue_id: &str,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, token, timeout)?,
            queue_path: format!("v1/locations/{queue_location}/queues/{queue_id}/tasks"),
        })
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn schedule_task(&self, task: TaskSubmission) -> RemoteResult<TaskHandle> {
        let body = CreateTaskBody {
            target_url: &task.target_url,
            http_method: "POST",
            headers: BTreeMap::from([("Content-Type", "application/json")]),
            body: &task.body,
            schedule_time: task.schedule_time,
        };
        let request = self.rest.post(&self.queue_path).json(&body);
        let handle: TaskHandle = self.rest.send_json(request).await?;
        debug!(task = %handle.name, target = %task.target_url, "task accepted");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_path_includes_location_and_id() {
        let queue = HttpTaskQueue::new(
            "https://tasks.internal",
            None,
            "us-central1",
            "slot-reversals",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            queue.rest.url(&queue.queue_path),
            "https://tasks.internal/v1/locations/us-central1/queues/slot-reversals/tasks"
        );
    }

    #[test]
    fn create_body_shape() {
        let payload = serde_json::json!({"grant_id": "g-1"});
        let body = CreateTaskBody {
            target_url: "https://svc/del_capacity",
            http_method: "POST",
            headers: BTreeMap::from([("Content-Type", "application/json")]),
            body: &payload,
            schedule_time: 1_700_000_000,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["http_method"], "POST");
        assert_eq!(value["headers"]["Content-Type"], "application/json");
        assert_eq!(value["body"]["grant_id"], "g-1");
        assert_eq!(value["schedule_time"], 1_700_000_000);
    }
}
