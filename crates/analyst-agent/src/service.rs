//! AgentService implementation.

use std::sync::Arc;

use analyst_analysis::{AnalysisError, Dataset};
use analyst_core::{AgentMetadata, TaskEnvelope};
use analyst_proto::pb::{self, GetMetadataRequest};
use analyst_proto::{AgentService, AgentServiceServer};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tonic::{Request, Response, Status};
use tracing::{error, info};

use crate::dispatch::{dispatch, Dispatched, SubTaskKind};
use crate::error::AgentError;
use crate::metrics::Metrics;
use crate::protocol::{decode_request, encode_reply};

/// Chart kinds the `plot` sub-task draws.
const PLOT_TYPES: [&str; 4] = ["line", "bar", "histogram", "scatter"];

/// Metadata advertised by an agent named `name`.
pub fn agent_metadata(name: &str) -> AgentMetadata {
    let tasks: Vec<&str> = SubTaskKind::ALL.iter().map(SubTaskKind::as_str).collect();

    AgentMetadata::new(name)
        .with_capability(format!(
            "Analyzes tabular data. Sub-task types: {}. Plot types: {}.",
            tasks.join(", "),
            PLOT_TYPES.join(", ")
        ))
        .with_input_description(
            "A JSON object with 'data' (the dataset as a string), optional 'data_format' \
             ('csv' or 'json', default 'csv') and 'tasks' (a non-empty list of objects, each \
             with a 'type' and its parameters: value_counts takes 'column'; plot takes \
             'plot_type' plus 'x' and 'y', or 'column' and optional 'bins' for histograms). \
             The same object may be sent JSON-encoded under an 'input' key.",
        )
        .with_output_description(
            "One part per recognized sub-task, in request order. Statistics are text parts \
             holding JSON with 'task_type' and 'result'; charts are image/png blob parts.",
        )
}

/// AgentService implementation.
pub struct AgentServiceImpl {
    metadata: AgentMetadata,
    permits: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl AgentServiceImpl {
    /// Create a service running at most `max_concurrent_tasks` tasks at once.
    pub fn new(name: &str, max_concurrent_tasks: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            metadata: agent_metadata(name),
            permits: Arc::new(Semaphore::new(max_concurrent_tasks)),
            metrics,
        }
    }

    /// Convert into a tonic server.
    pub fn into_server(self) -> AgentServiceServer<Self> {
        AgentServiceServer::new(self)
    }

    /// Decode, dispatch and encode one request.
    async fn execute(&self, proto: pb::AgentTask) -> Result<TaskEnvelope, AgentError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AgentError::ShuttingDown)?;

        let request = TaskEnvelope::try_from(proto)?;
        let spec = decode_request(&request)?;

        let dispatched = spawn_analysis(permit, move || -> Result<Dispatched, AnalysisError> {
            let dataset = Dataset::parse(&spec.data, spec.data_format)?;
            dispatch(&dataset, &spec.tasks)
        })
        .await??;

        self.metrics.record_subtasks_skipped(dispatched.skipped.len());
        info!(
            task_id = %request.task_id,
            correlation_id = %request.correlation_id,
            parts = dispatched.parts.len(),
            skipped = dispatched.skipped.len(),
            "Task executed"
        );

        Ok(encode_reply(&request, dispatched.parts, &self.metadata.name))
    }
}

/// Run `work` on the blocking pool. The permit is released when `work`
/// returns, even if the caller stopped waiting.
fn spawn_analysis<T, F>(permit: OwnedSemaphorePermit, work: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        work()
    })
}

#[tonic::async_trait]
impl AgentService for AgentServiceImpl {
    async fn get_metadata(
        &self,
        _request: Request<GetMetadataRequest>,
    ) -> Result<Response<pb::AgentMetadata>, Status> {
        Ok(Response::new(self.metadata.clone().into()))
    }

    async fn execute_task(
        &self,
        request: Request<pb::AgentTask>,
    ) -> Result<Response<pb::AgentTask>, Status> {
        let proto = request.into_inner();
        let task_id = proto.task_id.clone();
        let correlation_id = proto.correlation_id.clone();

        match self.execute(proto).await {
            Ok(reply) => {
                self.metrics.record_task_executed();
                Ok(Response::new(reply.into()))
            }
            Err(e) => {
                self.metrics.record_task_failed();
                error!(
                    task_id = %task_id,
                    correlation_id = %correlation_id,
                    error = %e,
                    "Task failed"
                );
                Err(Status::internal(format!("An error occurred: {e}")))
            }
        }
    }
}
