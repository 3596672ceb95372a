//! End-to-end tests through the generated gRPC client.

use std::net::SocketAddr;
use std::sync::Arc;

use analyst_agent::{Agent, AgentError, Config, MemoryRegistry};
use analyst_core::{LifecycleState, Part, TaskEnvelope, TaskId};
use analyst_proto::pb::{self, GetMetadataRequest};
use analyst_proto::AgentServiceClient;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

struct Harness {
    client: AgentServiceClient<Channel>,
    registry: Arc<MemoryRegistry>,
    key: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), AgentError>>,
}

impl Harness {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        let config = Config {
            advertise_addr: Some(addr.to_string()),
            ..Config::default()
        };
        let key = format!("/{}/{}", config.service_name, addr);

        let registry = Arc::new(MemoryRegistry::new());
        let agent = Agent::new(config, registry.clone());
        let mut state = agent.subscribe();

        let (shutdown, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(agent.serve(listener, async move {
            let _ = rx.await;
        }));

        state
            .wait_for(|s| *s == LifecycleState::Serving)
            .await
            .unwrap();

        let client = AgentServiceClient::connect(format!("http://{addr}"))
            .await
            .unwrap();

        Self {
            client,
            registry,
            key,
            shutdown,
            handle,
        }
    }

    async fn stop(self) -> Arc<MemoryRegistry> {
        drop(self.client);
        self.shutdown.send(()).unwrap();
        self.handle.await.unwrap().unwrap();
        self.registry
    }
}

fn task(spec: Value) -> pb::AgentTask {
    TaskEnvelope::new(TaskId::new("task-1"), "analyze sales")
        .with_correlation_id("corr-1")
        .with_route("planner", "data_analysis_agent")
        .with_text(spec.to_string())
        .into()
}

fn text_payloads(reply: &TaskEnvelope) -> Vec<Value> {
    reply
        .parts()
        .iter()
        .filter_map(Part::as_text)
        .map(|text| serde_json::from_str(text).unwrap())
        .collect()
}

#[tokio::test]
async fn registers_while_serving_and_unregisters_on_shutdown() {
    let harness = Harness::start().await;
    let key = harness.key.clone();

    assert!(harness.registry.lease_of(&key).is_some());

    let registry = harness.stop().await;
    assert!(registry.value_of(&key).is_none());
}

#[tokio::test]
async fn get_metadata_describes_agent() {
    let mut harness = Harness::start().await;

    let metadata = harness
        .client
        .get_metadata(GetMetadataRequest {})
        .await
        .unwrap()
        .into_inner();

    assert_eq!(metadata.name, "data_analysis_agent");
    assert!(metadata.capability.contains("value_counts"));
    assert!(!metadata.input_description.is_empty());
    assert!(!metadata.output_description.is_empty());

    harness.stop().await;
}

#[tokio::test]
async fn describe_over_csv() {
    let mut harness = Harness::start().await;

    let reply = harness
        .client
        .execute_task(task(json!({
            "data": "a,b\n1,2\n3,4\n",
            "data_format": "csv",
            "tasks": [{"type": "describe"}],
        })))
        .await
        .unwrap()
        .into_inner();
    let reply = TaskEnvelope::try_from(reply).unwrap();

    assert_eq!(reply.task_id.as_str(), "result-task-1");
    assert_eq!(reply.parent_task_id, Some(TaskId::new("task-1")));
    assert_eq!(reply.correlation_id, "corr-1");
    assert_eq!(reply.target_agent_id, "planner");
    assert_eq!(reply.task_name, "Data Analysis Result");

    let payloads = text_payloads(&reply);
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["task_type"], "describe");
    assert_eq!(payloads[0]["result"]["a"]["count"], 2.0);
    assert_eq!(payloads[0]["result"]["b"]["mean"], 3.0);

    harness.stop().await;
}

#[tokio::test]
async fn wrapped_input_with_mixed_sub_tasks() {
    let mut harness = Harness::start().await;

    let inner = json!({
        "data": r#"[{"city": "paris", "sales": 3}, {"city": "rome", "sales": 5}, {"city": "paris", "sales": 4}]"#,
        "data_format": "json",
        "tasks": [
            {"type": "value_counts", "column": "city"},
            {"type": "forecast"},
            {"type": "missing_values"},
            {"type": "plot", "plot_type": "bar", "x": "city", "y": "sales"},
        ],
    });

    let reply = harness
        .client
        .execute_task(task(json!({ "input": inner.to_string() })))
        .await
        .unwrap()
        .into_inner();
    let reply = TaskEnvelope::try_from(reply).unwrap();

    let parts = reply.parts();
    assert_eq!(parts.len(), 3);

    let payloads = text_payloads(&reply);
    assert_eq!(payloads[0]["task_type"], "value_counts");
    assert_eq!(payloads[0]["result"], json!({"paris": 2, "rome": 1}));
    assert_eq!(payloads[1]["task_type"], "missing_values");

    assert!(matches!(&parts[2], Part::Blob { mime_type, .. } if mime_type == "image/png"));

    harness.stop().await;
}

#[tokio::test]
async fn histogram_plot_returns_png() {
    let mut harness = Harness::start().await;

    let reply = harness
        .client
        .execute_task(task(json!({
            "data": "a,b\n1,2\n3,4\n5,6\n",
            "tasks": [{"type": "plot", "plot_type": "histogram", "column": "a", "bins": 5}],
        })))
        .await
        .unwrap()
        .into_inner();
    let reply = TaskEnvelope::try_from(reply).unwrap();

    match reply.parts() {
        [Part::Blob { mime_type, data }] => {
            assert_eq!(mime_type, "image/png");
            assert_eq!(&data[..4], &[137, 80, 78, 71]);
        }
        other => panic!("expected one png blob, got {other:?}"),
    }

    harness.stop().await;
}

#[tokio::test]
async fn value_counts_without_column_is_internal() {
    let mut harness = Harness::start().await;

    let status = harness
        .client
        .execute_task(task(json!({
            "data": "a\n1\n",
            "tasks": [{"type": "value_counts"}],
        })))
        .await
        .unwrap_err();

    assert_eq!(status.code(), tonic::Code::Internal);
    assert!(status.message().contains("column"));

    // the server keeps serving after a failed call
    let metadata = harness.client.get_metadata(GetMetadataRequest {}).await;
    assert!(metadata.is_ok());

    harness.stop().await;
}

#[tokio::test]
async fn unplottable_values_fail_only_their_call() {
    let mut harness = Harness::start().await;

    for bad in [
        json!({"plot_type": "histogram", "column": "a"}),
        json!({"plot_type": "histogram", "column": "a", "bins": 10_000_000_000_000u64}),
    ] {
        let mut plot = bad;
        plot["type"] = json!("plot");
        let status = harness
            .client
            .execute_task(task(json!({
                "data": "a\n1\ninf\n",
                "tasks": [plot],
            })))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    let reply = harness
        .client
        .execute_task(task(json!({
            "data": "a\n1\n2\n",
            "tasks": [{"type": "plot", "plot_type": "histogram", "column": "a"}],
        })))
        .await
        .unwrap()
        .into_inner();
    let reply = TaskEnvelope::try_from(reply).unwrap();
    assert!(matches!(reply.parts(), [Part::Blob { .. }]));

    harness.stop().await;
}
