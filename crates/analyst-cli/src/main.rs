//! Analyst CLI - Command line interface for analyst agents.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tonic::transport::Channel;

use analyst_agent::registry::service_prefix;
use analyst_agent::{EtcdRegistry, Registry};
use analyst_core::{Part, TaskEnvelope, TaskId, MIME_PNG};
use analyst_proto::pb::{AgentTask, GetMetadataRequest};
use analyst_proto::AgentServiceClient;

/// Analyst CLI - talk to data analysis agents
#[derive(Parser)]
#[command(name = "analyst")]
#[command(about = "CLI for analyst agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what an agent can do
    Metadata {
        /// Agent address
        #[arg(short, long, default_value = "http://127.0.0.1:9092")]
        addr: String,
    },

    /// Send a task specification to an agent
    Execute {
        /// Agent address
        #[arg(short, long, default_value = "http://127.0.0.1:9092")]
        addr: String,

        /// Task specification JSON file, or - for stdin
        #[arg(short, long)]
        input: String,

        /// Directory receiving binary parts
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Agent the task is addressed to
        #[arg(long, default_value = "data_analysis_agent")]
        target: String,
    },

    /// List agent instances published in etcd
    Discover {
        /// etcd JSON gateway endpoint
        #[arg(long, default_value = "http://127.0.0.1:2379")]
        etcd_endpoint: String,

        /// Service name to look up
        #[arg(long, default_value = "data_analysis_agent")]
        service_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Metadata { addr } => {
            metadata(connect(addr).await?).await?;
        }
        Commands::Execute {
            addr,
            input,
            out_dir,
            target,
        } => {
            execute(connect(addr).await?, &input, &out_dir, target).await?;
        }
        Commands::Discover {
            etcd_endpoint,
            service_name,
        } => {
            discover(etcd_endpoint, &service_name).await?;
        }
    }

    Ok(())
}

async fn connect(addr: String) -> Result<Channel, Box<dyn std::error::Error>> {
    Ok(Channel::from_shared(addr)?.connect().await?)
}

async fn metadata(channel: Channel) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = AgentServiceClient::new(channel);

    let response = client.get_metadata(GetMetadataRequest {}).await?;
    let metadata = response.into_inner();

    println!("Name:       {}", metadata.name);
    println!("Capability: {}", metadata.capability);
    println!("Input:      {}", metadata.input_description);
    println!("Output:     {}", metadata.output_description);

    Ok(())
}

async fn execute(
    channel: Channel,
    input: &str,
    out_dir: &Path,
    target: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = AgentServiceClient::new(channel);

    let spec = read_input(input)?;
    // fail early on a file that is not JSON at all
    serde_json::from_str::<serde_json::Value>(&spec)
        .map_err(|e| format!("Input is not valid JSON: {e}"))?;

    let envelope = TaskEnvelope::new(TaskId::generate(), "Data Analysis Request")
        .with_correlation_id(uuid::Uuid::new_v4().to_string())
        .with_route("analyst-cli", target)
        .with_text(spec);
    let task_id = envelope.task_id.clone();

    let response = client.execute_task(AgentTask::from(envelope)).await?;
    let reply = TaskEnvelope::try_from(response.into_inner())?;

    println!("Task {} -> {}", task_id, reply.task_id);

    for (index, part) in reply.parts().iter().enumerate() {
        match part {
            Part::Text(text) => {
                println!("\n[part {index}]");
                println!("{}", pretty(text));
            }
            Part::Blob { mime_type, data } => {
                let path = out_dir.join(blob_file_name(index, mime_type));
                std::fs::write(&path, data)?;
                println!(
                    "\n[part {index}] {mime_type}, {} bytes -> {}",
                    data.len(),
                    path.display()
                );
            }
        }
    }

    Ok(())
}

async fn discover(
    etcd_endpoint: String,
    service_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = EtcdRegistry::new(etcd_endpoint, Duration::from_secs(5))?;

    let instances = registry.list(&service_prefix(service_name)).await?;

    println!("Instances of {service_name} ({}):", instances.len());
    println!("{:<48}  {}", "KEY", "ADDRESS");
    println!("{}", "-".repeat(72));

    for (key, address) in instances {
        println!("{:<48}  {}", key, address);
    }

    Ok(())
}

fn read_input(input: &str) -> Result<String, std::io::Error> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input)
    }
}

fn blob_file_name(index: usize, mime_type: &str) -> String {
    let extension = if mime_type == MIME_PNG { "png" } else { "bin" };
    format!("part-{index}.{extension}")
}

/// Pretty-print JSON text, or return it unchanged when it is not JSON.
fn pretty(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| text.to_string())
}
