//! Request decoding and reply encoding.

use analyst_core::{Content, CoreError, Part, TaskEnvelope, TaskSpec};

/// Name given to every reply envelope.
pub const REPLY_TASK_NAME: &str = "Data Analysis Result";

/// Decode the task specification carried by a request envelope.
pub fn decode_request(envelope: &TaskEnvelope) -> Result<TaskSpec, CoreError> {
    TaskSpec::decode(envelope.first_text()?)
}

/// Build the reply to `request` holding `parts` in one content block.
///
/// The reply goes back the way the request came: its source is the agent
/// the request was addressed to (or `agent_name` when the request named
/// none) and its target is the request's source.
pub fn encode_reply(request: &TaskEnvelope, parts: Vec<Part>, agent_name: &str) -> TaskEnvelope {
    let source = if request.target_agent_id.is_empty() {
        agent_name
    } else {
        request.target_agent_id.as_str()
    };

    let mut reply = TaskEnvelope::new(request.task_id.reply_id(), REPLY_TASK_NAME)
        .with_correlation_id(request.correlation_id.clone())
        .with_route(source, request.source_agent_id.clone());
    reply.parent_task_id = Some(request.task_id.clone());
    reply.content.push(Content::new(parts));
    reply
}
