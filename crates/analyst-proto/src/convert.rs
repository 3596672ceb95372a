//! Converters between proto types and domain types.

use crate::pb;
use analyst_core::{AgentMetadata, Content, CoreError, Part, TaskEnvelope, TaskId};

// ============================================================================
// Part conversions
// ============================================================================

impl From<Part> for pb::Part {
    fn from(part: Part) -> Self {
        let data = match part {
            Part::Text(text) => pb::part::Data::Text(text),
            Part::Blob { mime_type, data } => {
                pb::part::Data::InlineData(pb::Blob { mime_type, data })
            }
        };
        pb::Part { data: Some(data) }
    }
}

impl TryFrom<pb::Part> for Part {
    type Error = CoreError;

    fn try_from(proto: pb::Part) -> Result<Self, Self::Error> {
        match proto.data.ok_or(CoreError::EmptyPart)? {
            pb::part::Data::Text(text) => Ok(Part::Text(text)),
            pb::part::Data::InlineData(blob) => Ok(Part::Blob {
                mime_type: blob.mime_type,
                data: blob.data,
            }),
        }
    }
}

// ============================================================================
// Content conversions
// ============================================================================

impl From<Content> for pb::Content {
    fn from(content: Content) -> Self {
        pb::Content {
            parts: content.parts.into_iter().map(Into::into).collect(),
            role: content.role,
        }
    }
}

impl TryFrom<pb::Content> for Content {
    type Error = CoreError;

    fn try_from(proto: pb::Content) -> Result<Self, Self::Error> {
        let parts = proto
            .parts
            .into_iter()
            .map(Part::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Content {
            role: proto.role,
            parts,
        })
    }
}

// ============================================================================
// TaskEnvelope conversions
// ============================================================================

impl From<TaskEnvelope> for pb::AgentTask {
    fn from(envelope: TaskEnvelope) -> Self {
        pb::AgentTask {
            task_id: envelope.task_id.into_inner(),
            correlation_id: envelope.correlation_id,
            parent_task_id: envelope
                .parent_task_id
                .map(TaskId::into_inner)
                .unwrap_or_default(),
            source_agent_id: envelope.source_agent_id,
            target_agent_id: envelope.target_agent_id,
            task_name: envelope.task_name,
            content: envelope.content.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<pb::AgentTask> for TaskEnvelope {
    type Error = CoreError;

    fn try_from(proto: pb::AgentTask) -> Result<Self, Self::Error> {
        let content = proto
            .content
            .into_iter()
            .map(Content::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let parent_task_id = if proto.parent_task_id.is_empty() {
            None
        } else {
            Some(TaskId::new(proto.parent_task_id))
        };

        Ok(TaskEnvelope {
            task_id: TaskId::new(proto.task_id),
            correlation_id: proto.correlation_id,
            parent_task_id,
            source_agent_id: proto.source_agent_id,
            target_agent_id: proto.target_agent_id,
            task_name: proto.task_name,
            content,
        })
    }
}

// ============================================================================
// AgentMetadata conversions
// ============================================================================

impl From<AgentMetadata> for pb::AgentMetadata {
    fn from(metadata: AgentMetadata) -> Self {
        pb::AgentMetadata {
            name: metadata.name,
            capability: metadata.capability,
            input_description: metadata.input_description,
            output_description: metadata.output_description,
        }
    }
}

impl From<pb::AgentMetadata> for AgentMetadata {
    fn from(proto: pb::AgentMetadata) -> Self {
        AgentMetadata::new(proto.name)
            .with_capability(proto.capability)
            .with_input_description(proto.input_description)
            .with_output_description(proto.output_description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_to_proto() {
        let mut envelope = TaskEnvelope::new(TaskId::new("result-t1"), "Data Analysis Result")
            .with_correlation_id("c1")
            .with_route("agent", "caller");
        envelope.parent_task_id = Some(TaskId::new("t1"));
        envelope.content.push(Content::new(vec![
            Part::text("{}"),
            Part::png(vec![137, 80]),
        ]));

        let proto: pb::AgentTask = envelope.into();
        assert_eq!(proto.task_id, "result-t1");
        assert_eq!(proto.parent_task_id, "t1");
        assert_eq!(proto.source_agent_id, "agent");
        assert_eq!(proto.content[0].parts.len(), 2);
        assert!(matches!(
            &proto.content[0].parts[1].data,
            Some(pb::part::Data::InlineData(blob)) if blob.mime_type == "image/png"
        ));
    }

    #[test]
    fn test_empty_parent_is_none() {
        let proto = pb::AgentTask {
            task_id: "t1".to_string(),
            ..Default::default()
        };
        let envelope = TaskEnvelope::try_from(proto).unwrap();
        assert_eq!(envelope.task_id.as_str(), "t1");
        assert!(envelope.parent_task_id.is_none());
    }

    #[test]
    fn test_part_without_data_rejected() {
        let proto = pb::AgentTask {
            task_id: "t1".to_string(),
            content: vec![pb::Content {
                parts: vec![pb::Part { data: None }],
                role: String::new(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            TaskEnvelope::try_from(proto),
            Err(CoreError::EmptyPart)
        ));
    }

    #[test]
    fn test_role_carried_through() {
        let proto = pb::Content {
            parts: vec![pb::Part {
                data: Some(pb::part::Data::Text("hi".to_string())),
            }],
            role: "user".to_string(),
        };
        let content = Content::try_from(proto).unwrap();
        assert_eq!(content.role, "user");
        assert_eq!(content.parts, vec![Part::text("hi")]);
    }

    #[test]
    fn test_metadata_to_proto() {
        let metadata = AgentMetadata::new("data_analysis_agent").with_capability("stats");
        let proto: pb::AgentMetadata = metadata.into();
        assert_eq!(proto.name, "data_analysis_agent");
        assert_eq!(proto.capability, "stats");
    }
}
