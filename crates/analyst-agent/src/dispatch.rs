//! Sub-task dispatch.
//!
//! Each declared sub-task is looked up by its `type` tag in a closed set of
//! handlers and run in request order. Unknown tags are logged and dropped; a
//! failing handler fails the whole request.

use analyst_analysis::{self as analysis, AnalysisError, Dataset, PlotRequest};
use analyst_core::{Part, SubTaskDescriptor};
use serde_json::{json, Value};
use tracing::warn;

/// Tag reported for a descriptor without a string `type`.
const MISSING_TAG: &str = "<missing>";

/// Every handler the agent knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubTaskKind {
    Describe,
    Correlation,
    MissingValues,
    ValueCounts,
    Plot,
}

impl SubTaskKind {
    pub const ALL: [SubTaskKind; 5] = [
        Self::Describe,
        Self::Correlation,
        Self::MissingValues,
        Self::ValueCounts,
        Self::Plot,
    ];

    /// Look up a handler by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Correlation => "correlation",
            Self::MissingValues => "missing_values",
            Self::ValueCounts => "value_counts",
            Self::Plot => "plot",
        }
    }

    /// Run this handler against `dataset`.
    pub fn run(
        &self,
        dataset: &Dataset,
        descriptor: &SubTaskDescriptor,
    ) -> Result<Part, AnalysisError> {
        match self {
            Self::Describe => self.text_part(analysis::describe(dataset), None),
            Self::Correlation => self.text_part(analysis::correlation(dataset), None),
            Self::MissingValues => self.text_part(analysis::missing_values(dataset), None),
            Self::ValueCounts => {
                let name = descriptor
                    .str_param("column")
                    .ok_or(AnalysisError::MissingParameter {
                        task: "value_counts",
                        param: "column",
                    })?;
                let column = dataset.require_column(name)?;
                self.text_part(analysis::value_counts(column), Some(name))
            }
            Self::Plot => {
                let request = PlotRequest::from_params(descriptor.params())?;
                Ok(Part::png(analysis::render(dataset, &request)?))
            }
        }
    }

    fn text_part(&self, result: Value, column: Option<&str>) -> Result<Part, AnalysisError> {
        let mut payload = json!({
            "task_type": self.as_str(),
            "result": result,
        });
        if let Some(column) = column {
            payload["column"] = Value::from(column);
        }
        Ok(Part::text(serde_json::to_string(&payload)?))
    }
}

/// Output of one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatched {
    /// One part per recognized sub-task, in request order.
    pub parts: Vec<Part>,

    /// Tags of the sub-tasks that were dropped.
    pub skipped: Vec<String>,
}

/// Run every recognized sub-task in order.
pub fn dispatch(
    dataset: &Dataset,
    tasks: &[SubTaskDescriptor],
) -> Result<Dispatched, AnalysisError> {
    let mut dispatched = Dispatched::default();

    for (index, descriptor) in tasks.iter().enumerate() {
        match descriptor.task_type().and_then(SubTaskKind::from_tag) {
            Some(kind) => dispatched.parts.push(kind.run(dataset, descriptor)?),
            None => {
                let tag = descriptor.task_type().unwrap_or(MISSING_TAG);
                warn!(index, task_type = %tag, "Skipping unsupported sub-task type");
                dispatched.skipped.push(tag.to_string());
            }
        }
    }

    Ok(dispatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn descriptor(value: Value) -> SubTaskDescriptor {
        match value {
            Value::Object(map) => SubTaskDescriptor::new(map),
            _ => SubTaskDescriptor::new(Map::new()),
        }
    }

    fn payload(part: &Part) -> Value {
        serde_json::from_str(part.as_text().unwrap()).unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::from_csv("a,b,city\n1,2,paris\n3,4,rome\n5,7,paris\n").unwrap()
    }

    #[test]
    fn test_tags_roundtrip() {
        for kind in SubTaskKind::ALL {
            assert_eq!(SubTaskKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(SubTaskKind::from_tag("pivot"), None);
    }

    #[test]
    fn test_parts_follow_request_order() {
        let tasks = vec![
            descriptor(json!({"type": "missing_values"})),
            descriptor(json!({"type": "describe"})),
            descriptor(json!({"type": "correlation"})),
        ];

        let dispatched = dispatch(&dataset(), &tasks).unwrap();

        let types: Vec<Value> = dispatched
            .parts
            .iter()
            .map(|p| payload(p)["task_type"].clone())
            .collect();
        assert_eq!(
            types,
            vec![
                json!("missing_values"),
                json!("describe"),
                json!("correlation"),
            ]
        );
        assert!(dispatched.skipped.is_empty());
    }

    #[test]
    fn test_unknown_types_skipped() {
        let tasks = vec![
            descriptor(json!({"type": "pivot"})),
            descriptor(json!({"type": "describe"})),
            descriptor(json!({"no_type": true})),
            descriptor(json!({"type": "value_counts", "column": "city"})),
            descriptor(json!({"type": 7})),
        ];

        let dispatched = dispatch(&dataset(), &tasks).unwrap();

        assert_eq!(dispatched.parts.len(), 2);
        assert_eq!(payload(&dispatched.parts[0])["task_type"], "describe");
        assert_eq!(payload(&dispatched.parts[1])["task_type"], "value_counts");
        assert_eq!(dispatched.skipped, vec!["pivot", "<missing>", "<missing>"]);
    }

    #[test]
    fn test_describe_keys_are_numeric_columns() {
        let tasks = vec![descriptor(json!({"type": "describe"}))];
        let dispatched = dispatch(&dataset(), &tasks).unwrap();

        let result = &payload(&dispatched.parts[0])["result"];
        let keys: Vec<&String> = result.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_value_counts_carries_column() {
        let tasks = vec![descriptor(json!({"type": "value_counts", "column": "city"}))];
        let dispatched = dispatch(&dataset(), &tasks).unwrap();

        let value = payload(&dispatched.parts[0]);
        assert_eq!(value["column"], "city");
        assert_eq!(value["result"], json!({"paris": 2, "rome": 1}));
    }

    #[test]
    fn test_value_counts_requires_column() {
        let tasks = vec![
            descriptor(json!({"type": "describe"})),
            descriptor(json!({"type": "value_counts"})),
        ];
        assert!(matches!(
            dispatch(&dataset(), &tasks),
            Err(AnalysisError::MissingParameter {
                task: "value_counts",
                param: "column"
            })
        ));
    }

    #[test]
    fn test_value_counts_unknown_column() {
        let tasks = vec![descriptor(json!({"type": "value_counts", "column": "zip"}))];
        assert!(matches!(
            dispatch(&dataset(), &tasks),
            Err(AnalysisError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_plot_histogram_is_png_blob() {
        let tasks = vec![descriptor(
            json!({"type": "plot", "plot_type": "histogram", "column": "a", "bins": 5}),
        )];
        let dispatched = dispatch(&dataset(), &tasks).unwrap();

        match &dispatched.parts[0] {
            Part::Blob { mime_type, data } => {
                assert_eq!(mime_type, "image/png");
                assert!(!data.is_empty());
            }
            other => panic!("expected blob, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_plot_type_fails() {
        let tasks = vec![descriptor(json!({"type": "plot", "plot_type": "pie"}))];
        assert!(matches!(
            dispatch(&dataset(), &tasks),
            Err(AnalysisError::UnsupportedPlotType(_))
        ));
    }
}
