use std::fmt;

use nagiosplugin::{Metric, Resource, ServiceState, TriggerIfValue};

use crate::probe::ProbeResult;

const RESOURCE_NAME: &str = "stream";
const METRIC_NAME: &str = "status";

/// Plugin resource for one probe run: critical unless the stream is connected.
pub(crate) fn stream_resource(stream_name: &str, result: &ProbeResult) -> Resource {
    let mut description = stream_name.to_string();
    if let Some(err) = &result.error {
        description.push_str(&format!("\nCheck Error: {err}"));
    }
    if let Some(reason) = &result.decode_error {
        description.push_str(&format!("\nBody Error: {reason}"));
    }

    Resource::new(RESOURCE_NAME)
        .with_description(&description)
        .with_result(
            Metric::new(METRIC_NAME, i32::from(result.connected)).with_thresholds(
                None,
                1,
                TriggerIfValue::Less,
            ),
        )
}

/// Plugin resource for a run that could not be configured.
pub(crate) fn unknown_resource(reason: impl fmt::Display) -> Resource {
    Resource::new(RESOURCE_NAME)
        .with_fixed_state(ServiceState::Unknown)
        .with_description(&reason.to_string())
}
