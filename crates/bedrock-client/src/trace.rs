use aws_sdk_bedrockagentruntime::types::{OrchestrationTrace, Trace, TracePart};
use bedrock_core::{TraceEvent, TraceKind};

/// Convert a streamed trace part into a workspace trace event.
pub(crate) fn convert_trace_part(part: &TracePart) -> Option<TraceEvent> {
    let trace = part.trace()?;

    let event = match trace {
        Trace::OrchestrationTrace(orchestration) => convert_orchestration(orchestration),
        Trace::FailureTrace(failure) => TraceEvent::new(
            TraceKind::Failure,
            failure.failure_reason().unwrap_or("unknown failure"),
        ),
        other => TraceEvent::new(TraceKind::Other, format!("{other:?}")),
    };

    match part.collaborator_name().or_else(|| part.agent_id()) {
        Some(agent) => Some(event.from_agent(agent)),
        None => Some(event),
    }
}

fn convert_orchestration(trace: &OrchestrationTrace) -> TraceEvent {
    match trace {
        OrchestrationTrace::Rationale(rationale) => {
            TraceEvent::new(TraceKind::Rationale, rationale.text().unwrap_or_default())
        }
        OrchestrationTrace::InvocationInput(input) => {
            match input.agent_collaborator_invocation_input() {
                Some(collaborator) => TraceEvent::new(
                    TraceKind::Collaboration,
                    format!(
                        "delegating to {}",
                        collaborator.agent_collaborator_name().unwrap_or("collaborator")
                    ),
                ),
                None => TraceEvent::new(TraceKind::Other, format!("{input:?}")),
            }
        }
        OrchestrationTrace::Observation(observation) => {
            if let Some(response) = observation.final_response() {
                TraceEvent::new(TraceKind::FinalResponse, response.text().unwrap_or_default())
            } else if let Some(output) = observation.agent_collaborator_invocation_output() {
                TraceEvent::new(
                    TraceKind::Observation,
                    format!(
                        "{} responded: {}",
                        output.agent_collaborator_name().unwrap_or("collaborator"),
                        output.output().and_then(|payload| payload.text()).unwrap_or_default()
                    ),
                )
            } else {
                TraceEvent::new(TraceKind::Observation, format!("{observation:?}"))
            }
        }
        OrchestrationTrace::ModelInvocationInput(input) => {
            TraceEvent::new(TraceKind::ModelInvocation, input.text().unwrap_or_default())
        }
        other => TraceEvent::new(TraceKind::ModelInvocation, format!("{other:?}")),
    }
}
