//! # sentinel-contracts
//!
//! Shared types, decisions, and remote review contracts for the Sentinel
//! supervision runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, error types, and the mapping between
//! local decisions and the backend's decision values.

pub mod call;
pub mod decision;
pub mod error;
pub mod ids;
pub mod mock;
pub mod record;
pub mod remote;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use call::{Arguments, CallContext, ChainSlot, Message, ToolCall};
    use decision::{Decision, DecisionKind, Modification};
    use error::SentinelError;
    use ids::{ExecutionId, RequestId};
    use remote::{RemoteDecision, ReviewStatus, SupervisionRequest, SupervisionResult, ToolRequest};

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    fn divide_call() -> ToolCall {
        ToolCall::new("divide", args(json!({ "a": 10, "b": 0 })))
    }

    fn remote_result(decision: RemoteDecision, modified: Option<ToolRequest>) -> SupervisionResult {
        SupervisionResult {
            decision,
            reasoning: "looked at it".to_string(),
            modified_tool_request: modified,
            created_at: chrono::Utc::now(),
        }
    }

    // ── Decision ─────────────────────────────────────────────────────────────

    #[test]
    fn only_modify_carries_a_modification() {
        assert!(Decision::approve("ok").modification().is_none());
        assert!(Decision::reject("no").modification().is_none());
        assert!(Decision::escalate("?").modification().is_none());
        assert!(Decision::terminate("stop").modification().is_none());

        let modify = Decision::modify(args(json!({ "x": 5 })), "clamped");
        assert_eq!(modify.kind(), DecisionKind::Modify);
        assert_eq!(modify.modification().unwrap().arguments["x"], json!(5));
    }

    #[test]
    fn affirmative_kinds() {
        assert!(Decision::approve("").is_affirmative());
        assert!(Decision::modify(Arguments::new(), "").is_affirmative());
        assert!(!Decision::escalate("").is_affirmative());
        assert!(!Decision::reject("").is_affirmative());
        assert!(!Decision::terminate("").is_affirmative());
    }

    #[test]
    fn decision_display_includes_kind_and_explanation() {
        assert_eq!(Decision::escalate("b<=0").to_string(), "escalate: b<=0");
        assert_eq!(Decision::approve("").to_string(), "approve");
    }

    #[test]
    fn decision_serializes_with_snake_case_tag() {
        let value = serde_json::to_value(Decision::reject("nope")).unwrap();
        assert_eq!(value["decision"], json!("reject"));
        assert_eq!(value["explanation"], json!("nope"));
    }

    // ── Remote decision mapping ──────────────────────────────────────────────

    #[test]
    fn remote_decisions_map_onto_local_kinds() {
        let cases = [
            (RemoteDecision::Approve, DecisionKind::Approve),
            (RemoteDecision::Reject, DecisionKind::Reject),
            (RemoteDecision::Escalate, DecisionKind::Escalate),
            (RemoteDecision::Terminate, DecisionKind::Terminate),
            (RemoteDecision::Unknown, DecisionKind::Escalate),
        ];
        for (remote, expected) in cases {
            assert_eq!(remote_result(remote, None).into_decision(&divide_call()).kind(), expected);
        }
    }

    #[test]
    fn remote_modify_carries_modified_arguments() {
        let modified = ToolRequest {
            tool: "divide".to_string(),
            arguments: args(json!({ "b": 2 })),
        };
        let decision = remote_result(RemoteDecision::Modify, Some(modified)).into_decision(&divide_call());
        assert_eq!(decision.kind(), DecisionKind::Modify);
        let modification = decision.modification().unwrap();
        assert_eq!(modification.arguments["b"], json!(2));
        assert_eq!(modification.original, Some(divide_call()));
    }

    #[test]
    fn remote_modify_without_payload_escalates() {
        let decision = remote_result(RemoteDecision::Modify, None).into_decision(&divide_call());
        assert_eq!(decision.kind(), DecisionKind::Escalate);
    }

    #[test]
    fn unrecognized_remote_value_deserializes_to_unknown() {
        let decoded: RemoteDecision = serde_json::from_str("\"maybe_later\"").unwrap();
        assert_eq!(decoded, RemoteDecision::Unknown);
    }

    #[test]
    fn local_decision_round_trips_through_a_remote_result() {
        let call = divide_call();
        let local = Decision::Modify {
            modification: Modification::new(args(json!({ "b": 1 }))).against(&call),
            explanation: "b must be positive".to_string(),
        };
        let result = SupervisionResult::from_decision(&local, &call);
        assert_eq!(result.decision, RemoteDecision::Modify);
        assert_eq!(result.into_decision(&call), local);
    }

    #[test]
    fn reported_modification_names_the_tool() {
        let local = Decision::modify(args(json!({ "b": 1 })), "b must be positive");
        let result = SupervisionResult::from_decision(&local, &divide_call());
        let modified = result.modified_tool_request.unwrap();
        assert_eq!(modified.tool, "divide");
        assert_eq!(modified.arguments, args(json!({ "b": 1 })));
    }

    // ── ReviewStatus ─────────────────────────────────────────────────────────

    #[test]
    fn terminal_statuses() {
        assert!(!ReviewStatus::Pending.is_terminal());
        assert!(!ReviewStatus::Assigned.is_terminal());
        assert!(ReviewStatus::Completed.is_terminal());
        assert!(ReviewStatus::Failed.is_terminal());
        assert!(ReviewStatus::Timeout.is_terminal());
    }

    // ── SupervisionRequest ───────────────────────────────────────────────────

    #[test]
    fn request_forwards_only_recent_history() {
        let call = ToolCall::new("divide", args(json!({ "a": 10, "b": 0 })));
        let ctx = CallContext::new().with_messages(vec![
            Message::new("user", "one"),
            Message::new("assistant", "two"),
            Message::new("user", "three"),
        ]);
        let slot = ChainSlot {
            chain_index: 0,
            position: 1,
            chain_len: 2,
            chain_id: None,
            supervisor_id: None,
        };

        let request = SupervisionRequest::for_call(&call, &ctx, &slot, 2);

        assert_eq!(request.execution_id, ctx.execution_id);
        assert_eq!(request.position_in_chain, 1);
        assert_eq!(request.tool_requests.len(), 1);
        assert_eq!(request.tool_requests[0].tool, "divide");
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
        assert_eq!(request.call(), Some(call));
    }

    #[test]
    fn request_forwards_prior_results() {
        let call = ToolCall::new("divide", args(json!({ "a": 4, "b": 2 })));
        let ctx = CallContext::new().with_prior_results(vec![json!(2.5), json!({ "sum": 7 })]);
        let slot = ChainSlot {
            chain_index: 0,
            position: 0,
            chain_len: 1,
            chain_id: None,
            supervisor_id: None,
        };

        let request = SupervisionRequest::for_call(&call, &ctx, &slot, 10);

        assert_eq!(request.prior_results, vec![json!(2.5), json!({ "sum": 7 })]);
    }

    #[test]
    fn chain_slot_last_position() {
        let slot = ChainSlot {
            chain_index: 0,
            position: 1,
            chain_len: 2,
            chain_id: None,
            supervisor_id: None,
        };
        assert!(slot.is_last());
        assert!(!ChainSlot { position: 0, ..slot }.is_last());
    }

    // ── Ids ──────────────────────────────────────────────────────────────────

    #[test]
    fn execution_id_new_produces_unique_values() {
        let ids: std::collections::HashSet<ExecutionId> =
            (0..100).map(|_| ExecutionId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn ids_serialize_as_bare_uuids() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }

    // ── SentinelError display messages ───────────────────────────────────────

    #[test]
    fn error_config_display() {
        let err = SentinelError::config("unknown supervisor 'x'");
        let msg = err.to_string();
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("unknown supervisor 'x'"));
    }

    #[test]
    fn error_timeout_display_is_distinct_from_transport() {
        let timeout = SentinelError::ReviewTimedOut {
            request_id: RequestId::new(),
            waited_secs: 30,
        }
        .to_string();
        let transport = SentinelError::transport("connection refused").to_string();
        assert!(timeout.contains("did not resolve within 30s"));
        assert!(transport.contains("transport error"));
        assert!(!transport.contains("did not resolve"));
    }

    #[test]
    fn only_terminated_is_terminal() {
        let terminated = SentinelError::Terminated {
            tool: "rm".to_string(),
            explanation: "destructive".to_string(),
        };
        assert!(terminated.is_terminal());
        assert!(!SentinelError::config("x").is_terminal());
    }

    // ── MockPolicy ───────────────────────────────────────────────────────────

    #[test]
    fn mock_policy_defaults_to_real_execution() {
        assert!(!mock::MockPolicy::default().is_mocked());
        assert!(mock::MockPolicy::Replay.is_mocked());
    }
}
