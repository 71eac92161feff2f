//! The safety validator: the `ActionGate` installed in every runtime.
//!
//! Decision algorithm for one requested call:
//!
//! 1. Effective risk = the risk policy override, or the tool's declared risk.
//! 2. A mission with `requires_approval` escalates `Safe` to `Review`.
//! 3. `Safe` → approved unconditionally, no callback consulted.
//! 4. Anything else → the configured `ApprovalCallback`. With no callback
//!    configured the call is denied (fail closed). A callback that errors is
//!    a denial too.
//! 5. The decision, whichever path produced it, is appended to the audit
//!    sink as exactly one `ApprovalRecord` before it is returned.

use std::sync::Arc;

use tracing::{debug, info, warn};

use overseer_contracts::{
    approval::{ApprovalDecision, ApprovalRecord},
    error::OverseerResult,
    tool::RiskLevel,
};
use overseer_core::traits::{ActionGate, ApprovalCallback, ApprovalRequest, AuditSink};

use crate::rule::RiskPolicy;

/// Who is recorded as the approver of an unconditionally approved call.
pub const SAFE_APPROVER: &str = "policy:safe";
/// Who is recorded when no callback is configured.
pub const DEFAULT_DENY: &str = "policy:default-deny";
/// Who is recorded when the callback itself failed.
pub const CALLBACK_FAULT: &str = "policy:callback-error";

/// Risk-gated approval with a mandatory audit trail.
///
/// ```rust,ignore
/// let audit = Arc::new(InMemoryAuditSink::new());
/// let validator = SafetyValidator::new(audit.clone())
///     .with_policy(RiskPolicy::from_file(Path::new("risk.toml"))?)
///     .with_callback(ApprovalGate::stdio());
/// ```
pub struct SafetyValidator {
    policy: RiskPolicy,
    callback: Option<Box<dyn ApprovalCallback>>,
    audit: Arc<dyn AuditSink>,
}

impl SafetyValidator {
    /// A validator with no overrides and no callback: only `Safe` calls pass.
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            policy: RiskPolicy::empty(),
            callback: None,
            audit,
        }
    }

    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_callback(mut self, callback: impl ApprovalCallback + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn with_boxed_callback(mut self, callback: Box<dyn ApprovalCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    fn decide(&self, request: &ApprovalRequest<'_>, risk: RiskLevel) -> ApprovalDecision {
        let tool = &request.call.tool;

        if risk == RiskLevel::Safe {
            return ApprovalDecision::approve(
                risk,
                format!("tool '{}' is classified safe", tool),
                SAFE_APPROVER,
            );
        }

        let Some(callback) = &self.callback else {
            return ApprovalDecision::reject(
                risk,
                format!("no approval callback configured for {} tool '{}'", risk, tool),
                DEFAULT_DENY,
            );
        };

        let routed = ApprovalRequest { risk, ..*request };
        match callback.decide(&routed) {
            Ok(mut decision) => {
                decision.risk = risk;
                if !decision.approved && !decision.reason.contains(tool.as_str()) {
                    decision.reason = format!("tool '{}' denied: {}", tool, decision.reason);
                }
                decision
            }
            Err(e) => {
                warn!(tool = %tool, error = %e, "approval callback faulted, denying");
                ApprovalDecision::reject(
                    risk,
                    format!("approval callback failed for tool '{}': {}", tool, e),
                    CALLBACK_FAULT,
                )
            }
        }
    }
}

impl std::fmt::Debug for SafetyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyValidator")
            .field("policy", &self.policy)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl ActionGate for SafetyValidator {
    fn approve(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
        let mut risk = self.policy.effective_risk(&request.call.tool, request.risk);
        if risk == RiskLevel::Safe && request.mission.requires_approval {
            debug!(
                mission_id = %request.mission.id,
                tool = %request.call.tool,
                "mission requires approval, escalating safe call to review"
            );
            risk = RiskLevel::Review;
        }

        let decision = self.decide(request, risk);

        // An unaudited decision must not take effect.
        self.audit
            .append(&ApprovalRecord::from_decision(request.call, &decision))?;

        if decision.approved {
            info!(
                mission_id = %request.mission.id,
                tool = %request.call.tool,
                risk = %risk,
                approved_by = %decision.approved_by,
                "tool call approved"
            );
        } else {
            warn!(
                mission_id = %request.mission.id,
                tool = %request.call.tool,
                risk = %risk,
                reason = %decision.reason,
                "tool call denied"
            );
        }

        Ok(decision)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use overseer_contracts::{
        approval::{ApprovalDecision, ApprovalRecord, ApprovalStatus},
        error::{OverseerError, OverseerResult},
        execution::ExecutionContext,
        mission::Mission,
        thought::ToolCall,
        tool::RiskLevel,
    };
    use overseer_core::traits::{ActionGate, ApprovalCallback, ApprovalRequest, AuditSink};

    use super::{SafetyValidator, DEFAULT_DENY, SAFE_APPROVER};
    use crate::{gate::ApprovalGate, rule::RiskPolicy};

    // ── Mocks ────────────────────────────────────────────────────────────────

    #[derive(Default, Clone)]
    struct RecordingSink {
        records: Arc<Mutex<Vec<ApprovalRecord>>>,
    }

    impl AuditSink for RecordingSink {
        fn append(&self, record: &ApprovalRecord) -> OverseerResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    impl AuditSink for BrokenSink {
        fn append(&self, _record: &ApprovalRecord) -> OverseerResult<()> {
            Err(OverseerError::AuditWriteFailed {
                reason: "disk full".to_string(),
            })
        }
    }

    /// Records the risk it was asked about, then answers with `approve`.
    struct SpyCallback {
        seen: Arc<Mutex<Vec<RiskLevel>>>,
        approve: bool,
    }

    impl ApprovalCallback for SpyCallback {
        fn decide(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
            self.seen.lock().unwrap().push(request.risk);
            Ok(if self.approve {
                ApprovalDecision::approve(request.risk, "looks fine", "spy")
            } else {
                ApprovalDecision::reject(request.risk, "not today", "spy")
            })
        }
    }

    struct FailingCallback;

    impl ApprovalCallback for FailingCallback {
        fn decide(&self, _request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
            Err(OverseerError::config("approver service unreachable"))
        }
    }

    fn ask(
        validator: &SafetyValidator,
        mission: &Mission,
        tool: &str,
        risk: RiskLevel,
    ) -> OverseerResult<ApprovalDecision> {
        let call = ToolCall::from_value(tool, json!({ "id": 7 }));
        let context = ExecutionContext::new();
        validator.approve(&ApprovalRequest {
            call: &call,
            mission,
            context: &context,
            risk,
        })
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn test_safe_call_auto_approved_and_audited() {
        let sink = RecordingSink::default();
        let validator = SafetyValidator::new(Arc::new(sink.clone()));

        let decision = ask(&validator, &Mission::new("m", "g"), "search", RiskLevel::Safe).unwrap();

        assert!(decision.approved);
        assert_eq!(decision.approved_by, SAFE_APPROVER);
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_name, "search");
        assert_eq!(records[0].status, ApprovalStatus::Approved);
        assert_eq!(records[0].tool_args["id"], json!(7));
    }

    /// Fail closed: a destructive call with no callback is denied, and the
    /// denial names the tool.
    #[test]
    fn test_no_callback_denies_non_safe() {
        let sink = RecordingSink::default();
        let validator = SafetyValidator::new(Arc::new(sink.clone()));

        let decision = ask(
            &validator,
            &Mission::new("m", "g"),
            "delete_document",
            RiskLevel::Destructive,
        )
        .unwrap();

        assert!(!decision.approved);
        assert_eq!(decision.status, ApprovalStatus::Rejected);
        assert_eq!(decision.approved_by, DEFAULT_DENY);
        assert!(decision.reason.contains("delete_document"));
        assert!(decision.reason.contains("destructive"));
        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_callback_receives_effective_risk_from_policy() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let policy = RiskPolicy::from_toml_str(
            r#"
            [[rules]]
            id = "writes"
            tool = "kb.*"
            risk = "destructive"
            "#,
        )
        .unwrap();
        let validator = SafetyValidator::new(Arc::new(RecordingSink::default()))
            .with_policy(policy)
            .with_callback(SpyCallback {
                seen: seen.clone(),
                approve: true,
            });

        let decision = ask(&validator, &Mission::new("m", "g"), "kb.write", RiskLevel::Safe).unwrap();

        assert!(decision.approved);
        assert_eq!(decision.risk, RiskLevel::Destructive);
        assert_eq!(seen.lock().unwrap().as_slice(), &[RiskLevel::Destructive]);
    }

    #[test]
    fn test_mission_requiring_approval_escalates_safe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let validator = SafetyValidator::new(Arc::new(RecordingSink::default())).with_callback(
            SpyCallback {
                seen: seen.clone(),
                approve: false,
            },
        );
        let mission = Mission::new("m", "g").requiring_approval();

        let decision = ask(&validator, &mission, "search", RiskLevel::Safe).unwrap();

        assert!(!decision.approved);
        assert_eq!(seen.lock().unwrap().as_slice(), &[RiskLevel::Review]);
        // The callback's own reason did not name the tool; the validator adds it.
        assert!(decision.reason.contains("search"));
        assert!(decision.reason.contains("not today"));
    }

    #[test]
    fn test_callback_fault_is_denial() {
        let sink = RecordingSink::default();
        let validator =
            SafetyValidator::new(Arc::new(sink.clone())).with_callback(FailingCallback);

        let decision = ask(&validator, &Mission::new("m", "g"), "deploy", RiskLevel::Review).unwrap();

        assert!(!decision.approved);
        assert!(decision.reason.contains("approver service unreachable"));
        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_audit_failure_propagates() {
        let validator = SafetyValidator::new(Arc::new(BrokenSink));
        let err = ask(&validator, &Mission::new("m", "g"), "search", RiskLevel::Safe).unwrap_err();
        assert!(matches!(err, OverseerError::AuditWriteFailed { .. }));
    }

    /// One record per decision, whichever flavor made it.
    #[test]
    fn test_every_decision_audited_with_scripted_gate() {
        let sink = RecordingSink::default();
        let gate = ApprovalGate::scripted(false).answer("publish", true);
        let validator = SafetyValidator::new(Arc::new(sink.clone())).with_callback(gate);
        let mission = Mission::new("m", "g");

        assert!(ask(&validator, &mission, "list", RiskLevel::Safe).unwrap().approved);
        assert!(ask(&validator, &mission, "publish", RiskLevel::Review).unwrap().approved);
        assert!(!ask(&validator, &mission, "purge", RiskLevel::Destructive).unwrap().approved);

        let records = sink.records.lock().unwrap();
        let statuses: Vec<ApprovalStatus> = records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                ApprovalStatus::Approved,
                ApprovalStatus::Approved,
                ApprovalStatus::Rejected
            ]
        );
    }
}
