//! Approval callback flavors.
//!
//! `ApprovalGate` bundles the three approvers a deployment can install behind
//! the `SafetyValidator`. The runtime never knows which one is active.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use overseer_contracts::{
    approval::ApprovalDecision,
    error::{OverseerError, OverseerResult},
};
use overseer_core::traits::{ApprovalCallback, ApprovalRequest};

/// An approval callback in one of three flavors.
pub enum ApprovalGate {
    /// Approves everything. For tests and sandboxes only.
    AutoApprove,
    /// Asks a human operator.
    Interactive(InteractiveApprover),
    /// Answers from a fixed table.
    Scripted(ScriptedApprover),
}

impl ApprovalGate {
    pub fn auto_approve() -> Self {
        ApprovalGate::AutoApprove
    }

    /// Prompt on stderr, read answers from stdin, wait indefinitely.
    pub fn stdio() -> Self {
        ApprovalGate::Interactive(InteractiveApprover::new(
            BufReader::new(std::io::stdin()),
            std::io::stderr(),
        ))
    }

    /// A scripted approver answering `default` for tools without an entry.
    pub fn scripted(default: bool) -> ScriptedApprover {
        ScriptedApprover::new(default)
    }
}

impl ApprovalCallback for ApprovalGate {
    fn decide(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
        match self {
            ApprovalGate::AutoApprove => Ok(ApprovalDecision::approve(
                request.risk,
                format!("auto-approved {} tool '{}'", request.risk, request.call.tool),
                "auto",
            )),
            ApprovalGate::Interactive(approver) => approver.decide(request),
            ApprovalGate::Scripted(approver) => approver.decide(request),
        }
    }
}

impl From<InteractiveApprover> for ApprovalGate {
    fn from(approver: InteractiveApprover) -> Self {
        ApprovalGate::Interactive(approver)
    }
}

impl From<ScriptedApprover> for ApprovalGate {
    fn from(approver: ScriptedApprover) -> Self {
        ApprovalGate::Scripted(approver)
    }
}

// ── Interactive ──────────────────────────────────────────────────────────────

/// Prompts an operator and blocks until one line of input arrives.
///
/// `y` or `yes` (any case) approves; any other line rejects. End of input,
/// or no answer within the optional timeout, resolves to a `Timeout`
/// decision, which is a denial.
///
/// Input is read on a dedicated thread so the wait can be bounded. A line
/// that arrives after a prompt timed out answers the next prompt.
pub struct InteractiveApprover {
    lines: Mutex<Receiver<String>>,
    writer: Mutex<Box<dyn Write + Send>>,
    timeout: Option<Duration>,
}

impl InteractiveApprover {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = reader;
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            lines: Mutex::new(rx),
            writer: Mutex::new(Box::new(writer)),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn prompt(&self, request: &ApprovalRequest<'_>) -> std::io::Result<()> {
        let arguments = serde_json::to_string(&request.call.arguments)
            .unwrap_or_else(|_| "<unprintable>".to_string());
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(
            writer,
            "[approval] mission '{}' requests {} tool '{}'",
            request.mission.id, request.risk, request.call.tool
        )?;
        writeln!(writer, "           arguments: {}", arguments)?;
        write!(writer, "Approve? [y/N]: ")?;
        writer.flush()
    }

    fn decide(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
        let tool = &request.call.tool;
        self.prompt(request).map_err(|e| OverseerError::ConfigError {
            reason: format!("approval prompt could not be written: {}", e),
        })?;

        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let answer = match self.timeout {
            Some(limit) => lines.recv_timeout(limit),
            None => lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let decision = match answer {
            Ok(line) => {
                let reply = line.trim().to_ascii_lowercase();
                if reply == "y" || reply == "yes" {
                    ApprovalDecision::approve(
                        request.risk,
                        format!("operator approved tool '{}'", tool),
                        "operator",
                    )
                } else {
                    ApprovalDecision::reject(
                        request.risk,
                        format!("operator rejected tool '{}'", tool),
                        "operator",
                    )
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(tool = %tool, "operator did not answer in time");
                ApprovalDecision::timeout(
                    request.risk,
                    format!(
                        "no operator response for tool '{}' within {}ms",
                        tool,
                        self.timeout.map(|t| t.as_millis()).unwrap_or_default()
                    ),
                    "operator",
                )
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!(tool = %tool, "operator input closed");
                ApprovalDecision::timeout(
                    request.risk,
                    format!("operator input closed before a decision on tool '{}'", tool),
                    "operator",
                )
            }
        };

        debug!(tool = %tool, status = ?decision.status, "operator decision");
        Ok(decision)
    }
}

// ── Scripted ─────────────────────────────────────────────────────────────────

/// Pre-programmed answers keyed by tool name.
///
/// Clones share the log of asked tools, so a test can keep a handle after
/// installing the approver.
#[derive(Debug, Clone)]
pub struct ScriptedApprover {
    answers: HashMap<String, bool>,
    default: bool,
    asked: Arc<Mutex<Vec<String>>>,
}

impl ScriptedApprover {
    pub fn new(default: bool) -> Self {
        Self {
            answers: HashMap::new(),
            default,
            asked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer `approve` whenever `tool` is requested.
    pub fn answer(mut self, tool: impl Into<String>, approve: bool) -> Self {
        self.answers.insert(tool.into(), approve);
        self
    }

    /// Tool names this approver has been asked about, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn decide(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
        let tool = &request.call.tool;
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tool.clone());

        let (approve, source) = match self.answers.get(tool) {
            Some(answer) => (*answer, "scripted answer"),
            None => (self.default, "scripted default"),
        };

        Ok(if approve {
            ApprovalDecision::approve(
                request.risk,
                format!("{} approved tool '{}'", source, tool),
                "script",
            )
        } else {
            ApprovalDecision::reject(
                request.risk,
                format!("{} rejected tool '{}'", source, tool),
                "script",
            )
        })
    }
}

impl ApprovalCallback for ScriptedApprover {
    fn decide(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
        ScriptedApprover::decide(self, request)
    }
}

impl ApprovalCallback for InteractiveApprover {
    fn decide(&self, request: &ApprovalRequest<'_>) -> OverseerResult<ApprovalDecision> {
        InteractiveApprover::decide(self, request)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
