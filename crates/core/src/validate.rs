//! Structural validation of workflow graphs.
//!
//! Validation runs when a workflow is activated and after authoring
//! mutations. Failures come back as a list of findings, not a single error:
//! a draft may be saved with findings, but activation requires an empty
//! report. Active workflows are trusted and never re-validated per
//! transition.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::graph::{StepKind, WorkflowGraph};

/// One failed check: the offending step or transition and the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFinding {
    pub subject: String,
    pub reason: String,
}

/// Outcome of [`validate_graph`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.findings.is_empty()
    }

    /// Single-line rendering for error messages and logs.
    pub fn summary(&self) -> String {
        self.findings
            .iter()
            .map(|f| format!("{}: {}", f.subject, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn flag(&mut self, subject: impl Into<String>, reason: impl Into<String>) {
        self.findings.push(ValidationFinding {
            subject: subject.into(),
            reason: reason.into(),
        });
    }
}

/// Check the structural invariants of a workflow graph.
///
/// Rules: exactly one START step; at least one END step; END steps have no
/// outgoing transitions; every non-END step has at least one outgoing
/// transition; every step is reachable from START; every non-START step has
/// at least one incoming transition; transition endpoints exist in the
/// workflow. Self-loops are legal and satisfy both edge-count rules.
pub fn validate_graph(graph: &WorkflowGraph) -> ValidationReport {
    let mut report = ValidationReport::default();

    let start_steps: Vec<_> = graph
        .steps()
        .iter()
        .filter(|s| s.kind == StepKind::Start)
        .collect();
    match start_steps.len() {
        0 => report.flag("workflow", "no start step defined"),
        1 => {}
        _ => {
            for step in &start_steps[1..] {
                report.flag(
                    format!("step '{}'", step.name),
                    "additional start step; a workflow has exactly one",
                );
            }
        }
    }

    if !graph.steps().iter().any(|s| s.kind == StepKind::End) {
        report.flag("workflow", "no end step defined");
    }

    // Transitions with endpoints outside the workflow are excluded from the
    // structural walks below; they get their own finding here.
    let mut sound_edges: Vec<(crate::types::DbId, crate::types::DbId)> = Vec::new();
    for transition in graph.transitions() {
        let mut sound = true;
        if graph.step(transition.from_step_id).is_none() {
            report.flag(
                format!("transition '{}'", transition.name),
                format!("from_step {} is not in the workflow", transition.from_step_id),
            );
            sound = false;
        }
        if graph.step(transition.to_step_id).is_none() {
            report.flag(
                format!("transition '{}'", transition.name),
                format!("to_step {} is not in the workflow", transition.to_step_id),
            );
            sound = false;
        }
        if sound {
            sound_edges.push((transition.from_step_id, transition.to_step_id));
        }
    }

    let mut has_incoming = HashSet::new();
    for &(_, to) in &sound_edges {
        has_incoming.insert(to);
    }

    for step in graph.steps() {
        let outgoing = graph
            .transitions_from(step.id)
            .into_iter()
            .filter(|t| graph.step(t.to_step_id).is_some())
            .count();

        match step.kind {
            StepKind::End => {
                if outgoing > 0 {
                    report.flag(
                        format!("step '{}'", step.name),
                        "end step has outgoing transitions",
                    );
                }
            }
            _ => {
                if outgoing == 0 {
                    report.flag(
                        format!("step '{}'", step.name),
                        "dead end: no outgoing transition",
                    );
                }
            }
        }

        if step.kind != StepKind::Start && !has_incoming.contains(&step.id) {
            report.flag(
                format!("step '{}'", step.name),
                "no incoming transition",
            );
        }
    }

    // Reachability from START. Skipped when no start step exists so a single
    // root cause does not flag every step as unreachable.
    if let Some(start) = graph.start_step() {
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::new();
        reachable.insert(start.id);
        queue.push_back(start.id);
        while let Some(step_id) = queue.pop_front() {
            for &(from, to) in &sound_edges {
                if from == step_id && reachable.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        for step in graph.steps() {
            if !reachable.contains(&step.id) {
                report.flag(
                    format!("step '{}'", step.name),
                    "not reachable from the start step",
                );
            }
        }
    }

    report
}
