//! Observable state of a bulk run and the reducer that folds events into it

use serde::Serialize;

use cf_orchestrator_core::types::{BulkOperationResult, BulkSummary, PhaseInfo, ProgressEvent};

/// Where a single domain stands in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainState {
    Pending,
    Processing,
    Success,
    Failed,
}

/// A domain selected for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTarget {
    /// Identifier sent to the server: a zone id or a domain name
    pub id: String,
    pub name: String,
}

impl DomainTarget {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProgress {
    pub id: String,
    pub name: String,
    pub state: DomainState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_names: Vec<String>,
}

impl DomainProgress {
    fn pending(target: DomainTarget) -> Self {
        Self {
            id: target.id,
            name: target.name,
            state: DomainState::Pending,
            message: None,
            error: None,
            template_names: Vec::new(),
        }
    }

    fn matches(&self, result: &BulkOperationResult) -> bool {
        self.id == result.zone_id
            || self.id.eq_ignore_ascii_case(&result.domain_name)
            || self.name.eq_ignore_ascii_case(&result.domain_name)
    }

    fn record(&mut self, result: &BulkOperationResult) {
        self.state = if result.success {
            DomainState::Success
        } else {
            DomainState::Failed
        };
        self.message = Some(result.message.clone());
        self.error.clone_from(&result.error);
        self.template_names.clone_from(&result.template_names);
    }
}

/// Snapshot published to observers after every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSnapshot {
    pub domains: Vec<DomainProgress>,
    pub progress: u8,
    pub is_started: bool,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<PhaseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BulkSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkSnapshot {
    /// Fresh state with every domain pending.
    pub fn initialize(domains: Vec<DomainTarget>) -> Self {
        Self {
            domains: domains.into_iter().map(DomainProgress::pending).collect(),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_started && !self.is_completed
    }

    pub fn count(&self, state: DomainState) -> usize {
        self.domains.iter().filter(|d| d.state == state).count()
    }
}

/// Input to [`reduce`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerInput {
    /// The request went out; every pending domain is now in flight.
    Started,
    /// An event arrived from the server.
    Event(ProgressEvent),
    /// The run ended without a terminal event (connection lost, request rejected).
    Failed(String),
}

/// Fold one action into the state.
pub fn reduce(mut state: BulkSnapshot, action: &ControllerInput) -> BulkSnapshot {
    match action {
        ControllerInput::Started => {
            for domain in &mut state.domains {
                domain.state = DomainState::Processing;
                domain.message = None;
                domain.error = None;
                domain.template_names.clear();
            }
            state.progress = 0;
            state.is_started = true;
            state.is_completed = false;
            state.phase = None;
            state.summary = None;
            state.error = None;
        }
        ControllerInput::Event(event) => {
            state.progress = state.progress.max(event.progress());
            match event {
                ProgressEvent::Progress { phase, .. } => {
                    if phase.is_some() {
                        state.phase.clone_from(phase);
                    }
                }
                ProgressEvent::PhaseUpdate { phase, .. } => {
                    state.phase = Some(phase.clone());
                }
                ProgressEvent::DomainComplete { domain, .. } => {
                    match state.domains.iter_mut().find(|d| d.matches(domain)) {
                        Some(entry) => entry.record(domain),
                        None => {
                            let mut entry = DomainProgress::pending(DomainTarget::new(
                                &domain.zone_id,
                                &domain.domain_name,
                            ));
                            entry.record(domain);
                            state.domains.push(entry);
                        }
                    }
                }
                ProgressEvent::Complete { summary, .. } => {
                    state.summary = Some(*summary);
                    state.is_completed = true;
                }
                ProgressEvent::Error { error, .. } => {
                    finish_with_error(&mut state, error, event.is_cancellation());
                }
            }
        }
        ControllerInput::Failed(error) => finish_with_error(&mut state, error, false),
    }
    state
}

/// Cancelled runs put unfinished domains back to pending; failures mark them failed.
fn finish_with_error(state: &mut BulkSnapshot, error: &str, cancelled: bool) {
    for domain in &mut state.domains {
        if domain.state == DomainState::Processing {
            if cancelled {
                domain.state = DomainState::Pending;
            } else {
                domain.state = DomainState::Failed;
                domain.error = Some(error.to_string());
            }
        }
    }
    state.error = Some(error.to_string());
    state.is_completed = true;
}
