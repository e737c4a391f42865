//! Bulk operation orchestrator
//!
//! A run has three phases weighted 20/60/20 on the progress scale:
//!
//! 1. **apply**: targets in fixed-size batches, each batch concurrently,
//!    with a pause between batches
//! 2. **verify**: re-read what phase 1 changed, with retries
//! 3. **cache refresh**: re-snapshot every domain that is still successful
//!
//! Cancellation is cooperative and checked before each batch and each domain.

mod actions;
mod progress;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests;

pub use progress::ProgressSink;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use cf_orchestrator_provider::ZoneGateway;

use crate::error::{CoreError, CoreResult};
use crate::services::{DomainService, RuleService, ServiceContext, TemplateService};
use crate::transport::ProgressStream;
use crate::types::{
    BulkOperationPayload, BulkOperationRequest, BulkOperationResult, BulkSummary, Phase,
    PhaseInfo, ProgressEvent,
};

use actions::{DomainRun, Verification, VERIFICATION_TIMEOUT};

/// Bulk operation orchestrator
pub struct BulkOperationService {
    ctx: Arc<ServiceContext>,
    domains: DomainService,
    rules: RuleService,
    templates: TemplateService,
}

impl BulkOperationService {
    /// Create bulk operation service instance
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            domains: DomainService::new(ctx.clone()),
            rules: RuleService::new(ctx.clone()),
            templates: TemplateService::new(ctx.clone()),
            ctx,
        }
    }

    /// Validate `payload`, spawn the run and hand back its event stream.
    ///
    /// Validation errors are returned before anything is spawned. Dropping the
    /// stream cancels `cancel`.
    pub fn start(
        self: &Arc<Self>,
        gateway: Arc<dyn ZoneGateway>,
        payload: BulkOperationPayload,
        cancel: CancellationToken,
    ) -> CoreResult<ProgressStream> {
        let request = payload.validate()?;
        let (sink, rx) = ProgressSink::channel(cancel.clone());
        let service = Arc::clone(self);
        let run_token = cancel.clone();

        tokio::spawn(async move {
            if let Err(e) = service
                .run(gateway.as_ref(), request, run_token, sink)
                .await
            {
                log::debug!("[bulk] Run ended early: {e}");
            }
        });
        Ok(ProgressStream::new(rx, cancel))
    }

    /// Execute a validated request, reporting through `sink`.
    ///
    /// Returns the summary that was sent with `complete`, or `Cancelled`.
    pub async fn run(
        &self,
        gateway: &dyn ZoneGateway,
        request: BulkOperationRequest,
        cancel: CancellationToken,
        sink: ProgressSink,
    ) -> CoreResult<BulkSummary> {
        if cancel.is_cancelled() {
            return abort(&sink, 0).await;
        }

        let config = &self.ctx.bulk_config;
        let action = request.action;
        let targets = self.resolve_targets(gateway, &request.targets).await;
        let plan = self.plan(&request).await;
        let total = targets.len();
        let batch_count = total.div_ceil(config.batch_size);
        log::info!(
            "[bulk] Starting {action} on {total} domain(s) in {batch_count} batch(es)"
        );

        // ===== Phase 1: apply =====
        sink.emit(ProgressEvent::PhaseUpdate {
            progress: 0,
            phase: PhaseInfo::new(Phase::ApiCalls, action.label(), 0),
        })
        .await;

        let mut runs: Vec<DomainRun> = Vec::with_capacity(total);
        for (index, batch) in targets.chunks(config.batch_size).enumerate() {
            if index > 0 {
                pause(config.batch_delay, &cancel).await;
            }
            if cancel.is_cancelled() {
                return abort(&sink, Phase::ApiCalls.scaled(runs.len(), total)).await;
            }

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|target| self.apply(gateway, action, &plan, target.clone())),
            )
            .await;

            for run in outcomes {
                let done = runs.len() + 1;
                sink.emit(ProgressEvent::DomainComplete {
                    progress: Phase::ApiCalls.scaled(done, total),
                    domain: run.result.clone(),
                    completed_domains: done,
                    total_domains: total,
                })
                .await;
                runs.push(run);
            }

            sink.emit(ProgressEvent::PhaseUpdate {
                progress: Phase::ApiCalls.scaled(runs.len(), total),
                phase: PhaseInfo::new(
                    Phase::ApiCalls,
                    format!("{} (batch {}/{batch_count})", action.label(), index + 1),
                    Phase::local(runs.len(), total),
                ),
            })
            .await;
        }

        // ===== Phase 2: verify =====
        let to_verify = successful(&runs);
        let verify_total = to_verify.len();
        sink.emit(ProgressEvent::PhaseUpdate {
            progress: Phase::Verification.scaled(0, verify_total),
            phase: PhaseInfo::new(
                Phase::Verification,
                format!("Verifying {verify_total} domain(s)"),
                0,
            ),
        })
        .await;

        for (done, &index) in to_verify.iter().enumerate() {
            if cancel.is_cancelled() {
                return abort(&sink, Phase::Verification.scaled(done, verify_total)).await;
            }

            let run = &mut runs[index];
            match self.verify(gateway, run, &cancel).await {
                Verification::Confirmed => {}
                Verification::Cancelled => {
                    return abort(&sink, Phase::Verification.scaled(done, verify_total)).await;
                }
                Verification::Mismatch => {
                    log::warn!(
                        "[bulk] {action} on {} could not be verified",
                        run.target.domain_name
                    );
                    run.result.success = false;
                    run.result.error = Some(VERIFICATION_TIMEOUT.to_string());
                    sink.emit(ProgressEvent::DomainComplete {
                        progress: Phase::Verification.scaled(done, verify_total),
                        domain: run.result.clone(),
                        completed_domains: total,
                        total_domains: total,
                    })
                    .await;
                }
            }

            sink.emit(ProgressEvent::Progress {
                progress: Phase::Verification.scaled(done + 1, verify_total),
                current_domain: Some(run.target.domain_name.clone()),
                completed_domains: done + 1,
                total_domains: verify_total,
                phase: Some(PhaseInfo::new(
                    Phase::Verification,
                    format!("Verified {}", run.target.domain_name),
                    Phase::local(done + 1, verify_total),
                )),
            })
            .await;
        }

        // ===== Phase 3: cache refresh =====
        let to_refresh = successful(&runs);
        let refresh_total = to_refresh.len();
        sink.emit(ProgressEvent::PhaseUpdate {
            progress: Phase::CacheRefresh.scaled(0, refresh_total),
            phase: PhaseInfo::new(
                Phase::CacheRefresh,
                format!("Refreshing cache for {refresh_total} domain(s)"),
                0,
            ),
        })
        .await;

        for (done, &index) in to_refresh.iter().enumerate() {
            if cancel.is_cancelled() {
                return abort(&sink, Phase::CacheRefresh.scaled(done, refresh_total)).await;
            }

            let target = &runs[index].target;
            if let Err(e) = self.refresh(gateway, action, &target.zone_id).await {
                log::warn!(
                    "[bulk] Cache refresh failed for {}: {e}",
                    target.domain_name
                );
            }

            sink.emit(ProgressEvent::Progress {
                progress: Phase::CacheRefresh.scaled(done + 1, refresh_total),
                current_domain: Some(target.domain_name.clone()),
                completed_domains: done + 1,
                total_domains: refresh_total,
                phase: Some(PhaseInfo::new(
                    Phase::CacheRefresh,
                    format!("Refreshed {}", target.domain_name),
                    Phase::local(done + 1, refresh_total),
                )),
            })
            .await;
        }

        let results: Vec<BulkOperationResult> = runs.into_iter().map(|r| r.result).collect();
        let summary = BulkSummary::from_results(&results);
        log::info!(
            "[bulk] {action} finished: {} succeeded, {} failed",
            summary.successful,
            summary.failed
        );
        sink.emit(ProgressEvent::Complete {
            progress: 100,
            summary,
        })
        .await;
        Ok(summary)
    }
}

fn successful(runs: &[DomainRun]) -> Vec<usize> {
    runs.iter()
        .enumerate()
        .filter(|(_, run)| run.result.success)
        .map(|(index, _)| index)
        .collect()
}

async fn abort(sink: &ProgressSink, progress: u8) -> CoreResult<BulkSummary> {
    log::warn!("[bulk] Run cancelled at {progress}%");
    sink.emit(ProgressEvent::cancelled(progress)).await;
    Err(CoreError::Cancelled)
}

/// Sleep for `duration` unless cancelled first. Returns `false` when cancelled.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => true,
        () = cancel.cancelled() => false,
    }
}
