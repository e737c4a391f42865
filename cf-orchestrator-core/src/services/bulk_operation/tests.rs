use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use cf_orchestrator_provider::ZoneGateway;

use super::*;
use crate::test_utils::{
    context, context_with_store, context_with_templates, remote_rule, template, zone_id,
    MockGateway, YieldingStore,
};
use crate::types::{SecurityLevel, CANCELLED_MESSAGE};

fn gateway_with(zones: u32) -> Arc<MockGateway> {
    let mut gateway = MockGateway::new();
    for n in 1..=zones {
        gateway = gateway.with_zone(&zone_id(n), &format!("d{n}.com"));
    }
    Arc::new(gateway)
}

fn payload(action: &str, targets: Vec<String>, rules: Option<Vec<&str>>) -> BulkOperationPayload {
    BulkOperationPayload {
        action: Some(action.to_string()),
        target_domains: targets,
        selected_rules: rules.map(|r| r.into_iter().map(str::to_string).collect()),
    }
}

fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(zone_id).collect()
}

async fn run_all(
    ctx: Arc<ServiceContext>,
    gateway: &Arc<MockGateway>,
    payload: BulkOperationPayload,
) -> Vec<ProgressEvent> {
    run_with(ctx, gateway, payload, CancellationToken::new()).await
}

async fn run_with(
    ctx: Arc<ServiceContext>,
    gateway: &Arc<MockGateway>,
    payload: BulkOperationPayload,
    cancel: CancellationToken,
) -> Vec<ProgressEvent> {
    let service = Arc::new(BulkOperationService::new(ctx));
    let dyn_gateway: Arc<dyn ZoneGateway> = gateway.clone();
    service
        .start(dyn_gateway, payload, cancel)
        .unwrap()
        .collect()
        .await
}

fn summary(events: &[ProgressEvent]) -> BulkSummary {
    match events.last() {
        Some(ProgressEvent::Complete { summary, .. }) => *summary,
        other => panic!("run did not complete: {other:?}"),
    }
}

fn domain_results(events: &[ProgressEvent]) -> Vec<&BulkOperationResult> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::DomainComplete { domain, .. } => Some(domain),
            _ => None,
        })
        .collect()
}

fn phase_updates(events: &[ProgressEvent], phase: Phase) -> Vec<&PhaseInfo> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::PhaseUpdate { phase: info, .. } if info.current == phase => Some(info),
            _ => None,
        })
        .collect()
}

fn phase_progress(events: &[ProgressEvent], phase: Phase) -> usize {
    events
        .iter()
        .filter(|e| {
            matches!(e, ProgressEvent::Progress { phase: Some(info), .. } if info.current == phase)
        })
        .count()
}

#[tokio::test]
async fn under_attack_on_three_domains() {
    let gateway = gateway_with(3);
    let events = run_all(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=3), None),
    )
    .await;

    assert_eq!(domain_results(&events).len(), 3);
    let batches = phase_updates(&events, Phase::ApiCalls);
    assert_eq!(batches.len(), 2);
    assert!(batches[1].description.contains("batch 1/1"));
    assert_eq!(phase_progress(&events, Phase::Verification), 3);
    assert_eq!(phase_progress(&events, Phase::CacheRefresh), 3);

    let summary = summary(&events);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 3);
    for n in 1..=3 {
        assert_eq!(
            gateway.get_security_level(&zone_id(n)).await.unwrap(),
            SecurityLevel::UnderAttack
        );
    }
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let gateway = gateway_with(7);
    let events = run_all(context(), &gateway, payload("enable_proxy", ids(1..=7), None)).await;

    let progress: Vec<u8> = events.iter().map(ProgressEvent::progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn six_domains_run_in_two_batches() {
    let gateway = gateway_with(6);
    let events = run_all(context(), &gateway, payload("enable_bot_fight", ids(1..=6), None)).await;

    let batches = phase_updates(&events, Phase::ApiCalls);
    assert_eq!(batches.len(), 3);
    assert!(batches[1].description.contains("batch 1/2"));
    assert!(batches[2].description.contains("batch 2/2"));

    let completed: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::DomainComplete {
                completed_domains, ..
            } => Some(*completed_domains),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(summary(&events).successful, 6);
}

#[tokio::test]
async fn totals_match_input_even_when_some_fail() {
    let gateway = gateway_with(3);
    gateway.fail_writes(&zone_id(2)).await;
    let events = run_all(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=3), None),
    )
    .await;

    let results = domain_results(&events);
    assert_eq!(results.len(), 3);
    let failed = results.iter().find(|r| r.zone_id == zone_id(2)).unwrap();
    assert!(!failed.success);
    assert!(failed.error.is_some());

    // failed domains are not verified
    assert_eq!(phase_progress(&events, Phase::Verification), 2);
    let summary = summary(&events);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful + summary.failed, summary.total);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn unverified_write_counts_as_failure() {
    let gateway = gateway_with(3);
    gateway.drop_writes(&zone_id(2)).await;
    let events = run_all(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=3), None),
    )
    .await;

    let results = domain_results(&events);
    // three from phase 1, one downgrade from phase 2
    assert_eq!(results.len(), 4);
    let downgraded = results.last().unwrap();
    assert_eq!(downgraded.zone_id, zone_id(2));
    assert!(!downgraded.success);
    assert_eq!(downgraded.error.as_deref(), Some(VERIFICATION_TIMEOUT));

    let summary = summary(&events);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(phase_progress(&events, Phase::CacheRefresh), 2);
}

#[tokio::test]
async fn refresh_failure_keeps_outcome() {
    let gateway = gateway_with(2);
    gateway.fail_refresh(&zone_id(1)).await;
    let events = run_all(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=2), None),
    )
    .await;

    let summary = summary(&events);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn unresolved_name_passes_through_and_fails() {
    let gateway = gateway_with(1);
    let events = run_all(
        context(),
        &gateway,
        payload(
            "enable_bot_fight",
            vec!["d1.com".into(), "missing.com".into()],
            None,
        ),
    )
    .await;

    let results = domain_results(&events);
    assert_eq!(results[0].zone_id, zone_id(1));
    assert_eq!(results[0].domain_name, "d1.com");
    assert!(results[0].success);
    assert_eq!(results[1].domain_name, "missing.com");
    assert!(!results[1].success);
    assert_eq!(summary(&events).total, 2);
}

#[tokio::test]
async fn add_rules_deploys_and_analyzes() {
    let ctx = context_with_templates(vec![template("R01", "1.0"), template("R02", "1.0")]).await;
    let gateway = gateway_with(2);
    let events = run_all(
        ctx.clone(),
        &gateway,
        payload("add", ids(1..=2), Some(vec!["R01", "r02"])),
    )
    .await;

    assert_eq!(summary(&events).successful, 2);
    let results = domain_results(&events);
    assert_eq!(results[0].template_names, vec!["R01", "R02"]);
    assert_eq!(gateway.rules(&zone_id(1)).await.len(), 2);

    let status = ctx.cache.find_rule_status(&zone_id(1)).await.unwrap();
    assert_eq!(status.applied_rules.len(), 2);
}

#[tokio::test]
async fn add_without_known_templates_fails() {
    let gateway = gateway_with(1);
    let events = run_all(context(), &gateway, payload("add", ids(1..=1), Some(vec!["R09"]))).await;

    let results = domain_results(&events);
    assert!(!results[0].success);
    assert_eq!(summary(&events).failed, 1);
    assert!(gateway.rules(&zone_id(1)).await.is_empty());
}

#[tokio::test]
async fn remove_reports_only_present_templates() {
    let ctx = context_with_templates(vec![template("R01", "1.0"), template("R02", "1.0")]).await;
    let gateway = gateway_with(1);
    gateway
        .seed_rules(
            &zone_id(1),
            vec![remote_rule("r1", Some("tpl_R01_v1.0")), remote_rule("r2", None)],
        )
        .await;

    let events = run_all(
        ctx,
        &gateway,
        payload("remove", ids(1..=1), Some(vec!["R01", "R02"])),
    )
    .await;

    let results = domain_results(&events);
    assert!(results[0].success);
    assert_eq!(results[0].template_names, vec!["R01"]);
    let remaining = gateway.rules(&zone_id(1)).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "r2");
}

#[tokio::test]
async fn remove_of_absent_templates_succeeds() {
    let gateway = gateway_with(1);
    let events = run_all(
        context(),
        &gateway,
        payload("remove", ids(1..=1), Some(vec!["R05"])),
    )
    .await;

    let results = domain_results(&events);
    assert!(results[0].success);
    assert!(results[0].template_names.is_empty());
    assert_eq!(summary(&events).successful, 1);
}

#[tokio::test]
async fn clean_removes_every_template_rule() {
    let gateway = gateway_with(1);
    gateway
        .seed_rules(
            &zone_id(1),
            vec![
                remote_rule("r1", Some("tpl_R01_v1.0")),
                remote_rule("r2", None),
                remote_rule("r3", Some("tpl_R07_v2.0")),
            ],
        )
        .await;

    let events = run_all(context(), &gateway, payload("clean", ids(1..=1), None)).await;

    assert_eq!(summary(&events).successful, 1);
    let results = domain_results(&events);
    assert_eq!(results[0].template_names, vec!["R01", "R07"]);
    let remaining = gateway.rules(&zone_id(1)).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "r2");
}

#[tokio::test]
async fn cancelled_before_start_emits_single_error() {
    let gateway = gateway_with(2);
    let token = CancellationToken::new();
    token.cancel();
    let events = run_with(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=2), None),
        token,
    )
    .await;

    assert_eq!(events, vec![ProgressEvent::cancelled(0)]);
    assert_eq!(gateway.call_count("set_security_level").await, 0);
}

#[tokio::test]
async fn cancel_between_batches_stops_the_run() {
    let gateway = gateway_with(6);
    let token = CancellationToken::new();
    gateway.cancel_when_touched(&zone_id(1), token.clone()).await;

    let events = run_with(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=6), None),
        token,
    )
    .await;

    let last = events.last().unwrap();
    assert!(last.is_cancellation());
    assert_eq!(last.progress(), Phase::ApiCalls.scaled(5, 6));
    assert!(matches!(last, ProgressEvent::Error { error, .. } if error == CANCELLED_MESSAGE));
    assert_eq!(domain_results(&events).len(), 5);
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::Complete { .. })));
    assert_eq!(
        gateway.get_security_level(&zone_id(6)).await.unwrap(),
        SecurityLevel::Medium
    );
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_streaming() {
    let service = Arc::new(BulkOperationService::new(context()));
    let gateway: Arc<dyn ZoneGateway> = gateway_with(1);

    let missing_action = BulkOperationPayload {
        action: None,
        target_domains: ids(1..=1),
        selected_rules: None,
    };
    let err = service
        .start(gateway.clone(), missing_action, CancellationToken::new())
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::ValidationError(_)));

    let no_selection = payload("add", ids(1..=1), None);
    assert!(service
        .start(gateway, no_selection, CancellationToken::new())
        .is_err());
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_run() {
    let service = Arc::new(BulkOperationService::new(context()));
    let gateway: Arc<dyn ZoneGateway> = gateway_with(6);
    let token = CancellationToken::new();

    let mut stream = service
        .start(
            gateway,
            payload("enable_under_attack", ids(1..=6), None),
            token.clone(),
        )
        .unwrap();
    assert!(stream.next().await.is_some());
    drop(stream);
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn names_are_taken_from_the_cache() {
    let ctx = context();
    let gateway = gateway_with(1);
    DomainService::new(ctx.clone())
        .refresh_all(gateway.as_ref())
        .await
        .unwrap();

    let events = run_all(ctx, &gateway, payload("disable_under_attack", ids(1..=1), None)).await;
    assert_eq!(domain_results(&events)[0].domain_name, "d1.com");
}

fn assert_cancelled_in(events: &[ProgressEvent], band: std::ops::RangeInclusive<u8>) -> u8 {
    let last = events.last().unwrap();
    assert!(last.is_cancellation(), "last event: {last:?}");
    assert!(band.contains(&last.progress()), "progress {}", last.progress());
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::Complete { .. })));
    last.progress()
}

#[tokio::test]
async fn cancel_during_verification_stops_before_refresh() {
    let gateway = gateway_with(3);
    let token = CancellationToken::new();
    gateway
        .cancel_when_called("get_security_level", &zone_id(2), token.clone())
        .await;

    let events = run_with(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=3), None),
        token,
    )
    .await;

    let progress = assert_cancelled_in(&events, 20..=80);
    assert_eq!(progress, Phase::Verification.scaled(2, 3));
    assert_eq!(domain_results(&events).len(), 3);
    assert_eq!(phase_progress(&events, Phase::Verification), 2);
    assert!(phase_updates(&events, Phase::CacheRefresh).is_empty());
}

#[tokio::test]
async fn cancel_while_waiting_to_reverify() {
    let gateway = gateway_with(2);
    gateway.drop_writes(&zone_id(1)).await;
    let token = CancellationToken::new();
    gateway
        .cancel_when_called("get_security_level", &zone_id(1), token.clone())
        .await;

    let events = run_with(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=2), None),
        token,
    )
    .await;

    let progress = assert_cancelled_in(&events, 20..=80);
    assert_eq!(progress, Phase::Verification.scaled(0, 2));
    // the pending read-back is abandoned, not reported as a timeout
    assert!(domain_results(&events)
        .iter()
        .all(|r| r.error.as_deref() != Some(VERIFICATION_TIMEOUT)));
    assert_eq!(gateway.call_count("get_security_level").await, 1);
    assert_eq!(phase_progress(&events, Phase::Verification), 0);
}

#[tokio::test]
async fn cancel_during_cache_refresh_skips_remaining_domains() {
    let gateway = gateway_with(2);
    let token = CancellationToken::new();
    gateway
        .cancel_when_called("get_zone", &zone_id(1), token.clone())
        .await;

    let events = run_with(
        context(),
        &gateway,
        payload("enable_under_attack", ids(1..=2), None),
        token,
    )
    .await;

    let progress = assert_cancelled_in(&events, 80..=100);
    assert_eq!(progress, Phase::CacheRefresh.scaled(1, 2));
    assert_eq!(phase_progress(&events, Phase::Verification), 2);
    assert_eq!(phase_progress(&events, Phase::CacheRefresh), 1);
    assert_eq!(gateway.call_count("get_zone").await, 1);
}

#[tokio::test]
async fn toggle_batch_keeps_every_cached_domain() {
    let ctx = context_with_store(YieldingStore::new());
    let gateway = gateway_with(5);
    DomainService::new(ctx.clone())
        .refresh_all(gateway.as_ref())
        .await
        .unwrap();

    let events = run_all(
        ctx.clone(),
        &gateway,
        payload("enable_under_attack", ids(1..=5), None),
    )
    .await;

    assert_eq!(summary(&events).successful, 5);
    let cached = ctx.cache.load_domains().await.domains;
    assert_eq!(cached.len(), 5);
    assert!(cached.iter().all(|d| d.under_attack_mode));
}

#[tokio::test]
async fn cache_write_failure_does_not_fail_toggles() {
    let store = YieldingStore::new();
    let ctx = context_with_store(store.clone());
    let gateway = gateway_with(3);
    DomainService::new(ctx.clone())
        .refresh_all(gateway.as_ref())
        .await
        .unwrap();
    store.fail_saves(true);

    let events = run_all(ctx, &gateway, payload("enable_under_attack", ids(1..=3), None)).await;

    let summary = summary(&events);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert!(domain_results(&events).iter().all(|r| r.success));
}
