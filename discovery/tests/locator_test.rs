use discovery::{LookupOutcome, ServiceLocator, SrvRecord};
use envconf_core::{Pointer, ServiceDescriptor};
use errors::LookupError;
use std::sync::Arc;
use std::time::Duration;
use testing::StaticSrvResolver;

fn service(name: &str) -> ServiceDescriptor {
    ServiceDescriptor::new(name, Pointer::parse("#/svc").unwrap())
}

#[tokio::test]
async fn test_resolves_top_ranked_record() {
    let resolver = StaticSrvResolver::new().with_records(
        "bar.services.local",
        vec![
            SrvRecord::new(20, 5, 27017, "bar.example.com"),
            SrvRecord::new(10, 5, 27017, "foo.example.com"),
        ],
    );
    let locator = ServiceLocator::new(Arc::new(resolver));

    let lookups = locator.locate(&[service("bar.services.local")]).await;
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].endpoint().unwrap().target, "foo.example.com");
}

#[tokio::test]
async fn test_unknown_service_is_unresolved() {
    let locator = ServiceLocator::new(Arc::new(StaticSrvResolver::new()));
    let lookups = locator.locate(&[service("foo")]).await;
    assert!(matches!(
        lookups[0].outcome,
        LookupOutcome::Unresolved(LookupError::NoRecords { .. })
    ));
}

#[tokio::test]
async fn test_empty_answer_is_unresolved() {
    let resolver = StaticSrvResolver::new().with_records("empty", Vec::new());
    let locator = ServiceLocator::new(Arc::new(resolver));
    let lookups = locator.locate(&[service("empty")]).await;
    assert!(lookups[0].endpoint().is_none());
}

#[tokio::test]
async fn test_no_services_means_no_lookups() {
    let resolver = Arc::new(StaticSrvResolver::new());
    let locator = ServiceLocator::new(resolver.clone());
    assert!(locator.locate(&[]).await.is_empty());
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn test_failure_does_not_block_other_services() {
    let resolver = StaticSrvResolver::new()
        .with_failure("broken", "SERVFAIL")
        .with_records("ok", vec![SrvRecord::new(1, 1, 80, "ok.example.com")]);
    let locator = ServiceLocator::new(Arc::new(resolver));

    let lookups = locator.locate(&[service("broken"), service("ok")]).await;
    assert_eq!(lookups[0].service.name, "broken");
    assert!(matches!(
        lookups[0].outcome,
        LookupOutcome::Unresolved(LookupError::Failed { .. })
    ));
    assert_eq!(lookups[1].endpoint().unwrap().target, "ok.example.com");
}

#[tokio::test(start_paused = true)]
async fn test_slow_lookup_times_out() {
    let resolver = StaticSrvResolver::new()
        .with_records("slow", vec![SrvRecord::new(1, 1, 80, "slow.example.com")])
        .with_delay(Duration::from_secs(60));
    let locator =
        ServiceLocator::new(Arc::new(resolver)).with_timeout(Duration::from_millis(100));

    let lookups = locator.locate(&[service("slow")]).await;
    assert!(matches!(
        lookups[0].outcome,
        LookupOutcome::Unresolved(LookupError::Timeout { timeout_ms: 100, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_capped() {
    let resolver = Arc::new(
        StaticSrvResolver::new()
            .with_records("svc", vec![SrvRecord::new(1, 1, 80, "svc.example.com")])
            .with_delay(Duration::from_millis(20)),
    );
    let locator = ServiceLocator::new(resolver.clone()).with_concurrency(3);
    let services: Vec<_> = (0..10).map(|_| service("svc")).collect();

    let started = tokio::time::Instant::now();
    let lookups = locator.locate(&services).await;
    let elapsed = started.elapsed();

    assert_eq!(lookups.len(), 10);
    assert!(lookups.iter().all(|l| l.endpoint().is_some()));
    assert_eq!(resolver.calls(), 10);
    assert_eq!(resolver.max_in_flight(), 3);
    // Four waves of at most three lookups each.
    assert!(elapsed >= Duration::from_millis(80), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(100), "{elapsed:?}");
}
