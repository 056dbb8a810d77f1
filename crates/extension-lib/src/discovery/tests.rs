//! Discovery cycle tests

use super::*;
use crate::cache::ResourceCache;
use crate::fixtures;
use crate::models::Distribution;
use kube::runtime::watcher::Event;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn engine(distribution: Distribution, config: DiscoveryConfig) -> (Arc<ResourceCache>, DiscoveryEngine) {
    let (cache, query) = fixtures::query(distribution);
    let engine = DiscoveryEngine::new(query, config, StructuredLogger::new("development"));
    (cache, engine)
}

fn config() -> DiscoveryConfig {
    DiscoveryConfig {
        cluster_name: "development".to_string(),
        label_filter: vec!["secret-label".to_string()],
        disable_discovery_excludes: false,
    }
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn shop_pod(name: &str) -> fixtures::PodBuilder {
    fixtures::pod("default", name)
        .label("best-city", "Kevelaer")
        .node("worker-1")
        .container("MrFancyPants", Some("crio://abcdef"), "nginx", false)
}

#[test]
fn test_container_record_attributes() {
    let (cache, engine) = engine(Distribution::OpenShift, config());
    cache.apply(Event::Applied(fixtures::service("default", "shop-kevelaer", &[("best-city", "Kevelaer")])));
    cache.apply(Event::Applied(fixtures::service("default", "shop-solingen", &[("best-city", "Solingen")])));
    cache.apply(Event::Applied(shop_pod("shop").label("secret-label", "secret-value").build()));

    let records = engine.container_records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, "crio://abcdef");
    assert_eq!(record.record_type, EnrichmentDataType::Container);

    let expected: BTreeMap<String, BTreeSet<String>> = [
        ("k8s.cluster-name", "development"),
        ("k8s.container.id", "crio://abcdef"),
        ("k8s.container.id.stripped", "abcdef"),
        ("k8s.container.name", "MrFancyPants"),
        ("k8s.container.ready", "false"),
        ("k8s.container.image", "nginx"),
        ("k8s.namespace", "default"),
        ("k8s.node.name", "worker-1"),
        ("k8s.pod.name", "shop"),
        ("k8s.pod.label.best-city", "Kevelaer"),
        ("k8s.label.best-city", "Kevelaer"),
        ("k8s.service.name", "shop-kevelaer"),
        ("k8s.distribution", "openshift"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), set(&[v])))
    .collect();
    assert_eq!(record.attributes, expected);
}

#[test]
fn test_two_matching_services_form_one_set() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(fixtures::service("default", "shop-kevelaer", &[("best-city", "Kevelaer")])));
    cache.apply(Event::Applied(fixtures::service("default", "shop-pilgrims", &[("best-city", "Kevelaer")])));
    cache.apply(Event::Applied(shop_pod("shop").build()));

    let records = engine.container_records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].attribute("k8s.service.name"),
        Some(&set(&["shop-kevelaer", "shop-pilgrims"]))
    );
}

#[test]
fn test_unmatched_pod_has_no_service_name() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(fixtures::service("default", "shop-solingen", &[("best-city", "Solingen")])));
    cache.apply(Event::Applied(shop_pod("shop").build()));

    let records = engine.container_records();
    assert_eq!(records.len(), 1);
    assert!(records[0].attribute("k8s.service.name").is_none());
    assert_eq!(records[0].attribute("k8s.distribution"), Some(&set(&["kubernetes"])));
}

#[test]
fn test_label_filter_only_hides_filtered_key() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(
        shop_pod("shop")
            .label("secret-label", "secret-value")
            .label("tier", "web")
            .build(),
    ));

    let record = &engine.container_records()[0];
    assert!(record.attribute("k8s.pod.label.secret-label").is_none());
    assert!(record.attribute("k8s.label.secret-label").is_none());
    assert_eq!(record.attribute("k8s.pod.label.tier"), Some(&set(&["web"])));
    assert_eq!(record.attribute("k8s.label.tier"), Some(&set(&["web"])));
    assert_eq!(record.attribute("k8s.pod.label.best-city"), Some(&set(&["Kevelaer"])));
    assert_eq!(record.attribute("k8s.pod.name"), Some(&set(&["shop"])));
}

#[test]
fn test_disabled_pod_is_ignored() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(shop_pod("shop").build()));
    cache.apply(Event::Applied(
        shop_pod("shop-ignored")
            .label("discovery-disabled", "true")
            .container("sidecar", Some("crio://012345"), "envoy", true)
            .build(),
    ));

    let records = engine.container_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attribute("k8s.pod.name"), Some(&set(&["shop"])));
}

#[test]
fn test_disabled_pod_is_kept_when_excludes_disabled() {
    let mut cfg = config();
    cfg.disable_discovery_excludes = true;
    let (cache, engine) = engine(Distribution::Kubernetes, cfg);
    cache.apply(Event::Applied(shop_pod("shop").build()));
    cache.apply(Event::Applied(
        shop_pod("shop-ignored").label("discovery-disabled", "true").build(),
    ));

    assert_eq!(engine.container_records().len(), 2);
}

#[test]
fn test_pod_excluded_through_owning_deployment() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(
        fixtures::deployment("default", "agent").label("extension-agent", "TRUE").build(),
    ));
    cache.apply(Event::Applied(fixtures::replica_set("default", "agent-7c9", Some("agent"))));
    cache.apply(Event::Applied(
        shop_pod("agent-7c9-abc").owned_by("ReplicaSet", "agent-7c9").build(),
    ));

    assert!(engine.container_records().is_empty());
    assert!(engine.deployment_records().is_empty());
}

#[test]
fn test_owner_attributes_and_unstarted_containers() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(fixtures::deployment("default", "shop").build()));
    cache.apply(Event::Applied(fixtures::replica_set("default", "shop-7c9", Some("shop"))));
    cache.apply(Event::Applied(
        fixtures::pod("default", "shop-7c9-abc")
            .owned_by("ReplicaSet", "shop-7c9")
            .container("app", Some("containerd://f00"), "shop:1.2", true)
            .container("init", None, "busybox", false)
            .build(),
    ));

    let records = engine.container_records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.attribute("k8s.container.ready"), Some(&set(&["true"])));
    assert_eq!(record.attribute("k8s.deployment"), Some(&set(&["shop"])));
    assert_eq!(record.attribute("k8s.replicaset"), Some(&set(&["shop-7c9"])));
    assert!(record.attribute("k8s.node.name").is_none());
}

#[test]
fn test_deployment_records() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(
        fixtures::deployment("default", "shop")
            .selector("best-city", "Kevelaer")
            .label("team", "checkout")
            .label("secret-label", "hidden")
            .build(),
    ));
    cache.apply(Event::Applied(
        fixtures::deployment("default", "legacy").label("discovery-disabled", "true").build(),
    ));
    cache.apply(Event::Applied(fixtures::service("default", "shop-kevelaer", &[("best-city", "Kevelaer")])));
    cache.apply(Event::Applied(shop_pod("shop-1").build()));
    cache.apply(Event::Applied(
        shop_pod("shop-2")
            .container("sidecar", Some("crio://fedcba"), "envoy", true)
            .build(),
    ));

    let records = engine.deployment_records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, "development/default/shop");
    assert_eq!(record.record_type, EnrichmentDataType::Deployment);
    assert_eq!(record.attribute("k8s.deployment"), Some(&set(&["shop"])));
    assert_eq!(record.attribute("k8s.deployment.label.team"), Some(&set(&["checkout"])));
    assert_eq!(record.attribute("k8s.label.team"), Some(&set(&["checkout"])));
    assert!(record.attribute("k8s.label.secret-label").is_none());
    assert_eq!(record.attribute("k8s.pod.name"), Some(&set(&["shop-1", "shop-2"])));
    assert_eq!(
        record.attribute("k8s.container.id.stripped"),
        Some(&set(&["abcdef", "fedcba"]))
    );
    assert_eq!(record.attribute("k8s.service.name"), Some(&set(&["shop-kevelaer"])));
}

#[test]
fn test_deployment_record_skips_blank_container_ids() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(
        fixtures::deployment("default", "shop")
            .selector("best-city", "Kevelaer")
            .build(),
    ));
    cache.apply(Event::Applied(
        fixtures::pod("default", "shop-1")
            .label("best-city", "Kevelaer")
            .container("app", Some(""), "nginx", false)
            .build(),
    ));

    let records = engine.deployment_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attribute("k8s.pod.name"), Some(&set(&["shop-1"])));
    assert!(records[0].attribute("k8s.container.id").is_none());
    assert!(records[0].attribute("k8s.container.id.stripped").is_none());
}

#[test]
fn test_records_are_ordered_by_id() {
    let (cache, engine) = engine(Distribution::Kubernetes, config());
    cache.apply(Event::Applied(
        fixtures::pod("default", "b")
            .container("b", Some("crio://bbb"), "nginx", true)
            .build(),
    ));
    cache.apply(Event::Applied(
        fixtures::pod("default", "a")
            .container("a", Some("crio://aaa"), "nginx", true)
            .build(),
    ));

    let ids: Vec<String> = engine.container_records().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["crio://aaa", "crio://bbb"]);
}
