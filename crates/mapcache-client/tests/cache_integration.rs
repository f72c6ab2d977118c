//! Integration tests for the typed cache facade.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, Subscription};
use mapcache_client::{
    Cache, ClientConfig, Context, Error, MapStore, MemoryStore, Session, TypedCache,
};
use mapcache_proto::{Payload, Predicate, Value};

async fn owned_cache() -> TypedCache<Subscription> {
    init_tracing();
    TypedCache::start(ClientConfig::new("horizon")).await.unwrap()
}

#[tokio::test]
async fn test_subs_put_get_query_delete() {
    let cache = owned_cache().await;
    let value = Subscription::new("a");

    cache.put("subs", "sub-1", &value).await.unwrap();
    assert_eq!(cache.get("subs", "sub-1").await.unwrap(), Some(value.clone()));

    let results = cache
        .query("subs", &Predicate::eq("subscriberId", "a"))
        .await
        .unwrap();
    assert_eq!(results, vec![value]);

    cache.delete("subs", "sub-1").await.unwrap();
    assert_eq!(cache.get("subs", "sub-1").await.unwrap(), None);
    assert!(cache
        .query("subs", &Predicate::eq("subscriberId", "a"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_put_overwrites() {
    let cache = owned_cache().await;
    cache.put("subs", "sub-1", &Subscription::new("a")).await.unwrap();
    cache.put("subs", "sub-1", &Subscription::new("b")).await.unwrap();

    assert_eq!(
        cache.get("subs", "sub-1").await.unwrap(),
        Some(Subscription::new("b"))
    );
    assert_eq!(cache.raw_map("subs").size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_missing_key_is_ok() {
    let cache = owned_cache().await;
    cache.delete("subs", "never-written").await.unwrap();
    cache.delete("never-created", "never-written").await.unwrap();
}

#[tokio::test]
async fn test_put_stores_json_payload() {
    let cache = owned_cache().await;
    cache.put("subs", "sub-1", &Subscription::new("a")).await.unwrap();

    let raw = cache.raw_map("subs").get("sub-1").await.unwrap().unwrap();
    assert!(raw.is_json());
    let document = raw.to_document().unwrap();
    assert_eq!(document["subscriberId"], "a");
    assert_eq!(document["publisherId"], "pub-123");
}

#[tokio::test]
async fn test_query_predicates() {
    let cache = owned_cache().await;
    for (key, id, retries) in [("s1", "a", 0), ("s2", "a", 3), ("s3", "b", 5), ("s4", "c", 9)] {
        cache
            .put("subs", key, &Subscription::new(id).with_retries(retries))
            .await
            .unwrap();
    }

    let ids = |values: Vec<Subscription>| -> Vec<(String, u32)> {
        values
            .into_iter()
            .map(|s| (s.subscriber_id, s.retries))
            .collect()
    };

    let retried = cache.query("subs", &Predicate::gt("retries", 0)).await.unwrap();
    assert_eq!(
        ids(retried),
        vec![
            ("a".to_string(), 3),
            ("b".to_string(), 5),
            ("c".to_string(), 9)
        ]
    );

    let window = cache
        .query("subs", &Predicate::between("retries", 3, 5))
        .await
        .unwrap();
    assert_eq!(window.len(), 2);

    let either = cache
        .query(
            "subs",
            &Predicate::in_values("subscriberId", vec![Value::from("b"), Value::from("c")]),
        )
        .await
        .unwrap();
    assert_eq!(either.len(), 2);

    let not_a = cache
        .query("subs", &Predicate::not(Predicate::eq("subscriberId", "a")))
        .await
        .unwrap();
    assert_eq!(not_a.len(), 2);

    let all = cache.query("subs", &Predicate::all()).await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_query_rejects_untagged_value() {
    let cache = owned_cache().await;
    cache.put("subs", "s1", &Subscription::new("a")).await.unwrap();
    cache
        .raw_map("subs")
        .set("s2", Payload::binary(&br#"{"subscriberId":"a"}"#[..]))
        .await
        .unwrap();

    // The binary value never matches a field predicate.
    let matched = cache
        .query("subs", &Predicate::eq("subscriberId", "a"))
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);

    // It does match the always-true predicate and fails the whole query.
    let err = cache.query("subs", &Predicate::all()).await.unwrap_err();
    assert!(err.is_decode());
    assert!(err.to_string().contains("'s2'"));
}

#[tokio::test]
async fn test_shared_session_between_types() {
    init_tracing();
    let session = Session::start(ClientConfig::default()).await.unwrap();
    let subs = TypedCache::<Subscription>::with_session(session.clone());
    let counters = TypedCache::<u64>::with_session(session.clone());

    assert!(subs.session().same_session(counters.session()));

    subs.put("subs", "sub-1", &Subscription::new("a")).await.unwrap();
    counters.put("counters", "deliveries", &42).await.unwrap();

    assert_eq!(counters.get("counters", "deliveries").await.unwrap(), Some(42));
    assert_eq!(
        session.map_names().await.unwrap(),
        vec!["counters".to_string(), "subs".to_string()]
    );

    // Reading a map through the wrong type is a decode error, not a panic.
    let err = counters.get("subs", "sub-1").await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));

    // Closing a sharing cache leaves the session running.
    subs.close().await.unwrap();
    assert!(session.is_running());
    assert_eq!(counters.get("counters", "deliveries").await.unwrap(), Some(42));
}

#[tokio::test]
async fn test_owned_session_close() {
    let cache = owned_cache().await;
    cache.put("subs", "sub-1", &Subscription::new("a")).await.unwrap();

    let shared = TypedCache::<Subscription>::with_session(cache.session().clone());
    cache.close().await.unwrap();

    let err = shared.get("subs", "sub-1").await.unwrap_err();
    assert!(matches!(err, Error::Store(mapcache_core::Error::NotActive)));
}

#[tokio::test]
async fn test_cache_over_existing_store() {
    init_tracing();
    let store = Arc::new(MemoryStore::default());
    store
        .set("subs", "sub-1", Payload::json(&br#"{"subscriberId":"z"}"#[..]))
        .await
        .unwrap();

    let session = Session::with_store(store, ClientConfig::default());
    let cache = TypedCache::<Subscription>::with_session(session);

    let value = cache.get("subs", "sub-1").await.unwrap().unwrap();
    assert_eq!(value.subscriber_id, "z");
    assert_eq!(value.retries, 0);
}

#[tokio::test]
async fn test_default_timeout_applies() {
    let config = ClientConfig::default().with_default_timeout(Duration::from_millis(5));
    let cache = TypedCache::<Subscription>::start(config).await.unwrap();

    // Normal operations finish well inside the timeout.
    cache.put("subs", "sub-1", &Subscription::new("a")).await.unwrap();

    // An already-expired context fails without touching the store.
    let ctx = Context::with_timeout(Duration::ZERO);
    let err = cache.get_with_context(&ctx, "subs", "sub-1").await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers() {
    let cache = Arc::new(owned_cache().await);

    let mut handles = Vec::new();
    for worker in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                let key = format!("w{}-{}", worker, i);
                cache
                    .put("subs", &key, &Subscription::new("a").with_retries(i))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.raw_map("subs").size().await.unwrap(), 200);
    let all = cache
        .query("subs", &Predicate::eq("subscriberId", "a"))
        .await
        .unwrap();
    assert_eq!(all.len(), 200);
}
