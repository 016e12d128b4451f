use super::*;

#[tokio::test]
async fn put_then_get_returns_value() {
    let kv = MemoryKv::new();
    kv.put("a", "1", Duration::from_secs(60)).await.unwrap();
    assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));
    assert_eq!(kv.get("b").await.unwrap(), None);
}

#[tokio::test]
async fn put_overwrites_value_and_ttl() {
    let kv = MemoryKv::new();
    kv.put("a", "1", Duration::from_secs(3600)).await.unwrap();
    kv.put("a", "2", Duration::from_secs(10)).await.unwrap();
    assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("2"));
    let ttl = kv.ttl_of("a").unwrap();
    assert!(ttl <= Duration::from_secs(10), "ttl should be replaced, got {:?}", ttl);
}

#[tokio::test]
async fn expired_key_reads_as_missing() {
    let kv = MemoryKv::new();
    kv.put("short", "v", Duration::from_millis(30)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(kv.get("short").await.unwrap(), None);
    // expired read also reclaims the slot
    assert!(kv.is_empty());
}

#[tokio::test]
async fn delete_missing_key_is_noop() {
    let kv = MemoryKv::new();
    kv.delete("nothing").await.unwrap();
    kv.put("k", "v", Duration::from_secs(5)).await.unwrap();
    kv.delete("k").await.unwrap();
    kv.delete("k").await.unwrap();
    assert_eq!(kv.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn sweep_drops_only_expired_keys() {
    let kv = MemoryKv::new();
    kv.put("old", "v", Duration::from_millis(10)).await.unwrap();
    kv.put("fresh", "v", Duration::from_secs(60)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(kv.sweep(), 1);
    assert_eq!(kv.len(), 1);
    assert!(kv.ttl_of("fresh").is_some());
}
