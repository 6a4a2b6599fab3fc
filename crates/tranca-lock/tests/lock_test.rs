//! Lock protocol integration tests against the in-memory store.
//!
//! TTLs are sub-second so the suite stays fast; the store's keepalive
//! cadence is TTL/3, so every timing below leaves at least a full cadence
//! period of slack.

use std::sync::Arc;
use std::time::Duration;

use tranca_lock::{LockError, LockHandle};
use tranca_store::MemoryStore;

const TTL: Duration = Duration::from_millis(300);

#[tokio::test]
async fn holder_excludes_competitor_until_unlock() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut a = LockHandle::new(store.clone(), "res");
    let mut b = LockHandle::new(store.clone(), "res");

    a.lock(TTL).await?;
    let err = b.lock(TTL).await.unwrap_err();
    assert!(err.is_held());

    a.unlock().await?;
    b.lock(TTL).await?;
    b.unlock().await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_acquisition_admits_exactly_one() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let mut handle = LockHandle::new(store, "contended");
            let outcome = handle.lock(TTL).await;
            (handle, outcome)
        }));
    }

    let mut winners = 0;
    let mut handles = Vec::new();
    for task in tasks {
        let (handle, outcome) = task.await?;
        match outcome {
            Ok(()) => winners += 1,
            Err(LockError::Held) => {}
            Err(err) => return Err(err.into()),
        }
        // Keep losers alive too, so no drop can free the key mid-count.
        handles.push(handle);
    }
    assert_eq!(winners, 1);
    Ok(())
}

#[tokio::test]
async fn renewal_holds_the_lock_past_its_ttl() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut a = LockHandle::new(store.clone(), "res");
    a.lock(TTL).await?;

    tokio::time::sleep(TTL * 2).await;

    let mut b = LockHandle::new(store.clone(), "res");
    let err = b.lock(TTL).await.unwrap_err();
    assert!(err.is_held());

    a.unlock().await?;
    b.lock(TTL).await?;
    b.unlock().await?;
    Ok(())
}

#[tokio::test]
async fn crashed_holder_frees_the_key_by_expiry() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut a = LockHandle::new(store.clone(), "res");
    a.lock(TTL).await?;

    // Crash: the handle goes away without unlock, renewal stops, and the
    // lease is left to lapse server-side.
    drop(a);
    tokio::time::sleep(TTL * 3).await;

    let mut b = LockHandle::new(store.clone(), "res");
    b.lock(TTL).await?;
    b.unlock().await?;
    Ok(())
}

#[tokio::test]
async fn handles_on_different_keys_do_not_interfere() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut a = LockHandle::new(store.clone(), "res/a");
    let mut b = LockHandle::new(store.clone(), "res/b");

    a.lock(TTL).await?;
    b.lock(TTL).await?;

    a.unlock().await?;
    b.unlock().await?;
    Ok(())
}

#[tokio::test]
async fn failed_attempt_leaks_no_lease() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut holder = LockHandle::new(store.clone(), "res");
    holder.lock(TTL).await?;

    // A losing attempt revokes its own lease on the way out; its handle can
    // be dropped immediately without holding anything open.
    for _ in 0..3 {
        let mut loser = LockHandle::new(store.clone(), "res");
        assert!(loser.lock(TTL).await.unwrap_err().is_held());
        assert!(loser.lease_id().is_none());
    }

    holder.unlock().await?;

    let mut next = LockHandle::new(store.clone(), "res");
    next.lock(TTL).await?;
    next.unlock().await?;
    Ok(())
}

// Handoff: A holds, B is refused, A unlocks, B succeeds.
#[tokio::test]
async fn unlock_hands_the_key_to_the_next_acquirer() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut a = LockHandle::new(store.clone(), "res");
    let mut b = LockHandle::new(store.clone(), "res");

    a.lock(TTL).await?;
    assert!(b.lock(TTL).await.unwrap_err().is_held());

    a.unlock().await?;

    b.lock(TTL).await?;
    assert!(b.is_acquired());
    b.unlock().await?;
    Ok(())
}
