// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

#[tokio::test]
async fn request_then_respond_then_wait() {
    let manager = PermissionManager::new();
    let id = RequestId::new("perm_1");
    let receiver = manager.request(id.clone());

    // Respond before the waiter arrives: the channel buffers it.
    manager.respond(&id, true, false).unwrap();

    let decision = manager
        .wait_for_response(
            &id,
            receiver,
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(decision.approved);
    assert!(!decision.always);
    assert_eq!(manager.pending_count(), 0);
}

#[tokio::test]
async fn respond_without_request_is_not_found() {
    let manager = PermissionManager::new();
    assert_eq!(
        manager.respond(&RequestId::new("perm_nope"), true, false),
        Err(RespondError::NotFound)
    );
}

#[tokio::test]
async fn double_respond_is_not_found() {
    let manager = PermissionManager::new();
    let id = RequestId::new("perm_1");
    let _receiver = manager.request(id.clone());
    manager.respond(&id, false, false).unwrap();
    assert_eq!(manager.respond(&id, true, false), Err(RespondError::NotFound));
}

#[tokio::test]
async fn wait_times_out() {
    let manager = PermissionManager::new();
    let id = RequestId::new("perm_1");
    let receiver = manager.request(id.clone());

    let result = manager
        .wait_for_response(
            &id,
            receiver,
            Duration::from_millis(50),
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(result, Err(WaitError::Timeout));
    assert_eq!(manager.pending_count(), 0);
}

#[tokio::test]
async fn wait_observes_cancellation() {
    let manager = Arc::new(PermissionManager::new());
    let id = RequestId::new("perm_1");
    let receiver = manager.request(id.clone());
    let cancel = CancellationToken::new();

    let waiter = {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            manager
                .wait_for_response(&id, receiver, Duration::from_secs(60), &cancel)
                .await
        })
    };

    cancel.cancel();
    assert_eq!(waiter.await.unwrap(), Err(WaitError::Cancelled));
    assert_eq!(manager.pending_count(), 0);
}

#[tokio::test]
async fn concurrent_requests_are_independent() {
    let manager = Arc::new(PermissionManager::new());
    let id_a = RequestId::new("perm_a");
    let id_b = RequestId::new("perm_b");
    let rx_a = manager.request(id_a.clone());
    let rx_b = manager.request(id_b.clone());

    manager.respond(&id_b, false, false).unwrap();
    manager.respond(&id_a, true, true).unwrap();

    let cancel = CancellationToken::new();
    let a = manager
        .wait_for_response(&id_a, rx_a, Duration::from_secs(1), &cancel)
        .await
        .unwrap();
    let b = manager
        .wait_for_response(&id_b, rx_b, Duration::from_secs(1), &cancel)
        .await
        .unwrap();

    assert!(a.approved && a.always);
    assert!(!b.approved);
}
