//! Integration tests for serialized remote writes.
//!
//! Operations are enqueued before any of them is awaited, on a multi-threaded
//! runtime, so any missing ordering would show up as interleaving.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};

use ledgerbox_core::{
    CallSerializer, Client, ClientConfig, MemoryLedger, MemoryStore, RemoteRead, RemoteWrite,
    RetryPolicy, SystemEnv, ValueProtection,
};

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retried_operation_completes_before_successors_start() {
    let serializer = CallSerializer::default();
    let log: Log = Arc::default();

    let attempts = Arc::new(AtomicU32::new(0));
    let o1 = {
        let (log, attempts) = (Arc::clone(&log), Arc::clone(&attempts));
        serializer.enqueue(move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let log = Arc::clone(&log);
            async move {
                record(&log, format!("O1 attempt {attempt} start"));
                tokio::task::yield_now().await;
                if attempt == 1 {
                    record(&log, "O1 attempt 1 failed");
                    Err("connection reset".to_string())
                } else {
                    record(&log, format!("O1 attempt {attempt} done"));
                    Ok(1)
                }
            }
        })
    };

    let o2 = {
        let log = Arc::clone(&log);
        serializer.enqueue(move || {
            let log = Arc::clone(&log);
            async move {
                record(&log, "O2 start");
                tokio::task::yield_now().await;
                record(&log, "O2 done");
                Ok::<_, String>(2)
            }
        })
    };

    let o3 = {
        let log = Arc::clone(&log);
        serializer.enqueue(move || {
            let log = Arc::clone(&log);
            async move {
                record(&log, "O3 start");
                record(&log, "O3 done");
                Ok::<_, String>(3)
            }
        })
    };

    // Await in reverse: completion order must not depend on await order
    assert_eq!(o3.await, Ok(3));
    assert_eq!(o2.await, Ok(2));
    assert_eq!(o1.await, Ok(1));

    assert_eq!(*log.lock().unwrap(), [
        "O1 attempt 1 start",
        "O1 attempt 1 failed",
        "O1 attempt 2 start",
        "O1 attempt 2 done",
        "O2 start",
        "O2 done",
        "O3 start",
        "O3 done",
    ]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ledger_never_sees_concurrent_writes() {
    let ledger = MemoryLedger::new();
    let handle = Arc::new(ledger.handle("alice.near"));
    let serializer = CallSerializer::new(RetryPolicy::with_max_attempts(3));
    ledger.fail_next_writes(2);

    let pending: Vec<_> = (0..16)
        .map(|i| {
            let handle = Arc::clone(&handle);
            serializer.enqueue(move || {
                let handle = Arc::clone(&handle);
                async move { handle.set("notes", "counter", &i.to_string()).await }
            })
        })
        .collect();

    for write in pending {
        write.await.unwrap();
    }

    assert_eq!(ledger.max_writes_in_flight(), 1);
    assert_eq!(ledger.write_attempts(), 18);
    assert_eq!(ledger.get("alice.near", "notes", "counter").await.unwrap(), Some("15".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_client_writes_are_serialized() {
    let ledger = MemoryLedger::new();
    let client = Arc::new(Client::new(
        ClientConfig::new("testnet", "alice.near", "notes")
            .with_default_protection(ValueProtection::Plain),
        MemoryStore::new(),
        SystemEnv::new(),
        Arc::new(ledger.clone()),
        Arc::new(ledger.handle("alice.near")),
    ));
    assert!(!client.probe_ready().unwrap());
    client.confirm_key_injected().unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.set_value(&format!("item-{i}"), &i).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(ledger.max_writes_in_flight(), 1);
    for i in 0..8 {
        let value: Option<i32> = client.get_value(&format!("item-{i}")).await.unwrap();
        assert_eq!(value, Some(i));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clients_sharing_a_signer_share_one_queue() {
    let ledger = MemoryLedger::new();
    let signer = Arc::new(ledger.handle("alice.near"));
    let calls = Arc::new(CallSerializer::default());

    let clients: Vec<_> = ["chat", "notes"]
        .into_iter()
        .map(|app| {
            let client = Client::with_call_serializer(
                ClientConfig::new("testnet", "alice.near", app)
                    .with_default_protection(ValueProtection::Plain),
                MemoryStore::new(),
                SystemEnv::new(),
                Arc::new(ledger.clone()),
                Arc::clone(&signer),
                Arc::clone(&calls),
            );
            assert!(!client.probe_ready().unwrap());
            client.confirm_key_injected().unwrap();
            Arc::new(client)
        })
        .collect();

    let tasks: Vec<_> = clients
        .iter()
        .flat_map(|client| {
            (0..16).map(move |i| {
                let client = Arc::clone(client);
                tokio::spawn(async move { client.set_value(&format!("item-{i}"), &i).await })
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(ledger.max_writes_in_flight(), 1);
    assert_eq!(ledger.write_attempts(), 32);
    for app in ["chat", "notes"] {
        assert_eq!(ledger.get("alice.near", app, "item-15").await.unwrap(), Some("15".to_string()));
    }
}
