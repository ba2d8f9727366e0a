//! The pending-request table: a concurrent map from RPC id to the request
//! awaiting a response. The only allowed mutations are an atomic insert on
//! outbound request and an atomic remove-and-return on inbound response, so
//! a response can never be dispatched to more than one caller.

use std::collections::HashMap;

use tokio::sync::Mutex;

use signer_proto::Command;

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub session_id: String,
    pub command: Command,
    pub target_pubkey: String,
    pub created_at: i64,
    pub parameters: Vec<String>,
}

#[derive(Default)]
pub struct PendingRequestTable {
    inner: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: String, request: PendingRequest) {
        self.inner.lock().await.insert(id, request);
    }

    /// Remove and return the pending entry for `id`, or `None` if there was
    /// none — the only way a caller observes a match, so at most one
    /// response handler ever sees a given entry.
    pub async fn remove(&self, id: &str) -> Option<PendingRequest> {
        self.inner.lock().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample(session_id: &str) -> PendingRequest {
        PendingRequest {
            session_id: session_id.to_string(),
            command: Command::Ping,
            target_pubkey: "a".repeat(64),
            created_at: 0,
            parameters: vec![],
        }
    }

    #[tokio::test]
    async fn remove_is_one_shot() {
        let table = PendingRequestTable::new();
        table.insert("req-1".into(), sample("s1")).await;
        assert!(table.remove("req-1").await.is_some());
        assert!(table.remove("req-1").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_thousand_concurrent_requests_each_match_exactly_one_entry() {
        let table = Arc::new(PendingRequestTable::new());

        let mut inserts = Vec::new();
        for i in 0..1000 {
            let table = Arc::clone(&table);
            inserts.push(tokio::spawn(async move {
                table
                    .insert(format!("req-{i}"), sample(&format!("sess-{i}")))
                    .await;
            }));
        }
        for handle in inserts {
            handle.await.unwrap();
        }
        assert_eq!(table.len().await, 1000);

        // Responses arrive in a shuffled order relative to insertion.
        let mut ids: Vec<usize> = (0..1000).collect();
        ids.reverse();
        let mut removes = Vec::new();
        for i in ids {
            let table = Arc::clone(&table);
            removes.push(tokio::spawn(async move { table.remove(&format!("req-{i}")).await }));
        }
        let mut matched = 0;
        for handle in removes {
            if handle.await.unwrap().is_some() {
                matched += 1;
            }
        }
        assert_eq!(matched, 1000);
        assert_eq!(table.len().await, 0);
    }
}
