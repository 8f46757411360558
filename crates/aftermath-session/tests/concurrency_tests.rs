//! Concurrent session isolation
//!
//! Sessions opened concurrently must never resolve to the same path, and
//! each must clean up only its own artifacts.

use aftermath_session::{ArtifactRole, InputRole, SessionManager};
use bytes::Bytes;
use futures::stream;
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_concurrent_sessions_never_share_paths(sessions in 2..64usize) {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(dir.path()));

        let paths: Vec<PathBuf> = runtime().block_on(async {
            let handles: Vec<_> = (0..sessions)
                .map(|_| {
                    let manager = Arc::clone(&manager);
                    tokio::spawn(async move {
                        let session = manager.new_session().unwrap();
                        let token = session.token();
                        ArtifactRole::ALL
                            .iter()
                            .map(|role| manager.layout().path(&token, *role))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            let mut all = Vec::new();
            for handle in handles {
                all.extend(handle.await.unwrap());
            }
            all
        });

        let distinct: HashSet<_> = paths.iter().collect();
        prop_assert_eq!(distinct.len(), paths.len());
        prop_assert_eq!(paths.len(), sessions * ArtifactRole::ALL.len());
    }

    #[test]
    fn prop_concurrent_round_trips_leave_no_artifacts(
        sessions in 1..24usize,
        payload in proptest::collection::vec(any::<u8>(), 1..4096),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(dir.path()));
        let payload = Bytes::from(payload);

        let served = runtime().block_on(async {
            let handles: Vec<_> = (0..sessions)
                .map(|i| {
                    let manager = Arc::clone(&manager);
                    let payload = payload.clone();
                    tokio::spawn(async move {
                        let mut session = manager.new_session().unwrap();
                        session
                            .store_input(InputRole::Before, stream::iter(vec![Ok(payload.clone())]))
                            .await
                            .unwrap();
                        session
                            .store_input(InputRole::After, stream::iter(vec![Ok(payload.clone())]))
                            .await
                            .unwrap();
                        // odd sessions fail before producing output
                        if i % 2 == 1 {
                            session.teardown().await;
                            return None;
                        }
                        tokio::fs::write(session.output_path(), &payload).await.unwrap();
                        let token = session.commit_output().await.unwrap();
                        let artifact = manager.claim_result(&token.to_string()).await.unwrap();
                        Some(artifact.into_bytes().await.unwrap())
                    })
                })
                .collect();
            let mut served = Vec::new();
            for handle in handles {
                if let Some(bytes) = handle.await.unwrap() {
                    served.push(bytes);
                }
            }
            served
        });

        prop_assert_eq!(served.len(), sessions.div_ceil(2));
        for bytes in &served {
            prop_assert_eq!(bytes, &payload);
        }
        prop_assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
