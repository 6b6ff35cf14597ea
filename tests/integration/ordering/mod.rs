use super::*;

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use rand::seq::SliceRandom;

use mqrebalance::consumer::{ConsumeFromWhere, PullRebalance, QueueLifecycle};
use mqrebalance::store::{LocalFileOffsetStore, OffsetStore, ReadOffsetType};

fn test_rebalance(store: Arc<dyn OffsetStore>) -> Arc<PullRebalance> {
    Arc::new(
        PullRebalance::builder(TEST_GROUP_NAME.to_owned())
            .with_consume_from_where(ConsumeFromWhere::FromFirstOffset)
            .with_offset_store(store)
            .with_broker(Arc::new(FixedBroker::new(0)))
            .create()
            .unwrap(),
    )
}

fn position(ops: &[Op], op: &Op) -> Option<usize> {
    ops.iter().position(|o| o == op)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: however revocations of distinct queues interleave,
    /// each queue is persisted before it is removed, and the persisted
    /// offsets are the last committed ones.
    #[test]
    fn revocations_persist_before_remove(
        offsets in prop::collection::vec(0i64..1_000_000, 1..24),
        num_threads in 1usize..6,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = shared(LocalFileOffsetStore::new(dir.path()));
        let r = test_rebalance(store.clone());

        let queues: Vec<MessageQueue> = (0..offsets.len())
            .map(|i| test_queue(TEST_TOPIC_NAME, i as i32))
            .collect();
        for (mq, &offset) in queues.iter().zip(&offsets) {
            store.update_offset(mq, offset, false);
        }

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let r = r.clone();
                let mine: Vec<MessageQueue> =
                    queues.iter().skip(t).step_by(num_threads).cloned().collect();
                thread::spawn(move || mine.iter().all(|mq| r.on_queue_revoked(mq).unwrap()))
            })
            .collect();
        for h in handles {
            prop_assert!(h.join().unwrap());
        }

        let ops = store.ops.lock().clone();
        prop_assert_eq!(2 * queues.len(), ops.len());
        for mq in &queues {
            let persisted = position(&ops, &Op::Persist(mq.clone()));
            let removed = position(&ops, &Op::Remove(mq.clone()));
            prop_assert!(persisted.is_some() && removed.is_some());
            prop_assert!(persisted < removed, "ordering violated for {}", mq);
        }

        let reread = LocalFileOffsetStore::new(dir.path());
        for (mq, &offset) in queues.iter().zip(&offsets) {
            prop_assert_eq!(offset, reread.read_offset(mq, ReadOffsetType::StoreOnly));
        }
    }
}

/// Revocations racing on the very same queue never interleave their
/// persist and remove steps.
#[test]
fn test_revocations_of_one_queue_are_serialized() {
    let _ = env_logger::try_init();

    let dir = tempfile::tempdir().unwrap();
    let store = shared(LocalFileOffsetStore::new(dir.path()));
    let r = test_rebalance(store.clone());
    let mq = test_queue(TEST_TOPIC_NAME, 0);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let r = r.clone();
            let store = store.clone();
            let mq = mq.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    store.update_offset(&mq, t * 100 + i, true);
                    assert!(r.on_queue_revoked(&mq).unwrap());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let ops = store.ops.lock().clone();
    assert_eq!(2 * 8 * 20, ops.len());
    for pair in ops.chunks(2) {
        assert_eq!(&[Op::Persist(mq.clone()), Op::Remove(mq.clone())], pair);
    }
}

/// Revocations of some queues proceed alongside the resolution of
/// others.
#[test]
fn test_revocation_and_resolution_of_distinct_queues() {
    let _ = env_logger::try_init();

    let dir = tempfile::tempdir().unwrap();
    let store = shared(LocalFileOffsetStore::new(dir.path()));
    let r = test_rebalance(store.clone());

    let revoked: Vec<MessageQueue> = (0..8).map(|i| test_queue(TEST_TOPIC_NAME, i)).collect();
    let gained: Vec<MessageQueue> = (8..16).map(|i| test_queue(TEST_TOPIC_NAME, i)).collect();
    for mq in &revoked {
        store.update_offset(mq, i64::from(mq.queue_id()) + 1000, false);
    }

    #[derive(Clone)]
    enum Task {
        Revoke(MessageQueue),
        Resolve(MessageQueue),
    }
    let mut tasks: Vec<Task> = revoked
        .iter()
        .cloned()
        .map(Task::Revoke)
        .chain(gained.iter().cloned().map(Task::Resolve))
        .collect();
    tasks.shuffle(&mut rand::thread_rng());

    let handles: Vec<_> = tasks
        .into_iter()
        .map(|task| {
            let r = r.clone();
            thread::spawn(move || match task {
                Task::Revoke(mq) => assert!(r.on_queue_revoked(&mq).unwrap()),
                Task::Resolve(mq) => assert_eq!(0, r.resolve(&mq).unwrap()),
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let ops = store.ops.lock().clone();
    for mq in &revoked {
        assert!(position(&ops, &Op::Persist(mq.clone())) < position(&ops, &Op::Remove(mq.clone())));
        assert_eq!(
            i64::from(mq.queue_id()) + 1000,
            store.read_offset(mq, ReadOffsetType::StoreOnly)
        );
    }
    for mq in &gained {
        assert_eq!(None, position(&ops, &Op::Persist(mq.clone())));
    }
}
