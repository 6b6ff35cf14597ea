use super::*;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Local, TimeZone};

use mqrebalance::consumer::{
    ConsumeFromWhere, ListenerResult, MessageQueueListener, PullRebalance, QueueLifecycle,
    QueueState,
};
use mqrebalance::store::{LocalFileOffsetStore, OffsetStore, ReadOffsetType};

fn queue_set(mqs: &[&MessageQueue]) -> HashSet<MessageQueue> {
    mqs.iter().map(|&mq| mq.clone()).collect()
}

/// A queue moving from one consumer to another is picked up by the
/// new owner at the offset the previous owner persisted.
#[test]
fn test_committed_offset_survives_handover() {
    let _ = env_logger::try_init();

    let dir = tempfile::tempdir().unwrap();
    let q0 = test_queue(TEST_TOPIC_NAME, 0);
    let q1 = test_queue(TEST_TOPIC_NAME, 1);
    let all = queue_set(&[&q0, &q1]);
    let broker = Arc::new(
        FixedBroker::new(0)
            .with_max_offset(q0.clone(), 500)
            .with_max_offset(q1.clone(), 800),
    );

    let store_a = shared(LocalFileOffsetStore::new(dir.path()));
    let a = PullRebalance::builder(TEST_GROUP_NAME.to_owned())
        .with_offset_store(store_a.clone())
        .with_broker(broker.clone())
        .create()
        .unwrap();
    assert!(a.update_queue_table(TEST_TOPIC_NAME, &all, &all));
    assert_eq!(Some(QueueState::Active { offset: 500 }), a.queue_state(&q0));
    assert_eq!(Some(QueueState::Active { offset: 800 }), a.queue_state(&q1));

    // ~ consume a bit of q0, then lose it
    a.offset_store().update_offset(&q0, 512, true);
    assert!(a.update_queue_table(TEST_TOPIC_NAME, &all, &queue_set(&[&q1])));
    assert_eq!(None, a.queue_state(&q0));
    let ops = store_a.ops.lock().clone();
    assert_eq!(
        &[Op::Persist(q0.clone()), Op::Remove(q0.clone())],
        &ops[ops.len() - 2..]
    );

    let b = PullRebalance::builder(TEST_GROUP_NAME.to_owned())
        .with_offset_store(Arc::new(LocalFileOffsetStore::new(dir.path())))
        .with_broker(broker.clone())
        .create()
        .unwrap();
    let queries = broker.max_offset_queries.lock().len();
    assert!(b.update_queue_table(TEST_TOPIC_NAME, &all, &queue_set(&[&q0])));
    assert_eq!(Some(QueueState::Active { offset: 512 }), b.queue_state(&q0));
    assert_eq!(queries, broker.max_offset_queries.lock().len());
}

#[test]
fn test_timestamp_policy_spares_retry_queues() {
    let _ = env_logger::try_init();

    let dir = tempfile::tempdir().unwrap();
    let q = test_queue(TEST_TOPIC_NAME, 0);
    let retry_q = test_queue(TEST_RETRY_TOPIC_NAME, 0);
    let broker = Arc::new(FixedBroker::new(42).with_max_offset(retry_q.clone(), 9));
    let r = PullRebalance::builder(TEST_GROUP_NAME.to_owned())
        .with_consume_from_where(ConsumeFromWhere::FromTimestamp)
        .with_consume_timestamp("20240101120000".to_owned())
        .with_offset_store(Arc::new(LocalFileOffsetStore::new(dir.path())))
        .with_broker(broker.clone())
        .create()
        .unwrap();

    let qs = queue_set(&[&q]);
    assert!(r.update_queue_table(TEST_TOPIC_NAME, &qs, &qs));
    assert_eq!(Some(QueueState::Active { offset: 42 }), r.queue_state(&q));
    let millis = Local
        .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .unwrap()
        .timestamp_millis();
    assert_eq!(vec![(q.clone(), millis)], *broker.search_queries.lock());

    let retry_qs = queue_set(&[&retry_q]);
    assert!(r.update_queue_table(TEST_RETRY_TOPIC_NAME, &retry_qs, &retry_qs));
    assert_eq!(Some(QueueState::Active { offset: 9 }), r.queue_state(&retry_q));
    assert_eq!(1, broker.search_queries.lock().len());
    assert_eq!(vec![retry_q.clone()], *broker.max_offset_queries.lock());
}

#[test]
fn test_retry_queue_drained_from_start() {
    let dir = tempfile::tempdir().unwrap();
    let retry_q = test_queue(TEST_RETRY_TOPIC_NAME, 3);
    let broker = Arc::new(FixedBroker::new(0).with_max_offset(retry_q.clone(), 9));
    let r = PullRebalance::builder(TEST_GROUP_NAME.to_owned())
        .with_consume_from_where(ConsumeFromWhere::FromLastOffset)
        .with_offset_store(Arc::new(LocalFileOffsetStore::new(dir.path())))
        .with_broker(broker.clone())
        .create()
        .unwrap();

    assert_eq!(0, r.resolve(&retry_q).unwrap());
    assert!(broker.max_offset_queries.lock().is_empty());
}

#[test]
fn test_broker_failure_leaves_store_untouched() {
    let _ = env_logger::try_init();

    let dir = tempfile::tempdir().unwrap();
    let q = test_queue(TEST_TOPIC_NAME, 0);
    // ~ the broker knows nothing about `q`
    let broker = Arc::new(FixedBroker::new(0));
    let store = shared(LocalFileOffsetStore::new(dir.path()));
    let r = PullRebalance::builder(TEST_GROUP_NAME.to_owned())
        .with_offset_store(store.clone())
        .with_broker(broker)
        .create()
        .unwrap();

    match r.resolve(&q) {
        Err(Error::OffsetResolution { queue, source }) => {
            assert_eq!(q, queue);
            assert!(matches!(*source, Error::Broker(BrokerCode::QueueNotFound)));
        }
        r => panic!("unexpected result: {:?}", r),
    }
    assert!(store.ops.lock().is_empty());
    assert_eq!(-1, store.read_offset(&q, ReadOffsetType::MemoryFirstThenStore));
    assert!(!store_file_exists(&dir));

    let qs = queue_set(&[&q]);
    assert!(r.update_queue_table(TEST_TOPIC_NAME, &qs, &qs));
    assert_eq!(Some(QueueState::OffsetUnresolved), r.queue_state(&q));
    assert_eq!(vec![Op::Remove(q.clone())], *store.ops.lock());
    assert!(!store_file_exists(&dir));
}

fn store_file_exists(dir: &tempfile::TempDir) -> bool {
    dir.path().join("offsets.json").exists()
}

#[test]
fn test_failing_listener_does_not_abort_rebalance() {
    let _ = env_logger::try_init();

    let notified = Arc::new(AtomicUsize::new(0));
    let listener: Arc<dyn MessageQueueListener> = {
        let notified = notified.clone();
        Arc::new(
            move |_: &str, _: &HashSet<MessageQueue>, _: &HashSet<MessageQueue>| -> ListenerResult {
                notified.fetch_add(1, Ordering::SeqCst);
                Err("application not ready".into())
            },
        )
    };
    let dir = tempfile::tempdir().unwrap();
    let q0 = test_queue(TEST_TOPIC_NAME, 0);
    let q1 = test_queue(TEST_TOPIC_NAME, 1);
    let r = PullRebalance::builder(TEST_GROUP_NAME.to_owned())
        .with_consume_from_where(ConsumeFromWhere::FromFirstOffset)
        .with_offset_store(Arc::new(LocalFileOffsetStore::new(dir.path())))
        .with_broker(Arc::new(FixedBroker::new(0)))
        .with_listener(listener)
        .create()
        .unwrap();

    let all = queue_set(&[&q0, &q1]);
    assert!(r.update_queue_table(TEST_TOPIC_NAME, &all, &queue_set(&[&q0])));
    assert_eq!(1, notified.load(Ordering::SeqCst));
    assert_eq!(Some(QueueState::Active { offset: 0 }), r.queue_state(&q0));
    assert!(r.on_queue_revoked(&q1).unwrap());
}
