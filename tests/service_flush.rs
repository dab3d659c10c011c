mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{eventually, numbers, record, RecordingWriter};
use logbatch::{Admission, DeliveryService, ServiceConfig, ServiceState};

const HOUR: Duration = Duration::from_secs(3600);
const PUSH: Duration = Duration::from_secs(2);

fn config(capacity: usize, interval: Duration) -> ServiceConfig {
    ServiceConfig {
        queue_capacity: capacity,
        admission_timeout: PUSH,
        flush_interval: interval,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fifteen_records_flush_as_ten_then_five() {
    common::init_logging();
    let writer = RecordingWriter::new();
    let service = DeliveryService::new(config(10, HOUR), writer.clone());
    service.start().unwrap();

    for n in 0..15 {
        assert_eq!(service.admit_async(record(n), PUSH).await, Admission::Queued);
    }
    service.stop(Duration::from_secs(5)).await.unwrap();

    assert_eq!(writer.sizes(), vec![10, 5]);
    let delivered: Vec<usize> = writer.batches().iter().flat_map(|b| numbers(b)).collect();
    assert_eq!(delivered, (0..15).collect::<Vec<_>>());

    let stats = service.stats();
    assert_eq!(stats.flush_by_size, 1);
    assert_eq!(stats.flush_forced, 1);
    assert_eq!(stats.delivered_records, 15);
    assert_eq!(service.state(), ServiceState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn multiple_of_capacity_flushes_by_size_only() {
    let writer = RecordingWriter::new();
    let service = DeliveryService::new(config(5, HOUR), writer.clone());
    service.start().unwrap();

    for n in 0..20 {
        assert_eq!(service.admit_async(record(n), PUSH).await, Admission::Queued);
    }
    service.stop(Duration::from_secs(5)).await.unwrap();

    assert_eq!(writer.sizes(), vec![5, 5, 5, 5]);
    let stats = service.stats();
    assert_eq!(stats.flush_by_size, 4);
    assert_eq!(stats.flush_forced, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_batch_flushed_once_on_stop() {
    let writer = RecordingWriter::new();
    let service = DeliveryService::new(config(10, HOUR), writer.clone());
    service.start().unwrap();

    for n in 0..3 {
        assert_eq!(service.admit_async(record(n), PUSH).await, Admission::Queued);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(writer.calls(), 0);

    service.stop(Duration::from_secs(5)).await.unwrap();
    let batches = writer.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(numbers(&batches[0]), vec![0, 1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_slot_service_flushes_one_record() {
    let writer = RecordingWriter::new();
    let service = DeliveryService::new(config(1, Duration::from_secs(3)), writer.clone());
    service.start().unwrap();

    assert_eq!(service.admit_async(record(7), PUSH).await, Admission::Queued);
    assert_eq!(service.stop(Duration::from_secs(5)).await, Ok(()));

    assert_eq!(writer.sizes(), vec![1]);
    assert_eq!(numbers(&writer.batches()[0]), vec![7]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_batch_flushed_when_interval_elapses() {
    let writer = RecordingWriter::new();
    let service = DeliveryService::new(config(100, Duration::from_millis(50)), writer.clone());
    service.start().unwrap();

    for n in 0..3 {
        assert_eq!(service.admit_async(record(n), PUSH).await, Admission::Queued);
    }
    // stats are recorded after the writer returns, so wait on them
    assert!(
        eventually(Duration::from_secs(2), || {
            let stats = service.stats();
            stats.delivered_records == 3 && stats.flush_by_interval == writer.calls() as u64
        })
        .await
    );
    assert!(service.stats().flush_by_interval >= 1);

    service.stop(Duration::from_secs(5)).await.unwrap();
    assert_eq!(writer.delivered(), 3);
    assert_eq!(service.stats().flush_forced, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_flush_does_not_block_later_records() {
    let writer = RecordingWriter::new().failing_first(1);
    let service = DeliveryService::new(config(2, HOUR), writer.clone());
    service.start().unwrap();

    for n in 0..2 {
        assert_eq!(service.admit_async(record(n), PUSH).await, Admission::Queued);
    }
    assert!(eventually(Duration::from_secs(2), || service.stats().failed_flushes == 1).await);
    assert_eq!(service.state(), ServiceState::Running);

    for n in 2..4 {
        assert_eq!(service.admit_async(record(n), PUSH).await, Admission::Queued);
    }
    service.stop(Duration::from_secs(5)).await.unwrap();

    let delivered: Vec<usize> = writer.batches().iter().flat_map(|b| numbers(b)).collect();
    assert_eq!(delivered, vec![2, 3]);
    let stats = service.stats();
    assert_eq!(stats.failed_records, 2);
    assert_eq!(stats.delivered_records, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_writer_does_not_kill_the_loop() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let service = DeliveryService::new(
        config(1, HOUR),
        move |records: &[logbatch::Record]| -> Result<(), logbatch::DeliveryError> {
            if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                panic!("writer bug on {} records", records.len());
            }
            Ok(())
        },
    );
    service.start().unwrap();

    assert_eq!(service.admit_async(record(0), PUSH).await, Admission::Queued);
    assert!(eventually(Duration::from_secs(2), || service.stats().failed_flushes == 1).await);

    assert_eq!(service.admit_async(record(1), PUSH).await, Admission::Queued);
    service.stop(Duration::from_secs(5)).await.unwrap();

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(service.stats().delivered_records, 1);
}
