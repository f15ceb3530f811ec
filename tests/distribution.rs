//! Cross-thread behaviour of the distribution layer

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use acquire_rs::data::{
    ChannelConfig, ChunkStatus, Consumer, DataError, DataType, Handler, Producer,
};

fn handler(capacity: usize) -> Arc<Handler<DataType>> {
    let handler = Arc::new(Handler::new());
    for data_type in DataType::ALL {
        handler
            .add_channel(data_type, ChannelConfig::variable().capacity(capacity))
            .unwrap();
    }
    handler
}

#[test]
fn every_consumer_sees_every_push_in_order() {
    let handler = handler(1_000);
    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let c = Consumer::new(handler.clone());
            c.subscribe(&DataType::Ultrasound).unwrap();
            c
        })
        .collect();

    let start = Arc::new(Barrier::new(consumers.len() + 1));
    let readers: Vec<_> = consumers
        .into_iter()
        .map(|consumer| {
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                (0..200u32)
                    .map(|_| {
                        let buf = consumer.pop(&DataType::Ultrasound).unwrap();
                        u32::from_le_bytes(buf[..4].try_into().unwrap())
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let producer = Producer::new(handler.clone());
    start.wait();
    for i in 0..200u32 {
        assert_eq!(producer.push(&DataType::Ultrasound, i.to_le_bytes().to_vec()).unwrap(), 4);
    }

    let expected: Vec<u32> = (0..200).collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), expected);
    }
}

#[test]
fn slow_consumer_does_not_block_producer() {
    let handler = handler(10);
    let fast = Consumer::new(handler.clone());
    let slow = Consumer::new(handler.clone());
    fast.subscribe(&DataType::Oximetry).unwrap();
    slow.subscribe(&DataType::Oximetry).unwrap();

    let producer = Producer::new(handler.clone());
    let start = Instant::now();
    for i in 0..100u8 {
        producer.push(&DataType::Oximetry, vec![i]).unwrap();
        assert_eq!(fast.pop(&DataType::Oximetry).unwrap()[0], i);
    }
    assert!(start.elapsed() < Duration::from_secs(5));

    // The slow consumer kept the ten oldest samples, the rest were dropped
    assert_eq!(slow.queue_len(&DataType::Oximetry).unwrap(), 10);
    let chunk = slow
        .pop_chunk(&DataType::Oximetry, 10)
        .unwrap()
        .into_ready()
        .unwrap();
    let firsts: Vec<u8> = chunk.iter().map(|b| b[0]).collect();
    assert_eq!(firsts, (0..10).collect::<Vec<u8>>());

    let stats = handler.channel_stats(&DataType::Oximetry).unwrap();
    assert_eq!(stats.pushed, 100);
    assert_eq!(stats.dropped, 90);
}

/// Start `pop` on another thread and return once it is parked on the
/// empty queue (it has not returned after the grace period)
fn parked_reader<T, F>(pop: F) -> thread::JoinHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let started = Arc::new(Barrier::new(2));
    let reader = {
        let started = started.clone();
        thread::spawn(move || {
            started.wait();
            pop()
        })
    };

    started.wait();
    thread::sleep(Duration::from_millis(50));
    assert!(!reader.is_finished(), "pop returned while its queue was empty");

    reader
}

#[test]
fn blocking_pop_wakes_on_push() {
    let handler = handler(100);
    let consumer = Consumer::new(handler.clone());
    consumer.subscribe(&DataType::Tocography).unwrap();

    let reader = parked_reader(move || consumer.pop(&DataType::Tocography));

    Producer::new(handler)
        .push(&DataType::Tocography, vec![42u8])
        .unwrap();

    let buf = reader.join().unwrap().unwrap();
    assert_eq!(&buf[..], &[42]);
}

#[test]
fn blocked_pop_fails_when_consumer_unregistered() {
    let handler = handler(100);
    let key = handler.register_consumer();
    handler.subscribe(&DataType::Ultrasound, key).unwrap();

    let reader = {
        let handler = handler.clone();
        parked_reader(move || handler.pop(&DataType::Ultrasound, key))
    };

    assert!(handler.unregister_consumer(key));

    assert!(matches!(
        reader.join().unwrap(),
        Err(DataError::UnknownConsumer { .. })
    ));
}

#[test]
fn eof_reported_once_to_chunk_reader() {
    let handler = handler(100);
    let consumer = Consumer::new(handler.clone());
    consumer.subscribe(&DataType::Ultrasound).unwrap();
    let producer = Producer::new(handler.clone());

    let writer = thread::spawn(move || {
        for i in 0..7u8 {
            producer.push(&DataType::Ultrasound, vec![i]).unwrap();
        }
        producer.finish(&DataType::Ultrasound).unwrap();
    });
    writer.join().unwrap();

    let mut chunks = 0;
    loop {
        match consumer.pop_chunk(&DataType::Ultrasound, 3).unwrap() {
            ChunkStatus::Ready(chunk) => {
                assert_eq!(chunk.len(), 3);
                chunks += 1;
            }
            ChunkStatus::Eof => break,
            ChunkStatus::NotEnoughData => panic!("eof was set before reading"),
        }
    }

    assert_eq!(chunks, 2);
    assert_eq!(consumer.queue_len(&DataType::Ultrasound).unwrap(), 1);
    assert_eq!(
        consumer.pop_chunk(&DataType::Ultrasound, 3).unwrap(),
        ChunkStatus::NotEnoughData
    );
}
