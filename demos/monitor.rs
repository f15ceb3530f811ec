//! Monitor demo - one ultrasound producer, two consumers, one statemachine
//!
//! Run with: cargo run --example monitor [SAMPLES]
//!
//! This demo shows:
//! - A fixed-size ultrasound channel fanned out to two consumers
//! - A "viewer" consumer doing blocking pops on its own thread
//! - A "recorder" statemachine draining chunks of 3 from its transitions
//! - The machine woken by every push through `tokio::sync::Notify`
//!
//! # Architecture
//!
//! ```text
//!   producer thread ──push──► Handler ──► viewer queue ──► pop() thread
//!                               │    └──► recorder queue
//!                               │              ▲
//!                      data_pushed()           │ pop_chunk(3)
//!                               ▼              │
//!                       Notify ──► spawn_driver ──► wakeup()
//!
//!   idle ──(data queued)──► recording ──(eof)──► done
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acquire_rs::data::{
    ChannelConfig, ChunkStatus, Consumer, DataType, Handler, HandlerConfig, Producer,
};
use acquire_rs::statemachine::{
    spawn_driver, MachineConfig, State, Statemachine, Transition, TransitionStatus,
};
use tokio::sync::Notify;

/// Size of one ultrasound sample in bytes
const SAMPLE_SIZE: usize = 10;

/// Samples per recorded chunk
const CHUNK: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Recorder {
    Idle,
    Recording,
    Done,
}

/// Context shared by the recorder transitions
struct Recording {
    consumer: Consumer<DataType>,
    chunks: AtomicUsize,
}

fn recorder_table() -> Vec<State<Recorder, Recording>> {
    vec![
        State::new(
            "idle",
            Recorder::Idle,
            vec![Transition::new(Recorder::Recording, |r: &Recording| {
                let queued = r.consumer.queue_len(&DataType::Ultrasound).unwrap_or(0);
                TransitionStatus::advance_if(queued > 0)
            })],
        ),
        State::new(
            "recording",
            Recorder::Recording,
            vec![Transition::new(Recorder::Done, |r: &Recording| {
                loop {
                    match r.consumer.pop_chunk(&DataType::Ultrasound, CHUNK) {
                        Ok(ChunkStatus::Ready(chunk)) => {
                            let n = r.chunks.fetch_add(1, Ordering::Relaxed) + 1;
                            let first: Vec<u8> = chunk.iter().map(|b| b[0]).collect();
                            tracing::info!(chunk = n, samples = ?first, "Recorded chunk");
                        }
                        Ok(ChunkStatus::NotEnoughData) | Err(_) => return TransitionStatus::Stay,
                        Ok(ChunkStatus::Eof) => return TransitionStatus::Advance,
                    }
                }
            })],
        ),
        State::new("done", Recorder::Done, vec![]),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let samples: u8 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 10,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("acquire_rs=debug".parse()?)
                .add_directive("monitor=info".parse()?),
        )
        .init();

    let notify = Arc::new(Notify::new());
    let handler: Arc<Handler<DataType>> =
        Arc::new(Handler::with_hooks(HandlerConfig::default(), notify.clone()));
    handler.add_channel(
        DataType::Ultrasound,
        ChannelConfig::fixed(SAMPLE_SIZE).capacity(100),
    )?;

    let viewer = Consumer::new(handler.clone());
    viewer.subscribe(&DataType::Ultrasound)?;

    let recording = Recording {
        consumer: Consumer::new(handler.clone()),
        chunks: AtomicUsize::new(0),
    };
    recording.consumer.subscribe(&DataType::Ultrasound)?;

    let machine = Arc::new(
        Statemachine::with_config(
            "recorder",
            recorder_table(),
            Recorder::Idle,
            recording,
            MachineConfig::default().trace(true),
        )?
        .with_change_callback(|prev, curr| {
            tracing::info!(from = prev.name(), to = curr.name(), "Recorder moved");
        }),
    );

    let driver = spawn_driver(machine.clone(), notify, Duration::from_millis(200));

    let viewer_task = tokio::task::spawn_blocking(move || {
        for _ in 0..samples {
            match viewer.pop(&DataType::Ultrasound) {
                Ok(sample) => tracing::info!(sample = ?sample.to_vec(), "Viewer got sample"),
                Err(_) => break,
            }
        }
    });

    let producer = Producer::new(handler.clone());
    let producer_task = tokio::task::spawn_blocking(move || -> Result<(), acquire_rs::Error> {
        for i in 0..samples {
            producer.push(&DataType::Ultrasound, vec![i; SAMPLE_SIZE])?;
            std::thread::sleep(Duration::from_millis(20));
        }
        producer.finish(&DataType::Ultrasound)?;
        Ok(())
    });

    producer_task.await??;
    viewer_task.await?;

    let done = {
        let machine = machine.clone();
        tokio::task::spawn_blocking(move || {
            machine.wait_for(Recorder::Done, Duration::from_secs(5))
        })
        .await?
    };

    if let Some(stats) = handler.channel_stats(&DataType::Ultrasound) {
        tracing::info!(
            pushed = stats.pushed,
            dropped = stats.dropped,
            queued = stats.queued(),
            "Channel summary"
        );
    }
    tracing::info!(
        done,
        chunks = machine.context().chunks.load(Ordering::Relaxed),
        state = machine.current().name(),
        "Recorder summary"
    );

    driver.abort();
    Ok(())
}
