//! Parallel decoding.
//!
//! The registry is immutable after construction, so workers share one
//! pipeline by reference and keep everything mutable (context, output,
//! event buffer) per packet. Jobs are handed out over a bounded channel;
//! results are returned in job order regardless of which worker finished
//! first.

use crossbeam_channel::bounded;
use tracing::{debug, trace};

use crate::event::ParserEvent;
use crate::pipeline::{DecodePipeline, PacketDecode};
use crate::protocol_id::ProtocolId;

/// Jobs queued per worker before the feeder blocks.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

#[derive(Debug, Clone)]
pub struct PacketJob {
    pub packet_id: u64,
    pub entry: ProtocolId,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub packet_id: u64,
    pub decode: PacketDecode,
    pub events: Vec<ParserEvent>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub packets: u64,
    pub layers: u64,
    pub bytes: u64,
}

/// One decoding thread's view of a shared pipeline.
///
/// Creating a worker runs every decoder's per-thread setup; dropping it runs
/// the matching teardown.
pub struct DecodeWorker<'p> {
    id: usize,
    pipeline: &'p DecodePipeline,
    stats: WorkerStats,
}

impl<'p> DecodeWorker<'p> {
    pub fn new(id: usize, pipeline: &'p DecodePipeline) -> Self {
        pipeline.registry().thread_init();
        trace!(worker = id, "decoder thread state initialised");
        Self {
            id,
            pipeline,
            stats: WorkerStats::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn decode(&mut self, job: &PacketJob) -> JobResult {
        let mut events: Vec<ParserEvent> = Vec::new();
        let decode = self
            .pipeline
            .decode(job.packet_id, &job.data, job.entry, &mut events);
        self.stats.packets += 1;
        self.stats.layers += decode.summary.layer_count as u64;
        self.stats.bytes += job.data.len() as u64;
        JobResult {
            packet_id: job.packet_id,
            decode,
            events,
        }
    }
}

impl Drop for DecodeWorker<'_> {
    fn drop(&mut self) {
        self.pipeline.registry().thread_term();
        trace!(worker = self.id, packets = self.stats.packets, "decoder thread state released");
    }
}

/// Decode `jobs` on up to `workers` threads, returning results in job order.
pub fn decode_batch(pipeline: &DecodePipeline, jobs: Vec<PacketJob>, workers: usize) -> Vec<JobResult> {
    let workers = workers.max(1).min(jobs.len().max(1));
    if workers == 1 {
        let mut worker = DecodeWorker::new(0, pipeline);
        return jobs.iter().map(|job| worker.decode(job)).collect();
    }

    let total = jobs.len();
    let (job_tx, job_rx) = bounded::<(usize, PacketJob)>(workers * QUEUE_DEPTH_PER_WORKER);
    let (result_tx, result_rx) = bounded::<(usize, JobResult)>(workers * QUEUE_DEPTH_PER_WORKER);

    let mut results: Vec<(usize, JobResult)> = std::thread::scope(|scope| {
        for id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                let mut worker = DecodeWorker::new(id, pipeline);
                for (index, job) in job_rx.iter() {
                    if result_tx.send((index, worker.decode(&job))).is_err() {
                        break;
                    }
                }
                debug!(worker = id, stats = ?worker.stats(), "worker finished");
            });
        }
        drop(job_rx);
        drop(result_tx);

        scope.spawn(move || {
            for item in jobs.into_iter().enumerate() {
                if job_tx.send(item).is_err() {
                    break;
                }
            }
        });

        result_rx.iter().collect()
    });

    results.sort_unstable_by_key(|(index, _)| *index);
    debug_assert_eq!(results.len(), total);
    results.into_iter().map(|(_, result)| result).collect()
}
