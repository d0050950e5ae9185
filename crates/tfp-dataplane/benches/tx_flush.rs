//! TX staging and flush microbenchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use tfp_dataplane::tx::TxStage;
use tfp_dataplane::{BufHandle, CoreStats, FramePool, NetChannel, NetError};

/// Sink NIC that optionally accepts only part of each burst.
struct SinkNet {
    pool: FramePool,
    accept: Option<usize>,
}

impl NetChannel for SinkNet {
    fn poll(&mut self, _max: usize, _out: &mut Vec<BufHandle>) -> usize {
        0
    }

    fn send(&mut self, frames: &mut Vec<BufHandle>) -> usize {
        let n = match self.accept {
            Some(limit) => limit.min(frames.len()),
            None => frames.len(),
        };
        for frame in frames.drain(..n) {
            self.pool.free(frame);
        }
        n
    }

    fn alloc(&mut self, slots: &mut [Option<BufHandle>]) -> usize {
        let mut filled = 0;
        for slot in slots.iter_mut() {
            match self.pool.alloc() {
                Some(h) => {
                    *slot = Some(h);
                    filled += 1;
                }
                None => break,
            }
        }
        filled
    }

    fn free(&mut self, frame: BufHandle) {
        self.pool.free(frame);
    }

    fn rx_interrupt_ctl(&mut self, _enable: bool) -> Result<(), NetError> {
        Ok(())
    }

    fn scale_up(&mut self, _from: u32, _to: u32) -> Result<(), NetError> {
        Ok(())
    }

    fn scale_down(&mut self, _from: u32, _to: u32) -> Result<(), NetError> {
        Ok(())
    }
}

fn bench_stage_and_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("tx_flush");
    group.throughput(Throughput::Elements(32));

    group.bench_function("burst_32_full", |b| {
        let mut net = SinkNet {
            pool: FramePool::new(256),
            accept: None,
        };
        let mut tx = TxStage::new();
        let stats = CoreStats::default();

        b.iter(|| {
            for _ in 0..32 {
                tx.stage(net.pool.alloc().unwrap());
            }
            tx.flush(&mut net, &stats);
            black_box(tx.len())
        })
    });

    group.bench_function("burst_32_half_accepted", |b| {
        let mut net = SinkNet {
            pool: FramePool::new(256),
            accept: Some(16),
        };
        let mut tx = TxStage::new();
        let stats = CoreStats::default();

        b.iter(|| {
            while tx.len() < 32 {
                tx.stage(net.pool.alloc().unwrap());
            }
            tx.flush(&mut net, &stats);
            black_box(tx.len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_stage_and_flush);
criterion_main!(benches);
