use core::cell::Cell;
use std::{collections::HashSet, sync::Mutex, thread::scope};

use crate::{
    AccessCallback, BlockOptimizer, ConfigError, CountingSource, Error, HiLoOptimizer,
    MemorySequence, NoopOptimizer, PooledLoOptimizer, PooledOptimizer,
};

/// A source that replays fixed values and can be told to fail.
struct ScriptedSource {
    values: Vec<i64>,
    index: Cell<usize>,
    fail_next: Cell<bool>,
}

#[derive(Debug, PartialEq, Eq)]
struct SourceDown;

impl ScriptedSource {
    fn new(values: &[i64]) -> Self {
        Self {
            values: values.to_vec(),
            index: Cell::new(0),
            fail_next: Cell::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.index.get()
    }
}

impl AccessCallback for ScriptedSource {
    type Err = SourceDown;

    fn next_value(&self) -> Result<i64, Self::Err> {
        if self.fail_next.replace(false) {
            return Err(SourceDown);
        }
        let i = self.index.get();
        self.index.set(i + 1);
        Ok(self.values[i])
    }
}

fn counting(initial: i64, step: i64) -> CountingSource<MemorySequence> {
    CountingSource::new(MemorySequence::new(initial, step))
}

fn take<O: BlockOptimizer, C: AccessCallback>(optimizer: &O, source: &C, n: usize) -> Vec<i64> {
    (0..n).map(|_| optimizer.generate(source).unwrap()).collect()
}

fn run_strictly_increasing<O: BlockOptimizer>(optimizer: &O) {
    let source = MemorySequence::for_optimizer(1, optimizer);
    let values = take(optimizer, &source, 1_000);
    assert!(values.windows(2).all(|w| w[0] < w[1]));
}

fn run_retry_after_source_failure<O: BlockOptimizer>(optimizer: &O, script: &[i64], expected: &[i64]) {
    let source = ScriptedSource::new(script);
    let mut produced = Vec::new();
    for _ in expected {
        // Every acquisition first hits a failing source, then retries.
        source.fail_next.set(true);
        match optimizer.generate(&source) {
            Err(Error::Source(SourceDown)) => {}
            // Served from the current block without touching the source.
            Ok(value) => {
                source.fail_next.set(false);
                produced.push(value);
                continue;
            }
            Err(e) => panic!("unexpected error: {e:?}"),
        }
        produced.push(optimizer.generate(&source).unwrap());
    }
    assert_eq!(produced, expected);
}

fn run_threaded_unique<O>(optimizer: &O, expected_calls: impl Fn(u64) -> bool)
where
    O: BlockOptimizer + Sync,
{
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 5_000;
    const TOTAL_IDS: usize = THREADS * IDS_PER_THREAD;

    let source = CountingSource::new(MemorySequence::for_optimizer(1, optimizer));
    let seen = Mutex::new(HashSet::with_capacity(TOTAL_IDS));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut local = Vec::with_capacity(IDS_PER_THREAD);
                for _ in 0..IDS_PER_THREAD {
                    local.push(optimizer.generate(&source).unwrap());
                }
                // Each thread observes its own values in increasing order.
                assert!(local.windows(2).all(|w| w[0] < w[1]));
                let mut seen = seen.lock().unwrap();
                for id in local {
                    assert!(seen.insert(id), "duplicate id {id}");
                }
            });
        }
    });

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), TOTAL_IDS, "Expected {TOTAL_IDS} unique IDs");
    // No gaps: every policy here starts at 1 against a fresh source.
    assert_eq!(seen.iter().min(), Some(&1));
    assert_eq!(seen.iter().max(), Some(&(TOTAL_IDS as i64)));
    assert!(expected_calls(source.calls()), "unexpected call count {}", source.calls());
}

#[test]
fn none_returns_every_source_value() {
    let optimizer = NoopOptimizer::new(1).unwrap();
    let source = counting(1, 1);
    assert_eq!(take(&optimizer, &source, 10), (1..=10).collect::<Vec<_>>());
    assert_eq!(source.calls(), 10);
    assert_eq!(optimizer.last_source_value(), Ok(Some(10)));
}

#[test]
fn none_skips_leading_zero_once() {
    let optimizer = NoopOptimizer::new(1).unwrap();
    let source = counting(0, 1);
    assert_eq!(take(&optimizer, &source, 10), (1..=10).collect::<Vec<_>>());
    assert_eq!(source.calls(), 11);
    assert_eq!(source.inner().last_value(), Some(10));
}

#[test]
fn hilo_serves_a_block_per_source_call() {
    let optimizer = HiLoOptimizer::new(10).unwrap();
    let source = counting(1, 1);

    assert_eq!(take(&optimizer, &source, 10), (1..=10).collect::<Vec<_>>());
    assert_eq!(source.calls(), 1);
    assert_eq!(optimizer.last_source_value(), Ok(Some(1)));

    assert_eq!(optimizer.generate(&source), Ok(11));
    assert_eq!(source.calls(), 2);
    assert_eq!(optimizer.last_source_value(), Ok(Some(2)));
}

#[test]
fn hilo_skips_leading_zero_once() {
    let optimizer = HiLoOptimizer::new(10).unwrap();
    let source = counting(0, 1);

    assert_eq!(take(&optimizer, &source, 10), (1..=10).collect::<Vec<_>>());
    assert_eq!(source.calls(), 2);

    assert_eq!(optimizer.generate(&source), Ok(11));
    assert_eq!(source.calls(), 3);
}

#[test]
fn hilo_amortizes_one_call_per_increment() {
    const INCREMENT: i64 = 7;
    let optimizer = HiLoOptimizer::new(INCREMENT).unwrap();
    let source = counting(1, 1);

    for block in 1..=20_u64 {
        take(&optimizer, &source, INCREMENT as usize);
        assert_eq!(source.calls(), block);
    }
}

#[test]
fn hilo_with_increment_one_maps_source_values_directly() {
    let optimizer = HiLoOptimizer::new(1).unwrap();
    let source = ScriptedSource::new(&[5, 9, 12]);
    assert_eq!(take(&optimizer, &source, 3), vec![5, 9, 12]);
}

#[test]
fn pooled_bootstraps_with_two_calls() {
    let optimizer = PooledOptimizer::new(10).unwrap();
    let source = counting(1, 10);

    assert_eq!(take(&optimizer, &source, 10), (1..=10).collect::<Vec<_>>());
    assert_eq!(source.calls(), 2);
    assert_eq!(optimizer.last_source_value(), Ok(Some(11)));

    assert_eq!(optimizer.generate(&source), Ok(11));
    assert_eq!(source.calls(), 3);
    assert_eq!(source.inner().last_value(), Some(21));
    assert_eq!(optimizer.last_source_value(), Ok(Some(21)));
}

#[test]
fn pooled_misconfigured_source_leaves_gaps_not_duplicates() {
    // The source advances by 15 while the optimizer expects 10.
    let optimizer = PooledOptimizer::new(10).unwrap();
    let source = MemorySequence::new(1, 15);
    let values = take(&optimizer, &source, 40);
    let unique: HashSet<_> = values.iter().copied().collect();
    assert_eq!(unique.len(), values.len());
    assert!(values.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn pooled_lo_reads_source_as_lower_bound() {
    let optimizer = PooledLoOptimizer::new(10).unwrap();
    let source = counting(1, 10);

    assert_eq!(take(&optimizer, &source, 10), (1..=10).collect::<Vec<_>>());
    assert_eq!(source.calls(), 1);
    assert_eq!(optimizer.last_source_value(), Ok(Some(1)));

    assert_eq!(optimizer.generate(&source), Ok(11));
    assert_eq!(source.calls(), 2);
    assert_eq!(optimizer.last_source_value(), Ok(Some(11)));
}

#[test]
fn pooled_lo_clamps_values_below_one() {
    let optimizer = PooledLoOptimizer::new(10).unwrap();
    let source = ScriptedSource::new(&[-5, 5]);
    assert_eq!(take(&optimizer, &source, 6), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(source.calls(), 2);
}

#[test]
fn pooled_lo_skips_blocks_entirely_below_one() {
    let optimizer = PooledLoOptimizer::new(5).unwrap();
    let source = ScriptedSource::new(&[-10, -5, 0]);
    assert_eq!(take(&optimizer, &source, 4), vec![1, 2, 3, 4]);
    assert_eq!(source.calls(), 3);
    assert_eq!(optimizer.last_source_value(), Ok(Some(0)));
}

#[test]
fn none_retries_from_unmutated_state() {
    let optimizer = NoopOptimizer::new(1).unwrap();
    run_retry_after_source_failure(&optimizer, &[0, 1, 2, 3], &[1, 2, 3]);
    assert_eq!(optimizer.last_source_value(), Ok(Some(3)));
}

#[test]
fn hilo_retries_from_unmutated_state() {
    let optimizer = HiLoOptimizer::new(2).unwrap();
    run_retry_after_source_failure(&optimizer, &[1, 2, 3], &[1, 2, 3, 4, 5, 6]);
}

#[test]
fn pooled_retries_from_unmutated_state() {
    let optimizer = PooledOptimizer::new(3).unwrap();
    run_retry_after_source_failure(&optimizer, &[1, 4, 7], &[1, 2, 3, 4, 5, 6]);
}

#[test]
fn pooled_lo_retries_from_unmutated_state() {
    let optimizer = PooledLoOptimizer::new(3).unwrap();
    run_retry_after_source_failure(&optimizer, &[1, 4], &[1, 2, 3, 4, 5, 6]);
}

#[test]
fn pooled_bootstrap_failure_on_second_call_advances_nothing() {
    struct FailSecond(Cell<u32>);
    impl AccessCallback for FailSecond {
        type Err = SourceDown;
        fn next_value(&self) -> Result<i64, SourceDown> {
            let n = self.0.get();
            self.0.set(n + 1);
            if n == 1 {
                Err(SourceDown)
            } else {
                Ok(i64::from(n) * 10 + 1)
            }
        }
    }

    let optimizer = PooledOptimizer::new(10).unwrap();
    let source = FailSecond(Cell::new(0));
    assert_eq!(optimizer.generate(&source), Err(Error::Source(SourceDown)));
    assert_eq!(optimizer.last_source_value(), Ok(None));

    // The retry bootstraps from scratch: lower 21, upper 31.
    assert_eq!(optimizer.generate(&source), Ok(21));
    assert_eq!(optimizer.last_source_value(), Ok(Some(31)));
}

/// A source whose first value is `0` and whose second call fails, then
/// counts up from `1`.
struct ZeroThenDown(Cell<u32>);

impl AccessCallback for ZeroThenDown {
    type Err = SourceDown;

    fn next_value(&self) -> Result<i64, SourceDown> {
        let n = self.0.get();
        self.0.set(n + 1);
        match n {
            0 => Ok(0),
            1 => Err(SourceDown),
            n => Ok(i64::from(n) - 1),
        }
    }
}

#[test]
fn none_zero_skip_failure_advances_nothing() {
    let optimizer = NoopOptimizer::new(1).unwrap();
    let source = ZeroThenDown(Cell::new(0));

    assert_eq!(optimizer.generate(&source), Err(Error::Source(SourceDown)));
    assert_eq!(optimizer.last_source_value(), Ok(None));

    assert_eq!(optimizer.generate(&source), Ok(1));
    assert_eq!(optimizer.last_source_value(), Ok(Some(1)));
}

#[test]
fn hilo_zero_skip_failure_advances_nothing() {
    let optimizer = HiLoOptimizer::new(10).unwrap();
    let source = ZeroThenDown(Cell::new(0));

    assert_eq!(optimizer.generate(&source), Err(Error::Source(SourceDown)));
    assert_eq!(optimizer.last_source_value(), Ok(None));

    // The retry opens the block at hi = 1.
    assert_eq!(take(&optimizer, &source, 10), (1..=10).collect::<Vec<_>>());
    assert_eq!(optimizer.last_source_value(), Ok(Some(1)));
    assert_eq!(source.0.get(), 3);
}

#[test]
fn constructors_reject_non_positive_increments() {
    for increment in [0, -1, -2, i64::MIN] {
        let expected = ConfigError::InvalidIncrement(increment);
        assert_eq!(NoopOptimizer::new(increment).unwrap_err(), expected);
        assert_eq!(HiLoOptimizer::new(increment).unwrap_err(), expected);
        assert_eq!(PooledOptimizer::new(increment).unwrap_err(), expected);
        assert_eq!(PooledLoOptimizer::new(increment).unwrap_err(), expected);
    }
}

#[test]
fn hilo_smallest_increment_stays_unique() {
    let optimizer = HiLoOptimizer::new(1).unwrap();
    let source = MemorySequence::new(1, 1);
    let values = take(&optimizer, &source, 100);
    let unique: HashSet<_> = values.iter().copied().collect();
    assert_eq!(unique.len(), values.len());
    assert_eq!(values, (1..=100).collect::<Vec<_>>());
}

#[test]
fn every_policy_is_strictly_increasing() {
    run_strictly_increasing(&HiLoOptimizer::new(13).unwrap());
    run_strictly_increasing(&PooledOptimizer::new(13).unwrap());
    run_strictly_increasing(&PooledLoOptimizer::new(13).unwrap());
    run_strictly_increasing(&NoopOptimizer::new(1).unwrap());
}

#[test]
fn none_threaded_unique() {
    run_threaded_unique(&NoopOptimizer::new(1).unwrap(), |calls| calls == 40_000);
}

#[test]
fn hilo_threaded_unique() {
    run_threaded_unique(&HiLoOptimizer::new(100).unwrap(), |calls| calls == 400);
}

#[test]
fn pooled_threaded_unique() {
    run_threaded_unique(&PooledOptimizer::new(100).unwrap(), |calls| calls == 401);
}

#[test]
fn pooled_lo_threaded_unique() {
    run_threaded_unique(&PooledLoOptimizer::new(100).unwrap(), |calls| calls == 400);
}
