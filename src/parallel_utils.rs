//! Long-lived worker groups for sensor accumulation
//!
//! Each DFT sensor owns one fixed-size rayon pool, created with the sensor
//! and torn down when it is dropped. Work is handed out as contiguous
//! slices of the sensor buffer and every call returns only after all slices
//! are done, so accumulation for a step completes before the next step.

use num_complex::Complex64;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{FdtdError, Result};

/// Fixed-size group of named worker threads
pub struct WorkerGroup {
    pool: ThreadPool,
    threads: usize,
}

impl std::fmt::Debug for WorkerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("threads", &self.threads)
            .finish()
    }
}

impl WorkerGroup {
    /// Spawn `threads` workers named after the owning sensor
    pub fn new(name: &str, threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let prefix = name.to_string();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| FdtdError::WorkerPool(e.to_string()))?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `f(chunk_index, chunk)` over contiguous chunks of `data` and wait
    /// for all of them
    pub fn for_each_chunk<T, F>(&self, data: &mut [T], chunk: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Send + Sync,
    {
        let chunk = chunk.max(1);
        self.pool.install(|| {
            data.par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(i, c)| f(i, c));
        });
    }

    /// Chunk length that spreads `items` records of `record` values over the
    /// workers
    pub fn chunk_len(&self, items: usize, record: usize) -> usize {
        let per_worker = items.div_ceil(self.threads).max(1);
        per_worker * record.max(1)
    }

    /// Sum of `|z|²` over a buffer
    pub fn norm_squared(&self, data: &[Complex64]) -> f64 {
        self.pool
            .install(|| data.par_iter().map(|z| z.norm_sqr()).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_chunks_cover_buffer() {
        let group = WorkerGroup::new("test", 3).unwrap();
        let mut data = vec![0usize; 100];
        let chunk = group.chunk_len(25, 4);
        group.for_each_chunk(&mut data, chunk, |i, c| {
            for (k, v) in c.iter_mut().enumerate() {
                *v = i * chunk + k;
            }
        });
        assert!(data.iter().enumerate().all(|(k, &v)| k == v));
    }

    #[test]
    fn test_norm_squared() {
        let group = WorkerGroup::new("norm", 2).unwrap();
        let data = vec![Complex64::new(3.0, 4.0); 10];
        assert_relative_eq!(group.norm_squared(&data), 250.0);
    }

    #[test]
    fn test_thread_names() {
        let group = WorkerGroup::new("pool", 2).unwrap();
        let mut names = vec![String::new(); 2];
        group.for_each_chunk(&mut names, 1, |_, c| {
            c[0] = std::thread::current().name().unwrap_or("").to_string();
        });
        assert!(names.iter().all(|n| n.starts_with("pool-")));
    }
}
