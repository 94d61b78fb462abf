// This file is part of soroban-indexer.
// Copyright (C) 2025 Blockroma
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded worker pool for independent fan-out tasks.
//!
//! A fixed number of workers draw tasks from a buffered channel (buffer size twice the worker
//! count). Results are collected as tasks complete and returned in arrival order. On
//! cancellation, running tasks receive the cancelled token and outstanding tasks are abandoned.

use std::{future::Future, sync::Arc};
use tokio::{
    select,
    sync::{Mutex, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

/// A pool of workers executing independent async tasks with bounded concurrency.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Create a new [WorkerPool] with the given number of workers, at least one.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// The number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all tasks on the pool, returning their outputs in completion order.
    ///
    /// Each task is invoked with a child of the given cancellation token. When the token is
    /// cancelled, tasks which have not yet been picked up are abandoned.
    pub async fn run_all<F, Fut, T>(&self, token: CancellationToken, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let task_count = tasks.len();
        let (task_tx, task_rx) = mpsc::channel::<F>(self.workers * 2);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<T>(task_count.max(1));

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let token = token.clone();

            workers.spawn(async move {
                loop {
                    let task = {
                        let mut task_rx = task_rx.lock().await;
                        select! {
                            _ = token.cancelled() => None,
                            task = task_rx.recv() => task,
                        }
                    };

                    let Some(task) = task else { break };

                    let result = task(token.child_token()).await;
                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let feeder_token = token.clone();
        let feeder = tokio::spawn(async move {
            for task in tasks {
                select! {
                    _ = feeder_token.cancelled() => break,
                    result = task_tx.send(task) => {
                        if result.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut results = Vec::with_capacity(task_count);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }

        let _ = feeder.await;
        while workers.join_next().await.is_some() {}

        results
    }
}

#[cfg(test)]
mod tests {
    use crate::worker::WorkerPool;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };
    use tokio::time;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_new_min_one_worker() {
        assert_eq!(WorkerPool::new(0).workers(), 1);
        assert_eq!(WorkerPool::new(5).workers(), 5);
    }

    #[tokio::test]
    async fn test_run_all() {
        let pool = WorkerPool::new(3);
        let counter = Arc::new(AtomicU32::new(0));

        let tasks = (0..10)
            .map(|n| {
                let counter = counter.clone();
                move |_token: CancellationToken| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    n * 2
                }
            })
            .collect::<Vec<_>>();

        let mut results = pool.run_all(CancellationToken::new(), tasks).await;
        results.sort_unstable();

        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(results, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_run_all_empty() {
        let pool = WorkerPool::new(2);
        let results = pool
            .run_all(
                CancellationToken::new(),
                Vec::<fn(CancellationToken) -> std::future::Ready<u32>>::new(),
            )
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_abandons_outstanding() {
        let pool = WorkerPool::new(1);
        let token = CancellationToken::new();
        let started = Arc::new(AtomicU32::new(0));

        let tasks = (0..20)
            .map(|n| {
                let token = token.clone();
                let started = started.clone();
                move |_task_token: CancellationToken| async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        token.cancel();
                    }
                    time::sleep(Duration::from_millis(1)).await;
                    n
                }
            })
            .collect::<Vec<_>>();

        let results = pool.run_all(token.clone(), tasks).await;

        // The single worker cancels on the first task; the bulk of the queue is abandoned.
        assert!(results.len() < 20);
        assert!(started.load(Ordering::SeqCst) < 20);
    }
}
