use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::data::dataset::{Batch, Dataset, Sample};
use crate::error::{AugMixError, Result};

/// Mini-batch loader with an optional pool of prefetching worker threads.
///
/// Each call to [`DataLoader::iter`] draws one seed from the caller's RNG.
/// The visitation order and every batch's sample randomness derive from that
/// seed (batch `i` uses ChaCha stream `i + 1`), so an epoch's batches are the
/// same whatever the worker count.
#[derive(Clone)]
pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    batch_size: usize,
    shuffle: bool,
    num_workers: usize,
    prefetch: usize,
}

impl DataLoader {
    pub fn new(dataset: Arc<dyn Dataset>, batch_size: usize) -> Self {
        DataLoader { dataset, batch_size: batch_size.max(1), shuffle: false, num_workers: 0, prefetch: 2 }
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// `0` builds batches on the calling thread.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Batches each worker may buffer ahead of the consumer.
    pub fn prefetch(mut self, depth: usize) -> Self {
        self.prefetch = depth.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    /// Batches per epoch; the last batch may be short.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self, rng: &mut dyn RngCore) -> Batches {
        let seed: u64 = rng.gen();
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        }
        let plan = Arc::new(EpochPlan { order, batch_size: self.batch_size, seed });

        let workers = self.num_workers.min(plan.batch_count());
        let mut receivers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (tx, rx) = mpsc::sync_channel(self.prefetch);
            let plan = Arc::clone(&plan);
            let dataset = Arc::clone(&self.dataset);
            handles.push(thread::spawn(move || run_worker(worker, workers, &plan, dataset.as_ref(), tx)));
            receivers.push(rx);
        }

        Batches { plan, dataset: Arc::clone(&self.dataset), next: 0, receivers, handles }
    }
}

struct EpochPlan {
    order: Vec<usize>,
    batch_size: usize,
    seed: u64,
}

impl EpochPlan {
    fn batch_count(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    fn build(&self, dataset: &dyn Dataset, index: usize) -> Batch {
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.order.len());
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64 + 1);

        let samples: Vec<Sample> = self.order[start..end].iter().map(|&i| dataset.get(i, &mut rng)).collect();
        Batch::collate(&samples)
    }
}

fn run_worker(worker: usize, workers: usize, plan: &EpochPlan, dataset: &dyn Dataset, tx: SyncSender<Batch>) {
    for index in (worker..plan.batch_count()).step_by(workers) {
        // A closed channel means the consumer stopped early.
        if tx.send(plan.build(dataset, index)).is_err() {
            return;
        }
    }
}

/// One epoch of batches, in order.
pub struct Batches {
    plan: Arc<EpochPlan>,
    dataset: Arc<dyn Dataset>,
    next: usize,
    receivers: Vec<Receiver<Batch>>,
    handles: Vec<JoinHandle<()>>,
}

impl Iterator for Batches {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.plan.batch_count();
        if self.next >= total {
            return None;
        }
        let index = self.next;
        self.next += 1;

        if self.receivers.is_empty() {
            return Some(Ok(self.plan.build(self.dataset.as_ref(), index)));
        }
        match self.receivers[index % self.receivers.len()].recv() {
            Ok(batch) => Some(Ok(batch)),
            Err(_) => {
                self.next = total;
                Some(Err(AugMixError::Loader(format!("worker exited before producing batch {}", index))))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.plan.batch_count() - self.next;
        (left, Some(left))
    }
}

impl Drop for Batches {
    fn drop(&mut self) {
        // Disconnect first so workers blocked on a full channel can exit.
        self.receivers.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::mix::{AugMix, AugMixConfig};
    use crate::augment::preprocess::Normalize;
    use crate::data::adapter::AugMixDataset;
    use crate::data::array::{ArrayDataset, ImageArray};

    fn toy_dataset(n: usize) -> Arc<dyn Dataset> {
        let pixels: Vec<u8> = (0..n * 6 * 6 * 3).map(|i| (i * 7 % 251) as u8).collect();
        let base = ArrayDataset::new(ImageArray::new(n, 6, 6, pixels).unwrap(), (0..n).map(|i| i % 2).collect()).unwrap();
        let engine = AugMix::new(AugMixConfig::default(), Arc::new(Normalize::default())).unwrap();
        Arc::new(AugMixDataset::new(base, Arc::new(engine), true))
    }

    fn collect(loader: &DataLoader, seed: u64) -> Vec<Batch> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        loader.iter(&mut rng).map(|b| b.unwrap()).collect()
    }

    #[test]
    fn test_batch_count_and_sizes() {
        let loader = DataLoader::new(toy_dataset(7), 3);
        assert_eq!(loader.len(), 3);
        let batches = collect(&loader, 1);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(batches[0].views.len(), 3);
    }

    #[test]
    fn test_same_seed_same_batches_for_any_worker_count() {
        let dataset = toy_dataset(9);
        let inline = collect(&DataLoader::new(Arc::clone(&dataset), 2).shuffle(true), 42);
        for workers in [1, 2, 4] {
            let pooled = DataLoader::new(Arc::clone(&dataset), 2).shuffle(true).num_workers(workers);
            assert_eq!(collect(&pooled, 42), inline, "{} workers", workers);
        }
    }

    #[test]
    fn test_shuffle_visits_every_sample_once() {
        let loader = DataLoader::new(toy_dataset(10), 4).shuffle(true).num_workers(2);
        let mut labels: Vec<usize> = collect(&loader, 5).into_iter().flat_map(|b| b.targets).collect();
        labels.sort();
        assert_eq!(labels, vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_dropping_iterator_early_joins_workers() {
        let loader = DataLoader::new(toy_dataset(12), 1).num_workers(3).prefetch(1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut it = loader.iter(&mut rng);
        assert!(it.next().unwrap().is_ok());
        drop(it);
    }
}
