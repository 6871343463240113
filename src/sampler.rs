//! Non-repeating index sampler.
//!
//! Cursors are shared by every user: a category is depleted system-wide
//! before any item comes back. Two users drawing at the same moment can both
//! land on the reset boundary; the cycle then restarts once for both.

use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::content::Category;

/// Indices already served in the current cycle, per category.
#[derive(Default)]
pub struct UsageCursors {
    used: DashMap<Category, Vec<usize>>,
}

impl UsageCursors {
    #[cfg(test)]
    fn consumed(&self, category: Category) -> Vec<usize> {
        self.used
            .get(&category)
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct Sampler {
    cursors: Arc<UsageCursors>,
}

impl Sampler {
    pub fn new(cursors: Arc<UsageCursors>) -> Self {
        Self { cursors }
    }

    /// Next index in `[0, size)` for `category`, or `None` when `size == 0`.
    pub fn next_index(&self, category: Category, size: usize) -> Option<usize> {
        self.next_index_with(&mut rand::thread_rng(), category, size)
    }

    pub fn next_index_with<R: Rng>(
        &self,
        rng: &mut R,
        category: Category,
        size: usize,
    ) -> Option<usize> {
        if size == 0 {
            return None;
        }

        let mut cursor = self.cursors.used.entry(category).or_default();

        // The collection may have shrunk since these were recorded.
        cursor.retain(|&i| i < size);
        if cursor.len() >= size {
            debug!("Cycle complete for {:?}, resetting cursor", category);
            cursor.clear();
        }

        let mut taken = vec![false; size];
        for &i in cursor.iter() {
            taken[i] = true;
        }
        let pool: Vec<usize> = (0..size).filter(|&i| !taken[i]).collect();

        match pool.choose(&mut *rng) {
            Some(&index) => {
                cursor.push(index);
                Some(index)
            }
            None => Some(rng.gen_range(0..size)),
        }
    }
}
