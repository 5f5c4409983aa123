//! Hands out names one at a time per category, without repeats until every name in the category
//! has been used.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

use super::database::NameRow;
use super::random::Xorshift;
use super::NameRecord;
use crate::error::{Error, Result};

/// The names for one category. Every record is in exactly one of the two collections.
#[derive(Clone, Debug, Default)]
pub struct CategoryPool {
    available: Vec<NameRecord>,
    exhausted: VecDeque<NameRecord>,
}

impl CategoryPool {
    pub fn available(&self) -> usize {
        self.available.len()
    }

    pub fn exhausted(&self) -> usize {
        self.exhausted.len()
    }

    /// The total number of names in the pool. This never changes after loading.
    pub fn len(&self) -> usize {
        self.available.len() + self.exhausted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves every used name back into the available set, returning how many were moved.
    fn recycle(&mut self) -> usize {
        let count = self.exhausted.len();
        self.available.extend(self.exhausted.drain(..));
        count
    }
}

type ResetObserver<K> = Box<dyn FnMut(&K, usize) + Send>;

/// Name pools keyed by category.
pub struct NameBank<K> {
    pools: HashMap<K, CategoryPool>,
    rng: Xorshift,
    observers: Vec<ResetObserver<K>>,
}

impl<K> NameBank<K>
where
    K: Copy + Eq + Hash + Display,
{
    pub fn new(rng: Xorshift) -> NameBank<K> {
        NameBank {
            pools: HashMap::new(),
            rng,
            observers: vec![],
        }
    }

    /// Creates a bank with an empty pool for each of `categories`.
    pub fn with_categories(rng: Xorshift, categories: impl IntoIterator<Item = K>) -> NameBank<K> {
        let mut bank = NameBank::new(rng);

        for category in categories {
            bank.pools.entry(category).or_default();
        }

        bank
    }

    /// Adds the valid rows to the pools chosen by `category_of`, returning the number of names
    /// added. Rows without a first or last name are skipped.
    ///
    /// This is meant to be called once. Loading the same rows again adds them again.
    pub fn load<I, F>(&mut self, rows: I, mut category_of: F) -> usize
    where
        I: IntoIterator<Item = NameRow>,
        F: FnMut(&NameRow) -> K,
    {
        let mut added = 0;

        for row in rows {
            let record = match row.to_record() {
                Some(record) => record,
                None => {
                    log::debug!("Skipping row without a first and last name: {:?}", row);
                    continue;
                }
            };

            self.pools
                .entry(category_of(&row))
                .or_default()
                .available
                .push(record);

            added += 1;
        }

        added
    }

    /// Registers a function to be called whenever a category's used names are recycled. It is
    /// given the category and the number of names that became available again.
    pub fn on_reset(&mut self, observer: impl FnMut(&K, usize) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn pool(&self, category: K) -> Option<&CategoryPool> {
        self.pools.get(&category)
    }

    /// Returns each category with its total number of names.
    pub fn counts(&self) -> impl Iterator<Item = (K, usize)> + '_ {
        self.pools.iter().map(|(category, pool)| (*category, pool.len()))
    }

    /// Picks a random unused name from `category`. Once every name has been used, the used names
    /// are all made available again.
    pub fn draw(&mut self, category: K) -> Result<NameRecord> {
        let pool = self
            .pools
            .get_mut(&category)
            .ok_or_else(|| Error::EmptyPool(category.to_string()))?;

        if pool.available.is_empty() {
            let recycled = pool.recycle();

            if recycled != 0 {
                log::debug!("{} name database reset", category);

                for observer in &mut self.observers {
                    observer(&category, recycled);
                }
            }
        }

        if pool.available.is_empty() {
            return Err(Error::EmptyPool(category.to_string()));
        }

        let index = self.rng.below(pool.available.len());
        let record = pool.available.swap_remove(index);
        pool.exhausted.push_back(record.clone());

        Ok(record)
    }
}
