use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};
use std::sync::Mutex;

/// Source of randomness for branch selection and reply sampling.
pub trait Chance: Send + Sync {
    /// Uniform draw in `[0, 1)`.
    fn draw(&self) -> f64;

    /// Uniform index in `0..len`; `len` is never zero at call sites.
    fn pick(&self, len: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadChance;

impl Chance for ThreadChance {
    fn draw(&self) -> f64 {
        thread_rng().gen::<f64>()
    }

    fn pick(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        thread_rng().gen_range(0..len)
    }
}

/// Reproducible source backed by a seeded `StdRng`.
pub struct SeededChance {
    rng: Mutex<StdRng>,
}

impl SeededChance {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Chance for SeededChance {
    fn draw(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        rng.gen::<f64>()
    }

    fn pick(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        rng.gen_range(0..len)
    }
}

pub fn choose<'a, T>(chance: &dyn Chance, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let idx = chance.pick(items.len()).min(items.len() - 1);
    items.get(idx)
}
