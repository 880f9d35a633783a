use rand::{
    Rng,
    SeedableRng,
    rngs::{
        StdRng,
        ThreadRng,
    },
};
use std::collections::VecDeque;

/// Source of uniform values in `[0, 1)` consumed by [`roll`].
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<F> RandomSource for F
where
    F: FnMut() -> f64,
{
    fn next_unit(&mut self) -> f64 {
        self()
    }
}

/// Fresh entropy from the thread-local generator.
pub struct ThreadRandom(ThreadRng);

impl ThreadRandom {
    pub fn new() -> Self {
        Self(rand::rng())
    }
}

impl Default for ThreadRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// Reproducible draws for a given seed.
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// Replays a fixed list of values, repeating the last one once exhausted.
#[derive(Clone, Debug)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    last: f64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            last: 0.0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new([value])
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        if let Some(v) = self.values.pop_front() {
            self.last = v;
        }
        self.last
    }
}

/// Either the generator picked at startup: seeded when a seed is configured.
pub enum SessionRandom {
    Thread(ThreadRandom),
    Seeded(SeededRandom),
}

impl SessionRandom {
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => SessionRandom::Seeded(SeededRandom::new(seed)),
            None => SessionRandom::Thread(ThreadRandom::new()),
        }
    }
}

impl RandomSource for SessionRandom {
    fn next_unit(&mut self) -> f64 {
        match self {
            SessionRandom::Thread(r) => r.next_unit(),
            SessionRandom::Seeded(r) => r.next_unit(),
        }
    }
}

/// Cumulative-weight sample over `weights`, returning the chosen position.
///
/// Zero-weight entries are never selected. If rounding leaves the running
/// sum short of the target the last positive-weight entry is returned.
/// Consumes exactly one value from `source` for any non-empty pool; `None`
/// only for an empty pool.
pub fn roll(weights: &[f64], source: &mut impl RandomSource) -> Option<usize> {
    let unit = source.next_unit();
    match weights.len() {
        0 => return None,
        1 => return Some(0),
        _ => {}
    }

    let unit = if unit.is_nan() {
        0.0
    } else {
        unit.clamp(0.0, 1.0)
    };
    let total: f64 = weights.iter().copied().filter(|w| *w > 0.0).sum();
    if total <= 0.0 {
        return Some(weights.len() - 1);
    }
    let target = unit * total;

    let mut acc = 0.0;
    let mut last_selectable = weights.len() - 1;
    for (idx, w) in weights.iter().copied().enumerate() {
        if w <= 0.0 {
            continue;
        }
        acc += w;
        last_selectable = idx;
        if acc >= target {
            return Some(idx);
        }
    }
    Some(last_selectable)
}
