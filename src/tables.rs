//! Process-wide binomial coefficient table and a small per-call power cache,
//! both used by the series-expansion algebra (C4). The binomial table's
//! maximum order grows monotonically: a single-writer "refresh" extends it
//! before the parallel upward/downward FMM passes begin, after which reads
//! never block. Grounded on `fmm_tables.hpp`.

use std::sync::{OnceLock, RwLock};

use num_complex::Complex64;

struct Triangular {
    max_order: usize,
    values: Vec<f64>,
}

impl Triangular {
    fn empty() -> Self {
        Self {
            max_order: 0,
            values: vec![1.0], // C(0,0) = 1
        }
    }

    fn index(n: usize, k: usize) -> usize {
        n * (n + 1) / 2 + k
    }

    fn rebuild(order: usize) -> Self {
        let mut values = vec![0.0; (order + 1) * (order + 2) / 2];
        values[Self::index(0, 0)] = 1.0;
        for n in 1..=order {
            values[Self::index(n, 0)] = 1.0;
            values[Self::index(n, n)] = 1.0;
            for k in 1..n {
                let prev = values[Self::index(n - 1, k - 1)] + values[Self::index(n - 1, k)];
                values[Self::index(n, k)] = prev;
            }
        }
        Self {
            max_order: order,
            values,
        }
    }
}

fn global_table() -> &'static RwLock<Triangular> {
    static TABLE: OnceLock<RwLock<Triangular>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(Triangular::empty()))
}

/// Thread-safe handle to the process-wide binomial table. `ensure_order`
/// performs the one-time write-fence growth; `get` is a pure read.
#[derive(Clone, Copy, Default)]
pub struct BinomialTable;

impl BinomialTable {
    /// Grows the global table to cover `order` if it doesn't already.
    /// Call this once, serially, before any parallel region that reads it.
    pub fn ensure_order(order: usize) {
        let lock = global_table();
        if lock.read().unwrap().max_order >= order {
            return;
        }
        let mut guard = lock.write().unwrap();
        if guard.max_order < order {
            *guard = Triangular::rebuild(order);
        }
    }

    /// C(n, k). Panics if `ensure_order(n)` (or larger) was never called.
    pub fn get(&self, n: usize, k: usize) -> f64 {
        let guard = global_table().read().unwrap();
        assert!(
            n <= guard.max_order,
            "BinomialTable queried at order {n} before ensure_order was called"
        );
        guard.values[Triangular::index(n, k)]
    }
}

/// Caches `x^0 ..= x^nmax` for a single base value, to avoid recomputing
/// powers inside the expansion shift/conversion formulas.
pub struct PowTable {
    powers: Vec<Complex64>,
}

impl PowTable {
    pub fn new(x: Complex64, nmax: usize) -> Self {
        let mut powers = Vec::with_capacity(nmax + 1);
        let mut cur = Complex64::new(1., 0.);
        for _ in 0..=nmax {
            powers.push(cur);
            cur *= x;
        }
        Self { powers }
    }

    pub fn get(&self, n: usize) -> Complex64 {
        self.powers[n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binomial_values_match_pascals_triangle() {
        BinomialTable::ensure_order(5);
        let t = BinomialTable;
        assert_eq!(t.get(0, 0), 1.0);
        assert_eq!(t.get(5, 0), 1.0);
        assert_eq!(t.get(5, 2), 10.0);
        assert_eq!(t.get(4, 2), 6.0);
    }

    #[test]
    fn monotonic_growth_preserves_prior_values() {
        BinomialTable::ensure_order(3);
        let t = BinomialTable;
        let before = t.get(3, 1);
        BinomialTable::ensure_order(8);
        assert_eq!(t.get(3, 1), before);
        assert_eq!(t.get(8, 4), 70.0);
    }

    #[test]
    fn pow_table_caches_powers() {
        let x = Complex64::new(2., 0.);
        let table = PowTable::new(x, 4);
        assert_eq!(table.get(0), Complex64::new(1., 0.));
        assert_eq!(table.get(4), Complex64::new(16., 0.));
    }
}
