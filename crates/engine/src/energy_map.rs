//! Energy Map — derives a normalized per-chunk energy scalar from the
//! Access Store's `ChunkEnergy` rows (§4.3).

use engram_core::ChunkKey;
use std::collections::HashMap;

/// A snapshot energy map, keyed by `ChunkKey`. Values are normalized to
/// `[0, 1]` by the maximum raw energy observed; keys absent from the
/// map have energy 0 by construction (see [`EnergyMap::get`]).
#[derive(Debug, Clone, Default)]
pub struct EnergyMap {
    values: HashMap<ChunkKey, f64>,
}

impl EnergyMap {
    /// Build the normalized energy map from raw `ChunkEnergy` rows.
    ///
    /// `now` and `half_life_hours` drive the exponential decay term;
    /// `now` is passed in rather than read from the clock so a run is
    /// reproducible given fixed inputs.
    pub fn build(energy: &HashMap<ChunkKey, engram_core::ChunkEnergy>, now: f64, half_life_hours: f64) -> Self {
        let half_life_secs = half_life_hours * 3600.0;
        let mut raw: HashMap<ChunkKey, f64> = HashMap::with_capacity(energy.len());
        let mut max_raw = 0.0f64;

        for (key, ce) in energy {
            let avg_score = ce.avg_score();
            let age = (now - ce.last_accessed).max(0.0);
            let decay = if half_life_secs > 0.0 {
                (-std::f64::consts::LN_2 * age / half_life_secs).exp()
            } else {
                0.0
            };
            let raw_energy = avg_score * ce.total_accesses as f64 * decay;
            if raw_energy > max_raw {
                max_raw = raw_energy;
            }
            raw.insert(key.clone(), raw_energy);
        }

        let values = if max_raw > 0.0 {
            raw.into_iter().map(|(k, v)| (k, v / max_raw)).collect()
        } else {
            raw.into_iter().map(|(k, _)| (k, 0.0)).collect()
        };

        EnergyMap { values }
    }

    /// The normalized energy for `key`, or 0 if absent.
    pub fn get(&self, key: &ChunkKey) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    /// Whether any chunk has nonzero energy.
    pub fn is_all_zero(&self) -> bool {
        self.values.values().all(|&v| v == 0.0)
    }

    /// Number of distinct keys carrying energy (zero or otherwise).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::ChunkEnergy;
    use proptest::prelude::*;

    fn energy_row(total_accesses: u64, total_score: f64, last_accessed: f64) -> ChunkEnergy {
        ChunkEnergy {
            total_accesses,
            total_score,
            first_accessed: last_accessed,
            last_accessed,
        }
    }

    #[test]
    fn normalizes_by_max_raw_energy() {
        let mut rows = HashMap::new();
        let a = ChunkKey::new("a.md", "1");
        let b = ChunkKey::new("b.md", "1");
        rows.insert(a.clone(), energy_row(10, 8.0, 1000.0));
        rows.insert(b.clone(), energy_row(2, 1.0, 1000.0));

        let map = EnergyMap::build(&rows, 1000.0, 168.0);
        assert_eq!(map.get(&a), 1.0);
        assert!(map.get(&b) < 1.0 && map.get(&b) > 0.0);
    }

    #[test]
    fn absent_key_has_zero_energy() {
        let rows = HashMap::new();
        let map = EnergyMap::build(&rows, 0.0, 168.0);
        assert_eq!(map.get(&ChunkKey::new("x.md", "1")), 0.0);
        assert!(map.is_all_zero());
    }

    #[test]
    fn decay_reduces_energy_for_old_access() {
        let mut rows = HashMap::new();
        let fresh = ChunkKey::new("fresh.md", "1");
        let stale = ChunkKey::new("stale.md", "1");
        rows.insert(fresh.clone(), energy_row(5, 4.0, 1_000_000.0));
        rows.insert(stale.clone(), energy_row(5, 4.0, 0.0));

        let half_life_hours = 168.0;
        let now = 1_000_000.0;
        let map = EnergyMap::build(&rows, now, half_life_hours);
        assert!(map.get(&fresh) > map.get(&stale));
    }

    proptest::proptest! {
        /// Every normalized energy value stays in [0, 1], and the
        /// maximum raw-energy key (if any is nonzero) normalizes to
        /// exactly 1.
        #[test]
        fn normalized_energy_is_bounded(
            rows in proptest::collection::vec((1u64..100, 0.0f64..1.0, 0.0f64..2_000_000.0), 1..20)
        ) {
            let mut map = HashMap::new();
            for (i, &(accesses, score, last)) in rows.iter().enumerate() {
                map.insert(
                    ChunkKey::new(format!("f{i}.md"), "1"),
                    ChunkEnergy {
                        total_accesses: accesses,
                        total_score: score * accesses as f64,
                        first_accessed: last,
                        last_accessed: last,
                    },
                );
            }

            let energy = EnergyMap::build(&map, 2_000_000.0, 168.0);
            for key in map.keys() {
                let v = energy.get(key);
                prop_assert!((0.0..=1.0).contains(&v), "energy {v} out of bounds");
            }
        }
    }
}
