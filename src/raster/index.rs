use super::Seed;
use crate::config::TieBreak;
use crate::ids::FacilityId;
use geo_types::Coord;
use rstar::RTree;
use rstar::primitives::GeomWithData;

/// Nearest-label lookup used to fill the allocation raster.
pub trait SeedIndex: Sync {
    /// Distinct labels, ascending. Raster cells store indices into this slice.
    fn labels(&self) -> &[FacilityId];

    /// Index into [`SeedIndex::labels`] of the seed nearest to `point`, lowest
    /// label on ties. `None` when there are no seeds.
    fn nearest(&self, point: Coord<f64>) -> Option<u32>;
}

pub struct RTreeSeedIndex {
    tree: RTree<GeomWithData<[f64; 2], u32>>,
    labels: Vec<FacilityId>,
    tie: TieBreak,
}

impl RTreeSeedIndex {
    pub fn new(seeds: &[Seed], tie: TieBreak) -> Self {
        let mut labels: Vec<FacilityId> = seeds.iter().map(|s| s.label).collect();
        labels.sort_unstable();
        labels.dedup();

        let points: Vec<GeomWithData<[f64; 2], u32>> = seeds
            .iter()
            .filter_map(|seed| {
                let index = labels.binary_search(&seed.label).ok()?;
                Some(GeomWithData::new(
                    [seed.coord.x, seed.coord.y],
                    index as u32,
                ))
            })
            .collect();

        Self {
            tree: RTree::bulk_load(points),
            labels,
            tie,
        }
    }
}

impl SeedIndex for RTreeSeedIndex {
    fn labels(&self) -> &[FacilityId] {
        &self.labels
    }

    fn nearest(&self, point: Coord<f64>) -> Option<u32> {
        let mut candidates = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[point.x, point.y]);
        let (first, first_d2) = candidates.next()?;

        let best = self.tie.key(first_d2.sqrt());
        let mut label = first.data;
        // candidates arrive by increasing distance, so the tie group is a prefix
        for (seed, d2) in candidates {
            if self.tie.key(d2.sqrt()) != best {
                break;
            }
            label = label.min(seed.data);
        }

        Some(label)
    }
}
