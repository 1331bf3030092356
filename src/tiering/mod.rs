//! Tier Allocator
//!
//! Ranks picks by composite score and partitions them into tiers:
//! 1. each tier claims the unclaimed picks inside its score band
//! 2. a tier short of its minimum borrows the best unclaimed picks below its band
//!
//! A pick is claimed at most once. Nothing is fabricated when the pool is small.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{TierBand, TierConfig};
use crate::error::Result;
use crate::types::{Pick, Tier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBucket {
    pub tier: Tier,
    pub picks: Vec<Pick>,
    /// Picks taken from below the band to reach the minimum
    pub borrowed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierAllocation {
    /// Best tier first
    pub tiers: Vec<TierBucket>,
    /// Picks left over, e.g. beyond a tier cap
    pub unallocated: Vec<Pick>,
}

impl TierAllocation {
    pub fn picks(&self, tier: Tier) -> &[Pick] {
        self.tiers
            .iter()
            .find(|b| b.tier == tier)
            .map(|b| b.picks.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_allocated(&self) -> usize {
        self.tiers.iter().map(|b| b.picks.len()).sum()
    }

    /// All tiered picks, best tier first
    pub fn all_picks(&self) -> impl Iterator<Item = &Pick> {
        self.tiers.iter().flat_map(|b| b.picks.iter())
    }
}

#[derive(Debug, Clone)]
pub struct TierAllocator {
    config: TierConfig,
}

impl TierAllocator {
    pub fn new(config: TierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// confidence_weight * confidence + edge_weight * edge + factor_weight * factors
    pub fn composite_score(&self, pick: &Pick) -> f64 {
        self.config.confidence_weight * pick.confidence
            + self.config.edge_weight * pick.edge
            + self.config.factor_weight * pick.factor_count() as f64
    }

    pub fn allocate(&self, picks: Vec<Pick>) -> TierAllocation {
        // Score, drop duplicate ids, sort best first (stable on ties)
        let mut seen = HashSet::new();
        let mut ranked: Vec<Pick> = picks
            .into_iter()
            .filter(|p| seen.insert(p.id))
            .map(|mut p| {
                p.composite_score = self.composite_score(&p);
                p
            })
            .collect();
        ranked.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));

        let mut claimed: HashSet<Uuid> = HashSet::new();
        let mut buckets = Vec::with_capacity(self.config.bands.len());
        let mut upper = f64::INFINITY;

        for band in &self.config.bands {
            let (indices, borrowed) = Self::claim(&ranked, &claimed, band, upper);
            let mut bucket = TierBucket {
                tier: band.tier,
                picks: Vec::with_capacity(indices.len()),
                borrowed,
            };
            for idx in indices {
                let mut pick = ranked[idx].clone();
                claimed.insert(pick.id);
                pick.tier = Some(band.tier);
                bucket.picks.push(pick);
            }
            debug!(
                tier = %band.tier,
                count = bucket.picks.len(),
                borrowed,
                "Tier filled"
            );
            buckets.push(bucket);
            upper = band.min_score;
        }

        let unallocated: Vec<Pick> = ranked
            .into_iter()
            .filter(|p| !claimed.contains(&p.id))
            .collect();

        let allocation = TierAllocation {
            tiers: buckets,
            unallocated,
        };
        info!(
            allocated = allocation.total_allocated(),
            unallocated = allocation.unallocated.len(),
            tiers = ?allocation
                .tiers
                .iter()
                .map(|b| format!("{}={}", b.tier, b.picks.len()))
                .collect::<Vec<_>>(),
            "Picks tiered"
        );
        allocation
    }

    /// Indices into `ranked` for one band, plus how many were borrowed
    fn claim(
        ranked: &[Pick],
        claimed: &HashSet<Uuid>,
        band: &TierBand,
        upper: f64,
    ) -> (Vec<usize>, usize) {
        let cap = band.max_count.unwrap_or(usize::MAX);
        let unclaimed = |p: &Pick| !claimed.contains(&p.id);

        let mut taken: Vec<usize> = ranked
            .iter()
            .enumerate()
            .filter(|(_, p)| unclaimed(p))
            .filter(|(_, p)| p.composite_score >= band.min_score && p.composite_score < upper)
            .map(|(i, _)| i)
            .take(cap)
            .collect();

        let wanted = band.min_count.min(cap);
        let mut borrowed = 0;
        if taken.len() < wanted {
            let need = wanted - taken.len();
            let extra: Vec<usize> = ranked
                .iter()
                .enumerate()
                .filter(|(_, p)| unclaimed(p))
                .filter(|(_, p)| p.composite_score < band.min_score)
                .map(|(i, _)| i)
                .take(need)
                .collect();
            borrowed = extra.len();
            taken.extend(extra);
        }
        (taken, borrowed)
    }
}
