use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::IdentityError;
use crate::identity::fingerprint::{decorate, Identity};
use crate::identity::geo::GeoResolver;
use crate::identity::ledger::ProxyLedger;
use crate::identity::sources::{ProxyCandidate, ProxySource};
use crate::identity::validate::ProxyValidator;

/// Sources, validates, and rotates outbound identities. Every successful
/// acquisition is exclusive: acquisitions are serialized, so the select,
/// validate, and mark-used steps (and the ledger writes behind them) cannot
/// interleave and hand the same proxy to two concurrent fetch attempts.
pub struct IdentityManager {
    sources: Vec<Box<dyn ProxySource>>,
    validator: Box<dyn ProxyValidator>,
    geo: GeoResolver,
    ledger: ProxyLedger,
    /// Serializes acquire calls end to end
    acquiring: Mutex<()>,
    /// Random candidates validated per pool before one is blacklisted
    candidate_attempts: u32,
    /// Pool rebuild rounds before reporting exhaustion
    pool_rebuilds: u32,
}

impl IdentityManager {
    pub fn new(
        sources: Vec<Box<dyn ProxySource>>,
        validator: Box<dyn ProxyValidator>,
        geo: GeoResolver,
        ledger: ProxyLedger,
        candidate_attempts: u32,
        pool_rebuilds: u32,
    ) -> Self {
        Self {
            sources,
            validator,
            geo,
            ledger,
            acquiring: Mutex::new(()),
            candidate_attempts: candidate_attempts.max(1),
            pool_rebuilds: pool_rebuilds.max(1),
        }
    }

    /// Acquire one validated, decorated identity.
    ///
    /// Bounded-loop rendition of retry-by-reselection: each round merges and
    /// shuffles the sources, filters the ledgers, and validates up to
    /// `candidate_attempts` random candidates; a fully failed round
    /// blacklists its last candidate before the pool is rebuilt.
    pub async fn acquire(&self) -> Result<Identity, IdentityError> {
        // One acquisition at a time: a later caller must see this one's
        // used-ledger entry before it builds its own pool.
        let _guard = self.acquiring.lock().await;

        for round in 0..self.pool_rebuilds {
            let pool = self.build_pool().await?;
            if pool.is_empty() {
                warn!("No proxies left after ledger filtering");
                return Err(IdentityError::NoIdentityAvailable);
            }

            debug!(
                "Identity round {}: {} candidates after filtering",
                round + 1,
                pool.len()
            );

            let mut last_tried: Option<ProxyCandidate> = None;
            for _ in 0..self.candidate_attempts {
                let candidate = {
                    let mut rng = rand::thread_rng();
                    pool[rng.gen_range(0..pool.len())].clone()
                };

                debug!("Testing proxy {}", candidate.key());
                if self.validator.validate(&candidate).await {
                    let geolocation = self.geo.resolve(&candidate.address).await;
                    self.ledger.mark_used(&candidate)?;
                    info!("Acquired identity {}", candidate.key());
                    return Ok(decorate(candidate, geolocation));
                }

                last_tried = Some(candidate);
            }

            if let Some(candidate) = last_tried {
                warn!(
                    "No candidate validated this round; blacklisting {}",
                    candidate.key()
                );
                self.ledger.mark_invalid(&candidate)?;
            }
        }

        Err(IdentityError::NoIdentityAvailable)
    }

    /// Merge all sources, dedup, drop ledger-excluded candidates, shuffle.
    /// Individual source failures are tolerated as long as one source
    /// delivers.
    async fn build_pool(&self) -> Result<Vec<ProxyCandidate>, IdentityError> {
        let mut merged: Vec<ProxyCandidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut any_source_ok = false;

        for source in &self.sources {
            match source.fetch().await {
                Ok(candidates) => {
                    any_source_ok = true;
                    for candidate in candidates {
                        if seen.insert(candidate.key()) {
                            merged.push(candidate);
                        }
                    }
                }
                Err(e) => warn!("Proxy source {} failed: {}", source.name(), e),
            }
        }

        if !any_source_ok {
            return Err(IdentityError::NoIdentityAvailable);
        }

        let invalid = self.ledger.load_invalid()?;
        let used = self.ledger.load_used()?;
        merged.retain(|candidate| !self.ledger.is_excluded(candidate, &invalid, &used));

        {
            let mut rng = rand::thread_rng();
            merged.shuffle(&mut rng);
        }

        Ok(merged)
    }
}
