//! Deterministic sampling of (transmitter, reflector, receiver) link triples.

use std::collections::HashSet;

use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::settings::LINK_ATTEMPT_FACTOR;

/// A sampled link: transmitter and receiver transceiver indices (always
/// distinct) and the reflecting-element index routing between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDefinition {
    pub tx: usize,
    pub rx: usize,
    pub reflector: usize,
    pub name: String,
}

/// Sampling request for the generator.
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub transceivers: usize,
    pub reflectors: usize,
    pub count: usize,
    pub seed: Option<u64>,
    /// Reject triples reusing a (tx, reflector) or (reflector, rx) segment,
    /// and exact triple repeats.
    pub unique_segments: bool,
}

/// Draws link triples until `count` are accepted or the attempt cap is hit.
///
/// Under-delivery is a warning, not an error: callers must tolerate a
/// shorter-than-requested list. A fixed seed makes the output sequence
/// fully deterministic.
pub fn generate_links(request: &LinkRequest) -> Result<Vec<LinkDefinition>> {
    if request.transceivers < 2 {
        bail!(
            "link generation requires at least 2 transceivers, got {}",
            request.transceivers
        );
    }
    if request.reflectors == 0 {
        bail!("link generation requires at least 1 reflector");
    }

    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut links: Vec<LinkDefinition> = Vec::with_capacity(request.count);
    let mut triples: HashSet<(usize, usize, usize)> = HashSet::new();
    let mut up_segments: HashSet<(usize, usize)> = HashSet::new();
    let mut down_segments: HashSet<(usize, usize)> = HashSet::new();

    let max_attempts = LINK_ATTEMPT_FACTOR * request.count;
    let mut attempts = 0;

    while links.len() < request.count && attempts < max_attempts {
        attempts += 1;

        let tx = rng.random_range(0..request.transceivers);
        let rx = rng.random_range(0..request.transceivers);
        if tx == rx {
            continue;
        }
        let reflector = rng.random_range(0..request.reflectors);

        if request.unique_segments {
            if triples.contains(&(tx, rx, reflector))
                || up_segments.contains(&(tx, reflector))
                || down_segments.contains(&(reflector, rx))
            {
                continue;
            }
            triples.insert((tx, rx, reflector));
            up_segments.insert((tx, reflector));
            down_segments.insert((reflector, rx));
        }

        let name = format!("t{}_p{}_t{}", tx, reflector, rx);
        links.push(LinkDefinition {
            tx,
            rx,
            reflector,
            name,
        });
    }

    if links.len() < request.count {
        eprintln!(
            "Warning: generated {} of {} requested links after {} attempts",
            links.len(),
            request.count,
            attempts
        );
    }

    Ok(links)
}
