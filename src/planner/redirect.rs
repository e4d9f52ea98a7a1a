// src/planner/redirect.rs

//! Redirect following
//!
//! A redirect trove points at zero or more (name, branch, flavor) targets.
//! Targets are resolved to the newest matching trove on their branch and
//! followed until real troves are reached. A redirect to nothing resolves
//! to an empty list, which callers treat as an erasure.

use crate::error::{Error, Result};
use crate::source::{FindOptions, TroveSource, TroveSpec};
use crate::trove::Identity;
use tracing::debug;

/// Maximum redirect depth to prevent runaway chains
const MAX_DEPTH: usize = 10;

/// Follow redirects starting at `start`
///
/// Returns the final non-redirect troves. `start` itself is returned when
/// it is not a redirect.
pub fn follow_redirects(source: &dyn TroveSource, start: &Identity) -> Result<Vec<Identity>> {
    let mut chain = vec![start.clone()];
    let mut targets = Vec::new();
    follow(source, &mut chain, &mut targets)?;

    if targets.len() != 1 || &targets[0] != start {
        debug!(
            "{} redirects to [{}]",
            start,
            targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(targets)
}

fn follow(source: &dyn TroveSource, chain: &mut Vec<Identity>, out: &mut Vec<Identity>) -> Result<()> {
    let Some(current) = chain.last().cloned() else {
        return Ok(());
    };
    let trove = source.get_trove(&current, false)?;
    if !trove.is_redirect() {
        if !out.contains(&current) {
            out.push(current);
        }
        return Ok(());
    }

    for target in &trove.redirects {
        let flavor = target.flavor.clone().unwrap_or_else(|| current.flavor.clone());
        let spec = TroveSpec::new(target.name.clone())
            .on_branch(target.branch.clone())
            .with_flavor(flavor);
        let found = source.find_troves(
            std::slice::from_ref(&spec),
            FindOptions {
                use_affinity: true,
                exact_flavors: false,
            },
        )?;
        let Some(next) = found.get(&spec).and_then(|ids| ids.iter().max()).cloned() else {
            return Err(Error::NotFound(format!(
                "redirect target {} of {}",
                spec, current
            )));
        };

        // Detect circular redirect
        if chain.contains(&next) || chain.len() >= MAX_DEPTH {
            let mut looped = chain.clone();
            looped.push(next);
            return Err(Error::RedirectLoop { chain: looped });
        }

        chain.push(next);
        follow(source, chain, out)?;
        chain.pop();
    }
    Ok(())
}
