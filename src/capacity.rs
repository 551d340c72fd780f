// This file is part of Moraine.
//
// Copyright (C) 2025 Moraine Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use serde::Serialize;

use crate::client::ResourceClient;
use crate::constants;
use crate::error::{Error, Result};
use crate::types::ResourceId;

/// Encoded size of an empty JSON list, `[]`.
const EMPTY_LIST_BYTES: u64 = 2;

/// Verdict of a pre-write capacity check. Both byte figures are reported
/// even when the check passes, so callers can log headroom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityCheck {
    pub can_create: bool,
    pub required_bytes: u64,
    pub available_bytes: u64,
    pub message: Option<String>,
}

impl CapacityCheck {
    fn rejected(message: String) -> Self {
        Self {
            can_create: false,
            required_bytes: 0,
            available_bytes: 0,
            message: Some(message),
        }
    }
}

/// Overhead knobs for capacity estimation.
///
/// The defaults are tuned values, not protocol guarantees; deployments
/// measuring different wrapping costs should adjust them.
#[derive(Debug, Clone)]
pub struct CapacityConfig {
    /// Access-control wrapping overhead applied on publish, in percent.
    pub act_overhead_percent: u64,
    /// Final safety margin absorbing encoding variance, in percent.
    pub safety_margin_percent: u64,
    /// Fixed pointer envelope: one reference pair, one feed index, one topic
    /// address. Charged per publish regardless of list size.
    pub envelope_bytes: u64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            act_overhead_percent: constants::ACT_OVERHEAD_PERCENT,
            safety_margin_percent: constants::SAFETY_MARGIN_PERCENT,
            envelope_bytes: constants::WRAPPED_REFERENCE_BYTES
                + constants::FEED_INDEX_BYTES
                + constants::TOPIC_BYTES,
        }
    }
}

/// Estimates whether `resource` can absorb growing `list` to `target_count`
/// entries, and reports the figures either way.
///
/// A missing or unusable resource fast-fails with zero byte figures and a
/// descriptive message; no size computation is attempted. Otherwise the
/// current list is serialized to measure it, scaled linearly toward the
/// target count, and inflated by the configured overheads.
///
/// No side effects: safe to call speculatively and repeatedly.
pub fn check_capacity<C, T>(
    client: &C,
    resource: ResourceId,
    list: &[T],
    target_count: usize,
    config: &CapacityConfig,
) -> Result<CapacityCheck>
where
    C: ResourceClient,
    T: Serialize,
{
    let Some(status) = client.resource_status(resource)? else {
        return Ok(CapacityCheck::rejected(format!(
            "resource {resource} not found"
        )));
    };
    if !status.usable {
        return Ok(CapacityCheck::rejected(format!(
            "resource {resource} is not usable"
        )));
    }

    let encoded = serde_json::to_vec(list).map_err(|e| Error::Serialization(e.to_string()))?;
    let current_size = encoded.len() as u64;
    let current_count = list.len() as u64;
    let target = target_count as u64;

    let estimated = if target == 0 {
        EMPTY_LIST_BYTES
    } else if current_count > 0 && target > current_count {
        scale(current_size, target, current_count)
    } else {
        current_size
    };

    let with_act = add_percent(estimated, config.act_overhead_percent);
    let with_envelope = with_act.saturating_add(config.envelope_bytes);
    let required_bytes = add_percent(with_envelope, config.safety_margin_percent);

    let available_bytes = status.remaining_bytes;
    let can_create = available_bytes >= required_bytes;
    let message = (!can_create).then(|| {
        format!(
            "insufficient capacity on {resource}: {required_bytes} bytes required, \
             {available_bytes} available"
        )
    });

    Ok(CapacityCheck {
        can_create,
        required_bytes,
        available_bytes,
        message,
    })
}

/// `ceil(size * target / count)` without intermediate overflow.
fn scale(size: u64, target: u64, count: u64) -> u64 {
    let scaled = (size as u128 * target as u128).div_ceil(count as u128);
    clamp(scaled)
}

/// `ceil(value * (100 + percent) / 100)` without intermediate overflow.
fn add_percent(value: u64, percent: u64) -> u64 {
    let raised = (value as u128 * (100 + percent as u128)).div_ceil(100);
    clamp(raised)
}

fn clamp(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
