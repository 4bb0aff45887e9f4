// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tt_core::OpId;

/// Generate an operation ID from target path, enqueue time and a nonce.
/// Format: op-{hash} where hash is first 8 hex chars of SHA256(path + timestamp + nonce)
pub fn generate_op_id(target_path: &str, enqueued_at: &DateTime<Utc>, nonce: u64) -> String {
    let input = format!("{}{}{}", target_path, enqueued_at.to_rfc3339(), nonce);
    let hash = Sha256::digest(input.as_bytes());
    let short_hash = hex::encode(&hash[..4]);
    format!("op-{}", short_hash)
}

/// Generate a unique operation ID, handling collisions by appending an incrementing suffix.
pub fn generate_unique_op_id<F>(
    target_path: &str,
    enqueued_at: &DateTime<Utc>,
    nonce: u64,
    exists: F,
) -> OpId
where
    F: Fn(&str) -> bool,
{
    let base_id = generate_op_id(target_path, enqueued_at, nonce);

    if !exists(&base_id) {
        return OpId::new(base_id);
    }

    let mut suffix = 2;
    loop {
        let id = format!("{}-{}", base_id, suffix);
        if !exists(&id) {
            return OpId::new(id);
        }
        suffix += 1;
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
