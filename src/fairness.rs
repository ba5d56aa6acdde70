//! Provably fair outcome generation.
//!
//! Every draw is a VRF over an input message that binds the round id, game
//! kind, player id, player-supplied client seed, and a per-account nonce.
//! The house cannot choose the outcome (it is fixed by the signature) and the
//! player cannot predict it (the secret key never leaves the server). The
//! proof tuple is persisted with each session so any third party can
//! re-verify the draw after the fact.

use crate::errors::FairnessError;
use crate::games::types::GameKind;
use schnorrkel::{context::SigningContext, Keypair, PublicKey, Signature};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const SIGNING_CONTEXT: &[u8] = b"stakehouse";

/// Crash points are clamped to at least this value.
pub const CRASH_POINT_MIN: f64 = 1.01;

/// Upper bound of the crash point distribution (2^10).
pub const CRASH_POINT_MAX: f64 = 1024.0;

/// Proof tuple recorded with every session for post-hoc verification.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FairnessProof {
    /// Hex-encoded VRF output (32 bytes).
    pub vrf_output: String,
    /// Hex-encoded VRF proof (64 bytes for schnorrkel).
    pub vrf_proof: String,
    /// Hex-encoded house public key (32 bytes).
    pub public_key: String,
    /// Input message used for the VRF.
    pub input_message: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// A completed draw: the raw digest outcomes are mapped from, plus its proof.
#[derive(Debug, Clone)]
pub struct Draw {
    pub digest: [u8; 32],
    pub proof: FairnessProof,
}

/// VRF-based outcome generator holding the house keypair.
pub struct FairnessEngine {
    keypair: Arc<Keypair>,
}

impl FairnessEngine {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Create an engine with a fresh random keypair.
    pub fn new_random() -> Self {
        use rand_core::OsRng;
        let keypair = Keypair::generate_with(OsRng);
        Self::new(keypair)
    }

    /// Build the canonical input message for a draw.
    pub fn input_message(
        game_id: &str,
        kind: GameKind,
        player_id: &str,
        client_seed: &str,
        nonce: u64,
    ) -> String {
        format!("{}:{}:{}:{}:{}", game_id, kind, player_id, client_seed, nonce)
    }

    /// Produce a provably fair draw for one round.
    pub fn draw(
        &self,
        game_id: &str,
        kind: GameKind,
        player_id: &str,
        client_seed: &str,
        nonce: u64,
    ) -> Result<Draw, FairnessError> {
        let input_message = Self::input_message(game_id, kind, player_id, client_seed, nonce);

        let ctx = SigningContext::new(SIGNING_CONTEXT);
        let signature = self.keypair.sign(ctx.bytes(input_message.as_bytes()));

        // The digest is the hash of the signature: deterministic given the
        // key and message, unpredictable without the secret key.
        let mut hasher = Sha256::new();
        hasher.update(signature.to_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        Ok(Draw {
            digest,
            proof: FairnessProof {
                vrf_output: hex::encode(digest),
                vrf_proof: hex::encode(signature.to_bytes()),
                public_key: hex::encode(self.keypair.public.to_bytes()),
                input_message,
                client_seed: client_seed.to_string(),
                nonce,
            },
        })
    }

    /// Verify a proof tuple against its recorded input message.
    ///
    /// Pure function: requires no engine state, so anyone holding the tuple
    /// can run it.
    pub fn verify_proof(proof: &FairnessProof) -> Result<bool, FairnessError> {
        let vrf_output = hex::decode(&proof.vrf_output)
            .map_err(|e| FairnessError::Malformed(format!("vrf_output: {}", e)))?;
        let vrf_proof = hex::decode(&proof.vrf_proof)
            .map_err(|e| FairnessError::Malformed(format!("vrf_proof: {}", e)))?;
        let public_key_bytes = hex::decode(&proof.public_key)
            .map_err(|e| FairnessError::Malformed(format!("public_key: {}", e)))?;

        let public_key_array: [u8; 32] = public_key_bytes
            .try_into()
            .map_err(|_| FairnessError::Malformed("public key must be 32 bytes".to_string()))?;
        let public_key = PublicKey::from_bytes(&public_key_array)
            .map_err(|e| FairnessError::Verification(format!("invalid public key: {:?}", e)))?;

        let signature_array: [u8; 64] = vrf_proof
            .try_into()
            .map_err(|_| FairnessError::Malformed("signature must be 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&signature_array)
            .map_err(|e| FairnessError::Verification(format!("invalid signature: {:?}", e)))?;

        let ctx = SigningContext::new(SIGNING_CONTEXT);
        if public_key
            .verify(ctx.bytes(proof.input_message.as_bytes()), &signature)
            .is_err()
        {
            return Ok(false);
        }

        // The digest must be derived from the signature, not supplied freely.
        let mut hasher = Sha256::new();
        hasher.update(signature_array);
        let computed = hasher.finalize();

        Ok(computed.as_slice() == vrf_output.as_slice())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }
}

fn window_u64(digest: &[u8; 32], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

/// Map a digest to a dice roll in [0, 100].
pub fn dice_roll(digest: &[u8; 32]) -> Result<u8, FairnessError> {
    let roll = (window_u64(digest, 0) % 101) as u8;
    if roll > 100 {
        return Err(FairnessError::OutOfRange {
            kind: "dice roll",
            value: roll.to_string(),
        });
    }
    Ok(roll)
}

/// Map a digest to three independent reel indices.
///
/// Each reel reduces a disjoint 8-byte window so the reels stay independent.
pub fn reel_indices(digest: &[u8; 32], symbol_count: usize) -> Result<[usize; 3], FairnessError> {
    if symbol_count == 0 {
        return Err(FairnessError::OutOfRange {
            kind: "symbol count",
            value: "0".to_string(),
        });
    }
    let reels = [
        (window_u64(digest, 0) % symbol_count as u64) as usize,
        (window_u64(digest, 8) % symbol_count as u64) as usize,
        (window_u64(digest, 16) % symbol_count as u64) as usize,
    ];
    for &reel in &reels {
        if reel >= symbol_count {
            return Err(FairnessError::OutOfRange {
                kind: "reel index",
                value: reel.to_string(),
            });
        }
    }
    Ok(reels)
}

/// Map a digest to a crash point in [1.01, 1024.0], rounded to 2 decimals.
///
/// Same distribution as the storefront's original generator:
/// `max(1.01, 2^(r * 10))` with `r` uniform in [0, 1).
pub fn crash_point(digest: &[u8; 32]) -> Result<f64, FairnessError> {
    let r = window_u64(digest, 0) as f64 / (u64::MAX as f64 + 1.0);
    let point = 2f64.powf(r * 10.0).max(CRASH_POINT_MIN);
    let point = (point * 100.0).round() / 100.0;

    if !point.is_finite() || !(CRASH_POINT_MIN..=CRASH_POINT_MAX).contains(&point) {
        return Err(FairnessError::OutOfRange {
            kind: "crash point",
            value: point.to_string(),
        });
    }
    Ok(point)
}
