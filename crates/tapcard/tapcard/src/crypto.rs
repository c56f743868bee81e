use bytes::{BufMut, Bytes, BytesMut};
use k256::{PublicKey, ecdh::EphemeralSecret, elliptic_curve::sec1::ToEncodedPoint};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{environment::SessionKey, types::EllipticCurve};

/// Length of the CheckWallet challenge
pub const CHALLENGE_LEN: usize = 16;

/// Verify `signature` over `message` with a wallet or issuer key.
///
/// ECDSA curves hash the message with SHA-256; secp256k1 signatures are
/// normalized to low-S first. Keys or signatures that cannot be parsed
/// verify as `false`.
pub fn verify(curve: EllipticCurve, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    match curve {
        EllipticCurve::Secp256k1 => verify_secp256k1(public_key, message, signature),
        EllipticCurve::Secp256r1 => verify_secp256r1(public_key, message, signature),
        EllipticCurve::Ed25519 => verify_ed25519(public_key, message, signature),
    }
}

fn verify_secp256k1(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    use k256::ecdsa::{Signature, VerifyingKey, signature::Verifier};

    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    let signature = signature.normalize_s().unwrap_or(signature);
    key.verify(message, &signature).is_ok()
}

fn verify_secp256r1(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    use p256::ecdsa::{Signature, VerifyingKey, signature::Verifier};

    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let Ok(key_bytes) = <&[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

/// Message covered by issuer data signatures and extra data finalizing
/// signatures: `card_id || data || counter?`
pub fn issuer_data_message(card_id: &[u8], data: &[u8], counter: Option<u32>) -> Bytes {
    let mut buf = BytesMut::with_capacity(card_id.len() + data.len() + 4);
    buf.put_slice(card_id);
    buf.put_slice(data);
    if let Some(counter) = counter {
        buf.put_u32(counter);
    }
    buf.freeze()
}

/// Message covered by the extra data starting signature:
/// `card_id || counter? || size`
pub fn issuer_extra_data_start_message(card_id: &[u8], counter: Option<u32>, size: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(card_id.len() + 6);
    buf.put_slice(card_id);
    if let Some(counter) = counter {
        buf.put_u32(counter);
    }
    buf.put_u16(size);
    buf.freeze()
}

/// Fresh random CheckWallet challenge
pub(crate) fn generate_challenge() -> [u8; CHALLENGE_LEN] {
    let mut challenge = [0u8; CHALLENGE_LEN];
    rand::rng().fill_bytes(&mut challenge);
    challenge
}

/// Ephemeral key pair for the OpenSession exchange
pub(crate) fn generate_ephemeral() -> EphemeralSecret {
    EphemeralSecret::random(&mut rand_v8::thread_rng())
}

/// Uncompressed SEC1 encoding of a public key
pub(crate) fn encode_public_key(key: &PublicKey) -> Bytes {
    Bytes::copy_from_slice(key.to_encoded_point(false).as_bytes())
}

/// Session key from an ECDH exchange: SHA-256 of the shared x-coordinate
pub(crate) fn derive_session_key(secret: &EphemeralSecret, peer: &PublicKey) -> SessionKey {
    let shared = secret.diffie_hellman(peer);
    SessionKey::new(Sha256::digest(shared.raw_secret_bytes()).into())
}
