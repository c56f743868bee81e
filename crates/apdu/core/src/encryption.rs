//! Payload encryption for negotiated sessions
//!
//! The plaintext is framed as `len (u16 BE) || crc16 (u16 BE) || payload`,
//! padded with PKCS#7 and encrypted with AES-256-CBC under a zero IV. The
//! inner checksum catches a wrong key as well as corruption.

use aes::Aes256;
use bytes::{BufMut, Bytes, BytesMut};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use derive_more::Display;

use crate::{checksum::crc16, response::FrameError};

type Encryptor = cbc::Encryptor<Aes256>;
type Decryptor = cbc::Decryptor<Aes256>;

/// Raw AES-256 session key
pub type SessionKeyBytes = [u8; 32];

const ZERO_IV: [u8; 16] = [0; 16];
const HEADER_LEN: usize = 4;

/// Payload encryption mode, carried in P1 of every command
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EncryptionMode {
    /// Plaintext payloads
    #[default]
    #[display("none")]
    None,
    /// Key derived from a pre-shared secret
    #[display("fast")]
    Fast,
    /// Key derived through an ECDH exchange
    #[display("strong")]
    Strong,
}

impl EncryptionMode {
    /// P1 value for this mode
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Fast => 0x01,
            Self::Strong => 0x02,
        }
    }

    /// Mode announced by a P1 byte
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Fast),
            0x02 => Some(Self::Strong),
            _ => None,
        }
    }
}

/// Encrypt `payload` under `key`
pub fn encrypt(key: &SessionKeyBytes, payload: &[u8]) -> Result<Bytes, FrameError> {
    let length = u16::try_from(payload.len())
        .map_err(|_| FrameError::Encryption("payload longer than 65535 bytes"))?;

    let mut plaintext = BytesMut::with_capacity(HEADER_LEN + payload.len());
    plaintext.put_u16(length);
    plaintext.put_u16(crc16(payload));
    plaintext.put_slice(payload);

    let ciphertext = Encryptor::new_from_slices(key, &ZERO_IV)
        .map_err(|_| FrameError::Encryption("invalid key length"))?
        .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);
    Ok(Bytes::from(ciphertext))
}

/// Decrypt and check a payload produced by [`encrypt`]
pub fn decrypt(key: &SessionKeyBytes, ciphertext: &[u8]) -> Result<Bytes, FrameError> {
    let plaintext = Decryptor::new_from_slices(key, &ZERO_IV)
        .map_err(|_| FrameError::Encryption("invalid key length"))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| FrameError::Encryption("bad padding"))?;

    if plaintext.len() < HEADER_LEN {
        return Err(FrameError::Encryption("decrypted payload too short"));
    }
    let length = u16::from_be_bytes([plaintext[0], plaintext[1]]) as usize;
    let expected = u16::from_be_bytes([plaintext[2], plaintext[3]]);
    let payload = &plaintext[HEADER_LEN..];
    if payload.len() != length {
        return Err(FrameError::Encryption("decrypted length mismatch"));
    }

    let actual = crc16(payload);
    if actual != expected {
        return Err(FrameError::Checksum { expected, actual });
    }
    Ok(Bytes::copy_from_slice(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: SessionKeyBytes = [0x42; 32];

    #[test]
    fn test_block_aligned_output() {
        let ciphertext = encrypt(&KEY, &[0x10, 0x02, 0xAB, 0xCD]).unwrap();
        assert_eq!(ciphertext.len() % 16, 0);
        assert_eq!(decrypt(&KEY, &ciphertext).unwrap().as_ref(), &[0x10, 0x02, 0xAB, 0xCD]);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let ciphertext = encrypt(&KEY, b"issuer data").unwrap();
        let other = [0x24; 32];
        assert!(decrypt(&other, &ciphertext).is_err());
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(EncryptionMode::Strong.code(), 0x02);
        assert_eq!(EncryptionMode::from_code(0x01), Some(EncryptionMode::Fast));
        assert_eq!(EncryptionMode::from_code(0x07), None);
        assert_eq!(EncryptionMode::default().to_string(), "none");
    }
}
