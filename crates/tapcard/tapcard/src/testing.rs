//! In-memory card for tests
//!
//! [`EmulatedCard`] implements [`CardTransport`] and answers frames the way
//! the firmware does, with a real secp256k1 wallet key. Tests keep a clone to
//! inject faults and inspect counters.
#![allow(unreachable_pub)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use k256::{
    PublicKey, SecretKey,
    ecdsa::{Signature, SigningKey, signature::Signer, signature::hazmat::PrehashSigner},
    elliptic_curve::sec1::ToEncodedPoint,
};
use parking_lot::{Mutex, MutexGuard};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tapcard_apdu_core::{
    CardTransport, CommandApdu, Instruction, ResponseApdu, SessionKeyBytes, StatusWord, Tag,
    TlvBuilder, TlvSet, TransportError, response::status::common::*,
};
use tokio::sync::Notify;

use crate::{
    commands::EXTRA_DATA_CHUNK_LEN,
    crypto::{encode_public_key, issuer_data_message, issuer_extra_data_start_message},
    environment::{DEFAULT_PIN1, DEFAULT_PIN2, Pin},
    types::{CardId, CardStatus, Setting, SettingsMask},
};

type Answer = Result<ResponseApdu, StatusWord>;

pub(crate) fn card_id() -> CardId {
    "CB79000000010142".parse().unwrap()
}

pub(crate) fn issuer_key() -> SigningKey {
    SigningKey::from_slice(&[0x77; 32]).unwrap()
}

pub(crate) fn issuer_public_key() -> Bytes {
    Bytes::copy_from_slice(
        issuer_key()
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes(),
    )
}

/// Issuer signature over `message`
pub(crate) fn issuer_sign(message: &[u8]) -> Bytes {
    let signature: Signature = issuer_key().sign(message);
    Bytes::copy_from_slice(&signature.to_bytes())
}

#[derive(Debug)]
struct PendingExtraData {
    size: usize,
    counter: Option<u32>,
    buffer: Vec<u8>,
}

/// Card contents, behaviour switches and counters
#[derive(Debug)]
pub(crate) struct CardState {
    pub card_id: CardId,
    pub status: CardStatus,
    pub settings: SettingsMask,
    pub wallet: Option<SigningKey>,
    pub wallets_created: u8,
    pub remaining_signatures: u32,
    pub signed_hashes: u32,
    pub pin1: Pin,
    pub pin2: Pin,

    pub issuer_data: Bytes,
    pub issuer_data_signature: Bytes,
    pub issuer_data_counter: Option<u32>,
    pub extra_data: Bytes,
    pub extra_data_signature: Bytes,
    pub extra_data_counter: Option<u32>,
    pending_extra: Option<PendingExtraData>,

    /// NeedPause answers before each Sign completes
    pub security_delay_polls: u32,
    /// Pause tag value in 10 ms units; `None` omits the tag
    pub pause_units: Option<u16>,
    delay_countdown: Option<u32>,
    pub pauses_sent: u32,
    /// Answer 6982 to everything but Read and OpenSession sent in plaintext
    pub require_encryption: bool,
    pub unsupported: Vec<Instruction>,
    pub checksum: bool,
    session_key: Option<SessionKeyBytes>,
    pub sessions_opened: u32,

    pub present: bool,
    pub fail_connect: Option<TransportError>,
    /// Report the card lost when this frame (1-based) is answered
    pub drop_link_at_frame: Option<u32>,
    /// Upcoming receives that fail with a timeout
    pub timeouts: u32,
    /// Upcoming receives that never answer
    pub stalls: u32,
    /// Upcoming responses with one bit flipped on the wire
    pub corrupt_frames: u32,
    /// Flip a byte of the extra data chunk served at this offset
    pub corrupt_extra_chunk_at: Option<u16>,
    /// Flip a bit of every CheckWallet signature
    pub corrupt_wallet_signature: bool,
    /// Leave CurveId out of the Read answer
    pub omit_curve: bool,
    /// Receives wait on this before answering
    pub gate: Option<Arc<Notify>>,

    pub connected: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub frames: u32,
    pub instructions: Vec<Instruction>,
    pending_response: Option<Bytes>,
}

impl CardState {
    fn new(status: CardStatus) -> Self {
        let card_id = card_id();
        let issuer_data = Bytes::from_static(b"issuer data v1");
        let issuer_data_signature =
            issuer_sign(&issuer_data_message(card_id.as_bytes(), &issuer_data, None));
        let mut state = Self {
            card_id,
            status,
            settings: SettingsMask::new(&[Setting::IsReusable, Setting::AllowUnencrypted]),
            wallet: None,
            wallets_created: 0,
            remaining_signatures: 1000,
            signed_hashes: 0,
            pin1: Pin::from_code(DEFAULT_PIN1),
            pin2: Pin::from_code(DEFAULT_PIN2),
            issuer_data,
            issuer_data_signature,
            issuer_data_counter: None,
            extra_data: Bytes::new(),
            extra_data_signature: Bytes::new(),
            extra_data_counter: None,
            pending_extra: None,
            security_delay_polls: 0,
            pause_units: Some(100),
            delay_countdown: None,
            pauses_sent: 0,
            require_encryption: false,
            unsupported: Vec::new(),
            checksum: false,
            session_key: None,
            sessions_opened: 0,
            present: true,
            fail_connect: None,
            drop_link_at_frame: None,
            timeouts: 0,
            stalls: 0,
            corrupt_frames: 0,
            corrupt_extra_chunk_at: None,
            corrupt_wallet_signature: false,
            omit_curve: false,
            gate: None,
            connected: false,
            connects: 0,
            disconnects: 0,
            frames: 0,
            instructions: Vec::new(),
            pending_response: None,
        };
        if status == CardStatus::Loaded {
            state.generate_wallet();
        }
        state
    }

    fn generate_wallet(&mut self) {
        self.wallets_created += 1;
        self.wallet = Some(SigningKey::from_slice(&[0x40 + self.wallets_created; 32]).unwrap());
    }

    pub fn wallet_public_key(&self) -> Option<Bytes> {
        self.wallet.as_ref().map(|key| {
            Bytes::copy_from_slice(key.verifying_key().to_encoded_point(false).as_bytes())
        })
    }

    /// Sign `data` as the issuer would and store it as extra data
    pub fn set_extra_data(&mut self, data: Bytes, counter: Option<u32>) {
        self.extra_data_signature =
            issuer_sign(&issuer_data_message(self.card_id.as_bytes(), &data, counter));
        self.extra_data = data;
        self.extra_data_counter = counter;
    }

    /// Answer one frame
    fn process(&mut self, frame: &[u8]) -> Bytes {
        let apdu = match CommandApdu::from_frame(frame, self.checksum) {
            Ok(apdu) => apdu,
            Err(_) => return ResponseApdu::new(Bytes::new(), SW_INVALID_PARAMS).to_frame(self.checksum),
        };
        self.instructions.push(apdu.instruction());

        let encrypted = apdu.p1() != 0 && apdu.instruction() != Instruction::OpenSession;
        let answer = self.dispatch(&apdu, encrypted);
        let response = answer.unwrap_or_else(|sw| ResponseApdu::new(Bytes::new(), sw));
        let response = match (encrypted, self.session_key) {
            (true, Some(key)) => response.encrypt(&key).unwrap(),
            _ => response,
        };
        response.to_frame(self.checksum)
    }

    fn dispatch(&mut self, apdu: &CommandApdu, encrypted: bool) -> Answer {
        let instruction = apdu.instruction();
        if self.unsupported.contains(&instruction) {
            return Err(SW_INS_NOT_SUPPORTED);
        }
        let apdu = if encrypted {
            let key = self.session_key.ok_or(SW_NEED_ENCRYPTION)?;
            apdu.decrypt(&key).map_err(|_| SW_INVALID_PARAMS)?
        } else {
            if self.require_encryption
                && !matches!(instruction, Instruction::Read | Instruction::OpenSession)
            {
                return Err(SW_NEED_ENCRYPTION);
            }
            apdu.clone()
        };
        let tlv = apdu.tlv().map_err(|_| SW_INVALID_PARAMS)?;

        match instruction {
            Instruction::OpenSession => self.open_session(&tlv),
            Instruction::Read => self.read(&tlv),
            Instruction::CreateWallet => self.create_wallet(&tlv),
            Instruction::PurgeWallet => self.purge_wallet(&tlv),
            Instruction::CheckWallet => self.check_wallet(&tlv),
            Instruction::Sign => self.sign(&tlv),
            Instruction::ReadIssuerData if tlv.contains(Tag::Mode) => self.read_extra(&tlv),
            Instruction::ReadIssuerData => self.read_issuer_data(&tlv),
            Instruction::WriteIssuerData if tlv.contains(Tag::Mode) => self.write_extra(&tlv),
            Instruction::WriteIssuerData => self.write_issuer_data(&tlv),
        }
    }

    fn authorize(&self, tlv: &TlvSet, pin2: bool) -> Result<(), StatusWord> {
        let pin: Bytes = tlv.value(Tag::Pin).map_err(|_| SW_INVALID_PARAMS)?;
        if pin.as_ref() != self.pin1.as_bytes() {
            return Err(SW_INVALID_PARAMS);
        }
        if tlv.contains(Tag::CardId) {
            let id: CardId = tlv.value(Tag::CardId).map_err(|_| SW_INVALID_PARAMS)?;
            if id != self.card_id {
                return Err(SW_INVALID_PARAMS);
            }
        }
        if pin2 {
            let pin2: Bytes = tlv.value(Tag::Pin2).map_err(|_| SW_INVALID_PARAMS)?;
            if pin2.as_ref() != self.pin2.as_bytes() {
                return Err(SW_INVALID_PARAMS);
            }
        }
        Ok(())
    }

    fn respond(builder: TlvBuilder) -> Answer {
        Ok(ResponseApdu::success(builder.serialize().unwrap()))
    }

    fn open_session(&mut self, tlv: &TlvSet) -> Answer {
        let host: Bytes = tlv.value(Tag::SessionKeyA).map_err(|_| SW_INVALID_PARAMS)?;
        let host = PublicKey::from_sec1_bytes(&host).map_err(|_| SW_INVALID_PARAMS)?;
        let secret = SecretKey::from_slice(&[0x42; 32]).unwrap();
        let shared = k256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), host.as_affine());
        self.session_key = Some(Sha256::digest(shared.raw_secret_bytes()).into());
        self.sessions_opened += 1;
        Self::respond(
            TlvBuilder::new().append(Tag::SessionKeyB, encode_public_key(&secret.public_key())),
        )
    }

    fn read(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, false)?;
        let card_data = TlvBuilder::new()
            .append(Tag::Batch, &[0x00u8, 0x17])
            .append(Tag::ManufactureDateTime, &[0x07u8, 0xE8, 0x05, 0x02])
            .append(Tag::IssuerName, "TAPCARD TEST ISSUER")
            .append(Tag::BlockchainName, "BTC")
            .serialize()
            .unwrap();
        let wallet_key = self.wallet_public_key();
        let builder = TlvBuilder::new()
            .append(Tag::CardId, &self.card_id)
            .append(Tag::ManufacturerName, "TAPCARD EMULATOR")
            .append(Tag::Status, self.status.code())
            .append(Tag::Firmware, "4.12r")
            .append(Tag::CardPublicKey, &[0x04u8; 65])
            .append(Tag::SettingsMask, self.settings.bits())
            .append(Tag::IssuerDataPublicKey, issuer_public_key())
            .append_optional(Tag::CurveId, (!self.omit_curve).then_some("secp256k1"))
            .append(Tag::MaxSignatures, 1000u32)
            .append(Tag::SigningMethod, 0u8)
            .append_optional(Tag::WalletPublicKey, wallet_key)
            .append(Tag::WalletRemainingSignatures, self.remaining_signatures)
            .append(Tag::WalletSignedHashes, self.signed_hashes)
            .append(Tag::Health, 0u8)
            .append(Tag::IsActivated, true)
            .append(Tag::Unknown(0xE1), &[0x77u8])
            .append(Tag::CardData, card_data);
        Self::respond(builder)
    }

    fn create_wallet(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, true)?;
        if self.status != CardStatus::Empty {
            return Err(SW_INVALID_STATE);
        }
        self.generate_wallet();
        self.status = CardStatus::Loaded;
        let key = self.wallet_public_key().unwrap();
        Self::respond(
            TlvBuilder::new()
                .append(Tag::CardId, &self.card_id)
                .append(Tag::Status, self.status.code())
                .append(Tag::WalletPublicKey, key),
        )
    }

    fn purge_wallet(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, true)?;
        if self.status != CardStatus::Loaded
            || self.settings.contains(Setting::ProhibitPurgeWallet)
        {
            return Err(SW_INVALID_STATE);
        }
        self.wallet = None;
        self.status = if self.settings.contains(Setting::IsReusable) {
            CardStatus::Empty
        } else {
            CardStatus::Purged
        };
        Self::respond(
            TlvBuilder::new()
                .append(Tag::CardId, &self.card_id)
                .append(Tag::Status, self.status.code()),
        )
    }

    fn check_wallet(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, false)?;
        let wallet = self.wallet.as_ref().ok_or(SW_WALLET_NOT_FOUND)?;
        let challenge: Bytes = tlv.value(Tag::Challenge).map_err(|_| SW_INVALID_PARAMS)?;
        let mut salt = [0u8; 16];
        rand::rng().fill_bytes(&mut salt);
        let signature: Signature = wallet.sign(&[challenge.as_ref(), &salt].concat());
        let mut signature = signature.to_bytes().to_vec();
        if self.corrupt_wallet_signature {
            signature[40] ^= 0x80;
        }
        Self::respond(
            TlvBuilder::new()
                .append(Tag::CardId, &self.card_id)
                .append(Tag::Salt, &salt)
                .append(Tag::WalletSignature, signature),
        )
    }

    fn sign(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, true)?;
        let wallet = self.wallet.clone().ok_or(SW_INVALID_STATE)?;

        let countdown = *self.delay_countdown.get_or_insert(self.security_delay_polls);
        if countdown > 0 {
            self.delay_countdown = Some(countdown - 1);
            self.pauses_sent += 1;
            let payload = TlvBuilder::new()
                .append(Tag::CardId, &self.card_id)
                .append_optional(Tag::Pause, self.pause_units)
                .serialize()
                .unwrap();
            return Ok(ResponseApdu::new(payload, SW_NEED_PAUSE));
        }
        self.delay_countdown = None;

        let size: u8 = tlv
            .value(Tag::TransactionOutHashSize)
            .map_err(|_| SW_INVALID_PARAMS)?;
        let hashes: Bytes = tlv
            .value(Tag::TransactionOutHash)
            .map_err(|_| SW_INVALID_PARAMS)?;
        if size == 0 || hashes.len() % usize::from(size) != 0 {
            return Err(SW_INVALID_PARAMS);
        }
        let mut signatures = Vec::with_capacity(hashes.len() / usize::from(size) * 64);
        for hash in hashes.chunks(usize::from(size)) {
            let signature: Signature = wallet.sign_prehash(hash).map_err(|_| SW_INVALID_PARAMS)?;
            signatures.extend_from_slice(&signature.to_bytes());
        }
        let count = (hashes.len() / usize::from(size)) as u32;
        self.remaining_signatures -= count;
        self.signed_hashes += count;
        Self::respond(
            TlvBuilder::new()
                .append(Tag::CardId, &self.card_id)
                .append(Tag::WalletSignature, signatures)
                .append(Tag::WalletRemainingSignatures, self.remaining_signatures)
                .append(Tag::WalletSignedHashes, self.signed_hashes),
        )
    }

    fn read_issuer_data(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, false)?;
        Self::respond(
            TlvBuilder::new()
                .append(Tag::CardId, &self.card_id)
                .append(Tag::IssuerData, &self.issuer_data)
                .append(Tag::IssuerDataSignature, &self.issuer_data_signature)
                .append_optional(Tag::IssuerDataCounter, self.issuer_data_counter),
        )
    }

    fn check_counter(&self, stored: Option<u32>, counter: Option<u32>) -> Result<(), StatusWord> {
        let protected = self
            .settings
            .contains(Setting::ProtectIssuerDataAgainstReplay);
        match (counter, stored) {
            (None, _) if protected => Err(SW_INVALID_PARAMS),
            (Some(new), Some(old)) if protected && new <= old => Err(SW_INVALID_PARAMS),
            _ => Ok(()),
        }
    }

    fn write_issuer_data(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, false)?;
        let data: Bytes = tlv.value(Tag::IssuerData).map_err(|_| SW_INVALID_PARAMS)?;
        let signature: Bytes = tlv
            .value(Tag::IssuerDataSignature)
            .map_err(|_| SW_INVALID_PARAMS)?;
        let counter: Option<u32> = tlv
            .optional(Tag::IssuerDataCounter)
            .map_err(|_| SW_INVALID_PARAMS)?;
        self.check_counter(self.issuer_data_counter, counter)?;
        let message = issuer_data_message(self.card_id.as_bytes(), &data, counter);
        if !crate::crypto::verify(
            crate::types::EllipticCurve::Secp256k1,
            &issuer_public_key(),
            &message,
            &signature,
        ) {
            return Err(SW_INVALID_PARAMS);
        }
        self.issuer_data = data;
        self.issuer_data_signature = signature;
        self.issuer_data_counter = counter;
        Self::respond(TlvBuilder::new().append(Tag::CardId, &self.card_id))
    }

    fn read_extra(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, false)?;
        let offset: u16 = tlv.value(Tag::Offset).map_err(|_| SW_INVALID_PARAMS)?;
        let start = usize::from(offset);
        if start > self.extra_data.len() {
            return Err(SW_INVALID_PARAMS);
        }
        let end = (start + EXTRA_DATA_CHUNK_LEN).min(self.extra_data.len());
        let mut chunk = self.extra_data[start..end].to_vec();
        if self.corrupt_extra_chunk_at == Some(offset) {
            if let Some(byte) = chunk.first_mut() {
                *byte ^= 0xFF;
            }
        }
        let last = end == self.extra_data.len();
        let builder = TlvBuilder::new()
            .append(Tag::CardId, &self.card_id)
            .append_optional(
                Tag::Size,
                (start == 0).then_some(self.extra_data.len() as u16),
            )
            .append(Tag::IssuerData, chunk);
        let builder = if last {
            builder
                .append(Tag::IssuerDataSignature, &self.extra_data_signature)
                .append_optional(Tag::IssuerDataCounter, self.extra_data_counter)
        } else {
            builder
        };
        Self::respond(builder)
    }

    fn write_extra(&mut self, tlv: &TlvSet) -> Answer {
        self.authorize(tlv, false)?;
        let mode: u8 = tlv.value(Tag::Mode).map_err(|_| SW_INVALID_PARAMS)?;
        match mode {
            1 => {
                let size: u16 = tlv.value(Tag::Size).map_err(|_| SW_INVALID_PARAMS)?;
                let signature: Bytes = tlv
                    .value(Tag::IssuerDataSignature)
                    .map_err(|_| SW_INVALID_PARAMS)?;
                let counter: Option<u32> = tlv
                    .optional(Tag::IssuerDataCounter)
                    .map_err(|_| SW_INVALID_PARAMS)?;
                self.check_counter(self.extra_data_counter, counter)?;
                let message =
                    issuer_extra_data_start_message(self.card_id.as_bytes(), counter, size);
                if !crate::crypto::verify(
                    crate::types::EllipticCurve::Secp256k1,
                    &issuer_public_key(),
                    &message,
                    &signature,
                ) {
                    return Err(SW_INVALID_PARAMS);
                }
                self.pending_extra = Some(PendingExtraData {
                    size: usize::from(size),
                    counter,
                    buffer: vec![0; usize::from(size)],
                });
            }
            2 => {
                let offset: u16 = tlv.value(Tag::Offset).map_err(|_| SW_INVALID_PARAMS)?;
                let data: Bytes = tlv.value(Tag::IssuerData).map_err(|_| SW_INVALID_PARAMS)?;
                let pending = self.pending_extra.as_mut().ok_or(SW_INVALID_STATE)?;
                let start = usize::from(offset);
                let end = start + data.len();
                if end > pending.size {
                    return Err(SW_INVALID_PARAMS);
                }
                pending.buffer[start..end].copy_from_slice(&data);
            }
            3 => {
                let signature: Bytes = tlv
                    .value(Tag::IssuerDataSignature)
                    .map_err(|_| SW_INVALID_PARAMS)?;
                let pending = self.pending_extra.take().ok_or(SW_INVALID_STATE)?;
                let message =
                    issuer_data_message(self.card_id.as_bytes(), &pending.buffer, pending.counter);
                if !crate::crypto::verify(
                    crate::types::EllipticCurve::Secp256k1,
                    &issuer_public_key(),
                    &message,
                    &signature,
                ) {
                    return Err(SW_INVALID_PARAMS);
                }
                self.extra_data = Bytes::from(pending.buffer);
                self.extra_data_signature = signature;
                self.extra_data_counter = pending.counter;
            }
            _ => return Err(SW_INVALID_PARAMS),
        }
        Self::respond(TlvBuilder::new().append(Tag::CardId, &self.card_id))
    }
}

/// Emulated card in the field of an emulated reader
#[derive(Debug, Clone)]
pub(crate) struct EmulatedCard {
    state: Arc<Mutex<CardState>>,
}

impl EmulatedCard {
    /// Card holding a wallet
    pub fn loaded() -> Self {
        Self::with_status(CardStatus::Loaded)
    }

    /// Card without a wallet
    pub fn empty() -> Self {
        Self::with_status(CardStatus::Empty)
    }

    fn with_status(status: CardStatus) -> Self {
        Self {
            state: Arc::new(Mutex::new(CardState::new(status))),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, CardState> {
        self.state.lock()
    }
}

#[async_trait]
impl CardTransport for EmulatedCard {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if let Some(error) = state.fail_connect.clone() {
            return Err(error);
        }
        if !state.present {
            return Err(TransportError::NotPresent);
        }
        state.connected = true;
        state.session_key = None;
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::NotPresent);
        }
        state.frames += 1;
        let response = state.process(frame);
        state.pending_response = Some(response);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        let gate = self.state.lock().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let stall = {
            let mut state = self.state.lock();
            if state.stalls > 0 {
                state.stalls -= 1;
                true
            } else {
                false
            }
        };
        if stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut state = self.state.lock();
        let response = state.pending_response.take();
        if state.drop_link_at_frame == Some(state.frames) {
            state.connected = false;
            return Err(TransportError::TagLost);
        }
        if state.timeouts > 0 {
            state.timeouts -= 1;
            return Err(TransportError::Timeout);
        }
        let mut response =
            response.ok_or_else(|| TransportError::Transmission("no response pending".into()))?;
        if state.corrupt_frames > 0 {
            state.corrupt_frames -= 1;
            let mut bytes = response.to_vec();
            bytes[0] ^= 0x01;
            response = Bytes::from(bytes);
        }
        Ok(response)
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.lock();
        state.disconnects += 1;
        state.connected = false;
        state.session_key = None;
    }

    fn is_present(&self) -> bool {
        self.state.lock().present
    }

    fn requires_checksum(&self) -> bool {
        self.state.lock().checksum
    }
}
