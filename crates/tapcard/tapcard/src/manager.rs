//! Caller-facing entry point
//!
//! Every operation acquires the reader, loads the card environment, runs one
//! task inside a fresh session and resolves to exactly one terminal result.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tapcard_apdu_core::CardTransport;
use tracing::{info, instrument, warn};

use crate::{
    commands::{
        CreateWalletResponse, PurgeWalletResponse, ReadIssuerDataResponse, SignResponse,
        WriteIssuerDataResponse,
    },
    environment::EnvironmentRepository,
    error::{Result, TaskError},
    session::{CancelToken, CardReader, CardSession, SessionConfig, SessionDelegate, TracingDelegate},
    tasks::{
        CreateWalletTask, IssuerExtraData, PurgeWalletTask, ReadIssuerDataTask,
        ReadIssuerExtraDataTask, ScanOutcome, ScanTask, SignTask, Task, WalletVerification,
        WriteIssuerDataTask, WriteIssuerExtraDataTask,
    },
    types::CardId,
};

/// Runs card tasks on one reader
pub struct CardManager<T: CardTransport + 'static> {
    reader: CardReader<T>,
    repository: Arc<dyn EnvironmentRepository>,
    config: SessionConfig,
    delegate: Arc<dyn SessionDelegate>,
    active: Mutex<Option<CancelToken>>,
}

impl<T: CardTransport + 'static> std::fmt::Debug for CardManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardManager")
            .field("reader", &self.reader)
            .field("config", &self.config)
            .field("busy", &self.reader.is_busy())
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport + 'static> CardManager<T> {
    /// Manager owning `transport`
    pub fn new(transport: T, repository: Arc<dyn EnvironmentRepository>) -> Self {
        Self::with_reader(CardReader::new(transport), repository)
    }

    /// Manager sharing an existing reader handle
    pub fn with_reader(reader: CardReader<T>, repository: Arc<dyn EnvironmentRepository>) -> Self {
        Self {
            reader,
            repository,
            config: SessionConfig::default(),
            delegate: Arc::new(TracingDelegate),
            active: Mutex::new(None),
        }
    }

    /// Use another session configuration
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use another delegate
    pub fn with_delegate(mut self, delegate: Arc<dyn SessionDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    /// Reader handle shared by this manager
    pub const fn reader(&self) -> &CardReader<T> {
        &self.reader
    }

    /// Cancel the running task, if any
    ///
    /// The task ends with `Cancelled` at its next exchange or delay wait.
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().as_ref() {
            info!("Cancelling running task");
            token.cancel();
        }
    }

    /// Run `task` in a new session
    ///
    /// `card_id` pins the session to one card; a different card in the field
    /// fails with `WrongCard`.
    #[instrument(skip_all, fields(task = task.name()))]
    pub async fn run<K: Task>(&self, card_id: Option<&CardId>, task: K) -> Result<K::Output> {
        let transport = self.reader.try_acquire()?;
        let environment = self.repository.load(card_id);
        let cancel = CancelToken::new();
        *self.active.lock() = Some(cancel.clone());

        let mut session = CardSession::new(
            transport,
            environment,
            self.config.clone(),
            Arc::clone(&self.delegate),
            cancel,
        );
        let started = session.start().await.map(|_| ());
        let result = match started {
            Ok(()) => task.run(&mut session).await,
            Err(e) => Err(e),
        };
        session.finish(result.is_ok()).await;

        if session.environment_changed() {
            if let Some(card_id) = session.environment().card_id() {
                if let Err(e) = self.repository.save(card_id, session.environment()) {
                    warn!(error = %e, "Failed to save card environment");
                }
            }
        }
        self.active.lock().take();
        drop(session);

        match &result {
            Ok(_) => info!("Task completed"),
            Err(e) => warn!(error = %e, retryable = e.is_retryable(), "Task failed"),
        }
        result
    }

    /// Read the card and verify its wallet key
    pub async fn scan(&self) -> Result<ScanOutcome> {
        self.run(None, ScanTask::default()).await
    }

    /// Sign 1..=10 equal-length hashes
    pub async fn sign(&self, card_id: Option<&CardId>, hashes: Vec<Bytes>) -> Result<SignResponse> {
        let task = SignTask::new(hashes).map_err(|e| TaskError::command("sign", e))?;
        self.run(card_id, task).await
    }

    /// Create the wallet key on an empty card
    pub async fn create_wallet(
        &self,
        card_id: Option<&CardId>,
    ) -> Result<(CreateWalletResponse, WalletVerification)> {
        self.run(card_id, CreateWalletTask::default()).await
    }

    /// Destroy the wallet key
    pub async fn purge_wallet(&self, card_id: Option<&CardId>) -> Result<PurgeWalletResponse> {
        self.run(card_id, PurgeWalletTask).await
    }

    /// Read and verify the issuer data
    pub async fn read_issuer_data(
        &self,
        card_id: Option<&CardId>,
    ) -> Result<ReadIssuerDataResponse> {
        self.run(card_id, ReadIssuerDataTask).await
    }

    /// Replace the issuer data
    pub async fn write_issuer_data(
        &self,
        card_id: Option<&CardId>,
        data: Bytes,
        signature: Bytes,
        counter: Option<u32>,
    ) -> Result<WriteIssuerDataResponse> {
        self.run(card_id, WriteIssuerDataTask::new(data, signature, counter))
            .await
    }

    /// Read and verify the issuer extra data
    pub async fn read_issuer_extra_data(
        &self,
        card_id: Option<&CardId>,
    ) -> Result<IssuerExtraData> {
        self.run(card_id, ReadIssuerExtraDataTask).await
    }

    /// Write the issuer extra data in chunks
    pub async fn write_issuer_extra_data(
        &self,
        card_id: Option<&CardId>,
        data: Bytes,
        starting_signature: Bytes,
        finalizing_signature: Bytes,
        counter: Option<u32>,
    ) -> Result<WriteIssuerDataResponse> {
        let task =
            WriteIssuerExtraDataTask::new(data, starting_signature, finalizing_signature, counter);
        self.run(card_id, task).await
    }
}
