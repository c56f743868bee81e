//! JSON file remembering per-card session settings

use std::{collections::BTreeMap, fs, io, path::PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tapcard::{CardEnvironment, CardId, EnvironmentRepository, RepositoryError};
use tapcard_apdu_core::EncryptionMode;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSettings {
    encryption_mode: u8,
    legacy_mode: bool,
}

/// Repository backed by a JSON file keyed by card ID
///
/// PINs come from the template and are never written to disk.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    template: CardEnvironment,
    cards: Mutex<BTreeMap<String, StoredSettings>>,
}

impl FileRepository {
    /// Open `path`, starting empty when the file does not exist yet
    pub fn open(path: PathBuf, template: CardEnvironment) -> Result<Self, Box<dyn std::error::Error>> {
        let cards = match fs::read(&path) {
            Ok(contents) => serde_json::from_slice(&contents)
                .map_err(|e| format!("corrupt state file {}: {e}", path.display()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "Opened state file");

        Ok(Self {
            path,
            template,
            cards: Mutex::new(cards),
        })
    }

    fn write(&self, cards: &BTreeMap<String, StoredSettings>) -> Result<(), String> {
        let contents = serde_json::to_vec_pretty(cards).map_err(|e| e.to_string())?;
        fs::write(&self.path, contents).map_err(|e| e.to_string())
    }
}

impl EnvironmentRepository for FileRepository {
    fn load(&self, card_id: Option<&CardId>) -> CardEnvironment {
        let environment = self.template.clone();
        let Some(card_id) = card_id else {
            return environment;
        };

        let stored = self.cards.lock().get(&card_id.to_string()).copied();
        let environment = match stored {
            Some(stored) => {
                let mode = EncryptionMode::from_code(stored.encryption_mode).unwrap_or_else(|| {
                    warn!(card_id = %card_id, code = stored.encryption_mode, "Ignoring unknown encryption mode");
                    EncryptionMode::None
                });
                environment
                    .with_encryption_mode(mode)
                    .with_legacy_mode(stored.legacy_mode)
            }
            None => environment,
        };
        environment.with_card_id(card_id.clone())
    }

    fn save(&self, card_id: &CardId, environment: &CardEnvironment) -> Result<(), RepositoryError> {
        let persisted = environment.persisted();
        let mut cards = self.cards.lock();
        cards.insert(
            card_id.to_string(),
            StoredSettings {
                encryption_mode: persisted.encryption_mode.code(),
                legacy_mode: persisted.legacy_mode,
            },
        );
        self.write(&cards).map_err(|reason| RepositoryError {
            card_id: card_id.clone(),
            reason,
        })
    }
}
