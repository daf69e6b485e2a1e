//! In-memory collaborators for unit testing without a live platform or database.
//!
//! Enabled with the `test-support` feature:
//!
//! ```toml
//! [dev-dependencies]
//! clocktower-core = { path = "...", features = ["test-support"] }
//! ```

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use clocktower_types::{Guild, GuildId, ResponseContent, TownKey, TownRecord};

use crate::error::{Error, Result};
use crate::traits::{BotClient, InteractionContext, TownDatabase};

// ── MockBotClient ─────────────────────────────────────────────────────────────

/// Serves guild snapshots from memory. Tests mutate guilds in place to
/// simulate renames, deletions and recreated channels.
#[derive(Clone, Default)]
pub struct MockBotClient {
    guilds: Arc<Mutex<HashMap<GuildId, Guild>>>,
    fail_lookups: Arc<AtomicBool>,
    lookups: Arc<AtomicUsize>,
}

impl MockBotClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_guild(&self, guild: Guild) {
        self.guilds.lock().unwrap().insert(guild.id, guild);
    }

    pub fn remove_guild(&self, guild_id: GuildId) {
        self.guilds.lock().unwrap().remove(&guild_id);
    }

    /// Apply `edit` to the stored guild, if present.
    pub fn edit_guild(&self, guild_id: GuildId, edit: impl FnOnce(&mut Guild)) {
        if let Some(guild) = self.guilds.lock().unwrap().get_mut(&guild_id) {
            edit(guild);
        }
    }

    /// Make every lookup fail with a remote error.
    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl BotClient for MockBotClient {
    async fn get_guild(&self, guild_id: GuildId) -> Result<Option<Guild>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::Remote("guild lookup unavailable".to_string()));
        }
        Ok(self.guilds.lock().unwrap().get(&guild_id).cloned())
    }
}

// ── MockTownDatabase ──────────────────────────────────────────────────────────

/// Town records kept in insertion order, with every update recorded.
#[derive(Clone, Default)]
pub struct MockTownDatabase {
    records: Arc<Mutex<Vec<TownRecord>>>,
    updates: Arc<Mutex<Vec<TownRecord>>>,
    fail_reads: Arc<AtomicBool>,
    fail_updates: Arc<AtomicBool>,
}

impl MockTownDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = TownRecord>) -> Self {
        let db = Self::new();
        db.records.lock().unwrap().extend(records);
        db
    }

    pub fn insert(&self, record: TownRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn record(&self, key: &TownKey) -> Option<TownRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.key() == *key)
            .cloned()
    }

    /// Every record passed to `update_town`, in call order.
    pub fn updates(&self) -> Vec<TownRecord> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }
}

impl TownDatabase for MockTownDatabase {
    async fn get_all_towns(&self) -> Result<Vec<TownKey>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Database("town collection unavailable".to_string()));
        }
        Ok(self.records.lock().unwrap().iter().map(TownRecord::key).collect())
    }

    async fn get_town_record(&self, key: &TownKey) -> Result<Option<TownRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Database("town collection unavailable".to_string()));
        }
        Ok(self.record(key))
    }

    async fn update_town(&self, record: &TownRecord) -> Result<bool> {
        self.updates.lock().unwrap().push(record.clone());
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::Database("write rejected".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.key() == record.key()) {
            Some(stored) => {
                *stored = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ── MockInteraction ───────────────────────────────────────────────────────────

/// Interaction that records its deferral and every response edit.
///
/// Clones share the same log, so a test can keep one while the queue owns
/// the other.
#[derive(Clone)]
pub struct MockInteraction {
    guild_id: GuildId,
    log: Arc<Mutex<InteractionLog>>,
}

#[derive(Default)]
struct InteractionLog {
    deferred: bool,
    edits: Vec<ResponseContent>,
    fail_defer: bool,
    fail_edits_after: Option<usize>,
}

impl MockInteraction {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            log: Arc::new(Mutex::new(InteractionLog::default())),
        }
    }

    /// Deferring the response will fail.
    pub fn fail_defer(self) -> Self {
        self.log.lock().unwrap().fail_defer = true;
        self
    }

    /// The first `n` edits succeed, later ones fail.
    pub fn fail_edits_after(self, n: usize) -> Self {
        self.log.lock().unwrap().fail_edits_after = Some(n);
        self
    }

    pub fn was_deferred(&self) -> bool {
        self.log.lock().unwrap().deferred
    }

    /// Contents of every successful edit, oldest first.
    pub fn edits(&self) -> Vec<ResponseContent> {
        self.log.lock().unwrap().edits.clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.log.lock().unwrap().edits.last().map(|e| e.content.clone())
    }
}

impl InteractionContext for MockInteraction {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    async fn defer_response(&self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_defer {
            return Err(Error::Interaction("unknown interaction".to_string()));
        }
        log.deferred = true;
        Ok(())
    }

    async fn edit_response(&self, response: ResponseContent) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_edits_after.is_some_and(|n| log.edits.len() >= n) {
            return Err(Error::Interaction("edit rejected".to_string()));
        }
        log.edits.push(response);
        Ok(())
    }
}
