//! Resolution of persisted town records against the live guild.
//!
//! Every slot is looked up by its recorded id only. A slot whose entity is
//! gone, or whose entity now carries a different name, marks the record as
//! out of date and a refreshed copy is written back in the background.
//! Channel slots also carry an expected kind; a channel of the wrong kind is
//! left out of the town but does not by itself mark the record out of date.

#[path = "resolver_tests.rs"]
mod resolver_tests;

use clocktower_types::{
    Channel, ChannelKind, EntityRef, Guild, LiveEntity, Town, TownKey, TownRecord,
};
use tracing::{debug, info, warn};

use crate::traits::{BotClient, TownDatabase};

/// Why a record needs rewriting. Only the first reason found is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateRequired {
    None,
    Id,
    Name,
}

pub struct TownResolver<B, D> {
    client: B,
    db: D,
}

impl<B: BotClient, D: TownDatabase> TownResolver<B, D> {
    pub fn new(client: B, db: D) -> Self {
        Self { client, db }
    }

    /// Resolve `record` into a live [`Town`].
    ///
    /// Returns `None` only when the guild itself cannot be resolved. Missing
    /// or mismatched entities leave their slot empty.
    pub async fn resolve_town(&self, record: &TownRecord) -> Option<Town> {
        let key = record.key();
        let guild = match self.client.get_guild(record.guild_id).await {
            Ok(Some(guild)) => guild,
            Ok(None) => {
                debug!(town = %key, "Guild not found, town unresolvable");
                return None;
            }
            Err(e) => {
                warn!(town = %key, error = %e, "Guild lookup failed");
                return None;
            }
        };

        let mut refreshed = record.clone();
        let mut slots = SlotResolver::new(&guild);

        let control_channel = slots
            .resolve(&mut refreshed.control_channel, Guild::channel)
            .and_then(|c| of_kind(c, ChannelKind::Text));
        let town_square = slots
            .resolve(&mut refreshed.town_square, Guild::channel)
            .and_then(|c| of_kind(c, ChannelKind::Voice));
        let chat_channel = slots
            .resolve_optional(&mut refreshed.chat_channel, Guild::channel)
            .and_then(|c| of_kind(c, ChannelKind::Text));
        let day_category = slots
            .resolve_optional(&mut refreshed.day_category, Guild::channel_category)
            .cloned();
        let night_category = slots
            .resolve_optional(&mut refreshed.night_category, Guild::channel_category)
            .cloned();
        let storyteller_role = slots
            .resolve_optional(&mut refreshed.storyteller_role, Guild::role)
            .cloned();
        let villager_role = slots
            .resolve_optional(&mut refreshed.villager_role, Guild::role)
            .cloned();
        let update = slots.update;

        if update != UpdateRequired::None {
            info!(town = %key, reason = ?update, "Town record out of date, refreshing");
            self.spawn_update(key, refreshed.clone());
        }

        Some(Town {
            record: refreshed,
            guild,
            control_channel,
            town_square,
            chat_channel,
            day_category,
            night_category,
            storyteller_role,
            villager_role,
        })
    }

    /// Load the record stored under `key` and resolve it.
    pub async fn resolve_town_by_key(&self, key: &TownKey) -> Option<Town> {
        match self.db.get_town_record(key).await {
            Ok(Some(record)) => self.resolve_town(&record).await,
            Ok(None) => {
                debug!(town = %key, "No town record stored");
                None
            }
            Err(e) => {
                warn!(town = %key, error = %e, "Failed to load town record");
                None
            }
        }
    }

    /// Write `record` in the background. A slot whose entity is gone keeps its
    /// stored ref, so such a town rewrites an identical record on every
    /// resolve until the slot is repaired.
    fn spawn_update(&self, key: TownKey, record: TownRecord) {
        let db = self.db.clone();
        tokio::spawn(async move {
            match db.update_town(&record).await {
                Ok(true) => debug!(town = %key, "Town record refreshed"),
                Ok(false) => warn!(town = %key, "Town record vanished before refresh"),
                Err(e) => warn!(town = %key, error = %e, "Failed to refresh town record"),
            }
        });
    }
}

fn of_kind(channel: &Channel, kind: ChannelKind) -> Option<Channel> {
    (channel.kind == kind).then(|| channel.clone())
}

struct SlotResolver<'g> {
    guild: &'g Guild,
    update: UpdateRequired,
}

impl<'g> SlotResolver<'g> {
    fn new(guild: &'g Guild) -> Self {
        Self {
            guild,
            update: UpdateRequired::None,
        }
    }

    /// Look `slot` up by id, refreshing its name from the live entity.
    ///
    /// A slot whose id no longer resolves keeps its stored ref.
    fn resolve<T: LiveEntity>(
        &mut self,
        slot: &mut EntityRef,
        lookup: impl FnOnce(&'g Guild, u64) -> Option<&'g T>,
    ) -> Option<&'g T> {
        let found = lookup(self.guild, slot.id);
        match found {
            None => self.flag(UpdateRequired::Id),
            Some(entity) if entity.name() != slot.name => {
                self.flag(UpdateRequired::Name);
                *slot = EntityRef::new(entity.id(), entity.name());
            }
            Some(_) => {}
        }
        found
    }

    fn resolve_optional<T: LiveEntity>(
        &mut self,
        slot: &mut Option<EntityRef>,
        lookup: impl FnOnce(&'g Guild, u64) -> Option<&'g T>,
    ) -> Option<&'g T> {
        let slot = slot.as_mut()?;
        self.resolve(slot, lookup)
    }

    fn flag(&mut self, reason: UpdateRequired) {
        if self.update == UpdateRequired::None {
            self.update = reason;
        }
    }
}
