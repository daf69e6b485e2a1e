//! Towns: the persisted record and the live aggregate resolved from it

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Channel, ChannelCategory, ChannelId, Guild, GuildId, Role};

/// Identifies one town: a guild plus the town's control channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TownKey {
    pub guild_id: GuildId,
    pub control_channel_id: ChannelId,
}

impl TownKey {
    pub fn new(guild_id: GuildId, control_channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            control_channel_id,
        }
    }
}

impl fmt::Display for TownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.control_channel_id)
    }
}

/// Last-known id and display name of an external entity.
///
/// The id is the lookup key; the name is only compared against the live
/// entity to detect that it was renamed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub id: u64,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Durable snapshot of a town as stored in the town database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TownRecord {
    pub guild_id: GuildId,
    pub control_channel: EntityRef,
    pub town_square: EntityRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_channel: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_category: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_category: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storyteller_role: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub villager_role: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TownRecord {
    /// A record with only the two mandatory channels set.
    pub fn new(guild_id: GuildId, control_channel: EntityRef, town_square: EntityRef) -> Self {
        Self {
            guild_id,
            control_channel,
            town_square,
            chat_channel: None,
            day_category: None,
            night_category: None,
            storyteller_role: None,
            villager_role: None,
            author_name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> TownKey {
        TownKey::new(self.guild_id, self.control_channel.id)
    }
}

/// A town whose record has been resolved against the live guild.
///
/// Any slot may be `None`: the entity was deleted, could not be found by
/// its recorded id, or is no longer the expected kind of channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Town {
    pub record: TownRecord,
    pub guild: Guild,
    pub control_channel: Option<Channel>,
    pub town_square: Option<Channel>,
    pub chat_channel: Option<Channel>,
    pub day_category: Option<ChannelCategory>,
    pub night_category: Option<ChannelCategory>,
    pub storyteller_role: Option<Role>,
    pub villager_role: Option<Role>,
}

impl Town {
    pub fn key(&self) -> TownKey {
        self.record.key()
    }
}
