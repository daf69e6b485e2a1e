//! Live guild entities as seen by the remote platform at lookup time

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type GuildId = u64;
pub type ChannelId = u64;
pub type RoleId = u64;

/// Channel kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
}

/// Anything that can be looked up by id and carries a display name.
pub trait LiveEntity {
    fn id(&self) -> u64;
    fn name(&self) -> &str;
}

/// Guild channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<ChannelId>,
}

impl Channel {
    pub fn text(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ChannelKind::Text,
            category_id: None,
        }
    }

    pub fn voice(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ChannelKind::Voice,
            category_id: None,
        }
    }

    pub fn in_category(mut self, category_id: ChannelId) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

impl LiveEntity for Channel {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Channel category (a channel that groups other channels)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelCategory {
    pub id: ChannelId,
    pub name: String,
}

impl ChannelCategory {
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl LiveEntity for ChannelCategory {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Guild role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl LiveEntity for Role {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Snapshot of a guild and the entities it currently contains.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    #[serde(default)]
    pub channels: HashMap<ChannelId, Channel>,
    #[serde(default)]
    pub categories: HashMap<ChannelId, ChannelCategory>,
    #[serde(default)]
    pub roles: HashMap<RoleId, Role>,
}

impl Guild {
    pub fn new(id: GuildId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.insert(channel.id, channel);
        self
    }

    pub fn with_category(mut self, category: ChannelCategory) -> Self {
        self.categories.insert(category.id, category);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role.id, role);
        self
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn channel_category(&self, id: ChannelId) -> Option<&ChannelCategory> {
        self.categories.get(&id)
    }

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild() -> Guild {
        Guild::new(77, "Ravenswood")
            .with_category(ChannelCategory::new(4, "day"))
            .with_channel(Channel::text(1, "control").in_category(4))
            .with_channel(Channel::voice(2, "town square").in_category(4))
            .with_channel(Channel::text(3, "elsewhere"))
            .with_role(Role::new(6, "storyteller"))
    }

    #[test]
    fn test_lookup_by_id() {
        let g = guild();
        assert_eq!(g.channel(1).map(|c| c.name.as_str()), Some("control"));
        assert_eq!(g.channel_category(4).map(|c| c.name.as_str()), Some("day"));
        assert_eq!(g.role(6).map(|r| r.name.as_str()), Some("storyteller"));
        assert!(g.channel(99).is_none());
        assert!(g.role(1).is_none());
    }

    #[test]
    fn test_categories_are_not_channels() {
        let g = guild();
        assert!(g.channel(4).is_none());
        assert!(g.channel_category(1).is_none());
    }

    #[test]
    fn test_channel_kind_constructors() {
        assert_eq!(Channel::voice(1, "v").kind, ChannelKind::Voice);
        assert_eq!(Channel::text(1, "t").kind, ChannelKind::Text);
    }

    #[test]
    fn test_channel_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ChannelKind::Voice).unwrap();
        assert_eq!(json, "\"voice\"");
    }

    #[test]
    fn test_category_id_omitted_when_none() {
        let json = serde_json::to_string(&Channel::text(3, "chat")).unwrap();
        assert!(!json.contains("category_id"));
    }
}
