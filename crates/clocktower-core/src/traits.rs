use std::future::Future;

use clocktower_types::{Guild, GuildId, ResponseContent, TownKey, TownRecord};

use crate::error::Result;

/// Read access to the remote platform's guilds.
///
/// `Ok(None)` means the guild is gone (or the bot was removed from it);
/// `Err` is a transient failure of the lookup itself.
pub trait BotClient: Send + Sync + Clone + 'static {
    fn get_guild(&self, guild_id: GuildId) -> impl Future<Output = Result<Option<Guild>>> + Send;
}

/// One user interaction whose response can be deferred and later edited.
///
/// Owned by the interaction queue from enqueue until its work has run.
pub trait InteractionContext: Send + Sync + 'static {
    /// Guild the interaction was issued in.
    fn guild_id(&self) -> GuildId;

    /// Acknowledge the interaction so the response can be edited later.
    fn defer_response(&self) -> impl Future<Output = Result<()>> + Send;

    /// Replace the content of the deferred response.
    fn edit_response(&self, response: ResponseContent) -> impl Future<Output = Result<()>> + Send;
}

/// Persistence of town records.
pub trait TownDatabase: Send + Sync + Clone + 'static {
    fn get_all_towns(&self) -> impl Future<Output = Result<Vec<TownKey>>> + Send;

    fn get_town_record(
        &self,
        key: &TownKey,
    ) -> impl Future<Output = Result<Option<TownRecord>>> + Send;

    /// Overwrite the stored record with the same key. Returns whether a
    /// record was updated.
    fn update_town(&self, record: &TownRecord) -> impl Future<Output = Result<bool>> + Send;
}
