#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use clocktower_types::{Channel, ChannelCategory, EntityRef, Guild, Role, TownKey, TownRecord};

    use crate::mocks::{MockBotClient, MockTownDatabase};
    use crate::resolver::TownResolver;

    const GUILD: u64 = 77;

    fn live_guild() -> Guild {
        Guild::new(GUILD, "Ravenswood Bluff")
            .with_channel(Channel::text(1, "botc-control"))
            .with_channel(Channel::voice(2, "town-square").in_category(4))
            .with_channel(Channel::text(3, "general"))
            .with_category(ChannelCategory::new(4, "day"))
            .with_category(ChannelCategory::new(5, "night"))
            .with_role(Role::new(6, "storyteller"))
            .with_role(Role::new(7, "villager"))
    }

    fn full_record() -> TownRecord {
        let mut record = TownRecord::new(
            GUILD,
            EntityRef::new(1, "botc-control"),
            EntityRef::new(2, "town-square"),
        );
        record.chat_channel = Some(EntityRef::new(3, "general"));
        record.day_category = Some(EntityRef::new(4, "day"));
        record.night_category = Some(EntityRef::new(5, "night"));
        record.storyteller_role = Some(EntityRef::new(6, "storyteller"));
        record.villager_role = Some(EntityRef::new(7, "villager"));
        record.author_name = Some("Fabled".to_string());
        record.timestamp = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
        record
    }

    fn setup() -> (TownResolver<MockBotClient, MockTownDatabase>, MockBotClient, MockTownDatabase) {
        let client = MockBotClient::new();
        client.insert_guild(live_guild());
        let db = MockTownDatabase::with_records([full_record()]);
        let resolver = TownResolver::new(client.clone(), db.clone());
        (resolver, client, db)
    }

    /// Let the background record update run.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ── unchanged town ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_resolves_every_slot() {
        let (resolver, _client, db) = setup();
        let town = resolver.resolve_town(&full_record()).await.unwrap();

        assert_eq!(town.guild.id, GUILD);
        assert_eq!(town.control_channel.unwrap().name, "botc-control");
        assert_eq!(town.town_square.unwrap().name, "town-square");
        assert_eq!(town.chat_channel.unwrap().name, "general");
        assert_eq!(town.day_category.unwrap().name, "day");
        assert_eq!(town.night_category.unwrap().name, "night");
        assert_eq!(town.storyteller_role.unwrap().name, "storyteller");
        assert_eq!(town.villager_role.unwrap().name, "villager");
        assert_eq!(town.record, full_record());

        settle().await;
        assert_eq!(db.update_count(), 0);
    }

    #[tokio::test]
    async fn test_record_without_optional_slots() {
        let (resolver, _client, db) = setup();
        let record = TownRecord::new(
            GUILD,
            EntityRef::new(1, "botc-control"),
            EntityRef::new(2, "town-square"),
        );

        let town = resolver.resolve_town(&record).await.unwrap();
        assert!(town.control_channel.is_some());
        assert!(town.town_square.is_some());
        assert!(town.chat_channel.is_none());
        assert!(town.day_category.is_none());
        assert!(town.storyteller_role.is_none());

        settle().await;
        assert_eq!(db.update_count(), 0);
    }

    // ── renamed entities ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_renamed_channel_is_kept_and_refreshed() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.channels.insert(3, Channel::text(3, "general-renamed"));
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert_eq!(town.chat_channel.unwrap().name, "general-renamed");
        assert_eq!(
            town.record.chat_channel,
            Some(EntityRef::new(3, "general-renamed"))
        );

        settle().await;
        let updates = db.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].chat_channel, Some(EntityRef::new(3, "general-renamed")));
        assert_eq!(updates[0].author_name.as_deref(), Some("Fabled"));
        assert_eq!(updates[0].timestamp, full_record().timestamp);
        assert_eq!(
            db.record(&TownKey::new(GUILD, 1)).unwrap().chat_channel,
            Some(EntityRef::new(3, "general-renamed"))
        );
    }

    #[tokio::test]
    async fn test_renamed_control_channel() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.channels.insert(1, Channel::text(1, "botc-mod"));
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert_eq!(town.control_channel.unwrap().name, "botc-mod");

        settle().await;
        assert_eq!(db.update_count(), 1);
        assert_eq!(db.updates()[0].control_channel, EntityRef::new(1, "botc-mod"));
    }

    #[tokio::test]
    async fn test_renamed_category_and_role() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.categories.insert(5, ChannelCategory::new(5, "nighttime"));
            g.roles.insert(6, Role::new(6, "grimoire keeper"));
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert_eq!(town.night_category.unwrap().name, "nighttime");
        assert_eq!(town.storyteller_role.unwrap().name, "grimoire keeper");

        settle().await;
        let updates = db.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].night_category, Some(EntityRef::new(5, "nighttime")));
        assert_eq!(
            updates[0].storyteller_role,
            Some(EntityRef::new(6, "grimoire keeper"))
        );
    }

    // ── missing entities ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_missing_id_is_not_matched_by_name() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.channels.remove(&3);
            g.channels.insert(30, Channel::text(30, "general"));
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert!(town.chat_channel.is_none());
        assert!(town.control_channel.is_some());
        assert!(town.town_square.is_some());

        settle().await;
        let updates = db.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].chat_channel, Some(EntityRef::new(3, "general")));
    }

    #[tokio::test]
    async fn test_missing_id_rewrites_record_on_every_resolve() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.channels.remove(&3);
        });

        resolver.resolve_town(&full_record()).await.unwrap();
        settle().await;
        resolver.resolve_town(&full_record()).await.unwrap();
        settle().await;

        let updates = db.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], full_record());
        assert_eq!(updates[1], full_record());
    }

    #[tokio::test]
    async fn test_deleted_role_and_category() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.roles.remove(&7);
            g.categories.remove(&4);
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert!(town.villager_role.is_none());
        assert!(town.day_category.is_none());
        assert!(town.storyteller_role.is_some());
        assert!(town.night_category.is_some());

        settle().await;
        assert_eq!(db.update_count(), 1);
    }

    #[tokio::test]
    async fn test_deleted_town_square() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.channels.remove(&2);
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert!(town.town_square.is_none());
        assert!(town.chat_channel.is_some());

        settle().await;
        assert_eq!(db.update_count(), 1);
    }

    // ── kind mismatch ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_text_channel_in_voice_slot_is_unusable() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.channels.insert(2, Channel::text(2, "town-square"));
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert!(town.town_square.is_none());
        assert!(town.control_channel.is_some());
        assert!(town.chat_channel.is_some());
        assert!(town.villager_role.is_some());

        settle().await;
        assert_eq!(db.update_count(), 0);
    }

    #[tokio::test]
    async fn test_voice_channel_in_text_slot_is_unusable() {
        let (resolver, client, db) = setup();
        client.edit_guild(GUILD, |g| {
            g.channels.insert(1, Channel::voice(1, "botc-control"));
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert!(town.control_channel.is_none());
        assert!(town.town_square.is_some());

        settle().await;
        assert_eq!(db.update_count(), 0);
    }

    // ── unresolvable guild ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_missing_guild_returns_none() {
        let (resolver, client, db) = setup();
        client.remove_guild(GUILD);

        assert!(resolver.resolve_town(&full_record()).await.is_none());
        settle().await;
        assert_eq!(db.update_count(), 0);
    }

    #[tokio::test]
    async fn test_guild_lookup_error_returns_none() {
        let (resolver, client, _db) = setup();
        client.fail_lookups();

        assert!(resolver.resolve_town(&full_record()).await.is_none());
        assert_eq!(client.lookup_count(), 1);
    }

    // ── background update ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_failed_update_still_returns_town() {
        let (resolver, client, db) = setup();
        db.fail_updates();
        client.edit_guild(GUILD, |g| {
            g.channels.insert(3, Channel::text(3, "general-renamed"));
        });

        let town = resolver.resolve_town(&full_record()).await.unwrap();
        assert_eq!(town.chat_channel.unwrap().name, "general-renamed");

        settle().await;
        assert_eq!(db.update_count(), 1);
        assert_eq!(
            db.record(&TownKey::new(GUILD, 1)).unwrap().chat_channel,
            Some(EntityRef::new(3, "general"))
        );
    }

    // ── by key ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_resolve_by_key() {
        let (resolver, _client, _db) = setup();
        let town = resolver
            .resolve_town_by_key(&TownKey::new(GUILD, 1))
            .await
            .unwrap();
        assert_eq!(town.key(), TownKey::new(GUILD, 1));
    }

    #[tokio::test]
    async fn test_resolve_by_unknown_key() {
        let (resolver, client, _db) = setup();
        assert!(
            resolver
                .resolve_town_by_key(&TownKey::new(GUILD, 99))
                .await
                .is_none()
        );
        assert_eq!(client.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_by_key_database_error() {
        let (resolver, _client, db) = setup();
        db.fail_reads();
        assert!(
            resolver
                .resolve_town_by_key(&TownKey::new(GUILD, 1))
                .await
                .is_none()
        );
    }
}
