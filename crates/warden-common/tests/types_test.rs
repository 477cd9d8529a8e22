//! Tests for the identifier newtypes in warden-common.

use std::collections::HashMap;
use warden_common::types::*;

#[test]
fn test_user_id_implements_expected_traits() {
    let user_id = UserId(987_654_321);

    assert_eq!(format!("{user_id:?}"), "UserId(987654321)");
    assert_eq!(format!("{user_id}"), "987654321");
    assert_eq!(user_id.get(), 987_654_321);

    let mut map = HashMap::new();
    map.insert(user_id, "member");
    assert_eq!(map.get(&UserId(987_654_321)), Some(&"member"));
}

#[test]
fn test_ids_serialize_as_plain_numbers() {
    let guild_id = GuildId(42);
    let serialized = serde_json::to_string(&guild_id).unwrap();
    assert_eq!(serialized, "42");

    let deserialized: GuildId = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized, guild_id);
}

#[test]
fn test_ids_parse_from_strings() {
    assert_eq!(" 123 ".parse::<ChannelId>().unwrap(), ChannelId(123));
    assert_eq!("77".parse::<MessageId>().unwrap(), MessageId(77));
    assert!("not-a-number".parse::<UserId>().is_err());
    assert!("-1".parse::<UserId>().is_err());
}

#[test]
fn test_distinct_id_types_do_not_mix() {
    let user = UserId::from(5);
    let guild = GuildId::from(5);
    assert_eq!(user.get(), guild.get());
    assert!(user < UserId(6));
}
