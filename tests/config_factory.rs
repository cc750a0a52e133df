use serde_json::json;

use reminder_bot::client::ReminderBot;
use reminder_bot::config::{Config, OpenAiConfig, StorageConfig};
use reminder_bot::error::ReminderBotError;
use reminder_bot::factories::bot_factory::ReminderBotFactory;

fn openai(api_key: Option<&str>, base_url: Option<&str>) -> Option<OpenAiConfig> {
    Some(OpenAiConfig {
        api_key: api_key.map(str::to_string),
        model: None,
        base_url: base_url.map(str::to_string),
    })
}

#[tokio::test]
async fn config_from_file_and_factory_errors() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        tmp.path(),
        json!({
            "openai": {"api_key": "key", "model": "deepseek-chat", "base_url": null},
            "completion": {"timeout_secs": 10, "max_retries": 0}
        })
        .to_string(),
    )
    .unwrap();
    let config = Config::from_file(tmp.path()).unwrap();
    assert_eq!(config.completion().max_retries(), 0);
    let _ = ReminderBotFactory::create_from_config(config).await.unwrap();

    let no_key_with_base_url = Config {
        openai: openai(None, Some("http://localhost:11434/v1")),
        ..Default::default()
    };
    let _ = ReminderBotFactory::create_from_config(no_key_with_base_url)
        .await
        .unwrap();

    let missing_key = Config {
        openai: openai(Some("  "), None),
        ..Default::default()
    };
    let err = ReminderBotFactory::create_from_config(missing_key)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ReminderBotError::Config(_)));

    let missing_openai = Config::default();
    let err = ReminderBotFactory::create_from_config(missing_openai)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ReminderBotError::Config(_)));

    let bad_file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(bad_file.path(), "not json").unwrap();
    assert!(matches!(
        Config::from_file(bad_file.path()),
        Err(ReminderBotError::Config(_))
    ));
    assert!(matches!(
        Config::from_file("/definitely/not/here.json"),
        Err(ReminderBotError::Config(_))
    ));
}

#[tokio::test]
async fn client_uses_sqlite_storage_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("bot.db");
    let config = Config {
        openai: openai(Some("key"), None),
        storage: Some(StorageConfig {
            sqlite_path: Some(db.to_string_lossy().to_string()),
        }),
        completion: None,
    };

    let bot = ReminderBot::from_config(config).await.unwrap();
    assert!(db.exists());
    assert!(bot.list_reminders("u1").await.unwrap().is_empty());
    assert!(bot.get_user_history("u1").await.unwrap().is_empty());
    bot.delete_user_history("u1").await.unwrap();
}

#[tokio::test]
async fn client_from_config_path() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        tmp.path(),
        json!({"openai": {"api_key": "key"}}).to_string(),
    )
    .unwrap();
    let bot = ReminderBot::from_config_path(tmp.path()).await.unwrap();
    assert!(bot.list_reminders("u1").await.unwrap().is_empty());
}
