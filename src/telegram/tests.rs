use super::handler::*;
use super::*;
use crate::client::MockMarketApi;
use crate::storage::BotStore;
use crate::format::{MAX_MESSAGE_CHARS, TRUNCATED_SUFFIX};
use crate::testing::{binary_market, sample_event, temp_store, Outgoing, RecordingMessenger};
use rust_decimal_macros::dec;
use tempfile::TempDir;

const USER: i64 = 4242;

fn message(text: &str) -> IncomingMessage {
    IncomingMessage {
        user_id: USER,
        chat_id: USER,
        text: text.to_string(),
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<BotStore>,
    messenger: Arc<RecordingMessenger>,
    handler: CommandHandler,
}

async fn harness(api: MockMarketApi) -> Harness {
    let (dir, store) = temp_store().await;
    let store = Arc::new(store);
    let messenger = Arc::new(RecordingMessenger::new());
    let handler = CommandHandler::new(store.clone(), Arc::new(api), messenger.clone());
    Harness {
        _dir: dir,
        store,
        messenger,
        handler,
    }
}

#[test]
fn test_parse_commands() {
    assert_eq!(parse_command("/start"), Some(BotCommand::Start));
    assert_eq!(parse_command("  /HELP  "), Some(BotCommand::Help));
    assert_eq!(parse_command("/pause@PolydictionsBot"), Some(BotCommand::Pause));
    assert_eq!(
        parse_command("/deal https://polymarket.com/event/x"),
        Some(BotCommand::Deal("https://polymarket.com/event/x".to_string()))
    );
    assert_eq!(
        parse_command("/keywords@PolydictionsBot  btc, eth "),
        Some(BotCommand::Keywords("btc, eth".to_string()))
    );
    assert_eq!(parse_command("/deal"), Some(BotCommand::Deal(String::new())));
    assert_eq!(
        parse_command("/balance"),
        Some(BotCommand::Unknown("balance".to_string()))
    );
}

#[test]
fn test_plain_text_is_not_a_command() {
    assert_eq!(parse_command("hello"), None);
    assert_eq!(parse_command(""), None);
    assert_eq!(parse_command("/"), None);
}

#[test]
fn test_api_error_response() {
    let response: ApiResponse<serde_json::Value> = serde_json::from_str(
        r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#,
    )
    .unwrap();
    let err = response.into_result("sendMessage").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Telegram API error: sendMessage failed (403): Forbidden: bot was blocked by the user"
    );
}

#[test]
fn test_update_to_incoming_message() {
    let update: TelegramUpdate = serde_json::from_str(
        r#"{"update_id": 9, "message": {"message_id": 3, "from": {"id": 11, "is_bot": false, "first_name": "A"}, "chat": {"id": 12, "type": "private"}, "text": "/start"}}"#,
    )
    .unwrap();
    let incoming = update.message.unwrap().into_incoming().unwrap();
    assert_eq!(
        incoming,
        IncomingMessage {
            user_id: 11,
            chat_id: 12,
            text: "/start".to_string(),
        }
    );
}

#[test]
fn test_non_text_message_is_skipped() {
    let update: TelegramUpdate = serde_json::from_str(
        r#"{"update_id": 9, "message": {"message_id": 3, "chat": {"id": 12}}}"#,
    )
    .unwrap();
    assert!(update.message.unwrap().into_incoming().is_none());
}

#[tokio::test]
async fn test_start_subscribes_and_welcomes() {
    let h = harness(MockMarketApi::new()).await;

    h.handler.handle(&message("/start")).await.unwrap();
    h.handler.handle(&message("/start")).await.unwrap();

    assert_eq!(h.store.subscribers().await, vec![USER]);
    assert_eq!(h.messenger.sent_to(USER), vec![WELCOME_TEXT, WELCOME_TEXT]);
}

#[tokio::test]
async fn test_help_and_unknown_commands() {
    let h = harness(MockMarketApi::new()).await;

    h.handler.handle(&message("/help")).await.unwrap();
    h.handler.handle(&message("/<b>")).await.unwrap();
    h.handler.handle(&message("just chatting")).await.unwrap();

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], HELP_TEXT);
    assert!(texts[1].starts_with("❓ Unknown command: /&lt;b&gt;"));
    assert!(h.store.subscribers().await.is_empty());
}

#[tokio::test]
async fn test_keywords_show_set_and_clear() {
    let h = harness(MockMarketApi::new()).await;

    h.handler.handle(&message("/keywords")).await.unwrap();
    h.handler
        .handle(&message("/keywords btc, \"world cup\""))
        .await
        .unwrap();
    assert_eq!(h.store.keywords(USER).await, vec!["btc", "\"world cup\""]);

    h.handler.handle(&message("/keywords")).await.unwrap();
    h.handler.handle(&message("/keywords CLEAR")).await.unwrap();
    h.handler.handle(&message("/keywords")).await.unwrap();
    h.handler.handle(&message("/keywords clear")).await.unwrap();

    let texts = h.messenger.texts();
    assert!(texts[0].contains("Currently no filters set"));
    assert!(texts[1].contains("✅ <b>Keywords saved!</b>"));
    assert!(texts[1].contains("  • btc\n  • \"world cup\""));
    assert!(texts[2].contains("<b>Your current keywords:</b>\nbtc, \"world cup\""));
    assert!(texts[3].starts_with("✅ All keyword filters removed"));
    assert!(texts[4].contains("Currently no filters set"));
    assert_eq!(texts[5], NO_KEYWORDS_TEXT);
    assert!(h.store.keywords(USER).await.is_empty());
}

#[tokio::test]
async fn test_keywords_rejects_empty_list() {
    let h = harness(MockMarketApi::new()).await;

    h.handler.handle(&message("/keywords , ,")).await.unwrap();

    assert_eq!(h.messenger.texts(), vec![EMPTY_KEYWORDS_TEXT]);
    assert!(h.store.keywords(USER).await.is_empty());
}

#[tokio::test]
async fn test_pause_and_resume_are_idempotent() {
    let h = harness(MockMarketApi::new()).await;
    h.store.set_keywords(USER, vec!["eth".to_string()]).await;

    h.handler.handle(&message("/resume")).await.unwrap();
    h.handler.handle(&message("/pause")).await.unwrap();
    h.handler.handle(&message("/pause")).await.unwrap();
    assert!(h.store.is_paused(USER).await);
    h.handler.handle(&message("/resume")).await.unwrap();
    assert!(!h.store.is_paused(USER).await);

    let texts = h.messenger.texts();
    assert_eq!(texts[0], NOT_PAUSED_TEXT);
    assert!(texts[1].starts_with("⏸️ <b>Notifications paused</b>"));
    assert_eq!(texts[2], ALREADY_PAUSED_TEXT);
    assert!(texts[3].starts_with("▶️ <b>Notifications resumed</b>"));
    assert!(texts[3].ends_with("🔍 Active filters: eth"));
}

#[tokio::test]
async fn test_deal_without_argument() {
    let h = harness(MockMarketApi::new()).await;
    h.handler.handle(&message("/deal")).await.unwrap();
    assert_eq!(h.messenger.texts(), vec![DEAL_USAGE_TEXT]);
}

#[tokio::test]
async fn test_deal_invalid_link_changes_nothing() {
    let mut api = MockMarketApi::new();
    api.expect_get_event().never();
    let h = harness(api).await;

    h.handler
        .handle(&message("/deal https://example.com/not polymarket"))
        .await
        .unwrap();

    assert_eq!(h.messenger.texts(), vec![INVALID_LINK_TEXT]);
    assert!(h.store.subscribers().await.is_empty());
    assert!(h.store.keywords(USER).await.is_empty());
    assert_eq!(h.store.seen_count().await, 0);
}

#[tokio::test]
async fn test_deal_event_not_found() {
    let mut api = MockMarketApi::new();
    api.expect_get_event()
        .withf(|slug| slug == "missing-event")
        .returning(|slug| Err(BotError::EventNotFound(slug.to_string())));
    api.expect_get_context().never();
    let h = harness(api).await;

    h.handler
        .handle(&message("/deal https://polymarket.com/event/missing-event"))
        .await
        .unwrap();

    assert_eq!(
        h.messenger.outgoing(),
        vec![
            Outgoing::Sent {
                chat_id: USER,
                message_id: 1,
                text: FETCHING_TEXT.to_string(),
            },
            Outgoing::Edited {
                chat_id: USER,
                message_id: 1,
                text: EVENT_NOT_FOUND_TEXT.to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_deal_upstream_error_is_reported() {
    let mut api = MockMarketApi::new();
    api.expect_get_event()
        .returning(|_| Err(BotError::Api("Gamma API error: 502 <html>".to_string())));
    let h = harness(api).await;

    h.handler.handle(&message("/deal some-slug")).await.unwrap();

    let texts = h.messenger.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[1], "❌ Error: API error: Gamma API error: 502 &lt;html&gt;");
}

#[tokio::test]
async fn test_deal_with_context() {
    let mut api = MockMarketApi::new();
    api.expect_get_event()
        .withf(|slug| slug == "btc-100k")
        .returning(|_| Ok(sample_event("1", "BTC 100k", dec!(100))));
    api.expect_get_context()
        .returning(|_| Ok("Bitcoin & friends are rallying.".to_string()));
    let h = harness(api).await;

    h.handler
        .handle(&message("/deal https://polymarket.com/event/btc-100k?tid=1"))
        .await
        .unwrap();

    let out = h.messenger.outgoing();
    assert_eq!(out.len(), 4);
    assert_eq!(out[0].text(), FETCHING_TEXT);
    assert!(matches!(out[1], Outgoing::Edited { message_id: 1, .. }));
    assert!(out[1].text().starts_with("🔶 <b>BTC 100k</b>"));
    assert_eq!(out[2].text(), CONTEXT_PENDING_TEXT);
    assert_eq!(
        out[3],
        Outgoing::Edited {
            chat_id: USER,
            message_id: 2,
            text: "🧠 <b>Market Context:</b>\n\nBitcoin &amp; friends are rallying.".to_string(),
        }
    );
}

#[tokio::test]
async fn test_deal_long_context_in_parts() {
    let mut api = MockMarketApi::new();
    api.expect_get_event()
        .returning(|_| Ok(sample_event("1", "Long", dec!(100))));
    api.expect_get_context()
        .returning(|_| Ok("x".repeat(8000)));
    let h = harness(api).await;

    h.handler.handle(&message("/deal long")).await.unwrap();

    let out = h.messenger.outgoing();
    // fetching, event edit, pending, part 1 edit, parts 2 and 3
    assert_eq!(out.len(), 6);
    assert!(matches!(out[3], Outgoing::Edited { message_id: 2, .. }));
    assert!(out[3].text().starts_with("🧠 <b>Market Context (Part 1):</b>"));
    assert!(matches!(out[4], Outgoing::Sent { .. }));
    assert!(out[5].text().starts_with("🧠 <b>Market Context (Part 3):</b>"));
}

#[tokio::test]
async fn test_deal_event_with_many_markets_is_shown() {
    let mut event = sample_event("1", "Primary winner", dec!(100));
    event.markets = (0..150)
        .map(|i| binary_market(&format!("Will candidate {} win the primary election?", i), dec!(0.1)))
        .collect();
    let mut api = MockMarketApi::new();
    api.expect_get_event().returning(move |_| Ok(event.clone()));
    api.expect_get_context()
        .returning(|_| Ok("Crowded field.".repeat(5)));
    let h = harness(api).await;

    h.handler.handle(&message("/deal primary-winner")).await.unwrap();

    let out = h.messenger.outgoing();
    assert_eq!(out.len(), 4);
    assert!(matches!(out[1], Outgoing::Edited { message_id: 1, .. }));
    assert!(out[1].text().starts_with("🔶 <b>Primary winner</b>"));
    assert!(out[1].text().ends_with(TRUNCATED_SUFFIX));
    assert!(out[1].text().chars().count() <= MAX_MESSAGE_CHARS);
}

#[tokio::test]
async fn test_deal_context_failure_degrades() {
    let mut api = MockMarketApi::new();
    api.expect_get_event()
        .returning(|_| Ok(sample_event("1", "Quiet", dec!(100))));
    api.expect_get_context()
        .returning(|_| Err(BotError::Api("response too short (3 chars)".to_string())));
    let h = harness(api).await;

    h.handler.handle(&message("/deal quiet")).await.unwrap();

    let out = h.messenger.outgoing();
    assert_eq!(out.len(), 4);
    assert!(out[1].text().starts_with("🔶 <b>Quiet</b>"));
    assert_eq!(out[3].text(), CONTEXT_FAILED_TEXT);
}

#[tokio::test]
async fn test_deal_works_while_paused() {
    let mut api = MockMarketApi::new();
    api.expect_get_event()
        .returning(|_| Ok(sample_event("1", "Paused user event", dec!(100))));
    api.expect_get_context()
        .returning(|_| Ok("Context ".repeat(10)));
    let h = harness(api).await;
    h.store.subscribe(USER).await;
    h.store.pause(USER).await;

    h.handler.handle(&message("/deal paused-user-event")).await.unwrap();

    assert_eq!(h.messenger.outgoing().len(), 4);
    assert!(h.store.is_paused(USER).await);
}

#[tokio::test]
async fn test_send_failure_is_returned() {
    let h = harness(MockMarketApi::new()).await;
    h.messenger.fail_for(USER);

    let result = h.handler.handle(&message("/help")).await;
    assert!(matches!(result, Err(BotError::Telegram(_))));
}

#[test]
fn test_telegram_bot_from_config() {
    let bot = TelegramBot::new(&TelegramConfig::default(), "123:abc").unwrap();
    assert!(bot.base_url.ends_with("/bot123:abc"));
}
