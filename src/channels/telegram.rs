//! Telegram channel adapter (spec C5/C6): the reference implementation of
//! [`crate::channel::Channel`], built on `teloxide`.
//!
//! Grounded on the reference bot framework's `channels::telegram`
//! (`TelegramChannelConfig` builder, `Bot` + shutdown-channel lifecycle,
//! `dptree` message/callback handlers, `Dispatcher::builder`), restructured
//! around this system's four-topic bus instead of a single per-channel
//! queue, and carrying this system's full outbound contract (per-`MessageKind`
//! dispatch, the Markdown → HTML → Plain fallback ladder, exactly one
//! [`SendResult`] per correlation id) and inbound contract (allow-list
//! authorization, command recognition, canonical metadata, callback ACK) in
//! place of the reference's single-branch text relay. The reference's
//! tool-confirmation machinery (`ConfirmationManager`) approves agent tool
//! calls, a concept this system has no notion of, and is not carried over.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::payloads::{
    EditMessageTextSetters, SendDocumentSetters, SendMessageSetters, SendPhotoSetters,
};
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MediaKind, MessageId,
    MessageKind as TgMessageKind, ParseMode,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::MessageBus;
use crate::channel::{AllowlistConfig, Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::config::TelegramSettings;
use crate::error::{ChannelError, ChannelResult};
use crate::format::{self, ContentType};
use crate::types::{
    ChannelKind, FormatHint, InboundMessage, InlineKeyboard, MediaDescriptor,
    MessageKind as CrateMessageKind, OutboundMessage, SendResult,
};
use crate::typing::ActivitySink;

/// Prefixes recognized as bot commands (spec §4.5 point 3).
const COMMAND_PREFIXES: &[&str] = &["/new", "/status", "/restart", "/help", "/settings"];

/// Sent to a sender/chat rejected by the allow-list (spec §7).
const UNAUTHORIZED_NOTICE: &str = "Sorry, you are not authorized to use this bot.";

/// Substrings Telegram's Bot API uses in its 400 response body for a
/// markdown-entity parse failure (spec §4.4 fallback ladder).
const MARKDOWN_ERROR_SUBSTRINGS: &[&str] = &[
    "can't parse entities",
    "can't find end of the entity",
    "wrong number of entities",
    "specified new message entity",
];

/// The Telegram channel adapter.
pub struct TelegramChannel {
    base: Arc<ChannelBase>,
    settings: TelegramSettings,
    allowlist: AllowlistConfig,
    bot: RwLock<Option<Bot>>,
    tasks: RwLock<Vec<JoinHandle<()>>>,
    cancel: RwLock<Option<CancellationToken>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel").field("base", &self.base).finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Build an adapter from its settings.
    #[must_use]
    pub fn new(settings: TelegramSettings) -> Self {
        let allowlist = AllowlistConfig {
            allowed_senders: settings.allowed_users.clone(),
            allowed_chats: settings.allowed_chats.clone(),
        };
        Self {
            base: Arc::new(ChannelBase::new("telegram", ChannelKind::Telegram)),
            settings,
            allowlist,
            bot: RwLock::new(None),
            tasks: RwLock::new(Vec::new()),
            cancel: RwLock::new(None),
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn kind(&self) -> ChannelKind {
        self.base.kind()
    }

    async fn start(&self, bus: Arc<MessageBus>) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let token = self.settings.resolve_bot_token().ok_or_else(|| {
            ChannelError::StartFailed("no bot token configured (telegram.bot_token or TELEGRAM_BOT_TOKEN)".to_string())
        })?;
        let bot = Bot::new(token);
        *self.bot.write().await = Some(bot.clone());

        let cancel = CancellationToken::new();
        *self.cancel.write().await = Some(cancel.clone());

        let mut tasks = Vec::with_capacity(2);
        tasks.push(spawn_outbound_worker(Arc::clone(&bus), bot.clone(), self.settings.clone(), Arc::clone(&self.base), cancel.clone()));
        tasks.push(spawn_inbound_dispatcher(bus, bot, self.allowlist.clone(), Arc::clone(&self.base)));
        *self.tasks.write().await = tasks;

        self.base.set_state(ChannelState::Running).await;
        info!("telegram channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(cancel) = self.cancel.write().await.take() {
            cancel.cancel();
        }
        for task in self.tasks.write().await.drain(..) {
            task.abort();
        }
        *self.bot.write().await = None;

        self.base.set_state(ChannelState::Stopped).await;
        info!("telegram channel stopped");
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()> {
        let guard = self.bot.read().await;
        let bot = guard.as_ref().ok_or(ChannelError::NotConnected)?;
        let result = dispatch_outbound(bot, &self.settings, msg).await;
        match &result {
            Ok(()) => self.base.record_sent().await,
            Err(e) => self.base.record_error(e.describe()).await,
        }
        result
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}

#[async_trait]
impl ActivitySink for TelegramChannel {
    async fn send_activity(&self, native_session_id: &str) {
        let Ok(chat_id) = native_session_id.parse::<i64>() else {
            warn!(session_id = %native_session_id, "telegram typing indicator: invalid chat id");
            return;
        };
        let guard = self.bot.read().await;
        let Some(bot) = guard.as_ref() else {
            return;
        };
        if let Err(e) = bot.send_chat_action(ChatId(chat_id), ChatAction::Typing).await {
            debug!(error = %e, "failed to send telegram typing indicator");
        }
    }
}

/// Spawn the worker that relays this channel's slice of the outbound topic
/// to the Telegram API, publishing exactly one [`SendResult`] per
/// correlated send (spec §4.1, §4.4).
fn spawn_outbound_worker(
    bus: Arc<MessageBus>,
    bot: Bot,
    settings: TelegramSettings,
    base: Arc<ChannelBase>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut outbound = bus.subscribe_outbound().await;
        loop {
            tokio::select! {
                received = outbound.recv() => {
                    let Some(msg) = received else { break };
                    if msg.channel != ChannelKind::Telegram {
                        continue;
                    }
                    let result = dispatch_outbound(&bot, &settings, &msg).await;
                    match &result {
                        Ok(()) => base.record_sent().await,
                        Err(e) => base.record_error(e.describe()).await,
                    }
                    if let Some(correlation_id) = msg.correlation_id.clone() {
                        let send_result = match &result {
                            Ok(()) => SendResult::success(correlation_id, ChannelKind::Telegram),
                            Err(e) => SendResult::failure(correlation_id, ChannelKind::Telegram, e),
                        };
                        if let Err(e) = bus.publish_send_result(send_result).await {
                            warn!(error = %e, "failed to publish telegram send result");
                        }
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
        debug!("telegram outbound worker stopped");
    })
}

/// Spawn the `teloxide` dispatcher driving inbound messages and callback
/// queries onto the bus (spec §4.5).
fn spawn_inbound_dispatcher(bus: Arc<MessageBus>, bot: Bot, allowlist: AllowlistConfig, base: Arc<ChannelBase>) -> JoinHandle<()> {
    let message_bus = Arc::clone(&bus);
    let message_allowlist = allowlist.clone();
    let message_base = Arc::clone(&base);
    let message_handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let bus = Arc::clone(&message_bus);
        let allowlist = message_allowlist.clone();
        let base = Arc::clone(&message_base);
        async move {
            handle_inbound_message(&bus, &allowlist, &base, &bot, msg).await;
            Ok::<(), teloxide::RequestError>(())
        }
    });

    let callback_bus = Arc::clone(&bus);
    let callback_allowlist = allowlist;
    let callback_base = Arc::clone(&base);
    let callback_handler = Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
        let bus = Arc::clone(&callback_bus);
        let allowlist = callback_allowlist.clone();
        let base = Arc::clone(&callback_base);
        async move {
            handle_callback_query(&bus, &allowlist, &base, &bot, query).await;
            Ok::<(), teloxide::RequestError>(())
        }
    });

    let handler = dptree::entry().branch(message_handler).branch(callback_handler);
    let mut dispatcher = Dispatcher::builder(bot, handler).enable_ctrlc_handler().build();

    tokio::spawn(async move {
        dispatcher.dispatch().await;
        debug!("telegram dispatcher stopped");
    })
}

/// Handle one inbound Telegram message: authorize, extract content and
/// metadata, recognize commands, and publish (spec §4.5).
async fn handle_inbound_message(bus: &Arc<MessageBus>, allowlist: &AllowlistConfig, base: &Arc<ChannelBase>, bot: &Bot, msg: Message) {
    let user_id = msg.from.as_ref().map_or_else(String::new, |u| u.id.0.to_string());
    let chat_id = msg.chat.id.0.to_string();

    if !allowlist.is_allowed(&user_id, &chat_id) {
        debug!(user_id = %user_id, chat_id = %chat_id, "telegram message from unauthorized sender");
        if let Err(e) = bot.send_message(msg.chat.id, UNAUTHORIZED_NOTICE).await {
            warn!(error = %e, "failed to send unauthorized notice");
        }
        return;
    }

    let content = match &msg.kind {
        TgMessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(text) => text.text.clone(),
            _ => String::new(),
        },
        _ => return,
    };

    let mut inbound = InboundMessage::new(ChannelKind::Telegram, user_id, chat_id.clone(), content.clone())
        .with_meta("message_id", msg.id.0)
        .with_meta("chat_id", chat_id)
        .with_meta("chat_type", format!("{:?}", msg.chat.kind));

    if let Some(user) = msg.from.as_ref() {
        if let Some(username) = &user.username {
            inbound = inbound.with_meta("username", username.clone());
        }
        inbound = inbound.with_meta("first_name", user.first_name.clone());
        if let Some(last_name) = &user.last_name {
            inbound = inbound.with_meta("last_name", last_name.clone());
        }
        if let Some(language_code) = &user.language_code {
            inbound = inbound.with_meta("language_code", language_code.clone());
        }
    }

    if let Some(command) = recognize_command(&content) {
        inbound = inbound.with_meta("command", command);
    }

    base.record_received().await;
    if let Err(e) = bus.publish_inbound(inbound).await {
        warn!(error = %e, "telegram inbound topic full, dropping message");
    }
}

/// Handle one callback-query interaction: ACK immediately (spec §4.5 point
/// 5), then authorize and publish the button payload as inbound content.
async fn handle_callback_query(bus: &Arc<MessageBus>, allowlist: &AllowlistConfig, base: &Arc<ChannelBase>, bot: &Bot, query: CallbackQuery) {
    let user_id = query.from.id.0.to_string();
    let chat_id = query.message.as_ref().map_or_else(String::new, |m| m.chat().id.0.to_string());

    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "failed to acknowledge telegram callback query");
    }

    if !allowlist.is_allowed(&user_id, &chat_id) {
        debug!(user_id = %user_id, chat_id = %chat_id, "telegram callback from unauthorized sender");
        return;
    }

    let Some(data) = query.data.clone() else {
        return;
    };

    let mut inbound =
        InboundMessage::new(ChannelKind::Telegram, user_id, chat_id.clone(), data).with_meta("message_type", "callback").with_meta("chat_id", chat_id);
    if let Some(message) = &query.message {
        inbound = inbound.with_meta("message_id", message.id().0);
    }

    base.record_received().await;
    if let Err(e) = bus.publish_inbound(inbound).await {
        warn!(error = %e, "telegram inbound topic full, dropping callback");
    }
}

/// Recognize a leading bot command, tolerating the `/cmd@botname` form
/// Telegram uses in group chats.
fn recognize_command(content: &str) -> Option<String> {
    let first_token = content.split_whitespace().next()?;
    let bare = first_token.split('@').next().unwrap_or(first_token);
    COMMAND_PREFIXES.iter().find(|&&prefix| prefix == bare).map(|s| (*s).to_string())
}

/// Dispatch one outbound message by its [`CrateMessageKind`] (spec §4.4).
async fn dispatch_outbound(bot: &Bot, settings: &TelegramSettings, msg: &OutboundMessage) -> ChannelResult<()> {
    msg.validate().map_err(|description| ChannelError::Permanent {
        description,
        original_content: msg.content.clone(),
    })?;

    let (_, native) = crate::types::parse_session_id(&msg.session_id, ChannelKind::Telegram, settings.accept_legacy_session_ids)
        .ok_or_else(|| ChannelError::InvalidSessionId(msg.session_id.clone()))?;
    let chat_id: i64 = native.parse().map_err(|_| ChannelError::InvalidSessionId(msg.session_id.clone()))?;
    let chat_id = ChatId(chat_id);
    let keyboard = msg.keyboard.as_ref().map(|rows| build_keyboard(rows));

    match msg.kind {
        CrateMessageKind::Text => dispatch_text(bot, settings, chat_id, None, &msg.content, msg.format, keyboard).await,
        CrateMessageKind::Edit => {
            let message_id = parse_message_id(msg.message_id.as_deref())?;
            dispatch_text(bot, settings, chat_id, Some(message_id), &msg.content, msg.format, keyboard).await
        }
        CrateMessageKind::Delete => {
            let message_id = parse_message_id(msg.message_id.as_deref())?;
            send_with_timeout(settings, bot.delete_message(chat_id, MessageId(message_id))).await.map(|_| ())
        }
        CrateMessageKind::Photo => dispatch_media(bot, settings, chat_id, msg, true).await,
        CrateMessageKind::Document => dispatch_media(bot, settings, chat_id, msg, false).await,
    }
}

/// Render a text-like send (`Text`/`Edit`) through the fallback ladder:
/// native Markdown → `MarkdownToHTML` → `StripFormatting` (spec §4.4).
/// A non-markdown error at any stage short-circuits straight to failure.
async fn dispatch_text(
    bot: &Bot,
    settings: &TelegramSettings,
    chat_id: ChatId,
    message_id: Option<i32>,
    content: &str,
    format: FormatHint,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ChannelResult<()> {
    let mut last_err: Option<ChannelError> = None;
    for (text, mode) in render_stages(content, format, settings.parse_markdown) {
        match send_stage(bot, settings, chat_id, message_id, &text, mode, keyboard.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                let is_markdown = matches!(e, ChannelError::MarkdownParse { .. });
                last_err = Some(e);
                if !is_markdown {
                    break;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| ChannelError::Internal("no rendering stage attempted".to_string())))
}

/// Build the ordered list of (text, `parse_mode`) attempts for a given
/// format hint. When `parse_markdown` is disabled for the channel,
/// markdown/auto-detected content is always sent stripped, skipping the
/// ladder entirely.
fn render_stages(content: &str, format: FormatHint, parse_markdown: bool) -> Vec<(String, Option<ParseMode>)> {
    if !parse_markdown && matches!(format, FormatHint::Markdown | FormatHint::Auto) {
        return vec![(format::strip_formatting(content), None)];
    }
    match format {
        FormatHint::Html => vec![(content.to_string(), Some(ParseMode::Html))],
        FormatHint::Plain => vec![(content.to_string(), None)],
        FormatHint::Markdown => vec![
            (content.to_string(), Some(ParseMode::MarkdownV2)),
            (format::markdown_to_html(content), Some(ParseMode::Html)),
            (format::strip_formatting(content), None),
        ],
        FormatHint::Auto => match format::detect_content_type(content) {
            ContentType::Plain => vec![(content.to_string(), None)],
            ContentType::Code | ContentType::Markdown => {
                vec![(format::markdown_to_html(content), Some(ParseMode::Html)), (format::strip_formatting(content), None)]
            }
        },
    }
}

/// Send (or edit) one rendering attempt, splitting new sends into
/// `max_message_length`-sized chunks.
async fn send_stage(
    bot: &Bot,
    settings: &TelegramSettings,
    chat_id: ChatId,
    message_id: Option<i32>,
    text: &str,
    mode: Option<ParseMode>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ChannelResult<()> {
    if let Some(id) = message_id {
        let mut request = bot.edit_message_text(chat_id, MessageId(id), text);
        if let Some(mode) = mode {
            request = request.parse_mode(mode);
        }
        return send_with_timeout(settings, request).await.map(|_| ());
    }

    for chunk in split_message(text, settings.max_message_length) {
        let mut request = bot.send_message(chat_id, chunk);
        if let Some(mode) = mode {
            request = request.parse_mode(mode);
        }
        if let Some(kb) = keyboard.clone() {
            request = request.reply_markup(kb);
        }
        if settings.quiet_mode {
            request = request.disable_notification(true);
        }
        send_with_timeout(settings, request).await?;
    }
    Ok(())
}

/// Send a photo or document, resolving the source by priority
/// local-path → file-id → URL (spec §4.4).
async fn dispatch_media(bot: &Bot, settings: &TelegramSettings, chat_id: ChatId, msg: &OutboundMessage, is_photo: bool) -> ChannelResult<()> {
    let media = msg.media.as_ref().ok_or_else(|| ChannelError::Permanent {
        description: "media descriptor required".to_string(),
        original_content: msg.content.clone(),
    })?;
    let file = resolve_input_file(media, settings)?;
    let caption = media.caption.clone().or_else(|| if msg.content.is_empty() { None } else { Some(msg.content.clone()) });

    if is_photo {
        let mut request = bot.send_photo(chat_id, file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        send_with_timeout(settings, request).await.map(|_| ())
    } else {
        let mut request = bot.send_document(chat_id, file);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        send_with_timeout(settings, request).await.map(|_| ())
    }
}

/// Wrap an outbound Telegram API call in the channel's configured per-send
/// deadline (spec §4.4 "Send with per-send timeout"; §5, §7). Elapsing maps
/// to [`ChannelError::Timeout`], which is not a `MarkdownParse` variant and
/// so terminates the [`dispatch_text`] fallback ladder rather than
/// continuing to the next rendering stage.
async fn send_with_timeout<F, T>(settings: &TelegramSettings, request: F) -> ChannelResult<T>
where
    F: std::future::IntoFuture<Output = Result<T, teloxide::RequestError>>,
{
    match tokio::time::timeout(settings.send_timeout(), request.into_future()).await {
        Ok(result) => result.map_err(map_request_error),
        Err(_elapsed) => Err(ChannelError::Timeout(settings.send_timeout())),
    }
}

/// Validate a local media path against the channel's safe-path policy
/// (spec §4.4: "validate local path is non-empty and conforms to safe-path
/// policy"). Rejects any path containing a parent-directory (`..`)
/// component outright; when [`TelegramSettings::media_root`] is configured,
/// additionally requires the canonicalized path to stay within it.
/// Grounded on the reference pack's directory-containment check
/// (`FilesystemStorage::cleanup_empty_parents`'s `starts_with(&self.base_path)`
/// guard), adapted here to validate before use rather than after deletion.
fn validate_safe_local_path(path: &str, settings: &TelegramSettings) -> ChannelResult<std::path::PathBuf> {
    let candidate = std::path::Path::new(path);
    if candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(ChannelError::Permanent {
            description: format!("local media path fails safe-path policy (parent-dir traversal): {path}"),
            original_content: path.to_string(),
        });
    }

    let Some(root) = settings.media_root.as_deref() else {
        return Ok(candidate.to_path_buf());
    };
    let root = std::path::Path::new(root);
    let root_canonical = root.canonicalize().map_err(|e| ChannelError::Permanent {
        description: format!("media_root {} is not accessible: {e}", root.display()),
        original_content: path.to_string(),
    })?;
    let joined = if candidate.is_absolute() { candidate.to_path_buf() } else { root.join(candidate) };
    let canonical = joined.canonicalize().map_err(|e| ChannelError::Permanent {
        description: format!("local media path fails safe-path policy (unresolvable): {path} ({e})"),
        original_content: path.to_string(),
    })?;
    if !canonical.starts_with(&root_canonical) {
        return Err(ChannelError::Permanent {
            description: format!("local media path fails safe-path policy (escapes media_root): {path}"),
            original_content: path.to_string(),
        });
    }
    Ok(canonical)
}

fn resolve_input_file(media: &MediaDescriptor, settings: &TelegramSettings) -> ChannelResult<InputFile> {
    if let Some(path) = media.local_path.as_deref().filter(|p| !p.is_empty()) {
        let safe_path = validate_safe_local_path(path, settings)?;
        return Ok(InputFile::file(safe_path));
    }
    if let Some(id) = media.file_id.as_deref().filter(|p| !p.is_empty()) {
        return Ok(InputFile::file_id(id.to_string()));
    }
    if let Some(url) = media.url.as_deref().filter(|p| !p.is_empty()) {
        let parsed = url.parse::<reqwest::Url>().map_err(|e| ChannelError::Permanent {
            description: format!("invalid media url: {e}"),
            original_content: url.to_string(),
        })?;
        return Ok(InputFile::url(parsed));
    }
    Err(ChannelError::Permanent {
        description: "media descriptor has no resolvable source".to_string(),
        original_content: String::new(),
    })
}

fn build_keyboard(rows: &InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        rows.iter()
            .map(|row| row.iter().map(|b| InlineKeyboardButton::callback(b.text.clone(), b.callback_data.clone())).collect::<Vec<_>>()),
    )
}

fn parse_message_id(raw: Option<&str>) -> ChannelResult<i32> {
    let raw = raw.ok_or_else(|| ChannelError::Permanent {
        description: "message_id required".to_string(),
        original_content: String::new(),
    })?;
    raw.parse::<i32>().map_err(|_| ChannelError::Permanent {
        description: format!("invalid message_id: {raw}"),
        original_content: String::new(),
    })
}

/// Split a long message into line-aligned chunks of at most `max_len`
/// bytes. Lines longer than `max_len` are hard-split.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if current.len() + line.len() + 1 > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if line.len() > max_len {
                for chunk in line.as_bytes().chunks(max_len) {
                    chunks.push(String::from_utf8_lossy(chunk).to_string());
                }
                continue;
            }
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Classify a `teloxide` request failure into this crate's channel error
/// taxonomy, matching the markdown-entity substrings the fallback ladder
/// retries on (spec §4.4).
fn map_request_error(err: teloxide::RequestError) -> ChannelError {
    let description = err.to_string();
    let lower = description.to_lowercase();
    if MARKDOWN_ERROR_SUBSTRINGS.iter().any(|needle| lower.contains(needle)) {
        return ChannelError::MarkdownParse { description };
    }
    match &err {
        teloxide::RequestError::RetryAfter(_) | teloxide::RequestError::Network(_) | teloxide::RequestError::Io(_) => {
            ChannelError::Transient { description, retry_after: None }
        }
        _ => ChannelError::Permanent { description, original_content: String::new() },
    }
}
