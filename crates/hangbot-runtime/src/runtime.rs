//! Process orchestration: settings, stores, plugins, webhooks and the event
//! loop.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hangbot_runtime::BotRuntime;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! let runtime = BotRuntime::builder()
//!     .config_file("deploy/hangbot.toml")
//!     .build(client)?;
//!
//! runtime.register_plugin(my_plugin::DESCRIPTOR);
//!
//! // The protocol client pushes events into `tx`.
//! runtime.run(rx).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, Settings};
use crate::error::RuntimeResult;
use crate::logging;
use hangbot_core::{BoxedClient, ConversationEvent};
use hangbot_framework::{Bot, JsonStore, PluginDescriptor};

/// Owns the bot and drives it for the life of the process.
pub struct BotRuntime {
    settings: Settings,
    bot: Bot,
}

impl BotRuntime {
    /// Creates a runtime builder.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let runtime = BotRuntime::builder()
    ///     .profile("production")
    ///     .build(client)?;
    /// ```
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates the runtime from already-loaded settings.
    ///
    /// Initializes logging (a no-op if a subscriber is already installed),
    /// loads the config and memory documents and builds the [`Bot`], which
    /// installs the command resolver and registers the built-in plugins.
    pub fn from_settings(settings: Settings, client: BoxedClient) -> RuntimeResult<Self> {
        logging::init_from_config(&settings.logging);

        let config = JsonStore::load(&settings.config_path)?;
        let memory = JsonStore::load(&settings.memory_path)?;
        let bot = Bot::new(client, config, memory);

        info!(
            log_level = %settings.logging.level,
            config_path = %settings.config_path.display(),
            memory_path = %settings.memory_path.display(),
            "Runtime initialized"
        );

        Ok(Self { settings, bot })
    }

    /// The bot context.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The settings this runtime was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Registers a plugin so [`run`](Self::run) can load it.
    pub fn register_plugin(&self, desc: PluginDescriptor) {
        self.bot.plugins().register(desc);
    }

    /// Runs until the event channel closes or a shutdown signal arrives.
    pub async fn run(&self, events: mpsc::Receiver<ConversationEvent>) -> RuntimeResult<()> {
        info!("hangbot is running. Press Ctrl+C to stop.");
        self.run_until(events, wait_for_shutdown()).await
    }

    /// Runs until the event channel closes or `shutdown` completes.
    ///
    /// Every event is handled in its own task. On the way out the runtime
    /// waits for in-flight events, stops the webhook listeners and saves
    /// both documents.
    pub async fn run_until<F>(
        &self,
        mut events: mpsc::Receiver<ConversationEvent>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.bot.plugins().load_all(&self.bot);

        let listeners = hangbot_transport::start_configured(&self.bot).await;
        let autosave = self.spawn_autosave();
        let mut tasks = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Some(event) => {
                        let bot = self.bot.clone();
                        tasks.spawn(async move {
                            bot.handle_event(event).await;
                        });
                    }
                    None => {
                        info!("Event source closed, shutting down");
                        break;
                    }
                },
                () = &mut shutdown => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Event task failed");
                    }
                }
            }
        }

        if !tasks.is_empty() {
            debug!(pending = tasks.len(), "Waiting for in-flight events");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Event task failed");
            }
        }

        if let Some(handle) = autosave {
            handle.abort();
        }
        for listener in listeners {
            debug!(listener = %listener.id, "Stopping webhook listener");
            listener.stop();
        }

        self.save_stores()?;
        info!("Runtime stopped");
        Ok(())
    }

    /// Saves whichever documents have unsaved changes.
    ///
    /// Both are attempted even if the first one fails.
    pub fn save_stores(&self) -> RuntimeResult<()> {
        let config = save_logged("config", self.bot.config());
        let memory = save_logged("memory", self.bot.memory());
        config?;
        memory?;
        Ok(())
    }

    fn spawn_autosave(&self) -> Option<JoinHandle<()>> {
        if self.settings.autosave_secs == 0 {
            debug!("Autosave disabled");
            return None;
        }

        let period = Duration::from_secs(self.settings.autosave_secs);
        let bot = self.bot.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // File I/O stays off the async workers.
                let bot = bot.clone();
                let saved =
                    tokio::task::spawn_blocking(move || save_logged("memory", bot.memory())).await;
                if let Err(e) = saved {
                    error!(error = %e, "Autosave task failed");
                }
            }
        }))
    }
}

impl std::fmt::Debug for BotRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRuntime")
            .field("settings", &self.settings)
            .field("bot", &self.bot)
            .finish()
    }
}

fn save_logged(name: &str, store: &JsonStore) -> RuntimeResult<()> {
    match store.save() {
        Ok(true) => {
            debug!(document = name, "Document saved");
            Ok(())
        }
        Ok(false) => Ok(()),
        Err(e) => {
            error!(document = name, error = %e, "Failed to save document");
            Err(e.into())
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`BotRuntime`].
///
/// Settings come from a [`ConfigLoader`] searching the current directory
/// and the user config directory, unless [`settings`](Self::settings)
/// supplies them directly.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    settings: Option<Settings>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
            settings: None,
        }
    }

    /// Sets a specific settings file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the settings profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for settings files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables `HANGBOT_*` environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges settings programmatically below files and the environment.
    pub fn merge(mut self, settings: Settings) -> Self {
        self.config_loader = self.config_loader.merge(settings);
        self
    }

    /// Uses these settings as-is and skips loading.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds the runtime around `client`.
    pub fn build(self, client: BoxedClient) -> RuntimeResult<BotRuntime> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => self.config_loader.load()?,
        };
        BotRuntime::from_settings(settings, client)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::RuntimeError;
    use hangbot_core::{ChatClient, ClientResult, EventCategory};
    use hangbot_framework::{BoxError, Flow, HandlerContext, PluginScope};
    use tokio::sync::oneshot;

    #[derive(Debug, Default)]
    struct RecordingClient {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        fn self_id(&self) -> &str {
            "bot-self"
        }

        async fn send_message(&self, _conversation_id: &str, text: &str) -> ClientResult<()> {
            self.sent.lock().push(text.to_string());
            Ok(())
        }

        async fn send_image(
            &self,
            _conversation_id: &str,
            _image: Vec<u8>,
            _caption: Option<&str>,
        ) -> ClientResult<()> {
            Ok(())
        }
    }

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            config_path: dir.join("config.json"),
            memory_path: dir.join("memory.json"),
            autosave_secs: 0,
            ..Settings::default()
        }
    }

    fn counter_init(scope: &PluginScope<'_>) -> Result<(), BoxError> {
        scope.on(EventCategory::Message, |ctx: HandlerContext| async move {
            let seen = ctx.bot().memory().get::<u64>("seen").unwrap_or(0);
            ctx.bot().memory().set("seen", seen + 1)?;
            Ok(Flow::Continue)
        });
        Ok(())
    }

    const COUNTER: PluginDescriptor = PluginDescriptor {
        name: "counter",
        desc: "counts messages",
        init: counter_init,
    };

    #[tokio::test]
    async fn test_run_handles_events_and_saves_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(RecordingClient::default());
        let runtime = BotRuntime::builder()
            .settings(settings_in(dir.path()))
            .build(client.clone())
            .unwrap();
        runtime.register_plugin(COUNTER);

        let (tx, rx) = mpsc::channel(8);
        tx.send(ConversationEvent::message("e1", "c1", "alice", "/bot ping"))
            .await
            .unwrap();
        drop(tx);

        runtime
            .run_until(rx, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(client.sent.lock().clone(), vec!["pong".to_string()]);
        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("memory.json")).unwrap())
                .unwrap();
        assert_eq!(saved, json!({ "seen": 1 }));
        assert!(!dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn test_shutdown_future_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = BotRuntime::builder()
            .settings(settings_in(dir.path()))
            .build(Arc::new(RecordingClient::default()))
            .unwrap();

        // The sender stays alive, so only the shutdown future can end the run.
        let (_tx, rx) = mpsc::channel::<ConversationEvent>(8);
        runtime
            .run_until(rx, tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();

        assert_eq!(runtime.bot().plugins().loaded(), vec!["core", "plugins"]);
    }

    #[tokio::test]
    async fn test_broken_config_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "[1, 2]").unwrap();

        let result = BotRuntime::builder()
            .settings(settings_in(dir.path()))
            .build(Arc::new(RecordingClient::default()));

        assert!(matches!(result, Err(RuntimeError::Store(_))));
    }

    #[tokio::test]
    async fn test_configured_plugin_list_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            json!({ "plugins": ["counter"] }).to_string(),
        )
        .unwrap();
        let runtime = BotRuntime::builder()
            .settings(settings_in(dir.path()))
            .build(Arc::new(RecordingClient::default()))
            .unwrap();
        runtime.register_plugin(COUNTER);

        let (tx, rx) = mpsc::channel(8);
        drop(tx);
        runtime
            .run_until(rx, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(runtime.bot().plugins().loaded(), vec!["counter"]);
    }

    #[tokio::test]
    async fn test_slow_event_does_not_block_later_events() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = BotRuntime::builder()
            .settings(settings_in(dir.path()))
            .build(Arc::new(RecordingClient::default()))
            .unwrap();

        let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_tx = Arc::new(Mutex::new(Some(release_tx)));
        let release_rx = Arc::new(Mutex::new(Some(release_rx)));

        let handler_log = Arc::clone(&log);
        runtime.bot().registry().register_handler(
            "ordering",
            EventCategory::Message,
            10,
            move |ctx: HandlerContext| {
                let log = Arc::clone(&handler_log);
                let release_tx = Arc::clone(&release_tx);
                let release_rx = Arc::clone(&release_rx);
                async move {
                    match ctx.event().text() {
                        Some("slow") => {
                            log.lock().push("slow started");
                            let gate = release_rx.lock().take();
                            if let Some(gate) = gate {
                                let _ = gate.await;
                            }
                            log.lock().push("slow finished");
                        }
                        Some("fast") => {
                            log.lock().push("fast");
                            if let Some(tx) = release_tx.lock().take() {
                                let _ = tx.send(());
                            }
                        }
                        _ => {}
                    }
                    Ok::<_, BoxError>(Flow::Continue)
                }
            },
        );

        let (tx, rx) = mpsc::channel(8);
        let feed_log = Arc::clone(&log);
        let feed = async move {
            tx.send(ConversationEvent::message("e1", "c1", "alice", "slow"))
                .await
                .unwrap();
            while !feed_log.lock().contains(&"slow started") {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            tx.send(ConversationEvent::message("e2", "c1", "bob", "fast"))
                .await
                .unwrap();
        };

        // Handling events one at a time would never release the slow one.
        let run = async {
            let (result, ()) =
                tokio::join!(runtime.run_until(rx, std::future::pending::<()>()), feed);
            result
        };
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("events were handled sequentially")
            .unwrap();

        assert_eq!(
            log.lock().clone(),
            vec!["slow started", "fast", "slow finished"]
        );
    }
}
