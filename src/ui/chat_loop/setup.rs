use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::core::app::{App, AppAction, AppActionDispatcher, AppInitConfig, DisplayEvent};
use crate::core::chat_stream::ChatStreamService;
use crate::core::client::{ClientConfig, OllamaClient, TransportError};
use crate::core::config::ResolvedConfig;
use crate::core::history::ChatHistory;
use crate::tools::ToolRegistry;

use super::executors::CommandExecutor;

/// Everything a chat front end needs, wired together but not yet running.
pub struct ChatRuntime {
    pub app: App,
    pub executor: CommandExecutor,
    pub client: OllamaClient,
    pub history: ChatHistory,
    pub tools: Arc<ToolRegistry>,
    pub action_rx: mpsc::UnboundedReceiver<AppAction>,
}

pub fn client_for(config: &ResolvedConfig) -> Result<OllamaClient, TransportError> {
    OllamaClient::new(ClientConfig {
        base_url: config.base_url.clone(),
        connect_timeout: config.connect_timeout,
        request_timeout: config.request_timeout,
        stream_idle_timeout: config.stream_timeout,
    })
}

pub fn build_runtime(
    config: &ResolvedConfig,
    log_file: Option<String>,
    tools: ToolRegistry,
    autosave: bool,
) -> Result<ChatRuntime, TransportError> {
    let client = client_for(config)?;
    let tools = Arc::new(tools);
    let history = ChatHistory::new(&config.history_dir);

    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let dispatcher = AppActionDispatcher::new(action_tx);
    let stream_service = ChatStreamService::new(client.clone(), dispatcher.clone());
    let executor = CommandExecutor::new(
        stream_service,
        Arc::clone(&tools),
        history.clone(),
        dispatcher,
    );

    let app = App::new(
        AppInitConfig {
            model: config.model.clone(),
            autosave,
            log_file,
        },
        tools.definitions(),
    );

    Ok(ChatRuntime {
        app,
        executor,
        client,
        history,
        tools,
        action_rx,
    })
}

/// Probe the server and settle on a model before the first prompt.
pub async fn announce_startup(runtime: &mut ChatRuntime) {
    let base_url = runtime.client.base_url().to_string();
    if !runtime.client.is_available().await {
        runtime.app.ui.push(DisplayEvent::Warning(format!(
            "Ollama does not appear to be running at {base_url}. Start it with 'ollama serve'."
        )));
        return;
    }

    if let Some(model) = runtime.app.model() {
        runtime
            .app
            .ui
            .push(DisplayEvent::Info(format!("Using model: {model}")));
        return;
    }

    let models = runtime.client.list_models().await;
    match models.first() {
        Some(first) => {
            info!(model = %first.name, "No model configured; using first installed model");
            runtime.app.session.model = Some(first.name.clone());
            runtime
                .app
                .ui
                .push(DisplayEvent::Info(format!("Using model: {}", first.name)));
        }
        None => runtime.app.ui.push(DisplayEvent::Warning(
            "No models installed. Pull one with 'ollama pull <model>'.".to_string(),
        )),
    }
}
