use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::app::{AppAction, AppActionDispatcher, AppCommand, SessionSnapshot};
use crate::core::chat_stream::ChatStreamService;
use crate::core::history::ChatHistory;
use crate::core::message::ToolCallRequest;
use crate::tools::{error_payload, ToolRegistry};

/// Carries out [`AppCommand`]s on background tasks. Every task reports back
/// through the dispatcher; nothing here touches the `App` directly.
pub struct CommandExecutor {
    stream_service: ChatStreamService,
    tools: Arc<ToolRegistry>,
    history: ChatHistory,
    dispatcher: AppActionDispatcher,
    /// Most recent save; each save waits for the one before it.
    last_save: Option<JoinHandle<()>>,
}

impl CommandExecutor {
    pub fn new(
        stream_service: ChatStreamService,
        tools: Arc<ToolRegistry>,
        history: ChatHistory,
        dispatcher: AppActionDispatcher,
    ) -> Self {
        Self {
            stream_service,
            tools,
            history,
            dispatcher,
            last_save: None,
        }
    }

    pub fn execute(&mut self, command: AppCommand) {
        match command {
            AppCommand::SpawnStream(params) => {
                debug!(stream_id = params.stream_id, model = %params.model, "Starting chat stream");
                self.stream_service.spawn_stream(params);
            }
            AppCommand::RunTool(call) => self.run_tool(call),
            AppCommand::PersistSession(snapshot) => {
                let previous = self.last_save.take();
                self.last_save = Some(self.persist(snapshot, previous));
            }
        }
    }

    pub fn execute_all(&mut self, commands: impl IntoIterator<Item = AppCommand>) {
        for command in commands {
            self.execute(command);
        }
    }

    fn run_tool(&self, call: ToolCallRequest) {
        let tools = Arc::clone(&self.tools);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let ToolCallRequest { name, arguments } = call;
            let registry = Arc::clone(&tools);
            let tool_name = name.clone();
            // Inner task so a panicking handler still yields a result.
            let result = match tokio::spawn(async move { registry.execute(&tool_name, arguments).await }).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(tool = %name, error = %err, "Tool task failed");
                    error_payload(format!("Error executing tool: {err}"))
                }
            };
            let display = tools.render(&name, &result);
            dispatcher.dispatch(AppAction::ToolCallCompleted {
                tool_name: name,
                result,
                display,
            });
        });
    }

    fn persist(
        &self,
        snapshot: SessionSnapshot,
        previous: Option<JoinHandle<()>>,
    ) -> JoinHandle<()> {
        let history = self.history.clone();
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(err) = previous.await {
                    warn!(error = %err, "Save task failed");
                }
            }
            let started_at = snapshot.started_at;
            let saved = tokio::task::spawn_blocking(move || history.save(&snapshot)).await;
            match saved {
                Ok(Ok(handle)) => {
                    debug!(path = %handle.display(), "Conversation saved");
                    dispatcher.dispatch(AppAction::SessionPersisted { started_at, handle });
                }
                Ok(Err(err)) => warn!(error = %err, "Failed to save conversation"),
                Err(err) => warn!(error = %err, "Save task failed"),
            }
        })
    }

    /// Wait for outstanding saves; used before exiting.
    pub async fn wait_for_background(&mut self) {
        if let Some(handle) = self.last_save.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Save task failed");
            }
        }
    }
}
