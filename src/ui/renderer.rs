//! Turns [`DisplayEvent`]s into terminal text.

use std::io::{self, Write};

use crate::core::app::DisplayEvent;
use crate::core::message::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// Interactive chat: role labels, blank lines between entries.
    Transcript,
    /// One-shot output (`say`): the reply text only, plus tool and error notes.
    Plain,
}

pub struct TranscriptRenderer<W: Write> {
    out: W,
    style: RenderStyle,
    /// Whether the cursor sits after unterminated assistant text.
    mid_line: bool,
}

impl<W: Write> TranscriptRenderer<W> {
    pub fn new(out: W, style: RenderStyle) -> Self {
        Self {
            out,
            style,
            mid_line: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render_all(&mut self, events: impl IntoIterator<Item = DisplayEvent>) -> io::Result<()> {
        for event in events {
            self.render(&event)?;
        }
        self.out.flush()
    }

    pub fn render(&mut self, event: &DisplayEvent) -> io::Result<()> {
        match event {
            DisplayEvent::AssistantDelta(text) => {
                write!(self.out, "{text}")?;
                self.mid_line = !text.ends_with('\n');
                return Ok(());
            }
            DisplayEvent::AssistantStarted => {
                self.end_line()?;
                if self.style == RenderStyle::Transcript {
                    write!(self.out, "\nAssistant: ")?;
                    self.mid_line = true;
                }
                return Ok(());
            }
            _ => {}
        }

        self.end_line()?;
        match (event, self.style) {
            (DisplayEvent::UserMessage(_), RenderStyle::Plain) => {}
            // The user just typed it; no echo needed.
            (DisplayEvent::UserMessage(_), RenderStyle::Transcript) => {}
            (DisplayEvent::ToolCallStarted { name, arguments }, _) => {
                if arguments.is_empty() {
                    writeln!(self.out, "\n[Calling tool: {name}]")?;
                } else {
                    writeln!(self.out, "\n[Calling tool: {name} {arguments}]")?;
                }
            }
            (DisplayEvent::ToolResult { content, display, .. }, _) => {
                writeln!(self.out, "{}", display.as_deref().unwrap_or(content))?;
            }
            (DisplayEvent::Error(message), _) => writeln!(self.out, "\n[{message}]")?,
            (DisplayEvent::Info(message), _) => writeln!(self.out, "{message}")?,
            (DisplayEvent::Warning(message), _) => writeln!(self.out, "⚠️  {message}")?,
            (DisplayEvent::TurnFinished, RenderStyle::Transcript) => writeln!(self.out)?,
            (DisplayEvent::TurnFinished, RenderStyle::Plain) => {}
            (DisplayEvent::ConversationCleared, _) => writeln!(self.out, "\n{}", "-".repeat(40))?,
            (DisplayEvent::HistoryMessage(message), _) => {
                writeln!(self.out, "\n{}: {}", message.role.display_label(), message.content)?;
                if message.role == Role::Assistant {
                    for call in message.tool_calls.iter().flatten() {
                        writeln!(self.out, "[Calling tool: {}]", call.name)?;
                    }
                }
            }
            (DisplayEvent::AssistantDelta(_) | DisplayEvent::AssistantStarted, _) => {}
        }
        Ok(())
    }

    fn end_line(&mut self) -> io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.mid_line = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{Message, ToolCallRequest};

    fn render(style: RenderStyle, events: Vec<DisplayEvent>) -> String {
        let mut renderer = TranscriptRenderer::new(Vec::new(), style);
        renderer.render_all(events).expect("render");
        String::from_utf8(renderer.into_inner()).expect("utf8")
    }

    #[test]
    fn transcript_labels_streams_and_tools() {
        let output = render(
            RenderStyle::Transcript,
            vec![
                DisplayEvent::UserMessage("Prices?".into()),
                DisplayEvent::AssistantStarted,
                DisplayEvent::AssistantDelta("Checking".into()),
                DisplayEvent::ToolCallStarted {
                    name: "get_top_cryptocurrencies".into(),
                    arguments: String::new(),
                },
                DisplayEvent::ToolResult {
                    name: "get_top_cryptocurrencies".into(),
                    content: "{}".into(),
                    display: Some("TABLE".into()),
                },
                DisplayEvent::AssistantStarted,
                DisplayEvent::AssistantDelta("Done.".into()),
                DisplayEvent::TurnFinished,
            ],
        );
        assert_eq!(
            output,
            "\nAssistant: Checking\n\n[Calling tool: get_top_cryptocurrencies]\nTABLE\n\nAssistant: Done.\n\n"
        );
    }

    #[test]
    fn plain_style_prints_reply_text_only() {
        let output = render(
            RenderStyle::Plain,
            vec![
                DisplayEvent::UserMessage("hi".into()),
                DisplayEvent::AssistantStarted,
                DisplayEvent::AssistantDelta("Hello".into()),
                DisplayEvent::AssistantDelta(" there".into()),
                DisplayEvent::TurnFinished,
            ],
        );
        assert_eq!(output, "Hello there\n");
    }

    #[test]
    fn errors_close_the_open_line() {
        let output = render(
            RenderStyle::Transcript,
            vec![
                DisplayEvent::AssistantStarted,
                DisplayEvent::AssistantDelta("Part".into()),
                DisplayEvent::Error("Error communicating with Ollama: reset".into()),
            ],
        );
        assert_eq!(
            output,
            "\nAssistant: Part\n\n[Error communicating with Ollama: reset]\n"
        );
    }

    #[test]
    fn loaded_history_is_replayed_with_role_labels() {
        let output = render(
            RenderStyle::Transcript,
            vec![
                DisplayEvent::HistoryMessage(Message::user("hi")),
                DisplayEvent::HistoryMessage(Message::assistant_with_tool_calls(
                    "",
                    vec![ToolCallRequest::new("lookup", Default::default())],
                )),
                DisplayEvent::HistoryMessage(Message::tool_result("lookup", "{}")),
            ],
        );
        assert_eq!(
            output,
            "\nUser: hi\n\nAssistant: \n[Calling tool: lookup]\n\nTool: {}\n"
        );
    }
}
