//! Terminal screens
//!
//! Reads one line per action from `input` and writes the screens to
//! `output`. End of input ends the session.

use anyhow::Result;
use pb_chat::{Screen, SessionController};
use pb_llm::Role;
use pb_rag::ConversationHistory;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

pub const SETUP_TITLE: &str = "Ping Buddy - Chat with Ping Results";
pub const SETUP_PROMPT: &str = "Enter an IP address to ping:";
pub const SETUP_ACTION: &str = "Ping and Chat";
pub const CHAT_TITLE_PREFIX: &str = "Chatting with Ping Results for: ";
pub const CHAT_PROMPT: &str = "Ask a question about the ping results:";
pub const CHAT_ACTION: &str = "Send";
pub const THINKING: &str = "Thinking...";

fn title_block(title: &str) -> String {
    format!("{}\n{}\n", title, "=".repeat(title.chars().count()))
}

pub fn render_setup() -> String {
    title_block(SETUP_TITLE)
}

pub fn render_chat_header(target: &str) -> String {
    title_block(&format!("{}{}", CHAT_TITLE_PREFIX, target))
}

pub fn render_prompt(screen: Screen) -> String {
    match screen {
        Screen::Setup => format!("{} [Enter = {}]\n> ", SETUP_PROMPT, SETUP_ACTION),
        Screen::Chat => format!("{} [Enter = {}]\n> ", CHAT_PROMPT, CHAT_ACTION),
    }
}

pub fn render_history(history: &ConversationHistory) -> String {
    let mut out = String::new();
    for turn in history.turns() {
        let speaker = match turn.role {
            Role::User => "You",
            Role::Assistant => "AI",
            Role::System => continue,
        };
        out.push_str(&format!("{}: {}\n", speaker, turn.content));
    }
    out
}

async fn write<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

/// Drive the controller until `input` is exhausted.
pub async fn run<R, W>(controller: &mut SessionController, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    write(output, &render_setup()).await?;
    loop {
        write(output, &render_prompt(controller.screen())).await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match controller.screen() {
            Screen::Setup => match controller.submit_address(line).await {
                Ok(ctx) => {
                    let header = render_chat_header(ctx.target.as_str());
                    write(output, &format!("\n{}", header)).await?;
                }
                Err(e) => {
                    error!(category = %e.category(), error = %e, "Probe failed");
                    write(output, &format!("{}\n", e.user_message())).await?;
                }
            },
            Screen::Chat => {
                write(output, &format!("{}\n", THINKING)).await?;
                match controller.submit_question(line).await {
                    Ok(answer) => {
                        debug!(sources = answer.sources.len(), "Answered");
                        let history = controller
                            .context()
                            .map(|ctx| render_history(ctx.retrieval.history()))
                            .unwrap_or_default();
                        write(output, &format!("{}\n\n{}\n", answer.text, history)).await?;
                    }
                    Err(e) => {
                        error!(category = %e.category(), error = %e, "Question failed");
                        write(output, &format!("{}\n", e.user_message())).await?;
                    }
                }
            }
        }
    }

    write(output, "\n").await?;
    Ok(())
}
