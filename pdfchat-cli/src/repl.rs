//! Interactive question loop.

use anyhow::Result;
use pdfchat_rag::{AskResponse, ChatService, RagError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

const HELP: &str = "Commands: /reset starts a new conversation, /quit exits.";

/// Run a blocking terminal read without stalling the runtime's other tasks.
///
/// Needs the multi-threaded runtime that `#[tokio::main]` starts.
fn blocking_read<T>(read: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(read)
}

pub async fn run(service: &ChatService) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask a question about your documents. {HELP}");

    loop {
        let line = match blocking_read(|| editor.readline("you> ")) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if let Err(e) = editor.add_history_entry(question) {
            warn!(error = %e, "failed to record input history");
        }

        match question {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/reset" => {
                service.reset_session().await?;
                println!("Started a new conversation.");
            }
            _ => match service.ask(question).await {
                Ok(response) => print_answer(&response),
                Err(e @ RagError::SessionFailed) => {
                    eprintln!("error: {e}. Type /reset to continue.");
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    eprintln!("The question was not answered. Type /reset to continue.");
                }
            },
        }
    }
    Ok(())
}

pub fn print_answer(response: &AskResponse) {
    println!("\n{}\n", response.answer.trim());
    let mut sources: Vec<String> = response
        .sources
        .iter()
        .map(|chunk| match chunk.page {
            Some(page) => format!("{} (page {})", chunk.source, page + 1),
            None => chunk.source.clone(),
        })
        .collect();
    sources.dedup();
    if !sources.is_empty() {
        println!("Sources: {}\n", sources.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn blocking_read_lets_other_tasks_run() {
        let (line_tx, line_rx) = mpsc::channel();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        // Occupies the only worker until a line arrives.
        let reader = tokio::spawn(async move {
            started_tx.send(()).unwrap();
            blocking_read(|| line_rx.recv_timeout(Duration::from_secs(5)))
        });
        started_rx.await.unwrap();
        tokio::spawn(async move { line_tx.send("what is this about?").unwrap() });

        assert_eq!(reader.await.unwrap(), Ok("what is this about?"));
    }
}
