use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use fileagent::agent::{AgentEvent, AgentSession, TurnOutcome};

pub async fn run_chat_loop(mut session: AgentSession) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("Type your message. Type quit, exit or q to leave, /clear to reset.");
    println!("{}", "-".repeat(50));
    loop {
        let line = match rl.readline("You > ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("👋 Goodbye!");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let input = line.trim();
        if input.eq_ignore_ascii_case("/clear") {
            session.clear_history();
            println!("[Cleared]");
            continue;
        }
        if !input.is_empty() {
            let _ = rl.add_history_entry(input);
        }

        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(evt_rx));
        let result = session.handle_input(input, Some(evt_tx)).await;
        let _ = printer.await;

        match result {
            Ok(TurnOutcome::Exit) => {
                println!("👋 Goodbye!");
                break;
            }
            Ok(TurnOutcome::Ignored) | Ok(TurnOutcome::Reply(_)) => {}
            // Already printed by the event printer; only configuration faults end the session.
            Err(e) if e.is_recoverable() => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<AgentEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::LlmText(text) => println!("\n🤖 Agent: {}", text),
            AgentEvent::ToolStart { name, arguments } => {
                println!("🔧 Calling tool: {} with args: {}", name, arguments)
            }
            AgentEvent::ToolEnd { name, result } => {
                println!("   [{} returned {} chars]", name, result.chars().count())
            }
            AgentEvent::Done(text) => println!("\n🤖 Agent: {}\n", text),
            AgentEvent::Error(e) => println!("\n[Error: {}]\n", e),
        }
    }
}
