//! Interactive documentation-assistant chat over a real provider.
//!
//! Reads keys from the environment (or a .env file) and streams replies into
//! the terminal as they arrive. Optionally point DOC_PATH at a markdown file
//! to chat about that page.
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...        # and/or GEMINI_API_KEY=...
//! export ASSISTANT_PROVIDER=openai    # or gemini
//! export DOC_PATH=README.md           # optional page context
//! cargo run --example doc_chat
//! ```
//!
//! Commands: `/provider <id>` switches backend, `/reset` clears the
//! transcript, `/quit` exits.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use doc_assistant::providers::{gemini, openai};
use doc_assistant::{
    AssistantSession, DocContext, DocMeta, MemorySettingsStore, ProviderRegistry, Role, Settings,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut settings = Settings::default();
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        settings.provider_mut(openai::PROVIDER_ID).api_key = key;
    }
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        settings.provider_mut(gemini::PROVIDER_ID).api_key = key;
    }
    if let Ok(provider) = std::env::var("ASSISTANT_PROVIDER") {
        settings.active_provider = provider;
    }

    let context = match std::env::var("DOC_PATH") {
        Ok(path) => {
            let meta = DocMeta::new(path.clone());
            DocContext::from_file(&path, meta)
        }
        Err(_) => DocContext::empty(),
    };

    let session = Arc::new(AssistantSession::new(
        ProviderRegistry::standard()?,
        Box::new(MemorySettingsStore::with_settings(settings)),
        context,
    ));

    println!("doc-assistant chat ({})", session.settings().active_provider);
    for descriptor in session.descriptors() {
        println!("  {} - {}", descriptor.id, descriptor.description);
    }
    if session.context().is_too_long() {
        println!("note: DOC_PATH content is over the context limit and will be rejected");
    }
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if line == "/quit" {
            break;
        }
        if line == "/reset" {
            session.reset();
            println!("(transcript cleared)\n");
            continue;
        }
        if let Some(id) = line.strip_prefix("/provider ") {
            let id = id.trim().to_string();
            session.update_settings(|s| s.active_provider = id.clone())?;
            println!("(active provider: {id})\n");
            continue;
        }

        print!("assistant> ");
        std::io::stdout().flush()?;

        let turn_start = session.messages().len();
        let worker = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send(&line).await })
        };

        // Mirror the assistant message as it grows. Content only ever gets
        // appended to, so a byte offset into a previous snapshot stays on a
        // char boundary. A rejected send appends nothing, so the transcript
        // length gate keeps older replies from being re-printed.
        let mut printed = 0;
        loop {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let messages = session.messages();
            if messages.len() > turn_start {
                if let Some(last) = messages.last() {
                    if last.role == Role::Assistant && last.content.len() > printed {
                        print!("{}", &last.content[printed..]);
                        std::io::stdout().flush()?;
                        printed = last.content.len();
                    }
                }
            }
            if worker.is_finished() {
                break;
            }
        }
        worker.await?;

        let messages = session.messages();
        if messages.len() > turn_start {
            if let Some(last) = messages.last() {
                if last.role == Role::Assistant && last.content.len() > printed {
                    print!("{}", &last.content[printed..]);
                }
            }
        }
        println!();

        if let Some(error) = session.last_error() {
            println!("({})", error.message);
            session.clear_error();
        }
        println!();
    }

    Ok(())
}
