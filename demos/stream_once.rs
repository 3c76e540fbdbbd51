//! Drive one provider adapter directly, without the session controller.
//!
//! Shows the lower-level streaming surface: build a request, open the
//! increment stream, and print fragments as the transport delivers them.
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! export ASSISTANT_PROVIDER=gemini
//! cargo run --example stream_once
//! ```

use std::io::Write;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use doc_assistant::providers::{gemini, openai};
use doc_assistant::{DocContext, ProviderRegistry, Settings, StreamRequest};

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

    let registry = ProviderRegistry::standard()?;
    let adapter = registry.get(&settings.active_provider);
    println!(
        "streaming once via {} ({})",
        adapter.id(),
        adapter.resolve_model(&settings)
    );

    let request = StreamRequest::new(
        "Summarize what server-sent events are in two sentences.",
        Vec::new(),
        DocContext::empty(),
        settings,
        CancellationToken::new(),
    );

    let mut increments = adapter.stream(&request).await?;
    while let Some(item) = increments.next().await {
        match item {
            Ok(text) => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("\nstream failed: {e}");
                break;
            }
        }
    }
    println!();

    Ok(())
}
