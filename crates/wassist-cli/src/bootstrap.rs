use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use wassist_bus::EventBus;
use wassist_channels::TwilioTranscriber;
use wassist_core::connectors::{
    BraveWebSearch, GoogleCalendar, GooglePlaces, GoogleSheetsContacts, ResendEmailSender,
    WebSearch,
};
use wassist_core::*;
use wassist_memory::{
    EmbeddingProvider, HybridMemory, MemoryBackend, MemoryStore, OpenAiEmbeddingProvider,
    StubEmbeddingProvider,
};
use wassist_provider::OpenAiProvider;

const BUS_CAPACITY: usize = 256;

/// Everything a front end (HTTP server or REPL) needs to handle messages.
pub struct App {
    pub config: WassistConfig,
    pub bus: EventBus,
    pub dispatcher: Arc<Dispatcher>,
    pub memory: Option<Arc<dyn MemoryBackend>>,
    pub memory_writer: Option<JoinHandle<()>>,
}

pub fn resolve_under(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn embedding_provider(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    if config.provider == "openai" {
        if config.api_key.trim().is_empty() {
            tracing::warn!("embedding api key is empty; falling back to stub embeddings");
        } else {
            let provider = OpenAiEmbeddingProvider::with_model(
                config.api_key.clone(),
                config.model.clone(),
                config.dimensions,
            );
            return match &config.base_url {
                Some(base) => Arc::new(provider.with_base_url(base.clone())),
                None => Arc::new(provider),
            };
        }
    }
    Arc::new(StubEmbeddingProvider::new(config.dimensions))
}

/// Opens long-term memory. A store that cannot be opened disables memory
/// instead of stopping the bot.
pub fn open_memory(root: &Path, config: &MemoryConfig) -> Option<Arc<dyn MemoryBackend>> {
    if !config.enabled {
        tracing::info!("long-term memory disabled");
        return None;
    }
    let db_path = resolve_under(root, &config.db_path);
    match MemoryStore::open(&db_path) {
        Ok(store) => {
            tracing::info!(path = %db_path.display(), provider = %config.embedding.provider, "long-term memory enabled");
            Some(Arc::new(HybridMemory::new(
                store,
                embedding_provider(&config.embedding),
            )))
        }
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "memory store unavailable; continuing without memory");
            None
        }
    }
}

pub fn build_connectors(config: &WassistConfig, llm: Arc<OpenAiProvider>) -> Connectors {
    let timeout = config.timeouts.connector();
    let web_search = BraveWebSearch::from_config(&config.web_search, timeout)
        .map(|search| Arc::new(search) as Arc<dyn WebSearch>);
    if web_search.is_none() {
        tracing::info!("web search fallback disabled");
    }
    Connectors {
        email: Arc::new(ResendEmailSender::from_config(&config.email, timeout)),
        contacts: Arc::new(GoogleSheetsContacts::from_config(&config.contacts, timeout)),
        calendar: Arc::new(GoogleCalendar::from_config(&config.calendar, timeout)),
        places: Arc::new(GooglePlaces::from_config(&config.places, timeout)),
        web_search,
        transcriber: Arc::new(TwilioTranscriber::new(
            &config.twilio.account_sid,
            &config.twilio.auth_token,
            llm,
            config.timeouts.transcription(),
        )),
    }
}

pub async fn bootstrap(root: &Path) -> Result<App> {
    let config = load_config(&root.join("config"))
        .with_context(|| format!("loading config under {}", root.display()))?;
    let offset = offset_from_hours(config.app.utc_offset_hours)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(offset));

    let llm = Arc::new(
        OpenAiProvider::new(&config.llm.api_key, &config.llm.api_base)
            .with_transcription_model(&config.llm.transcription_model),
    );
    let extractor = Arc::new(LlmIntentExtractor::new(
        llm.clone(),
        &config.llm.model,
        &config.app.signature,
        clock.clone(),
    ));
    let reviser = Arc::new(LlmDraftReviser::new(
        llm.clone(),
        &config.llm.model,
        &config.app.signature,
    ));
    let connectors = build_connectors(&config, llm);

    let bus = EventBus::new(BUS_CAPACITY);
    let memory = open_memory(root, &config.memory);
    let memory_writer = match &memory {
        Some(memory) => Some(MemoryWriter::new(memory.clone()).spawn(&bus).await),
        None => None,
    };

    let dispatcher = Arc::new(Dispatcher::new(
        ConversationStore::new(),
        extractor,
        reviser,
        connectors,
        memory.clone(),
        bus.publisher(),
        clock,
        config.timeouts.clone(),
    ));

    tracing::info!(
        env = %config.app.env,
        utc_offset = %offset_label(&offset),
        model = %config.llm.model,
        "wassist bootstrapped"
    );

    Ok(App {
        config,
        bus,
        dispatcher,
        memory,
        memory_writer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(root: &Path, body: &str) {
        let dir = root.join("config");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("main.yaml"), body).unwrap();
    }

    #[test]
    fn relative_paths_live_under_root() {
        let root = Path::new("/srv/wassist");
        assert_eq!(
            resolve_under(root, "data/memory.db"),
            PathBuf::from("/srv/wassist/data/memory.db")
        );
        assert_eq!(
            resolve_under(root, "/var/lib/memory.db"),
            PathBuf::from("/var/lib/memory.db")
        );
    }

    #[test]
    fn disabled_memory_opens_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(open_memory(tmp.path(), &MemoryConfig::default()).is_none());
    }

    #[tokio::test]
    async fn bootstrap_wires_memory_and_writer() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
llm:
  api_key: sk-test
web_search:
  enabled: false
memory:
  enabled: true
  db_path: data/memory.db
  embedding:
    provider: stub
    dimensions: 8
"#,
        );

        let app = bootstrap(tmp.path()).await.unwrap();
        assert!(app.memory.is_some());
        assert!(app.memory_writer.is_some());
        assert!(tmp.path().join("data/memory.db").exists());
        assert_eq!(app.config.app.utc_offset_hours, 4);
    }

    #[tokio::test]
    async fn bootstrap_rejects_missing_llm_key() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "llm:\n  api_key: \"\"\n");
        assert!(bootstrap(tmp.path()).await.is_err());
    }
}
