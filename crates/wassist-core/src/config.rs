use std::{fs, net::SocketAddr, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

fn default_app_name() -> String {
    "wassist".to_string()
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_utc_offset_hours() -> i32 {
    4
}

fn default_signature() -> String {
    "Rahul Menon".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: String,
    /// Fixed offset used for date answers and extraction date context.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Name the extraction prompt signs drafted emails with.
    #[serde(default = "default_signature")]
    pub signature: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: default_env(),
            utc_offset_hours: default_utc_offset_hours(),
            signature: default_signature(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:5001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            model: default_model(),
            transcription_model: default_transcription_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_extractor_secs")]
    pub extractor_secs: u64,
    #[serde(default = "default_revision_secs")]
    pub revision_secs: u64,
    #[serde(default = "default_connector_secs")]
    pub connector_secs: u64,
    #[serde(default = "default_transcription_secs")]
    pub transcription_secs: u64,
}

fn default_extractor_secs() -> u64 {
    25
}

fn default_revision_secs() -> u64 {
    20
}

fn default_connector_secs() -> u64 {
    15
}

fn default_transcription_secs() -> u64 {
    30
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            extractor_secs: default_extractor_secs(),
            revision_secs: default_revision_secs(),
            connector_secs: default_connector_secs(),
            transcription_secs: default_transcription_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn extractor(&self) -> Duration {
        Duration::from_secs(self.extractor_secs)
    }

    pub fn revision(&self) -> Duration {
        Duration::from_secs(self.revision_secs)
    }

    pub fn connector(&self) -> Duration {
        Duration::from_secs(self.connector_secs)
    }

    pub fn transcription(&self) -> Duration {
        Duration::from_secs(self.transcription_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// Sender address, e.g. `whatsapp:+14155238886`.
    #[serde(default)]
    pub whatsapp_number: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsConfig {
    #[serde(default)]
    pub sheet_id: String,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            worksheet: default_worksheet(),
            access_token: String::new(),
            api_base: None,
        }
    }
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            access_token: String::new(),
            api_base: None,
        }
    }
}

fn default_radius_m() -> u32 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_radius_m")]
    pub radius_m: u32,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            radius_m: default_radius_m(),
            api_base: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

fn default_embedding_provider() -> String {
    "stub".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `openai` or `stub`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: String::new(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: None,
        }
    }
}

fn default_db_path() -> String {
    "data/memory.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            db_path: default_db_path(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WassistConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };
        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }
    output.push_str(rest);
    output
}

/// Loads `main.yaml` from the config directory, resolves `${VAR}`
/// placeholders and validates the result.
pub fn load_config(config_dir: &Path) -> Result<WassistConfig> {
    let mut config: WassistConfig = read_yaml_file(&config_dir.join("main.yaml"))?;
    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &WassistConfig) -> Result<()> {
    if config.llm.api_key.trim().is_empty() {
        return Err(anyhow!("llm.api_key is empty"));
    }
    if !(-12..=14).contains(&config.app.utc_offset_hours) {
        return Err(anyhow!(
            "app.utc_offset_hours out of range: {}",
            config.app.utc_offset_hours
        ));
    }
    let t = &config.timeouts;
    for (name, secs) in [
        ("extractor_secs", t.extractor_secs),
        ("revision_secs", t.revision_secs),
        ("connector_secs", t.connector_secs),
        ("transcription_secs", t.transcription_secs),
    ] {
        if secs == 0 {
            return Err(anyhow!("timeouts.{name} must be greater than zero"));
        }
    }
    config
        .server
        .listen
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid server.listen: {}", config.server.listen))?;
    match config.memory.embedding.provider.as_str() {
        "openai" | "stub" => {}
        other => return Err(anyhow!("unknown embedding provider: {other}")),
    }
    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_opt(value: &mut Option<String>) {
    if let Some(v) = value {
        *v = resolve_env_var(v);
    }
}

fn resolve_config_env(config: &mut WassistConfig) {
    config.app.name = resolve_env_var(&config.app.name);
    config.app.env = resolve_env_var(&config.app.env);
    config.app.signature = resolve_env_var(&config.app.signature);
    config.server.listen = resolve_env_var(&config.server.listen);

    config.llm.api_base = resolve_env_var(&config.llm.api_base);
    config.llm.api_key = resolve_env_var(&config.llm.api_key);
    config.llm.model = resolve_env_var(&config.llm.model);

    config.twilio.account_sid = resolve_env_var(&config.twilio.account_sid);
    config.twilio.auth_token = resolve_env_var(&config.twilio.auth_token);
    config.twilio.whatsapp_number = resolve_env_var(&config.twilio.whatsapp_number);
    resolve_opt(&mut config.twilio.api_base);

    config.email.api_key = resolve_env_var(&config.email.api_key);
    config.email.sender = resolve_env_var(&config.email.sender);
    resolve_opt(&mut config.email.api_base);

    config.contacts.sheet_id = resolve_env_var(&config.contacts.sheet_id);
    config.contacts.access_token = resolve_env_var(&config.contacts.access_token);
    resolve_opt(&mut config.contacts.api_base);

    config.calendar.calendar_id = resolve_env_var(&config.calendar.calendar_id);
    config.calendar.access_token = resolve_env_var(&config.calendar.access_token);
    resolve_opt(&mut config.calendar.api_base);

    config.places.api_key = resolve_env_var(&config.places.api_key);
    resolve_opt(&mut config.places.api_base);

    resolve_opt(&mut config.web_search.api_key);
    resolve_opt(&mut config.web_search.api_base);

    config.memory.db_path = resolve_env_var(&config.memory.db_path);
    config.memory.embedding.provider = resolve_env_var(&config.memory.embedding.provider);
    config.memory.embedding.api_key = resolve_env_var(&config.memory.embedding.api_key);
    config.memory.embedding.model = resolve_env_var(&config.memory.embedding.model);
    resolve_opt(&mut config.memory.embedding.base_url);
}
