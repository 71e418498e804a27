use crate::consts::GATHER_TIMEOUT_SECS;
use crate::error::ConfigError;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Container/codec of the synthesized audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioContainer {
    Mp3,
    Linear16,
    Mulaw,
}

impl AudioContainer {
    /// Name of the encoding as the Google TTS API spells it.
    pub fn google_name(&self) -> &'static str {
        match self {
            AudioContainer::Mp3 => "MP3",
            AudioContainer::Linear16 => "LINEAR16",
            AudioContainer::Mulaw => "MULAW",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioContainer::Mp3 => "mp3",
            AudioContainer::Linear16 | AudioContainer::Mulaw => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioContainer::Mp3 => "audio/mpeg",
            AudioContainer::Linear16 | AudioContainer::Mulaw => "audio/wav",
        }
    }
}

impl std::str::FromStr for AudioContainer {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MP3" => Ok(AudioContainer::Mp3),
            "LINEAR16" | "WAV" => Ok(AudioContainer::Linear16),
            "MULAW" => Ok(AudioContainer::Mulaw),
            _ => Err(()),
        }
    }
}

/// Audio output format, fixed at startup and shared read-only by every synthesis call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioEncodingSpec {
    pub container: AudioContainer,
    pub sample_rate_hertz: u32,
    pub bit_rate_kbps: u32,
    pub channels: u16,
}

impl std::fmt::Display for AudioEncodingSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {}Hz {}kbps {}ch",
            self.container.google_name(),
            self.sample_rate_hertz,
            self.bit_rate_kbps,
            self.channels
        )
    }
}

impl Default for AudioEncodingSpec {
    /// 16kHz 32kbps mono MP3
    fn default() -> Self {
        Self {
            container: AudioContainer::Mp3,
            sample_rate_hertz: 16_000,
            bit_rate_kbps: 32,
            channels: 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct TtsConfig {
    pub base_url: String,
    pub language_code: String,
    pub voice_name: String,
    pub encoding: AudioEncodingSpec,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub base_url: String,
    pub public_base_url: String,
    pub bucket: String,
    pub prefix: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub google_credentials_path: String,
    pub openai: OpenAIConfig,
    pub tts: TtsConfig,
    pub storage: StorageConfig,
    pub turn_deadline: Duration,
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; the variables may come from the real environment.
        let _ = dotenvy::dotenv();
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            vars.get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &'static str, default: &str| -> String {
            vars.get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        fn parsed<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { name, value })
        }

        let openai = OpenAIConfig {
            api_key: required("OPENAI_API_KEY")?,
            base_url: optional("OPENAI_BASE_URL", "https://api.openai.com"),
            model: optional("OPENAI_MODEL", "gpt-3.5-turbo"),
            max_tokens: parsed("OPENAI_MAX_TOKENS", optional("OPENAI_MAX_TOKENS", "150"))?,
        };

        let encoding = AudioEncodingSpec {
            container: parsed("TTS_AUDIO_ENCODING", optional("TTS_AUDIO_ENCODING", "MP3"))?,
            sample_rate_hertz: parsed(
                "TTS_SAMPLE_RATE_HERTZ",
                optional("TTS_SAMPLE_RATE_HERTZ", "16000"),
            )?,
            ..Default::default()
        };
        let tts = TtsConfig {
            base_url: optional("TTS_BASE_URL", "https://texttospeech.googleapis.com"),
            language_code: optional("TTS_LANGUAGE_CODE", "en-US"),
            voice_name: optional("TTS_VOICE_NAME", "en-US-Standard-E"),
            encoding,
        };

        let storage = StorageConfig {
            base_url: optional("STORAGE_BASE_URL", "https://storage.googleapis.com"),
            public_base_url: optional("PUBLIC_ASSET_BASE_URL", "https://storage.googleapis.com"),
            bucket: required("GCS_BUCKET")?,
            prefix: optional("ASSET_PREFIX", "responses"),
        };

        let deadline_millis: u64 =
            parsed("TURN_DEADLINE_MILLIS", optional("TURN_DEADLINE_MILLIS", "8000"))?;
        if deadline_millis >= u64::from(GATHER_TIMEOUT_SECS) * 1_000 {
            return Err(ConfigError::DeadlineTooLong {
                deadline_millis,
                gather_timeout_secs: GATHER_TIMEOUT_SECS,
            });
        }

        Ok(Self {
            bind_addr: parsed("BIND_ADDR", optional("BIND_ADDR", "0.0.0.0:3000"))?,
            google_credentials_path: required("GOOGLE_APPLICATION_CREDENTIALS")?,
            openai,
            tts,
            storage,
            turn_deadline: Duration::from_millis(deadline_millis),
        })
    }
}
