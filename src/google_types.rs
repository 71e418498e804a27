//! Wire types for the Google Cloud Text-to-Speech v1 and Cloud Storage JSON APIs.  Only the fields
//! this service reads or writes are modelled.

mod texttospeech {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct SynthesisInput {
        pub text: String,
    }

    #[derive(Serialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct VoiceSelectionParams {
        pub language_code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
    }

    #[derive(Serialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct AudioConfig {
        pub audio_encoding: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub sample_rate_hertz: Option<u32>,
    }

    #[derive(Serialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct SynthesizeSpeechRequest {
        pub input: SynthesisInput,
        pub voice: VoiceSelectionParams,
        pub audio_config: AudioConfig,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct SynthesizeSpeechResponse {
        /// Base64 encoded audio bytes.
        #[serde(default)]
        pub audio_content: Option<String>,
    }

    /// Body of a non-2xx reply from any Google API.
    #[derive(Deserialize, Debug)]
    pub struct GoogleErrorResponse {
        pub error: GoogleErrorDetail,
    }

    #[derive(Deserialize, Debug)]
    pub struct GoogleErrorDetail {
        #[serde(default)]
        pub code: u16,
        #[serde(default)]
        pub message: String,
        #[serde(default)]
        pub status: Option<String>,
    }
}
pub use texttospeech::*;

mod storage {
    use serde::Deserialize;

    /// Subset of the object resource returned by uploads.
    #[derive(Deserialize, Debug)]
    pub struct StorageObject {
        pub name: String,
        pub bucket: String,
        #[serde(default)]
        pub size: Option<String>,
        #[serde(default)]
        pub generation: Option<String>,
    }
}
pub use storage::*;
