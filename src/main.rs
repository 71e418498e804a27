mod assets;
mod completion;
mod config;
mod dialogue;
mod error;
mod google_types;
mod handlers;
mod openai_types;
mod tts;
mod twilio_types;
mod types;
mod utils;

use crate::assets::GcsPublisher;
use crate::completion::OpenAICompletion;
use crate::config::Config;
use crate::dialogue::{DialogueController, TurnSettings};
use crate::error::handle_error;
use crate::tts::GoogleTts;
use crate::types::AppState;
use crate::utils::GoogleAuth;

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

pub mod consts {
    pub const GREETING: &str = "Hello, please tell me something.";
    pub const REPROMPT: &str = "Sorry, I didn't catch that. Could you say that again?";
    pub const SYSTEM_PROMPT: &str = "You are a friendly and helpful assistant speaking with a caller on the phone.  Keep answers short.";
    pub const WEBHOOK_PATH: &str = "/twilio/webhook";
    pub const GATHER_TIMEOUT_SECS: u16 = 10;
    pub const RETRY_BASE_DELAY_MILLIS: u64 = 200;
    pub const GOOGLE_CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
}

#[tokio::main]
async fn main() -> ExitCode {
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            (
                "twilio_voice_turns",
                tracing_subscriber::filter::LevelFilter::DEBUG,
            ),
        ]));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
        return ExitCode::FAILURE;
    }

    // Configuration problems stop us before we ever accept a callback.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            handle_error(e);
            return ExitCode::FAILURE;
        }
    };
    let google_auth = match GoogleAuth::from_service_account_file(&config.google_credentials_path)
        .await
    {
        Ok(auth) => Arc::new(auth),
        Err(e) => {
            handle_error(e);
            return ExitCode::FAILURE;
        }
    };

    let http_client = reqwest::Client::new();
    let dialogue = DialogueController::new(
        Arc::new(OpenAICompletion::new(
            http_client.clone(),
            config.openai.clone(),
        )),
        Arc::new(GoogleTts::new(
            http_client.clone(),
            google_auth.clone(),
            config.tts.clone(),
        )),
        Arc::new(GcsPublisher::new(
            http_client,
            google_auth,
            config.storage.clone(),
        )),
        TurnSettings::from_config(&config),
    );
    let app_state = Arc::new(AppState { dialogue });
    let app = handlers::router(app_state);

    info!(
        addr=%config.bind_addr,
        bucket=%config.storage.bucket,
        encoding=%config.tts.encoding,
        "listening for twilio callbacks"
    );
    let server = match axum::Server::try_bind(&config.bind_addr) {
        Ok(builder) => builder.serve(app.into_make_service()),
        Err(e) => {
            error!(error=%e, addr=%config.bind_addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = server.await {
        error!(error=%e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
