use crate::assets::{content_key, AssetStore};
use crate::completion::Completion;
use crate::config::{AudioEncodingSpec, Config};
use crate::consts::{
    GATHER_TIMEOUT_SECS, GREETING, REPROMPT, RETRY_BASE_DELAY_MILLIS, WEBHOOK_PATH,
};
use crate::error::{CompletionError, PublishError, TurnError};
use crate::tts::SpeechSynthesizer;
use crate::types::{CarrierInstruction, GatherSpec};
use crate::utils::retry_once;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Knobs for a dialogue turn, fixed at startup.
#[derive(Clone, Debug)]
pub struct TurnSettings {
    pub max_tokens: u32,
    pub encoding: AudioEncodingSpec,
    pub asset_prefix: String,
    /// Budget for the whole turn; must leave the caller less silence than the gather timeout.
    pub turn_deadline: Duration,
    pub retry_base_delay: Duration,
    pub gather: GatherSpec,
}

impl TurnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.openai.max_tokens,
            encoding: config.tts.encoding,
            asset_prefix: config.storage.prefix.clone(),
            turn_deadline: config.turn_deadline,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MILLIS),
            gather: GatherSpec {
                timeout_secs: GATHER_TIMEOUT_SECS,
                action: WEBHOOK_PATH.to_string(),
            },
        }
    }
}

/// Turns one webhook callback into one carrier instruction.  Holds no per-call state: every
/// callback is decided only by whether it carries an utterance.
pub struct DialogueController {
    completion: Arc<dyn Completion>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    assets: Arc<dyn AssetStore>,
    settings: TurnSettings,
}

impl DialogueController {
    pub fn new(
        completion: Arc<dyn Completion>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        assets: Arc<dyn AssetStore>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            completion,
            synthesizer,
            assets,
            settings,
        }
    }

    /// Never fails: any error inside the turn degrades to a re-prompt.
    pub async fn respond(&self, call_sid: &str, utterance: Option<&str>) -> CarrierInstruction {
        let Some(utterance) = utterance else {
            debug!(call_sid=%call_sid, "no speech result; prompting caller");
            return CarrierInstruction::PromptAndGather {
                prompt: GREETING.to_string(),
                gather: self.settings.gather.clone(),
            };
        };

        let started = Instant::now();
        let deadline = self.settings.turn_deadline;
        let outcome = match tokio::time::timeout(deadline, self.turn(call_sid, utterance)).await {
            Ok(res) => res,
            Err(_) => Err(TurnError::DeadlineExceeded(deadline.as_millis())),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(url) => {
                info!(call_sid=%call_sid, url=%url, elapsed_ms, "turn complete");
                CarrierInstruction::PlayAndGather {
                    url,
                    gather: self.settings.gather.clone(),
                }
            }
            Err(e) => {
                error!(call_sid=%call_sid, error=%e, elapsed_ms, "turn failed; re-prompting caller");
                CarrierInstruction::Reprompt {
                    prompt: REPROMPT.to_string(),
                    gather: self.settings.gather.clone(),
                }
            }
        }
    }

    /// Completion, then synthesis, then publish; each step needs the previous one's output.
    async fn turn(&self, call_sid: &str, utterance: &str) -> Result<String, TurnError> {
        let settings = &self.settings;
        debug!(call_sid=%call_sid, utterance=%utterance, "starting turn");

        let reply = retry_once(
            "completion",
            settings.retry_base_delay,
            CompletionError::is_transient,
            || self.completion.complete(utterance, settings.max_tokens),
        )
        .await?;
        debug!(call_sid=%call_sid, reply=%reply, "got reply text");

        let key = content_key(&settings.asset_prefix, &reply, &settings.encoding);
        match self.assets.exists(&key).await {
            Ok(true) => {
                debug!(call_sid=%call_sid, content_key=%key, "reusing published audio");
                return Ok(self.assets.url_for(&key));
            }
            Ok(false) => (),
            Err(e) => warn!(error=%e, content_key=%key, "asset lookup failed; synthesizing anyway"),
        }

        let audio = self
            .synthesizer
            .synthesize(&reply, &settings.encoding)
            .await?;
        debug!(call_sid=%call_sid, bytes = audio.len(), "synthesized reply");

        let content_type = settings.encoding.container.mime_type();
        let url = retry_once(
            "publish",
            settings.retry_base_delay,
            PublishError::is_transient,
            || self.assets.publish(&key, audio.clone(), content_type),
        )
        .await?;
        debug!(call_sid=%call_sid, content_key=%key, url=%url, "published reply audio");

        Ok(url)
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::error::SynthesisError;
    use http::StatusCode;
    use std::sync::Mutex;

    fn gather() -> GatherSpec {
        GatherSpec {
            timeout_secs: 10,
            action: "/twilio/webhook".to_string(),
        }
    }

    fn reprompt() -> CarrierInstruction {
        CarrierInstruction::Reprompt {
            prompt: REPROMPT.to_string(),
            gather: gather(),
        }
    }

    #[tokio::test]
    async fn call_start_prompts_without_outbound_calls() {
        let completion = Arc::new(FakeCompletion::replying("unused"));
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        let controller = build_controller(&completion, &synthesizer, &store);

        let instruction = controller.respond("CA1", None).await;

        assert_eq!(
            instruction,
            CarrierInstruction::PromptAndGather {
                prompt: "Hello, please tell me something.".to_string(),
                gather: gather(),
            }
        );
        assert_eq!(completion.calls(), 0);
        assert_eq!(synthesizer.calls(), 0);
        assert_eq!(store.publishes(), 0);
    }

    #[tokio::test]
    async fn utterance_is_answered_with_published_audio() {
        let reply = "I don't have real-time access.";
        let completion = Arc::new(FakeCompletion::replying(reply));
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        let controller = build_controller(&completion, &synthesizer, &store);

        let instruction = controller.respond("CA1", Some("What time is it?")).await;

        let key = content_key("responses", reply, &AudioEncodingSpec::default());
        assert_eq!(
            instruction,
            CarrierInstruction::PlayAndGather {
                url: format!("https://store.example/voice/{key}"),
                gather: gather(),
            }
        );
        assert_eq!(
            store.objects.lock().unwrap().get(&key).unwrap().as_slice(),
            FAKE_MP3
        );
    }

    #[tokio::test]
    async fn repeated_reply_reuses_the_same_asset() {
        let completion = Arc::new(FakeCompletion::replying("Same answer every time."));
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        let controller = build_controller(&completion, &synthesizer, &store);

        let first = controller.respond("CA1", Some("Question one")).await;
        let second = controller.respond("CA2", Some("Question two")).await;

        assert_eq!(first, second);
        assert_eq!(completion.calls(), 2);
        assert_eq!(synthesizer.calls(), 1);
        assert_eq!(store.publishes(), 1);
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_replies_converge_on_one_object() {
        let completion = Arc::new(FakeCompletion::replying("Hello there."));
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        let controller = build_controller(&completion, &synthesizer, &store);

        let (a, b) = tokio::join!(
            controller.respond("CA1", Some("hi")),
            controller.respond("CA2", Some("hello")),
        );

        assert_eq!(a, b);
        assert_eq!(a.kind(), "play_and_gather");
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn completion_failure_reprompts() {
        let completion = Arc::new(FakeCompletion::replying("unused").then(Err(
            CompletionError::Upstream {
                status: StatusCode::UNAUTHORIZED,
            },
        )));
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        let controller = build_controller(&completion, &synthesizer, &store);

        let instruction = controller.respond("CA1", Some("What time is it?")).await;

        assert_eq!(instruction, reprompt());
        assert_eq!(completion.calls(), 1);
        assert_eq!(synthesizer.calls(), 0);
        assert_eq!(store.publishes(), 0);
    }

    #[tokio::test]
    async fn transient_completion_failure_is_retried_once() {
        let completion = Arc::new(
            FakeCompletion::replying("Recovered.").then(Err(CompletionError::RateLimited)),
        );
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        let controller = build_controller(&completion, &synthesizer, &store);

        let instruction = controller.respond("CA1", Some("Are you there?")).await;
        assert_eq!(instruction.kind(), "play_and_gather");
        assert_eq!(completion.calls(), 2);

        let completion = Arc::new(
            FakeCompletion::replying("unused")
                .then(Err(CompletionError::Network("reset".into())))
                .then(Err(CompletionError::Network("reset".into()))),
        );
        let controller = build_controller(&completion, &synthesizer, &store);
        let instruction = controller.respond("CA1", Some("Are you there?")).await;
        assert_eq!(instruction, reprompt());
        assert_eq!(completion.calls(), 2);
    }

    #[tokio::test]
    async fn synthesis_failure_reprompts_and_publishes_nothing() {
        let completion = Arc::new(FakeCompletion::replying("A fine reply."));
        let synthesizer = Arc::new(FakeSynthesizer {
            fail_with: Mutex::new(Some(SynthesisError::EngineCanceled {
                reason: "503 UNAVAILABLE".to_string(),
            })),
            ..Default::default()
        });
        let store = Arc::new(FakeStore::default());
        let controller = build_controller(&completion, &synthesizer, &store);

        let instruction = controller.respond("CA1", Some("Tell me a joke")).await;

        assert_eq!(instruction, reprompt());
        assert_eq!(synthesizer.calls(), 1);
        assert_eq!(store.publishes(), 0);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn publish_failure_never_plays_a_missing_asset() {
        let completion = Arc::new(FakeCompletion::replying("Stored nowhere."));
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        store
            .publish_failures
            .lock()
            .unwrap()
            .push_back(PublishError::Rejected {
                status: StatusCode::FORBIDDEN,
            });
        let controller = build_controller(&completion, &synthesizer, &store);

        let instruction = controller.respond("CA1", Some("Hello?")).await;

        assert_eq!(instruction, reprompt());
        assert_eq!(store.publishes(), 1);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn transient_publish_failure_is_retried_once() {
        let completion = Arc::new(FakeCompletion::replying("Second time lucky."));
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        store
            .publish_failures
            .lock()
            .unwrap()
            .push_back(PublishError::Network("connection reset".into()));
        let controller = build_controller(&completion, &synthesizer, &store);

        let instruction = controller.respond("CA1", Some("Hello?")).await;

        assert_eq!(instruction.kind(), "play_and_gather");
        assert_eq!(store.publishes(), 2);
        assert_eq!(synthesizer.calls(), 1);
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn slow_turn_hits_deadline_and_reprompts() {
        let completion = Arc::new(FakeCompletion {
            fallback: "Too late.".to_string(),
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let store = Arc::new(FakeStore::default());
        let mut settings = settings();
        settings.turn_deadline = Duration::from_millis(50);
        let controller = DialogueController::new(
            completion.clone(),
            synthesizer.clone(),
            store.clone(),
            settings,
        );

        let started = Instant::now();
        let instruction = controller.respond("CA1", Some("Anyone home?")).await;

        assert_eq!(instruction, reprompt());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(synthesizer.calls(), 0);
    }
}
