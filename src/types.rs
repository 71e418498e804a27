use crate::dialogue::DialogueController;

/// Where and how long the carrier should listen for the caller's next utterance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatherSpec {
    pub timeout_secs: u16,
    /// Callback the carrier posts the recognized speech to.
    pub action: String,
}

/// What the carrier should do next on a call.  One per webhook response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CarrierInstruction {
    /// Call just connected: speak the greeting, then listen.
    PromptAndGather { prompt: String, gather: GatherSpec },
    /// A reply was rendered and published: play it, then listen.
    PlayAndGather { url: String, gather: GatherSpec },
    /// The turn failed somewhere; ask the caller to say it again.
    Reprompt { prompt: String, gather: GatherSpec },
}

impl CarrierInstruction {
    pub fn kind(&self) -> &'static str {
        match self {
            CarrierInstruction::PromptAndGather { .. } => "prompt_and_gather",
            CarrierInstruction::PlayAndGather { .. } => "play_and_gather",
            CarrierInstruction::Reprompt { .. } => "reprompt",
        }
    }
}

pub struct AppState {
    pub dialogue: DialogueController,
}
