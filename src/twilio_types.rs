use crate::types::{CarrierInstruction, GatherSpec};

pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

/// Serialize a carrier instruction to a TwiML document.  Total over every instruction, so a
/// response can always be produced.
pub fn build_twiml(instruction: &CarrierInstruction) -> String {
    let actions = match instruction {
        CarrierInstruction::PromptAndGather { prompt, gather }
        | CarrierInstruction::Reprompt { prompt, gather } => {
            let say = SayAction {
                text: prompt.clone(),
            };
            vec![ResponseAction::Gather(gather_action(
                gather,
                vec![GatherNested::Say(say)],
            ))]
        }
        CarrierInstruction::PlayAndGather { url, gather } => {
            let play = PlayAction { url: url.clone() };
            vec![
                ResponseAction::Play(play),
                ResponseAction::Gather(gather_action(gather, vec![])),
            ]
        }
    };
    wrap_twiml(xmlserde::xml_serialize(Response { actions }))
}

fn gather_action(gather: &GatherSpec, nested: Vec<GatherNested>) -> GatherAction {
    GatherAction {
        input: Some(GatherInput::Speech),
        timeout: Some(gather.timeout_secs),
        action: Some(gather.action.clone()),
        method: Some("POST".to_string()),
        nested,
    }
}

mod twiml {
    use xmlserde::xml_serde_enum;
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Play")]
        Play(PlayAction),
        #[xmlserde(name = b"Gather")]
        Gather(GatherAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct PlayAction {
        #[xmlserde(ty = "text")]
        pub url: String,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct GatherAction {
        #[xmlserde(name = b"input", ty = "attr")]
        pub input: Option<GatherInput>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: Option<String>,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
        #[xmlserde(ty = "untag")]
        pub nested: Vec<GatherNested>,
    }

    /// Verbs allowed inside a `<Gather>`.
    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum GatherNested {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
    }

    xml_serde_enum! {
        #[derive(PartialEq, Eq, Debug)]
        GatherInput {
            Speech => "speech",
        }
    }
}
pub use twiml::*;

mod webhook {
    use serde::{Deserialize, Deserializer};

    /// The fields of a Twilio `<Gather>` callback this service reads.  Twilio posts many more;
    /// they are ignored.
    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioGatherPayload {
        pub call_sid: Option<String>,
        pub speech_result: Option<String>,
        /// Twilio sometimes sends this empty; an unreadable score is just no score.
        #[serde(default, deserialize_with = "lenient_score")]
        pub confidence: Option<f32>,
    }

    fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| s.trim().parse().ok()))
    }

    impl TwilioGatherPayload {
        /// The recognized utterance, if the caller said anything.
        pub fn utterance(&self) -> Option<&str> {
            self.speech_result
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
        }
    }
}
pub use webhook::*;
