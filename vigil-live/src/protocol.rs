//! Wire protocol of the remote detection engine
//!
//! JSON frames over a WebSocket. Outbound frames are externally tagged
//! (`{"setup": {...}}`, `{"realtimeInput": {...}}`, `{"toolResponse": {...}}`);
//! inbound frames carry one optional field per message kind.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use vigil_audio::EncodedFrame;

/// Name of the single tool the engine may invoke
pub const DISTRESS_TOOL_NAME: &str = "trigger_distress_alert";

/// Result returned to the engine for every distress invocation
pub const ALERTS_SENT: &str = "ALERTS_SENT";

/// Reason recorded when the engine omits one
pub const UNSPECIFIED_REASON: &str = "Unspecified distress";

/// Engine confidence a call is expected to clear before it is issued
pub const CONFIDENCE_THRESHOLD: f64 = 0.95;

/// Standing instruction sent with every setup frame
pub fn system_directive() -> String {
    format!(
        "\
You are a silent acoustic safety monitor listening to a live microphone feed. \
Never speak. Never produce audio or text replies of any kind.

Your only action is to call the {tool} tool, and only when you \
are more than {percent:.0}% confident (confidence > {threshold:.2}) that the speaker is in genuine, \
life-threatening distress: mortal fear, a panic attack, or speech under coercion.

Report the reason you heard, the emotion (MORTAL_FEAR, PANIC_ATTACK or COERCION) \
and your confidence.

Do NOT call the tool for:
- calm, joking or sarcastic use of phrases such as \"help\" or \"help me\";
- happy or excited screaming with a stable harmonic structure, such as play, \
celebrations, sports or amusement rides;
- rhythmic, controlled shouting such as chanting, singing, exercise or cheering.

When in doubt, stay silent.",
        tool = DISTRESS_TOOL_NAME,
        percent = CONFIDENCE_THRESHOLD * 100.0,
        threshold = CONFIDENCE_THRESHOLD,
    )
}

/// Emotion classification attached to a distress call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Emotion {
    MortalFear,
    PanicAttack,
    Coercion,
    /// Anything the engine sent that is not one of the declared values
    #[serde(other)]
    Unknown,
}

impl Emotion {
    pub const DECLARED: [Emotion; 3] = [Emotion::MortalFear, Emotion::PanicAttack, Emotion::Coercion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MortalFear => "MORTAL_FEAR",
            Self::PanicAttack => "PANIC_ATTACK",
            Self::Coercion => "COERCION",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive; unrecognised text maps to `Unknown`
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::DECLARED
            .into_iter()
            .find(|e| e.as_str() == normalized)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// One PCM frame
    pub fn audio(frame: &EncodedFrame) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: EncodedFrame::mime_type(),
                data: frame.data.clone(),
            }],
        })
    }

    /// Acknowledge a distress invocation
    pub fn tool_ack(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id: id.into(),
                name: name.into(),
                response: FunctionResult {
                    result: ALERTS_SENT.to_string(),
                },
            }],
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Tool>,
}

impl Setup {
    /// Setup frame declaring the distress tool and the silent-monitor directive
    pub fn distress_monitor(model: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Self {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
            },
            system_instruction: Content {
                parts: vec![Part {
                    text: system_directive(),
                }],
            },
            tools: vec![Tool {
                function_declarations: vec![distress_tool()],
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The one invokable tool
pub fn distress_tool() -> FunctionDeclaration {
    let emotions: Vec<&str> = Emotion::DECLARED.iter().map(Emotion::as_str).collect();

    FunctionDeclaration {
        name: DISTRESS_TOOL_NAME.to_string(),
        description: "Raise an emergency alert when the speaker is in genuine, \
                      life-threatening distress."
            .to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "reason": {
                    "type": "STRING",
                    "description": "What was heard that indicates distress"
                },
                "emotion": {
                    "type": "STRING",
                    "enum": emotions,
                    "description": "Classified emotional state of the speaker"
                },
                "confidence": {
                    "type": "NUMBER",
                    "description": "Detection confidence between 0 and 1"
                }
            },
            "required": ["reason", "emotion"]
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: FunctionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionResult {
    pub result: String,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    /// Audio replies; never rendered
    #[serde(default)]
    pub server_content: Option<Value>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
    #[serde(default)]
    pub tool_call_cancellation: Option<ToolCallCancellation>,
}

impl ServerMessage {
    pub fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    pub fn is_distress(&self) -> bool {
        self.name == DISTRESS_TOOL_NAME
    }

    /// Read the distress arguments without rejecting malformed ones
    pub fn distress_trigger(&self) -> DistressTrigger {
        let reason = self
            .args
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(UNSPECIFIED_REASON)
            .to_string();

        let emotion = self
            .args
            .get("emotion")
            .and_then(Value::as_str)
            .map(Emotion::parse)
            .unwrap_or(Emotion::Unknown);

        let confidence = self.args.get("confidence").and_then(Value::as_f64);

        DistressTrigger {
            call_id: self.id.clone(),
            reason,
            emotion,
            confidence,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// A distress invocation as seen by the controller
#[derive(Debug, Clone, PartialEq)]
pub struct DistressTrigger {
    pub call_id: String,
    pub reason: String,
    pub emotion: Emotion,
    pub confidence: Option<f64>,
}
