pub mod animation;
pub mod party;
pub mod vision;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::backend::ToolDef;

/// Lamp-wide flags shared by every tool.
#[derive(Debug)]
pub struct LampState {
    sleeping: AtomicBool,
    motors_enabled: bool,
}

impl LampState {
    pub fn new(motors_enabled: bool) -> Self {
        Self {
            sleeping: AtomicBool::new(false),
            motors_enabled,
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::SeqCst)
    }

    pub fn set_sleeping(&self, sleeping: bool) {
        self.sleeping.store(sleeping, Ordering::SeqCst);
    }

    /// False in headless mode (no servo hardware attached).
    pub fn motors_enabled(&self) -> bool {
        self.motors_enabled
    }
}

/// All tools available to the conversational agent.
pub struct ToolRegistry {
    pub animation: Arc<animation::AnimationTool>,
    pub vision: vision::VisionTool,
    pub party: party::PartyTool,
}

impl ToolRegistry {
    pub fn new(
        animation: Arc<animation::AnimationTool>,
        vision: vision::VisionTool,
        party: party::PartyTool,
    ) -> Self {
        Self {
            animation,
            vision,
            party,
        }
    }

    /// Return all tool definitions for the LLM.
    pub fn tool_defs(&self) -> Vec<ToolDef> {
        let mut defs = animation::AnimationTool::tool_defs();
        defs.extend(vision::VisionTool::tool_defs());
        defs.extend(party::PartyTool::tool_defs());
        defs
    }

    /// Execute a tool by name with given input. Tool failures are reported in
    /// the returned text; `Err` is reserved for malformed calls.
    pub async fn execute(&self, name: &str, input: &Value) -> Result<String> {
        let arg = |key: &str| str_arg(name, input, key);
        let text = match name {
            "get_available_recordings" => self.animation.get_available_recordings(),
            "play_recording" => self.animation.play_recording(arg("recording_name")?).await,
            "start_dancing" => self.animation.start_dancing(),
            "stop_dancing" => self.animation.stop_dancing(),
            "set_dance_intensity" => self.animation.set_dance_intensity(arg("intensity")?),
            "play_animation" => self.animation.play_animation(arg("animation_type")?).await,
            "play_rock_paper_scissors" => self.vision.play_rock_paper_scissors().await,
            "describe_scene" => self.vision.describe_scene(),
            "get_scene_details" => self.vision.get_scene_details(),
            "play_party_music" => self.party.play_party_music(arg("party_theme")?).await,
            "party_rgb_animation" => self.party.party_rgb_animation(arg("party_theme")?).await,
            "party_start_sound_effect" => self.party.party_start_sound_effect().await,
            "party_play_recording" => {
                self.party
                    .party_play_recording(arg("recording_name")?)
                    .await
            }
            _ => format!("Unknown tool: {name}"),
        };
        Ok(text)
    }
}

fn str_arg<'a>(tool: &str, input: &'a Value, key: &str) -> Result<&'a str> {
    input[key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("{tool}: missing string argument '{key}'"))
}
