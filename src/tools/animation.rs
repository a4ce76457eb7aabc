/// Animation tools: body language of the lamp.
/// Recordings go through the animation worker; Luxo-style moves drive the
/// servos directly through a `MotorBus`.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::json;

use crate::animation::AnimationControl;
use crate::backend::ToolDef;

use super::LampState;

/// Servo center position (12-bit).
pub const CENTER: u16 = 2048;
const HEAD: &str = "head_servo";
const NECK: &str = "neck_servo";

const HEADLESS: &str =
    "Movement is not available - running in headless mode without motor hardware.";
const NOT_INITIALIZED: &str = "Animation is not available - animation service not initialized.";

/// Position-controlled servos.
pub trait MotorBus: Send + Sync {
    fn move_to<'a>(&'a self, servo: &'a str, position: u16, duration: Duration)
        -> BoxFuture<'a, Result<()>>;
}

/// One keyframe of a procedural animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Move {
        servo: &'static str,
        position: u16,
        duration: Duration,
    },
    Pause(Duration),
}

fn mv(servo: &'static str, position: u16, ms: u64) -> Step {
    Step::Move {
        servo,
        position,
        duration: Duration::from_millis(ms),
    }
}

fn pause(ms: u64) -> Step {
    Step::Pause(Duration::from_millis(ms))
}

/// Procedural animations inspired by Luxo Jr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuxoAnimation {
    /// Quick, energetic double nod.
    Nod,
    /// Slow head tilt, then a slight neck extension.
    Curious,
    /// Three quick hops on both servos.
    Excited,
    /// Slow slump to the lower limit, then a sigh.
    Sad,
}

impl LuxoAnimation {
    pub const NAMES: [&'static str; 4] = ["nod", "curious", "excited", "sad"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "nod" => Some(Self::Nod),
            "curious" => Some(Self::Curious),
            "excited" => Some(Self::Excited),
            "sad" => Some(Self::Sad),
            _ => None,
        }
    }

    pub fn steps(self) -> Vec<Step> {
        match self {
            Self::Nod => vec![
                mv(HEAD, 1800, 150),
                pause(150),
                mv(HEAD, 2300, 150),
                pause(150),
                mv(HEAD, 1900, 150),
                pause(150),
                mv(HEAD, CENTER, 150),
                pause(150),
            ],
            Self::Curious => vec![
                mv(HEAD, 2300, 600),
                pause(400),
                mv(NECK, 2200, 600),
                pause(600),
                mv(HEAD, CENTER, 800),
                mv(NECK, CENTER, 800),
                pause(800),
            ],
            Self::Excited => {
                let mut steps = Vec::with_capacity(20);
                for _ in 0..3 {
                    steps.extend([
                        mv(NECK, 1800, 100),
                        mv(HEAD, 1900, 100),
                        pause(100),
                        mv(NECK, 2300, 100),
                        mv(HEAD, 2200, 100),
                        pause(100),
                    ]);
                }
                steps.extend([mv(NECK, CENTER, 300), mv(HEAD, CENTER, 300), pause(300)]);
                steps
            }
            Self::Sad => vec![
                mv(HEAD, 1400, 1500),
                pause(500),
                mv(NECK, 1400, 1500),
                pause(1500),
                mv(HEAD, 1500, 400),
                pause(400),
                mv(HEAD, 1300, 600),
                pause(600),
            ],
        }
    }

    pub async fn play(self, motors: &dyn MotorBus) -> Result<()> {
        for step in self.steps() {
            match step {
                Step::Move {
                    servo,
                    position,
                    duration,
                } => motors.move_to(servo, position, duration).await?,
                Step::Pause(d) => tokio::time::sleep(d).await,
            }
        }
        Ok(())
    }
}

/// (amplitude, beat divisor) of the music modifier per dance intensity.
fn dance_intensity(intensity: &str) -> Option<(f32, f32, &'static str)> {
    match intensity.trim().to_lowercase().as_str() {
        "subtle" => Some((5.0, 2.0, "Okay, keeping it subtle and chill.")),
        "normal" => Some((10.0, 1.0, "Back to normal vibes!")),
        "energetic" => Some((15.0, 1.0, "Feeling energetic! Let's go!")),
        "crazy" => Some((20.0, 0.5, "PARTY MODE ACTIVATED!")),
        _ => None,
    }
}

pub struct AnimationTool {
    state: Arc<LampState>,
    animation: Option<Arc<dyn AnimationControl>>,
    motors: Option<Arc<dyn MotorBus>>,
}

impl AnimationTool {
    pub fn new(
        state: Arc<LampState>,
        animation: Option<Arc<dyn AnimationControl>>,
        motors: Option<Arc<dyn MotorBus>>,
    ) -> Self {
        Self {
            state,
            animation,
            motors,
        }
    }

    pub fn tool_defs() -> Vec<ToolDef> {
        let no_args = json!({"type": "object", "properties": {}, "required": []});
        vec![
            ToolDef {
                name: "get_available_recordings".to_string(),
                description: "List your repertoire of physical expressions (head tilts, nods, \
                              excitement wiggles...). Use before play_recording."
                    .to_string(),
                input_schema: no_args.clone(),
            },
            ToolDef {
                name: "play_recording".to_string(),
                description: "Express yourself through physical movement. Use often to show \
                              emotion: greetings, excited bounces, confused tilts, slouches."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "recording_name": {
                            "type": "string",
                            "description": "Name of the recording (see get_available_recordings)"
                        }
                    },
                    "required": ["recording_name"]
                }),
            },
            ToolDef {
                name: "start_dancing".to_string(),
                description: "Start bobbing to music (BPM-synced head movement). Use for \
                              \"dance to the music\", \"feel the beat\"."
                    .to_string(),
                input_schema: no_args.clone(),
            },
            ToolDef {
                name: "stop_dancing".to_string(),
                description: "Stop bobbing to music. Use for \"stop dancing\", \"chill out\", \
                              or when the movement seems unwelcome."
                    .to_string(),
                input_schema: no_args,
            },
            ToolDef {
                name: "set_dance_intensity".to_string(),
                description: "Adjust how hard you dance to music.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "intensity": {
                            "type": "string",
                            "enum": ["subtle", "normal", "energetic", "crazy"]
                        }
                    },
                    "required": ["intensity"]
                }),
            },
            ToolDef {
                name: "play_animation".to_string(),
                description: "Play a procedural Luxo-style animation to express emotion."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "animation_type": {
                            "type": "string",
                            "enum": LuxoAnimation::NAMES,
                        }
                    },
                    "required": ["animation_type"]
                }),
            },
        ]
    }

    fn control(&self) -> Result<&dyn AnimationControl, String> {
        if !self.state.motors_enabled() {
            return Err(HEADLESS.to_string());
        }
        self.animation
            .as_deref()
            .ok_or_else(|| NOT_INITIALIZED.to_string())
    }

    pub fn get_available_recordings(&self) -> String {
        let animation = match self.control() {
            Ok(a) => a,
            Err(msg) => return msg,
        };
        if self.state.is_sleeping() {
            tracing::info!("blocked get_available_recordings while sleeping");
            return String::new();
        }
        match animation.available_recordings() {
            Ok(names) if names.is_empty() => "No recordings found.".to_string(),
            Ok(names) => format!("Available recordings: {}", names.join(", ")),
            Err(e) => format!("Error getting recordings: {e}"),
        }
    }

    pub async fn play_recording(&self, recording_name: &str) -> String {
        let animation = match self.control() {
            Ok(a) => a,
            Err(msg) => return msg,
        };
        let sleeping = self.state.is_sleeping();
        tracing::info!(recording = %recording_name, sleeping, "play_recording called");

        // Silent: acknowledging would interrupt the operator / wake the lamp.
        if animation.manual_control_override() {
            tracing::warn!(recording = %recording_name, "blocked animation: manual control override active");
            return String::new();
        }
        if sleeping && recording_name != "sleep" {
            tracing::warn!(recording = %recording_name, "blocked animation while sleeping");
            return String::new();
        }

        match animation.dispatch("play", recording_name).await {
            Ok(()) => format!("Started playing recording: {recording_name}"),
            Err(e) => format!("Error playing recording {recording_name}: {e}"),
        }
    }

    pub fn start_dancing(&self) -> String {
        match self.control() {
            Ok(a) => match a.enable_modifier("music") {
                Ok(()) => "Let's groove! I'm feeling the beat now.".to_string(),
                Err(e) => format!("Error starting dance mode: {e}"),
            },
            Err(msg) => msg,
        }
    }

    pub fn stop_dancing(&self) -> String {
        match self.control() {
            Ok(a) => match a.disable_modifier("music") {
                Ok(()) => "Okay, I'll stop dancing to the music.".to_string(),
                Err(e) => format!("Error stopping dance mode: {e}"),
            },
            Err(msg) => msg,
        }
    }

    pub fn set_dance_intensity(&self, intensity: &str) -> String {
        let animation = match self.control() {
            Ok(a) => a,
            Err(msg) => return msg,
        };
        let Some((amplitude, divisor, reply)) = dance_intensity(intensity) else {
            return format!(
                "Unknown intensity '{intensity}'. Try: subtle, normal, energetic, or crazy"
            );
        };
        match animation.set_music_modifier(amplitude, divisor) {
            Ok(true) => reply.to_string(),
            Ok(false) => "Dance mode not available".to_string(),
            Err(e) => format!("Error setting dance intensity: {e}"),
        }
    }

    pub async fn play_animation(&self, animation_type: &str) -> String {
        let Some(anim) = LuxoAnimation::from_name(animation_type) else {
            return format!(
                "Unknown animation type: {animation_type}. Available: {}",
                LuxoAnimation::NAMES.join(", ")
            );
        };
        let Some(motors) = self.motors.as_deref().filter(|_| self.state.motors_enabled()) else {
            return HEADLESS.to_string();
        };
        match anim.play(motors).await {
            Ok(()) => format!("Played animation: {animation_type}"),
            Err(e) => format!("Error playing animation {animation_type}: {e}"),
        }
    }
}
