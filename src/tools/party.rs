/// Party tools: themed music and lights for the party workflow.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::ToolDef;

use super::animation::AnimationTool;

/// Theme keyword → music search query. Checked in order; first substring hit wins.
const SEARCH_QUERIES: &[(&str, &str)] = &[
    ("birthday", "birthday party hits"),
    ("kids birthday", "kids party music"),
    ("christmas", "christmas party hits"),
    ("new year", "new years eve party"),
    ("new years eve", "new years eve party"),
    ("halloween", "halloween party music"),
    ("thanksgiving", "thanksgiving dinner music"),
    ("valentine", "valentines day party"),
    ("st patrick", "st patricks day party"),
    ("easter", "easter celebration"),
    ("fourth of july", "4th of july bbq hits"),
    ("graduation", "graduation party hits"),
    ("wedding", "wedding reception music"),
    ("baby shower", "baby shower music"),
    ("retirement", "celebration hits"),
    ("casual", "chill party vibes"),
    ("bbq", "summer bbq hits"),
    ("pool party", "pool party mix"),
    ("dinner party", "dinner party jazz"),
    ("game night", "fun background music"),
    ("dance", "dance party hits"),
    ("disco", "disco party classics"),
    ("80s", "80s party hits"),
    ("90s", "90s party mix"),
    ("tropical", "tropical party vibes"),
    ("beach", "beach party hits"),
    ("karaoke", "karaoke party hits"),
    ("rock", "rock party anthems"),
    ("country", "country party hits"),
    ("latin", "latin party reggaeton"),
];

/// Time given to the player to start before asking what is playing.
const TRACK_START_DELAY: Duration = Duration::from_secs(1);

pub fn search_query(party_theme: &str) -> String {
    let theme = party_theme.to_lowercase();
    SEARCH_QUERIES
        .iter()
        .find(|(key, _)| theme.contains(key))
        .map(|(_, query)| query.to_string())
        .unwrap_or_else(|| format!("{party_theme} party music"))
}

/// Lighting for a party theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightScene {
    pub pattern: &'static str,
    pub rgb: (u8, u8, u8),
    pub message: &'static str,
}

pub fn light_scene(party_theme: &str) -> LightScene {
    let theme = party_theme.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| theme.contains(k));

    let (pattern, rgb, message) = if has(&["birthday", "celebration"]) {
        ("party", (255, 100, 200), "Party lights activated! Colorful celebration mode with rainbow animations!")
    } else if has(&["christmas", "xmas"]) {
        ("pulse", (255, 0, 0), "Christmas party lights activated! Festive red and green colors!")
    } else if has(&["halloween"]) {
        ("ripple", (255, 100, 0), "Halloween party lights activated! Spooky orange and purple vibes!")
    } else if has(&["new year"]) {
        ("burst", (255, 215, 0), "New Year's party lights activated! Sparkling gold celebration mode!")
    } else if has(&["valentine"]) {
        ("pulse", (255, 20, 60), "Valentine's party lights activated! Romantic red and pink glow!")
    } else if has(&["st patrick", "irish"]) {
        ("wave", (0, 255, 0), "St. Patrick's party lights activated! Lucky green vibes!")
    } else if has(&["tropical", "beach", "pool"]) {
        ("wave", (0, 200, 255), "Tropical party lights activated! Cool ocean blue waves!")
    } else if has(&["dance", "disco"]) {
        ("party", (255, 0, 255), "Dance party lights activated! Strobing multi-color disco vibes!")
    } else {
        ("party", (255, 150, 0), "Party lights activated! Energetic multi-color party mode!")
    };

    LightScene {
        pattern,
        rgb,
        message,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub artist: String,
}

/// Streaming music service.
pub trait MusicPlayer: Send + Sync {
    /// Search and start playback. `Ok(false)` when nothing matched.
    fn play_search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<bool>>;
    fn current_track(&self) -> BoxFuture<'_, Result<Option<Track>>>;
}

/// LED ring animations. Returns the controller's own status line.
pub trait RgbController: Send + Sync {
    fn play_pattern<'a>(&'a self, pattern: &'a str, rgb: (u8, u8, u8))
        -> BoxFuture<'a, Result<String>>;
}

pub trait SoundEffects: Send + Sync {
    fn play<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<String>>;
}

pub struct PartyTool {
    music: Option<Arc<dyn MusicPlayer>>,
    rgb: Option<Arc<dyn RgbController>>,
    sounds: Option<Arc<dyn SoundEffects>>,
    animation: Arc<AnimationTool>,
}

impl PartyTool {
    pub fn new(
        music: Option<Arc<dyn MusicPlayer>>,
        rgb: Option<Arc<dyn RgbController>>,
        sounds: Option<Arc<dyn SoundEffects>>,
        animation: Arc<AnimationTool>,
    ) -> Self {
        Self {
            music,
            rgb,
            sounds,
            animation,
        }
    }

    pub fn tool_defs() -> Vec<ToolDef> {
        let theme = json!({
            "type": "object",
            "properties": {
                "party_theme": {
                    "type": "string",
                    "description": "Type of party, e.g. \"kids birthday\", \"christmas\", \"halloween\""
                }
            },
            "required": ["party_theme"]
        });
        vec![
            ToolDef {
                name: "play_party_music".to_string(),
                description: "Search for and start music that fits the party theme.".to_string(),
                input_schema: theme.clone(),
            },
            ToolDef {
                name: "party_rgb_animation".to_string(),
                description: "Light the room with colors and patterns matching the party theme."
                    .to_string(),
                input_schema: theme,
            },
            ToolDef {
                name: "party_start_sound_effect".to_string(),
                description: "Play an exciting sound effect to kick off the party.".to_string(),
                input_schema: json!({"type": "object", "properties": {}, "required": []}),
            },
            ToolDef {
                name: "party_play_recording".to_string(),
                description: "Show party excitement with a movement recording \
                              (e.g. \"excited\", \"dancing1\")."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "recording_name": {"type": "string"}
                    },
                    "required": ["recording_name"]
                }),
            },
        ]
    }

    pub async fn play_party_music(&self, party_theme: &str) -> String {
        let Some(music) = &self.music else {
            return "Spotify is not connected. Please set up Spotify first to play party music."
                .to_string();
        };
        let query = search_query(party_theme);
        tracing::info!(theme = party_theme, query = %query, "party music");

        match music.play_search(&query).await {
            Ok(true) => {}
            Ok(false) => {
                return format!(
                    "Couldn't find party music for '{party_theme}'. Try asking me to play specific music."
                )
            }
            Err(e) => {
                tracing::error!("party music failed: {e}");
                return format!("Error playing party music: {e}");
            }
        }

        tokio::time::sleep(TRACK_START_DELAY).await;
        match music.current_track().await {
            Ok(Some(track)) => format!(
                "Party music started! Now playing: {} by {}",
                track.name, track.artist
            ),
            Ok(None) => format!("Party music started! Playing {query}"),
            Err(e) => {
                tracing::warn!("could not read current track: {e}");
                format!("Party music started! Playing {query}")
            }
        }
    }

    pub async fn party_rgb_animation(&self, party_theme: &str) -> String {
        let Some(rgb) = &self.rgb else {
            return "Party lights are not available - no RGB controller connected.".to_string();
        };
        let scene = light_scene(party_theme);
        match rgb.play_pattern(scene.pattern, scene.rgb).await {
            Ok(status) => format!("{} {status}", scene.message),
            Err(e) => format!("Error starting party lights: {e}"),
        }
    }

    pub async fn party_start_sound_effect(&self) -> String {
        let Some(sounds) = &self.sounds else {
            return "Sound effects are not available.".to_string();
        };
        match sounds.play("success").await {
            Ok(status) => format!("Party kickoff sound played! {status}"),
            Err(e) => format!("Error playing party sound: {e}"),
        }
    }

    pub async fn party_play_recording(&self, recording_name: &str) -> String {
        self.animation.play_recording(recording_name).await
    }
}
