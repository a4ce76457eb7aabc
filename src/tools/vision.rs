/// Vision tools: hand-gesture game and scene description.
///
/// Landmark detection and scene analysis run elsewhere; this module only
/// interprets their output.
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::animation::AnimationDispatcher;
use crate::backend::ToolDef;

use super::LampState;

/// Normalized image coordinates; y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// The 21 hand landmarks in the usual wrist/thumb/index/.../pinky order.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks(pub Vec<Landmark>);

/// (tip, pip) landmark indices of index, middle, ring and pinky.
const FINGER_JOINTS: [(usize, usize); 4] = [(8, 6), (12, 10), (16, 14), (20, 18)];

impl HandLandmarks {
    /// Fingers (thumb excluded) whose tip is above the middle joint.
    pub fn extended_fingers(&self) -> usize {
        FINGER_JOINTS
            .iter()
            .filter(|(tip, pip)| match (self.0.get(*tip), self.0.get(*pip)) {
                (Some(t), Some(p)) => t.y < p.y,
                _ => false,
            })
            .count()
    }
}

/// Grabs one frame and returns the first detected hand, if any.
pub trait HandTracker: Send + Sync {
    fn capture_hand(&self) -> BoxFuture<'_, Result<Option<HandLandmarks>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// Four fingers up is paper, two is scissors, anything else a loose fist.
    pub fn from_extended_fingers(count: usize) -> Self {
        match count {
            4.. => Move::Paper,
            2 => Move::Scissors,
            _ => Move::Rock,
        }
    }

    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Paper, Move::Rock) | (Move::Scissors, Move::Paper)
        )
    }

    /// Recording the lamp plays to show its move.
    pub fn recording(self) -> &'static str {
        match self {
            Move::Rock => "head_down",
            Move::Paper => "wake_up",
            Move::Scissors => "happy_wiggle",
        }
    }

    fn random() -> Self {
        Self::ALL[rand::thread_rng().gen_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
        })
    }
}

pub fn round_result(user: Move, bot: Move) -> &'static str {
    if user == bot {
        "It's a Tie!"
    } else if user.beats(bot) {
        "You Win!"
    } else {
        "I Win!"
    }
}

// ── Scene context ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonObservation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub position: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalObservation {
    #[serde(rename = "type", default = "default_animal")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

fn default_animal() -> String {
    "animal".to_string()
}

/// Latest structured analysis from the vision service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneContext {
    pub environment: String,
    pub lighting: String,
    pub number_of_people: u32,
    #[serde(default)]
    pub people: Vec<PersonObservation>,
    #[serde(default)]
    pub animals: Vec<AnimalObservation>,
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(default)]
    pub changes_detected: String,
    /// "high" | "medium" | "low"
    #[serde(default)]
    pub confidence: String,
    /// Seconds since the analysis was produced.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

pub trait SceneSource: Send + Sync {
    /// None until the first analysis has completed.
    fn scene_context(&self) -> Option<SceneContext>;
}

fn or_na(s: &str) -> &str {
    if s.is_empty() {
        "N/A"
    } else {
        s
    }
}

pub fn describe(context: &SceneContext) -> String {
    let mut parts = vec![
        format!("I'm in what looks like {}.", context.environment),
        format!("The lighting is {}.", context.lighting),
    ];

    match context.number_of_people {
        0 => parts.push("I don't see anyone right now.".to_string()),
        1 => {
            parts.push("I see one person.".to_string());
            if let Some(person) = context.people.first() {
                if !person.description.is_empty() {
                    parts.push(format!("They appear to be {}.", person.description));
                }
                if !person.activity.is_empty() {
                    parts.push(format!("They seem to be {}.", person.activity));
                }
            }
        }
        n => {
            parts.push(format!("I see {n} people."));
            for (i, person) in context.people.iter().enumerate() {
                if !person.description.is_empty() {
                    parts.push(format!("Person {}: {}.", i + 1, person.description));
                }
            }
        }
    }

    if !context.animals.is_empty() {
        let animals: Vec<String> = context
            .animals
            .iter()
            .map(|a| {
                if a.description.is_empty() {
                    a.kind.clone()
                } else {
                    format!("{} ({})", a.kind, a.description)
                }
            })
            .collect();
        parts.push(format!("I also see: {}.", animals.join(", ")));
    }

    if !context.objects.is_empty() {
        let shown: Vec<&str> = context.objects.iter().take(5).map(String::as_str).collect();
        parts.push(format!("Notable objects: {}.", shown.join(", ")));
    }

    if context.confidence == "low" {
        parts.push("(My view is a bit unclear, so I'm not very confident about this.)".to_string());
    }

    parts.join(" ")
}

pub fn details(context: &SceneContext) -> String {
    let mut lines = vec![
        format!("Environment: {}", context.environment),
        format!("Lighting: {}", context.lighting),
        format!("People count: {}", context.number_of_people),
    ];

    if !context.people.is_empty() {
        lines.push("People details:".to_string());
        for (i, p) in context.people.iter().enumerate() {
            lines.push(format!(
                "  {}. {} - {} - {}",
                i + 1,
                or_na(&p.description),
                or_na(&p.activity),
                or_na(&p.position)
            ));
        }
    }

    if !context.animals.is_empty() {
        let animals: Vec<String> = context
            .animals
            .iter()
            .map(|a| format!("{} ({})", a.kind, a.description))
            .collect();
        lines.push(format!("Animals: {}", animals.join(", ")));
    }

    if !context.objects.is_empty() {
        lines.push(format!("Objects: {}", context.objects.join(", ")));
    }

    lines.push(format!("Changes: {}", context.changes_detected));
    lines.push(format!("Confidence: {}", context.confidence));
    lines.push(match context.timestamp {
        Some(t) if t != 0.0 => format!("Last updated: {t:.1}s ago"),
        _ => "Last updated: Unknown".to_string(),
    });

    lines.join("\n")
}

// ── Tool ──────────────────────────────────────────────────────────

pub struct VisionTool {
    state: Arc<LampState>,
    hands: Option<Arc<dyn HandTracker>>,
    scene: Option<Arc<dyn SceneSource>>,
    animation: Option<Arc<dyn AnimationDispatcher>>,
}

impl VisionTool {
    pub fn new(
        state: Arc<LampState>,
        hands: Option<Arc<dyn HandTracker>>,
        scene: Option<Arc<dyn SceneSource>>,
        animation: Option<Arc<dyn AnimationDispatcher>>,
    ) -> Self {
        Self {
            state,
            hands,
            scene,
            animation,
        }
    }

    pub fn tool_defs() -> Vec<ToolDef> {
        let no_args = json!({"type": "object", "properties": {}, "required": []});
        vec![
            ToolDef {
                name: "play_rock_paper_scissors".to_string(),
                description: "Play Rock, Paper, Scissors. The user shows a hand to the camera; \
                              you answer with a move: rock = curl up, paper = stretch up, \
                              scissors = happy wiggle."
                    .to_string(),
                input_schema: no_args.clone(),
            },
            ToolDef {
                name: "describe_scene".to_string(),
                description: "Describe what you currently see through your camera: environment, \
                              people, animals, notable objects. Use for \"what do you see?\"."
                    .to_string(),
                input_schema: no_args.clone(),
            },
            ToolDef {
                name: "get_scene_details".to_string(),
                description: "Structured scene data: exact counts, positions, detected changes. \
                              Use for precise queries rather than a natural description."
                    .to_string(),
                input_schema: no_args,
            },
        ]
    }

    pub async fn play_rock_paper_scissors(&self) -> String {
        self.play_rock_paper_scissors_against(Move::random()).await
    }

    async fn play_rock_paper_scissors_against(&self, bot: Move) -> String {
        if self.state.is_sleeping() {
            return "I'm sleeping right now. Wake me up to play!".to_string();
        }
        let Some(hands) = &self.hands else {
            return "I couldn't open my eyes (camera) to see your hand. \
                    Maybe I'm already using them for something else?"
                .to_string();
        };

        let landmarks = match hands.capture_hand().await {
            Ok(Some(l)) => l,
            Ok(None) => {
                return "I didn't see your hand! Make sure it's in front of my camera.".to_string()
            }
            Err(e) => {
                tracing::error!("rock paper scissors capture failed: {e}");
                return "I tried to look, but I couldn't see anything (camera error).".to_string();
            }
        };

        let user = Move::from_extended_fingers(landmarks.extended_fingers());
        let result = round_result(user, bot);

        if let Some(animation) = &self.animation {
            if let Err(e) = animation.dispatch("play", bot.recording()).await {
                tracing::warn!(recording = bot.recording(), "could not play move: {e}");
            }
        }

        format!(
            "You showed {user}. I chose {bot} ({} action). {result}",
            bot.recording()
        )
    }

    pub fn describe_scene(&self) -> String {
        if self.state.is_sleeping() {
            return "Sleeping".to_string();
        }
        let Some(scene) = &self.scene else {
            return "Scene analysis is not available. Enable the vision service in the lamp config."
                .to_string();
        };
        match scene.scene_context() {
            Some(context) => describe(&context),
            None => "I haven't analyzed the scene yet. Give me a moment to look around.".to_string(),
        }
    }

    pub fn get_scene_details(&self) -> String {
        if self.state.is_sleeping() {
            return "Sleeping".to_string();
        }
        let Some(scene) = &self.scene else {
            return "Scene analysis not available. Enable the vision service in the lamp config."
                .to_string();
        };
        match scene.scene_context() {
            Some(context) => details(&context),
            None => "No scene data available yet.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::FutureExt;
    use std::sync::Mutex;

    /// Hand with the given fingers (index..pinky) raised.
    fn hand(raised: [bool; 4]) -> HandLandmarks {
        let mut points = vec![Landmark { x: 0.5, y: 0.5 }; 21];
        for ((tip, pip), up) in FINGER_JOINTS.iter().zip(raised) {
            points[*pip] = Landmark { x: 0.5, y: 0.5 };
            points[*tip] = Landmark {
                x: 0.5,
                y: if up { 0.2 } else { 0.7 },
            };
        }
        HandLandmarks(points)
    }

    struct FixedHand(Option<HandLandmarks>);

    impl HandTracker for FixedHand {
        fn capture_hand(&self) -> BoxFuture<'_, Result<Option<HandLandmarks>>> {
            let hand = self.0.clone();
            async move { Ok(hand) }.boxed()
        }
    }

    struct BrokenCamera;

    impl HandTracker for BrokenCamera {
        fn capture_hand(&self) -> BoxFuture<'_, Result<Option<HandLandmarks>>> {
            async { anyhow::bail!("frame grab failed") }.boxed()
        }
    }

    #[derive(Default)]
    struct Plays(Mutex<Vec<String>>);

    impl AnimationDispatcher for Plays {
        fn dispatch<'a>(&'a self, _command: &'a str, argument: &'a str) -> BoxFuture<'a, Result<()>> {
            self.0.lock().unwrap().push(argument.to_string());
            async { Ok(()) }.boxed()
        }
    }

    struct Scene(Option<SceneContext>);

    impl SceneSource for Scene {
        fn scene_context(&self) -> Option<SceneContext> {
            self.0.clone()
        }
    }

    fn rps_tool(hand: Option<HandLandmarks>, plays: Arc<Plays>) -> VisionTool {
        VisionTool::new(
            Arc::new(LampState::new(true)),
            Some(Arc::new(FixedHand(hand)) as Arc<dyn HandTracker>),
            None,
            Some(plays as Arc<dyn AnimationDispatcher>),
        )
    }

    fn scene_tool(context: Option<SceneContext>) -> VisionTool {
        VisionTool::new(
            Arc::new(LampState::new(true)),
            None,
            Some(Arc::new(Scene(context)) as Arc<dyn SceneSource>),
            None,
        )
    }

    // ── gesture heuristic ────────────────────────────────────────

    #[test]
    fn finger_count_classifies_moves() {
        assert_eq!(hand([true; 4]).extended_fingers(), 4);
        assert_eq!(Move::from_extended_fingers(4), Move::Paper);
        assert_eq!(Move::from_extended_fingers(2), Move::Scissors);
        assert_eq!(Move::from_extended_fingers(1), Move::Rock);
        assert_eq!(Move::from_extended_fingers(0), Move::Rock);
        // Ambiguous claw counts as a loose fist.
        assert_eq!(Move::from_extended_fingers(3), Move::Rock);
    }

    #[test]
    fn truncated_landmarks_count_nothing() {
        let short = HandLandmarks(vec![Landmark { x: 0.0, y: 0.0 }; 10]);
        assert_eq!(short.extended_fingers(), 0);
    }

    #[test]
    fn round_results() {
        assert_eq!(round_result(Move::Rock, Move::Rock), "It's a Tie!");
        assert_eq!(round_result(Move::Rock, Move::Scissors), "You Win!");
        assert_eq!(round_result(Move::Scissors, Move::Paper), "You Win!");
        assert_eq!(round_result(Move::Paper, Move::Scissors), "I Win!");
    }

    // ── game flow ────────────────────────────────────────────────

    #[tokio::test]
    async fn scissors_against_paper_wins_and_plays_move() {
        let plays = Arc::new(Plays::default());
        let tool = rps_tool(Some(hand([true, true, false, false])), plays.clone());
        let reply = tool.play_rock_paper_scissors_against(Move::Paper).await;
        assert_eq!(reply, "You showed Scissors. I chose Paper (wake_up action). You Win!");
        assert_eq!(*plays.0.lock().unwrap(), vec!["wake_up"]);
    }

    #[tokio::test]
    async fn no_hand_seen() {
        let tool = rps_tool(None, Arc::new(Plays::default()));
        assert!(tool.play_rock_paper_scissors().await.contains("didn't see your hand"));
    }

    #[tokio::test]
    async fn camera_error_is_reported() {
        let tool = VisionTool::new(
            Arc::new(LampState::new(true)),
            Some(Arc::new(BrokenCamera) as Arc<dyn HandTracker>),
            None,
            None,
        );
        assert!(tool.play_rock_paper_scissors().await.contains("camera error"));
    }

    #[tokio::test]
    async fn sleeping_lamp_does_not_play() {
        let plays = Arc::new(Plays::default());
        let tool = rps_tool(Some(hand([true; 4])), plays.clone());
        tool.state.set_sleeping(true);
        assert!(tool.play_rock_paper_scissors().await.contains("sleeping"));
        assert!(plays.0.lock().unwrap().is_empty());
    }

    // ── scene ────────────────────────────────────────────────────

    fn living_room() -> SceneContext {
        SceneContext {
            environment: "a cozy living room".to_string(),
            lighting: "warm and dim".to_string(),
            number_of_people: 1,
            people: vec![PersonObservation {
                description: "a person in a red sweater".to_string(),
                activity: "reading a book".to_string(),
                position: String::new(),
            }],
            animals: vec![AnimalObservation {
                kind: "cat".to_string(),
                description: "sleeping on the couch".to_string(),
            }],
            objects: (1..=7).map(|i| format!("object{i}")).collect(),
            changes_detected: "person sat down".to_string(),
            confidence: "low".to_string(),
            timestamp: Some(3.25),
        }
    }

    #[test]
    fn describe_single_person_scene() {
        let text = describe(&living_room());
        assert!(text.starts_with("I'm in what looks like a cozy living room."));
        assert!(text.contains("I see one person. They appear to be a person in a red sweater."));
        assert!(text.contains("They seem to be reading a book."));
        assert!(text.contains("I also see: cat (sleeping on the couch)."));
        assert!(text.contains("object5."));
        assert!(!text.contains("object6"));
        assert!(text.ends_with("not very confident about this.)"));
    }

    #[test]
    fn describe_empty_room() {
        let context = SceneContext {
            environment: "an office".to_string(),
            lighting: "bright".to_string(),
            confidence: "high".to_string(),
            ..SceneContext::default()
        };
        assert_eq!(
            describe(&context),
            "I'm in what looks like an office. The lighting is bright. I don't see anyone right now."
        );
    }

    #[test]
    fn details_lists_structured_fields() {
        let text = details(&living_room());
        assert!(text.contains("People count: 1"));
        assert!(text.contains("  1. a person in a red sweater - reading a book - N/A"));
        assert!(text.contains("Animals: cat (sleeping on the couch)"));
        assert!(text.contains("object7"));
        assert!(text.ends_with("Last updated: 3.2s ago") || text.ends_with("Last updated: 3.3s ago"));
    }

    #[test]
    fn scene_context_deserializes_vision_payload() {
        let context: SceneContext = serde_json::from_value(json!({
            "environment": "kitchen",
            "lighting": "natural",
            "number_of_people": 2,
            "animals": [{"description": "small"}],
        }))
        .unwrap();
        assert_eq!(context.animals[0].kind, "animal");
        assert!(context.timestamp.is_none());
        assert!(details(&context).ends_with("Last updated: Unknown"));
    }

    #[test]
    fn scene_tool_messages() {
        assert!(scene_tool(None).describe_scene().contains("haven't analyzed"));
        assert_eq!(scene_tool(None).get_scene_details(), "No scene data available yet.");
        let tool = scene_tool(Some(living_room()));
        tool.state.set_sleeping(true);
        assert_eq!(tool.describe_scene(), "Sleeping");
        let no_vision = VisionTool::new(Arc::new(LampState::new(true)), None, None, None);
        assert!(no_vision.describe_scene().contains("not available"));
    }
}
