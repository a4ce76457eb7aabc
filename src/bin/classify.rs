/// classify: run the configured emotion classifier on one utterance.
///
/// Usage:
///   classify "I finally got the job!"
///   echo "this is so frustrating" | classify
///
/// Prints the classification as JSON, or `null` for blank input.
use std::io::Read;

use anyhow::Context;
use lelamp::config::Config;
use lelamp::emotion::EmotionClassifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lelamp::init_tracing();

    let mut text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
    }

    let config = Config::load()?;
    let classifier = EmotionClassifier::from_config(&config.emotion)?;
    let result = classifier.try_classify(&text).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
