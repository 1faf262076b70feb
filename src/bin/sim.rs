//! Scripted conversation simulator.
//!
//! Runs the full coordinator against scripted capabilities: a short
//! exchange, one silent turn, then shutdown. Useful for watching turn
//! transitions and queue behavior without any host speech services.

use confab::testing::{
    ScriptedGenerator, ScriptedListen, ScriptedMicrophone, ScriptedRecognizer, ScriptedSynthesizer,
};
use confab::{Capabilities, Conversation, CoordinatorConfig, TurnState};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("confab=info")),
        )
        .init();

    let recognizer = Arc::new(ScriptedRecognizer::with_script([
        ScriptedListen::hear("what is the capital of France"),
        ScriptedListen::Silence,
        ScriptedListen::Pending,
    ]));
    let synthesizer = Arc::new(ScriptedSynthesizer::new().with_delay(Duration::from_millis(150)));
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_reply([
        "Paris is the",
        " capital of France.",
        " It has been since 987!",
        " Anything else",
    ]);

    let mut config = CoordinatorConfig::default();
    config.conversation.inter_turn_delay_ms = 100;

    let conversation = Conversation::initialize(
        config,
        Capabilities {
            microphone: Arc::new(ScriptedMicrophone::allowed()),
            recognizer: Arc::clone(&recognizer) as _,
            synthesizer: Arc::clone(&synthesizer) as _,
            generator: Arc::clone(&generator) as _,
        },
    )
    .await?;

    // Mirror turn transitions the way a frontend state indicator would.
    let mut states = conversation.turn_states();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            let label = match state {
                TurnState::Idle => "",
                TurnState::Listening => "listening",
                TurnState::Speaking => "speaking",
            };
            info!("state: {label}");
        }
    });

    let conversation = Arc::new(conversation);
    let loop_handle = {
        let conversation = Arc::clone(&conversation);
        tokio::spawn(async move { conversation.run().await })
    };

    // Two scripted turns plus the silent reprompt, then stop mid-listen.
    tokio::time::sleep(Duration::from_secs(3)).await;
    conversation.shutdown();
    loop_handle.await??;

    println!("\nprompts answered:");
    for prompt in generator.prompts() {
        println!("  me> {prompt}");
    }
    println!("utterances spoken:");
    for utterance in synthesizer.spoken() {
        println!("  ai> {utterance}");
    }
    Ok(())
}
