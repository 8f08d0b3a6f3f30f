use tracing::info;

use crate::dom::scenario::Scenario;
use crate::recorder::collaborators::JsonlSessionStore;
use crate::recorder::config::RecorderConfig;
use crate::recorder::coordinator::Recorder;
use crate::step::step_model::Step;

// ============================================================================
// replay subcommand
// ============================================================================

/// Run a scenario's script through a fresh recorder and return the steps.
pub fn replay_scenario(
    scenario: &Scenario,
    config: RecorderConfig,
    save: Option<&str>,
) -> Result<Vec<Step>, Box<dyn std::error::Error>> {
    let mut page = scenario.build()?;
    let mut recorder = Recorder::new(config);
    if let Some(path) = save {
        recorder = recorder.with_store(JsonlSessionStore::open(path)?);
    }

    let start = scenario.script.first().map(|s| s.at).unwrap_or(0);
    recorder.start(&mut page.dom, start)?;

    let mut now = start;
    for step in &scenario.script {
        now = now.max(step.at);
        recorder.tick(&mut page.dom, now);
        for event in page.apply(step)? {
            recorder.dispatch(&mut page.dom, &event);
        }
    }

    let steps = recorder.stop(&mut page.dom, now)?;
    info!(steps = steps.len(), "replay finished");
    Ok(steps)
}

pub fn cmd_replay(
    scenario_path: &str,
    mut config: RecorderConfig,
    max_steps: Option<usize>,
    describe: bool,
    save: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(scenario_path)?;
    let scenario = Scenario::from_json(&content)?;
    if let Some(max) = max_steps {
        config.max_steps = max;
    }

    info!(scenario = scenario_path, events = scenario.script.len(), "replaying scenario");
    let steps = replay_scenario(&scenario, config, save)?;

    if describe {
        for step in &steps {
            eprintln!("  {}. {}", step.sequence, step.description);
        }
    }
    println!("{}", serde_json::to_string_pretty(&steps)?);
    Ok(())
}
