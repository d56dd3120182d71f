use std::io::{self, Write};
use std::thread;

use anyhow::{Context, Result};
use dialog_graph::dialog::Expect;
use dialog_graph::events::{names, OwnerId};
use dialog_graph::{
    Blackboard, DialogEvent, DialogInput, DialogSession, EventDispatcher, JsonLocalization,
    LogTracker, NodeReader, RecordingTracker, SessionState,
};
use log::{debug, info, warn};
use serde_json::Value;

/// Everything needed to rebuild the dialog graph for a new round.
pub struct Scenario {
    pub definition: Value,
    pub namespace: String,
    pub object: String,
    pub localization: JsonLocalization,
    pub reader: NodeReader,
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

fn print_text(event: &DialogEvent) {
    let (DialogEvent::StartTextNode(view) | DialogEvent::UpdateTextNode(view)) = event else {
        return;
    };
    let indent = if view.centered { "          " } else { "" };
    if view.name.is_empty() {
        println!("\n{indent}{}", view.text);
    } else {
        println!("\n{indent}[{}]: {}", view.name, view.text);
    }
}

fn print_choices(event: &DialogEvent) {
    if let DialogEvent::StartChoiceNode(view) = event {
        println!();
        for (i, choice) in view.choices.iter().enumerate() {
            println!("  [{}] {choice}", i + 1);
        }
    }
}

fn print_custom(event: &DialogEvent) {
    if let DialogEvent::Custom { name, params, .. } = event {
        if params.is_null() {
            println!("  <{name}>");
        } else {
            println!("  <{name} {params}>");
        }
    }
}

fn subscribe_printers(bus: &mut EventDispatcher) -> OwnerId {
    let owner = bus.owner();
    bus.subscribe(names::START_TEXT_NODE, owner, print_text);
    bus.subscribe(names::UPDATE_TEXT_NODE, owner, print_text);
    bus.subscribe(names::START_CHOICE_NODE, owner, print_choices);
    bus.subscribe(names::ANY, owner, print_custom);
    bus.subscribe(names::CLEAR_NODES, owner, |_| {
        println!("\n(The conversation was cut short.)")
    });
    owner
}

// ---------------------------------------------------------------------------
// Player input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Answer {
    Input(DialogInput),
    Quit,
    Invalid,
}

/// Interpret one line typed while the session waits for `expect`.
fn parse_answer(line: &str, expect: Expect) -> Answer {
    let line = line.trim();
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        return Answer::Quit;
    }
    match expect {
        Expect::NextDialog => Answer::Input(DialogInput::NextDialog),
        Expect::SelectChoice => match line.parse::<usize>() {
            Ok(n) if n >= 1 => Answer::Input(DialogInput::SelectChoice(n - 1)),
            _ => Answer::Invalid,
        },
    }
}

/// `None` on end of input.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input))
}

// ---------------------------------------------------------------------------
// Game over screen
// ---------------------------------------------------------------------------

/// Outcome of a single round.
enum RoundOutcome {
    /// The dialog reached its end.
    Finished {
        visited: usize,
        longest_path: usize,
        choices_made: usize,
        last_node: String,
    },
    /// Player typed quit mid-dialog.
    Quit,
}

fn show_game_over(outcome: &RoundOutcome) {
    println!("\n========================================");
    println!("             THE END");
    println!("========================================");

    match outcome {
        RoundOutcome::Finished {
            visited,
            longest_path,
            choices_made,
            last_node,
        } => {
            println!("  Nodes visited: {visited} (longest route: {longest_path})");
            println!("  Choices made:  {choices_made}");
            println!("  Ended at:      {last_node}");
        }
        RoundOutcome::Quit => {
            println!("  You walked away from the conversation.");
        }
    }

    println!("========================================\n");
    println!("  [r] Restart    [q] Quit\n");
}

/// Read the player's post-game choice. Returns `true` to restart, `false` to quit.
fn prompt_restart() -> Result<bool> {
    loop {
        let Some(input) = read_line("> ")? else {
            return Ok(false);
        };
        match input.trim().to_lowercase().as_str() {
            "r" => return Ok(true),
            "q" => return Ok(false),
            _ => println!("  Press [r] to restart or [q] to quit."),
        }
    }
}

// ---------------------------------------------------------------------------
// Single round
// ---------------------------------------------------------------------------

fn play_round(scenario: &Scenario, bus: &mut EventDispatcher) -> Result<RoundOutcome> {
    let graph = scenario
        .reader
        .read_nodes(
            &scenario.definition,
            &scenario.namespace,
            &scenario.object,
            &scenario.localization,
            &Blackboard::new(),
        )
        .context("failed to read dialog nodes")?;
    let longest_path = graph.longest_path();

    let mut session = DialogSession::with_tracker(graph, (LogTracker, RecordingTracker::default()));
    session.start(bus)?;

    loop {
        match session.state().clone() {
            SessionState::Idle | SessionState::Ended => break,
            SessionState::Delayed { remaining, .. } => {
                debug!("Waiting {remaining:?} before advancing");
                thread::sleep(remaining);
                session.update(remaining, bus);
            }
            SessionState::Awaiting { input: expect, .. } => {
                let prompt = match expect {
                    Expect::NextDialog => "  (Enter) ",
                    Expect::SelectChoice => "\n[You]: ",
                };
                let Some(line) = read_line(prompt)? else {
                    session.abort(bus);
                    return Ok(RoundOutcome::Quit);
                };
                match parse_answer(&line, expect) {
                    Answer::Quit => {
                        session.abort(bus);
                        return Ok(RoundOutcome::Quit);
                    }
                    Answer::Invalid => println!("  Type the number of a choice."),
                    Answer::Input(input) => {
                        if let Err(e) = session.resume(input, bus) {
                            warn!("Input rejected: {e}");
                            println!("  ({e})");
                        }
                    }
                }
            }
        }
    }

    let last_node = session
        .history()
        .last()
        .and_then(|id| session.graph().node(*id))
        .map(|node| node.global_id().to_string())
        .unwrap_or_else(|| "(nowhere)".into());

    Ok(RoundOutcome::Finished {
        visited: session.history().len(),
        longest_path,
        choices_made: session.tracker().1.selections(),
        last_node,
    })
}

// ---------------------------------------------------------------------------
// Entry point: plays rounds until the player quits
// ---------------------------------------------------------------------------

pub fn run(scenario: &Scenario) -> Result<()> {
    let mut bus = EventDispatcher::new();

    loop {
        println!("\n========================================");
        println!("   {}", scenario.namespace.to_uppercase());
        println!("========================================");
        println!("Press Enter to continue, type a number to choose.");
        println!("Type quit to leave.\n");

        let owner = subscribe_printers(&mut bus);
        let outcome = play_round(scenario, &mut bus)?;
        let dropped = bus.unsubscribe_all(owner);
        debug!("Dropped {dropped} listeners");

        show_game_over(&outcome);

        if !prompt_restart()? {
            println!("Thanks for playing!");
            break;
        }

        info!("Player chose to restart");
    }

    Ok(())
}
