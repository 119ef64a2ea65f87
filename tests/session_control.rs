use std::thread;
use std::time::Duration;

use keyscribe::clock::ManualClock;
use keyscribe::control::ControlPort;
use keyscribe::engine::Engine;
use keyscribe::error::SessionError;
use keyscribe::events::{Event, EventSink, Outcome};
use keyscribe::inject::{open_injector, InjectBackend};
use keyscribe::model::{SessionConfig, TypeMode, TypingOptions};
use keyscribe::session::{Controller, Launch};
use keyscribe::sim::SimulatedEditor;
use pretty_assertions::assert_eq;

fn bot() -> TypingOptions {
    TypingOptions {
        mode: TypeMode::Bot,
        start_delay_secs: 0,
        ..Default::default()
    }
}

fn human() -> TypingOptions {
    TypingOptions {
        speed: 600,
        variability: 0.0,
        start_delay_secs: 0,
        ..Default::default()
    }
}

/// Records events and lets a test steer the worker from inside it, at a
/// known point of the run.
struct Steering<F> {
    port: ControlPort,
    events: Vec<Event>,
    react: F,
}

impl<F: FnMut(&Event, &ControlPort) + Send> Steering<F> {
    fn new(port: &ControlPort, react: F) -> Self {
        Self {
            port: port.clone(),
            events: Vec::new(),
            react,
        }
    }
}

impl<F: FnMut(&Event, &ControlPort) + Send> EventSink for Steering<F> {
    fn publish(&mut self, event: Event) {
        (self.react)(&event, &self.port);
        self.events.push(event);
    }
}

fn steer<F>(config: &SessionConfig, editor: &SimulatedEditor, react: F) -> (Outcome, Vec<Event>)
where
    F: FnMut(&Event, &ControlPort) + Send,
{
    let port = ControlPort::new();
    let mut sink = Steering::new(&port, react);
    let outcome = Engine::new(config, editor.clone(), &mut sink, port)
        .with_clock(ManualClock::new())
        .with_seed(9)
        .run();
    (outcome, sink.events)
}

fn progress(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}

fn pause_infos(events: &[Event]) -> Vec<(usize, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::PauseInfo { offset, snippet } => Some((*offset, snippet.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn pause_is_announced_once_however_long_it_lasts() {
    let editor = SimulatedEditor::new();
    let config = SessionConfig::fresh("hello", bot());
    let port = ControlPort::new();
    let clock = ManualClock::new();
    port.toggle_pause();

    let resumer = {
        let port = port.clone();
        let clock = clock.clone();
        thread::spawn(move || {
            // Let the worker poll the paused state many times first.
            while clock.elapsed() < Duration::from_secs(2) {
                thread::yield_now();
            }
            port.toggle_pause();
        })
    };

    let mut events = Vec::new();
    let outcome = Engine::new(&config, editor.clone(), &mut events, port)
        .with_clock(clock.clone())
        .run();
    resumer.join().unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(editor.text(), "hello");
    assert_eq!(pause_infos(&events), vec![(0, "…▌hello…".to_string())]);
    assert!(events.contains(&Event::Status("Paused".to_string())));
}

#[test]
fn each_pause_episode_gets_its_own_notification() {
    let editor = SimulatedEditor::new();
    let config = SessionConfig::fresh("one two", bot());

    let (outcome, events) = steer(&config, &editor, |event, port| match event {
        Event::Cursor(2) | Event::Cursor(4) => {
            port.toggle_pause();
        }
        Event::PauseInfo { .. } => {
            port.toggle_pause();
        }
        _ => {}
    });

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(editor.text(), "one two");
    let offsets: Vec<usize> = pause_infos(&events).into_iter().map(|(o, _)| o).collect();
    assert_eq!(offsets, vec![2, 4]);
}

#[test]
fn jump_in_fresh_mode_continues_from_new_offset() {
    let editor = SimulatedEditor::new();
    let config = SessionConfig::fresh("abcdefghijkl", bot());
    let mut jumped = false;

    let (outcome, events) = steer(&config, &editor, |event, port| {
        if *event == Event::Cursor(3) && !jumped {
            jumped = true;
            port.request_jump(8);
        }
    });

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(editor.written_text(), "abcijkl");
    assert!(events.contains(&Event::Log("Jumped to position 8.".to_string())));
}

#[test]
fn jump_back_in_replace_mode_never_lowers_progress() {
    let editor = SimulatedEditor::with_text("one two three four five six");
    let config = SessionConfig::replace(
        "one two three four five six",
        "one 2 three 4 five 6",
        human(),
    );
    let mut jumped = false;

    let (outcome, events) = steer(&config, &editor, |event, port| {
        if let Event::Cursor(offset) = event {
            if *offset >= 15 && !jumped {
                jumped = true;
                port.request_jump(0);
            }
        }
    });

    assert_eq!(outcome, Outcome::Completed);
    assert!(jumped);
    assert!(events.contains(&Event::Log("Jumped to position 0.".to_string())));
    let reported = progress(&events);
    assert!(
        reported.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {reported:?}"
    );
    assert_eq!(reported.last(), Some(&100));
}

/// Words counted in a "Word pause (…) after N words" log line.
fn words_before_pause(line: &str) -> Option<usize> {
    line.strip_prefix("Word pause (")?
        .split(" after ")
        .nth(1)?
        .strip_suffix(" words")?
        .parse()
        .ok()
}

#[test]
fn jump_restarts_the_word_count() {
    let editor = SimulatedEditor::new();
    // Every word is "ab " so word boundaries sit on multiples of three.
    let config = SessionConfig::fresh("ab ".repeat(60), human());
    let mut jumped = false;
    let mut cursor = 0;
    let mut after_jump: Vec<(usize, usize)> = Vec::new();
    let mut landed = false;

    let (outcome, _) = steer(&config, &editor, |event, port| match event {
        Event::Cursor(offset) => {
            cursor = *offset;
            if !jumped && *offset >= 12 && offset % 3 == 0 {
                jumped = true;
                port.request_jump(90);
            }
        }
        Event::Log(line) if line == "Jumped to position 90." => landed = true,
        Event::Log(line) if landed => {
            if let Some(words) = words_before_pause(line) {
                after_jump.push((cursor, words));
            }
        }
        _ => {}
    });

    assert_eq!(outcome, Outcome::Completed);
    assert!(landed);
    let &(at, words) = after_jump.first().expect("a word pause after the jump");
    assert_eq!(words, (at - 90) / 3);
}

#[test]
fn skip_in_fresh_mode_finishes_at_full_speed() {
    let editor = SimulatedEditor::new();
    let text = "Skipping works. Even with sentences. And more words after that.";
    let config = SessionConfig::fresh(text, human());
    let mut skipped = false;

    let (outcome, events) = steer(&config, &editor, |event, port| {
        if let Event::Progress(p) = event {
            if *p >= 20 && !skipped {
                skipped = true;
                port.request_skip();
            }
        }
    });

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(editor.text(), text);
    assert_eq!(progress(&events).last(), Some(&100));
    assert_eq!(events.last(), Some(&Event::Completion(Outcome::Completed)));
}

#[test]
fn skip_in_replace_mode_reaches_the_target() {
    let editor = SimulatedEditor::with_text("alpha beta gamma delta");
    let config = SessionConfig::replace("alpha beta gamma delta", "alpha BETA gamma DELTA", human());
    let mut skipped = false;

    let (outcome, events) = steer(&config, &editor, |event, port| {
        if let Event::Cursor(offset) = event {
            if *offset >= 3 && !skipped {
                skipped = true;
                port.request_skip();
            }
        }
    });

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(editor.text(), "alpha BETA gamma DELTA");
    assert_eq!(progress(&events).last(), Some(&100));
}

#[test]
fn stop_ends_the_session_at_the_next_boundary() {
    let editor = SimulatedEditor::new();
    let config = SessionConfig::fresh("stop right here please", human());

    let (outcome, events) = steer(&config, &editor, |event, port| {
        if *event == Event::Cursor(5) {
            port.request_stop();
        }
    });

    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(editor.text(), "stop ");
    assert!(events.contains(&Event::Status("Stopped".to_string())));
    assert!(events.contains(&Event::Log("Typing stopped.".to_string())));
    assert_eq!(events.last(), Some(&Event::Completion(Outcome::Stopped)));
}

#[test]
fn stop_during_countdown_types_nothing() {
    let editor = SimulatedEditor::new();
    let options = TypingOptions {
        start_delay_secs: 3,
        ..bot()
    };
    let config = SessionConfig::fresh("never typed", options);

    let (outcome, _) = steer(&config, &editor, |event, port| {
        if *event == Event::Status("Starting in 2…".to_string()) {
            port.request_stop();
        }
    });

    assert_eq!(outcome, Outcome::Stopped);
    assert!(editor.calls().is_empty());
}

#[test]
fn controller_rejects_a_second_live_session() {
    let controller = Controller::new();
    let waiting = SessionConfig::fresh(
        "slow",
        TypingOptions {
            start_delay_secs: 30,
            ..bot()
        },
    );
    let handle = controller
        .start(waiting, SimulatedEditor::new())
        .expect("first session starts");
    assert!(controller.is_busy());

    let second = controller.start(SessionConfig::fresh("other", bot()), SimulatedEditor::new());
    assert!(matches!(second, Err(SessionError::SessionActive)));

    handle.request_stop();
    assert_eq!(handle.join(), Outcome::Stopped);
    assert!(!controller.is_busy());

    let editor = SimulatedEditor::new();
    let handle = controller
        .start(SessionConfig::fresh("again", bot()), editor.clone())
        .expect("controller is free again");
    assert_eq!(handle.join(), Outcome::Completed);
    assert_eq!(editor.text(), "again");
}

#[test]
fn controller_rejects_invalid_configuration() {
    let controller = Controller::new();

    let config = SessionConfig::fresh(
        "text",
        TypingOptions {
            speed: 0,
            ..bot()
        },
    );
    let err = controller.start(config, SimulatedEditor::new()).err();
    assert!(matches!(err, Some(SessionError::Configuration(_))));

    let blank = SessionConfig::replace(" ", "\n", bot());
    let err = controller.start(blank, SimulatedEditor::new()).err();
    assert!(matches!(err, Some(SessionError::EmptyInput)));

    assert!(!controller.is_busy());
}

#[test]
fn controller_streams_events_and_completes_once() {
    let controller = Controller::new();
    let editor = SimulatedEditor::with_text("The cat sat.");
    let config = SessionConfig::replace("The cat sat.", "The dog sat.", human());

    let handle = controller
        .start_with(
            config,
            editor.clone(),
            Launch::default().seed(1).clock(ManualClock::new()),
        )
        .unwrap();

    let mut events = Vec::new();
    let outcome = handle.wait(|event| events.push(event.clone()));

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(editor.text(), "The dog sat.");
    let completions: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e, Event::Completion(_)))
        .collect();
    assert_eq!(completions, vec![&Event::Completion(Outcome::Completed)]);
}

#[test]
fn controller_can_poll_events_from_its_own_loop() {
    let controller = Controller::new();
    let editor = SimulatedEditor::new();
    let handle = controller
        .start_with(
            SessionConfig::fresh("polled", human()),
            editor.clone(),
            Launch::default().seed(4).clock(ManualClock::new()),
        )
        .unwrap();

    let mut seen = Vec::new();
    loop {
        let finished = handle.is_finished();
        seen.extend(handle.events().try_iter());
        if finished {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(handle.join(), Outcome::Completed);
    assert_eq!(editor.text(), "polled");
    assert_eq!(seen.last(), Some(&Event::Completion(Outcome::Completed)));
}

#[test]
fn dry_run_backend_drives_the_simulated_editor() {
    let (injector, editor) = open_injector(InjectBackend::DryRun, "The cat sat.").unwrap();
    let editor = editor.expect("dry run exposes its editor");

    let handle = Controller::new()
        .start_with(
            SessionConfig::replace("The cat sat.", "The dog sat.", bot()),
            injector,
            Launch::default().clock(ManualClock::new()),
        )
        .unwrap();

    assert_eq!(handle.join(), Outcome::Completed);
    assert_eq!(editor.text(), "The dog sat.");
}
