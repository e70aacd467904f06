//! Type one sentence through the processor and print the stored session

use theratype::types::{KeyEvent, SessionContext};
use theratype::{SessionStore, TypingProcessor};

fn main() {
    let target = "나는 충분히 잘하고 있다";
    let mut processor = TypingProcessor::new();

    let start = 1_705_327_200_000;
    if let Err(e) = processor.begin_sentence(target, start) {
        eprintln!("Error: {e:?}");
        return;
    }

    // One key per syllable at a steady pace, with a pause before the last word
    let mut typed = String::new();
    let mut now = start;
    for c in target.chars() {
        if c == '있' {
            now += 2_400;
        }
        let key = c.to_string();
        processor.key_down(&KeyEvent::new(key.as_str(), now), &typed);
        typed.push(c);
        processor.key_up(&KeyEvent::new(key.as_str(), now + 90), &typed);
        now += 650;
    }

    match processor.live_feedback(&typed, now) {
        Ok(live) => eprintln!("live: {}% at {} jamo/min", live.accuracy, live.typing_speed),
        Err(e) => eprintln!("Error: {e:?}"),
    }

    let context = SessionContext::therapy("self_esteem_01", "self_esteem");
    match processor.complete(&typed, now, context) {
        Ok(stored) => match serde_json::to_string_pretty(&stored) {
            Ok(json) => print!("{json}"),
            Err(e) => eprintln!("Error: {e:?}"),
        },
        Err(e) => eprintln!("Error: {e:?}"),
    }

    let aggregate = processor.store().aggregate();
    eprintln!("sessions stored: {}", aggregate.total_sessions);
}
