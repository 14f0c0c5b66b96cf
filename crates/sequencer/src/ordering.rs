//! Tie-break ordering for simultaneous events.
//!
//! Events sharing a due time and a point are ordered, when moving forwards:
//!
//! | rank | event                                   |
//! |------|-----------------------------------------|
//! | 0    | EXIT through an open endpoint `)`       |
//! | 1    | ENTER through a closed endpoint `[`     |
//! | 2    | ENTER singular                          |
//! | 3    | EXIT singular                           |
//! | 4    | EXIT through a closed endpoint `]`      |
//! | 5    | ENTER through an open endpoint `(`      |
//!
//! Moving backwards reverses ranks 0..=5. CHANGE events sort last. Each
//! event is ranked by its own direction, the one at its due time.

use std::sync::Arc;

use contracts::{Cause, Cue, CueEvent, Direction, PointType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Enter,
    Exit,
    Change,
}

pub(crate) fn make_event(
    cue: &Arc<Cue>,
    point: f64,
    direction: Direction,
    cause: Cause,
    verb: Verb,
    due: f64,
    delivered: f64,
) -> CueEvent {
    CueEvent {
        cue: cue.clone(),
        point,
        point_type: cue.interval.point_type(point),
        direction,
        cause,
        enter: verb == Verb::Enter,
        exit: verb == Verb::Exit,
        due_timestamp: due,
        delivered_timestamp: delivered,
    }
}

fn closed_at(event: &CueEvent) -> bool {
    match event.point_type {
        PointType::Low => event.interval().low_include(),
        PointType::High => event.interval().high_include(),
        _ => false,
    }
}

pub fn rank(event: &CueEvent, direction: Direction) -> u8 {
    let forward = match (event.enter, event.exit) {
        (false, false) => return 6,
        (true, _) if event.point_type == PointType::Singular => 2,
        (_, true) if event.point_type == PointType::Singular => 3,
        (true, _) if closed_at(event) => 1,
        (true, _) => 5,
        (_, true) if closed_at(event) => 4,
        (_, true) => 0,
    };
    if direction == Direction::Backwards {
        5 - forward
    } else {
        forward
    }
}

/// Stable sort by due time, point, then rank.
pub fn reorder(events: &mut [CueEvent]) {
    if events.len() < 2 {
        return;
    }
    events.sort_by(|a, b| {
        a.due_timestamp
            .total_cmp(&b.due_timestamp)
            .then(a.point.total_cmp(&b.point))
            .then(rank(a, a.direction).cmp(&rank(b, b.direction)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Interval;
    use serde_json::Value;

    fn cue(key: &str, interval: Interval) -> Arc<Cue> {
        Arc::new(Cue::new(key, interval, Value::Null))
    }

    fn ev(cue: &Arc<Cue>, verb: Verb, direction: Direction) -> CueEvent {
        make_event(cue, 10.0, direction, Cause::Playback, verb, 10.0, 10.0)
    }

    fn keys(events: &[CueEvent]) -> Vec<String> {
        events.iter().map(|e| format!("{}:{}", e.key(), e.verb())).collect()
    }

    #[test]
    fn test_forward_order() {
        let d = Direction::Forwards;
        let exit_open = cue("exit_open", Interval::new(0.0, 10.0).unwrap());
        let enter_closed = cue("enter_closed", Interval::new(10.0, 20.0).unwrap());
        let singular = cue("singular", Interval::singular(10.0));
        let exit_closed = cue("exit_closed", Interval::closed(0.0, 10.0).unwrap());
        let enter_open = cue("enter_open", Interval::with_bounds(10.0, 20.0, false, false).unwrap());

        let mut events = vec![
            ev(&enter_open, Verb::Enter, d),
            ev(&exit_closed, Verb::Exit, d),
            ev(&singular, Verb::Exit, d),
            ev(&singular, Verb::Enter, d),
            ev(&enter_closed, Verb::Enter, d),
            ev(&exit_open, Verb::Exit, d),
        ];
        reorder(&mut events);
        assert_eq!(
            keys(&events),
            vec![
                "exit_open:EXIT",
                "enter_closed:ENTER",
                "singular:ENTER",
                "singular:EXIT",
                "exit_closed:EXIT",
                "enter_open:ENTER"
            ]
        );
    }

    #[test]
    fn test_backward_order_is_reversed() {
        let d = Direction::Backwards;
        // Moving backwards through 10: [10,20) is left through its closed low,
        // [0,10) is entered through its open high.
        let exit_closed = cue("exit_closed", Interval::new(10.0, 20.0).unwrap());
        let enter_open = cue("enter_open", Interval::new(0.0, 10.0).unwrap());
        let singular = cue("singular", Interval::singular(10.0));

        let mut events = vec![
            ev(&exit_closed, Verb::Exit, d),
            ev(&singular, Verb::Enter, d),
            ev(&enter_open, Verb::Enter, d),
            ev(&singular, Verb::Exit, d),
        ];
        reorder(&mut events);
        assert_eq!(
            keys(&events),
            vec![
                "enter_open:ENTER",
                "exit_closed:EXIT",
                "singular:EXIT",
                "singular:ENTER"
            ]
        );
    }

    #[test]
    fn test_time_dominates_rank() {
        let d = Direction::Forwards;
        let a = cue("a", Interval::new(0.0, 10.0).unwrap());
        let b = cue("b", Interval::new(5.0, 10.0).unwrap());
        let late = make_event(&a, 10.0, d, Cause::Playback, Verb::Exit, 11.0, 11.0);
        let early = make_event(&b, 5.0, d, Cause::Playback, Verb::Enter, 5.0, 5.0);
        let change = make_event(&b, 5.0, d, Cause::CueChange, Verb::Change, 5.0, 5.0);
        let mut events = vec![late, change, early];
        reorder(&mut events);
        assert_eq!(keys(&events), vec!["b:ENTER", "b:CHANGE", "a:EXIT"]);
    }
}
