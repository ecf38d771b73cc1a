use ndarray::array;
use crate::agent::{EpisodePhase, EpisodeTracker};

#[test]
fn test_first_observation_completes_nothing() {
    let mut tracker = EpisodeTracker::new();
    assert!(tracker.is_first_step());
    assert_eq!(tracker.phase(), &EpisodePhase::AwaitingFirstObservation);

    assert!(tracker.complete(5.0, &array![1.0, 2.0], false).is_none());
}

#[test]
fn test_transition_pairs_previous_action_with_new_outcome() {
    let mut tracker = EpisodeTracker::new();
    tracker.record_action(array![0.0, 1.0], 2);
    assert!(!tracker.is_first_step());

    let transition = tracker.complete(1.5, &array![0.5, 0.5], true).unwrap();
    assert_eq!(transition.state, array![0.0, 1.0]);
    assert_eq!(transition.action, 2);
    assert_eq!(transition.reward, 1.5);
    assert_eq!(transition.next_state, array![0.5, 0.5]);
    assert!(transition.done);

    // The pending pair is consumed
    assert!(tracker.complete(1.0, &array![0.0, 0.0], false).is_none());
}

#[test]
fn test_end_and_reset_drop_pending_action() {
    let mut tracker = EpisodeTracker::new();
    tracker.record_action(array![0.0], 1);
    tracker.end();
    assert_eq!(tracker.phase(), &EpisodePhase::Ended);
    assert!(tracker.is_first_step());
    assert!(tracker.complete(1.0, &array![1.0], false).is_none());

    tracker.record_action(array![0.0], 1);
    tracker.reset();
    assert_eq!(tracker.phase(), &EpisodePhase::AwaitingFirstObservation);
    assert!(tracker.complete(1.0, &array![1.0], false).is_none());
}
