use giftcert::{StepIndicator, StepState};

#[test]
fn payment_step_indicator_states() {
    let ind = StepIndicator::new(2);
    assert_eq!(ind.state(1), StepState::Completed);
    assert_eq!(ind.state(2), StepState::Active);
    assert_eq!(ind.state(3), StepState::Upcoming);
}

#[test]
fn completed_steps_precede_the_active_one() {
    for current in 1..=3 {
        let states = StepIndicator::new(current).states();
        let active = states.iter().position(|(_, s)| *s == StepState::Active).expect("one active");
        assert!(states[..active].iter().all(|(_, s)| *s == StepState::Completed));
        assert!(states[active + 1..].iter().all(|(_, s)| *s == StepState::Upcoming));
    }
}

#[test]
fn custom_total() {
    let ind = StepIndicator::with_total(4, 5);
    assert_eq!(ind.states().len(), 5);
    assert_eq!(ind.state(5), StepState::Upcoming);
}
