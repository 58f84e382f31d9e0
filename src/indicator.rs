/// Wizard step indicator

use std::fmt;

/// Visual state of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Completed,
    Active,
    Upcoming,
}

impl StepState {
    /// Class appended to `step-indicator`; the stylesheet is supplied by the host
    pub fn css_class(self) -> &'static str {
        match self {
            StepState::Completed => "completed",
            StepState::Active => "active",
            StepState::Upcoming => "",
        }
    }
}

/// Maps the current (1-based) step to a state per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepIndicator {
    current: u32,
    total: u32,
}

impl StepIndicator {
    pub const DEFAULT_TOTAL: u32 = 3;

    pub fn new(current: u32) -> Self {
        Self::with_total(current, Self::DEFAULT_TOTAL)
    }

    pub fn with_total(current: u32, total: u32) -> Self {
        Self { current, total }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn state(&self, step: u32) -> StepState {
        if step < self.current {
            StepState::Completed
        } else if step == self.current {
            StepState::Active
        } else {
            StepState::Upcoming
        }
    }

    /// `(step, state)` for steps `1..=total`
    pub fn states(&self) -> Vec<(u32, StepState)> {
        (1..=self.total).map(|i| (i, self.state(i))).collect()
    }
}

impl fmt::Display for StepIndicator {
    /// `(✓)──[2]──( 3 )`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (step, state)) in self.states().into_iter().enumerate() {
            if idx > 0 {
                f.write_str("\u{2500}\u{2500}")?;
            }
            match state {
                StepState::Completed => f.write_str("(\u{2713})")?,
                StepState::Active => write!(f, "[{}]", step)?,
                StepState::Upcoming => write!(f, "( {} )", step)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_step_active() {
        let ind = StepIndicator::new(2);
        assert_eq!(
            ind.states(),
            vec![(1, StepState::Completed), (2, StepState::Active), (3, StepState::Upcoming)]
        );
    }

    #[test]
    fn at_most_one_active() {
        for current in 0..=4 {
            let ind = StepIndicator::new(current);
            let active = ind.states().iter().filter(|(_, s)| *s == StepState::Active).count();
            assert_eq!(active, usize::from((1..=3).contains(&current)));
        }
    }

    #[test]
    fn renders_text_and_classes() {
        assert_eq!(StepIndicator::new(2).to_string(), "(\u{2713})\u{2500}\u{2500}[2]\u{2500}\u{2500}( 3 )");
        assert_eq!(StepState::Completed.css_class(), "completed");
        assert_eq!(StepState::Upcoming.css_class(), "");
    }
}
