use std::sync::Arc;

use nav_session_types::{Maneuver, RouteResult};

use crate::error::NavigationError;

#[derive(Clone, Debug, PartialEq)]
enum State {
    Idle,
    Active { route: Arc<RouteResult>, step: usize },
}

/// Which maneuver of the current route the user is on.
#[derive(Clone, Debug)]
pub struct NavigationStateMachine {
    state: State,
    // The maneuver count of the last route applied. A new route only restarts from the first step
    // when this changes, so a provider re-delivering the same route doesn't jump back.
    last_maneuver_count: usize,
}

impl Default for NavigationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationStateMachine {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            last_maneuver_count: 0,
        }
    }

    /// Swaps in a new route. Returns true if the step index was reset to 0.
    ///
    /// A route without maneuvers has no valid step, so it puts the machine back to idle.
    pub fn on_new_route(&mut self, route: Arc<RouteResult>) -> bool {
        let count = route.maneuvers.len();
        if count == 0 {
            self.state = State::Idle;
            self.last_maneuver_count = 0;
            return false;
        }

        if let State::Active {
            route: current,
            step,
        } = &mut self.state
        {
            if count == self.last_maneuver_count {
                // The count is unchanged, so the step is still in bounds
                debug_assert!(*step < count);
                *current = route;
                return false;
            }
        }
        self.state = State::Active { route, step: 0 };
        self.last_maneuver_count = count;
        true
    }

    /// Forgets the route entirely, like when its waypoints are replaced.
    pub fn clear(&mut self) {
        self.state = State::Idle;
    }

    /// Returns true if the step changed.
    pub fn advance(&mut self) -> bool {
        let last = self.last_maneuver_count.saturating_sub(1);
        self.move_to(|step| (step + 1).min(last))
    }

    /// Returns true if the step changed.
    pub fn retreat(&mut self) -> bool {
        self.move_to(|step| step.saturating_sub(1))
    }

    /// Back to the first step, whatever the maneuver count. Returns true if the step changed.
    pub fn reset(&mut self) -> bool {
        self.move_to(|_| 0)
    }

    fn move_to(&mut self, f: impl FnOnce(usize) -> usize) -> bool {
        match &mut self.state {
            State::Idle => false,
            State::Active { step, .. } => {
                let next = f(*step);
                let changed = next != *step;
                *step = next;
                changed
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    pub fn route(&self) -> Option<&Arc<RouteResult>> {
        match &self.state {
            State::Idle => None,
            State::Active { route, .. } => Some(route),
        }
    }

    pub fn step_index(&self) -> Option<usize> {
        match self.state {
            State::Idle => None,
            State::Active { step, .. } => Some(step),
        }
    }

    pub fn current_maneuver(&self) -> Result<&Maneuver, NavigationError> {
        match &self.state {
            State::Idle => Err(NavigationError::NoActiveRoute),
            State::Active { route, step } => route
                .maneuver(*step)
                .ok_or(NavigationError::NoActiveRoute),
        }
    }

    // Both of these are false while idle
    pub fn is_first(&self) -> bool {
        matches!(self.state, State::Active { step: 0, .. })
    }

    pub fn is_last(&self) -> bool {
        match self.state {
            State::Idle => false,
            State::Active { step, .. } => step + 1 == self.last_maneuver_count,
        }
    }
}
