//! Cube orientation state and the permutation algebra over it
//!
//! A `CubeState` is a total bijection from the six fixed positions to the six
//! labels. Commands are the only transition, so every reachable state lies in
//! the 24-element rotation group of the cube.

use serde::{Deserialize, Serialize};

use super::command::Command;
use super::face::{Face, Label, Position};

/// Number of distinct orientations reachable from identity
pub const ROTATION_GROUP_ORDER: usize = 24;

/// Which label currently sits on each position (indexed by `Face::index`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeState {
    labels: [Label; 6],
}

impl Default for CubeState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CubeState {
    /// Every position holds the label of the same name
    pub const IDENTITY: CubeState = CubeState { labels: Face::ALL };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Label shown on `position`
    #[inline]
    pub fn label_at(&self, position: Position) -> Label {
        self.labels[position.index()]
    }

    /// Labels in position order (TOP, BOTTOM, LEFT, RIGHT, FRONT, BACK)
    pub fn labels(&self) -> &[Label; 6] {
        &self.labels
    }

    /// True when no label is repeated and none is missing
    pub fn is_bijection(&self) -> bool {
        let mut seen = [false; 6];
        for label in self.labels {
            if std::mem::replace(&mut seen[label.index()], true) {
                return false;
            }
        }
        true
    }

    /// Apply one command, returning the rotated state
    pub fn apply(&self, command: Command) -> CubeState {
        let mut next = *self;
        for &(dst, src) in command.cycle() {
            next.labels[dst.index()] = self.labels[src.index()];
        }
        debug_assert!(next.is_bijection());
        next
    }

    /// Apply a whole command sequence in order
    pub fn apply_all<'a, I>(&self, commands: I) -> CubeState
    where
        I: IntoIterator<Item = &'a Command>,
    {
        commands
            .into_iter()
            .fold(*self, |state, &command| state.apply(command))
    }

    /// Position currently holding `label`
    pub fn locate(&self, label: Label) -> Position {
        // A bijection always contains every label
        let index = self
            .labels
            .iter()
            .position(|&l| l == label)
            .unwrap_or(label.index());
        Face::ALL[index]
    }
}

/// Apply one command to a state
#[inline]
pub fn apply(state: &CubeState, command: Command) -> CubeState {
    state.apply(command)
}

/// Position currently holding `label`
#[inline]
pub fn locate(state: &CubeState, label: Label) -> Position {
    state.locate(label)
}

/// Where `tracked` ends up after playing `commands` from identity.
///
/// This is the only place correct answers are computed.
pub fn resolve(commands: &[Command], tracked: Label) -> Position {
    CubeState::IDENTITY.apply_all(commands).locate(tracked)
}

/// Every state reachable from identity (breadth-first over all commands)
pub fn reachable_states() -> Vec<CubeState> {
    let mut seen = vec![CubeState::IDENTITY];
    let mut frontier = vec![CubeState::IDENTITY];
    while let Some(state) = frontier.pop() {
        for command in Command::ALL {
            let next = state.apply(command);
            if !seen.contains(&next) {
                seen.push(next);
                frontier.push(next);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn command_strategy() -> impl Strategy<Value = Command> {
        prop::sample::select(Command::ALL.to_vec())
    }

    fn state_strategy() -> impl Strategy<Value = CubeState> {
        prop::collection::vec(command_strategy(), 0..24)
            .prop_map(|cmds| CubeState::IDENTITY.apply_all(&cmds))
    }

    #[test]
    fn test_identity_is_named_faces() {
        for face in Face::ALL {
            assert_eq!(CubeState::IDENTITY.label_at(face), face);
            assert_eq!(CubeState::IDENTITY.locate(face), face);
        }
    }

    #[test]
    fn test_left_moves_right_label_to_top() {
        assert_eq!(resolve(&[Command::Left], Face::Right), Face::Top);
        assert_eq!(resolve(&[Command::Left, Command::Right], Face::Right), Face::Right);
    }

    #[test]
    fn test_front_moves_front_label_to_bottom() {
        assert_eq!(resolve(&[Command::Front], Face::Front), Face::Bottom);
        // Two quarter turns land a face on its opposite side
        assert_eq!(resolve(&[Command::Front, Command::Front], Face::Front), Face::Back);
    }

    #[test]
    fn test_four_quarter_turns_return_home() {
        for cmd in Command::ALL {
            let state = CubeState::IDENTITY.apply_all(&[cmd; 4]);
            assert_eq!(state, CubeState::IDENTITY);
        }
    }

    #[test]
    fn test_fixed_positions_untouched() {
        for cmd in Command::ALL {
            let state = CubeState::IDENTITY.apply(cmd);
            for pos in cmd.fixed_positions() {
                assert_eq!(state.label_at(pos), pos);
            }
        }
    }

    #[test]
    fn test_reachable_states_is_rotation_group() {
        let states = reachable_states();
        assert_eq!(states.len(), ROTATION_GROUP_ORDER);
        assert!(states.iter().all(CubeState::is_bijection));
    }

    proptest! {
        #[test]
        fn prop_apply_preserves_bijection(state in state_strategy(), cmd in command_strategy()) {
            prop_assert!(state.apply(cmd).is_bijection());
        }

        #[test]
        fn prop_inverse_pairs_roundtrip(state in state_strategy()) {
            prop_assert_eq!(state.apply(Command::Left).apply(Command::Right), state);
            prop_assert_eq!(state.apply(Command::Right).apply(Command::Left), state);
            prop_assert_eq!(state.apply(Command::Front).apply(Command::Back), state);
            prop_assert_eq!(state.apply(Command::Back).apply(Command::Front), state);
        }

        #[test]
        fn prop_resolve_is_deterministic_and_injective(
            cmds in prop::collection::vec(command_strategy(), 1..16)
        ) {
            let first: Vec<Position> = Face::ALL.iter().map(|&l| resolve(&cmds, l)).collect();
            let second: Vec<Position> = Face::ALL.iter().map(|&l| resolve(&cmds, l)).collect();
            prop_assert_eq!(&first, &second);

            let mut sorted = first.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), 6);
        }

        #[test]
        fn prop_state_stays_in_group(state in state_strategy()) {
            prop_assert!(reachable_states().contains(&state));
        }
    }
}
