use crate::types::{GameEvent, GameState};

impl GameState {
    /// Destination of `event` fired in this state, or `None` when the event is not allowed here
    pub fn next(self, event: GameEvent) -> Option<GameState> {
        use GameEvent::*;
        use GameState::*;

        match (self, event) {
            (Waiting, Launch) => Some(Starting),
            (Starting, StartOne) => Some(One),
            (One, Input) => Some(InputCategory),
            (InputCategory, StartShowChoice) => Some(ShowingChoice),
            (ShowingChoice, StartTwo) => Some(Two),
            (Two, Input) => Some(InputLieText),
            (InputLieText, StartThree) => Some(Three),
            (Three, Input) => Some(InputTrueOption),
            (InputTrueOption, StartScore) => Some(Score),
            (Score, StartFinish) => Some(Finish),

            // Another player takes a turn, or the game is over
            (Finish, StartRepeat) => Some(Two),
            (Finish, StartReset) => Some(Reset),

            _ => None,
        }
    }
}
