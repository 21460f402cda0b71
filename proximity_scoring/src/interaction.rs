/*!
The selection state machine of one participant.

Each transition is a pure function from the current state and an event to the next
state, plus an optional effect that the presentation layer must carry out. The
state machine owns the duplicate-submission guard: while a submission is in flight,
further submit events are ignored.

```
use proximity_scoring::interaction::*;
use proximity_scoring::{Point, Scorer};

let scorer = Scorer::default_poll(400.0)?;
let top = scorer.triangle().vertices()[0];

let t = InteractionState::Idle.on_event(&PointerEvent::Click(Point::new(top.x, top.y + 10.0)), &scorer)?;
let t = t.state.on_event(&PointerEvent::Submit, &scorer)?;
assert!(matches!(t.state, InteractionState::Submitting(_)));
assert!(matches!(t.effect, Some(Effect::SendSubmission(_))));

# Ok::<(), proximity_scoring::ScoringError>(())
```
*/

use log::debug;

use crate::{Point, Rejection, ScoreTriple, Scorer, ScoringError, Verdict};

/// Where the participant stands.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum InteractionState {
    /// Nothing selected.
    Idle,
    /// A point is selected and can be submitted.
    PointSelected(Point),
    /// The selected point is being dragged.
    Adjusting(Point),
    /// The selection was accepted and sent; waiting for the endpoint.
    Submitting(Point),
    /// The submission went through. Terminal.
    Done,
}

/// Input from the participant or from the submission endpoint.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum PointerEvent {
    Click(Point),
    Press(Point),
    Move(Point),
    Release,
    /// The pointer left the canvas.
    Leave,
    Submit,
    SubmissionSucceeded,
    /// The endpoint failed, refused the submission or timed out.
    SubmissionFailed,
}

/// A selection that passed validation and must be sent to the endpoint.
#[derive(PartialEq, Debug, Clone)]
pub struct AcceptedSelection {
    pub point: Point,
    pub scores: ScoreTriple,
    /// Each label with its score, in category order.
    pub proximities: Vec<(String, i32)>,
}

/// What the presentation layer must do after a transition.
#[derive(PartialEq, Debug, Clone)]
pub enum Effect {
    /// Show the scores of the selected point.
    Preview([i32; 3]),
    /// Remove the selected point and its scores.
    ClearSelection,
    /// Show the breakdown so that the participant can move the point.
    ShowRejection(Rejection),
    /// Call the submission endpoint. The trigger stays disabled until it answers.
    SendSubmission(AcceptedSelection),
    NavigateToResults,
    /// Re-enable the trigger and tell the participant to try again.
    PromptRetry,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Transition {
    pub state: InteractionState,
    pub effect: Option<Effect>,
}

impl Transition {
    fn to(state: InteractionState) -> Transition {
        Transition {
            state,
            effect: None,
        }
    }

    fn with(state: InteractionState, effect: Effect) -> Transition {
        Transition {
            state,
            effect: Some(effect),
        }
    }
}

impl InteractionState {
    pub fn selected_point(&self) -> Option<Point> {
        match self {
            InteractionState::PointSelected(p)
            | InteractionState::Adjusting(p)
            | InteractionState::Submitting(p) => Some(*p),
            InteractionState::Idle | InteractionState::Done => None,
        }
    }

    /// True while a submission is in flight.
    pub fn is_submitting(&self) -> bool {
        matches!(self, InteractionState::Submitting(_))
    }

    /// Computes the next state.
    ///
    /// Errors only come from a broken scorer configuration; every participant
    /// mistake is handled as a transition.
    pub fn on_event(
        &self,
        event: &PointerEvent,
        scorer: &Scorer,
    ) -> Result<Transition, ScoringError> {
        use InteractionState::*;
        use PointerEvent::*;

        let res = match (*self, *event) {
            (Done, _) => Transition::to(Done),

            (Idle | PointSelected(_), Click(p)) => {
                if scorer.triangle().contains(&p) {
                    let raw = scorer.triangle().raw_scores(&p)?;
                    Transition::with(PointSelected(p), Effect::Preview(raw))
                } else {
                    Transition::with(Idle, Effect::ClearSelection)
                }
            }

            (PointSelected(selected), Press(p)) => {
                if selected.distance(&p) <= scorer.rules().hit_radius {
                    Transition::to(Adjusting(selected))
                } else {
                    Transition::to(*self)
                }
            }

            (Adjusting(_), Move(p)) => {
                if scorer.triangle().contains(&p) {
                    let raw = scorer.triangle().raw_scores(&p)?;
                    Transition::with(Adjusting(p), Effect::Preview(raw))
                } else {
                    Transition::to(*self)
                }
            }

            (Adjusting(p), Release | Leave) => Transition::to(PointSelected(p)),

            (PointSelected(p), Submit) => match scorer.evaluate(&p) {
                // The triangle changed under the selection, e.g. after a resize.
                Err(ScoringError::NotInsideTriangle) => {
                    Transition::with(Idle, Effect::ClearSelection)
                }
                Err(e) => return Err(e),
                Ok(evaluation) => match evaluation.verdict {
                    Verdict::Accepted(scores) => Transition::with(
                        Submitting(p),
                        Effect::SendSubmission(AcceptedSelection {
                            point: p,
                            scores,
                            proximities: scorer.categories().tag(&scores),
                        }),
                    ),
                    Verdict::Rejected(rejection) => {
                        Transition::with(PointSelected(p), Effect::ShowRejection(rejection))
                    }
                },
            },

            (Submitting(_), SubmissionSucceeded) => Transition::with(Done, Effect::NavigateToResults),

            (Submitting(p), SubmissionFailed) => {
                Transition::with(PointSelected(p), Effect::PromptRetry)
            }

            // Everything else, including a second submit while submitting, is ignored.
            (state, _) => Transition::to(state),
        };
        debug!(
            "on_event: {:?} + {:?} -> {:?} ({:?})",
            self, event, res.state, res.effect
        );
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Triangle;

    fn scorer() -> Scorer {
        Scorer::default_poll(400.0).unwrap()
    }

    fn near_top(s: &Scorer) -> Point {
        let top = s.triangle().vertices()[0];
        Point::new(top.x, top.y + 10.0)
    }

    fn run(events: &[PointerEvent]) -> (InteractionState, Vec<Effect>) {
        let s = scorer();
        let mut state = InteractionState::Idle;
        let mut effects = Vec::new();
        for e in events {
            let t = state.on_event(e, &s).unwrap();
            state = t.state;
            effects.extend(t.effect);
        }
        (state, effects)
    }

    #[test]
    fn click_inside_then_outside() {
        let s = scorer();
        let p = near_top(&s);
        let (state, effects) = run(&[PointerEvent::Click(p)]);
        assert_eq!(state, InteractionState::PointSelected(p));
        assert_eq!(effects, vec![Effect::Preview([10, 1, 1])]);

        let (state, effects) = run(&[
            PointerEvent::Click(p),
            PointerEvent::Click(Point::new(0.0, 0.0)),
        ]);
        assert_eq!(state, InteractionState::Idle);
        assert_eq!(effects.last(), Some(&Effect::ClearSelection));
    }

    #[test]
    fn drag_moves_the_selection() {
        let s = scorer();
        let p = near_top(&s);
        let q = Point::new(p.x, p.y + 30.0);
        let (state, _) = run(&[
            PointerEvent::Click(p),
            PointerEvent::Press(Point::new(p.x + 3.0, p.y)),
            PointerEvent::Move(q),
            // Outside: ignored.
            PointerEvent::Move(Point::new(0.0, 0.0)),
            PointerEvent::Release,
        ]);
        assert_eq!(state, InteractionState::PointSelected(q));
    }

    #[test]
    fn press_far_from_the_point_does_not_drag() {
        let s = scorer();
        let p = near_top(&s);
        let (state, _) = run(&[
            PointerEvent::Click(p),
            PointerEvent::Press(Point::new(p.x, p.y + 50.0)),
            PointerEvent::Move(Point::new(p.x, p.y + 60.0)),
        ]);
        assert_eq!(state, InteractionState::PointSelected(p));
    }

    #[test]
    fn indecisive_submission_goes_back_to_selection() {
        let s = scorer();
        let c = s.triangle().centroid();
        let (state, effects) = run(&[PointerEvent::Click(c), PointerEvent::Submit]);
        assert_eq!(state, InteractionState::PointSelected(c));
        match effects.last() {
            Some(Effect::ShowRejection(r)) => {
                assert_eq!(r.breakdown_lines(), "Salary: 4/10\nPeople: 4/10\nWork: 4/10")
            }
            x => panic!("unexpected effect {:?}", x),
        }
    }

    #[test]
    fn duplicate_submit_is_ignored() {
        let s = scorer();
        let p = near_top(&s);
        let (state, effects) = run(&[
            PointerEvent::Click(p),
            PointerEvent::Submit,
            PointerEvent::Submit,
            PointerEvent::Click(Point::new(0.0, 0.0)),
        ]);
        assert_eq!(state, InteractionState::Submitting(p));
        let sends = effects
            .iter()
            .filter(|e| matches!(e, Effect::SendSubmission(_)))
            .count();
        assert_eq!(sends, 1);
    }

    #[test]
    fn failure_allows_a_retry_and_success_is_terminal() {
        let s = scorer();
        let p = near_top(&s);
        let (state, effects) = run(&[
            PointerEvent::Click(p),
            PointerEvent::Submit,
            PointerEvent::SubmissionFailed,
        ]);
        assert_eq!(state, InteractionState::PointSelected(p));
        assert_eq!(effects.last(), Some(&Effect::PromptRetry));

        let (state, effects) = run(&[
            PointerEvent::Click(p),
            PointerEvent::Submit,
            PointerEvent::SubmissionSucceeded,
            PointerEvent::Click(p),
        ]);
        assert_eq!(state, InteractionState::Done);
        assert!(effects.contains(&Effect::NavigateToResults));
    }

    #[test]
    fn selection_outside_a_resized_triangle_is_cleared() {
        let s = scorer();
        let p = near_top(&s);
        let t = InteractionState::Idle
            .on_event(&PointerEvent::Click(p), &s)
            .unwrap();
        assert_eq!(t.state, InteractionState::PointSelected(p));

        let smaller = s.with_triangle(Triangle::equilateral(200.0).unwrap());
        assert!(!smaller.triangle().contains(&p));
        let t = t.state.on_event(&PointerEvent::Submit, &smaller).unwrap();
        assert_eq!(t.state, InteractionState::Idle);
        assert_eq!(t.effect, Some(Effect::ClearSelection));
    }

    #[test]
    fn submit_without_selection_does_nothing() {
        let (state, effects) = run(&[PointerEvent::Submit]);
        assert_eq!(state, InteractionState::Idle);
        assert!(effects.is_empty());
    }
}
