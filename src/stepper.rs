use rayon::iter::{
    IndexedParallelIterator as _, IntoParallelRefMutIterator as _, ParallelIterator as _,
};

use crate::{
    error::SimulationError,
    field::{ForceField, ForcePoint, SimParams},
    store::Generation,
};

/// Progress of the current frame's step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepState {
    /// Waiting for the frame's input.
    #[default]
    Idle,
    Stepping,
    /// Every particle has been written, ready to swap.
    Complete,
}

/// Advances one generation into the other, a parallel map over particles.
#[derive(Debug, Default)]
pub struct Stepper {
    state: StepState,
}

impl Stepper {
    pub fn state(&self) -> StepState {
        self.state
    }

    /// Writes every particle of `write` from the same index of `read`.
    ///
    /// Sizes are checked before the first write; on mismatch `write` is left
    /// untouched and the state stays `Idle`.
    pub fn step(
        &mut self,
        read: &Generation,
        write: &mut Generation,
        points: &[ForcePoint],
        params: &SimParams,
    ) -> Result<(), SimulationError> {
        debug_assert_eq!(self.state, StepState::Idle);

        let count = read.len();
        read.check_len(count)?;
        write.check_len(count)?;

        self.state = StepState::Stepping;

        let field = ForceField::new(params, points);
        let Generation { position, velocity } = write;
        position
            .par_iter_mut()
            .zip(velocity.par_iter_mut())
            .enumerate()
            .for_each(|(idx, (position, velocity))| {
                let next = field.advance(read.position[idx], read.velocity[idx]);
                *position = next.position;
                *velocity = next.velocity;
            });

        self.state = StepState::Complete;
        Ok(())
    }

    /// Acknowledges a completed step once the generations were swapped.
    pub fn finish(&mut self) {
        debug_assert_eq!(self.state, StepState::Complete);
        self.state = StepState::Idle;
    }
}
