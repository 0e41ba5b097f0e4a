pub mod bouncing_balls;

use std::time::Duration;
use std::time::Instant;

use crate::panel::Panel;

/// Lifecycle callbacks the host delivers to an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Init,
    Loop,
    Exit,
}

pub trait Effect {
    const NAME: &'static str;

    /// Allocate state for `panel` and configure the panel for this effect.
    ///
    /// Returns the delay the host should wait between two loop callbacks.
    fn init<P: Panel>(&mut self, panel: &mut P) -> Duration;

    /// Render the next frame(s).
    fn run<P: Panel>(&mut self, panel: &mut P) -> Result<(), P::Error>;

    /// Release all state. Calling this without a previous `init` does nothing.
    fn exit(&mut self);
}

/// Dispatches host actions to an effect and keeps track of its loop duration.
pub struct Runner<E> {
    effect: E,
    frame_interval: Option<Duration>,
    measure_loop_time: bool,
    max_loop_time: Duration,
}

impl<E> Runner<E>
where
    E: Effect,
{
    pub fn new(effect: E, measure_loop_time: bool) -> Self {
        Self {
            effect,
            frame_interval: None,
            measure_loop_time,
            max_loop_time: Duration::ZERO,
        }
    }

    /// Frame interval requested by the effect on its last init.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }

    pub fn max_loop_time(&self) -> Duration {
        self.max_loop_time
    }

    #[cfg(test)]
    pub fn effect(&self) -> &E {
        &self.effect
    }

    pub fn handle<P: Panel>(&mut self, action: Action, panel: &mut P) -> Result<(), P::Error> {
        match action {
            Action::Init => {
                tracing::info!(effect = E::NAME, "called (init)");
                self.frame_interval = Some(self.effect.init(panel));
            }

            Action::Exit => {
                tracing::info!(effect = E::NAME, "called (exit)");
                self.effect.exit();
                self.frame_interval = None;
            }

            Action::Loop => {
                tracing::trace!(effect = E::NAME, "called (loop)");
                let start = Instant::now();
                self.effect.run(panel)?;

                if self.measure_loop_time {
                    let elapsed = start.elapsed();
                    self.max_loop_time = self.max_loop_time.max(elapsed);
                    tracing::trace!(
                        effect = E::NAME,
                        ?elapsed,
                        max = ?self.max_loop_time,
                        "Loop duration"
                    );
                }
            }
        }

        Ok(())
    }
}
