//! Balls dropping down every column of the panel, losing energy on each bounce.
//!
//! Each ball follows `h(t) = g/2 * t^2 + v * t` from its last bounce. When it
//! hits the floor its impact velocity is dampened and the clock restarts. Once
//! the ball has come to rest it is dropped again from a new random height.

use std::time::Duration;

use rand::Rng;
use smart_leds::RGB8;

use crate::config::BouncingBallsConfig;
use crate::panel::Panel;
use crate::uptime::Uptime;

const GRAVITY: f64 = -9.81;

/// Impact velocity under which a bounce restarts from the initial velocity.
const VELOCITY_FLOOR: f64 = 0.01;

const REST_HEIGHT: f64 = 0.01;
const REST_VELOCITY: f64 = 0.02;

/// Minimum hue distance in degrees between random ball colors of a column.
const COLOR_DISTANCE: f32 = 60.0;

#[derive(Debug, Clone, Default)]
struct Ball {
    height: f64,
    start_height: u32,
    impact_velocity: f64,
    impact_velocity_start: f64,
    time_since_last_bounce: f64,
    clock_time_since_last_bounce: u64,
    dampening: f64,
    position: u32,
    color: RGB8,
}

impl Ball {
    /// Drop the ball again. Does not touch the color.
    fn reset<R: Rng>(&mut self, rng: &mut R, idx: usize, count: usize, rows: u32, now: u64) {
        self.clock_time_since_last_bounce = now;
        self.start_height = rng.gen_range(1..=(rows / 2).max(1)) + idx as u32;
        self.height = f64::from(self.start_height);
        self.position = 0;
        self.impact_velocity_start = (-2.0 * GRAVITY * f64::from(self.start_height)).sqrt();
        self.impact_velocity = self.impact_velocity_start;
        self.time_since_last_bounce = 0.0;
        self.dampening =
            f64::from(rng.gen_range(88..=90u32)) / 100.0 - (idx as f64) / (count as f64).powi(2);
    }

    /// Advance to `now`. Returns whether the ball has come to rest.
    fn advance(&mut self, now: u64, span: u32) -> bool {
        self.time_since_last_bounce = now.saturating_sub(self.clock_time_since_last_bounce) as f64;
        let secs = self.time_since_last_bounce / 1000.0;
        self.height = 0.5 * GRAVITY * secs.powi(2) + self.impact_velocity * secs;

        if self.height < 0.0 {
            self.height = 0.0;
            self.impact_velocity *= self.dampening;
            self.clock_time_since_last_bounce = now;

            if self.impact_velocity < VELOCITY_FLOOR {
                self.impact_velocity = self.impact_velocity_start;
            }
        }

        self.position =
            (self.height * f64::from(span) / f64::from(self.start_height)).round() as u32;

        self.height < REST_HEIGHT
            && self.time_since_last_bounce > 0.0
            && self.impact_velocity < REST_VELOCITY
    }
}

#[derive(Debug, Clone)]
struct Column {
    index: u32,
    balls: Vec<Ball>,
}

impl Column {
    fn new(index: u32, count: usize) -> Self {
        Self {
            index,
            balls: vec![Ball::default(); count],
        }
    }

    /// Reset and recolor one ball, or all of them when `ball` is `None`.
    fn reset<R: Rng>(
        &mut self,
        ball: Option<usize>,
        rng: &mut R,
        palette: &[[u8; 3]],
        rows: u32,
        now: u64,
    ) {
        let count = self.balls.len();
        for idx in 0..count {
            if ball.is_some_and(|b| b != idx) {
                continue;
            }

            self.balls[idx].reset(rng, idx, count, rows, now);
            self.recolor(idx, rng, palette);
        }
    }

    /// Configured colors go to the first balls, the rest get random ones.
    fn recolor<R: Rng>(&mut self, idx: usize, rng: &mut R, palette: &[[u8; 3]]) {
        let color = match palette.get(idx) {
            Some(&[r, g, b]) => RGB8::new(r, g, b),
            None => {
                let others = self
                    .balls
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != idx)
                    .map(|(_, ball)| ball.color);

                crate::color::random_color(rng, others, COLOR_DISTANCE)
            }
        };

        self.balls[idx].color = color;
    }

    fn render<P: Panel>(&self, panel: &mut P, rows: u32) {
        for ball in self.balls.iter().filter(|ball| ball.position < rows) {
            panel.plot_pixel(self.index, rows - 1 - ball.position, ball.color);
        }
    }
}

pub struct BouncingBalls<R, U> {
    config: BouncingBallsConfig,
    rng: R,
    uptime: U,
    columns: Option<Vec<Column>>,
}

impl<R, U> BouncingBalls<R, U>
where
    R: Rng,
    U: Uptime,
{
    pub fn new(config: BouncingBallsConfig, rng: R, uptime: U) -> Self {
        Self {
            config,
            rng,
            uptime,
            columns: None,
        }
    }

    fn step<P: Panel>(&mut self, panel: &mut P) {
        let Some(columns) = self.columns.as_mut() else {
            return;
        };

        let rows = panel.height();
        let count = self.config.count;
        let span = (rows as usize).max(count).saturating_sub(1) as u32;

        for column in columns.iter_mut() {
            for idx in 0..column.balls.len() {
                let now = self.uptime.uptime_millis();
                if column.balls[idx].advance(now, span) {
                    tracing::trace!(column = column.index, ball = idx, "Ball came to rest");
                    column.reset(Some(idx), &mut self.rng, &self.config.colors, rows, now);
                }
            }

            column.render(panel, rows);
        }
    }
}

impl<R, U> super::Effect for BouncingBalls<R, U>
where
    R: Rng,
    U: Uptime,
{
    const NAME: &'static str = "bouncing_balls";

    fn init<P: Panel>(&mut self, panel: &mut P) -> Duration {
        panel.set_brightness(self.config.dim_all);

        let rows = panel.height();
        let now = self.uptime.uptime_millis();
        let columns = (0..panel.width())
            .map(|index| {
                let mut column = Column::new(index, self.config.count);
                column.reset(None, &mut self.rng, &self.config.colors, rows, now);
                column
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            columns = columns.len(),
            balls = self.config.count,
            "Allocated ball state"
        );
        self.columns = Some(columns);
        self.config.timeout
    }

    fn run<P: Panel>(&mut self, panel: &mut P) -> Result<(), P::Error> {
        if self.columns.is_none() {
            tracing::warn!("Loop called before init, ignoring");
            return Ok(());
        }

        for _ in 0..self.config.loops {
            self.step(panel);
            panel.show()?;
            panel.clear();
        }

        Ok(())
    }

    fn exit(&mut self) {
        if self.columns.take().is_none() {
            tracing::debug!("Exit called without state, nothing to release");
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use smart_leds::RGB8;

    use super::*;
    use crate::effect::Effect;
    use crate::panel::testing::RecordingWriter;
    use crate::panel::Layout;
    use crate::panel::Matrix;
    use crate::uptime::testing::ManualUptime;

    const RED: RGB8 = RGB8::new(255, 0, 0);
    const GREEN: RGB8 = RGB8::new(0, 255, 0);

    fn config(count: usize, colors: Vec<[u8; 3]>) -> BouncingBallsConfig {
        BouncingBallsConfig {
            count,
            colors,
            ..BouncingBallsConfig::default()
        }
    }

    fn effect(
        config: BouncingBallsConfig,
    ) -> (BouncingBalls<StdRng, ManualUptime>, ManualUptime) {
        let uptime = ManualUptime::default();
        let effect = BouncingBalls::new(config, StdRng::seed_from_u64(42), uptime.clone());
        (effect, uptime)
    }

    fn matrix(width: u32, height: u32) -> Matrix<RecordingWriter> {
        Matrix::new(RecordingWriter::default(), Layout::Rectangular, width, height)
    }

    fn ball(start_height: u32, impact_velocity: f64, dampening: f64) -> Ball {
        let impact_velocity_start = (-2.0 * GRAVITY * f64::from(start_height)).sqrt();
        Ball {
            height: f64::from(start_height),
            start_height,
            impact_velocity,
            impact_velocity_start,
            dampening,
            ..Ball::default()
        }
    }

    #[test]
    fn test_init_allocates_one_column_per_panel_column() {
        let (mut effect, _) = effect(config(4, vec![]));
        let mut matrix = matrix(5, 16);

        let interval = effect.init(&mut matrix);
        assert_eq!(interval, Duration::from_millis(20));
        assert_eq!(matrix.brightness(), 255);

        let columns = effect.columns.as_ref().unwrap();
        assert_eq!(columns.len(), 5);
        for (index, column) in columns.iter().enumerate() {
            assert_eq!(column.index, index as u32);
            assert_eq!(column.balls.len(), 4);
        }
    }

    #[test]
    fn test_init_drops_every_ball() {
        let (mut effect, _) = effect(config(4, vec![]));
        let mut matrix = matrix(3, 16);
        effect.init(&mut matrix);

        for column in effect.columns.as_ref().unwrap() {
            for (idx, ball) in column.balls.iter().enumerate() {
                let idx32 = idx as u32;
                assert!((1 + idx32..=8 + idx32).contains(&ball.start_height));
                assert_eq!(ball.height, f64::from(ball.start_height));
                assert_eq!(ball.position, 0);
                assert_eq!(ball.impact_velocity, ball.impact_velocity_start);
                assert!(
                    (ball.impact_velocity_start - (19.62 * f64::from(ball.start_height)).sqrt())
                        .abs()
                        < 1e-9
                );

                let penalty = idx as f64 / 16.0;
                assert!(ball.dampening >= 0.88 - penalty - 1e-9);
                assert!(ball.dampening <= 0.90 - penalty + 1e-9);
            }
        }
    }

    #[test]
    fn test_single_row_panel_still_gets_start_height() {
        let (mut effect, _) = effect(config(2, vec![]));
        let mut matrix = matrix(1, 1);
        effect.init(&mut matrix);

        let balls = &effect.columns.as_ref().unwrap()[0].balls;
        assert_eq!(balls[0].start_height, 1);
        assert_eq!(balls[1].start_height, 2);
    }

    #[test]
    fn test_dim_all_sets_brightness() {
        let (mut effect, _) = effect(BouncingBallsConfig {
            dim_all: 64,
            ..BouncingBallsConfig::default()
        });
        let mut matrix = matrix(2, 2);
        effect.init(&mut matrix);
        assert_eq!(matrix.brightness(), 64);
    }

    #[test]
    fn test_configured_colors_come_first() {
        let (mut effect, _) = effect(config(3, vec![[255, 0, 0], [0, 255, 0]]));
        let mut matrix = matrix(2, 8);
        effect.init(&mut matrix);

        for column in effect.columns.as_ref().unwrap() {
            assert_eq!(column.balls[0].color, RED);
            assert_eq!(column.balls[1].color, GREEN);

            let hue = crate::color::hue_of(column.balls[2].color).unwrap();
            assert!((hue - 0.0).abs().min(360.0 - hue) >= 59.0);
            assert!((hue - 120.0).abs() >= 59.0);
        }
    }

    #[test]
    fn test_surplus_colors_are_ignored() {
        let (mut effect, _) = effect(config(1, vec![[255, 0, 0], [0, 255, 0]]));
        let mut matrix = matrix(1, 8);
        effect.init(&mut matrix);

        let balls = &effect.columns.as_ref().unwrap()[0].balls;
        assert_eq!(balls.len(), 1);
        assert_eq!(balls[0].color, RED);
    }

    #[test]
    fn test_resetting_one_ball_keeps_other_colors() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut column = Column::new(0, 3);
        column.reset(None, &mut rng, &[], 16, 0);
        let before = column.balls.iter().map(|b| b.color).collect::<Vec<_>>();

        column.reset(Some(0), &mut rng, &[], 16, 100);

        assert_eq!(column.balls[1].color, before[1]);
        assert_eq!(column.balls[2].color, before[2]);
        assert_eq!(column.balls[0].clock_time_since_last_bounce, 100);
        assert_eq!(column.balls[1].clock_time_since_last_bounce, 0);
    }

    #[test]
    fn test_loop_before_init_does_nothing() {
        let (mut effect, _) = effect(config(1, vec![]));
        let mut matrix = matrix(2, 2);
        effect.run(&mut matrix).unwrap();
        assert!(matrix.writer().frames.is_empty());
    }

    #[test]
    fn test_first_frame_starts_on_the_floor() {
        let (mut effect, _) = effect(config(1, vec![[255, 0, 0]]));
        let mut matrix = matrix(4, 3);
        effect.init(&mut matrix);
        effect.run(&mut matrix).unwrap();

        let frames = &matrix.writer().frames;
        assert_eq!(frames.len(), 1);

        let frame = &frames[0];
        for x in 0..4 {
            assert_eq!(frame[x], RGB8::default());
            assert_eq!(frame[4 + x], RGB8::default());
            assert_eq!(frame[8 + x], RED);
        }

        // the buffer is blanked after showing
        assert_eq!(matrix.pixel(0, 2), Some(RGB8::default()));
    }

    #[test]
    fn test_loops_shows_multiple_frames() {
        let (mut effect, _) = effect(BouncingBallsConfig {
            loops: 3,
            ..BouncingBallsConfig::default()
        });
        let mut matrix = matrix(2, 4);
        effect.init(&mut matrix);
        effect.run(&mut matrix).unwrap();
        assert_eq!(matrix.writer().frames.len(), 3);
    }

    #[test]
    fn test_ball_follows_trajectory() {
        let (mut effect, uptime) = effect(config(1, vec![]));
        let mut matrix = matrix(1, 16);
        effect.init(&mut matrix);

        uptime.advance(500);
        effect.run(&mut matrix).unwrap();

        let ball = &effect.columns.as_ref().unwrap()[0].balls[0];
        let expected = 0.5 * GRAVITY * 0.25 + ball.impact_velocity_start * 0.5;
        assert!((ball.height - expected).abs() < 1e-9);
        assert_eq!(ball.time_since_last_bounce, 500.0);

        let position = (expected * 15.0 / f64::from(ball.start_height)).round() as u32;
        assert_eq!(ball.position, position);
        assert_eq!(matrix.writer().frames[0][(15 - position) as usize], ball.color);
    }

    #[test]
    fn test_bounce_dampens_velocity() {
        let mut ball = ball(4, 8.0, 0.9);

        // airtime of a throw with 8 m/s is about 1.63s
        assert!(!ball.advance(2000, 15));
        assert_eq!(ball.height, 0.0);
        assert_eq!(ball.position, 0);
        assert!((ball.impact_velocity - 7.2).abs() < 1e-9);
        assert_eq!(ball.clock_time_since_last_bounce, 2000);
    }

    #[test]
    fn test_tiny_velocity_restarts_from_initial() {
        let mut ball = ball(4, 0.01, 0.5);

        assert!(!ball.advance(100, 15));
        assert_eq!(ball.impact_velocity, ball.impact_velocity_start);
    }

    #[test]
    fn test_ball_at_rest_is_reported() {
        let mut ball = ball(4, 0.015, 0.89);
        ball.height = 0.0;

        assert!(ball.advance(10, 15));
        assert_eq!(ball.height, 0.0);
        assert!((ball.impact_velocity - 0.01335).abs() < 1e-9);
    }

    #[test]
    fn test_no_time_passed_is_not_rest() {
        let mut ball = ball(4, 0.015, 0.89);
        assert!(!ball.advance(0, 15));
    }

    #[test]
    fn test_resting_ball_is_dropped_again() {
        let (mut effect, uptime) = effect(config(1, vec![]));
        let mut matrix = matrix(1, 8);
        effect.init(&mut matrix);

        {
            let ball = &mut effect.columns.as_mut().unwrap()[0].balls[0];
            ball.impact_velocity = 0.015;
            ball.dampening = 0.89;
        }

        uptime.advance(10);
        effect.run(&mut matrix).unwrap();

        let ball = &effect.columns.as_ref().unwrap()[0].balls[0];
        assert_eq!(ball.impact_velocity, ball.impact_velocity_start);
        assert_eq!(ball.height, f64::from(ball.start_height));
        assert_eq!(ball.clock_time_since_last_bounce, 10);
        assert_eq!(ball.time_since_last_bounce, 0.0);
    }

    #[test]
    fn test_balls_above_the_panel_are_not_drawn() {
        let mut matrix = matrix(1, 2);
        let mut column = Column::new(0, 4);
        column.balls[0] = ball(3, 0.0, 0.9);
        column.balls[0].color = RED;
        column.balls[0].position = 3;
        column.balls[1] = ball(3, 0.0, 0.9);
        column.balls[1].color = GREEN;
        column.balls[1].position = 1;

        column.render(&mut matrix, 2);

        assert_eq!(matrix.pixel(0, 0), Some(GREEN));
        assert_eq!(matrix.pixel(0, 1), Some(RGB8::default()));
    }

    #[test]
    fn test_more_balls_than_rows_scale_by_ball_count() {
        let (mut effect, uptime) = effect(config(4, vec![]));
        let mut matrix = matrix(1, 2);
        effect.init(&mut matrix);

        uptime.advance(300);
        effect.run(&mut matrix).unwrap();

        let balls = &effect.columns.as_ref().unwrap()[0].balls;
        let top = &balls[3];
        assert_eq!(top.start_height, 4);
        assert!(top.height > 0.0 && top.height < 4.0);

        // the span is max(rows, count) - 1 = 3, not rows - 1
        let position = (top.height * 3.0 / 4.0).round() as u32;
        assert_eq!(top.position, position);
        assert!(top.position >= 2);

        for ball in balls {
            let expected = (ball.height * 3.0 / f64::from(ball.start_height)).round() as u32;
            assert_eq!(ball.position, expected);
        }

        // every ball is above the two rows of the panel in this frame
        let frame = &matrix.writer().frames[0];
        assert!(frame.iter().all(|pixel| *pixel == RGB8::default()));
    }

    #[test]
    fn test_height_never_negative() {
        let (mut effect, uptime) = effect(config(5, vec![]));
        let mut matrix = matrix(3, 10);
        effect.init(&mut matrix);

        for _ in 0..3000 {
            uptime.advance(7);
            effect.run(&mut matrix).unwrap();

            for column in effect.columns.as_ref().unwrap() {
                for ball in &column.balls {
                    assert!(ball.height >= 0.0);
                    assert!(ball.position <= 9);
                }
            }
        }
    }

    #[test]
    fn test_exit_releases_state() {
        let (mut effect, _) = effect(config(2, vec![]));
        let mut matrix = matrix(2, 4);
        effect.init(&mut matrix);
        assert!(effect.columns.is_some());

        effect.exit();
        assert!(effect.columns.is_none());
        effect.exit();

        effect.run(&mut matrix).unwrap();
        assert!(matrix.writer().frames.is_empty());
    }
}
