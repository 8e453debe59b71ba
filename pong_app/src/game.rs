//! Pong rules: two paddles, one ball, a score per side

use pong_renderer::prelude::*;
use pong_renderer::render::frame::text_width;

use crate::assets::{BALL, FONT, PADDLE};

const PADDLE_SIZE: (f32, f32) = (50.0, 100.0);
const BALL_SIZE: f32 = 50.0;
const PADDLE_MARGIN: f32 = 20.0;
const PADDLE_SPEED: f32 = 400.0;
const BALL_SPEED: (f32, f32) = (350.0, 250.0);

// Indices into [`Pong::materials`]; text uses slot 0, the default text style material
const PADDLE_MATERIAL: u32 = 1;
const BALL_MATERIAL: u32 = 2;

/// Keys held this frame
#[derive(Debug, Clone, Copy, Default)]
pub struct Input {
    /// Left paddle up (W)
    pub left_up: bool,
    /// Left paddle down (S)
    pub left_down: bool,
    /// Right paddle up (arrow up)
    pub right_up: bool,
    /// Right paddle down (arrow down)
    pub right_down: bool,
}

/// Which side scored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left player
    Left,
    /// Right player
    Right,
}

/// Complete game state
#[derive(Debug, Clone)]
pub struct Pong {
    screen: Vec2,
    left_paddle: Vec2,
    right_paddle: Vec2,
    ball: Vec2,
    ball_velocity: Vec2,
    scores: [i32; 2],
    materials: Vec<Material>,
}

impl Pong {
    /// New round on a `width` x `height` field
    pub fn new(width: f32, height: f32) -> Self {
        let paddle_y = (height - PADDLE_SIZE.1) / 2.0;

        Self {
            screen: Vec2::new(width, height),
            left_paddle: Vec2::new(PADDLE_MARGIN, paddle_y),
            right_paddle: Vec2::new(width - PADDLE_SIZE.0 - PADDLE_MARGIN, paddle_y),
            ball: Self::serve_position(width, height),
            ball_velocity: Vec2::new(BALL_SPEED.0, BALL_SPEED.1),
            scores: [0; 2],
            materials: vec![
                Material::new(FONT, Vec4::new(0.8, 0.9, 1.0, 1.0)),
                Material::new(PADDLE, Vec4::new(1.0, 1.0, 1.0, 1.0)),
                Material::new(BALL, Vec4::new(1.0, 0.8, 0.2, 1.0)),
            ],
        }
    }

    fn serve_position(width: f32, height: f32) -> Vec2 {
        Vec2::new((width - BALL_SIZE) / 2.0, (height - BALL_SIZE) / 2.0)
    }

    /// Advance the game by `dt` seconds; returns the side that scored, if any
    pub fn update(&mut self, input: &Input, dt: f32) -> Option<Side> {
        let max_y = self.screen.y - PADDLE_SIZE.1;
        let step = PADDLE_SPEED * dt;
        let axis = |up: bool, down: bool| f32::from(u8::from(down)) - f32::from(u8::from(up));

        self.left_paddle.y = (self.left_paddle.y + axis(input.left_up, input.left_down) * step).clamp(0.0, max_y);
        self.right_paddle.y = (self.right_paddle.y + axis(input.right_up, input.right_down) * step).clamp(0.0, max_y);

        self.ball += self.ball_velocity * dt;

        if self.ball.y <= 0.0 || self.ball.y + BALL_SIZE >= self.screen.y {
            self.ball.y = self.ball.y.clamp(0.0, self.screen.y - BALL_SIZE);
            self.ball_velocity.y = -self.ball_velocity.y;
        }

        if self.ball_velocity.x < 0.0 && overlaps(self.ball, self.left_paddle) {
            self.ball.x = self.left_paddle.x + PADDLE_SIZE.0;
            self.ball_velocity.x = -self.ball_velocity.x;
        } else if self.ball_velocity.x > 0.0 && overlaps(self.ball, self.right_paddle) {
            self.ball.x = self.right_paddle.x - BALL_SIZE;
            self.ball_velocity.x = -self.ball_velocity.x;
        }

        let scored = if self.ball.x + BALL_SIZE < 0.0 {
            Some(Side::Right)
        } else if self.ball.x > self.screen.x {
            Some(Side::Left)
        } else {
            None
        };

        if let Some(side) = scored {
            self.scores[side as usize] += 1;
            self.ball = Self::serve_position(self.screen.x, self.screen.y);
            // Serve towards the player who lost the point
            self.ball_velocity.x = match side {
                Side::Left => BALL_SPEED.0,
                Side::Right => -BALL_SPEED.0,
            };
            log::info!("Score {} : {}", self.scores[0], self.scores[1]);
        }

        scored
    }

    /// Score of `side`
    pub fn score(&self, side: Side) -> i32 {
        self.scores[side as usize]
    }

    /// Material table, indexed by the entities' material indices
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Sprites to draw this frame
    pub fn entities(&self) -> [Entity; 3] {
        [
            Entity::new(PADDLE_MATERIAL, self.left_paddle),
            Entity::new(PADDLE_MATERIAL, self.right_paddle),
            Entity::new(BALL_MATERIAL, self.ball),
        ]
    }

    /// Title and score labels laid out with `style`
    pub fn labels(&self, style: &TextStyle) -> Vec<Label> {
        let title = "PONG";
        let centre = self.screen.x / 2.0;
        let top = style.line_height / 2.0;

        vec![
            Label::text(title, Vec2::new(centre - text_width(title, style) / 2.0, top)),
            Label::number(self.scores[0], Vec2::new(centre / 2.0, top)),
            Label::number(self.scores[1], Vec2::new(centre * 1.5, top)),
        ]
    }
}

fn overlaps(ball: Vec2, paddle: Vec2) -> bool {
    ball.x < paddle.x + PADDLE_SIZE.0
        && ball.x + BALL_SIZE > paddle.x
        && ball.y < paddle.y + PADDLE_SIZE.1
        && ball.y + BALL_SIZE > paddle.y
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_paddle_stops_at_top() {
        let mut game = Pong::new(1280.0, 720.0);
        let input = Input {
            left_up: true,
            ..Input::default()
        };

        for _ in 0..100 {
            game.update(&input, 0.05);
        }

        assert_relative_eq!(game.entities()[0].position.y, 0.0);
    }

    #[test]
    fn test_ball_bounces_off_bottom_wall() {
        let mut game = Pong::new(1280.0, 720.0);
        game.ball = Vec2::new(600.0, 720.0 - BALL_SIZE - 1.0);
        game.ball_velocity = Vec2::new(0.0, 100.0);

        game.update(&Input::default(), 0.1);

        assert!(game.ball_velocity.y < 0.0);
        assert!(game.ball.y + BALL_SIZE <= 720.0);
    }

    #[test]
    fn test_paddle_returns_ball() {
        let mut game = Pong::new(1280.0, 720.0);
        game.ball = Vec2::new(game.left_paddle.x + PADDLE_SIZE.0 + 1.0, game.left_paddle.y);
        game.ball_velocity = Vec2::new(-100.0, 0.0);

        game.update(&Input::default(), 0.1);

        assert!(game.ball_velocity.x > 0.0);
    }

    #[test]
    fn test_missed_ball_scores_for_the_other_side() {
        let mut game = Pong::new(1280.0, 720.0);
        game.ball = Vec2::new(-BALL_SIZE + 1.0, 0.0);
        game.ball_velocity = Vec2::new(-100.0, 0.0);

        assert_eq!(game.update(&Input::default(), 0.1), Some(Side::Right));
        assert_eq!(game.score(Side::Right), 1);
        assert_eq!(game.score(Side::Left), 0);
        assert_relative_eq!(game.ball.x, (1280.0 - BALL_SIZE) / 2.0);
    }

    #[test]
    fn test_title_is_centred() {
        let game = Pong::new(1280.0, 720.0);
        let labels = game.labels(&TextStyle::default());

        assert_relative_eq!(labels[0].position.x, 640.0 - 30.0);
        assert_eq!(labels[1].number, Some(0));
    }

    #[test]
    fn test_default_text_style_draws_with_font_material() {
        let game = Pong::new(1280.0, 720.0);
        let style = TextStyle::default();

        assert_eq!(game.materials()[style.material_index as usize].asset, style.font);
    }
}
