//! Raw input from the view layer

use super::Vec2;

/// Movement keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    /// Map a browser-style key name (`"w"`, `"ArrowUp"`, ...) to a movement key
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "w" | "W" | "ArrowUp" => Some(Key::Up),
            "s" | "S" | "ArrowDown" => Some(Key::Down),
            "a" | "A" | "ArrowLeft" => Some(Key::Left),
            "d" | "D" | "ArrowRight" => Some(Key::Right),
            _ => None,
        }
    }
}

/// Which movement keys are currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl InputState {
    pub fn set(&mut self, key: Key, pressed: bool) {
        match key {
            Key::Up => self.up = pressed,
            Key::Down => self.down = pressed,
            Key::Left => self.left = pressed,
            Key::Right => self.right = pressed,
        }
    }

    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

/// Everything the input layer can push into a session
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    /// Fire towards a scene-space point
    Aim(Vec2),
    /// Submit the join form
    Join {
        name: String,
        character: Option<String>,
    },
    /// Close the session
    Shutdown,
}

/// Convert a click on a viewport centred on the local player into scene coordinates
pub fn viewport_to_scene(self_position: Vec2, viewport_size: Vec2, click: Vec2) -> Vec2 {
    Vec2::new(
        self_position.x - viewport_size.x / 2.0 + click.x,
        self_position.y - viewport_size.y / 2.0 + click.y,
    )
}

/// One line typed into the console driver
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Input(InputEvent),
    /// Click in viewport coordinates; resolved against the self position
    Click(Vec2),
}

impl Command {
    /// Parse `press w`, `release ArrowUp`, `aim 300 100`, `click 400 300` or `quit`
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = match words.next()? {
            "press" => Command::Input(InputEvent::KeyDown(Key::from_name(words.next()?)?)),
            "release" => Command::Input(InputEvent::KeyUp(Key::from_name(words.next()?)?)),
            "aim" => Command::Input(InputEvent::Aim(parse_point(&mut words)?)),
            "click" => Command::Click(parse_point(&mut words)?),
            "quit" | "exit" => Command::Input(InputEvent::Shutdown),
            _ => return None,
        };
        match words.next() {
            Some(_) => None,
            None => Some(command),
        }
    }
}

fn parse_point<'a>(words: &mut impl Iterator<Item = &'a str>) -> Option<Vec2> {
    let x = words.next()?.parse().ok()?;
    let y = words.next()?.parse().ok()?;
    Some(Vec2::new(x, y))
}
