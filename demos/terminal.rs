//! Terminal consumer for the stardrift worker.
//!
//! Spawns the simulation thread, pulls frames, keeps a local mirror of the
//! particle buffer (full transfers replace it, partial updates merge by
//! index), and paints stars as braille dots with crossterm.
//!
//! Controls: Q/Esc quit, Space boost, R reset.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use stardrift::prelude::*;

fn main() -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide, Clear(ClearType::All))?;
    terminal::enable_raw_mode()?;

    let result = run();

    execute!(stdout, Clear(ClearType::All), cursor::Show, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    result
}

fn run() -> Result<()> {
    let (cols, rows) = terminal::size()?;
    // Braille cells give a 2x4 subpixel grid per character.
    let (width, height) = (cols as f32 * 2.0, rows as f32 * 4.0);

    let handle = SimulationWorker::spawn();
    handle.init(
        SimulationConfig::new()
            .with_star_count(400)
            .with_viewport(width, height),
    )?;

    let mut mirror: Option<ParticleBuffer> = None;
    let mut config = SimulationConfig::default();
    if let EngineMessage::Ready {
        buffer,
        config: active,
    } = handle.recv()?
    {
        config = active;
        mirror = Some(buffer);
    }

    let mut clock = FrameClock::new();
    let mut boost = false;

    loop {
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(' ') => {
                        boost = !boost;
                        handle.set_boost(boost)?;
                    }
                    KeyCode::Char('r') => handle.reset()?,
                    _ => {}
                }
            }
        }

        handle.request_frame(clock.tick(), None)?;
        let message = handle.recv()?;
        let mut full_repaint = false;
        for message in flatten(message) {
            full_repaint |= consume(message, &mut mirror, &mut config)?;
        }

        if let Some(buffer) = &mirror {
            paint(buffer, &config, cols, rows, full_repaint)?;
        }
        std::thread::sleep(Duration::from_millis(16));
    }
}

fn flatten(message: EngineMessage) -> Vec<EngineMessage> {
    match message {
        EngineMessage::Batch(messages) => messages,
        message => vec![message],
    }
}

/// Fold one engine message into the local mirror. Returns whether the whole
/// surface must be repainted.
fn consume(
    message: EngineMessage,
    mirror: &mut Option<ParticleBuffer>,
    config: &mut SimulationConfig,
) -> Result<bool> {
    match message {
        EngineMessage::Ready {
            buffer,
            config: active,
        } => {
            *config = active;
            *mirror = Some(buffer);
            Ok(true)
        }
        EngineMessage::FrameUpdate {
            buffer, full_clear, ..
        } => {
            *mirror = Some(buffer);
            Ok(full_clear)
        }
        EngineMessage::PartialFrameUpdate {
            update, full_clear, ..
        } => {
            if let Some(buffer) = mirror {
                update.apply(buffer)?;
            }
            Ok(full_clear)
        }
        EngineMessage::ConfigApplied {
            config: active,
            buffer,
        } => {
            *config = active;
            if let Some(buffer) = buffer {
                *mirror = Some(buffer);
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn paint(
    buffer: &ParticleBuffer,
    config: &SimulationConfig,
    cols: u16,
    rows: u16,
    full_repaint: bool,
) -> Result<()> {
    let mut out = io::stdout();
    if full_repaint {
        queue!(out, Clear(ClearType::All))?;
    }

    let (sub_w, sub_h) = (cols as usize * 2, rows as usize * 4);
    let mut masks = vec![0u8; cols as usize * rows as usize];

    for p in buffer.particles().iter().filter(|p| p.is_live()) {
        // Same perspective mapping the engine uses for its regions.
        let scale = config.max_depth / p.z.max(0.1);
        let sx = p.x * scale + sub_w as f32 / 2.0;
        let sy = p.y * scale + sub_h as f32 / 2.0;
        if sx < 0.0 || sy < 0.0 || sx >= sub_w as f32 || sy >= sub_h as f32 {
            continue;
        }
        let (sx, sy) = (sx as usize, sy as usize);
        let cell = (sy / 4) * cols as usize + sx / 2;
        masks[cell] |= dot_bit(sx % 2, sy % 4);
    }

    for row in 0..rows as usize {
        let line: String = masks[row * cols as usize..(row + 1) * cols as usize]
            .iter()
            .map(|&m| {
                if m == 0 {
                    ' '
                } else {
                    char::from_u32(0x2800 + m as u32).unwrap_or(' ')
                }
            })
            .collect();
        queue!(out, cursor::MoveTo(0, row as u16), Print(line))?;
    }
    out.flush()?;
    Ok(())
}

fn dot_bit(dx: usize, dy: usize) -> u8 {
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        _ => 0x80,
    }
}
