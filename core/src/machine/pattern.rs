use std::time::{Duration, Instant};

use crate::cartridge::CartridgeInfo;
use crate::core::error::{BootError, RestoreError, SnapshotError};
use crate::core::frame::{BYTES_PER_PIXEL, FRAME_WIDTH, Frame};
use crate::core::input::direction;
use crate::core::machine::{BootMode, FrameSink, SimulationCore};

/// LCD refresh rate: 4.194304 MHz / 70224 cycles per frame.
pub const FRAME_RATE: f64 = 4_194_304.0 / 70_224.0;

const STATE_MAGIC: &[u8; 4] = b"GBPC";
const STATE_VERSION: u8 = 1;

const DMG_PALETTE: [[u8; 3]; 4] = [
    [0x9B, 0xBC, 0x0F],
    [0x8B, 0xAC, 0x0F],
    [0x30, 0x62, 0x30],
    [0x0F, 0x38, 0x0F],
];
const SGB_PALETTE: [[u8; 3]; 4] = [
    [0xF8, 0xE8, 0xC8],
    [0xD8, 0x90, 0x48],
    [0xA8, 0x28, 0x20],
    [0x30, 0x18, 0x50],
];
const CGB_PALETTE: [[u8; 3]; 4] = [
    [0xFF, 0xFF, 0xFF],
    [0x7B, 0xFF, 0x31],
    [0x00, 0x63, 0xC5],
    [0x00, 0x00, 0x00],
];

/// Complete serializable state of a [`PatternCore`].
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternState {
    pub mode: BootMode,
    pub direction: u8,
    pub buttons: u8,
    pub scroll_x: u8,
    pub scroll_y: u8,
    pub frame_counter: u64,
}

impl PatternState {
    /// magic(4) + version + mode + direction + buttons + scroll x/y + counter(8)
    pub const ENCODED_LEN: usize = 18;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(STATE_MAGIC);
        out.push(STATE_VERSION);
        out.push(self.mode.as_u8());
        out.push(self.direction);
        out.push(self.buttons);
        out.push(self.scroll_x);
        out.push(self.scroll_y);
        out.extend_from_slice(&self.frame_counter.to_le_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, RestoreError> {
        if data.len() < Self::ENCODED_LEN {
            return Err(RestoreError::Truncated {
                expected: Self::ENCODED_LEN,
                actual: data.len(),
            });
        }
        if &data[..4] != STATE_MAGIC {
            return Err(RestoreError::Incompatible("bad magic".into()));
        }
        if data[4] != STATE_VERSION {
            return Err(RestoreError::Incompatible(format!(
                "state version {} (expected {STATE_VERSION})",
                data[4]
            )));
        }
        let mode = BootMode::from_u8(data[5])
            .ok_or_else(|| RestoreError::Incompatible(format!("unknown mode {}", data[5])))?;
        let mut counter = [0u8; 8];
        counter.copy_from_slice(&data[10..18]);
        Ok(Self {
            mode,
            direction: data[6],
            buttons: data[7],
            scroll_x: data[8],
            scroll_y: data[9],
            frame_counter: u64::from_le_bytes(counter),
        })
    }
}

/// A self-contained simulation core that draws a scrolling test pattern.
///
/// The d-pad scrolls the pattern one pixel per frame, any held button
/// inverts the palette, and the palette follows the boot mode. It paces
/// itself to [`FRAME_RATE`] against the wall clock and supports
/// snapshot/restore, which makes it a stand-in for a full emulator core in
/// tests and for exercising the host without one.
pub struct PatternCore {
    state: PatternState,
    booted: bool,
    paused: bool,
    frame_limiter: bool,
    next_deadline: Option<Instant>,
    framebuffer: Frame,
    title: Option<String>,
}

impl Default for PatternCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternCore {
    pub fn new() -> Self {
        Self {
            state: PatternState::default(),
            booted: false,
            paused: false,
            frame_limiter: true,
            next_deadline: None,
            framebuffer: Frame::new(),
            title: None,
        }
    }

    pub fn state(&self) -> &PatternState {
        &self.state
    }

    /// Title of the last loaded image.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frame_period() -> Duration {
        Duration::from_secs_f64(1.0 / FRAME_RATE)
    }

    /// Render the current state into the internal framebuffer.
    pub fn render(&mut self) -> &Frame {
        let palette = match self.state.mode {
            BootMode::Dmg => &DMG_PALETTE,
            BootMode::Sgb => &SGB_PALETTE,
            BootMode::Cgb => &CGB_PALETTE,
        };
        let invert = self.state.buttons != 0;
        let (sx, sy) = (self.state.scroll_x as usize, self.state.scroll_y as usize);

        for (i, px) in self
            .framebuffer
            .pixels_mut()
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .enumerate()
        {
            let tx = (i % FRAME_WIDTH + sx) / 8;
            let ty = (i / FRAME_WIDTH + sy) / 8;
            let mut shade = ((tx ^ ty) & 1) | (((tx + ty) >> 1 & 1) << 1);
            if invert {
                shade = 3 - shade;
            }
            px.copy_from_slice(&palette[shade]);
        }
        &self.framebuffer
    }

    fn advance(&mut self) {
        let dir = self.state.direction;
        if dir & direction::RIGHT != 0 {
            self.state.scroll_x = self.state.scroll_x.wrapping_add(1);
        }
        if dir & direction::LEFT != 0 {
            self.state.scroll_x = self.state.scroll_x.wrapping_sub(1);
        }
        if dir & direction::DOWN != 0 {
            self.state.scroll_y = self.state.scroll_y.wrapping_add(1);
        }
        if dir & direction::UP != 0 {
            self.state.scroll_y = self.state.scroll_y.wrapping_sub(1);
        }
        self.state.frame_counter += 1;
    }

    /// Seconds until the next frame is due.
    fn pace(&mut self) -> f64 {
        if !self.frame_limiter {
            self.next_deadline = None;
            return 0.0;
        }
        let now = Instant::now();
        let period = Self::frame_period();
        let mut next = self.next_deadline.map_or(now + period, |d| d + period);
        if next + period < now {
            // More than a frame behind: resync instead of bursting.
            next = now + period;
        }
        self.next_deadline = Some(next);
        next.saturating_duration_since(now).as_secs_f64()
    }
}

impl SimulationCore for PatternCore {
    fn load_image(&mut self, image: &[u8]) -> Result<BootMode, BootError> {
        let info = CartridgeInfo::parse(image)
            .map_err(|e| BootError::MalformedImage(e.to_string()))?;
        info.validate()
            .map_err(|e| BootError::MalformedImage(e.to_string()))?;
        let mode = info.boot_mode();
        self.title = Some(info.title().to_string());
        Ok(mode)
    }

    fn boot(&mut self, mode: BootMode) -> Result<(), BootError> {
        self.state = PatternState {
            mode,
            ..PatternState::default()
        };
        self.booted = true;
        self.next_deadline = None;
        Ok(())
    }

    fn step(&mut self, sink: &mut dyn FrameSink) -> f64 {
        if !self.booted || self.paused {
            return Self::frame_period().as_secs_f64();
        }
        self.advance();
        self.render();
        sink.frame_ready(self.framebuffer.pixels());
        self.pace()
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.next_deadline = None;
    }

    fn set_direction_mask(&mut self, mask: u8) {
        self.state.direction = mask;
    }

    fn set_button_mask(&mut self, mask: u8) {
        self.state.buttons = mask;
    }

    fn snapshot(&mut self) -> Result<Vec<u8>, SnapshotError> {
        if !self.booted {
            return Err(SnapshotError::new("core has not been booted"));
        }
        Ok(self.state.to_bytes())
    }

    fn restore(&mut self, data: &[u8]) -> Result<(), RestoreError> {
        self.state = PatternState::from_bytes(data)?;
        self.booted = true;
        self.next_deadline = None;
        Ok(())
    }

    fn set_frame_limiter(&mut self, enabled: bool) {
        self.frame_limiter = enabled;
        self.next_deadline = None;
    }
}
