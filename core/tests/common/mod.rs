#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use gbhost_core::cartridge::header_checksum;
use gbhost_core::core::{
    BootError, BootMode, FRAME_BYTES, FrameSink, RestoreError, SimulationCore, SnapshotError,
};

/// Calls the host made into a [`ScriptedCore`], in order. Steps are counted
/// separately rather than recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    LoadImage(usize),
    Boot(BootMode),
    Paused(bool),
    Direction(u8),
    Buttons(u8),
    Snapshot,
    Restore(Vec<u8>),
    FrameLimiter(bool),
}

#[derive(Default)]
pub struct Script {
    pub calls: Vec<Call>,
    pub steps: u64,
    pub fail_boot: bool,
    pub fail_snapshot: bool,
    pub fail_restore: bool,
    pub panic_on_step: bool,
}

/// Test core that emits uniform frames (every byte equals the step count
/// modulo 256) and records what the host asked of it.
pub struct ScriptedCore {
    script: Arc<Mutex<Script>>,
    sleep: f64,
}

impl ScriptedCore {
    pub fn new() -> (Self, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script::default()));
        let core = Self {
            script: Arc::clone(&script),
            sleep: 0.002,
        };
        (core, script)
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.script().calls.push(call);
    }
}

impl SimulationCore for ScriptedCore {
    fn load_image(&mut self, image: &[u8]) -> Result<BootMode, BootError> {
        self.record(Call::LoadImage(image.len()));
        Ok(BootMode::Cgb)
    }

    fn boot(&mut self, mode: BootMode) -> Result<(), BootError> {
        self.record(Call::Boot(mode));
        if self.script().fail_boot {
            return Err(BootError::UnsupportedMode(mode));
        }
        Ok(())
    }

    fn step(&mut self, sink: &mut dyn FrameSink) -> f64 {
        let steps = {
            let mut script = self.script();
            if script.panic_on_step {
                drop(script);
                panic!("scripted core failure");
            }
            script.steps += 1;
            script.steps
        };
        sink.frame_ready(&vec![steps as u8; FRAME_BYTES]);
        self.sleep
    }

    fn set_paused(&mut self, paused: bool) {
        self.record(Call::Paused(paused));
    }

    fn set_direction_mask(&mut self, mask: u8) {
        self.record(Call::Direction(mask));
    }

    fn set_button_mask(&mut self, mask: u8) {
        self.record(Call::Buttons(mask));
    }

    fn snapshot(&mut self) -> Result<Vec<u8>, SnapshotError> {
        self.record(Call::Snapshot);
        let script = self.script();
        if script.fail_snapshot {
            return Err(SnapshotError::new("scripted snapshot failure"));
        }
        Ok(script.steps.to_le_bytes().to_vec())
    }

    fn restore(&mut self, data: &[u8]) -> Result<(), RestoreError> {
        self.record(Call::Restore(data.to_vec()));
        if self.script().fail_restore {
            return Err(RestoreError::Incompatible("scripted restore failure".into()));
        }
        Ok(())
    }

    fn set_frame_limiter(&mut self, enabled: bool) {
        self.record(Call::FrameLimiter(enabled));
    }
}

/// Calls recorded since the last `take_calls`.
pub fn take_calls(script: &Arc<Mutex<Script>>) -> Vec<Call> {
    std::mem::take(&mut script.lock().unwrap().calls)
}

pub fn steps(script: &Arc<Mutex<Script>>) -> u64 {
    script.lock().unwrap().steps
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// A 32 KiB program image with a valid header.
pub fn program_image(title: &str, cgb_flag: u8, sgb_flag: u8) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    let title = title.as_bytes();
    let len = title.len().min(15);
    rom[0x134..0x134 + len].copy_from_slice(&title[..len]);
    rom[0x143] = cgb_flag;
    rom[0x146] = sgb_flag;
    rom[0x14D] = header_checksum(&rom);
    rom
}
