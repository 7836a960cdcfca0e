use std::sync::atomic::{AtomicU8, Ordering};

/// D-pad direction bits.
pub mod direction {
    pub const RIGHT: u8 = 0x01;
    pub const LEFT: u8 = 0x02;
    pub const UP: u8 = 0x04;
    pub const DOWN: u8 = 0x08;
}

/// Face/system button bits.
pub mod button {
    pub const A: u8 = 0x01;
    pub const B: u8 = 0x02;
    pub const SELECT: u8 = 0x04;
    pub const START: u8 = 0x08;
}

/// A point-in-time copy of both pad masks, handed to the pump by value.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadState {
    pub direction: u8,
    pub buttons: u8,
}

/// Shared pad state: written by the owner thread, read by the pump thread.
///
/// Each mask is a single atomic byte. Reads are eventually consistent: the
/// pump observes a change at the latest on its next iteration. There is no
/// ordering between the two masks.
#[derive(Debug, Default)]
pub struct InputState {
    direction: AtomicU8,
    buttons: AtomicU8,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both masks wholesale.
    pub fn set_masks(&self, direction: u8, buttons: u8) {
        self.direction.store(direction, Ordering::Relaxed);
        self.buttons.store(buttons, Ordering::Relaxed);
    }

    /// Set or clear one or more direction bits.
    pub fn set_direction(&self, bits: u8, down: bool) {
        Self::update(&self.direction, bits, down);
    }

    /// Set or clear one or more button bits.
    pub fn set_button(&self, bits: u8, down: bool) {
        Self::update(&self.buttons, bits, down);
    }

    pub fn snapshot(&self) -> PadState {
        PadState {
            direction: self.direction.load(Ordering::Relaxed),
            buttons: self.buttons.load(Ordering::Relaxed),
        }
    }

    fn update(mask: &AtomicU8, bits: u8, down: bool) {
        if down {
            mask.fetch_or(bits, Ordering::Relaxed);
        } else {
            mask.fetch_and(!bits, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_released() {
        assert_eq!(InputState::new().snapshot(), PadState::default());
    }

    #[test]
    fn press_and_release_are_independent_bits() {
        let input = InputState::new();
        input.set_direction(direction::LEFT, true);
        input.set_direction(direction::UP, true);
        input.set_direction(direction::LEFT, false);
        input.set_button(button::START, true);

        let pad = input.snapshot();
        assert_eq!(pad.direction, direction::UP);
        assert_eq!(pad.buttons, button::START);
    }

    #[test]
    fn set_masks_replaces_both() {
        let input = InputState::new();
        input.set_button(button::A, true);
        input.set_masks(direction::DOWN | direction::RIGHT, 0);
        assert_eq!(
            input.snapshot(),
            PadState {
                direction: direction::DOWN | direction::RIGHT,
                buttons: 0,
            }
        );
    }
}
