//! Controller button masks and stick presets.
//!
//! Wiimote bits follow the core button report layout; GameCube bits follow
//! the pad status word Dolphin uses internally.

use bitflags::bitflags;

bitflags! {
    /// Wiimote core buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WiimoteButtons: u16 {
        const LEFT  = 0x0001;
        const RIGHT = 0x0002;
        const DOWN  = 0x0004;
        const UP    = 0x0008;
        const PLUS  = 0x0010;
        const TWO   = 0x0100;
        const ONE   = 0x0200;
        const B     = 0x0400;
        const A     = 0x0800;
        const MINUS = 0x1000;
        const HOME  = 0x8000;
    }
}

bitflags! {
    /// GameCube pad buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GcPadButtons: u16 {
        const LEFT  = 0x0001;
        const RIGHT = 0x0002;
        const DOWN  = 0x0004;
        const UP    = 0x0008;
        const Z     = 0x0010;
        const R     = 0x0020;
        const L     = 0x0040;
        const A     = 0x0100;
        const B     = 0x0200;
        const X     = 0x0400;
        const Y     = 0x0800;
        const START = 0x1000;
    }
}

/// Main stick and C-stick positions, each axis between -1.0 and 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickState {
    pub stick_x: f32,
    pub stick_y: f32,
    pub substick_x: f32,
    pub substick_y: f32,
}

impl StickState {
    pub const NEUTRAL: Self = Self::main(0.0, 0.0);
    pub const UP: Self = Self::main(0.0, 1.0);
    pub const DOWN: Self = Self::main(0.0, -1.0);
    pub const LEFT: Self = Self::main(-1.0, 0.0);
    pub const RIGHT: Self = Self::main(1.0, 0.0);

    /// Main stick at `(x, y)`, C-stick centered.
    pub const fn main(stick_x: f32, stick_y: f32) -> Self {
        Self {
            stick_x,
            stick_y,
            substick_x: 0.0,
            substick_y: 0.0,
        }
    }
}
