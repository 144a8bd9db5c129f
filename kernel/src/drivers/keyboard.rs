//! PS/2 keyboard driver.
//!
//! Scancodes are drained from port 0x60 on IRQ1 and decoded via the
//! `pc_keyboard` crate (scancode set 1, US 104-key layout). Modifier state
//! is tracked here, globally for the decoder rather than per terminal, so
//! the chord set can be recognized before ordinary key delivery:
//! Ctrl+L clears, Ctrl+C interrupts, Ctrl+P dumps PIDs, Alt+F1..F3 switch
//! the visible terminal.

use bitflags::bitflags;
use lazy_static::lazy_static;
use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, KeyState, Keyboard, ScancodeSet1};
use spin::Mutex;

/// Keyboard controller data port.
pub const KEYBOARD_PORT: u16 = 0x60;
/// IRQ line of the keyboard.
pub const KEYBOARD_IRQ: u8 = 1;

bitflags! {
    /// Modifier state, global to the decoder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const LSHIFT = 1 << 0;
        const RSHIFT = 1 << 1;
        const CTRL = 1 << 2;
        const ALT = 1 << 3;
    }
}

impl Modifiers {
    pub fn shift(&self) -> bool {
        self.intersects(Modifiers::LSHIFT | Modifiers::RSHIFT)
    }

    pub fn ctrl(&self) -> bool {
        self.contains(Modifiers::CTRL)
    }

    pub fn alt(&self) -> bool {
        self.contains(Modifiers::ALT)
    }
}

/// What one scancode amounts to, after decoding and chord recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Nothing to do (break codes, unmapped keys, half-finished sequences).
    None,
    /// Deliver a byte to the visible terminal's line discipline.
    Input(u8),
    /// Ctrl+L: clear the visible screen and home the cursor.
    ClearScreen,
    /// Ctrl+C: halt the current task.
    Interrupt,
    /// Ctrl+P: dump the current and parent PID (debug chord).
    ShowPids,
    /// Alt+F1..F3: make this terminal visible.
    SwitchTerminal(usize),
}

/// Scancode-stream decoder: wraps the `pc_keyboard` state machine and the
/// modifier bitmask.
pub struct Decoder {
    keyboard: Keyboard<layouts::Us104Key, ScancodeSet1>,
    modifiers: Modifiers,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            keyboard: Keyboard::new(
                ScancodeSet1::new(),
                layouts::Us104Key,
                HandleControl::Ignore,
            ),
            modifiers: Modifiers::empty(),
        }
    }

    /// Current modifier bitmask.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Feed one scancode; returns the action it completes.
    pub fn advance(&mut self, scancode: u8) -> KeyAction {
        let Ok(Some(event)) = self.keyboard.add_byte(scancode) else {
            return KeyAction::None;
        };

        let code = event.code;
        let down = event.state != KeyState::Up;
        match code {
            KeyCode::LShift => self.modifiers.set(Modifiers::LSHIFT, down),
            KeyCode::RShift => self.modifiers.set(Modifiers::RSHIFT, down),
            KeyCode::LControl | KeyCode::RControl => self.modifiers.set(Modifiers::CTRL, down),
            KeyCode::LAlt | KeyCode::RAltGr => self.modifiers.set(Modifiers::ALT, down),
            _ => {}
        }

        // Alt+function chords bypass unicode decoding entirely.
        if self.modifiers.alt() && down {
            match code {
                KeyCode::F1 => return KeyAction::SwitchTerminal(0),
                KeyCode::F2 => return KeyAction::SwitchTerminal(1),
                KeyCode::F3 => return KeyAction::SwitchTerminal(2),
                _ => {}
            }
        }

        let Some(key) = self.keyboard.process_keyevent(event) else {
            return KeyAction::None;
        };
        let DecodedKey::Unicode(ch) = key else {
            return KeyAction::None;
        };

        if self.modifiers.ctrl() {
            return match ch {
                'l' | 'L' => KeyAction::ClearScreen,
                'c' | 'C' => KeyAction::Interrupt,
                'p' | 'P' => KeyAction::ShowPids,
                // Unrecognized control chords are dropped silently.
                _ => KeyAction::None,
            };
        }

        match ch {
            '\n' | '\r' => KeyAction::Input(b'\n'),
            '\x08' => KeyAction::Input(0x08),
            '\t' => KeyAction::Input(b'\t'),
            ch if ch.is_ascii_graphic() || ch == ' ' => KeyAction::Input(ch as u8),
            _ => KeyAction::None,
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref DECODER: Mutex<Decoder> = Mutex::new(Decoder::new());
}

/// Force the decoder into existence before the first IRQ can race its
/// construction.
pub fn init() {
    lazy_static::initialize(&DECODER);
    log::info!("keyboard: scancode set 1, US layout");
}

/// IRQ1 body: drain one scancode, decode, acknowledge, then act. The EOI
/// goes out before any action that may leave this stack for good (halting
/// the current task or switching away).
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub fn handle_interrupt() {
    use super::terminal;
    use crate::arch::x86::pic;

    // SAFETY: reading the keyboard data port consumes the pending byte.
    let scancode = unsafe { x86::io::inb(KEYBOARD_PORT) };
    let action = DECODER.lock().advance(scancode);
    pic::send_eoi(KEYBOARD_IRQ);

    match action {
        KeyAction::None => {}
        KeyAction::Input(byte) => terminal::write_key(byte),
        KeyAction::ClearScreen => terminal::clear_visible(),
        KeyAction::Interrupt => {
            // Only the task that owns the visible terminal can be the one
            // the user is aiming at.
            if let Some(pcb) = unsafe { crate::process::current_pcb() } {
                if pcb.terminal as usize == terminal::visible_terminal() {
                    // SAFETY: a current PCB exists; halt releases it and
                    // resumes the parent. The interrupted user context is
                    // intentionally abandoned.
                    unsafe { crate::process::halt(0) };
                }
            }
        }
        KeyAction::ShowPids => {
            if let Some(pcb) = unsafe { crate::process::current_pcb() } {
                println!("PID: {} parent: {}", pcb.pid, pcb.parent_pid);
            } else {
                println!("PID: kernel");
            }
        }
        KeyAction::SwitchTerminal(index) => terminal::switch_to(index),
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub fn handle_interrupt() {}

#[cfg(test)]
mod tests {
    use super::*;

    // Set-1 make codes used below.
    const LSHIFT_DOWN: u8 = 0x2A;
    const LSHIFT_UP: u8 = 0xAA;
    const CTRL_DOWN: u8 = 0x1D;
    const CTRL_UP: u8 = 0x9D;
    const ALT_DOWN: u8 = 0x38;
    const ALT_UP: u8 = 0xB8;
    const CAPS: u8 = 0x3A;
    const KEY_A: u8 = 0x1E;
    const KEY_C: u8 = 0x2E;
    const KEY_L: u8 = 0x26;
    const KEY_1: u8 = 0x02;
    const KEY_F1: u8 = 0x3B;
    const KEY_F2: u8 = 0x3C;
    const KEY_ENTER: u8 = 0x1C;
    const KEY_BACKSPACE: u8 = 0x0E;

    fn feed(decoder: &mut Decoder, codes: &[u8]) -> std::vec::Vec<KeyAction> {
        codes
            .iter()
            .map(|&c| decoder.advance(c))
            .filter(|a| *a != KeyAction::None)
            .collect()
    }

    #[test]
    fn plain_letters_decode_lowercase() {
        let mut d = Decoder::new();
        assert_eq!(d.advance(KEY_A), KeyAction::Input(b'a'));
    }

    #[test]
    fn shift_upcases_letters_and_shifts_punctuation() {
        let mut d = Decoder::new();
        let actions = feed(&mut d, &[LSHIFT_DOWN, KEY_A, KEY_1, LSHIFT_UP, KEY_A]);
        assert_eq!(
            actions,
            std::vec![
                KeyAction::Input(b'A'),
                KeyAction::Input(b'!'),
                KeyAction::Input(b'a')
            ]
        );
    }

    #[test]
    fn caps_lock_toggles_letter_case_only() {
        let mut d = Decoder::new();
        let actions = feed(&mut d, &[CAPS, KEY_A, KEY_1, CAPS, KEY_A]);
        assert_eq!(
            actions,
            std::vec![
                KeyAction::Input(b'A'),
                KeyAction::Input(b'1'),
                KeyAction::Input(b'a')
            ]
        );
    }

    #[test]
    fn release_codes_update_modifiers_without_output() {
        let mut d = Decoder::new();
        assert_eq!(d.advance(LSHIFT_DOWN), KeyAction::None);
        assert!(d.modifiers().shift());
        assert_eq!(d.advance(LSHIFT_UP), KeyAction::None);
        assert!(!d.modifiers().shift());
    }

    #[test]
    fn ctrl_chords_are_recognized() {
        let mut d = Decoder::new();
        let actions = feed(&mut d, &[CTRL_DOWN, KEY_L, KEY_C, CTRL_UP, KEY_L]);
        assert_eq!(
            actions,
            std::vec![
                KeyAction::ClearScreen,
                KeyAction::Interrupt,
                KeyAction::Input(b'l')
            ]
        );
    }

    #[test]
    fn alt_function_keys_switch_terminals() {
        let mut d = Decoder::new();
        let actions = feed(&mut d, &[ALT_DOWN, KEY_F2, KEY_F1, ALT_UP, KEY_F1]);
        assert_eq!(
            actions,
            std::vec![KeyAction::SwitchTerminal(1), KeyAction::SwitchTerminal(0)]
        );
    }

    #[test]
    fn enter_and_backspace_become_line_bytes() {
        let mut d = Decoder::new();
        let enter = d.advance(KEY_ENTER);
        assert_eq!(enter, KeyAction::Input(b'\n'));
        assert_eq!(d.advance(KEY_BACKSPACE), KeyAction::Input(0x08));
    }
}
