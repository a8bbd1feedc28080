//! Host key code → Windows virtual-key translation.
//!
//! Host keyboards report Android `KEYCODE_*` values; the remote desktop
//! expects `VK_*` codes. The translation is a compile-time table indexed by
//! host code. Codes without an entry are forwarded unchanged, which is
//! enough for hardware keyboards that already report VK values.

use crate::input::command::{RemoteInput, RemoteKey};

/// Size of the lookup table. Host codes at or above this pass through.
const TABLE_LEN: usize = 256;

/// Host code → VK table. Zero means "no mapping".
const HOST_TO_VK: [u16; TABLE_LEN] = {
    let mut t = [0u16; TABLE_LEN];

    // ── Letters (KEYCODE_A=29 … KEYCODE_Z=54 → VK_A=0x41 …) ──────
    let mut i = 0;
    while i < 26 {
        t[29 + i] = 0x41 + i as u16;
        i += 1;
    }

    // ── Digits (KEYCODE_0=7 … KEYCODE_9=16 → 0x30 …) ─────────────
    let mut i = 0;
    while i < 10 {
        t[7 + i] = 0x30 + i as u16;
        i += 1;
    }

    // ── Numpad digits (KEYCODE_NUMPAD_0=144 … → VK_NUMPAD0=0x60 …)
    let mut i = 0;
    while i < 10 {
        t[144 + i] = 0x60 + i as u16;
        i += 1;
    }

    // ── Function keys (KEYCODE_F1=131 … F12=142 → VK_F1=0x70 …) ──
    let mut i = 0;
    while i < 12 {
        t[131 + i] = 0x70 + i as u16;
        i += 1;
    }

    // ── Editing ──────────────────────────────────────────────────
    t[66] = 0x0D; // ENTER → VK_RETURN
    t[160] = 0x0D; // NUMPAD_ENTER
    t[67] = 0x08; // DEL → VK_BACK
    t[112] = 0x2E; // FORWARD_DEL → VK_DELETE
    t[61] = 0x09; // TAB
    t[62] = 0x20; // SPACE
    t[124] = 0x2D; // INSERT
    t[4] = 0x1B; // BACK → VK_ESCAPE
    t[111] = 0x1B; // ESCAPE

    // ── Navigation ───────────────────────────────────────────────
    t[122] = 0x24; // MOVE_HOME
    t[123] = 0x23; // MOVE_END
    t[92] = 0x21; // PAGE_UP → VK_PRIOR
    t[93] = 0x22; // PAGE_DOWN → VK_NEXT
    t[21] = 0x25; // DPAD_LEFT
    t[19] = 0x26; // DPAD_UP
    t[22] = 0x27; // DPAD_RIGHT
    t[20] = 0x28; // DPAD_DOWN

    // ── Punctuation (US layout OEM keys) ─────────────────────────
    t[69] = 0xBD; // MINUS
    t[70] = 0xBB; // EQUALS
    t[71] = 0xDB; // LEFT_BRACKET
    t[72] = 0xDD; // RIGHT_BRACKET
    t[73] = 0xDC; // BACKSLASH
    t[74] = 0xBA; // SEMICOLON
    t[75] = 0xDE; // APOSTROPHE
    t[55] = 0xBC; // COMMA
    t[56] = 0xBE; // PERIOD
    t[76] = 0xBF; // SLASH
    t[68] = 0xC0; // GRAVE

    // ── Numpad operators ─────────────────────────────────────────
    t[154] = 0x6F; // NUMPAD_DIVIDE
    t[155] = 0x6A; // NUMPAD_MULTIPLY
    t[156] = 0x6D; // NUMPAD_SUBTRACT
    t[157] = 0x6B; // NUMPAD_ADD
    t[158] = 0x6E; // NUMPAD_DOT

    // ── Modifiers & locks ────────────────────────────────────────
    t[113] = 0xA2; // CTRL_LEFT
    t[114] = 0xA3; // CTRL_RIGHT
    t[59] = 0xA0; // SHIFT_LEFT
    t[60] = 0xA1; // SHIFT_RIGHT
    t[57] = 0xA4; // ALT_LEFT
    t[58] = 0xA5; // ALT_RIGHT
    t[117] = 0x5B; // META_LEFT → VK_LWIN
    t[118] = 0x5C; // META_RIGHT → VK_RWIN
    t[82] = 0x5D; // MENU → VK_APPS
    t[115] = 0x14; // CAPS_LOCK
    t[116] = 0x91; // SCROLL_LOCK
    t[121] = 0x13; // BREAK → VK_PAUSE
    t[120] = 0x2C; // SYSRQ → VK_SNAPSHOT

    t
};

/// Translate a host key code to a Windows virtual-key code.
///
/// Unmapped codes are returned unchanged.
pub fn host_to_vk(code: u16) -> u16 {
    match HOST_TO_VK.get(code as usize) {
        Some(&vk) if vk != 0 => vk,
        _ => code,
    }
}

/// Whether `code` has an explicit table entry.
pub fn is_mapped(code: u16) -> bool {
    HOST_TO_VK.get(code as usize).is_some_and(|&vk| vk != 0)
}

// ── Key events ───────────────────────────────────────────────────

/// A keyboard event as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    Down(u16),
    Up(u16),
    /// Text committed by an input method.
    Text(String),
}

/// Translate a host keyboard event into a remote command.
pub fn translate_key(input: KeyInput) -> RemoteInput {
    match input {
        KeyInput::Down(code) => RemoteInput::Key {
            key: RemoteKey::Virtual(host_to_vk(code)),
            down: true,
        },
        KeyInput::Up(code) => RemoteInput::Key {
            key: RemoteKey::Virtual(host_to_vk(code)),
            down: false,
        },
        KeyInput::Text(text) => RemoteInput::Text(text),
    }
}
