//! Per-port button bitmap.
//!
//! One bit per key code, byte packed. Bytes are `AtomicU8` so the polling task
//! can flip bits while the emulation loop reads them without a lock.
//! Out-of-range ports or codes are logic errors upstream and panic.

use std::sync::atomic::{AtomicU8, Ordering};

use super::{LAST_KEYCODE, MAX_PORTS};

const KEY_BYTES: usize = LAST_KEYCODE.div_ceil(8);

#[derive(Debug)]
pub struct ButtonBitset {
    ports: [[AtomicU8; KEY_BYTES]; MAX_PORTS],
}

impl Default for ButtonBitset {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonBitset {
    pub fn new() -> Self {
        Self {
            ports: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU8::new(0))),
        }
    }

    pub fn set(&self, port: usize, code: usize) {
        let (byte, mask) = Self::locate(port, code);
        self.ports[port][byte].fetch_or(mask, Ordering::Relaxed);
    }

    pub fn clear(&self, port: usize, code: usize) {
        let (byte, mask) = Self::locate(port, code);
        self.ports[port][byte].fetch_and(!mask, Ordering::Relaxed);
    }

    pub fn get(&self, port: usize, code: usize) -> bool {
        let (byte, mask) = Self::locate(port, code);
        self.ports[port][byte].load(Ordering::Relaxed) & mask != 0
    }

    /// Drops every held key of a port (disconnect or port reuse).
    pub fn clear_port(&self, port: usize) {
        assert!(port < MAX_PORTS, "button port {port} out of range (max {MAX_PORTS})");
        for byte in &self.ports[port] {
            byte.store(0, Ordering::Relaxed);
        }
    }

    /// Whether any key of the port is held.
    pub fn any(&self, port: usize) -> bool {
        assert!(port < MAX_PORTS, "button port {port} out of range (max {MAX_PORTS})");
        self.ports[port]
            .iter()
            .any(|byte| byte.load(Ordering::Relaxed) != 0)
    }

    fn locate(port: usize, code: usize) -> (usize, u8) {
        assert!(port < MAX_PORTS, "button port {port} out of range (max {MAX_PORTS})");
        assert!(code < LAST_KEYCODE, "key code {code} out of range (max {LAST_KEYCODE})");
        (code / 8, 1 << (code % 8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_bitset_is_empty() {
        let bits = ButtonBitset::new();
        for port in 0..MAX_PORTS {
            assert!(!bits.any(port));
        }
    }

    #[test]
    fn test_set_then_clear() {
        let bits = ButtonBitset::new();
        bits.set(2, 96);
        assert!(bits.get(2, 96));
        bits.clear(2, 96);
        assert!(!bits.get(2, 96));
    }

    #[test]
    fn test_last_valid_code() {
        let bits = ButtonBitset::new();
        bits.set(MAX_PORTS - 1, LAST_KEYCODE - 1);
        assert!(bits.get(MAX_PORTS - 1, LAST_KEYCODE - 1));
    }

    #[test]
    fn test_clear_port_only_touches_that_port() {
        let bits = ButtonBitset::new();
        bits.set(0, 19);
        bits.set(1, 19);
        bits.clear_port(0);
        assert!(!bits.get(0, 19));
        assert!(bits.get(1, 19));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_port_out_of_range_panics() {
        ButtonBitset::new().set(MAX_PORTS, 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_code_out_of_range_panics() {
        ButtonBitset::new().get(0, LAST_KEYCODE);
    }

    proptest! {
        #[test]
        fn prop_set_get_clear(port in 0..MAX_PORTS, code in 0..LAST_KEYCODE) {
            let bits = ButtonBitset::new();
            bits.set(port, code);
            prop_assert!(bits.get(port, code));
            bits.clear(port, code);
            prop_assert!(!bits.get(port, code));
        }

        #[test]
        fn prop_distinct_pairs_independent(
            a in (0..MAX_PORTS, 0..LAST_KEYCODE),
            b in (0..MAX_PORTS, 0..LAST_KEYCODE),
        ) {
            prop_assume!(a != b);
            let bits = ButtonBitset::new();
            bits.set(a.0, a.1);
            bits.set(b.0, b.1);
            bits.clear(a.0, a.1);
            prop_assert!(!bits.get(a.0, a.1));
            prop_assert!(bits.get(b.0, b.1));
        }
    }
}
