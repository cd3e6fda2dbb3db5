// File: src/fuzzy/keyboard.rs
use std::collections::HashMap;

/// Physical key neighbourhoods, used to make substitutions between adjacent
/// keys cheaper than arbitrary ones.
#[derive(Debug, Clone)]
pub struct KeyboardLayout {
    neighbours: HashMap<char, &'static str>,
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        Self::qwerty()
    }
}

impl KeyboardLayout {
    pub fn qwerty() -> Self {
        let neighbours = [
            ('q', "was"),
            ('w', "qeasd"),
            ('e', "wrsdf"),
            ('r', "etdfg"),
            ('t', "ryfgh"),
            ('y', "tughj"),
            ('u', "yihjk"),
            ('i', "uojkl"),
            ('o', "ipkl"),
            ('p', "ol"),
            ('a', "qwsz"),
            ('s', "adwezx"),
            ('d', "sferxc"),
            ('f', "dgrtcv"),
            ('g', "fhtyvb"),
            ('h', "gjyubn"),
            ('j', "hkuinm"),
            ('k', "jliom"),
            ('l', "kopm"),
            ('z', "asx"),
            ('x', "zcsd"),
            ('c', "xvdf"),
            ('v', "cbfg"),
            ('b', "vngh"),
            ('n', "bmhj"),
            ('m', "njkl"),
        ];
        Self { neighbours: neighbours.into_iter().collect() }
    }

    /// Whether `a` and `b` sit next to each other. Case-insensitive; a key is
    /// not adjacent to itself.
    pub fn is_adjacent(&self, a: char, b: char) -> bool {
        let a = a.to_ascii_lowercase();
        let b = b.to_ascii_lowercase();
        if a == b {
            return false;
        }
        let touches = |from: char, to: char| self.neighbours.get(&from).is_some_and(|keys| keys.contains(to));
        touches(a, b) || touches(b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_are_symmetric() {
        let layout = KeyboardLayout::qwerty();
        assert!(layout.is_adjacent('t', 'h'));
        assert!(layout.is_adjacent('h', 't'));
        assert!(layout.is_adjacent('Q', 'w'));
        assert!(!layout.is_adjacent('q', 'p'));
        assert!(!layout.is_adjacent('e', 'e'));
    }

    #[test]
    fn unknown_keys_are_never_adjacent() {
        let layout = KeyboardLayout::qwerty();
        assert!(!layout.is_adjacent('ä', 'a'));
        assert!(!layout.is_adjacent('1', '2'));
    }
}
