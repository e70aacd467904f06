//! Hangul jamo decomposition
//!
//! Splits precomposed Hangul syllables (U+AC00..=U+D7A3) into their initial, medial and
//! optional final jamo, and expands compound vowels and consonant clusters into the
//! primitive jamo in the order an IME receives them. Every other character decomposes
//! to itself, so the functions here are total over `char`.

/// First precomposed syllable (가)
const SYLLABLE_BASE: u32 = 0xAC00;

/// Last precomposed syllable (힣)
const SYLLABLE_LAST: u32 = 0xD7A3;

/// Syllables per initial consonant (21 medials × 28 finals)
const SYLLABLES_PER_INITIAL: u32 = 588;

/// Syllables per medial vowel (28 finals, including "none")
const SYLLABLES_PER_MEDIAL: u32 = 28;

/// Compatibility jamo block handled as standalone jamo (ㄱ..=ㅣ)
const COMPAT_JAMO_FIRST: u32 = 0x3131;
const COMPAT_JAMO_LAST: u32 = 0x3163;

const CHOSEONG: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ',
    'ㅌ', 'ㅍ', 'ㅎ',
];

const JUNGSEONG: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ',
    'ㅟ', 'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

// Index 0 means "no final consonant".
const JONGSEONG: [Option<char>; 28] = [
    None,
    Some('ㄱ'),
    Some('ㄲ'),
    Some('ㄳ'),
    Some('ㄴ'),
    Some('ㄵ'),
    Some('ㄶ'),
    Some('ㄷ'),
    Some('ㄹ'),
    Some('ㄺ'),
    Some('ㄻ'),
    Some('ㄼ'),
    Some('ㄽ'),
    Some('ㄾ'),
    Some('ㄿ'),
    Some('ㅀ'),
    Some('ㅁ'),
    Some('ㅂ'),
    Some('ㅄ'),
    Some('ㅅ'),
    Some('ㅆ'),
    Some('ㅇ'),
    Some('ㅈ'),
    Some('ㅊ'),
    Some('ㅋ'),
    Some('ㅌ'),
    Some('ㅍ'),
    Some('ㅎ'),
];

/// Whether `c` is a precomposed Hangul syllable
pub fn is_syllable(c: char) -> bool {
    (SYLLABLE_BASE..=SYLLABLE_LAST).contains(&(c as u32))
}

/// Whether `c` is a standalone compatibility jamo
pub fn is_compat_jamo(c: char) -> bool {
    (COMPAT_JAMO_FIRST..=COMPAT_JAMO_LAST).contains(&(c as u32))
}

/// Table indices `(initial, medial, final)` of a precomposed syllable
///
/// `final` is 0 when the syllable has no final consonant.
pub fn syllable_indices(c: char) -> Option<(usize, usize, usize)> {
    if !is_syllable(c) {
        return None;
    }
    let index = c as u32 - SYLLABLE_BASE;
    Some((
        (index / SYLLABLES_PER_INITIAL) as usize,
        ((index % SYLLABLES_PER_INITIAL) / SYLLABLES_PER_MEDIAL) as usize,
        (index % SYLLABLES_PER_MEDIAL) as usize,
    ))
}

/// Reassemble a syllable from table indices; `None` when an index is out of range
pub fn compose_indices(initial: usize, medial: usize, final_: usize) -> Option<char> {
    if initial >= CHOSEONG.len() || medial >= JUNGSEONG.len() || final_ >= JONGSEONG.len() {
        return None;
    }
    let code = SYLLABLE_BASE
        + initial as u32 * SYLLABLES_PER_INITIAL
        + medial as u32 * SYLLABLES_PER_MEDIAL
        + final_ as u32;
    char::from_u32(code)
}

/// Decompose one character into jamo
///
/// Precomposed syllables yield two or three jamo (`안` → `ㅇ ㅏ ㄴ`); anything else,
/// including standalone jamo, yields itself.
pub fn decompose(c: char) -> Vec<char> {
    match syllable_indices(c) {
        Some((initial, medial, final_)) => {
            let mut jamo = Vec::with_capacity(3);
            jamo.push(CHOSEONG[initial]);
            jamo.push(JUNGSEONG[medial]);
            if let Some(tail) = JONGSEONG[final_] {
                jamo.push(tail);
            }
            jamo
        }
        None => vec![c],
    }
}

/// Primitive pair a compound vowel or final cluster is typed as, in IME order
fn compound_parts(jamo: char) -> Option<[char; 2]> {
    let parts = match jamo {
        // Compound medials
        'ㅘ' => ['ㅗ', 'ㅏ'],
        'ㅙ' => ['ㅗ', 'ㅐ'],
        'ㅚ' => ['ㅗ', 'ㅣ'],
        'ㅝ' => ['ㅜ', 'ㅓ'],
        'ㅞ' => ['ㅜ', 'ㅔ'],
        'ㅟ' => ['ㅜ', 'ㅣ'],
        'ㅢ' => ['ㅡ', 'ㅣ'],
        // Final clusters
        'ㄳ' => ['ㄱ', 'ㅅ'],
        'ㄵ' => ['ㄴ', 'ㅈ'],
        'ㄶ' => ['ㄴ', 'ㅎ'],
        'ㄺ' => ['ㄹ', 'ㄱ'],
        'ㄻ' => ['ㄹ', 'ㅁ'],
        'ㄼ' => ['ㄹ', 'ㅂ'],
        'ㄽ' => ['ㄹ', 'ㅅ'],
        'ㄾ' => ['ㄹ', 'ㅌ'],
        'ㄿ' => ['ㄹ', 'ㅍ'],
        'ㅀ' => ['ㄹ', 'ㅎ'],
        'ㅄ' => ['ㅂ', 'ㅅ'],
        _ => return None,
    };
    Some(parts)
}

/// Replace each compound jamo with its primitive pair, leaving simple jamo untouched
///
/// `[ㅁ, ㅝ]` → `[ㅁ, ㅜ, ㅓ]`, `[ㅅ, ㅏ, ㄻ]` → `[ㅅ, ㅏ, ㄹ, ㅁ]`
pub fn expand_compound(jamo: &[char]) -> Vec<char> {
    let mut expanded = Vec::with_capacity(jamo.len() + 2);
    for &j in jamo {
        match compound_parts(j) {
            Some(parts) => expanded.extend_from_slice(&parts),
            None => expanded.push(j),
        }
    }
    expanded
}

/// Whether `prefix` is a jamo-for-jamo prefix of `full` after compound expansion
pub fn is_jamo_prefix(prefix: &[char], full: &[char]) -> bool {
    let prefix = expand_compound(prefix);
    let full = expand_compound(full);
    full.starts_with(&prefix)
}

/// Total jamo in `text`; the unit of typing-speed measurement
pub fn count_jamo(text: &str) -> usize {
    text.chars().map(|c| decompose(c).len()).sum()
}
