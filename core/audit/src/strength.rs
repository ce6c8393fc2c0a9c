//! Per-password strength analysis.
//!
//! The estimate is character-class entropy (`length * log2(charset)`)
//! scaled down by a penalty factor for recognizable patterns. The
//! factor never drops below 0.3 so length still counts for something.

/// Lowest the pattern penalty factor can push the entropy.
const PENALTY_FLOOR: f64 = 0.3;

/// Passwords seen in every leaked-credentials top list.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "passwort", "motdepasse", "123456", "12345678", "123456789",
    "qwerty", "azerty", "letmein", "welcome", "admin", "monkey", "dragon",
    "iloveyou", "sunshine", "princess", "football", "baseball", "master",
    "shadow", "superman", "trustno1",
];

/// Keyboard rows scanned for walking patterns, QWERTY and AZERTY.
const KEYBOARD_ROWS: &[&str] = &[
    "qwertyuiop", "asdfghjkl", "zxcvbnm",
    "azertyuiop", "qsdfghjklm", "wxcvbn",
    "1234567890",
];

/// Strength bucket derived from the adjusted entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthBucket {
    Critical,
    Weak,
    Medium,
    Strong,
    Excellent,
}

impl StrengthBucket {
    fn from_entropy(bits: f64) -> Self {
        if bits < 28.0 {
            Self::Critical
        } else if bits < 36.0 {
            Self::Weak
        } else if bits < 60.0 {
            Self::Medium
        } else if bits < 80.0 {
            Self::Strong
        } else {
            Self::Excellent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
            Self::Excellent => "excellent",
        }
    }
}

/// A pattern that weakened the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordIssue {
    Empty,
    RepeatedCharacters,
    SequentialRun,
    KeyboardPattern,
    CommonPassword,
    YearPattern,
}

/// Result of analyzing a single password.
#[derive(Debug, Clone)]
pub struct PasswordAnalysis {
    /// Entropy estimate in bits, after pattern penalties.
    pub entropy: f64,
    pub bucket: StrengthBucket,
    pub issues: Vec<PasswordIssue>,
}

fn charset_size(password: &str) -> f64 {
    let mut size = 0u32;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        size += 26;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        size += 26;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        size += 10;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        size += 33;
    }
    f64::from(size.max(1))
}

/// Three or more of the same character in a row.
fn has_repeated_run(chars: &[char]) -> bool {
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Three or more consecutive codepoints, ascending or descending
/// ("abc", "321").
fn has_sequential_run(chars: &[char]) -> bool {
    chars.windows(3).any(|w| {
        let (a, b, c) = (w[0] as i64, w[1] as i64, w[2] as i64);
        (b == a + 1 && c == b + 1) || (b == a - 1 && c == b - 1)
    })
}

/// Four-character walk along a keyboard row, either direction.
fn has_keyboard_pattern(lowered: &str) -> bool {
    KEYBOARD_ROWS.iter().any(|row| {
        let reversed: String = row.chars().rev().collect();
        let found = row_windows(row).chain(row_windows(&reversed)).any(|w| lowered.contains(w));
        found
    })
}

fn row_windows(row: &str) -> impl Iterator<Item = &str> {
    (0..row.len().saturating_sub(3)).map(move |i| &row[i..i + 4])
}

fn contains_common_password(lowered: &str) -> bool {
    COMMON_PASSWORDS.iter().any(|p| lowered.contains(p))
}

/// A four-digit group that reads as a year (1900-2099).
fn has_year_pattern(chars: &[char]) -> bool {
    chars.windows(4).any(|w| {
        if !w.iter().all(|c| c.is_ascii_digit()) {
            return false;
        }
        let value: u32 = w.iter().filter_map(|c| c.to_digit(10)).fold(0, |acc, d| acc * 10 + d);
        (1900..=2099).contains(&value)
    })
}

/// Analyze a password and bucket its strength.
pub fn analyze_password(password: &str) -> PasswordAnalysis {
    if password.is_empty() {
        return PasswordAnalysis {
            entropy: 0.0,
            bucket: StrengthBucket::Critical,
            issues: vec![PasswordIssue::Empty],
        };
    }

    let chars: Vec<char> = password.chars().collect();
    let lowered = password.to_lowercase();
    let raw_entropy = chars.len() as f64 * charset_size(password).log2();

    let mut issues = Vec::new();
    let mut penalty = 1.0_f64;

    if has_repeated_run(&chars) {
        issues.push(PasswordIssue::RepeatedCharacters);
        penalty *= 0.7;
    }
    if has_sequential_run(&chars) {
        issues.push(PasswordIssue::SequentialRun);
        penalty *= 0.7;
    }
    if has_keyboard_pattern(&lowered) {
        issues.push(PasswordIssue::KeyboardPattern);
        penalty *= 0.6;
    }
    if contains_common_password(&lowered) {
        issues.push(PasswordIssue::CommonPassword);
        penalty *= 0.3;
    }
    if has_year_pattern(&chars) {
        issues.push(PasswordIssue::YearPattern);
        penalty *= 0.85;
    }

    let entropy = raw_entropy * penalty.max(PENALTY_FLOOR);
    PasswordAnalysis {
        entropy,
        bucket: StrengthBucket::from_entropy(entropy),
        issues,
    }
}
