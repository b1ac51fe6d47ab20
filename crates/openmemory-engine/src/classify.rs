//! Sector classification.
//!
//! Rule order: caller hint, then regex families for code/comment/error
//! text, then keyword voting, then the semantic default.

use std::sync::OnceLock;

use regex::Regex;

use openmemory_core::Sector;

struct Rules {
    code: Regex,
    error: Regex,
    steps: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        code: Regex::new(
            r"(?m)(^\s*(fn|def|class|impl|pub|import|from|let|const|var)\s)|[{};]\s*$|=>|::",
        )
        .expect("static regex"),
        error: Regex::new(
            r"(?i)\b(error|exception|panic|traceback|stack trace|segfault|failed with)\b",
        )
        .expect("static regex"),
        steps: Regex::new(r"(?i)\b(step \d|first,|then,|finally,|how to|in order to)\b")
            .expect("static regex"),
    })
}

const EPISODIC_HINTS: &[&str] = &[
    "yesterday",
    "today",
    "tomorrow",
    "last week",
    "went",
    "visited",
    "met",
    "saw",
    "happened",
    "remember when",
];

const EMOTIONAL_HINTS: &[&str] = &[
    "feel",
    "felt",
    "happy",
    "sad",
    "angry",
    "excited",
    "anxious",
    "love",
    "hate",
    "afraid",
    "proud",
];

const PROCEDURAL_HINTS: &[&str] = &[
    "install",
    "configure",
    "run",
    "build",
    "deploy",
    "steps",
    "procedure",
    "recipe",
    "instructions",
];

const REFLECTIVE_HINTS: &[&str] = &[
    "realized",
    "learned",
    "conclusion",
    "in retrospect",
    "looking back",
    "insight",
    "summary of",
];

/// Classify text into a sector. `hint` wins when valid.
pub fn classify(text: &str, hint: Option<Sector>) -> Sector {
    if let Some(sector) = hint {
        return sector;
    }

    let r = rules();
    if r.code.is_match(text) || r.error.is_match(text) {
        return Sector::Procedural;
    }
    if r.steps.is_match(text) {
        return Sector::Procedural;
    }

    let lowered = text.to_lowercase();
    let vote = |hints: &[&str]| hints.iter().filter(|h| lowered.contains(*h)).count();

    let scores = [
        (Sector::Episodic, vote(EPISODIC_HINTS)),
        (Sector::Emotional, vote(EMOTIONAL_HINTS)),
        (Sector::Procedural, vote(PROCEDURAL_HINTS)),
        (Sector::Reflective, vote(REFLECTIVE_HINTS)),
    ];

    scores
        .iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(sector, _)| *sector)
        .unwrap_or(Sector::Semantic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_wins() {
        assert_eq!(
            classify("anything at all", Some(Sector::Emotional)),
            Sector::Emotional
        );
    }

    #[test]
    fn code_goes_procedural() {
        assert_eq!(
            classify("fn main() {\n    println!(\"hi\");\n}", None),
            Sector::Procedural
        );
    }

    #[test]
    fn errors_go_procedural() {
        assert_eq!(
            classify("the deploy failed with a stack trace in the logs", None),
            Sector::Procedural
        );
    }

    #[test]
    fn travel_memory_is_episodic() {
        assert_eq!(
            classify("I went to Paris yesterday and saw the Eiffel Tower", None),
            Sector::Episodic
        );
    }

    #[test]
    fn feelings_are_emotional() {
        assert_eq!(
            classify("I felt so happy and proud after the demo", None),
            Sector::Emotional
        );
    }

    #[test]
    fn undecidable_defaults_to_semantic() {
        assert_eq!(classify("water boils at 100 degrees", None), Sector::Semantic);
    }
}
