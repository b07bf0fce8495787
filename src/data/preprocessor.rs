// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises CSV text before tokenisation. Scraped review and
// genre corpora carry non-breaking spaces, zero-width spaces,
// stray control characters and runs of whitespace that would
// otherwise leak into the word-level vocabulary.
//
// Unlike documents, sentences have no meaningful line structure,
// so every whitespace run collapses to one space.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;

        for c in text.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            };
            if c.is_whitespace() {
                pending_space = !out.is_empty();
            } else {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(c);
            }
        }
        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
