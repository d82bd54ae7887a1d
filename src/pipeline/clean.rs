//! Text cleanup: deterministic fixes for raw PDF page text.
//!
//! PDF text extraction hands back layout artefacts rather than prose: hard
//! line breaks at every column edge, words hyphenated across lines, soft
//! hyphens, runs of spaces used for alignment, and a running footer on every
//! page. These rules turn that into paragraphs the splitter can cut on.
//!
//! ## Rule Order
//!
//! Soft hyphens must go before hyphenated line breaks are joined, and
//! line breaks must be joined before single newlines become spaces, or the
//! word halves end up separated by a space.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page of extracted text.
///
/// Rules (applied in order):
/// 1. Carriage returns become newlines
/// 2. Remove soft hyphens (a soft hyphen before a newline also eats the newline)
/// 3. Join words hyphenated across a line break (`exam-\nple` → `example`)
/// 4. Single newlines become spaces; blank-line paragraph breaks stay
/// 5. Collapse runs of spaces/tabs
/// 6. Collapse 3+ newlines to a single blank line
/// 7. Strip page-number footers and the manufacturer line, then tidy the gap
/// 8. Trim
///
/// Cleaning already-clean text is a no-op.
pub fn clean_text(input: &str) -> String {
    let s = normalise_carriage_returns(input);
    let s = remove_soft_hyphens(&s);
    let s = join_hyphenated_words(&s);
    let s = unwrap_single_newlines(&s);
    let s = collapse_horizontal_whitespace(&s);
    let s = collapse_blank_lines(s.trim());
    let s = strip_boilerplate(&s);
    s.trim().to_string()
}

// ── Rule 1: Carriage returns ─────────────────────────────────────────────────

fn normalise_carriage_returns(input: &str) -> String {
    input.replace('\r', "\n")
}

// ── Rule 2: Soft hyphens ─────────────────────────────────────────────────────

fn remove_soft_hyphens(input: &str) -> String {
    input.replace("\u{00AD}\n", "").replace('\u{00AD}', "")
}

// ── Rule 3: Hyphenated line breaks ───────────────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)-\n(\w)").unwrap());

fn join_hyphenated_words(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").into_owned()
}

// ── Rule 4: Single newlines ──────────────────────────────────────────────────

/// A newline with no newline on either side is a layout wrap, not a
/// paragraph break.
fn unwrap_single_newlines(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    for (i, &c) in chars.iter().enumerate() {
        let isolated = c == '\n'
            && (i == 0 || chars[i - 1] != '\n')
            && chars.get(i + 1) != Some(&'\n');
        out.push(if isolated { ' ' } else { c });
    }
    out
}

// ── Rule 5: Horizontal whitespace ────────────────────────────────────────────

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

fn collapse_horizontal_whitespace(input: &str) -> String {
    RE_HSPACE.replace_all(input, " ").into_owned()
}

// ── Rule 6: Blank lines ──────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 7: Footer/header boilerplate ────────────────────────────────────────

static RE_PAGE_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:p[aá]gina|page)\s+\d+\s+(?:de|of)\s+\d+").unwrap()
});

static RE_MANUFACTURER: Lazy<Regex> = Lazy::new(|| Regex::new(r"Tesla,?\s+Inc\.").unwrap());

static RE_SPACE_AROUND_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*").unwrap());

/// Footers may be glued to the preceding word (`ManualPage 3 of 9`), and
/// removing one match can join its neighbours into another, so removal runs
/// until nothing matches.
fn strip_boilerplate(input: &str) -> String {
    let mut s = input.to_string();
    loop {
        let next = RE_PAGE_FOOTER.replace_all(&s, "");
        let next = RE_MANUFACTURER.replace_all(&next, "").into_owned();
        if next == s {
            break;
        }
        s = next;
    }
    // Removal leaves doubled spaces and space-padded paragraph breaks behind.
    let s = collapse_horizontal_whitespace(&s);
    let s = RE_SPACE_AROUND_NEWLINE.replace_all(&s, "\n");
    collapse_blank_lines(&s)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyphenated_line_break_joined() {
        assert_eq!(clean_text("exam-\nple"), "example");
        assert_eq!(clean_text("the exam-\nple text"), "the example text");
    }

    #[test]
    fn test_soft_hyphen_line_break_joined() {
        assert_eq!(clean_text("mante\u{00AD}\nnimiento"), "mantenimiento");
        assert_eq!(clean_text("mante\u{00AD}nimiento"), "mantenimiento");
    }

    #[test]
    fn test_carriage_returns() {
        assert_eq!(normalise_carriage_returns("a\r\nb\rc"), "a\n\nb\nc");
        // CRLF becomes a paragraph break, lone CR a wrap.
        assert_eq!(clean_text("a\rb"), "a b");
    }

    #[test]
    fn test_single_newlines_become_spaces() {
        assert_eq!(unwrap_single_newlines("one\ntwo\n\nthree"), "one two\n\nthree");
        assert_eq!(unwrap_single_newlines("\nx\n"), " x ");
    }

    #[test]
    fn test_paragraphs_preserved() {
        let input = "First line\nwraps here.\n\n\n\nSecond   paragraph\twith\t\ttabs.";
        assert_eq!(
            clean_text(input),
            "First line wraps here.\n\nSecond paragraph with tabs."
        );
    }

    #[test]
    fn test_page_footer_removed() {
        assert_eq!(clean_text("Frenos\n\nPágina 12 de 240"), "Frenos");
        assert_eq!(clean_text("Brakes Page 3 of 10 apply"), "Brakes apply");
        assert_eq!(clean_text("PAGINA 1 DE 2\n\nTexto"), "Texto");
    }

    #[test]
    fn test_glued_page_footer_removed() {
        assert_eq!(clean_text("Owner's ManualPage 12 of 240"), "Owner's Manual");
        assert_eq!(clean_text("FrenosPágina 3 de 9\n\nTexto"), "Frenos\n\nTexto");
    }

    #[test]
    fn test_nested_boilerplate_removed_in_one_pass() {
        assert_eq!(clean_text("Aviso Page Page 1 of 2 1 of 2"), "Aviso");
        assert_eq!(clean_text("Tesla, Tesla, Inc. Inc. fin"), "fin");
    }

    #[test]
    fn test_manufacturer_removed() {
        assert_eq!(clean_text("© 2024 Tesla, Inc. Todos los derechos"), "© 2024 Todos los derechos");
        assert_eq!(clean_text("Tesla Inc."), "");
    }

    #[test]
    fn test_boilerplate_between_paragraphs_leaves_single_break() {
        let input = "Uno.\n\nPágina 4 de 9\n\nDos.";
        assert_eq!(clean_text(input), "Uno.\n\nDos.");
    }

    #[test]
    fn test_blank_page_cleans_to_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \n\t\n\r "), "");
        assert_eq!(clean_text("Página 7 de 7"), "");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let inputs = [
            "exam-\nple",
            "Cinturones de seguri-\ndad\n\nAjuste  el\tasiento.\r\nPágina 3 de 200",
            "A  \n\n  B Page 1 of 2 C\n\n\n\nTesla, Inc.\n\nD",
            "linea\u{00AD}\nuno\nlinea dos\n\n\n",
            "Ya limpio.\n\nSegundo párrafo.",
            "Aviso Page Page 1 of 2 1 of 2",
            "Owner's ManualPage 12 of 240\nTesla, Tesla, Inc. Inc.",
        ];
        for input in inputs {
            let once = clean_text(input);
            let twice = clean_text(&once);
            assert_eq!(once, twice, "input: {input:?}");
        }
    }

    #[test]
    fn test_clean_full_pipeline() {
        let input = "  Sistema de carga\r\nLa batería se car-\nga en\u{00AD}\ntre 10\t y 80 %.\n\n\n\nPágina 5 de 120\nTesla, Inc.  ";
        let result = clean_text(input);
        assert_eq!(result, "Sistema de carga\n\nLa batería se carga entre 10 y 80 %.");
    }
}
