//! Math normalisation: LaTeX-ish formulas → Unicode and styled HTML.
//!
//! ## Why not MathJax or KaTeX?
//!
//! wkhtmltopdf runs with JavaScript and network access disabled, and the
//! documents we convert mostly contain light math (exponents, fractions,
//! Greek letters, a sum or an integral). A fixed chain of regex rewrites
//! turns those into Unicode characters plus a few CSS-styled spans that the
//! print stylesheet in [`super::document`] knows how to draw. Fidelity is
//! traded for zero dependencies at render time: anything the chain does not
//! understand passes through as literal text.
//!
//! ## Stage order
//!
//! Rewrites run in the order of [`stages`]. The order matters:
//!
//! - big operators with limits (`\sum_{a}^{b}`) before the generic combined
//!   sub/superscript rule, which would otherwise eat their limits;
//! - combined `_{a}^{b}` before single `_{a}` / `^{b}`;
//! - `\sqrt{x}` and `\sqrt[n]{x}` before the symbol table maps bare `\sqrt`;
//! - `^2` / `^3` before the generic single-character superscript;
//! - chemical formulas last, so they also catch `H<sub>2</sub>O` produced by
//!   the generic subscript rule.
//!
//! Each stage is a pure `&str → String` function with a stable name, so it can
//! be tested on its own.

use super::markdown::{escape_html, CommonMarkConverter, MarkdownConverter};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

// ── Delimiters ───────────────────────────────────────────────────────────────

static RE_BLOCK_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());

static RE_INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([^$\n]+?)\$").unwrap());

static RE_LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());

// ── Rewrite stages ───────────────────────────────────────────────────────────

enum Replacement {
    /// `regex` replacement template (`${1}` syntax).
    Template(&'static str),
    Function(fn(&Captures) -> String),
}

/// One named `(pattern, replacement)` step of the formula rewrite chain.
pub struct RewriteStage {
    name: &'static str,
    pattern: Regex,
    replacement: Replacement,
}

impl RewriteStage {
    fn template(name: &'static str, pattern: &str, template: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            replacement: Replacement::Template(template),
        }
    }

    fn function(name: &'static str, pattern: &str, f: fn(&Captures) -> String) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            replacement: Replacement::Function(f),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply this stage alone.
    pub fn apply(&self, input: &str) -> String {
        match &self.replacement {
            Replacement::Template(t) => self.pattern.replace_all(input, *t).into_owned(),
            Replacement::Function(f) => self.pattern.replace_all(input, |c: &Captures| f(c)).into_owned(),
        }
    }
}

static STAGES: Lazy<Vec<RewriteStage>> = Lazy::new(|| {
    vec![
        // Formula text lands inside raw HTML; a bare `<` would open a tag.
        RewriteStage::function("escape-angle-brackets", r"[<>]", |c| {
            escape_html(&c[0])
        }),
        // Exponent shorthand
        RewriteStage::template("exp-negative", r"e\^-([a-zA-Z0-9]+)", "e<sup>-${1}</sup>"),
        RewriteStage::template("exp-braced", r"e\^\{([^}]+)\}", "e<sup>${1}</sup>"),
        // Big operators with limits
        RewriteStage::template(
            "sum-limits",
            r"\\sum_\{([^}]+)\}\^\{([^}]+)\}",
            "∑<sub>${1}</sub><sup>${2}</sup>",
        ),
        RewriteStage::template(
            "int-limits",
            r"\\int_\{([^}]+)\}\^\{([^}]+)\}",
            "∫<sub>${1}</sub><sup>${2}</sup>",
        ),
        // Combined sub/superscripts
        RewriteStage::template(
            "sub-then-sup",
            r"_\{([^}]+)\}\^\{([^}]+)\}",
            "<sub>${1}</sub><sup>${2}</sup>",
        ),
        RewriteStage::template(
            "sup-then-sub",
            r"\^\{([^}]+)\}_\{([^}]+)\}",
            "<sup>${1}</sup><sub>${2}</sub>",
        ),
        // Fractions
        RewriteStage::template(
            "frac",
            r"\\frac\{([^}]+)\}\{([^}]+)\}",
            r#"<span class="fraction"><span class="numerator">${1}</span><span class="denominator">${2}</span></span>"#,
        ),
        RewriteStage::template("digit-division", r"(\d+)/(\d+)", "<sup>${1}</sup>&frasl;<sub>${2}</sub>"),
        // Roots
        RewriteStage::template("nth-root", r"\\sqrt\[(\d+)\]\{([^}]+)\}", "<sup>${1}</sup>√${2}"),
        RewriteStage::template(
            "square-root",
            r"\\sqrt\{([^}]+)\}",
            r#"√<span class="sqrt-symbol">${1}</span>"#,
        ),
        // Decorations and matrices
        RewriteStage::template(
            "overline",
            r"\\(?:bar|vec)\{([^}]+)\}",
            r#"<span class="overline">${1}</span>"#,
        ),
        RewriteStage::template("pmatrix-open", r"\\begin\{pmatrix\}", "("),
        RewriteStage::template("pmatrix-close", r"\\end\{pmatrix\}", ")"),
        // Symbol table
        RewriteStage::function("symbols", r"\\([A-Za-z]+)", |c| match SYMBOL_MAP.get(&c[1]) {
            Some(s) => (*s).to_string(),
            None => c[0].to_string(),
        }),
        // Residual sub/superscripts
        RewriteStage::template("e-to-the-x", r"e\^x", "eˣ"),
        RewriteStage::template("squared", r"\^2", "²"),
        RewriteStage::template("cubed", r"\^3", "³"),
        RewriteStage::template("sub-braced", r"_\{([^}]+)\}", "<sub>${1}</sub>"),
        RewriteStage::template("sub-char", r"_([a-zA-Z0-9])", "<sub>${1}</sub>"),
        RewriteStage::template("sup-braced", r"\^\{([^}]+)\}", "<sup>${1}</sup>"),
        RewriteStage::template("sup-char", r"\^([a-zA-Z0-9])", "<sup>${1}</sup>"),
        // Chemical formulas
        RewriteStage::template("chem-water", r"H(?:_2|<sub>2</sub>)O", "H₂O"),
        RewriteStage::template("chem-hydrogen", r"H(?:_2|<sub>2</sub>)", "H₂"),
        RewriteStage::template("chem-oxygen", r"O(?:_2|<sub>2</sub>)", "O₂"),
        RewriteStage::template("chem-methane", r"CH(?:_4|<sub>4</sub>)", "CH₄"),
        RewriteStage::template("chem-carbon-dioxide", r"CO(?:_2|<sub>2</sub>)", "CO₂"),
    ]
});

/// The rewrite chain, in application order.
pub fn stages() -> &'static [RewriteStage] {
    &STAGES
}

/// Look up a single stage by name.
pub fn stage(name: &str) -> Option<&'static RewriteStage> {
    STAGES.iter().find(|s| s.name == name)
}

// ── Symbol table ─────────────────────────────────────────────────────────────

/// `\name` → replacement. Only whole command names match, so `\in` never
/// touches `\infty` and unknown commands survive untouched.
pub const SYMBOLS: &[(&str, &str)] = &[
    // Operators and relations
    ("int", "∫"),
    ("sum", "∑"),
    ("prod", "∏"),
    ("infty", "∞"),
    ("pm", "±"),
    ("times", "×"),
    ("cdot", "·"),
    ("div", "÷"),
    ("leq", "≤"),
    ("le", "≤"),
    ("geq", "≥"),
    ("ge", "≥"),
    ("neq", "≠"),
    ("ne", "≠"),
    ("approx", "≈"),
    ("partial", "∂"),
    ("nabla", "∇"),
    ("forall", "∀"),
    ("exists", "∃"),
    ("rightarrow", "→"),
    ("to", "→"),
    ("leftarrow", "←"),
    ("Rightarrow", "⇒"),
    ("in", "∈"),
    ("subset", "⊂"),
    ("cup", "∪"),
    ("cap", "∩"),
    ("sqrt", "√"),
    ("cdots", "⋯"),
    ("ldots", "…"),
    // Named functions
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("log", "log"),
    ("ln", "ln"),
    ("lim", "lim"),
    ("det", "det"),
    // Greek, lower case
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("epsilon", "ε"),
    ("varepsilon", "ε"),
    ("zeta", "ζ"),
    ("eta", "η"),
    ("theta", "θ"),
    ("vartheta", "ϑ"),
    ("iota", "ι"),
    ("kappa", "κ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("nu", "ν"),
    ("xi", "ξ"),
    ("omicron", "ο"),
    ("pi", "π"),
    ("rho", "ρ"),
    ("sigma", "σ"),
    ("varsigma", "ς"),
    ("tau", "τ"),
    ("upsilon", "υ"),
    ("phi", "φ"),
    ("varphi", "ϕ"),
    ("chi", "χ"),
    ("psi", "ψ"),
    ("omega", "ω"),
    // Greek, upper case where distinct from Latin
    ("Gamma", "Γ"),
    ("Delta", "Δ"),
    ("Theta", "Θ"),
    ("Lambda", "Λ"),
    ("Xi", "Ξ"),
    ("Pi", "Π"),
    ("Sigma", "Σ"),
    ("Upsilon", "Υ"),
    ("Phi", "Φ"),
    ("Psi", "Ψ"),
    ("Omega", "Ω"),
];

static SYMBOL_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| SYMBOLS.iter().copied().collect());

// ── Public API ───────────────────────────────────────────────────────────────

/// Run one formula body through every stage.
pub fn rewrite_formula(formula: &str) -> String {
    STAGES
        .iter()
        .fold(formula.to_string(), |acc, stage| stage.apply(&acc))
}

/// Replace every `$$…$$` and `$…$` span in Markdown source with HTML.
///
/// Block math first, then inline math over the result. Works on raw source,
/// so dollar signs inside code spans and fences are rewritten too.
pub fn substitute_math(markdown: &str) -> String {
    let with_blocks = RE_BLOCK_MATH.replace_all(markdown, |c: &Captures| {
        let body = rewrite_formula(c[1].trim());
        // Kept on one line: a blank line inside would end the HTML block.
        let body = RE_LINE_BREAKS.replace_all(&body, " ");
        format!(r#"<div class="math-display">{body}</div>"#)
    });
    RE_INLINE_MATH
        .replace_all(&with_blocks, |c: &Captures| {
            format!(r#"<span class="math-inline">{}</span>"#, rewrite_formula(&c[1]))
        })
        .into_owned()
}

/// Markdown (with math) → HTML fragment.
///
/// Total: if the math-substituted source cannot be converted, the original
/// source is converted without math handling; if that fails too, the escaped
/// source is shown preformatted.
#[derive(Clone)]
pub struct MathNormalizer {
    converter: Arc<dyn MarkdownConverter>,
}

impl MathNormalizer {
    pub fn new(converter: Arc<dyn MarkdownConverter>) -> Self {
        Self { converter }
    }

    pub fn normalize(&self, markdown: &str) -> String {
        let substituted = substitute_math(markdown);
        match self.converter.to_html(&substituted) {
            Ok(html) => html,
            Err(e) => {
                warn!("Math-aware conversion failed, retrying without math: {}", e);
                match self.converter.to_html(markdown) {
                    Ok(html) => html,
                    Err(e) => {
                        warn!("Markdown conversion failed, emitting preformatted source: {}", e);
                        format!("<pre>{}</pre>", escape_html(markdown))
                    }
                }
            }
        }
    }
}

impl Default for MathNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(CommonMarkConverter))
    }
}

impl std::fmt::Debug for MathNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MathNormalizer").finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
