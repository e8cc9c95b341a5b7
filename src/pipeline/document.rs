//! Print-ready HTML: the body document and header/footer fragments.
//!
//! Everything here is a pure function of its inputs. The job decides where
//! (and whether) the strings are written to disk.

use super::markdown::escape_html;
use super::math::MathNormalizer;

/// HTML produced for one Markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Complete standalone document for the page body.
    pub body_html: String,
    /// Header strip, present only when header text was given.
    pub header_html: Option<String>,
    /// Footer strip, present only when footer text was given.
    pub footer_html: Option<String>,
}

/// Wraps the math-aware Markdown conversion in the print stylesheet.
#[derive(Debug, Clone, Default)]
pub struct DocumentRenderer {
    normalizer: MathNormalizer,
}

impl DocumentRenderer {
    pub fn new(normalizer: MathNormalizer) -> Self {
        Self { normalizer }
    }

    /// Render the body plus optional header/footer strips.
    ///
    /// Blank header or footer text counts as absent.
    pub fn render_document(
        &self,
        markdown: &str,
        header: Option<&str>,
        footer: Option<&str>,
    ) -> RenderedDocument {
        let content = self.normalizer.normalize(markdown);
        RenderedDocument {
            body_html: wrap_body(&content),
            header_html: non_blank(header).map(|t| strip_html(t, Strip::Header)),
            footer_html: non_blank(footer).map(|t| strip_html(t, Strip::Footer)),
        }
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

// ── Body document ────────────────────────────────────────────────────────────

/// Emoji fonts first so pictographs in headings do not fall back to tofu,
/// CJK fonts before the Latin generics.
const FONT_STACK: &str = r#""Segoe UI Emoji", "Apple Color Emoji", "Noto Color Emoji", "Segoe UI Symbol", "Symbola", "DejaVu Sans", "FreeSans", "Microsoft YaHei", "SimHei", "Noto Sans CJK SC", Arial, sans-serif"#;

const BODY_CSS: &str = r#"
body, h1, h2, h3, h4, h5, h6, p, div, span, td, th, li {
    font-family: __FONT_STACK__;
}
body {
    margin: 40px;
    line-height: 1.6;
    font-size: 16px;
}
h1, h2, h3, h4, h5, h6 {
    font-family: inherit !important;
    font-weight: bold;
    color: #333333;
    margin-top: 24px;
    margin-bottom: 16px;
}
p { margin: 0 0 16px 0; }
code {
    background-color: #f6f8fa;
    padding: 2px 4px;
    border-radius: 3px;
    font-family: "SFMono-Regular", Consolas, "Liberation Mono", Menlo, monospace;
}
pre {
    background-color: #f6f8fa;
    padding: 16px;
    border-radius: 6px;
    white-space: pre-wrap;
}
pre code { padding: 0; background: none; }
table {
    border-collapse: collapse;
    margin: 16px 0;
    width: 100%;
}
th, td {
    border: 1px solid #dfe2e5;
    padding: 6px 13px;
}
th {
    background-color: #f6f8fa;
    font-weight: 600;
}
blockquote {
    border-left: 4px solid #dfe2e5;
    padding: 0 16px;
    margin: 16px 0;
    color: #6a737d;
}
ul, ol { padding-left: 24px; }
li { margin: 4px 0; }
img { max-width: 100%; }

/* math */
.math-inline, .math-display {
    font-family: "Cambria Math", "Lucida Bright", "STIX Two Math", serif;
    font-size: 1.1em;
}
.math-display {
    display: block;
    text-align: center;
    margin: 16px 0;
    padding: 10px;
    background-color: #f8f8f8;
    border-radius: 4px;
}
.fraction {
    display: inline-block;
    text-align: center;
    line-height: 1;
    vertical-align: middle;
}
.numerator {
    display: block;
    border-bottom: 1px solid black;
    padding: 0 2px;
}
.denominator {
    display: block;
    padding: 0 2px;
}
.subscript { font-size: 0.8em; vertical-align: sub; }
.superscript { font-size: 0.8em; vertical-align: super; }
sub, sup { line-height: 0; }
.overline, .sqrt-symbol { text-decoration: overline; }

.preload-glyphs { display: none; }
"#;

/// Glyphs the engine should resolve once up front so later text picks the
/// same fallback fonts.
const PRELOAD_GLYPHS: &str = concat!(
    "&#x1F4CB;&#x1F4DA;&#x1F4D8;&#x2699;&#x1F393;&#x1F4BB;&#x2705;&#x274C;&#x1F504;",
    "&#x1F4CA;&#x1F4C1;&#x1F3AF;&#x1F4DD;&#x2728;&#x1F4DE;&#x1F4E7;&#x1F389;&#x1F60A;\n",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz\n",
    "0123456789!@#$%^&amp;*()_+-=[]{}|;':&quot;,./&lt;&gt;?"
);

fn wrap_body(content: &str) -> String {
    let css = BODY_CSS.replace("__FONT_STACK__", FONT_STACK);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>{css}</style>\n</head>\n<body>\n\
         <div class=\"preload-glyphs\">\n{PRELOAD_GLYPHS}\n</div>\n{content}</body>\n</html>\n"
    )
}

// ── Header / footer strips ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Strip {
    Header,
    Footer,
}

impl Strip {
    fn class(self) -> &'static str {
        match self {
            Strip::Header => "header",
            Strip::Footer => "footer",
        }
    }

    fn border_edge(self) -> &'static str {
        match self {
            Strip::Header => "top",
            Strip::Footer => "bottom",
        }
    }
}

fn strip_html(text: &str, strip: Strip) -> String {
    let class = strip.class();
    let edge = strip.border_edge();
    let text = escape_html(text);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
body {{
    margin: 0;
    padding: 0;
    font-family: "Segoe UI Emoji", "Apple Color Emoji", "Noto Color Emoji", Arial, "Microsoft YaHei", sans-serif;
}}
.{class} {{
    text-align: center;
    font-size: 12px;
    color: #666666;
    padding: 5px 10px;
    border-{edge}: 1px solid #cccccc;
    background-color: #f9f9f9;
    margin: 0;
    width: 100%;
    box-sizing: border-box;
    height: 25px;
    line-height: 15px;
}}
</style>
</head>
<body>
<div class="{class}">{text}</div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(md: &str, header: Option<&str>, footer: Option<&str>) -> RenderedDocument {
        DocumentRenderer::default().render_document(md, header, footer)
    }

    #[test]
    fn body_is_standalone_document() {
        let doc = render("# Hi", None, None);
        assert!(doc.body_html.starts_with("<!DOCTYPE html>"));
        assert!(doc.body_html.contains("<meta charset=\"utf-8\">"));
        assert!(doc.body_html.contains("<h1>Hi</h1>"));
        assert!(doc.body_html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn stylesheet_declares_math_classes_and_fonts() {
        let body = render("x", None, None).body_html;
        for class in [
            ".math-inline",
            ".math-display",
            ".fraction",
            ".numerator",
            ".denominator",
            ".subscript",
            ".superscript",
            ".overline",
            ".sqrt-symbol",
        ] {
            assert!(body.contains(class), "missing {class}");
        }
        let emoji = body.find("Noto Color Emoji").unwrap();
        let cjk = body.find("Microsoft YaHei").unwrap();
        let generic = body.find("sans-serif;").unwrap();
        assert!(emoji < cjk && cjk < generic);
        assert!(!body.contains("__FONT_STACK__"));
    }

    #[test]
    fn preload_block_injected_once() {
        let body = render("text", None, None).body_html;
        assert_eq!(body.matches("<div class=\"preload-glyphs\">").count(), 1);
        assert!(body.contains("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
        assert!(body.contains("0123456789"));
    }

    #[test]
    fn header_and_footer_only_when_given() {
        let doc = render("x", None, None);
        assert!(doc.header_html.is_none());
        assert!(doc.footer_html.is_none());

        let doc = render("x", Some("  "), Some("Confidential"));
        assert!(doc.header_html.is_none());
        let footer = doc.footer_html.unwrap();
        assert!(footer.contains("<div class=\"footer\">Confidential</div>"));
        assert!(footer.contains("border-bottom: 1px solid #cccccc"));
        assert!(footer.contains("font-size: 12px"));
    }

    #[test]
    fn header_uses_top_border() {
        let header = render("x", Some("Quarterly report"), None)
            .header_html
            .unwrap();
        assert!(header.contains("border-top: 1px solid #cccccc"));
        assert!(!header.contains("border-bottom"));
        assert!(header.contains("Quarterly report"));
    }

    #[test]
    fn header_text_is_escaped() {
        let header = render("x", Some("R&D <draft>"), None).header_html.unwrap();
        assert!(header.contains("R&amp;D &lt;draft&gt;"));
    }

    #[test]
    fn math_reaches_body() {
        let body = render("Area $\\pi r^2$", None, None).body_html;
        assert!(body.contains(r#"<span class="math-inline">π r²</span>"#), "got: {body}");
    }
}
