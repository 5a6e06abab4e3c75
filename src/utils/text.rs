//! Text scanning helpers.

use std::sync::OnceLock;

use regex::Regex;

/// Find absolute PDF URLs in page text, unique, in order of appearance.
pub fn find_pdf_urls(text: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>()\[\]]+\.pdf\b"#).unwrap()
    });

    let mut seen = Vec::new();
    for m in re.find_iter(text) {
        let url = m.as_str().to_string();
        if !seen.contains(&url) {
            seen.push(url);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_unique_pdf_urls_in_order() {
        let text = "Download https://x.example/report.pdf or the mirror \
                    (https://y.example/iso.pdf). Again: https://x.example/report.pdf";
        assert_eq!(
            find_pdf_urls(text),
            vec![
                "https://x.example/report.pdf".to_string(),
                "https://y.example/iso.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_scheme_and_extension() {
        let urls = find_pdf_urls("see HTTPS://X.EXAMPLE/AUDIT.PDF for details");
        assert_eq!(urls, vec!["HTTPS://X.EXAMPLE/AUDIT.PDF".to_string()]);
    }

    #[test]
    fn test_ignores_relative_and_non_pdf() {
        assert!(find_pdf_urls("see /files/report.pdf and https://x.example/page.html").is_empty());
    }

    #[test]
    fn test_pdf_extension_must_terminate() {
        // .pdfx is not a PDF link
        assert!(find_pdf_urls("https://x.example/report.pdfx").is_empty());
    }
}
