//! Utility Classes
//!
//! The preview is styled with single-purpose utility classes
//! (`text-gray-700`, `mt-8`, `border-b-2`) and `dark:` variants. This table
//! maps the subset the renderer emits to CSS declarations so the cascade can
//! compute styles without a browser.
//!
//! Tokens with a `dark:` prefix apply only when the element sits in a dark
//! context; interaction and breakpoint variants (`hover:`, `md:`) never
//! apply to a static export.

/// Declarations produced by one class token.
pub type Declarations = Vec<(&'static str, String)>;

/// Prefix marking a dark-theme variant.
pub const DARK_VARIANT: &str = "dark:";

/// Declarations for a class token, or `None` if the token is not a known
/// utility or its variants are inactive.
pub fn utility_declarations(token: &str, dark_context: bool) -> Option<Declarations> {
    let mut parts: Vec<&str> = token.split(':').collect();
    let base = parts.pop()?;
    for variant in parts {
        match variant {
            "dark" if dark_context => {}
            _ => return None,
        }
    }
    base_declarations(base)
}

/// Whether a token is a dark-theme variant.
pub fn is_dark_variant(token: &str) -> bool {
    token.starts_with(DARK_VARIANT)
}

fn base_declarations(base: &str) -> Option<Declarations> {
    if let Some(decls) = keyword(base) {
        return Some(decls);
    }
    if let Some(decls) = spacing(base) {
        return Some(decls);
    }
    if let Some(decls) = border(base) {
        return Some(decls);
    }
    if let Some(rest) = base.strip_prefix("text-") {
        if let Some(decls) = text_size(rest) {
            return Some(decls);
        }
        return color_of(rest).map(|c| vec![("color", c)]);
    }
    if let Some(rest) = base.strip_prefix("bg-") {
        return color_of(rest).map(|c| vec![("background-color", c)]);
    }
    if let Some(rest) = base.strip_prefix("leading-") {
        return leading(rest).map(|v| vec![("line-height", v)]);
    }
    if let Some(rest) = base.strip_prefix("w-") {
        return size(rest).map(|v| vec![("width", v)]);
    }
    if let Some(rest) = base.strip_prefix("h-") {
        return size(rest).map(|v| vec![("height", v)]);
    }
    if is_cosmetic(base) {
        return Some(Vec::new());
    }
    None
}

fn one(name: &'static str, value: &str) -> Option<Declarations> {
    Some(vec![(name, value.to_string())])
}

fn keyword(base: &str) -> Option<Declarations> {
    match base {
        "font-bold" => one("font-weight", "700"),
        "font-semibold" => one("font-weight", "600"),
        "font-medium" => one("font-weight", "500"),
        "font-normal" => one("font-weight", "400"),
        "font-mono" => one(
            "font-family",
            "ui-monospace, SFMono-Regular, Menlo, Consolas, monospace",
        ),
        "font-sans" => one("font-family", "ui-sans-serif, system-ui, sans-serif"),
        "font-serif" => one("font-family", "ui-serif, Georgia, serif"),
        "italic" => one("font-style", "italic"),
        "not-italic" => one("font-style", "normal"),
        "underline" => one("text-decoration", "underline"),
        "line-through" => one("text-decoration", "line-through"),
        "no-underline" => one("text-decoration", "none"),
        "text-left" => one("text-align", "left"),
        "text-center" => one("text-align", "center"),
        "text-right" => one("text-align", "right"),
        "text-justify" => one("text-align", "justify"),
        "list-disc" => one("list-style-type", "disc"),
        "list-decimal" => one("list-style-type", "decimal"),
        "list-none" => one("list-style-type", "none"),
        "block" => one("display", "block"),
        "inline" => one("display", "inline"),
        "inline-block" => one("display", "inline-block"),
        "flex" => one("display", "flex"),
        "table" => one("display", "table"),
        "hidden" => one("display", "none"),
        "mx-auto" => Some(vec![
            ("margin-left", "auto".to_string()),
            ("margin-right", "auto".to_string()),
        ]),
        _ => None,
    }
}

/// Utilities with no effect on the exported properties.
fn is_cosmetic(base: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "rounded",
        "shadow",
        "overflow-",
        "transition",
        "duration-",
        "min-w-",
        "max-w-",
        "min-h-",
        "max-h-",
        "space-",
        "list-inside",
        "list-outside",
        "antialiased",
        "border-collapse",
        "cursor-",
        "select-",
        "z-",
    ];
    PREFIXES.iter().any(|p| base.starts_with(p))
}

// ─────────────────────────────────────────────────────────────────────────────
// Scales
// ─────────────────────────────────────────────────────────────────────────────

/// `n` steps of the 0.25rem spacing scale.
fn spacing_value(step: &str) -> Option<String> {
    if step == "px" {
        return Some("1px".to_string());
    }
    if step == "auto" {
        return Some("auto".to_string());
    }
    let n: f32 = step.parse().ok()?;
    if n == 0.0 {
        return Some("0px".to_string());
    }
    Some(format!("{}rem", trim_float(n * 0.25)))
}

fn trim_float(value: f32) -> String {
    let s = format!("{:.4}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn spacing(base: &str) -> Option<Declarations> {
    const SIDES: &[(&str, &[&str])] = &[
        ("t", &["top"]),
        ("b", &["bottom"]),
        ("l", &["left"]),
        ("r", &["right"]),
        ("x", &["left", "right"]),
        ("y", &["top", "bottom"]),
        ("", &["top", "right", "bottom", "left"]),
    ];
    let (property, rest) = if let Some(rest) = base.strip_prefix('m') {
        ("margin", rest)
    } else if let Some(rest) = base.strip_prefix('p') {
        ("padding", rest)
    } else {
        return None;
    };
    let (side, step) = rest.split_once('-')?;
    let sides = SIDES.iter().find(|(s, _)| *s == side)?.1;
    let value = spacing_value(step)?;
    if property == "padding" && value == "auto" {
        return None;
    }
    Some(
        sides
            .iter()
            .map(|s| (longhand(property, s), value.clone()))
            .collect(),
    )
}

fn longhand(property: &str, side: &str) -> &'static str {
    match (property, side) {
        ("margin", "top") => "margin-top",
        ("margin", "right") => "margin-right",
        ("margin", "bottom") => "margin-bottom",
        ("margin", "left") => "margin-left",
        ("padding", "top") => "padding-top",
        ("padding", "right") => "padding-right",
        ("padding", "bottom") => "padding-bottom",
        ("padding", "left") => "padding-left",
        ("border", "top") => "border-top-width",
        ("border", "right") => "border-right-width",
        ("border", "bottom") => "border-bottom-width",
        _ => "border-left-width",
    }
}

fn text_size(size: &str) -> Option<Declarations> {
    let (font, line) = match size {
        "xs" => ("0.75rem", "1rem"),
        "sm" => ("0.875rem", "1.25rem"),
        "base" => ("1rem", "1.5rem"),
        "lg" => ("1.125rem", "1.75rem"),
        "xl" => ("1.25rem", "1.75rem"),
        "2xl" => ("1.5rem", "2rem"),
        "3xl" => ("1.875rem", "2.25rem"),
        "4xl" => ("2.25rem", "2.5rem"),
        "5xl" => ("3rem", "1"),
        _ => return None,
    };
    Some(vec![
        ("font-size", font.to_string()),
        ("line-height", line.to_string()),
    ])
}

fn leading(step: &str) -> Option<String> {
    match step {
        "none" => Some("1".to_string()),
        "tight" => Some("1.25".to_string()),
        "snug" => Some("1.375".to_string()),
        "normal" => Some("1.5".to_string()),
        "relaxed" => Some("1.625".to_string()),
        "loose" => Some("2".to_string()),
        _ => spacing_value(step).filter(|v| v != "auto"),
    }
}

fn size(step: &str) -> Option<String> {
    match step {
        "full" => Some("100%".to_string()),
        "auto" => Some("auto".to_string()),
        "screen" => None,
        _ => spacing_value(step),
    }
}

fn border(base: &str) -> Option<Declarations> {
    const STYLES: &[&str] = &["solid", "dashed", "dotted", "double", "none"];
    let rest = match base {
        "border" => return Some(all_border_widths("1px")),
        _ => base.strip_prefix("border-")?,
    };
    if STYLES.contains(&rest) {
        return Some(
            ["top", "right", "bottom", "left"]
                .iter()
                .map(|s| (border_style_longhand(s), rest.to_string()))
                .collect(),
        );
    }
    if let Some(width) = border_width(rest) {
        return Some(all_border_widths(&width));
    }
    let sides: &[&str] = match rest.split_once('-').map(|(s, _)| s).unwrap_or(rest) {
        "t" => &["top"],
        "r" => &["right"],
        "b" => &["bottom"],
        "l" => &["left"],
        "x" => &["left", "right"],
        "y" => &["top", "bottom"],
        _ => {
            return color_of(rest).map(|c| {
                ["top", "right", "bottom", "left"]
                    .iter()
                    .map(|s| (border_color_longhand(s), c.clone()))
                    .collect()
            })
        }
    };
    let width = match rest.split_once('-') {
        None => "1px".to_string(),
        Some((_, w)) => border_width(w)?,
    };
    Some(
        sides
            .iter()
            .map(|s| (longhand("border", s), width.clone()))
            .collect(),
    )
}

fn border_width(step: &str) -> Option<String> {
    match step {
        "0" | "2" | "4" | "8" => Some(format!("{}px", step)),
        _ => None,
    }
}

fn all_border_widths(width: &str) -> Declarations {
    vec![("border-width", width.to_string())]
}

fn border_style_longhand(side: &str) -> &'static str {
    match side {
        "top" => "border-top-style",
        "right" => "border-right-style",
        "bottom" => "border-bottom-style",
        _ => "border-left-style",
    }
}

fn border_color_longhand(side: &str) -> &'static str {
    match side {
        "top" => "border-top-color",
        "right" => "border-right-color",
        "bottom" => "border-bottom-color",
        _ => "border-left-color",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Palette
// ─────────────────────────────────────────────────────────────────────────────

/// `gray-700`, `blue-900/20`, `white`, ... to a CSS color value.
fn color_of(name: &str) -> Option<String> {
    let (name, opacity) = match name.split_once('/') {
        Some((name, opacity)) => (name, Some(opacity.parse::<u8>().ok()?)),
        None => (name, None),
    };
    let value = palette(name)?;
    match opacity {
        None => Some(value.to_string()),
        Some(percent) => {
            let alpha = trim_float(f32::from(percent.min(100)) / 100.0);
            match value.strip_suffix(')') {
                Some(open) => Some(format!("{} / {})", open, alpha)),
                None => Some(value.to_string()),
            }
        }
    }
}

fn palette(name: &str) -> Option<&'static str> {
    let value = match name {
        "transparent" => "transparent",
        "white" => "#ffffff",
        "black" => "#000000",
        "current" => "currentcolor",
        "gray-50" => "oklch(98.5% 0.002 247.839)",
        "gray-100" => "oklch(96.7% 0.003 264.542)",
        "gray-200" => "oklch(92.8% 0.006 264.531)",
        "gray-300" => "oklch(87.2% 0.01 258.338)",
        "gray-400" => "oklch(70.7% 0.022 261.325)",
        "gray-500" => "oklch(55.1% 0.027 264.364)",
        "gray-600" => "oklch(44.6% 0.03 256.802)",
        "gray-700" => "oklch(37.3% 0.034 259.733)",
        "gray-800" => "oklch(27.8% 0.033 256.848)",
        "gray-900" => "oklch(21% 0.034 264.665)",
        "gray-950" => "oklch(13% 0.028 261.692)",
        "blue-50" => "oklch(97% 0.014 254.604)",
        "blue-100" => "oklch(93.2% 0.032 255.585)",
        "blue-200" => "oklch(88.2% 0.059 254.128)",
        "blue-300" => "oklch(80.9% 0.105 251.813)",
        "blue-400" => "oklch(70.7% 0.165 254.624)",
        "blue-500" => "oklch(62.3% 0.214 259.815)",
        "blue-600" => "oklch(54.6% 0.245 262.881)",
        "blue-700" => "oklch(48.8% 0.243 264.376)",
        "blue-800" => "oklch(42.4% 0.199 265.638)",
        "blue-900" => "oklch(37.9% 0.146 265.522)",
        "pink-400" => "oklch(71.8% 0.202 349.761)",
        "pink-600" => "oklch(59.2% 0.249 0.584)",
        "green-600" => "oklch(62.7% 0.194 149.214)",
        "red-600" => "oklch(57.7% 0.245 27.325)",
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls(token: &str) -> Declarations {
        utility_declarations(token, false).unwrap_or_default()
    }

    #[test]
    fn test_spacing_utilities() {
        assert_eq!(decls("mt-8"), vec![("margin-top", "2rem".to_string())]);
        assert_eq!(
            decls("px-4"),
            vec![
                ("padding-left", "1rem".to_string()),
                ("padding-right", "1rem".to_string()),
            ]
        );
        assert_eq!(decls("py-0.5"), vec![
            ("padding-top", "0.125rem".to_string()),
            ("padding-bottom", "0.125rem".to_string()),
        ]);
        assert_eq!(decls("m-0").len(), 4);
    }

    #[test]
    fn test_text_utilities() {
        assert_eq!(
            decls("text-4xl"),
            vec![
                ("font-size", "2.25rem".to_string()),
                ("line-height", "2.5rem".to_string()),
            ]
        );
        assert_eq!(
            decls("text-gray-700"),
            vec![("color", "oklch(37.3% 0.034 259.733)".to_string())]
        );
        assert_eq!(decls("text-left"), vec![("text-align", "left".to_string())]);
    }

    #[test]
    fn test_color_opacity_modifier() {
        assert_eq!(
            utility_declarations("dark:bg-blue-900/20", true),
            Some(vec![(
                "background-color",
                "oklch(37.9% 0.146 265.522 / 0.2)".to_string()
            )])
        );
    }

    #[test]
    fn test_border_utilities() {
        assert_eq!(decls("border"), vec![("border-width", "1px".to_string())]);
        assert_eq!(decls("border-2"), vec![("border-width", "2px".to_string())]);
        assert_eq!(
            decls("border-b-2"),
            vec![("border-bottom-width", "2px".to_string())]
        );
        assert_eq!(decls("border-l-4"), vec![("border-left-width", "4px".to_string())]);
        assert_eq!(decls("border-gray-300").len(), 4);
        assert_eq!(decls("border-collapse"), Vec::new());
    }

    #[test]
    fn test_dark_variant_needs_dark_context() {
        assert_eq!(utility_declarations("dark:text-gray-100", false), None);
        assert!(utility_declarations("dark:text-gray-100", true).is_some());
        assert!(is_dark_variant("dark:border-gray-600"));
        assert!(!is_dark_variant("text-gray-600"));
    }

    #[test]
    fn test_interaction_variants_never_apply() {
        assert_eq!(utility_declarations("hover:text-blue-800", false), None);
        assert_eq!(utility_declarations("dark:hover:text-blue-300", true), None);
        assert_eq!(utility_declarations("md:mt-4", false), None);
    }

    #[test]
    fn test_unknown_and_cosmetic_tokens() {
        assert_eq!(utility_declarations("markdown-body", false), None);
        assert_eq!(utility_declarations("rounded-lg", false), Some(Vec::new()));
        assert_eq!(utility_declarations("shadow-sm", false), Some(Vec::new()));
    }
}
