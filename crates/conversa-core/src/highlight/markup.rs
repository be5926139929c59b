use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{span, Colorize};

// Tags arrive escaped: `&lt;div class="a"&gt;`.
static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(&lt;/?)(\w+)([^&]*?)(&gt;)").expect("html tag regex"));
static HTML_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\w+)=("[^"\n]*")"#).expect("html attribute regex"));

static CSS_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(?P<indent>[ \t]*)(?P<selector>[\w.#:-]+)(?P<gap>[ \t]*)\{|(?P<property>[\w-]+)(?P<colon>[ \t]*:[ \t]*)(?P<value>(?:&#?\w+;|[^;{}\n&]|&)+)",
    )
    .expect("css rule regex")
});

/// Tag names and `name="value"` attributes.
#[derive(Debug)]
pub(crate) struct HtmlColorizer;

impl Colorize for HtmlColorizer {
    fn colorize(&self, code: &str) -> String {
        HTML_TAG
            .replace_all(code, |caps: &Captures| {
                let attributes = HTML_ATTRIBUTE.replace_all(&caps[3], |attr: &Captures| {
                    format!("{}={}", span("attribute", &attr[1]), span("string", &attr[2]))
                });
                format!("{}{}{}{}", &caps[1], span("tag", &caps[2]), attributes, &caps[4])
            })
            .into_owned()
    }
}

/// Selectors opening a block and `property: value` declarations.
#[derive(Debug)]
pub(crate) struct CssColorizer;

impl Colorize for CssColorizer {
    fn colorize(&self, code: &str) -> String {
        CSS_RULE
            .replace_all(code, |caps: &Captures| {
                if let Some(selector) = caps.name("selector") {
                    let indent = caps.name("indent").map_or("", |m| m.as_str());
                    let gap = caps.name("gap").map_or("", |m| m.as_str());
                    return format!("{}{}{}{{", indent, span("selector", selector.as_str()), gap);
                }
                let property = caps.name("property").map_or("", |m| m.as_str());
                let colon = caps.name("colon").map_or("", |m| m.as_str());
                let value = caps.name("value").map_or("", |m| m.as_str());
                format!("{}{}{}", span("property", property), colon, span("value", value))
            })
            .into_owned()
    }
}
