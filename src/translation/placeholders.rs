use std::sync::LazyLock;

use regex::{Captures, Regex};
use uuid::Uuid;

const TOKEN_PREFIX: &str = "IMAGE_PLACEHOLDER_";

static EMBEDDED_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\((data:image/[^)\s]+)\)").expect("embedded image pattern is valid")
});

/// A token anywhere in the text: prefix, 8-hex nonce, index.
static BARE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{TOKEN_PREFIX}[0-9a-f]{{8}}_\d+")).expect("placeholder pattern is valid")
});

/// A token inside image syntax, bare or quoted.
static WRAPPED_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    let token = format!(r"{TOKEN_PREFIX}[0-9a-f]{{8}}_\d+");
    Regex::new(&format!(
        r#"!\[([^\]]*)\]\(\s*(?:"({token})"|'({token})'|({token}))\s*\)"#
    ))
    .expect("placeholder reference pattern is valid")
});

/// Markdown with every embedded `data:image/...` reference swapped for a
/// numbered placeholder, plus the payloads needed to put them back.
///
/// Tokens carry a nonce minted per strip, so text that already looks like a
/// placeholder is never rewritten on restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedMarkdown {
    pub text: String,
    prefix: String,
    images: Vec<String>,
}

impl StrippedMarkdown {
    pub fn strip(markdown: &str) -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        let prefix = format!("{TOKEN_PREFIX}{}_", &nonce[..8]);
        let mut images = Vec::new();
        let text = EMBEDDED_IMAGE
            .replace_all(markdown, |caps: &Captures| {
                let token = format!("{prefix}{}", images.len());
                images.push(caps[2].to_string());
                format!("![{}]({token})", &caps[1])
            })
            .into_owned();
        Self {
            text,
            prefix,
            images,
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Placeholder standing in for image `index`.
    pub fn token(&self, index: usize) -> String {
        format!("{}{index}", self.prefix)
    }

    /// Puts the payloads back into `translated`. Image references are matched
    /// with bare, double-quoted and single-quoted tokens; tokens that lost their
    /// image syntax are replaced in place. Tokens from another strip or with
    /// unknown indices are left as they are.
    pub fn restore(&self, translated: &str) -> String {
        let restored = WRAPPED_TOKEN.replace_all(translated, |caps: &Captures| {
            let token = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4));
            match token.and_then(|m| self.lookup(m.as_str())) {
                Some(url) => format!("![{}]({url})", &caps[1]),
                None => caps[0].to_string(),
            }
        });
        BARE_TOKEN
            .replace_all(&restored, |caps: &Captures| {
                self.lookup(&caps[0])
                    .map(str::to_string)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn lookup(&self, token: &str) -> Option<&str> {
        let index: usize = token.strip_prefix(&self.prefix)?.parse().ok()?;
        self.images.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# Guide\n\n## Step 1: Open\nClick open.\n\n![Step 1](data:image/png;base64,AAAA)\n\n## Step 2\n\n![Step 2](data:image/jpeg;base64,BBBB)\n\n![remote](https://example.com/a.png)\n";

    #[test]
    fn strip_then_restore_is_lossless() {
        let stripped = StrippedMarkdown::strip(DOC);
        assert_eq!(stripped.image_count(), 2);
        assert!(stripped.text.contains(&format!("![Step 1]({})", stripped.token(0))));
        assert!(stripped.text.contains(&format!("![Step 2]({})", stripped.token(1))));
        assert!(stripped.text.contains("![remote](https://example.com/a.png)"));
        assert!(!stripped.text.contains("base64"));
        assert_eq!(stripped.restore(&stripped.text), DOC);

        let lookalikes = "Tokens look like IMAGE_PLACEHOLDER_0 and IMAGE_PLACEHOLDER_0badc0de_0 in logs.\n\n![Step 1](data:image/png;base64,AAAA)\n";
        let stripped = StrippedMarkdown::strip(lookalikes);
        assert_eq!(stripped.restore(&stripped.text), lookalikes);
    }

    #[test]
    fn restores_quoted_and_unwrapped_tokens() {
        let stripped = StrippedMarkdown::strip(DOC);
        let (first, second) = (stripped.token(0), stripped.token(1));
        let unknown = stripped.token(7);
        let translated = format!("![Paso 1](\"{first}\") y ![Paso 2]( '{second}' ) {first} {unknown}");
        assert_eq!(
            stripped.restore(&translated),
            format!("![Paso 1](data:image/png;base64,AAAA) y ![Paso 2](data:image/jpeg;base64,BBBB) data:image/png;base64,AAAA {unknown}")
        );
    }

    #[test]
    fn each_strip_mints_its_own_tokens() {
        let first = StrippedMarkdown::strip(DOC);
        let second = StrippedMarkdown::strip(DOC);
        assert_ne!(first.token(0), second.token(0));
        assert_eq!(second.restore(&first.text), first.text);
    }

    #[test]
    fn documents_without_images_pass_through() {
        let stripped = StrippedMarkdown::strip("plain text");
        assert_eq!(stripped.image_count(), 0);
        assert_eq!(stripped.restore("texto plano"), "texto plano");
    }
}
