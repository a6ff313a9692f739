/// Welcome message templating.
/// Supports `{display_name}`, `{user_name}`, `{user_mention}` and `{server_name}`;
/// `{{` and `}}` produce literal braces.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("unmatched '{0}' in welcome format")]
    UnmatchedBrace(char),
}

/// Values substituted into the welcome format
#[derive(Debug, Clone, Default)]
pub struct WelcomeVars<'a> {
    pub display_name: &'a str,
    pub user_name: &'a str,
    pub user_mention: &'a str,
    pub server_name: &'a str,
}

impl WelcomeVars<'_> {
    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "display_name" => Some(self.display_name),
            "user_name" => Some(self.user_name),
            "user_mention" => Some(self.user_mention),
            "server_name" => Some(self.server_name),
            _ => None,
        }
    }
}

pub fn render_welcome(format: &str, vars: &WelcomeVars<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(TemplateError::UnmatchedBrace('{')),
                        Some(k) => key.push(k),
                    }
                }
                let value = vars
                    .lookup(key.trim())
                    .ok_or(TemplateError::UnknownPlaceholder(key))?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::UnmatchedBrace('}')),
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Check a format string before it is stored
pub fn validate_format(format: &str) -> Result<(), TemplateError> {
    render_welcome(format, &WelcomeVars::default()).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> WelcomeVars<'static> {
        WelcomeVars {
            display_name: "Ferris",
            user_name: "ferris_the_crab",
            user_mention: "<@42>",
            server_name: "Rustaceans",
        }
    }

    #[test]
    fn substitutes_all_placeholders() {
        let text = render_welcome(
            "Hi {user_mention} ({user_name}), {display_name} joined {server_name}",
            &vars(),
        )
        .unwrap();
        assert_eq!(text, "Hi <@42> (ferris_the_crab), Ferris joined Rustaceans");
    }

    #[test]
    fn default_format_renders() {
        let text = render_welcome(&crate::config::WelcomeConfig::default().welcome_format, &vars())
            .unwrap();
        assert_eq!(text, "Welcome Ferris! to the server!");
    }

    #[test]
    fn doubled_braces_are_literal() {
        assert_eq!(render_welcome("{{x}} {display_name}", &vars()).unwrap(), "{x} Ferris");
    }

    #[test]
    fn multi_line_formats_keep_line_breaks() {
        assert_eq!(
            render_welcome("Welcome\n{display_name}", &vars()).unwrap(),
            "Welcome\nFerris"
        );
    }

    #[test]
    fn rejects_unknown_and_unbalanced() {
        assert_eq!(
            validate_format("Hello {nickname}"),
            Err(TemplateError::UnknownPlaceholder("nickname".to_string()))
        );
        assert_eq!(validate_format("Hello {display_name"), Err(TemplateError::UnmatchedBrace('{')));
        assert_eq!(validate_format("Hello }"), Err(TemplateError::UnmatchedBrace('}')));
        assert!(validate_format("Plain text").is_ok());
    }
}
