//! Session cookie handling
//!
//! The session token travels either as `Authorization: Bearer <token>` or in
//! an HttpOnly cookie. This module builds the cookie on login, clears it on
//! logout and reads it back from incoming requests.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::SessionConfig;

/// Attributes of the session cookie
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    secure: bool,
    same_site: SameSite,
}

impl SessionCookies {
    pub fn new(name: impl Into<String>, secure: bool, same_site: SameSite) -> Self {
        Self {
            name: name.into(),
            secure,
            same_site,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.cookie_name.clone(),
            config.cookie_secure,
            parse_same_site(&config.cookie_same_site),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session token carried by the cookie, surrounding quotes removed
    pub fn token(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|c| c.value_trimmed().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Cookie handed out on login, living as long as the session
    pub fn issue(&self, token: &str, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build((self.name.clone(), token.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(cookie::time::Duration::seconds(max_age_secs.max(0)))
            .build()
    }

    /// Expired cookie that makes the browser drop the session
    pub fn clear(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), ""))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(cookie::time::Duration::ZERO)
            .expires(cookie::time::OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

/// Unknown values fall back to `Lax`; config validation rejects them first.
fn parse_same_site(value: &str) -> SameSite {
    match value.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    fn cookies() -> SessionCookies {
        SessionCookies::from_config(&SessionConfig::default())
    }

    fn jar(raw: &'static str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static(raw));
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn quoted_value_is_unwrapped() {
        assert_eq!(cookies().token(&jar("sid=\"xyz\"")).as_deref(), Some("xyz"));
    }

    #[test]
    fn token_is_picked_by_name() {
        let jar = jar("theme=dark; sid=xyz; lang=en");
        assert_eq!(cookies().token(&jar).as_deref(), Some("xyz"));
        assert_eq!(
            SessionCookies::new("session", true, SameSite::Lax).token(&jar),
            None
        );
    }

    #[test]
    fn empty_cookie_is_no_token() {
        assert_eq!(cookies().token(&jar("sid=")), None);
    }

    #[test]
    fn issued_cookie_carries_all_attributes() {
        let cookie = cookies().issue("abc", 3600);

        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::hours(1)));
    }

    #[test]
    fn secure_flag_follows_config() {
        let config = SessionConfig {
            cookie_secure: false,
            cookie_same_site: "Strict".to_string(),
            ..SessionConfig::default()
        };
        let cookie = SessionCookies::from_config(&config).issue("abc", 60);

        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert!(!cookie.to_string().contains("Secure"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = cookies().clear();

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
        assert!(cookie.to_string().contains("Max-Age=0"));
    }
}
