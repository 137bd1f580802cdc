//! 이벤트 이름 카탈로그 및 검증
//!
//! 이벤트 이름은 경계에서 문자열로 유지하되, 오타로 인해 listener 가
//! 영원히 호출되지 않는 일이 없도록 freeze 시점에 검증한다.

use crate::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

// 프로비저닝 / 라이프사이클
pub const INSTALL: &str = "install";
pub const STARTUP: &str = "startup";
pub const SESSION_START: &str = "session_start";
pub const NEWUSER: &str = "newuser";

// 권한
pub const CAN: &str = "can";

// 감사 로그
pub const LOG: &str = "log";
pub const HISTORY: &str = "history";

// 출력 (외부 collaborator)
pub const RENDER: &str = "render";
pub const SENDMAIL: &str = "sendmail";
pub const HTTP_STATUS: &str = "http_status";
pub const HTTP_REDIRECT: &str = "http_redirect";

// 사용자 / 인증
pub const AUTHENTICATE: &str = "authenticate";
pub const LOGIN: &str = "login";
pub const LOGOUT: &str = "logout";
pub const USER_CREATE: &str = "user_create";
pub const USER_UPDATE: &str = "user_update";
pub const USER_FROMEMAIL: &str = "user_fromemail";
pub const USER_CHANGED: &str = "user_changed";

// 폼
pub const FORM_VALIDATE: &str = "form_validate";

/// 라우트 이벤트 접두사
pub const ROUTE_PREFIX: &str = "route/";

/// 기본 라우트 이름
pub const ROUTE_MAIN: &str = "main";

/// 알려진 이벤트 이름
pub const KNOWN_EVENTS: &[&str] = &[
    INSTALL,
    STARTUP,
    SESSION_START,
    NEWUSER,
    CAN,
    LOG,
    HISTORY,
    RENDER,
    SENDMAIL,
    HTTP_STATUS,
    HTTP_REDIRECT,
    AUTHENTICATE,
    LOGIN,
    LOGOUT,
    USER_CREATE,
    USER_UPDATE,
    USER_FROMEMAIL,
    USER_CHANGED,
    FORM_VALIDATE,
];

/// `route/<base>` 이벤트 이름 생성
pub fn route(base: &str) -> String {
    format!("{}{}", ROUTE_PREFIX, base)
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_./+-]+$").expect("static pattern"))
}

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_.-]+$").expect("static pattern"))
}

/// 이름 문법 검증
pub fn validate_syntax(name: &str) -> Result<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidEvent(name.to_string()))
    }
}

/// `route/<seg>` 또는 `route/<seg>+<seg>` 형식인지
pub fn is_route(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(ROUTE_PREFIX) else {
        return false;
    };
    let mut segments = rest.split('+');
    let first_ok = segments.next().is_some_and(|s| segment_pattern().is_match(s));
    let second_ok = segments.next().map_or(true, |s| segment_pattern().is_match(s));
    first_ok && second_ok && segments.next().is_none()
}

/// 카탈로그에 있거나 라우트 형식인지
pub fn is_known(name: &str) -> bool {
    KNOWN_EVENTS.contains(&name) || is_route(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax() {
        assert!(validate_syntax("can").is_ok());
        assert!(validate_syntax("route/user+prefs").is_ok());
        assert!(validate_syntax("").is_err());
        assert!(validate_syntax("Can").is_err());
        assert!(validate_syntax("route/user prefs").is_err());
    }

    #[test]
    fn test_routes() {
        assert!(is_route("route/main"));
        assert!(is_route("route/admin+users"));
        assert!(!is_route("route/"));
        assert!(!is_route("route/a+b+c"));
        assert!(!is_route("route/a/b"));
        assert_eq!(route("login"), "route/login");
    }

    #[test]
    fn test_known() {
        assert!(is_known(CAN));
        assert!(is_known("route/logout"));
        assert!(!is_known("cna"));
    }
}
