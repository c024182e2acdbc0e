use axum::http::{header, HeaderMap, HeaderValue};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// `Set-Cookie` value carrying a refresh token
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        REFRESH_COOKIE,
        token,
        max_age_secs.max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

pub fn clear_refresh_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("refreshToken=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("refreshToken=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
    }
}

/// Value of the first cookie named `name` across all `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
