use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive, dangerous tags (like
/// <script>, <iframe>) and event-handler attributes are stripped.
/// Applied to admin-authored study guide content before it is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Escapes text for interpolation into an email body.
pub fn escape(input: &str) -> String {
    ammonia::clean_text(input)
}
